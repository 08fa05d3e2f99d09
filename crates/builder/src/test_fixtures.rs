#![allow(dead_code)]

use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use apiary_resource::{CapabilitySet, GroupVersionResource, Handler, Resource, Storage};

use crate::rest::{HandlerProvider, ProviderError, Store, handler_provider};

pub(crate) struct TestStorage {
	kind: String,
}

impl TestStorage {
	pub(crate) fn new(kind: &str) -> Self {
		Self { kind: kind.to_string() }
	}
}

impl Storage for TestStorage {
	fn kind(&self) -> &str {
		&self.kind
	}

	fn capabilities(&self) -> CapabilitySet {
		CapabilitySet::GET | CapabilitySet::LIST
	}
}

/// Provider that counts its invocations and builds a fresh [`TestStorage`] each time.
pub(crate) fn counting_provider(calls: &Arc<AtomicUsize>) -> HandlerProvider {
	let calls = calls.clone();
	handler_provider(move |_, _| {
		calls.fetch_add(1, Ordering::SeqCst);
		Ok(Arc::new(TestStorage::new("Widget")) as Handler)
	})
}

pub(crate) fn failing_provider(calls: &Arc<AtomicUsize>, msg: &'static str) -> HandlerProvider {
	let calls = calls.clone();
	handler_provider(move |_, _| {
		calls.fetch_add(1, Ordering::SeqCst);
		Err(ProviderError::custom(msg))
	})
}

pub(crate) fn downcast_store(handler: &Handler) -> &Store {
	let any: &dyn Any = handler.as_ref();
	any.downcast_ref::<Store>().expect("handler is a generic store")
}

/// `apps/<version>/widgets` with a status sub-resource and defaults. v1 is the storage version.
pub(crate) struct Widget {
	pub gvr: GroupVersionResource,
	pub replicas: Option<u32>,
}

impl Widget {
	pub(crate) fn at(version: &str) -> Self {
		Self {
			gvr: GroupVersionResource::new("apps", version, "widgets"),
			replicas: None,
		}
	}

	pub(crate) fn v1() -> Self {
		Self::at("v1")
	}

	pub(crate) fn v2() -> Self {
		Self::at("v2")
	}
}

impl Resource for Widget {
	fn group_version_resource(&self) -> GroupVersionResource {
		self.gvr.clone()
	}

	fn kind(&self) -> &str {
		"Widget"
	}

	fn capabilities(&self) -> CapabilitySet {
		CapabilitySet::STATUS | CapabilitySet::DEFAULTS
	}

	fn is_storage_version(&self) -> bool {
		self.gvr.version == "v1"
	}

	fn apply_defaults(&mut self) {
		self.replicas.get_or_insert(1);
	}
}

/// `apps/v1/gadgets`, no declared capabilities.
pub(crate) struct Gadget;

impl Resource for Gadget {
	fn group_version_resource(&self) -> GroupVersionResource {
		GroupVersionResource::new("apps", "v1", "gadgets")
	}

	fn kind(&self) -> &str {
		"Gadget"
	}
}

/// `apps/<version>/gizmos`, serves itself.
pub(crate) struct Gizmo {
	pub version: &'static str,
	pub handler: Option<Handler>,
}

impl Resource for Gizmo {
	fn group_version_resource(&self) -> GroupVersionResource {
		GroupVersionResource::new("apps", self.version, "gizmos")
	}

	fn kind(&self) -> &str {
		"Gizmo"
	}

	fn capabilities(&self) -> CapabilitySet {
		CapabilitySet::GET | CapabilitySet::LIST | CapabilitySet::STATUS
	}

	fn self_storage(&self) -> Option<Handler> {
		self.handler.clone()
	}
}

/// Request type of the `scale` sub-resource.
pub(crate) struct Scale;

impl Resource for Scale {
	fn group_version_resource(&self) -> GroupVersionResource {
		GroupVersionResource::new("autoscaling", "v1", "scales")
	}

	fn kind(&self) -> &str {
		"Scale"
	}
}
