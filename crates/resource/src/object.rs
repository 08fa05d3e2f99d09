use std::any::{Any, TypeId};
use std::sync::Arc;

use crate::capability::CapabilitySet;
use crate::key::{GroupVersionKind, GroupVersionResource};
use crate::storage::Handler;

/// Type-erased defaulting function. Objects of any other type are left untouched.
pub type DefaultingFn = Arc<dyn Fn(&mut dyn Any) + Send + Sync>;

/// A resource type served by the apiserver.
///
/// Behavior is selected from [`Resource::capabilities`], never by probing the type:
///
/// - any of [`CapabilitySet::SERVING`] makes the type its own handler via
///   [`Resource::self_storage`];
/// - [`CapabilitySet::STATUS`] registers a `status` sub-resource alongside it;
/// - [`CapabilitySet::DEFAULTS`] wires [`Resource::apply_defaults`] into the scheme.
pub trait Resource: Send + Sync + 'static {
	/// Identity this version of the type is served under.
	fn group_version_resource(&self) -> GroupVersionResource;

	/// Kind name registered in the scheme.
	fn kind(&self) -> &str;

	fn list_kind(&self) -> String {
		format!("{}List", self.kind())
	}

	fn capabilities(&self) -> CapabilitySet {
		CapabilitySet::empty()
	}

	/// Whether this version is the one the shared handler accepts.
	fn is_storage_version(&self) -> bool {
		true
	}

	fn namespace_scoped(&self) -> bool {
		true
	}

	/// Handler for self-serving types. Consulted only when a serving capability is declared.
	fn self_storage(&self) -> Option<Handler> {
		None
	}

	/// Fills unset fields. Consulted only when [`CapabilitySet::DEFAULTS`] is declared.
	fn apply_defaults(&mut self) {}
}

/// Non-generic snapshot of a [`Resource`], resolved once at registration time.
#[derive(Clone)]
pub struct ResourceDescriptor {
	pub gvr: GroupVersionResource,
	pub kind: String,
	pub list_kind: String,
	pub type_id: TypeId,
	pub type_name: &'static str,
	pub capabilities: CapabilitySet,
	pub storage_version: bool,
	pub namespace_scoped: bool,
	pub self_storage: Option<Handler>,
	pub defaulter: Option<DefaultingFn>,
}

impl ResourceDescriptor {
	pub fn of<R: Resource>(obj: &R) -> Self {
		let capabilities = obj.capabilities();
		let self_storage = if capabilities.is_self_serving() {
			obj.self_storage()
		} else {
			None
		};
		let defaulter: Option<DefaultingFn> = capabilities.contains(CapabilitySet::DEFAULTS).then(|| {
			Arc::new(|target: &mut dyn Any| {
				if let Some(target) = target.downcast_mut::<R>() {
					target.apply_defaults();
				}
			}) as DefaultingFn
		});

		Self {
			gvr: obj.group_version_resource(),
			kind: obj.kind().to_string(),
			list_kind: obj.list_kind(),
			type_id: TypeId::of::<R>(),
			type_name: std::any::type_name::<R>(),
			capabilities,
			storage_version: obj.is_storage_version(),
			namespace_scoped: obj.namespace_scoped(),
			self_storage,
			defaulter,
		}
	}

	pub fn group_version_kind(&self) -> GroupVersionKind {
		self.gvr.group_version().with_kind(self.kind.clone())
	}

	pub fn list_group_version_kind(&self) -> GroupVersionKind {
		self.gvr.group_version().with_kind(self.list_kind.clone())
	}
}

impl std::fmt::Debug for ResourceDescriptor {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ResourceDescriptor")
			.field("gvr", &self.gvr)
			.field("kind", &self.kind)
			.field("type_name", &self.type_name)
			.field("capabilities", &self.capabilities)
			.field("storage_version", &self.storage_version)
			.field("namespace_scoped", &self.namespace_scoped)
			.field("self_storage", &self.self_storage.is_some())
			.field("defaulter", &self.defaulter.is_some())
			.finish()
	}
}
