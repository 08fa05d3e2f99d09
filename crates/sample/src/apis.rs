//! The `wardle.example.com` resources served by the sample.

use std::sync::Arc;

use apiary_builder::{ApiServer, DuplicatePolicy};
use apiary_resource::{CapabilitySet, GroupVersionResource, Handler, Resource, Storage, VersionOrder};

pub const GROUP: &str = "wardle.example.com";

/// Flunder spec shared by both served versions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlunderSpec {
	pub reference: Option<String>,
	pub reference_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlunderV1Alpha1 {
	pub name: String,
	pub spec: FlunderSpec,
}

impl Resource for FlunderV1Alpha1 {
	fn group_version_resource(&self) -> GroupVersionResource {
		GroupVersionResource::new(GROUP, "v1alpha1", "flunders")
	}

	fn kind(&self) -> &str {
		"Flunder"
	}

	fn capabilities(&self) -> CapabilitySet {
		CapabilitySet::STATUS | CapabilitySet::DEFAULTS
	}

	fn apply_defaults(&mut self) {
		if self.spec.reference.is_some() {
			self.spec.reference_type.get_or_insert_with(|| "Flunder".to_string());
		}
	}
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlunderV1Beta1 {
	pub name: String,
	pub spec: FlunderSpec,
}

impl Resource for FlunderV1Beta1 {
	fn group_version_resource(&self) -> GroupVersionResource {
		GroupVersionResource::new(GROUP, "v1beta1", "flunders")
	}

	fn kind(&self) -> &str {
		"Flunder"
	}

	fn capabilities(&self) -> CapabilitySet {
		CapabilitySet::STATUS | CapabilitySet::DEFAULTS
	}

	fn is_storage_version(&self) -> bool {
		false
	}

	fn apply_defaults(&mut self) {
		if self.spec.reference.is_some() {
			self.spec.reference_type.get_or_insert_with(|| "Flunder".to_string());
		}
	}
}

/// Cluster-scoped, read-only listing of the disallowed flunder names.
#[derive(Debug, Clone)]
pub struct Fischer {
	pub disallowed_flunders: Vec<String>,
}

impl Resource for Fischer {
	fn group_version_resource(&self) -> GroupVersionResource {
		GroupVersionResource::new(GROUP, "v1alpha1", "fischers")
	}

	fn kind(&self) -> &str {
		"Fischer"
	}

	fn capabilities(&self) -> CapabilitySet {
		CapabilitySet::GET | CapabilitySet::LIST
	}

	fn namespace_scoped(&self) -> bool {
		false
	}

	fn self_storage(&self) -> Option<Handler> {
		Some(Arc::new(FischerStorage {
			disallowed: self.disallowed_flunders.clone(),
		}))
	}
}

/// Serves the fixed [`Fischer`] list.
#[derive(Debug)]
pub struct FischerStorage {
	disallowed: Vec<String>,
}

impl FischerStorage {
	pub fn disallowed(&self) -> &[String] {
		&self.disallowed
	}
}

impl Storage for FischerStorage {
	fn kind(&self) -> &str {
		"Fischer"
	}

	fn capabilities(&self) -> CapabilitySet {
		CapabilitySet::GET | CapabilitySet::LIST
	}
}

/// Registers every sample resource on a fresh builder.
pub fn server(order: VersionOrder) -> ApiServer {
	let mut server = ApiServer::new();
	server
		.with_version_order(order)
		.with_duplicate_policy(DuplicatePolicy::Reject)
		.with_resource(&FlunderV1Alpha1::default())
		.with_resource(&FlunderV1Beta1::default())
		.with_resource(&Fischer {
			disallowed_flunders: vec!["jabberwock".to_string(), "badflunder".to_string()],
		})
		.disable_delegate_auth();
	server
}
