use serde::{Deserialize, Serialize};

/// Hub version that storage versions are additionally registered under.
pub const INTERNAL_VERSION: &str = "__internal";

/// An API group and one of its versions.
///
/// The empty group is the core group.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupVersion {
	pub group: String,
	pub version: String,
}

impl GroupVersion {
	pub fn new(group: impl Into<String>, version: impl Into<String>) -> Self {
		Self {
			group: group.into(),
			version: version.into(),
		}
	}

	/// Returns the internal hub version of `group`.
	pub fn internal(group: impl Into<String>) -> Self {
		Self::new(group, INTERNAL_VERSION)
	}

	pub fn with_resource(&self, resource: impl Into<String>) -> GroupVersionResource {
		GroupVersionResource {
			group: self.group.clone(),
			version: self.version.clone(),
			resource: resource.into(),
		}
	}

	pub fn with_kind(&self, kind: impl Into<String>) -> GroupVersionKind {
		GroupVersionKind {
			group: self.group.clone(),
			version: self.version.clone(),
			kind: kind.into(),
		}
	}
}

impl std::fmt::Display for GroupVersion {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		if self.group.is_empty() {
			f.write_str(&self.version)
		} else {
			write!(f, "{}/{}", self.group, self.version)
		}
	}
}

/// Version-less resource identity.
///
/// All versions of a resource share one backing handler under this key.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupResource {
	pub group: String,
	pub resource: String,
}

impl GroupResource {
	pub fn new(group: impl Into<String>, resource: impl Into<String>) -> Self {
		Self {
			group: group.into(),
			resource: resource.into(),
		}
	}
}

impl std::fmt::Display for GroupResource {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		if self.group.is_empty() {
			f.write_str(&self.resource)
		} else {
			write!(f, "{}.{}", self.resource, self.group)
		}
	}
}

/// Full identity of a served resource or sub-resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupVersionResource {
	pub group: String,
	pub version: String,
	pub resource: String,
}

impl GroupVersionResource {
	pub fn new(group: impl Into<String>, version: impl Into<String>, resource: impl Into<String>) -> Self {
		Self {
			group: group.into(),
			version: version.into(),
			resource: resource.into(),
		}
	}

	/// Drops the version.
	pub fn group_resource(&self) -> GroupResource {
		GroupResource {
			group: self.group.clone(),
			resource: self.resource.clone(),
		}
	}

	/// Drops the resource.
	pub fn group_version(&self) -> GroupVersion {
		GroupVersion {
			group: self.group.clone(),
			version: self.version.clone(),
		}
	}

	/// Returns the key of the sub-resource at `path` below this resource, e.g. `widgets/status`.
	pub fn subresource(&self, path: &str) -> Self {
		Self {
			group: self.group.clone(),
			version: self.version.clone(),
			resource: format!("{}/{}", self.resource, path),
		}
	}
}

impl std::fmt::Display for GroupVersionResource {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}, Resource={}", self.group_version(), self.resource)
	}
}

/// Identity of a registered type within a group version.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupVersionKind {
	pub group: String,
	pub version: String,
	pub kind: String,
}

impl GroupVersionKind {
	pub fn group_version(&self) -> GroupVersion {
		GroupVersion {
			group: self.group.clone(),
			version: self.version.clone(),
		}
	}
}

impl std::fmt::Display for GroupVersionKind {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}, Kind={}", self.group_version(), self.kind)
	}
}
