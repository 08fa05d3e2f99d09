//! Resource identity and the contracts integrators implement to describe served resources.

/// Declared serving capabilities.
pub mod capability;
/// Group/version/resource identity keys.
pub mod key;
/// The integrator-facing resource description trait.
pub mod object;
/// Request handler contract.
pub mod storage;
/// Version string ordering used for group version priority.
pub mod version;

pub use capability::CapabilitySet;
pub use key::{GroupResource, GroupVersion, GroupVersionKind, GroupVersionResource, INTERNAL_VERSION};
pub use object::{DefaultingFn, Resource, ResourceDescriptor};
pub use storage::{Handler, Storage};
pub use version::{VersionOrder, compare_kube_aware};
