use std::any::Any;
use std::sync::Arc;

use crate::capability::CapabilitySet;

/// Serves requests against one resource.
///
/// Implementations live in the persistence layer or in self-serving resource types. The
/// registry never looks inside; it only hands handlers out. Serving layers that need the
/// concrete type upcast to `&dyn Any` and downcast.
pub trait Storage: Any + Send + Sync {
	/// Kind of the objects this handler serves.
	fn kind(&self) -> &str;

	/// Request verbs this handler answers.
	fn capabilities(&self) -> CapabilitySet;
}

/// Shared request handler. Two lookups return the same handler iff `Arc::ptr_eq`.
pub type Handler = Arc<dyn Storage>;
