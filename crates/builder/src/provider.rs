//! Shares one handler between every version and path that serves the same group-resource.
//!
//! # Invariants
//!
//! - The wrapped [`HandlerProvider`] runs at most once, on the first [`SingletonProvider::get`].
//! - Concurrent first callers block until that single construction finishes, then all observe
//!   the same result.
//! - A failed construction is cached like a success and never retried.

use std::sync::{Arc, OnceLock};

use apiary_resource::{GroupResource, Handler};

use crate::rest::{HandlerProvider, ProviderError, RestOptionsGetter};
use crate::scheme::Scheme;

/// Result handed to every caller of [`SingletonProvider::get`].
pub type SharedResult = Result<Handler, Arc<ProviderError>>;

/// Memoizes the handler built for one group-resource.
pub struct SingletonProvider {
	resource: GroupResource,
	provider: HandlerProvider,
	cell: OnceLock<SharedResult>,
}

impl SingletonProvider {
	pub fn new(resource: GroupResource, provider: HandlerProvider) -> Self {
		Self {
			resource,
			provider,
			cell: OnceLock::new(),
		}
	}

	pub fn resource(&self) -> &GroupResource {
		&self.resource
	}

	/// Returns the handler, constructing it on first use.
	pub fn get(&self, scheme: &Scheme, options: &dyn RestOptionsGetter) -> SharedResult {
		self.cell
			.get_or_init(|| {
				let result = (self.provider)(scheme, options).map_err(Arc::new);
				match &result {
					Ok(handler) => tracing::debug!(resource = %self.resource, kind = handler.kind(), "constructed handler"),
					Err(err) => tracing::warn!(resource = %self.resource, error = %err, "handler construction failed"),
				}
				result
			})
			.clone()
	}

	/// Returns true once the provider has run.
	pub fn is_initialized(&self) -> bool {
		self.cell.get().is_some()
	}
}

impl std::fmt::Debug for SingletonProvider {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SingletonProvider")
			.field("resource", &self.resource)
			.field("initialized", &self.is_initialized())
			.finish()
	}
}
