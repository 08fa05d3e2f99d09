//! Handler providers and the generic store they build.
//!
//! A [`HandlerProvider`] is the opaque factory the registry memoizes. The constructors here
//! build providers for the default, strategy-driven [`Store`]; integrators with their own
//! persistence hand the builder a provider of their own instead.

use std::any::Any;
use std::sync::Arc;

use apiary_resource::{CapabilitySet, DefaultingFn, GroupResource, GroupVersion, Handler, ResourceDescriptor, Storage};

use crate::scheme::Scheme;

/// Handler construction failures. Cached by the singleton provider and shared between callers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
	#[error("no storage options for {resource}: {reason}")]
	Options { resource: GroupResource, reason: String },
	#[error("store for {resource} is incomplete: {reason}")]
	IncompleteStore { resource: GroupResource, reason: String },
	/// Raised by integrator-supplied providers.
	#[error("{0}")]
	Custom(String),
}

impl ProviderError {
	pub fn custom(msg: impl Into<String>) -> Self {
		Self::Custom(msg.into())
	}
}

/// Factory turning the built scheme and storage options into a handler.
pub type HandlerProvider = Arc<dyn Fn(&Scheme, &dyn RestOptionsGetter) -> Result<Handler, ProviderError> + Send + Sync>;

/// Wraps a closure as a [`HandlerProvider`].
pub fn handler_provider<F>(f: F) -> HandlerProvider
where
	F: Fn(&Scheme, &dyn RestOptionsGetter) -> Result<Handler, ProviderError> + Send + Sync + 'static,
{
	Arc::new(f)
}

/// Provider that always hands out `handler`.
pub fn static_handler(handler: Handler) -> HandlerProvider {
	Arc::new(move |_, _| Ok(handler.clone()))
}

/// Storage settings for one group-resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestOptions {
	pub resource_prefix: String,
	pub enable_garbage_collection: bool,
	pub deletion_workers: usize,
}

/// Source of per-resource storage settings.
pub trait RestOptionsGetter: Send + Sync {
	fn rest_options(&self, resource: &GroupResource) -> Result<RestOptions, ProviderError>;
}

/// Derives every resource's options from one key prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticRestOptions {
	pub prefix: String,
	pub enable_garbage_collection: bool,
	pub deletion_workers: usize,
}

impl Default for StaticRestOptions {
	fn default() -> Self {
		Self {
			prefix: "/registry".to_string(),
			enable_garbage_collection: true,
			deletion_workers: 1,
		}
	}
}

impl RestOptionsGetter for StaticRestOptions {
	fn rest_options(&self, resource: &GroupResource) -> Result<RestOptions, ProviderError> {
		if resource.resource.is_empty() {
			return Err(ProviderError::Options {
				resource: resource.clone(),
				reason: "empty resource name".to_string(),
			});
		}
		let prefix = self.prefix.trim_end_matches('/');
		let resource_prefix = if resource.group.is_empty() {
			format!("{prefix}/{}", resource.resource)
		} else {
			format!("{prefix}/{}/{}", resource.group, resource.resource)
		};
		Ok(RestOptions {
			resource_prefix,
			enable_garbage_collection: self.enable_garbage_collection,
			deletion_workers: self.deletion_workers,
		})
	}
}

/// Create/update behavior of a generic store.
pub trait Strategy: Send + Sync {
	fn namespace_scoped(&self) -> bool;

	fn allow_create_on_update(&self) -> bool {
		false
	}

	fn allow_unconditional_update(&self) -> bool {
		true
	}

	fn prepare_for_create(&self, _obj: &mut dyn Any) {}

	fn prepare_for_update(&self, _obj: &mut dyn Any, _old: &dyn Any) {}

	/// Returns field errors, empty if valid.
	fn validate(&self, _obj: &dyn Any) -> Vec<String> {
		Vec::new()
	}
}

/// Strategy derived from a resource's declared behavior.
pub struct DefaultStrategy {
	namespace_scoped: bool,
	defaulter: Option<DefaultingFn>,
}

impl DefaultStrategy {
	pub fn for_resource(desc: &ResourceDescriptor) -> Self {
		Self {
			namespace_scoped: desc.namespace_scoped,
			defaulter: desc.defaulter.clone(),
		}
	}
}

impl Strategy for DefaultStrategy {
	fn namespace_scoped(&self) -> bool {
		self.namespace_scoped
	}

	fn prepare_for_create(&self, obj: &mut dyn Any) {
		if let Some(defaulter) = &self.defaulter {
			defaulter(obj);
		}
	}
}

/// Restricts a strategy to status updates.
pub struct StatusStrategy {
	inner: Arc<dyn Strategy>,
}

impl StatusStrategy {
	pub fn new(inner: Arc<dyn Strategy>) -> Self {
		Self { inner }
	}
}

impl Strategy for StatusStrategy {
	fn namespace_scoped(&self) -> bool {
		self.inner.namespace_scoped()
	}

	fn allow_create_on_update(&self) -> bool {
		false
	}

	fn prepare_for_update(&self, obj: &mut dyn Any, old: &dyn Any) {
		self.inner.prepare_for_update(obj, old);
	}

	fn validate(&self, obj: &dyn Any) -> Vec<String> {
		self.inner.validate(obj)
	}
}

/// Customizes a store before it is completed.
pub type StoreFn = Arc<dyn Fn(&mut Store) + Send + Sync>;

/// Generic strategy-driven store over the external storage backend.
pub struct Store {
	pub kind: String,
	pub group_resource: GroupResource,
	/// Version objects are encoded in at rest.
	pub encoding_version: GroupVersion,
	pub strategy: Arc<dyn Strategy>,
	pub options: RestOptions,
	/// Verbs served; narrowed for status stores.
	pub verbs: CapabilitySet,
}

impl Store {
	pub fn namespace_scoped(&self) -> bool {
		self.strategy.namespace_scoped()
	}

	fn complete(self) -> Result<Self, ProviderError> {
		if self.options.resource_prefix.is_empty() {
			return Err(ProviderError::IncompleteStore {
				resource: self.group_resource,
				reason: "empty resource prefix".to_string(),
			});
		}
		if self.verbs.is_empty() {
			return Err(ProviderError::IncompleteStore {
				resource: self.group_resource,
				reason: "store serves no verbs".to_string(),
			});
		}
		Ok(self)
	}
}

impl Storage for Store {
	fn kind(&self) -> &str {
		&self.kind
	}

	fn capabilities(&self) -> CapabilitySet {
		self.verbs
	}
}

impl std::fmt::Debug for Store {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Store")
			.field("kind", &self.kind)
			.field("group_resource", &self.group_resource)
			.field("encoding_version", &self.encoding_version)
			.field("options", &self.options)
			.field("verbs", &self.verbs)
			.finish()
	}
}

const STORE_VERBS: CapabilitySet = CapabilitySet::CREATE
	.union(CapabilitySet::UPDATE)
	.union(CapabilitySet::GET)
	.union(CapabilitySet::LIST)
	.union(CapabilitySet::DELETE)
	.union(CapabilitySet::WATCH);

const STATUS_VERBS: CapabilitySet = CapabilitySet::GET.union(CapabilitySet::UPDATE);

fn store_provider(desc: &ResourceDescriptor, strategy: Arc<dyn Strategy>, verbs: CapabilitySet, store_fn: Option<StoreFn>) -> HandlerProvider {
	let kind = desc.kind.clone();
	let served = desc.gvr.group_version();
	let group_resource = desc.gvr.group_resource();

	Arc::new(move |scheme, getter| {
		let options = getter.rest_options(&group_resource)?;
		let encoding_version = scheme.preferred_version(&served.group).unwrap_or_else(|| served.clone());
		let mut store = Store {
			kind: kind.clone(),
			group_resource: group_resource.clone(),
			encoding_version,
			strategy: strategy.clone(),
			options,
			verbs,
		};
		if let Some(f) = &store_fn {
			f(&mut store);
		}
		let store = store.complete()?;
		Ok(Arc::new(store) as Handler)
	})
}

/// Store using the resource's [`DefaultStrategy`].
pub fn new(desc: &ResourceDescriptor) -> HandlerProvider {
	new_with_strategy(desc, Arc::new(DefaultStrategy::for_resource(desc)))
}

pub fn new_with_strategy(desc: &ResourceDescriptor, strategy: Arc<dyn Strategy>) -> HandlerProvider {
	store_provider(desc, strategy, STORE_VERBS, None)
}

/// Default store customized by `f` before completion.
pub fn new_with_fn(desc: &ResourceDescriptor, f: StoreFn) -> HandlerProvider {
	store_provider(desc, Arc::new(DefaultStrategy::for_resource(desc)), STORE_VERBS, Some(f))
}

/// Status store for `desc`, served under `desc.gvr`'s `status` sub-resource.
pub fn new_status(desc: &ResourceDescriptor) -> HandlerProvider {
	new_status_with_strategy(desc, Arc::new(DefaultStrategy::for_resource(desc)))
}

pub fn new_status_with_strategy(desc: &ResourceDescriptor, strategy: Arc<dyn Strategy>) -> HandlerProvider {
	store_provider(desc, Arc::new(StatusStrategy::new(strategy)), STATUS_VERBS, None)
}

pub fn new_status_with_fn(desc: &ResourceDescriptor, f: StoreFn) -> HandlerProvider {
	let strategy: Arc<dyn Strategy> = Arc::new(StatusStrategy::new(Arc::new(DefaultStrategy::for_resource(desc))));
	store_provider(desc, strategy, STATUS_VERBS, Some(f))
}
