//! Resolves registrations into handler bindings.
//!
//! # Mental Model
//!
//! Every binding is keyed by a full [`GroupVersionResource`], but handlers are owned per
//! [`GroupResource`]. The first registration of a group-resource creates its
//! [`SingletonProvider`]; every later registration of any version of it, with or without a
//! factory of its own, is bound to that same provider.
//!
//! # Invariants
//!
//! - Must bind every accepted key.
//! - Must never replace the provider of a group-resource (first registration wins).
//!   - Enforced in: [`Registry::bind_existing`].
//!   - Tested by: `registry::tests::second_factory_is_ignored`.
//!   - Failure symptom: two versions serve from different stores.
//! - Sub-resource keys take part in the same rule; no parent needs to be bound first.

use std::any::TypeId;
use std::sync::Arc;

use apiary_resource::{DefaultingFn, GroupResource, GroupVersionResource, Handler, ResourceDescriptor};
use indexmap::IndexMap;
use rustc_hash::FxHashMap as HashMap;

use crate::errors::RegistrationError;
use crate::provider::SingletonProvider;
use crate::rest::{self, HandlerProvider, Strategy};
use crate::scheme::SchemeInstaller;

/// Path of the automatically registered status sub-resource.
pub const STATUS_SUBRESOURCE: &str = "status";

/// How a registration that supplies its own handler treats an already served group-resource.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DuplicatePolicy {
	/// Keep the first provider and silently bind the new key to it.
	#[default]
	FirstWins,
	/// Keep the first provider and record a deferred error for the new registration.
	Reject,
}

/// Outcome of binding one key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Binding {
	/// A new provider was created for the group-resource.
	Created,
	/// The group-resource's existing provider was bound.
	Reused,
}

/// Handler source for [`Registry::register_with_existing_strategy`].
pub enum HandlerSource {
	/// A ready-made handler.
	Handler(Handler),
	/// Strategy for a default store.
	Strategy(Arc<dyn Strategy>),
}

/// Group-resource providers and the key bindings that point at them.
#[derive(Debug, Default)]
pub struct Registry {
	storage: HashMap<GroupResource, Arc<SingletonProvider>>,
	apis: IndexMap<GroupVersionResource, Arc<SingletonProvider>>,
	defaulters: IndexMap<TypeId, DefaultingFnEntry>,
}

#[derive(Clone)]
struct DefaultingFnEntry(DefaultingFn);

impl std::fmt::Debug for DefaultingFnEntry {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str("DefaultingFn(..)")
	}
}

impl Registry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Binds `key` to its group-resource's provider, creating it from `factory` if none exists.
	pub fn register_primary(&mut self, key: GroupVersionResource, desc: &ResourceDescriptor, factory: HandlerProvider) -> Binding {
		match self.bind_existing(&key, desc) {
			Some(binding) => binding,
			None => self.create(key, desc, factory),
		}
	}

	/// Like [`Registry::register_primary`] for callers holding a handler or a strategy.
	///
	/// A descriptor that declares serving capabilities and carries self storage is its own
	/// handler and wins over `source`. `source` is only turned into a provider when one has
	/// to be created.
	pub fn register_with_existing_strategy(
		&mut self,
		key: GroupVersionResource,
		desc: &ResourceDescriptor,
		source: HandlerSource,
	) -> Binding {
		if let Some(binding) = self.bind_existing(&key, desc) {
			return binding;
		}
		let factory = match (desc.self_storage.clone(), source) {
			(Some(handler), _) | (None, HandlerSource::Handler(handler)) => rest::static_handler(handler),
			(None, HandlerSource::Strategy(strategy)) => rest::new_with_strategy(desc, strategy),
		};
		self.create(key, desc, factory)
	}

	/// Binds `parent`'s sub-resource at `path`.
	///
	/// An existing provider is always reused and `factory` ignored. The first registration of
	/// a sub-resource must supply a factory.
	pub fn register_subresource(
		&mut self,
		parent: &GroupVersionResource,
		path: &str,
		desc: &ResourceDescriptor,
		factory: Option<HandlerProvider>,
	) -> Result<Binding, RegistrationError> {
		if path.is_empty() || path.contains('/') {
			return Err(RegistrationError::InvalidSubResourcePath {
				parent: parent.clone(),
				path: path.to_string(),
			});
		}

		let key = parent.subresource(path);
		if let Some(binding) = self.bind_existing(&key, desc) {
			return Ok(binding);
		}
		match factory {
			Some(factory) => Ok(self.create(key, desc, factory)),
			None => Err(RegistrationError::SubResourceWithoutProvider { resource: key }),
		}
	}

	/// Binds `parent`'s `status` sub-resource. `make_factory` only runs if no provider exists.
	pub fn register_status_subresource(
		&mut self,
		parent: &GroupVersionResource,
		desc: &ResourceDescriptor,
		make_factory: impl FnOnce() -> HandlerProvider,
	) -> Binding {
		let key = parent.subresource(STATUS_SUBRESOURCE);
		match self.bind_existing(&key, desc) {
			Some(binding) => binding,
			None => self.create(key, desc, make_factory()),
		}
	}

	/// Binds `key` to its group-resource's existing provider. Returns `None`, binding nothing,
	/// if no provider exists yet.
	pub fn bind_existing(&mut self, key: &GroupVersionResource, desc: &ResourceDescriptor) -> Option<Binding> {
		let provider = self.storage.get(&key.group_resource())?.clone();
		tracing::debug!(resource = %key, "reusing handler provider");
		self.bind(key.clone(), desc, provider);
		Some(Binding::Reused)
	}

	fn create(&mut self, key: GroupVersionResource, desc: &ResourceDescriptor, factory: HandlerProvider) -> Binding {
		let group_resource = key.group_resource();
		let provider = Arc::new(SingletonProvider::new(group_resource.clone(), factory));
		self.storage.insert(group_resource, provider.clone());
		tracing::debug!(resource = %key, "created handler provider");
		self.bind(key, desc, provider);
		Binding::Created
	}

	fn bind(&mut self, key: GroupVersionResource, desc: &ResourceDescriptor, provider: Arc<SingletonProvider>) {
		if let Some(defaulter) = &desc.defaulter {
			self.defaulters
				.entry(desc.type_id)
				.or_insert_with(|| DefaultingFnEntry(defaulter.clone()));
		}
		self.apis.insert(key, provider);
	}

	/// Returns true if any version of `group_resource` is bound.
	pub fn is_registered(&self, group_resource: &GroupResource) -> bool {
		self.storage.contains_key(group_resource)
	}

	pub fn provider(&self, key: &GroupVersionResource) -> Option<&Arc<SingletonProvider>> {
		self.apis.get(key)
	}

	/// Bindings in registration order.
	pub fn bindings(&self) -> impl Iterator<Item = (&GroupVersionResource, &Arc<SingletonProvider>)> {
		self.apis.iter()
	}

	/// Number of bound keys.
	pub fn len(&self) -> usize {
		self.apis.len()
	}

	pub fn is_empty(&self) -> bool {
		self.apis.is_empty()
	}

	/// Number of distinct providers.
	pub fn provider_count(&self) -> usize {
		self.storage.len()
	}

	/// Installer adding the defaulting function of every bound type that declares defaults.
	pub fn defaulting_installer(&self) -> SchemeInstaller {
		let defaulters: Vec<(TypeId, DefaultingFn)> = self.defaulters.iter().map(|(id, entry)| (*id, entry.0.clone())).collect();
		SchemeInstaller::new(move |scheme| {
			for (type_id, defaulter) in &defaulters {
				scheme.add_type_defaulting_fn(*type_id, defaulter.clone());
			}
			Ok(())
		})
	}

	pub fn into_bindings(self) -> IndexMap<GroupVersionResource, Arc<SingletonProvider>> {
		self.apis
	}
}
