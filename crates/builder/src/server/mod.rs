//! Fluent builder describing an apiserver's resource set.
//!
//! # Mental Model
//!
//! [`ApiServer`] accumulates registrations, scheme installers, and option functions. Nothing
//! is constructed while registering: every resource is bound to a lazily evaluated
//! [`SingletonProvider`](crate::SingletonProvider) and every usage mistake is parked in an
//! [`ErrorSink`]. [`ApiServer::build`] replays the installers, reports the parked mistakes at
//! once, and hands back a [`Command`].
//!
//! # Invariants
//!
//! - Must share one provider between every version of a group-resource.
//!   - Enforced in: [`Registry`].
//!   - Tested by: `server::tests::versions_resolve_to_one_handler`.
//!   - Failure symptom: a v2 write is invisible to v1 readers.
//! - Must reuse an existing provider before looking at a registration's own handler.
//!   - Enforced in: [`ApiServer::with_resource`], [`Registry::bind_existing`].
//!   - Tested by: `server::tests::later_self_serving_version_reuses_provider`.
//!   - Failure symptom: a later self-serving version without storage fails the build.
//! - Must not stop the chain on a usage error; each one is reported by `build`.
//!   - Enforced in: [`ApiServer::with_subresource`], `ApiServer::admit`.
//!   - Tested by: `server::tests::every_usage_error_is_reported`.
//! - Must abort `build` on the first scheme installer failure, before usage errors.
//!   - Enforced in: [`ApiServer::build`].
//!   - Tested by: `server::tests::scheme_conflict_aborts_build`.
//!
//! Mutating after `build` is impossible: `build` consumes the builder.

use std::sync::Arc;

use apiary_resource::{CapabilitySet, GroupVersionResource, Resource, ResourceDescriptor, VersionOrder};

use crate::command::{Command, CommandError, OptionsFn, ServerDescription, ServerFn, ServerRunner};
use crate::errors::{BuildError, ErrorSink, RegistrationError};
use crate::options::{DefinitionsFn, OpenApiConfig, ServeArgs, ServerOptions};
use crate::registry::{DuplicatePolicy, HandlerSource, Registry};
use crate::rest::{self, HandlerProvider, StoreFn, Strategy};
use crate::scheme::{self, Scheme, SchemeBuilder, SchemeInstaller, SharedScheme};
use crate::versions::VersionCollector;

/// Name of the scheme every builder owns and serves from.
pub const BASE_SCHEME: &str = "apiserver";

/// Builder for an apiserver's resources, schemes, and options.
pub struct ApiServer {
	registry: Registry,
	versions: VersionCollector,
	errors: ErrorSink,
	scheme_builder: SchemeBuilder,
	scheme: SharedScheme,
	schemes: Vec<SharedScheme>,
	options_fns: Vec<OptionsFn>,
	server_fns: Vec<ServerFn>,
	openapi: Option<OpenApiConfig>,
	version_order: VersionOrder,
	duplicate_policy: DuplicatePolicy,
}

impl Default for ApiServer {
	fn default() -> Self {
		Self::new()
	}
}

impl ApiServer {
	pub fn new() -> Self {
		Self {
			registry: Registry::new(),
			versions: VersionCollector::new(),
			errors: ErrorSink::new(),
			scheme_builder: SchemeBuilder::new(),
			scheme: Scheme::shared(BASE_SCHEME),
			schemes: Vec::new(),
			options_fns: Vec::new(),
			server_fns: Vec::new(),
			openapi: None,
			version_order: VersionOrder::default(),
			duplicate_policy: DuplicatePolicy::default(),
		}
	}

	/// Registers `obj`'s type and serves it.
	///
	/// - A group-resource that is already served reuses its handler.
	/// - A type declaring any of [`CapabilitySet::SERVING`] is its own handler.
	/// - Otherwise a default store is created.
	///
	/// Types declaring [`CapabilitySet::STATUS`] also get a `status` sub-resource, except
	/// self-serving ones.
	pub fn with_resource<R: Resource>(&mut self, obj: &R) -> &mut Self {
		let Some(desc) = self.admit(obj) else {
			return self;
		};
		let key = desc.gvr.clone();

		if desc.capabilities.is_self_serving() {
			if self.registry.bind_existing(&key, &desc).is_some() {
				return self;
			}
			let Some(handler) = desc.self_storage.clone() else {
				self.errors.record(RegistrationError::MissingSelfStorage { resource: key });
				return self;
			};
			self.registry
				.register_with_existing_strategy(key, &desc, HandlerSource::Handler(handler));
			return self;
		}

		self.registry.register_primary(key.clone(), &desc, rest::new(&desc));
		if desc.capabilities.contains(CapabilitySet::STATUS) {
			self.registry
				.register_status_subresource(&key, &desc, || rest::new_status(&desc));
		}
		self
	}

	/// Serves `obj` from a default store driven by `strategy`. A `status` sub-resource uses the
	/// same strategy.
	pub fn with_resource_and_strategy<R: Resource>(&mut self, obj: &R, strategy: Arc<dyn Strategy>) -> &mut Self {
		let Some(desc) = self.admit(obj) else {
			return self;
		};
		let key = desc.gvr.clone();
		self.check_duplicate(&key);

		self.registry
			.register_with_existing_strategy(key.clone(), &desc, HandlerSource::Strategy(strategy.clone()));
		if desc.capabilities.contains(CapabilitySet::STATUS) && desc.self_storage.is_none() {
			self.registry
				.register_status_subresource(&key, &desc, || rest::new_status_with_strategy(&desc, strategy));
		}
		self
	}

	/// Serves `obj` from `provider`. No `status` sub-resource is registered.
	pub fn with_resource_and_handler<R: Resource>(&mut self, obj: &R, provider: HandlerProvider) -> &mut Self {
		let Some(desc) = self.admit(obj) else {
			return self;
		};
		let key = desc.gvr.clone();
		self.check_duplicate(&key);
		self.registry.register_primary(key, &desc, provider);
		self
	}

	/// Serves `obj` from a default store that `store_fn` customizes before completion.
	pub fn with_resource_and_storage<R: Resource>(&mut self, obj: &R, store_fn: StoreFn) -> &mut Self {
		let Some(desc) = self.admit(obj) else {
			return self;
		};
		let key = desc.gvr.clone();
		self.check_duplicate(&key);

		self.registry
			.register_primary(key.clone(), &desc, rest::new_with_fn(&desc, store_fn.clone()));
		if desc.capabilities.contains(CapabilitySet::STATUS) {
			self.registry
				.register_status_subresource(&key, &desc, || rest::new_status_with_fn(&desc, store_fn));
		}
		self
	}

	/// Binds `parent`'s sub-resource at `path` to the provider an earlier registration created.
	///
	/// Neither type is added to the scheme.
	pub fn with_subresource<P: Resource, Q: Resource>(&mut self, parent: &P, path: &str, request: &Q) -> &mut Self {
		let parent_key = parent.group_version_resource();
		let desc = ResourceDescriptor::of(request);
		self.bind_subresource(&parent_key, path, &desc, None);
		self
	}

	/// Like [`ApiServer::with_subresource`], creating a store driven by `strategy` if needed.
	///
	/// The store keeps `request`'s objects under `request`'s own group-resource prefix.
	pub fn with_subresource_and_strategy<P: Resource, Q: Resource>(
		&mut self,
		parent: &P,
		path: &str,
		request: &Q,
		strategy: Arc<dyn Strategy>,
	) -> &mut Self {
		let parent_key = parent.group_version_resource();
		let desc = ResourceDescriptor::of(request);
		let provider = rest::new_with_strategy(&desc, strategy);
		self.check_duplicate(&parent_key.subresource(path));
		self.bind_subresource(&parent_key, path, &desc, Some(provider));
		self
	}

	/// Like [`ApiServer::with_subresource`], creating the binding from `provider` if needed.
	pub fn with_subresource_and_handler<P: Resource, Q: Resource>(
		&mut self,
		parent: &P,
		path: &str,
		request: &Q,
		provider: HandlerProvider,
	) -> &mut Self {
		let parent_key = parent.group_version_resource();
		let desc = ResourceDescriptor::of(request);
		self.check_duplicate(&parent_key.subresource(path));
		self.bind_subresource(&parent_key, path, &desc, Some(provider));
		self
	}

	/// Adds installers run against every target scheme, after the resource installers
	/// registered so far.
	pub fn with_additional_scheme_installers<I: IntoIterator<Item = SchemeInstaller>>(&mut self, installers: I) -> &mut Self {
		self.scheme_builder.register(installers);
		self
	}

	/// Adds schemes that receive every installer alongside the base scheme.
	pub fn with_additional_schemes_to_build<I: IntoIterator<Item = SharedScheme>>(&mut self, schemes: I) -> &mut Self {
		self.schemes.extend(schemes);
		self
	}

	/// Attaches OpenAPI metadata and definitions to the built description.
	pub fn with_openapi_definitions(
		&mut self,
		title: impl Into<String>,
		version: impl Into<String>,
		definitions: DefinitionsFn,
	) -> &mut Self {
		self.openapi = Some(OpenApiConfig::new(title, version, definitions));
		self
	}

	/// Lets the server start without remote kubeconfigs for delegated authn and authz.
	pub fn disable_delegate_auth(&mut self) -> &mut Self {
		self.options_fns.push(Arc::new(|options: &mut ServerOptions| {
			options.authentication_kubeconfig_optional = true;
			options.authorization_kubeconfig_optional = true;
		}));
		self
	}

	pub fn with_options_fns<I: IntoIterator<Item = OptionsFn>>(&mut self, fns: I) -> &mut Self {
		self.options_fns.extend(fns);
		self
	}

	pub fn with_server_fns<I: IntoIterator<Item = ServerFn>>(&mut self, fns: I) -> &mut Self {
		self.server_fns.extend(fns);
		self
	}

	pub fn with_version_order(&mut self, order: VersionOrder) -> &mut Self {
		self.version_order = order;
		self
	}

	pub fn with_duplicate_policy(&mut self, policy: DuplicatePolicy) -> &mut Self {
		self.duplicate_policy = policy;
		self
	}

	/// The scheme the built server serves from.
	pub fn scheme(&self) -> &SharedScheme {
		&self.scheme
	}

	pub fn registry(&self) -> &Registry {
		&self.registry
	}

	/// Usage errors recorded so far.
	pub fn errors(&self) -> &ErrorSink {
		&self.errors
	}

	/// Builds the resource description for `obj`, registers its type, and records its group
	/// version. Returns `None` after recording an error if the key is unusable.
	fn admit<R: Resource>(&mut self, obj: &R) -> Option<ResourceDescriptor> {
		let desc = ResourceDescriptor::of(obj);
		if let Some(reason) = key_problem(&desc.gvr) {
			self.errors.record(RegistrationError::InvalidResourceKey {
				resource: desc.gvr,
				reason,
			});
			return None;
		}
		self.scheme_builder.push(scheme::resource_installer(&desc));
		self.versions.observe(desc.gvr.group_version());
		Some(desc)
	}

	fn bind_subresource(
		&mut self,
		parent: &GroupVersionResource,
		path: &str,
		desc: &ResourceDescriptor,
		provider: Option<HandlerProvider>,
	) {
		if let Some(reason) = key_problem(parent) {
			self.errors.record(RegistrationError::InvalidResourceKey {
				resource: parent.clone(),
				reason,
			});
			return;
		}
		match self.registry.register_subresource(parent, path, desc, provider) {
			Ok(_) => {
				self.versions.observe(parent.group_version());
			}
			Err(err) => self.errors.record(err),
		}
	}

	/// Records a conflict for an explicit registration of an already served group-resource.
	fn check_duplicate(&mut self, key: &GroupVersionResource) {
		let group_resource = key.group_resource();
		if !self.registry.is_registered(&group_resource) {
			return;
		}
		match self.duplicate_policy {
			DuplicatePolicy::FirstWins => {
				tracing::debug!(resource = %key, "ignoring handler for already served resource");
			}
			DuplicatePolicy::Reject => self.errors.record(RegistrationError::ConflictingRegistration {
				resource: key.clone(),
				group_resource,
			}),
		}
	}

	/// Installs everything into the target schemes and produces the runnable command.
	///
	/// Scheme installer failures abort immediately. Usage errors recorded during
	/// registration are returned together afterwards.
	pub fn build(mut self) -> Result<Command, BuildError> {
		self.schemes.push(self.scheme.clone());

		let priorities = self.versions.compute_priorities(self.version_order);
		let group_versions: Vec<_> = self.versions.ordered().cloned().collect();
		self.scheme_builder.push(self.registry.defaulting_installer());
		self.scheme_builder
			.push(scheme::priority_installer(priorities.clone(), group_versions.clone()));

		for target in &self.schemes {
			let mut target = target.write();
			self.scheme_builder
				.add_to_scheme(&mut target)
				.map_err(|source| BuildError::Scheme {
					scheme: target.name().to_string(),
					source,
				})?;
		}

		if let Some(errors) = self.errors.drain() {
			tracing::warn!(count = errors.len(), "registration errors abort the build");
			return Err(errors.into());
		}

		tracing::info!(
			resources = self.registry.len(),
			handlers = self.registry.provider_count(),
			group_versions = group_versions.len(),
			schemes = self.schemes.len(),
			"built apiserver"
		);

		let description = ServerDescription::new(
			self.scheme,
			self.registry.into_bindings(),
			group_versions,
			priorities,
			self.openapi,
		);
		Ok(Command::new(description, self.options_fns, self.server_fns))
	}

	/// Builds, then executes the command with `args`.
	pub fn execute(self, args: &ServeArgs, runner: &mut dyn ServerRunner) -> Result<(), CommandError> {
		self.build()?.execute(args, runner)
	}
}

impl std::fmt::Debug for ApiServer {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ApiServer")
			.field("registry", &self.registry)
			.field("versions", &self.versions)
			.field("errors", &self.errors)
			.field("installers", &self.scheme_builder.len())
			.field("schemes", &self.schemes.len())
			.field("options_fns", &self.options_fns.len())
			.field("server_fns", &self.server_fns.len())
			.field("version_order", &self.version_order)
			.field("duplicate_policy", &self.duplicate_policy)
			.finish()
	}
}

fn key_problem(gvr: &GroupVersionResource) -> Option<&'static str> {
	if gvr.version.is_empty() {
		Some("empty version")
	} else if gvr.resource.is_empty() {
		Some("empty resource name")
	} else if gvr.resource.starts_with('/') || gvr.resource.ends_with('/') || gvr.resource.contains("//") {
		Some("malformed resource path")
	} else {
		None
	}
}

#[cfg(test)]
mod tests;
