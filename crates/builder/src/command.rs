//! The runnable artifact produced by [`crate::ApiServer::build`].

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::Arc;

use apiary_resource::{GroupVersion, GroupVersionResource, Handler};
use clap::Parser;
use indexmap::IndexMap;

use crate::errors::BuildError;
use crate::options::{OpenApiConfig, ServeArgs, ServerOptions};
use crate::provider::{SharedResult, SingletonProvider};
use crate::rest::{ProviderError, RestOptionsGetter};
use crate::scheme::SharedScheme;

/// Customizes resolved [`ServerOptions`] before the server is prepared.
pub type OptionsFn = Arc<dyn Fn(&mut ServerOptions) + Send + Sync>;

/// Customizes the [`PreparedServer`] before it is handed to the runner.
pub type ServerFn = Arc<dyn Fn(&mut PreparedServer) + Send + Sync>;

/// Boxed error returned by a [`ServerRunner`].
pub type RunError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
	#[error(transparent)]
	Args(#[from] clap::Error),
	#[error("reading config {}: {source}", path.display())]
	ConfigRead {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},
	#[error("parsing config: {0}")]
	ConfigParse(#[from] toml::de::Error),
	#[error("invalid server options: {}", .0.join("; "))]
	Options(Vec<String>),
	#[error(transparent)]
	Build(#[from] BuildError),
	#[error("server exited: {0}")]
	Run(RunError),
}

/// A served key's handler failed to construct.
#[derive(Debug, thiserror::Error)]
#[error("installing {resource}: {source}")]
pub struct InstallError {
	pub resource: GroupVersionResource,
	#[source]
	pub source: Arc<ProviderError>,
}

/// Immutable result of a successful build: the populated scheme and every served key.
#[derive(Clone)]
pub struct ServerDescription {
	scheme: SharedScheme,
	apis: Arc<IndexMap<GroupVersionResource, Arc<SingletonProvider>>>,
	group_versions: Arc<[GroupVersion]>,
	version_priorities: Arc<BTreeMap<String, Vec<String>>>,
	openapi: Option<OpenApiConfig>,
}

impl ServerDescription {
	pub(crate) fn new(
		scheme: SharedScheme,
		apis: IndexMap<GroupVersionResource, Arc<SingletonProvider>>,
		group_versions: Vec<GroupVersion>,
		version_priorities: BTreeMap<String, Vec<String>>,
		openapi: Option<OpenApiConfig>,
	) -> Self {
		Self {
			scheme,
			apis: Arc::new(apis),
			group_versions: group_versions.into(),
			version_priorities: Arc::new(version_priorities),
			openapi,
		}
	}

	pub fn scheme(&self) -> &SharedScheme {
		&self.scheme
	}

	/// Served keys in registration order.
	pub fn resources(&self) -> impl Iterator<Item = &GroupVersionResource> {
		self.apis.keys()
	}

	pub fn contains(&self, key: &GroupVersionResource) -> bool {
		self.apis.contains_key(key)
	}

	pub fn provider(&self, key: &GroupVersionResource) -> Option<&Arc<SingletonProvider>> {
		self.apis.get(key)
	}

	/// Resolves the handler serving `key`, constructing it on first use.
	pub fn handler(&self, key: &GroupVersionResource, options: &dyn RestOptionsGetter) -> Option<SharedResult> {
		let provider = self.apis.get(key)?;
		let scheme = self.scheme.read();
		Some(provider.get(&scheme, options))
	}

	/// Group versions in the order they were first registered.
	pub fn group_versions(&self) -> &[GroupVersion] {
		&self.group_versions
	}

	/// Versions per group, highest priority first.
	pub fn version_priorities(&self) -> &BTreeMap<String, Vec<String>> {
		&self.version_priorities
	}

	pub fn preferred_version(&self, group: &str) -> Option<GroupVersion> {
		let version = self.version_priorities.get(group)?.first()?;
		Some(GroupVersion::new(group, version.clone()))
	}

	pub fn openapi(&self) -> Option<&OpenApiConfig> {
		self.openapi.as_ref()
	}
}

impl std::fmt::Debug for ServerDescription {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ServerDescription")
			.field("resources", &self.apis.keys().collect::<Vec<_>>())
			.field("version_priorities", &self.version_priorities)
			.field("openapi", &self.openapi)
			.finish()
	}
}

/// A description paired with validated options, ready to serve.
#[derive(Clone)]
pub struct PreparedServer {
	pub description: ServerDescription,
	pub options: ServerOptions,
	pub rest_options: Arc<dyn RestOptionsGetter>,
}

impl PreparedServer {
	/// Constructs the handler of every served key, in registration order.
	///
	/// Keys that share a group-resource resolve to the same handler.
	pub fn install_apis(&self) -> Result<Vec<(GroupVersionResource, Handler)>, InstallError> {
		let scheme = self.description.scheme.read();
		self.description
			.apis
			.iter()
			.map(|(key, provider)| {
				provider
					.get(&scheme, self.rest_options.as_ref())
					.map(|handler| (key.clone(), handler))
					.map_err(|source| InstallError {
						resource: key.clone(),
						source,
					})
			})
			.collect()
	}
}

/// Runs a prepared server. The serving loop itself lives outside this crate.
pub trait ServerRunner {
	fn run(&mut self, server: PreparedServer) -> Result<(), RunError>;
}

#[derive(Parser, Debug)]
#[command(name = "apiserver")]
#[command(about = "Aggregated API server")]
struct ServeCommand {
	#[command(flatten)]
	args: ServeArgs,
}

/// Resolves options and hands a [`PreparedServer`] to a [`ServerRunner`].
pub struct Command {
	description: ServerDescription,
	options_fns: Vec<OptionsFn>,
	server_fns: Vec<ServerFn>,
}

impl Command {
	pub(crate) fn new(description: ServerDescription, options_fns: Vec<OptionsFn>, server_fns: Vec<ServerFn>) -> Self {
		Self {
			description,
			options_fns,
			server_fns,
		}
	}

	pub fn description(&self) -> &ServerDescription {
		&self.description
	}

	/// Applies option functions in registration order, validates, then applies server functions.
	pub fn prepare(&self, mut options: ServerOptions) -> Result<PreparedServer, CommandError> {
		for f in &self.options_fns {
			f(&mut options);
		}
		let problems = options.validate();
		if !problems.is_empty() {
			return Err(CommandError::Options(problems));
		}

		let mut server = PreparedServer {
			description: self.description.clone(),
			rest_options: Arc::new(options.rest_options()),
			options,
		};
		for f in &self.server_fns {
			f(&mut server);
		}
		Ok(server)
	}

	pub fn execute(&self, args: &ServeArgs, runner: &mut dyn ServerRunner) -> Result<(), CommandError> {
		let server = self.prepare(args.resolve()?)?;
		tracing::info!(
			bind_address = %server.options.bind_address,
			secure_port = server.options.secure_port,
			resources = server.description.apis.len(),
			"starting apiserver"
		);
		runner.run(server).map_err(CommandError::Run)
	}

	/// Parses `argv` (program name first) and executes.
	pub fn execute_from<I, T>(&self, argv: I, runner: &mut dyn ServerRunner) -> Result<(), CommandError>
	where
		I: IntoIterator<Item = T>,
		T: Into<OsString> + Clone,
	{
		let cmd = ServeCommand::try_parse_from(argv)?;
		self.execute(&cmd.args, runner)
	}
}

impl std::fmt::Debug for Command {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Command")
			.field("description", &self.description)
			.field("options_fns", &self.options_fns.len())
			.field("server_fns", &self.server_fns.len())
			.finish()
	}
}
