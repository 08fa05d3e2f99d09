//! Server options, layered from defaults, an optional TOML file, and command-line overrides.
//!
//! Builder option functions run last, in registration order, once the other layers are
//! resolved (see [`crate::Command::prepare`]).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::command::CommandError;
use crate::rest::StaticRestOptions;

/// Options the prepared server is started with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct ServerOptions {
	pub bind_address: String,
	pub secure_port: u16,
	pub etcd_servers: Vec<String>,
	/// Key prefix every resource's storage lives under.
	pub etcd_prefix: String,
	/// Start without a remote kubeconfig for delegated authentication.
	pub authentication_kubeconfig_optional: bool,
	/// Start without a remote kubeconfig for delegated authorization.
	pub authorization_kubeconfig_optional: bool,
}

impl Default for ServerOptions {
	fn default() -> Self {
		Self {
			bind_address: "0.0.0.0".to_string(),
			secure_port: 443,
			etcd_servers: vec!["http://127.0.0.1:2379".to_string()],
			etcd_prefix: "/registry".to_string(),
			authentication_kubeconfig_optional: false,
			authorization_kubeconfig_optional: false,
		}
	}
}

impl ServerOptions {
	pub fn from_toml_str(src: &str) -> Result<Self, CommandError> {
		toml::from_str(src).map_err(CommandError::ConfigParse)
	}

	pub fn load(path: &Path) -> Result<Self, CommandError> {
		let src = std::fs::read_to_string(path).map_err(|source| CommandError::ConfigRead {
			path: path.to_path_buf(),
			source,
		})?;
		Self::from_toml_str(&src)
	}

	/// Returns every problem found, empty if the options are usable.
	pub fn validate(&self) -> Vec<String> {
		let mut problems = Vec::new();
		if self.secure_port == 0 {
			problems.push("secure-port must be non-zero".to_string());
		}
		if self.etcd_servers.iter().all(|s| s.trim().is_empty()) {
			problems.push("at least one etcd server is required".to_string());
		}
		if self.etcd_prefix.trim_matches('/').is_empty() {
			problems.push("etcd-prefix must name a key prefix".to_string());
		}
		problems
	}

	/// Storage options derived from the etcd prefix.
	pub fn rest_options(&self) -> StaticRestOptions {
		StaticRestOptions {
			prefix: self.etcd_prefix.clone(),
			..StaticRestOptions::default()
		}
	}
}

/// Command-line overrides for [`ServerOptions`].
#[derive(Debug, Clone, Default, clap::Args)]
pub struct ServeArgs {
	/// TOML file with server options
	#[arg(long, value_name = "PATH")]
	pub config: Option<PathBuf>,

	/// Address to listen on
	#[arg(long, value_name = "ADDR")]
	pub bind_address: Option<String>,

	/// Port to serve HTTPS on
	#[arg(long, value_name = "PORT")]
	pub secure_port: Option<u16>,

	/// Comma-separated etcd server URLs
	#[arg(long, value_name = "URL", value_delimiter = ',')]
	pub etcd_servers: Vec<String>,

	/// Key prefix for stored resources
	#[arg(long, value_name = "PREFIX")]
	pub etcd_prefix: Option<String>,

	/// Tolerate a missing authentication kubeconfig
	#[arg(long)]
	pub authentication_kubeconfig_optional: bool,

	/// Tolerate a missing authorization kubeconfig
	#[arg(long)]
	pub authorization_kubeconfig_optional: bool,
}

impl ServeArgs {
	/// Resolves defaults, the `--config` file, then explicit flags.
	pub fn resolve(&self) -> Result<ServerOptions, CommandError> {
		let mut options = match &self.config {
			Some(path) => ServerOptions::load(path)?,
			None => ServerOptions::default(),
		};
		self.apply(&mut options);
		Ok(options)
	}

	fn apply(&self, options: &mut ServerOptions) {
		if let Some(addr) = &self.bind_address {
			options.bind_address = addr.clone();
		}
		if let Some(port) = self.secure_port {
			options.secure_port = port;
		}
		if !self.etcd_servers.is_empty() {
			options.etcd_servers = self.etcd_servers.clone();
		}
		if let Some(prefix) = &self.etcd_prefix {
			options.etcd_prefix = prefix.clone();
		}
		options.authentication_kubeconfig_optional |= self.authentication_kubeconfig_optional;
		options.authorization_kubeconfig_optional |= self.authorization_kubeconfig_optional;
	}
}

/// Produces OpenAPI definitions keyed by schema name.
pub type DefinitionsFn = Arc<dyn Fn() -> BTreeMap<String, serde_json::Value> + Send + Sync>;

/// OpenAPI metadata and definitions handed to the serving layer.
#[derive(Clone)]
pub struct OpenApiConfig {
	pub title: String,
	pub version: String,
	definitions: DefinitionsFn,
}

impl OpenApiConfig {
	pub fn new(title: impl Into<String>, version: impl Into<String>, definitions: DefinitionsFn) -> Self {
		Self {
			title: title.into(),
			version: version.into(),
			definitions,
		}
	}

	pub fn definitions(&self) -> BTreeMap<String, serde_json::Value> {
		(self.definitions)()
	}
}

impl std::fmt::Debug for OpenApiConfig {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("OpenApiConfig")
			.field("title", &self.title)
			.field("version", &self.version)
			.finish_non_exhaustive()
	}
}
