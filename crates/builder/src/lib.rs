//! Declarative resource registration for aggregated API servers.
//!
//! An [`ApiServer`] collects resource types and their handlers, resolves every
//! group-version-resource to one shared handler per group-resource, ranks the versions of each
//! group, and reports every registration mistake at once when [`ApiServer::build`] runs.
//!
//! ```ignore
//! let mut server = ApiServer::new();
//! server.with_resource(&FlunderV1Alpha1::default()).with_resource(&FlunderV1Beta1::default());
//! server.build()?.execute(&args, &mut runner)?;
//! ```

pub mod command;
pub mod errors;
pub mod options;
pub mod provider;
pub mod registry;
pub mod rest;
pub mod scheme;
pub mod server;
pub mod versions;

#[cfg(test)]
pub(crate) mod test_fixtures;

pub use command::{Command, CommandError, InstallError, OptionsFn, PreparedServer, RunError, ServerDescription, ServerFn, ServerRunner};
pub use errors::{AggregateError, BuildError, ErrorSink, RegistrationError};
pub use options::{DefinitionsFn, OpenApiConfig, ServeArgs, ServerOptions};
pub use provider::{SharedResult, SingletonProvider};
pub use registry::{Binding, DuplicatePolicy, HandlerSource, Registry};
pub use rest::{HandlerProvider, ProviderError, RestOptions, RestOptionsGetter, StaticRestOptions, Store, StoreFn, Strategy};
pub use scheme::{Scheme, SchemeBuilder, SchemeError, SchemeInstaller, SharedScheme};
pub use server::ApiServer;
pub use versions::VersionCollector;
