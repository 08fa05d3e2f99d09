use apiary_resource::{GroupResource, GroupVersionResource};

use crate::scheme::SchemeError;

/// Usage errors recorded during registration and reported together at build time.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistrationError {
	#[error("subresources must be registered with a strategy or handler the first time they are registered: {resource}")]
	SubResourceWithoutProvider { resource: GroupVersionResource },
	#[error("invalid subresource path {path:?} under {parent}")]
	InvalidSubResourcePath { parent: GroupVersionResource, path: String },
	#[error("invalid resource key {resource}: {reason}")]
	InvalidResourceKey {
		resource: GroupVersionResource,
		reason: &'static str,
	},
	#[error("{resource} declares serving capabilities but provides no storage")]
	MissingSelfStorage { resource: GroupVersionResource },
	/// An explicit handler was supplied for a group-resource that already has one.
	#[error("{resource} supplies a handler but {group_resource} is already served by an earlier registration")]
	ConflictingRegistration {
		resource: GroupVersionResource,
		group_resource: GroupResource,
	},
}

/// Every deferred registration error of one build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateError {
	errors: Vec<RegistrationError>,
}

impl AggregateError {
	pub fn errors(&self) -> &[RegistrationError] {
		&self.errors
	}

	pub fn len(&self) -> usize {
		self.errors.len()
	}

	pub fn is_empty(&self) -> bool {
		self.errors.is_empty()
	}
}

impl std::fmt::Display for AggregateError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{} errors: ", self.errors.len())?;
		for err in &self.errors {
			write!(f, "\n{err}")?;
		}
		Ok(())
	}
}

impl std::error::Error for AggregateError {}

/// Append-only error list read once at the end of the build.
#[derive(Debug, Default)]
pub struct ErrorSink {
	errors: Vec<RegistrationError>,
}

impl ErrorSink {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn record(&mut self, err: RegistrationError) {
		tracing::debug!(error = %err, "deferred registration error");
		self.errors.push(err);
	}

	pub fn has_errors(&self) -> bool {
		!self.errors.is_empty()
	}

	pub fn len(&self) -> usize {
		self.errors.len()
	}

	pub fn is_empty(&self) -> bool {
		self.errors.is_empty()
	}

	/// Takes all recorded errors, in recording order, as one aggregate.
	pub fn drain(&mut self) -> Option<AggregateError> {
		if self.errors.is_empty() {
			return None;
		}
		Some(AggregateError {
			errors: std::mem::take(&mut self.errors),
		})
	}
}

/// Why [`crate::ApiServer::build`] produced no command.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
	/// An installer failed against a target scheme. Aborts the build before deferred errors
	/// are considered.
	#[error("installing scheme {scheme}: {source}")]
	Scheme {
		scheme: String,
		#[source]
		source: SchemeError,
	},
	#[error(transparent)]
	Registration(#[from] AggregateError),
}
