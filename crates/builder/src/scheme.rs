//! Type registry the builder installs resource types, defaulting functions and version
//! priorities into.
//!
//! # Mental Model
//!
//! Registration calls never touch a [`Scheme`] directly. They push [`SchemeInstaller`]s onto a
//! [`SchemeBuilder`], and the build pass replays the installers, in registration order, against
//! every target scheme. Installer failures are fatal for the build.

use std::any::{Any, TypeId};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use apiary_resource::{DefaultingFn, GroupVersion, GroupVersionKind, ResourceDescriptor};
use parking_lot::RwLock;
use rustc_hash::FxHashMap as HashMap;

/// Kinds every served group version carries for list, watch and option handling.
pub const WELL_KNOWN_KINDS: &[&str] = &[
	"WatchEvent",
	"ListOptions",
	"GetOptions",
	"DeleteOptions",
	"CreateOptions",
	"UpdateOptions",
	"PatchOptions",
];

const META_TYPE_PREFIX: &str = "apiary::meta::";

/// A scheme shared between the builder and the serving layer.
pub type SharedScheme = Arc<RwLock<Scheme>>;

/// Fatal scheme installation errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemeError {
	/// A kind is already bound to a different type.
	#[error("scheme {scheme}: {gvk} is already registered to {existing}, cannot register {incoming}")]
	KindConflict {
		scheme: String,
		gvk: GroupVersionKind,
		existing: String,
		incoming: String,
	},
	#[error("scheme {scheme}: version priority needs at least one version")]
	EmptyVersionPriority { scheme: String },
	#[error("scheme {scheme}: version priority mixes groups {first:?} and {other:?}")]
	MixedGroups {
		scheme: String,
		first: String,
		other: String,
	},
	/// The group already carries a different priority order.
	#[error("scheme {scheme}: conflicting version priority for group {group:?}: {existing:?} vs {requested:?}")]
	ConflictingVersionPriority {
		scheme: String,
		group: String,
		existing: Vec<String>,
		requested: Vec<String>,
	},
	/// Raised by integrator-supplied installers.
	#[error("{0}")]
	Installer(String),
}

impl SchemeError {
	pub fn installer(msg: impl Into<String>) -> Self {
		Self::Installer(msg.into())
	}
}

/// Maps kinds to types, types to defaulting functions, and groups to version priority.
pub struct Scheme {
	name: String,
	known_types: BTreeMap<GroupVersionKind, String>,
	defaulters: HashMap<TypeId, DefaultingFn>,
	priorities: BTreeMap<String, Vec<String>>,
	group_versions: BTreeSet<GroupVersion>,
}

impl Scheme {
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			known_types: BTreeMap::new(),
			defaulters: HashMap::default(),
			priorities: BTreeMap::new(),
			group_versions: BTreeSet::new(),
		}
	}

	/// Wraps a new scheme for use as an additional build target.
	pub fn shared(name: impl Into<String>) -> SharedScheme {
		Arc::new(RwLock::new(Self::new(name)))
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	/// Binds `gvk` to `type_name`. Re-adding the same binding is a no-op.
	pub fn add_known_type(&mut self, gvk: GroupVersionKind, type_name: impl Into<String>) -> Result<(), SchemeError> {
		let type_name = type_name.into();
		match self.known_types.get(&gvk) {
			Some(existing) if *existing == type_name => Ok(()),
			Some(existing) => Err(SchemeError::KindConflict {
				scheme: self.name.clone(),
				gvk,
				existing: existing.clone(),
				incoming: type_name,
			}),
			None => {
				self.known_types.insert(gvk, type_name);
				Ok(())
			}
		}
	}

	pub fn recognizes(&self, gvk: &GroupVersionKind) -> bool {
		self.known_types.contains_key(gvk)
	}

	pub fn known_type(&self, gvk: &GroupVersionKind) -> Option<&str> {
		self.known_types.get(gvk).map(String::as_str)
	}

	/// Kinds registered for `gv`, in kind order.
	pub fn kinds_for(&self, gv: &GroupVersion) -> Vec<&str> {
		self.known_types
			.keys()
			.filter(|gvk| gvk.group == gv.group && gvk.version == gv.version)
			.map(|gvk| gvk.kind.as_str())
			.collect()
	}

	/// Sets the defaulting function for objects of type `type_id`, replacing any previous one.
	pub fn add_type_defaulting_fn(&mut self, type_id: TypeId, f: DefaultingFn) {
		self.defaulters.insert(type_id, f);
	}

	pub fn has_defaulter(&self, type_id: TypeId) -> bool {
		self.defaulters.contains_key(&type_id)
	}

	/// Applies the defaulting function registered for the object's type. Returns false if
	/// none is registered.
	pub fn default_object(&self, obj: &mut dyn Any) -> bool {
		let type_id = Any::type_id(&*obj);
		match self.defaulters.get(&type_id) {
			Some(f) => {
				f(obj);
				true
			}
			None => false,
		}
	}

	/// Declares the priority of the versions of one group, highest first.
	///
	/// Repeating an identical declaration is allowed; a different order for a group that
	/// already has one is an error.
	pub fn set_version_priority(&mut self, versions: &[GroupVersion]) -> Result<(), SchemeError> {
		let Some(first) = versions.first() else {
			return Err(SchemeError::EmptyVersionPriority {
				scheme: self.name.clone(),
			});
		};
		if let Some(other) = versions.iter().find(|gv| gv.group != first.group) {
			return Err(SchemeError::MixedGroups {
				scheme: self.name.clone(),
				first: first.group.clone(),
				other: other.group.clone(),
			});
		}

		let requested: Vec<String> = versions.iter().map(|gv| gv.version.clone()).collect();
		if let Some(existing) = self.priorities.get(&first.group) {
			if *existing == requested {
				return Ok(());
			}
			return Err(SchemeError::ConflictingVersionPriority {
				scheme: self.name.clone(),
				group: first.group.clone(),
				existing: existing.clone(),
				requested,
			});
		}
		self.priorities.insert(first.group.clone(), requested);
		Ok(())
	}

	/// Versions of `group` in priority order, highest first.
	pub fn prioritized_versions(&self, group: &str) -> Vec<GroupVersion> {
		self.priorities
			.get(group)
			.map(|versions| versions.iter().map(|v| GroupVersion::new(group, v.clone())).collect())
			.unwrap_or_default()
	}

	pub fn preferred_version(&self, group: &str) -> Option<GroupVersion> {
		self.priorities
			.get(group)
			.and_then(|versions| versions.first())
			.map(|v| GroupVersion::new(group, v.clone()))
	}

	/// Installs the [`WELL_KNOWN_KINDS`] into `gv`.
	pub fn add_to_group_version(&mut self, gv: &GroupVersion) -> Result<(), SchemeError> {
		for kind in WELL_KNOWN_KINDS {
			self.add_known_type(gv.with_kind(*kind), format!("{META_TYPE_PREFIX}{kind}"))?;
		}
		self.group_versions.insert(gv.clone());
		Ok(())
	}

	/// Group versions [`Scheme::add_to_group_version`] has been applied to.
	pub fn group_versions(&self) -> impl Iterator<Item = &GroupVersion> {
		self.group_versions.iter()
	}
}

impl std::fmt::Debug for Scheme {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Scheme")
			.field("name", &self.name)
			.field("known_types", &self.known_types.len())
			.field("defaulters", &self.defaulters.len())
			.field("priorities", &self.priorities)
			.finish()
	}
}

type InstallFn = dyn Fn(&mut Scheme) -> Result<(), SchemeError> + Send + Sync;

/// A deferred mutation of a [`Scheme`].
#[derive(Clone)]
pub struct SchemeInstaller(Arc<InstallFn>);

impl SchemeInstaller {
	pub fn new<F>(f: F) -> Self
	where
		F: Fn(&mut Scheme) -> Result<(), SchemeError> + Send + Sync + 'static,
	{
		Self(Arc::new(f))
	}

	pub fn install(&self, scheme: &mut Scheme) -> Result<(), SchemeError> {
		(self.0)(scheme)
	}
}

impl std::fmt::Debug for SchemeInstaller {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str("SchemeInstaller(..)")
	}
}

/// Ordered list of installers replayed against each target scheme.
#[derive(Debug, Clone, Default)]
pub struct SchemeBuilder {
	installers: Vec<SchemeInstaller>,
}

impl SchemeBuilder {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn push(&mut self, installer: SchemeInstaller) {
		self.installers.push(installer);
	}

	pub fn register<I: IntoIterator<Item = SchemeInstaller>>(&mut self, installers: I) {
		self.installers.extend(installers);
	}

	pub fn len(&self) -> usize {
		self.installers.len()
	}

	pub fn is_empty(&self) -> bool {
		self.installers.is_empty()
	}

	/// Runs every installer in registration order, stopping at the first failure.
	pub fn add_to_scheme(&self, scheme: &mut Scheme) -> Result<(), SchemeError> {
		self.installers.iter().try_for_each(|installer| installer.install(scheme))
	}
}

/// Registers a resource type and its list type under the resource's group version, and
/// under the internal version when it is the storage version.
pub fn resource_installer(desc: &ResourceDescriptor) -> SchemeInstaller {
	let type_name = desc.type_name;
	let known = [
		(desc.group_version_kind(), type_name.to_string()),
		(desc.list_group_version_kind(), format!("List<{type_name}>")),
	];
	let storage_version = desc.storage_version;

	SchemeInstaller::new(move |scheme| {
		for (gvk, name) in &known {
			scheme.add_known_type(gvk.clone(), name.clone())?;
			if storage_version {
				let internal = GroupVersion::internal(gvk.group.clone()).with_kind(gvk.kind.clone());
				scheme.add_known_type(internal, name.clone())?;
			}
		}
		Ok(())
	})
}

/// Declares the computed version priorities and installs the well-known kinds into every
/// observed group version.
pub fn priority_installer(priorities: BTreeMap<String, Vec<String>>, group_versions: Vec<GroupVersion>) -> SchemeInstaller {
	SchemeInstaller::new(move |scheme| {
		for (group, versions) in &priorities {
			let gvs: Vec<GroupVersion> = versions.iter().map(|v| GroupVersion::new(group.clone(), v.clone())).collect();
			scheme.set_version_priority(&gvs)?;
		}
		for gv in &group_versions {
			scheme.add_to_group_version(gv)?;
		}
		Ok(())
	})
}
