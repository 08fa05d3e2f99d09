//! Tracks the group versions that received bindings and ranks them per group.

use std::collections::{BTreeMap, BTreeSet};

use apiary_resource::{GroupVersion, VersionOrder};
use indexmap::IndexSet;

/// Group versions in first-seen order plus the per-group version sets they induce.
#[derive(Debug, Clone, Default)]
pub struct VersionCollector {
	ordered: IndexSet<GroupVersion>,
	by_group: BTreeMap<String, BTreeSet<String>>,
}

impl VersionCollector {
	pub fn new() -> Self {
		Self::default()
	}

	/// Records `gv`. Returns false if it was already observed.
	pub fn observe(&mut self, gv: GroupVersion) -> bool {
		if self.ordered.contains(&gv) {
			return false;
		}
		self.by_group.entry(gv.group.clone()).or_default().insert(gv.version.clone());
		self.ordered.insert(gv);
		true
	}

	/// Observed group versions in first-seen order.
	pub fn ordered(&self) -> impl Iterator<Item = &GroupVersion> {
		self.ordered.iter()
	}

	pub fn len(&self) -> usize {
		self.ordered.len()
	}

	pub fn is_empty(&self) -> bool {
		self.ordered.is_empty()
	}

	/// Ranks each group's versions by `order`, highest priority first.
	///
	/// Depends only on the set of observed pairs, never on observation order.
	pub fn compute_priorities(&self, order: VersionOrder) -> BTreeMap<String, Vec<String>> {
		self.by_group
			.iter()
			.map(|(group, versions)| {
				let mut ranked: Vec<String> = versions.iter().cloned().collect();
				order.sort(&mut ranked);
				(group.clone(), ranked)
			})
			.collect()
	}
}
