use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// Total order used to rank the versions of one group, highest priority first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VersionOrder {
	/// Plain string order.
	#[default]
	Lexical,
	/// GA before beta before alpha, higher numbers first, then non-conforming versions in
	/// string order. See [`compare_kube_aware`].
	KubeAware,
}

impl VersionOrder {
	pub fn compare(self, a: &str, b: &str) -> Ordering {
		match self {
			Self::Lexical => a.cmp(b),
			Self::KubeAware => compare_kube_aware(a, b),
		}
	}

	/// Sorts `versions` highest priority first.
	pub fn sort<S: AsRef<str>>(self, versions: &mut [S]) {
		versions.sort_by(|a, b| self.compare(a.as_ref(), b.as_ref()));
	}
}

impl std::str::FromStr for VersionOrder {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"lexical" => Ok(Self::Lexical),
			"kube-aware" => Ok(Self::KubeAware),
			other => Err(format!("unknown version order {other:?}, expected \"lexical\" or \"kube-aware\"")),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Track {
	Ga,
	Beta,
	Alpha,
}

fn parse_kube_version(v: &str) -> Option<(u64, Track, u64)> {
	let rest = v.strip_prefix('v')?;
	let digits = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
	if digits == 0 {
		return None;
	}
	let major = rest[..digits].parse().ok()?;
	let tail = &rest[digits..];
	if tail.is_empty() {
		return Some((major, Track::Ga, 0));
	}

	let (track, minor) = if let Some(minor) = tail.strip_prefix("beta") {
		(Track::Beta, minor)
	} else if let Some(minor) = tail.strip_prefix("alpha") {
		(Track::Alpha, minor)
	} else {
		return None;
	};
	if minor.is_empty() || !minor.bytes().all(|b| b.is_ascii_digit()) {
		return None;
	}
	Some((major, track, minor.parse().ok()?))
}

/// Compares two version strings by Kubernetes-style priority.
///
/// `Less` means `a` is preferred: `v2 < v1 < v1beta2 < v1beta1 < v1alpha1 < bar < foo`.
/// Ties between distinct spellings of the same version (`v1` / `v01`) fall back to string
/// order so the result is total.
pub fn compare_kube_aware(a: &str, b: &str) -> Ordering {
	match (parse_kube_version(a), parse_kube_version(b)) {
		(Some((major_a, track_a, minor_a)), Some((major_b, track_b, minor_b))) => track_a
			.cmp(&track_b)
			.then_with(|| major_b.cmp(&major_a))
			.then_with(|| minor_b.cmp(&minor_a))
			.then_with(|| a.cmp(b)),
		(Some(_), None) => Ordering::Less,
		(None, Some(_)) => Ordering::Greater,
		(None, None) => a.cmp(b),
	}
}
