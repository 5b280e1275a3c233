//! Ordered lists of label renames

use crate::Label;
use std::{
	collections::{HashMap, HashSet},
	fmt::{self, Display},
};

/// An ordered list of `(source, target)` pairs, each meaning "rename class `source` to `target`".
///
/// A map that is about to be applied should rename every source at most once
/// and send no two sources to the same target.
/// Use [`LabelMap::repeated_target_filter`] to resolve repeated targets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelMap {
	/// The rename pairs in insertion order
	pairs: Vec<(Label, Label)>,
}

impl LabelMap {
	/// Create an empty label map
	#[must_use]
	pub const fn new() -> Self {
		Self { pairs: Vec::new() }
	}

	/// Append a rename pair
	pub fn push(&mut self, source: Label, target: Label) {
		self.pairs.push((source, target));
	}

	/// The rename pairs in insertion order
	#[must_use]
	pub fn pairs(&self) -> &[(Label, Label)] {
		&self.pairs
	}

	/// The number of rename pairs
	#[must_use]
	pub fn len(&self) -> usize {
		self.pairs.len()
	}

	/// Whether there are no rename pairs
	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.pairs.is_empty()
	}

	/// The source labels in insertion order
	pub fn sources(&self) -> impl Iterator<Item = Label> + '_ {
		self.pairs.iter().map(|&(source, _)| source)
	}

	/// The target labels in insertion order
	pub fn targets(&self) -> impl Iterator<Item = Label> + '_ {
		self.pairs.iter().map(|&(_, target)| target)
	}

	/// The largest target label, if any
	#[must_use]
	pub fn max_target(&self) -> Option<Label> {
		self.targets().max()
	}

	/// The first source label that appears more than once
	#[must_use]
	pub fn repeated_source(&self) -> Option<Label> {
		let mut seen = HashSet::new();
		self.sources().find(|&source| !seen.insert(source))
	}

	/// Whether two or more pairs share a target label
	#[must_use]
	pub fn has_repeated_targets(&self) -> bool {
		let mut seen = HashSet::new();
		!self.targets().all(|target| seen.insert(target))
	}

	/// Keep only the first pair for each distinct target label.
	///
	/// Surviving pairs keep their relative order.
	/// Majority-vote maps can pick the same target for several sources,
	/// which would merge classes if applied as is.
	#[must_use]
	pub fn repeated_target_filter(&self) -> Self {
		let mut seen = HashSet::new();
		self.pairs
			.iter()
			.copied()
			.filter(|&(_, target)| seen.insert(target))
			.collect()
	}

	/// A source -> target lookup table
	#[must_use]
	pub(crate) fn lookup(&self) -> HashMap<Label, Label> {
		self.pairs.iter().copied().collect()
	}
}

impl FromIterator<(Label, Label)> for LabelMap {
	fn from_iter<I: IntoIterator<Item = (Label, Label)>>(iter: I) -> Self {
		Self {
			pairs: iter.into_iter().collect(),
		}
	}
}

impl From<Vec<(Label, Label)>> for LabelMap {
	fn from(pairs: Vec<(Label, Label)>) -> Self {
		Self { pairs }
	}
}

impl Display for LabelMap {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "[")?;
		for (i, (source, target)) in self.into_iter().enumerate() {
			if i > 0 {
				write!(f, ", ")?;
			}
			write!(f, "{source} -> {target}")?;
		}
		write!(f, "]")
	}
}

impl<'a> IntoIterator for &'a LabelMap {
	type Item = (Label, Label);
	type IntoIter = std::iter::Copied<std::slice::Iter<'a, (Label, Label)>>;

	fn into_iter(self) -> Self::IntoIter {
		self.pairs.iter().copied()
	}
}
