//! Computes and applies label permutations for a single partition

use crate::{Coord, Label, LabelMap, Partition, RelabelError};
use log::{debug, warn};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// A grid position whose class should be renamed to `target`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Anchor {
	/// Position in the grid
	pub coord: Coord,
	/// The label the class at `coord` should end up with
	pub target: Label,
}

impl Anchor {
	/// Create an anchor renaming the class at `coord` to `target`
	#[must_use]
	pub const fn new(coord: Coord, target: Label) -> Self {
		Self { coord, target }
	}
}

/// Result of [`ClusterLabels::overlap_refine`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Refinement {
	/// The contained map was applied
	Applied(LabelMap),
	/// Every unprotected class already matches its plurality reference label
	Unchanged,
	/// The proposed map would rename a class onto a protected label, so nothing was changed
	Rejected {
		/// The first protected target in the proposed map
		target: Label,
	},
}

/// Owns one [`Partition`] and renames its label classes in place.
///
/// Every operation is a pure renaming of classes:
/// the number of distinct labels and the grouping of cells never change.
/// Labels fixed by applied maps are kept in a do-not-change set,
/// which overlap refinement and consecutive compression leave alone.
#[derive(Debug, Clone)]
pub struct ClusterLabels {
	/// The partition being relabeled
	partition: Partition,
	/// Distinct labels currently in the partition
	labels: BTreeSet<Label>,
	/// Labels fixed by earlier maps
	do_not_change: BTreeSet<Label>,
	/// Whether to compress labels after every applied map
	make_consecutive: bool,
	/// Minimum width of the consecutive label range
	target_label_count: Option<usize>,
}

impl ClusterLabels {
	/// Wrap a partition
	#[must_use]
	pub fn new(partition: Partition) -> Self {
		let labels = partition.distinct_labels();
		Self {
			partition,
			labels,
			do_not_change: BTreeSet::new(),
			make_consecutive: false,
			target_label_count: None,
		}
	}

	/// Compress labels into a consecutive range after every applied map.
	///
	/// `target_label_count` reserves a range at least this wide,
	/// e.g. to match a reference partition with more classes.
	#[must_use]
	pub const fn with_consecutive(mut self, target_label_count: Option<usize>) -> Self {
		self.make_consecutive = true;
		self.target_label_count = target_label_count;
		self
	}

	/// The current partition
	#[must_use]
	pub const fn partition(&self) -> &Partition {
		&self.partition
	}

	/// Consume the engine, returning the current partition
	#[must_use]
	pub fn into_partition(self) -> Partition {
		self.partition
	}

	/// The distinct labels in ascending order
	#[must_use]
	pub const fn labels(&self) -> &BTreeSet<Label> {
		&self.labels
	}

	/// The number of distinct labels
	#[must_use]
	pub fn label_count(&self) -> usize {
		self.labels.len()
	}

	/// Labels that overlap refinement and compression will not rename
	#[must_use]
	pub const fn do_not_change(&self) -> &BTreeSet<Label> {
		&self.do_not_change
	}

	/// Replace the partition and refresh the label set
	fn set_partition(&mut self, partition: Partition) {
		self.labels = partition.distinct_labels();
		self.partition = partition;
	}

	/// Build a label map sending the class under each anchor to the anchor's target.
	///
	/// Anchors are considered in order.
	/// An anchor is skipped if its source label or its target was already used by an earlier anchor.
	///
	/// # Errors
	/// Returns [`RelabelError::CoordinateOutOfBounds`] if an anchor lies outside the grid.
	pub fn label_map(&self, anchors: &[Anchor]) -> Result<LabelMap, RelabelError> {
		let mut label_map = LabelMap::new();
		let mut mapped_sources = HashSet::new();
		let mut mapped_targets = HashSet::new();

		for anchor in anchors {
			let source = self.partition.label_at(anchor.coord)?;
			if !mapped_sources.contains(&source) && !mapped_targets.contains(&anchor.target) {
				mapped_sources.insert(source);
				mapped_targets.insert(anchor.target);
				label_map.push(source, anchor.target);
			}
		}

		Ok(label_map)
	}

	/// Rename classes according to `label_map`.
	///
	/// Repeated targets are dropped first, keeping the earliest pair for each target.
	/// A class whose label is claimed by a target (and is not itself renamed) is moved to a fresh
	/// overflow label above every existing label and target, so no two classes are merged.
	/// Every cell is written exactly once from a precomputed lookup table.
	///
	/// The applied targets are added to the do-not-change set.
	/// If configured with [`ClusterLabels::with_consecutive`], labels are compressed afterwards.
	///
	/// # Errors
	/// Returns [`RelabelError::DuplicateSource`] if a label is renamed more than once,
	/// [`RelabelError::LabelOverflow`] if a displaced class has no larger label left to move to,
	/// or [`RelabelError::LabelCountChanged`] if the rename merged or split classes.
	pub fn apply_map(&mut self, label_map: &LabelMap) -> Result<(), RelabelError> {
		let label_map = label_map.repeated_target_filter();
		if let Some(source) = label_map.repeated_source() {
			return Err(RelabelError::DuplicateSource(source));
		}

		let before = self.labels.len();
		let sources = label_map.sources().collect::<HashSet<_>>();

		let mut next_overflow = self
			.labels
			.last()
			.copied()
			.into_iter()
			.chain(label_map.max_target())
			.max()
			.map_or(Some(0), |max| max.checked_add(1));

		let mut lookup = HashMap::new();

		// targets are distinct, so each displaced class gets its own overflow label
		for target in label_map.targets() {
			if self.labels.contains(&target) && !sources.contains(&target) {
				let overflow = next_overflow.ok_or(RelabelError::LabelOverflow(target))?;
				debug!("moving label {target} to overflow label {overflow}");
				lookup.insert(target, overflow);
				next_overflow = overflow.checked_add(1);
			}
		}

		for (source, target) in &label_map {
			if self.labels.contains(&source) {
				lookup.insert(source, target);
			}
		}

		let relabeled = self.partition.map_labels(&lookup);
		self.set_partition(relabeled);
		check_label_count("apply_map", before, self.labels.len())?;

		let applied_targets = label_map
			.pairs()
			.iter()
			.filter(|(source, _)| lookup.contains_key(source))
			.map(|&(_, target)| target);

		self.do_not_change = self
			.do_not_change
			.iter()
			.map(|label| lookup.get(label).copied().unwrap_or(*label))
			.chain(applied_targets)
			.collect();

		debug!("applied label map {label_map}");

		if self.make_consecutive {
			self.compress_to_consecutive(self.target_label_count)?;
		}

		Ok(())
	}

	/// Align unprotected classes with the labels of `reference`.
	///
	/// Each class is proposed to be renamed to the reference label covering most of its cells,
	/// breaking ties in favor of the smallest reference label.
	/// Classes already carrying that label, protected classes, and protected targets are skipped.
	/// Repeated targets keep only their first (lowest label) source.
	///
	/// # Errors
	/// Returns [`RelabelError::ShapeMismatch`] if `reference` covers a different grid,
	/// or any error from [`ClusterLabels::apply_map`].
	pub fn overlap_refine(&mut self, reference: &Partition) -> Result<Refinement, RelabelError> {
		if reference.shape() != self.partition.shape() {
			return Err(RelabelError::ShapeMismatch {
				expected: self.partition.shape(),
				found: reference.shape(),
			});
		}

		// label -> reference label -> number of overlapping cells
		let mut overlaps: BTreeMap<Label, BTreeMap<Label, usize>> = BTreeMap::new();
		for (&label, &reference_label) in self.partition.as_slice().iter().zip(reference.as_slice()) {
			*overlaps.entry(label).or_default().entry(reference_label).or_default() += 1;
		}

		let mut label_map = LabelMap::new();
		for (&label, counts) in &overlaps {
			if self.do_not_change.contains(&label) {
				continue;
			}

			let plurality = plurality(counts);
			if plurality != label && !self.do_not_change.contains(&plurality) {
				label_map.push(label, plurality);
			}
		}

		match self.validate_overlap_map(label_map) {
			Ok(label_map) if label_map.is_empty() => Ok(Refinement::Unchanged),
			Ok(label_map) => {
				self.apply_map(&label_map)?;
				Ok(Refinement::Applied(label_map))
			},
			Err(target) => {
				warn!("invalid label map from overlap refinement: target {target} is protected, skipping refinement");
				Ok(Refinement::Rejected { target })
			},
		}
	}

	/// Resolve repeated targets and reject maps that rename onto a protected label
	fn validate_overlap_map(&self, label_map: LabelMap) -> Result<LabelMap, Label> {
		let label_map = if label_map.has_repeated_targets() {
			debug!("dropping repeated targets from overlap map {label_map}");
			label_map.repeated_target_filter()
		} else {
			label_map
		};

		let protected = label_map.targets().find(|target| self.do_not_change.contains(target));
		match protected {
			Some(target) => Err(target),
			None => Ok(label_map),
		}
	}

	/// Rename labels so that they fall in `0..width`,
	/// where `width` is the larger of `target_count` and the number of distinct labels.
	///
	/// Every unprotected label that is negative or at least `width` is moved to the smallest unused
	/// value in the range, in ascending label order. Returns the applied map.
	///
	/// # Errors
	/// Returns [`RelabelError::LabelCountChanged`] if the rename merged or split classes.
	pub fn compress_to_consecutive(&mut self, target_count: Option<usize>) -> Result<LabelMap, RelabelError> {
		let before = self.labels.len();
		let width = target_count.map_or(before, |count| usize::max(count, before));
		let width = Label::try_from(width).unwrap_or(Label::MAX);

		let mut free = (0..width).filter(|slot| !self.labels.contains(slot));
		let mut label_map = LabelMap::new();

		for &label in &self.labels {
			if (label < 0 || label >= width) && !self.do_not_change.contains(&label) {
				// there are at least as many free slots as labels outside the range
				let Some(slot) = free.next() else { break };
				label_map.push(label, slot);
			}
		}

		if !label_map.is_empty() {
			let relabeled = self.partition.map_labels(&label_map.lookup());
			self.set_partition(relabeled);
			check_label_count("compress_to_consecutive", before, self.labels.len())?;
			debug!("compressed labels with {label_map}");
		}

		Ok(label_map)
	}
}

/// The reference label with the most overlapping cells, preferring the smallest label on ties
fn plurality(counts: &BTreeMap<Label, usize>) -> Label {
	let mut best = None;
	let mut max_count = 0;
	for (&label, &count) in counts {
		if count > max_count {
			max_count = count;
			best = Some(label);
		}
	}

	// every class covers at least one cell
	best.unwrap_or_default()
}

/// Ensure a remap did not merge or split classes
pub(crate) fn check_label_count(operation: &'static str, before: usize, after: usize) -> Result<(), RelabelError> {
	if before == after {
		Ok(())
	} else {
		Err(RelabelError::LabelCountChanged { operation, before, after })
	}
}
