//! Aligns the labels of several candidate partitions with one reference partition

use crate::{relabel::check_label_count, Anchor, ClusterLabels, Coord, Partition, Refinement, RelabelError, Viewer};
use log::debug;

#[cfg(feature = "threads")]
use rayon::prelude::*;

/// Options controlling how candidates are aligned with the reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelerConfig {
	/// Reference positions whose classes should share a label across all partitions
	pub anchors: Vec<Coord>,
	/// Compress the reference and every candidate into a consecutive label range
	pub make_consecutive: bool,
	/// Width of the candidates' consecutive label range,
	/// defaulting to the number of labels in the reference
	pub target_label_count: Option<usize>,
	/// Rename remaining classes after the reference label they overlap most
	pub overlap_refinement: bool,
}

impl Default for LabelerConfig {
	fn default() -> Self {
		Self {
			anchors: Vec::new(),
			make_consecutive: false,
			target_label_count: None,
			overlap_refinement: true,
		}
	}
}

impl LabelerConfig {
	/// Set the anchor positions
	#[must_use]
	pub fn with_anchors(mut self, anchors: Vec<Coord>) -> Self {
		self.anchors = anchors;
		self
	}

	/// Enable or disable consecutive compression
	#[must_use]
	pub const fn with_consecutive(mut self, make_consecutive: bool) -> Self {
		self.make_consecutive = make_consecutive;
		self
	}

	/// Set the width of the candidates' consecutive label range
	#[must_use]
	pub const fn with_target_label_count(mut self, target_label_count: Option<usize>) -> Self {
		self.target_label_count = target_label_count;
		self
	}

	/// Enable or disable overlap refinement
	#[must_use]
	pub const fn with_overlap_refinement(mut self, overlap_refinement: bool) -> Self {
		self.overlap_refinement = overlap_refinement;
		self
	}
}

/// A named candidate partition, e.g. the output of one clustering algorithm
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
	/// Name used when reporting or exporting this candidate
	pub name: String,
	/// The candidate's labels
	pub partition: Partition,
}

impl Candidate {
	/// Create a named candidate
	#[must_use]
	pub fn new(name: impl Into<String>, partition: Partition) -> Self {
		Self { name: name.into(), partition }
	}
}

/// A candidate after alignment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relabeled {
	/// Name of the candidate
	pub name: String,
	/// The candidate as it was loaded
	pub original: Partition,
	/// The candidate with aligned labels
	pub relabeled: Partition,
	/// Outcome of overlap refinement, if it was enabled
	pub refinement: Option<Refinement>,
}

/// Aligns the labels of every candidate with a shared reference partition.
///
/// Each candidate is first renamed so that the classes under the anchors take the reference's labels,
/// then optionally refined by overlap with the reference.
/// Candidates are processed independently of each other.
#[derive(Debug, Clone)]
pub struct ConsistentLabeler {
	/// The partition whose labels every candidate is aligned with
	reference: Partition,
	/// The partitions to relabel
	candidates: Vec<Candidate>,
	/// Alignment options
	config: LabelerConfig,
}

impl ConsistentLabeler {
	/// Validate the inputs and prepare the reference.
	///
	/// If `config.make_consecutive` is set, the reference is compressed to consecutive labels,
	/// fixing the label range every candidate is aligned to.
	///
	/// # Errors
	/// Returns [`RelabelError::ShapeMismatch`] if a candidate covers a different grid than the reference,
	/// [`RelabelError::CoordinateOutOfBounds`] if an anchor lies outside the grid,
	/// or [`RelabelError::InvalidConfig`] if the target label count is zero.
	pub fn new(reference: Partition, candidates: Vec<Candidate>, config: LabelerConfig) -> Result<Self, RelabelError> {
		if let Some(candidate) = candidates.iter().find(|c| c.partition.shape() != reference.shape()) {
			return Err(RelabelError::ShapeMismatch {
				expected: reference.shape(),
				found: candidate.partition.shape(),
			});
		}

		if let Some(&anchor) = config.anchors.iter().find(|&&anchor| !reference.contains(anchor)) {
			return Err(reference.out_of_bounds(anchor));
		}

		if config.target_label_count == Some(0) {
			return Err(RelabelError::InvalidConfig("the target label count must be at least 1".to_owned()));
		}

		let reference = if config.make_consecutive {
			let mut labels = ClusterLabels::new(reference);
			labels.compress_to_consecutive(None)?;
			labels.into_partition()
		} else {
			reference
		};

		Ok(Self { reference, candidates, config })
	}

	/// The reference partition, compressed if configured
	#[must_use]
	pub const fn reference(&self) -> &Partition {
		&self.reference
	}

	/// The candidates as loaded
	#[must_use]
	pub fn candidates(&self) -> &[Candidate] {
		&self.candidates
	}

	/// The alignment options
	#[must_use]
	pub const fn config(&self) -> &LabelerConfig {
		&self.config
	}

	/// A viewer over the reference partition
	#[must_use]
	pub const fn viewer(&self) -> Viewer<'_> {
		Viewer::new(&self.reference)
	}

	/// Look up the reference label under every anchor position.
	///
	/// # Errors
	/// Returns [`RelabelError::CoordinateOutOfBounds`] if an anchor lies outside the grid.
	pub fn resolve_anchors(&self) -> Result<Vec<Anchor>, RelabelError> {
		let labels = self.viewer().check_locations(&self.config.anchors)?;
		Ok(self
			.config
			.anchors
			.iter()
			.zip(labels)
			.map(|(&coord, target)| Anchor::new(coord, target))
			.collect())
	}

	/// Align every candidate with the reference and verify that no candidate's partition changed.
	///
	/// # Errors
	/// Returns the first error encountered for any candidate.
	/// [`RelabelError::LabelCountChanged`] and [`RelabelError::PartitionChanged`] indicate a defect
	/// and no results should be exported.
	pub fn relabel(&self) -> Result<Vec<Relabeled>, RelabelError> {
		let anchors = self.resolve_anchors()?;
		let target_label_count = self.config.target_label_count.unwrap_or_else(|| self.reference.label_count());

		let relabeled = self.relabel_all(&anchors, target_label_count)?;
		validate(&relabeled)?;
		Ok(relabeled)
	}

	/// Relabel the candidates in parallel
	#[cfg(feature = "threads")]
	fn relabel_all(&self, anchors: &[Anchor], target_label_count: usize) -> Result<Vec<Relabeled>, RelabelError> {
		self.candidates
			.par_iter()
			.map(|candidate| self.relabel_candidate(candidate, anchors, target_label_count))
			.collect()
	}

	/// Relabel the candidates one after another
	#[cfg(not(feature = "threads"))]
	fn relabel_all(&self, anchors: &[Anchor], target_label_count: usize) -> Result<Vec<Relabeled>, RelabelError> {
		self.candidates
			.iter()
			.map(|candidate| self.relabel_candidate(candidate, anchors, target_label_count))
			.collect()
	}

	/// Run anchor alignment and overlap refinement for a single candidate
	fn relabel_candidate(
		&self,
		candidate: &Candidate,
		anchors: &[Anchor],
		target_label_count: usize,
	) -> Result<Relabeled, RelabelError> {
		let mut labels = ClusterLabels::new(candidate.partition.clone());
		if self.config.make_consecutive {
			labels = labels.with_consecutive(Some(target_label_count));
		}

		let original_count = labels.label_count();

		let label_map = labels.label_map(anchors)?;
		debug!("{}: anchor label map {label_map}", candidate.name);
		labels.apply_map(&label_map)?;
		check_label_count("anchor alignment", original_count, labels.label_count())?;

		let refinement = if self.config.overlap_refinement {
			let refinement = labels.overlap_refine(&self.reference)?;
			check_label_count("overlap refinement", original_count, labels.label_count())?;
			Some(refinement)
		} else {
			None
		};

		Ok(Relabeled {
			name: candidate.name.clone(),
			original: candidate.partition.clone(),
			relabeled: labels.into_partition(),
			refinement,
		})
	}
}

/// Verify that every relabeled candidate groups exactly the same cells together as its original.
///
/// # Errors
/// Returns [`RelabelError::PartitionChanged`] for the first candidate whose partition changed.
pub fn validate(relabeled: &[Relabeled]) -> Result<(), RelabelError> {
	match relabeled.iter().find(|r| !r.relabeled.is_relabeling_of(&r.original)) {
		Some(r) => Err(RelabelError::PartitionChanged { name: r.name.clone() }),
		None => Ok(()),
	}
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
	use super::*;
	use crate::LabelMap;

	#[rustfmt::skip]
	fn reference() -> Partition {
		Partition::from_rows(&[
			[0, 0, 1, 1, 1, 1],
			[0, 0, 1, 1, 1, 1],
			[2, 2, 2, 3, 3, 3],
			[2, 2, 2, 3, 3, 3],
		])
		.unwrap()
	}

	/// The reference with permuted labels and one shifted boundary cell
	#[rustfmt::skip]
	fn permuted() -> Partition {
		Partition::from_rows(&[
			[7, 7, 4, 4, 4, 4],
			[7, 7, 7, 4, 4, 4],
			[9, 9, 9, 5, 5, 5],
			[9, 9, 9, 5, 5, 5],
		])
		.unwrap()
	}

	#[test]
	fn overlap_alone_recovers_reference_labels() {
		let labeler =
			ConsistentLabeler::new(reference(), vec![Candidate::new("permuted", permuted())], LabelerConfig::default())
				.unwrap();

		let result = labeler.relabel().unwrap();
		assert_eq!(result.len(), 1);

		let relabeled = &result[0].relabeled;
		assert_eq!(relabeled.distinct_labels(), reference().distinct_labels());
		assert_eq!(relabeled.label_at((0, 0)), Ok(0));
		assert_eq!(relabeled.label_at((0, 5)), Ok(1));
		assert_eq!(relabeled.label_at((3, 0)), Ok(2));
		assert_eq!(relabeled.label_at((3, 5)), Ok(3));
		assert!(relabeled.is_relabeling_of(&permuted()));
	}

	#[test]
	fn anchors_take_reference_labels() {
		let config = LabelerConfig::default()
			.with_anchors(vec![(3, 5), (0, 0)])
			.with_overlap_refinement(false);

		let labeler = ConsistentLabeler::new(reference(), vec![Candidate::new("permuted", permuted())], config).unwrap();

		assert_eq!(
			labeler.resolve_anchors().unwrap(),
			vec![Anchor::new((3, 5), 3), Anchor::new((0, 0), 0)]
		);

		let result = labeler.relabel().unwrap();
		let relabeled = &result[0].relabeled;

		assert_eq!(result[0].refinement, None);
		assert_eq!(relabeled.label_at((3, 5)), Ok(3));
		assert_eq!(relabeled.label_at((0, 0)), Ok(0));
		assert_eq!(relabeled.label_at((0, 5)), Ok(4));
		assert_eq!(relabeled.label_at((3, 0)), Ok(9));
	}

	#[test]
	fn consecutive_reference_fixes_candidate_range() {
		#[rustfmt::skip]
		let reference = Partition::from_rows(&[
			[10, 10, 20, 20],
			[10, 10, 20, 20],
			[-1, -1, 30, 30],
		])
		.unwrap();

		let candidate = Partition::from_rows(&[[5, 5, 6, 6], [5, 5, 6, 6], [5, 5, 6, 6]]).unwrap();

		let config = LabelerConfig::default().with_consecutive(true).with_anchors(vec![(0, 0)]);
		let labeler = ConsistentLabeler::new(reference, vec![Candidate::new("two", candidate)], config).unwrap();

		assert_eq!(labeler.reference().distinct_labels().into_iter().collect::<Vec<_>>(), vec![0, 1, 2, 3]);

		let result = labeler.relabel().unwrap();
		let relabeled = &result[0].relabeled;
		let labels = relabeled.distinct_labels();

		assert_eq!(labels.len(), 2);
		assert!(labels.iter().all(|label| (0..4).contains(label)));
		assert_eq!(relabeled.label_at((0, 0)), labeler.reference().label_at((0, 0)));
	}

	#[test]
	fn candidates_are_independent() {
		let candidates = vec![
			Candidate::new("same", reference()),
			Candidate::new("permuted", permuted()),
			Candidate::new("single", Partition::new(4, 6, vec![42; 24]).unwrap()),
		];

		let labeler = ConsistentLabeler::new(reference(), candidates, LabelerConfig::default()).unwrap();
		let result = labeler.relabel().unwrap();

		assert_eq!(result.iter().map(|r| r.name.as_str()).collect::<Vec<_>>(), vec!["same", "permuted", "single"]);
		assert_eq!(result[0].relabeled, reference());
		assert_eq!(result[0].refinement, Some(Refinement::Unchanged));
		// a single class takes the reference label covering most of the grid
		assert_eq!(result[2].relabeled, Partition::new(4, 6, vec![1; 24]).unwrap());
	}

	#[test]
	fn rejects_mismatched_candidate() {
		let candidate = Candidate::new("small", Partition::new(2, 2, vec![0; 4]).unwrap());
		assert_eq!(
			ConsistentLabeler::new(reference(), vec![candidate], LabelerConfig::default()).unwrap_err(),
			RelabelError::ShapeMismatch { expected: (4, 6), found: (2, 2) }
		);
	}

	#[test]
	fn rejects_anchor_outside_grid() {
		let config = LabelerConfig::default().with_anchors(vec![(0, 0), (4, 0)]);
		assert!(matches!(
			ConsistentLabeler::new(reference(), Vec::new(), config),
			Err(RelabelError::CoordinateOutOfBounds { row: 4, col: 0, .. })
		));
	}

	#[test]
	fn rejects_zero_target_label_count() {
		let config = LabelerConfig::default().with_target_label_count(Some(0));
		assert!(matches!(
			ConsistentLabeler::new(reference(), Vec::new(), config),
			Err(RelabelError::InvalidConfig(_))
		));
	}

	#[test]
	fn validate_detects_merged_classes() {
		let mut renamed = ClusterLabels::new(reference());
		renamed.apply_map(&LabelMap::from(vec![(1, 0)])).unwrap();

		let good = Relabeled {
			name: "good".to_owned(),
			original: reference(),
			relabeled: renamed.into_partition(),
			refinement: None,
		};
		assert_eq!(validate(std::slice::from_ref(&good)), Ok(()));

		let bad = Relabeled {
			name: "bad".to_owned(),
			relabeled: Partition::new(4, 6, vec![0; 24]).unwrap(),
			..good.clone()
		};
		assert_eq!(
			validate(&[good, bad]),
			Err(RelabelError::PartitionChanged { name: "bad".to_owned() })
		);
	}
}
