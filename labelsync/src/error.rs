//! Error cases for building and relabeling partitions

use crate::Label;
use thiserror::Error;

/// Everything that can go wrong while building, relabeling, or validating partitions.
///
/// [`RelabelError::LabelCountChanged`] and [`RelabelError::PartitionChanged`] indicate a defect in
/// how a label map was built or applied. There is no meaningful way to recover from them,
/// so callers should abort instead of exporting partially relabeled results.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelabelError {
	/// The number of labels does not match the requested grid dimensions
	#[error("{len} labels cannot form a {rows}x{cols} grid")]
	DimensionMismatch {
		/// Requested number of rows
		rows: usize,
		/// Requested number of columns
		cols: usize,
		/// Number of labels provided
		len: usize,
	},

	/// Two partitions that must cover the same domain have different shapes
	#[error("expected a {}x{} grid but found a {}x{} grid", expected.0, expected.1, found.0, found.1)]
	ShapeMismatch {
		/// Shape of the reference partition
		expected: (usize, usize),
		/// Shape of the offending partition
		found: (usize, usize),
	},

	/// A coordinate lies outside of the grid
	#[error("({row},{col}) is outside of the {rows}x{cols} grid")]
	CoordinateOutOfBounds {
		/// Row of the coordinate
		row: usize,
		/// Column of the coordinate
		col: usize,
		/// Number of rows in the grid
		rows: usize,
		/// Number of columns in the grid
		cols: usize,
	},

	/// A label map renames the same label more than once
	#[error("label {0} is renamed more than once in the same label map")]
	DuplicateSource(Label),

	/// A class displaced by a rename has no unused label above every existing label
	#[error("no overflow label is left to move label {0} to")]
	LabelOverflow(Label),

	/// A remap merged or split label classes
	#[error("{operation} changed the number of distinct labels from {before} to {after}")]
	LabelCountChanged {
		/// The step that performed the remap
		operation: &'static str,
		/// Distinct labels before the remap
		before: usize,
		/// Distinct labels after the remap
		after: usize,
	},

	/// A relabeled partition no longer groups the same pixels together as its original
	#[error("relabeling changed which pixels belong together in `{name}`")]
	PartitionChanged {
		/// Name of the candidate partition
		name: String,
	},

	/// The grid is too large to be rendered as an image
	#[error("a {rows}x{cols} grid is too large to render")]
	ImageTooLarge {
		/// Number of rows in the grid
		rows: usize,
		/// Number of columns in the grid
		cols: usize,
	},

	/// A configuration value is unusable
	#[error("invalid configuration: {0}")]
	InvalidConfig(String),
}
