//! A grid of cluster labels produced by one segmentation algorithm

use crate::{Label, RelabelError};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// A `(row, col)` position inside a [`Partition`]
pub type Coord = (usize, usize);

/// A `rows x cols` grid of integer labels stored in row-major order.
///
/// Every cell carries exactly one label, so the grid is split into disjoint label classes.
/// Only this grouping of cells carries meaning: renaming a class never changes the partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
	/// Number of rows
	rows: usize,
	/// Number of columns
	cols: usize,
	/// Row-major labels
	labels: Vec<Label>,
}

impl Partition {
	/// Create a partition from row-major labels.
	///
	/// # Errors
	/// Returns [`RelabelError::DimensionMismatch`] if `labels` does not contain exactly `rows * cols` labels.
	pub fn new(rows: usize, cols: usize, labels: Vec<Label>) -> Result<Self, RelabelError> {
		if rows.checked_mul(cols) == Some(labels.len()) {
			Ok(Self { rows, cols, labels })
		} else {
			Err(RelabelError::DimensionMismatch { rows, cols, len: labels.len() })
		}
	}

	/// Create a partition from a slice of equally long rows.
	///
	/// # Errors
	/// Returns [`RelabelError::DimensionMismatch`] if the rows have differing lengths.
	pub fn from_rows<R: AsRef<[Label]>>(rows: &[R]) -> Result<Self, RelabelError> {
		let cols = rows.first().map_or(0, |row| row.as_ref().len());
		let labels = rows.iter().flat_map(|row| row.as_ref().iter().copied()).collect::<Vec<_>>();

		if rows.iter().any(|row| row.as_ref().len() != cols) {
			return Err(RelabelError::DimensionMismatch { rows: rows.len(), cols, len: labels.len() });
		}

		Self::new(rows.len(), cols, labels)
	}

	/// The number of rows
	#[must_use]
	pub const fn rows(&self) -> usize {
		self.rows
	}

	/// The number of columns
	#[must_use]
	pub const fn cols(&self) -> usize {
		self.cols
	}

	/// The `(rows, cols)` shape of the grid
	#[must_use]
	pub const fn shape(&self) -> (usize, usize) {
		(self.rows, self.cols)
	}

	/// The number of cells
	#[must_use]
	pub fn len(&self) -> usize {
		self.labels.len()
	}

	/// Whether the grid has no cells
	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.labels.is_empty()
	}

	/// The row-major labels
	#[must_use]
	pub fn as_slice(&self) -> &[Label] {
		&self.labels
	}

	/// Consume the partition, returning the row-major labels
	#[must_use]
	pub fn into_vec(self) -> Vec<Label> {
		self.labels
	}

	/// Iterate over the rows of the grid
	pub fn iter_rows(&self) -> impl Iterator<Item = &[Label]> {
		// an empty grid has no labels, so the chunk size is never used
		self.labels.chunks(self.cols.max(1))
	}

	/// Whether `coord` lies inside the grid
	#[must_use]
	pub const fn contains(&self, (row, col): Coord) -> bool {
		row < self.rows && col < self.cols
	}

	/// The label at `coord`, or `None` if it lies outside the grid
	#[must_use]
	pub fn get(&self, coord: Coord) -> Option<Label> {
		self.contains(coord).then(|| self.labels[coord.0 * self.cols + coord.1])
	}

	/// The label at `coord`.
	///
	/// # Errors
	/// Returns [`RelabelError::CoordinateOutOfBounds`] if `coord` lies outside the grid.
	pub fn label_at(&self, coord: Coord) -> Result<Label, RelabelError> {
		self.get(coord).ok_or_else(|| self.out_of_bounds(coord))
	}

	/// Build the error for a coordinate outside this grid
	pub(crate) const fn out_of_bounds(&self, (row, col): Coord) -> RelabelError {
		RelabelError::CoordinateOutOfBounds {
			row,
			col,
			rows: self.rows,
			cols: self.cols,
		}
	}

	/// The distinct labels in ascending order
	#[must_use]
	pub fn distinct_labels(&self) -> BTreeSet<Label> {
		self.labels.iter().copied().collect()
	}

	/// The number of distinct labels
	#[must_use]
	pub fn label_count(&self) -> usize {
		self.distinct_labels().len()
	}

	/// Rename every cell through `lookup` in a single pass, leaving labels without an entry unchanged
	#[must_use]
	pub(crate) fn map_labels(&self, lookup: &HashMap<Label, Label>) -> Self {
		Self {
			rows: self.rows,
			cols: self.cols,
			labels: self
				.labels
				.iter()
				.map(|label| lookup.get(label).copied().unwrap_or(*label))
				.collect(),
		}
	}

	/// Whether `self` induces exactly the same grouping of cells as `other`.
	///
	/// This holds iff both grids have the same shape and there is a one-to-one correspondence
	/// between the labels of `self` and the labels of `other` that agrees on every cell.
	#[must_use]
	pub fn is_relabeling_of(&self, other: &Self) -> bool {
		if self.shape() != other.shape() {
			return false;
		}

		let mut forward = HashMap::new();
		let mut backward = HashMap::new();

		self.labels.iter().zip(&other.labels).all(|(&ours, &theirs)| {
			*forward.entry(ours).or_insert(theirs) == theirs && *backward.entry(theirs).or_insert(ours) == ours
		})
	}

	/// A representative position for each label, in ascending label order.
	///
	/// Each label may be split into several 8-connected components.
	/// The position is the (truncated) centroid of the component with the largest bounding box,
	/// preferring the component found first in row-major order on ties.
	#[must_use]
	pub fn label_centers(&self) -> Vec<(Label, Coord)> {
		// label -> (bounding box area, centroid)
		let mut best: BTreeMap<Label, (usize, Coord)> = BTreeMap::new();
		let mut visited = vec![false; self.labels.len()];
		let mut stack = Vec::new();

		for start in 0..self.labels.len() {
			if visited[start] {
				continue;
			}

			let label = self.labels[start];
			let component = self.flood_fill(start, &mut visited, &mut stack);
			let area = component.area();
			let center = component.centroid();

			best.entry(label)
				.and_modify(|entry| {
					if area > entry.0 {
						*entry = (area, center);
					}
				})
				.or_insert((area, center));
		}

		best.into_iter().map(|(label, (_, center))| (label, center)).collect()
	}

	/// Visit every cell 8-connected to `start` that shares its label
	fn flood_fill(&self, start: usize, visited: &mut [bool], stack: &mut Vec<usize>) -> Component {
		let label = self.labels[start];
		let mut component = Component::new(start / self.cols, start % self.cols);

		visited[start] = true;
		stack.push(start);

		while let Some(index) = stack.pop() {
			let (row, col) = (index / self.cols, index % self.cols);
			component.add(row, col);

			for r in row.saturating_sub(1)..=usize::min(row + 1, self.rows - 1) {
				for c in col.saturating_sub(1)..=usize::min(col + 1, self.cols - 1) {
					let neighbor = r * self.cols + c;
					if !visited[neighbor] && self.labels[neighbor] == label {
						visited[neighbor] = true;
						stack.push(neighbor);
					}
				}
			}
		}

		component
	}
}

/// Running statistics for one connected component
struct Component {
	/// Number of cells
	count: usize,
	/// Sum of row indices
	row_sum: usize,
	/// Sum of column indices
	col_sum: usize,
	/// Inclusive `(min_row, min_col, max_row, max_col)` bounding box
	bbox: (usize, usize, usize, usize),
}

impl Component {
	/// Start an empty component whose bounding box is seeded at `(row, col)`
	const fn new(row: usize, col: usize) -> Self {
		Self {
			count: 0,
			row_sum: 0,
			col_sum: 0,
			bbox: (row, col, row, col),
		}
	}

	/// Add a cell to the component
	fn add(&mut self, row: usize, col: usize) {
		self.count += 1;
		self.row_sum += row;
		self.col_sum += col;
		self.bbox.0 = self.bbox.0.min(row);
		self.bbox.1 = self.bbox.1.min(col);
		self.bbox.2 = self.bbox.2.max(row);
		self.bbox.3 = self.bbox.3.max(col);
	}

	/// Area of the bounding box
	const fn area(&self) -> usize {
		(self.bbox.2 + 1 - self.bbox.0) * (self.bbox.3 + 1 - self.bbox.1)
	}

	/// Centroid truncated towards the origin
	const fn centroid(&self) -> Coord {
		(self.row_sum / self.count, self.col_sum / self.count)
	}
}
