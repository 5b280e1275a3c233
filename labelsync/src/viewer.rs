//! Looks up and highlights the labels at chosen grid positions

use crate::{Coord, Label, Partition, RelabelError};
use image::{Rgb, RgbImage};
use log::info;
use palette::{FromColor, Okhsl, Srgb};
use std::collections::{BTreeSet, HashMap};

/// Opacity, in percent, of cells outside of the highlighted window
const FADED_OPACITY: u32 = 10;

/// Reports the labels of a partition at given positions.
///
/// Used on the reference partition to find the label every anchor should map to.
#[derive(Debug, Clone, Copy)]
pub struct Viewer<'a> {
	/// The viewed partition
	partition: &'a Partition,
}

impl<'a> Viewer<'a> {
	/// Create a viewer for `partition`
	#[must_use]
	pub const fn new(partition: &'a Partition) -> Self {
		Self { partition }
	}

	/// The label at `coord`.
	///
	/// # Errors
	/// Returns [`RelabelError::CoordinateOutOfBounds`] if `coord` lies outside the grid.
	pub fn label_at(&self, coord: Coord) -> Result<Label, RelabelError> {
		self.partition.label_at(coord)
	}

	/// The labels at each of `coords`, logging each lookup.
	///
	/// # Errors
	/// Returns [`RelabelError::CoordinateOutOfBounds`] if any coordinate lies outside the grid.
	pub fn check_locations(&self, coords: &[Coord]) -> Result<Vec<Label>, RelabelError> {
		coords
			.iter()
			.map(|&(row, col)| {
				let label = self.label_at((row, col))?;
				info!("({row:2},{col:2})  label = {label}");
				Ok(label)
			})
			.collect()
	}

	/// Render the partition with every cell outside the `(2 * buffer + 1)`-wide square around `coord` faded out.
	///
	/// Each label gets its own hue, evenly spaced in ascending label order.
	/// The window is clipped to the grid.
	///
	/// # Errors
	/// Returns [`RelabelError::CoordinateOutOfBounds`] if `coord` lies outside the grid,
	/// or [`RelabelError::ImageTooLarge`] if the grid does not fit in an image.
	pub fn highlight(&self, coord: Coord, buffer: usize) -> Result<RgbImage, RelabelError> {
		let partition = self.partition;
		if !partition.contains(coord) {
			return Err(partition.out_of_bounds(coord));
		}

		let (rows, cols) = partition.shape();
		let too_large = || RelabelError::ImageTooLarge { rows, cols };
		let width = u32::try_from(cols).map_err(|_| too_large())?;
		let height = u32::try_from(rows).map_err(|_| too_large())?;

		let colors = label_colors(&partition.distinct_labels());
		let row_window = coord.0.saturating_sub(buffer)..=usize::min(coord.0.saturating_add(buffer), rows - 1);
		let col_window = coord.1.saturating_sub(buffer)..=usize::min(coord.1.saturating_add(buffer), cols - 1);

		Ok(RgbImage::from_fn(width, height, |x, y| {
			let (row, col) = (y as usize, x as usize);
			let color = partition
				.get((row, col))
				.and_then(|label| colors.get(&label).copied())
				.unwrap_or(Srgb::new(0, 0, 0));

			if row_window.contains(&row) && col_window.contains(&col) {
				Rgb([color.red, color.green, color.blue])
			} else {
				Rgb([fade(color.red), fade(color.green), fade(color.blue)])
			}
		}))
	}
}

/// Assign each label an evenly spaced Okhsl hue, in ascending label order.
///
/// Passing the union of the labels of several partitions gives shared labels the same color in each.
#[must_use]
pub fn label_colors(labels: &BTreeSet<Label>) -> HashMap<Label, Srgb<u8>> {
	// label counts are far below f32 precision limits for any renderable grid
	#[allow(clippy::cast_precision_loss)]
	let step = 360.0 / labels.len().max(1) as f32;

	labels
		.iter()
		.enumerate()
		.map(|(i, &label)| {
			#[allow(clippy::cast_precision_loss)]
			let hue = step * i as f32;
			let color = Srgb::<f32>::from_color(Okhsl::new(hue, 0.8, 0.6)).into_format::<u8>();
			(label, color)
		})
		.collect()
}

/// Blend a color channel over a white background at [`FADED_OPACITY`]
fn fade(channel: u8) -> u8 {
	let blended =
		(FADED_OPACITY * u32::from(channel) + (100 - FADED_OPACITY) * u32::from(u8::MAX) + 50) / 100;
	u8::try_from(blended).unwrap_or(u8::MAX)
}
