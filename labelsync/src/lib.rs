//! Give semantically equivalent clusters the same label across several segmentations of the same grid.
//!
//! Different clustering algorithms run over the same image produce label arrays whose label values
//! are arbitrary: the "water" cluster may be `3` in one result and `0` in another.
//! This crate renames the label classes of each result so that they line up with a reference result,
//! without ever changing which cells belong together.
//!
//! # Examples
//!
//! ## Align two results with anchors and overlap
//!
//! ```
//! use labelsync::{Candidate, ConsistentLabeler, LabelerConfig, Partition};
//!
//! let reference = Partition::from_rows(&[[0, 0, 1], [2, 2, 1]])?;
//! let kmeans = Partition::from_rows(&[[5, 5, 3], [4, 4, 3]])?;
//!
//! let config = LabelerConfig::default().with_anchors(vec![(0, 0)]);
//! let labeler = ConsistentLabeler::new(reference.clone(), vec![Candidate::new("kmeans", kmeans)], config)?;
//!
//! let result = labeler.relabel()?;
//! assert_eq!(result[0].relabeled, reference);
//! # Ok::<(), labelsync::RelabelError>(())
//! ```
//!
//! ## Rename a single partition by hand
//!
//! ```
//! use labelsync::{Anchor, ClusterLabels, Partition};
//!
//! let partition = Partition::from_rows(&[[0, 0, 1, 1], [2, 2, 3, 3]])?;
//! let mut labels = ClusterLabels::new(partition);
//!
//! let map = labels.label_map(&[Anchor::new((0, 0), 5), Anchor::new((1, 0), 6)])?;
//! labels.apply_map(&map)?;
//!
//! assert_eq!(labels.partition().as_slice(), &[5, 5, 1, 1, 6, 6, 3, 3]);
//! # Ok::<(), labelsync::RelabelError>(())
//! ```
//!
//! # Alignment steps
//!
//! Each candidate goes through the following steps, see [`ConsistentLabeler::relabel`].
//!
//! ## Anchors
//!
//! Anchors are grid positions chosen by the user, typically one inside each prominent region.
//! The reference label under each anchor is looked up once,
//! and the class under the same position in each candidate is renamed to that label.
//! Anchors are applied in order: an anchor whose candidate class or reference label
//! was already used by an earlier anchor is skipped.
//!
//! ## Overlap refinement
//!
//! Every class not fixed by an anchor is renamed to the reference label that covers most of its cells.
//! If two classes would receive the same label, only the first keeps it.
//! Proposed renames that would touch an anchored label are rejected as a whole with a warning.
//!
//! ## Consecutive compression
//!
//! Labels can optionally be compressed into `0..n`, where `n` is at least the number of labels
//! in the reference. This keeps every result within the same color range when visualized.
//!
//! Whenever a rename would give a class a label that another class still carries,
//! the other class is moved to a fresh overflow label first, so classes are never merged.

#![deny(unsafe_code)]
#![warn(clippy::pedantic, clippy::cargo)]
#![warn(clippy::use_debug, clippy::dbg_macro, clippy::todo, clippy::unimplemented)]
#![warn(clippy::unwrap_used, clippy::unwrap_in_result)]
#![warn(clippy::unneeded_field_pattern, clippy::rest_pat_in_fully_bound_structs)]
#![warn(clippy::unnecessary_self_imports)]
#![warn(clippy::str_to_string, clippy::string_to_string, clippy::string_slice)]
#![warn(missing_docs, clippy::missing_docs_in_private_items, rustdoc::all)]
#![allow(clippy::module_name_repetitions)]

mod error;
mod label_map;
mod labeler;
mod partition;
mod relabel;
mod viewer;

pub use error::RelabelError;
pub use label_map::LabelMap;
pub use labeler::{validate, Candidate, ConsistentLabeler, LabelerConfig, Relabeled};
pub use partition::{Coord, Partition};
pub use relabel::{Anchor, ClusterLabels, Refinement};
pub use viewer::{label_colors, Viewer};

/// A cluster label
///
/// Negative values are allowed, e.g. `-1` for points a density-based algorithm marked as noise.
pub type Label = i64;
