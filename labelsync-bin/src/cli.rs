//! Specifies the CLI and handles arg parsing

use clap::Parser;
use labelsync::Coord;
use std::{num::NonZeroUsize, path::PathBuf};

/// Give equivalent clusters the same label across several segmentations of the same grid.
///
/// Every candidate is renamed to line up with the reference:
/// first the classes under each --anchor take the reference's label at that position,
/// then every other class takes the reference label it overlaps most.
/// Renaming never changes which cells belong together.
///
/// Inputs are either text grids of integer labels (separated by whitespace or commas)
/// or grayscale images where each pixel value is a label.
#[allow(clippy::struct_excessive_bools)]
#[derive(Parser)]
#[command(version)]
pub struct Options {
    /// The path to the reference labels
    pub reference: PathBuf,

    /// The paths to the candidate labels to align with the reference
    #[arg(required = true)]
    pub candidates: Vec<PathBuf>,

    /// A comma separated list of names, one per candidate
    ///
    /// Candidates without a name are named after their file stem.
    /// Names are used when printing and for the files written to --output.
    #[arg(short, long = "name", value_delimiter = ',')]
    pub names: Vec<String>,

    /// Reshape every input into a grid with the given number of rows and columns, e.g. 83,86
    ///
    /// This is needed for inputs stored as a single row or column.
    #[arg(long, value_parser = parse_pair)]
    pub shape: Option<(usize, usize)>,

    /// A reference position, as ROW,COL, whose class should share its label across all candidates
    ///
    /// Can be given multiple times. Anchors are applied in order,
    /// and an anchor is skipped if its class or label was already used by an earlier anchor.
    #[arg(short, long = "anchor", value_parser = parse_pair)]
    pub anchors: Vec<Coord>,

    /// Compress the labels of every result into a consecutive range starting at 0
    #[arg(short, long)]
    pub consecutive: bool,

    /// The minimum width of the consecutive label range for candidates
    ///
    /// Defaults to the number of labels in the reference.
    #[arg(short = 'k', long, requires = "consecutive")]
    pub target_label_count: Option<NonZeroUsize>,

    /// Only apply the anchors and skip renaming the remaining classes by overlap
    #[arg(long)]
    pub no_overlap: bool,

    /// The directory to write each relabeled candidate to as <name>.csv
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Save the reference as a PNG image, fading out everything except the area around the first anchor
    #[arg(long, requires = "anchors")]
    pub highlight: Option<PathBuf>,

    /// The number of cells around the anchor to keep when using --highlight
    #[arg(long, default_value_t = 5)]
    pub buffer: usize,

    /// The number of threads to use
    ///
    /// A value of 0 indicates to automatically choose the number of threads.
    #[cfg(feature = "threads")]
    #[arg(short, long, default_value_t = 0)]
    pub threads: u8,

    /// Print additional information, such as the position of each reference label
    #[arg(long)]
    pub verbose: bool,
}

/// Parse two comma separated, unsigned integers, e.g. `12,7`
fn parse_pair(s: &str) -> Result<(usize, usize), String> {
    let (first, second) = s
        .split_once(',')
        .ok_or_else(|| format!("expected two comma separated values, got `{s}`"))?;

    let parse = |v: &str| {
        v.trim()
            .parse::<usize>()
            .map_err(|e| format!("`{}`: {e}", v.trim()))
    };

    Ok((parse(first)?, parse(second)?))
}
