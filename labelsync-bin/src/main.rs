//! Align the cluster labels of several segmentations of the same grid with a reference segmentation.

#![deny(unsafe_code, unsafe_op_in_unsafe_fn)]
#![warn(
    clippy::pedantic,
    clippy::cargo,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::todo,
    clippy::unimplemented,
    clippy::unwrap_used,
    clippy::unwrap_in_result,
    clippy::unneeded_field_pattern,
    clippy::rest_pat_in_fully_bound_structs,
    clippy::unnecessary_self_imports,
    clippy::str_to_string,
    clippy::string_to_string,
    clippy::string_slice,
    missing_docs,
    clippy::missing_docs_in_private_items,
    rustdoc::all,
    clippy::float_cmp_const,
    clippy::lossy_float_literal
)]
#![allow(clippy::doc_markdown, clippy::module_name_repetitions)]

mod cli;

#[allow(clippy::wildcard_imports)]
use cli::*;

use std::{
    collections::{BTreeSet, HashMap},
    fmt::{self, Display},
    fs,
    io,
    path::{Path, PathBuf},
    process::ExitCode,
    time::Instant,
};

use clap::Parser;
use colored::Colorize;
use image::{DynamicImage, GenericImageView};
use labelsync::{
    label_colors, Candidate, ConsistentLabeler, Label, LabelerConfig, Partition, Refinement,
    RelabelError, Relabeled,
};
use log::LevelFilter;
use palette::Srgb;

/// Record the running time of a function and print the elapsed time
macro_rules! time {
    ($name: literal, $verbose: expr, $func_call: expr) => {{
        let start = Instant::now();
        let result = $func_call;
        if $verbose || cfg!(feature = "time") {
            println!("{} took {}ms", $name, start.elapsed().as_millis());
        }
        result
    }};
}

/// Error cases for loading inputs, relabeling, and writing results
#[derive(Debug)]
enum LoadError {
    /// Failed to read a label file
    Read(PathBuf, io::Error),
    /// A label file does not contain a valid grid of labels
    Parse(PathBuf, String),
    /// Failed to read or decode a label image
    Image(PathBuf, image::ImageError),
    /// The inputs could not be relabeled
    Relabel(RelabelError),
    /// Failed to write a relabeled candidate
    Write(PathBuf, io::Error),
    /// Failed to save the highlighted reference
    SaveImage(PathBuf, image::ImageError),
    /// Failed to build the thread pool
    #[cfg(feature = "threads")]
    ThreadPool(rayon::ThreadPoolBuildError),
}

impl Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LoadError::Read(path, e) => write!(f, "Failed to read {}: {e}", path.display()),
            LoadError::Parse(path, e) => write!(f, "Failed to parse {}: {e}", path.display()),
            LoadError::Image(path, e) => {
                write!(f, "Failed to load the image file {}: {e}", path.display())
            }
            LoadError::Relabel(e) => write!(f, "Failed to relabel: {e}"),
            LoadError::Write(path, e) => write!(f, "Failed to write {}: {e}", path.display()),
            LoadError::SaveImage(path, e) => {
                write!(f, "Failed to save the image file {}: {e}", path.display())
            }
            #[cfg(feature = "threads")]
            LoadError::ThreadPool(e) => write!(f, "Failed to start the thread pool: {e}"),
        }
    }
}

impl From<RelabelError> for LoadError {
    fn from(e: RelabelError) -> Self {
        LoadError::Relabel(e)
    }
}

fn main() -> ExitCode {
    let options = Options::parse();

    env_logger::Builder::new()
        .filter_level(if options.verbose {
            LevelFilter::Info
        } else {
            LevelFilter::Warn
        })
        .parse_default_env()
        .init();

    let result = run_relabel_and_report(&options);

    // Returning Result<_> uses Debug printing instead of Display
    if let Err(e) = result {
        eprintln!("{e}");
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

/// Builds a thread pool and then runs `relabel_and_report`
#[cfg(feature = "threads")]
fn run_relabel_and_report(options: &Options) -> Result<(), LoadError> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(usize::from(options.threads))
        .build()
        .map_err(LoadError::ThreadPool)?;

    pool.install(|| relabel_and_report(options))
}

/// Runs `relabel_and_report` on a single thread
#[cfg(not(feature = "threads"))]
fn run_relabel_and_report(options: &Options) -> Result<(), LoadError> {
    relabel_and_report(options)
}

/// Load the inputs, align every candidate with the reference, and print or write the results
fn relabel_and_report(options: &Options) -> Result<(), LoadError> {
    // Input
    let (reference, candidates) = time!("Loading", options.verbose, load_inputs(options))?;

    let config = LabelerConfig::default()
        .with_anchors(options.anchors.clone())
        .with_consecutive(options.consecutive)
        .with_target_label_count(options.target_label_count.map(std::num::NonZeroUsize::get))
        .with_overlap_refinement(!options.no_overlap);

    let labeler = ConsistentLabeler::new(reference, candidates, config)?;

    if options.verbose {
        print_label_centers(labeler.reference());
    }

    // Processing
    let relabeled = time!("Relabeling", options.verbose, labeler.relabel())?;

    // Output
    print_label_sets(labeler.reference(), &relabeled, options.verbose);

    if let (Some(path), Some(&anchor)) = (&options.highlight, options.anchors.first()) {
        let image = labeler.viewer().highlight(anchor, options.buffer)?;
        image
            .save(path)
            .map_err(|e| LoadError::SaveImage(path.clone(), e))?;
    }

    if let Some(dir) = &options.output {
        fs::create_dir_all(dir).map_err(|e| LoadError::Write(dir.clone(), e))?;
        for candidate in &relabeled {
            let path = dir.join(format!("{}.csv", candidate.name));
            fs::write(&path, to_csv(&candidate.relabeled)).map_err(|e| LoadError::Write(path, e))?;
        }
    }

    Ok(())
}

/// Load the reference and every named candidate
fn load_inputs(options: &Options) -> Result<(Partition, Vec<Candidate>), LoadError> {
    let reference = load_partition(&options.reference, options.shape)?;

    let candidates = options
        .candidates
        .iter()
        .enumerate()
        .map(|(i, path)| {
            let partition = load_partition(path, options.shape)?;
            Ok(Candidate::new(candidate_name(&options.names, i, path), partition))
        })
        .collect::<Result<Vec<_>, LoadError>>()?;

    Ok((reference, candidates))
}

/// The name given on the command line, or else the file stem of the candidate's path
fn candidate_name(names: &[String], index: usize, path: &Path) -> String {
    names.get(index).cloned().unwrap_or_else(|| {
        path.file_stem().map_or_else(
            || format!("candidate{index}"),
            |stem| stem.to_string_lossy().into_owned(),
        )
    })
}

/// Load the labels at the given path, either from an image or from a text grid
fn load_partition(path: &Path, shape: Option<(usize, usize)>) -> Result<Partition, LoadError> {
    let partition = if image::ImageFormat::from_path(path).is_ok() {
        load_label_image(path, shape)?
    } else {
        let text = fs::read_to_string(path).map_err(|e| LoadError::Read(path.to_path_buf(), e))?;
        parse_partition(&text, shape).map_err(|e| LoadError::Parse(path.to_path_buf(), e))?
    };

    if partition.is_empty() {
        Err(LoadError::Parse(path.to_path_buf(), "no labels found".to_owned()))
    } else {
        Ok(partition)
    }
}

/// Load a grayscale image, using each pixel value as a label
fn load_label_image(path: &Path, shape: Option<(usize, usize)>) -> Result<Partition, LoadError> {
    let image = image::open(path).map_err(|e| LoadError::Image(path.to_path_buf(), e))?;

    let (width, height) = image.dimensions();
    let labels: Vec<Label> = match image {
        DynamicImage::ImageLuma8(image) => image.into_raw().into_iter().map(Label::from).collect(),
        DynamicImage::ImageLuma16(image) => image.into_raw().into_iter().map(Label::from).collect(),
        _ => {
            return Err(LoadError::Parse(
                path.to_path_buf(),
                "label images must be single channel grayscale".to_owned(),
            ))
        }
    };

    let (rows, cols) = shape.unwrap_or((height as usize, width as usize));
    Partition::new(rows, cols, labels).map_err(|e| LoadError::Parse(path.to_path_buf(), e.to_string()))
}

/// Parse a text grid, reshaping it if a shape is given
fn parse_partition(text: &str, shape: Option<(usize, usize)>) -> Result<Partition, String> {
    let rows = parse_grid(text)?;
    let partition = if let Some((row_count, col_count)) = shape {
        Partition::new(row_count, col_count, rows.into_iter().flatten().collect())
    } else {
        Partition::from_rows(&rows)
    };
    partition.map_err(|e| e.to_string())
}

/// Parse lines of labels separated by commas and/or whitespace.
///
/// Empty lines and lines starting with `#` are skipped.
fn parse_grid(text: &str) -> Result<Vec<Vec<Label>>, String> {
    text.lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
        .map(|(number, line)| {
            line.split(|c: char| c == ',' || c.is_whitespace())
                .filter(|value| !value.is_empty())
                .map(|value| {
                    parse_label(value)
                        .ok_or_else(|| format!("line {number}: `{value}` is not an integer label"))
                })
                .collect()
        })
        .collect()
}

/// Parse an integer label, also accepting integral floats such as `3.0` or `2.0e+00`
fn parse_label(value: &str) -> Option<Label> {
    value.parse::<Label>().ok().or_else(|| {
        let float = value.parse::<f64>().ok()?;
        // integral and within the range f64 represents exactly
        #[allow(clippy::cast_possible_truncation)]
        (float.fract() == 0.0 && float.abs() < 9.0e15).then_some(float as Label)
    })
}

/// Format a partition as comma separated rows
fn to_csv(partition: &Partition) -> String {
    partition
        .iter_rows()
        .map(|row| {
            let row = row.iter().map(ToString::to_string).collect::<Vec<_>>();
            format!("{}\n", row.join(","))
        })
        .collect()
}

/// Print the position of each reference label
fn print_label_centers(reference: &Partition) {
    println!("Reference label positions:");
    for (label, (row, col)) in reference.label_centers() {
        println!("{label:>6} at ({row},{col})");
    }
}

/// Print a name followed by its sorted labels, each label on its own color
fn print_labels(name: &str, labels: &BTreeSet<Label>, colors: &HashMap<Label, Srgb<u8>>) {
    let swatches = labels
        .iter()
        .map(|label| {
            let text = format!(" {label} ");
            match colors.get(label) {
                Some(color) => text
                    .black()
                    .on_truecolor(color.red, color.green, color.blue)
                    .to_string(),
                None => text,
            }
        })
        .collect::<String>();

    println!("{name:17} {swatches}");
}

/// Print the label set of the reference and every relabeled candidate
///
/// Labels shared between results get the same color.
/// In verbose mode, each candidate's original labels and overlap refinement outcome are printed as well.
fn print_label_sets(reference: &Partition, relabeled: &[Relabeled], verbose: bool) {
    let reference_labels = reference.distinct_labels();
    let mut all_labels = reference_labels.clone();
    for candidate in relabeled {
        all_labels.extend(candidate.relabeled.distinct_labels());
    }
    let colors = label_colors(&all_labels);

    print_labels("reference", &reference_labels, &colors);

    for candidate in relabeled {
        if verbose {
            let original = format!("{} (original)", candidate.name);
            print_labels(&original, &candidate.original.distinct_labels(), &HashMap::new());
        }

        print_labels(&candidate.name, &candidate.relabeled.distinct_labels(), &colors);

        if verbose {
            match &candidate.refinement {
                Some(Refinement::Applied(map)) => println!("{:17} overlap renamed {map}", ""),
                Some(Refinement::Unchanged) => println!("{:17} overlap left every label unchanged", ""),
                Some(Refinement::Rejected { target }) => println!(
                    "{:17} overlap map rejected since it renames a class to anchored label {target}",
                    ""
                ),
                None => {}
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn grids_accept_whitespace_commas_and_comments() {
        let text = "# reference labels\n0 0 1\n\n2,2, 1\n";
        assert_eq!(parse_grid(text).unwrap(), vec![vec![0, 0, 1], vec![2, 2, 1]]);
    }

    #[test]
    fn labels_accept_integral_floats() {
        assert_eq!(parse_label("-1"), Some(-1));
        assert_eq!(parse_label("3.0"), Some(3));
        assert_eq!(parse_label("2.000000000000000000e+00"), Some(2));
        assert_eq!(parse_label("2.5"), None);
        assert_eq!(parse_label("water"), None);
    }

    #[test]
    fn bad_label_reports_line() {
        let e = parse_grid("0 1\n1 x\n").unwrap_err();
        assert!(e.starts_with("line 2:"), "{e}");
    }

    #[test]
    fn ragged_grid_is_rejected() {
        assert!(parse_partition("0 1\n1\n", None).is_err());
    }

    #[test]
    fn single_column_is_reshaped() {
        let partition = parse_partition("0\n0\n1\n2\n2\n1\n", Some((2, 3))).unwrap();
        assert_eq!(partition.shape(), (2, 3));
        assert_eq!(partition.label_at((1, 0)).unwrap(), 2);
        assert!(parse_partition("0\n1\n2\n", Some((2, 2))).is_err());
    }

    #[test]
    fn csv_has_one_line_per_row() {
        let partition = Partition::from_rows(&[[0, -1, 2], [3, 4, 5]]).unwrap();
        assert_eq!(to_csv(&partition), "0,-1,2\n3,4,5\n");
    }

    #[test]
    fn names_fall_back_to_file_stem() {
        let names = vec!["kmeans".to_owned()];
        assert_eq!(candidate_name(&names, 0, Path::new("a/dbscan.txt")), "kmeans");
        assert_eq!(candidate_name(&names, 1, Path::new("a/dbscan.txt")), "dbscan");
    }

    #[test]
    #[cfg(feature = "png")]
    fn gray_images_keep_their_pixel_values() {
        let path = std::env::temp_dir().join("labelsync-gray-labels.png");
        image::GrayImage::from_raw(3, 2, vec![0, 1, 3, 3, 1, 0])
            .unwrap()
            .save(&path)
            .unwrap();

        let partition = load_partition(&path, None).unwrap();
        assert_eq!(partition.shape(), (2, 3));
        assert_eq!(partition.as_slice(), &[0, 1, 3, 3, 1, 0]);

        let reshaped = load_partition(&path, Some((3, 2))).unwrap();
        assert_eq!(reshaped.shape(), (3, 2));
    }

    #[test]
    #[cfg(feature = "png")]
    fn color_images_are_rejected() {
        let path = std::env::temp_dir().join("labelsync-color-labels.png");
        image::RgbImage::from_pixel(2, 2, image::Rgb([1, 2, 3]))
            .save(&path)
            .unwrap();

        assert!(matches!(load_partition(&path, None), Err(LoadError::Parse(..))));
    }

    #[test]
    fn text_inputs_are_aligned_with_the_reference() {
        let reference = parse_partition("0 0 1\n2 2 1\n", None).unwrap();
        let candidate = parse_partition("7,7,9\n8,8,9\n", None).unwrap();

        let labeler = ConsistentLabeler::new(
            reference,
            vec![Candidate::new("kmeans", candidate)],
            LabelerConfig::default().with_anchors(vec![(1, 0)]),
        )
        .unwrap();

        let relabeled = labeler.relabel().unwrap();
        assert_eq!(to_csv(&relabeled[0].relabeled), "0,0,1\n2,2,1\n");
    }
}
