use criterion::{
	black_box, criterion_group, criterion_main, measurement::WallTime, BenchmarkGroup, BenchmarkId, Criterion,
	SamplingMode,
};
use labelsync::{Candidate, ClusterLabels, ConsistentLabeler, LabelMap, LabelerConfig, Partition};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use std::time::Duration;

const SHAPES: [(usize, usize); 3] = [(83, 86), (610, 340), (1024, 1024)];

/// A blocky partition resembling a segmentation result with `k` clusters
fn blocky_partition(rows: usize, cols: usize, k: i64, seed: u64) -> Partition {
	let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
	let block = 16;
	let block_cols = cols.div_ceil(block);
	let blocks = (0..rows.div_ceil(block) * block_cols)
		.map(|_| rng.gen_range(0..k))
		.collect::<Vec<_>>();

	let labels = (0..rows)
		.flat_map(|row| (0..cols).map(move |col| (row, col)))
		.map(|(row, col)| blocks[(row / block) * block_cols + col / block])
		.collect();

	Partition::new(rows, cols, labels).expect("rows * cols labels")
}

fn create_group<'a>(c: &'a mut Criterion, name: &'a str) -> BenchmarkGroup<'a, WallTime> {
	let mut group = c.benchmark_group(name);
	group
		.sample_size(30)
		.noise_threshold(0.05)
		.sampling_mode(SamplingMode::Flat)
		.warm_up_time(Duration::from_millis(500));
	group
}

fn apply_map(c: &mut Criterion) {
	let mut group = create_group(c, "apply_map");

	for (rows, cols) in SHAPES {
		let partition = blocky_partition(rows, cols, 8, 0);
		let map = LabelMap::from(vec![(0, 3), (3, 9), (5, 1), (7, 0)]);

		group.bench_with_input(
			BenchmarkId::from_parameter(format!("{rows}x{cols}")),
			&partition,
			|b, partition| {
				b.iter(|| {
					let mut labels = ClusterLabels::new(partition.clone());
					labels.apply_map(black_box(&map)).expect("valid map");
					labels
				});
			},
		);
	}
}

fn overlap_refine(c: &mut Criterion) {
	let mut group = create_group(c, "overlap_refine");

	for (rows, cols) in SHAPES {
		let partition = blocky_partition(rows, cols, 8, 0);
		let reference = blocky_partition(rows, cols, 8, 1);

		group.bench_with_input(
			BenchmarkId::from_parameter(format!("{rows}x{cols}")),
			&(partition, reference),
			|b, (partition, reference)| {
				b.iter(|| {
					let mut labels = ClusterLabels::new(partition.clone());
					labels.overlap_refine(black_box(reference)).expect("same shape")
				});
			},
		);
	}
}

fn compress(c: &mut Criterion) {
	let mut group = create_group(c, "compress_to_consecutive");

	for (rows, cols) in SHAPES {
		let partition = blocky_partition(rows, cols, 40, 0);

		group.bench_with_input(
			BenchmarkId::from_parameter(format!("{rows}x{cols}")),
			&partition,
			|b, partition| {
				b.iter(|| {
					let mut labels = ClusterLabels::new(partition.clone());
					labels.compress_to_consecutive(black_box(Some(6))).expect("pure rename")
				});
			},
		);
	}
}

fn labeler(c: &mut Criterion) {
	let mut group = create_group(c, "labeler");
	group.measurement_time(Duration::from_secs(4));

	for (rows, cols) in SHAPES {
		let reference = blocky_partition(rows, cols, 6, 0);
		let candidates = (1..=5)
			.map(|seed| Candidate::new(format!("{seed}"), blocky_partition(rows, cols, 6, seed)))
			.collect::<Vec<_>>();

		let config = LabelerConfig::default()
			.with_anchors(vec![(5, 5), (rows / 2, cols / 2), (rows - 1, cols - 1)])
			.with_consecutive(true);

		let labeler = ConsistentLabeler::new(reference, candidates, config).expect("valid config");

		group.bench_with_input(
			BenchmarkId::from_parameter(format!("{rows}x{cols}")),
			&labeler,
			|b, labeler| b.iter(|| labeler.relabel().expect("relabeled")),
		);
	}
}

criterion_group!(benches, apply_map, overlap_refine, compress, labeler);
criterion_main!(benches);
