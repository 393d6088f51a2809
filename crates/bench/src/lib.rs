use std::time::Duration;

use criterion::BenchmarkGroup;
use criterion::measurement::Measurement;
use rand::SeedableRng;
use rand::rngs::StdRng;

const QUICK_SAMPLE_SIZE: usize = 15;
const QUICK_WARM_UP_MS: u64 = 100;
const QUICK_MEASURE_MS: u64 = 250;
const THOROUGH_SAMPLE_SIZE: usize = 10;
const THOROUGH_WARM_UP_MS: u64 = 600;
const THOROUGH_MEASURE_MS: u64 = 1200;
const RNG_SEED: u64 = 0x5EED_2026;

/// Short runs for cheap per-iteration workloads.
pub fn apply_quick_config<M: Measurement>(group: &mut BenchmarkGroup<'_, M>) {
    group.sample_size(QUICK_SAMPLE_SIZE);
    group.warm_up_time(Duration::from_millis(QUICK_WARM_UP_MS));
    group.measurement_time(Duration::from_millis(QUICK_MEASURE_MS));
}

/// Longer runs for workloads dominated by large-tree churn.
pub fn apply_thorough_config<M: Measurement>(group: &mut BenchmarkGroup<'_, M>) {
    group.sample_size(THOROUGH_SAMPLE_SIZE);
    group.warm_up_time(Duration::from_millis(THOROUGH_WARM_UP_MS));
    group.measurement_time(Duration::from_millis(THOROUGH_MEASURE_MS));
}

/// Deterministic rng; `stream` keeps unrelated benchmarks decorrelated.
pub fn seeded_rng(stream: u64) -> StdRng {
    StdRng::seed_from_u64(RNG_SEED ^ stream.wrapping_mul(0x9E37_79B9_7F4A_7C15))
}
