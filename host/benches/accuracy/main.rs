use criterion::{
    black_box, criterion_group, criterion_main, measurement::Measurement, BenchmarkId, Criterion,
    Throughput,
};
use host::stats::compute_ber;
use inferb::{InferConfig, Inferrer};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

#[cfg(feature = "simulated")]
type Bench = inferb::SimulatedPlatform;
#[cfg(not(feature = "simulated"))]
type Bench = inferb::NativePlatform;

#[cfg(feature = "simulated")]
fn platform() -> Bench {
    inferb::SimulatedPlatform::new()
}

#[cfg(not(feature = "simulated"))]
fn platform() -> Bench {
    inferb::NativePlatform::detect().expect("cache timing is unavailable")
}

/// Values are bit error rates in percent, not durations.
struct BerMeasurement;
struct BerFormatter;

impl criterion::measurement::ValueFormatter for BerFormatter {
    fn format_value(&self, value: f64) -> String {
        format!("{:.6} ber", value)
    }

    fn format_throughput(&self, _throughput: &Throughput, value: f64) -> String {
        format!("{:.6} ber", value)
    }

    fn scale_values(&self, _typical: f64, _values: &mut [f64]) -> &'static str {
        "%"
    }

    fn scale_throughputs(
        &self,
        _typical: f64,
        _throughput: &Throughput,
        _values: &mut [f64],
    ) -> &'static str {
        "%"
    }

    fn scale_for_machines(&self, _values: &mut [f64]) -> &'static str {
        "%"
    }
}

impl Measurement for BerMeasurement {
    type Intermediate = f64;
    type Value = f64;

    fn start(&self) -> Self::Intermediate {
        0.0
    }

    fn end(&self, i: Self::Intermediate) -> Self::Value {
        i
    }

    fn add(&self, v1: &Self::Value, v2: &Self::Value) -> Self::Value {
        *v1 + *v2
    }

    fn zero(&self) -> Self::Value {
        0.0
    }

    fn to_f64(&self, val: &Self::Value) -> f64 {
        *val
    }

    fn formatter(&self) -> &dyn criterion::measurement::ValueFormatter {
        &BerFormatter
    }
}

fn inferrer(iterations: u32) -> Inferrer<Bench> {
    let config = InferConfig::default().with_iterations(iterations);
    Inferrer::new(platform(), config).expect("invalid configuration")
}

// BER of one random byte, inferred back
fn exfiltrate_and_compute_ber(inferrer: &Inferrer<Bench>, rnd: &mut SmallRng) -> f64 {
    let original: u8 = rnd.gen();
    let exfiltrated = inferrer.infer(&original).expect("inference failed").value;
    compute_ber(&[original], &[exfiltrated])
}

fn bench_ber(c: &mut Criterion<BerMeasurement>) {
    let mut group = c.benchmark_group("ber");
    group.sample_size(10);

    for iterations in [1u32, 5, 20] {
        let inferrer = inferrer(iterations);
        let mut rnd = SmallRng::seed_from_u64(u64::from(iterations));
        group.bench_function(BenchmarkId::new("iterations", iterations), |b| {
            b.iter_custom(|iters| {
                let mut total_ber = 0.0;
                for _ in 0..iters {
                    total_ber += black_box(exfiltrate_and_compute_ber(&inferrer, &mut rnd));
                }
                total_ber
            })
        });
    }

    group.finish();
}

fn bench_latency(c: &mut Criterion) {
    let mut group = c.benchmark_group("infer");
    group.sample_size(10);

    for iterations in [1u32, 5, 20] {
        let inferrer = inferrer(iterations);
        let secret = 42u8;
        group.bench_function(BenchmarkId::new("iterations", iterations), |b| {
            b.iter(|| inferrer.infer(black_box(&secret)).expect("inference failed"))
        });
    }

    group.finish();
}

criterion_group! {
    name = accuracy;
    config = Criterion::default().with_measurement(BerMeasurement);
    targets = bench_ber
}
criterion_group!(latency, bench_latency);
criterion_main!(accuracy, latency);
