use criterion::{black_box, criterion_group, criterion_main, Criterion};

use mzpeaks::{CentroidPeak, PeakSet};

use mzflash::utils::{mass_charge_ratio, ISOTOPE_MASSDIFF};
use mzflash::{
    CentroidSpectrum, DeconvolutionParams, DeconvolutionSession, IsotopeEnvelopeModel,
    PrecomputedAveragine, ScanPolarity, SpectrumDescription,
};

/// A spectrum of several proteins, each spread over a run of charge states with
/// averagine isotope envelopes and a scatter of low-level noise peaks
fn synthetic_spectrum(index: usize) -> CentroidSpectrum {
    let model = PrecomputedAveragine::with_max_mass(60_000.0);
    let mut peaks = Vec::new();
    for (k, mass) in [8_000.0, 12_500.0, 16_950.0, 23_400.0, 31_200.0]
        .into_iter()
        .enumerate()
    {
        let envelope = model.envelope(mass);
        let apex_charge = (mass / 1_000.0) as i32 + 2;
        for z in (apex_charge - 6)..=(apex_charge + 6) {
            let scale = 1e5 * (1.0 + k as f32) / (1.0 + (z - apex_charge).abs() as f32);
            for (i, abundance) in envelope.iter().enumerate() {
                let mz = mass_charge_ratio(mass + i as f64 * ISOTOPE_MASSDIFF, z);
                peaks.push(CentroidPeak::new(mz, scale * *abundance as f32, 0));
            }
        }
    }
    let mut state = 0x2545f491u32.wrapping_add(index as u32);
    for _ in 0..2_000 {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        let mz = 400.0 + (state % 1_600_000) as f64 / 1_000.0;
        peaks.push(CentroidPeak::new(mz, (state % 500) as f32 + 10.0, 0));
    }
    let description = SpectrumDescription::new(
        format!("scan={}", index + 1),
        index,
        1,
        ScanPolarity::Positive,
    );
    CentroidSpectrum::new(description, PeakSet::new(peaks))
}

fn params() -> DeconvolutionParams {
    DeconvolutionParams::default()
        .with_charge_range(1, 50)
        .with_mass_range(1_000.0, 50_000.0)
}

fn single_spectrum(c: &mut Criterion) {
    let spectrum = synthetic_spectrum(0);
    let mut session = DeconvolutionSession::new(params()).unwrap();
    c.bench_function("deconvolve_single_spectrum", |b| {
        b.iter(|| {
            session.reset_history();
            session.deconvolve_spectrum(black_box(&spectrum)).unwrap()
        })
    });
}

fn run_with_history(c: &mut Criterion) {
    let spectra: Vec<_> = (0..10).map(synthetic_spectrum).collect();
    c.bench_function("deconvolve_run_with_history", |b| {
        b.iter(|| {
            let mut session = DeconvolutionSession::new(params()).unwrap();
            let total: usize = spectra
                .iter()
                .map(|s| session.deconvolve_spectrum(black_box(s)).unwrap().len())
                .sum();
            total
        })
    });
}

criterion_group!(benches, single_spectrum, run_with_history);
criterion_main!(benches);
