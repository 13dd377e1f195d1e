//! Performance benchmarks for the DSP module
//!
//! Run with: cargo bench -p kestrel_dsp

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use kestrel_dsp::{make_low_cut_filter, ChainSettings, ChannelChain, FftDataGenerator, FftOrder, Slope};

fn steep_settings() -> ChainSettings {
    ChainSettings {
        low_cut_freq: 80.0,
        high_cut_freq: 12000.0,
        peak_freq: 1000.0,
        peak_gain_db: 6.0,
        peak_quality: 1.0,
        low_cut_slope: Slope::Slope48,
        high_cut_slope: Slope::Slope48,
    }
}

fn benchmark_chain_processing(c: &mut Criterion) {
    let mut group = c.benchmark_group("channel_chain");

    // Common buffer sizes in audio applications
    let buffer_sizes = [64, 128, 256, 512, 1024, 2048];

    for size in buffer_sizes {
        group.throughput(Throughput::Elements(size as u64));

        group.bench_function(format!("process_steep_{}_samples", size), |b| {
            let mut chain = ChannelChain::new();
            chain.prepare(48000.0, size);
            chain.configure(&steep_settings(), 48000.0).unwrap();
            let mut block: Vec<f32> = (0..size).map(|i| (i as f32 * 0.001).sin()).collect();

            b.iter(|| {
                chain.process(black_box(&mut block));
            });
        });

        group.bench_function(format!("process_gentle_{}_samples", size), |b| {
            let mut chain = ChannelChain::new();
            chain.prepare(48000.0, size);
            chain.configure(&ChainSettings::default(), 48000.0).unwrap();
            let mut block: Vec<f32> = (0..size).map(|i| (i as f32 * 0.001).sin()).collect();

            b.iter(|| {
                chain.process(black_box(&mut block));
            });
        });
    }

    group.finish();
}

fn benchmark_coefficient_update(c: &mut Criterion) {
    c.bench_function("chain_configure", |b| {
        let mut chain = ChannelChain::new();
        chain.prepare(48000.0, 512);
        let mut settings = steep_settings();

        b.iter(|| {
            // Simulate a knob sweep
            settings.peak_freq = 20.0 + (settings.peak_freq + 37.0) % 19980.0;
            chain.configure(black_box(&settings), 48000.0).unwrap();
        });
    });

    c.bench_function("make_low_cut_filter_48db", |b| {
        let settings = steep_settings();
        b.iter(|| black_box(make_low_cut_filter(black_box(&settings), 48000.0)));
    });
}

fn benchmark_fft(c: &mut Criterion) {
    for order in [FftOrder::Order2048, FftOrder::Order4096, FftOrder::Order8192] {
        c.bench_function(&format!("fft_produce_{}", order.size()), |b| {
            let mut generator = FftDataGenerator::new(order);
            let audio: Vec<f32> = (0..order.size()).map(|i| (i as f32 * 0.01).sin()).collect();
            b.iter(|| {
                let _ = black_box(generator.produce(black_box(&audio), -48.0));
            });
        });
    }
}

criterion_group!(
    benches,
    benchmark_chain_processing,
    benchmark_coefficient_update,
    benchmark_fft
);

criterion_main!(benches);
