//! Effect chain benchmarks
//!
//! Chains run over a full Martin M1 transmission (~114 s, ~5M samples).

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use sstv_glitch::dsp::{presets, EffectContext, EffectKind, EffectSpec};
use sstv_glitch::sstv::modes::MARTIN_M1;
use sstv_glitch::sstv::{encode, RgbImage};

fn transmission() -> sstv_glitch::engine::AudioBuffer {
    let image = RgbImage::filled(MARTIN_M1.width, MARTIN_M1.height, [128, 128, 128]);
    encode(&image, &MARTIN_M1, 44100).unwrap()
}

fn benchmark_single_effects(c: &mut Criterion) {
    let buffer = transmission();
    let ctx = EffectContext::for_mode(&MARTIN_M1, 0.0);

    for kind in [
        EffectKind::PhaseModulation,
        EffectKind::ScanlineCorruption,
        EffectKind::FrequencyShift,
        EffectKind::Bandpass,
    ] {
        let effect = EffectSpec::new(kind).with_seed(1);
        c.bench_function(&format!("{}_m1", kind.name()), |b| {
            b.iter(|| effect.apply(black_box(&buffer), &ctx))
        });
    }
}

fn benchmark_presets(c: &mut Criterion) {
    let buffer = transmission();
    let ctx = EffectContext::for_mode(&MARTIN_M1, 0.0);

    for name in ["Vintage VHS", "Total Chaos"] {
        let chain = presets::by_name(name).unwrap().with_seed(7);
        c.bench_function(&format!("preset_{}_m1", name), |b| {
            b.iter(|| chain.apply(black_box(&buffer), &ctx))
        });
    }
}

criterion_group!(benches, benchmark_single_effects, benchmark_presets);
criterion_main!(benches);
