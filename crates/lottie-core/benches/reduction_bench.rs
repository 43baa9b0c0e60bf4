use criterion::{black_box, criterion_group, criterion_main, Criterion};
use glam::Vec4;
use lottie_core::animatable::KeyFrame;
use lottie_core::optimization::{optimize_gradient_stops, remove_redundant_keyframes, RawStop};
use lottie_core::{reduce_composition, ReductionConfig};
use lottie_data::model::LottieJson;
use serde_json::json;

fn plateau_keyframes(count: usize) -> Vec<KeyFrame<f32>> {
    (0..count)
        .map(|i| KeyFrame::linear(i as f32, ((i / 8) % 2) as f32 * 100.0))
        .collect()
}

fn gradient(count: usize) -> Vec<RawStop> {
    let mut stops = Vec::with_capacity(count * 2);
    for i in 0..count {
        let t = i as f32 / (count - 1) as f32;
        stops.push(RawStop::Color {
            offset: t,
            color: Vec4::new(t, 1.0 - t, 0.5, 1.0),
        });
        stops.push(RawStop::Opacity {
            offset: t,
            opacity: 1.0,
        });
    }
    stops
}

fn composition(layers: usize) -> LottieJson {
    let keyframes: Vec<_> = (0..40)
        .map(|i| json!({ "t": i * 3, "s": [((i / 5) % 2) * 100], "o": { "x": 0, "y": 0 }, "i": { "x": 1, "y": 1 } }))
        .collect();
    let layers: Vec<_> = (0..layers)
        .map(|i| {
            json!({
                "ty": 4, "ind": i + 1, "ip": 0, "op": 120, "st": 0,
                "ks": { "o": { "a": 1, "k": keyframes.clone() } },
                "shapes": [{ "ty": "el", "p": { "a": 0, "k": [0, 0] }, "s": { "a": 0, "k": [10, 10] } }]
            })
        })
        .collect();
    serde_json::from_value(json!({
        "v": "5.7.0", "fr": 30, "ip": 0, "op": 120, "w": 100, "h": 100, "layers": layers
    }))
    .expect("bench fixture parses")
}

fn bench_keyframes(c: &mut Criterion) {
    let keyframes = plateau_keyframes(1000);
    c.bench_function("remove_redundant_keyframes 1000", |b| {
        b.iter(|| remove_redundant_keyframes(black_box(&keyframes)))
    });
}

fn bench_gradients(c: &mut Criterion) {
    let stops = gradient(64);
    c.bench_function("optimize_gradient_stops 64", |b| {
        b.iter(|| optimize_gradient_stops(black_box(&stops)))
    });
}

fn bench_composition(c: &mut Criterion) {
    let lottie = composition(50);
    let config = ReductionConfig::default();
    c.bench_function("reduce_composition 50 layers", |b| {
        b.iter(|| {
            let mut lottie = lottie.clone();
            reduce_composition(black_box(&mut lottie), &config)
        })
    });
}

criterion_group!(benches, bench_keyframes, bench_gradients, bench_composition);
criterion_main!(benches);
