use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use wayfinder::render::{Stage, render};

fn build_message(paragraphs: usize) -> String {
    let mut text = String::new();
    for i in 0..paragraphs {
        text.push_str(&format!(
            "The **Block {i}** office is open *weekdays*. Visit https://campus.edu/blocks/{i} \
             or mail block{i}@campus.edu, phone +91 194 2451{:03}.\n\
             - Room {i}01 <lab>\n\
             - Room {i}02 & annex\n\n",
            i % 1000
        ));
    }
    text
}

fn bench_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("render");

    for size in [1usize, 10, 100] {
        let message = build_message(size);

        group.bench_with_input(BenchmarkId::from_parameter(size), &message, |b, message| {
            b.iter(|| black_box(render(black_box(message))));
        });
    }

    group.finish();
}

fn bench_stages(c: &mut Criterion) {
    let mut group = c.benchmark_group("render_stage");
    let message = build_message(10);

    for stage in Stage::PIPELINE {
        group.bench_function(stage.name(), |b| {
            b.iter(|| black_box(stage.apply(black_box(&message))));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_render, bench_stages);
criterion_main!(benches);
