use std::{hint::black_box, time::Duration};

use criterion::{criterion_main, Criterion};
use segmark_core::{
    codec::{decode, encode},
    OutputFormat,
};

fn sample_markdown(paragraphs: usize) -> String {
    (0..paragraphs)
        .map(|i| {
            format!(
                "**Section {i}** covers _the details_ of [the manual](https://example.org/{i}) \
                 as seen in [{i}](#page-{i}-1) and **_important_** remarks [\\[{i}\\]](#page-1-{i})."
            )
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn sample_html(paragraphs: usize) -> String {
    (0..paragraphs)
        .map(|i| {
            format!(
                "<b>Section {i}</b> covers <i>the details</i> of <a href=\"https://example.org/{i}\">\
                 the <i>manual</i></a> as seen in [{i}](#page-{i}-1) and <b><i>important</i></b> remarks."
            )
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn bench_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec");
    let markdown = sample_markdown(200);
    let html = sample_html(200);

    group.bench_function("encode_markdown", |b| {
        b.iter(|| encode(OutputFormat::Markdown, black_box(&markdown)))
    });
    group.bench_function("encode_html", |b| {
        b.iter(|| encode(OutputFormat::Html, black_box(&html)))
    });

    let encoded = encode(OutputFormat::Markdown, &markdown);
    group.bench_function("decode_markdown", |b| {
        b.iter(|| decode(black_box(&encoded.text), black_box(&encoded.maps)))
    });
    group.finish();
}

criterion::criterion_group! {
    name = benches;
    config = Criterion::default().measurement_time(Duration::from_secs(10));
    targets = bench_codec
}

criterion_main!(benches);
