use criterion::{criterion_group, criterion_main, Criterion};
use std::path::Path;

use rr2opml::model::story::Story;

fn bench_parse_notification(c: &mut Criterion) {
    let fixture_path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("notification.eml");
    let raw = std::fs::read(&fixture_path).unwrap();

    c.bench_function("parse_notification", |b| {
        b.iter(|| rr2opml::parser::notification::parse_notification(&raw))
    });

    let notification = rr2opml::parser::notification::parse_notification(&raw);
    c.bench_function("extract_title_and_url", |b| {
        b.iter(|| {
            let title = notification
                .bodies()
                .find_map(rr2opml::resolver::patterns::extract_title);
            let url = notification
                .bodies()
                .find_map(rr2opml::resolver::patterns::first_url);
            (title, url.map(str::len))
        })
    });
}

fn bench_render_opml(c: &mut Criterion) {
    let stories: Vec<Story> = (1..=500)
        .map(|i| Story {
            id: i,
            external_id: 10_000 + i as u64,
            title: format!("Story number {i}"),
            feed_url: format!("https://www.royalroad.com/syndication/{}", 10_000 + i),
        })
        .collect();

    c.bench_function("render_opml_500", |b| {
        b.iter(|| rr2opml::export::opml::render_opml(&stories).unwrap())
    });
}

criterion_group!(benches, bench_parse_notification, bench_render_opml);
criterion_main!(benches);
