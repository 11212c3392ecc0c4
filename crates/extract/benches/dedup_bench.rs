//! Benchmarks for fingerprinting and clustering
//!
//! Run with: cargo bench -p extract

use chrono::{Duration, TimeZone, Utc};
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use extract::{Deduplicator, Normalizer, dedup};
use holdwatch_core::{Config, Holding, Market, RawArticle, RunContext, RunMode};
use std::hint::black_box;
use std::sync::Arc;

const COMPANIES: &[(&str, &str)] = &[
  ("INFY", "Infosys"),
  ("TCS", "Tata Consultancy"),
  ("AAPL", "Apple"),
  ("NVDA", "Nvidia"),
  ("MSFT", "Microsoft"),
];

const EVENTS: &[&str] = &[
  "wins $2B deal",
  "secures $2 billion contract",
  "reports quarterly earnings",
  "faces lawsuit over patents",
  "announces share buyback",
  "shares jump on upgrade",
];

fn holdings() -> Vec<Holding> {
  COMPANIES
    .iter()
    .map(|(ticker, name)| Holding::new(*ticker, *name, Market::Us, 1.0))
    .collect()
}

fn generate_articles(count: usize) -> Vec<RawArticle> {
  let base = Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap();
  (0..count)
    .map(|i| {
      let (_, name) = COMPANIES[i % COMPANIES.len()];
      let event = EVENTS[(i / COMPANIES.len()) % EVENTS.len()];
      RawArticle::new(format!("source-{}", i % 7), format!("{} {}", name, event))
        .with_url(format!("https://news.example/{}", i))
        .with_published(base - Duration::hours((i % 48) as i64))
        .with_body(format!(
          "{} {}. Analysts said the move was expected. Report number {} in the sample feed.",
          name, event, i
        ))
    })
    .collect()
}

fn bench_simhash(c: &mut Criterion) {
  let mut group = c.benchmark_group("simhash");

  for size in [100, 500, 1000, 2000].iter() {
    let content = "market news ".repeat(*size / 12 + 1);
    group.throughput(Throughput::Bytes(content.len() as u64));
    group.bench_with_input(BenchmarkId::from_parameter(size), &content, |b, content| {
      b.iter(|| dedup::simhash(black_box(content)));
    });
  }

  group.finish();
}

fn bench_normalize(c: &mut Criterion) {
  let mut group = c.benchmark_group("normalize");
  let config = Config::default();
  let normalizer = Normalizer::new(&holdings(), &config.normalize, &config.dedup);
  let ctx = RunContext::new(RunMode::Daily, Utc::now());

  for count in [50, 200].iter() {
    let articles = generate_articles(*count);
    group.throughput(Throughput::Elements(*count as u64));
    group.bench_with_input(BenchmarkId::from_parameter(count), &articles, |b, articles| {
      b.iter(|| normalizer.normalize_all(black_box(articles.clone()), &ctx).count());
    });
  }

  group.finish();
}

fn bench_cluster(c: &mut Criterion) {
  let mut group = c.benchmark_group("cluster");
  let config = Config::default();
  let normalizer = Normalizer::new(&holdings(), &config.normalize, &config.dedup);
  let ctx = RunContext::new(RunMode::Weekly, Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap());
  let dedup = Deduplicator::new(&config.dedup);

  for count in [100, 500, 1000].iter() {
    let articles: Vec<_> = normalizer
      .normalize_all(generate_articles(*count), &ctx)
      .map(Arc::new)
      .collect();
    group.throughput(Throughput::Elements(*count as u64));
    group.bench_with_input(BenchmarkId::from_parameter(count), &articles, |b, articles| {
      b.iter(|| dedup.cluster(black_box(articles)));
    });
  }

  group.finish();
}

criterion_group!(benches, bench_simhash, bench_normalize, bench_cluster);
criterion_main!(benches);
