//! Benchmarks for parsing and analysis
//!
//! Run with: cargo bench --bench analysis_bench

use annolint::analysis::{CancellationToken, LintEngine};
use annolint::ast::{Language, SourceUnit};
use annolint::config::Config;
use annolint::parse_source;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use std::path::PathBuf;

/// Generate a Java class with N annotated methods and N callers
fn generate_java_class(index: usize, methods: usize) -> String {
    let declarations: String = (0..methods)
        .map(|i| {
            format!(
                "    @WorkerThread static void load{i}(@IntRange(from = 0, to = {max}) int value, @Mode int mode) {{}}\n",
                max = i + 10
            )
        })
        .collect();
    let calls: String = (0..methods)
        .map(|i| {
            format!(
                "        int v{i} = {value};\n        if (flag) {{ v{i} = v{i} + 1; }}\n        load{i}(v{i}, MODE_A);\n",
                value = i % 15
            )
        })
        .collect();

    format!(
        r#"package bench.pkg;

import androidx.annotation.IntDef;
import androidx.annotation.IntRange;
import androidx.annotation.UiThread;
import androidx.annotation.WorkerThread;

public class Generated{index} {{
    public static final int MODE_A = 0;
    public static final int MODE_B = 1;
    @IntDef({{MODE_A, MODE_B}}) @interface Mode {{}}

{declarations}
    @UiThread
    void run(boolean flag) {{
{calls}    }}
}}
"#
    )
}

fn parse_units(files: usize, methods: usize) -> Vec<SourceUnit> {
    (0..files)
        .filter_map(|i| {
            let path = PathBuf::from(format!("src/main/java/bench/pkg/Generated{i}.java"));
            parse_source(&path, Language::Java, &generate_java_class(i, methods)).ok()
        })
        .collect()
}

/// Benchmark parsing a single generated class
fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_java");

    for methods in [10, 50, 200].iter() {
        let source = generate_java_class(0, *methods);
        let path = PathBuf::from("Generated0.java");

        group.throughput(Throughput::Elements(*methods as u64));
        group.bench_with_input(BenchmarkId::from_parameter(methods), methods, |b, _| {
            b.iter(|| parse_source(black_box(&path), Language::Java, black_box(&source)));
        });
    }

    group.finish();
}

/// Benchmark indexing plus detectors over many files
fn bench_analyze(c: &mut Criterion) {
    let mut group = c.benchmark_group("analyze");
    group.sample_size(20);

    for files in [10, 50].iter() {
        let units = parse_units(*files, 20);

        group.throughput(Throughput::Elements(*files as u64));
        group.bench_with_input(BenchmarkId::new("sequential", files), &units, |b, units| {
            let engine = LintEngine::new(Config::default()).with_parallel(false);
            b.iter(|| engine.analyze(black_box(units), &CancellationToken::new()));
        });
        group.bench_with_input(BenchmarkId::new("parallel", files), &units, |b, units| {
            let engine = LintEngine::new(Config::default()).with_parallel(true);
            b.iter(|| engine.analyze(black_box(units), &CancellationToken::new()));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_parse, bench_analyze);
criterion_main!(benches);
