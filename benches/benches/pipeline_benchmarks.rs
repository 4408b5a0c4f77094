//! Front-end pipeline benchmarks:
//! - lexer throughput (bytes/second)
//! - parser throughput
//! - validation
//! - canonical compilation
//! - semantic token encoding

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use prose::CompileOptions;
use prose_benchmarks::fixtures;

fn bench_lexer(c: &mut Criterion) {
    let mut group = c.benchmark_group("lexer_throughput");

    for (name, source) in fixtures() {
        group.throughput(Throughput::Bytes(source.len() as u64));
        group.bench_with_input(BenchmarkId::new("tokenize", name), &source, |b, source| {
            b.iter(|| black_box(prose::tokenize(black_box(source))))
        });
    }

    group.finish();
}

fn bench_parser(c: &mut Criterion) {
    let mut group = c.benchmark_group("parser_throughput");

    for (name, source) in fixtures() {
        group.throughput(Throughput::Bytes(source.len() as u64));
        group.bench_with_input(BenchmarkId::new("parse", name), &source, |b, source| {
            b.iter(|| black_box(prose::parse(black_box(source))))
        });
    }

    group.finish();
}

fn bench_validator(c: &mut Criterion) {
    let mut group = c.benchmark_group("validator");

    for (name, source) in fixtures() {
        let program = prose::parse(&source).program;
        group.throughput(Throughput::Elements(program.statements.len() as u64));
        group.bench_with_input(BenchmarkId::new("validate", name), &program, |b, program| {
            b.iter(|| black_box(prose::validate(black_box(program))))
        });
    }

    group.finish();
}

fn bench_compiler(c: &mut Criterion) {
    let mut group = c.benchmark_group("compiler");
    let options = CompileOptions::default();

    for (name, source) in fixtures() {
        let program = prose::parse(&source).program;
        group.bench_with_input(BenchmarkId::new("compile", name), &program, |b, program| {
            b.iter(|| black_box(prose::compile(black_box(program), &options)))
        });
    }

    group.finish();
}

fn bench_semantic_tokens(c: &mut Criterion) {
    let mut group = c.benchmark_group("semantic_tokens");

    for (name, source) in fixtures() {
        let program = prose::parse(&source).program;
        group.bench_with_input(BenchmarkId::new("encode", name), &program, |b, program| {
            b.iter(|| black_box(prose::get_encoded_semantic_tokens(black_box(program))))
        });
    }

    group.finish();
}

fn bench_full_pipeline(c: &mut Criterion) {
    let source = prose_benchmarks::MEDIUM_PROGRAM;
    let options = CompileOptions::default();

    c.bench_function("check_and_compile_medium", |b| {
        b.iter(|| {
            let report = prose::check("medium.prose", black_box(source));
            black_box(prose::compile(&report.program, &options))
        })
    });
}

criterion_group!(
    benches,
    bench_lexer,
    bench_parser,
    bench_validator,
    bench_compiler,
    bench_semantic_tokens,
    bench_full_pipeline,
);
criterion_main!(benches);
