use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::rc::Rc;

use crucible::commands::Command;
use crucible::engine::LuaEngine;
use crucible::registry::CommandRegistry;
use crucible::repl::tokenize;

struct NopCommand {
    name: String,
}

impl Command for NopCommand {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "does nothing"
    }

    fn run(&self, _registry: &mut CommandRegistry, _args: &[String]) {}
}

fn populated_registry(count: usize) -> CommandRegistry {
    let mut registry = CommandRegistry::new();
    for i in 0..count {
        registry.register_command(Rc::new(NopCommand {
            name: format!("command_{}", i),
        }));
    }
    registry
}

/// Benchmark command line tokenization
fn bench_tokenize(c: &mut Criterion) {
    let mut group = c.benchmark_group("tokenize");

    for words in &[1, 4, 16, 64] {
        group.bench_with_input(BenchmarkId::from_parameter(words), words, |b, &words| {
            let line = vec!["token"; words].join(" ");
            b.iter(|| tokenize(black_box(&line)));
        });
    }

    group.finish();
}

/// Benchmark command lookup in registries of growing size
fn bench_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("lookup");

    let registry = populated_registry(512);

    group.bench_function("hit", |b| {
        b.iter(|| registry.get_command(black_box("command_256")));
    });

    group.bench_function("miss", |b| {
        b.iter(|| registry.get_command(black_box("absent")));
    });

    group.finish();
}

/// Benchmark full dispatch of a no-op command
fn bench_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch");

    for count in &[8, 64, 512] {
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            let mut registry = populated_registry(count);
            let args = vec![format!("command_{}", count / 2)];

            b.iter(|| registry.dispatch(black_box(&args)));
        });
    }

    group.finish();
}

/// Benchmark sandboxed script evaluation
fn bench_script_eval(c: &mut Criterion) {
    let mut group = c.benchmark_group("script_eval");

    group.bench_function("arithmetic", |b| {
        let engine = LuaEngine::new(None).unwrap();
        b.iter(|| engine.execute(black_box("local x = 1 + 2 * 3")));
    });

    group.bench_function("string_building", |b| {
        let engine = LuaEngine::new(None).unwrap();
        b.iter(|| engine.execute(black_box("local s = string.rep('ab', 32)")));
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_tokenize,
    bench_lookup,
    bench_dispatch,
    bench_script_eval
);
criterion_main!(benches);
