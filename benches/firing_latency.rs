use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

use pagerule::domain::{Element, EventMeta, Rule, RuleComponent, RuleRef, SyntheticEvent};
use pagerule::engine::{normalize_synthetic_event, ExecutionContext, RuleEngine};
use pagerule::observability::{LogLevel, LogSink, Logger};
use pagerule::registry::{ModuleDefinition, ModuleExports, ModuleRegistry, RegistryEnvironment};
use pagerule::tokens::{DataElementTokens, TokenReplacer};

/// Discards every line so benchmarks measure the engine, not the sink.
struct NullSink;

impl LogSink for NullSink {
    fn write(&self, _level: LogLevel, _message: &str) {}
}

fn create_registry() -> ModuleRegistry {
    let mut data = HashMap::new();
    data.insert("env".to_string(), json!("production"));

    let environment = RegistryEnvironment {
        tokens: Arc::new(DataElementTokens::new(data)),
        ..Default::default()
    };
    let registry = ModuleRegistry::with_environment(Logger::new(Arc::new(NullSink)), environment);

    for i in 0..4 {
        registry.register(
            ModuleDefinition::new(format!("bench/conditions/c{}", i), "bench", format!("c{}", i)),
            |_| {
                Ok(ModuleExports::condition(|settings, _, _| {
                    Ok(settings["env"] == "production")
                }))
            },
        );
        registry.register(
            ModuleDefinition::new(format!("bench/actions/a{}", i), "bench", format!("a{}", i)),
            |_| Ok(ModuleExports::action(|_, _, _| Ok(()))),
        );
    }

    registry.hydrate();
    registry
}

fn create_rule() -> Rule {
    let mut rule = Rule::new("RL1", "Bench rule");
    for i in 0..4 {
        rule = rule
            .with_condition(
                RuleComponent::new(format!("bench/conditions/c{}", i))
                    .with_settings(json!({"env": "%env%"})),
            )
            .with_action(RuleComponent::new(format!("bench/actions/a{}", i)));
    }
    rule
}

fn bench_memoized_resolve(c: &mut Criterion) {
    let registry = create_registry();

    c.bench_function("registry_resolve_memoized", |b| {
        b.iter(|| registry.resolve(black_box("bench/conditions/c0")))
    });
}

fn bench_normalize(c: &mut Criterion) {
    let meta = EventMeta::new("bench.click", RuleRef::new("RL1", "Bench rule"));
    let event = SyntheticEvent::plain().into_shared();

    c.bench_function("normalize_existing_event", |b| {
        b.iter(|| normalize_synthetic_event(black_box(&meta), Some(event.clone())))
    });
}

fn bench_token_replacement(c: &mut Criterion) {
    let mut data = HashMap::new();
    data.insert("env".to_string(), json!("production"));
    let tokens = DataElementTokens::new(data);
    let settings = json!({"label": "env=%env%", "value": "%env%", "nested": ["%this.id%"]});
    let element = Element::new("button").with_id("buy");

    c.bench_function("token_replacement", |b| {
        b.iter(|| tokens.replace(black_box(&settings), Some(&element), None))
    });
}

fn bench_full_firing(c: &mut Criterion) {
    let engine = RuleEngine::new(
        create_registry(),
        ExecutionContext::default(),
        Logger::new(Arc::new(NullSink)),
    );
    let rule = create_rule();
    let event = SyntheticEvent::plain().into_shared();

    c.bench_function("full_firing_4_conditions_4_actions", |b| {
        b.iter(|| engine.execute(black_box(&rule), None, &event))
    });
}

criterion_group!(
    benches,
    bench_memoized_resolve,
    bench_normalize,
    bench_token_replacement,
    bench_full_firing,
);
criterion_main!(benches);
