//! Fallback path benchmarks
//!
//! Measures the non-network parts of the fallback path: chain construction
//! over an in-memory registry, request building, and config parsing. Chain
//! construction sits on the hot path of every failed request, so it should
//! stay in the low-microsecond range.
//!
//! Run with: `cargo bench`

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use routeguard::config::{Config, FallbackSettings};
use routeguard::fallback::FallbackManager;
use routeguard::registry::{ProviderRegistry, ProviderSpec, RuntimeSpec};
use routeguard::request::{PrivacyLevel, RoutingRequest, TaskType};
use routeguard::router::{Router, RoutingPolicy};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

fn seeded_manager(rt: &tokio::runtime::Runtime) -> FallbackManager {
    rt.block_on(async {
        let registry = Arc::new(ProviderRegistry::new());
        for (name, priority) in [
            ("openai", 90u8),
            ("gemini", 70),
            ("deepseek", 50),
            ("local", 60),
            ("huggingface", 40),
        ] {
            registry
                .register_provider(
                    ProviderSpec::new(name)
                        .with_capabilities(["streaming"])
                        .with_fallback_priority(priority),
                )
                .await;
        }
        registry
            .register_runtime(RuntimeSpec::new("llama.cpp"))
            .await;

        let router = Arc::new(Router::new(registry.clone(), RoutingPolicy::default()));
        let settings = FallbackSettings::new(Duration::from_secs(5)).expect("valid settings");
        FallbackManager::new(registry, router, None, settings)
    })
}

/// Benchmark fallback chain construction across privacy levels
fn bench_chain_construction(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().expect("runtime builds");
    let manager = seeded_manager(&rt);
    let failed = vec!["openai".to_string()];

    let levels = [
        ("public", PrivacyLevel::Public),
        ("internal", PrivacyLevel::Internal),
        ("confidential", PrivacyLevel::Confidential),
    ];

    let mut group = c.benchmark_group("chain_construction");
    for (name, level) in levels {
        let request = RoutingRequest::new("hello").with_privacy_level(level);
        group.bench_with_input(BenchmarkId::from_parameter(name), &request, |b, req| {
            b.to_async(&rt)
                .iter(|| manager.construct_fallback_chain(req, &failed));
        });
    }
    group.finish();
}

/// Benchmark routing request construction with the builder API
fn bench_request_building(c: &mut Criterion) {
    c.bench_function("request_building", |b| {
        b.iter(|| {
            RoutingRequest::new("explain ownership in rust")
                .with_task_type(TaskType::Code)
                .with_privacy_level(PrivacyLevel::Internal)
                .with_preferred_provider("local")
                .with_streaming()
        });
    });
}

/// Benchmark config parsing and validation (one-time startup cost)
fn bench_config_parsing(c: &mut Criterion) {
    let toml_str = r#"
[fallback]
max_attempts = 5
recovery_check_interval_seconds = 300
recovery_threshold_minutes = 10
probe_timeout_seconds = 5

[observability]
log_level = "info"
"#;

    c.bench_function("config_parsing", |b| {
        b.iter(|| Config::from_str(toml_str).expect("config parses"));
    });
}

criterion_group!(
    benches,
    bench_chain_construction,
    bench_request_building,
    bench_config_parsing,
);
criterion_main!(benches);
