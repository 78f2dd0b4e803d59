use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use systemic_risk_engine::analysis::engine::RiskEngine;
use systemic_risk_engine::core::config::ScenarioConfig;
use systemic_risk_engine::core::exposure::Exposure;
use systemic_risk_engine::core::institution::{InstitutionId, InstitutionRecord};
use systemic_risk_engine::graph::network::FinancialNetwork;
use systemic_risk_engine::solver::SimplexSolver;

/// A ring of `n` institutions with one chord every fifth node.
fn ring_network(n: usize) -> FinancialNetwork {
    let mut network = FinancialNetwork::new();
    let ids: Vec<InstitutionId> = (0..n).map(|i| InstitutionId::new(format!("BANK-{:03}", i))).collect();
    for id in &ids {
        network
            .add_institution(InstitutionRecord::new(id.as_str()))
            .unwrap();
    }
    for i in 0..n {
        let weight = dec!(0.5) + Decimal::from(i % 4);
        network.add_exposure(Exposure::new(ids[i].clone(), ids[(i + 1) % n].clone(), weight).unwrap());
        if i % 5 == 0 && n > 2 {
            network.add_exposure(Exposure::new(ids[i].clone(), ids[(i + n / 2) % n].clone(), dec!(1)).unwrap());
        }
    }
    network
}

fn bench_evaluate(c: &mut Criterion, n: usize) {
    let network = ring_network(n);
    let engine = RiskEngine::default();
    let scenario = ScenarioConfig::new();

    c.bench_function(&format!("evaluate_ring_{}", n), |b| {
        b.iter(|| engine.evaluate(black_box(&network), black_box(&scenario)).unwrap())
    });
}

fn bench_simplex(c: &mut Criterion, n: usize) {
    let network = ring_network(n);
    let engine = RiskEngine::default();
    let scenario = ScenarioConfig::new();

    c.bench_function(&format!("simplex_ring_{}", n), |b| {
        b.iter(|| {
            engine
                .evaluate_with(SimplexSolver::default(), black_box(&network), black_box(&scenario))
                .unwrap()
        })
    });
}

fn bench_evaluate_10(c: &mut Criterion) {
    bench_evaluate(c, 10);
}

fn bench_evaluate_150(c: &mut Criterion) {
    bench_evaluate(c, 150);
}

fn bench_evaluate_1000(c: &mut Criterion) {
    bench_evaluate(c, 1000);
}

fn bench_simplex_150(c: &mut Criterion) {
    bench_simplex(c, 150);
}

fn bench_simplex_1000(c: &mut Criterion) {
    bench_simplex(c, 1000);
}

criterion_group!(
    benches,
    bench_evaluate_10,
    bench_evaluate_150,
    bench_evaluate_1000,
    bench_simplex_150,
    bench_simplex_1000
);
criterion_main!(benches);
