//! Four-bank exposure cycle under a capital shock.
//!
//! Evaluates A → B → C → D → A with default balance sheets, then pins B's
//! capital below its floor and evaluates again.

use rust_decimal_macros::dec;
use systemic_risk_engine::prelude::*;

fn main() {
    println!("╔═══════════════════════════════════════════════╗");
    println!("║  systemic-risk-engine: Exposure Cycle Check   ║");
    println!("╚═══════════════════════════════════════════════╝\n");

    let mut network = FinancialNetwork::new();
    for id in ["A", "B", "C", "D"] {
        network
            .add_institution(InstitutionRecord::new(id))
            .expect("ids are unique");
    }

    println!("Exposures:");
    for (source, target, weight) in [
        ("A", "B", dec!(2.0)),
        ("B", "C", dec!(1.5)),
        ("C", "D", dec!(2.2)),
        ("D", "A", dec!(1.0)),
    ] {
        println!("  {} → {}: {}", source, target, weight);
        network.add_exposure(
            Exposure::new(source.into(), target.into(), weight).expect("weight is non-negative"),
        );
    }
    println!();

    let engine = RiskEngine::default();

    println!("── Baseline (defaults: capital 10, assets 50, liquidity 5, short-term 20) ──");
    let baseline = engine
        .evaluate(&network, &ScenarioConfig::new())
        .expect("baseline scenario is valid");
    print!("{}", baseline);
    println!("Verdict: {}\n", baseline.verdict());

    println!("── Shock: B's capital drops to 3.0 ──");
    let shocked = ScenarioConfig::new().with("B", BalanceField::Capital, dec!(3.0));
    let report = engine
        .evaluate(&network, &shocked)
        .expect("shock scenario is valid");
    print!("{}", report);
    println!("Verdict: {}\n", report.verdict());

    println!("── Where does B recover? ──");
    let range = SweepRange::new("B", BalanceField::Capital, dec!(0), dec!(6), dec!(0.5));
    let sweep = run_sweep(&engine, &network, &ScenarioConfig::new(), &range)
        .expect("sweep range is valid");
    match sweep.first_stable() {
        Some(value) => println!("  B is stable from capital = {}", value),
        None => println!("  B never recovers in range"),
    }
}
