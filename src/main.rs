//! systemic-risk CLI
//!
//! Check an interbank exposure network for systemic fragility from the
//! command line.
//!
//! # Usage
//!
//! ```bash
//! # Evaluate a network with default balance sheets
//! systemic-risk evaluate --input network.json
//!
//! # Apply per-institution overrides and print JSON
//! systemic-risk evaluate --input network.json --config scenario.json --format json
//!
//! # Find the capital level at which B becomes stable
//! systemic-risk sweep --input network.json --node B --field capital --from 0 --to 8 --step 1
//! ```
//!
//! Exit codes: 0 stable, 2 fragile, 3 indeterminate, 1 input error.
//! Set `RUST_LOG=debug` to see encoding and solver progress.

use rust_decimal::Decimal;
use serde::Serialize;
use std::fs;
use std::process;
use systemic_risk_engine::analysis::engine::RiskEngine;
use systemic_risk_engine::analysis::interpreter::{RiskReport, Verdict};
use systemic_risk_engine::core::config::{BindingMode, EngineConfig, ScenarioConfig};
use systemic_risk_engine::core::error::EngineError;
use systemic_risk_engine::core::institution::BalanceField;
use systemic_risk_engine::graph::network::FinancialNetwork;
use systemic_risk_engine::simulation::sweep::{run_sweep, SweepResult, SweepRange};

fn print_usage() {
    eprintln!(
        r#"systemic-risk — feasibility checking for interbank exposure networks

USAGE:
    systemic-risk <COMMAND> [OPTIONS]

COMMANDS:
    evaluate    Decide whether every institution can meet its regulatory floors
    sweep       Evaluate across a range of values for one institution's field
    help        Show this message

OPTIONS (evaluate, sweep):
    --input <FILE>        Path to JSON network file
    --config <FILE>       Path to JSON scenario overrides
    --engine <FILE>       Path to JSON engine configuration
    --mode <MODE>         pinned (default) or exploratory
    --timeout-ms <N>      Solver time budget in milliseconds
    --format <FORMAT>     Output format: text (default) or json

OPTIONS (sweep):
    --node <ID>           Institution to vary
    --field <FIELD>       capital, assets, liquidity or short_term
    --from <X>            First value
    --to <Y>              Last value (inclusive)
    --step <Z>            Increment

EXIT CODES:
    0 stable, 2 fragile, 3 indeterminate, 1 input error

EXAMPLES:
    systemic-risk evaluate --input network.json
    systemic-risk evaluate --input network.json --config stressed.json --format json
    systemic-risk evaluate --input network.json --mode exploratory
    systemic-risk sweep --input network.json --node B --field capital --from 0 --to 8 --step 1"#
    );
}

/// Options shared by every command.
struct CommonArgs {
    input: Option<String>,
    config: Option<String>,
    engine: Option<String>,
    mode: Option<BindingMode>,
    timeout_ms: Option<u64>,
    format: String,
}

#[derive(Default)]
struct SweepArgs {
    node: Option<String>,
    field: Option<BalanceField>,
    from: Option<Decimal>,
    to: Option<Decimal>,
    step: Option<Decimal>,
}

const SWEEP_FLAGS: &[&str] = &["--node", "--field", "--from", "--to", "--step"];

impl SweepArgs {
    fn set(&mut self, flag: &str, raw: &str) -> Result<(), String> {
        match flag {
            "--node" => self.node = Some(raw.to_string()),
            "--field" => self.field = Some(raw.parse().map_err(|e: EngineError| e.to_string())?),
            "--from" => self.from = Some(parse_decimal(raw, flag)?),
            "--to" => self.to = Some(parse_decimal(raw, flag)?),
            "--step" => self.step = Some(parse_decimal(raw, flag)?),
            _ => return Err(format!("unknown option {}", flag)),
        }
        Ok(())
    }
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("Error: {}", message);
    process::exit(1);
}

fn value_of<'a>(args: &'a [String], i: usize, flag: &str, what: &str) -> Result<&'a str, String> {
    args.get(i)
        .map(String::as_str)
        .ok_or_else(|| format!("{} requires {}", flag, what))
}

fn parse_decimal(raw: &str, flag: &str) -> Result<Decimal, String> {
    raw.parse()
        .map_err(|e| format!("Invalid number '{}' for {}: {}", raw, flag, e))
}

/// Parse the common options. Flags in `extra_flags` take a value that is
/// handed to `extra`; any other flag is rejected before its value is read.
fn parse_args(
    args: &[String],
    extra_flags: &[&str],
    mut extra: impl FnMut(&str, &str) -> Result<(), String>,
) -> Result<CommonArgs, String> {
    let mut common = CommonArgs {
        input: None,
        config: None,
        engine: None,
        mode: None,
        timeout_ms: None,
        format: "text".to_string(),
    };
    let mut i = 0;
    while i < args.len() {
        let flag = args[i].as_str();
        i += 1;
        match flag {
            "--input" => common.input = Some(value_of(args, i, flag, "a file path")?.to_string()),
            "--config" => common.config = Some(value_of(args, i, flag, "a file path")?.to_string()),
            "--engine" => common.engine = Some(value_of(args, i, flag, "a file path")?.to_string()),
            "--mode" => {
                let raw = value_of(args, i, flag, "'pinned' or 'exploratory'")?;
                common.mode = Some(raw.parse().map_err(|e: EngineError| e.to_string())?);
            }
            "--timeout-ms" => {
                let raw = value_of(args, i, flag, "a number")?;
                common.timeout_ms = Some(
                    raw.parse()
                        .map_err(|_| "--timeout-ms requires a number".to_string())?,
                );
            }
            "--format" => {
                let raw = value_of(args, i, flag, "'text' or 'json'")?;
                if raw != "text" && raw != "json" {
                    return Err(format!("unknown format '{}'", raw));
                }
                common.format = raw.to_string();
            }
            _ if extra_flags.contains(&flag) => extra(flag, value_of(args, i, flag, "a value")?)?,
            _ => return Err(format!("unknown option {}", flag)),
        }
        i += 1;
    }
    Ok(common)
}

fn read_file(path: &str) -> String {
    fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("Error reading file '{}': {}", path, e);
        process::exit(1);
    })
}

fn load_network(path: &str) -> FinancialNetwork {
    FinancialNetwork::from_json(&read_file(path)).unwrap_or_else(|e| {
        eprintln!("Error loading network '{}': {}", path, e);
        eprintln!("Expected format:");
        eprintln!(
            r#"{{
  "nodes": [ {{ "id": "A", "capital": 10, "assets": 50 }}, {{ "id": "B" }} ],
  "edges": [ {{ "source": "A", "target": "B", "weight": 2.0 }} ]
}}"#
        );
        process::exit(1);
    })
}

/// Build the engine and inputs from parsed options.
fn prepare(common: &CommonArgs) -> (RiskEngine, FinancialNetwork, ScenarioConfig) {
    let path = common
        .input
        .as_deref()
        .unwrap_or_else(|| fail("--input <FILE> is required"));
    let network = load_network(path);

    let scenario = match &common.config {
        Some(path) => ScenarioConfig::from_json(&read_file(path)).unwrap_or_else(|e| {
            eprintln!("Error loading scenario '{}': {}", path, e);
            process::exit(1);
        }),
        None => ScenarioConfig::new(),
    };

    let mut config = match &common.engine {
        Some(path) => EngineConfig::from_json(&read_file(path)).unwrap_or_else(|e| {
            eprintln!("Error loading engine configuration '{}': {}", path, e);
            process::exit(1);
        }),
        None => EngineConfig::default(),
    };
    if let Some(mode) = common.mode {
        config.mode = mode;
    }
    if let Some(ms) = common.timeout_ms {
        config.timeout_ms = Some(ms);
    }

    (RiskEngine::new(config), network, scenario)
}

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| fail(e))
}

fn exit_code(verdict: Verdict) -> i32 {
    match verdict {
        Verdict::Stable => 0,
        Verdict::Fragile => 2,
        Verdict::Indeterminate => 3,
    }
}

fn cmd_evaluate(args: &[String]) {
    let common = parse_args(args, &[], |_, _| Ok(())).unwrap_or_else(|e| fail(e));
    let (engine, network, scenario) = prepare(&common);

    let report: RiskReport = engine
        .evaluate(&network, &scenario)
        .unwrap_or_else(|e| fail(e));

    if common.format == "json" {
        println!("{}", to_json(&report));
    } else {
        print!("{}", report);
    }
    process::exit(exit_code(report.verdict()));
}

fn cmd_sweep(args: &[String]) {
    let mut sweep = SweepArgs::default();
    let common = parse_args(args, SWEEP_FLAGS, |flag, raw| sweep.set(flag, raw))
        .unwrap_or_else(|e| fail(e));

    let range = SweepRange::new(
        sweep.node.unwrap_or_else(|| fail("--node <ID> is required")),
        sweep.field.unwrap_or_else(|| fail("--field <FIELD> is required")),
        sweep.from.unwrap_or_else(|| fail("--from <X> is required")),
        sweep.to.unwrap_or_else(|| fail("--to <Y> is required")),
        sweep.step.unwrap_or_else(|| fail("--step <Z> is required")),
    );
    let (engine, network, scenario) = prepare(&common);

    let result: SweepResult =
        run_sweep(&engine, &network, &scenario, &range).unwrap_or_else(|e| fail(e));

    if common.format == "json" {
        println!("{}", to_json(&result));
        return;
    }

    println!("Sweep of {}.{}", result.institution, result.field);
    for point in &result.points {
        println!("  {:>12}  {}", point.value.normalize().to_string(), point.verdict);
    }
    let transitions = result.transitions();
    if transitions.is_empty() {
        println!("No change of verdict in range.");
    } else {
        for t in transitions {
            println!("  {} → {} between {} and {}", t.from, t.to, t.below, t.at);
        }
    }
}

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    let command = args[1].as_str();
    let rest = &args[2..];

    match command {
        "evaluate" => cmd_evaluate(rest),
        "sweep" => cmd_sweep(rest),
        "help" | "--help" | "-h" => print_usage(),
        _ => {
            eprintln!("Unknown command: {}", command);
            print_usage();
            process::exit(1);
        }
    }
}
