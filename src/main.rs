use std::collections::HashMap;

use anyhow::Result;
use clap::{Parser as ClapParser, Subcommand};
use colored::Colorize;

use parfor::executor::{run_parallel, run_sequential, Env};
use parfor::{
    parallelize, BinOp, IterationSpace, LoopRegion, OpKind, ParallelConfig, ParallelPlan,
    Statement, Validity, Value,
};

#[derive(ClapParser)]
#[command(name = "parfor")]
#[command(version = "0.1.0")]
#[command(about = "Automatic loop parallelization demo driver", long_about = None)]
struct Cli {
    /// Worker/chunk count for the parallel region
    #[arg(short, long, default_value = "4")]
    workers: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sum reduction with a hoistable invariant multiply
    Sum {
        /// Iteration count
        #[arg(short, long, default_value = "1000")]
        iterations: i64,
    },
    /// Product reduction over an array, general-reassignment form
    Product {
        /// Array length
        #[arg(short, long, default_value = "16")]
        length: i64,
    },
    /// Container-append loop that escapes and falls back to sequential
    Escape,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = ParallelConfig::new(cli.workers);

    match cli.command {
        Commands::Sum { iterations } => run_sum(&config, iterations),
        Commands::Product { length } => run_product(&config, length),
        Commands::Escape => run_escape(&config),
    }

    Ok(())
}

/// body: t = a * two; acc += t
fn run_sum(config: &ParallelConfig, iterations: i64) {
    let region = LoopRegion::new(
        "i",
        IterationSpace::constant(0, iterations, 1),
        vec![
            Statement::new(0, OpKind::BinOp(BinOp::Mul), &["a", "two"], Some("t")),
            Statement::new(1, OpKind::AugAssign(BinOp::Add), &["acc", "t"], Some("acc")),
        ],
    );

    let mut env: Env = HashMap::new();
    env.insert("a".to_string(), Value::Int(21));
    env.insert("two".to_string(), Value::Int(2));
    env.insert("acc".to_string(), Value::Int(0));

    run_and_report("sum reduction", &region, config, &env);
}

/// body: x = xs[i]; acc = acc * x (general reassignment form)
fn run_product(config: &ParallelConfig, length: i64) {
    let region = LoopRegion::new(
        "i",
        IterationSpace::constant(0, length, 1),
        vec![
            Statement::new(0, OpKind::Load, &["xs", "i"], Some("x")),
            Statement::new(1, OpKind::BinOp(BinOp::Mul), &["acc", "x"], Some("acc")),
        ],
    );

    let items = (0..length)
        .map(|k| Value::Float(1.0 + (k as f64) / (length as f64)))
        .collect();
    let mut env: Env = HashMap::new();
    env.insert("xs".to_string(), Value::array(items));
    env.insert("acc".to_string(), Value::Float(1.0));

    run_and_report("product reduction", &region, config, &env);
}

/// body: out = build(a); call(out) — everything escapes, nothing parallelizes
fn run_escape(config: &ParallelConfig) {
    let region = LoopRegion::new(
        "i",
        IterationSpace::constant(0, 8, 1),
        vec![
            Statement::new(0, OpKind::BuildContainer, &["a"], Some("out")),
            Statement::new(1, OpKind::Call, &["out"], None),
        ],
    );

    println!("{}", "escape fallback".bold());
    match parallelize(&region, config) {
        Ok(_) => println!("  unexpected: loop was accepted"),
        Err(err) => {
            println!("  {} {}", "rejected:".yellow(), err);
            println!(
                "  {} escaping variables: {:?}",
                "note:".cyan(),
                {
                    let escapes = parfor::EscapeClassifier::classify(&region);
                    let mut vars: Vec<String> =
                        escapes.escaped_vars().map(|v| v.to_string()).collect();
                    vars.sort();
                    vars
                }
            );
            println!("  caller falls back to unmodified sequential execution");
        }
    }
}

fn run_and_report(name: &str, region: &LoopRegion, config: &ParallelConfig, env: &Env) {
    println!("{}", name.bold());

    let plan = match parallelize(region, config) {
        Ok(plan) => plan,
        Err(err) => {
            println!("  {} {}", "rejected:".yellow(), err);
            return;
        }
    };
    report_plan(&plan);

    match (run_parallel(&plan, env), run_sequential(region, env)) {
        (Ok(parallel), Ok(sequential)) => {
            for candidate in plan.chunks.reductions.iter() {
                let p = &parallel[&candidate.var];
                let s = &sequential[&candidate.var];
                println!(
                    "  {} {} = {} (sequential: {})",
                    "result:".green(),
                    candidate.var,
                    p,
                    s
                );
            }
        }
        (Err(err), _) => println!("  {} {}", "parallel run failed:".red(), err),
        (_, Err(err)) => println!("  {} {}", "sequential run failed:".red(), err),
    }
}

fn report_plan(plan: &ParallelPlan) {
    println!(
        "  {} {} statement(s) hoisted, {} left in body",
        "hoist:".cyan(),
        plan.hoisted.len(),
        plan.body.len()
    );
    for candidate in &plan.candidates {
        match &candidate.validity {
            Validity::Valid => println!(
                "  {} '{}' via '{}' (identity {})",
                "reduction:".cyan(),
                candidate.var,
                candidate.op,
                candidate.identity
            ),
            Validity::Rejected(reason) => println!(
                "  {} '{}' rejected: {}",
                "reduction:".cyan(),
                candidate.var,
                reason
            ),
        }
    }
    println!("  {} {} chunk(s)", "plan:".cyan(), plan.chunks.workers);
}
