// executor.rs - Runs planned loops: chunked parallel execution plus the
// sequential reference used for fallback and as a correctness oracle.

use std::collections::HashMap;
use std::sync::Arc;

use rayon::prelude::*;

use crate::error::{EvalErrorKind, ParallelizeError, RuntimeFailure};
use crate::ir::{LoopRegion, OpKind, Statement};
use crate::planner::ChunkDescriptor;
use crate::transform::ParallelPlan;
use crate::value::{apply_binop, Value};

/// Variable bindings flowing through evaluation.
pub type Env = HashMap<String, Value>;

/// Execute a parallel plan against initial bindings.
///
/// Hoisted statements run exactly once before the region when the trip
/// count is at least one, and not at all for an empty iteration space.
/// Chunks then run on the rayon pool sharing only the frozen environment;
/// each owns private accumulator copies. The combine step runs on the
/// calling thread strictly after every chunk returns. If any chunk fails,
/// the combine is skipped and the failure with the lowest worker index is
/// propagated; no attempt is made to reconstruct strict sequential
/// fail-fast order.
pub fn run_parallel(plan: &ParallelPlan, env: &Env) -> Result<Env, ParallelizeError> {
    let chunks = plan.chunks.descriptors(&int_bindings(env))?;
    let total: u64 = chunks.iter().map(|c| c.count).sum();

    let mut frozen = env.clone();
    if total > 0 {
        // Prefix evaluation: the single execution a sequential run would
        // have performed. A failure here is attributed to chunk 0.
        for stmt in &plan.hoisted {
            eval_statement(stmt, &mut frozen)
                .map_err(|kind| RuntimeFailure { chunk: 0, kind })?;
        }
    }

    let frozen = Arc::new(frozen);
    let induction = plan.induction_var.clone();

    let results: Vec<Result<Vec<Value>, RuntimeFailure>> = chunks
        .into_par_iter()
        .map(|chunk| run_chunk(&chunk, &plan.body, &induction, &frozen))
        .collect();

    // All chunks have completed; surface the first detected failure before
    // any combination happens.
    let mut partials: Vec<Vec<Value>> = Vec::with_capacity(results.len());
    for result in results {
        partials.push(result?);
    }

    let mut out = Arc::try_unwrap(frozen).unwrap_or_else(|arc| (*arc).clone());
    for (idx, candidate) in plan.chunks.reductions.iter().enumerate() {
        let column: Vec<Value> = partials.iter().map(|p| p[idx].clone()).collect();
        let combined = plan
            .chunks
            .combine(candidate, &column)
            .map_err(|kind| RuntimeFailure { chunk: 0, kind })?;
        // An empty iteration space leaves the accumulator untouched, same
        // as a sequential run; otherwise the caller's start value folds
        // with the combined partials.
        if total == 0 {
            continue;
        }
        let folded = match out.get(&candidate.var).cloned() {
            Some(start) => apply_binop(candidate.op, &start, &combined)
                .map_err(|kind| RuntimeFailure { chunk: 0, kind })?,
            None => combined,
        };
        out.insert(candidate.var.clone(), folded);
    }

    Ok(out)
}

fn run_chunk(
    chunk: &ChunkDescriptor,
    body: &[Statement],
    induction: &str,
    frozen: &Env,
) -> Result<Vec<Value>, RuntimeFailure> {
    let mut env = frozen.clone();
    for seed in &chunk.accumulators {
        env.insert(seed.var.clone(), seed.init.clone());
    }

    for value in chunk.values() {
        env.insert(induction.to_string(), Value::Int(value));
        for stmt in body {
            eval_statement(stmt, &mut env).map_err(|kind| RuntimeFailure {
                chunk: chunk.worker,
                kind,
            })?;
        }
    }

    Ok(chunk
        .accumulators
        .iter()
        .map(|seed| env.get(&seed.var).cloned().unwrap_or(seed.init.clone()))
        .collect())
}

/// Sequential reference execution of an untransformed region. Used by the
/// caller as the fallback when analysis rejects the loop, and by tests as
/// the oracle the parallel result must match.
pub fn run_sequential(region: &LoopRegion, env: &Env) -> Result<Env, ParallelizeError> {
    let bindings = int_bindings(env);
    let resolve = |bound: &crate::ir::Bound| -> Result<i64, ParallelizeError> {
        match bound {
            crate::ir::Bound::Const(c) => Ok(*c),
            crate::ir::Bound::Symbol(s) => bindings
                .get(s)
                .copied()
                .ok_or_else(|| crate::error::InvalidIrError::unbound_symbol(s).into()),
        }
    };
    let start = resolve(&region.space.start)?;
    let stop = resolve(&region.space.stop)?;
    let step = resolve(&region.space.step)?;

    let mut env = env.clone();
    for k in 0..crate::ir::trip_count(start, stop, step) {
        let value = start + (k as i64) * step;
        env.insert(region.induction_var.clone(), Value::Int(value));
        for stmt in &region.body {
            eval_statement(stmt, &mut env)
                .map_err(|kind| RuntimeFailure { chunk: 0, kind })?;
        }
    }
    Ok(env)
}

/// Evaluate one statement against an environment. Calls, container builds
/// and branches have no local semantics here; loops containing them are
/// either rejected by planning or executed by the surrounding runtime.
fn eval_statement(stmt: &Statement, env: &mut Env) -> Result<(), EvalErrorKind> {
    match stmt.kind {
        OpKind::BinOp(op) | OpKind::AugAssign(op) => {
            let lhs = lookup(env, &stmt.reads[0])?;
            let rhs = lookup(env, &stmt.reads[1])?;
            let result = apply_binop(op, &lhs, &rhs)?;
            env.insert(stmt.write.clone().unwrap_or_default(), result);
            Ok(())
        }
        OpKind::Load => {
            let array = lookup(env, &stmt.reads[0])?;
            let index = lookup(env, &stmt.reads[1])?;
            let loaded = index_array(&stmt.reads[0], &array, &index)?;
            env.insert(stmt.write.clone().unwrap_or_default(), loaded);
            Ok(())
        }
        OpKind::Store => {
            let index = lookup(env, &stmt.reads[1])?;
            let value = lookup(env, &stmt.reads[2])?;
            let name = &stmt.reads[0];
            let array = env
                .get_mut(name)
                .ok_or_else(|| EvalErrorKind::unbound(name))?;
            match array {
                Value::Array(items) => {
                    let idx = index
                        .as_index()
                        .ok_or_else(|| EvalErrorKind::type_mismatch("[]", "index must be int"))?;
                    let len = items.len();
                    if idx < 0 || idx as usize >= len {
                        return Err(EvalErrorKind::IndexOutOfBounds {
                            array: name.clone(),
                            index: idx,
                            len,
                        });
                    }
                    Arc::make_mut(items)[idx as usize] = value;
                    Ok(())
                }
                other => Err(EvalErrorKind::type_mismatch(
                    "[]",
                    &format!("cannot store into {}", other),
                )),
            }
        }
        OpKind::Call | OpKind::BuildContainer | OpKind::Branch => {
            Err(EvalErrorKind::Unevaluable(stmt.site))
        }
    }
}

fn lookup(env: &Env, name: &str) -> Result<Value, EvalErrorKind> {
    env.get(name)
        .cloned()
        .ok_or_else(|| EvalErrorKind::unbound(name))
}

fn index_array(name: &str, array: &Value, index: &Value) -> Result<Value, EvalErrorKind> {
    let items = match array {
        Value::Array(items) => items,
        other => {
            return Err(EvalErrorKind::type_mismatch(
                "[]",
                &format!("cannot index {}", other),
            ))
        }
    };
    let idx = index
        .as_index()
        .ok_or_else(|| EvalErrorKind::type_mismatch("[]", "index must be int"))?;
    if idx < 0 || idx as usize >= items.len() {
        return Err(EvalErrorKind::IndexOutOfBounds {
            array: name.to_string(),
            index: idx,
            len: items.len(),
        });
    }
    Ok(items[idx as usize].clone())
}

/// Integer bindings for resolving symbolic loop bounds.
fn int_bindings(env: &Env) -> HashMap<String, i64> {
    env.iter()
        .filter_map(|(name, value)| match value {
            Value::Int(i) => Some((name.clone(), *i)),
            _ => None,
        })
        .collect()
}
