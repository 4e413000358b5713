// planner.rs - Iteration-space partitioning and the deterministic combine step

use std::collections::HashMap;

use crate::analysis::hoist::HoistPlan;
use crate::analysis::reduction::{AccumulatorCandidate, Validity};
use crate::error::{AnalysisRejected, EvalErrorKind, InvalidIrError};
use crate::ir::{trip_count, Bound, IterationSpace, LoopRegion, OpKind};
use crate::value::{apply_binop, Value};

/// Private per-chunk accumulator seed.
#[derive(Debug, Clone)]
pub struct PartialSeed {
    pub var: String,
    pub op: crate::ir::BinOp,
    pub init: Value,
}

/// A contiguous iteration sub-range assigned to one worker, with private
/// copies of every reduction accumulator.
#[derive(Debug, Clone)]
pub struct ChunkDescriptor {
    pub worker: usize,
    /// First loop-variable value of the chunk.
    pub start: i64,
    /// Number of iterations in the chunk; zero-width chunks are legal.
    pub count: u64,
    pub step: i64,
    pub accumulators: Vec<PartialSeed>,
}

impl ChunkDescriptor {
    /// Loop-variable values of this chunk, in order.
    pub fn values(&self) -> impl Iterator<Item = i64> + '_ {
        (0..self.count).map(move |k| self.start + (k as i64) * self.step)
    }
}

/// The partition plan for an eligible loop: worker count, iteration space
/// and the valid accumulators each chunk privatizes.
#[derive(Debug, Clone)]
pub struct ChunkPlan {
    pub workers: usize,
    pub space: IterationSpace,
    pub reductions: Vec<AccumulatorCandidate>,
}

impl ChunkPlan {
    /// Resolve symbolic bounds against caller bindings and partition the
    /// iteration space into `workers` contiguous sub-ranges.
    pub fn descriptors(
        &self,
        bindings: &HashMap<String, i64>,
    ) -> Result<Vec<ChunkDescriptor>, InvalidIrError> {
        let start = resolve(&self.space.start, bindings)?;
        let stop = resolve(&self.space.stop, bindings)?;
        let step = resolve(&self.space.step, bindings)?;
        let total = trip_count(start, stop, step);

        let seeds: Vec<PartialSeed> = self
            .reductions
            .iter()
            .map(|c| PartialSeed {
                var: c.var.clone(),
                op: c.op,
                init: c.identity.clone(),
            })
            .collect();

        let w = self.workers as u64;
        let mut chunks = Vec::with_capacity(self.workers);
        for worker in 0..self.workers {
            let lo = (worker as u64) * total / w;
            let hi = (worker as u64 + 1) * total / w;
            chunks.push(ChunkDescriptor {
                worker,
                start: start + (lo as i64) * step,
                count: hi - lo,
                step,
                accumulators: seeds.clone(),
            });
        }

        if cfg!(debug_assertions) {
            println!(
                "[PARALLEL] Partitioned {} iteration(s) into {} chunk(s)",
                total, self.workers
            );
        }
        Ok(chunks)
    }

    /// Fold one accumulator's partial values in ascending worker order.
    /// Single-threaded; runs strictly after every chunk completes. For
    /// floating-point operators the grouping may round differently than
    /// strict sequential accumulation, which is accepted.
    pub fn combine(
        &self,
        candidate: &AccumulatorCandidate,
        partials: &[Value],
    ) -> Result<Value, EvalErrorKind> {
        let mut acc = candidate.identity.clone();
        for partial in partials {
            acc = apply_binop(candidate.op, &acc, partial)?;
        }
        Ok(acc)
    }
}

/// Builds a ChunkPlan from the analysis results, or rejects the loop when
/// any loop-carried state is neither hoisted-invariant nor a valid
/// reduction. Never emits a partial transform.
pub struct ChunkPlanner<'a> {
    region: &'a LoopRegion,
    hoist: &'a HoistPlan,
    candidates: &'a [AccumulatorCandidate],
    workers: usize,
}

impl<'a> ChunkPlanner<'a> {
    pub fn new(
        region: &'a LoopRegion,
        hoist: &'a HoistPlan,
        candidates: &'a [AccumulatorCandidate],
        workers: usize,
    ) -> Self {
        ChunkPlanner {
            region,
            hoist,
            candidates,
            workers: workers.max(1),
        }
    }

    pub fn plan(&self) -> Result<ChunkPlan, AnalysisRejected> {
        if let Bound::Const(0) = self.region.space.step {
            return Err(AnalysisRejected::DegenerateIterationSpace);
        }

        self.check_side_effects()?;
        self.check_loop_carried()?;

        let reductions: Vec<AccumulatorCandidate> = self
            .candidates
            .iter()
            .filter(|c| c.is_valid())
            .cloned()
            .collect();

        Ok(ChunkPlan {
            workers: self.workers,
            space: self.region.space.clone(),
            reductions,
        })
    }

    /// Calls, container builds and stores left in the reduced body have
    /// observable per-iteration effects; chunking would reorder them. A
    /// branch is rejected as well: it may guard a failing statement, and
    /// invariance of anything it dominates cannot be established here.
    fn check_side_effects(&self) -> Result<(), AnalysisRejected> {
        for stmt in &self.hoist.body {
            match stmt.kind {
                OpKind::Call | OpKind::BuildContainer | OpKind::Store => {
                    return Err(AnalysisRejected::SideEffectingBody(stmt.site));
                }
                OpKind::Branch => {
                    return Err(AnalysisRejected::ControlFlowInBody(stmt.site));
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// A variable written in the reduced body and read at or before its
    /// first write carries a value between iterations. Only the induction
    /// variable and valid accumulators may do that.
    fn check_loop_carried(&self) -> Result<(), AnalysisRejected> {
        for var in self.written_vars() {
            if var == self.region.induction_var {
                continue;
            }
            if self
                .candidates
                .iter()
                .any(|c| c.is_valid() && c.var == var)
            {
                continue;
            }
            if !self.is_loop_carried(&var) {
                continue;
            }

            // Surface the detector's reason when it already examined this
            // variable and rejected it.
            if let Some(rejected) = self.candidates.iter().find(|c| c.var == var) {
                if let Validity::Rejected(reason) = &rejected.validity {
                    return Err(reason.clone());
                }
            }
            return Err(AnalysisRejected::UnsupportedLoopCarried(var));
        }
        Ok(())
    }

    fn written_vars(&self) -> Vec<String> {
        let mut vars = Vec::new();
        for stmt in &self.hoist.body {
            if let Some(w) = &stmt.write {
                if !vars.contains(w) {
                    vars.push(w.clone());
                }
            }
        }
        vars
    }

    fn is_loop_carried(&self, var: &str) -> bool {
        let first_write = self
            .hoist
            .body
            .iter()
            .position(|s| s.write.as_deref() == Some(var));
        let first_write = match first_write {
            Some(idx) => idx,
            None => return false,
        };
        self.hoist
            .body
            .iter()
            .take(first_write + 1)
            .any(|s| s.reads.iter().any(|r| r == var))
    }
}

fn resolve(bound: &Bound, bindings: &HashMap<String, i64>) -> Result<i64, InvalidIrError> {
    match bound {
        Bound::Const(c) => Ok(*c),
        Bound::Symbol(name) => bindings
            .get(name)
            .copied()
            .ok_or_else(|| InvalidIrError::unbound_symbol(name)),
    }
}
