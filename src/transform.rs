// transform.rs - The parallelization pipeline: validate, classify escapes,
// hoist invariants, detect reductions, plan chunks.

use crate::analysis::{
    AccumulatorCandidate, EscapeClassifier, EscapeMap, HoistingEngine, ReductionDetector,
};
use crate::config::ParallelConfig;
use crate::error::ParallelizeError;
use crate::ir::{LoopRegion, Statement};
use crate::planner::{ChunkPlan, ChunkPlanner};

/// Output contract of the pass: the transformed loop (hoisted statements
/// plus reduced body), every accumulator candidate examined, and the chunk
/// partition plan. Instruction emission is the code generator's problem.
#[derive(Debug, Clone)]
pub struct ParallelPlan {
    pub induction_var: String,
    /// Statements relocated before loop entry, in original relative order.
    pub hoisted: Vec<Statement>,
    /// Remaining per-iteration body, in original relative order.
    pub body: Vec<Statement>,
    /// All candidates, valid and rejected, for diagnostics.
    pub candidates: Vec<AccumulatorCandidate>,
    pub escapes: EscapeMap,
    pub chunks: ChunkPlan,
}

/// Analyze a candidate loop and lower it into a chunked parallel plan.
///
/// Fails with `InvalidIr` when the region violates its structural contract
/// and with `Rejected` when some loop-carried state is neither
/// hoisted-invariant nor a valid reduction; rejection is non-fatal and the
/// caller may fall back to sequential execution. Never emits a partial or
/// unsound transform.
pub fn parallelize(
    region: &LoopRegion,
    config: &ParallelConfig,
) -> Result<ParallelPlan, ParallelizeError> {
    region.validate()?;

    let escapes = EscapeClassifier::classify(region);
    let hoist = HoistingEngine::new(region, &escapes).hoist();
    let candidates = ReductionDetector::new(region, &escapes, &config.registry).detect();

    let chunks = ChunkPlanner::new(region, &hoist, &candidates, config.workers).plan()?;

    if cfg!(debug_assertions) {
        println!(
            "[PARALLEL] Lowered loop over '{}': {} hoisted, {} body statement(s), {} reduction(s), {} worker(s)",
            region.induction_var,
            hoist.hoisted.len(),
            hoist.body.len(),
            chunks.reductions.len(),
            chunks.workers
        );
    }

    Ok(ParallelPlan {
        induction_var: region.induction_var.clone(),
        hoisted: hoist.hoisted,
        body: hoist.body,
        candidates,
        escapes,
        chunks,
    })
}
