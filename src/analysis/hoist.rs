// hoist.rs - Loop-invariant statement hoisting

use std::collections::{HashMap, HashSet};

use crate::analysis::escape::EscapeMap;
use crate::ir::{LoopRegion, OpKind, Statement};

/// Result of invariant hoisting: statements relocated before loop entry and
/// the remaining body, each preserving original relative order.
#[derive(Debug, Clone)]
pub struct HoistPlan {
    pub hoisted: Vec<Statement>,
    pub body: Vec<Statement>,
}

impl HoistPlan {
    pub fn hoisted_sites(&self) -> HashSet<usize> {
        self.hoisted.iter().map(|s| s.site).collect()
    }
}

/// Finds statements whose results do not vary across iterations and are
/// safe to evaluate once, before the parallel region.
pub struct HoistingEngine<'a> {
    region: &'a LoopRegion,
    escapes: &'a EscapeMap,
}

impl<'a> HoistingEngine<'a> {
    pub fn new(region: &'a LoopRegion, escapes: &'a EscapeMap) -> Self {
        HoistingEngine { region, escapes }
    }

    /// Classify every body statement by fixed-point propagation and split
    /// the body into hoisted and remaining statements.
    ///
    /// A statement hoists only when its operation kind has no
    /// iteration-order-dependent side effect, every variable it reads is
    /// invariant, and neither its reads nor its write carry an escape mark.
    /// Escaping variables stay in the loop even when structurally constant,
    /// because an external call could observe per-iteration identity.
    pub fn hoist(&self) -> HoistPlan {
        let write_counts = self.write_counts();
        let stored_arrays = self.stored_arrays();

        // Variables defined inside the body; everything else comes from
        // outside the loop and is invariant unless it escapes.
        let defined_inside: HashSet<&str> = write_counts.keys().copied().collect();

        let mut invariant_vars: HashSet<&str> = HashSet::new();
        let mut hoisted_sites: HashSet<usize> = HashSet::new();

        // Bounded by the body length: each round hoists at least one new
        // statement or stops.
        loop {
            let mut changed = false;

            for (idx, stmt) in self.region.body.iter().enumerate() {
                if hoisted_sites.contains(&stmt.site) {
                    continue;
                }
                if !self.kind_is_hoistable(stmt, &stored_arrays) {
                    continue;
                }

                let out = match &stmt.write {
                    Some(out) => out.as_str(),
                    None => continue,
                };

                if write_counts.get(out).copied().unwrap_or(0) > 1 {
                    continue;
                }
                if self.escapes.escapes(out) {
                    continue;
                }

                // A read of the output earlier in body order observes the
                // pre-loop value on iteration 0; relocating the write would
                // replace that observation. The variable is live-in, not
                // invariant.
                let read_before_write = self.region.body[..idx]
                    .iter()
                    .any(|s| s.reads.iter().any(|r| r == out));
                if read_before_write {
                    continue;
                }

                let inputs_invariant = stmt.reads.iter().all(|r| {
                    !self.escapes.escapes(r)
                        && r != &self.region.induction_var
                        && (!defined_inside.contains(r.as_str())
                            || invariant_vars.contains(r.as_str()))
                });

                if inputs_invariant {
                    hoisted_sites.insert(stmt.site);
                    invariant_vars.insert(out);
                    changed = true;
                    if cfg!(debug_assertions) {
                        println!("[HOIST] Site {} ('{}') is loop-invariant", stmt.site, out);
                    }
                }
            }

            if !changed {
                break;
            }
        }

        let (hoisted, body): (Vec<_>, Vec<_>) = self
            .region
            .body
            .iter()
            .cloned()
            .partition(|s| hoisted_sites.contains(&s.site));

        HoistPlan { hoisted, body }
    }

    /// Kinds with iteration-order-dependent effects never hoist. A load
    /// hoists only when nothing in the body stores to its array.
    fn kind_is_hoistable(&self, stmt: &Statement, stored_arrays: &HashSet<&str>) -> bool {
        match stmt.kind {
            OpKind::BinOp(_) | OpKind::AugAssign(_) => true,
            OpKind::Load => !stored_arrays.contains(stmt.reads[0].as_str()),
            OpKind::Call | OpKind::BuildContainer | OpKind::Store | OpKind::Branch => false,
        }
    }

    fn write_counts(&self) -> HashMap<&str, usize> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for stmt in &self.region.body {
            if let Some(w) = &stmt.write {
                *counts.entry(w.as_str()).or_insert(0) += 1;
            }
        }
        counts
    }

    fn stored_arrays(&self) -> HashSet<&str> {
        self.region
            .body
            .iter()
            .filter(|s| s.kind == OpKind::Store)
            .map(|s| s.reads[0].as_str())
            .collect()
    }
}
