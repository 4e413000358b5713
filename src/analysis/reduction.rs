// reduction.rs - Detection of associative/commutative accumulator updates

use std::collections::BTreeMap;

use crate::analysis::escape::EscapeMap;
use crate::config::OperatorRegistry;
use crate::error::AnalysisRejected;
use crate::ir::{BinOp, LoopRegion, OpKind, Statement};
use crate::value::Value;

/// Why a candidate was rejected.
pub type RejectReason = AnalysisRejected;

/// Validity of an accumulator candidate.
#[derive(Debug, Clone, PartialEq)]
pub enum Validity {
    Valid,
    Rejected(RejectReason),
}

/// A variable receiving repeated self-referential updates.
#[derive(Debug, Clone)]
pub struct AccumulatorCandidate {
    pub var: String,
    /// Sites of the defining update statements.
    pub sites: Vec<usize>,
    pub op: BinOp,
    /// Identity element seeding per-chunk partial accumulators.
    pub identity: Value,
    pub validity: Validity,
}

impl AccumulatorCandidate {
    pub fn is_valid(&self) -> bool {
        self.validity == Validity::Valid
    }
}

/// Identifies accumulators updated via a whitelisted operator, in either
/// in-place or general-reassignment form.
pub struct ReductionDetector<'a> {
    region: &'a LoopRegion,
    escapes: &'a EscapeMap,
    registry: &'a OperatorRegistry,
}

/// One self-referential update site, after unifying the two syntactic forms.
struct UpdateSite {
    site: usize,
    op: BinOp,
    /// Accumulator appeared as the right operand of a general reassignment.
    acc_on_right: bool,
}

impl<'a> ReductionDetector<'a> {
    pub fn new(
        region: &'a LoopRegion,
        escapes: &'a EscapeMap,
        registry: &'a OperatorRegistry,
    ) -> Self {
        ReductionDetector {
            region,
            escapes,
            registry,
        }
    }

    /// Scan the body for accumulator candidates and validate each one.
    /// Candidates are reported in variable order so output is deterministic.
    pub fn detect(&self) -> Vec<AccumulatorCandidate> {
        let mut updates: BTreeMap<&str, Vec<UpdateSite>> = BTreeMap::new();

        for stmt in &self.region.body {
            if let Some((acc, update)) = self.as_self_update(stmt) {
                updates.entry(acc).or_default().push(update);
            }
        }

        updates
            .into_iter()
            .map(|(var, sites)| self.validate(var, sites))
            .collect()
    }

    /// Recognize `acc OP= rhs` and `acc = acc OP rhs` (or `acc = rhs OP acc`)
    /// as one underlying update pattern. An update reading the accumulator
    /// as both operands is not a reduction: the accumulator may only appear
    /// as one operand of its own update.
    fn as_self_update<'b>(&self, stmt: &'b Statement) -> Option<(&'b str, UpdateSite)> {
        let out = stmt.write.as_deref()?;
        match stmt.kind {
            OpKind::AugAssign(op) if stmt.reads[1] != out => Some((
                out,
                UpdateSite {
                    site: stmt.site,
                    op,
                    acc_on_right: false,
                },
            )),
            OpKind::BinOp(op) if stmt.reads[0] == out && stmt.reads[1] != out => Some((
                out,
                UpdateSite {
                    site: stmt.site,
                    op,
                    acc_on_right: false,
                },
            )),
            OpKind::BinOp(op) if stmt.reads[1] == out && stmt.reads[0] != out => Some((
                out,
                UpdateSite {
                    site: stmt.site,
                    op,
                    acc_on_right: true,
                },
            )),
            _ => None,
        }
    }

    fn validate(&self, var: &str, updates: Vec<UpdateSite>) -> AccumulatorCandidate {
        let sites: Vec<usize> = updates.iter().map(|u| u.site).collect();
        let op = updates[0].op;

        let candidate = |validity: Validity, identity: Value| AccumulatorCandidate {
            var: var.to_string(),
            sites: sites.clone(),
            op,
            identity,
            validity,
        };

        if updates.iter().any(|u| u.op != op) {
            return candidate(
                Validity::Rejected(AnalysisRejected::MixedOperators(var.to_string())),
                Value::Int(0),
            );
        }

        let spec = match self.registry.lookup(op) {
            Some(spec) if spec.associative => spec,
            _ => {
                return candidate(
                    Validity::Rejected(AnalysisRejected::UnsupportedOperator(op.to_string())),
                    Value::Int(0),
                );
            }
        };

        // The accumulator on the right-hand side is only sound once the
        // registry establishes commutativity; otherwise reject rather than
        // guess intent.
        if updates.iter().any(|u| u.acc_on_right) && !spec.commutative {
            return candidate(
                Validity::Rejected(AnalysisRejected::NonCommutativeRightOperand(
                    var.to_string(),
                )),
                spec.identity.clone(),
            );
        }

        if self.escapes.escapes(var) {
            return candidate(
                Validity::Rejected(AnalysisRejected::EscapingAccumulator(var.to_string())),
                spec.identity.clone(),
            );
        }

        if self.read_outside_own_update(var, &sites) {
            return candidate(
                Validity::Rejected(AnalysisRejected::AccumulatorReadElsewhere(var.to_string())),
                spec.identity.clone(),
            );
        }

        if cfg!(debug_assertions) {
            println!(
                "[REDUCE] '{}' is a valid {} reduction over {} site(s)",
                var,
                op,
                sites.len()
            );
        }
        candidate(Validity::Valid, spec.identity.clone())
    }

    /// True when the accumulator is read anywhere except inside its own
    /// update statements, or written by a non-update statement.
    fn read_outside_own_update(&self, var: &str, update_sites: &[usize]) -> bool {
        for stmt in &self.region.body {
            if update_sites.contains(&stmt.site) {
                continue;
            }
            if stmt.reads.iter().any(|r| r == var) {
                return true;
            }
            if stmt.write.as_deref() == Some(var) {
                return true;
            }
        }
        false
    }
}
