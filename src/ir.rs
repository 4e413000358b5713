// ir.rs - Loop intermediate representation consumed by the parallelization pass

use std::collections::HashSet;
use std::fmt;

use crate::analysis::escape::EscapeMap;
use crate::error::InvalidIrError;

/// Binary operators appearing in loop bodies. Only a subset of these are
/// registered as reduction operators (see `config::OperatorRegistry`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Min,
    Max,
    BitOr,
    BitAnd,
    LogicalOr,
    LogicalAnd,
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Min => "min",
            BinOp::Max => "max",
            BinOp::BitOr => "|",
            BinOp::BitAnd => "&",
            BinOp::LogicalOr => "or",
            BinOp::LogicalAnd => "and",
        };
        write!(f, "{}", s)
    }
}

/// Operation kind of a statement. A closed set, matched exhaustively
/// everywhere; escape detection relies on `Call` and `BuildContainer`
/// being distinguished from the pure kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    /// General reassignment `out = reads[0] OP reads[1]`.
    BinOp(BinOp),
    /// In-place update `out OP= rhs`; reads are `[out, rhs]`.
    AugAssign(BinOp),
    /// Call with locally unknown effects; reads are the arguments.
    Call,
    /// Compound-value construction; reads are the elements.
    BuildContainer,
    /// Indexed read `out = reads[0][reads[1]]`.
    Load,
    /// Indexed write `reads[0][reads[1]] = reads[2]`.
    Store,
    /// Conditional control flow inside the body; reads are the condition vars.
    Branch,
}

/// An atomic IR operation with explicit read/write variable lists.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    /// Unique site identifier within the region.
    pub site: usize,
    pub kind: OpKind,
    /// Ordered input variable references.
    pub reads: Vec<String>,
    /// Output variable, if the operation produces one.
    pub write: Option<String>,
}

impl Statement {
    pub fn new(site: usize, kind: OpKind, reads: &[&str], write: Option<&str>) -> Self {
        Statement {
            site,
            kind,
            reads: reads.iter().map(|s| s.to_string()).collect(),
            write: write.map(|s| s.to_string()),
        }
    }
}

/// A loop bound: either a compile-time constant or a symbol resolved
/// against caller-supplied bindings when the plan is executed.
#[derive(Debug, Clone, PartialEq)]
pub enum Bound {
    Const(i64),
    Symbol(String),
}

impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bound::Const(c) => write!(f, "{}", c),
            Bound::Symbol(s) => write!(f, "{}", s),
        }
    }
}

/// Iteration-space descriptor: `start..stop` advancing by `step`.
#[derive(Debug, Clone, PartialEq)]
pub struct IterationSpace {
    pub start: Bound,
    pub stop: Bound,
    pub step: Bound,
}

impl IterationSpace {
    pub fn new(start: Bound, stop: Bound, step: Bound) -> Self {
        IterationSpace { start, stop, step }
    }

    /// Constant-bound convenience constructor.
    pub fn constant(start: i64, stop: i64, step: i64) -> Self {
        IterationSpace {
            start: Bound::Const(start),
            stop: Bound::Const(stop),
            step: Bound::Const(step),
        }
    }

    /// Trip count if all bounds are constant; `None` when symbolic.
    pub fn trip_count(&self) -> Option<u64> {
        match (&self.start, &self.stop, &self.step) {
            (Bound::Const(start), Bound::Const(stop), Bound::Const(step)) => {
                Some(trip_count(*start, *stop, *step))
            }
            _ => None,
        }
    }
}

/// Number of iterations of `start..stop` by `step`, zero for degenerate
/// bounds or a zero step.
pub fn trip_count(start: i64, stop: i64, step: i64) -> u64 {
    if step > 0 && stop > start {
        ((stop - start + step - 1) / step) as u64
    } else if step < 0 && start > stop {
        ((start - stop - step - 1) / -step) as u64
    } else {
        0
    }
}

/// Direction of a variable use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UseDirection {
    Read,
    Write,
}

/// Relation linking a statement to a variable it reads or writes.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableUse {
    pub site: usize,
    pub var: String,
    pub direction: UseDirection,
    pub escapes: bool,
}

/// A candidate parallel loop. Constructed once by the front end per
/// compilation and read-only to this pass.
#[derive(Debug, Clone)]
pub struct LoopRegion {
    pub induction_var: String,
    pub space: IterationSpace,
    pub body: Vec<Statement>,
}

impl LoopRegion {
    pub fn new(induction_var: &str, space: IterationSpace, body: Vec<Statement>) -> Self {
        LoopRegion {
            induction_var: induction_var.to_string(),
            space,
            body,
        }
    }

    /// Every variable mentioned anywhere in the region.
    pub fn variables(&self) -> HashSet<String> {
        let mut vars = HashSet::new();
        vars.insert(self.induction_var.clone());
        for stmt in &self.body {
            for r in &stmt.reads {
                vars.insert(r.clone());
            }
            if let Some(w) = &stmt.write {
                vars.insert(w.clone());
            }
        }
        vars
    }

    /// Flattened read/write uses of every body statement, in body order,
    /// with each use's escape flag taken from a classifier result.
    pub fn uses(&self, escapes: &EscapeMap) -> Vec<VariableUse> {
        let mut uses = Vec::new();
        for stmt in &self.body {
            for r in &stmt.reads {
                uses.push(VariableUse {
                    site: stmt.site,
                    var: r.clone(),
                    direction: UseDirection::Read,
                    escapes: escapes.escapes(r),
                });
            }
            if let Some(w) = &stmt.write {
                uses.push(VariableUse {
                    site: stmt.site,
                    var: w.clone(),
                    direction: UseDirection::Write,
                    escapes: escapes.escapes(w),
                });
            }
        }
        uses
    }

    /// Check the structural contract the front end must uphold. Violations
    /// are caller programming errors, surfaced immediately.
    pub fn validate(&self) -> Result<(), InvalidIrError> {
        if self.induction_var.is_empty() {
            return Err(InvalidIrError::missing_induction_var());
        }

        let mut seen_sites = HashSet::new();
        for stmt in &self.body {
            if !seen_sites.insert(stmt.site) {
                return Err(InvalidIrError::duplicate_site(stmt.site));
            }

            for r in &stmt.reads {
                if r.is_empty() {
                    return Err(InvalidIrError::empty_variable(stmt.site));
                }
            }
            if let Some(w) = &stmt.write {
                if w.is_empty() {
                    return Err(InvalidIrError::empty_variable(stmt.site));
                }
            }

            match stmt.kind {
                OpKind::BinOp(_) | OpKind::AugAssign(_) => {
                    if stmt.reads.len() != 2 || stmt.write.is_none() {
                        return Err(InvalidIrError::malformed_statement(
                            stmt.site,
                            "binary operation requires two reads and an output",
                        ));
                    }
                    if let OpKind::AugAssign(_) = stmt.kind {
                        // In-place form reads its own output as the left operand.
                        let out = stmt.write.as_deref().unwrap_or_default();
                        if stmt.reads[0] != out {
                            return Err(InvalidIrError::malformed_statement(
                                stmt.site,
                                "in-place update must read its output as the left operand",
                            ));
                        }
                    }
                }
                OpKind::Load => {
                    if stmt.reads.len() != 2 || stmt.write.is_none() {
                        return Err(InvalidIrError::malformed_statement(
                            stmt.site,
                            "load requires an array, an index and an output",
                        ));
                    }
                }
                OpKind::Store => {
                    if stmt.reads.len() != 3 || stmt.write.is_some() {
                        return Err(InvalidIrError::malformed_statement(
                            stmt.site,
                            "store requires an array, an index and a value, with no output",
                        ));
                    }
                }
                OpKind::Call | OpKind::BuildContainer => {}
                OpKind::Branch => {
                    if stmt.write.is_some() {
                        return Err(InvalidIrError::malformed_statement(
                            stmt.site,
                            "branch must not produce a value",
                        ));
                    }
                }
            }

            if stmt.write.as_deref() == Some(self.induction_var.as_str()) {
                return Err(InvalidIrError::induction_var_written(stmt.site));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trip_count_handles_both_directions() {
        assert_eq!(trip_count(0, 10, 3), 4);
        assert_eq!(trip_count(10, 0, -3), 4);
        assert_eq!(trip_count(0, 0, 1), 0);
        assert_eq!(trip_count(5, 0, 1), 0);
        assert_eq!(trip_count(0, 5, 0), 0);
    }

    #[test]
    fn symbolic_space_has_no_static_trip_count() {
        let space = IterationSpace::new(
            Bound::Const(0),
            Bound::Symbol("n".to_string()),
            Bound::Const(1),
        );
        assert_eq!(space.trip_count(), None);
        assert_eq!(IterationSpace::constant(0, 7, 2).trip_count(), Some(4));
    }

    #[test]
    fn uses_list_one_entry_per_read_and_write() {
        let region = LoopRegion::new(
            "i",
            IterationSpace::constant(0, 4, 1),
            vec![Statement::new(
                0,
                OpKind::AugAssign(BinOp::Add),
                &["acc", "x"],
                Some("acc"),
            )],
        );
        let uses = region.uses(&EscapeMap::new());
        assert_eq!(uses.len(), 3);
        assert_eq!(
            uses.iter()
                .filter(|u| u.direction == UseDirection::Write)
                .count(),
            1
        );
    }

    #[test]
    fn uses_carry_classifier_escape_flags() {
        use crate::analysis::escape::EscapeClassifier;

        let region = LoopRegion::new(
            "i",
            IterationSpace::constant(0, 4, 1),
            vec![
                Statement::new(0, OpKind::Call, &["a"], None),
                Statement::new(1, OpKind::BinOp(BinOp::Add), &["p", "q"], Some("t")),
            ],
        );
        let map = EscapeClassifier::classify(&region);
        let uses = region.uses(&map);

        let a_use = uses.iter().find(|u| u.var == "a").unwrap();
        assert!(a_use.escapes);
        let t_use = uses.iter().find(|u| u.var == "t").unwrap();
        assert!(!t_use.escapes);
    }

    #[test]
    fn validate_rejects_duplicate_sites() {
        let region = LoopRegion::new(
            "i",
            IterationSpace::constant(0, 4, 1),
            vec![
                Statement::new(0, OpKind::Call, &["a"], None),
                Statement::new(0, OpKind::Call, &["b"], None),
            ],
        );
        assert_eq!(region.validate(), Err(InvalidIrError::DuplicateSite(0)));
    }

    #[test]
    fn validate_rejects_misshapen_store() {
        let region = LoopRegion::new(
            "i",
            IterationSpace::constant(0, 4, 1),
            vec![Statement::new(0, OpKind::Store, &["xs", "i"], None)],
        );
        assert!(matches!(
            region.validate(),
            Err(InvalidIrError::MalformedStatement { site: 0, .. })
        ));
    }
}
