// error.rs - Error taxonomy for the parallelization pass

use thiserror::Error;

/// Non-fatal analysis rejection: the loop cannot be safely parallelized.
/// The caller decides whether to fall back to sequential execution.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisRejected {
    #[error("Loop-carried variable '{0}' is neither invariant nor a valid reduction")]
    UnsupportedLoopCarried(String),

    #[error("Statement at site {0} has per-iteration side effects that forbid chunking")]
    SideEffectingBody(usize),

    #[error("Accumulator '{0}' is updated with more than one operator")]
    MixedOperators(String),

    #[error("Accumulator '{0}' escapes; partial values would be externally visible")]
    EscapingAccumulator(String),

    #[error("Operator '{0}' is not registered as an associative/commutative reduction")]
    UnsupportedOperator(String),

    #[error("Accumulator '{0}' is read outside its own update")]
    AccumulatorReadElsewhere(String),

    #[error("Accumulator '{0}' appears as the right operand of a non-commutative operator")]
    NonCommutativeRightOperand(String),

    #[error("Branch at site {0} leaves the body control-flow dependent; conditional bodies are not chunked")]
    ControlFlowInBody(usize),

    #[error("Iteration space has no parallelizable structure")]
    DegenerateIterationSpace,
}

/// Fatal structural-contract violation in the input LoopRegion. These are
/// front-end programming errors; no recovery is attempted.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InvalidIrError {
    #[error("Loop region has no induction variable")]
    MissingInductionVar,

    #[error("Duplicate statement site identifier: {0}")]
    DuplicateSite(usize),

    #[error("Statement at site {0} references an empty variable name")]
    EmptyVariable(usize),

    #[error("Malformed statement at site {site}: {reason}")]
    MalformedStatement { site: usize, reason: String },

    #[error("Statement at site {0} writes the induction variable")]
    InductionVarWritten(usize),

    #[error("Unbound symbolic bound '{0}'")]
    UnboundSymbol(String),
}

impl InvalidIrError {
    pub fn missing_induction_var() -> Self {
        InvalidIrError::MissingInductionVar
    }

    pub fn duplicate_site(site: usize) -> Self {
        InvalidIrError::DuplicateSite(site)
    }

    pub fn empty_variable(site: usize) -> Self {
        InvalidIrError::EmptyVariable(site)
    }

    pub fn malformed_statement(site: usize, reason: &str) -> Self {
        InvalidIrError::MalformedStatement {
            site,
            reason: reason.to_string(),
        }
    }

    pub fn induction_var_written(site: usize) -> Self {
        InvalidIrError::InductionVarWritten(site)
    }

    pub fn unbound_symbol(name: &str) -> Self {
        InvalidIrError::UnboundSymbol(name.to_string())
    }
}

/// A failure during chunk execution, tagged with the originating chunk.
/// Causes the combine step to be skipped unconditionally.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Chunk {chunk} failed: {kind}")]
pub struct RuntimeFailure {
    pub chunk: usize,
    pub kind: EvalErrorKind,
}

/// What went wrong while evaluating a statement.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalErrorKind {
    #[error("Unbound variable: {0}")]
    UnboundVariable(String),

    #[error("Type mismatch applying '{op}': {detail}")]
    TypeMismatch { op: String, detail: String },

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Index {index} out of bounds for array '{array}' of length {len}")]
    IndexOutOfBounds {
        array: String,
        index: i64,
        len: usize,
    },

    #[error("Statement at site {0} has no local evaluation semantics")]
    Unevaluable(usize),
}

impl EvalErrorKind {
    pub fn unbound(name: &str) -> Self {
        EvalErrorKind::UnboundVariable(name.to_string())
    }

    pub fn type_mismatch(op: &str, detail: &str) -> Self {
        EvalErrorKind::TypeMismatch {
            op: op.to_string(),
            detail: detail.to_string(),
        }
    }
}

/// Public error surface of the pass.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParallelizeError {
    #[error("Analysis rejected: {0}")]
    Rejected(#[from] AnalysisRejected),

    #[error("Invalid loop IR: {0}")]
    InvalidIr(#[from] InvalidIrError),

    #[error("Runtime failure: {0}")]
    Runtime(#[from] RuntimeFailure),
}

impl ParallelizeError {
    /// Whether a sequential fallback is an appropriate response.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ParallelizeError::Rejected(_))
    }
}
