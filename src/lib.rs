pub mod analysis;
pub mod config;
pub mod error;
pub mod executor;
pub mod ir;
pub mod planner;
pub mod transform;
pub mod value;

pub use analysis::{AccumulatorCandidate, EscapeClassifier, EscapeMap, Validity};
pub use config::{OperatorRegistry, OperatorSpec, ParallelConfig};
pub use error::{AnalysisRejected, InvalidIrError, ParallelizeError, RuntimeFailure};
pub use ir::{BinOp, Bound, IterationSpace, LoopRegion, OpKind, Statement};
pub use transform::{parallelize, ParallelPlan};
pub use value::Value;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
