// Static analyses feeding the chunk planner: escape classification,
// invariant hoisting and reduction detection.

pub mod escape;
pub mod hoist;
pub mod reduction;

pub use escape::{EscapeClassifier, EscapeMap};
pub use hoist::{HoistPlan, HoistingEngine};
pub use reduction::{AccumulatorCandidate, ReductionDetector, RejectReason, Validity};
