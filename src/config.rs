// config.rs - Configuration surface: worker count and the reduction-operator registry

use std::collections::HashMap;

use crate::ir::BinOp;
use crate::value::Value;

/// Algebraic facts the pass relies on for one reduction operator. Entries
/// are declared by the caller (or the defaults below), never inferred.
#[derive(Debug, Clone, PartialEq)]
pub struct OperatorSpec {
    /// Identity element used to seed per-chunk partial accumulators.
    pub identity: Value,
    pub associative: bool,
    pub commutative: bool,
}

/// Registry mapping operators to their reduction guarantees. Extensible by
/// the caller; operators absent from the registry are never treated as
/// reductions.
#[derive(Debug, Clone)]
pub struct OperatorRegistry {
    table: HashMap<BinOp, OperatorSpec>,
}

impl OperatorRegistry {
    /// Empty registry; nothing is recognized as a reduction.
    pub fn empty() -> Self {
        OperatorRegistry {
            table: HashMap::new(),
        }
    }

    /// Register or replace an operator entry.
    pub fn register(&mut self, op: BinOp, spec: OperatorSpec) {
        self.table.insert(op, spec);
    }

    pub fn lookup(&self, op: BinOp) -> Option<&OperatorSpec> {
        self.table.get(&op)
    }
}

impl Default for OperatorRegistry {
    /// The whitelist of operators known to be associative and commutative
    /// over their value domains, with their identity elements.
    fn default() -> Self {
        let mut registry = OperatorRegistry::empty();
        let entries = [
            (BinOp::Add, Value::Int(0)),
            (BinOp::Mul, Value::Int(1)),
            (BinOp::Min, Value::Float(f64::INFINITY)),
            (BinOp::Max, Value::Float(f64::NEG_INFINITY)),
            (BinOp::BitOr, Value::Int(0)),
            (BinOp::BitAnd, Value::Int(-1)),
            (BinOp::LogicalOr, Value::Bool(false)),
            (BinOp::LogicalAnd, Value::Bool(true)),
        ];
        for (op, identity) in entries {
            registry.register(
                op,
                OperatorSpec {
                    identity,
                    associative: true,
                    commutative: true,
                },
            );
        }
        registry
    }
}

/// Configuration for one parallelization run.
#[derive(Debug, Clone)]
pub struct ParallelConfig {
    /// Number of workers, and therefore chunks, to plan for.
    pub workers: usize,
    pub registry: OperatorRegistry,
}

impl ParallelConfig {
    pub fn new(workers: usize) -> Self {
        ParallelConfig {
            workers: workers.max(1),
            registry: OperatorRegistry::default(),
        }
    }
}

impl Default for ParallelConfig {
    fn default() -> Self {
        ParallelConfig::new(rayon::current_num_threads())
    }
}
