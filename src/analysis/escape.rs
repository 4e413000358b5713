// escape.rs - Conservative escape/alias classification for loop bodies

use std::collections::{HashMap, HashSet};

use crate::ir::{LoopRegion, OpKind};

/// Per-variable escape status. Marks are monotonic: once a variable is
/// recorded as escaping, nothing clears it.
#[derive(Debug, Clone, Default)]
pub struct EscapeMap {
    escaped: HashSet<String>,
}

impl EscapeMap {
    pub fn new() -> Self {
        EscapeMap::default()
    }

    /// Mark a variable as escaping. Only ever adds.
    pub fn mark(&mut self, var: &str) -> bool {
        self.escaped.insert(var.to_string())
    }

    pub fn escapes(&self, var: &str) -> bool {
        self.escaped.contains(var)
    }

    pub fn escaped_vars(&self) -> impl Iterator<Item = &str> {
        self.escaped.iter().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.escaped.len()
    }

    pub fn is_empty(&self) -> bool {
        self.escaped.is_empty()
    }
}

/// Classifies which variables may be observed through an unknown aliasing
/// path. Over-marking is sound; under-marking is the defect class this
/// component exists to prevent.
pub struct EscapeClassifier;

impl EscapeClassifier {
    /// Compute the escape map for a loop region.
    ///
    /// A variable escapes when it is an element of a container construction
    /// or an argument of a call with locally unknown effects. Escape is
    /// transitive: when a constructed container itself escapes, every
    /// variable that contributed to building it inherits the mark. Runs to
    /// a fixed point bounded by the number of variables, since a chain of
    /// container builds can need one propagation round per link.
    pub fn classify(region: &LoopRegion) -> EscapeMap {
        let mut map = EscapeMap::new();

        // Contributors of each constructed container, keyed by its output.
        let mut contributors: HashMap<&str, Vec<&str>> = HashMap::new();
        for stmt in &region.body {
            if stmt.kind == OpKind::BuildContainer {
                if let Some(out) = &stmt.write {
                    contributors
                        .entry(out.as_str())
                        .or_default()
                        .extend(stmt.reads.iter().map(|r| r.as_str()));
                }
            }
        }

        let var_count = region.variables().len();
        for round in 0..=var_count {
            let mut changed = false;

            for stmt in &region.body {
                match stmt.kind {
                    OpKind::Call | OpKind::BuildContainer => {
                        for read in &stmt.reads {
                            changed |= map.mark(read);
                        }
                        // A call result may alias its arguments through the callee.
                        if stmt.kind == OpKind::Call {
                            if let Some(out) = &stmt.write {
                                changed |= map.mark(out);
                            }
                        }
                    }
                    _ => {}
                }
            }

            for (container, elems) in &contributors {
                if map.escapes(container) {
                    for elem in elems.iter() {
                        changed |= map.mark(elem);
                    }
                }
            }

            if !changed {
                if cfg!(debug_assertions) {
                    println!(
                        "[ESCAPE] Fixed point after {} round(s): {} escaping variable(s)",
                        round + 1,
                        map.len()
                    );
                }
                break;
            }
        }

        map
    }
}
