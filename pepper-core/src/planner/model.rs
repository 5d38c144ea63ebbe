use std::collections::BTreeMap;

/// Resolved execution order for a document.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ExecutionPlan {
    /// Total order; every leaf follows its dependencies and `global` comes first.
    pub order: Vec<String>,
    /// For each leaf, the leaves it depends on.
    pub depends_on: BTreeMap<String, Vec<String>>,
    /// Leaves grouped by dependency depth; leaves in one level are independent.
    pub levels: Vec<Vec<String>>,
}

impl ExecutionPlan {
    pub fn position(&self, name: &str) -> Option<usize> {
        self.order.iter().position(|n| n == name)
    }

    pub fn to_dot(&self, title: &str) -> String {
        let mut out = String::new();
        out.push_str("digraph pepper {\n");
        out.push_str(&format!("  label={};\n", quoted(title)));
        out.push_str("  labelloc=t;\n");
        out.push_str("  rankdir=LR;\n");

        for leaf in &self.order {
            let deps = self.depends_on.get(leaf).map(Vec::as_slice).unwrap_or(&[]);
            if deps.is_empty() {
                out.push_str(&format!("  {};\n", quoted(leaf)));
            } else {
                for dep in deps {
                    out.push_str(&format!("  {} -> {};\n", quoted(dep), quoted(leaf)));
                }
            }
        }

        for level in &self.levels {
            if level.len() > 1 {
                out.push_str("  { rank=same; ");
                for s in level {
                    out.push_str(&format!("{}; ", quoted(s)));
                }
                out.push_str("}\n");
            }
        }

        out.push_str("}\n");
        out
    }
}

/// DOT double-quoted ID; names are free text up to their `(`.
fn quoted(id: &str) -> String {
    let mut out = String::with_capacity(id.len() + 2);
    out.push('"');
    for c in id.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => {}
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
