use crate::store::{Variable, VariableStore};
use std::collections::HashMap;
use std::fmt::Write;

/// Renders the dependency tree of `target` with current values, following
/// the declared `depends` lists.
pub fn format_trace(store: &VariableStore, target: &str) -> String {
    let mut tracer = Tracer {
        store,
        visited_at_level: HashMap::new(),
        output: String::new(),
    };

    match store.index_of(target) {
        Some(idx) => {
            let _ = writeln!(tracer.output, "AUDIT TRACE for variable '{}':", target);
            let _ = writeln!(tracer.output, "--------------------------------------------------");
            tracer.trace_node(idx, 1, "");
        }
        None => {
            let _ = writeln!(tracer.output, "Error: Unknown variable '{}'", target);
        }
    }
    tracer.output
}

struct Tracer<'a> {
    store: &'a VariableStore,
    visited_at_level: HashMap<usize, usize>,
    output: String,
}

impl<'a> Tracer<'a> {
    fn trace_node(&mut self, idx: usize, level: usize, prefix: &str) {
        if let Some(&first_seen) = self.visited_at_level.get(&idx) {
            let _ = writeln!(self.output, "{}-> (Ref to L{})", prefix, first_seen);
            return;
        }
        self.visited_at_level.insert(idx, level);

        let var = &self.store.variables()[idx];
        let line_header = format!("[L{}] {}{}", level, var.id, format_value(var));

        match var.expr.as_deref() {
            None if var.is_input() => {
                let _ = writeln!(self.output, "{}{} -> Input", prefix, line_header);
            }
            None => {
                let _ = writeln!(self.output, "{}{} -> (no expression)", prefix, line_header);
            }
            Some(expr) => {
                let _ = writeln!(self.output, "{}{} = {}", prefix, line_header, expr);
                self.recurse_children(prefix, var, level);
            }
        }
    }

    fn recurse_children(&mut self, prefix: &str, var: &Variable, level: usize) {
        let stem = build_child_stem(prefix);
        let deps = &var.depends;
        for (i, dep) in deps.iter().enumerate() {
            let connector = if i == deps.len() - 1 { "`--" } else { "|--" };
            let full_prefix = format!("{}{}", stem, connector);
            match self.store.index_of(dep) {
                Some(child) => self.trace_node(child, level + 1, &full_prefix),
                None => {
                    let _ = writeln!(self.output, "{}[L{}] {} -> (missing)", full_prefix, level + 1, dep);
                }
            }
        }
    }
}

fn format_value(var: &Variable) -> String {
    match var.value {
        Some(v) => format!("[{:.3}]", v),
        None => "[null]".to_string(),
    }
}

fn build_child_stem(current_prefix: &str) -> String {
    current_prefix.replace("`--", "   ").replace("|--", "|  ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::evaluate_all;
    use crate::store::Department;

    #[test]
    fn test_trace_tree() {
        let mut store = VariableStore::from_variables([
            Variable::input(1, "x", Department::Ocean, Some(2.0)),
            Variable::derived(2, "a", Department::Ocean, 1, "x * 2").with_depends(["x"]),
            Variable::derived(3, "b", Department::Ocean, 2, "a + x + ghost").with_depends(["a", "x", "ghost"]),
        ])
        .unwrap();
        evaluate_all(&mut store);

        let out = format_trace(&store, "b");
        let expected = "\
AUDIT TRACE for variable 'b':
--------------------------------------------------
[L1] b[null] = a + x + ghost
|--[L2] a[4.000] = x * 2
|  `--[L3] x[2.000] -> Input
|---> (Ref to L3)
`--[L2] ghost -> (missing)
";
        assert_eq!(out, expected);
    }

    #[test]
    fn test_unknown_target() {
        let store = VariableStore::new();
        assert!(format_trace(&store, "nope").starts_with("Error"));
    }
}
