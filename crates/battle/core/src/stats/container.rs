//! Per-member attribute graph.
//!
//! Modifiers live in an arena with stable indices. A formula's `_get`
//! references become edges `dependency -> dependent`; any change pushes a
//! recomputation through everything reachable from the changed node in
//! topological order. Cycles are rejected when a formula is installed, so
//! recomputation always terminates.

use std::collections::BTreeMap;

use super::error::StatError;
use super::modifier::{BaseSource, Modifier, ModifierBucket, ModifierEntry};
use crate::expr::{
    AccessorRoot, Bindings, EvalError, Evaluated, Expr, Value, compile_attribute_formula,
    interpret,
};

#[derive(Clone, Debug, Default)]
pub struct StatContainer {
    nodes: Vec<Modifier>,
    index: BTreeMap<String, usize>,
    /// `dependents[i]`: nodes whose formula reads node `i`.
    dependents: Vec<Vec<usize>>,
    /// `dependencies[i]`: nodes read by node `i`'s formula.
    dependencies: Vec<Vec<usize>>,
}

/// Values of one attribute at snapshot time.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StatValue {
    pub base: f64,
    pub static_total: f64,
    pub dynamic_total: f64,
}

/// Path-sorted view of every attribute.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StatSnapshot {
    pub values: BTreeMap<String, StatValue>,
}

impl StatSnapshot {
    pub fn dynamic(&self, path: &str) -> Option<f64> {
        self.values.get(path).map(|v| v.dynamic_total)
    }
}

impl StatContainer {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Declaration
    // ========================================================================

    /// Declares `path` with a plain base value. Re-declaring an existing
    /// path just replaces its base.
    pub fn declare(&mut self, path: impl Into<String>, base: f64) {
        let path = path.into();
        if let Some(&idx) = self.index.get(&path) {
            self.install_value(idx, base);
            return;
        }
        let idx = self.nodes.len();
        self.nodes.push(Modifier::new(path.clone(), base));
        self.dependents.push(Vec::new());
        self.dependencies.push(Vec::new());
        self.index.insert(path, idx);
    }

    /// Declares `path` (if needed) and installs `formula` as its base.
    ///
    /// Returns compiler warnings (e.g. self-references).
    pub fn declare_formula(
        &mut self,
        path: impl Into<String>,
        formula: &str,
    ) -> Result<Vec<String>, StatError> {
        let path = path.into();
        if !self.index.contains_key(&path) {
            self.declare(path.clone(), 0.0);
        }
        self.set_formula(&path, formula)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.index.contains_key(path)
    }

    /// Declared paths in declaration order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(Modifier::path)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn modifier(&self, path: &str) -> Option<&Modifier> {
        self.index.get(path).map(|&idx| &self.nodes[idx])
    }

    /// Paths whose formulas read `path` directly.
    pub fn dependents_of(&self, path: &str) -> Vec<&str> {
        self.index
            .get(path)
            .map(|&idx| {
                self.dependents[idx]
                    .iter()
                    .map(|&d| self.nodes[d].path())
                    .collect()
            })
            .unwrap_or_default()
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// In-battle (dynamic) value.
    pub fn get_value(&self, path: &str) -> Option<f64> {
        self.modifier(path).map(Modifier::dynamic_total)
    }

    /// Character-sheet (static) value.
    pub fn get_static_value(&self, path: &str) -> Option<f64> {
        self.modifier(path).map(Modifier::static_total)
    }

    pub fn snapshot(&self) -> StatSnapshot {
        let values = self
            .nodes
            .iter()
            .map(|node| {
                (
                    node.path().to_string(),
                    StatValue {
                        base: node.base_value(),
                        static_total: node.static_total(),
                        dynamic_total: node.dynamic_total(),
                    },
                )
            })
            .collect();
        StatSnapshot { values }
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Replaces the base with a plain value, dropping any formula.
    pub fn set_base(&mut self, path: &str, value: f64) -> Result<(), StatError> {
        let idx = self.lookup(path)?;
        self.install_value(idx, value);
        Ok(())
    }

    /// Adds `delta` to a plain base; returns the new dynamic value.
    pub fn add_base(&mut self, path: &str, delta: f64) -> Result<f64, StatError> {
        let idx = self.lookup(path)?;
        let current = match self.nodes[idx].base() {
            BaseSource::Value(v) => *v,
            BaseSource::Formula { .. } => return Err(StatError::FormulaBase(path.to_string())),
        };
        self.install_value(idx, current + delta);
        Ok(self.nodes[idx].dynamic_total())
    }

    /// Compiles and installs `formula` as the base of `path`.
    ///
    /// On failure (parse error, cycle) the previous base is kept.
    pub fn set_formula(&mut self, path: &str, formula: &str) -> Result<Vec<String>, StatError> {
        let idx = self.lookup(path)?;
        let index = &self.index;
        let compiled = compile_attribute_formula(path, formula, &|p: &str| index.contains_key(p))
            .map_err(|source| StatError::Compile {
                path: path.to_string(),
                source,
            })?;

        if let Some(Value::Number(n)) = literal_value(&compiled.expr) {
            self.install_value(idx, n);
            return Ok(compiled.warnings);
        }

        let deps: Vec<usize> = compiled
            .references
            .iter()
            .filter_map(|p| self.index.get(p).copied())
            .collect();

        for &dep in &deps {
            if let Some(cycle) = self.path_between(idx, dep) {
                return Err(StatError::CyclicDependency {
                    path: path.to_string(),
                    cycle,
                });
            }
        }

        let warnings = compiled.warnings.clone();
        self.unlink(idx);
        for &dep in &deps {
            if !self.dependents[dep].contains(&idx) {
                self.dependents[dep].push(idx);
            }
        }
        self.dependencies[idx] = deps;
        self.nodes[idx].base = BaseSource::Formula {
            source: formula.to_string(),
            compiled,
        };
        self.propagate(idx);
        Ok(warnings)
    }

    pub fn add_modifier(
        &mut self,
        path: &str,
        bucket: ModifierBucket,
        value: f64,
        origin: impl Into<String>,
    ) -> Result<(), StatError> {
        let idx = self.lookup(path)?;
        self.nodes[idx].push(
            bucket,
            ModifierEntry {
                value,
                origin: origin.into(),
            },
        );
        self.propagate(idx);
        Ok(())
    }

    /// Retracts every bucket entry contributed by `origin` across all
    /// attributes; returns the number of entries removed.
    pub fn remove_modifiers_by_origin(&mut self, origin: &str) -> usize {
        let mut removed = 0;
        for idx in 0..self.nodes.len() {
            let count = self.nodes[idx].retain_not_from(origin);
            if count > 0 {
                removed += count;
                self.propagate(idx);
            }
        }
        removed
    }

    // ========================================================================
    // Graph maintenance
    // ========================================================================

    fn lookup(&self, path: &str) -> Result<usize, StatError> {
        self.index
            .get(path)
            .copied()
            .ok_or_else(|| StatError::UnknownAttribute(path.to_string()))
    }

    fn install_value(&mut self, idx: usize, value: f64) {
        self.unlink(idx);
        self.nodes[idx].base = BaseSource::Value(value);
        self.propagate(idx);
    }

    fn unlink(&mut self, idx: usize) {
        for dep in std::mem::take(&mut self.dependencies[idx]) {
            self.dependents[dep].retain(|&d| d != idx);
        }
    }

    /// Dependency path `from -> ... -> to` along dependent edges, if any.
    /// A hit means `to` already (transitively) reads `from`.
    fn path_between(&self, from: usize, to: usize) -> Option<Vec<String>> {
        let mut parent: BTreeMap<usize, usize> = BTreeMap::new();
        let mut stack = vec![from];
        let mut seen = vec![false; self.nodes.len()];
        seen[from] = true;
        while let Some(node) = stack.pop() {
            if node == to {
                let mut chain = vec![self.nodes[node].path().to_string()];
                let mut cursor = node;
                while let Some(&prev) = parent.get(&cursor) {
                    chain.push(self.nodes[prev].path().to_string());
                    cursor = prev;
                }
                chain.reverse();
                chain.push(self.nodes[from].path().to_string());
                return Some(chain);
            }
            for &next in &self.dependents[node] {
                if !seen[next] {
                    seen[next] = true;
                    parent.insert(next, node);
                    stack.push(next);
                }
            }
        }
        None
    }

    /// Recomputes `start` and everything downstream of it, each node after
    /// all of its upstream nodes in the affected set.
    fn propagate(&mut self, start: usize) {
        let mut postorder = Vec::new();
        let mut visited = vec![false; self.nodes.len()];
        self.visit_postorder(start, &mut visited, &mut postorder);
        for idx in postorder.into_iter().rev() {
            self.recompute(idx);
        }
    }

    fn visit_postorder(&self, idx: usize, visited: &mut [bool], out: &mut Vec<usize>) {
        if visited[idx] {
            return;
        }
        visited[idx] = true;
        for &next in &self.dependents[idx] {
            self.visit_postorder(next, visited, out);
        }
        out.push(idx);
    }

    fn recompute(&mut self, idx: usize) {
        let (static_base, dynamic_base) = match self.nodes[idx].base() {
            BaseSource::Value(v) => (*v, *v),
            BaseSource::Formula { compiled, .. } => {
                let expr = &compiled.expr;
                let path = self.nodes[idx].path();
                (
                    self.evaluate_formula(path, expr, Pass::Static),
                    self.evaluate_formula(path, expr, Pass::Dynamic),
                )
            }
        };
        let node = &mut self.nodes[idx];
        node.static_base = static_base;
        node.dynamic_base = dynamic_base;
        node.recompute_totals();
    }

    fn evaluate_formula(&self, path: &str, expr: &Expr, pass: Pass) -> f64 {
        let scope = FormulaScope {
            container: self,
            pass,
        };
        match interpret(expr, &scope).and_then(Evaluated::from_value) {
            Ok(value) => value.as_number(),
            Err(error) => {
                tracing::warn!(
                    target: "battle::stats",
                    attribute = path,
                    %error,
                    "formula evaluation failed; using 0"
                );
                0.0
            }
        }
    }
}

#[derive(Clone, Copy)]
enum Pass {
    Static,
    Dynamic,
}

/// Resolves `_get` against the container for one recompute pass.
struct FormulaScope<'a> {
    container: &'a StatContainer,
    pass: Pass,
}

impl Bindings for FormulaScope<'_> {
    fn attribute(&self, path: &str) -> Result<f64, EvalError> {
        let node = self
            .container
            .modifier(path)
            .ok_or_else(|| EvalError::UnknownAttribute(path.to_string()))?;
        Ok(match self.pass {
            Pass::Static => node.static_total(),
            Pass::Dynamic => node.dynamic_total(),
        })
    }

    fn stat(&self, root: AccessorRoot, _path: &str) -> Result<f64, EvalError> {
        Err(EvalError::MissingBinding(root.to_string()))
    }

    fn local(&self, _name: &str) -> Option<Value> {
        None
    }
}

fn literal_value(expr: &Expr) -> Option<Value> {
    match expr {
        Expr::Literal(Value::Str(s)) => {
            s.trim().parse::<f64>().ok().map(Value::Number)
        }
        Expr::Literal(value) => Some(Value::Number(value.to_number())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet() -> StatContainer {
        let mut stats = StatContainer::new();
        stats.declare("abi.vit", 10.0);
        stats.declare("abi.str", 20.0);
        stats.declare("lv", 5.0);
        stats.declare_formula("hp.max", "abi.vit * 10 + lv * 2").unwrap();
        stats
            .declare_formula("atk", "Math.floor(abi.str * 1.5) + hp.max / 20")
            .unwrap();
        stats
    }

    #[test]
    fn worked_example_130_then_135() {
        let mut stats = StatContainer::new();
        stats.declare("atk", 100.0);
        stats
            .add_modifier("atk", ModifierBucket::StaticFixed, 10.0, "gear")
            .unwrap();
        stats
            .add_modifier("atk", ModifierBucket::StaticPercentage, 20.0, "gear")
            .unwrap();
        assert_eq!(stats.get_static_value("atk"), Some(130.0));

        stats
            .add_modifier("atk", ModifierBucket::DynamicPercentage, 5.0, "buff:rage")
            .unwrap();
        assert_eq!(stats.get_value("atk"), Some(135.0));
        assert_eq!(stats.get_static_value("atk"), Some(130.0));
    }

    #[test]
    fn formulas_follow_their_dependencies() {
        let mut stats = sheet();
        assert_eq!(stats.get_value("hp.max"), Some(110.0));
        assert_eq!(stats.get_value("atk"), Some(35.0));

        stats.set_base("abi.vit", 30.0).unwrap();
        assert_eq!(stats.get_value("hp.max"), Some(310.0));
        // atk reads hp.max, which changed transitively.
        assert_eq!(stats.get_value("atk"), Some(45.0));
    }

    #[test]
    fn modifiers_on_dependency_push_to_dependents() {
        let mut stats = sheet();
        stats
            .add_modifier("abi.vit", ModifierBucket::DynamicFixed, 5.0, "buff:vit")
            .unwrap();
        assert_eq!(stats.get_value("hp.max"), Some(160.0));
        // The static pass does not see dynamic entries.
        assert_eq!(stats.get_static_value("hp.max"), Some(110.0));

        assert_eq!(stats.remove_modifiers_by_origin("buff:vit"), 1);
        assert_eq!(stats.get_value("hp.max"), Some(110.0));
    }

    #[test]
    fn cycles_are_rejected_and_previous_form_kept() {
        let mut stats = sheet();
        let err = stats.set_formula("abi.vit", "hp.max / 10").unwrap_err();
        assert!(matches!(err, StatError::CyclicDependency { .. }));
        assert_eq!(stats.get_value("abi.vit"), Some(10.0));
        assert!(matches!(stats.modifier("abi.vit").unwrap().base(), BaseSource::Value(_)));

        // Longer cycle through atk -> hp.max -> abi.vit.
        let err = stats.set_formula("abi.vit", "atk - 1").unwrap_err();
        match err {
            StatError::CyclicDependency { cycle, .. } => {
                assert_eq!(cycle.first().map(String::as_str), Some("abi.vit"));
                assert_eq!(cycle.last().map(String::as_str), Some("abi.vit"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parse_failure_keeps_previous_formula() {
        let mut stats = sheet();
        assert!(matches!(
            stats.set_formula("hp.max", "abi.vit *"),
            Err(StatError::Compile { .. })
        ));
        assert_eq!(stats.get_value("hp.max"), Some(110.0));
        stats.set_base("abi.vit", 11.0).unwrap();
        assert_eq!(stats.get_value("hp.max"), Some(120.0));
    }

    #[test]
    fn self_reference_warns_and_evaluates_to_zero_base() {
        let mut stats = StatContainer::new();
        stats.declare("lv", 2.0);
        let warnings = stats.declare_formula("mp.max", "mp.max + lv").unwrap();
        assert_eq!(warnings.len(), 1);
        assert_eq!(stats.get_value("mp.max"), Some(0.0));
    }

    #[test]
    fn replacing_formula_relinks_dependencies() {
        let mut stats = sheet();
        stats.set_formula("hp.max", "lv * 100").unwrap();
        assert!(stats.dependents_of("abi.vit").is_empty());
        assert_eq!(stats.dependents_of("lv"), vec!["hp.max"]);
        stats.set_base("abi.vit", 999.0).unwrap();
        assert_eq!(stats.get_value("hp.max"), Some(500.0));
    }

    #[test]
    fn add_base_rejects_formula_attributes() {
        let mut stats = sheet();
        assert_eq!(stats.add_base("lv", 1.0), Ok(6.0));
        assert!(matches!(
            stats.add_base("hp.max", -10.0),
            Err(StatError::FormulaBase(_))
        ));
        assert!(matches!(
            stats.add_base("nope", 1.0),
            Err(StatError::UnknownAttribute(_))
        ));
    }

    #[test]
    fn snapshot_is_path_sorted() {
        let snapshot = sheet().snapshot();
        let keys: Vec<_> = snapshot.values.keys().cloned().collect();
        assert_eq!(keys, vec!["abi.str", "abi.vit", "atk", "hp.max", "lv"]);
        assert_eq!(snapshot.dynamic("hp.max"), Some(110.0));
    }
}
