//! Cached evaluation of skill / buff / condition expressions.
//!
//! Source text is rewritten once (accessor compilation + schema checks) and
//! the compiled program is cached under `(canonical_text, scope)`. Scope is
//! `"<caster>_<target|->"` for expressions that read `self.`/`target.` stats
//! and `"global"` for everything else. The program cache evicts in FIFO order
//! once it reaches capacity.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::hash::Hash;
use std::sync::Arc;

use super::ast::{AccessorRoot, Expr};
use super::error::EvalError;
use super::interpreter::{Bindings, interpret};
use super::rewrite::compile_accessors;
use super::schema::NestedSchema;
use super::value::Value;
use crate::types::MemberId;

/// Read access to member stats for accessor resolution.
pub trait StatLookup {
    /// Dynamic value of `path` on `member`, or `None` if either is unknown.
    fn stat_value(&self, member: MemberId, path: &str) -> Option<f64>;
}

/// Local variables visible to an expression.
pub type Locals = BTreeMap<String, Value>;

/// Who is evaluating, against whom, with which locals.
#[derive(Clone, Copy)]
pub struct EvalContext<'a> {
    pub caster: MemberId,
    pub target: Option<MemberId>,
    pub stats: &'a dyn StatLookup,
    pub locals: Option<&'a Locals>,
}

impl<'a> EvalContext<'a> {
    pub fn new(caster: MemberId, stats: &'a dyn StatLookup) -> Self {
        Self {
            caster,
            target: None,
            stats,
            locals: None,
        }
    }

    pub fn with_target(mut self, target: Option<MemberId>) -> Self {
        self.target = target;
        self
    }

    pub fn with_locals(mut self, locals: &'a Locals) -> Self {
        self.locals = Some(locals);
        self
    }

    /// Program-cache scope for an expression with or without accessors.
    pub fn scope(&self, has_accessors: bool) -> String {
        if !has_accessors {
            return "global".to_string();
        }
        match self.target {
            Some(target) => format!("{}_{}", self.caster, target),
            None => format!("{}_-", self.caster),
        }
    }
}

impl Bindings for EvalContext<'_> {
    fn attribute(&self, path: &str) -> Result<f64, EvalError> {
        self.stats
            .stat_value(self.caster, path)
            .ok_or_else(|| EvalError::UnknownAttribute(path.to_string()))
    }

    fn stat(&self, root: AccessorRoot, path: &str) -> Result<f64, EvalError> {
        let member = match root {
            AccessorRoot::SelfMember => self.caster,
            AccessorRoot::Target => self
                .target
                .ok_or_else(|| EvalError::MissingBinding(root.to_string()))?,
        };
        self.stats
            .stat_value(member, path)
            .ok_or_else(|| EvalError::UnknownStat {
                root: root.to_string(),
                path: path.to_string(),
            })
    }

    fn local(&self, name: &str) -> Option<Value> {
        self.locals.and_then(|locals| locals.get(name).cloned())
    }
}

/// Successful, typed evaluation result.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Evaluated {
    Number(f64),
    Bool(bool),
}

impl Evaluated {
    pub fn as_number(self) -> f64 {
        match self {
            Evaluated::Number(n) => n,
            Evaluated::Bool(true) => 1.0,
            Evaluated::Bool(false) => 0.0,
        }
    }

    pub fn as_bool(self) -> bool {
        match self {
            Evaluated::Number(n) => n != 0.0,
            Evaluated::Bool(b) => b,
        }
    }

    /// Coerces an interpreter value; numeric or boolean strings are
    /// converted back to their typed form.
    pub fn from_value(value: Value) -> Result<Self, EvalError> {
        match value {
            Value::Number(n) if n.is_finite() => Ok(Evaluated::Number(n)),
            Value::Number(_) => Err(EvalError::NonFinite),
            Value::Bool(b) => Ok(Evaluated::Bool(b)),
            Value::Str(s) => match s.trim() {
                "true" => Ok(Evaluated::Bool(true)),
                "false" => Ok(Evaluated::Bool(false)),
                "" => Err(EvalError::InvalidResult("string".into())),
                text => match text.parse::<f64>() {
                    Ok(n) if n.is_finite() => Ok(Evaluated::Number(n)),
                    _ => Err(EvalError::InvalidResult("string".into())),
                },
            },
            Value::Null => Err(EvalError::InvalidResult("null".into())),
        }
    }
}

/// Cache diagnostics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub entries: usize,
    pub capacity: usize,
}

/// Insertion-ordered map that drops its oldest entry at capacity.
#[derive(Debug)]
struct FifoCache<K, V> {
    map: HashMap<K, V>,
    order: VecDeque<K>,
    capacity: usize,
    evictions: u64,
}

impl<K: Eq + Hash + Clone, V> FifoCache<K, V> {
    fn new(capacity: usize) -> Self {
        Self {
            map: HashMap::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
            evictions: 0,
        }
    }

    fn get(&self, key: &K) -> Option<&V> {
        self.map.get(key)
    }

    fn insert(&mut self, key: K, value: V) {
        if self.map.contains_key(&key) {
            self.map.insert(key, value);
            return;
        }
        while self.map.len() >= self.capacity {
            match self.order.pop_front() {
                Some(oldest) => {
                    self.map.remove(&oldest);
                    self.evictions += 1;
                }
                None => break,
            }
        }
        self.order.push_back(key.clone());
        self.map.insert(key, value);
    }

    fn contains(&self, key: &K) -> bool {
        self.map.contains_key(key)
    }

    fn len(&self) -> usize {
        self.map.len()
    }

    fn clear(&mut self) {
        self.map.clear();
        self.order.clear();
    }
}

#[derive(Debug)]
struct CompiledExpr {
    expr: Arc<Expr>,
    canonical: String,
    has_accessors: bool,
}

/// Expression evaluator with rewrite and program caches.
#[derive(Debug)]
pub struct ExpressionEvaluator {
    schemas: BTreeMap<AccessorRoot, NestedSchema>,
    rewrites: FifoCache<String, Arc<CompiledExpr>>,
    programs: FifoCache<(String, String), Arc<Expr>>,
    hits: u64,
    misses: u64,
}

impl ExpressionEvaluator {
    pub fn new(capacity: usize) -> Self {
        Self {
            schemas: BTreeMap::new(),
            rewrites: FifoCache::new(capacity),
            programs: FifoCache::new(capacity),
            hits: 0,
            misses: 0,
        }
    }

    /// Installs (or replaces) the accessor schema for one root. Previously
    /// compiled programs are dropped since their validation may change.
    pub fn set_schema(&mut self, root: AccessorRoot, schema: NestedSchema) {
        self.schemas.insert(root, schema);
        self.rewrites.clear();
        self.programs.clear();
    }

    /// Canonical compiled text of `source` (accessors rewritten).
    pub fn compile(&mut self, source: &str) -> Result<String, EvalError> {
        Ok(self.compiled(source)?.canonical.clone())
    }

    fn compiled(&mut self, source: &str) -> Result<Arc<CompiledExpr>, EvalError> {
        let key = source.to_string();
        if let Some(found) = self.rewrites.get(&key) {
            return Ok(Arc::clone(found));
        }
        let expr = compile_accessors(source, &self.schemas)?;
        let compiled = Arc::new(CompiledExpr {
            canonical: expr.to_string(),
            has_accessors: expr.has_accessors(),
            expr: Arc::new(expr),
        });
        self.rewrites.insert(key, Arc::clone(&compiled));
        Ok(compiled)
    }

    fn program(&mut self, compiled: &CompiledExpr, scope: String) -> Arc<Expr> {
        let key = (compiled.canonical.clone(), scope);
        if let Some(program) = self.programs.get(&key) {
            self.hits += 1;
            return Arc::clone(program);
        }
        self.misses += 1;
        let program = Arc::clone(&compiled.expr);
        self.programs.insert(key, Arc::clone(&program));
        program
    }

    pub fn evaluate(&mut self, source: &str, ctx: &EvalContext<'_>) -> Result<Evaluated, EvalError> {
        let compiled = self.compiled(source)?;
        let scope = ctx.scope(compiled.has_accessors);
        let program = self.program(&compiled, scope);
        let value = interpret(&program, ctx)?;
        Evaluated::from_value(value)
    }

    /// Evaluates to a number; any failure is logged and yields 0.
    pub fn evaluate_number_or_zero(&mut self, source: &str, ctx: &EvalContext<'_>) -> f64 {
        match self.evaluate(source, ctx) {
            Ok(value) => value.as_number(),
            Err(error) => {
                tracing::warn!(
                    target: "battle::expr",
                    expression = source,
                    caster = %ctx.caster,
                    %error,
                    "expression evaluation failed; using 0"
                );
                0.0
            }
        }
    }

    /// Evaluates to a boolean; any failure is logged and yields `false`.
    pub fn evaluate_bool_or_false(&mut self, source: &str, ctx: &EvalContext<'_>) -> bool {
        match self.evaluate(source, ctx) {
            Ok(value) => value.as_bool(),
            Err(error) => {
                tracing::warn!(
                    target: "battle::expr",
                    expression = source,
                    caster = %ctx.caster,
                    %error,
                    "condition evaluation failed; using false"
                );
                false
            }
        }
    }

    /// Returns true if `(compiled, scope)` currently has a cached program.
    pub fn is_cached(&self, compiled: &str, scope: &str) -> bool {
        self.programs
            .contains(&(compiled.to_string(), scope.to_string()))
    }

    pub fn cache_stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            evictions: self.programs.evictions,
            entries: self.programs.len(),
            capacity: self.programs.capacity,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    struct Stats(HashMap<(u32, &'static str), f64>);

    impl StatLookup for Stats {
        fn stat_value(&self, member: MemberId, path: &str) -> Option<f64> {
            self.0
                .iter()
                .find(|((id, p), _)| *id == member.0 && *p == path)
                .map(|(_, v)| *v)
        }
    }

    fn stats() -> Stats {
        Stats(HashMap::from([
            ((1, "abi.str"), 20.0),
            ((1, "lv"), 5.0),
            ((2, "def"), 8.0),
        ]))
    }

    #[test]
    fn evaluates_against_caster_and_target() {
        let stats = stats();
        let mut evaluator = ExpressionEvaluator::new(16);
        let ctx = EvalContext::new(MemberId(1), &stats).with_target(Some(MemberId(2)));
        let value = evaluator
            .evaluate("self.abi.str * 2 - target.def", &ctx)
            .unwrap();
        assert_eq!(value, Evaluated::Number(32.0));
    }

    #[test]
    fn cache_is_keyed_by_scope() {
        let stats = stats();
        let mut evaluator = ExpressionEvaluator::new(16);
        let a = EvalContext::new(MemberId(1), &stats).with_target(Some(MemberId(2)));
        let b = EvalContext::new(MemberId(1), &stats);

        evaluator.evaluate("self.lv + 1", &a).unwrap();
        evaluator.evaluate("self.lv + 1", &a).unwrap();
        evaluator.evaluate("self.lv + 1", &b).unwrap();
        evaluator.evaluate("1 + 1", &a).unwrap();
        evaluator.evaluate("1 + 1", &b).unwrap();

        let compiled = "self.statContainer.getValue('lv') + 1";
        assert!(evaluator.is_cached(compiled, "1_2"));
        assert!(evaluator.is_cached(compiled, "1_-"));
        assert!(evaluator.is_cached("1 + 1", "global"));

        let stats = evaluator.cache_stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 3);
        assert_eq!(stats.entries, 3);
    }

    #[test]
    fn fifo_eviction_drops_oldest_program() {
        let stats = stats();
        let mut evaluator = ExpressionEvaluator::new(2);
        let ctx = EvalContext::new(MemberId(1), &stats);
        evaluator.evaluate("1", &ctx).unwrap();
        evaluator.evaluate("2", &ctx).unwrap();
        // Touching the oldest entry does not refresh it.
        evaluator.evaluate("1", &ctx).unwrap();
        evaluator.evaluate("3", &ctx).unwrap();

        assert!(!evaluator.is_cached("1", "global"));
        assert!(evaluator.is_cached("2", "global"));
        assert!(evaluator.is_cached("3", "global"));
        assert_eq!(evaluator.cache_stats().evictions, 1);
    }

    #[test]
    fn string_results_are_coerced() {
        let stats = stats();
        let mut evaluator = ExpressionEvaluator::new(8);
        let ctx = EvalContext::new(MemberId(1), &stats);
        assert_eq!(evaluator.evaluate("'3'", &ctx).unwrap(), Evaluated::Number(3.0));
        assert_eq!(evaluator.evaluate("'true'", &ctx).unwrap(), Evaluated::Bool(true));
        assert!(matches!(
            evaluator.evaluate("'abc'", &ctx),
            Err(EvalError::InvalidResult(_))
        ));
        assert!(matches!(
            evaluator.evaluate("null", &ctx),
            Err(EvalError::InvalidResult(_))
        ));
        assert!(matches!(
            evaluator.evaluate("1 / 0", &ctx),
            Err(EvalError::NonFinite)
        ));
    }

    #[test]
    fn failures_fall_back_to_zero() {
        let stats = stats();
        let mut evaluator = ExpressionEvaluator::new(8);
        let ctx = EvalContext::new(MemberId(1), &stats);
        assert_eq!(evaluator.evaluate_number_or_zero("target.def", &ctx), 0.0);
        assert_eq!(evaluator.evaluate_number_or_zero("self.nope", &ctx), 0.0);
        assert_eq!(evaluator.evaluate_number_or_zero("1 +", &ctx), 0.0);
        assert!(!evaluator.evaluate_bool_or_false("self[0]", &ctx));
    }

    #[test]
    fn locals_are_visible() {
        let stats = stats();
        let mut evaluator = ExpressionEvaluator::new(8);
        let locals = Locals::from([("distance".to_string(), Value::Number(3.0))]);
        let ctx = EvalContext::new(MemberId(1), &stats).with_locals(&locals);
        assert_eq!(
            evaluator.evaluate_number_or_zero("self.lv * distance", &ctx),
            15.0
        );
    }

    #[test]
    fn schema_rejections_are_reported() {
        let stats = stats();
        let mut evaluator = ExpressionEvaluator::new(8);
        evaluator.set_schema(AccessorRoot::SelfMember, NestedSchema::from_paths(["lv"]));
        let ctx = EvalContext::new(MemberId(1), &stats);
        assert!(evaluator.evaluate("self.lv", &ctx).is_ok());
        assert!(matches!(
            evaluator.evaluate("self.abi.str + self.mana", &ctx),
            Err(EvalError::Compile(_))
        ));
    }
}
