//! AST rewriting passes.
//!
//! Two compilers share the same technique:
//!
//! - [`compile_attribute_formula`] turns references to known attribute paths
//!   into `_get('<path>')` lookups, so a formula never reads a free variable
//!   that happens to share a name with an attribute.
//! - [`compile_accessors`] turns `self.<path>` / `target.<path>` chains into
//!   explicit stat accessors (`self.statContainer.getValue('<path>')`).
//!
//! Both passes recognise their own output when it is fed back in, so
//! recompiling a printed expression is a no-op.

use std::collections::BTreeMap;

use super::ast::{AccessorRoot, Expr};
use super::error::CompileError;
use super::parser::parse;
use super::schema::NestedSchema;
use super::value::Value;

/// Identifiers that always refer to the language, never to attributes.
pub const PROTECTED_IDENTIFIERS: &[&str] = &[
    "Math",
    "parseInt",
    "parseFloat",
    "Number",
    "isNaN",
    "true",
    "false",
    "null",
    "_get",
];

pub fn is_protected(name: &str) -> bool {
    PROTECTED_IDENTIFIERS.contains(&name)
}

/// Result of compiling an attribute formula.
#[derive(Clone, Debug, PartialEq)]
pub struct CompiledFormula {
    pub expr: Expr,
    /// Attribute paths read through `_get`, in first-occurrence order.
    pub references: Vec<String>,
    pub warnings: Vec<String>,
}

impl CompiledFormula {
    /// Canonical printed form.
    pub fn canonical(&self) -> String {
        self.expr.to_string()
    }

    pub fn is_literal(&self) -> bool {
        matches!(self.expr, Expr::Literal(_))
    }
}

/// Compiles `formula` for attribute `attribute`, replacing every reference
/// to a path in `is_known` (other than `attribute` itself) with `_get`.
pub fn compile_attribute_formula(
    attribute: &str,
    formula: &str,
    is_known: &dyn Fn(&str) -> bool,
) -> Result<CompiledFormula, CompileError> {
    let parsed = parse(formula)?;

    if let Some(literal) = as_simple_literal(&parsed) {
        return Ok(CompiledFormula {
            expr: Expr::Literal(literal),
            references: Vec::new(),
            warnings: Vec::new(),
        });
    }

    let mut warnings = Vec::new();
    let expr = rewrite_attributes(parsed, attribute, is_known, &mut warnings);
    let references = expr.attribute_refs();
    Ok(CompiledFormula {
        expr,
        references,
        warnings,
    })
}

fn as_simple_literal(expr: &Expr) -> Option<Value> {
    match expr {
        Expr::Literal(value) => Some(value.clone()),
        Expr::Unary {
            op: super::ast::UnaryOp::Neg,
            operand,
        } => match operand.as_ref() {
            Expr::Literal(Value::Number(n)) => Some(Value::Number(-n)),
            _ => None,
        },
        _ => None,
    }
}

fn rewrite_attributes(
    expr: Expr,
    attribute: &str,
    is_known: &dyn Fn(&str) -> bool,
    warnings: &mut Vec<String>,
) -> Expr {
    if let Some(path) = expr.dotted_path() {
        let root = expr.chain_root().unwrap_or_default();
        if is_protected(root) {
            return expr;
        }
        if path == attribute {
            let warning = format!("attribute `{attribute}` references itself");
            if !warnings.contains(&warning) {
                warnings.push(warning);
            }
            return expr;
        }
        if is_known(&path) {
            return Expr::Get(path);
        }
        return match expr {
            Expr::Member { object, property } => Expr::Member {
                object: Box::new(rewrite_attributes(*object, attribute, is_known, warnings)),
                property,
            },
            other => other,
        };
    }

    match expr {
        Expr::Call { callee, args } => {
            if let Some(normalized) = recognize_lookup(&callee, &args) {
                return normalized;
            }
            let args = args
                .into_iter()
                .map(|arg| rewrite_attributes(arg, attribute, is_known, warnings))
                .collect();
            let callee = if callee.dotted_path().is_some() {
                // Function names are never attribute references.
                *callee
            } else {
                rewrite_attributes(*callee, attribute, is_known, warnings)
            };
            Expr::Call {
                callee: Box::new(callee),
                args,
            }
        }
        other => map_children(other, &mut |child| {
            rewrite_attributes(child, attribute, is_known, warnings)
        }),
    }
}

/// Compiles `self.`/`target.` chains into stat accessors and validates the
/// resulting paths against the optional per-root schemas.
pub fn compile_accessors(
    source: &str,
    schemas: &BTreeMap<AccessorRoot, NestedSchema>,
) -> Result<Expr, CompileError> {
    let parsed = parse(source)?;
    let expr = rewrite_accessors(parsed)?;

    let mut invalid = Vec::new();
    for (root, path) in expr.accessor_refs() {
        if let Some(schema) = schemas.get(&root)
            && !schema.contains(&path)
        {
            invalid.push(format!("{root}.{path}"));
        }
    }
    if invalid.is_empty() {
        Ok(expr)
    } else {
        Err(CompileError::InvalidPaths { paths: invalid })
    }
}

fn rewrite_accessors(expr: Expr) -> Result<Expr, CompileError> {
    if let Some(path) = expr.dotted_path() {
        let mut segments = path.splitn(2, '.');
        let head = segments.next().unwrap_or_default();
        if let Some(root) = AccessorRoot::from_ident(head) {
            return match segments.next() {
                Some(rest) if !rest.is_empty() => Ok(Expr::StatAccess {
                    root,
                    path: rest.to_string(),
                }),
                _ => Err(CompileError::InvalidAccessor {
                    root: head.to_string(),
                }),
            };
        }
        return Ok(expr);
    }

    match expr {
        Expr::Call { callee, args } => {
            if let Some(normalized) = recognize_lookup(&callee, &args) {
                return Ok(normalized);
            }
            if let Some(root) = callee.chain_root()
                && AccessorRoot::from_ident(root).is_some()
            {
                return Err(CompileError::InvalidAccessor {
                    root: root.to_string(),
                });
            }
            let args = args
                .into_iter()
                .map(rewrite_accessors)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Expr::Call {
                callee: Box::new(rewrite_accessors(*callee)?),
                args,
            })
        }
        other => try_map_children(other, &mut rewrite_accessors),
    }
}

/// Recognises already-compiled lookups: `_get('p')` and
/// `<root>.statContainer.getValue('p')`.
fn recognize_lookup(callee: &Expr, args: &[Expr]) -> Option<Expr> {
    let [Expr::Literal(Value::Str(path))] = args else {
        return None;
    };
    let callee_path = callee.dotted_path()?;
    if callee_path == "_get" {
        return Some(Expr::Get(path.clone()));
    }
    let (head, tail) = callee_path.split_once('.')?;
    if tail == "statContainer.getValue" {
        let root = AccessorRoot::from_ident(head)?;
        return Some(Expr::StatAccess {
            root,
            path: path.clone(),
        });
    }
    None
}

fn map_children(expr: Expr, f: &mut dyn FnMut(Expr) -> Expr) -> Expr {
    match expr {
        Expr::Member { object, property } => Expr::Member {
            object: Box::new(f(*object)),
            property,
        },
        Expr::Call { callee, args } => Expr::Call {
            callee: Box::new(f(*callee)),
            args: args.into_iter().map(&mut *f).collect(),
        },
        Expr::Unary { op, operand } => Expr::Unary {
            op,
            operand: Box::new(f(*operand)),
        },
        Expr::Binary { op, left, right } => Expr::Binary {
            op,
            left: Box::new(f(*left)),
            right: Box::new(f(*right)),
        },
        Expr::Conditional {
            test,
            consequent,
            alternate,
        } => Expr::Conditional {
            test: Box::new(f(*test)),
            consequent: Box::new(f(*consequent)),
            alternate: Box::new(f(*alternate)),
        },
        leaf => leaf,
    }
}

fn try_map_children(
    expr: Expr,
    f: &mut dyn FnMut(Expr) -> Result<Expr, CompileError>,
) -> Result<Expr, CompileError> {
    Ok(match expr {
        Expr::Member { object, property } => Expr::Member {
            object: Box::new(f(*object)?),
            property,
        },
        Expr::Call { callee, args } => Expr::Call {
            callee: Box::new(f(*callee)?),
            args: args.into_iter().map(&mut *f).collect::<Result<_, _>>()?,
        },
        Expr::Unary { op, operand } => Expr::Unary {
            op,
            operand: Box::new(f(*operand)?),
        },
        Expr::Binary { op, left, right } => Expr::Binary {
            op,
            left: Box::new(f(*left)?),
            right: Box::new(f(*right)?),
        },
        Expr::Conditional {
            test,
            consequent,
            alternate,
        } => Expr::Conditional {
            test: Box::new(f(*test)?),
            consequent: Box::new(f(*consequent)?),
            alternate: Box::new(f(*alternate)?),
        },
        leaf => leaf,
    })
}
