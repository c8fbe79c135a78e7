//! Expression syntax tree and its canonical printer.
//!
//! The printed form of a tree is the "compiled expression": it is what the
//! evaluator caches on, and what tests compare for compiler purity. Printing
//! is a pure function of the tree, so identical input always yields
//! byte-identical output.

use std::fmt;

use super::value::Value;

/// Root of a stat accessor (`self.<path>` / `target.<path>`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, strum::Display, strum::AsRefStr)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[strum(serialize_all = "snake_case")]
pub enum AccessorRoot {
    #[strum(serialize = "self")]
    SelfMember,
    Target,
}

impl AccessorRoot {
    pub fn from_ident(name: &str) -> Option<Self> {
        match name {
            "self" => Some(Self::SelfMember),
            "target" => Some(Self::Target),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Plus,
    Not,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Mul,
    Div,
    Rem,
    Add,
    Sub,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    StrictEq,
    StrictNe,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::StrictEq => "===",
            BinaryOp::StrictNe => "!==",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }

    /// Binding power; higher binds tighter.
    pub fn precedence(self) -> u8 {
        match self {
            BinaryOp::Or => 2,
            BinaryOp::And => 3,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::StrictEq | BinaryOp::StrictNe => 4,
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => 5,
            BinaryOp::Add | BinaryOp::Sub => 6,
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => 7,
        }
    }
}

/// Parsed (and possibly rewritten) expression.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Literal(Value),
    /// Bare identifier, resolved against the local binding table.
    Ident(String),
    /// Static property access `object.property`.
    Member {
        object: Box<Expr>,
        property: String,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Conditional {
        test: Box<Expr>,
        consequent: Box<Expr>,
        alternate: Box<Expr>,
    },
    /// Attribute lookup inserted by the attribute compiler (`_get('path')`).
    Get(String),
    /// Stat accessor inserted by the accessor compiler.
    StatAccess { root: AccessorRoot, path: String },
}

impl Expr {
    /// Dotted path of an identifier / static member chain (`a.b.c`).
    pub fn dotted_path(&self) -> Option<String> {
        match self {
            Expr::Ident(name) => Some(name.clone()),
            Expr::Member { object, property } => {
                object.dotted_path().map(|base| format!("{base}.{property}"))
            }
            _ => None,
        }
    }

    /// First segment of a dotted chain.
    pub fn chain_root(&self) -> Option<&str> {
        match self {
            Expr::Ident(name) => Some(name),
            Expr::Member { object, .. } => object.chain_root(),
            _ => None,
        }
    }

    /// Returns true if the tree contains any stat accessor.
    pub fn has_accessors(&self) -> bool {
        let mut found = false;
        self.visit(&mut |node| {
            if matches!(node, Expr::StatAccess { .. }) {
                found = true;
            }
        });
        found
    }

    /// Collects `_get` paths in first-occurrence order without duplicates.
    pub fn attribute_refs(&self) -> Vec<String> {
        let mut refs: Vec<String> = Vec::new();
        self.visit(&mut |node| {
            if let Expr::Get(path) = node
                && !refs.contains(path)
            {
                refs.push(path.clone());
            }
        });
        refs
    }

    /// Collects stat accessors `(root, path)` in first-occurrence order.
    pub fn accessor_refs(&self) -> Vec<(AccessorRoot, String)> {
        let mut refs: Vec<(AccessorRoot, String)> = Vec::new();
        self.visit(&mut |node| {
            if let Expr::StatAccess { root, path } = node {
                let entry = (*root, path.clone());
                if !refs.contains(&entry) {
                    refs.push(entry);
                }
            }
        });
        refs
    }

    /// Pre-order traversal.
    pub fn visit(&self, f: &mut dyn FnMut(&Expr)) {
        f(self);
        match self {
            Expr::Literal(_) | Expr::Ident(_) | Expr::Get(_) | Expr::StatAccess { .. } => {}
            Expr::Member { object, .. } => object.visit(f),
            Expr::Call { callee, args } => {
                callee.visit(f);
                for arg in args {
                    arg.visit(f);
                }
            }
            Expr::Unary { operand, .. } => operand.visit(f),
            Expr::Binary { left, right, .. } => {
                left.visit(f);
                right.visit(f);
            }
            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => {
                test.visit(f);
                consequent.visit(f);
                alternate.visit(f);
            }
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            Expr::Conditional { .. } => 1,
            Expr::Binary { op, .. } => op.precedence(),
            Expr::Unary { .. } => 8,
            _ => 9,
        }
    }
}

fn write_string_literal(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    f.write_str("'")?;
    for ch in s.chars() {
        match ch {
            '\'' => f.write_str("\\'")?,
            '\\' => f.write_str("\\\\")?,
            other => write!(f, "{other}")?,
        }
    }
    f.write_str("'")
}

fn write_child(f: &mut fmt::Formatter<'_>, child: &Expr, min_precedence: u8) -> fmt::Result {
    if child.precedence() < min_precedence {
        write!(f, "({child})")
    } else {
        write!(f, "{child}")
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(Value::Str(s)) => write_string_literal(f, s),
            Expr::Literal(value) => write!(f, "{value}"),
            Expr::Ident(name) => f.write_str(name),
            Expr::Member { object, property } => {
                write_child(f, object, 9)?;
                write!(f, ".{property}")
            }
            Expr::Call { callee, args } => {
                write_child(f, callee, 9)?;
                f.write_str("(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write_child(f, arg, 2)?;
                }
                f.write_str(")")
            }
            Expr::Unary { op, operand } => {
                let symbol = match op {
                    UnaryOp::Neg => "-",
                    UnaryOp::Plus => "+",
                    UnaryOp::Not => "!",
                };
                f.write_str(symbol)?;
                write_child(f, operand, 8)
            }
            Expr::Binary { op, left, right } => {
                let prec = op.precedence();
                write_child(f, left, prec)?;
                write!(f, " {} ", op.symbol())?;
                // Left-associative: an equal-precedence right child needs parens.
                write_child(f, right, prec + 1)
            }
            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => {
                write_child(f, test, 2)?;
                f.write_str(" ? ")?;
                write_child(f, consequent, 1)?;
                f.write_str(" : ")?;
                write_child(f, alternate, 1)
            }
            Expr::Get(path) => {
                f.write_str("_get(")?;
                write_string_literal(f, path)?;
                f.write_str(")")
            }
            Expr::StatAccess { root, path } => {
                write!(f, "{root}.statContainer.getValue(")?;
                write_string_literal(f, path)?;
                f.write_str(")")
            }
        }
    }
}
