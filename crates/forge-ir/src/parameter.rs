//! Symbolic parameters for variational circuits.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::error::{IrError, IrResult};

/// Values assigned to named parameters.
pub type Bindings = FxHashMap<String, f64>;

/// A gate angle: a number, a named parameter, or arithmetic over both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParameterExpression {
    /// A constant numeric value.
    Constant(f64),
    /// A named, still unbound parameter.
    Symbol(String),
    /// Negation.
    Neg(Box<ParameterExpression>),
    /// Sum of two expressions.
    Add(Box<ParameterExpression>, Box<ParameterExpression>),
    /// Product of two expressions.
    Mul(Box<ParameterExpression>, Box<ParameterExpression>),
}

impl ParameterExpression {
    /// Create a constant.
    pub fn constant(value: f64) -> Self {
        ParameterExpression::Constant(value)
    }

    /// Create a named parameter.
    pub fn symbol(name: impl Into<String>) -> Self {
        ParameterExpression::Symbol(name.into())
    }

    /// Whether any symbol remains in the expression.
    pub fn is_symbolic(&self) -> bool {
        match self {
            ParameterExpression::Constant(_) => false,
            ParameterExpression::Symbol(_) => true,
            ParameterExpression::Neg(e) => e.is_symbolic(),
            ParameterExpression::Add(a, b) | ParameterExpression::Mul(a, b) => {
                a.is_symbolic() || b.is_symbolic()
            }
        }
    }

    /// Numeric value if the expression is fully bound.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParameterExpression::Constant(v) => Some(*v),
            ParameterExpression::Symbol(_) => None,
            ParameterExpression::Neg(e) => e.as_f64().map(|v| -v),
            ParameterExpression::Add(a, b) => Some(a.as_f64()? + b.as_f64()?),
            ParameterExpression::Mul(a, b) => Some(a.as_f64()? * b.as_f64()?),
        }
    }

    /// Evaluate against `bindings`, failing on the first missing symbol.
    pub fn evaluate(&self, bindings: &Bindings) -> IrResult<f64> {
        match self {
            ParameterExpression::Constant(v) => Ok(*v),
            ParameterExpression::Symbol(name) => bindings
                .get(name)
                .copied()
                .ok_or_else(|| IrError::UnboundParameter(name.clone())),
            ParameterExpression::Neg(e) => Ok(-e.evaluate(bindings)?),
            ParameterExpression::Add(a, b) => Ok(a.evaluate(bindings)? + b.evaluate(bindings)?),
            ParameterExpression::Mul(a, b) => Ok(a.evaluate(bindings)? * b.evaluate(bindings)?),
        }
    }

    /// Substitute every bound symbol and fold the constant parts.
    pub fn bind(&self, bindings: &Bindings) -> Self {
        match self {
            ParameterExpression::Constant(_) => self.clone(),
            ParameterExpression::Symbol(name) => match bindings.get(name) {
                Some(v) => ParameterExpression::Constant(*v),
                None => self.clone(),
            },
            ParameterExpression::Neg(e) => match e.bind(bindings) {
                ParameterExpression::Constant(v) => ParameterExpression::Constant(-v),
                other => ParameterExpression::Neg(Box::new(other)),
            },
            ParameterExpression::Add(a, b) => match (a.bind(bindings), b.bind(bindings)) {
                (ParameterExpression::Constant(x), ParameterExpression::Constant(y)) => {
                    ParameterExpression::Constant(x + y)
                }
                (x, y) => ParameterExpression::Add(Box::new(x), Box::new(y)),
            },
            ParameterExpression::Mul(a, b) => match (a.bind(bindings), b.bind(bindings)) {
                (ParameterExpression::Constant(x), ParameterExpression::Constant(y)) => {
                    ParameterExpression::Constant(x * y)
                }
                (x, y) => ParameterExpression::Mul(Box::new(x), Box::new(y)),
            },
        }
    }

    /// Names of all symbols, sorted.
    pub fn symbols(&self) -> BTreeSet<String> {
        let mut set = BTreeSet::new();
        self.collect_symbols(&mut set);
        set
    }

    fn collect_symbols(&self, set: &mut BTreeSet<String>) {
        match self {
            ParameterExpression::Constant(_) => {}
            ParameterExpression::Symbol(name) => {
                set.insert(name.clone());
            }
            ParameterExpression::Neg(e) => e.collect_symbols(set),
            ParameterExpression::Add(a, b) | ParameterExpression::Mul(a, b) => {
                a.collect_symbols(set);
                b.collect_symbols(set);
            }
        }
    }
}

impl fmt::Display for ParameterExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterExpression::Constant(v) => write!(f, "{v}"),
            ParameterExpression::Symbol(name) => write!(f, "{name}"),
            ParameterExpression::Neg(e) => write!(f, "-({e})"),
            ParameterExpression::Add(a, b) => write!(f, "({a} + {b})"),
            ParameterExpression::Mul(a, b) => write!(f, "({a} * {b})"),
        }
    }
}

impl From<f64> for ParameterExpression {
    fn from(value: f64) -> Self {
        ParameterExpression::Constant(value)
    }
}

impl From<&str> for ParameterExpression {
    fn from(name: &str) -> Self {
        ParameterExpression::Symbol(name.to_string())
    }
}

impl std::ops::Add for ParameterExpression {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        ParameterExpression::Add(Box::new(self), Box::new(rhs))
    }
}

impl std::ops::Mul for ParameterExpression {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self::Output {
        ParameterExpression::Mul(Box::new(self), Box::new(rhs))
    }
}

impl std::ops::Neg for ParameterExpression {
    type Output = Self;

    fn neg(self) -> Self::Output {
        ParameterExpression::Neg(Box::new(self))
    }
}
