//! Condition expressions for breakpoints and watchpoints
//!
//! The grammar is deliberately closed: one optional comparison between two
//! operands, where an operand is `$value`, `$<REGISTER>`, a decimal literal
//! or a `0x` hex literal. A lone operand is true when nonzero.
//!
//! Anything that does not parse, or names an operand that cannot be
//! resolved, evaluates to `true`. A typo in a condition never hides a hit.

use std::fmt;

/// Comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    /// Two-character operators first so `<=` is not read as `<`
    const SEARCH_ORDER: [(&'static str, CompareOp); 6] = [
        ("==", CompareOp::Eq),
        ("!=", CompareOp::Ne),
        ("<=", CompareOp::Le),
        (">=", CompareOp::Ge),
        ("<", CompareOp::Lt),
        (">", CompareOp::Gt),
    ];

    pub fn apply(self, lhs: u64, rhs: u64) -> bool {
        match self {
            Self::Eq => lhs == rhs,
            Self::Ne => lhs != rhs,
            Self::Lt => lhs < rhs,
            Self::Le => lhs <= rhs,
            Self::Gt => lhs > rhs,
            Self::Ge => lhs >= rhs,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }
}

/// One side of a comparison
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    /// `$value`, the value read or written
    Value,
    /// `$NAME`, a register of the active architecture (name without `$`)
    Register(String),
    Literal(u64),
}

impl Operand {
    fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if let Some(name) = text.strip_prefix('$') {
            if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '\'') {
                return None;
            }
            if name.eq_ignore_ascii_case("value") {
                return Some(Self::Value);
            }
            return Some(Self::Register(name.to_string()));
        }
        parse_literal(text).map(Self::Literal)
    }

    fn resolve(&self, value: Option<u64>, registers: &dyn Fn(&str) -> Option<u64>) -> Option<u64> {
        match self {
            Self::Value => value,
            Self::Register(name) => registers(name),
            Self::Literal(literal) => Some(*literal),
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value => f.write_str("$value"),
            Self::Register(name) => write!(f, "${}", name),
            Self::Literal(literal) => write!(f, "{}", literal),
        }
    }
}

/// Parsed condition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    NonZero(Operand),
    Compare {
        lhs: Operand,
        op: CompareOp,
        rhs: Operand,
    },
}

impl Condition {
    /// Parse an expression; `None` for empty or malformed input
    pub fn parse(expr: &str) -> Option<Self> {
        let expr = expr.trim();
        if expr.is_empty() {
            return None;
        }

        for (symbol, op) in CompareOp::SEARCH_ORDER {
            if let Some(pos) = expr.find(symbol) {
                let lhs = Operand::parse(&expr[..pos])?;
                let rhs = Operand::parse(&expr[pos + symbol.len()..])?;
                return Some(Self::Compare { lhs, op, rhs });
            }
        }
        Operand::parse(expr).map(Self::NonZero)
    }

    /// Evaluate; `None` when an operand cannot be resolved
    pub fn evaluate(
        &self,
        value: Option<u64>,
        registers: &dyn Fn(&str) -> Option<u64>,
    ) -> Option<bool> {
        match self {
            Self::NonZero(operand) => operand.resolve(value, registers).map(|v| v != 0),
            Self::Compare { lhs, op, rhs } => {
                let lhs = lhs.resolve(value, registers)?;
                let rhs = rhs.resolve(value, registers)?;
                Some(op.apply(lhs, rhs))
            }
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonZero(operand) => write!(f, "{}", operand),
            Self::Compare { lhs, op, rhs } => write!(f, "{} {} {}", lhs, op.symbol(), rhs),
        }
    }
}

/// Decimal or `0x` hex literal
pub fn parse_literal(text: &str) -> Option<u64> {
    let text = text.trim();
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).ok()
    } else if !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit()) {
        text.parse().ok()
    } else {
        None
    }
}

/// Evaluate `expr` with `$value` bound and register lookups through `registers`
///
/// Empty, malformed and unresolvable expressions are all true.
pub fn evaluate_with(
    expr: &str,
    value: Option<u64>,
    registers: &dyn Fn(&str) -> Option<u64>,
) -> bool {
    if expr.trim().is_empty() {
        return true;
    }
    match Condition::parse(expr) {
        Some(condition) => condition.evaluate(value, registers).unwrap_or_else(|| {
            tracing::trace!("Condition '{}' has an unresolved operand, treating as true", expr);
            true
        }),
        None => {
            tracing::trace!("Condition '{}' does not parse, treating as true", expr);
            true
        }
    }
}

/// Evaluate `expr` against a watched value only
pub fn evaluate_condition(expr: &str, value: u64) -> bool {
    evaluate_with(expr, Some(value), &|_: &str| None)
}
