//! Symbolic scalar expressions.
//!
//! An [`Sx`] is a cheap-to-clone handle to an immutable expression DAG node.
//! Node identity (pointer equality) is what the tape compiler uses to share
//! common subexpressions.
//!
//! Construction applies local simplifications in the spirit of a recording
//! tape: constant folding, `x + 0 → x`, `x * 1 → x`, `x * 0 → 0`,
//! `0 / x → 0`, `--x → x`. These keep symbolic derivatives small; they never
//! change the value at inputs where the original expression is finite.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::opcode::{self, OpCode};

#[derive(Debug)]
pub(crate) enum SxNode {
    Constant(f64),
    Symbol { name: String },
    Unary { op: OpCode, arg: Sx },
    Binary { op: OpCode, lhs: Sx, rhs: Sx },
}

impl SxNode {
    /// Move the operands out, leaving shared placeholders behind.
    fn take_operands(&mut self, into: &mut Vec<Sx>) {
        match self {
            SxNode::Constant(_) | SxNode::Symbol { .. } => {}
            SxNode::Unary { arg, .. } => into.push(std::mem::replace(arg, placeholder())),
            SxNode::Binary { lhs, rhs, .. } => {
                into.push(std::mem::replace(lhs, placeholder()));
                into.push(std::mem::replace(rhs, placeholder()));
            }
        }
    }
}

/// Releases uniquely owned operands with an explicit stack, so dropping a
/// deep expression does not recurse.
impl Drop for SxNode {
    fn drop(&mut self) {
        let mut pending = Vec::new();
        self.take_operands(&mut pending);
        while let Some(sx) = pending.pop() {
            if let Ok(mut node) = Arc::try_unwrap(sx.0) {
                node.take_operands(&mut pending);
            }
        }
    }
}

fn placeholder() -> Sx {
    static LEAF: OnceLock<Sx> = OnceLock::new();
    LEAF.get_or_init(|| Sx::constant(0.0)).clone()
}

/// Symbolic scalar expression.
#[derive(Clone)]
pub struct Sx(pub(crate) Arc<SxNode>);

impl Sx {
    /// A fresh symbol. Two calls with the same name give distinct symbols.
    pub fn symbol(name: impl Into<String>) -> Self {
        Sx(Arc::new(SxNode::Symbol { name: name.into() }))
    }

    /// `n` fresh symbols named `name_0 .. name_{n-1}`.
    pub fn symbols(name: &str, n: usize) -> Vec<Self> {
        (0..n).map(|i| Sx::symbol(format!("{name}_{i}"))).collect()
    }

    /// A numeric constant.
    pub fn constant(value: f64) -> Self {
        Sx(Arc::new(SxNode::Constant(value)))
    }

    /// Apply a unary opcode.
    pub fn unary(op: OpCode, arg: Sx) -> Self {
        debug_assert_eq!(op.arity(), 1, "{op:?} is not unary");
        if let Some(v) = arg.constant_value() {
            return Sx::constant(opcode::eval(op, v, 0.0));
        }
        if op == OpCode::Neg {
            if let SxNode::Unary {
                op: OpCode::Neg,
                arg: inner,
            } = &*arg.0
            {
                return inner.clone();
            }
        }
        Sx(Arc::new(SxNode::Unary { op, arg }))
    }

    /// Apply a binary opcode.
    pub fn binary(op: OpCode, lhs: Sx, rhs: Sx) -> Self {
        debug_assert_eq!(op.arity(), 2, "{op:?} is not binary");
        if let (Some(a), Some(b)) = (lhs.constant_value(), rhs.constant_value()) {
            return Sx::constant(opcode::eval(op, a, b));
        }
        match op {
            OpCode::Add => {
                if rhs.is_zero() {
                    return lhs;
                }
                if lhs.is_zero() {
                    return rhs;
                }
            }
            OpCode::Sub => {
                if rhs.is_zero() {
                    return lhs;
                }
                if lhs.is_zero() {
                    return Sx::unary(OpCode::Neg, rhs);
                }
            }
            OpCode::Mul => {
                if lhs.is_zero() || rhs.is_zero() {
                    return Sx::constant(0.0);
                }
                if rhs.is_one() {
                    return lhs;
                }
                if lhs.is_one() {
                    return rhs;
                }
                if rhs.is_minus_one() {
                    return Sx::unary(OpCode::Neg, lhs);
                }
                if lhs.is_minus_one() {
                    return Sx::unary(OpCode::Neg, rhs);
                }
            }
            OpCode::Div => {
                if rhs.is_one() {
                    return lhs;
                }
                if lhs.is_zero() {
                    return lhs;
                }
            }
            _ => {}
        }
        Sx(Arc::new(SxNode::Binary { op, lhs, rhs }))
    }

    /// The value if this is a constant.
    #[inline]
    pub fn constant_value(&self) -> Option<f64> {
        match &*self.0 {
            SxNode::Constant(v) => Some(*v),
            _ => None,
        }
    }

    #[inline]
    pub fn is_constant(&self) -> bool {
        self.constant_value().is_some()
    }

    /// Whether this is the constant `0` (either sign).
    #[inline]
    pub fn is_zero(&self) -> bool {
        self.constant_value() == Some(0.0)
    }

    #[inline]
    pub fn is_one(&self) -> bool {
        self.constant_value() == Some(1.0)
    }

    #[inline]
    fn is_minus_one(&self) -> bool {
        self.constant_value() == Some(-1.0)
    }

    #[inline]
    pub fn is_symbolic(&self) -> bool {
        matches!(&*self.0, SxNode::Symbol { .. })
    }

    /// Symbol name, if this is a symbol.
    pub fn name(&self) -> Option<&str> {
        match &*self.0 {
            SxNode::Symbol { name } => Some(name),
            _ => None,
        }
    }

    /// The opcode that produces this node.
    pub fn op(&self) -> OpCode {
        match &*self.0 {
            SxNode::Constant(_) => OpCode::Const,
            SxNode::Symbol { .. } => OpCode::Free,
            SxNode::Unary { op, .. } | SxNode::Binary { op, .. } => *op,
        }
    }

    /// Operand `i` of a unary or binary node.
    pub fn dep(&self, i: usize) -> Option<&Sx> {
        match (&*self.0, i) {
            (SxNode::Unary { arg, .. }, 0) => Some(arg),
            (SxNode::Binary { lhs, .. }, 0) => Some(lhs),
            (SxNode::Binary { rhs, .. }, 1) => Some(rhs),
            _ => None,
        }
    }

    /// Identity of the underlying node, stable while any clone is alive.
    #[inline]
    pub(crate) fn node_key(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }

    /// Whether both handles point at the same node.
    #[inline]
    pub fn is_same(&self, other: &Sx) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Evaluate numerically, reading symbol values through `lookup`.
    ///
    /// Shared subexpressions are evaluated once. Returns `None` if `lookup`
    /// has no value for some symbol.
    pub fn evaluate(&self, lookup: &impl Fn(&Sx) -> Option<f64>) -> Option<f64> {
        let mut values: HashMap<usize, f64> = HashMap::new();
        let mut stack: Vec<(Sx, bool)> = vec![(self.clone(), false)];
        while let Some((node, expanded)) = stack.pop() {
            let key = node.node_key();
            if values.contains_key(&key) {
                continue;
            }
            let v = match &*node.0 {
                SxNode::Constant(v) => *v,
                SxNode::Symbol { .. } => lookup(&node)?,
                SxNode::Unary { op, arg } => {
                    if !expanded {
                        stack.push((node.clone(), true));
                        stack.push((arg.clone(), false));
                        continue;
                    }
                    opcode::eval(*op, values[&arg.node_key()], 0.0)
                }
                SxNode::Binary { op, lhs, rhs } => {
                    if !expanded {
                        stack.push((node.clone(), true));
                        stack.push((rhs.clone(), false));
                        stack.push((lhs.clone(), false));
                        continue;
                    }
                    opcode::eval(*op, values[&lhs.node_key()], values[&rhs.node_key()])
                }
            };
            values.insert(key, v);
        }
        values.get(&self.node_key()).copied()
    }
}

impl Default for Sx {
    fn default() -> Self {
        Sx::constant(0.0)
    }
}

impl From<f64> for Sx {
    fn from(value: f64) -> Self {
        Sx::constant(value)
    }
}

/// Infix rendering. Recurses once per nesting level, so it is meant for
/// expressions of modest depth; compile deep ones and print the tape instead.
impl fmt::Display for Sx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.0 {
            SxNode::Constant(v) => write!(f, "{v}"),
            SxNode::Symbol { name } => write!(f, "{name}"),
            SxNode::Unary {
                op: OpCode::Neg,
                arg,
            } => write!(f, "(-{arg})"),
            SxNode::Unary {
                op: OpCode::Sq,
                arg,
            } => write!(f, "sq({arg})"),
            SxNode::Unary { op, arg } => write!(f, "{}({arg})", op.name()),
            SxNode::Binary { op, lhs, rhs } => match op {
                OpCode::Add => write!(f, "({lhs}+{rhs})"),
                OpCode::Sub => write!(f, "({lhs}-{rhs})"),
                OpCode::Mul => write!(f, "({lhs}*{rhs})"),
                OpCode::Div => write!(f, "({lhs}/{rhs})"),
                OpCode::Lt => write!(f, "({lhs}<{rhs})"),
                OpCode::Le => write!(f, "({lhs}<={rhs})"),
                OpCode::Eq => write!(f, "({lhs}=={rhs})"),
                OpCode::Ne => write!(f, "({lhs}!={rhs})"),
                op => write!(f, "{}({lhs},{rhs})", op.name()),
            },
        }
    }
}

impl fmt::Debug for Sx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scalar::Scalar;

    #[test]
    fn constants_fold() {
        let e = Sx::constant(2.0) * Sx::constant(3.0) + Sx::constant(1.0);
        assert_eq!(e.constant_value(), Some(7.0));
    }

    #[test]
    fn identities_short_circuit() {
        let x = Sx::symbol("x");
        assert!((x.clone() + Sx::constant(0.0)).is_same(&x));
        assert!((Sx::constant(1.0) * x.clone()).is_same(&x));
        assert!((x.clone() * Sx::constant(0.0)).is_zero());
        assert!((-(-x.clone())).is_same(&x));
    }

    #[test]
    fn symbols_are_distinct() {
        let a = Sx::symbol("a");
        let b = Sx::symbol("a");
        assert!(!a.is_same(&b));
        assert_eq!(a.name(), Some("a"));
    }

    #[test]
    fn display_is_infix() {
        let x = Sx::symbol("x");
        let y = Sx::symbol("y");
        let e = x.clone() * y + x.sin();
        assert_eq!(e.to_string(), "((x*y)+sin(x))");
    }

    #[test]
    fn evaluate_with_lookup() {
        let x = Sx::symbol("x");
        let e = x.clone().sq() + Sx::constant(1.0);
        let v = e.evaluate(&|s: &Sx| if s.is_same(&x) { Some(3.0) } else { None });
        assert_eq!(v, Some(10.0));
    }

    #[test]
    fn deep_chain_drops_and_evaluates() {
        let x = Sx::symbol("x");
        let mut e = Sx::constant(0.0);
        for _ in 0..1_000_000 {
            e = e + x.clone().sin();
        }
        let v = e.evaluate(&|_: &Sx| Some(0.0));
        assert_eq!(v, Some(0.0));
        drop(e);
        assert!(x.is_symbolic());
    }
}
