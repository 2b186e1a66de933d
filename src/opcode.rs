//! Opcodes for the scalar instruction tape.
//!
//! Every opcode's semantics live in this file: [`eval`] gives the value,
//! [`partials`] the local derivatives, and [`c_expr`] the generated-code
//! fragment. Tangent and adjoint sweeps are assembled from [`partials`] only.

use crate::scalar::Scalar;

/// Sentinel stored in the second operand slot of unary instructions.
pub const UNUSED: u32 = u32::MAX;

/// Elementary operation codes.
///
/// Fits in a `u8`. Binary ops read both operand slots, unary ops read the
/// first one and store [`UNUSED`] in the second.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OpCode {
    // ── Structural ──
    /// Load an immediate constant.
    Const,
    /// Load nonzero `nz` of input `i`; the payload holds `(i, nz)`.
    Input,
    /// Load a free variable; the payload holds `(index, 0)`.
    Free,

    // ── Binary ──
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Atan2,
    Fmin,
    Fmax,
    /// `a < b` as `0`/`1`.
    Lt,
    /// `a <= b` as `0`/`1`.
    Le,
    /// `a == b` as `0`/`1`.
    Eq,
    /// `a != b` as `0`/`1`.
    Ne,

    // ── Unary ──
    Neg,
    Sq,
    Sqrt,
    Exp,
    Ln,
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Sinh,
    Cosh,
    Tanh,
    Abs,
    Sign,
    Floor,
    Ceil,
}

impl OpCode {
    /// Number of operand slots read (0 for loads).
    #[inline]
    pub fn arity(self) -> usize {
        match self {
            OpCode::Const | OpCode::Input | OpCode::Free => 0,
            OpCode::Add
            | OpCode::Sub
            | OpCode::Mul
            | OpCode::Div
            | OpCode::Pow
            | OpCode::Atan2
            | OpCode::Fmin
            | OpCode::Fmax
            | OpCode::Lt
            | OpCode::Le
            | OpCode::Eq
            | OpCode::Ne => 2,
            _ => 1,
        }
    }

    /// Whether the op loads a value rather than computing one.
    #[inline]
    pub fn is_load(self) -> bool {
        self.arity() == 0
    }

    /// Whether the op is differentiable everywhere on its domain interior.
    ///
    /// Kinks (`abs`, `fmin`, `fmax`) and steps (`sign`, `floor`, `ceil`,
    /// comparisons) are not.
    pub fn is_smooth(self) -> bool {
        !matches!(
            self,
            OpCode::Abs
                | OpCode::Fmin
                | OpCode::Fmax
                | OpCode::Sign
                | OpCode::Floor
                | OpCode::Ceil
                | OpCode::Lt
                | OpCode::Le
                | OpCode::Eq
                | OpCode::Ne
        )
    }

    /// Short mnemonic used in disassembly and diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            OpCode::Const => "const",
            OpCode::Input => "input",
            OpCode::Free => "free",
            OpCode::Add => "add",
            OpCode::Sub => "sub",
            OpCode::Mul => "mul",
            OpCode::Div => "div",
            OpCode::Pow => "pow",
            OpCode::Atan2 => "atan2",
            OpCode::Fmin => "fmin",
            OpCode::Fmax => "fmax",
            OpCode::Lt => "lt",
            OpCode::Le => "le",
            OpCode::Eq => "eq",
            OpCode::Ne => "ne",
            OpCode::Neg => "neg",
            OpCode::Sq => "sq",
            OpCode::Sqrt => "sqrt",
            OpCode::Exp => "exp",
            OpCode::Ln => "log",
            OpCode::Sin => "sin",
            OpCode::Cos => "cos",
            OpCode::Tan => "tan",
            OpCode::Asin => "asin",
            OpCode::Acos => "acos",
            OpCode::Atan => "atan",
            OpCode::Sinh => "sinh",
            OpCode::Cosh => "cosh",
            OpCode::Tanh => "tanh",
            OpCode::Abs => "fabs",
            OpCode::Sign => "sign",
            OpCode::Floor => "floor",
            OpCode::Ceil => "ceil",
        }
    }
}

/// Evaluate a single opcode.
///
/// For unary ops `b` is ignored. Loads carry their value in the payload and
/// are never dispatched here.
#[inline]
pub fn eval<T: Scalar>(op: OpCode, a: T, b: T) -> T {
    match op {
        OpCode::Const | OpCode::Input | OpCode::Free => {
            unreachable!("loads are resolved from the payload, not evaluated")
        }

        OpCode::Add => a + b,
        OpCode::Sub => a - b,
        OpCode::Mul => a * b,
        OpCode::Div => a / b,
        OpCode::Pow => a.pow(b),
        OpCode::Atan2 => a.atan2(b),
        OpCode::Fmin => a.fmin(b),
        OpCode::Fmax => a.fmax(b),
        OpCode::Lt => a.less(b),
        OpCode::Le => a.less_equal(b),
        OpCode::Eq => a.equal(b),
        OpCode::Ne => a.not_equal(b),

        OpCode::Neg => -a,
        OpCode::Sq => a.sq(),
        OpCode::Sqrt => a.sqrt(),
        OpCode::Exp => a.exp(),
        OpCode::Ln => a.ln(),
        OpCode::Sin => a.sin(),
        OpCode::Cos => a.cos(),
        OpCode::Tan => a.tan(),
        OpCode::Asin => a.asin(),
        OpCode::Acos => a.acos(),
        OpCode::Atan => a.atan(),
        OpCode::Sinh => a.sinh(),
        OpCode::Cosh => a.cosh(),
        OpCode::Tanh => a.tanh(),
        OpCode::Abs => a.abs(),
        OpCode::Sign => a.sign(),
        OpCode::Floor => a.floor(),
        OpCode::Ceil => a.ceil(),
    }
}

/// Local partial derivatives `(∂r/∂a, ∂r/∂b)` of `r = op(a, b)`.
///
/// For unary ops the second partial is zero. `r` is the already computed
/// result, reused where it saves work (`exp`, `sqrt`, `tanh`, `div`).
pub fn partials<T: Scalar>(op: OpCode, a: &T, b: &T, r: &T) -> (T, T) {
    let zero = T::zero;
    let one = T::one;
    let (a, b, r) = (a.clone(), b.clone(), r.clone());
    match op {
        OpCode::Const | OpCode::Input | OpCode::Free => (zero(), zero()),

        OpCode::Add => (one(), one()),
        OpCode::Sub => (one(), -one()),
        OpCode::Mul => (b, a),
        OpCode::Div => {
            // d/da a/b = 1/b, d/db a/b = -r/b
            let inv = one() / b;
            (inv.clone(), -(r * inv))
        }
        OpCode::Pow => {
            // d/da a^b = b a^(b-1), d/db a^b = a^b ln(a)
            let da = b.clone() * a.clone().pow(b - one());
            (da, r * a.ln())
        }
        OpCode::Atan2 => {
            let denom = a.clone().sq() + b.clone().sq();
            (b / denom.clone(), -a / denom)
        }
        OpCode::Fmin => {
            // Ties go to the first argument.
            let pick_a = a.clone().less_equal(b.clone());
            let pick_b = b.less(a);
            (pick_a, pick_b)
        }
        OpCode::Fmax => {
            let pick_a = b.clone().less_equal(a.clone());
            let pick_b = a.less(b);
            (pick_a, pick_b)
        }
        OpCode::Lt | OpCode::Le | OpCode::Eq | OpCode::Ne => (zero(), zero()),

        OpCode::Neg => (-one(), zero()),
        OpCode::Sq => (T::from_f64(2.0) * a, zero()),
        OpCode::Sqrt => (one() / (T::from_f64(2.0) * r), zero()),
        OpCode::Exp => (r, zero()),
        OpCode::Ln => (one() / a, zero()),
        OpCode::Sin => (a.cos(), zero()),
        OpCode::Cos => (-a.sin(), zero()),
        OpCode::Tan => (one() / a.cos().sq(), zero()),
        OpCode::Asin => (one() / (one() - a.sq()).sqrt(), zero()),
        OpCode::Acos => (-(one() / (one() - a.sq()).sqrt()), zero()),
        OpCode::Atan => (one() / (one() + a.sq()), zero()),
        OpCode::Sinh => (a.cosh(), zero()),
        OpCode::Cosh => (a.sinh(), zero()),
        OpCode::Tanh => (one() - r.sq(), zero()),
        OpCode::Abs => (a.sign(), zero()),
        OpCode::Sign | OpCode::Floor | OpCode::Ceil => (zero(), zero()),
    }
}

/// C expression computing `op(a, b)` from operand expressions `a` and `b`.
pub fn c_expr(op: OpCode, a: &str, b: &str) -> String {
    match op {
        OpCode::Const | OpCode::Input | OpCode::Free => {
            unreachable!("loads are emitted by the caller")
        }
        OpCode::Add => format!("{a}+{b}"),
        OpCode::Sub => format!("{a}-{b}"),
        OpCode::Mul => format!("{a}*{b}"),
        OpCode::Div => format!("{a}/{b}"),
        OpCode::Pow => format!("pow({a},{b})"),
        OpCode::Atan2 => format!("atan2({a},{b})"),
        OpCode::Fmin => format!("({a}<={b} ? {a} : {b})"),
        OpCode::Fmax => format!("({a}>={b} ? {a} : {b})"),
        OpCode::Lt => format!("({a}<{b})"),
        OpCode::Le => format!("({a}<={b})"),
        OpCode::Eq => format!("({a}=={b})"),
        OpCode::Ne => format!("({a}!={b})"),
        OpCode::Neg => format!("(-{a})"),
        OpCode::Sq => format!("{a}*{a}"),
        OpCode::Sign => format!("({a}>0 ? 1. : ({a}<0 ? -1. : {a}))"),
        op => format!("{}({a})", op.name()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [OpCode; 33] = [
        OpCode::Const,
        OpCode::Input,
        OpCode::Free,
        OpCode::Add,
        OpCode::Sub,
        OpCode::Mul,
        OpCode::Div,
        OpCode::Pow,
        OpCode::Atan2,
        OpCode::Fmin,
        OpCode::Fmax,
        OpCode::Lt,
        OpCode::Le,
        OpCode::Eq,
        OpCode::Ne,
        OpCode::Neg,
        OpCode::Sq,
        OpCode::Sqrt,
        OpCode::Exp,
        OpCode::Ln,
        OpCode::Sin,
        OpCode::Cos,
        OpCode::Tan,
        OpCode::Asin,
        OpCode::Acos,
        OpCode::Atan,
        OpCode::Sinh,
        OpCode::Cosh,
        OpCode::Tanh,
        OpCode::Abs,
        OpCode::Sign,
        OpCode::Floor,
        OpCode::Ceil,
    ];

    /// Partials agree with central differences for every smooth op.
    #[test]
    fn partials_match_finite_differences() {
        let h = 1e-6;
        let (a, b) = (0.4_f64, 0.7_f64);
        for op in ALL.into_iter().filter(|op| !op.is_load() && op.is_smooth()) {
            let r = eval(op, a, b);
            let (da, db) = partials(op, &a, &b, &r);
            let fd_a = (eval(op, a + h, b) - eval(op, a - h, b)) / (2.0 * h);
            assert!((da - fd_a).abs() < 1e-6, "{op:?}: {da} vs {fd_a}");
            if op.arity() == 2 {
                let fd_b = (eval(op, a, b + h) - eval(op, a, b - h)) / (2.0 * h);
                assert!((db - fd_b).abs() < 1e-6, "{op:?}: {db} vs {fd_b}");
            } else {
                assert_eq!(db, 0.0);
            }
        }
    }

    #[test]
    fn step_functions_have_zero_partials() {
        for op in [OpCode::Sign, OpCode::Floor, OpCode::Ceil, OpCode::Lt, OpCode::Ne] {
            let r = eval(op, 1.3, 0.2);
            assert_eq!(partials(op, &1.3, &0.2, &r), (0.0, 0.0));
        }
    }

    #[test]
    fn fmin_fmax_ties_pick_first_argument() {
        assert_eq!(partials(OpCode::Fmin, &1.0, &1.0, &1.0), (1.0, 0.0));
        assert_eq!(partials(OpCode::Fmax, &1.0, &1.0, &1.0), (1.0, 0.0));
        assert_eq!(partials(OpCode::Fmax, &0.0, &1.0, &1.0), (0.0, 1.0));
    }

    #[test]
    fn sign_keeps_zero() {
        assert_eq!(eval(OpCode::Sign, 0.0, 0.0), 0.0);
        assert_eq!(eval(OpCode::Sign, -3.0, 0.0), -1.0);
        assert!(eval(OpCode::Sign, f64::NAN, 0.0).is_nan());
    }

    #[test]
    fn arity_table() {
        assert_eq!(OpCode::Const.arity(), 0);
        assert_eq!(OpCode::Atan2.arity(), 2);
        assert_eq!(OpCode::Ceil.arity(), 1);
    }
}
