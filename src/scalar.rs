//! The [`Scalar`] trait: one value domain for every tape replay.
//!
//! The per-opcode rules in [`crate::opcode`] are written once, generically
//! over `T: Scalar`, and instantiated with `f64` for numeric evaluation and
//! with [`Sx`] for symbolic replay. Tangent and adjoint rules are built from
//! the same partials, so the numeric and symbolic semantics cannot drift.

use std::fmt::Debug;
use std::ops::{Add, Div, Mul, Neg, Sub};

use num_traits::{One, Zero};

use crate::sx::Sx;

/// Arithmetic and elementary functions needed by the opcode table.
///
/// Comparison methods return `1` for true and `0` for false in the value
/// domain itself, so they can be recorded on a tape like any other op.
pub trait Scalar:
    Clone
    + Debug
    + Zero
    + One
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
{
    /// Lift a plain constant into this domain.
    fn from_f64(value: f64) -> Self;

    fn sq(self) -> Self;
    fn sqrt(self) -> Self;
    fn exp(self) -> Self;
    fn ln(self) -> Self;
    fn sin(self) -> Self;
    fn cos(self) -> Self;
    fn tan(self) -> Self;
    fn asin(self) -> Self;
    fn acos(self) -> Self;
    fn atan(self) -> Self;
    fn sinh(self) -> Self;
    fn cosh(self) -> Self;
    fn tanh(self) -> Self;
    fn abs(self) -> Self;
    /// `-1`, `0` or `1`; zero (and NaN) map to themselves.
    fn sign(self) -> Self;
    fn floor(self) -> Self;
    fn ceil(self) -> Self;

    fn pow(self, exponent: Self) -> Self;
    fn atan2(self, x: Self) -> Self;
    fn fmin(self, other: Self) -> Self;
    fn fmax(self, other: Self) -> Self;
    fn less(self, other: Self) -> Self;
    fn less_equal(self, other: Self) -> Self;
    fn equal(self, other: Self) -> Self;
    fn not_equal(self, other: Self) -> Self;
}

#[inline]
fn indicator(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

impl Scalar for f64 {
    #[inline]
    fn from_f64(value: f64) -> Self {
        value
    }

    #[inline]
    fn sq(self) -> Self {
        self * self
    }
    #[inline]
    fn sqrt(self) -> Self {
        f64::sqrt(self)
    }
    #[inline]
    fn exp(self) -> Self {
        f64::exp(self)
    }
    #[inline]
    fn ln(self) -> Self {
        f64::ln(self)
    }
    #[inline]
    fn sin(self) -> Self {
        f64::sin(self)
    }
    #[inline]
    fn cos(self) -> Self {
        f64::cos(self)
    }
    #[inline]
    fn tan(self) -> Self {
        f64::tan(self)
    }
    #[inline]
    fn asin(self) -> Self {
        f64::asin(self)
    }
    #[inline]
    fn acos(self) -> Self {
        f64::acos(self)
    }
    #[inline]
    fn atan(self) -> Self {
        f64::atan(self)
    }
    #[inline]
    fn sinh(self) -> Self {
        f64::sinh(self)
    }
    #[inline]
    fn cosh(self) -> Self {
        f64::cosh(self)
    }
    #[inline]
    fn tanh(self) -> Self {
        f64::tanh(self)
    }
    #[inline]
    fn abs(self) -> Self {
        f64::abs(self)
    }
    #[inline]
    fn sign(self) -> Self {
        if self > 0.0 {
            1.0
        } else if self < 0.0 {
            -1.0
        } else {
            self
        }
    }
    #[inline]
    fn floor(self) -> Self {
        f64::floor(self)
    }
    #[inline]
    fn ceil(self) -> Self {
        f64::ceil(self)
    }

    #[inline]
    fn pow(self, exponent: Self) -> Self {
        self.powf(exponent)
    }
    #[inline]
    fn atan2(self, x: Self) -> Self {
        f64::atan2(self, x)
    }
    #[inline]
    fn fmin(self, other: Self) -> Self {
        if self <= other {
            self
        } else {
            other
        }
    }
    #[inline]
    fn fmax(self, other: Self) -> Self {
        if self >= other {
            self
        } else {
            other
        }
    }
    #[inline]
    fn less(self, other: Self) -> Self {
        indicator(self < other)
    }
    #[inline]
    fn less_equal(self, other: Self) -> Self {
        indicator(self <= other)
    }
    #[inline]
    fn equal(self, other: Self) -> Self {
        indicator(self == other)
    }
    #[inline]
    fn not_equal(self, other: Self) -> Self {
        indicator(self != other)
    }
}

macro_rules! sx_unary {
    ($($name:ident => $op:ident),* $(,)?) => {
        $(
            #[inline]
            fn $name(self) -> Self {
                Sx::unary(crate::opcode::OpCode::$op, self)
            }
        )*
    };
}

macro_rules! sx_binary {
    ($($name:ident => $op:ident),* $(,)?) => {
        $(
            #[inline]
            fn $name(self, other: Self) -> Self {
                Sx::binary(crate::opcode::OpCode::$op, self, other)
            }
        )*
    };
}

impl Scalar for Sx {
    #[inline]
    fn from_f64(value: f64) -> Self {
        Sx::constant(value)
    }

    sx_unary! {
        sq => Sq,
        sqrt => Sqrt,
        exp => Exp,
        ln => Ln,
        sin => Sin,
        cos => Cos,
        tan => Tan,
        asin => Asin,
        acos => Acos,
        atan => Atan,
        sinh => Sinh,
        cosh => Cosh,
        tanh => Tanh,
        abs => Abs,
        sign => Sign,
        floor => Floor,
        ceil => Ceil,
    }

    sx_binary! {
        pow => Pow,
        atan2 => Atan2,
        fmin => Fmin,
        fmax => Fmax,
        less => Lt,
        less_equal => Le,
        equal => Eq,
        not_equal => Ne,
    }
}
