use std::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Sub, SubAssign};

use crate::opcode::OpCode;
use crate::sx::Sx;

// ──────────────────────────────────────────────
//  Sx operators
// ──────────────────────────────────────────────

macro_rules! sx_binary_op {
    ($trait:ident, $method:ident, $assign_trait:ident, $assign_method:ident, $op:ident) => {
        impl $trait for Sx {
            type Output = Sx;
            #[inline]
            fn $method(self, rhs: Sx) -> Sx {
                Sx::binary(OpCode::$op, self, rhs)
            }
        }

        impl $trait<&Sx> for &Sx {
            type Output = Sx;
            #[inline]
            fn $method(self, rhs: &Sx) -> Sx {
                Sx::binary(OpCode::$op, self.clone(), rhs.clone())
            }
        }

        impl $trait<f64> for Sx {
            type Output = Sx;
            #[inline]
            fn $method(self, rhs: f64) -> Sx {
                Sx::binary(OpCode::$op, self, Sx::constant(rhs))
            }
        }

        impl $trait<Sx> for f64 {
            type Output = Sx;
            #[inline]
            fn $method(self, rhs: Sx) -> Sx {
                Sx::binary(OpCode::$op, Sx::constant(self), rhs)
            }
        }

        impl $assign_trait for Sx {
            #[inline]
            fn $assign_method(&mut self, rhs: Sx) {
                *self = Sx::binary(OpCode::$op, self.clone(), rhs);
            }
        }
    };
}

sx_binary_op!(Add, add, AddAssign, add_assign, Add);
sx_binary_op!(Sub, sub, SubAssign, sub_assign, Sub);
sx_binary_op!(Mul, mul, MulAssign, mul_assign, Mul);
sx_binary_op!(Div, div, DivAssign, div_assign, Div);

impl Neg for Sx {
    type Output = Sx;
    #[inline]
    fn neg(self) -> Sx {
        Sx::unary(OpCode::Neg, self)
    }
}

impl Neg for &Sx {
    type Output = Sx;
    #[inline]
    fn neg(self) -> Sx {
        Sx::unary(OpCode::Neg, self.clone())
    }
}
