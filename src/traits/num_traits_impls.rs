use num_traits::{One, Zero};

use crate::sx::Sx;

impl Zero for Sx {
    #[inline]
    fn zero() -> Self {
        Sx::constant(0.0)
    }

    #[inline]
    fn is_zero(&self) -> bool {
        Sx::is_zero(self)
    }
}

impl One for Sx {
    #[inline]
    fn one() -> Self {
        Sx::constant(1.0)
    }

    #[inline]
    fn is_one(&self) -> bool {
        Sx::is_one(self)
    }
}
