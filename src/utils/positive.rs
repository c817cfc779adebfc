use noisy_float::{prelude::Float, FloatChecker, NoisyFloat};

/// Accepts finite values that are not below zero.
#[derive(Debug, Clone, Copy)]
pub struct PositiveChecker;

impl<F: Float> FloatChecker<F> for PositiveChecker {
    #[inline]
    #[track_caller]
    fn assert(value: F) {
        debug_assert!(Self::check(value), "unexpected negative, NaN or infinity");
    }

    #[inline]
    fn check(value: F) -> bool {
        value.is_finite() && F::zero() <= value
    }
}

pub type P32 = NoisyFloat<f32, PositiveChecker>;
pub type P64 = NoisyFloat<f64, PositiveChecker>;

#[inline]
#[track_caller]
pub fn p32(value: f32) -> P32 {
    P32::new(value)
}

#[inline]
#[track_caller]
pub fn p64(value: f64) -> P64 {
    P64::new(value)
}
