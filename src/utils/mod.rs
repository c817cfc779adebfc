mod latch;
mod positive;
mod throttle;

pub use latch::Latch;
pub use noisy_float::prelude::*;
pub use positive::{p32, p64, P32, P64};
pub use throttle::Throttle;
