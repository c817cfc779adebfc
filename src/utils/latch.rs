/// One-shot guard. Fires at most once for its whole lifetime.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Latch(bool);

impl Latch {
    /// Returns `true` only on the call that flips the latch.
    pub fn fire(&mut self) -> bool {
        !std::mem::replace(&mut self.0, true)
    }

    pub fn fired(&self) -> bool {
        self.0
    }
}
