/// Rate limiter over caller supplied timestamps (seconds).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Throttle {
    min_gap: f64,
    last: Option<f64>,
}

impl Throttle {
    pub fn new(min_gap: f64) -> Self {
        Self { min_gap, last: None }
    }

    /// Admits `now` if at least `min_gap` elapsed since the last admitted call.
    /// Rejected calls leave the throttle untouched.
    pub fn admit(&mut self, now: f64) -> bool {
        if self.last.map_or(false, |last| now - last < self.min_gap) {
            return false;
        }

        self.last = Some(now);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test_case(&[0.0, 0.01, 0.05, 0.07], &[true, false, false, true]; "caps at the gap")]
    #[test_case(&[1.0, 1.1, 1.15, 1.2], &[true, true, false, true]; "gap measured from last admitted")]
    #[test_case(&[0.5], &[true]; "first call admitted")]
    fn admission(times: &[f64], expected: &[bool]) {
        let mut throttle = Throttle::new(1. / 15.);
        let admitted = times.iter().map(|t| throttle.admit(*t)).collect::<Vec<_>>();
        assert_eq!(admitted, expected);
    }

    #[test]
    fn rejection_does_not_move_anchor() {
        let mut throttle = Throttle::new(0.1);
        assert!(throttle.admit(0.0));
        (1..10).for_each(|i| assert!(!throttle.admit(i as f64 * 0.01)));
        assert!(throttle.admit(0.1));
    }
}
