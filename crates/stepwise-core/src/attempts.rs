/// Bounded attempt counter.
///
/// Yields the 1-based numbers `1..=limit` and then stops for good. Loops
/// short-circuit by breaking out early; whatever is left stays available
/// through `remaining`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempts {
    taken: u32,
    limit: u32,
}

impl Attempts {
    pub fn up_to(limit: u32) -> Self {
        Self { taken: 0, limit }
    }

    pub fn taken(&self) -> u32 {
        self.taken
    }

    pub fn remaining(&self) -> u32 {
        self.limit - self.taken
    }

    pub fn is_exhausted(&self) -> bool {
        self.taken >= self.limit
    }

    /// Drop every remaining attempt.
    pub fn exhaust(&mut self) {
        self.taken = self.limit;
    }
}

impl Iterator for Attempts {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        if self.is_exhausted() {
            return None;
        }
        self.taken += 1;
        Some(self.taken)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.remaining() as usize;
        (n, Some(n))
    }
}

impl ExactSizeIterator for Attempts {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yields_one_based_numbers_up_to_limit() {
        let rounds: Vec<u32> = Attempts::up_to(5).collect();
        assert_eq!(rounds, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn zero_limit_yields_nothing() {
        let mut a = Attempts::up_to(0);
        assert!(a.is_exhausted());
        assert_eq!(a.next(), None);
    }

    #[test]
    fn break_leaves_remaining() {
        let mut a = Attempts::up_to(4);
        for n in a.by_ref() {
            if n == 2 {
                break;
            }
        }
        assert_eq!(a.taken(), 2);
        assert_eq!(a.remaining(), 2);
        assert_eq!(a.len(), 2);
    }

    #[test]
    fn never_exceeds_limit_for_endless_demand() {
        let mut a = Attempts::up_to(5);
        let mut calls = 0;
        // A caller that always wants another round.
        while a.next().is_some() {
            calls += 1;
        }
        assert_eq!(calls, 5);
        assert_eq!(a.next(), None);
    }

    #[test]
    fn exhaust_drops_remaining() {
        let mut a = Attempts::up_to(3);
        a.next();
        a.exhaust();
        assert_eq!(a.remaining(), 0);
        assert_eq!(a.next(), None);
    }
}
