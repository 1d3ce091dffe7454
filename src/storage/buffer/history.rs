use super::Timestamp;

/// Slot value of a reference that has not happened yet.
pub const NO_REFERENCE: Timestamp = 0;

/// The last K reference times of a block, oldest first and most recent
/// last. Slots that were never filled hold `NO_REFERENCE` and always form a
/// prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceHistory {
    slots: Vec<Timestamp>,
}

impl ReferenceHistory {
    /// History of a block referenced for the first time at `now`.
    pub fn new(k: usize, now: Timestamp) -> Self {
        assert!(k > 0, "replacer k should be larger than zero");
        let mut slots = vec![NO_REFERENCE; k];
        slots[k - 1] = now;
        ReferenceHistory { slots }
    }

    pub fn k(&self) -> usize {
        self.slots.len()
    }

    pub fn slots(&self) -> &[Timestamp] {
        &self.slots
    }

    /// HIST(p, i): the i-th most recent reference, 1-based.
    pub fn get(&self, i: usize) -> Timestamp {
        assert!(i >= 1 && i <= self.k(), "history index {} out of 1..={}", i, self.k());
        self.slots[self.k() - i]
    }

    /// Drop the oldest slot and record `now` as the newest one. Every
    /// shifted timestamp moves forward by `correlation`, sentinels stay put.
    pub fn shift(&mut self, now: Timestamp, correlation: Timestamp) {
        let k = self.k();
        for i in 0..k - 1 {
            let next = self.slots[i + 1];
            self.slots[i] =
                if next == NO_REFERENCE { NO_REFERENCE } else { next.saturating_add(correlation) };
        }
        self.slots[k - 1] = now;
    }

    /// The comparison key of this history at search depth `y` (1..=K).
    ///
    /// Depth `y` only admits histories whose first `K - y` slots are all
    /// empty, i.e. blocks with at most `y` recorded references, and compares
    /// them by slot `K - y`. At depth K every history qualifies and the key
    /// is the K-th most recent reference.
    pub fn key_at_depth(&self, y: usize) -> Option<Timestamp> {
        let k = self.k();
        if y == 0 || y > k {
            return None;
        }
        let unreferenced = k - y;
        if self.slots[..unreferenced].iter().all(|&t| t == NO_REFERENCE) {
            Some(self.slots[unreferenced])
        } else {
            None
        }
    }
}

/// LAST(p): the most recent reference of a block, correlated or not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LastReference(pub Timestamp);

/// ReferenceHistory and LastReference of one block. Keeping both in one
/// record means neither can exist without the other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHistory {
    pub history: ReferenceHistory,
    pub last: LastReference,
    pub(super) resident: bool,
}

impl BlockHistory {
    pub(super) fn new(k: usize, now: Timestamp) -> Self {
        BlockHistory {
            history: ReferenceHistory::new(k, now),
            last: LastReference(now),
            resident: true,
        }
    }

    /// Whether `now` still belongs to the burst that LAST started.
    pub fn in_burst(&self, now: Timestamp, correlated_period: Timestamp) -> bool {
        now.saturating_sub(self.last.0) <= correlated_period
    }

    /// Record a reference to the resident block. Returns false when the
    /// reference was correlated and only LAST moved.
    pub(super) fn reference(&mut self, now: Timestamp, correlated_period: Timestamp) -> bool {
        if self.in_burst(now, correlated_period) {
            self.last = LastReference(now);
            return false;
        }
        // the length of the burst that just ended
        let correlation = self.last.0.saturating_sub(self.history.get(1));
        self.history.shift(now, correlation);
        self.last = LastReference(now);
        true
    }

    /// Record that a previously tracked block was loaded into a frame again.
    pub(super) fn readmit(&mut self, now: Timestamp) {
        self.history.shift(now, 0);
        self.last = LastReference(now);
        self.resident = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_history() {
        let h = ReferenceHistory::new(3, 42);
        assert_eq!(&[0, 0, 42], h.slots());
        assert_eq!(42, h.get(1));
        assert_eq!(NO_REFERENCE, h.get(3));
    }

    #[test]
    fn test_shift_keeps_sentinels() {
        let mut h = ReferenceHistory::new(3, 5);
        h.shift(20, 3);
        assert_eq!(&[0, 8, 20], h.slots());
        h.shift(40, 2);
        assert_eq!(&[10, 22, 40], h.slots());

        let mut h = ReferenceHistory::new(1, 5);
        h.shift(9, 100);
        assert_eq!(&[9], h.slots());
    }

    #[test]
    fn test_shift_saturates() {
        let mut h = ReferenceHistory::new(2, u64::MAX - 1);
        h.shift(u64::MAX, 10);
        assert_eq!(&[u64::MAX, u64::MAX], h.slots());
    }

    #[test]
    fn test_key_at_depth() {
        let h = ReferenceHistory::new(3, 7);
        assert_eq!(Some(7), h.key_at_depth(1));
        assert_eq!(Some(0), h.key_at_depth(2));
        assert_eq!(Some(0), h.key_at_depth(3));
        assert_eq!(None, h.key_at_depth(0));
        assert_eq!(None, h.key_at_depth(4));

        let mut h = ReferenceHistory::new(3, 7);
        h.shift(9, 0);
        assert_eq!(None, h.key_at_depth(1));
        assert_eq!(Some(7), h.key_at_depth(2));
        h.shift(11, 0);
        assert_eq!(None, h.key_at_depth(2));
        assert_eq!(Some(7), h.key_at_depth(3));
    }

    #[test]
    fn test_correlated_reference() {
        let mut b = BlockHistory::new(2, 100);
        assert!(!b.reference(105, 10));
        assert!(!b.reference(110, 10));
        assert_eq!(&[0, 100], b.history.slots());
        assert_eq!(LastReference(110), b.last);
    }

    #[test]
    fn test_uncorrelated_reference() {
        let mut b = BlockHistory::new(2, 100);
        b.reference(104, 10);
        // burst 100..104 is over, it shifts forward by its length
        assert!(b.reference(130, 10));
        assert_eq!(&[104, 130], b.history.slots());
        assert_eq!(LastReference(130), b.last);

        assert!(b.reference(150, 10));
        assert_eq!(&[130, 150], b.history.slots());
    }

    #[test]
    fn test_readmit() {
        let mut b = BlockHistory::new(2, 2);
        b.resident = false;
        b.readmit(45);
        assert_eq!(&[2, 45], b.history.slots());
        assert_eq!(LastReference(45), b.last);
        assert!(b.resident);
    }
}
