use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic identifier generator. Each entity family (grants, proposals,
/// groups, assets, rules, audit records) owns one sequence; identifiers are
/// assigned once and never reused, even after the entity reaches a terminal
/// state.
#[derive(Debug)]
pub struct Sequence {
    next: AtomicU64,
}

impl Sequence {
    /// Creates a sequence whose first issued value is `start`.
    pub fn new(start: u64) -> Self {
        Self {
            next: AtomicU64::new(start),
        }
    }

    /// Issues the next identifier.
    pub fn next(&self) -> u64 {
        self.next.fetch_add(1, Ordering::SeqCst)
    }

    /// Returns the value the next call to [`next`](Self::next) would issue.
    pub fn peek(&self) -> u64 {
        self.next.load(Ordering::SeqCst)
    }
}

impl Default for Sequence {
    fn default() -> Self {
        Self::new(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_is_monotonic() {
        let seq = Sequence::new(1);
        assert_eq!(seq.next(), 1);
        assert_eq!(seq.next(), 2);
        assert_eq!(seq.peek(), 3);
        assert_eq!(seq.next(), 3);
    }

    #[test]
    fn test_default_starts_at_one() {
        let seq = Sequence::default();
        assert_eq!(seq.peek(), 1);
    }
}
