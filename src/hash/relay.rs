//! Reorders hash results into piece-index order

use crate::hash::hasher::HashResult;
use std::collections::BTreeMap;
use tracing::warn;

/// Buffers out-of-order results and releases them strictly by index
#[derive(Debug, Default)]
pub struct OrderedRelay {
    next: u32,
    pending: BTreeMap<u32, HashResult>,
}

impl OrderedRelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept one result and return every result that is now in sequence
    pub fn push(&mut self, result: HashResult) -> Vec<HashResult> {
        if result.index < self.next || self.pending.contains_key(&result.index) {
            warn!("Dropping duplicate hash result for piece {}", result.index);
            return Vec::new();
        }
        self.pending.insert(result.index, result);

        let mut ready = Vec::new();
        while let Some(result) = self.pending.remove(&self.next) {
            ready.push(result);
            self.next += 1;
        }
        ready
    }

    /// Index of the next result to be released
    pub fn next_index(&self) -> u32 {
        self.next
    }

    /// Results waiting for an earlier index
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn result(index: u32) -> HashResult {
        HashResult {
            index,
            digest: [index as u8; 20],
            file: PathBuf::from("f"),
        }
    }

    fn indices(results: &[HashResult]) -> Vec<u32> {
        results.iter().map(|r| r.index).collect()
    }

    #[test]
    fn test_releases_in_order() {
        let mut relay = OrderedRelay::new();
        assert!(relay.push(result(2)).is_empty());
        assert!(relay.push(result(1)).is_empty());
        assert_eq!(relay.pending(), 2);
        assert_eq!(indices(&relay.push(result(0))), vec![0, 1, 2]);
        assert_eq!(indices(&relay.push(result(3))), vec![3]);
        assert_eq!(relay.next_index(), 4);
        assert_eq!(relay.pending(), 0);
    }

    #[test]
    fn test_ignores_duplicates() {
        let mut relay = OrderedRelay::new();
        relay.push(result(0));
        assert!(relay.push(result(0)).is_empty());
        relay.push(result(5));
        assert!(relay.push(result(5)).is_empty());
        assert_eq!(relay.pending(), 1);
    }
}
