//! Reading the COUNTS map
//!
//! The collector only depends on [`CountSource`], so it runs the same way
//! against the live BPF map and against in-memory sources in tests.

use anyhow::{Context, Result};
use aya::maps::{HashMap, MapData};
use std::{borrow::Borrow, collections::BTreeMap};

/// Anything that can enumerate (pid, count) pairs
pub trait CountSource {
    /// Read every entry currently in the table
    fn read_counts(&self) -> Result<Vec<(u32, u64)>>;
}

impl<T: Borrow<MapData>> CountSource for HashMap<T, u32, u64> {
    fn read_counts(&self) -> Result<Vec<(u32, u64)>> {
        self.iter()
            .map(|entry| entry.context("Failed to read entry from COUNTS map"))
            .collect()
    }
}

impl CountSource for BTreeMap<u32, u64> {
    fn read_counts(&self) -> Result<Vec<(u32, u64)>> {
        Ok(self.iter().map(|(pid, count)| (*pid, *count)).collect())
    }
}

/// Read the table once, sorted by PID
///
/// Hash map iteration races with kernel-side inserts, so a key can be seen
/// twice; the larger value wins since counters only grow.
pub fn snapshot<S: CountSource + ?Sized>(source: &S) -> Result<Vec<(u32, u64)>> {
    let mut counts = BTreeMap::new();
    for (pid, count) in source.read_counts()? {
        let slot = counts.entry(pid).or_insert(count);
        *slot = (*slot).max(count);
    }
    Ok(counts.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Duplicating(Vec<(u32, u64)>);

    impl CountSource for Duplicating {
        fn read_counts(&self) -> Result<Vec<(u32, u64)>> {
            Ok(self.0.clone())
        }
    }

    struct Failing;

    impl CountSource for Failing {
        fn read_counts(&self) -> Result<Vec<(u32, u64)>> {
            anyhow::bail!("map gone")
        }
    }

    #[test]
    fn test_snapshot_sorted() {
        let source = Duplicating(vec![(300, 1), (100, 5), (200, 3)]);

        assert_eq!(
            snapshot(&source).unwrap(),
            vec![(100, 5), (200, 3), (300, 1)]
        );
    }

    #[test]
    fn test_snapshot_dedups_keys() {
        let source = Duplicating(vec![(100, 4), (200, 3), (100, 5)]);

        assert_eq!(snapshot(&source).unwrap(), vec![(100, 5), (200, 3)]);
    }

    #[test]
    fn test_snapshot_keeps_larger_duplicate() {
        let source = Duplicating(vec![(100, 5), (100, 4)]);

        assert_eq!(snapshot(&source).unwrap(), vec![(100, 5)]);
    }

    #[test]
    fn test_snapshot_is_repeatable() {
        let source: BTreeMap<u32, u64> = [(100, 3), (200, 3)].into_iter().collect();

        assert_eq!(snapshot(&source).unwrap(), snapshot(&source).unwrap());
    }

    #[test]
    fn test_snapshot_propagates_errors() {
        assert!(snapshot(&Failing).is_err());
    }
}
