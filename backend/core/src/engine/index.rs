//! Bidirectional mapping between database ids and dense solver indices.

use std::collections::HashMap;

/// Bijection between domain ids and dense indices `0..len`.
///
/// Built once per run from the snapshot ordering and discarded at run end;
/// the forward map answers id lookups, the reverse array restores ids when
/// the solution is read back.
#[derive(Debug, Clone)]
pub struct IdIndex {
    forward: HashMap<i64, usize>,
    reverse: Vec<i64>,
}

impl IdIndex {
    /// Builds the index from an id sequence. Returns the offending id if a
    /// duplicate is encountered.
    pub fn from_ids(ids: impl Iterator<Item = i64>) -> Result<IdIndex, i64> {
        let mut forward = HashMap::new();
        let mut reverse = Vec::new();
        for id in ids {
            if forward.insert(id, reverse.len()).is_some() {
                return Err(id);
            }
            reverse.push(id);
        }
        Ok(IdIndex { forward, reverse })
    }

    /// Dense index for a database id.
    pub fn idx(&self, id: i64) -> Option<usize> {
        self.forward.get(&id).copied()
    }

    /// Database id for a dense index.
    pub fn id(&self, idx: usize) -> i64 {
        self.reverse[idx]
    }

    pub fn len(&self) -> usize {
        self.reverse.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reverse.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_both_directions() {
        let index = IdIndex::from_ids([10, 30, 20].into_iter()).unwrap();
        assert_eq!(index.len(), 3);
        assert_eq!(index.idx(10), Some(0));
        assert_eq!(index.idx(30), Some(1));
        assert_eq!(index.idx(20), Some(2));
        assert_eq!(index.idx(99), None);
        for i in 0..index.len() {
            assert_eq!(index.idx(index.id(i)), Some(i));
        }
    }

    #[test]
    fn rejects_duplicates() {
        assert_eq!(IdIndex::from_ids([1, 2, 1].into_iter()).unwrap_err(), 1);
    }
}
