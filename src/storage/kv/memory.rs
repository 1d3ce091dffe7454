use std::collections::btree_map::Range;
use std::collections::BTreeMap;
use std::ops::Bound;

use super::{KvStorage, ScanIterator};
use crate::error::Result;

/// In-memory storage engine backed by a BTreeMap, the default block store.
#[derive(Debug, Clone, Default)]
pub struct Memory {
    data: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl Memory {
    pub fn new() -> Memory {
        Memory { data: BTreeMap::new() }
    }
}

impl KvStorage for Memory {
    fn flush(&self) -> Result<()> {
        Ok(())
    }

    fn set(&mut self, key: &[u8], value: Vec<u8>) -> Result<()> {
        self.data.insert(key.to_vec(), value);
        Ok(())
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.data.get(key).cloned())
    }

    fn scan(&self, range: (Bound<Vec<u8>>, Bound<Vec<u8>>)) -> Box<dyn ScanIterator<'_> + '_> {
        Box::new(RangeIterator { it: self.data.range(range) })
    }
}

pub struct RangeIterator<'a> {
    it: Range<'a, Vec<u8>, Vec<u8>>,
}

impl Iterator for RangeIterator<'_> {
    type Item = Result<(Vec<u8>, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        self.it.next().map(|(k, v)| Ok((k.clone(), v.clone())))
    }
}

impl DoubleEndedIterator for RangeIterator<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.it.next_back().map(|(k, v)| Ok((k.clone(), v.clone())))
    }
}
