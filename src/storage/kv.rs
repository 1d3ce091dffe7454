use std::fmt::Debug;
use std::iter::once;
use std::ops::Bound;

use serde::Deserialize;

use crate::error::Result;

mod memory;

pub trait ScanIterator<'a>: DoubleEndedIterator<Item = Result<(Vec<u8>, Vec<u8>)>> + 'a {}

// Any double-ended iterator over key/value results is a ScanIterator, so
// engines can hand back their own iterator types without extra impls.
impl<'a, T> ScanIterator<'a> for T where
    T: DoubleEndedIterator<Item = Result<(Vec<u8>, Vec<u8>)>> + 'a
{
}

/// A key/value storage engine, where both keys and values are arbitrary byte
/// strings. stored in lexicographical key order. Writes are only guaranteed
/// durable after calling flush().
///
/// The block store keeps one entry per disk block, keyed by the encoded
/// block id, so the trait stays `trait object` compatible and the file
/// manager can hold a `Box<dyn KvStorage>`.
pub trait KvStorage: Debug + Send + Sync {
    /// Flushes any buffered data to underlying storage medium.
    fn flush(&self) -> Result<()>;

    /// Sets a value for a key, overwrite the existing value if any.
    fn set(&mut self, key: &[u8], value: Vec<u8>) -> Result<()>;

    /// Gets the value with a given key.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Iterates over the key/values pares with the given key range.
    fn scan(&self, range: (Bound<Vec<u8>>, Bound<Vec<u8>>)) -> Box<dyn ScanIterator<'_> + '_>;

    /// Iterates over all key/value pairs starting with prefix.
    fn scan_prefix(&self, prefix: &[u8]) -> Box<dyn ScanIterator<'_> + '_> {
        self.scan(prefix_range(prefix))
    }
}

/// The key range holding exactly the keys that start with `prefix`.
pub fn prefix_range(prefix: &[u8]) -> (Bound<Vec<u8>>, Bound<Vec<u8>>) {
    let start = Bound::Included(prefix.to_vec());
    let breaker = prefix.iter().rposition(|&b| b != 0xff);
    let end = match breaker {
        None => Bound::Unbounded,
        Some(i) => {
            Bound::Excluded(prefix.iter().take(i).copied().chain(once(prefix[i] + 1)).collect())
        }
    };
    (start, end)
}

#[derive(Copy, Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageType {
    Memory,
}

pub fn new_storage(typ: StorageType) -> Result<Box<dyn KvStorage>> {
    match typ {
        StorageType::Memory => Ok(Box::new(memory::Memory::new())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_range() {
        let (start, end) = prefix_range(&[1, 2]);
        assert_eq!(Bound::Included(vec![1, 2]), start);
        assert_eq!(Bound::Excluded(vec![1, 3]), end);

        // trailing 0xff bytes roll over into the previous byte
        let (_, end) = prefix_range(&[1, 0xff]);
        assert_eq!(Bound::Excluded(vec![2]), end);

        let (_, end) = prefix_range(&[0xff, 0xff]);
        assert_eq!(Bound::Unbounded, end);
    }

    #[test]
    fn test_new_storage() -> Result<()> {
        let mut s = new_storage(StorageType::Memory)?;
        s.set(b"a", vec![1])?;
        assert_eq!(Some(vec![1]), s.get(b"a")?);
        s.flush()?;
        Ok(())
    }
}
