use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::codec::bincodec;
use crate::error::Result;
use crate::storage::kv::KvStorage;
use crate::storage::page::Page;

/// Identifies a disk block by file name and zero-based block number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockId {
    file_name: String,
    number: u64,
}

impl BlockId {
    pub fn new(file_name: impl Into<String>, number: u64) -> Self {
        BlockId { file_name: file_name.into(), number }
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn number(&self) -> u64 {
        self.number
    }

    fn as_key(&self) -> Result<Vec<u8>> {
        bincodec::serialize(self)
    }
}

impl Display for BlockId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[file {}, block {}]", self.file_name, self.number)
    }
}

/// FileManager reads and writes whole blocks. Every block lives in the
/// underlying kv storage under its encoded block id; a file is the set of
/// blocks sharing the file name prefix.
#[derive(Debug)]
pub struct FileManager {
    storage: Box<dyn KvStorage>,
}

impl FileManager {
    pub fn new(storage: Box<dyn KvStorage>) -> Self {
        FileManager { storage }
    }

    /// Read the block into the page. A block that was never written reads
    /// back as zeros.
    pub fn read(&self, block: &BlockId, page: &mut Page) -> Result<()> {
        *page = match self.storage.get(&block.as_key()?)? {
            Some(data) => Page::from_bytes(&data)?,
            None => Page::new(),
        };
        Ok(())
    }

    pub fn write(&mut self, block: &BlockId, page: &Page) -> Result<()> {
        self.storage.set(&block.as_key()?, page.as_ref().to_vec())
    }

    /// Append the page as a new block at the end of the file.
    pub fn append(&mut self, file_name: &str, page: &Page) -> Result<BlockId> {
        let block = BlockId::new(file_name, self.size(file_name)?);
        self.write(&block, page)?;
        Ok(block)
    }

    /// Number of blocks in the file.
    pub fn size(&self, file_name: &str) -> Result<u64> {
        let prefix = bincodec::serialize(file_name)?;
        let mut n = 0;
        for item in self.storage.scan_prefix(&prefix) {
            item?;
            n += 1;
        }
        Ok(n)
    }

    pub fn flush(&self) -> Result<()> {
        self.storage.flush()
    }
}
