use std::ops::Deref;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::RwLock;

use super::{FrameId, TxnId};
use crate::error::{Error, Result};
use crate::storage::file::{BlockId, FileManager};
use crate::storage::page::{Page, PageFormatter};

/// The contents of a frame: the block it holds, that block's page image,
/// and the transaction that modified the image since it was last flushed.
#[derive(Debug)]
pub struct FrameData {
    block: Option<BlockId>,
    page: Page,
    modified_by: Option<TxnId>,
}

impl FrameData {
    fn new() -> Self {
        FrameData { block: None, page: Page::new(), modified_by: None }
    }

    pub fn block(&self) -> Option<&BlockId> {
        self.block.as_ref()
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    /// Mutable access to the page image. Callers changing it must also call
    /// `set_modified` so the change is written back.
    pub fn page_mut(&mut self) -> &mut Page {
        &mut self.page
    }

    pub fn set_modified(&mut self, txn: TxnId) {
        self.modified_by = Some(txn);
    }

    pub fn is_modified_by(&self, txn: TxnId) -> bool {
        self.modified_by == Some(txn)
    }

    pub fn is_dirty(&self) -> bool {
        self.modified_by.is_some()
    }

    /// Write the page back to its block if it was modified.
    pub(super) fn flush(&mut self, files: &mut FileManager) -> Result<()> {
        if self.modified_by.is_none() {
            return Ok(());
        }
        let Some(block) = &self.block else {
            return Err(Error::Internal("modified frame holds no block".to_string()));
        };
        files.write(block, &self.page)?;
        self.modified_by = None;
        Ok(())
    }

    /// Write back the current block, then load `block` into this frame.
    pub(super) fn assign_to_block(&mut self, block: BlockId, files: &mut FileManager) -> Result<()> {
        self.flush(files)?;
        files.read(&block, &mut self.page)?;
        self.block = Some(block);
        Ok(())
    }

    /// Write back the current block, then format a fresh page, append it to
    /// `file_name` and hold the new block.
    pub(super) fn assign_to_new(
        &mut self,
        file_name: &str,
        formatter: &dyn PageFormatter,
        files: &mut FileManager,
    ) -> Result<BlockId> {
        self.flush(files)?;
        let mut page = Page::new();
        formatter.format(&mut page);
        let block = files.append(file_name, &page)?;
        self.page = page;
        self.block = Some(block.clone());
        Ok(block)
    }
}

/// Frame is one slot of the buffer pool.
///
/// The pin count sits outside the content lock so the pool can look at it
/// without waiting for readers and writers of the page. It is only changed
/// while the pool latch is held.
#[derive(Debug)]
pub struct Frame {
    id: FrameId,
    pin_count: AtomicU32,
    inner: RwLock<FrameData>,
}

impl Frame {
    pub(super) fn new(id: FrameId) -> Self {
        Frame { id, pin_count: AtomicU32::new(0), inner: RwLock::new(FrameData::new()) }
    }

    pub fn id(&self) -> FrameId {
        self.id
    }

    pub fn pin_count(&self) -> u32 {
        self.pin_count.load(Ordering::Acquire)
    }

    pub fn is_pinned(&self) -> bool {
        self.pin_count() > 0
    }

    pub fn block(&self) -> Result<Option<BlockId>> {
        Ok(self.inner.read()?.block.clone())
    }

    pub fn is_modified_by(&self, txn: TxnId) -> Result<bool> {
        Ok(self.inner.read()?.is_modified_by(txn))
    }

    /// Returns the pin count after pinning.
    pub(super) fn pin(&self) -> u32 {
        self.pin_count.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Returns the pin count after unpinning, or an error if the frame was
    /// not pinned.
    pub(super) fn unpin(&self) -> Result<u32> {
        match self.pin_count.fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1)) {
            Ok(prev) => Ok(prev - 1),
            Err(_) => Err(Error::Value(format!("frame {} is not pinned", self.id))),
        }
    }
}

impl Deref for Frame {
    type Target = RwLock<FrameData>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}
