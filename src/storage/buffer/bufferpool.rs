use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use log::{debug, error, info, warn};

use super::frame::{Frame, FrameData};
use super::history::{BlockHistory, NO_REFERENCE};
use super::replacer::{LRUKReplacer, Replacer};
use super::{FrameId, PoolOptions, ResidencyPolicy, Timestamp, TxnId};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::storage::file::{BlockId, FileManager};
use crate::storage::kv::new_storage;
use crate::storage::page::PageFormatter;

/// The buffer pool moves blocks back and forth between disk and a fixed
/// set of in-memory frames.
///
/// A block that is asked for is served from its frame when it is already
/// there. Otherwise it is read into an empty frame, or into the unpinned
/// frame the replacer picks, writing the old contents back first when they
/// were modified.
struct BufferPool {
    pool_size: usize,
    files: Arc<Mutex<FileManager>>,
    /// array of buffer pool frames. use the array index as
    /// FrameId, i.e., the FrameId is in range: [0, pool_size).
    frames: Vec<Arc<Frame>>,
    /// the block each frame holds, kept here so lookups never wait on a
    /// frame's content lock.
    blocks: Vec<Option<BlockId>>,
    /// residency index of the assigned frames, see `ResidencyPolicy`
    /// for when entries leave it.
    page_table: HashMap<BlockId, FrameId>,
    /// frames that were never assigned a block, in reverse order so the
    /// lowest frame id is at the end.
    free_list: Vec<FrameId>,
    replacer: Box<dyn Replacer>,
    residency: ResidencyPolicy,
    num_available: usize,
}

impl BufferPool {
    fn new(files: Arc<Mutex<FileManager>>, opts: PoolOptions) -> Self {
        let replacer: Box<dyn Replacer> = Box::new(LRUKReplacer::new(
            opts.replacer_k,
            opts.correlated_period,
            opts.max_tracked_blocks,
        ));
        let frames = (0..opts.pool_size).map(|i| Arc::new(Frame::new(i))).collect();
        // initially, every frame is in the free list
        let free_list = (0..opts.pool_size).rev().collect();
        BufferPool {
            pool_size: opts.pool_size,
            files,
            frames,
            blocks: vec![None; opts.pool_size],
            page_table: HashMap::new(),
            free_list,
            replacer,
            residency: opts.residency,
            num_available: opts.pool_size,
        }
    }

    /// Pin the frame holding `block`, reading the block into a frame first
    /// if needed. Returns None if every frame is pinned.
    fn pin(&mut self, block: &BlockId, now: Timestamp) -> Result<Option<Arc<Frame>>> {
        check_timestamp(now)?;
        if let Some(frame_id) = self.find_existing(block) {
            self.replacer.record_access(block, now)?;
            debug!("{} hit {} in frame {}", now, block, frame_id);
            // pinned frames are always mapped
            self.page_table.insert(block.clone(), frame_id);
            let frame = Arc::clone(&self.frames[frame_id]);
            return Ok(Some(self.pin_frame(frame)));
        }

        let Some((frame_id, victim)) = self.choose_unpinned_frame(now)? else {
            warn!("{} no available frame for {}", now, block);
            return Ok(None);
        };
        let frame = self.replace(frame_id, victim, now, |data, files| {
            data.assign_to_block(block.clone(), files)?;
            Ok(block.clone())
        })?;
        Ok(Some(self.pin_frame(frame)))
    }

    /// Append a new block formatted by `formatter` to the file and pin a
    /// frame to it. Returns None, without touching the file, if every frame
    /// is pinned.
    fn pin_new(
        &mut self,
        file_name: &str,
        formatter: &dyn PageFormatter,
        now: Timestamp,
    ) -> Result<Option<Arc<Frame>>> {
        check_timestamp(now)?;
        let Some((frame_id, victim)) = self.choose_unpinned_frame(now)? else {
            warn!("{} no available frame for a new block of {}", now, file_name);
            return Ok(None);
        };
        let frame = self.replace(frame_id, victim, now, |data, files| {
            data.assign_to_new(file_name, formatter, files)
        })?;
        Ok(Some(self.pin_frame(frame)))
    }

    /// Unpin the frame. When its pin count drops to zero the frame becomes
    /// available for replacement again.
    fn unpin(&mut self, frame: &Arc<Frame>) -> Result<()> {
        let frame_id = frame.id();
        let owned = self.frames.get(frame_id).map_or(false, |f| Arc::ptr_eq(f, frame));
        if !owned {
            return Err(Error::Value(format!("frame {} does not belong to this pool", frame_id)));
        }
        if frame.unpin()? > 0 {
            return Ok(());
        }
        self.num_available += 1;
        if self.residency == ResidencyPolicy::UnmapOnUnpin {
            self.page_table.retain(|_, id| *id != frame_id);
        }
        Ok(())
    }

    /// The frame already holding `block`, if any.
    fn find_existing(&self, block: &BlockId) -> Option<FrameId> {
        if let Some(&frame_id) = self.page_table.get(block) {
            return Some(frame_id);
        }
        if self.residency == ResidencyPolicy::RetainUntilReplaced {
            return None;
        }
        // unpinned frames are unmapped but still hold their block
        self.blocks
            .iter()
            .enumerate()
            .find(|(id, held)| held.as_ref() == Some(block) && !self.frames[*id].is_pinned())
            .map(|(id, _)| id)
    }

    /// Pick the frame to load a new block into, together with the block it
    /// holds now. Empty frames go first, lowest id first. Returns None when
    /// every frame is pinned.
    fn choose_unpinned_frame(&self, now: Timestamp) -> Result<Option<(FrameId, Option<BlockId>)>> {
        if let Some(&frame_id) = self.free_list.last() {
            return Ok(Some((frame_id, None)));
        }
        let mut candidates = Vec::with_capacity(self.pool_size);
        for (frame_id, held) in self.blocks.iter().enumerate() {
            if self.frames[frame_id].is_pinned() {
                continue;
            }
            if let Some(block) = held {
                candidates.push((frame_id, block.clone()));
            }
        }
        if candidates.is_empty() {
            return Ok(None);
        }
        let Some(frame_id) = self.replacer.victim(&candidates, now)? else {
            error!("{} no victim among {} unpinned frames", now, candidates.len());
            return Err(Error::Internal(format!(
                "no victim among {} unpinned frames",
                candidates.len()
            )));
        };
        let victim = candidates.into_iter().find(|(id, _)| *id == frame_id).map(|(_, block)| block);
        Ok(Some((frame_id, victim)))
    }

    /// Load a block into the frame with `assign`, then move the residency
    /// index and the replacer over from `victim` to the new block.
    fn replace<F>(
        &mut self,
        frame_id: FrameId,
        victim: Option<BlockId>,
        now: Timestamp,
        assign: F,
    ) -> Result<Arc<Frame>>
    where
        F: FnOnce(&mut FrameData, &mut FileManager) -> Result<BlockId>,
    {
        let frame = Arc::clone(&self.frames[frame_id]);
        let mut guard = frame.write()?;
        let mut files = self.files.lock()?;
        let block = assign(&mut *guard, &mut *files)?;
        drop(files);
        drop(guard);

        self.free_list.retain(|&id| id != frame_id);
        self.blocks[frame_id] = Some(block.clone());
        if let Some(old) = &victim {
            if self.page_table.get(old) == Some(&frame_id) {
                self.page_table.remove(old);
            }
            self.replacer.evict(old);
        }
        self.page_table.insert(block.clone(), frame_id);
        self.replacer.admit(&block, now);

        match &victim {
            Some(old) => info!("{} {} {} {}", now, frame_id, old, block),
            None => info!("{} {} - {}", now, frame_id, block),
        }
        Ok(frame)
    }

    fn pin_frame(&mut self, frame: Arc<Frame>) -> Arc<Frame> {
        if frame.pin() == 1 {
            self.num_available -= 1;
        }
        frame
    }

    fn frames(&self) -> Vec<Option<BlockId>> {
        self.blocks.clone()
    }

    fn history(&self, block: &BlockId) -> Option<BlockHistory> {
        self.replacer.history(block).cloned()
    }
}

fn check_timestamp(now: Timestamp) -> Result<()> {
    if now == NO_REFERENCE {
        return Err(Error::Value("timestamp 0 is reserved".to_string()));
    }
    Ok(())
}

/// Buffer manager wraps the buffer pool with a mutex for concurrent
/// access, all the heavy lifting happens in the buffer pool.
///
/// Locks are taken in the order pool, frame contents, files. The pool only
/// locks the contents of unpinned frames, so a caller may keep a guard on a
/// pinned frame while pinning more blocks. `flush_all` runs outside the
/// pool latch. Callers must drop their own guard on a frame before they
/// unpin it or flush its transaction.
#[derive(Clone)]
pub struct BufferManager {
    inner: Arc<Mutex<BufferPool>>,
    frames: Vec<Arc<Frame>>,
    files: Arc<Mutex<FileManager>>,
}

impl BufferManager {
    pub fn new(files: FileManager, opts: PoolOptions) -> Result<Self> {
        opts.validate()?;
        let files = Arc::new(Mutex::new(files));
        let inner = BufferPool::new(Arc::clone(&files), opts);
        let frames = inner.frames.clone();
        Ok(BufferManager { inner: Arc::new(Mutex::new(inner)), frames, files })
    }

    pub fn from_config(cfg: &Config) -> Result<Self> {
        let files = FileManager::new(new_storage(cfg.storage_type)?);
        Self::new(files, PoolOptions::from(cfg))
    }

    /// Pin a frame to the block at time `now`. Returns None if the block is
    /// not resident and every frame is pinned.
    pub fn pin(&self, block: &BlockId, now: Timestamp) -> Result<Option<Arc<Frame>>> {
        let mut inner = self.inner.lock()?;
        inner.pin(block, now)
    }

    /// Allocate a new block at the end of the file and pin a frame to it.
    pub fn pin_new(
        &self,
        file_name: &str,
        formatter: &dyn PageFormatter,
        now: Timestamp,
    ) -> Result<Option<Arc<Frame>>> {
        let mut inner = self.inner.lock()?;
        inner.pin_new(file_name, formatter, now)
    }

    pub fn unpin(&self, frame: &Arc<Frame>) -> Result<()> {
        let mut inner = self.inner.lock()?;
        inner.unpin(frame)
    }

    /// Write back every frame modified by the transaction, pinned or not.
    /// Waits for the content lock of each frame without holding the pool
    /// latch.
    pub fn flush_all(&self, txn: TxnId) -> Result<()> {
        for frame in self.frames.iter() {
            let mut guard = frame.write()?;
            if guard.is_modified_by(txn) {
                guard.flush(&mut *self.files.lock()?)?;
            }
        }
        self.files.lock()?.flush()
    }

    /// Number of unpinned frames.
    pub fn available(&self) -> Result<usize> {
        Ok(self.inner.lock()?.num_available)
    }

    /// The block held by each frame, in frame order.
    pub fn frames(&self) -> Result<Vec<Option<BlockId>>> {
        Ok(self.inner.lock()?.frames())
    }

    /// One line listing the block held by each frame. The line is also
    /// logged at info level.
    pub fn display_frames(&self) -> Result<String> {
        let line = self
            .frames()?
            .iter()
            .map(|b| b.as_ref().map_or_else(|| "[empty]".to_string(), |b| b.to_string()))
            .collect::<Vec<_>>()
            .join("\t");
        info!("{}", line);
        Ok(line)
    }

    pub fn history(&self, block: &BlockId) -> Result<Option<BlockHistory>> {
        Ok(self.inner.lock()?.history(block))
    }
}
