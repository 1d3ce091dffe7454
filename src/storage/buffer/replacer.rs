use std::collections::HashMap;

use log::{error, warn};

use super::history::BlockHistory;
use super::{FrameId, Timestamp};
use crate::error::{Error, Result};
use crate::storage::file::BlockId;

///  Replacer tracks block references for replacement in case the buffer pool is full.
pub trait Replacer: Send {
    /// Record a reference at `now` to a block that is already resident.
    fn record_access(&mut self, block: &BlockId, now: Timestamp) -> Result<()>;

    /// Record that `block` was loaded into a frame at `now`. Creates the
    /// block's history if the block has never been seen before.
    fn admit(&mut self, block: &BlockId, now: Timestamp);

    /// Record that `block` left its frame. Its history is kept so it can be
    /// continued when the block comes back.
    fn evict(&mut self, block: &BlockId);

    /// Pick the frame to reuse among `candidates`, the unpinned frames and
    /// the blocks they hold. Returns None only when there is no candidate.
    fn victim(&self, candidates: &[(FrameId, BlockId)], now: Timestamp) -> Result<Option<FrameId>>;

    /// The tracked history of a block, if any.
    fn history(&self, block: &BlockId) -> Option<&BlockHistory>;

    /// Number of tracked blocks.
    fn size(&self) -> usize;
}

/// LRUKReplacer implements LRU-K with a correlated reference period.
///
/// References to a block closer together than the correlated period form
/// one burst and count as a single reference. When a burst ends, the
/// block's older history is moved forward by the length of the burst, so
/// re-references inside a burst neither raise nor lower the block's
/// backward K-distance.
///
/// The victim is the candidate whose K-th most recent reference is oldest,
/// blocks with fewer than K references going first (their distance counts
/// as infinite). Blocks still inside a burst are skipped unless every
/// candidate is.
pub struct LRUKReplacer {
    k: usize,
    correlated_period: Timestamp,
    /// 0 means unbounded.
    max_tracked: usize,
    histories: HashMap<BlockId, BlockHistory>,
}

impl LRUKReplacer {
    pub fn new(k: usize, correlated_period: Timestamp, max_tracked: usize) -> Self {
        assert!(k > 0, "replacer k should be larger than zero");
        LRUKReplacer { k, correlated_period, max_tracked, histories: HashMap::new() }
    }

    /// Walk the search depths and return the candidate with the smallest
    /// key at the first depth that has any.
    fn search(
        &self,
        candidates: &[(FrameId, &BlockHistory)],
        now: Timestamp,
        skip_bursts: bool,
    ) -> Option<FrameId> {
        for y in 1..=self.k {
            let mut best: Option<(Timestamp, FrameId)> = None;
            for &(frame_id, hist) in candidates {
                if skip_bursts && hist.in_burst(now, self.correlated_period) {
                    continue;
                }
                let Some(key) = hist.history.key_at_depth(y) else {
                    continue;
                };
                if best.map_or(true, |(min, _)| key < min) {
                    best = Some((key, frame_id));
                }
            }
            if let Some((_, frame_id)) = best {
                return Some(frame_id);
            }
        }
        None
    }

    /// Make room for one more history by dropping the non-resident one
    /// that was referenced least recently.
    fn make_room(&mut self) {
        if self.max_tracked == 0 || self.histories.len() < self.max_tracked {
            return;
        }
        let oldest = self
            .histories
            .iter()
            .filter(|(_, h)| !h.resident)
            .min_by_key(|(_, h)| h.last.0)
            .map(|(block, _)| block.clone());
        match oldest {
            Some(block) => {
                self.histories.remove(&block);
            }
            None => warn!(
                "all {} tracked blocks are resident, history grows past its limit",
                self.histories.len()
            ),
        }
    }
}

impl Replacer for LRUKReplacer {
    fn record_access(&mut self, block: &BlockId, now: Timestamp) -> Result<()> {
        match self.histories.get_mut(block) {
            Some(hist) => {
                hist.reference(now, self.correlated_period);
                Ok(())
            }
            None => {
                error!("resident block {} has no reference history", block);
                Err(Error::Internal(format!("resident block {} has no reference history", block)))
            }
        }
    }

    fn admit(&mut self, block: &BlockId, now: Timestamp) {
        if let Some(hist) = self.histories.get_mut(block) {
            hist.readmit(now);
            return;
        }
        self.make_room();
        self.histories.insert(block.clone(), BlockHistory::new(self.k, now));
    }

    fn evict(&mut self, block: &BlockId) {
        if let Some(hist) = self.histories.get_mut(block) {
            hist.resident = false;
        }
    }

    fn victim(&self, candidates: &[(FrameId, BlockId)], now: Timestamp) -> Result<Option<FrameId>> {
        if candidates.is_empty() {
            return Ok(None);
        }
        let mut tracked = Vec::with_capacity(candidates.len());
        for (frame_id, block) in candidates {
            match self.histories.get(block) {
                Some(hist) => tracked.push((*frame_id, hist)),
                None => {
                    error!("block {} in frame {} was never tracked", block, frame_id);
                    return Err(Error::Internal(format!(
                        "block {} in frame {} was never tracked",
                        block, frame_id
                    )));
                }
            }
        }
        if let Some(frame_id) = self.search(&tracked, now, true) {
            return Ok(Some(frame_id));
        }
        let victim = self.search(&tracked, now, false);
        if let Some(frame_id) = victim {
            warn!(
                "{} all {} candidates are inside their correlated period, evicting frame {}",
                now,
                tracked.len(),
                frame_id
            );
        }
        Ok(victim)
    }

    fn history(&self, block: &BlockId) -> Option<&BlockHistory> {
        self.histories.get(block)
    }

    fn size(&self) -> usize {
        self.histories.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PERIOD: Timestamp = 10;

    fn block(n: u64) -> BlockId {
        BlockId::new("test.tbl", n)
    }

    fn candidates(blocks: &[u64]) -> Vec<(FrameId, BlockId)> {
        blocks.iter().enumerate().map(|(i, &n)| (i, block(n))).collect()
    }

    #[test]
    fn test_victim_is_oldest_single_reference() -> Result<()> {
        let mut r = LRUKReplacer::new(2, PERIOD, 0);
        r.admit(&block(0), 100);
        r.admit(&block(1), 200);
        r.admit(&block(2), 300);

        assert_eq!(Some(0), r.victim(&candidates(&[0, 1, 2]), 400)?);
        // block 0 is not a candidate, e.g. because it is pinned
        assert_eq!(Some(7), r.victim(&[(7, block(1)), (9, block(2))], 400)?);
        Ok(())
    }

    #[test]
    fn test_victim_prefers_incomplete_history() -> Result<()> {
        let mut r = LRUKReplacer::new(2, PERIOD, 0);
        r.admit(&block(0), 100);
        r.admit(&block(1), 200);
        // block 0 now has two uncorrelated references, block 1 only one
        r.record_access(&block(0), 250)?;

        assert_eq!(Some(1), r.victim(&candidates(&[0, 1]), 400)?);
        Ok(())
    }

    #[test]
    fn test_victim_by_kth_reference() -> Result<()> {
        let mut r = LRUKReplacer::new(2, PERIOD, 0);
        r.admit(&block(0), 100);
        r.admit(&block(1), 150);
        r.record_access(&block(1), 300)?;
        r.record_access(&block(0), 310)?;

        // both have full histories, block 0's second reference is older
        assert_eq!(&[100, 310], r.history(&block(0)).unwrap().history.slots());
        assert_eq!(&[150, 300], r.history(&block(1)).unwrap().history.slots());
        assert_eq!(Some(0), r.victim(&candidates(&[0, 1]), 400)?);
        Ok(())
    }

    #[test]
    fn test_victim_skips_bursts() -> Result<()> {
        let mut r = LRUKReplacer::new(2, PERIOD, 0);
        r.admit(&block(0), 392);
        r.admit(&block(1), 100);
        r.record_access(&block(1), 300)?;

        // block 0 has the shallower history but its burst is still running
        assert_eq!(&[0, 392], r.history(&block(0)).unwrap().history.slots());
        assert_eq!(&[100, 300], r.history(&block(1)).unwrap().history.slots());
        assert_eq!(Some(1), r.victim(&candidates(&[0, 1]), 400)?);

        // everyone is in a burst, fall back to the plain order
        r.record_access(&block(1), 395)?;
        assert_eq!(Some(0), r.victim(&candidates(&[0, 1]), 400)?);
        Ok(())
    }

    #[test]
    fn test_victim_ties_go_to_first_frame() -> Result<()> {
        let mut r = LRUKReplacer::new(2, PERIOD, 0);
        r.admit(&block(0), 100);
        r.admit(&block(1), 100);
        assert_eq!(Some(0), r.victim(&candidates(&[0, 1]), 400)?);
        assert_eq!(Some(0), r.victim(&[(0, block(1)), (1, block(0))], 400)?);
        Ok(())
    }

    #[test]
    fn test_victim_without_candidates() -> Result<()> {
        let r = LRUKReplacer::new(2, PERIOD, 0);
        assert_eq!(None, r.victim(&[], 400)?);
        Ok(())
    }

    #[test]
    fn test_untracked_candidate_is_an_error() {
        let mut r = LRUKReplacer::new(2, PERIOD, 0);
        r.admit(&block(0), 100);
        assert!(matches!(r.victim(&candidates(&[0, 1]), 400), Err(Error::Internal(_))));
        assert!(matches!(r.record_access(&block(5), 400), Err(Error::Internal(_))));
    }

    #[test]
    fn test_history_survives_eviction() -> Result<()> {
        let mut r = LRUKReplacer::new(2, PERIOD, 0);
        r.admit(&block(0), 2);
        r.evict(&block(0));
        assert_eq!(1, r.size());
        r.admit(&block(0), 45);
        assert_eq!(&[2, 45], r.history(&block(0)).unwrap().history.slots());
        Ok(())
    }

    #[test]
    fn test_history_limit() {
        let mut r = LRUKReplacer::new(2, PERIOD, 3);
        r.admit(&block(0), 100);
        r.admit(&block(1), 200);
        r.admit(&block(2), 300);
        r.evict(&block(1));
        r.evict(&block(0));

        // block 0 is the least recently referenced non-resident history
        r.admit(&block(3), 400);
        assert_eq!(3, r.size());
        assert!(r.history(&block(0)).is_none());
        assert!(r.history(&block(1)).is_some());

        // only resident blocks left to drop, the table grows instead
        r.admit(&block(1), 500);
        r.admit(&block(4), 600);
        assert_eq!(4, r.size());
    }
}
