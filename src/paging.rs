use rand::Rng;

use crate::memory::FrameTable;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct PageId(pub usize);

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct FrameId(pub usize);

/// Access rights of a mapping. `None` means unmapped; a page (or frame)
/// is dirty exactly when it is `ReadWrite`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Protection {
    None,
    ReadOnly,
    ReadWrite,
}

pub struct PageTable {
    pub entries: Vec<PageTableEntry>,
}
impl PageTable {
    pub fn new(page_count: usize) -> Self {
        let mut entries = Vec::with_capacity(page_count);
        for _ in 0..page_count {
            entries.push(PageTableEntry::new());
        }
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get_entry(&self, page: PageId) -> &PageTableEntry {
        &self.entries[page.0]
    }

    pub fn set_entry(&mut self, page: PageId, frame: FrameId, protection: Protection) {
        let entry = &mut self.entries[page.0];
        entry.frame = Some(frame);
        entry.protection = protection;
    }

    pub fn clear_entry(&mut self, page: PageId) {
        let entry = &mut self.entries[page.0];
        entry.frame = None;
        entry.protection = Protection::None;
    }
}

pub struct PageTableEntry {
    pub frame: Option<FrameId>,
    pub protection: Protection,
}
impl PageTableEntry {
    pub fn new() -> Self {
        Self {
            frame: None,
            protection: Protection::None,
        }
    }
}

/// Picks the frame to reuse when no free frame exists. Only ever called
/// with a fully occupied frame table.
pub trait ReplacementPolicy {
    fn select_victim(&mut self, frame_table: &mut FrameTable) -> FrameId;
}

pub struct Random;
impl ReplacementPolicy for Random {
    fn select_victim(&mut self, frame_table: &mut FrameTable) -> FrameId {
        let mut rng = rand::rng();
        FrameId(rng.random_range(..frame_table.len()))
    }
}

/// Evicts the frame filled longest ago. The fault handler stamps every
/// install with a monotonic counter; the scan keeps the lowest index on
/// equal stamps.
pub struct Fifo;
impl ReplacementPolicy for Fifo {
    fn select_victim(&mut self, frame_table: &mut FrameTable) -> FrameId {
        let mut victim = 0;
        let mut oldest = frame_table.entries[0].fill_stamp;
        for (idx, frame) in frame_table.entries.iter().enumerate().skip(1) {
            if frame.fill_stamp < oldest {
                victim = idx;
                oldest = frame.fill_stamp;
            }
        }
        FrameId(victim)
    }
}

/// Second-chance eviction: a rotating hand that skips (and clears) each
/// referenced frame once, then takes the first unreferenced one.
pub struct Clock {
    hand: usize,
}
impl Clock {
    pub fn new() -> Self {
        Self { hand: 0 }
    }

    fn advance(&mut self, frame_count: usize) {
        self.hand += 1;
        if self.hand == frame_count {
            self.hand = 0;
        }
    }
}
impl ReplacementPolicy for Clock {
    fn select_victim(&mut self, frame_table: &mut FrameTable) -> FrameId {
        let frame_count = frame_table.len();
        // The first sweep may only clear bits; the second must find a victim.
        for _ in 0..2 * frame_count {
            let frame = &mut frame_table.entries[self.hand];
            assert!(
                frame.resident_page.is_some(),
                "clock hand visited an unoccupied frame"
            );
            if frame.referenced {
                frame.referenced = false;
                self.advance(frame_count);
            } else {
                let victim = FrameId(self.hand);
                self.advance(frame_count);
                return victim;
            }
        }
        unreachable!("no clock victim after two full sweeps");
    }
}
