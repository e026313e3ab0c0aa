use anyhow::Result;
use log::debug;

use crate::disk::Disk;
use crate::paging::{FrameId, PageId, PageTable, Protection, ReplacementPolicy};

pub const PAGE_SIZE: usize = 4096;

/// One physical page slot. Shadows the page table: whatever page the
/// table maps into this frame is recorded here with the same protection.
pub struct Frame {
    pub resident_page: Option<PageId>,
    pub protection: Protection,
    pub fill_stamp: u64,
    pub referenced: bool,
}
impl Frame {
    pub fn new() -> Self {
        Self {
            resident_page: None,
            protection: Protection::None,
            fill_stamp: 0,
            referenced: false,
        }
    }

    pub fn is_free(&self) -> bool {
        self.resident_page.is_none()
    }

    pub fn is_dirty(&self) -> bool {
        self.protection == Protection::ReadWrite
    }
}

pub struct FrameTable {
    pub entries: Vec<Frame>,
}
impl FrameTable {
    pub fn new(frame_count: usize) -> Self {
        let mut entries = Vec::with_capacity(frame_count);
        for _ in 0..frame_count {
            entries.push(Frame::new());
        }
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Lowest-indexed free frame, if any. Checked before any policy runs,
    /// so compulsory misses never trigger eviction.
    pub fn find_free(&self) -> Option<FrameId> {
        self.entries
            .iter()
            .position(|frame| frame.is_free())
            .map(FrameId)
    }

    /// Occupies `frame` with a freshly fetched page: read-only, stamped,
    /// reference bit cleared.
    pub fn install(&mut self, frame: FrameId, page: PageId, stamp: u64) {
        let entry = &mut self.entries[frame.0];
        entry.resident_page = Some(page);
        entry.protection = Protection::ReadOnly;
        entry.fill_stamp = stamp;
        entry.referenced = false;
    }

    pub fn set_protection(&mut self, frame: FrameId, protection: Protection) {
        let entry = &mut self.entries[frame.0];
        assert!(
            !entry.is_free() && protection != Protection::None,
            "protection changes only apply to occupied frames"
        );
        entry.protection = protection;
    }

    pub fn mark_referenced(&mut self, frame: FrameId) {
        self.entries[frame.0].referenced = true;
    }

    pub fn clear(&mut self, frame: FrameId) {
        self.entries[frame.0] = Frame::new();
    }
}

/// Frame-indexed byte storage backing the resident pages.
pub struct PhysicalMemory {
    data: Vec<u8>,
}
impl PhysicalMemory {
    pub fn new(frame_count: usize) -> Self {
        Self {
            data: vec![0; frame_count * PAGE_SIZE],
        }
    }

    pub fn frame(&self, frame: FrameId) -> &[u8] {
        &self.data[frame.0 * PAGE_SIZE..][..PAGE_SIZE]
    }

    pub fn frame_mut(&mut self, frame: FrameId) -> &mut [u8] {
        &mut self.data[frame.0 * PAGE_SIZE..][..PAGE_SIZE]
    }

    pub fn read(&self, frame: FrameId, offset: usize) -> u8 {
        self.frame(frame)[offset]
    }

    pub fn write(&mut self, frame: FrameId, offset: usize, value: u8) {
        self.frame_mut(frame)[offset] = value;
    }
}

pub struct MemoryManager<P: ReplacementPolicy> {
    pub frame_table: FrameTable,
    pub physmem: PhysicalMemory,
    policy: P,
    fill_counter: u64,
    pub stats: MemoryStats,
}
impl<P: ReplacementPolicy> MemoryManager<P> {
    pub fn new(frame_count: usize, policy: P) -> Self {
        Self {
            frame_table: FrameTable::new(frame_count),
            physmem: PhysicalMemory::new(frame_count),
            policy,
            fill_counter: 0,
            stats: MemoryStats::new(),
        }
    }

    /// Services one fault for `page`: either widens a read-only mapping to
    /// read-write, or fetches the page into a free or victim frame.
    pub fn handle_page_fault(
        &mut self,
        page: PageId,
        page_table: &mut PageTable,
        disk: &mut Disk,
    ) -> Result<()> {
        self.stats.page_faults += 1;

        let entry = page_table.get_entry(page);
        if entry.protection == Protection::ReadOnly {
            // Resident page hit by a write: widen the permission in place.
            let frame = entry.frame.expect("read-only page must be resident");
            page_table.set_entry(page, frame, Protection::ReadWrite);
            self.frame_table.set_protection(frame, Protection::ReadWrite);
            self.frame_table.mark_referenced(frame);
            debug!("page {} upgraded to read-write in frame {}", page.0, frame.0);
            return Ok(());
        }

        let frame = match self.frame_table.find_free() {
            Some(frame) => frame,
            None => {
                let victim = self.policy.select_victim(&mut self.frame_table);
                assert!(
                    !self.frame_table.entries[victim.0].is_free(),
                    "replacement policy selected an unoccupied frame"
                );
                victim
            }
        };

        let (old_page, dirty) = {
            let slot = &self.frame_table.entries[frame.0];
            (slot.resident_page, slot.is_dirty())
        };

        if dirty {
            let old = old_page.expect("dirty frame must hold a page");
            disk.write_block(old, self.physmem.frame(frame))?;
            self.stats.disk_writes += 1;
            debug!("frame {} written back to block {}", frame.0, old.0);
        }

        // The old occupant must be unmapped before the new page lands, so
        // no two pages ever claim the frame at once.
        if let Some(old) = old_page {
            page_table.clear_entry(old);
            debug!("page {} evicted from frame {}", old.0, frame.0);
        }

        disk.read_block(page, self.physmem.frame_mut(frame))?;
        self.stats.disk_reads += 1;

        // Pages always come in read-only; a later write faults again and
        // takes the upgrade path above.
        page_table.set_entry(page, frame, Protection::ReadOnly);
        let stamp = self.fill_counter;
        self.fill_counter += 1;
        self.frame_table.install(frame, page, stamp);
        debug!("page {} fetched into frame {}", page.0, frame.0);

        Ok(())
    }
}

pub struct MemoryStats {
    pub page_faults: u64,
    pub disk_reads: u64,
    pub disk_writes: u64,
}
impl MemoryStats {
    fn new() -> Self {
        Self {
            page_faults: 0,
            disk_reads: 0,
            disk_writes: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_free_returns_lowest_index() {
        let mut frames = FrameTable::new(3);
        assert_eq!(frames.find_free(), Some(FrameId(0)));
        frames.install(FrameId(0), PageId(0), 0);
        assert_eq!(frames.find_free(), Some(FrameId(1)));
        frames.install(FrameId(1), PageId(1), 1);
        frames.install(FrameId(2), PageId(2), 2);
        assert_eq!(frames.find_free(), None);
    }

    #[test]
    fn clear_restores_the_empty_invariant() {
        let mut frames = FrameTable::new(1);
        frames.install(FrameId(0), PageId(7), 0);
        frames.set_protection(FrameId(0), Protection::ReadWrite);
        assert!(frames.entries[0].is_dirty());
        frames.clear(FrameId(0));
        assert!(frames.entries[0].is_free());
        assert_eq!(frames.entries[0].protection, Protection::None);
    }

    #[test]
    fn install_resets_clock_state() {
        let mut frames = FrameTable::new(1);
        frames.install(FrameId(0), PageId(0), 0);
        frames.mark_referenced(FrameId(0));
        frames.install(FrameId(0), PageId(1), 1);
        assert!(!frames.entries[0].referenced);
        assert_eq!(frames.entries[0].protection, Protection::ReadOnly);
        assert_eq!(frames.entries[0].fill_stamp, 1);
    }

    #[test]
    fn physmem_round_trips_frame_bytes() {
        let mut physmem = PhysicalMemory::new(2);
        physmem.write(FrameId(1), 15, 0xAB);
        assert_eq!(physmem.read(FrameId(1), 15), 0xAB);
        assert_eq!(physmem.frame(FrameId(1))[15], 0xAB);
        assert_eq!(physmem.read(FrameId(0), 15), 0);
    }
}
