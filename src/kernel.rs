use anyhow::Result;

use crate::disk::Disk;
use crate::hardware::mmu::{Mmu, Operation, TranslationResult};
use crate::memory::{MemoryManager, PAGE_SIZE};
use crate::paging::{FrameId, PageId, PageTable, ReplacementPolicy};

/// Ties translation, fault handling and physical storage together and
/// exposes byte-granularity access over the virtual space.
pub struct Kernel<P: ReplacementPolicy> {
    pub mm: MemoryManager<P>,
    pub page_table: PageTable,
    pub disk: Disk,
    mmu: Mmu,
}
impl<P: ReplacementPolicy> Kernel<P> {
    pub fn new(page_count: usize, frame_count: usize, policy: P, disk: Disk) -> Self {
        Self {
            mm: MemoryManager::new(frame_count, policy),
            page_table: PageTable::new(page_count),
            disk,
            mmu: Mmu::new(),
        }
    }

    /// Size of the virtual space in bytes.
    pub fn size(&self) -> usize {
        self.page_table.len() * PAGE_SIZE
    }

    pub fn read_byte(&mut self, addr: usize) -> Result<u8> {
        let (page, offset) = self.split(addr);
        let frame = self.access(page, Operation::Read)?;
        Ok(self.mm.physmem.read(frame, offset))
    }

    pub fn write_byte(&mut self, addr: usize, value: u8) -> Result<()> {
        let (page, offset) = self.split(addr);
        let frame = self.access(page, Operation::Write)?;
        self.mm.physmem.write(frame, offset, value);
        Ok(())
    }

    fn split(&self, addr: usize) -> (PageId, usize) {
        assert!(addr < self.size(), "virtual address {} out of range", addr);
        (PageId(addr / PAGE_SIZE), addr % PAGE_SIZE)
    }

    // Faults are serviced synchronously and the access retried. An
    // unmapped write converges in two rounds: the page comes in
    // read-only, then the retried write takes the upgrade path.
    fn access(&mut self, page: PageId, operation: Operation) -> Result<FrameId> {
        for _ in 0..3 {
            match self.mmu.translate(&self.page_table, page, operation) {
                TranslationResult::Success(frame) => return Ok(frame),
                TranslationResult::PageFault => {
                    self.mm
                        .handle_page_fault(page, &mut self.page_table, &mut self.disk)?;
                }
            }
        }
        panic!("page {} still faulting after service", page.0);
    }
}
