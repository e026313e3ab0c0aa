use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use anyhow::{Context, Result};

use crate::memory::PAGE_SIZE;
use crate::paging::PageId;

/// File-backed block store, one page-sized block per page number.
/// Fresh blocks read as zeros.
pub struct Disk {
    file: File,
    block_count: usize,
}
impl Disk {
    pub fn create(path: &Path, block_count: usize) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .with_context(|| format!("couldn't create virtual disk at {}", path.display()))?;
        file.set_len((block_count * PAGE_SIZE) as u64)
            .with_context(|| format!("couldn't size virtual disk to {} blocks", block_count))?;
        Ok(Self { file, block_count })
    }

    pub fn block_count(&self) -> usize {
        self.block_count
    }

    pub fn read_block(&mut self, block: PageId, buf: &mut [u8]) -> Result<()> {
        assert_eq!(buf.len(), PAGE_SIZE, "block transfers move one whole page");
        assert!(block.0 < self.block_count, "block {} out of range", block.0);
        self.file.seek(SeekFrom::Start((block.0 * PAGE_SIZE) as u64))?;
        self.file
            .read_exact(buf)
            .with_context(|| format!("couldn't read disk block {}", block.0))
    }

    pub fn write_block(&mut self, block: PageId, buf: &[u8]) -> Result<()> {
        assert_eq!(buf.len(), PAGE_SIZE, "block transfers move one whole page");
        assert!(block.0 < self.block_count, "block {} out of range", block.0);
        self.file.seek(SeekFrom::Start((block.0 * PAGE_SIZE) as u64))?;
        self.file
            .write_all(buf)
            .with_context(|| format!("couldn't write disk block {}", block.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_disk(name: &str, block_count: usize) -> Disk {
        let path =
            std::env::temp_dir().join(format!("virtmem-disk-{}-{}", name, std::process::id()));
        Disk::create(&path, block_count).expect("test disk")
    }

    #[test]
    fn fresh_blocks_read_as_zeros() {
        let mut disk = temp_disk("zeros", 2);
        let mut buf = [0xFFu8; PAGE_SIZE];
        disk.read_block(PageId(1), &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 0));
    }

    #[test]
    fn blocks_round_trip() {
        let mut disk = temp_disk("roundtrip", 3);
        let mut block = [0u8; PAGE_SIZE];
        block[0] = 1;
        block[PAGE_SIZE - 1] = 0x7F;
        disk.write_block(PageId(2), &block).unwrap();
        let mut back = [0u8; PAGE_SIZE];
        disk.read_block(PageId(2), &mut back).unwrap();
        assert_eq!(back[0], 1);
        assert_eq!(back[PAGE_SIZE - 1], 0x7F);
        assert_eq!(disk.block_count(), 3);
    }

    #[test]
    fn create_rejects_unwritable_path() {
        assert!(Disk::create(Path::new("/nonexistent-dir/disk"), 1).is_err());
    }
}
