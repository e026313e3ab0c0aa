use anyhow::Result;
use log::info;
use rand::Rng;

use crate::kernel::Kernel;
use crate::memory::PAGE_SIZE;
use crate::paging::ReplacementPolicy;

const WORKING_SET_HIT_RATE: f64 = 0.9;
const READ_RATE: f64 = 0.8;

/// Sequential sweep: write every byte, then read the whole space back.
/// Every page is dirtied, so evictions under pressure all write back.
pub fn alpha<P: ReplacementPolicy>(kernel: &mut Kernel<P>) -> Result<u32> {
    let size = kernel.size();
    info!("alpha: sequential sweep over {} bytes", size);

    for addr in 0..size {
        kernel.write_byte(addr, addr as u8)?;
    }
    let mut checksum = 0u32;
    for addr in 0..size {
        checksum = checksum.wrapping_add(kernel.read_byte(addr)? as u32);
    }
    Ok(checksum)
}

/// Uniform random accesses, one per virtual byte, mostly reads.
pub fn beta<P: ReplacementPolicy>(kernel: &mut Kernel<P>) -> Result<u32> {
    let size = kernel.size();
    info!("beta: {} random accesses", size);

    let mut rng = rand::rng();
    let mut checksum = 0u32;
    for step in 0..size {
        let addr = rng.random_range(..size);
        if rng.random_bool(READ_RATE) {
            checksum = checksum.wrapping_add(kernel.read_byte(addr)? as u32);
        } else {
            kernel.write_byte(addr, step as u8)?;
        }
    }
    Ok(checksum)
}

/// Working-set accesses: most references stay inside a hot window that is
/// re-randomized at a fixed period.
pub fn gamma<P: ReplacementPolicy>(kernel: &mut Kernel<P>) -> Result<u32> {
    let size = kernel.size();
    let window = PAGE_SIZE.max(size / 8);
    let period = (size / 4).max(1);
    info!("gamma: working set of {} bytes over {} bytes", window, size);

    let mut rng = rand::rng();
    let mut window_start = 0;
    let mut checksum = 0u32;
    for step in 0..size {
        if step % period == 0 {
            window_start = rng.random_range(..size);
        }
        let addr = if rng.random_bool(WORKING_SET_HIT_RATE) {
            (window_start + rng.random_range(..window)) % size
        } else {
            rng.random_range(..size)
        };
        if rng.random_bool(READ_RATE) {
            checksum = checksum.wrapping_add(kernel.read_byte(addr)? as u32);
        } else {
            kernel.write_byte(addr, step as u8)?;
        }
    }
    Ok(checksum)
}

/// Strided sweep: a stride coprime to the space size, so every byte is
/// touched exactly once in a cache-hostile order. Every 16th touch writes.
pub fn delta<P: ReplacementPolicy>(kernel: &mut Kernel<P>) -> Result<u32> {
    let size = kernel.size();
    let stride = sweep_stride(size);
    info!("delta: strided sweep over {} bytes, stride {}", size, stride);

    let mut addr = 0;
    let mut checksum = 0u32;
    for step in 0..size {
        if step % 16 == 0 {
            kernel.write_byte(addr, step as u8)?;
        } else {
            checksum = checksum.wrapping_add(kernel.read_byte(addr)? as u32);
        }
        addr = (addr + stride) % size;
    }
    Ok(checksum)
}

// Smallest odd stride past one page that is coprime to `size`. Coprimality
// makes the additive walk a full cycle: it visits every byte before any
// repeat. A fixed stride would silently shrink the cycle whenever the page
// count shared a factor with it.
fn sweep_stride(size: usize) -> usize {
    let mut stride = PAGE_SIZE + 1;
    while gcd(stride, size) != 1 {
        stride += 2;
    }
    stride
}

fn gcd(mut a: usize, mut b: usize) -> usize {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::Disk;
    use crate::paging::Fifo;

    fn small_kernel(name: &str) -> Kernel<Fifo> {
        let path =
            std::env::temp_dir().join(format!("virtmem-program-{}-{}", name, std::process::id()));
        let disk = Disk::create(&path, 4).expect("test disk");
        Kernel::new(4, 2, Fifo, disk)
    }

    #[test]
    fn alpha_touches_every_page() {
        let mut kernel = small_kernel("alpha");
        alpha(&mut kernel).unwrap();
        // Four compulsory misses at minimum, and the read-back pass must
        // re-fetch evicted dirty pages.
        assert!(kernel.mm.stats.disk_reads >= 4);
        assert!(kernel.mm.stats.disk_writes >= 1);
    }

    #[test]
    fn alpha_checksum_matches_written_data() {
        let mut kernel = small_kernel("alpha-sum");
        let checksum = alpha(&mut kernel).unwrap();
        let expected: u32 = (0..kernel.size()).map(|addr| (addr as u8) as u32).sum();
        assert_eq!(checksum, expected);
    }

    #[test]
    fn delta_runs_under_memory_pressure() {
        let mut kernel = small_kernel("delta");
        delta(&mut kernel).unwrap();
        assert!(kernel.mm.stats.page_faults >= 4);
    }

    #[test]
    fn sweep_stride_is_coprime_for_awkward_page_counts() {
        // 17 and 241 divide PAGE_SIZE + 1, the first stride candidate.
        for npages in [1, 2, 16, 17, 34, 241, 482] {
            let size = npages * PAGE_SIZE;
            assert_eq!(gcd(sweep_stride(size), size), 1, "npages={}", npages);
        }
    }

    #[test]
    fn delta_walk_covers_every_byte_when_npages_is_a_multiple_of_17() {
        let size = 17 * PAGE_SIZE;
        let stride = sweep_stride(size);
        let mut touched = vec![false; size];
        let mut addr = 0;
        for _ in 0..size {
            touched[addr] = true;
            addr = (addr + stride) % size;
        }
        assert!(touched.iter().all(|&t| t));
    }
}
