// SPDX-FileCopyrightText: 2025 pusher contributors
// SPDX-License-Identifier: GPL-3.0-or-later

//! GPU virtual address space and pushbuffer memory reads.
//!
//! Maps GPU virtual addresses (40-bit, 1 TiB) to guest physical (CPU) addresses
//! using a 2-level page table with 4 KB pages.
//!
//! Layout: `[L0: 14 bits][L1: 14 bits][Offset: 12 bits]` = 40 bits total.

use pusher_common::types::{CpuAddr, GPUVAddr, GPU_PAGE_MASK, GPU_PAGE_SHIFT, GPU_PAGE_SIZE};

const L1_BITS: u32 = 14;
const L0_BITS: u32 = 14;
const L1_SIZE: usize = 1 << L1_BITS;

/// Sentinel for unmapped pages.
const INVALID_ENTRY: u64 = u64::MAX;

/// Total GPU address space: 40 bits = 1 TiB.
pub const GPU_VA_BITS: u32 = L0_BITS + L1_BITS + GPU_PAGE_SHIFT;
pub const GPU_VA_SIZE: u64 = 1 << GPU_VA_BITS;

/// Source of pushbuffer bytes.
///
/// Reads are unchecked: the implementation decides what an invalid or
/// concurrently written range yields. The pusher never validates it.
pub trait MemoryRead {
    fn read_block_unsafe(&self, gpu_va: GPUVAddr, dst: &mut [u8]);
}

impl<F> MemoryRead for F
where
    F: Fn(GPUVAddr, &mut [u8]),
{
    fn read_block_unsafe(&self, gpu_va: GPUVAddr, dst: &mut [u8]) {
        self(gpu_va, dst)
    }
}

/// GPU virtual memory manager with a 2-level page table.
pub struct GpuMemoryManager {
    /// L0 table: each entry is an optional L1 page table.
    page_table: Vec<Option<Box<[u64; L1_SIZE]>>>,
}

impl GpuMemoryManager {
    pub fn new() -> Self {
        let l0_size = 1 << L0_BITS;
        let mut page_table = Vec::with_capacity(l0_size);
        page_table.resize_with(l0_size, || None);
        Self { page_table }
    }

    /// Map a contiguous range of GPU VA to CPU addresses.
    pub fn map(&mut self, gpu_va: GPUVAddr, cpu_addr: CpuAddr, size: u64) {
        let mut offset = 0u64;
        while offset < size {
            self.set_entry(gpu_va + offset, Some(cpu_addr + offset));
            offset += GPU_PAGE_SIZE;
        }
        log::trace!(
            "gpu_mm: map GPU 0x{:X}..0x{:X} -> CPU 0x{:X}",
            gpu_va,
            gpu_va + size,
            cpu_addr
        );
    }

    /// Unmap a contiguous GPU VA range.
    pub fn unmap(&mut self, gpu_va: GPUVAddr, size: u64) {
        let mut offset = 0u64;
        while offset < size {
            self.set_entry(gpu_va + offset, None);
            offset += GPU_PAGE_SIZE;
        }
        log::trace!("gpu_mm: unmap GPU 0x{:X}..0x{:X}", gpu_va, gpu_va + size);
    }

    /// Translate a GPU VA to a CPU address.
    /// Returns `None` if the page is not mapped.
    pub fn translate(&self, gpu_va: GPUVAddr) -> Option<CpuAddr> {
        let entry = self.get_entry(gpu_va);
        if entry == INVALID_ENTRY {
            None
        } else {
            Some(entry + (gpu_va & GPU_PAGE_MASK))
        }
    }

    /// Read bytes from GPU VA space using a CPU memory reader.
    /// Unmapped pages read as zeros.
    pub fn read(
        &self,
        gpu_va: GPUVAddr,
        dst: &mut [u8],
        read_cpu_mem: &dyn Fn(CpuAddr, &mut [u8]),
    ) {
        let mut offset = 0usize;
        while offset < dst.len() {
            let va = gpu_va + offset as u64;
            let page_off = (va & GPU_PAGE_MASK) as usize;
            let chunk_size = std::cmp::min(dst.len() - offset, GPU_PAGE_SIZE as usize - page_off);
            let chunk = &mut dst[offset..offset + chunk_size];

            match self.translate(va) {
                Some(cpu_addr) => read_cpu_mem(cpu_addr, chunk),
                None => chunk.fill(0),
            }
            offset += chunk_size;
        }
    }

    // ── Internal helpers ─────────────────────────────────────────────────

    fn l0_index(gpu_va: GPUVAddr) -> usize {
        ((gpu_va >> (L1_BITS + GPU_PAGE_SHIFT)) & ((1 << L0_BITS) - 1)) as usize
    }

    fn l1_index(gpu_va: GPUVAddr) -> usize {
        ((gpu_va >> GPU_PAGE_SHIFT) & ((1 << L1_BITS) - 1)) as usize
    }

    fn set_entry(&mut self, gpu_va: GPUVAddr, cpu_page_addr: Option<CpuAddr>) {
        let l0 = Self::l0_index(gpu_va);
        let l1 = Self::l1_index(gpu_va);

        let slot = &mut self.page_table[l0];
        if slot.is_none() && cpu_page_addr.is_none() {
            // No L1 table and we're unmapping: nothing to do.
            return;
        }
        let table = slot.get_or_insert_with(|| Box::new([INVALID_ENTRY; L1_SIZE]));

        table[l1] = match cpu_page_addr {
            Some(addr) => addr & !GPU_PAGE_MASK,
            None => INVALID_ENTRY,
        };
    }

    fn get_entry(&self, gpu_va: GPUVAddr) -> u64 {
        match &self.page_table[Self::l0_index(gpu_va)] {
            Some(table) => table[Self::l1_index(gpu_va)],
            None => INVALID_ENTRY,
        }
    }
}

impl Default for GpuMemoryManager {
    fn default() -> Self {
        Self::new()
    }
}

/// A [`GpuMemoryManager`] paired with the CPU-side reader backing it.
pub struct GuestMemoryView<'a> {
    memory_manager: &'a GpuMemoryManager,
    read_cpu_mem: &'a dyn Fn(CpuAddr, &mut [u8]),
}

impl<'a> GuestMemoryView<'a> {
    pub fn new(
        memory_manager: &'a GpuMemoryManager,
        read_cpu_mem: &'a dyn Fn(CpuAddr, &mut [u8]),
    ) -> Self {
        Self {
            memory_manager,
            read_cpu_mem,
        }
    }
}

impl MemoryRead for GuestMemoryView<'_> {
    fn read_block_unsafe(&self, gpu_va: GPUVAddr, dst: &mut [u8]) {
        self.memory_manager.read(gpu_va, dst, self.read_cpu_mem);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_and_translate() {
        let mut mm = GpuMemoryManager::new();
        mm.map(0x1000, 0xDEAD_0000, 0x2000);

        assert_eq!(mm.translate(0x1000), Some(0xDEAD_0000));
        assert_eq!(mm.translate(0x1500), Some(0xDEAD_0500));
        assert_eq!(mm.translate(0x2FFF), Some(0xDEAD_1FFF));
        assert_eq!(mm.translate(0x3000), None);
    }

    #[test]
    fn test_unmap() {
        let mut mm = GpuMemoryManager::new();
        mm.map(0x1000, 0xBEEF_0000, 0x1000);
        mm.unmap(0x1000, 0x1000);
        assert_eq!(mm.translate(0x1000), None);

        // Unmapping a range that never had an L1 table is harmless.
        mm.unmap(0x80_0000_0000 - GPU_PAGE_SIZE, GPU_PAGE_SIZE);
    }

    #[test]
    fn test_high_address_uses_separate_l0() {
        let mut mm = GpuMemoryManager::new();
        let va = GPU_VA_SIZE - GPU_PAGE_SIZE;
        mm.map(va, 0x1234_0000, GPU_PAGE_SIZE);
        assert_eq!(mm.translate(va + 4), Some(0x1234_0004));
        assert_eq!(mm.translate(0), None);
    }

    #[test]
    fn test_read_cross_page() {
        let mut mm = GpuMemoryManager::new();
        mm.map(0x1000, 0xA000_0000, 0x1000);
        mm.map(0x2000, 0xB000_0000, 0x1000);

        let mut buf = [0u8; 8];
        mm.read(0x1FFC, &mut buf, &|addr, dst| {
            // Fill with the top nibble of the CPU address.
            dst.fill((addr >> 28) as u8);
        });
        assert_eq!(buf, [0xA, 0xA, 0xA, 0xA, 0xB, 0xB, 0xB, 0xB]);
    }

    #[test]
    fn test_unmapped_reads_zero() {
        let mut mm = GpuMemoryManager::new();
        mm.map(0x1000, 0, 0x1000);

        let mut buf = [0xFFu8; 8];
        mm.read(0x1FFC, &mut buf, &|_addr, dst| dst.fill(0x11));
        assert_eq!(buf, [0x11, 0x11, 0x11, 0x11, 0, 0, 0, 0]);
    }

    #[test]
    fn test_guest_memory_view() {
        let mut mm = GpuMemoryManager::new();
        mm.map(0x4000, 0x1000, 0x1000);
        let backing: Vec<u8> = (0..0x2000).map(|i| i as u8).collect();
        let read_cpu = |addr: u64, dst: &mut [u8]| {
            let start = addr as usize;
            dst.copy_from_slice(&backing[start..start + dst.len()]);
        };

        let view = GuestMemoryView::new(&mm, &read_cpu);
        let mut buf = [0u8; 4];
        view.read_block_unsafe(0x4002, &mut buf);
        assert_eq!(buf, [0x02, 0x03, 0x04, 0x05]);
    }

    #[test]
    fn test_closure_is_memory_read() {
        let mem = |gpu_va: u64, dst: &mut [u8]| dst.fill(gpu_va as u8);
        let mut buf = [0u8; 2];
        mem.read_block_unsafe(0x7, &mut buf);
        assert_eq!(buf, [7, 7]);
    }
}
