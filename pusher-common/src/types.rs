// SPDX-FileCopyrightText: 2025 pusher contributors
// SPDX-License-Identifier: GPL-3.0-or-later

/// Virtual address in the GPU address space.
pub type GPUVAddr = u64;

/// Guest physical (CPU-side) address backing a GPU page.
pub type CpuAddr = u64;

/// Size of one pushbuffer command word in bytes.
pub const COMMAND_WORD_SIZE: u64 = 4;

/// GPU page size (4 KiB).
pub const GPU_PAGE_SIZE: u64 = 0x1000;

/// Page shift (log2 of GPU_PAGE_SIZE).
pub const GPU_PAGE_SHIFT: u32 = 12;

/// Page mask for offset extraction.
pub const GPU_PAGE_MASK: u64 = GPU_PAGE_SIZE - 1;

/// Align a value up to the given alignment.
#[inline]
pub const fn align_up(value: u64, alignment: u64) -> u64 {
    let mask = alignment - 1;
    (value + mask) & !mask
}

/// True when `addr` starts a GPU page.
#[inline]
pub const fn is_page_aligned(addr: u64) -> bool {
    addr & GPU_PAGE_MASK == 0
}

/// Byte length of `words` command words.
#[inline]
pub const fn words_to_bytes(words: u32) -> u64 {
    words as u64 * COMMAND_WORD_SIZE
}
