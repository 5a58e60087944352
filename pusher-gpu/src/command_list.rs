// SPDX-FileCopyrightText: 2025 pusher contributors
// SPDX-License-Identifier: GPL-3.0-or-later

//! Command lists and their segment descriptors.
//!
//! ## GPFIFO Entry Format (64 bits)
//!
//! | Bits    | Field              |
//! |---------|--------------------|
//! | 39:0    | Address            |
//! | 40      | Unused             |
//! | 41      | Non-main buffer    |
//! | 62:42   | Length (in words)  |
//! | 63      | Sync               |
//!
//! ## Capture File Format
//!
//! A sequence of little-endian records, one per command list:
//! `[u32 entry_count][entry_count x u64 GPFIFO entry]`.

use std::io::{self, BufRead};

use byteorder::{LittleEndian, ReadBytesExt};
use pusher_common::types::{words_to_bytes, GPUVAddr};
use thiserror::Error;

/// One segment of a command list: a run of command words in GPU memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandListHeader {
    pub addr: GPUVAddr,
    /// Length in 32-bit words.
    pub size: u32,
    /// Segment does not belong to the main pushbuffer.
    pub is_non_main: bool,
}

impl CommandListHeader {
    pub const fn new(addr: GPUVAddr, size: u32, is_non_main: bool) -> Self {
        Self {
            addr,
            size,
            is_non_main,
        }
    }

    /// Decode a raw 64-bit GPFIFO entry.
    pub const fn from_raw(raw: u64) -> Self {
        Self {
            addr: raw & 0xFF_FFFF_FFFF,
            is_non_main: (raw >> 41) & 1 != 0,
            size: ((raw >> 42) & 0x1F_FFFF) as u32,
        }
    }

    /// First address past the end of the segment.
    pub const fn end(&self) -> GPUVAddr {
        self.addr + words_to_bytes(self.size)
    }
}

/// One guest submission.
pub type CommandList = Vec<CommandListHeader>;

/// Errors from reading a command-list capture.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("command list {index} truncated: expected {expected} entries, found {found}")]
    Truncated {
        index: usize,
        expected: u32,
        found: u32,
    },
    #[error("command list {index} has a truncated entry count")]
    TruncatedCount { index: usize },
    #[error("command list {index} has no entries")]
    EmptyList { index: usize },
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Read every command list from a capture stream.
///
/// A record with an entry count of zero is rejected, since the pusher only
/// consumes non-empty lists.
pub fn read_command_lists<R: BufRead>(mut reader: R) -> Result<Vec<CommandList>, CaptureError> {
    let mut lists = Vec::new();

    while !reader.fill_buf()?.is_empty() {
        let index = lists.len();
        let expected = match reader.read_u32::<LittleEndian>() {
            Ok(count) => count,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                return Err(CaptureError::TruncatedCount { index });
            }
            Err(e) => return Err(e.into()),
        };
        if expected == 0 {
            return Err(CaptureError::EmptyList { index });
        }

        let mut list = CommandList::with_capacity(expected.min(1024) as usize);
        for found in 0..expected {
            let raw = match reader.read_u64::<LittleEndian>() {
                Ok(raw) => raw,
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    return Err(CaptureError::Truncated {
                        index,
                        expected,
                        found,
                    });
                }
                Err(e) => return Err(e.into()),
            };
            list.push(CommandListHeader::from_raw(raw));
        }
        lists.push(list);
    }

    log::debug!("capture: read {} command lists", lists.len());
    Ok(lists)
}
