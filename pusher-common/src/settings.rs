// SPDX-FileCopyrightText: 2025 pusher contributors
// SPDX-License-Identifier: GPL-3.0-or-later

use crate::types::GPUVAddr;

/// Runtime settings for the pusher, populated from config INI.
#[derive(Debug, Clone)]
pub struct Settings {
    // Pusher
    pub ib_enable: bool,
    pub subindex_policy: SubindexPolicy,

    // Memory
    pub gpu_va_base: GPUVAddr,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ib_enable: true,
            subindex_policy: SubindexPolicy::ResetEachEpisode,
            gpu_va_base: 0x0400_0000,
        }
    }
}

/// What happens to the command-list cursor when a new dispatch episode starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubindexPolicy {
    /// Rewind to the first segment of the front list on every episode.
    /// A list interrupted by power-off is replayed from its start.
    #[default]
    ResetEachEpisode,
    /// Keep the cursor where the previous episode left it.
    Carry,
}

impl SubindexPolicy {
    pub fn from_str_or_default(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "0" | "reset" => Self::ResetEachEpisode,
            "1" | "carry" => Self::Carry,
            _ => Self::ResetEachEpisode,
        }
    }
}

/// Parse a config boolean (`true`/`1`).
pub fn parse_bool(s: &str) -> bool {
    let s = s.trim();
    s == "true" || s == "1"
}

/// Parse an address written either as `0x`-prefixed hex or decimal.
pub fn parse_address(s: &str) -> Option<GPUVAddr> {
    let s = s.trim().replace('_', "");
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => s.parse().ok(),
    }
}
