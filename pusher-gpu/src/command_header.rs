// SPDX-FileCopyrightText: 2025 pusher contributors
// SPDX-License-Identifier: GPL-3.0-or-later

//! Pushbuffer command header decoding.
//!
//! ## Command Header Format (32 bits)
//!
//! | Bits    | Field                              |
//! |---------|------------------------------------|
//! | 12:0    | Method address                     |
//! | 15:13   | Subchannel                         |
//! | 28:16   | Method count / inline argument     |
//! | 23:0    | Long method count (count word only)|
//! | 31:29   | Submission mode                    |

/// How the words following a header map onto method numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionMode {
    /// Each argument goes to method, method+1, ...
    Increasing,
    /// Every argument goes to the same method.
    NonIncreasing,
    /// The argument is embedded in the header itself.
    Inline,
    /// First argument goes to method, the rest to method+1.
    IncreaseOnce,
}

impl SubmissionMode {
    /// Raw selector value the hardware assigns to each mode.
    pub const fn raw(self) -> u32 {
        match self {
            Self::Increasing => 1,
            Self::NonIncreasing => 3,
            Self::Inline => 4,
            Self::IncreaseOnce => 5,
        }
    }

    /// Map a 3-bit selector onto a mode. The legacy Fermi encodings (0, 2)
    /// alias their modern counterparts; 6 and 7 fold onto the nearest
    /// defined value.
    pub const fn from_raw(v: u32) -> Self {
        match v & 0x7 {
            0 | 1 => Self::Increasing,
            2 | 3 => Self::NonIncreasing,
            4 => Self::Inline,
            _ => Self::IncreaseOnce,
        }
    }
}

/// A single pushbuffer word viewed as a command header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandHeader(u32);

impl CommandHeader {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Encode a header. Each field is masked to its bit width.
    pub const fn build(mode: SubmissionMode, method: u32, subchannel: u32, arg_count: u32) -> Self {
        Self(
            (mode.raw() << 29)
                | ((arg_count & 0x1FFF) << 16)
                | ((subchannel & 0x7) << 13)
                | (method & 0x1FFF),
        )
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Method register address (bits [12:0]).
    pub const fn method(self) -> u32 {
        self.0 & 0x1FFF
    }

    /// Subchannel index (bits [15:13]).
    pub const fn subchannel(self) -> u32 {
        (self.0 >> 13) & 0x7
    }

    /// Method count for Increasing, NonIncreasing and IncreaseOnce (bits [28:16]).
    pub const fn method_count(self) -> u32 {
        (self.0 >> 16) & 0x1FFF
    }

    /// Inline argument for Inline mode (bits [28:16]).
    pub const fn arg_count(self) -> u32 {
        (self.0 >> 16) & 0x1FFF
    }

    /// Count carried by the second word of a long-form header (bits [23:0]).
    pub const fn long_method_count(self) -> u32 {
        self.0 & 0x00FF_FFFF
    }

    /// Submission mode (bits [31:29]).
    pub const fn mode(self) -> SubmissionMode {
        SubmissionMode::from_raw(self.0 >> 29)
    }

    /// Raw mode selector, before folding reserved values.
    pub const fn raw_mode(self) -> u32 {
        self.0 >> 29
    }
}

impl From<u32> for CommandHeader {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}
