// SPDX-FileCopyrightText: 2025 pusher contributors
// SPDX-License-Identifier: GPL-3.0-or-later

//! Per-word command state machine.
//!
//! Each pushbuffer word is either the count of a long-form header, an argument
//! of the method run in progress, or the header of a new command. The state
//! survives segment and command-list boundaries.

use crate::command_header::{CommandHeader, SubmissionMode};
use crate::engines::{GpuEngine, MethodCall};

/// Progress through the current command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DmaState {
    pub method: u32,
    pub subchannel: u32,
    /// Arguments still to come for the current method run.
    pub method_count: u32,
    /// The next word is the count of a long-form header.
    pub length_pending: bool,
    pub non_incrementing: bool,
    /// Freeze the method after the first argument of this run.
    increment_once: bool,
}

impl DmaState {
    pub fn new() -> Self {
        Self::default()
    }

    /// No command is in progress; the next word is a header.
    pub fn is_idle(&self) -> bool {
        !self.length_pending && self.method_count == 0
    }

    pub fn increment_once(&self) -> bool {
        self.increment_once
    }

    /// Start a long-form command whose count arrives in the next word.
    pub fn expect_long_count(&mut self, method: u32, subchannel: u32, non_incrementing: bool) {
        self.method = method;
        self.subchannel = subchannel;
        self.method_count = 0;
        self.non_incrementing = non_incrementing;
        self.increment_once = false;
        self.length_pending = true;
    }

    /// Consume one pushbuffer word, forwarding any resulting call to `gpu`.
    pub fn process_word(&mut self, word: u32, gpu: &mut dyn GpuEngine) {
        let header = CommandHeader::new(word);

        if self.length_pending {
            self.length_pending = false;
            self.method_count = header.long_method_count();
        } else if self.method_count != 0 {
            self.call_method(word, gpu);

            if !self.non_incrementing {
                self.method = self.method.wrapping_add(1);
            }
            if self.increment_once {
                self.non_incrementing = true;
            }
            self.method_count -= 1;
        } else {
            match header.mode() {
                SubmissionMode::Increasing => {
                    self.set_state(header);
                    self.non_incrementing = false;
                    self.increment_once = false;
                }
                SubmissionMode::NonIncreasing => {
                    self.set_state(header);
                    self.non_incrementing = true;
                    self.increment_once = false;
                }
                SubmissionMode::Inline => {
                    self.method = header.method();
                    self.subchannel = header.subchannel();
                    self.call_method(header.arg_count(), gpu);
                    self.non_incrementing = true;
                    self.increment_once = false;
                }
                SubmissionMode::IncreaseOnce => {
                    self.set_state(header);
                    self.non_incrementing = false;
                    self.increment_once = true;
                }
            }
        }
    }

    fn set_state(&mut self, header: CommandHeader) {
        self.method = header.method();
        self.subchannel = header.subchannel();
        self.method_count = header.method_count();
    }

    fn call_method(&self, argument: u32, gpu: &mut dyn GpuEngine) {
        gpu.call_method(MethodCall {
            method: self.method,
            argument,
            subchannel: self.subchannel,
            method_count: self.method_count,
        });
    }
}
