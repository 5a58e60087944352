// SPDX-FileCopyrightText: 2025 pusher contributors
// SPDX-License-Identifier: GPL-3.0-or-later

//! DMA pusher: drains queued command lists into the GPU engines.
//!
//! Each step takes one segment of the front command list, reads its words
//! from GPU memory and runs them through the [`DmaState`] machine. Engine
//! calls happen synchronously and in decode order.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use byteorder::{ByteOrder, LittleEndian};
use pusher_common::settings::SubindexPolicy;
use pusher_common::types::{words_to_bytes, GPUVAddr};

use crate::command_list::CommandList;
use crate::dma_state::DmaState;
use crate::engines::GpuEngine;
use crate::memory_manager::MemoryRead;
use crate::pushbuffer_queue::PushbufferQueue;

/// Whether the emulated system is still running.
pub trait PowerState {
    fn is_powered_on(&self) -> bool;
}

impl PowerState for AtomicBool {
    fn is_powered_on(&self) -> bool {
        self.load(Ordering::Acquire)
    }
}

pub struct DmaPusher {
    queue: Arc<PushbufferQueue>,
    /// Next segment of the front command list.
    dma_pushbuffer_subindex: usize,
    dma_state: DmaState,
    /// Main-buffer get pointer. Nothing reads it besides [`Self::dma_mget`].
    dma_mget: GPUVAddr,
    subindex_policy: SubindexPolicy,
    command_bytes: Vec<u8>,
    command_headers: Vec<u32>,
}

impl DmaPusher {
    pub fn new(queue: Arc<PushbufferQueue>) -> Self {
        Self {
            queue,
            dma_pushbuffer_subindex: 0,
            dma_state: DmaState::new(),
            dma_mget: 0,
            subindex_policy: SubindexPolicy::default(),
            command_bytes: Vec::new(),
            command_headers: Vec::new(),
        }
    }

    pub fn with_subindex_policy(mut self, policy: SubindexPolicy) -> Self {
        self.subindex_policy = policy;
        self
    }

    /// Shared handle for submitters.
    pub fn queue(&self) -> &Arc<PushbufferQueue> {
        &self.queue
    }

    pub fn push(&self, list: CommandList) {
        self.queue.push(list);
    }

    pub fn dma_state(&self) -> &DmaState {
        &self.dma_state
    }

    pub fn dma_mget(&self) -> GPUVAddr {
        self.dma_mget
    }

    pub fn subindex(&self) -> usize {
        self.dma_pushbuffer_subindex
    }

    /// Run steps until the queue drains, the stream is disabled or the
    /// system powers off. Power state is checked between steps only.
    pub fn dispatch_calls(
        &mut self,
        memory: &dyn MemoryRead,
        gpu: &mut dyn GpuEngine,
        power: &dyn PowerState,
    ) {
        // On entering GPU code, assume all memory may be touched by the CPU.
        gpu.on_memory_write();

        if self.subindex_policy == SubindexPolicy::ResetEachEpisode {
            self.dma_pushbuffer_subindex = 0;
        }

        let mut steps = 0usize;
        while power.is_powered_on() {
            if !self.step(memory, gpu) {
                break;
            }
            steps += 1;
        }
        log::debug!(
            "DmaPusher: episode done after {} steps, {} lists pending",
            steps,
            self.queue.len()
        );
    }

    /// Process one segment. Returns `false` when there is nothing to do.
    pub fn step(&mut self, memory: &dyn MemoryRead, gpu: &mut dyn GpuEngine) -> bool {
        if !self.queue.ib_enable() {
            return false;
        }
        let Some((entry, list_len)) = self.queue.front_entry(self.dma_pushbuffer_subindex) else {
            return false;
        };

        self.dma_pushbuffer_subindex += 1;
        if self.dma_pushbuffer_subindex >= list_len {
            // We've gone through the current list, remove it from the queue.
            self.queue.pop_front();
            self.dma_pushbuffer_subindex = 0;
        }

        if entry.size == 0 {
            return true;
        }

        let word_count = entry.size as usize;
        self.command_bytes.resize(words_to_bytes(entry.size) as usize, 0);
        self.command_headers.resize(word_count, 0);
        memory.read_block_unsafe(entry.addr, &mut self.command_bytes);
        LittleEndian::read_u32_into(&self.command_bytes, &mut self.command_headers);

        log::trace!(
            "DmaPusher: segment 0x{:X} ({} words{})",
            entry.addr,
            entry.size,
            if entry.is_non_main { ", non-main" } else { "" }
        );

        for &word in &self.command_headers {
            self.dma_state.process_word(word, gpu);
        }

        if !entry.is_non_main {
            self.dma_mget = entry.end();
        }

        true
    }
}
