// SPDX-FileCopyrightText: 2025 pusher contributors
// SPDX-License-Identifier: GPL-3.0-or-later

//! GPU command-stream interpreter.
//!
//! Decodes guest pushbuffers into method calls and replays them, in order,
//! against the engines bound to each subchannel.

pub mod command_header;
pub mod command_list;
pub mod dma_pusher;
pub mod dma_state;
pub mod engines;
pub mod gpu_context;
pub mod memory_manager;
pub mod pushbuffer_queue;

pub use command_header::{CommandHeader, SubmissionMode};
pub use command_list::{CommandList, CommandListHeader};
pub use dma_pusher::{DmaPusher, PowerState};
pub use engines::{Engine, EngineSet, GpuEngine, MethodCall};
pub use memory_manager::MemoryRead;
