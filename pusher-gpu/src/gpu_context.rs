// SPDX-FileCopyrightText: 2025 pusher contributors
// SPDX-License-Identifier: GPL-3.0-or-later

//! Central GPU context.
//!
//! Owns the GPU memory manager, the DMA pusher and the engines bound to its
//! subchannels. Submitters push command lists via `submit_command_list()` from
//! any thread, and the GPU thread drains them via `dispatch_calls()`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use pusher_common::settings::Settings;
use pusher_common::types::CpuAddr;

use crate::command_list::CommandList;
use crate::dma_pusher::DmaPusher;
use crate::engines::EngineSet;
use crate::memory_manager::{GpuMemoryManager, GuestMemoryView};
use crate::pushbuffer_queue::PushbufferQueue;

/// GPU state shared between the submission side and the GPU thread.
pub struct GpuContext {
    pub memory_manager: RwLock<GpuMemoryManager>,
    pub engines: Mutex<EngineSet>,
    queue: Arc<PushbufferQueue>,
    dma_pusher: Mutex<DmaPusher>,
    powered_on: AtomicBool,
}

impl GpuContext {
    pub fn new(settings: &Settings, engines: EngineSet) -> Self {
        let queue = Arc::new(PushbufferQueue::new());
        queue.set_ib_enable(settings.ib_enable);
        let dma_pusher =
            DmaPusher::new(queue.clone()).with_subindex_policy(settings.subindex_policy);

        Self {
            memory_manager: RwLock::new(GpuMemoryManager::new()),
            engines: Mutex::new(engines),
            queue,
            dma_pusher: Mutex::new(dma_pusher),
            powered_on: AtomicBool::new(true),
        }
    }

    /// Queue a command list for the GPU thread.
    pub fn submit_command_list(&self, list: CommandList) {
        self.queue.push(list);
    }

    pub fn set_ib_enable(&self, enable: bool) {
        self.queue.set_ib_enable(enable);
    }

    pub fn pending_lists(&self) -> usize {
        self.queue.len()
    }

    /// Stop dispatching after the step in progress.
    pub fn power_off(&self) {
        log::info!("GpuContext: power off");
        self.powered_on.store(false, Ordering::Release);
    }

    /// Run one dispatch episode.
    ///
    /// `read_cpu_mem` reads bytes from a guest physical address into a buffer.
    pub fn dispatch_calls(&self, read_cpu_mem: &dyn Fn(CpuAddr, &mut [u8])) {
        let mm = self.memory_manager.read();
        let memory = GuestMemoryView::new(&mm, read_cpu_mem);
        let mut engines = self.engines.lock();
        let mut pusher = self.dma_pusher.lock();

        pusher.dispatch_calls(&memory, &mut *engines, &self.powered_on);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command_header::{CommandHeader, SubmissionMode};
    use crate::command_list::CommandListHeader;
    use crate::engines::{ClassId, Engine};

    struct CountingEngine(Arc<Mutex<Vec<(u32, u32)>>>);

    impl Engine for CountingEngine {
        fn class_id(&self) -> ClassId {
            ClassId::Threed
        }
        fn call_method(&mut self, method: u32, argument: u32, _method_count: u32) {
            self.0.lock().push((method, argument));
        }
    }

    fn context() -> (GpuContext, Arc<Mutex<Vec<(u32, u32)>>>) {
        let writes = Arc::new(Mutex::new(Vec::new()));
        let engine: Box<dyn Engine> = Box::new(CountingEngine(writes.clone()));
        let engines = EngineSet::new(vec![Some(engine)]);
        (GpuContext::new(&Settings::default(), engines), writes)
    }

    #[test]
    fn test_dispatch_empty() {
        let (ctx, writes) = context();
        ctx.dispatch_calls(&|_addr, _buf| {});
        assert!(writes.lock().is_empty());
    }

    #[test]
    fn test_dispatch_through_memory_manager() {
        let (ctx, writes) = context();
        ctx.memory_manager.write().map(0x10_0000, 0x2000, 0x1000);

        let header = CommandHeader::build(SubmissionMode::Increasing, 0x10, 0, 2).raw();
        let mut guest = vec![0u8; 0x3000];
        guest[0x2000..0x2004].copy_from_slice(&header.to_le_bytes());
        guest[0x2004..0x2008].copy_from_slice(&0xAAu32.to_le_bytes());
        guest[0x2008..0x200C].copy_from_slice(&0xBBu32.to_le_bytes());

        ctx.submit_command_list(vec![CommandListHeader::new(0x10_0000, 3, false)]);
        assert_eq!(ctx.pending_lists(), 1);

        ctx.dispatch_calls(&|addr, buf| {
            let start = addr as usize;
            buf.copy_from_slice(&guest[start..start + buf.len()]);
        });

        assert_eq!(*writes.lock(), vec![(0x10, 0xAA), (0x11, 0xBB)]);
        assert_eq!(ctx.pending_lists(), 0);
    }

    #[test]
    fn test_power_off_leaves_queue() {
        let (ctx, writes) = context();
        ctx.submit_command_list(vec![CommandListHeader::new(0, 1, false)]);
        ctx.power_off();
        assert!(!ctx.powered_on.load(Ordering::Acquire));

        ctx.dispatch_calls(&|_addr, buf| buf.fill(0));
        assert!(writes.lock().is_empty());
        assert_eq!(ctx.pending_lists(), 1);
    }

    #[test]
    fn test_empty_submission_does_not_stall() {
        let (ctx, writes) = context();
        ctx.submit_command_list(Vec::new());
        assert_eq!(ctx.pending_lists(), 0);

        ctx.dispatch_calls(&|_addr, buf| buf.fill(0));
        assert!(writes.lock().is_empty());
    }

    #[test]
    fn test_settings_disable_stream() {
        let settings = Settings {
            ib_enable: false,
            ..Settings::default()
        };
        let ctx = GpuContext::new(&settings, EngineSet::default());
        ctx.submit_command_list(vec![CommandListHeader::new(0, 0, false)]);
        ctx.dispatch_calls(&|_addr, _buf| {});
        assert_eq!(ctx.pending_lists(), 1);

        ctx.set_ib_enable(true);
        ctx.dispatch_calls(&|_addr, _buf| {});
        assert_eq!(ctx.pending_lists(), 0);
    }
}
