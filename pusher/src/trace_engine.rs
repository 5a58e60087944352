// SPDX-FileCopyrightText: 2025 pusher contributors
// SPDX-License-Identifier: GPL-3.0-or-later

//! Engines that log every method call instead of emulating it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use log::trace;
use pusher_gpu::engines::{ClassId, Engine, EngineSet};

/// Per-subchannel call counters shared with the tracing engines.
#[derive(Default)]
pub struct CallStats {
    pub calls: [AtomicU64; pusher_gpu::engines::NUM_SUBCHANNELS],
    pub memory_writes: AtomicU64,
}

pub struct TraceEngine {
    class: ClassId,
    subchannel: usize,
    stats: Arc<CallStats>,
}

impl TraceEngine {
    pub fn new(class: ClassId, subchannel: usize, stats: Arc<CallStats>) -> Self {
        Self {
            class,
            subchannel,
            stats,
        }
    }
}

impl Engine for TraceEngine {
    fn class_id(&self) -> ClassId {
        self.class
    }

    fn call_method(&mut self, method: u32, argument: u32, method_count: u32) {
        trace!(
            "{:?}: method=0x{:04X} argument=0x{:08X} remaining={}",
            self.class,
            method,
            argument,
            method_count
        );
        self.stats.calls[self.subchannel].fetch_add(1, Ordering::Relaxed);
    }

    fn on_memory_write(&mut self) {
        self.stats.memory_writes.fetch_add(1, Ordering::Relaxed);
    }
}

/// Default subchannel layout used by the guest driver.
const DEFAULT_BINDINGS: [(usize, ClassId); 5] = [
    (0, ClassId::Threed),
    (1, ClassId::Compute),
    (2, ClassId::InlineToMemory),
    (3, ClassId::Twod),
    (4, ClassId::Dma),
];

/// An engine set with a tracing engine on every default subchannel.
pub fn trace_engines(stats: &Arc<CallStats>) -> EngineSet {
    let mut engines = EngineSet::default();
    for (subchannel, class) in DEFAULT_BINDINGS {
        engines.bind(subchannel, Box::new(TraceEngine::new(class, subchannel, stats.clone())));
    }
    engines
}

#[cfg(test)]
mod tests {
    use super::*;
    use pusher_gpu::engines::{GpuEngine, MethodCall};

    #[test]
    fn test_counts_per_subchannel() {
        let stats = Arc::new(CallStats::default());
        let mut engines = trace_engines(&stats);

        for subchannel in [0, 0, 4, 7] {
            engines.call_method(MethodCall {
                method: 0x100,
                argument: 0,
                subchannel,
                method_count: 1,
            });
        }
        engines.on_memory_write();

        assert_eq!(stats.calls[0].load(Ordering::Relaxed), 2);
        assert_eq!(stats.calls[4].load(Ordering::Relaxed), 1);
        // Subchannel 7 has no engine bound.
        assert_eq!(stats.calls[7].load(Ordering::Relaxed), 0);
        assert_eq!(stats.memory_writes.load(Ordering::Relaxed), 5);
    }
}
