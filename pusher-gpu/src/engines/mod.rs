// SPDX-FileCopyrightText: 2025 pusher contributors
// SPDX-License-Identifier: GPL-3.0-or-later

//! Engine dispatch interface and subchannel routing.
//!
//! The pusher forwards every decoded invocation to a [`GpuEngine`]. The
//! [`EngineSet`] implementation binds one [`Engine`] per subchannel, the way
//! the Tegra X1 GPU addresses its engine classes from a single command stream.

/// Number of engine subchannels addressable by a command header.
pub const NUM_SUBCHANNELS: usize = 8;

/// GPU engine class IDs (NV device class numbers).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ClassId {
    Twod = 0x902D,
    Threed = 0xB197,
    Compute = 0xB1C0,
    InlineToMemory = 0xA140,
    Dma = 0xB0B5,
}

/// One decoded method invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodCall {
    pub method: u32,
    pub argument: u32,
    pub subchannel: u32,
    /// Arguments still outstanding in the current run, including this one.
    pub method_count: u32,
}

/// Receiver of the pusher's output.
pub trait GpuEngine {
    /// Perform the side effect of one decoded invocation.
    fn call_method(&mut self, call: MethodCall);

    /// Guest memory may have changed anywhere since the last episode.
    fn on_memory_write(&mut self);
}

/// A GPU engine class bound to a subchannel.
pub trait Engine: Send {
    fn class_id(&self) -> ClassId;

    /// Write `argument` to method register `method`.
    fn call_method(&mut self, method: u32, argument: u32, method_count: u32);

    /// Drop any cached view of guest memory.
    fn on_memory_write(&mut self) {}
}

/// Engines indexed by subchannel.
pub struct EngineSet {
    engines: Vec<Option<Box<dyn Engine>>>,
}

impl EngineSet {
    pub fn new(engines: Vec<Option<Box<dyn Engine>>>) -> Self {
        assert!(engines.len() <= NUM_SUBCHANNELS);
        let mut e = engines;
        e.resize_with(NUM_SUBCHANNELS, || None);
        Self { engines: e }
    }

    /// Bind `engine` to `subchannel`, returning the engine it replaces.
    pub fn bind(&mut self, subchannel: usize, engine: Box<dyn Engine>) -> Option<Box<dyn Engine>> {
        assert!(subchannel < NUM_SUBCHANNELS);
        log::debug!(
            "EngineSet: bind {:?} to subchannel {}",
            engine.class_id(),
            subchannel
        );
        self.engines[subchannel].replace(engine)
    }

    pub fn get(&self, subchannel: usize) -> Option<&dyn Engine> {
        self.engines.get(subchannel)?.as_deref()
    }
}

impl Default for EngineSet {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl GpuEngine for EngineSet {
    fn call_method(&mut self, call: MethodCall) {
        match self.engines.get_mut(call.subchannel as usize) {
            Some(Some(engine)) => engine.call_method(call.method, call.argument, call.method_count),
            _ => log::trace!(
                "EngineSet: no engine on subchannel {} (method=0x{:X}, argument=0x{:X})",
                call.subchannel,
                call.method,
                call.argument
            ),
        }
    }

    fn on_memory_write(&mut self) {
        for engine in self.engines.iter_mut().flatten() {
            engine.on_memory_write();
        }
    }
}
