// SPDX-FileCopyrightText: 2025 pusher contributors
// SPDX-License-Identifier: GPL-3.0-or-later

mod config;
mod trace_engine;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use pusher_common::settings::parse_address;
use pusher_common::types::is_page_aligned;
use pusher_common::types::{align_up, GPU_PAGE_SIZE};
use pusher_gpu::command_list::read_command_lists;
use pusher_gpu::gpu_context::GpuContext;
use trace_engine::{trace_engines, CallStats};

/// pusher - replay a captured GPU pushbuffer through the DMA pusher
#[derive(Parser, Debug)]
#[command(name = "pusher", version, about = "Replay a captured GPU pushbuffer")]
struct Args {
    /// Raw memory image holding the pushbuffer words
    #[arg(short, long)]
    memory: PathBuf,

    /// Command-list capture ([u32 count][count x u64 GPFIFO entry] records)
    #[arg(short, long)]
    lists: PathBuf,

    /// GPU virtual address the memory image is mapped at (overrides config)
    #[arg(short, long, value_parser = parse_base)]
    base: Option<u64>,

    /// Path to config file (default: auto-detect pusher.ini)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn parse_base(s: &str) -> Result<u64, String> {
    let base = parse_address(s).ok_or_else(|| format!("invalid address: {}", s))?;
    if !is_page_aligned(base) {
        return Err(format!("0x{:X} is not aligned to the GPU page size", base));
    }
    Ok(base)
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp_millis()
        .init();

    let mut settings = config::load_config(args.config.as_deref());
    if let Some(base) = args.base {
        settings.gpu_va_base = base;
    }

    let image = std::fs::read(&args.memory)
        .with_context(|| format!("Failed to read memory image {}", args.memory.display()))?;
    let lists_file = File::open(&args.lists)
        .with_context(|| format!("Failed to open command lists {}", args.lists.display()))?;
    let lists = read_command_lists(BufReader::new(lists_file))
        .with_context(|| format!("Failed to parse command lists {}", args.lists.display()))?;

    info!(
        "Replaying {} command lists over {} bytes at GPU 0x{:X}",
        lists.len(),
        image.len(),
        settings.gpu_va_base
    );

    let stats = Arc::new(CallStats::default());
    let gpu = GpuContext::new(&settings, trace_engines(&stats));
    gpu.memory_manager
        .write()
        .map(settings.gpu_va_base, 0, align_up(image.len() as u64, GPU_PAGE_SIZE));

    for list in lists {
        gpu.submit_command_list(list);
    }

    // The image is backed at CPU address 0; reads past its end see zeros.
    gpu.dispatch_calls(&|addr, buf| {
        let start = (addr as usize).min(image.len());
        let end = start.saturating_add(buf.len()).min(image.len());
        let n = end - start;
        buf[..n].copy_from_slice(&image[start..end]);
        buf[n..].fill(0);
    });

    let engines = gpu.engines.lock();
    for (subchannel, counter) in stats.calls.iter().enumerate() {
        let calls = counter.load(Ordering::Relaxed);
        if let Some(engine) = engines.get(subchannel) {
            info!(
                "subchannel {} ({:?}): {} method calls",
                subchannel,
                engine.class_id(),
                calls
            );
        }
    }
    info!(
        "{} memory-write notifications, {} lists left pending",
        stats.memory_writes.load(Ordering::Relaxed),
        gpu.pending_lists()
    );

    Ok(())
}
