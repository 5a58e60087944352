// SPDX-FileCopyrightText: 2025 pusher contributors
// SPDX-License-Identifier: GPL-3.0-or-later

//! Queue of submitted command lists.
//!
//! Submitters push from any thread; the pusher is the only consumer. The lock
//! is held only for the queue operation itself, never while words are decoded.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::command_list::{CommandList, CommandListHeader};

/// FIFO of pending command lists plus the indirect-buffer enable switch.
pub struct PushbufferQueue {
    lists: Mutex<VecDeque<CommandList>>,
    ib_enable: AtomicBool,
}

impl PushbufferQueue {
    pub fn new() -> Self {
        Self {
            lists: Mutex::new(VecDeque::new()),
            ib_enable: AtomicBool::new(true),
        }
    }

    /// Append a command list at the tail. Empty lists are dropped.
    pub fn push(&self, list: CommandList) {
        if list.is_empty() {
            log::warn!("PushbufferQueue: dropping empty command list");
            return;
        }
        log::debug!("PushbufferQueue: push list with {} entries", list.len());
        self.lists.lock().push_back(list);
    }

    /// Segment `index` of the front list, with that list's length.
    ///
    /// Panics if `index` is past the end of the front list.
    pub fn front_entry(&self, index: usize) -> Option<(CommandListHeader, usize)> {
        let lists = self.lists.lock();
        let front = lists.front()?;
        Some((front[index], front.len()))
    }

    /// Remove the front list.
    pub fn pop_front(&self) -> Option<CommandList> {
        self.lists.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.lists.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lists.lock().is_empty()
    }

    pub fn ib_enable(&self) -> bool {
        self.ib_enable.load(Ordering::Acquire)
    }

    pub fn set_ib_enable(&self, enable: bool) {
        log::debug!("PushbufferQueue: ib_enable = {}", enable);
        self.ib_enable.store(enable, Ordering::Release);
    }
}

impl Default for PushbufferQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    fn list(addrs: &[u64]) -> CommandList {
        addrs.iter().map(|&a| CommandListHeader::new(a, 1, false)).collect()
    }

    #[test]
    fn test_fifo_order() {
        let queue = PushbufferQueue::new();
        queue.push(list(&[0x1000, 0x1004]));
        queue.push(list(&[0x2000]));
        assert_eq!(queue.len(), 2);

        assert_eq!(queue.front_entry(0).map(|(e, n)| (e.addr, n)), Some((0x1000, 2)));
        assert_eq!(queue.front_entry(1).map(|(e, n)| (e.addr, n)), Some((0x1004, 2)));
        queue.pop_front();
        assert_eq!(queue.front_entry(0).map(|(e, n)| (e.addr, n)), Some((0x2000, 1)));
        queue.pop_front();
        assert!(queue.is_empty());
        assert!(queue.front_entry(0).is_none());
    }

    #[test]
    #[should_panic]
    fn test_front_entry_past_end_panics() {
        let queue = PushbufferQueue::new();
        queue.push(list(&[0x1000]));
        queue.front_entry(1);
    }

    #[test]
    fn test_empty_list_is_dropped() {
        let queue = PushbufferQueue::new();
        queue.push(Vec::new());
        assert!(queue.is_empty());

        queue.push(list(&[0x1000]));
        queue.push(Vec::new());
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.front_entry(0).map(|(e, n)| (e.addr, n)), Some((0x1000, 1)));
    }

    #[test]
    fn test_ib_enable_toggle() {
        let queue = PushbufferQueue::default();
        assert!(queue.ib_enable());
        queue.set_ib_enable(false);
        assert!(!queue.ib_enable());
    }

    #[test]
    fn test_concurrent_producer_keeps_order() {
        let queue = Arc::new(PushbufferQueue::new());
        let producer = {
            let queue = queue.clone();
            thread::spawn(move || {
                for i in 0..100u64 {
                    queue.push(list(&[i]));
                }
            })
        };

        let mut seen = Vec::new();
        while seen.len() < 100 {
            if let Some((entry, _)) = queue.front_entry(0) {
                seen.push(entry.addr);
                queue.pop_front();
            } else {
                thread::yield_now();
            }
        }
        producer.join().unwrap();

        assert_eq!(seen, (0..100).collect::<Vec<_>>());
    }
}
