//! Background read-ahead with two alternating blocks.
//!
//! The producer thread owns the byte source. At any time one block is held
//! by the consumer and the other is either being filled or waiting in the
//! `ready` slot. A zero-length block marks the end of the source and is
//! always the last block handed over.

use crate::source::ByteSource;
use parking_lot::{Condvar, Mutex};
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

struct State {
    /// Empty block waiting to be filled.
    spare: Option<Vec<u8>>,
    /// Filled block waiting to be consumed.
    ready: Option<io::Result<Vec<u8>>>,
    /// The producer delivered its last block and exited.
    done: bool,
    /// The consumer is going away.
    shutdown: bool,
}

struct Shared {
    state: Mutex<State>,
    cond: Condvar,
}

/// Handle on the producer thread.
pub(crate) struct Prefetcher {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl Prefetcher {
    /// Start filling blocks of `block_size` bytes from `source`.
    pub(crate) fn spawn(source: Box<dyn ByteSource>, block_size: usize) -> io::Result<Self> {
        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                spare: Some(Vec::with_capacity(block_size)),
                ready: None,
                done: false,
                shutdown: false,
            }),
            cond: Condvar::new(),
        });
        let producer = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name("ivio-prefetch".into())
            .spawn(move || produce(producer, source, block_size))?;
        Ok(Self {
            shared,
            worker: Some(worker),
        })
    }

    /// Hand back the drained block and wait for the next filled one.
    ///
    /// Returns an empty block once the source is exhausted.
    pub(crate) fn next_block(&mut self, drained: Vec<u8>) -> io::Result<Vec<u8>> {
        let mut state = self.shared.state.lock();
        if state.spare.is_none() && !state.done {
            state.spare = Some(drained);
            self.shared.cond.notify_all();
        }
        loop {
            if let Some(block) = state.ready.take() {
                self.shared.cond.notify_all();
                return block;
            }
            if state.done {
                return Ok(Vec::new());
            }
            self.shared.cond.wait(&mut state);
        }
    }
}

impl Drop for Prefetcher {
    fn drop(&mut self) {
        {
            let mut state = self.shared.state.lock();
            state.shutdown = true;
            self.shared.cond.notify_all();
        }
        // Waits for a fill in flight before the blocks are released.
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::warn!("prefetch worker panicked");
            }
        }
    }
}

fn produce(shared: Arc<Shared>, mut source: Box<dyn ByteSource>, block_size: usize) {
    loop {
        let mut block = {
            let mut state = shared.state.lock();
            loop {
                if state.shutdown {
                    return;
                }
                if let Some(block) = state.spare.take() {
                    break block;
                }
                shared.cond.wait(&mut state);
            }
        };

        block.resize(block_size, 0);
        let result = loop {
            match source.read_buffer(&mut block) {
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                other => break other,
            }
        };
        let last = !matches!(result, Ok(n) if n > 0);
        let delivery = result.map(|n| {
            block.truncate(n);
            block
        });

        let mut state = shared.state.lock();
        while state.ready.is_some() && !state.shutdown {
            shared.cond.wait(&mut state);
        }
        if state.shutdown {
            return;
        }
        state.ready = Some(delivery);
        if last {
            state.done = true;
        }
        shared.cond.notify_all();
        if last {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;

    #[test]
    fn test_blocks_arrive_in_order() {
        let data: Vec<u8> = (0..=255u8).cycle().take(10_000).collect();
        let source = Box::new(MemorySource::new(data.clone()));
        let mut prefetcher = Prefetcher::spawn(source, 1024).unwrap();
        let mut seen = Vec::new();
        let mut block = Vec::new();
        loop {
            block = prefetcher.next_block(block).unwrap();
            if block.is_empty() {
                break;
            }
            seen.extend_from_slice(&block);
        }
        assert_eq!(seen, data);
        // Stays at end of data.
        assert!(prefetcher.next_block(Vec::new()).unwrap().is_empty());
    }

    #[test]
    fn test_drop_mid_stream() {
        let data = vec![7u8; 50_000];
        let mut prefetcher = Prefetcher::spawn(Box::new(MemorySource::new(data)), 512).unwrap();
        let first = prefetcher.next_block(Vec::new()).unwrap();
        assert_eq!(first.len(), 512);
        drop(prefetcher);
    }

    struct FailingSource;

    impl ByteSource for FailingSource {
        fn read_buffer(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "device gone"))
        }
    }

    #[test]
    fn test_error_is_delivered_once() {
        let mut prefetcher = Prefetcher::spawn(Box::new(FailingSource), 64).unwrap();
        assert!(prefetcher.next_block(Vec::new()).is_err());
        assert!(prefetcher.next_block(Vec::new()).unwrap().is_empty());
    }
}
