//! Fuzz target for device pool operation sequences.
//!
//! Arbitrary allocate/free/limit/evict sequences (including double frees and
//! scripted adapter failures) must never panic, never hand out overlapping
//! memory, and must leave the arena invariants intact.

#![no_main]

use std::sync::Arc;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use gg_mempool::backend::{AdapterError, DeviceId, MockDevice, QueueId};
use gg_mempool::memory::{Allocation, MemoryPool, PoolConfig};

#[derive(Debug, Arbitrary)]
enum Op {
    Alloc { size: u16, queue: u8 },
    Free { index: u8, queue: u8 },
    DoubleFree { index: u8 },
    Complete { queue: u8 },
    SetLimit { kib: Option<u8> },
    FailNextAlloc { oom: bool },
    FreeAllBlocks,
}

#[derive(Debug, Arbitrary)]
struct Input {
    first_fit: bool,
    growth: u8,
    ops: Vec<Op>,
}

fuzz_target!(|input: Input| {
    let config = PoolConfig {
        search_window: if input.first_fit { Some(1) } else { None },
        growth_factor: 1.0 + f64::from(input.growth % 4),
        ..PoolConfig::default()
    };
    let dev = Arc::new(MockDevice::new(1 << 20, 0));
    let pool = match MemoryPool::new(DeviceId(0), dev.clone(), dev.clone(), config) {
        Ok(pool) => pool,
        Err(_) => return,
    };
    let mut live: Vec<Allocation> = Vec::new();
    let mut freed: Vec<Allocation> = Vec::new();

    for op in input.ops.into_iter().take(256) {
        match op {
            Op::Alloc { size, queue } => {
                if let Ok(a) = pool.allocate(usize::from(size), QueueId(u64::from(queue % 4))) {
                    assert!(live.iter().all(|b| !a.overlaps(b)));
                    live.push(a);
                }
            }
            Op::Free { index, queue } if !live.is_empty() => {
                let a = live.swap_remove(usize::from(index) % live.len());
                pool.free(&a, QueueId(u64::from(queue % 4))).unwrap();
                freed.push(a);
            }
            Op::DoubleFree { index } if !freed.is_empty() => {
                let a = &freed[usize::from(index) % freed.len()];
                let before = pool.stats();
                assert!(pool.free(a, QueueId(0)).is_err());
                assert_eq!(pool.stats(), before);
            }
            Op::Complete { queue } => dev.complete_queue(QueueId(u64::from(queue % 4))),
            Op::SetLimit { kib } => pool.set_limit(kib.map(|k| usize::from(k) * 1024)),
            Op::FailNextAlloc { oom } => dev.fail_next_alloc(if oom {
                AdapterError::OutOfMemory { requested: 0 }
            } else {
                AdapterError::Failed("injected".into())
            }),
            Op::FreeAllBlocks => {
                let _ = pool.free_all_blocks();
            }
            _ => {}
        }
        pool.verify().unwrap();
        assert_eq!(pool.used_bytes(), live.iter().map(|a| a.size).sum::<usize>());
    }
});
