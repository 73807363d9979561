use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::ptr;

use super::{lines, Platform, CACHE_LINE_SIZE};

/// A deterministic data cache with a virtual clock.
///
/// Every [`Platform::load`] costs `hit_ticks` when its line is resident and
/// `miss_ticks` otherwise, then makes the line resident. Evicting forgets lines.
/// There is no prefetcher and no capacity limit, so the only noise is the one a
/// test plants with [`SimulatedPlatform::block_reads`].
#[derive(Debug)]
pub struct SimulatedPlatform {
    hit_ticks: u64,
    miss_ticks: u64,
    nanos_per_tick: f64,
    state: RefCell<State>,
}

#[derive(Debug, Default)]
struct State {
    resident: HashSet<usize>,
    clock: u64,
    barriers: u64,
    loads: u64,
    // set by an eviction, cleared by the next barrier
    evicted_unfenced: bool,
    unfenced_loads: u64,
    // address -> loads left that return zero
    blocked: HashMap<usize, u32>,
}

impl SimulatedPlatform {
    pub const DEFAULT_HIT_TICKS: u64 = 40;
    pub const DEFAULT_MISS_TICKS: u64 = 300;

    pub fn new() -> Self {
        Self::with_latencies(Self::DEFAULT_HIT_TICKS, Self::DEFAULT_MISS_TICKS)
    }

    pub fn with_latencies(hit_ticks: u64, miss_ticks: u64) -> Self {
        Self {
            hit_ticks,
            miss_ticks,
            nanos_per_tick: 1.0,
            state: RefCell::new(State::default()),
        }
    }

    pub fn with_nanos_per_tick(mut self, nanos_per_tick: f64) -> Self {
        self.nanos_per_tick = nanos_per_tick;
        self
    }

    /// The next `count` loads of exactly `addr` return 0 instead of the stored
    /// byte, like a load the CPU refused to perform. The cache still sees them.
    pub fn block_reads(&self, addr: *const u8, count: u32) {
        self.state.borrow_mut().blocked.insert(addr as usize, count);
    }

    pub fn is_resident(&self, addr: *const u8) -> bool {
        let line = addr as usize & !(CACHE_LINE_SIZE - 1);
        self.state.borrow().resident.contains(&line)
    }

    /// Moves the virtual clock forward without touching the cache.
    pub fn advance(&self, ticks: u64) {
        let mut state = self.state.borrow_mut();
        state.clock = state.clock.saturating_add(ticks);
    }

    pub fn barriers(&self) -> u64 {
        self.state.borrow().barriers
    }

    pub fn loads(&self) -> u64 {
        self.state.borrow().loads
    }

    /// Loads issued after an eviction with no barrier in between.
    pub fn unfenced_loads(&self) -> u64 {
        self.state.borrow().unfenced_loads
    }
}

impl Default for SimulatedPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl Platform for SimulatedPlatform {
    unsafe fn evict_range(&self, start: *const u8, len: usize) {
        let mut state = self.state.borrow_mut();
        for line in lines(start, len) {
            state.resident.remove(&line);
        }
        state.evicted_unfenced = true;
    }

    fn monotonic_ticks(&self) -> u64 {
        self.state.borrow().clock
    }

    fn nanos_per_tick(&self) -> f64 {
        self.nanos_per_tick
    }

    fn barrier(&self) {
        let mut state = self.state.borrow_mut();
        state.barriers += 1;
        state.evicted_unfenced = false;
    }

    unsafe fn load(&self, ptr: *const u8) -> u8 {
        let mut state = self.state.borrow_mut();
        let line = ptr as usize & !(CACHE_LINE_SIZE - 1);
        let cost = if state.resident.insert(line) {
            self.miss_ticks
        } else {
            self.hit_ticks
        };
        state.clock = state.clock.saturating_add(cost);
        state.loads += 1;
        if state.evicted_unfenced {
            state.unfenced_loads += 1;
        }

        if let Some(left) = state.blocked.get_mut(&(ptr as usize)) {
            if *left > 0 {
                *left -= 1;
                return 0;
            }
        }
        ptr::read_volatile(ptr)
    }
}
