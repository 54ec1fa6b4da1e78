//! Engine pool
//!
//! A fixed set of engines, each guarded by its own `locked` flag. Callers get
//! an [`EngineLease`]; dropping the lease clears the flag, so an engine is
//! released on success, error, panic and abandoned streams alike.
//!
//! Two ways to wait for a free engine:
//! - `Scan`: walk the engines cyclically and `yield_now` between misses
//! - `Queue`: wait on a FIFO semaphore with one permit per engine, then take
//!   an index off the free list
//!
//! Neither blocks a runtime thread while waiting.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use nllb_config::DispatchStrategy;
use nllb_core::{Device, Error, Result, TokenCounter, TranslationEngine};
use parking_lot::{Mutex, MutexGuard};
use serde::Serialize;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

struct EngineSlot {
    locked: AtomicBool,
    /// Never contended: only the holder of the slot's lease locks it
    engine: Mutex<Box<dyn TranslationEngine>>,
}

struct PoolInner {
    slots: Vec<EngineSlot>,
    strategy: DispatchStrategy,
    cursor: AtomicUsize,
    /// Live leases plus lock attempts in progress
    holders: AtomicUsize,
    /// Bumped on every successful lock
    acquisitions: AtomicU64,
    permits: Arc<Semaphore>,
    free: Mutex<VecDeque<usize>>,
    counter: Arc<dyn TokenCounter>,
    /// Every engine is built from the same settings, so they share a device
    device: Device,
}

/// Snapshot of pool occupancy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStatus {
    pub size: usize,
    pub busy: usize,
    pub device: Device,
}

/// Shared handle to the engine pool
#[derive(Clone)]
pub struct EnginePool {
    inner: Arc<PoolInner>,
}

impl EnginePool {
    pub fn new(engines: Vec<Box<dyn TranslationEngine>>, strategy: DispatchStrategy) -> Result<Self> {
        let first = engines
            .first()
            .ok_or_else(|| Error::Config("engine pool needs at least one engine".to_string()))?;
        let counter = first.token_counter();
        let device = first.device();

        let size = engines.len();
        let slots = engines
            .into_iter()
            .map(|engine| EngineSlot {
                locked: AtomicBool::new(false),
                engine: Mutex::new(engine),
            })
            .collect();

        tracing::info!(size, ?strategy, ?device, "Engine pool ready");

        Ok(Self {
            inner: Arc::new(PoolInner {
                slots,
                strategy,
                cursor: AtomicUsize::new(0),
                holders: AtomicUsize::new(0),
                acquisitions: AtomicU64::new(0),
                permits: Arc::new(Semaphore::new(size)),
                free: Mutex::new((0..size).collect()),
                counter,
                device,
            }),
        })
    }

    pub fn len(&self) -> usize {
        self.inner.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.slots.is_empty()
    }

    pub fn strategy(&self) -> DispatchStrategy {
        self.inner.strategy
    }

    /// Token counter of the first engine; counting needs no lease
    pub fn token_counter(&self) -> Arc<dyn TokenCounter> {
        Arc::clone(&self.inner.counter)
    }

    pub fn status(&self) -> PoolStatus {
        PoolStatus {
            size: self.len(),
            busy: self
                .inner
                .slots
                .iter()
                .filter(|slot| slot.locked.load(Ordering::SeqCst))
                .count(),
            device: self.inner.device,
        }
    }

    /// Wait until an engine is free and lease it
    pub async fn acquire(&self) -> Result<EngineLease> {
        let lease = match self.inner.strategy {
            DispatchStrategy::Scan => self.acquire_scan().await,
            DispatchStrategy::Queue => self.acquire_queued().await,
        };

        if let Err(e) = &lease {
            tracing::error!(error = %e, "Engine pool dispatch failed");
        }
        lease
    }

    /// Lease every engine, waiting for in-flight work to finish
    pub async fn acquire_all(&self) -> Result<Vec<EngineLease>> {
        let mut leases = Vec::with_capacity(self.len());
        for _ in 0..self.len() {
            leases.push(self.acquire().await?);
        }
        Ok(leases)
    }

    async fn acquire_scan(&self) -> Result<EngineLease> {
        let size = self.len();
        let mut misses = 0usize;

        loop {
            let index = self.inner.cursor.fetch_add(1, Ordering::Relaxed) % size;
            if let Some(lease) = self.try_lock(index, None) {
                return Ok(lease);
            }

            misses += 1;
            if misses % size == 0 && self.has_orphaned_lock() {
                return Err(Error::InvariantViolation(
                    "every engine is locked but no lease is alive".to_string(),
                ));
            }

            tokio::task::yield_now().await;
        }
    }

    async fn acquire_queued(&self) -> Result<EngineLease> {
        let permit = Arc::clone(&self.inner.permits)
            .acquire_owned()
            .await
            .map_err(|_| Error::InvariantViolation("engine pool semaphore closed".to_string()))?;

        let index = self.inner.free.lock().pop_front().ok_or_else(|| {
            Error::InvariantViolation("holding a pool permit but no engine is free".to_string())
        })?;

        self.try_lock(index, Some(permit)).ok_or_else(|| {
            Error::InvariantViolation(format!("engine {index} was on the free list while locked"))
        })
    }

    fn try_lock(&self, index: usize, permit: Option<OwnedSemaphorePermit>) -> Option<EngineLease> {
        let inner = &self.inner;
        inner.holders.fetch_add(1, Ordering::SeqCst);

        let locked = inner.slots[index]
            .locked
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok();

        if !locked {
            inner.holders.fetch_sub(1, Ordering::SeqCst);
            return None;
        }

        inner.acquisitions.fetch_add(1, Ordering::SeqCst);
        tracing::trace!(engine = index, "Leased translation engine");
        Some(EngineLease {
            inner: Arc::clone(inner),
            index,
            _permit: permit,
        })
    }

    /// True only if some engine is locked while nobody holds or is taking a
    /// lease, with no acquisition racing the check
    fn has_orphaned_lock(&self) -> bool {
        let inner = &self.inner;
        let acquisitions = inner.acquisitions.load(Ordering::SeqCst);
        if inner.holders.load(Ordering::SeqCst) != 0 {
            return false;
        }

        let any_locked = inner
            .slots
            .iter()
            .any(|slot| slot.locked.load(Ordering::SeqCst));

        any_locked
            && inner.holders.load(Ordering::SeqCst) == 0
            && inner.acquisitions.load(Ordering::SeqCst) == acquisitions
    }
}

/// Exclusive use of one engine until dropped
pub struct EngineLease {
    inner: Arc<PoolInner>,
    index: usize,
    // Dropped after `Drop::drop` has returned the slot
    _permit: Option<OwnedSemaphorePermit>,
}

impl EngineLease {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn engine(&self) -> MutexGuard<'_, Box<dyn TranslationEngine>> {
        self.inner.slots[self.index].engine.lock()
    }
}

impl Drop for EngineLease {
    fn drop(&mut self) {
        self.inner.slots[self.index]
            .locked
            .store(false, Ordering::SeqCst);
        self.inner.holders.fetch_sub(1, Ordering::SeqCst);

        if self.inner.strategy == DispatchStrategy::Queue {
            self.inner.free.lock().push_back(self.index);
        }

        tracing::trace!(engine = self.index, "Released translation engine");
    }
}
