//! Shared pool of finite, multi-dimensional resources.

use std::sync::{Mutex, MutexGuard, PoisonError};

use rmsched_core::ResourceVector;
use tracing::{trace, warn};

/// Current availability of every resource kind, guarded by one lock.
///
/// The check and the decrement of a reservation happen inside the same
/// critical section across all kinds, so no partial reservation is ever
/// observable. `0 <= available[k] <= capacity[k]` holds at all times.
#[derive(Debug)]
pub struct ResourcePool {
    capacity: ResourceVector,
    available: Mutex<Vec<u32>>,
}

impl ResourcePool {
    /// Create a pool that starts full.
    pub fn new(capacity: ResourceVector) -> Self {
        let available = Mutex::new(capacity.as_slice().to_vec());
        Self {
            capacity,
            available,
        }
    }

    pub fn capacity(&self) -> &ResourceVector {
        &self.capacity
    }

    pub fn kinds(&self) -> usize {
        self.capacity.kinds()
    }

    // Counters are only written as a whole vector after all checks pass, so a
    // poisoned guard still holds a consistent state.
    fn counters(&self) -> MutexGuard<'_, Vec<u32>> {
        self.available.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reserve `demand` if every kind can cover it; otherwise change nothing.
    pub fn try_reserve(&self, demand: &ResourceVector) -> bool {
        if demand.kinds() != self.kinds() {
            warn!(demand = %demand, capacity = %self.capacity, "demand has wrong number of resource kinds");
            return false;
        }

        let mut available = self.counters();
        let fits = demand
            .as_slice()
            .iter()
            .zip(available.iter())
            .all(|(d, a)| d <= a);
        if !fits {
            return false;
        }
        for (a, d) in available.iter_mut().zip(demand.as_slice()) {
            *a -= d;
        }
        trace!(demand = %demand, available = ?*available, "reserved");
        true
    }

    /// Return `amount` to the pool.
    ///
    /// Callers must release exactly what they reserved. Anything that would
    /// push a counter past its capacity is clamped and logged. An amount with
    /// the wrong number of kinds changes nothing.
    pub fn release(&self, amount: &ResourceVector) {
        if amount.kinds() != self.kinds() {
            warn!(amount = %amount, capacity = %self.capacity, "release has wrong number of resource kinds");
            return;
        }

        let mut available = self.counters();
        let caps = self.capacity.as_slice();
        for ((a, r), cap) in available.iter_mut().zip(amount.as_slice()).zip(caps) {
            let next = a.saturating_add(*r);
            if next > *cap {
                warn!(released = r, capacity = cap, "over-release clamped to capacity");
            }
            *a = next.min(*cap);
        }
        trace!(amount = %amount, available = ?*available, "released");
    }

    /// Whether `demand` could ever be granted, i.e. fits an empty pool.
    pub fn can_ever_satisfy(&self, demand: &ResourceVector) -> bool {
        demand.fits_within(&self.capacity)
    }

    /// Point-in-time copy of the counters.
    pub fn available(&self) -> ResourceVector {
        ResourceVector::new(self.counters().clone())
    }
}
