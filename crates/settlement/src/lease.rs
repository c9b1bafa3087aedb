//! Per-order exclusive leases for settlement tasks.
//!
//! At most one settlement task may mutate a given order's record at a time.
//! The lease covers the full background saga lifetime and is released when
//! the guard drops, which happens on the terminal transition.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use common::OrderId;

/// Process-wide registry of in-flight settlement leases.
#[derive(Clone, Default)]
pub struct OrderLeases {
    held: Arc<Mutex<HashSet<OrderId>>>,
}

impl OrderLeases {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the exclusive lease for an order, or returns `None` if a
    /// task already holds it.
    pub fn acquire(&self, order_id: &OrderId) -> Option<OrderLease> {
        let mut held = self.held.lock().unwrap();
        if !held.insert(order_id.clone()) {
            return None;
        }
        Some(OrderLease {
            order_id: order_id.clone(),
            held: Arc::clone(&self.held),
        })
    }

    /// Returns true if a task currently holds the lease for the order.
    pub fn is_held(&self, order_id: &OrderId) -> bool {
        self.held.lock().unwrap().contains(order_id)
    }
}

/// RAII guard for one order's lease.
pub struct OrderLease {
    order_id: OrderId,
    held: Arc<Mutex<HashSet<OrderId>>>,
}

impl Drop for OrderLease {
    fn drop(&mut self) {
        self.held.lock().unwrap().remove(&self.order_id);
    }
}
