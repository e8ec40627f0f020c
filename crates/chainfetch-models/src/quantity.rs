//! Lock-free 64-bit numeric slot for hot record fields.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// A 64-bit unsigned value written once at decode time and read many times.
///
/// Stores use release ordering and loads use acquire ordering, so a value set
/// on one thread is observed intact by any thread that later reads it.
#[derive(Default)]
pub struct Quantity(AtomicU64);

impl Quantity {
    pub const fn new(value: u64) -> Self {
        Self(AtomicU64::new(value))
    }

    pub fn set(&self, value: u64) {
        self.0.store(value, Ordering::Release);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }
}

impl Clone for Quantity {
    fn clone(&self) -> Self {
        Self::new(self.get())
    }
}

impl PartialEq for Quantity {
    fn eq(&self, other: &Self) -> bool {
        self.get() == other.get()
    }
}

impl Eq for Quantity {}

impl From<u64> for Quantity {
    fn from(value: u64) -> Self {
        Self::new(value)
    }
}

impl fmt::Debug for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Quantity({})", self.get())
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.get())
    }
}
