//! Injected dependencies of every slice reducer

use backstage_core::environment::{Clock, SystemClock};
use backstage_gateway::{Gateway, Transport};
use std::sync::Arc;

/// Environment shared by all slices: the request gateway and a clock
pub struct StoreEnvironment<T> {
    /// Request gateway
    pub gateway: Arc<Gateway<T>>,
    /// Time source for `fetched_at` stamps
    pub clock: Arc<dyn Clock>,
}

impl<T: Transport> StoreEnvironment<T> {
    /// Environment with the system clock
    #[must_use]
    pub fn new(gateway: Gateway<T>) -> Self {
        Self {
            gateway: Arc::new(gateway),
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the clock
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

impl<T> Clone for StoreEnvironment<T> {
    fn clone(&self) -> Self {
        Self {
            gateway: Arc::clone(&self.gateway),
            clock: Arc::clone(&self.clock),
        }
    }
}
