//! Configuration and builder for [`CanBus`].

use std::sync::Arc;
use std::time::Duration;

use super::live::{CanBus, MessageCallback, ReceivedMessage, Transport};
use crate::Bus;

/// Configuration for a live [`CanBus`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusConfig {
    /// Number of decoded messages held until the application receives them.
    /// Frames arriving while the queue is full are dropped.
    /// Default: 256
    pub queue_capacity: usize,

    /// Longest time the receive thread blocks in the transport before it
    /// checks for shutdown.
    /// Default: 100 ms
    pub poll_interval: Duration,

    /// Transmit every frame as CAN FD, not only those longer than 8 bytes.
    /// Default: false
    pub fd: bool,

    /// Set the bit rate switch flag on transmitted CAN FD frames.
    /// Default: false
    pub bit_rate_switch: bool,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 256,
            poll_interval: Duration::from_millis(100),
            fd: false,
            bit_rate_switch: false,
        }
    }
}

impl BusConfig {
    /// Set the receive queue capacity. A capacity of 0 is raised to 1.
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Set the transport poll interval.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set whether all frames are sent as CAN FD.
    pub fn fd(mut self, enabled: bool) -> Self {
        self.fd = enabled;
        self
    }

    /// Set the bit rate switch flag for CAN FD frames.
    pub fn bit_rate_switch(mut self, enabled: bool) -> Self {
        self.bit_rate_switch = enabled;
        self
    }
}

/// Builder for [`CanBus`].
pub struct CanBusBuilder<T: Transport> {
    pub(super) schema: Arc<Bus>,
    pub(super) transport: T,
    pub(super) config: BusConfig,
    pub(super) callback: Option<MessageCallback>,
}

impl<T: Transport> CanBusBuilder<T> {
    /// Create a new builder with default configuration.
    pub fn new(schema: Arc<Bus>, transport: T) -> Self {
        Self {
            schema,
            transport,
            config: BusConfig::default(),
            callback: None,
        }
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: BusConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the receive queue capacity.
    ///
    /// Default: 256
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config = self.config.queue_capacity(capacity);
        self
    }

    /// Set the transport poll interval.
    ///
    /// Default: 100 ms
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    /// Send all frames as CAN FD.
    ///
    /// Default: false
    pub fn fd(mut self, enabled: bool) -> Self {
        self.config.fd = enabled;
        self
    }

    /// Set the bit rate switch flag for CAN FD frames.
    ///
    /// Default: false
    pub fn bit_rate_switch(mut self, enabled: bool) -> Self {
        self.config.bit_rate_switch = enabled;
        self
    }

    /// Call `callback` on the receive thread for every decoded message,
    /// before it is queued.
    pub fn on_message<F>(mut self, callback: F) -> Self
    where
        F: FnMut(&ReceivedMessage) + Send + 'static,
    {
        self.callback = Some(Box::new(callback));
        self
    }

    /// Start the receive thread.
    pub fn open(self) -> crate::Result<CanBus<T>> {
        CanBus::start(self.schema, self.transport, self.config, self.callback)
    }
}
