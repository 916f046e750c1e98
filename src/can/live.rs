//! Live bus runtime.
//!
//! [`CanBus`] owns a [`Transport`] and a receive thread. The thread polls the
//! transport, resolves every frame against the schema, and hands decoded
//! messages to the application through a bounded queue. The thread never waits
//! for the application: when the queue is full the message is dropped and
//! counted.
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use canschema::Bus;
//! use canschema::can::{CanBus, Transport};
//!
//! fn run<T: Transport>(transport: T) -> canschema::Result<()> {
//!     let schema = Arc::new(Bus::from_file("CANBus1.dbc")?);
//!     let bus = CanBus::builder(schema, transport)
//!         .queue_capacity(1024)
//!         .on_message(|msg| println!("{} from node {}", msg.message, msg.node_offset))
//!         .open()?;
//!
//!     bus.send("Status", &[("mode", 3u8.into())], 2)?;
//!     while let Some(msg) = bus.recv(Duration::from_secs(1))? {
//!         println!("{}: {:?}", msg.message, msg.signals);
//!     }
//!
//!     let _transport = bus.shutdown()?;
//!     Ok(())
//! }
//! ```

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TryRecvError, TrySendError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use embedded_can::Frame;

use super::codec::{DecodedSignal, EncodedFrame, FrameCodec, ResolvedFrame, SignalValue, raw_id};
use super::config::{BusConfig, CanBusBuilder};
use super::fd::{FdFlags, FdFrame};
use crate::{Bus, Error, Result};

/// A CAN interface the runtime reads from and writes to.
///
/// Both methods take `&self`: the receive thread and senders use the
/// transport at the same time, as socket-backed interfaces allow.
pub trait Transport: Send + Sync + 'static {
    /// Frame type of the interface.
    type Frame: FdFrame + Send;
    /// Error reported by the interface.
    type Error: fmt::Display;

    /// Transmit one frame.
    fn transmit(&self, frame: &Self::Frame) -> core::result::Result<(), Self::Error>;

    /// Wait up to `timeout` for a frame. Returns `Ok(None)` on timeout.
    fn receive_timeout(
        &self,
        timeout: Duration,
    ) -> core::result::Result<Option<Self::Frame>, Self::Error>;
}

/// Callback invoked on the receive thread for every decoded message.
pub(crate) type MessageCallback = Box<dyn FnMut(&ReceivedMessage) + Send>;

/// A decoded message taken off the bus.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ReceivedMessage {
    /// Message name
    pub message: String,
    /// Base id of the message
    pub message_id: u32,
    /// Id the frame was received on
    pub arbitration_id: u32,
    /// Offset of the sending node
    pub node_offset: u8,
    /// Decoded signals in definition order
    pub signals: Vec<DecodedSignal>,
}

impl ReceivedMessage {
    fn from_resolved(arbitration_id: u32, resolved: ResolvedFrame<'_>) -> Self {
        Self {
            message: String::from(resolved.message.name()),
            message_id: resolved.message.id(),
            arbitration_id,
            node_offset: resolved.node_offset,
            signals: resolved.signals,
        }
    }

    /// Look up a decoded signal by name.
    pub fn signal(&self, name: &str) -> Option<&DecodedSignal> {
        self.signals.iter().find(|s| s.name == name)
    }
}

/// Snapshot of the receive counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BusStats {
    /// Frames taken from the transport
    pub received: u64,
    /// Decoded messages placed on the queue
    pub delivered: u64,
    /// Frames whose id matched no message
    pub unrecognized: u64,
    /// Frames that matched a message but could not be decoded
    pub decode_errors: u64,
    /// Decoded messages dropped because the queue was full
    pub dropped: u64,
    /// Failed transport reads
    pub transport_errors: u64,
}

#[derive(Debug, Default)]
struct Counters {
    received: AtomicU64,
    delivered: AtomicU64,
    unrecognized: AtomicU64,
    decode_errors: AtomicU64,
    dropped: AtomicU64,
    transport_errors: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> BusStats {
        BusStats {
            received: self.received.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            unrecognized: self.unrecognized.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            transport_errors: self.transport_errors.load(Ordering::Relaxed),
        }
    }
}

/// A running connection to a CAN interface.
///
/// Dropping a `CanBus` stops the receive thread. Use [`CanBus::shutdown`] to
/// get the transport back.
pub struct CanBus<T: Transport> {
    schema: Arc<Bus>,
    config: BusConfig,
    transport: Arc<T>,
    receiver: Receiver<ReceivedMessage>,
    counters: Arc<Counters>,
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl<T: Transport> CanBus<T> {
    /// Start receiving on `transport` with the given configuration.
    pub fn open(schema: Arc<Bus>, transport: T, config: BusConfig) -> Result<Self> {
        Self::start(schema, transport, config, None)
    }

    /// Create a builder for configuring the bus.
    pub fn builder(schema: Arc<Bus>, transport: T) -> CanBusBuilder<T> {
        CanBusBuilder::new(schema, transport)
    }

    pub(super) fn start(
        schema: Arc<Bus>,
        transport: T,
        config: BusConfig,
        callback: Option<MessageCallback>,
    ) -> Result<Self> {
        let (sender, receiver) = mpsc::sync_channel(config.queue_capacity.max(1));
        let transport = Arc::new(transport);
        let counters = Arc::new(Counters::default());
        let running = Arc::new(AtomicBool::new(true));

        let receive_loop = ReceiveLoop {
            schema: Arc::clone(&schema),
            transport: Arc::clone(&transport),
            sender,
            counters: Arc::clone(&counters),
            running: Arc::clone(&running),
            poll_interval: config.poll_interval,
            callback,
        };
        let worker = thread::Builder::new()
            .name(format!("canschema-rx-{}", schema.name()))
            .spawn(move || receive_loop.run())?;

        log::info!(
            "Opened {} ({} messages, queue capacity {})",
            schema.name(),
            schema.len(),
            config.queue_capacity
        );

        Ok(Self {
            schema,
            config,
            transport,
            receiver,
            counters,
            running,
            worker: Some(worker),
        })
    }

    /// The schema frames are resolved against.
    pub fn schema(&self) -> &Arc<Bus> {
        &self.schema
    }

    /// The active configuration.
    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    /// Returns true while the receive thread is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
            && self.worker.as_ref().is_some_and(|w| !w.is_finished())
    }

    /// Current receive counters.
    pub fn stats(&self) -> BusStats {
        self.counters.snapshot()
    }

    /// Encode a message and transmit it from the node at `node_offset`.
    pub fn send(&self, message_name: &str, values: &[(&str, SignalValue)], node_offset: u8) -> Result<()> {
        if !self.is_running() {
            return Err(Error::BusClosed);
        }

        let encoded = FrameCodec::new(&self.schema).encode(message_name, values, node_offset)?;
        let frame = self.build_frame(&encoded)?;
        self.transport
            .transmit(&frame)
            .map_err(|e| Error::Transport(e.to_string()))?;

        log::debug!(
            "Sent {} on 0x{:X} ({} bytes)",
            message_name,
            encoded.arbitration_id,
            encoded.data.len()
        );
        Ok(())
    }

    fn build_frame(&self, encoded: &EncodedFrame) -> Result<T::Frame> {
        let id = encoded.id()?;
        let frame = if self.config.fd || encoded.is_fd() {
            let flags = FdFlags::new(self.config.bit_rate_switch, false);
            <T::Frame as FdFrame>::new_fd(id, &encoded.data, flags)
        } else {
            <T::Frame as Frame>::new(id, &encoded.data)
        };
        frame.ok_or_else(|| {
            Error::Transport(format!(
                "transport cannot carry a {}-byte frame",
                encoded.data.len()
            ))
        })
    }

    /// Wait up to `timeout` for the next decoded message.
    ///
    /// Returns `Ok(None)` on timeout and [`Error::BusClosed`] once the receive
    /// thread has stopped and the queue is empty.
    pub fn recv(&self, timeout: Duration) -> Result<Option<ReceivedMessage>> {
        match self.receiver.recv_timeout(timeout) {
            Ok(message) => Ok(Some(message)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(Error::BusClosed),
        }
    }

    /// Take the next decoded message if one is queued.
    pub fn try_recv(&self) -> Result<Option<ReceivedMessage>> {
        match self.receiver.try_recv() {
            Ok(message) => Ok(Some(message)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(Error::BusClosed),
        }
    }

    /// Stop the receive thread and return the transport.
    pub fn shutdown(mut self) -> Result<T> {
        self.stop();
        let transport = Arc::clone(&self.transport);
        drop(self);
        Arc::try_unwrap(transport)
            .map_err(|_| Error::Transport(String::from("transport still shared after shutdown")))
    }

    fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        self.running.store(false, Ordering::Release);
        if worker.join().is_err() {
            log::error!("Receive thread of {} panicked", self.schema.name());
        }

        let stats = self.stats();
        log::info!(
            "Closed {}: {} received, {} delivered, {} unrecognized, {} decode errors, {} dropped",
            self.schema.name(),
            stats.received,
            stats.delivered,
            stats.unrecognized,
            stats.decode_errors,
            stats.dropped
        );
    }
}

impl<T: Transport> Drop for CanBus<T> {
    fn drop(&mut self) {
        self.stop();
    }
}

impl<T: Transport> fmt::Debug for CanBus<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CanBus")
            .field("schema", &self.schema.name())
            .field("config", &self.config)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

/// State owned by the receive thread.
struct ReceiveLoop<T: Transport> {
    schema: Arc<Bus>,
    transport: Arc<T>,
    sender: SyncSender<ReceivedMessage>,
    counters: Arc<Counters>,
    running: Arc<AtomicBool>,
    poll_interval: Duration,
    callback: Option<MessageCallback>,
}

impl<T: Transport> ReceiveLoop<T> {
    fn run(mut self) {
        let schema = Arc::clone(&self.schema);
        let codec = FrameCodec::new(&schema);

        while self.running.load(Ordering::Acquire) {
            match self.transport.receive_timeout(self.poll_interval) {
                Ok(Some(frame)) => {
                    if !self.dispatch(&codec, &frame) {
                        break;
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    Counters::bump(&self.counters.transport_errors);
                    log::error!("Receive on {} failed: {}", schema.name(), e);
                    thread::sleep(self.poll_interval);
                }
            }
        }
        log::debug!("Receive thread of {} stopped", schema.name());
    }

    /// Handle one frame. Returns false once nobody can receive messages.
    fn dispatch(&mut self, codec: &FrameCodec<'_>, frame: &T::Frame) -> bool {
        Counters::bump(&self.counters.received);
        let arbitration_id = raw_id(frame.id());
        if frame.is_remote_frame() {
            log::debug!("Ignoring remote frame 0x{:X}", arbitration_id);
            return true;
        }

        let resolved = match codec.resolve(arbitration_id, frame.data()) {
            Ok(resolved) => resolved,
            Err(Error::UnrecognizedFrame { .. }) => {
                Counters::bump(&self.counters.unrecognized);
                log::warn!("Unrecognized frame 0x{:X}", arbitration_id);
                return true;
            }
            Err(e) => {
                Counters::bump(&self.counters.decode_errors);
                log::error!("Failed to decode frame 0x{:X}: {}", arbitration_id, e);
                return true;
            }
        };

        log::debug!(
            "Frame 0x{:X} is {} from node {}",
            arbitration_id,
            resolved.message.name(),
            resolved.node_offset
        );
        let message = ReceivedMessage::from_resolved(arbitration_id, resolved);
        if let Some(callback) = self.callback.as_mut() {
            callback(&message);
        }

        match self.sender.try_send(message) {
            Ok(()) => {
                Counters::bump(&self.counters.delivered);
                true
            }
            Err(TrySendError::Full(message)) => {
                Counters::bump(&self.counters.dropped);
                log::warn!(
                    "Receive queue full, dropped {} from node {}",
                    message.message,
                    message.node_offset
                );
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }
}
