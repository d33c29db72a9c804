//! The seam between the negotiator and whatever actually carries bytes.

use std::future::Future;
use std::time::Duration;

use peerchat_shared::constants::DEFAULT_STUN_URL;

use crate::error::NetError;
use crate::signal::SignalBlob;

/// Capacity of the per-connection event queue.
pub const EVENT_QUEUE_CAPACITY: usize = 256;

/// Raised by a transport on the queue it was built with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// The data channel is open in both directions.
    Opened,
    /// One text frame from the peer.
    Data(String),
    Closed,
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub ice_urls: Vec<String>,
    /// Upper bound on ICE candidate gathering. `None` waits indefinitely.
    pub gather_timeout: Option<Duration>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            ice_urls: vec![DEFAULT_STUN_URL.to_string()],
            gather_timeout: None,
        }
    }
}

/// One peer connection carrying one data channel.
///
/// Offers and answers returned here are complete: candidate gathering has
/// finished before they are handed back.
pub trait PeerTransport: Send + Sync + 'static {
    /// Create the data channel and a local offer.
    fn create_offer(&self) -> impl Future<Output = Result<SignalBlob, NetError>> + Send;

    /// Apply a remote offer and produce the local answer.
    ///
    /// An offer the transport cannot use is a [`NetError::MalformedSignal`]
    /// and leaves the connection untouched.
    fn create_answer(
        &self,
        offer: &SignalBlob,
    ) -> impl Future<Output = Result<SignalBlob, NetError>> + Send;

    /// Apply the remote answer to a connection that made an offer.
    fn apply_answer(&self, answer: &SignalBlob)
        -> impl Future<Output = Result<(), NetError>> + Send;

    /// Send one text frame. Fails unless the channel is open.
    fn send(&self, text: &str) -> impl Future<Output = Result<(), NetError>> + Send;

    /// Tear the connection down. Idempotent.
    fn close(&self) -> impl Future<Output = Result<(), NetError>> + Send;
}
