//! # peerchat-net
//!
//! Connection negotiation for two devices that exchange signaling text by
//! hand, and the data channel it yields.

pub mod error;
#[cfg(any(test, feature = "loopback"))]
pub mod loopback;
pub mod negotiator;
pub mod signal;
pub mod state;
pub mod transport;
pub mod webrtc_peer;

pub use error::NetError;
pub use negotiator::{Negotiator, PeerChannel, PeerLink};
pub use signal::{SdpKind, SignalBlob};
pub use state::{AbandonReason, NegotiationState, Role, Transition};
pub use transport::{ChannelEvent, PeerTransport, TransportConfig, EVENT_QUEUE_CAPACITY};
pub use webrtc_peer::WebRtcTransport;
