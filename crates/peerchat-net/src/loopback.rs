//! In-process [`PeerTransport`] pair.
//!
//! The signaling text is still produced and parsed, so a test drives the
//! negotiator exactly as a person would: copy the offer from one side,
//! paste it into the other, and carry the answer back.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use crate::error::NetError;
use crate::signal::{SdpKind, SignalBlob};
use crate::transport::{ChannelEvent, PeerTransport};

struct Hub {
    session: String,
    queues: [mpsc::Sender<ChannelEvent>; 2],
    offered_by: Option<usize>,
    open: bool,
    closed: bool,
}

impl Hub {
    fn sdp(&self, kind: SdpKind) -> String {
        format!(
            "v=0\r\no=- {session} 1 IN IP4 127.0.0.1\r\ns=peerchat-loopback\r\nt=0 0\r\n\
             a=loopback-session:{session}\r\na=loopback-role:{kind}\r\n",
            session = self.session
        )
    }

    fn owns(&self, blob: &SignalBlob) -> bool {
        blob.sdp
            .contains(&format!("a=loopback-session:{}", self.session))
    }

    fn broadcast(&self, event: ChannelEvent) {
        for queue in &self.queues {
            let _ = queue.try_send(event.clone());
        }
    }

    fn shut(&mut self, event: ChannelEvent) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.open = false;
        self.broadcast(event);
    }
}

pub struct LoopbackTransport {
    side: usize,
    hub: Arc<Mutex<Hub>>,
}

/// Test handle on a loopback pair, for simulating network faults.
#[derive(Clone)]
pub struct LoopbackControl {
    hub: Arc<Mutex<Hub>>,
}

impl LoopbackTransport {
    /// Two connected ends. Events for each end go to the queue given for it.
    pub fn pair(
        a_events: mpsc::Sender<ChannelEvent>,
        b_events: mpsc::Sender<ChannelEvent>,
    ) -> (LoopbackTransport, LoopbackTransport, LoopbackControl) {
        let hub = Arc::new(Mutex::new(Hub {
            session: Uuid::new_v4().simple().to_string(),
            queues: [a_events, b_events],
            offered_by: None,
            open: false,
            closed: false,
        }));

        (
            LoopbackTransport {
                side: 0,
                hub: hub.clone(),
            },
            LoopbackTransport {
                side: 1,
                hub: hub.clone(),
            },
            LoopbackControl { hub },
        )
    }

    fn hub(&self) -> Result<MutexGuard<'_, Hub>, NetError> {
        self.hub
            .lock()
            .map_err(|_| NetError::TransportFailure("loopback hub poisoned".into()))
    }
}

impl PeerTransport for LoopbackTransport {
    async fn create_offer(&self) -> Result<SignalBlob, NetError> {
        let mut hub = self.hub()?;
        if hub.closed {
            return Err(NetError::TransportFailure("connection closed".into()));
        }
        hub.offered_by = Some(self.side);
        Ok(SignalBlob::offer(hub.sdp(SdpKind::Offer)))
    }

    async fn create_answer(&self, offer: &SignalBlob) -> Result<SignalBlob, NetError> {
        let hub = self.hub()?;
        if !hub.owns(offer) || hub.offered_by.is_none() || hub.offered_by == Some(self.side) {
            return Err(NetError::MalformedSignal(
                "offer does not belong to this connection".into(),
            ));
        }
        Ok(SignalBlob::answer(hub.sdp(SdpKind::Answer)))
    }

    async fn apply_answer(&self, answer: &SignalBlob) -> Result<(), NetError> {
        let mut hub = self.hub()?;
        if !hub.owns(answer) || hub.offered_by != Some(self.side) {
            return Err(NetError::MalformedSignal(
                "answer does not belong to this connection".into(),
            ));
        }
        if hub.closed {
            return Err(NetError::TransportFailure("connection closed".into()));
        }
        hub.open = true;
        debug!(session = %hub.session, "Loopback channel open");
        hub.broadcast(ChannelEvent::Opened);
        Ok(())
    }

    async fn send(&self, text: &str) -> Result<(), NetError> {
        let hub = self.hub()?;
        if !hub.open {
            return Err(NetError::TransportFailure("data channel is not open".into()));
        }
        hub.queues[1 - self.side]
            .try_send(ChannelEvent::Data(text.to_owned()))
            .map_err(|e| NetError::TransportFailure(format!("peer queue: {e}")))
    }

    async fn close(&self) -> Result<(), NetError> {
        self.hub()?.shut(ChannelEvent::Closed);
        Ok(())
    }
}

impl LoopbackControl {
    /// Drop the link as if the network went away.
    pub fn sever(&self) {
        if let Ok(mut hub) = self.hub.lock() {
            hub.shut(ChannelEvent::Closed);
        }
    }

    /// Fail the link with a transport error on both ends.
    pub fn fail(&self, reason: &str) {
        if let Ok(mut hub) = self.hub.lock() {
            hub.shut(ChannelEvent::Failed(reason.to_owned()));
        }
    }

    pub fn is_open(&self) -> bool {
        self.hub.lock().map(|hub| hub.open).unwrap_or(false)
    }
}
