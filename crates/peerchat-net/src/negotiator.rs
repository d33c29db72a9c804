//! Drives one connection attempt from the first copied offer to an open,
//! identified channel.
//!
//! The person relays text between devices by hand: the initiator calls
//! [`Negotiator::create_offer`] and shares the result, the responder
//! pastes it into [`Negotiator::accept_offer`] and shares the answer back,
//! and the initiator pastes that into [`Negotiator::finalize`]. Both sides
//! then await [`Negotiator::wait_connected`], which hands over a
//! [`PeerLink`] once the channel is open and this user has been announced.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use peerchat_shared::protocol::ChannelPayload;
use peerchat_shared::session::SessionContext;

use crate::error::NetError;
use crate::signal::{SdpKind, SignalBlob};
use crate::state::{AbandonReason, NegotiationState, Role, Transition};
use crate::transport::{ChannelEvent, PeerTransport, TransportConfig, EVENT_QUEUE_CAPACITY};
use crate::webrtc_peer::WebRtcTransport;

pub struct Negotiator<T: PeerTransport> {
    session: SessionContext,
    transport: Arc<T>,
    events: Option<mpsc::Receiver<ChannelEvent>>,
    state: NegotiationState,
    open_timeout: Option<Duration>,
}

impl Negotiator<WebRtcTransport> {
    /// A negotiator over a fresh WebRTC peer connection.
    pub async fn webrtc(session: SessionContext, config: TransportConfig) -> Result<Self, NetError> {
        let (tx, rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        let transport = WebRtcTransport::new(config, tx).await?;
        Ok(Self::new(session, transport, rx))
    }
}

impl<T: PeerTransport> Negotiator<T> {
    /// `events` must be the queue `transport` reports on.
    pub fn new(session: SessionContext, transport: T, events: mpsc::Receiver<ChannelEvent>) -> Self {
        Self {
            session,
            transport: Arc::new(transport),
            events: Some(events),
            state: NegotiationState::Idle,
            open_timeout: None,
        }
    }

    /// Give up waiting for the channel to open after `limit`.
    pub fn with_open_timeout(mut self, limit: Option<Duration>) -> Self {
        self.open_timeout = limit;
        self
    }

    pub fn state(&self) -> &NegotiationState {
        &self.state
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    /// Start as initiator. Returns the offer text to hand to the peer.
    pub async fn create_offer(&mut self) -> Result<String, NetError> {
        let next = self.state.apply(&Transition::OfferCreated)?;

        match self.transport.create_offer().await.and_then(|b| b.encode()) {
            Ok(text) => {
                self.state = next;
                info!(user = %self.session.user_id().short(), "Offer created");
                Ok(text)
            }
            Err(e) => Err(self.on_error(e).await),
        }
    }

    /// Start as responder from the initiator's offer text. Returns the
    /// answer text to hand back.
    pub async fn accept_offer(&mut self, text: &str) -> Result<String, NetError> {
        let offer = SignalBlob::decode(text, SdpKind::Offer)?;
        let next = self.state.apply(&Transition::AnswerCreated)?;

        match self
            .transport
            .create_answer(&offer)
            .await
            .and_then(|b| b.encode())
        {
            Ok(answer) => {
                self.state = next;
                info!(user = %self.session.user_id().short(), "Offer accepted, answer created");
                Ok(answer)
            }
            Err(e) => Err(self.on_error(e).await),
        }
    }

    /// Apply the responder's answer text.
    pub async fn finalize(&mut self, text: &str) -> Result<(), NetError> {
        let answer = SignalBlob::decode(text, SdpKind::Answer)?;
        let next = self.state.apply(&Transition::AnswerApplied)?;

        match self.transport.apply_answer(&answer).await {
            Ok(()) => {
                self.state = next;
                info!(user = %self.session.user_id().short(), "Answer applied");
                Ok(())
            }
            Err(e) => Err(self.on_error(e).await),
        }
    }

    /// Wait for the channel to open, announce this user on it, and hand
    /// the live link over.
    pub async fn wait_connected(&mut self) -> Result<PeerLink<T>, NetError> {
        let next = self.state.apply(&Transition::ChannelOpened)?;
        let mut events = self.events.take().ok_or(NetError::ProtocolSequence {
            state: self.state.name(),
            operation: "wait for the channel",
        })?;

        let mut early = VecDeque::new();
        let opened = await_open(&mut events, &mut early);
        let outcome = match self.open_timeout {
            Some(limit) => tokio::time::timeout(limit, opened).await.unwrap_or_else(|_| {
                Err(NetError::TransportFailure(
                    "timed out waiting for the data channel".into(),
                ))
            }),
            None => opened.await,
        };
        if let Err(e) = outcome {
            return Err(self.on_error(e).await);
        }

        self.state = next;
        let channel = PeerChannel {
            transport: self.transport.clone(),
        };
        if let Err(e) = channel.send_payload(&self.session.announcement()).await {
            return Err(self.on_error(e).await);
        }

        let role = match &self.state {
            NegotiationState::Connected(role) => *role,
            _ => Role::Initiator,
        };
        info!(?role, user = %self.session.user_id().short(), "Peer channel connected");

        Ok(PeerLink {
            channel,
            events,
            pending: early,
        })
    }

    /// Cancel the attempt, or drop an established link. Closes the
    /// transport; a [`PeerLink`] already handed out sees the channel close.
    pub async fn abandon(&mut self) {
        if self.state.is_abandoned() {
            return;
        }
        info!(state = self.state.name(), "Abandoning connection");
        self.teardown(AbandonReason::Cancelled).await;
    }

    async fn on_error(&mut self, e: NetError) -> NetError {
        if let NetError::TransportFailure(reason) = &e {
            warn!(%reason, state = self.state.name(), "Connection attempt failed");
            self.teardown(AbandonReason::TransportFailed(reason.clone()))
                .await;
        }
        e
    }

    async fn teardown(&mut self, reason: AbandonReason) {
        if let Ok(next) = self.state.apply(&Transition::Abandon(reason)) {
            self.state = next;
        }
        self.events = None;
        if let Err(e) = self.transport.close().await {
            debug!(error = %e, "Transport close failed");
        }
    }
}

async fn await_open(
    events: &mut mpsc::Receiver<ChannelEvent>,
    early: &mut VecDeque<String>,
) -> Result<(), NetError> {
    loop {
        match events.recv().await {
            Some(ChannelEvent::Opened) => return Ok(()),
            // The peer may announce itself before our open callback fires.
            Some(ChannelEvent::Data(text)) => early.push_back(text),
            Some(ChannelEvent::Closed) => {
                return Err(NetError::TransportFailure(
                    "channel closed before it opened".into(),
                ))
            }
            Some(ChannelEvent::Failed(reason)) => return Err(NetError::TransportFailure(reason)),
            None => return Err(NetError::TransportFailure("transport stopped".into())),
        }
    }
}

/// Sending half of an open channel. Cheap to clone.
pub struct PeerChannel<T> {
    transport: Arc<T>,
}

impl<T> Clone for PeerChannel<T> {
    fn clone(&self) -> Self {
        Self {
            transport: self.transport.clone(),
        }
    }
}

impl<T: PeerTransport> PeerChannel<T> {
    pub async fn send_payload(&self, payload: &ChannelPayload) -> Result<(), NetError> {
        let text = payload.encode()?;
        self.transport.send(&text).await
    }

    pub async fn close(&self) -> Result<(), NetError> {
        self.transport.close().await
    }
}

/// An open, announced channel: the sending half plus the inbound events.
pub struct PeerLink<T> {
    channel: PeerChannel<T>,
    events: mpsc::Receiver<ChannelEvent>,
    pending: VecDeque<String>,
}

impl<T: PeerTransport> PeerLink<T> {
    pub fn channel(&self) -> &PeerChannel<T> {
        &self.channel
    }

    /// The next inbound event; `None` once the transport is gone.
    pub async fn next_event(&mut self) -> Option<ChannelEvent> {
        if let Some(text) = self.pending.pop_front() {
            return Some(ChannelEvent::Data(text));
        }
        self.events.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use peerchat_shared::models::User;
    use peerchat_shared::types::UserId;

    use crate::loopback::{LoopbackControl, LoopbackTransport};

    type Side = Negotiator<LoopbackTransport>;

    fn session(phone: &str, name: &str) -> SessionContext {
        SessionContext::new(User {
            phone: UserId::new(phone),
            username: name.into(),
            avatar: name[..1].to_uppercase(),
            created_at: Utc::now(),
        })
    }

    fn pair() -> (Side, Side, LoopbackControl) {
        let (tx_x, rx_x) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        let (tx_y, rx_y) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        let (x, y, control) = LoopbackTransport::pair(tx_x, tx_y);
        (
            Negotiator::new(session("+256700000001", "amina"), x, rx_x),
            Negotiator::new(session("+256700000002", "bosco"), y, rx_y),
            control,
        )
    }

    async fn next_payload(link: &mut PeerLink<LoopbackTransport>) -> ChannelPayload {
        match link.next_event().await {
            Some(ChannelEvent::Data(text)) => ChannelPayload::decode(&text).unwrap(),
            other => panic!("expected data, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_connect_and_announce() {
        let (mut x, mut y, _control) = pair();

        let offer = x.create_offer().await.unwrap();
        assert_eq!(x.state(), &NegotiationState::OfferCreated);
        let answer = y.accept_offer(&offer).await.unwrap();
        assert_eq!(y.state(), &NegotiationState::AnswerCreated);
        x.finalize(&answer).await.unwrap();

        let mut x_link = x.wait_connected().await.unwrap();
        let mut y_link = y.wait_connected().await.unwrap();
        assert_eq!(x.state(), &NegotiationState::Connected(Role::Initiator));
        assert_eq!(y.state(), &NegotiationState::Connected(Role::Responder));

        match next_payload(&mut x_link).await {
            ChannelPayload::UserInfo(user) => assert_eq!(user.username, "bosco"),
            other => panic!("expected user-info, got {other:?}"),
        }
        match next_payload(&mut y_link).await {
            ChannelPayload::UserInfo(user) => assert_eq!(user.username, "amina"),
            other => panic!("expected user-info, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_finalize_before_offer() {
        let (mut x, _y, control) = pair();

        // A well-formed answer from another attempt.
        let (mut p, mut q, _) = pair();
        let offer = p.create_offer().await.unwrap();
        let answer = q.accept_offer(&offer).await.unwrap();

        let err = x.finalize(&answer).await.unwrap_err();
        assert!(matches!(err, NetError::ProtocolSequence { state: "idle", .. }));
        assert!(!err.is_recoverable());
        assert_eq!(x.state(), &NegotiationState::Idle);
        assert!(!control.is_open());
    }

    #[tokio::test]
    async fn test_foreign_offer_rejected() {
        let (_x, mut y, _control) = pair();
        let (mut other, _, _) = pair();
        let offer = other.create_offer().await.unwrap();

        let err = y.accept_offer(&offer).await.unwrap_err();
        assert!(matches!(err, NetError::MalformedSignal(_)));
        assert_eq!(y.state(), &NegotiationState::Idle);
    }

    #[tokio::test]
    async fn test_malformed_input_keeps_state() {
        let (mut x, mut y, _control) = pair();

        for junk in ["", "hello", "{\"type\":\"offer\",\"sdp\":\"nope\"}"] {
            let err = y.accept_offer(junk).await.unwrap_err();
            assert!(matches!(err, NetError::MalformedSignal(_)), "{junk:?}: {err}");
            assert_eq!(y.state(), &NegotiationState::Idle);
        }

        let offer = x.create_offer().await.unwrap();
        // An offer pasted where an answer belongs.
        let err = x.finalize(&offer).await.unwrap_err();
        assert!(matches!(err, NetError::MalformedSignal(_)));
        assert_eq!(x.state(), &NegotiationState::OfferCreated);

        // The attempt is still usable.
        let answer = y.accept_offer(&offer).await.unwrap();
        x.finalize(&answer).await.unwrap();
        assert_eq!(x.state(), &NegotiationState::AnswerApplied);
    }

    #[tokio::test]
    async fn test_abandon_then_reuse_rejected() {
        let (mut x, _y, control) = pair();
        x.create_offer().await.unwrap();

        x.abandon().await;
        assert_eq!(
            x.state(),
            &NegotiationState::Abandoned(AbandonReason::Cancelled)
        );
        assert!(!control.is_open());
        assert!(matches!(
            x.create_offer().await,
            Err(NetError::ProtocolSequence { .. })
        ));

        // Idempotent.
        x.abandon().await;
        assert!(x.state().is_abandoned());
    }

    #[tokio::test]
    async fn test_transport_failure_while_waiting() {
        let (mut x, mut y, control) = pair();
        let offer = x.create_offer().await.unwrap();
        y.accept_offer(&offer).await.unwrap();

        control.fail("ice failed");
        let err = y.wait_connected().await.err().expect("must fail");
        assert!(matches!(err, NetError::TransportFailure(_)));
        assert!(!err.is_recoverable());
        assert_eq!(
            y.state(),
            &NegotiationState::Abandoned(AbandonReason::TransportFailed("ice failed".into()))
        );
    }

    #[tokio::test]
    async fn test_open_timeout() {
        let (mut x, y, _control) = pair();
        let mut y = y.with_open_timeout(Some(Duration::from_millis(50)));
        let offer = x.create_offer().await.unwrap();
        y.accept_offer(&offer).await.unwrap();

        // The initiator never finalizes.
        let err = y.wait_connected().await.err().expect("must time out");
        assert!(matches!(err, NetError::TransportFailure(_)));
        assert!(y.state().is_abandoned());
    }

    #[tokio::test]
    async fn test_abandon_after_connect_closes_link() {
        let (mut x, mut y, _control) = pair();
        let offer = x.create_offer().await.unwrap();
        let answer = y.accept_offer(&offer).await.unwrap();
        x.finalize(&answer).await.unwrap();
        let _x_link = x.wait_connected().await.unwrap();
        let mut y_link = y.wait_connected().await.unwrap();

        x.abandon().await;

        assert!(matches!(
            next_payload(&mut y_link).await,
            ChannelPayload::UserInfo(_)
        ));
        assert_eq!(y_link.next_event().await, Some(ChannelEvent::Closed));
        assert!(y_link
            .channel()
            .send_payload(&y.session().announcement())
            .await
            .is_err());
    }
}
