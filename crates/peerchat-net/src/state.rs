//! Negotiation lifecycle as a pure transition function.
//!
//! ```text
//! Idle ──offer──▶ OfferCreated ──answer applied──▶ AnswerApplied ──open──▶ Connected(Initiator)
//!  └──accept offer──▶ AnswerCreated ─────────────────────────────open──▶ Connected(Responder)
//! any ──abandon──▶ Abandoned
//! ```

use crate::error::NetError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Initiator,
    Responder,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbandonReason {
    Cancelled,
    TransportFailed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NegotiationState {
    Idle,
    OfferCreated,
    AnswerCreated,
    AnswerApplied,
    Connected(Role),
    Abandoned(AbandonReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    OfferCreated,
    AnswerCreated,
    AnswerApplied,
    ChannelOpened,
    Abandon(AbandonReason),
}

impl NegotiationState {
    pub fn name(&self) -> &'static str {
        match self {
            NegotiationState::Idle => "idle",
            NegotiationState::OfferCreated => "waiting for an answer",
            NegotiationState::AnswerCreated => "waiting for the channel to open",
            NegotiationState::AnswerApplied => "waiting for the channel to open",
            NegotiationState::Connected(_) => "connected",
            NegotiationState::Abandoned(_) => "abandoned",
        }
    }

    pub fn is_abandoned(&self) -> bool {
        matches!(self, NegotiationState::Abandoned(_))
    }

    /// The state after `transition`, or a sequence error leaving `self`
    /// as it was. Abandoning is allowed from anywhere; abandoning twice
    /// keeps the first reason.
    pub fn apply(&self, transition: &Transition) -> Result<NegotiationState, NetError> {
        use NegotiationState as S;

        match (self, transition) {
            (S::Abandoned(_), Transition::Abandon(_)) => Ok(self.clone()),
            (_, Transition::Abandon(reason)) => Ok(S::Abandoned(reason.clone())),
            (S::Idle, Transition::OfferCreated) => Ok(S::OfferCreated),
            (S::Idle, Transition::AnswerCreated) => Ok(S::AnswerCreated),
            (S::OfferCreated, Transition::AnswerApplied) => Ok(S::AnswerApplied),
            (S::AnswerApplied, Transition::ChannelOpened) => Ok(S::Connected(Role::Initiator)),
            (S::AnswerCreated, Transition::ChannelOpened) => Ok(S::Connected(Role::Responder)),
            (state, transition) => Err(NetError::ProtocolSequence {
                state: state.name(),
                operation: transition.operation(),
            }),
        }
    }
}

impl Transition {
    fn operation(&self) -> &'static str {
        match self {
            Transition::OfferCreated => "create an offer",
            Transition::AnswerCreated => "accept an offer",
            Transition::AnswerApplied => "finalize an answer",
            Transition::ChannelOpened => "wait for the channel",
            Transition::Abandon(_) => "abandon",
        }
    }
}
