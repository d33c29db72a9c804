use thiserror::Error;

use peerchat_shared::error::ProtocolError;

#[derive(Error, Debug)]
pub enum NetError {
    /// The pasted text is not a usable offer or answer. State is unchanged.
    #[error("Malformed signal: {0}")]
    MalformedSignal(String),

    /// The operation is not valid in the current negotiation state.
    #[error("Cannot {operation} while {state}")]
    ProtocolSequence {
        state: &'static str,
        operation: &'static str,
    },

    /// ICE, DTLS or SCTP failed, or the channel went away.
    #[error("Transport failure: {0}")]
    TransportFailure(String),

    #[error("Payload error: {0}")]
    Protocol(#[from] ProtocolError),
}

impl NetError {
    /// Whether the same negotiation can continue after this error. Anything
    /// else means starting a fresh session.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, NetError::MalformedSignal(_))
    }

    /// Short text suitable for showing to the person doing the exchange.
    pub fn user_hint(&self) -> &'static str {
        match self {
            NetError::MalformedSignal(_) => {
                "That text is not a valid connection code. Copy the whole code and try again."
            }
            NetError::ProtocolSequence { .. } => {
                "That step does not fit the current connection attempt. Start a new one."
            }
            NetError::TransportFailure(_) => {
                "The connection could not be established. Start a new connection attempt."
            }
            NetError::Protocol(_) => "The peer sent something this app does not understand.",
        }
    }
}

impl From<webrtc::Error> for NetError {
    fn from(e: webrtc::Error) -> Self {
        NetError::TransportFailure(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_split() {
        assert!(NetError::MalformedSignal("x".into()).is_recoverable());
        assert!(!NetError::ProtocolSequence {
            state: "idle",
            operation: "finalize"
        }
        .is_recoverable());
        assert!(!NetError::TransportFailure("ice".into()).is_recoverable());
    }

    #[test]
    fn test_sequence_message() {
        let e = NetError::ProtocolSequence {
            state: "idle",
            operation: "finalize an answer",
        };
        assert_eq!(e.to_string(), "Cannot finalize an answer while idle");
    }
}
