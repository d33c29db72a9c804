//! The copiable text a person relays between devices during manual
//! signaling.
//!
//! A blob is the session description `{"type":"offer"|"answer","sdp":".."}`
//! with every ICE candidate already embedded, so one message in each
//! direction is enough. It is shared as base64url JSON; raw JSON (what a
//! browser would print) is accepted on input too.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::NetError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SdpKind {
    Offer,
    Answer,
}

impl std::fmt::Display for SdpKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SdpKind::Offer => f.write_str("offer"),
            SdpKind::Answer => f.write_str("answer"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SignalBlob {
    #[serde(rename = "type")]
    pub kind: SdpKind,
    pub sdp: String,
}

impl SignalBlob {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Answer,
            sdp: sdp.into(),
        }
    }

    /// Encode as the base64url text shown to the user.
    pub fn encode(&self) -> Result<String, NetError> {
        let json = serde_json::to_vec(self)
            .map_err(|e| NetError::MalformedSignal(format!("serialize: {e}")))?;
        Ok(URL_SAFE_NO_PAD.encode(json))
    }

    /// Parse pasted text of either kind.
    ///
    /// Whitespace introduced by copy and paste is ignored.
    pub fn parse(text: &str) -> Result<Self, NetError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(NetError::MalformedSignal("empty input".into()));
        }

        let blob: SignalBlob = if trimmed.starts_with('{') {
            serde_json::from_str(trimmed)
                .map_err(|e| NetError::MalformedSignal(format!("invalid JSON: {e}")))?
        } else {
            let compact: String = trimmed.chars().filter(|c| !c.is_whitespace()).collect();
            let bytes = URL_SAFE_NO_PAD
                .decode(compact.trim_end_matches('='))
                .map_err(|e| NetError::MalformedSignal(format!("invalid base64: {e}")))?;
            serde_json::from_slice(&bytes)
                .map_err(|e| NetError::MalformedSignal(format!("invalid JSON: {e}")))?
        };

        blob.validate()?;
        Ok(blob)
    }

    /// Parse pasted text and require it to be of `expected` kind.
    pub fn decode(text: &str, expected: SdpKind) -> Result<Self, NetError> {
        let blob = Self::parse(text)?;
        if blob.kind != expected {
            return Err(NetError::MalformedSignal(format!(
                "expected an {expected}, got an {}",
                blob.kind
            )));
        }
        Ok(blob)
    }

    fn validate(&self) -> Result<(), NetError> {
        if !self.sdp.trim_start().starts_with("v=") {
            return Err(NetError::MalformedSignal(
                "session description must start with v=".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SDP: &str = "v=0\r\no=- 1 2 IN IP4 127.0.0.1\r\ns=-\r\nt=0 0\r\n";

    #[test]
    fn test_encode_parse_roundtrip() {
        let blob = SignalBlob::offer(SDP);
        let text = blob.encode().unwrap();
        assert!(!text.contains('{'));
        assert_eq!(SignalBlob::parse(&text).unwrap(), blob);
    }

    #[test]
    fn test_accepts_raw_json() {
        let text = format!(r#"{{"type":"answer","sdp":{}}}"#, serde_json::json!(SDP));
        let blob = SignalBlob::decode(&text, SdpKind::Answer).unwrap();
        assert_eq!(blob, SignalBlob::answer(SDP));
    }

    #[test]
    fn test_tolerates_wrapped_paste() {
        let text = SignalBlob::answer(SDP).encode().unwrap();
        let (head, tail) = text.split_at(text.len() / 2);
        let wrapped = format!("  {head}\n{tail}\n");
        assert_eq!(SignalBlob::parse(&wrapped).unwrap(), SignalBlob::answer(SDP));
    }

    #[test]
    fn test_wrong_kind_rejected() {
        let text = SignalBlob::offer(SDP).encode().unwrap();
        assert!(matches!(
            SignalBlob::decode(&text, SdpKind::Answer),
            Err(NetError::MalformedSignal(_))
        ));
    }

    #[test]
    fn test_garbage_rejected() {
        for input in ["", "   ", "not a code!", "{\"type\":\"offer\"}", "e30"] {
            assert!(
                matches!(SignalBlob::parse(input), Err(NetError::MalformedSignal(_))),
                "accepted {input:?}"
            );
        }
    }

    #[test]
    fn test_sdp_must_look_like_sdp() {
        let text = SignalBlob::offer("hello").encode().unwrap();
        assert!(matches!(
            SignalBlob::parse(&text),
            Err(NetError::MalformedSignal(_))
        ));
    }
}
