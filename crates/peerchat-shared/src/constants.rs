/// Application name
pub const APP_NAME: &str = "peerchat";

/// Label of the WebRTC data channel opened by the initiator
pub const DATA_CHANNEL_LABEL: &str = "chat";

/// Public STUN server used for reachability discovery
pub const DEFAULT_STUN_URL: &str = "stun:stun.l.google.com:19302";

/// Registration only accepts Ugandan numbers: this prefix followed by
/// `PHONE_DIGITS` digits.
pub const PHONE_COUNTRY_PREFIX: &str = "+256";
pub const PHONE_DIGITS: usize = 9;

/// Separator between the two sorted participant ids of a conversation id
pub const CONVERSATION_ID_SEPARATOR: char = '_';

/// Prefix of time-based group ids
pub const GROUP_ID_PREFIX: &str = "group_";

/// Discriminator values of the channel envelope `type` field
pub const PAYLOAD_TYPE_USER_INFO: &str = "user-info";
pub const PAYLOAD_TYPE_CHAT: &str = "chat";

/// Maximum chat message size in bytes (64 KiB, well under the SCTP
/// message limit of the data channel)
pub const MAX_MESSAGE_SIZE: usize = 65_536;
