//! Typed protocol messages.
//!
//! The wire layout is fixed by the daemon and must be preserved bit-exactly:
//! see the encode/decode impls for the field order of each message.
//! Optional data (username, session id) is optional in the API and encoded
//! as an empty string on the wire, which is what the daemon expects.

use bytes::Bytes;
use tracing::warn;

use crate::codec::{encode_frame, Frame};
use crate::constants::{HEADER_LEN, MAX_MESSAGE_LENGTH};
use crate::error::{Error, Result};
use crate::wire::{WireReader, WireWriter, INT_LEN};

// =============================================================================
// Greeter -> Daemon
// =============================================================================

/// Messages sent from the greeter to the daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GreeterMessage {
    /// Initial handshake carrying the greeter's protocol version.
    Connect { version: String },
    /// Start authenticating `username`, or prompt for one when `None`.
    Login {
        sequence: u32,
        username: Option<String>,
    },
    /// Start authenticating the guest account.
    LoginAsGuest { sequence: u32 },
    /// Answer the most recent authentication prompt.
    ContinueAuthentication { response: String },
    /// Start the named session, or the daemon's default when `None`.
    StartSession { session: Option<String> },
    /// Request cancellation of the in-flight authentication.
    CancelAuthentication,
}

impl GreeterMessage {
    /// Wire message id.
    pub fn id(&self) -> u32 {
        match self {
            GreeterMessage::Connect { .. } => 0,
            GreeterMessage::Login { .. } => 1,
            GreeterMessage::LoginAsGuest { .. } => 2,
            GreeterMessage::ContinueAuthentication { .. } => 3,
            GreeterMessage::StartSession { .. } => 4,
            GreeterMessage::CancelAuthentication => 5,
        }
    }

    /// Encode into a complete frame (header + payload).
    pub fn encode(&self) -> Bytes {
        let mut w = WireWriter::new(MAX_MESSAGE_LENGTH - HEADER_LEN);
        match self {
            GreeterMessage::Connect { version } => {
                w.put_string(version);
            }
            GreeterMessage::Login { sequence, username } => {
                w.put_u32(*sequence);
                w.put_string(username.as_deref().unwrap_or(""));
            }
            GreeterMessage::LoginAsGuest { sequence } => {
                w.put_u32(*sequence);
            }
            GreeterMessage::ContinueAuthentication { response } => {
                // TODO: the wire format allows several responses per
                // continue, but the daemon only ever requests one at a time.
                w.put_u32(1);
                w.put_string(response);
            }
            GreeterMessage::StartSession { session } => {
                w.put_string(session.as_deref().unwrap_or(""));
            }
            GreeterMessage::CancelAuthentication => {}
        }
        encode_frame(self.id(), &w.into_bytes())
    }
}

// =============================================================================
// Daemon -> Greeter
// =============================================================================

/// Style of one PAM conversation entry inside PROMPT_AUTHENTICATION.
///
/// Values on the wire are the Linux-PAM message style constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptStyle {
    /// `PAM_PROMPT_ECHO_OFF`: input the UI must not echo (passwords).
    Secret,
    /// `PAM_PROMPT_ECHO_ON`: visible input (usernames, OTP serials).
    Question,
    /// `PAM_ERROR_MSG`: error text to display.
    Error,
    /// `PAM_TEXT_INFO`: informational text to display.
    Info,
}

impl PromptStyle {
    pub fn from_wire(value: u32) -> Option<Self> {
        match value {
            1 => Some(PromptStyle::Secret),
            2 => Some(PromptStyle::Question),
            3 => Some(PromptStyle::Error),
            4 => Some(PromptStyle::Info),
            _ => None,
        }
    }

    pub fn to_wire(self) -> u32 {
        match self {
            PromptStyle::Secret => 1,
            PromptStyle::Question => 2,
            PromptStyle::Error => 3,
            PromptStyle::Info => 4,
        }
    }
}

/// Messages received from the daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    /// Handshake reply: daemon version plus configuration hints.
    Connected {
        version: String,
        hints: Vec<(String, String)>,
    },
    /// The daemon wants the greeter to exit.
    Quit,
    /// PAM conversation step for the attempt identified by `sequence`.
    PromptAuthentication {
        sequence: u32,
        messages: Vec<(PromptStyle, String)>,
    },
    /// Authentication finished; `return_code` 0 means success.
    EndAuthentication { sequence: u32, return_code: u32 },
    /// The started session exited or failed to launch.
    SessionFailed,
}

impl ServerMessage {
    /// Wire message id.
    pub fn id(&self) -> u32 {
        match self {
            ServerMessage::Connected { .. } => 0,
            ServerMessage::Quit => 1,
            ServerMessage::PromptAuthentication { .. } => 2,
            ServerMessage::EndAuthentication { .. } => 3,
            ServerMessage::SessionFailed => 4,
        }
    }

    /// Decode a complete frame into a typed message.
    ///
    /// Field-level truncation inside a known message decodes as zero/empty
    /// (see [`crate::wire`]); only an unknown message id is an error.
    pub fn decode(frame: &Frame) -> Result<Self> {
        let mut r = WireReader::new(&frame.payload);
        match frame.id {
            0 => {
                let version = r.get_string();
                let mut hints = Vec::new();
                while r.remaining() >= INT_LEN {
                    let name = r.get_string();
                    let value = r.get_string();
                    if name.is_empty() {
                        // A truncated pair decoded as empty; stop rather
                        // than loop on a corrupt tail.
                        warn!("discarding malformed hint tail in CONNECTED");
                        break;
                    }
                    hints.push((name, value));
                }
                Ok(ServerMessage::Connected { version, hints })
            }
            1 => Ok(ServerMessage::Quit),
            2 => {
                let sequence = r.get_u32();
                let count = r.get_u32();
                let mut messages = Vec::new();
                for _ in 0..count {
                    if r.remaining() < INT_LEN {
                        warn!(
                            declared = count,
                            decoded = messages.len(),
                            "prompt message count exceeds payload"
                        );
                        break;
                    }
                    let style = r.get_u32();
                    let text = r.get_string();
                    match PromptStyle::from_wire(style) {
                        Some(style) => messages.push((style, text)),
                        None => warn!(style, "skipping prompt with unknown style"),
                    }
                }
                Ok(ServerMessage::PromptAuthentication { sequence, messages })
            }
            3 => Ok(ServerMessage::EndAuthentication {
                sequence: r.get_u32(),
                return_code: r.get_u32(),
            }),
            4 => Ok(ServerMessage::SessionFailed),
            id => Err(Error::Protocol {
                message: format!("unknown message id {id} from daemon"),
            }),
        }
    }

    /// Encode into a complete frame.
    ///
    /// The library never sends these; this is the daemon-side layout, kept
    /// here so tests and tooling can fabricate daemon traffic.
    pub fn encode(&self) -> Bytes {
        let mut w = WireWriter::new(MAX_MESSAGE_LENGTH - HEADER_LEN);
        match self {
            ServerMessage::Connected { version, hints } => {
                w.put_string(version);
                for (name, value) in hints {
                    w.put_string(name);
                    w.put_string(value);
                }
            }
            ServerMessage::Quit => {}
            ServerMessage::PromptAuthentication { sequence, messages } => {
                w.put_u32(*sequence);
                w.put_u32(messages.len() as u32);
                for (style, text) in messages {
                    w.put_u32(style.to_wire());
                    w.put_string(text);
                }
            }
            ServerMessage::EndAuthentication {
                sequence,
                return_code,
            } => {
                w.put_u32(*sequence);
                w.put_u32(*return_code);
            }
            ServerMessage::SessionFailed => {}
        }
        encode_frame(self.id(), &w.into_bytes())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::decode_frame;
    use crate::wire::WireReader;
    use bytes::BytesMut;

    fn frame_of(bytes: Bytes) -> Frame {
        let mut buf = BytesMut::from(&bytes[..]);
        decode_frame(&mut buf).unwrap().unwrap()
    }

    #[test]
    fn login_roundtrip_preserves_sequence_and_username() {
        let encoded = GreeterMessage::Login {
            sequence: 42,
            username: Some("alice".into()),
        }
        .encode();

        let frame = frame_of(encoded);
        assert_eq!(frame.id, 1);

        let mut r = WireReader::new(&frame.payload);
        assert_eq!(r.get_u32(), 42);
        assert_eq!(r.get_string(), "alice");
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn login_without_username_encodes_empty_string() {
        let frame = frame_of(
            GreeterMessage::Login {
                sequence: 1,
                username: None,
            }
            .encode(),
        );
        let mut r = WireReader::new(&frame.payload);
        r.get_u32();
        assert_eq!(r.get_string(), "");
    }

    #[test]
    fn continue_authentication_carries_single_response() {
        let frame = frame_of(
            GreeterMessage::ContinueAuthentication {
                response: "hunter2".into(),
            }
            .encode(),
        );
        assert_eq!(frame.id, 3);
        let mut r = WireReader::new(&frame.payload);
        assert_eq!(r.get_u32(), 1);
        assert_eq!(r.get_string(), "hunter2");
    }

    #[test]
    fn cancel_authentication_has_empty_payload() {
        let frame = frame_of(GreeterMessage::CancelAuthentication.encode());
        assert_eq!(frame.id, 5);
        assert!(frame.payload.is_empty());
    }

    #[test]
    fn connected_decodes_version_and_hint_pairs() {
        let encoded = ServerMessage::Connected {
            version: "1.9".into(),
            hints: vec![
                ("default-session".into(), "gnome".into()),
                ("autologin-timeout".into(), "5".into()),
            ],
        }
        .encode();

        let decoded = ServerMessage::decode(&frame_of(encoded)).unwrap();
        assert_eq!(
            decoded,
            ServerMessage::Connected {
                version: "1.9".into(),
                hints: vec![
                    ("default-session".into(), "gnome".into()),
                    ("autologin-timeout".into(), "5".into()),
                ],
            }
        );
    }

    #[test]
    fn prompt_authentication_preserves_message_order() {
        let encoded = ServerMessage::PromptAuthentication {
            sequence: 7,
            messages: vec![
                (PromptStyle::Info, "welcome".into()),
                (PromptStyle::Secret, "Password:".into()),
            ],
        }
        .encode();

        match ServerMessage::decode(&frame_of(encoded)).unwrap() {
            ServerMessage::PromptAuthentication { sequence, messages } => {
                assert_eq!(sequence, 7);
                assert_eq!(messages[0], (PromptStyle::Info, "welcome".into()));
                assert_eq!(messages[1], (PromptStyle::Secret, "Password:".into()));
            }
            other => panic!("unexpected message {other:?}"),
        }
    }

    #[test]
    fn unknown_prompt_style_is_skipped() {
        let mut w = WireWriter::new(256);
        w.put_u32(1); // sequence
        w.put_u32(2); // count
        w.put_u32(99); // bogus style
        w.put_string("ignored");
        w.put_u32(4); // info
        w.put_string("kept");
        let frame = frame_of(encode_frame(2, &w.into_bytes()));

        match ServerMessage::decode(&frame).unwrap() {
            ServerMessage::PromptAuthentication { messages, .. } => {
                assert_eq!(messages, vec![(PromptStyle::Info, "kept".into())]);
            }
            other => panic!("unexpected message {other:?}"),
        }
    }

    #[test]
    fn overdeclared_prompt_count_stops_at_payload_end() {
        let mut w = WireWriter::new(256);
        w.put_u32(1); // sequence
        w.put_u32(1000); // count far beyond the actual payload
        w.put_u32(2);
        w.put_string("login:");
        let frame = frame_of(encode_frame(2, &w.into_bytes()));

        match ServerMessage::decode(&frame).unwrap() {
            ServerMessage::PromptAuthentication { messages, .. } => {
                assert_eq!(messages, vec![(PromptStyle::Question, "login:".into())]);
            }
            other => panic!("unexpected message {other:?}"),
        }
    }

    #[test]
    fn unknown_message_id_is_protocol_error() {
        let frame = frame_of(encode_frame(200, b""));
        assert!(matches!(
            ServerMessage::decode(&frame),
            Err(Error::Protocol { .. })
        ));
    }

    #[test]
    fn end_authentication_roundtrip() {
        let encoded = ServerMessage::EndAuthentication {
            sequence: 3,
            return_code: 7,
        }
        .encode();
        let decoded = ServerMessage::decode(&frame_of(encoded)).unwrap();
        assert_eq!(
            decoded,
            ServerMessage::EndAuthentication {
                sequence: 3,
                return_code: 7
            }
        );
    }
}
