//! Protocol and configuration constants for dmgreet.

// =============================================================================
// Protocol Constants
// =============================================================================

/// Protocol version string sent in the CONNECT message.
pub const PROTOCOL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Length of the frame header (message id + payload length, both u32 BE).
pub const HEADER_LEN: usize = 8;

/// Maximum size of a single encoded message, header included.
///
/// The daemon enforces the same bound; anything larger is a protocol bug.
pub const MAX_MESSAGE_LENGTH: usize = 1024;

// =============================================================================
// Environment
// =============================================================================

/// Environment variable holding the fd number of the greeter-to-daemon pipe.
pub const TO_SERVER_FD_VAR: &str = "LIGHTDM_TO_SERVER_FD";

/// Environment variable holding the fd number of the daemon-to-greeter pipe.
pub const FROM_SERVER_FD_VAR: &str = "LIGHTDM_FROM_SERVER_FD";

/// Environment variable selecting the message-bus scope for the secondary
/// control channel. `SESSION` selects the session bus; anything else (or
/// unset) selects the system bus.
pub const BUS_VAR: &str = "LDM_BUS";
