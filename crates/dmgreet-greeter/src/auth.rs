//! Authentication session state machine.
//!
//! Pure state: no I/O. The [`crate::greeter::Greeter`] sends the wire
//! messages; this module decides what incoming daemon traffic means for
//! the current attempt.
//!
//! Correlation model: every login attempt gets a fresh sequence number.
//! A new attempt supersedes the previous one implicitly — stale daemon
//! responses fail the sequence check and are dropped silently, which is
//! expected traffic, not an error.

use dmgreet_core::message::PromptStyle;
use tracing::debug;

/// State of the one in-flight authentication attempt.
#[derive(Debug, Default)]
pub struct AuthSession {
    /// Correlation id of the current attempt. Monotone, never reused.
    sequence: u32,
    /// User being authenticated; `None` for guest or username prompts.
    user: Option<String>,
    in_progress: bool,
    /// Cancellation requested but not yet confirmed by the daemon.
    cancelling: bool,
    authenticated: bool,
}

impl AuthSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a new attempt, superseding any prior one.
    ///
    /// Returns the sequence number to put on the wire.
    pub fn begin(&mut self, user: Option<String>) -> u32 {
        self.sequence += 1;
        self.cancelling = false;
        self.in_progress = true;
        self.authenticated = false;
        self.user = user;
        self.sequence
    }

    /// Record that cancellation was requested.
    ///
    /// Does not change `in_progress` or `authenticated`: only the daemon's
    /// END_AUTHENTICATION for this sequence does that.
    pub fn request_cancel(&mut self) {
        self.cancelling = true;
    }

    /// Handle PROMPT_AUTHENTICATION.
    ///
    /// Returns the prompt entries to surface, in daemon order; empty when
    /// the message was dropped. Prompts arriving while a cancel is pending
    /// are suppressed even though the daemon has not confirmed the cancel
    /// yet; a conversation step racing the cancel is lost.
    pub fn handle_prompt(
        &mut self,
        sequence: u32,
        messages: Vec<(PromptStyle, String)>,
    ) -> Vec<(PromptStyle, String)> {
        if sequence != self.sequence {
            debug!(
                sequence,
                current = self.sequence,
                "ignoring prompt with stale sequence number"
            );
            return Vec::new();
        }
        if self.cancelling {
            debug!("ignoring prompt while waiting for cancellation");
            return Vec::new();
        }
        messages
    }

    /// Handle END_AUTHENTICATION.
    ///
    /// Returns true when the message matched the current attempt and an
    /// authentication-complete notification should fire. State is fully
    /// settled before this returns, so observers reacting to the
    /// notification see `in_progress() == false`.
    pub fn handle_end(&mut self, sequence: u32, return_code: u32) -> bool {
        if sequence != self.sequence {
            debug!(
                sequence,
                current = self.sequence,
                "ignoring end-authentication with stale sequence number"
            );
            return false;
        }

        debug!(return_code, "authentication complete");
        self.cancelling = false;
        self.authenticated = return_code == 0;
        if !self.authenticated {
            self.user = None;
        }
        self.in_progress = false;
        true
    }

    /// Sequence number of the current attempt.
    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    /// True while an attempt is awaiting END_AUTHENTICATION.
    pub fn in_progress(&self) -> bool {
        self.in_progress
    }

    /// True between `request_cancel` and the daemon's confirmation.
    pub fn cancelling(&self) -> bool {
        self.cancelling
    }

    /// True once the most recent attempt succeeded.
    pub fn authenticated(&self) -> bool {
        self.authenticated
    }

    /// User the current/most recent successful attempt is for.
    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }
}

// =============================================================================
// Tests
// =============================================================================
