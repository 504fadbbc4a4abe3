//! Events delivered to the embedding UI.

use crate::users::UserHandle;

/// Interactive credential request styles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    /// Input must not be echoed (passwords).
    Secret,
    /// Input may be echoed (usernames, OTP serials).
    Question,
}

/// Informational message styles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Error,
    Info,
}

/// Everything the greeter surfaces to its UI.
///
/// Delivered in order on the event channel handed out by
/// [`Greeter::new`](crate::Greeter::new). Prompt and message events only
/// arrive while an authentication attempt is in progress and carry the
/// current attempt's content.
#[derive(Debug, Clone)]
pub enum GreeterEvent {
    /// Handshake finished; hints are populated and the API is usable.
    Connected,
    /// The authentication stack wants a credential.
    ShowPrompt { text: String, kind: PromptKind },
    /// The authentication stack has something to say.
    ShowMessage { text: String, kind: MessageKind },
    /// The current attempt finished; consult
    /// [`Greeter::is_authenticated`](crate::Greeter::is_authenticated).
    AuthenticationComplete,
    /// The requested session could not be started.
    SessionFailed,
    /// The unattended-login countdown elapsed.
    AutologinTimerExpired,
    /// Account database changes, in add/change/remove order.
    UserAdded(UserHandle),
    UserChanged(UserHandle),
    UserRemoved(UserHandle),
    /// The daemon ordered this process to exit.
    Quit,
}
