//! Greeter session orchestration.
//!
//! Ties the daemon transport, the authentication state machine, the
//! connection hints, and the account directory together behind one
//! handle. UI toolkits embed [`Greeter`] by driving [`Greeter::run`] (or
//! calling [`Greeter::next_event`] themselves) and reacting to the
//! events it emits.

use std::time::Duration;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use dmgreet_core::constants::PROTOCOL_VERSION;
use dmgreet_core::{Error, GreeterMessage, PromptStyle, Result, ServerMessage};

use crate::auth::AuthSession;
use crate::connection::Connection;
use crate::event::{GreeterEvent, MessageKind, PromptKind};
use crate::hints::Hints;
use crate::locale::{LanguageCatalog, Language, Layout, LayoutCatalog};
use crate::power::PowerManager;
use crate::sessions::{Session, SessionCatalog};
use crate::users::{UserChange, UserDirectory, UserHandle};

/// Client side of a display-manager greeter session.
///
/// Constructed unconnected; [`Greeter::connect`] performs the version
/// handshake and populates the hints. All state accessors reflect the
/// last daemon message processed.
pub struct Greeter {
    connection: Connection,
    events: UnboundedSender<GreeterEvent>,
    auth: AuthSession,
    hints: Hints,
    users: UserDirectory,
    sessions: SessionCatalog,
    languages: LanguageCatalog,
    layouts: LayoutCatalog,
    power: PowerManager,
    autologin_timer: Option<JoinHandle<()>>,
    connected: bool,
}

impl Greeter {
    /// Greeter over an explicit transport, plus the event stream the UI
    /// consumes.
    pub fn new(connection: Connection) -> (Self, UnboundedReceiver<GreeterEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let greeter = Self {
            connection,
            events,
            auth: AuthSession::new(),
            hints: Hints::new(),
            users: UserDirectory::new(),
            sessions: SessionCatalog::new(),
            languages: LanguageCatalog::new(),
            layouts: LayoutCatalog::new(),
            power: PowerManager::new(),
            autologin_timer: None,
            connected: false,
        };
        (greeter, rx)
    }

    /// Greeter over the daemon-provided pipe descriptors.
    pub fn from_env() -> Result<(Self, UnboundedReceiver<GreeterEvent>)> {
        Ok(Self::new(Connection::from_env()?))
    }

    // =========================================================================
    // Handshake
    // =========================================================================

    /// Perform the version handshake.
    ///
    /// Sends the connect request and processes daemon messages until the
    /// handshake reply arrives; anything received before it is handled
    /// normally. On success the hints are populated and a
    /// [`GreeterEvent::Connected`] has been emitted.
    pub async fn connect(&mut self) -> Result<()> {
        info!(version = PROTOCOL_VERSION, "connecting to daemon");
        self.connection
            .send(&GreeterMessage::Connect {
                version: PROTOCOL_VERSION.to_string(),
            })
            .await?;

        while !self.connected {
            let message = self.connection.next_message().await?;
            self.handle_message(message)?;
        }
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    /// Start authenticating `username`, or an interactive attempt that
    /// asks for the username when `None`. Supersedes any attempt in
    /// progress.
    pub async fn login(&mut self, username: Option<&str>) -> Result<()> {
        self.ensure_connected()?;
        let sequence = self.auth.begin(username.map(str::to_string));
        debug!(sequence, user = username.unwrap_or("<interactive>"), "starting authentication");
        self.connection
            .send(&GreeterMessage::Login {
                sequence,
                username: username.map(str::to_string),
            })
            .await
    }

    /// Start authenticating the guest account. Supersedes any attempt in
    /// progress.
    pub async fn login_as_guest(&mut self) -> Result<()> {
        self.ensure_connected()?;
        let sequence = self.auth.begin(None);
        debug!(sequence, "starting guest authentication");
        self.connection
            .send(&GreeterMessage::LoginAsGuest { sequence })
            .await
    }

    /// Answer the most recent prompt.
    pub async fn respond(&mut self, response: &str) -> Result<()> {
        self.ensure_connected()?;
        if !self.auth.in_progress() {
            warn!("response with no authentication in progress, ignoring");
            return Ok(());
        }
        self.connection
            .send(&GreeterMessage::ContinueAuthentication {
                response: response.to_string(),
            })
            .await
    }

    /// Abandon the attempt in progress. Prompts arriving until the
    /// daemon acknowledges are suppressed.
    pub async fn cancel_authentication(&mut self) -> Result<()> {
        self.ensure_connected()?;
        if !self.auth.in_progress() {
            return Ok(());
        }
        self.auth.request_cancel();
        self.connection
            .send(&GreeterMessage::CancelAuthentication)
            .await
    }

    pub fn authentication_user(&self) -> Option<&str> {
        self.auth.user()
    }

    pub fn is_authenticating(&self) -> bool {
        self.auth.in_progress()
    }

    pub fn is_authenticated(&self) -> bool {
        self.auth.authenticated()
    }

    // =========================================================================
    // Session start
    // =========================================================================

    /// Ask the daemon to start `session` (the daemon default when
    /// `None`) for the authenticated user. Failure comes back as a
    /// [`GreeterEvent::SessionFailed`].
    pub async fn start_session(&mut self, session: Option<&str>) -> Result<()> {
        self.ensure_connected()?;
        info!(session = session.unwrap_or("<default>"), "requesting session start");
        self.connection
            .send(&GreeterMessage::StartSession {
                session: session.map(str::to_string),
            })
            .await
    }

    // =========================================================================
    // Hints
    // =========================================================================

    pub fn default_session_hint(&self) -> &str {
        self.hints.default_session()
    }

    pub fn hide_users_hint(&self) -> bool {
        self.hints.hide_users()
    }

    pub fn has_guest_account_hint(&self) -> bool {
        self.hints.has_guest_account()
    }

    pub fn select_user_hint(&self) -> &str {
        self.hints.select_user()
    }

    pub fn select_guest_hint(&self) -> bool {
        self.hints.select_guest()
    }

    pub fn autologin_user_hint(&self) -> &str {
        self.hints.autologin_user()
    }

    pub fn autologin_guest_hint(&self) -> bool {
        self.hints.autologin_guest()
    }

    pub fn autologin_timeout_hint(&self) -> u32 {
        self.hints.autologin_timeout()
    }

    pub fn hint(&self, name: &str) -> Option<&str> {
        self.hints.get(name)
    }

    /// Disarm the unattended-login countdown. Idempotent.
    pub fn cancel_autologin(&mut self) {
        if let Some(timer) = self.autologin_timer.take() {
            debug!("autologin timer cancelled");
            timer.abort();
        }
    }

    // =========================================================================
    // Catalogs and environment
    // =========================================================================

    pub fn users(&mut self) -> Vec<UserHandle> {
        self.users.users().to_vec()
    }

    pub fn user_by_name(&mut self, name: &str) -> Option<UserHandle> {
        self.users.user_by_name(name)
    }

    pub fn sessions(&mut self) -> Vec<Session> {
        self.sessions.sessions().to_vec()
    }

    pub fn session_by_key(&mut self, key: &str) -> Option<Session> {
        self.sessions.session_by_key(key)
    }

    pub fn languages(&mut self) -> Vec<Language> {
        self.languages.languages().to_vec()
    }

    pub fn layouts(&mut self) -> Vec<Layout> {
        self.layouts.layouts().to_vec()
    }

    pub fn layout_by_name(&mut self, name: &str) -> Option<Layout> {
        self.layouts.layout_by_name(name)
    }

    /// This machine's hostname, or "localhost" when it cannot be read.
    pub fn hostname(&self) -> String {
        hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "localhost".to_string())
    }

    /// The process locale from `$LANG`, defaulting to "C".
    pub fn default_language(&self) -> String {
        std::env::var("LANG").unwrap_or_else(|_| "C".to_string())
    }

    pub fn power(&mut self) -> &mut PowerManager {
        &mut self.power
    }

    // =========================================================================
    // Event pump
    // =========================================================================

    /// Drive the connection until the daemon hangs up or orders a quit.
    ///
    /// Multiplexes daemon messages with account-database change
    /// notifications. Returns cleanly after [`GreeterEvent::Quit`];
    /// surfaces transport errors otherwise.
    pub async fn run(&mut self) -> Result<()> {
        let mut watch_rx = Some(self.users.install_watch());
        loop {
            match self.pump(&mut watch_rx).await? {
                Pumped::Message(ServerMessage::Quit) => {
                    self.handle_message(ServerMessage::Quit)?;
                    return Ok(());
                }
                Pumped::Message(message) => self.handle_message(message)?,
                Pumped::Resync => self.resync_users(),
            }
        }
    }

    /// Receive and process one daemon message. For embeddings that own
    /// their own select loop instead of using [`Greeter::run`].
    pub async fn next_event(&mut self) -> Result<()> {
        let message = self.connection.next_message().await?;
        self.handle_message(message)
    }

    async fn pump(
        &mut self,
        watch_rx: &mut Option<UnboundedReceiver<()>>,
    ) -> Result<Pumped> {
        // A closed watch channel must not busy-loop the select.
        match watch_rx {
            Some(rx) => {
                tokio::select! {
                    message = self.connection.next_message() => {
                        Ok(Pumped::Message(message?))
                    }
                    changed = rx.recv() => {
                        if changed.is_none() {
                            *watch_rx = None;
                            return Ok(Pumped::Resync);
                        }
                        Ok(Pumped::Resync)
                    }
                }
            }
            None => Ok(Pumped::Message(self.connection.next_message().await?)),
        }
    }

    fn resync_users(&mut self) {
        for change in self.users.reload() {
            let event = match change {
                UserChange::Added(user) => GreeterEvent::UserAdded(user),
                UserChange::Changed(user) => GreeterEvent::UserChanged(user),
                UserChange::Removed(user) => GreeterEvent::UserRemoved(user),
            };
            self.emit(event);
        }
    }

    // =========================================================================
    // Message dispatch
    // =========================================================================

    fn handle_message(&mut self, message: ServerMessage) -> Result<()> {
        match message {
            ServerMessage::Connected { version, hints } => {
                if self.connected {
                    // Repeating the handshake reply would re-arm the
                    // autologin timer and re-emit Connected.
                    warn!("ignoring repeated handshake reply from daemon");
                    return Ok(());
                }
                info!(daemon_version = %version, hints = hints.len(), "connected to daemon");
                self.hints.populate(hints);
                self.connected = true;
                self.arm_autologin_timer();
                self.emit(GreeterEvent::Connected);
            }
            ServerMessage::PromptAuthentication { sequence, messages } => {
                for (style, text) in self.auth.handle_prompt(sequence, messages) {
                    let event = match style {
                        PromptStyle::Secret => GreeterEvent::ShowPrompt {
                            text,
                            kind: PromptKind::Secret,
                        },
                        PromptStyle::Question => GreeterEvent::ShowPrompt {
                            text,
                            kind: PromptKind::Question,
                        },
                        PromptStyle::Error => GreeterEvent::ShowMessage {
                            text,
                            kind: MessageKind::Error,
                        },
                        PromptStyle::Info => GreeterEvent::ShowMessage {
                            text,
                            kind: MessageKind::Info,
                        },
                    };
                    self.emit(event);
                }
            }
            ServerMessage::EndAuthentication { sequence, return_code } => {
                if self.auth.handle_end(sequence, return_code) {
                    debug!(sequence, return_code, "authentication finished");
                    self.emit(GreeterEvent::AuthenticationComplete);
                }
            }
            ServerMessage::SessionFailed => {
                warn!("daemon reported session start failure");
                self.emit(GreeterEvent::SessionFailed);
            }
            ServerMessage::Quit => {
                info!("daemon ordered quit");
                self.emit(GreeterEvent::Quit);
            }
        }
        Ok(())
    }

    fn arm_autologin_timer(&mut self) {
        let timeout = self.hints.autologin_timeout();
        if timeout == 0 {
            return;
        }

        debug!(timeout, "arming autologin timer");
        let events = self.events.clone();
        self.autologin_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(timeout as u64)).await;
            let _ = events.send(GreeterEvent::AutologinTimerExpired);
        }));
    }

    fn emit(&self, event: GreeterEvent) {
        // A dropped receiver just means no UI is listening.
        let _ = self.events.send(event);
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.connected {
            Ok(())
        } else {
            Err(Error::Protocol {
                message: "not connected to daemon".to_string(),
            })
        }
    }
}

enum Pumped {
    Message(ServerMessage),
    Resync,
}
