//! End-to-end greeter exchanges against a scripted in-memory daemon.

use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream, ReadHalf, WriteHalf};
use tokio::sync::mpsc::UnboundedReceiver;

use dmgreet_core::codec::{Frame, FrameAssembler};
use dmgreet_core::wire::WireReader;
use dmgreet_core::{PromptStyle, ServerMessage};
use dmgreet_greeter::{Connection, Greeter, GreeterEvent, MessageKind, PromptKind};

const MSG_CONNECT: u32 = 0;
const MSG_LOGIN: u32 = 1;
const MSG_CONTINUE_AUTHENTICATION: u32 = 3;
const MSG_START_SESSION: u32 = 4;
const MSG_CANCEL_AUTHENTICATION: u32 = 5;

/// Daemon end of an in-memory greeter connection.
struct FakeDaemon {
    reader: ReadHalf<DuplexStream>,
    writer: WriteHalf<DuplexStream>,
    assembler: FrameAssembler,
}

impl FakeDaemon {
    fn start() -> (Greeter, UnboundedReceiver<GreeterEvent>, Self) {
        let (ours, theirs) = tokio::io::duplex(4096);
        let (our_rd, our_wr) = tokio::io::split(ours);
        let (their_rd, their_wr) = tokio::io::split(theirs);
        let (greeter, events) = Greeter::new(Connection::new(our_rd, our_wr));
        let daemon = Self {
            reader: their_rd,
            writer: their_wr,
            assembler: FrameAssembler::new(),
        };
        (greeter, events, daemon)
    }

    async fn next_frame(&mut self) -> Frame {
        loop {
            if let Some(frame) = self.assembler.next_frame().unwrap() {
                return frame;
            }
            let mut chunk = [0u8; 1024];
            let n = self.reader.read(&mut chunk).await.unwrap();
            assert!(n > 0, "greeter hung up mid-script");
            self.assembler.extend(&chunk[..n]);
        }
    }

    async fn expect(&mut self, id: u32) -> Frame {
        let frame = self.next_frame().await;
        assert_eq!(frame.id, id, "unexpected request from greeter");
        frame
    }

    async fn send(&mut self, message: &ServerMessage) {
        self.writer.write_all(&message.encode()).await.unwrap();
        self.writer.flush().await.unwrap();
    }

    /// Accept the handshake, replying with the given hints.
    async fn accept_connect(&mut self, hints: &[(&str, &str)]) {
        self.expect(MSG_CONNECT).await;
        self.send(&ServerMessage::Connected {
            version: "1.0".to_string(),
            hints: hints
                .iter()
                .map(|(n, v)| (n.to_string(), v.to_string()))
                .collect(),
        })
        .await;
    }

    /// Accept a login request, returning its sequence number and username.
    async fn accept_login(&mut self) -> (u32, String) {
        let frame = self.expect(MSG_LOGIN).await;
        let mut reader = WireReader::new(&frame.payload);
        (reader.get_u32(), reader.get_string())
    }
}

#[tokio::test]
async fn handshake_populates_hints_and_emits_connected() {
    let (mut greeter, mut events, mut daemon) = FakeDaemon::start();

    let script = tokio::spawn(async move {
        daemon
            .accept_connect(&[("default-session", "gnome"), ("has-guest-account", "true")])
            .await;
        daemon
    });

    greeter.connect().await.unwrap();
    script.await.unwrap();

    assert!(greeter.is_connected());
    assert_eq!(greeter.default_session_hint(), "gnome");
    assert!(greeter.has_guest_account_hint());
    assert!(!greeter.hide_users_hint());
    assert!(matches!(events.try_recv(), Ok(GreeterEvent::Connected)));
}

#[tokio::test]
async fn password_login_round_trip() {
    let (mut greeter, mut events, mut daemon) = FakeDaemon::start();

    let script = tokio::spawn(async move {
        daemon.accept_connect(&[]).await;
        let (sequence, username) = daemon.accept_login().await;
        assert_eq!(username, "alice");

        daemon
            .send(&ServerMessage::PromptAuthentication {
                sequence,
                messages: vec![(PromptStyle::Secret, "Password: ".to_string())],
            })
            .await;

        daemon.expect(MSG_CONTINUE_AUTHENTICATION).await;
        daemon
            .send(&ServerMessage::EndAuthentication {
                sequence,
                return_code: 0,
            })
            .await;

        daemon.expect(MSG_START_SESSION).await;
        daemon
    });

    greeter.connect().await.unwrap();
    greeter.login(Some("alice")).await.unwrap();

    greeter.next_event().await.unwrap();
    match events.try_recv() {
        Ok(GreeterEvent::Connected) => {}
        other => panic!("expected Connected, got {other:?}"),
    }
    match events.try_recv() {
        Ok(GreeterEvent::ShowPrompt { text, kind }) => {
            assert_eq!(text, "Password: ");
            assert_eq!(kind, PromptKind::Secret);
        }
        other => panic!("expected prompt, got {other:?}"),
    }

    greeter.respond("hunter2").await.unwrap();
    greeter.next_event().await.unwrap();
    match events.try_recv() {
        Ok(GreeterEvent::AuthenticationComplete) => {}
        other => panic!("expected completion, got {other:?}"),
    }
    assert!(greeter.is_authenticated());
    assert!(!greeter.is_authenticating());
    assert_eq!(greeter.authentication_user(), Some("alice"));

    greeter.start_session(Some("gnome")).await.unwrap();
    script.await.unwrap();
}

#[tokio::test]
async fn failed_attempt_reports_not_authenticated() {
    let (mut greeter, mut events, mut daemon) = FakeDaemon::start();

    let script = tokio::spawn(async move {
        daemon.accept_connect(&[]).await;
        let (sequence, _) = daemon.accept_login().await;
        daemon
            .send(&ServerMessage::PromptAuthentication {
                sequence,
                messages: vec![(PromptStyle::Error, "Login incorrect".to_string())],
            })
            .await;
        daemon
            .send(&ServerMessage::EndAuthentication {
                sequence,
                return_code: 7,
            })
            .await;
        daemon
    });

    greeter.connect().await.unwrap();
    greeter.login(Some("mallory")).await.unwrap();
    greeter.next_event().await.unwrap();
    greeter.next_event().await.unwrap();
    script.await.unwrap();

    let kinds: Vec<GreeterEvent> = std::iter::from_fn(|| events.try_recv().ok()).collect();
    assert!(matches!(kinds[0], GreeterEvent::Connected));
    assert!(matches!(
        &kinds[1],
        GreeterEvent::ShowMessage { kind: MessageKind::Error, text }
            if text.as_str() == "Login incorrect"
    ));
    assert!(matches!(kinds[2], GreeterEvent::AuthenticationComplete));
    assert!(!greeter.is_authenticated());
    assert_eq!(greeter.authentication_user(), None);
}

#[tokio::test]
async fn cancel_suppresses_prompts_but_completion_still_fires() {
    let (mut greeter, mut events, mut daemon) = FakeDaemon::start();

    let script = tokio::spawn(async move {
        daemon.accept_connect(&[]).await;
        let (sequence, _) = daemon.accept_login().await;
        daemon.expect(MSG_CANCEL_AUTHENTICATION).await;
        // The daemon has not confirmed the cancel yet; this prompt must
        // be suppressed.
        daemon
            .send(&ServerMessage::PromptAuthentication {
                sequence,
                messages: vec![(PromptStyle::Secret, "Password: ".to_string())],
            })
            .await;
        daemon
            .send(&ServerMessage::EndAuthentication {
                sequence,
                return_code: 1,
            })
            .await;
        daemon
    });

    greeter.connect().await.unwrap();
    greeter.login(Some("alice")).await.unwrap();
    greeter.cancel_authentication().await.unwrap();
    greeter.next_event().await.unwrap();
    greeter.next_event().await.unwrap();
    script.await.unwrap();

    let received: Vec<GreeterEvent> = std::iter::from_fn(|| events.try_recv().ok()).collect();
    assert_eq!(received.len(), 2, "prompt after cancel must be dropped");
    assert!(matches!(received[0], GreeterEvent::Connected));
    assert!(matches!(received[1], GreeterEvent::AuthenticationComplete));
    assert!(!greeter.is_authenticating());
}

#[tokio::test]
async fn superseding_login_drops_stale_replies() {
    let (mut greeter, mut events, mut daemon) = FakeDaemon::start();

    let script = tokio::spawn(async move {
        daemon.accept_connect(&[]).await;
        let (first, _) = daemon.accept_login().await;
        let (second, _) = daemon.accept_login().await;
        assert!(second > first);

        // Stale prompt for the superseded attempt, then a live one.
        daemon
            .send(&ServerMessage::PromptAuthentication {
                sequence: first,
                messages: vec![(PromptStyle::Secret, "old".to_string())],
            })
            .await;
        daemon
            .send(&ServerMessage::PromptAuthentication {
                sequence: second,
                messages: vec![(PromptStyle::Secret, "new".to_string())],
            })
            .await;
        daemon
    });

    greeter.connect().await.unwrap();
    greeter.login(Some("alice")).await.unwrap();
    greeter.login(Some("bob")).await.unwrap();
    greeter.next_event().await.unwrap();
    greeter.next_event().await.unwrap();
    script.await.unwrap();

    let received: Vec<GreeterEvent> = std::iter::from_fn(|| events.try_recv().ok()).collect();
    assert_eq!(received.len(), 2);
    assert!(matches!(received[0], GreeterEvent::Connected));
    assert!(matches!(
        &received[1],
        GreeterEvent::ShowPrompt { text, .. } if text.as_str() == "new"
    ));
}

#[tokio::test(start_paused = true)]
async fn autologin_timer_fires_once_after_timeout() {
    let (mut greeter, mut events, mut daemon) = FakeDaemon::start();

    let script = tokio::spawn(async move {
        daemon
            .accept_connect(&[("autologin-user", "alice"), ("autologin-timeout", "5")])
            .await;
        daemon
    });

    greeter.connect().await.unwrap();
    script.await.unwrap();
    assert_eq!(greeter.autologin_timeout_hint(), 5);
    assert!(matches!(events.try_recv(), Ok(GreeterEvent::Connected)));

    tokio::time::sleep(std::time::Duration::from_secs(6)).await;
    assert!(matches!(
        events.try_recv(),
        Ok(GreeterEvent::AutologinTimerExpired)
    ));
    // One shot only.
    tokio::time::sleep(std::time::Duration::from_secs(60)).await;
    assert!(events.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn repeated_handshake_reply_is_ignored() {
    let (mut greeter, mut events, mut daemon) = FakeDaemon::start();

    let script = tokio::spawn(async move {
        daemon
            .accept_connect(&[("autologin-user", "alice"), ("autologin-timeout", "5")])
            .await;
        // A buggy daemon repeats the handshake reply.
        daemon
            .send(&ServerMessage::Connected {
                version: "1.0".to_string(),
                hints: vec![("autologin-timeout".to_string(), "5".to_string())],
            })
            .await;
        daemon
    });

    greeter.connect().await.unwrap();
    greeter.next_event().await.unwrap();
    script.await.unwrap();

    assert!(matches!(events.try_recv(), Ok(GreeterEvent::Connected)));
    // No second Connected, and the timer was not re-armed: exactly one
    // expiry ever arrives.
    tokio::time::sleep(std::time::Duration::from_secs(60)).await;
    assert!(matches!(
        events.try_recv(),
        Ok(GreeterEvent::AutologinTimerExpired)
    ));
    assert!(events.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn cancelled_autologin_timer_never_fires() {
    let (mut greeter, mut events, mut daemon) = FakeDaemon::start();

    let script = tokio::spawn(async move {
        daemon
            .accept_connect(&[("autologin-guest", "true"), ("autologin-timeout", "5")])
            .await;
        daemon
    });

    greeter.connect().await.unwrap();
    script.await.unwrap();
    assert!(matches!(events.try_recv(), Ok(GreeterEvent::Connected)));

    greeter.cancel_autologin();
    tokio::time::sleep(std::time::Duration::from_secs(60)).await;
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn quit_ends_event_loop() {
    let (mut greeter, mut events, mut daemon) = FakeDaemon::start();

    let script = tokio::spawn(async move {
        daemon.accept_connect(&[]).await;
        daemon.send(&ServerMessage::Quit).await;
        daemon
    });

    greeter.connect().await.unwrap();
    greeter.next_event().await.unwrap();
    script.await.unwrap();

    assert!(matches!(events.try_recv(), Ok(GreeterEvent::Connected)));
    assert!(matches!(events.try_recv(), Ok(GreeterEvent::Quit)));
}
