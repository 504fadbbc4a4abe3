//! System power capability gateway.
//!
//! Suspend and hibernate go through UPower; restart and shutdown through
//! the ConsoleKit manager. Calls go over the system bus unless `LDM_BUS`
//! is set to `SESSION`, which test harnesses use to stand in a fake bus.
//! Every capability probe degrades to `false` and every action to a
//! logged no-op when the bus or the service is unavailable, so a greeter
//! on a bus-less host still runs.

use tracing::{debug, warn};
use zbus::{Connection, proxy};

use dmgreet_core::constants::BUS_VAR;

#[proxy(
    interface = "org.freedesktop.UPower",
    default_service = "org.freedesktop.UPower",
    default_path = "/org/freedesktop/UPower"
)]
trait UPower {
    #[zbus(name = "SuspendAllowed")]
    fn suspend_allowed(&self) -> zbus::Result<bool>;

    #[zbus(name = "Suspend")]
    fn suspend(&self) -> zbus::Result<()>;

    #[zbus(name = "HibernateAllowed")]
    fn hibernate_allowed(&self) -> zbus::Result<bool>;

    #[zbus(name = "Hibernate")]
    fn hibernate(&self) -> zbus::Result<()>;
}

#[proxy(
    interface = "org.freedesktop.ConsoleKit.Manager",
    default_service = "org.freedesktop.ConsoleKit",
    default_path = "/org/freedesktop/ConsoleKit/Manager"
)]
trait ConsoleKit {
    #[zbus(name = "CanRestart")]
    fn can_restart(&self) -> zbus::Result<bool>;

    #[zbus(name = "Restart")]
    fn restart(&self) -> zbus::Result<()>;

    #[zbus(name = "CanStop")]
    fn can_stop(&self) -> zbus::Result<bool>;

    #[zbus(name = "Stop")]
    fn stop(&self) -> zbus::Result<()>;
}

/// Capability-probing front for the system power services.
#[derive(Debug, Default)]
pub struct PowerManager {
    bus: Option<Connection>,
}

impl PowerManager {
    pub fn new() -> Self {
        Self::default()
    }

    async fn bus(&mut self) -> Option<&Connection> {
        if self.bus.is_none() {
            let session_scope = std::env::var(BUS_VAR).as_deref() == Ok("SESSION");
            let connected = if session_scope {
                Connection::session().await
            } else {
                Connection::system().await
            };
            match connected {
                Ok(conn) => self.bus = Some(conn),
                Err(err) => {
                    warn!(%err, "message bus unavailable, power actions disabled");
                }
            }
        }
        self.bus.as_ref()
    }

    async fn upower(&mut self) -> Option<UPowerProxy<'_>> {
        let bus = self.bus().await?;
        match UPowerProxy::new(bus).await {
            Ok(proxy) => Some(proxy),
            Err(err) => {
                debug!(%err, "UPower unavailable");
                None
            }
        }
    }

    async fn consolekit(&mut self) -> Option<ConsoleKitProxy<'_>> {
        let bus = self.bus().await?;
        match ConsoleKitProxy::new(bus).await {
            Ok(proxy) => Some(proxy),
            Err(err) => {
                debug!(%err, "ConsoleKit unavailable");
                None
            }
        }
    }

    pub async fn can_suspend(&mut self) -> bool {
        match self.upower().await {
            Some(proxy) => proxy.suspend_allowed().await.unwrap_or_else(|err| {
                debug!(%err, "suspend capability probe failed");
                false
            }),
            None => false,
        }
    }

    pub async fn suspend(&mut self) {
        if let Some(proxy) = self.upower().await {
            if let Err(err) = proxy.suspend().await {
                warn!(%err, "suspend request failed");
            }
        }
    }

    pub async fn can_hibernate(&mut self) -> bool {
        match self.upower().await {
            Some(proxy) => proxy.hibernate_allowed().await.unwrap_or_else(|err| {
                debug!(%err, "hibernate capability probe failed");
                false
            }),
            None => false,
        }
    }

    pub async fn hibernate(&mut self) {
        if let Some(proxy) = self.upower().await {
            if let Err(err) = proxy.hibernate().await {
                warn!(%err, "hibernate request failed");
            }
        }
    }

    pub async fn can_restart(&mut self) -> bool {
        match self.consolekit().await {
            Some(proxy) => proxy.can_restart().await.unwrap_or_else(|err| {
                debug!(%err, "restart capability probe failed");
                false
            }),
            None => false,
        }
    }

    pub async fn restart(&mut self) {
        if let Some(proxy) = self.consolekit().await {
            if let Err(err) = proxy.restart().await {
                warn!(%err, "restart request failed");
            }
        }
    }

    pub async fn can_shutdown(&mut self) -> bool {
        match self.consolekit().await {
            Some(proxy) => proxy.can_stop().await.unwrap_or_else(|err| {
                debug!(%err, "shutdown capability probe failed");
                false
            }),
            None => false,
        }
    }

    pub async fn shutdown(&mut self) {
        if let Some(proxy) = self.consolekit().await {
            if let Err(err) = proxy.stop().await {
                warn!(%err, "shutdown request failed");
            }
        }
    }
}
