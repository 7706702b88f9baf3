//! Session broker for proximity radio tags.
//!
//! Discovered tags are registered under opaque handles; operations address a
//! tag by handle and a technology kind, and the session keeps at most one
//! technology connected at a time, switching on demand. Callers reach the
//! session through [`session::TagSession`] directly, through named
//! operations in [`dispatch`], or over D-Bus via [`dbus::serve`].
//!
//! A platform binary only has to supply its [`NfcAdapter`] to [`run`].

use std::sync::Arc;

use log::info;
use zbus::{Connection, connection};

pub mod adapter;
pub mod config;
pub mod dbus;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod session;
pub mod tag;

#[cfg(test)]
mod testing;

pub use adapter::{NfcAdapter, ScanFilter, ScanOptions};
pub use config::Config;
pub use error::{BrokerError, ErrorKind, Result};
pub use event::{EventBus, EventQueue, SessionEvent};
pub use session::{DiscoverySink, TagSession};
pub use tag::{Tag, TagHandle, TagIdentity, technology::TechnologyKind};

/// Installs the process-wide logger, defaulting to `info` unless `RUST_LOG`
/// says otherwise.
pub fn init_logging() {
   env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}

/// Starts a session on `adapter` and serves it on the connection `builder`
/// describes.
pub async fn serve_with_config(
   adapter: Arc<dyn NfcAdapter>,
   config: &Config,
   builder: connection::Builder<'_>,
) -> Result<(TagSession, Connection)> {
   let events = EventQueue::new();
   let session = TagSession::new(adapter, events.clone(), config);
   let connection = dbus::serve(builder, session.clone(), events).await?;
   Ok((session, connection))
}

/// Runs the broker on the session bus until Ctrl-C.
pub async fn run(adapter: Arc<dyn NfcAdapter>) -> Result<()> {
   init_logging();

   info!("Starting tag broker D-Bus service...");

   let config = Config::load()?;
   info!(
      "Loaded configuration: platform level >= {}, connect timeout {} ms",
      config.min_platform_level, config.connect_timeout_ms
   );

   let (session, _connection) = serve_with_config(adapter, &config, dbus::session_bus()?).await?;
   info!("Tag broker D-Bus service started at {}", dbus::BUS_NAME);

   tokio::signal::ctrl_c().await?;
   info!("Shutting down tag broker...");
   session.shutdown().await;

   Ok(())
}
