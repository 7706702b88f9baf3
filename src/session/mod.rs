//! Tag session: registry, capability resolution and connection arbitration
//! behind one serialized control context.
//!
//! [`TagSession`] is a cheap client handle; every request and every discovery
//! is funneled over one channel into a single actor task, so arbiter state is
//! only ever touched from that task.

use std::sync::Arc;

use log::{debug, warn};
use tokio::sync::{mpsc, oneshot};

use crate::{
   adapter::{NfcAdapter, ScanOptions},
   config::Config,
   error::{BrokerError, Result},
   event::EventSender,
   tag::{Tag, TagHandle, TagIdentity, ndef::NdefMessage, technology::TechnologyKind},
};

mod actor;
pub mod arbiter;
pub mod registry;
pub mod resolver;

use actor::SessionActor;
use arbiter::ArbiterState;

// === Commands ===

enum SessionCommand {
   // Discovery
   TagDiscovered(TagIdentity),

   // Caller operations
   IsAvailable(oneshot::Sender<bool>),
   StartScan(ScanOptions, oneshot::Sender<Result<()>>),
   StopScan(oneshot::Sender<Result<()>>),
   Dispose(TagHandle, oneshot::Sender<()>),
   NdefRead(TagHandle, oneshot::Sender<Result<Option<NdefMessage>>>),
   NdefWrite(TagHandle, NdefMessage, oneshot::Sender<Result<()>>),
   NdefWriteLock(TagHandle, oneshot::Sender<Result<()>>),
   Transceive(TagHandle, TechnologyKind, Vec<u8>, oneshot::Sender<Result<Vec<u8>>>),

   // Introspection
   ConnectionState(oneshot::Sender<ArbiterState>),
   CountTags(oneshot::Sender<u32>),
   Shutdown(oneshot::Sender<()>),
}

/// Entry point for platform reader callbacks.
///
/// Safe to call from any thread; never blocks. Deliveries after the session
/// is gone are dropped. So are deliveries while the session inbox is full
/// (see [`Config::channel_capacity`]): the tag gets no handle, no discovery
/// event is emitted and only a warning is logged.
#[derive(Clone)]
pub struct DiscoverySink {
   tx: mpsc::WeakSender<SessionCommand>,
}

impl DiscoverySink {
   pub fn tag_discovered(&self, tag: Arc<dyn Tag>) {
      let Some(tx) = self.tx.upgrade() else {
         debug!("Tag discovered after session shutdown");
         return;
      };
      if let Err(e) = tx.try_send(SessionCommand::TagDiscovered(TagIdentity::new(tag))) {
         warn!("Channel overflow delivering discovered tag: {e}");
      }
   }
}

/// Client handle to a running tag session.
///
/// Cloning is cheap; the session stops when the last handle is dropped or
/// [`shutdown`](Self::shutdown) is called.
#[derive(Clone)]
pub struct TagSession {
   inbox: mpsc::Sender<SessionCommand>,
}

impl TagSession {
   /// Spawns the session actor. Must be called within a Tokio runtime.
   pub fn new(adapter: Arc<dyn NfcAdapter>, event_tx: EventSender, config: &Config) -> Self {
      let (command_tx, command_rx) = mpsc::channel(config.channel_capacity.max(1));
      tokio::spawn(
         SessionActor::new(adapter, event_tx, command_rx, command_tx.downgrade(), config).run(),
      );
      Self { inbox: command_tx }
   }

   async fn request<T>(
      &self,
      command: impl FnOnce(oneshot::Sender<T>) -> SessionCommand,
   ) -> Result<T> {
      let (tx, rx) = oneshot::channel();
      self
         .inbox
         .send(command(tx))
         .await
         .map_err(|_| BrokerError::SessionClosed)?;
      rx.await.map_err(|_| BrokerError::SessionClosed)
   }

   /// Whether an adapter is present and enabled. Never fails.
   pub async fn is_available(&self) -> bool {
      self
         .request(SessionCommand::IsAvailable)
         .await
         .unwrap_or(false)
   }

   pub async fn start_scan(&self, options: ScanOptions) -> Result<()> {
      self
         .request(|tx| SessionCommand::StartScan(options, tx))
         .await?
   }

   pub async fn stop_scan(&self) -> Result<()> {
      self.request(SessionCommand::StopScan).await?
   }

   /// Forgets `handle`, closing its connection if it holds the live one.
   /// Unknown handles are a no-op.
   pub async fn dispose(&self, handle: &TagHandle) {
      let handle = handle.clone();
      if self
         .request(|tx| SessionCommand::Dispose(handle, tx))
         .await
         .is_err()
      {
         debug!("Dispose after session shutdown");
      }
   }

   pub async fn ndef_read(&self, handle: &TagHandle) -> Result<Option<NdefMessage>> {
      let handle = handle.clone();
      self
         .request(|tx| SessionCommand::NdefRead(handle, tx))
         .await?
   }

   pub async fn ndef_write(&self, handle: &TagHandle, message: NdefMessage) -> Result<()> {
      let handle = handle.clone();
      self
         .request(|tx| SessionCommand::NdefWrite(handle, message, tx))
         .await?
   }

   pub async fn ndef_write_lock(&self, handle: &TagHandle) -> Result<()> {
      let handle = handle.clone();
      self
         .request(|tx| SessionCommand::NdefWriteLock(handle, tx))
         .await?
   }

   pub async fn transceive(
      &self,
      handle: &TagHandle,
      kind: TechnologyKind,
      data: Vec<u8>,
   ) -> Result<Vec<u8>> {
      let handle = handle.clone();
      self
         .request(|tx| SessionCommand::Transceive(handle, kind, data, tx))
         .await?
   }

   pub async fn connection_state(&self) -> ArbiterState {
      self
         .request(SessionCommand::ConnectionState)
         .await
         .unwrap_or(ArbiterState::Idle)
   }

   pub async fn tag_count(&self) -> u32 {
      self
         .request(SessionCommand::CountTags)
         .await
         .unwrap_or_default()
   }

   /// Stops scanning, releases the connection and clears the registry.
   pub async fn shutdown(&self) {
      let _ = self.request(SessionCommand::Shutdown).await;
   }
}
