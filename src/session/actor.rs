//! Session actor: the single control context owning registry and arbiter.

use std::{future::Future, sync::Arc, time::Duration};

use log::{debug, info, warn};
use tokio::{sync::mpsc, time};

use crate::{
   adapter::{NfcAdapter, ScanOptions},
   config::Config,
   error::{BrokerError, Result},
   event::{EventSender, SessionEvent},
   session::{
      DiscoverySink, SessionCommand,
      arbiter::ConnectionArbiter,
      registry::TagRegistry,
      resolver,
   },
   tag::{
      TagHandle, TagIdentity, TagIoError,
      metadata,
      ndef::NdefMessage,
      technology::{Technology, TechnologyKind},
   },
};

pub(super) struct SessionActor {
   adapter: Arc<dyn NfcAdapter>,
   event_tx: EventSender,
   command_rx: mpsc::Receiver<SessionCommand>,
   loopback_tx: mpsc::WeakSender<SessionCommand>,
   min_platform_level: u32,
   operation_timeout: Duration,

   // State
   registry: TagRegistry,
   arbiter: ConnectionArbiter,
   scan: Option<ScanOptions>,
}

impl SessionActor {
   pub(super) fn new(
      adapter: Arc<dyn NfcAdapter>,
      event_tx: EventSender,
      command_rx: mpsc::Receiver<SessionCommand>,
      loopback_tx: mpsc::WeakSender<SessionCommand>,
      config: &Config,
   ) -> Self {
      Self {
         adapter,
         event_tx,
         command_rx,
         loopback_tx,
         min_platform_level: config.min_platform_level,
         operation_timeout: config.operation_timeout(),
         registry: TagRegistry::new(),
         arbiter: ConnectionArbiter::new(config.connect_timeout()),
         scan: None,
      }
   }

   pub(super) async fn run(mut self) {
      info!("Tag session starting");

      while let Some(cmd) = self.command_rx.recv().await {
         if !self.handle_command(cmd).await {
            break;
         }
      }

      self.cleanup().await;
      info!("Tag session stopped");
   }

   async fn handle_command(&mut self, cmd: SessionCommand) -> bool {
      match cmd {
         SessionCommand::TagDiscovered(tag) => {
            self.handle_tag_discovered(tag);
         },
         SessionCommand::IsAvailable(reply) => {
            let _ = reply.send(self.adapter.is_present() && self.adapter.is_enabled());
         },
         SessionCommand::StartScan(options, reply) => {
            let _ = reply.send(self.start_scan(options));
         },
         SessionCommand::StopScan(reply) => {
            let _ = reply.send(self.stop_scan());
         },
         SessionCommand::Dispose(handle, reply) => {
            self.dispose(&handle).await;
            let _ = reply.send(());
         },
         SessionCommand::NdefRead(handle, reply) => {
            let result = self.ndef_read(&handle).await;
            let _ = reply.send(result);
         },
         SessionCommand::NdefWrite(handle, message, reply) => {
            let result = self.ndef_write(&handle, &message).await;
            let _ = reply.send(result);
         },
         SessionCommand::NdefWriteLock(handle, reply) => {
            let result = self.ndef_write_lock(&handle).await;
            let _ = reply.send(result);
         },
         SessionCommand::Transceive(handle, kind, data, reply) => {
            let result = self.transceive(&handle, kind, &data).await;
            let _ = reply.send(result);
         },
         SessionCommand::ConnectionState(reply) => {
            let _ = reply.send(self.arbiter.state());
         },
         SessionCommand::CountTags(reply) => {
            let _ = reply.send(self.registry.len() as u32);
         },
         SessionCommand::Shutdown(reply) => {
            self.cleanup().await;
            let _ = reply.send(());
            return false;
         },
      }
      true
   }

   fn handle_tag_discovered(&mut self, tag: TagIdentity) {
      let Some(scan) = &self.scan else {
         debug!("Ignoring tag {} delivered outside a scan", tag.id_hex());
         return;
      };
      if !scan.admits(&*tag) {
         debug!("Tag {} filtered out by {} scan", tag.id_hex(), scan.filter);
         return;
      }

      let handle = self.registry.insert(tag.clone());
      info!("Discovered tag {} as {handle}", tag.id_hex());
      let payload = metadata::discovery_payload(&handle, &*tag);
      self
         .event_tx
         .emit(SessionEvent::TagDiscovered { handle, payload });
   }

   fn check_platform_level(&self) -> Result<()> {
      let actual = self.adapter.platform_level();
      if actual < self.min_platform_level {
         return Err(BrokerError::Unavailable {
            required: self.min_platform_level,
            actual,
         });
      }
      Ok(())
   }

   fn start_scan(&mut self, options: ScanOptions) -> Result<()> {
      self.check_platform_level()?;
      let sink = DiscoverySink {
         tx: self.loopback_tx.clone(),
      };
      self.adapter.enable_reader_mode(&options, sink);
      info!("Scan started ({} filter)", options.filter);
      self.scan = Some(options);
      Ok(())
   }

   fn stop_scan(&mut self) -> Result<()> {
      self.check_platform_level()?;
      self.adapter.disable_reader_mode();
      if self.scan.take().is_some() {
         info!("Scan stopped");
      }
      Ok(())
   }

   async fn dispose(&mut self, handle: &TagHandle) {
      let Ok(tag) = self.registry.lookup(handle) else {
         debug!("Dispose of unknown handle {handle}");
         return;
      };
      if self.arbiter.release_if_owned_by(&tag).await {
         debug!("Released connection held by {handle}");
      }
      self.registry.remove(handle);
      info!("Disposed tag {handle}");
   }

   /// Lookup, resolve and force-connect, in that order.
   async fn connect(&mut self, handle: &TagHandle, kind: TechnologyKind) -> Result<Technology> {
      let tag = self.registry.lookup(handle)?;
      let tech = resolver::resolve(&tag, kind)?;
      self.arbiter.force_connect(&tag, tech).await
   }

   async fn ndef_read(&mut self, handle: &TagHandle) -> Result<Option<NdefMessage>> {
      let tech = self.connect(handle, TechnologyKind::Ndef).await?;
      let ndef = tech
         .ndef()
         .ok_or(BrokerError::TechUnsupported(TechnologyKind::Ndef))?;
      bounded(self.operation_timeout, "read", ndef.read_message())
         .await
         .inspect_err(|e| warn!("NDEF read on {handle} failed: {e}"))
   }

   async fn ndef_write(&mut self, handle: &TagHandle, message: &NdefMessage) -> Result<()> {
      let tech = self.connect(handle, TechnologyKind::Ndef).await?;
      let ndef = tech
         .ndef()
         .ok_or(BrokerError::TechUnsupported(TechnologyKind::Ndef))?;
      bounded(self.operation_timeout, "write", ndef.write_message(message))
         .await
         .inspect_err(|e| warn!("NDEF write on {handle} failed: {e}"))?;
      info!("Wrote {} NDEF records to {handle}", message.records.len());
      Ok(())
   }

   async fn ndef_write_lock(&mut self, handle: &TagHandle) -> Result<()> {
      let tech = self.connect(handle, TechnologyKind::Ndef).await?;
      let ndef = tech
         .ndef()
         .ok_or(BrokerError::TechUnsupported(TechnologyKind::Ndef))?;
      let locked = bounded(self.operation_timeout, "lock", ndef.make_read_only())
         .await
         .inspect_err(|e| warn!("NDEF lock on {handle} failed: {e}"))?;
      if !locked {
         warn!("Tag {handle} refused to lock");
         return Err(BrokerError::tag_io("lock", TagIoError::LockRefused));
      }
      info!("Locked tag {handle}");
      Ok(())
   }

   async fn transceive(
      &mut self,
      handle: &TagHandle,
      kind: TechnologyKind,
      data: &[u8],
   ) -> Result<Vec<u8>> {
      let tag = self.registry.lookup(handle)?;
      if !kind.supports_transceive() {
         return Err(BrokerError::TechUnsupported(kind));
      }
      let tech = resolver::resolve(&tag, kind)?;
      let tech = self.arbiter.force_connect(&tag, tech).await?;
      let transceiver = tech
         .transceiver()
         .ok_or(BrokerError::TechUnsupported(kind))?;

      debug!("→ {handle} [{kind}]: {}", hex::encode(data));
      let response = bounded(self.operation_timeout, "transceive", transceiver.transceive(data))
         .await
         .inspect_err(|e| warn!("Transceive on {handle} failed: {e}"))?;
      debug!("← {handle} [{kind}]: {}", hex::encode(&response));
      Ok(response)
   }

   async fn cleanup(&mut self) {
      if self.scan.take().is_some() {
         self.adapter.disable_reader_mode();
      }
      self.arbiter.release().await;
      if !self.registry.is_empty() {
         info!("Dropping {} registered tags", self.registry.len());
         self.registry.clear();
      }
   }
}

/// Runs a driver action under `limit`, mapping driver failures onto `TagIo`.
async fn bounded<T>(
   limit: Duration,
   action: &'static str,
   fut: impl Future<Output = std::result::Result<T, TagIoError>>,
) -> Result<T> {
   time::timeout(limit, fut)
      .await
      .map_err(|_| BrokerError::Timeout(action))?
      .map_err(|e| BrokerError::tag_io(action, e))
}
