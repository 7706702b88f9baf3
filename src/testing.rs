//! Fake platform driver and adapter shared by the unit tests.
//!
//! Every fake technology writes `"<tag-id>:<call>:<kind>"` entries into a
//! journal so tests can assert the exact connect/close ordering.

use std::{
   sync::{
      Arc,
      atomic::{AtomicBool, AtomicU32, Ordering},
   },
   time::Duration,
};

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use zbus::{Guid, Message, MessageStream, connection, message};

use crate::{
   adapter::{NfcAdapter, ScanOptions},
   config::Config,
   event::{EventQueue, SessionEvent},
   session::{DiscoverySink, TagSession},
   tag::{
      Tag, TagHandle, TagIdentity, TagIoError,
      ndef::NdefMessage,
      technology::{
         IsoDep, Ndef, NfcA, NfcB, NfcF, NfcV, TagTechnology, Technology, TechnologyKind,
         Transceive,
      },
   },
};

pub type Journal = Arc<Mutex<Vec<String>>>;

pub fn init_logging() {
   let _ = env_logger::builder().is_test(true).try_init();
}

pub fn new_journal() -> Journal {
   Arc::new(Mutex::new(Vec::new()))
}

/// Fake technology handle; one type stands in for every kind.
pub struct FakeTech {
   kind: TechnologyKind,
   tag_id: String,
   journal: Journal,
   connected: AtomicBool,
   pub fail_connect: AtomicBool,
   pub fail_close: AtomicBool,
   pub fail_action: AtomicBool,
   pub refuse_lock: AtomicBool,
   pub hang_connect: AtomicBool,
   pub hang_action: AtomicBool,
   stored: Mutex<Option<NdefMessage>>,
   cached: Option<NdefMessage>,
}

impl FakeTech {
   fn record(&self, call: &str) {
      self
         .journal
         .lock()
         .push(format!("{}:{call}:{}", self.tag_id, self.kind));
   }

   fn ensure_connected(&self) -> Result<(), TagIoError> {
      if self.connected.load(Ordering::SeqCst) {
         Ok(())
      } else {
         Err(TagIoError::NotConnected)
      }
   }

   async fn action(&self, call: &str) -> Result<(), TagIoError> {
      self.ensure_connected()?;
      self.record(call);
      if self.hang_action.load(Ordering::SeqCst) {
         tokio::time::sleep(Duration::from_secs(3600)).await;
      }
      if self.fail_action.load(Ordering::SeqCst) {
         return Err(TagIoError::TagLost);
      }
      Ok(())
   }

   /// Simulates the tag leaving the field.
   pub fn drop_link(&self) {
      self.connected.store(false, Ordering::SeqCst);
   }
}

#[async_trait]
impl TagTechnology for FakeTech {
   async fn connect(&self) -> Result<(), TagIoError> {
      self.record("connect");
      if self.hang_connect.load(Ordering::SeqCst) {
         tokio::time::sleep(Duration::from_secs(3600)).await;
      }
      if self.fail_connect.load(Ordering::SeqCst) {
         return Err(TagIoError::TagLost);
      }
      self.connected.store(true, Ordering::SeqCst);
      Ok(())
   }

   async fn close(&self) -> Result<(), TagIoError> {
      self.record("close");
      self.connected.store(false, Ordering::SeqCst);
      if self.fail_close.load(Ordering::SeqCst) {
         return Err(TagIoError::TagLost);
      }
      Ok(())
   }

   fn is_connected(&self) -> bool {
      self.connected.load(Ordering::SeqCst)
   }
}

#[async_trait]
impl Transceive for FakeTech {
   async fn transceive(&self, data: &[u8]) -> Result<Vec<u8>, TagIoError> {
      self.action("transceive").await?;
      let mut response = data.to_vec();
      response.extend_from_slice(&[0x90, 0x00]);
      Ok(response)
   }

   fn max_transceive_length(&self) -> usize {
      253
   }
}

impl NfcA for FakeTech {
   fn atqa(&self) -> Vec<u8> {
      vec![0x44, 0x00]
   }

   fn sak(&self) -> u16 {
      0
   }

   fn timeout(&self) -> u32 {
      618
   }
}

impl NfcB for FakeTech {
   fn application_data(&self) -> Vec<u8> {
      vec![0, 0, 0, 0]
   }

   fn protocol_info(&self) -> Vec<u8> {
      vec![0x00, 0x81, 0x71]
   }
}

impl NfcF for FakeTech {
   fn manufacturer(&self) -> Vec<u8> {
      vec![0x01; 8]
   }

   fn system_code(&self) -> Vec<u8> {
      vec![0x88, 0xb4]
   }

   fn timeout(&self) -> u32 {
      255
   }
}

impl NfcV for FakeTech {
   fn response_flags(&self) -> u8 {
      0
   }

   fn dsf_id(&self) -> u8 {
      0
   }
}

impl IsoDep for FakeTech {
   fn historical_bytes(&self) -> Option<Vec<u8>> {
      Some(vec![0x80])
   }

   fn hi_layer_response(&self) -> Option<Vec<u8>> {
      None
   }

   fn is_extended_length_apdu_supported(&self) -> bool {
      false
   }

   fn timeout(&self) -> u32 {
      1000
   }
}

#[async_trait]
impl Ndef for FakeTech {
   fn ndef_type(&self) -> String {
      "org.nfcforum.ndef.type2".to_string()
   }

   fn max_size(&self) -> usize {
      137
   }

   fn is_writable(&self) -> bool {
      true
   }

   fn can_make_read_only(&self) -> bool {
      true
   }

   fn cached_message(&self) -> Option<NdefMessage> {
      self.cached.clone()
   }

   async fn read_message(&self) -> Result<Option<NdefMessage>, TagIoError> {
      self.action("read").await?;
      Ok(self.stored.lock().clone())
   }

   async fn write_message(&self, message: &NdefMessage) -> Result<(), TagIoError> {
      self.action("write").await?;
      *self.stored.lock() = Some(message.clone());
      Ok(())
   }

   async fn make_read_only(&self) -> Result<bool, TagIoError> {
      self.action("lock").await?;
      Ok(!self.refuse_lock.load(Ordering::SeqCst))
   }
}

pub struct FakeTag {
   id: Vec<u8>,
   advertised: Vec<TechnologyKind>,
   techs: Vec<Arc<FakeTech>>,
   journal: Journal,
}

pub struct FakeTagBuilder {
   id: Vec<u8>,
   advertised: Vec<TechnologyKind>,
   withheld: Vec<TechnologyKind>,
   cached: Option<NdefMessage>,
   journal: Option<Journal>,
}

impl FakeTag {
   pub fn builder(id: &[u8]) -> FakeTagBuilder {
      FakeTagBuilder {
         id: id.to_vec(),
         advertised: Vec::new(),
         withheld: Vec::new(),
         cached: None,
         journal: None,
      }
   }

   pub fn identity(self: &Arc<Self>) -> TagIdentity {
      TagIdentity::new(self.clone())
   }

   pub fn tech(&self, kind: TechnologyKind) -> Arc<FakeTech> {
      self
         .techs
         .iter()
         .find(|t| t.kind == kind)
         .cloned()
         .expect("tag does not carry this technology")
   }

   pub fn journal(&self) -> Vec<String> {
      self.journal.lock().clone()
   }

   pub fn clear_journal(&self) {
      self.journal.lock().clear();
   }
}

impl FakeTagBuilder {
   pub fn tech(mut self, kind: TechnologyKind) -> Self {
      self.advertised.push(kind);
      self
   }

   pub fn nfca(self) -> Self {
      self.tech(TechnologyKind::NfcA)
   }

   pub fn isodep(self) -> Self {
      self.tech(TechnologyKind::IsoDep)
   }

   pub fn ndef(self) -> Self {
      self.tech(TechnologyKind::Ndef)
   }

   pub fn ndef_with(mut self, cached: NdefMessage) -> Self {
      self.cached = Some(cached);
      self.ndef()
   }

   /// Advertises `kind` in the tech list without a driver handle for it.
   pub fn advertise_only(mut self, kind: TechnologyKind) -> Self {
      self.withheld.push(kind);
      self.tech(kind)
   }

   pub fn journal(mut self, journal: &Journal) -> Self {
      self.journal = Some(journal.clone());
      self
   }

   pub fn build(self) -> Arc<FakeTag> {
      let journal = self.journal.unwrap_or_else(new_journal);
      let tag_id = hex::encode(&self.id);
      let techs = self
         .advertised
         .iter()
         .filter(|kind| !self.withheld.contains(kind))
         .map(|&kind| {
            Arc::new(FakeTech {
               kind,
               tag_id: tag_id.clone(),
               journal: journal.clone(),
               connected: AtomicBool::new(false),
               fail_connect: AtomicBool::new(false),
               fail_close: AtomicBool::new(false),
               fail_action: AtomicBool::new(false),
               refuse_lock: AtomicBool::new(false),
               hang_connect: AtomicBool::new(false),
               hang_action: AtomicBool::new(false),
               stored: Mutex::new(self.cached.clone()),
               cached: self.cached.clone(),
            })
         })
         .collect();
      Arc::new(FakeTag {
         id: self.id,
         advertised: self.advertised,
         techs,
         journal,
      })
   }
}

impl Tag for FakeTag {
   fn id(&self) -> &[u8] {
      &self.id
   }

   fn tech_list(&self) -> Vec<TechnologyKind> {
      self.advertised.clone()
   }

   fn technology(&self, kind: TechnologyKind) -> Option<Technology> {
      let tech = self.techs.iter().find(|t| t.kind == kind)?.clone();
      Some(match kind {
         TechnologyKind::NfcA => Technology::NfcA(tech),
         TechnologyKind::NfcB => Technology::NfcB(tech),
         TechnologyKind::NfcF => Technology::NfcF(tech),
         TechnologyKind::NfcV => Technology::NfcV(tech),
         TechnologyKind::IsoDep => Technology::IsoDep(tech),
         TechnologyKind::Ndef => Technology::Ndef(tech),
      })
   }
}

pub struct FakeAdapter {
   pub present: AtomicBool,
   pub enabled: AtomicBool,
   pub level: AtomicU32,
   sink: Mutex<Option<DiscoverySink>>,
   pub scans: Mutex<Vec<ScanOptions>>,
   pub stops: AtomicU32,
}

impl FakeAdapter {
   pub fn new(level: u32) -> Arc<Self> {
      Arc::new(Self {
         present: AtomicBool::new(true),
         enabled: AtomicBool::new(true),
         level: AtomicU32::new(level),
         sink: Mutex::new(None),
         scans: Mutex::new(Vec::new()),
         stops: AtomicU32::new(0),
      })
   }

   /// Delivers a tag the way a platform reader callback would.
   pub fn discover(&self, tag: &Arc<FakeTag>) {
      self.sink().tag_discovered(tag.clone());
   }

   pub fn sink(&self) -> DiscoverySink {
      self.sink.lock().clone().expect("reader mode is not enabled")
   }

   pub fn is_scanning(&self) -> bool {
      self.sink.lock().is_some()
   }
}

impl NfcAdapter for FakeAdapter {
   fn is_present(&self) -> bool {
      self.present.load(Ordering::SeqCst)
   }

   fn is_enabled(&self) -> bool {
      self.enabled.load(Ordering::SeqCst)
   }

   fn platform_level(&self) -> u32 {
      self.level.load(Ordering::SeqCst)
   }

   fn enable_reader_mode(&self, options: &ScanOptions, sink: DiscoverySink) {
      self.scans.lock().push(options.clone());
      *self.sink.lock() = Some(sink);
   }

   fn disable_reader_mode(&self) {
      self.stops.fetch_add(1, Ordering::SeqCst);
      *self.sink.lock() = None;
   }
}

/// Session wired to a fake adapter with short timeouts.
pub struct Harness {
   pub session: TagSession,
   pub adapter: Arc<FakeAdapter>,
   pub events: Arc<EventQueue>,
}

impl Harness {
   pub fn new() -> Self {
      Self::with_config(Config {
         connect_timeout_ms: 200,
         operation_timeout_ms: 200,
         ..Config::default()
      })
   }

   pub fn with_config(config: Config) -> Self {
      init_logging();
      let adapter = FakeAdapter::new(config.min_platform_level);
      let events = EventQueue::new();
      let session = TagSession::new(adapter.clone(), events.clone(), &config);
      Self {
         session,
         adapter,
         events,
      }
   }

   /// Starts an unfiltered scan if needed, delivers `tag`, and returns the
   /// handle announced for it.
   pub async fn discover(&self, tag: &Arc<FakeTag>) -> TagHandle {
      if !self.adapter.is_scanning() {
         self
            .session
            .start_scan(ScanOptions::default())
            .await
            .expect("scan should start");
      }
      self.adapter.discover(tag);
      match self.next_event().await {
         SessionEvent::TagDiscovered { handle, .. } => handle,
      }
   }

   pub async fn next_event(&self) -> SessionEvent {
      tokio::time::timeout(Duration::from_secs(5), self.events.recv())
         .await
         .expect("no event delivered")
         .expect("event queue closed")
   }
}

/// Both ends of an in-process peer-to-peer D-Bus link: the first acts as the
/// server, the second as the client. Build them concurrently.
pub fn p2p_builders() -> (connection::Builder<'static>, connection::Builder<'static>) {
   let (server, client) = tokio::net::UnixStream::pair().expect("socket pair");
   let server = connection::Builder::unix_stream(server)
      .server(Guid::generate())
      .expect("server guid")
      .p2p();
   let client = connection::Builder::unix_stream(client).p2p();
   (server, client)
}

/// Waits for the next signal named `member`, skipping everything else.
pub async fn next_signal(stream: &mut MessageStream, member: &str) -> Message {
   let wait = async {
      while let Some(msg) = stream.next().await {
         let msg = msg.expect("malformed message");
         if msg.message_type() == message::Type::Signal
            && msg.header().member().is_some_and(|m| m.as_str() == member)
         {
            return msg;
         }
      }
      panic!("connection closed before {member}");
   };
   tokio::time::timeout(Duration::from_secs(5), wait)
      .await
      .expect("no signal delivered")
}
