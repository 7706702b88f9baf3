//! D-Bus surface of the tag broker.
//!
//! Operations are carried as JSON through a single `Invoke` method; tag
//! discoveries are broadcast as `TagDiscovered` signals.

use std::sync::Arc;

use log::warn;
use serde_json::Value;
use zbus::{
   Connection, connection, interface,
   object_server::{InterfaceRef, SignalEmitter},
};

use crate::{
   dispatch::{self, Request, Response},
   error::Result,
   event::{EventQueue, SessionEvent},
   session::TagSession,
};

pub const BUS_NAME: &str = "org.nfcbroker";
pub const OBJECT_PATH: &str = "/org/nfcbroker/session";

pub struct TagBrokerService {
   session: TagSession,
}

impl TagBrokerService {
   pub const fn new(session: TagSession) -> Self {
      Self { session }
   }
}

/// Decodes `arguments_json`, runs the named operation and encodes the outcome.
///
/// An empty argument string stands for no arguments.
pub async fn invoke_json(session: &TagSession, name: &str, arguments_json: &str) -> String {
   let response = match parse_request(name, arguments_json) {
      Ok(request) => dispatch::invoke(session, &request).await,
      Err(e) => Response::from_result(Err(e)),
   };
   serde_json::to_string(&response).unwrap_or_else(|e| {
      warn!("Failed to encode response to {name}: {e}");
      String::from(r#"{"errorKind":"io_exception","message":"unencodable response"}"#)
   })
}

fn parse_request(name: &str, arguments_json: &str) -> Result<Request> {
   let arguments = if arguments_json.trim().is_empty() {
      Value::Null
   } else {
      serde_json::from_str(arguments_json)?
   };
   Request::new(name, arguments)
}

#[interface(name = "org.nfcbroker.Session")]
impl TagBrokerService {
   async fn invoke(&self, name: String, arguments_json: String) -> String {
      invoke_json(&self.session, &name, &arguments_json).await
   }

   #[zbus(signal)]
   pub async fn tag_discovered(
      emitter: &SignalEmitter<'_>,
      handle: &str,
      tag_json: &str,
   ) -> zbus::Result<()>;

   #[zbus(property)]
   async fn available(&self) -> bool {
      self.session.is_available().await
   }

   #[zbus(property)]
   async fn tag_count(&self) -> u32 {
      self.session.tag_count().await
   }
}

async fn dispatch_event(
   iface: &InterfaceRef<TagBrokerService>,
   event: SessionEvent,
) -> zbus::Result<()> {
   match event {
      SessionEvent::TagDiscovered { handle, payload } => {
         iface
            .tag_discovered(handle.as_str(), &payload.to_string())
            .await?;
      },
   }
   Ok(())
}

/// Forwards queued session events as signals until the queue is closed.
async fn spawn_dispatcher(events: Arc<EventQueue>, connection: &Connection) -> Result<()> {
   let iface = connection
      .object_server()
      .interface::<_, TagBrokerService>(OBJECT_PATH)
      .await?;
   tokio::spawn(async move {
      while let Some(event) = events.recv().await {
         if let Err(e) = dispatch_event(&iface, event).await {
            warn!("Error dispatching event: {e}");
         }
      }
   });
   Ok(())
}

/// Session bus connection claiming [`BUS_NAME`].
pub fn session_bus() -> Result<connection::Builder<'static>> {
   Ok(connection::Builder::session()?.name(BUS_NAME)?)
}

/// Serves `session` at [`OBJECT_PATH`] on the connection `builder` describes
/// and starts forwarding `events` as signals.
pub async fn serve(
   builder: connection::Builder<'_>,
   session: TagSession,
   events: Arc<EventQueue>,
) -> Result<Connection> {
   let connection = builder
      .serve_at(OBJECT_PATH, TagBrokerService::new(session))?
      .build()
      .await?;
   spawn_dispatcher(events, &connection).await?;
   Ok(connection)
}
