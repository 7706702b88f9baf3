//! Connection arbiter.
//!
//! Holds the single connected technology of a session. The driver only
//! allows one open technology at a time, across technologies of one tag and
//! across tags, so every switch closes the previous connection before the
//! next one opens.

use std::time::Duration;

use log::{debug, info, warn};
use tokio::time;

use crate::{
   error::{BrokerError, Result},
   tag::{
      TagIdentity,
      technology::{Technology, TechnologyKind},
   },
};

/// Observable arbiter state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArbiterState {
   Idle,
   Connected {
      tag_id: String,
      kind: TechnologyKind,
   },
}

struct ActiveConnection {
   tag: TagIdentity,
   tech: Technology,
}

pub struct ConnectionArbiter {
   active: Option<ActiveConnection>,
   connect_timeout: Duration,
}

impl ConnectionArbiter {
   pub const fn new(connect_timeout: Duration) -> Self {
      Self {
         active: None,
         connect_timeout,
      }
   }

   pub fn state(&self) -> ArbiterState {
      match &self.active {
         None => ArbiterState::Idle,
         Some(active) => ArbiterState::Connected {
            tag_id: active.tag.id_hex(),
            kind: active.tech.kind(),
         },
      }
   }

   /// Makes `candidate` the connected technology of `tag`.
   ///
   /// If the same tag is already connected through the same kind, the held
   /// connection is returned as-is, regardless of which driver object
   /// `candidate` is. A held connection whose link dropped is reopened.
   /// On a failed open the arbiter is left idle.
   pub async fn force_connect(
      &mut self,
      tag: &TagIdentity,
      candidate: Technology,
   ) -> Result<Technology> {
      let kind = candidate.kind();
      if let Some(active) = &self.active
         && active.tag == *tag
         && active.tech.kind() == kind
      {
         if active.tech.lifecycle().is_connected() {
            return Ok(active.tech.clone());
         }
         debug!("Held {kind} link to {} dropped, reconnecting", tag.id_hex());
      }

      if let Some(previous) = self.active.take() {
         self.close_quietly(&previous).await;
      }

      debug!("Connecting {kind} on {}", tag.id_hex());
      let outcome = time::timeout(self.connect_timeout, candidate.lifecycle().connect()).await;
      match outcome {
         Ok(Ok(())) => {
            info!("Connected {kind} on {}", tag.id_hex());
            self.active = Some(ActiveConnection {
               tag: tag.clone(),
               tech: candidate.clone(),
            });
            Ok(candidate)
         },
         Ok(Err(e)) => {
            warn!("Failed to connect {kind} on {}: {e}", tag.id_hex());
            Err(BrokerError::Connect(e))
         },
         Err(_) => {
            warn!("Connecting {kind} on {} timed out", tag.id_hex());
            self
               .close_quietly(&ActiveConnection {
                  tag: tag.clone(),
                  tech: candidate,
               })
               .await;
            Err(BrokerError::Timeout("connect"))
         },
      }
   }

   /// Releases the connection if `tag` owns it. Returns whether it did.
   pub async fn release_if_owned_by(&mut self, tag: &TagIdentity) -> bool {
      let owned = self.active.as_ref().is_some_and(|active| active.tag == *tag);
      if !owned {
         return false;
      }
      if let Some(active) = self.active.take()
         && active.tech.lifecycle().is_connected()
      {
         self.close_quietly(&active).await;
      }
      true
   }

   /// Releases whatever is connected; used at session teardown.
   pub async fn release(&mut self) {
      if let Some(active) = self.active.take() {
         self.close_quietly(&active).await;
      }
   }

   async fn close_quietly(&self, conn: &ActiveConnection) {
      let kind = conn.tech.kind();
      match time::timeout(self.connect_timeout, conn.tech.lifecycle().close()).await {
         Ok(Ok(())) => debug!("Closed {kind} on {}", conn.tag.id_hex()),
         Ok(Err(e)) => debug!("Ignoring close error for {kind} on {}: {e}", conn.tag.id_hex()),
         Err(_) => warn!("Closing {kind} on {} timed out", conn.tag.id_hex()),
      }
   }
}
