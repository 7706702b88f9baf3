//! Platform driver model for discovered tags.
//!
//! The platform owns the physical tag and its technology interfaces; this
//! module describes the capability the broker borrows from it, plus the
//! caller-visible [`TagHandle`] tokens issued for each discovery.

use core::fmt;
use std::{ops::Deref, sync::Arc};

use serde::{Deserialize, Serialize};
use smol_str::{SmolStr, ToSmolStr};
use thiserror::Error;
use uuid::Uuid;

pub mod metadata;
pub mod ndef;
pub mod technology;

use technology::{Technology, TechnologyKind};

/// Failure reported by a platform driver while talking to a tag.
#[derive(Error, Debug)]
pub enum TagIoError {
   #[error("Tag was lost")]
   TagLost,

   #[error("Technology is not connected")]
   NotConnected,

   #[error("Tag is read-only")]
   ReadOnly,

   #[error("Tag refused the lock request")]
   LockRefused,

   #[error("Message of {size} bytes exceeds tag capacity of {max} bytes")]
   CapacityExceeded { size: usize, max: usize },

   #[error("Malformed NDEF data: {0}")]
   Format(String),

   #[error("I/O error: {0}")]
   Io(#[from] std::io::Error),
}

/// A physical tag as seen by the platform driver.
pub trait Tag: Send + Sync {
   /// Anti-collision identifier of the tag.
   fn id(&self) -> &[u8];

   /// Technologies the tag advertises, in driver order.
   fn tech_list(&self) -> Vec<TechnologyKind>;

   /// Returns a connectable handle for `kind`, or `None` if the driver
   /// cannot provide one.
   fn technology(&self, kind: TechnologyKind) -> Option<Technology>;
}

/// Shared reference to a discovered tag.
///
/// Two identities are equal only when they point at the same driver object,
/// i.e. the same discovery.
#[derive(Clone)]
pub struct TagIdentity(Arc<dyn Tag>);

impl TagIdentity {
   pub fn new(tag: Arc<dyn Tag>) -> Self {
      Self(tag)
   }

   /// Hex form of the tag id, used in logs and state reports.
   pub fn id_hex(&self) -> String {
      hex::encode(self.0.id())
   }
}

impl Deref for TagIdentity {
   type Target = dyn Tag;

   fn deref(&self) -> &Self::Target {
      self.0.as_ref()
   }
}

impl PartialEq for TagIdentity {
   fn eq(&self, other: &Self) -> bool {
      Arc::ptr_eq(&self.0, &other.0)
   }
}

impl Eq for TagIdentity {}

impl fmt::Debug for TagIdentity {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.debug_tuple("TagIdentity").field(&self.id_hex()).finish()
   }
}

/// Opaque caller-visible token for a discovered tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagHandle(SmolStr);

impl TagHandle {
   /// Issues a fresh random handle. Handles are never reused.
   pub fn generate() -> Self {
      Self(Uuid::new_v4().to_smolstr())
   }

   pub fn as_str(&self) -> &str {
      self.0.as_str()
   }
}

impl From<&str> for TagHandle {
   fn from(value: &str) -> Self {
      Self(SmolStr::new(value))
   }
}

impl fmt::Display for TagHandle {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.write_str(self.as_str())
   }
}
