//! Error types for the tag broker.
//!
//! Every failure a caller can observe is a [`BrokerError`]; each variant maps
//! onto one of the stable [`ErrorKind`] identifiers sent across the operation
//! boundary.

use serde::Serialize;
use thiserror::Error;

use crate::tag::{TagHandle, TagIoError, technology::TechnologyKind};

/// Main error type for the tag broker.
#[derive(Error, Debug)]
pub enum BrokerError {
   #[error("Scanning requires platform level {required}, found {actual}")]
   Unavailable { required: u32, actual: u32 },

   #[error("Tag session has been shut down")]
   SessionClosed,

   #[error("Tag is not found: {0}")]
   TagNotFound(TagHandle),

   #[error("Tag does not support {0}")]
   TechUnsupported(TechnologyKind),

   #[error("Failed to connect: {0}")]
   Connect(#[source] TagIoError),

   #[error("Failed to {action}: {source}")]
   TagIo {
      action: &'static str,
      #[source]
      source: TagIoError,
   },

   #[error("Timed out waiting for {0}")]
   Timeout(&'static str),

   #[error("Invalid arguments: {0}")]
   InvalidArguments(String),

   #[error("Unknown operation: {0}")]
   NotImplemented(String),

   #[error("D-Bus error: {0}")]
   DBus(#[from] zbus::Error),

   #[error("I/O error: {0}")]
   Io(#[from] std::io::Error),

   #[error("JSON error: {0}")]
   Json(#[from] serde_json::Error),

   #[error("Could not determine config directory")]
   ConfigDirNotFound,

   #[error("TOML parsing error: {0}")]
   TomlParse(#[from] toml::de::Error),

   #[error("TOML serialization error: {0}")]
   TomlSerialize(#[from] toml::ser::Error),
}

impl BrokerError {
   pub(crate) const fn tag_io(action: &'static str, source: TagIoError) -> Self {
      Self::TagIo { action, source }
   }

   /// Stable identifier reported to callers alongside the message.
   pub const fn kind(&self) -> ErrorKind {
      match self {
         Self::Unavailable { .. } | Self::SessionClosed => ErrorKind::Unavailable,
         Self::TagNotFound(_) => ErrorKind::NotFound,
         Self::TechUnsupported(_) => ErrorKind::TechUnsupported,
         Self::InvalidArguments(_) | Self::Json(_) => ErrorKind::InvalidArguments,
         Self::NotImplemented(_) => ErrorKind::NotImplemented,
         Self::Connect(_)
         | Self::TagIo { .. }
         | Self::Timeout(_)
         | Self::DBus(_)
         | Self::Io(_)
         | Self::ConfigDirNotFound
         | Self::TomlParse(_)
         | Self::TomlSerialize(_) => ErrorKind::IoException,
      }
   }
}

/// Error identifiers carried in `errorKind` of a failed response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
   Unavailable,
   NotFound,
   TechUnsupported,
   IoException,
   InvalidArguments,
   NotImplemented,
}

/// Convenience type alias for Results with `BrokerError`.
pub type Result<T> = std::result::Result<T, BrokerError>;
