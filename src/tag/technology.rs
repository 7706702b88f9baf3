//! Technology kinds and the typed driver interfaces behind them.
//!
//! Every kind has its own trait so kind-specific actions are checked at
//! compile time; [`Technology`] closes over them with one variant per kind.

use core::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::tag::{TagIoError, ndef::NdefMessage};

/// Low-level protocol a tag may expose.
#[derive(
   Debug,
   Clone,
   Copy,
   PartialEq,
   Eq,
   Hash,
   Serialize,
   Deserialize,
   strum::Display,
   strum::EnumString,
   strum::IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum TechnologyKind {
   NfcA,
   NfcB,
   NfcF,
   NfcV,
   IsoDep,
   Ndef,
}

impl TechnologyKind {
   /// Whether raw `transceive` is defined for this kind.
   pub const fn supports_transceive(self) -> bool {
      !matches!(self, Self::Ndef)
   }

   pub fn to_str(self) -> &'static str {
      self.into()
   }
}

/// Connection lifecycle shared by every technology.
#[async_trait]
pub trait TagTechnology: Send + Sync {
   async fn connect(&self) -> Result<(), TagIoError>;

   async fn close(&self) -> Result<(), TagIoError>;

   fn is_connected(&self) -> bool;
}

/// Raw request/response exchange over a connected technology.
#[async_trait]
pub trait Transceive: TagTechnology {
   async fn transceive(&self, data: &[u8]) -> Result<Vec<u8>, TagIoError>;

   fn max_transceive_length(&self) -> usize;
}

/// ISO 14443-3A.
pub trait NfcA: Transceive {
   fn atqa(&self) -> Vec<u8>;
   fn sak(&self) -> u16;
   fn timeout(&self) -> u32;
}

/// ISO 14443-3B.
pub trait NfcB: Transceive {
   fn application_data(&self) -> Vec<u8>;
   fn protocol_info(&self) -> Vec<u8>;
}

/// JIS 6319-4 (FeliCa).
pub trait NfcF: Transceive {
   fn manufacturer(&self) -> Vec<u8>;
   fn system_code(&self) -> Vec<u8>;
   fn timeout(&self) -> u32;
}

/// ISO 15693.
pub trait NfcV: Transceive {
   fn response_flags(&self) -> u8;
   fn dsf_id(&self) -> u8;
}

/// ISO 14443-4.
pub trait IsoDep: Transceive {
   fn historical_bytes(&self) -> Option<Vec<u8>>;
   fn hi_layer_response(&self) -> Option<Vec<u8>>;
   fn is_extended_length_apdu_supported(&self) -> bool;
   fn timeout(&self) -> u32;
}

/// NDEF formatted storage.
#[async_trait]
pub trait Ndef: TagTechnology {
   fn ndef_type(&self) -> String;
   fn max_size(&self) -> usize;
   fn is_writable(&self) -> bool;
   fn can_make_read_only(&self) -> bool;

   /// Message read by the platform at discovery time.
   fn cached_message(&self) -> Option<NdefMessage>;

   async fn read_message(&self) -> Result<Option<NdefMessage>, TagIoError>;

   async fn write_message(&self, message: &NdefMessage) -> Result<(), TagIoError>;

   /// Permanently locks the tag. `false` means the tag refused.
   async fn make_read_only(&self) -> Result<bool, TagIoError>;
}

/// A connectable handle to one technology of one tag.
#[derive(Clone)]
pub enum Technology {
   NfcA(Arc<dyn NfcA>),
   NfcB(Arc<dyn NfcB>),
   NfcF(Arc<dyn NfcF>),
   NfcV(Arc<dyn NfcV>),
   IsoDep(Arc<dyn IsoDep>),
   Ndef(Arc<dyn Ndef>),
}

impl Technology {
   pub const fn kind(&self) -> TechnologyKind {
      match self {
         Self::NfcA(_) => TechnologyKind::NfcA,
         Self::NfcB(_) => TechnologyKind::NfcB,
         Self::NfcF(_) => TechnologyKind::NfcF,
         Self::NfcV(_) => TechnologyKind::NfcV,
         Self::IsoDep(_) => TechnologyKind::IsoDep,
         Self::Ndef(_) => TechnologyKind::Ndef,
      }
   }

   /// Lifecycle half of the handle, used by the arbiter.
   pub fn lifecycle(&self) -> &dyn TagTechnology {
      let t: &dyn TagTechnology = match self {
         Self::NfcA(t) => &**t,
         Self::NfcB(t) => &**t,
         Self::NfcF(t) => &**t,
         Self::NfcV(t) => &**t,
         Self::IsoDep(t) => &**t,
         Self::Ndef(t) => &**t,
      };
      t
   }

   pub fn transceiver(&self) -> Option<&dyn Transceive> {
      let t: &dyn Transceive = match self {
         Self::NfcA(t) => &**t,
         Self::NfcB(t) => &**t,
         Self::NfcF(t) => &**t,
         Self::NfcV(t) => &**t,
         Self::IsoDep(t) => &**t,
         Self::Ndef(_) => return None,
      };
      Some(t)
   }

   pub fn ndef(&self) -> Option<&dyn Ndef> {
      match self {
         Self::Ndef(t) => Some(&**t),
         _ => None,
      }
   }

   /// Read-only properties of the technology, as reported on discovery.
   pub fn to_json(&self) -> serde_json::Value {
      match self {
         Self::NfcA(t) => json!({
            "atqa": t.atqa(),
            "sak": t.sak(),
            "maxTransceiveLength": t.max_transceive_length(),
            "timeout": t.timeout(),
         }),
         Self::NfcB(t) => json!({
            "applicationData": t.application_data(),
            "protocolInfo": t.protocol_info(),
            "maxTransceiveLength": t.max_transceive_length(),
         }),
         Self::NfcF(t) => json!({
            "manufacturer": t.manufacturer(),
            "systemCode": t.system_code(),
            "maxTransceiveLength": t.max_transceive_length(),
            "timeout": t.timeout(),
         }),
         Self::NfcV(t) => json!({
            "responseFlags": t.response_flags(),
            "dsfId": t.dsf_id(),
            "maxTransceiveLength": t.max_transceive_length(),
         }),
         Self::IsoDep(t) => json!({
            "historicalBytes": t.historical_bytes(),
            "hiLayerResponse": t.hi_layer_response(),
            "isExtendedLengthApduSupported": t.is_extended_length_apdu_supported(),
            "maxTransceiveLength": t.max_transceive_length(),
            "timeout": t.timeout(),
         }),
         Self::Ndef(t) => json!({
            "type": t.ndef_type(),
            "isWritable": t.is_writable(),
            "maxSize": t.max_size(),
            "canMakeReadOnly": t.can_make_read_only(),
            "cachedMessage": t.cached_message(),
         }),
      }
   }
}

impl fmt::Debug for Technology {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.debug_tuple("Technology").field(&self.kind()).finish()
   }
}
