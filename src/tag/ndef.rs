//! Structured NDEF message payload.
//!
//! Only the record structure lives here; byte-level encoding onto the tag is
//! left to the platform driver.

use serde::{Deserialize, Serialize};

use crate::tag::TagIoError;

/// Language code length is a 6-bit field of the text record status byte.
const MAX_LANGUAGE_CODE_LEN: usize = 0x3f;

/// Type name format of an NDEF record header (3 bits).
#[repr(u8)]
#[derive(
   Debug,
   Clone,
   Copy,
   PartialEq,
   Eq,
   Default,
   Serialize,
   Deserialize,
   strum::FromRepr,
   strum::Display,
)]
#[serde(into = "u8", try_from = "u8")]
pub enum TypeNameFormat {
   #[default]
   Empty = 0x00,
   WellKnown = 0x01,
   Media = 0x02,
   AbsoluteUri = 0x03,
   External = 0x04,
   Unknown = 0x05,
   Unchanged = 0x06,
}

impl From<TypeNameFormat> for u8 {
   fn from(value: TypeNameFormat) -> Self {
      value as Self
   }
}

impl TryFrom<u8> for TypeNameFormat {
   type Error = String;

   fn try_from(value: u8) -> Result<Self, Self::Error> {
      Self::from_repr(value).ok_or_else(|| format!("invalid type name format: {value}"))
   }
}

/// A single NDEF record.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NdefRecord {
   #[serde(default)]
   pub type_name_format: TypeNameFormat,
   #[serde(default, rename = "type")]
   pub record_type: Vec<u8>,
   #[serde(default)]
   pub identifier: Vec<u8>,
   #[serde(default)]
   pub payload: Vec<u8>,
}

impl NdefRecord {
   /// Well-known URI record (`U`) without an abbreviation prefix.
   pub fn uri(uri: &str) -> Self {
      let mut payload = Vec::with_capacity(uri.len() + 1);
      payload.push(0x00);
      payload.extend_from_slice(uri.as_bytes());
      Self {
         type_name_format: TypeNameFormat::WellKnown,
         record_type: b"U".to_vec(),
         identifier: Vec::new(),
         payload,
      }
   }

   /// Well-known text record (`T`), UTF-8 encoded.
   pub fn text(language: &str, text: &str) -> Result<Self, TagIoError> {
      let lang = language.as_bytes();
      if lang.len() > MAX_LANGUAGE_CODE_LEN {
         return Err(TagIoError::Format(format!(
            "language code of {} bytes exceeds {MAX_LANGUAGE_CODE_LEN}",
            lang.len()
         )));
      }
      let mut payload = Vec::with_capacity(1 + lang.len() + text.len());
      payload.push(lang.len() as u8);
      payload.extend_from_slice(lang);
      payload.extend_from_slice(text.as_bytes());
      Ok(Self {
         type_name_format: TypeNameFormat::WellKnown,
         record_type: b"T".to_vec(),
         identifier: Vec::new(),
         payload,
      })
   }
}

/// An ordered list of NDEF records.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NdefMessage {
   pub records: Vec<NdefRecord>,
}

impl NdefMessage {
   pub const fn new(records: Vec<NdefRecord>) -> Self {
      Self { records }
   }

   pub fn is_empty(&self) -> bool {
      self.records.is_empty()
   }
}
