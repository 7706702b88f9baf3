//! Scanning front end.
//!
//! The platform adapter discovers tags while reader mode is enabled and hands
//! each one to the session through a [`DiscoverySink`].

use serde::{Deserialize, Serialize};

use crate::{
   session::DiscoverySink,
   tag::{Tag, technology::TechnologyKind},
};

/// Which discovered tags a scan reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ScanFilter {
   /// Every discovered tag.
   #[default]
   Any,
   /// Only tags advertising NDEF.
   Ndef,
}

/// Options for a scan session.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanOptions {
   #[serde(default)]
   pub filter: ScanFilter,
}

impl ScanOptions {
   pub const fn ndef() -> Self {
      Self {
         filter: ScanFilter::Ndef,
      }
   }

   /// Whether a discovered tag should be registered under these options.
   pub fn admits(&self, tag: &dyn Tag) -> bool {
      match self.filter {
         ScanFilter::Any => true,
         ScanFilter::Ndef => tag.tech_list().contains(&TechnologyKind::Ndef),
      }
   }
}

/// Platform NFC adapter.
pub trait NfcAdapter: Send + Sync {
   fn is_present(&self) -> bool;

   fn is_enabled(&self) -> bool;

   /// Capability level of the platform, compared against
   /// [`Config::min_platform_level`](crate::config::Config::min_platform_level).
   fn platform_level(&self) -> u32;

   /// Starts delivering discovered tags to `sink`. Replaces any previous
   /// reader-mode registration.
   fn enable_reader_mode(&self, options: &ScanOptions, sink: DiscoverySink);

   fn disable_reader_mode(&self);
}
