//! Tag registry: handle to tag identity map for one session.

use std::collections::HashMap;

use crate::{
   error::{BrokerError, Result},
   tag::{TagHandle, TagIdentity},
};

#[derive(Default)]
pub struct TagRegistry {
   tags: HashMap<TagHandle, TagIdentity>,
}

impl TagRegistry {
   pub fn new() -> Self {
      Self::default()
   }

   /// Registers a discovered tag under a fresh handle.
   pub fn insert(&mut self, identity: TagIdentity) -> TagHandle {
      let handle = TagHandle::generate();
      self.tags.insert(handle.clone(), identity);
      handle
   }

   pub fn lookup(&self, handle: &TagHandle) -> Result<TagIdentity> {
      self
         .tags
         .get(handle)
         .cloned()
         .ok_or_else(|| BrokerError::TagNotFound(handle.clone()))
   }

   /// Removes the record. Unknown handles yield `None` rather than an error.
   pub fn remove(&mut self, handle: &TagHandle) -> Option<TagIdentity> {
      self.tags.remove(handle)
   }

   pub fn len(&self) -> usize {
      self.tags.len()
   }

   pub fn is_empty(&self) -> bool {
      self.tags.is_empty()
   }

   pub fn clear(&mut self) {
      self.tags.clear();
   }
}
