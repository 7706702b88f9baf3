//! Discovery payload serialization.

use serde_json::{Map, Value, json};

use crate::tag::{Tag, TagHandle};

/// Serializes the tag's id, advertised technologies and per-technology
/// properties. Technologies the driver cannot hand out are listed in
/// `techList` but contribute no object.
pub fn tag_to_json(tag: &dyn Tag) -> Value {
   let techs = tag.tech_list();
   let mut info = Map::new();
   info.insert("id".into(), json!(tag.id()));
   info.insert(
      "techList".into(),
      json!(techs.iter().map(|k| k.to_str()).collect::<Vec<_>>()),
   );
   for kind in techs {
      if let Some(tech) = tag.technology(kind) {
         info.insert(kind.to_str().into(), tech.to_json());
      }
   }
   Value::Object(info)
}

/// Discovery event payload: the tag metadata plus its handle.
pub fn discovery_payload(handle: &TagHandle, tag: &dyn Tag) -> Value {
   let mut payload = tag_to_json(tag);
   payload["handle"] = json!(handle.as_str());
   payload
}

#[cfg(test)]
mod tests {
   use super::*;
   use crate::{
      tag::ndef::{NdefMessage, NdefRecord},
      testing::FakeTag,
   };

   #[test]
   fn test_payload_lists_every_technology() {
      let tag = FakeTag::builder(&[0x04, 0x11, 0x22])
         .nfca()
         .isodep()
         .ndef_with(NdefMessage::new(vec![NdefRecord::uri("x")]))
         .build();
      let handle = TagHandle::from("h-1");

      let payload = discovery_payload(&handle, &*tag);

      assert_eq!(payload["handle"], json!("h-1"));
      assert_eq!(payload["id"], json!([4, 0x11, 0x22]));
      assert_eq!(payload["techList"], json!(["nfca", "isodep", "ndef"]));
      assert!(payload["nfca"].is_object());
      assert_eq!(payload["isodep"]["isExtendedLengthApduSupported"], json!(false));
      assert_eq!(payload["ndef"]["isWritable"], json!(true));
      assert_eq!(
         payload["ndef"]["cachedMessage"]["records"][0]["type"],
         json!([0x55])
      );
      assert!(payload.get("nfcb").is_none());
   }
}
