//! Named-operation boundary.
//!
//! Requests arrive as `{name, arguments}` with already-decoded values and
//! leave as `{ok}` or `{errorKind, message}`.

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value, json};

use crate::{
   adapter::ScanOptions,
   error::{BrokerError, ErrorKind, Result},
   session::TagSession,
   tag::{TagHandle, ndef::NdefMessage, technology::TechnologyKind},
};

/// An operation request as received from the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
   pub name: String,
   #[serde(default)]
   pub arguments: Map<String, Value>,
}

impl Request {
   /// Builds a request from decoded arguments. `null` stands for no
   /// arguments; any other non-object value is rejected.
   pub fn new(name: impl Into<String>, arguments: Value) -> Result<Self> {
      let arguments = match arguments {
         Value::Object(map) => map,
         Value::Null => Map::new(),
         other => {
            return Err(BrokerError::InvalidArguments(format!(
               "arguments must be an object, got {other}"
            )));
         },
      };
      Ok(Self {
         name: name.into(),
         arguments,
      })
   }
}

/// Outcome of an operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Response {
   Ok {
      ok: Value,
   },
   Err {
      #[serde(rename = "errorKind")]
      error_kind: ErrorKind,
      message: String,
   },
}

impl Response {
   pub fn from_result(result: Result<Value>) -> Self {
      match result {
         Ok(ok) => Self::Ok { ok },
         Err(e) => Self::Err {
            error_kind: e.kind(),
            message: e.to_string(),
         },
      }
   }

   pub const fn is_ok(&self) -> bool {
      matches!(self, Self::Ok { .. })
   }
}

/// A decoded operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
   IsAvailable,
   StartScan(ScanOptions),
   StopScan,
   Dispose(TagHandle),
   NdefRead(TagHandle),
   NdefWrite(TagHandle, NdefMessage),
   NdefWriteLock(TagHandle),
   Transceive(TagHandle, TechnologyKind, Vec<u8>),
}

#[derive(Deserialize)]
struct HandleArgs {
   handle: TagHandle,
}

#[derive(Deserialize)]
struct NdefWriteArgs {
   handle: TagHandle,
   message: NdefMessage,
}

#[derive(Deserialize)]
struct TransceiveArgs {
   handle: TagHandle,
   tech: String,
   data: Vec<u8>,
}

fn decode<T: DeserializeOwned>(arguments: &Map<String, Value>) -> Result<T> {
   serde_json::from_value(Value::Object(arguments.clone()))
      .map_err(|e| BrokerError::InvalidArguments(e.to_string()))
}

impl Operation {
   pub fn from_request(request: &Request) -> Result<Self> {
      let args = &request.arguments;
      let op = match request.name.as_str() {
         "isAvailable" => Self::IsAvailable,
         "startScan" => Self::StartScan(decode(args)?),
         "stopScan" => Self::StopScan,
         "dispose" => Self::Dispose(decode::<HandleArgs>(args)?.handle),
         "ndefRead" => Self::NdefRead(decode::<HandleArgs>(args)?.handle),
         "ndefWrite" => {
            let NdefWriteArgs { handle, message } = decode(args)?;
            Self::NdefWrite(handle, message)
         },
         "ndefWriteLock" => Self::NdefWriteLock(decode::<HandleArgs>(args)?.handle),
         "transceive" => {
            let TransceiveArgs { handle, tech, data } = decode(args)?;
            let kind = tech
               .parse::<TechnologyKind>()
               .map_err(|_| BrokerError::InvalidArguments(format!("Unknown technology: {tech}")))?;
            Self::Transceive(handle, kind, data)
         },
         other => return Err(BrokerError::NotImplemented(other.to_string())),
      };
      Ok(op)
   }

   pub const fn name(&self) -> &'static str {
      match self {
         Self::IsAvailable => "isAvailable",
         Self::StartScan(_) => "startScan",
         Self::StopScan => "stopScan",
         Self::Dispose(_) => "dispose",
         Self::NdefRead(_) => "ndefRead",
         Self::NdefWrite(..) => "ndefWrite",
         Self::NdefWriteLock(_) => "ndefWriteLock",
         Self::Transceive(..) => "transceive",
      }
   }

   /// Runs the operation against `session`.
   pub async fn execute(self, session: &TagSession) -> Result<Value> {
      match self {
         Self::IsAvailable => Ok(json!(session.is_available().await)),
         Self::StartScan(options) => session.start_scan(options).await.map(|()| Value::Null),
         Self::StopScan => session.stop_scan().await.map(|()| Value::Null),
         Self::Dispose(handle) => {
            session.dispose(&handle).await;
            Ok(Value::Null)
         },
         Self::NdefRead(handle) => Ok(json!(session.ndef_read(&handle).await?)),
         Self::NdefWrite(handle, message) => {
            session.ndef_write(&handle, message).await?;
            Ok(Value::Null)
         },
         Self::NdefWriteLock(handle) => {
            session.ndef_write_lock(&handle).await?;
            Ok(Value::Null)
         },
         Self::Transceive(handle, kind, data) => {
            Ok(json!(session.transceive(&handle, kind, data).await?))
         },
      }
   }
}

/// Decodes and executes `request`, folding every failure into the response.
pub async fn invoke(session: &TagSession, request: &Request) -> Response {
   let result = match Operation::from_request(request) {
      Ok(op) => {
         log::debug!("Dispatching {}", op.name());
         op.execute(session).await
      },
      Err(e) => Err(e),
   };
   if let Err(e) = &result {
      log::debug!("{} failed: {e}", request.name);
   }
   Response::from_result(result)
}
