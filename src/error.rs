use std::str::FromStr;

use reqwest::header::InvalidHeaderValue;
use strum::Display;
use thiserror::Error;

use crate::context::ContextError;

/// Error of a highlighting call.
///
/// Errors reported by the server carry its address.
#[derive(Error, Debug)]
pub enum Error {
  /// The query theme is not known to the server.
  #[error("{server}: invalid theme")]
  InvalidTheme { server: String },

  /// The request is too large for the server to handle (e.g. file is too large to highlight).
  #[error("{server}: request too large")]
  RequestTooLarge { server: String },

  /// The server panicked while highlighting the code.
  ///
  /// This most often occurs when the syntax engine does not support an obscure
  /// sublime-syntax feature.
  #[error("{server}: syntect panic while highlighting")]
  Panic { server: String },

  /// The server's stabilizer noticed a worker taking too long, assumed it stuck,
  /// and restarted it.
  #[error("{server}: HSS worker timeout while serving request")]
  WorkerTimeout { server: String },

  /// The server reported an error this client does not know.
  #[error("{server}: unknown error={error:?} code={code:?}")]
  UnknownServer {
    server: String,
    error: String,
    code: String,
  },

  /// The server did not find the requested resource, which means this client
  /// sent the request to the wrong place.
  #[error("{server}: gosyntect internal error: resource_not_found")]
  InternalProtocol { server: String },

  #[error("making request to {url}")]
  Transport {
    url: String,
    #[source]
    source: TransportError,
  },

  #[error("decoding JSON response from {url}")]
  Decode {
    url: String,
    #[source]
    source: serde_json::Error,
  },

  #[error("encoding query")]
  Serialization(#[source] EncodeError),
}

/// Why no response was obtained.
#[derive(Error, Debug)]
pub enum TransportError {
  #[error(transparent)]
  Http(#[from] reqwest::Error),

  #[error(transparent)]
  Context(#[from] ContextError),
}

/// Why a query could not be put on the wire.
#[derive(Error, Debug)]
pub enum EncodeError {
  #[error(transparent)]
  Json(#[from] serde_json::Error),

  #[error("invalid header value: {0}")]
  Header(#[from] InvalidHeaderValue),
}

/// Kind of an [`Error`], without its context.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Display)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
  InvalidTheme,
  RequestTooLarge,
  Panic,
  WorkerTimeout,
  UnknownServer,
  InternalProtocol,
  Transport,
  Decode,
  Serialization,
}

/// Error codes sent by the server in the `code` field of a response.
#[derive(Debug, PartialEq, Eq, Clone, Copy, strum::EnumString, Display)]
#[strum(serialize_all = "snake_case")]
pub enum ServerCode {
  InvalidTheme,
  RequestTooLarge,
  /// Sent for a 404, the client requested an unknown path.
  ResourceNotFound,
  Panic,
  HssWorkerTimeout,
}

impl Error {
  /// Map an error reported by `server` to its typed error.
  ///
  /// Codes which are not a [`ServerCode`] give [`Error::UnknownServer`] with both strings kept.
  pub fn from_server(server: &str, error: &str, code: &str) -> Self {
    let server = server.to_string();
    match ServerCode::from_str(code) {
      Ok(ServerCode::InvalidTheme) => Error::InvalidTheme { server },
      Ok(ServerCode::RequestTooLarge) => Error::RequestTooLarge { server },
      Ok(ServerCode::ResourceNotFound) => Error::InternalProtocol { server },
      Ok(ServerCode::Panic) => Error::Panic { server },
      Ok(ServerCode::HssWorkerTimeout) => Error::WorkerTimeout { server },
      Err(_) => Error::UnknownServer {
        server,
        error: error.to_string(),
        code: code.to_string(),
      },
    }
  }

  pub fn kind(&self) -> ErrorKind {
    match self {
      Error::InvalidTheme { .. } => ErrorKind::InvalidTheme,
      Error::RequestTooLarge { .. } => ErrorKind::RequestTooLarge,
      Error::Panic { .. } => ErrorKind::Panic,
      Error::WorkerTimeout { .. } => ErrorKind::WorkerTimeout,
      Error::UnknownServer { .. } => ErrorKind::UnknownServer,
      Error::InternalProtocol { .. } => ErrorKind::InternalProtocol,
      Error::Transport { .. } => ErrorKind::Transport,
      Error::Decode { .. } => ErrorKind::Decode,
      Error::Serialization(_) => ErrorKind::Serialization,
    }
  }

  /// The reason of a transport error caused by the call's context, if it is one.
  pub fn context_error(&self) -> Option<ContextError> {
    match self {
      Error::Transport {
        source: TransportError::Context(e),
        ..
      } => Some(*e),
      _ => None,
    }
  }
}
