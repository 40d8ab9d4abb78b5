use std::time;

use serde::Deserialize;
use serde_with::{serde_as, DefaultOnNull};

use crate::error::Error;

/// Response to a code highlighting query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
  /// The highlighted HTML version of `Query::code`.
  pub data: String,

  /// Whether no syntax was found for the file and it was rendered as plain text instead.
  pub plaintext: bool,

  /// The time the server took purely for highlighting, in nanoseconds.
  pub time_nanos: i64,
}

impl Response {
  /// Highlighting time as a duration. Negative reports count as zero.
  pub fn time(&self) -> time::Duration {
    time::Duration::from_nanos(self.time_nanos.max(0) as u64)
  }
}

/// JSON body of every server response, successful or not.
///
/// Missing and `null` fields both take their zero value.
#[serde_as]
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct Envelope {
  #[serde_as(deserialize_as = "DefaultOnNull")]
  pub data: String,
  #[serde_as(deserialize_as = "DefaultOnNull")]
  pub plaintext: bool,
  #[serde(rename = "time_ns")]
  #[serde_as(deserialize_as = "DefaultOnNull")]
  pub time_nanos: i64,

  /// Empty on success.
  #[serde_as(deserialize_as = "DefaultOnNull")]
  pub error: String,
  #[serde_as(deserialize_as = "DefaultOnNull")]
  pub code: String,
}

impl Envelope {
  /// Convert to the response, or to the error it reports.
  pub fn into_result(self, server: &str) -> Result<Response, Error> {
    if !self.error.is_empty() {
      return Err(Error::from_server(server, &self.error, &self.code));
    }
    return Ok(Response {
      data: self.data,
      plaintext: self.plaintext,
      time_nanos: self.time_nanos,
    });
  }
}
