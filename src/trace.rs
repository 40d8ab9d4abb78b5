//! Optional span instrumentation of highlighting calls.
//!
//! A [`Query`](crate::Query) without a tracer is traced by [`NoopTracer`],
//! so the request path is the same whether tracing is wanted or not.

use std::{
  fmt::{Debug, Display},
  time,
};

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::context::Context;

/// Value of a span tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagValue {
  String(String),
  Bool(bool),
  Int(i64),
}

impl Display for TagValue {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      TagValue::String(s) => write!(f, "{:?}", s),
      TagValue::Bool(b) => write!(f, "{}", b),
      TagValue::Int(i) => write!(f, "{}", i),
    }
  }
}

impl From<&str> for TagValue {
  fn from(s: &str) -> Self {
    TagValue::String(s.to_string())
  }
}

impl From<String> for TagValue {
  fn from(s: String) -> Self {
    TagValue::String(s)
  }
}

impl From<bool> for TagValue {
  fn from(b: bool) -> Self {
    TagValue::Bool(b)
  }
}

impl From<i64> for TagValue {
  fn from(i: i64) -> Self {
    TagValue::Int(i)
  }
}

impl From<u16> for TagValue {
  fn from(i: u16) -> Self {
    TagValue::Int(i.into())
  }
}

/// Creates spans around outgoing calls.
pub trait Tracer: Debug + Send + Sync {
  /// Start a span for `operation`, which runs under `ctx`.
  fn start_span(&self, ctx: &Context, operation: &str) -> Box<dyn Span>;
}

/// A running span. It is recorded when [`Span::finish`] is called.
pub trait Span: Send {
  fn set_tag(&mut self, key: &str, value: TagValue);

  /// Propagate the span into the headers of the outgoing request.
  fn inject(&self, _headers: &mut HeaderMap) {}

  fn finish(self: Box<Self>);
}

/// Tracer which records nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTracer;

struct NoopSpan;

impl Tracer for NoopTracer {
  fn start_span(&self, _ctx: &Context, _operation: &str) -> Box<dyn Span> {
    Box::new(NoopSpan)
  }
}

impl Span for NoopSpan {
  fn set_tag(&mut self, _key: &str, _value: TagValue) {}

  fn finish(self: Box<Self>) {}
}

/// Tracer which writes every finished span to the `log` facade.
///
/// Each span gets a random id which is also sent to the server as `X-Request-Id`,
/// so both sides of a call can be matched up.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogTracer;

struct LogSpan {
  id: uuid::Uuid,
  operation: String,
  started: time::Instant,
  /// Time left until the context deadline when the span started.
  budget: Option<time::Duration>,
  tags: Vec<(String, TagValue)>,
}

impl Tracer for LogTracer {
  fn start_span(&self, ctx: &Context, operation: &str) -> Box<dyn Span> {
    let span = LogSpan {
      id: uuid::Uuid::new_v4(),
      operation: operation.to_string(),
      started: time::Instant::now(),
      budget: ctx
        .deadline()
        .map(|d| d.saturating_duration_since(tokio::time::Instant::now())),
      tags: vec![],
    };
    log::debug!("span {} started: {}", span.id, span.operation);
    Box::new(span)
  }
}

impl Span for LogSpan {
  fn set_tag(&mut self, key: &str, value: TagValue) {
    match self.tags.iter_mut().find(|t| t.0 == key) {
      Some(t) => t.1 = value,
      None => self.tags.push((key.to_string(), value)),
    }
  }

  fn inject(&self, headers: &mut HeaderMap) {
    if let Ok(v) = HeaderValue::from_str(&self.id.to_string()) {
      headers.insert(HeaderName::from_static("x-request-id"), v);
    }
  }

  fn finish(self: Box<Self>) {
    let tags: Vec<String> = self
      .tags
      .iter()
      .map(|(k, v)| format!("{}={}", k, v))
      .collect();
    log::info!(
      "span {} finished: {} in {:?} (budget: {:?}) {}",
      self.id,
      self.operation,
      self.started.elapsed(),
      self.budget,
      tags.join(" ")
    );
  }
}
