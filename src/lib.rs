#[cfg(test)]
mod test;

pub mod client;
pub mod context;
pub mod duration;
pub mod error;
pub mod etc;
pub mod query;
pub mod response;
pub mod trace;

pub use crate::{
  client::Client,
  context::{CancelHandle, Context, ContextError},
  duration::HumanDuration,
  error::{Error, ErrorKind, ServerCode},
  etc::CONFIG,
  query::Query,
  response::Response,
  trace::{LogTracer, NoopTracer, Span, TagValue, Tracer},
};

#[macro_use]
extern crate lazy_static;
extern crate log;
