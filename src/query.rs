use std::{sync::Arc, time};

use serde::Serialize;

use crate::trace::Tracer;

/// A code highlighting query to the syntect_server.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Query {
  /// Deprecated, use `filepath` instead.
  ///
  /// Only sent when non-empty, for servers which still select the syntax by extension.
  #[serde(skip_serializing_if = "String::is_empty")]
  pub extension: String,

  /// File path of the code. It can be the full file path, or just the name and extension.
  ///
  /// The server picks the syntax from it.
  pub filepath: String,

  /// Color theme to use for highlighting.
  pub theme: String,

  /// The literal code to highlight.
  pub code: String,

  /// Return the result as an HTML table with CSS class names annotating the spans,
  /// rather than inline styles.
  pub css: bool,

  /// The maximum length of line that will be highlighted, no limit if zero.
  ///
  /// Ignored by the server if `css` is false.
  #[serde(skip_serializing_if = "is_zero")]
  pub line_length_limit: u32,

  /// If set and non-zero, overrides the server's worker stabilization timeout
  /// (10s by default) for this query only.
  ///
  /// Useful when highlighting a very large file with a caller willing to wait longer.
  /// It should not always be long: a problematic input can keep a worker busy for
  /// the whole duration.
  #[serde(skip)]
  pub stabilize_timeout: Option<time::Duration>,

  /// Records a span for the query if set.
  #[serde(skip)]
  pub tracer: Option<Arc<dyn Tracer>>,
}

fn is_zero(v: &u32) -> bool {
  *v == 0
}

impl Query {
  pub fn new(filepath: &str, theme: &str, code: &str) -> Self {
    Self {
      filepath: filepath.to_string(),
      theme: theme.to_string(),
      code: code.to_string(),
      ..Default::default()
    }
  }
}
