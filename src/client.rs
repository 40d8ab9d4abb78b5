use bytes::Bytes;
use reqwest::{
  header::{HeaderMap, HeaderValue, CONTENT_TYPE},
  RequestBuilder, StatusCode,
};

use crate::{
  context::Context,
  duration,
  error::{EncodeError, Error, TransportError},
  query::Query,
  response::{Envelope, Response},
  trace::{NoopTracer, Span, Tracer},
};

const STABILIZE_TIMEOUT: &str = "x-stabilize-timeout";

lazy_static! {
  /// HTTP client shared by every [`Client`], it keeps the connection pool.
  static ref HTTP: reqwest::Client = reqwest::Client::new();
}

/// syntect_server client.
///
/// It only holds the server address, so one client can serve any number of concurrent calls.
#[derive(Debug, Clone)]
pub struct Client {
  server: String,
}

impl Client {
  /// Create a client for the server at `server`, like `http://localhost:9238`.
  pub fn new(server: &str) -> Self {
    Self {
      server: server.strip_suffix('/').unwrap_or(server).to_string(),
    }
  }

  pub fn server(&self) -> &str {
    &self.server
  }

  fn url(&self, path: &str) -> String {
    format!("{}{}", self.server, path)
  }

  /// Highlight the code of `query`.
  ///
  /// The call is aborted as soon as `ctx` is done, which gives [`Error::Transport`].
  ///
  /// If the query has a tracer, the call is recorded as a `Highlight` span tagged with
  /// the filepath, theme and css flag of the query.
  ///
  /// # Errors
  ///
  /// Returns an error if the query can not be encoded, no response was obtained,
  /// the response is not valid JSON, or the server reports a failure.
  pub async fn highlight(&self, ctx: &Context, query: &Query) -> Result<Response, Error> {
    let tracer: &dyn Tracer = match &query.tracer {
      Some(t) => t.as_ref(),
      None => &NoopTracer,
    };
    let mut span = tracer.start_span(ctx, "Highlight");

    let res = self.exchange(ctx, query, span.as_mut()).await;

    span.set_tag("Filepath", query.filepath.as_str().into());
    span.set_tag("Theme", query.theme.as_str().into());
    span.set_tag("CSS", query.css.into());
    if let Err(e) = &res {
      span.set_tag("error", true.into());
      span.set_tag("error.kind", e.kind().to_string().into());
    }
    span.finish();

    return res;
  }

  async fn exchange(
    &self,
    ctx: &Context,
    query: &Query,
    span: &mut dyn Span,
  ) -> Result<Response, Error> {
    let body =
      serde_json::to_vec(query).map_err(|e| Error::Serialization(EncodeError::Json(e)))?;

    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Some(timeout) = query.stabilize_timeout.filter(|t| !t.is_zero()) {
      // Microsecond values are written with `µ`, which is not visible ASCII.
      let value = HeaderValue::from_bytes(duration::format(timeout).as_bytes())
        .map_err(|e| Error::Serialization(EncodeError::Header(e)))?;
      headers.insert(STABILIZE_TIMEOUT, value);
    }
    span.inject(&mut headers);

    let url = self.url("/");
    log::debug!(
      "highlighting {} ({} bytes) with theme {:?} on {}",
      query.filepath,
      query.code.len(),
      query.theme,
      url
    );

    let req = HTTP.post(&url).headers(headers).body(body);

    let (status, body) = tokio::select! {
      biased;
      reason = ctx.done() => {
        return Err(Error::Transport {
          url: url.clone(),
          source: TransportError::Context(reason),
        });
      }
      res = send(req) => res.map_err(|e| Error::Transport {
        url: url.clone(),
        source: TransportError::Http(e),
      })?,
    };
    span.set_tag("http.status_code", status.as_u16().into());

    let body = match body {
      Some(b) => b,
      None => {
        log::warn!("{} rejected {} as too large", self.server, query.filepath);
        return Err(Error::RequestTooLarge {
          server: self.server.clone(),
        });
      }
    };

    let envelope: Envelope = serde_json::from_slice(&body).map_err(|source| Error::Decode {
      url: url.clone(),
      source,
    })?;
    if !envelope.error.is_empty() {
      log::warn!(
        "{} failed to highlight {}: error={:?} code={:?}",
        self.server,
        query.filepath,
        envelope.error,
        envelope.code
      );
    }
    return envelope.into_result(&self.server);
  }
}

/// Send the request and read the whole body.
///
/// 400 is reserved for requests which are too large, its body is not read and `None` is returned.
async fn send(req: RequestBuilder) -> Result<(StatusCode, Option<Bytes>), reqwest::Error> {
  let resp = req.send().await?;
  let status = resp.status();
  if status == StatusCode::BAD_REQUEST {
    return Ok((status, None));
  }
  return Ok((status, Some(resp.bytes().await?)));
}
