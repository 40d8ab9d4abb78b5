use std::{
  sync::{Arc, Mutex},
  time,
};

use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::json;

use crate::{
  duration,
  test::{self, stub::StubServer},
  Client, Context, ContextError, ErrorKind, Query, Response, Span, TagValue, Tracer,
};

const OK_BODY: &str =
  r#"{"data":"<pre>...</pre>","plaintext":false,"time_ns":1500,"error":"","code":""}"#;

fn sample_query() -> Query {
  Query::new("a.go", "InspiredGitHub", "package main")
}

/// A successful envelope is copied verbatim into the response.
#[tokio::test]
async fn test_highlight_ok() {
  test::init();

  let server = StubServer::start(200, OK_BODY).await;
  let resp = Client::new(&server.url())
    .highlight(&Context::background(), &sample_query())
    .await
    .unwrap();

  assert_eq!(
    resp,
    Response {
      data: "<pre>...</pre>".to_string(),
      plaintext: false,
      time_nanos: 1500,
    }
  );
  assert_eq!(resp.time(), time::Duration::from_nanos(1500));
}

#[tokio::test]
async fn test_highlight_plaintext() {
  test::init();

  let server = StubServer::start(
    200,
    r#"{"data":"hello","plaintext":true,"time_ns":7,"error":"","code":""}"#,
  )
  .await;
  let resp = Client::new(&server.url())
    .highlight(
      &Context::background(),
      &Query::new("README", "InspiredGitHub", "hello"),
    )
    .await
    .unwrap();

  assert!(resp.plaintext);
  assert_eq!(resp.data, "hello");
}

/// The request body carries the query fields, and nothing else.
#[tokio::test]
async fn test_request_body() {
  test::init();

  let server = StubServer::start(200, OK_BODY).await;
  let client = Client::new(&server.url());

  client
    .highlight(&Context::background(), &sample_query())
    .await
    .unwrap();
  client
    .highlight(
      &Context::background(),
      &Query {
        css: true,
        line_length_limit: 2000,
        extension: "go".to_string(),
        stabilize_timeout: Some(time::Duration::from_secs(3)),
        ..sample_query()
      },
    )
    .await
    .unwrap();

  let received = server.received();
  assert_eq!(received.len(), 2);
  assert_eq!(
    received[0].body,
    json!({
      "filepath": "a.go",
      "theme": "InspiredGitHub",
      "code": "package main",
      "css": false,
    })
  );
  assert_eq!(
    received[1].body,
    json!({
      "extension": "go",
      "filepath": "a.go",
      "theme": "InspiredGitHub",
      "code": "package main",
      "css": true,
      "line_length_limit": 2000,
    })
  );
  assert_eq!(
    received[0].header("content-type").as_deref(),
    Some("application/json")
  );
}

/// The stabilize timeout is only sent when it is set and non-zero.
#[tokio::test]
async fn test_stabilize_timeout_header() {
  test::init();

  let server = StubServer::start(200, OK_BODY).await;
  let client = Client::new(&server.url());

  let timeouts = [
    None,
    Some(time::Duration::ZERO),
    Some(time::Duration::from_secs(10)),
    Some(time::Duration::from_micros(1500)),
    Some(time::Duration::from_micros(20)),
    Some(time::Duration::from_millis(90_250)),
  ];
  for t in timeouts {
    let query = Query {
      stabilize_timeout: t,
      ..sample_query()
    };
    client
      .highlight(&Context::background(), &query)
      .await
      .unwrap();
  }

  let headers: Vec<_> = server
    .received()
    .iter()
    .map(|r| r.header("x-stabilize-timeout"))
    .collect();
  assert_eq!(
    headers,
    vec![
      None,
      None,
      Some("10s".to_string()),
      Some("1.5ms".to_string()),
      Some("20µs".to_string()),
      Some("1m30.25s".to_string()),
    ]
  );
  for (t, h) in timeouts.iter().zip(&headers) {
    if let Some(h) = h {
      assert_eq!(Some(duration::parse(h).unwrap()), *t);
    }
  }
}

/// 400 means too large, whatever the body is.
#[tokio::test]
async fn test_bad_request() {
  test::init();

  for body in ["", "not json", OK_BODY, r#"{"error":"bad theme","code":"invalid_theme"}"#] {
    let server = StubServer::start(400, body).await;
    let err = Client::new(&server.url())
      .highlight(&Context::background(), &sample_query())
      .await
      .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RequestTooLarge, "body: {:?}", body);
    assert_eq!(err.to_string(), format!("{}: request too large", server.url()));
  }
}

/// Server error codes map to their error kinds, whatever the status is.
#[tokio::test]
async fn test_server_errors() {
  test::init();

  let cases = [
    (200, "invalid_theme", ErrorKind::InvalidTheme),
    (200, "panic", ErrorKind::Panic),
    (500, "panic", ErrorKind::Panic),
    (200, "hss_worker_timeout", ErrorKind::WorkerTimeout),
    (404, "resource_not_found", ErrorKind::InternalProtocol),
    (413, "request_too_large", ErrorKind::RequestTooLarge),
    (500, "out_of_cheese", ErrorKind::UnknownServer),
  ];
  for (status, code, kind) in cases {
    let body = json!({ "error": "something went wrong", "code": code }).to_string();
    let server = StubServer::start(status, &body).await;
    let err = Client::new(&server.url())
      .highlight(&Context::background(), &sample_query())
      .await
      .unwrap_err();
    assert_eq!(err.kind(), kind, "status {} code {}", status, code);
    assert!(err.to_string().starts_with(&server.url()));
  }
}

#[tokio::test]
async fn test_invalid_theme() {
  test::init();

  let server = StubServer::start(200, r#"{"error":"bad theme","code":"invalid_theme"}"#).await;
  let err = Client::new(&server.url())
    .highlight(
      &Context::background(),
      &Query::new("a.go", "NoSuchTheme", "package main"),
    )
    .await
    .unwrap_err();

  assert_eq!(err.kind(), ErrorKind::InvalidTheme);
  assert_eq!(err.to_string(), format!("{}: invalid theme", server.url()));
}

#[tokio::test]
async fn test_unknown_server_error() {
  test::init();

  let server = StubServer::start(200, r#"{"error":"disk on fire","code":"fire"}"#).await;
  let err = Client::new(&server.url())
    .highlight(&Context::background(), &sample_query())
    .await
    .unwrap_err();

  match err {
    crate::Error::UnknownServer {
      server: s,
      error,
      code,
    } => {
      assert_eq!(s, server.url());
      assert_eq!(error, "disk on fire");
      assert_eq!(code, "fire");
    }
    e => panic!("unexpected error: {:?}", e),
  }
}

/// An error code without an error message is not an error.
#[tokio::test]
async fn test_code_without_error() {
  test::init();

  let server = StubServer::start(200, r#"{"data":"x","code":"panic"}"#).await;
  let resp = Client::new(&server.url())
    .highlight(&Context::background(), &sample_query())
    .await
    .unwrap();

  assert_eq!(resp.data, "x");
  assert_eq!(resp.time_nanos, 0);
}

/// `null` fields read as empty, so a null error is a success.
#[tokio::test]
async fn test_null_fields() {
  test::init();

  let server = StubServer::start(
    200,
    r#"{"data":"x","plaintext":false,"time_ns":1,"error":null,"code":null}"#,
  )
  .await;
  let resp = Client::new(&server.url())
    .highlight(&Context::background(), &sample_query())
    .await
    .unwrap();
  assert_eq!(
    resp,
    Response {
      data: "x".to_string(),
      plaintext: false,
      time_nanos: 1,
    }
  );

  let server = StubServer::start(
    200,
    r#"{"data":null,"plaintext":null,"time_ns":null,"error":"boom","code":null}"#,
  )
  .await;
  let err = Client::new(&server.url())
    .highlight(&Context::background(), &sample_query())
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::UnknownServer);
}

#[tokio::test]
async fn test_decode_error() {
  test::init();

  for body in ["", "<html>bad gateway</html>", "[1, 2]", r#"{"data": 5}"#] {
    let server = StubServer::start(200, body).await;
    let err = Client::new(&server.url())
      .highlight(&Context::background(), &sample_query())
      .await
      .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Decode, "body: {:?}", body);
    assert_eq!(
      err.to_string(),
      format!("decoding JSON response from {}/", server.url())
    );
  }
}

#[tokio::test]
async fn test_connection_refused() {
  test::init();

  let addr = {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
  };
  let err = Client::new(&format!("http://{}", addr))
    .highlight(&Context::background(), &sample_query())
    .await
    .unwrap_err();

  assert_eq!(err.kind(), ErrorKind::Transport);
  assert_eq!(err.context_error(), None);
}

/// Canceling the context while the server is busy aborts the call.
#[tokio::test]
async fn test_cancel_in_flight() {
  test::init();

  let server = StubServer::start_delayed(200, OK_BODY, time::Duration::from_secs(30)).await;
  let (ctx, cancel) = Context::background().with_cancel();
  tokio::spawn(async move {
    tokio::time::sleep(time::Duration::from_millis(100)).await;
    cancel.cancel();
  });

  let started = time::Instant::now();
  let err = Client::new(&server.url())
    .highlight(&ctx, &sample_query())
    .await
    .unwrap_err();

  assert_eq!(err.kind(), ErrorKind::Transport);
  assert_eq!(err.context_error(), Some(ContextError::Canceled));
  assert!(started.elapsed() < time::Duration::from_secs(10));
}

/// A canceled context never reaches the server.
#[tokio::test]
async fn test_cancel_before_call() {
  test::init();

  let server = StubServer::start(200, OK_BODY).await;
  let (ctx, cancel) = Context::background().with_cancel();
  cancel.cancel();

  let err = Client::new(&server.url())
    .highlight(&ctx, &sample_query())
    .await
    .unwrap_err();

  assert_eq!(err.context_error(), Some(ContextError::Canceled));
  assert!(server.received().is_empty());
}

#[tokio::test]
async fn test_deadline_exceeded() {
  test::init();

  let server = StubServer::start_delayed(200, OK_BODY, time::Duration::from_secs(30)).await;
  let ctx = Context::background().with_timeout(time::Duration::from_millis(100));

  let err = Client::new(&server.url())
    .highlight(&ctx, &sample_query())
    .await
    .unwrap_err();

  assert_eq!(err.kind(), ErrorKind::Transport);
  assert_eq!(err.context_error(), Some(ContextError::DeadlineExceeded));
}

/// One client serves concurrent calls.
#[tokio::test]
async fn test_concurrent_calls() {
  test::init();

  let server = StubServer::start(200, OK_BODY).await;
  let client = Client::new(&format!("{}/", server.url()));
  assert_eq!(client.server(), server.url());

  let handles: Vec<_> = (0..8)
    .map(|i| {
      let client = client.clone();
      tokio::spawn(async move {
        client
          .highlight(
            &Context::background(),
            &Query::new(&format!("{}.go", i), "InspiredGitHub", "package main"),
          )
          .await
      })
    })
    .collect();
  for h in handles {
    assert_eq!(h.await.unwrap().unwrap().time_nanos, 1500);
  }

  let mut files: Vec<_> = server
    .received()
    .iter()
    .map(|r| r.body["filepath"].as_str().unwrap().to_string())
    .collect();
  files.sort();
  assert_eq!(files, (0..8).map(|i| format!("{}.go", i)).collect::<Vec<_>>());
}

/// Tracer keeping the spans it finished.
#[derive(Debug, Default)]
struct RecordingTracer {
  finished: Arc<Mutex<Vec<(String, Vec<(String, TagValue)>)>>>,
}

struct RecordingSpan {
  operation: String,
  tags: Vec<(String, TagValue)>,
  finished: Arc<Mutex<Vec<(String, Vec<(String, TagValue)>)>>>,
}

impl Tracer for RecordingTracer {
  fn start_span(&self, _ctx: &Context, operation: &str) -> Box<dyn Span> {
    Box::new(RecordingSpan {
      operation: operation.to_string(),
      tags: vec![],
      finished: self.finished.clone(),
    })
  }
}

impl Span for RecordingSpan {
  fn set_tag(&mut self, key: &str, value: TagValue) {
    self.tags.push((key.to_string(), value));
  }

  fn inject(&self, headers: &mut HeaderMap) {
    headers.insert("x-span", HeaderValue::from_static("recorded"));
  }

  fn finish(self: Box<Self>) {
    self
      .finished
      .lock()
      .unwrap()
      .push((self.operation, self.tags));
  }
}

fn tag<'a>(tags: &'a [(String, TagValue)], key: &str) -> Option<&'a TagValue> {
  tags.iter().find(|t| t.0 == key).map(|t| &t.1)
}

#[tokio::test]
async fn test_tracer_tags() {
  test::init();

  let server = StubServer::start(200, OK_BODY).await;
  let tracer = Arc::new(RecordingTracer::default());
  let query = Query {
    css: true,
    tracer: Some(tracer.clone()),
    ..sample_query()
  };

  Client::new(&server.url())
    .highlight(&Context::background(), &query)
    .await
    .unwrap();

  let finished = tracer.finished.lock().unwrap().clone();
  assert_eq!(finished.len(), 1);
  let (operation, tags) = &finished[0];
  assert_eq!(operation, "Highlight");
  assert_eq!(tag(tags, "Filepath"), Some(&TagValue::from("a.go")));
  assert_eq!(tag(tags, "Theme"), Some(&TagValue::from("InspiredGitHub")));
  assert_eq!(tag(tags, "CSS"), Some(&TagValue::Bool(true)));
  assert_eq!(tag(tags, "http.status_code"), Some(&TagValue::Int(200)));
  assert_eq!(tag(tags, "error"), None);

  assert_eq!(
    server.received()[0].header("x-span").as_deref(),
    Some("recorded")
  );
}

/// Failed calls are still tagged, and marked as errors.
#[tokio::test]
async fn test_tracer_tags_on_error() {
  test::init();

  let server = StubServer::start(400, "").await;
  let tracer = Arc::new(RecordingTracer::default());
  let query = Query {
    tracer: Some(tracer.clone()),
    ..sample_query()
  };

  Client::new(&server.url())
    .highlight(&Context::background(), &query)
    .await
    .unwrap_err();

  let finished = tracer.finished.lock().unwrap().clone();
  let (_, tags) = &finished[0];
  assert_eq!(tag(tags, "Filepath"), Some(&TagValue::from("a.go")));
  assert_eq!(tag(tags, "CSS"), Some(&TagValue::Bool(false)));
  assert_eq!(tag(tags, "http.status_code"), Some(&TagValue::Int(400)));
  assert_eq!(tag(tags, "error"), Some(&TagValue::Bool(true)));
  assert_eq!(
    tag(tags, "error.kind"),
    Some(&TagValue::from("request_too_large"))
  );
}

/// The log tracer sends its span id along.
#[tokio::test]
async fn test_log_tracer() {
  test::init();

  let server = StubServer::start(200, OK_BODY).await;
  let query = Query {
    tracer: Some(Arc::new(crate::LogTracer)),
    ..sample_query()
  };
  let ctx = Context::background().with_timeout(time::Duration::from_secs(30));

  Client::new(&server.url())
    .highlight(&ctx, &query)
    .await
    .unwrap();

  let id = server.received()[0].header("x-request-id").unwrap();
  assert!(uuid::Uuid::parse_str(&id).is_ok());
}
