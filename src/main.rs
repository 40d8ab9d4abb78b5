mod args;

// Tests of the binary live beside the library's in `src/test/`.
#[cfg(test)]
#[path = "test/cli.rs"]
mod test;

use std::{error, process, sync::Arc, time};

use clap::Parser;
use gosyntect::{etc, Client, Context, LogTracer, Query, Tracer};
use thiserror::Error;

/// Reasons for the command to fail.
#[derive(Debug, Error)]
enum CliError {
  #[error("expected server to have http:// or https:// prefix")]
  Scheme,

  #[error("invalid server address")]
  Url(#[from] url::ParseError),

  #[error("theme argument is required (e.x. 'InspiredGitHub')")]
  Theme,

  #[error("reading {path}")]
  Read {
    path: String,
    #[source]
    source: std::io::Error,
  },

  #[error("loading config")]
  Config(#[from] config::ConfigError),

  #[error(transparent)]
  Highlight(#[from] gosyntect::Error),
}

fn init_logger() {
  let filters = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
  let _ = pretty_env_logger::formatted_builder()
    .parse_filters(&filters)
    .try_init();
}

/// Join an error with all of its sources.
fn chain(err: &dyn error::Error) -> String {
  let mut msg = err.to_string();
  let mut source = err.source();
  while let Some(e) = source {
    msg.push_str(": ");
    msg.push_str(&e.to_string());
    source = e.source();
  }
  return msg;
}

/// Check the server and theme arguments.
fn validate(args: &args::Args) -> Result<(), CliError> {
  if !args.server.starts_with("http://") && !args.server.starts_with("https://") {
    return Err(CliError::Scheme);
  }
  url::Url::parse(&args.server)?;

  if args.theme.is_empty() {
    return Err(CliError::Theme);
  }
  return Ok(());
}

/// Build the query for the file contents `data`.
///
/// Flags win over `cfg`, and the file is sent by its base name.
fn build_query(args: &args::Args, cfg: &etc::Cfg, data: &[u8]) -> Query {
  let filepath = args
    .file
    .file_name()
    .map(|n| n.to_string_lossy().into_owned())
    .unwrap_or_default();

  let tracer: Option<Arc<dyn Tracer>> = if args.trace || cfg.trace {
    Some(Arc::new(LogTracer))
  } else {
    None
  };

  return Query {
    css: args.css,
    line_length_limit: args.line_length_limit,
    stabilize_timeout: args
      .stabilize_timeout
      .or(cfg.stabilize_timeout)
      .map(time::Duration::from),
    tracer,
    ..Query::new(&filepath, &args.theme, &String::from_utf8_lossy(data))
  };
}

async fn run(args: args::Args) -> Result<(), CliError> {
  let cfg = etc::load_config(&args.config_search_path)?;
  validate(&args)?;

  let data = tokio::fs::read(&args.file)
    .await
    .map_err(|source| CliError::Read {
      path: args.file.display().to_string(),
      source,
    })?;
  let query = build_query(&args, &cfg, &data);

  let (ctx, cancel) = Context::background().with_cancel();
  tokio::spawn(async move {
    if tokio::signal::ctrl_c().await.is_ok() {
      log::warn!("interrupted, canceling the request");
      cancel.cancel();
    }
  });

  let resp = Client::new(&args.server).highlight(&ctx, &query).await?;
  println!("{}", resp.data);
  return Ok(());
}

#[tokio::main]
async fn main() {
  init_logger();
  let args = args::Args::parse();

  if let Err(e) = run(args).await {
    // Printed directly, the log filter may be off.
    eprintln!("gosyntect: {}", chain(&e));
    process::exit(1);
  }
}
