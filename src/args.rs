use std::path::PathBuf;

use clap::Parser;
use gosyntect::HumanDuration;
use shadow_rs::shadow;

shadow!(build);

// Command line args
#[derive(Parser, Debug)]
#[clap(name = "gosyntect", version = build::CLAP_LONG_VERSION)]
#[clap(about = "Highlight a file with a syntect_server.", long_about = None)]
#[clap(after_help = "EXAMPLE:\n    gosyntect http://localhost:9238 'InspiredGitHub' gosyntect.rs")]
pub struct Args {
  /// Server address, with http:// or https:// prefix.
  #[clap(value_parser)]
  pub server: String,

  /// Color theme, like 'InspiredGitHub'.
  #[clap(value_parser)]
  pub theme: String,

  /// File to highlight.
  #[clap(value_parser)]
  pub file: PathBuf,

  /// Return an HTML table with CSS class names instead of inline styles.
  #[clap(long, action)]
  pub css: bool,

  /// Maximum length of line to highlight with --css, 0 for no limit.
  #[clap(long, value_parser, default_value_t = 0)]
  pub line_length_limit: u32,

  /// Override the server's worker stabilization timeout, like `30s`.
  #[clap(long, value_parser)]
  pub stabilize_timeout: Option<HumanDuration>,

  /// Log a span for the request.
  #[clap(long, action)]
  pub trace: bool,

  #[clap(short, long, value_parser)]
  pub config_search_path: Vec<String>,
}
