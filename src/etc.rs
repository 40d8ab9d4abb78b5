use serde::{Deserialize, Serialize};
use std::sync::RwLock;

use crate::duration::HumanDuration;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
/// gosyntect config.
pub struct Cfg {
  /// Default stabilize timeout sent with every query, like `30s`.
  ///
  /// Unset means the server default.
  pub stabilize_timeout: Option<HumanDuration>,

  /// Log a span for every query.
  pub trace: bool,
}

impl Default for Cfg {
  // Set default values for config
  fn default() -> Self {
    return Cfg {
      stabilize_timeout: None,
      trace: false,
    };
  }
}

lazy_static! {
  /// Global config.
  pub static ref CONFIG: RwLock<Cfg> = RwLock::new(Cfg::default());
}

/// Build the config from `/etc/gosyntect/config`, the given search paths (all optional, later
/// ones win) and `GOSYNTECT_*` environment variables.
///
/// # Errors
///
/// This function will return an error if a present file can not be parsed, or a value has
/// the wrong type (e.g. `GOSYNTECT_STABILIZE_TIMEOUT=soon`).
pub fn build_config(search_paths: &[String]) -> Result<Cfg, config::ConfigError> {
  let mut builder = config::Config::builder()
    .add_source(config::File::with_name("/etc/gosyntect/config").required(false));

  for p in search_paths {
    builder = builder.add_source(config::File::with_name(p.as_str()).required(false));
  }

  builder = builder.add_source(config::Environment::with_prefix("GOSYNTECT"));

  return builder.build()?.try_deserialize::<Cfg>();
}

/// Load the global config and return the loaded value.
///
/// It should be called on the top of `main` fn.
pub fn load_config(search_paths: &[String]) -> Result<Cfg, config::ConfigError> {
  let cfg = build_config(search_paths)?;
  log::debug!("loaded config: {:?}", cfg);
  match CONFIG.write() {
    Ok(mut c) => *c = cfg.clone(),
    Err(poisoned) => *poisoned.into_inner() = cfg.clone(),
  }
  return Ok(cfg);
}
