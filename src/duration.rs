//! Compact human-readable durations, as understood by the `X-Stabilize-Timeout` header.
//!
//! The format is a sequence of `<decimal><unit>` components such as `10s`, `1m30s`
//! or `1.5ms`. Units are `ns`, `us` (also `µs`, `μs`), `ms`, `s`, `m` and `h`.

use std::{fmt::Display, str::FromStr, time::Duration};

use regex::Regex;
use serde_with::{DeserializeFromStr, SerializeDisplay};
use thiserror::Error;

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Fraction digits beyond this do not change the result for any unit.
const MAX_FRAC_DIGITS: usize = 18;

/// Format a duration in its canonical compact form.
///
/// - `0` => `0s`.
/// - Below one second the largest fitting sub-second unit is used: `100ns`, `1.5µs`, `250ms`.
/// - Otherwise hours and minutes are written when non-zero (minutes also when hours are):
///   `10s`, `1m30s`, `1h0m0.5s`.
///
/// Fractions never carry trailing zeros.
pub fn format(d: Duration) -> String {
  let nanos = d.as_nanos();
  if nanos == 0 {
    return "0s".to_string();
  }

  if nanos < NANOS_PER_SEC {
    let (prec, unit) = match nanos {
      n if n < 1_000 => (0, "ns"),
      n if n < 1_000_000 => (3, "µs"),
      _ => (6, "ms"),
    };
    return format!("{}{}", fmt_frac(nanos, prec), unit);
  }

  let secs = nanos / NANOS_PER_SEC;
  let mut out = String::new();
  if secs >= 3600 {
    out.push_str(&format!("{}h", secs / 3600));
  }
  if secs >= 60 {
    out.push_str(&format!("{}m", secs / 60 % 60));
  }
  out.push_str(&fmt_frac(nanos % (60 * NANOS_PER_SEC), 9));
  out.push('s');
  return out;
}

/// Write `v / 10^prec` as a decimal number without trailing zeros.
fn fmt_frac(v: u128, prec: u32) -> String {
  let scale = 10u128.pow(prec);
  let (int, frac) = (v / scale, v % scale);
  if frac == 0 {
    return int.to_string();
  }
  let digits = format!("{:0width$}", frac, width = prec as usize);
  format!("{}.{}", int, digits.trim_end_matches('0'))
}

fn unit_nanos(unit: &str) -> Option<u128> {
  match unit {
    "ns" => Some(1),
    "us" | "µs" | "μs" => Some(1_000),
    "ms" => Some(1_000_000),
    "s" => Some(NANOS_PER_SEC),
    "m" => Some(60 * NANOS_PER_SEC),
    "h" => Some(3600 * NANOS_PER_SEC),
    _ => None,
  }
}

/// Parse a compact duration string such as `300ms`, `1.5h` or `2h45m`.
///
/// A leading `+` is allowed, `0` is accepted without a unit.
///
/// # Errors
///
/// Returns an error on empty input, negative values, missing or unknown units,
/// and values which do not fit in a [`Duration`].
pub fn parse(s: &str) -> Result<Duration, ParseDurationError> {
  lazy_static! {
    static ref COMPONENT: Regex = Regex::new(r"\A([0-9]*)(?:\.([0-9]*))?([^0-9.]+)").unwrap();
  }

  let err = || ParseDurationError {
    input: s.to_string(),
  };

  let mut rest = s.strip_prefix('+').unwrap_or(s);
  if rest == "0" {
    return Ok(Duration::ZERO);
  }
  if rest.is_empty() {
    return Err(err());
  }

  let mut total: u128 = 0;
  while !rest.is_empty() {
    let cap = COMPONENT.captures(rest).ok_or_else(err)?;
    let int = &cap[1];
    let frac = cap.get(2).map_or("", |m| m.as_str());
    if int.is_empty() && frac.is_empty() {
      return Err(err());
    }
    let unit = unit_nanos(&cap[3]).ok_or_else(err)?;

    if !int.is_empty() {
      let v: u128 = int.parse().map_err(|_| err())?;
      total = v
        .checked_mul(unit)
        .and_then(|v| total.checked_add(v))
        .ok_or_else(err)?;
    }

    let frac = &frac[..frac.len().min(MAX_FRAC_DIGITS)];
    if !frac.is_empty() {
      let v: u128 = frac.parse().map_err(|_| err())?;
      total = total
        .checked_add(v * unit / 10u128.pow(frac.len() as u32))
        .ok_or_else(err)?;
    }

    rest = &rest[cap[0].len()..];
  }

  let secs = u64::try_from(total / NANOS_PER_SEC).map_err(|_| err())?;
  return Ok(Duration::new(secs, (total % NANOS_PER_SEC) as u32));
}

/// Error when parsing a malformed duration string.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid duration {input:?}")]
pub struct ParseDurationError {
  pub input: String,
}

/// A [`Duration`] which reads and writes itself in the compact string form.
///
/// Used wherever a duration comes from text: config files, environment variables
/// and command line arguments.
#[derive(
  Debug, SerializeDisplay, DeserializeFromStr, Clone, Copy, PartialEq, Eq, Hash, Default,
)]
pub struct HumanDuration(pub Duration);

impl Display for HumanDuration {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", format(self.0))
  }
}

impl FromStr for HumanDuration {
  type Err = ParseDurationError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    parse(s).map(Self)
  }
}

impl From<Duration> for HumanDuration {
  fn from(d: Duration) -> Self {
    Self(d)
  }
}

impl From<HumanDuration> for Duration {
  fn from(d: HumanDuration) -> Self {
    d.0
  }
}
