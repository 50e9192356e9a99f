use std::{str, time::Duration};

use serde::de::DeserializeOwned;

use crate::{
    core::{ConfError, Result},
    store::{Record, ValueFormat},
};

/// A type that can be decoded from a stored record.
///
/// Decoded values are cached per snapshot, so implementors must be cheap to
/// clone and shareable across threads.
pub trait Decode: Clone + Send + Sync + 'static {
    /// Human-readable type name used in decode errors.
    const EXPECTED: &'static str;

    /// Decodes the record stored at `path`.
    ///
    /// # Errors
    /// Returns `ConfError::FormatMismatch` for a record with the wrong type tag
    /// and `ConfError::Decode` for a payload that does not parse.
    fn decode(path: &str, record: Record<'_>) -> Result<Self>;
}

/// A JSON value deserialised into `T`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Json<T>(pub T);

fn text<'a>(path: &str, record: Record<'a>, expected: &'static str) -> Result<&'a str> {
    if record.format != ValueFormat::Text {
        return Err(ConfError::FormatMismatch {
            path: path.to_string(),
            expected: ValueFormat::Text,
            actual: record.format,
        });
    }

    str::from_utf8(record.data).map_err(|err| ConfError::decode(path, expected, err))
}

impl Decode for String {
    const EXPECTED: &'static str = "string";

    fn decode(path: &str, record: Record<'_>) -> Result<Self> {
        text(path, record, Self::EXPECTED).map(str::to_string)
    }
}

impl Decode for i64 {
    const EXPECTED: &'static str = "integer";

    fn decode(path: &str, record: Record<'_>) -> Result<Self> {
        text(path, record, Self::EXPECTED)?
            .parse()
            .map_err(|err| ConfError::decode(path, Self::EXPECTED, err))
    }
}

impl Decode for f64 {
    const EXPECTED: &'static str = "float";

    fn decode(path: &str, record: Record<'_>) -> Result<Self> {
        text(path, record, Self::EXPECTED)?
            .parse()
            .map_err(|err| ConfError::decode(path, Self::EXPECTED, err))
    }
}

/// Empty text and `0` are false; anything else is true.
impl Decode for bool {
    const EXPECTED: &'static str = "boolean";

    fn decode(path: &str, record: Record<'_>) -> Result<Self> {
        let value = text(path, record, Self::EXPECTED)?;
        Ok(!matches!(value, "" | "0"))
    }
}

impl Decode for Duration {
    const EXPECTED: &'static str = "duration";

    fn decode(path: &str, record: Record<'_>) -> Result<Self> {
        let value = text(path, record, Self::EXPECTED)?;
        parse_duration(value).map_err(|err| ConfError::decode(path, Self::EXPECTED, err))
    }
}

/// Text values are comma-separated lists; JSON values must be arrays of
/// strings.
impl Decode for Vec<String> {
    const EXPECTED: &'static str = "list of strings";

    fn decode(path: &str, record: Record<'_>) -> Result<Self> {
        match record.format {
            ValueFormat::Json => serde_json::from_slice(record.data)
                .map_err(|err| ConfError::decode(path, Self::EXPECTED, err)),
            _ => {
                let value = text(path, record, Self::EXPECTED)?;
                if value.trim().is_empty() {
                    return Ok(Vec::new());
                }

                Ok(value.split(',').map(|item| item.trim().to_string()).collect())
            }
        }
    }
}

impl<T> Decode for Json<T>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    const EXPECTED: &'static str = "JSON document";

    fn decode(path: &str, record: Record<'_>) -> Result<Self> {
        if record.format != ValueFormat::Json {
            return Err(ConfError::FormatMismatch {
                path: path.to_string(),
                expected: ValueFormat::Json,
                actual: record.format,
            });
        }

        serde_json::from_slice(record.data)
            .map(Json)
            .map_err(|err| ConfError::decode(path, Self::EXPECTED, err))
    }
}

const NANOS_PER_MICRO: u128 = 1_000;
const NANOS_PER_MILLI: u128 = 1_000_000;
const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Longest fraction kept; further digits are truncated.
const MAX_FRACTION_DIGITS: usize = 18;

/// Parses a duration such as `300ms`, `1.5h` or `2h45m`.
///
/// A bare number is a count of seconds. Valid units are `ns`, `us` (or
/// `µs`), `ms`, `s`, `m` and `h`. Negative durations are rejected.
///
/// # Errors
/// Returns a description of the first malformed component.
pub fn parse_duration(text: &str) -> std::result::Result<Duration, String> {
    let value = text.trim();
    if value.is_empty() {
        return Err("empty duration".to_string());
    }

    if let Ok(secs) = value.parse::<f64>() {
        return Duration::try_from_secs_f64(secs).map_err(|err| format!("{value:?}: {err}"));
    }

    let unsigned = value.strip_prefix('+').unwrap_or(value);
    if unsigned.starts_with('-') {
        return Err(format!("negative duration {value:?}"));
    }

    let invalid = || format!("invalid duration {value:?}");
    let overflow = || format!("duration {value:?} is too large");
    let not_digit = |c: char| !c.is_ascii_digit();

    let mut rest = unsigned;
    let mut total: u128 = 0;

    while !rest.is_empty() {
        let (int_part, tail) = rest.split_at(rest.find(not_digit).unwrap_or(rest.len()));

        let (frac_part, tail) = match tail.strip_prefix('.') {
            Some(tail) => tail.split_at(tail.find(not_digit).unwrap_or(tail.len())),
            None => ("", tail),
        };

        if int_part.is_empty() && frac_part.is_empty() {
            return Err(invalid());
        }

        let unit_end = tail
            .find(|c: char| c == '.' || c.is_ascii_digit())
            .unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_end);

        let scale = match unit {
            "ns" => 1,
            "us" | "µs" | "μs" => NANOS_PER_MICRO,
            "ms" => NANOS_PER_MILLI,
            "s" => NANOS_PER_SEC,
            "m" => 60 * NANOS_PER_SEC,
            "h" => 3600 * NANOS_PER_SEC,
            "" => return Err(format!("missing unit in duration {value:?}")),
            other => return Err(format!("unknown unit {other:?} in duration {value:?}")),
        };

        let int: u128 = if int_part.is_empty() {
            0
        } else {
            int_part.parse().map_err(|_| overflow())?
        };
        let mut nanos = int.checked_mul(scale).ok_or_else(overflow)?;

        let frac_part = &frac_part[..frac_part.len().min(MAX_FRACTION_DIGITS)];
        if !frac_part.is_empty() {
            let frac: u128 = frac_part.parse().map_err(|_| invalid())?;
            let denom = 10u128.pow(frac_part.len() as u32);
            nanos = nanos
                .checked_add(frac * scale / denom)
                .ok_or_else(overflow)?;
        }

        total = total.checked_add(nanos).ok_or_else(overflow)?;
        rest = tail;
    }

    u64::try_from(total)
        .map(Duration::from_nanos)
        .map_err(|_| overflow())
}
