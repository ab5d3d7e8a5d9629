//! String and numeric `format` handling.

use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, NaiveDate};
use uuid::Uuid;

use super::value::Decoded;

/// Formats checked by the constraint validator, or purely informational.
const KNOWN_FORMATS: &[&str] = &[
    "binary",
    "password",
    "email",
    "idn-email",
    "hostname",
    "idn-hostname",
    "ipv4",
    "ipv6",
    "uri",
    "uri-reference",
    "iri",
    "iri-reference",
    "uri-template",
    "json-pointer",
    "relative-json-pointer",
    "regex",
    "time",
    "duration",
    "int32",
    "int64",
    "float",
    "double",
];

/// Outcome of decoding a string with a declared format.
pub(crate) enum FormatOutcome {
    Decoded(Decoded),
    /// The format is known but the string does not conform.
    Invalid(String),
    /// No typed decoding for this format; keep the string.
    Passthrough,
    /// The format is not recognised at all.
    Unknown,
}

/// Decode a string according to its `format`.
pub(crate) fn decode_string(format: &str, s: &str) -> FormatOutcome {
    match format {
        "date" => match NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            Ok(d) => FormatOutcome::Decoded(Decoded::Date(d)),
            Err(_) => FormatOutcome::Invalid(format!("'{}' is not a valid date", s)),
        },
        "date-time" => match DateTime::parse_from_rfc3339(s) {
            Ok(dt) => FormatOutcome::Decoded(Decoded::DateTime(dt)),
            Err(_) => FormatOutcome::Invalid(format!("'{}' is not a valid date-time", s)),
        },
        "uuid" => match Uuid::parse_str(s) {
            Ok(u) => FormatOutcome::Decoded(Decoded::Uuid(u)),
            Err(_) => FormatOutcome::Invalid(format!("'{}' is not a valid uuid", s)),
        },
        "byte" => match STANDARD.decode(s) {
            Ok(bytes) => FormatOutcome::Decoded(Decoded::Bytes(bytes)),
            Err(_) => FormatOutcome::Invalid("not valid base64".to_string()),
        },
        f if KNOWN_FORMATS.contains(&f) => FormatOutcome::Passthrough,
        _ => FormatOutcome::Unknown,
    }
}

/// Range check for `int32`; other integer formats always fit.
pub(crate) fn check_integer(format: &str, value: i64) -> Result<(), String> {
    if format == "int32" && i32::try_from(value).is_err() {
        return Err(format!("{} is out of range for int32", value));
    }
    Ok(())
}

/// Range check for `float`.
pub(crate) fn check_number(format: &str, value: f64) -> Result<(), String> {
    if format == "float" && value.is_finite() && value.abs() > f64::from(f32::MAX) {
        return Err(format!("{} is out of range for float", value));
    }
    Ok(())
}

pub(crate) fn is_known(format: &str) -> bool {
    matches!(format, "date" | "date-time" | "uuid" | "byte") || KNOWN_FORMATS.contains(&format)
}
