//! Number and date-time formatting services.
//!
//! Locale- and time-zone-aware formatting lives outside the core. The core
//! only calls [`FormatServices`] per evaluation and wraps its
//! [`FormatError`]s with the call site.

use stencil_format::{MarkupValue, OutputFormat};
use stencil_ir::Number;

use crate::value::{DateKind, DateTimeValue};

/// Formatting result: plain text, or markup when the service produced
/// format-specific output.
#[derive(Clone, Debug, PartialEq)]
pub enum Formatted {
    Text(String),
    Markup(MarkupValue),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    #[error("unsupported {kind} format pattern {pattern:?}")]
    UnsupportedPattern { kind: &'static str, pattern: String },
    #[error("unsupported time zone {0:?}")]
    UnsupportedTimeZone(String),
    #[error("date-time value {0} is out of the supported range")]
    OutOfRange(i64),
}

/// Formatting collaborator for numbers and dates.
///
/// `output_format` is the format current at the call; services may return
/// markup for it.
pub trait FormatServices: Send + Sync {
    fn format_number(
        &self,
        value: Number,
        pattern: &str,
        locale: &str,
        output_format: &OutputFormat,
    ) -> Result<Formatted, FormatError>;

    fn format_datetime(
        &self,
        value: DateTimeValue,
        pattern: &str,
        locale: &str,
        time_zone: &str,
        output_format: &OutputFormat,
    ) -> Result<Formatted, FormatError>;
}

/// Locale-independent formatting with a handful of patterns.
///
/// Numbers: `number` (grouped, up to three fraction digits), `computer` / `c`
/// (shortest exact form), and decimal patterns like `0.00`, `0.##` or
/// `#,##0.0`. Dates: `iso` and `epoch`, UTC only.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultFormatServices;

struct DecimalPattern {
    grouped: bool,
    min_fraction: usize,
    max_fraction: usize,
}

impl DecimalPattern {
    const NUMBER: DecimalPattern = DecimalPattern {
        grouped: true,
        min_fraction: 0,
        max_fraction: 3,
    };

    fn parse(pattern: &str) -> Option<Self> {
        let (grouped, rest) = match pattern.strip_prefix("#,##") {
            Some(rest) => (true, rest),
            None => (false, pattern),
        };
        let fraction = match rest.strip_prefix('0')? {
            "" => "",
            f => f.strip_prefix('.')?,
        };
        let min_fraction = fraction.chars().take_while(|&c| c == '0').count();
        let optional = &fraction[min_fraction..];
        if !optional.chars().all(|c| c == '#') {
            return None;
        }
        Some(DecimalPattern {
            grouped,
            min_fraction,
            max_fraction: min_fraction + optional.len(),
        })
    }

    fn format(&self, value: Number) -> String {
        let (negative, int_digits, mut fraction) = match value {
            Number::Int(n) => (n < 0, n.unsigned_abs().to_string(), String::new()),
            Number::Float(f) if !f.is_finite() => return format_non_finite(f),
            Number::Float(f) => {
                let fixed = format!("{:.*}", self.max_fraction, f.abs());
                let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), ""));
                let negative = f < 0.0 && fixed.chars().any(|c| c.is_ascii_digit() && c != '0');
                (negative, int_part.to_owned(), frac_part.to_owned())
            }
        };
        while fraction.len() > self.min_fraction && fraction.ends_with('0') {
            fraction.pop();
        }
        while fraction.len() < self.min_fraction {
            fraction.push('0');
        }
        let mut out = String::with_capacity(int_digits.len() + fraction.len() + 8);
        if negative {
            out.push('-');
        }
        if self.grouped {
            out.push_str(&group_thousands(&int_digits));
        } else {
            out.push_str(&int_digits);
        }
        if !fraction.is_empty() {
            out.push('.');
            out.push_str(&fraction);
        }
        out
    }
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

fn format_non_finite(f: f64) -> String {
    if f.is_nan() {
        "NaN".to_owned()
    } else if f > 0.0 {
        "INF".to_owned()
    } else {
        "-INF".to_owned()
    }
}

/// Computer-audience form: integers exactly, floats in shortest round-trip
/// form without exponent noise for integral values.
pub(crate) fn format_computer(value: Number) -> String {
    match value {
        Number::Int(n) => n.to_string(),
        Number::Float(f) if !f.is_finite() => format_non_finite(f),
        Number::Float(f) => f.to_string(),
    }
}

/// Days since 1970-01-01 to (year, month, day) in the proleptic Gregorian
/// calendar.
fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = yoe + era * 400 + i64::from(month <= 2);
    (
        year,
        u32::try_from(month).unwrap_or(1),
        u32::try_from(day).unwrap_or(1),
    )
}

fn format_iso(value: DateTimeValue) -> Result<String, FormatError> {
    const MILLIS_PER_DAY: i64 = 86_400_000;
    // Years beyond four digits are not representable in ISO basic form.
    if !(-62_135_596_800_000..=253_402_300_799_999).contains(&value.epoch_millis) {
        return Err(FormatError::OutOfRange(value.epoch_millis));
    }
    let days = value.epoch_millis.div_euclid(MILLIS_PER_DAY);
    let millis_of_day = value.epoch_millis.rem_euclid(MILLIS_PER_DAY);
    let (year, month, day) = civil_from_days(days);
    let secs = millis_of_day / 1000;
    let (h, m, s) = (secs / 3600, secs / 60 % 60, secs % 60);
    let millis = millis_of_day % 1000;
    let time = if millis == 0 {
        format!("{h:02}:{m:02}:{s:02}")
    } else {
        format!("{h:02}:{m:02}:{s:02}.{millis:03}")
    };
    Ok(match value.kind {
        DateKind::Date => format!("{year:04}-{month:02}-{day:02}"),
        DateKind::Time => time,
        DateKind::DateTime => format!("{year:04}-{month:02}-{day:02}T{time}Z"),
    })
}

impl FormatServices for DefaultFormatServices {
    fn format_number(
        &self,
        value: Number,
        pattern: &str,
        _locale: &str,
        _output_format: &OutputFormat,
    ) -> Result<Formatted, FormatError> {
        let text = match pattern {
            "" | "number" => DecimalPattern::NUMBER.format(value),
            "computer" | "c" => format_computer(value),
            other => DecimalPattern::parse(other)
                .ok_or_else(|| FormatError::UnsupportedPattern {
                    kind: "number",
                    pattern: other.to_owned(),
                })?
                .format(value),
        };
        Ok(Formatted::Text(text))
    }

    fn format_datetime(
        &self,
        value: DateTimeValue,
        pattern: &str,
        _locale: &str,
        time_zone: &str,
        _output_format: &OutputFormat,
    ) -> Result<Formatted, FormatError> {
        if !matches!(time_zone, "UTC" | "GMT" | "Z") {
            return Err(FormatError::UnsupportedTimeZone(time_zone.to_owned()));
        }
        let text = match pattern {
            "" | "iso" => format_iso(value)?,
            "epoch" => value.epoch_millis.to_string(),
            other => {
                return Err(FormatError::UnsupportedPattern {
                    kind: "date-time",
                    pattern: other.to_owned(),
                })
            }
        };
        Ok(Formatted::Text(text))
    }
}
