//! `H:MM:SS` text form of ticket durations.

use chrono::TimeDelta;

/// Error returned when interval text cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid interval '{0}': expected H:MM:SS")]
pub struct IntervalError(pub String);

/// Formats a duration as `H:MM:SS`, dropping sub-second precision.
///
/// Hours are not bounded and negative durations get a leading `-`.
pub fn format_interval(duration: TimeDelta) -> String {
    let total = duration.num_seconds();
    let sign = if total < 0 { "-" } else { "" };
    let secs = total.unsigned_abs();
    format!(
        "{}{}:{:02}:{:02}",
        sign,
        secs / 3600,
        (secs % 3600) / 60,
        secs % 60
    )
}

/// Parses `H:MM:SS` text. An empty string is a zero duration.
pub fn parse_interval(text: &str) -> Result<TimeDelta, IntervalError> {
    if text.is_empty() {
        return Ok(TimeDelta::zero());
    }
    let err = || IntervalError(text.to_string());

    let (negative, body) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };

    let mut parts = body.split(':');
    let (Some(h), Some(m), Some(s), None) = (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(err());
    };

    let digits = |part: &str| -> Result<i64, IntervalError> {
        if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(err());
        }
        part.parse::<i64>().map_err(|_| err())
    };
    let hours = digits(h)?;
    let minutes = digits(m)?;
    let seconds = digits(s)?;
    if m.len() != 2 || s.len() != 2 || minutes > 59 || seconds > 59 {
        return Err(err());
    }

    let total = hours
        .checked_mul(3600)
        .and_then(|v| v.checked_add(minutes * 60 + seconds))
        .ok_or_else(err)?;
    let delta = TimeDelta::try_seconds(total).ok_or_else(err)?;
    Ok(if negative { -delta } else { delta })
}
