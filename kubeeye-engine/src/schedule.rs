//! Standard cron schedule parsing
//!
//! Accepts the five-field form used by CronJob (`minute hour dom month dow`),
//! the `@yearly`-style descriptors, `@every <duration>`, and an optional
//! `TZ=`/`CRON_TZ=` prefix.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ScheduleError(String);

struct Bounds {
    min: u32,
    max: u32,
    names: &'static [&'static str],
}

const MINUTES: Bounds = Bounds { min: 0, max: 59, names: &[] };
const HOURS: Bounds = Bounds { min: 0, max: 23, names: &[] };
const DAYS_OF_MONTH: Bounds = Bounds { min: 1, max: 31, names: &[] };
const MONTHS: Bounds = Bounds {
    min: 1,
    max: 12,
    names: &[
        "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
    ],
};
const DAYS_OF_WEEK: Bounds = Bounds {
    min: 0,
    max: 6,
    names: &["sun", "mon", "tue", "wed", "thu", "fri", "sat"],
};

/// Check a standard cron spec.
///
/// Only validity matters to the CronJob analyzer, so nothing is expanded.
pub fn validate_standard(spec: &str) -> Result<(), ScheduleError> {
    let spec = spec.trim();
    if spec.is_empty() {
        return Err(ScheduleError("empty spec string".to_string()));
    }

    let spec = strip_time_zone(spec)?;

    if spec.starts_with('@') {
        return validate_descriptor(spec);
    }

    let fields: Vec<&str> = spec.split_whitespace().collect();
    if fields.len() != 5 {
        return Err(ScheduleError(format!(
            "expected exactly 5 fields, found {}: {}",
            fields.len(),
            spec
        )));
    }

    for (field, bounds) in fields
        .iter()
        .zip([&MINUTES, &HOURS, &DAYS_OF_MONTH, &MONTHS, &DAYS_OF_WEEK])
    {
        for expr in field.split(',') {
            validate_range(expr, bounds)?;
        }
    }
    Ok(())
}

fn strip_time_zone(spec: &str) -> Result<&str, ScheduleError> {
    for prefix in ["TZ=", "CRON_TZ="] {
        if let Some(rest) = spec.strip_prefix(prefix) {
            let (zone, remainder) = rest
                .split_once(char::is_whitespace)
                .unwrap_or((rest, ""));
            if zone.is_empty() {
                return Err(ScheduleError(format!("provided bad location {}", zone)));
            }
            return Ok(remainder.trim());
        }
    }
    Ok(spec)
}

fn validate_descriptor(spec: &str) -> Result<(), ScheduleError> {
    match spec {
        "@yearly" | "@annually" | "@monthly" | "@weekly" | "@daily" | "@midnight" | "@hourly" => Ok(()),
        _ => match spec.strip_prefix("@every ") {
            Some(duration) => parse_duration(duration.trim())
                .map(|_| ())
                .map_err(|e| ScheduleError(format!("failed to parse duration {}: {}", spec, e))),
            None => Err(ScheduleError(format!("unrecognized descriptor: {}", spec))),
        },
    }
}

fn validate_range(expr: &str, bounds: &Bounds) -> Result<(), ScheduleError> {
    let (range, step) = match expr.split_once('/') {
        Some((range, step)) => (range, Some(step)),
        None => (expr, None),
    };

    let (start, end) = if range == "*" || range == "?" {
        (bounds.min, bounds.max)
    } else {
        match range.split_once('-') {
            Some((low, high)) => (parse_value(low, bounds)?, parse_value(high, bounds)?),
            None => {
                let value = parse_value(range, bounds)?;
                // A single value with a step runs to the end of the range
                (value, if step.is_some() { bounds.max } else { value })
            }
        }
    };

    if let Some(step) = step {
        if parse_int(step)? == 0 {
            return Err(ScheduleError(format!(
                "step of range should be a positive number: {}",
                expr
            )));
        }
    }

    if start < bounds.min {
        return Err(ScheduleError(format!(
            "beginning of range ({}) below minimum ({}): {}",
            start, bounds.min, expr
        )));
    }
    if end > bounds.max {
        return Err(ScheduleError(format!(
            "end of range ({}) above maximum ({}): {}",
            end, bounds.max, expr
        )));
    }
    if start > end {
        return Err(ScheduleError(format!(
            "beginning of range ({}) beyond end of range ({}): {}",
            start, end, expr
        )));
    }

    Ok(())
}

fn parse_value(value: &str, bounds: &Bounds) -> Result<u32, ScheduleError> {
    let lower = value.to_ascii_lowercase();
    if let Some(pos) = bounds.names.iter().position(|n| *n == lower) {
        return Ok(pos as u32 + bounds.min);
    }
    parse_int(value)
}

fn parse_int(value: &str) -> Result<u32, ScheduleError> {
    value
        .parse::<u32>()
        .map_err(|e| ScheduleError(format!("failed to parse int from {}: {}", value, e)))
}

/// Parse a Go-style duration such as `1h30m` or `90s`
fn parse_duration(input: &str) -> Result<Duration, String> {
    if input.is_empty() {
        return Err("empty duration".to_string());
    }

    let mut total = Duration::ZERO;
    let mut rest = input;
    while !rest.is_empty() {
        let digits = rest
            .find(|c: char| !c.is_ascii_digit() && c != '.')
            .ok_or_else(|| format!("missing unit in duration {}", input))?;
        if digits == 0 {
            return Err(format!("invalid duration {}", input));
        }
        let value: f64 = rest[..digits]
            .parse()
            .map_err(|_| format!("invalid duration {}", input))?;
        rest = &rest[digits..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let seconds = match &rest[..unit_len] {
            "ns" => 1e-9,
            "us" | "µs" => 1e-6,
            "ms" => 1e-3,
            "s" => 1.0,
            "m" => 60.0,
            "h" => 3600.0,
            unit => return Err(format!("unknown unit {} in duration {}", unit, input)),
        };
        total += Duration::from_secs_f64(value * seconds);
        rest = &rest[unit_len..];
    }
    Ok(total)
}
