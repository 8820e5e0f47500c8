//! Date and time conversions between INSTANT, LOCAL_TIME, numbers and text.
//!
//! Patterns use strftime syntax. When a pattern and its locale are constant
//! they are validated once while building; otherwise on every evaluation.
//! If any argument is a constant missing value the whole call folds to a
//! constant missing result without looking at the other arguments.

use super::FunctionRegistry;
use crate::expression::function::{
    any_constant_missing, expect_numeric, expect_type, fold1, fold_prepared, known_type,
};
use crate::expression::{
    instant_to_string, Arity, ExpressionError, ExpressionEvaluator, ExpressionParser,
    ExpressionResult, ExpressionType, Function,
};
use chrono::format::{Item, StrftimeItems};
use chrono::{
    DateTime, FixedOffset, Locale, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeZone, Utc,
};
use log::{debug, warn};
use std::fmt::{Display, Write};
use std::sync::Arc;

const NANOS_PER_SECOND: u64 = 1_000_000_000;
const NANOS_PER_DAY: f64 = 86_400.0 * 1e9;

pub(super) fn register(registry: &mut FunctionRegistry) {
    for (name, kind) in [
        ("date_get_time", Kind::GetTime),
        ("date_parse", Kind::FromMillis),
        ("date_parse_str", Kind::ParseInstant),
        ("date_str", Kind::FormatInstant),
        ("time_parse", Kind::FromNanos),
        ("time_parse_str", Kind::ParseTime),
        ("time_str", Kind::FormatTime),
    ] {
        registry.register(Arc::new(DateTimeFunction { name, kind }));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    GetTime,
    FromMillis,
    ParseInstant,
    FormatInstant,
    FromNanos,
    ParseTime,
    FormatTime,
}

/// A validated strftime pattern with an optional locale.
#[derive(Debug, Clone)]
struct Pattern {
    text: String,
    locale: Option<Locale>,
}

impl Pattern {
    /// `options[0]` is the pattern (argument 2), `options[1]` the locale
    /// (argument 3). An empty locale means no localisation.
    fn prepare(function: &str, options: &[Option<String>]) -> ExpressionResult<Self> {
        let text = options.first().cloned().flatten().unwrap_or_default();
        if StrftimeItems::new(&text).any(|item| matches!(item, Item::Error)) {
            return Err(ExpressionError::input(
                function,
                2,
                format!("invalid pattern '{}'", text),
            ));
        }
        let locale = match options.get(1).and_then(|l| l.as_deref()).map(str::trim) {
            None | Some("") => None,
            Some(name) => Some(parse_locale(function, name)?),
        };
        Ok(Self { text, locale })
    }

    fn prepare_for_parsing(function: &str, options: &[Option<String>]) -> ExpressionResult<Self> {
        let pattern = Self::prepare(function, options)?;
        if let Some(locale) = pattern.locale {
            warn!(
                "{}: locale {:?} is ignored, text is parsed with English names",
                function, locale
            );
        }
        Ok(pattern)
    }
}

/// Output pattern of `date_str` plus the zone the instant is shown in.
struct InstantFormat {
    pattern: Pattern,
    zone: FixedOffset,
}

impl InstantFormat {
    fn prepare(function: &str, options: &[Option<String>]) -> ExpressionResult<Self> {
        let pattern = Pattern::prepare(function, options)?;
        let zone = match options.get(2).and_then(|z| z.as_deref()) {
            None => Utc.fix(),
            Some(zone) => parse_zone(function, zone)?,
        };
        Ok(Self { pattern, zone })
    }

    fn format(&self, function: &str, instant: &DateTime<Utc>) -> ExpressionResult<String> {
        let local = instant.with_timezone(&self.zone);
        match self.pattern.locale {
            Some(locale) => render(function, local.format_localized(&self.pattern.text, locale)),
            None => render(function, local.format(&self.pattern.text)),
        }
    }
}

fn parse_locale(function: &str, name: &str) -> ExpressionResult<Locale> {
    Locale::try_from(name.replace('-', "_").as_str())
        .map_err(|_| ExpressionError::input(function, 3, format!("unknown locale '{}'", name)))
}

fn parse_zone(function: &str, zone: &str) -> ExpressionResult<FixedOffset> {
    let zone = zone.trim();
    if zone.eq_ignore_ascii_case("UTC") || zone.eq_ignore_ascii_case("Z") {
        return Ok(Utc.fix());
    }
    zone.parse::<FixedOffset>()
        .map_err(|e| ExpressionError::input(function, 4, format!("unknown zone '{}': {}", zone, e)))
}

fn render(function: &str, formatted: impl Display) -> ExpressionResult<String> {
    let mut out = String::new();
    write!(out, "{}", formatted)
        .map_err(|_| ExpressionError::input(function, 2, "value cannot be formatted with pattern"))?;
    Ok(out)
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::default()))
}

fn instant_from_millis(function: &str, millis: f64) -> ExpressionResult<Option<DateTime<Utc>>> {
    if millis.is_nan() {
        return Ok(None);
    }
    Utc.timestamp_millis_opt(millis as i64)
        .single()
        .map(Some)
        .ok_or_else(|| {
            ExpressionError::input(function, 1, format!("{} ms is out of the instant range", millis))
        })
}

fn time_from_nanos(function: &str, nanos: f64) -> ExpressionResult<Option<NaiveTime>> {
    if nanos.is_nan() {
        return Ok(None);
    }
    let out_of_range = || {
        ExpressionError::input(
            function,
            1,
            format!("{} ns is not a nanosecond of the day", nanos),
        )
    };
    if !(0.0..NANOS_PER_DAY).contains(&nanos) {
        return Err(out_of_range());
    }
    let nanos = nanos as u64;
    NaiveTime::from_num_seconds_from_midnight_opt(
        (nanos / NANOS_PER_SECOND) as u32,
        (nanos % NANOS_PER_SECOND) as u32,
    )
    .map(Some)
    .ok_or_else(out_of_range)
}

/// RFC 3339 with offset, or an offset-free date-time or date read as UTC.
fn parse_iso_instant(function: &str, text: &str) -> ExpressionResult<DateTime<Utc>> {
    let text = text.trim();
    DateTime::parse_from_rfc3339(text)
        .map(|instant| instant.with_timezone(&Utc))
        .or_else(|err| {
            text.parse::<NaiveDateTime>()
                .map(|naive| Utc.from_utc_datetime(&naive))
                .or_else(|_| text.parse::<NaiveDate>().map(midnight))
                .map_err(|_| err)
        })
        .map_err(|err| {
            ExpressionError::input(
                function,
                1,
                format!("cannot parse '{}' as an ISO-8601 instant: {}", text, err),
            )
        })
}

/// Patterns without an offset are read as UTC, date-only patterns as
/// midnight UTC.
fn parse_instant(function: &str, text: &str, pattern: &Pattern) -> ExpressionResult<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(instant) = DateTime::parse_from_str(text, &pattern.text) {
        return Ok(instant.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(text, &pattern.text)
        .map(|naive| Utc.from_utc_datetime(&naive))
        .or_else(|err| {
            NaiveDate::parse_from_str(text, &pattern.text)
                .map(midnight)
                .map_err(|_| err)
        })
        .map_err(|err| {
            ExpressionError::input(
                function,
                1,
                format!("cannot parse '{}' with pattern '{}': {}", text, pattern.text, err),
            )
        })
}

fn parse_iso_time(function: &str, text: &str) -> ExpressionResult<NaiveTime> {
    let text = text.trim();
    text.parse::<NaiveTime>()
        .or_else(|err| NaiveTime::parse_from_str(text, "%H:%M").map_err(|_| err))
        .map_err(|err| {
            ExpressionError::input(
                function,
                1,
                format!("cannot parse '{}' as an ISO-8601 time: {}", text, err),
            )
        })
}

fn parse_time(function: &str, text: &str, pattern: &Pattern) -> ExpressionResult<NaiveTime> {
    NaiveTime::parse_from_str(text.trim(), &pattern.text).map_err(|err| {
        ExpressionError::input(
            function,
            1,
            format!("cannot parse '{}' with pattern '{}': {}", text, pattern.text, err),
        )
    })
}

fn format_time(function: &str, time: &NaiveTime, pattern: &Pattern) -> ExpressionResult<String> {
    match pattern.locale {
        Some(locale) => {
            // Localised formatting is only offered on zoned values.
            let instant = Utc.from_utc_datetime(&NaiveDateTime::new(NaiveDate::default(), *time));
            render(function, instant.format_localized(&pattern.text, locale))
        }
        None => render(function, time.format(&pattern.text)),
    }
}

pub struct DateTimeFunction {
    name: &'static str,
    kind: Kind,
}

impl DateTimeFunction {
    fn expect_strings(&self, inputs: &[ExpressionType], from: usize) -> ExpressionResult<()> {
        for (offset, ty) in inputs.iter().enumerate().skip(from) {
            expect_type(self.name, offset + 1, *ty, ExpressionType::String)?;
        }
        Ok(())
    }
}

impl Function for DateTimeFunction {
    fn name(&self) -> &str {
        self.name
    }

    fn arity(&self) -> Arity {
        match self.kind {
            Kind::GetTime | Kind::FromMillis | Kind::FromNanos => Arity::Fixed(1),
            Kind::ParseInstant | Kind::ParseTime | Kind::FormatTime => Arity::Range(1, 3),
            Kind::FormatInstant => Arity::Range(1, 4),
        }
    }

    fn compute_type(&self, inputs: &[ExpressionType]) -> ExpressionResult<Option<ExpressionType>> {
        let result = match self.kind {
            Kind::GetTime => {
                expect_type(self.name, 1, inputs[0], ExpressionType::Instant)?;
                ExpressionType::Integer
            }
            Kind::FromMillis => {
                expect_numeric(self.name, 1, inputs[0])?;
                ExpressionType::Instant
            }
            Kind::FromNanos => {
                expect_numeric(self.name, 1, inputs[0])?;
                ExpressionType::LocalTime
            }
            Kind::ParseInstant => {
                self.expect_strings(inputs, 0)?;
                ExpressionType::Instant
            }
            Kind::ParseTime => {
                self.expect_strings(inputs, 0)?;
                ExpressionType::LocalTime
            }
            Kind::FormatInstant => {
                expect_type(self.name, 1, inputs[0], ExpressionType::Instant)?;
                self.expect_strings(inputs, 1)?;
                ExpressionType::String
            }
            Kind::FormatTime => {
                expect_type(self.name, 1, inputs[0], ExpressionType::LocalTime)?;
                self.expect_strings(inputs, 1)?;
                ExpressionType::String
            }
        };
        Ok(Some(result))
    }

    fn compute(
        &self,
        _parser: &ExpressionParser,
        inputs: Vec<ExpressionEvaluator>,
    ) -> ExpressionResult<ExpressionEvaluator> {
        let ty = known_type(self, &inputs)?;
        if any_constant_missing(&inputs)? {
            debug!("{}: constant missing argument, result is missing", self.name);
            return Ok(ExpressionEvaluator::missing(ty));
        }

        let name = self.name;
        let value = &inputs[0];
        let options = &inputs[1..];
        match self.kind {
            Kind::GetTime => fold1(value, ty, |instant: Option<DateTime<Utc>>| {
                Ok(instant.map_or(f64::NAN, |i| i.timestamp_millis() as f64))
            }),
            Kind::FromMillis => fold1(value, ty, move |millis: f64| {
                instant_from_millis(name, millis)
            }),
            Kind::FromNanos => fold1(value, ty, move |nanos: f64| time_from_nanos(name, nanos)),
            Kind::ParseInstant if options.is_empty() => {
                fold1(value, ty, move |text: Option<String>| {
                    text.map(|t| parse_iso_instant(name, &t)).transpose()
                })
            }
            Kind::ParseInstant => fold_prepared(
                value,
                options,
                ty,
                move |options: &[Option<String>]| Pattern::prepare_for_parsing(name, options),
                move |text: Option<String>, pattern: &Pattern| {
                    text.map(|t| parse_instant(name, &t, pattern)).transpose()
                },
            ),
            Kind::FormatInstant if options.is_empty() => {
                fold1(value, ty, |instant: Option<DateTime<Utc>>| {
                    Ok(instant.map(|i| instant_to_string(&i)))
                })
            }
            Kind::FormatInstant => fold_prepared(
                value,
                options,
                ty,
                move |options: &[Option<String>]| InstantFormat::prepare(name, options),
                move |instant: Option<DateTime<Utc>>, format: &InstantFormat| {
                    instant.map(|i| format.format(name, &i)).transpose()
                },
            ),
            Kind::ParseTime if options.is_empty() => {
                fold1(value, ty, move |text: Option<String>| {
                    text.map(|t| parse_iso_time(name, &t)).transpose()
                })
            }
            Kind::ParseTime => fold_prepared(
                value,
                options,
                ty,
                move |options: &[Option<String>]| Pattern::prepare_for_parsing(name, options),
                move |text: Option<String>, pattern: &Pattern| {
                    text.map(|t| parse_time(name, &t, pattern)).transpose()
                },
            ),
            Kind::FormatTime if options.is_empty() => {
                fold1(value, ty, |time: Option<NaiveTime>| Ok(time.map(|t| t.to_string())))
            }
            Kind::FormatTime => fold_prepared(
                value,
                options,
                ty,
                move |options: &[Option<String>]| Pattern::prepare(name, options),
                move |time: Option<NaiveTime>, pattern: &Pattern| {
                    time.map(|t| format_time(name, &t, pattern)).transpose()
                },
            ),
        }
    }
}
