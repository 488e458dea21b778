use time::format_description::well_known::{Iso8601, Rfc3339};
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime};

use crate::error::PharmaGuardError;

/// An instant as reported by the analysis service.
///
/// The service emits local ISO 8601 timestamps without an offset; RFC 3339 values
/// with an explicit offset are accepted too.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ResultInstant {
    Offset(OffsetDateTime),
    Local(PrimitiveDateTime),
}

impl ResultInstant {
    fn primitive(&self) -> PrimitiveDateTime {
        match self {
            Self::Offset(dt) => PrimitiveDateTime::new(dt.date(), dt.time()),
            Self::Local(dt) => *dt,
        }
    }
}

pub(crate) fn parse_timestamp(value: &str) -> Result<ResultInstant, PharmaGuardError> {
    let v = value.trim();
    if v.is_empty() {
        return Err(PharmaGuardError::MalformedResponse(
            "result timestamp is empty".into(),
        ));
    }

    if let Ok(dt) = OffsetDateTime::parse(v, &Rfc3339) {
        return Ok(ResultInstant::Offset(dt));
    }
    if let Ok(dt) = PrimitiveDateTime::parse(v, &Iso8601::DEFAULT) {
        return Ok(ResultInstant::Local(dt));
    }

    Err(PharmaGuardError::MalformedResponse(format!(
        "result timestamp '{v}' is not a valid instant"
    )))
}

/// Formats a timestamp for display; falls back to the raw value when unparseable.
pub(crate) fn display_timestamp(value: &str) -> String {
    let Ok(instant) = parse_timestamp(value) else {
        return value.trim().to_string();
    };

    let format = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    let formatted = instant
        .primitive()
        .format(&format)
        .unwrap_or_else(|_| value.trim().to_string());
    match instant {
        ResultInstant::Offset(dt) if dt.offset().is_utc() => format!("{formatted} UTC"),
        ResultInstant::Offset(dt) => {
            let offset_format = format_description!("[offset_hour sign:mandatory]:[offset_minute]");
            match dt.offset().format(&offset_format) {
                Ok(offset) => format!("{formatted} {offset}"),
                Err(_) => formatted,
            }
        }
        ResultInstant::Local(_) => formatted,
    }
}
