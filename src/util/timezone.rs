use chrono::{DateTime, Datelike, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use time::{OffsetDateTime, UtcOffset, format_description::well_known::Rfc3339};

/// Calendar position of an instant in a given timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarDay {
    pub year: i32,
    pub month: u8,
    pub day: u8,
}

const LOCAL_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Parse a timestamp produced by the remote service.
///
/// `timestamptz` columns arrive as RFC 3339 (`2024-03-05T12:00:00+00:00`)
/// and keep their offset. `timestamp` columns carry no offset
/// (`2024-03-05T12:00:00`) and are read as wall-clock time in `tz`.
pub fn parse_timestamp(raw: &str, tz: Tz) -> Result<OffsetDateTime, String> {
    let raw = raw.trim();
    let rfc3339_err = match OffsetDateTime::parse(raw, &Rfc3339) {
        Ok(parsed) => return Ok(parsed),
        Err(err) => err,
    };

    let naive = LOCAL_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .ok_or_else(|| rfc3339_err.to_string())?;
    let local = tz
        .from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| format!("local time does not exist in {tz}"))?;
    let nanos = local
        .timestamp_nanos_opt()
        .ok_or_else(|| "outside the representable range".to_string())?;
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(nanos)).map_err(|err| err.to_string())
}

pub fn localized_datetime(time: OffsetDateTime, tz: Tz) -> Option<DateTime<Tz>> {
    let utc = time.to_offset(UtcOffset::UTC);
    let datetime_utc = DateTime::<Utc>::from_timestamp(utc.unix_timestamp(), utc.nanosecond())?;
    Some(tz.from_utc_datetime(&datetime_utc.naive_utc()))
}

pub fn calendar_day(time: OffsetDateTime, tz: Tz) -> Option<CalendarDay> {
    let localized = localized_datetime(time, tz)?;
    Some(CalendarDay {
        year: localized.year(),
        month: u8::try_from(localized.month()).ok()?,
        day: u8::try_from(localized.day()).ok()?,
    })
}

/// First instant of `year` in `tz`, expressed in UTC.
pub fn year_start(year: i32, tz: Tz) -> Option<OffsetDateTime> {
    let local = tz.with_ymd_and_hms(year, 1, 1, 0, 0, 0).earliest()?;
    OffsetDateTime::from_unix_timestamp(local.timestamp()).ok()
}

pub fn format_utc(time: OffsetDateTime) -> Result<String, time::error::Format> {
    time.to_offset(UtcOffset::UTC).format(&Rfc3339)
}
