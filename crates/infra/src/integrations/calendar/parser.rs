//! iCalendar body parsing using the icalendar crate's parser.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use chrono_tz::Tz;
use hearth_domain::{EventContent, EventKey, EventTiming, HearthError, ParsedEvent, Result};
use icalendar::parser::{read_calendar, unfold, Component};
use icalendar::{CalendarDateTime, DatePerhapsTime};
use tracing::{debug, warn};

const UNTITLED: &str = "(No title)";

/// A resolved DTSTART/DTEND/RECURRENCE-ID value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Moment {
    Date(NaiveDate),
    Instant(DateTime<Utc>),
}

/// Parse an iCalendar document into event records.
///
/// A body that is not a `VCALENDAR` document is a [`HearthError::Parse`]; a
/// calendar with no usable events yields an empty list.
pub fn parse_ics(body: &str) -> Result<Vec<ParsedEvent>> {
    let trimmed = body.trim_start_matches('\u{feff}').trim_start();
    if !trimmed
        .get(..15)
        .is_some_and(|head| head.eq_ignore_ascii_case("BEGIN:VCALENDAR"))
    {
        return Err(HearthError::Parse("feed body is not an iCalendar document".into()));
    }

    let unfolded = unfold(trimmed);
    let calendar = read_calendar(&unfolded)
        .map_err(|err| HearthError::Parse(format!("malformed iCalendar document: {err}")))?;

    let mut events = Vec::new();
    let mut skipped = 0usize;
    let vevents = calendar
        .components
        .iter()
        .flat_map(|c| {
            if c.name == "VCALENDAR" { c.components.iter().collect::<Vec<_>>() } else { vec![c] }
        })
        .filter(|c| c.name == "VEVENT");
    for component in vevents {
        match parse_vevent(component) {
            Some(event) => events.push(event),
            None => skipped += 1,
        }
    }

    debug!(parsed = events.len(), skipped, "parsed iCalendar feed");
    Ok(events)
}

fn parse_vevent(vevent: &Component<'_>) -> Option<ParsedEvent> {
    let Some(uid) = vevent
        .find_prop("UID")
        .map(|p| p.val.as_ref().trim().to_string())
        .filter(|uid| !uid.is_empty())
    else {
        warn!("skipping VEVENT without UID");
        return None;
    };

    if vevent
        .find_prop("STATUS")
        .is_some_and(|p| p.val.as_ref().trim().eq_ignore_ascii_case("CANCELLED"))
    {
        debug!(uid = %uid, "skipping cancelled VEVENT");
        return None;
    }

    let Some(start) = vevent.find_prop("DTSTART").and_then(|p| {
        DatePerhapsTime::try_from(p).ok().map(to_moment)
    }) else {
        warn!(uid = %uid, "skipping VEVENT without a readable DTSTART");
        return None;
    };

    let end = vevent
        .find_prop("DTEND")
        .and_then(|p| DatePerhapsTime::try_from(p).ok().map(to_moment));
    let duration = vevent.find_prop("DURATION").and_then(|p| parse_duration(p.val.as_ref()));

    let recurrence_id = vevent
        .find_prop("RECURRENCE-ID")
        .and_then(|p| DatePerhapsTime::try_from(p).ok())
        .map(|value| canonical_moment(to_moment(value)));

    let title = vevent
        .find_prop("SUMMARY")
        .map(|p| unescape_text(p.val.as_ref()))
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| UNTITLED.to_string());

    let location = vevent
        .find_prop("LOCATION")
        .map(|p| unescape_text(p.val.as_ref()))
        .filter(|s| !s.trim().is_empty());

    Some(ParsedEvent {
        key: EventKey::new(uid, recurrence_id),
        content: EventContent { title, timing: build_timing(start, end, duration), location },
    })
}

fn build_timing(start: Moment, end: Option<Moment>, duration: Option<Duration>) -> EventTiming {
    match start {
        Moment::Date(start) => {
            let end = match end {
                Some(Moment::Date(end)) => end,
                Some(Moment::Instant(end)) => end.date_naive(),
                None => duration
                    .and_then(|d| start.checked_add_signed(d))
                    .unwrap_or(start),
            };
            let end = if end > start { end } else { start.succ_opt().unwrap_or(start) };
            EventTiming::AllDay { start, end }
        }
        Moment::Instant(start) => {
            let end = match end {
                Some(Moment::Instant(end)) => end,
                Some(Moment::Date(end)) => end.and_hms_opt(0, 0, 0).map_or(start, |n| n.and_utc()),
                None => duration.and_then(|d| start.checked_add_signed(d)).unwrap_or(start),
            };
            EventTiming::Timed { start, end: end.max(start) }
        }
    }
}

fn to_moment(value: DatePerhapsTime) -> Moment {
    match value {
        DatePerhapsTime::Date(date) => Moment::Date(date),
        DatePerhapsTime::DateTime(CalendarDateTime::Utc(dt)) => Moment::Instant(dt),
        DatePerhapsTime::DateTime(CalendarDateTime::Floating(naive)) => {
            Moment::Instant(naive.and_utc())
        }
        DatePerhapsTime::DateTime(CalendarDateTime::WithTimezone { date_time, tzid }) => {
            Moment::Instant(resolve_zoned(date_time, &tzid))
        }
    }
}

/// Resolve a wall-clock time in `tzid` to UTC; unknown zones are treated as UTC.
fn resolve_zoned(local: NaiveDateTime, tzid: &str) -> DateTime<Utc> {
    let Ok(tz) = tzid.trim_matches('"').parse::<Tz>() else {
        warn!(tzid, "unknown TZID, treating time as UTC");
        return local.and_utc();
    };

    let mapped = tz.from_local_datetime(&local);
    match mapped.earliest().or_else(|| mapped.latest()) {
        Some(dt) => dt.with_timezone(&Utc),
        // Inside a DST gap: shift forward by an hour like most clients do.
        None => tz
            .from_local_datetime(&local.checked_add_signed(Duration::hours(1)).unwrap_or(local))
            .earliest()
            .map_or_else(|| local.and_utc(), |dt| dt.with_timezone(&Utc)),
    }
}

fn canonical_moment(moment: Moment) -> String {
    match moment {
        Moment::Date(date) => date.format("%Y-%m-%d").to_string(),
        Moment::Instant(dt) => dt.to_rfc3339_opts(SecondsFormat::Secs, true),
    }
}

/// Parse an RFC 5545 duration such as `PT1H30M`, `P1D`, or `P2W`.
///
/// Amounts outside chrono's range yield `None`, same as malformed input.
fn parse_duration(value: &str) -> Option<Duration> {
    let value = value.trim();
    let (negative, rest) = match value.as_bytes().first()? {
        b'-' => (true, &value[1..]),
        b'+' => (false, &value[1..]),
        _ => (false, value),
    };
    let rest = rest.strip_prefix('P')?;

    let mut total = Duration::zero();
    let mut in_time = false;
    let mut digits = String::new();
    for ch in rest.chars() {
        match ch {
            'T' => in_time = true,
            '0'..='9' => digits.push(ch),
            unit => {
                let amount: i64 = digits.parse().ok()?;
                digits.clear();
                let part = match (unit, in_time) {
                    ('W', false) => Duration::try_weeks(amount),
                    ('D', false) => Duration::try_days(amount),
                    ('H', true) => Duration::try_hours(amount),
                    ('M', true) => Duration::try_minutes(amount),
                    ('S', true) => Duration::try_seconds(amount),
                    _ => return None,
                }?;
                total = total.checked_add(&part)?;
            }
        }
    }

    if !digits.is_empty() {
        return None;
    }
    Some(if negative { -total } else { total })
}

fn unescape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n' | 'N') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out.trim().to_string()
}
