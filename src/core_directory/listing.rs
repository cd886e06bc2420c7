//! Grammar for the lines of a `LIST` reply.
//!
//! Five formats are tried in a fixed order and the first match wins:
//!
//! 1. Unix `ls -l` with numeric owner and group
//! 2. Unix `ls -l` with named owner and group, absolute date (`Jan  5  2020`)
//! 3. Unix `ls -l` with named owner and group, recent date (`Jan  5 14:30`)
//! 4. DOS/IIS short form (`01-05-21  02:30PM  <DIR>  name`)
//! 5. IIS in Unix-compatibility mode, where owner and group may carry domain
//!    prefixes, spaces or other characters the stricter Unix forms reject
//!
//! A line matching none of them is not an entry and yields `Ok(None)`.

use crate::core_directory::path;
use crate::error::{FtpError, FtpResult};
use chrono::{Datelike, Duration, Local, NaiveDate, NaiveDateTime};
use lazy_static::lazy_static;
use log::trace;
use regex::{Captures, Regex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampStyle {
    /// `Mon DD YYYY`
    UnixDate,
    /// `Mon DD HH:MM`, year implied
    UnixDateTime,
    /// `MM-DD-YY HH:MMAM`
    DosDateTime,
    Undetermined,
}

/// One parsed listing line, before it lands in the directory cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingItem {
    pub name: String,
    pub full_path: String,
    pub permission: String,
    pub is_directory: bool,
    pub size: u64,
    pub raw_timestamp: String,
    pub style: TimestampStyle,
}

impl ListingItem {
    pub fn timestamp(&self) -> Option<NaiveDateTime> {
        parse_timestamp(&self.raw_timestamp, self.style, Local::now().date_naive())
    }
}

struct ListingFormat {
    name: &'static str,
    pattern: Regex,
    /// `None` when the style follows from the shape of the timestamp.
    style: Option<TimestampStyle>,
}

const UNIX_MODE: &str = r"^(?P<dir>[-dl])(?P<permission>[-rwxsStT]{9})[+@.]?\s+\d+\s+";
const UNIX_TAIL: &str = r"\s+(?P<size>\d+)\s+(?P<timestamp>";
const DATE: &str = r"[A-Za-z]{3}\s+\d{1,2}\s+\d{4}";
const TIME: &str = r"[A-Za-z]{3}\s+\d{1,2}\s+\d{1,2}:\d{2}";

fn unix_format(owner_group: &str, timestamp: &str) -> Regex {
    let pattern = format!(
        r"{}{}{}{})\s+(?P<name>.+)$",
        UNIX_MODE, owner_group, UNIX_TAIL, timestamp
    );
    Regex::new(&pattern).expect("static listing pattern")
}

lazy_static! {
    static ref FORMATS: Vec<ListingFormat> = vec![
        ListingFormat {
            name: "unix-numeric-owner",
            pattern: unix_format(r"\d+\s+\d+", &format!("{}|{}", DATE, TIME)),
            style: None,
        },
        ListingFormat {
            name: "unix-date",
            pattern: unix_format(r"[\w.-]+\s+[\w.-]+", DATE),
            style: Some(TimestampStyle::UnixDate),
        },
        ListingFormat {
            name: "unix-time",
            pattern: unix_format(r"[\w.-]+\s+[\w.-]+", TIME),
            style: Some(TimestampStyle::UnixDateTime),
        },
        ListingFormat {
            name: "dos",
            pattern: Regex::new(
                r"^(?P<timestamp>\d{2}-\d{2}-\d{2,4}\s+\d{1,2}:\d{2}\s*[AaPp][Mm])\s+(?:(?P<dir><DIR>)|(?P<size>\d+))\s+(?P<name>.+)$"
            )
            .expect("static listing pattern"),
            style: Some(TimestampStyle::DosDateTime),
        },
        ListingFormat {
            name: "iis-unix",
            pattern: unix_format(r"\S+(?:\s+\S+)*?", &format!("{}|{}", DATE, TIME)),
            style: Some(TimestampStyle::Undetermined),
        },
    ];
}

/// Parses one listing line of the directory at `parent_path`.
///
/// `Ok(None)` for lines that are not entries (no format matched, or `.` and
/// `..`). `Err` when a format matched but the entry is unusable, such as a file
/// size that does not fit in 64 bits.
pub fn parse_listing_line(line: &str, parent_path: &str) -> FtpResult<Option<ListingItem>> {
    let Some((format, caps)) = FORMATS
        .iter()
        .find_map(|f| f.pattern.captures(line).map(|caps| (f, caps)))
    else {
        trace!("No listing format matches {:?}", line);
        return Ok(None);
    };

    let dir_flag = group(&caps, "dir");
    let is_symlink = dir_flag == "l";
    let is_directory = !dir_flag.is_empty() && dir_flag != "-";

    let mut name = group(&caps, "name");
    if let Some(nul) = name.find('\0') {
        name = &name[..nul];
    }
    if is_symlink {
        if let Some(arrow) = name.find(" -> ") {
            name = &name[..arrow];
        }
    }
    if name.is_empty() || name == "." || name == ".." {
        return Ok(None);
    }

    let raw_size = group(&caps, "size");
    let size = if is_directory {
        raw_size.parse().unwrap_or(0)
    } else {
        raw_size.parse::<u64>().map_err(|e| FtpError::ListingLine {
            line: line.to_string(),
            reason: format!("invalid size {:?}: {}", raw_size, e),
        })?
    };

    let raw_timestamp = group(&caps, "timestamp").to_string();
    let style = format.style.unwrap_or(if raw_timestamp.contains(':') {
        TimestampStyle::UnixDateTime
    } else {
        TimestampStyle::UnixDate
    });

    let joined = path::combine(&[parent_path, name]);
    let full_path = if is_directory {
        path::as_directory(&joined)
    } else {
        joined
    };

    trace!("{:?} parsed as {} entry {:?}", line, format.name, name);
    Ok(Some(ListingItem {
        name: name.to_string(),
        full_path,
        permission: group(&caps, "permission").to_string(),
        is_directory,
        size,
        raw_timestamp,
        style,
    }))
}

fn group<'t>(caps: &Captures<'t>, name: &str) -> &'t str {
    caps.name(name).map_or("", |m| m.as_str())
}

/// Interprets a raw listing timestamp. `today` anchors the implied year of
/// [`TimestampStyle::UnixDateTime`]: a date that would lie in the future
/// belongs to the previous year.
pub fn parse_timestamp(raw: &str, style: TimestampStyle, today: NaiveDate) -> Option<NaiveDateTime> {
    let normalised = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    match style {
        TimestampStyle::UnixDate => NaiveDate::parse_from_str(&normalised, "%b %d %Y")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0)),
        TimestampStyle::UnixDateTime => {
            let in_year = |year: i32| {
                NaiveDateTime::parse_from_str(&format!("{} {}", year, normalised), "%Y %b %d %H:%M")
                    .ok()
            };
            match in_year(today.year()) {
                Some(dt) if dt.date() <= today + Duration::days(1) => Some(dt),
                _ => in_year(today.year() - 1),
            }
        }
        TimestampStyle::DosDateTime => {
            let compact = normalised.to_uppercase().replace(" AM", "AM").replace(" PM", "PM");
            NaiveDateTime::parse_from_str(&compact, "%m-%d-%y %I:%M%p")
                .or_else(|_| NaiveDateTime::parse_from_str(&compact, "%m-%d-%Y %I:%M%p"))
                .ok()
        }
        TimestampStyle::Undetermined => [
            TimestampStyle::UnixDate,
            TimestampStyle::UnixDateTime,
            TimestampStyle::DosDateTime,
        ]
        .into_iter()
        .find_map(|s| parse_timestamp(raw, s, today)),
    }
}
