//! EXIF adapter: capture time and orientation.
//!
//! Missing EXIF data, or a missing tag, is a normal outcome reported as
//! `None`. Only structurally broken EXIF blocks surface as errors.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use exif::{In, Reader, Tag, Value};
use std::io::{BufRead, Seek};

use crate::error::{Error, Result};

const EXIF_TIME_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

/// The two EXIF facts the library records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExifInfo {
    pub taken: Option<DateTime<Utc>>,
    /// EXIF orientation, 1 through 8.
    pub orientation: Option<u8>,
}

/// Parse both facts from a single pass over `reader`.
pub fn extract<R: BufRead + Seek>(reader: &mut R) -> Result<ExifInfo> {
    match read(reader)? {
        Some(exif) => Ok(ExifInfo {
            taken: taken_from(&exif),
            orientation: orientation_from(&exif),
        }),
        None => Ok(ExifInfo::default()),
    }
}

/// `DateTimeOriginal`, falling back to `DateTime`.
pub fn taken<R: BufRead + Seek>(reader: &mut R) -> Result<Option<DateTime<Utc>>> {
    Ok(read(reader)?.and_then(|exif| taken_from(&exif)))
}

pub fn orientation<R: BufRead + Seek>(reader: &mut R) -> Result<Option<u8>> {
    Ok(read(reader)?.and_then(|exif| orientation_from(&exif)))
}

fn read<R: BufRead + Seek>(reader: &mut R) -> Result<Option<exif::Exif>> {
    match Reader::new().read_from_container(reader) {
        Ok(exif) => Ok(Some(exif)),
        Err(exif::Error::NotFound(_)) | Err(exif::Error::NotSupported(_)) => Ok(None),
        Err(exif::Error::Io(e)) => Err(Error::Io(e)),
        Err(e) => Err(Error::Exif(e.to_string())),
    }
}

fn taken_from(exif: &exif::Exif) -> Option<DateTime<Utc>> {
    [Tag::DateTimeOriginal, Tag::DateTime]
        .into_iter()
        .filter_map(|tag| ascii_field(exif, tag))
        .find_map(|s| parse_exif_time(&s))
}

fn orientation_from(exif: &exif::Exif) -> Option<u8> {
    let field = exif.get_field(Tag::Orientation, In::PRIMARY)?;
    match field.value.get_uint(0) {
        Some(v @ 1..=8) => Some(v as u8),
        _ => None,
    }
}

fn ascii_field(exif: &exif::Exif, tag: Tag) -> Option<String> {
    let field = exif.get_field(tag, In::PRIMARY)?;
    match field.value {
        Value::Ascii(ref vec) => vec
            .first()
            .and_then(|v| std::str::from_utf8(v).ok())
            .map(|s| s.trim_end_matches('\0').trim().to_string()),
        _ => None,
    }
}

/// Parse `YYYY:MM:DD HH:MM:SS` as UTC. Placeholder values such as
/// `0000:00:00 00:00:00` yield `None`.
pub fn parse_exif_time(s: &str) -> Option<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(s, EXIF_TIME_FORMAT).ok()?;
    Some(Utc.from_utc_datetime(&naive))
}
