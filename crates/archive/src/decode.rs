//! In-memory decoding of document formats.
//!
//! These are synchronous and CPU-bound (zip inflation, gzip/bzip2
//! decompression, JSON parsing); async callers run them on the blocking pool.

use crate::ArchiveFormat;
use crate::error::{ErrorKind, Result};
use bzip2::read::BzDecoder;
use exn::ResultExt;
use flate2::read::GzDecoder;
use sastra_models::Row;
use serde_json::Value;
use std::io::{Cursor, Read};
use tracing::instrument;
use zip::ZipArchive;

const JSON_SUFFIX: &str = ".json";

/// Decode a document-shaped file into JSON.
///
/// Returns [`UnsupportedFormat`](ErrorKind::UnsupportedFormat) for formats
/// that aren't documents (see [`ArchiveFormat::is_document`]).
#[instrument(skip_all, fields(format = %format, input_size = data.len()))]
pub fn decode_document(data: &[u8], format: ArchiveFormat) -> Result<Value> {
    match format {
        ArchiveFormat::Json => parse_json(data),
        ArchiveFormat::Zip => decode_zip(data, None),
        ArchiveFormat::Gzip => {
            let mut text = Vec::new();
            GzDecoder::new(data).read_to_end(&mut text).or_raise(|| ErrorKind::InvalidData)?;
            parse_json(&text)
        },
        ArchiveFormat::Bzip2 => {
            let mut text = Vec::new();
            BzDecoder::new(data).read_to_end(&mut text).or_raise(|| ErrorKind::InvalidData)?;
            parse_json(&text)
        },
        ArchiveFormat::Sqlite | ArchiveFormat::Unsupported => {
            exn::bail!(ErrorKind::UnsupportedFormat(format.to_string()))
        },
    }
}

/// Decode the JSON file held by a zip archive.
///
/// With `entry`, that exact entry is preferred; otherwise (or when it is
/// absent) the first entry whose name ends in `.json`, in archive order, wins.
/// Returns [`EntryNotFound`](ErrorKind::EntryNotFound) when the archive holds
/// no such entry.
///
/// # Examples
///
/// ```
/// use sastra_archive::decode_zip;
/// use std::io::{Cursor, Write};
///
/// let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
/// writer.start_file("toc_gita.json", zip::write::SimpleFileOptions::default()).unwrap();
/// writer.write_all(br#"[{"verse_url":"bg/1"}]"#).unwrap();
/// let bytes = writer.finish().unwrap().into_inner();
///
/// let toc = decode_zip(&bytes, Some("toc_gita.json")).unwrap();
/// assert_eq!(toc[0]["verse_url"], "bg/1");
/// ```
pub fn decode_zip(data: &[u8], entry: Option<&str>) -> Result<Value> {
    let mut archive = ZipArchive::new(Cursor::new(data)).or_raise(|| ErrorKind::InvalidData)?;
    let index = entry
        .and_then(|name| archive.index_for_name(name))
        .or_else(|| first_json_entry(&mut archive))
        .ok_or_else(|| exn::Exn::from(ErrorKind::EntryNotFound(entry.unwrap_or("*.json").to_string())))?;
    let mut file = archive.by_index(index).or_raise(|| ErrorKind::InvalidData)?;
    tracing::debug!(entry = file.name(), size = file.size(), "Decoding zip entry");
    let mut text = String::new();
    file.read_to_string(&mut text).or_raise(|| ErrorKind::InvalidData)?;
    parse_json(text.as_bytes())
}

fn first_json_entry<R: Read + std::io::Seek>(archive: &mut ZipArchive<R>) -> Option<usize> {
    (0..archive.len()).find(|&i| {
        archive.by_index_raw(i).is_ok_and(|file| !file.is_dir() && file.name().ends_with(JSON_SUFFIX))
    })
}

fn parse_json(data: &[u8]) -> Result<Value> {
    serde_json::from_slice(data).or_raise(|| ErrorKind::InvalidData)
}

/// Convert a decoded document into content rows.
///
/// The document must be an array; elements that aren't objects are skipped.
pub fn into_rows(document: Value) -> Result<Vec<Row>> {
    match document {
        Value::Array(items) => Ok(items
            .into_iter()
            .filter_map(|item| match item {
                Value::Object(row) => Some(row),
                _ => None,
            })
            .collect()),
        _ => exn::bail!(ErrorKind::InvalidData),
    }
}
