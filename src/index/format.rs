//! Index file format.
//!
//! ```text
//! /home/user/album
//! 2022/02/220204-103746.jpg
//! <tab-separated descriptor line>
//!
//! ```
//!
//! First line is the album root, then one (relative path, descriptor) line
//! pair per cached file, then a blank line. The descriptor line carries
//! eleven tab-separated fields in fixed order; optional fields serialize as
//! the empty string. Round-trips exactly.

use anyhow::{Result, anyhow};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::descriptor::FileDescriptor;

use super::Index;

pub(super) fn serialize(index: &Index) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", index.root().display());
    index.walk(|rel, desc| {
        let _ = writeln!(out, "{}", rel.display());
        let _ = writeln!(out, "{}", descriptor_line(desc));
    });
    out.push('\n');
    out
}

pub(super) fn parse(text: &str) -> Result<Index> {
    let mut lines = text.lines();
    let root = lines
        .next()
        .filter(|l| !l.trim().is_empty())
        .ok_or_else(|| anyhow!("index file is missing its root line"))?;
    let mut index = Index::new(Path::new(root));

    while let Some(path_line) = lines.next() {
        if path_line.trim().is_empty() {
            break;
        }
        let desc_line = lines
            .next()
            .ok_or_else(|| anyhow!("missing descriptor line for {path_line:?}"))?;
        let descriptor = parse_descriptor_line(desc_line)?;
        index.insert(&PathBuf::from(path_line), descriptor);
    }
    Ok(index)
}

fn descriptor_line(d: &FileDescriptor) -> String {
    let fields = [
        d.path.display().to_string(),
        d.name.clone(),
        d.extension.clone(),
        opt_stamp(&d.captured),
        stamp(&d.created),
        stamp(&d.modified),
        d.manufacturer.clone().unwrap_or_default(),
        d.model.clone().unwrap_or_default(),
        d.relative_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default(),
        d.time_shift
            .map(|s| s.num_seconds().to_string())
            .unwrap_or_default(),
        opt_stamp(&d.date_override),
    ];
    fields.join("\t")
}

fn parse_descriptor_line(line: &str) -> Result<FileDescriptor> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() != 11 {
        return Err(anyhow!(
            "descriptor line has {} fields, expected 11: {line:?}",
            fields.len()
        ));
    }
    Ok(FileDescriptor {
        path: PathBuf::from(fields[0]),
        name: fields[1].to_string(),
        extension: fields[2].to_string(),
        captured: parse_opt_stamp(fields[3])?,
        created: parse_stamp(fields[4])?,
        modified: parse_stamp(fields[5])?,
        manufacturer: non_empty(fields[6]),
        model: non_empty(fields[7]),
        relative_path: (!fields[8].is_empty()).then(|| PathBuf::from(fields[8])),
        time_shift: if fields[9].is_empty() {
            None
        } else {
            let secs: i64 = fields[9]
                .parse()
                .map_err(|e| anyhow!("unparseable time shift {:?}: {e}", fields[9]))?;
            Some(Duration::seconds(secs))
        },
        date_override: parse_opt_stamp(fields[10])?,
    })
}

fn non_empty(field: &str) -> Option<String> {
    (!field.is_empty()).then(|| field.to_string())
}

fn stamp(when: &DateTime<Utc>) -> String {
    when.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn opt_stamp(when: &Option<DateTime<Utc>>) -> String {
    when.as_ref().map(stamp).unwrap_or_default()
}

fn parse_stamp(text: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| anyhow!("unparseable timestamp {text:?}: {e}"))
}

fn parse_opt_stamp(text: &str) -> Result<Option<DateTime<Utc>>> {
    if text.is_empty() {
        Ok(None)
    } else {
        parse_stamp(text).map(Some)
    }
}
