//! Transaction and action model plus the journal line format.
//!
//! A journal line is a 16-character left-aligned tag followed by the payload.
//! One transaction record is:
//!
//! ```text
//! Transaction     - 2022-02-04T10:37:46Z
//! Info            Copy
//! Move            /album/2022/02/img.jpg
//! To              /album/.albumsafe/trash/1a2b3c4d.jpg
//! Copy            /import/img.jpg
//! To              /album/2022/02/img.jpg
//!
//! ```
//!
//! The header carries the join flag (`+` joinable, `-` standalone) and an
//! RFC 3339 stamp; `Info`/`NoInfo` carries the free-text label; each action
//! is a pair of lines; a blank line terminates the record. Serialization and
//! parsing round-trip exactly.

use anyhow::{Result, anyhow};
use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt::Write as _;
use std::path::PathBuf;

pub(crate) const TAG_WIDTH: usize = 16;

/// One reversible primitive inside a transaction.
///
/// Timestamp actions carry the previous and new value so they can be undone
/// without consulting the filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Move {
        from: PathBuf,
        to: PathBuf,
    },
    Copy {
        from: PathBuf,
        to: PathBuf,
    },
    SetCreated {
        path: PathBuf,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    },
    SetModified {
        path: PathBuf,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    },
}

impl Action {
    /// The two journal lines for this action, in order.
    pub(crate) fn lines(&self) -> [String; 2] {
        match self {
            Action::Move { from, to } => [
                tag_line("Move", &from.display().to_string()),
                tag_line("To", &to.display().to_string()),
            ],
            Action::Copy { from, to } => [
                tag_line("Copy", &from.display().to_string()),
                tag_line("To", &to.display().to_string()),
            ],
            Action::SetCreated { path, from, to } => [
                tag_line("Creation", &path.display().to_string()),
                tag_line("Of", &format!("{} {}", stamp(from), stamp(to))),
            ],
            Action::SetModified { path, from, to } => [
                tag_line("Modification", &path.display().to_string()),
                tag_line("Of", &format!("{} {}", stamp(from), stamp(to))),
            ],
        }
    }

    /// Parse an action from its two lines. `None` on any mismatch, so a
    /// truncated log tail degrades to a stop instead of an error.
    pub(crate) fn parse(first: &str, second: &str) -> Option<Action> {
        let (tag, payload) = split_tag(first)?;
        let (second_tag, second_payload) = split_tag(second)?;
        match (tag, second_tag) {
            ("Move", "To") => Some(Action::Move {
                from: PathBuf::from(payload),
                to: PathBuf::from(second_payload),
            }),
            ("Copy", "To") => Some(Action::Copy {
                from: PathBuf::from(payload),
                to: PathBuf::from(second_payload),
            }),
            ("Creation", "Of") => {
                let (from, to) = parse_stamp_pair(second_payload)?;
                Some(Action::SetCreated {
                    path: PathBuf::from(payload),
                    from,
                    to,
                })
            }
            ("Modification", "Of") => {
                let (from, to) = parse_stamp_pair(second_payload)?;
                Some(Action::SetModified {
                    path: PathBuf::from(payload),
                    from,
                    to,
                })
            }
            _ => None,
        }
    }

}

/// One journaled batch of reversible actions; atomic from the undo/redo
/// perspective.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub stamp: DateTime<Utc>,
    pub label: String,
    /// Merge into the preceding transaction when the log is read back.
    pub join: bool,
    pub actions: Vec<Action>,
}

impl Transaction {
    pub fn new(label: &str, join: bool) -> Self {
        Self {
            stamp: Utc::now(),
            label: label.to_string(),
            join,
            actions: Vec::new(),
        }
    }

    /// Header lines: `Transaction` and the label line.
    pub(crate) fn header_lines(&self) -> [String; 2] {
        let flag = if self.join { '+' } else { '-' };
        let header = tag_line("Transaction", &format!("{} {}", flag, stamp(&self.stamp)));
        let label = if self.label.is_empty() {
            tag_line("NoInfo", "")
        } else {
            tag_line("Info", &self.label)
        };
        [header, label]
    }

    /// Full serialized record including the blank-line terminator.
    pub(crate) fn serialize(&self) -> String {
        let mut out = String::new();
        for line in self.header_lines() {
            let _ = writeln!(out, "{}", line);
        }
        for action in &self.actions {
            for line in action.lines() {
                let _ = writeln!(out, "{}", line);
            }
        }
        out.push('\n');
        out
    }

    /// Parse the header pair. Errors here mean the log is not a journal at
    /// all; truncation inside a record is handled by the reader instead.
    pub(crate) fn parse_header(header: &str, label_line: &str) -> Result<Self> {
        let (tag, payload) = split_tag(header)
            .ok_or_else(|| anyhow!("malformed transaction header: {header:?}"))?;
        if tag != "Transaction" {
            return Err(anyhow!("expected Transaction tag, found {tag:?}"));
        }
        let (flag, stamp_text) = payload
            .split_once(' ')
            .ok_or_else(|| anyhow!("malformed transaction header payload: {payload:?}"))?;
        let join = match flag {
            "+" => true,
            "-" => false,
            other => return Err(anyhow!("unknown join flag {other:?}")),
        };
        let stamp = parse_stamp(stamp_text)
            .ok_or_else(|| anyhow!("unparseable transaction stamp {stamp_text:?}"))?;

        let (label_tag, label_payload) = split_tag(label_line)
            .ok_or_else(|| anyhow!("malformed label line: {label_line:?}"))?;
        let label = match label_tag {
            "Info" => label_payload.to_string(),
            "NoInfo" => String::new(),
            other => return Err(anyhow!("expected Info/NoInfo tag, found {other:?}")),
        };

        Ok(Self {
            stamp,
            label,
            join,
            actions: Vec::new(),
        })
    }
}

fn tag_line(tag: &str, payload: &str) -> String {
    let line = format!("{:<width$}{}", tag, payload, width = TAG_WIDTH);
    // NoInfo has an empty payload; drop the padding so the line round-trips.
    line.trim_end().to_string()
}

/// Split a line into its fixed-width tag and payload.
pub(crate) fn split_tag(line: &str) -> Option<(&str, &str)> {
    if line.len() >= TAG_WIDTH {
        let (tag, payload) = line.split_at(TAG_WIDTH);
        Some((tag.trim_end(), payload))
    } else if !line.trim().is_empty() {
        // Tag-only line shorter than the field width (e.g. bare `NoInfo`).
        Some((line.trim_end(), ""))
    } else {
        None
    }
}

fn stamp(when: &DateTime<Utc>) -> String {
    when.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn parse_stamp(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn parse_stamp_pair(payload: &str) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let (a, b) = payload.split_once(' ')?;
    Some((parse_stamp(a)?, parse_stamp(b)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn when(text: &str) -> DateTime<Utc> {
        parse_stamp(text).unwrap()
    }

    fn sample() -> Transaction {
        Transaction {
            stamp: when("2022-02-04T10:37:46Z"),
            label: "Copy".into(),
            join: false,
            actions: vec![
                Action::Move {
                    from: "/album/a.jpg".into(),
                    to: "/album/.albumsafe/trash/1a2b3c4d.jpg".into(),
                },
                Action::Copy {
                    from: "/import/a.jpg".into(),
                    to: "/album/a.jpg".into(),
                },
                Action::SetCreated {
                    path: "/album/a.jpg".into(),
                    from: when("2022-02-01T08:00:00Z"),
                    to: when("2022-02-04T10:37:46Z"),
                },
                Action::SetModified {
                    path: "/album/a.jpg".into(),
                    from: when("2022-02-01T08:00:00Z"),
                    to: when("2022-02-04T11:00:00.123456Z"),
                },
            ],
        }
    }

    #[test]
    fn tags_are_fixed_width() {
        let tx = sample();
        let text = tx.serialize();
        for line in text.lines().filter(|l| !l.is_empty()) {
            if line.len() > TAG_WIDTH {
                let tag = &line[..TAG_WIDTH];
                assert!(
                    tag.trim_end().len() <= TAG_WIDTH,
                    "tag field overflows: {line:?}"
                );
                assert!(!line[TAG_WIDTH..].starts_with(' '), "payload misaligned: {line:?}");
            }
        }
    }

    #[test]
    fn action_pairs_round_trip() {
        for action in sample().actions {
            let [a, b] = action.lines();
            assert_eq!(Action::parse(&a, &b), Some(action));
        }
    }

    #[test]
    fn header_round_trips_with_and_without_label() {
        for (label, join) in [("Copy", false), ("", true)] {
            let mut tx = sample();
            tx.label = label.into();
            tx.join = join;
            let [h, l] = tx.header_lines();
            let parsed = Transaction::parse_header(&h, &l).unwrap();
            assert_eq!(parsed.stamp, tx.stamp);
            assert_eq!(parsed.label, tx.label);
            assert_eq!(parsed.join, tx.join);
        }
    }

    #[test]
    fn mismatched_pair_is_rejected() {
        let [first, _] = Action::Move {
            from: "/a".into(),
            to: "/b".into(),
        }
        .lines();
        let [_, second] = Action::SetCreated {
            path: "/a".into(),
            from: when("2022-01-01T00:00:00Z"),
            to: when("2022-01-02T00:00:00Z"),
        }
        .lines();
        assert_eq!(Action::parse(&first, &second), None);
    }
}
