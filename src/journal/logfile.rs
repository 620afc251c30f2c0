//! Append-only journal log files.
//!
//! Two physical files share this format: the undo log and the redo log.
//! Writing is incremental (eager header, flush per action) so a crash leaves
//! at worst a truncated final record; reading treats such a tail as a hard
//! stop: keep what parsed, drop the rest. Rewrites (dropping the last
//! transaction after undo/redo) go through a temp file and an atomic rename.

use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::record::{Action, Transaction};

/// Owned line cursor with peek/advance, so record parsing never borrows the
/// underlying reader.
struct Cursor {
    lines: Vec<String>,
    pos: usize,
}

impl Cursor {
    fn new(text: &str) -> Self {
        Self {
            lines: text.lines().map(str::to_string).collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<&str> {
        self.lines.get(self.pos).map(String::as_str)
    }

    fn advance(&mut self) -> Option<&str> {
        let line = self.lines.get(self.pos)?;
        self.pos += 1;
        Some(line)
    }
}

/// Read every complete transaction from `path`, merging joinable
/// transactions into their predecessor.
///
/// A missing file is an empty log. An unterminated or malformed final record
/// ends parsing quietly; everything before it is kept.
pub(crate) fn read_log(path: &Path) -> Result<Vec<Transaction>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let text = fs::read_to_string(path).with_context(|| format!("read log {}", path.display()))?;
    let mut cursor = Cursor::new(&text);
    let mut transactions: Vec<Transaction> = Vec::new();

    while let Some(header) = cursor.advance() {
        if header.trim().is_empty() {
            continue;
        }
        let header = header.to_string();
        let Some(label_line) = cursor.advance().map(str::to_string) else {
            warn!(log = %path.display(), "log ends inside a transaction header; dropping the tail");
            break;
        };
        let mut tx = match Transaction::parse_header(&header, &label_line) {
            Ok(tx) => tx,
            Err(e) => {
                warn!(log = %path.display(), error = %e, "unparseable transaction record; dropping the tail");
                break;
            }
        };

        let mut terminated = false;
        while let Some(line) = cursor.peek() {
            if line.trim().is_empty() {
                cursor.advance();
                terminated = true;
                break;
            }
            let Some(first) = cursor.advance().map(str::to_string) else {
                break;
            };
            let Some(second) = cursor.advance().map(str::to_string) else {
                break;
            };
            match Action::parse(&first, &second) {
                Some(action) => tx.actions.push(action),
                None => {
                    warn!(log = %path.display(), line = %first, "unparseable action pair; dropping the tail");
                    break;
                }
            }
        }
        if !terminated {
            // Crash between header and terminator: the record never became
            // durable, so it does not participate in undo/redo.
            warn!(log = %path.display(), label = %tx.label, "unterminated final transaction ignored");
            break;
        }

        if tx.join
            && let Some(prev) = transactions.last_mut()
        {
            prev.actions.append(&mut tx.actions);
        } else {
            transactions.push(tx);
        }
    }

    debug!(log = %path.display(), transactions = transactions.len(), "read journal log");
    Ok(transactions)
}

/// Rewrite a log wholesale (read-all/truncate/write-all): temp sibling,
/// fsync, atomic rename.
pub(crate) fn rewrite_log(path: &Path, transactions: &[Transaction]) -> Result<()> {
    let tmp = path.with_extension("rewrite.tmp");
    {
        let mut out = BufWriter::new(
            File::create(&tmp).with_context(|| format!("create {}", tmp.display()))?,
        );
        for tx in transactions {
            out.write_all(tx.serialize().as_bytes())
                .with_context(|| format!("write {}", tmp.display()))?;
        }
        let file = out
            .into_inner()
            .with_context(|| format!("flush {}", tmp.display()))?;
        file.sync_all()
            .with_context(|| format!("sync {}", tmp.display()))?;
    }
    fs::rename(&tmp, path)
        .with_context(|| format!("rename {} -> {}", tmp.display(), path.display()))?;
    debug!(log = %path.display(), transactions = transactions.len(), "rewrote journal log");
    Ok(())
}

/// Incremental writer for the currently open transaction.
///
/// The header goes out eagerly on open; each action is flushed as soon as it
/// has been applied (record-after-success); `finish` appends the blank-line
/// terminator that makes the record durable.
pub(crate) struct LogWriter {
    path: PathBuf,
    out: BufWriter<File>,
}

impl LogWriter {
    pub(crate) fn open(path: &Path, tx: &Transaction) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("open log {} for append", path.display()))?;
        let mut writer = Self {
            path: path.to_path_buf(),
            out: BufWriter::new(file),
        };
        for line in tx.header_lines() {
            writeln!(writer.out, "{line}")
                .with_context(|| format!("write header to {}", writer.path.display()))?;
        }
        writer.out.flush()?;
        Ok(writer)
    }

    pub(crate) fn action(&mut self, action: &Action) -> Result<()> {
        for line in action.lines() {
            writeln!(self.out, "{line}")
                .with_context(|| format!("append action to {}", self.path.display()))?;
        }
        self.out.flush()?;
        Ok(())
    }

    pub(crate) fn finish(mut self) -> Result<()> {
        writeln!(self.out).with_context(|| format!("terminate {}", self.path.display()))?;
        self.out.flush()?;
        self.out
            .get_ref()
            .sync_all()
            .with_context(|| format!("sync {}", self.path.display()))?;
        Ok(())
    }
}
