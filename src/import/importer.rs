//! Importer strategies: copy, move, delete.
//!
//! Each run opens one journal transaction labeled with the operation,
//! resolves duplicates per item, performs the physical operation through the
//! decorated provider, and stamps the destination's timestamps from the
//! descriptor. A single item's I/O failure is collected and the batch
//! continues; the transaction is always closed before returning, even when
//! nothing succeeded.

use anyhow::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::resolver::DuplicateResolver;
use crate::storage::{StorageProvider, TransferOptions};

use super::report::{ImportReport, ItemOutcome, ItemStatus};
use super::{ImportItem, ImportList};

/// A strategy consuming a planned list inside one journal transaction.
pub trait Importer {
    /// Transaction label and log name for this operation.
    fn label(&self) -> &'static str;

    /// Process a single non-cancelled item. Errors are collected by `run`,
    /// never propagated past it.
    fn import_one(
        &self,
        storage: &mut dyn StorageProvider,
        resolver: &dyn DuplicateResolver,
        item: ImportItem,
    ) -> Result<ItemOutcome>;

    /// Run the whole batch. Setup and journal-consistency failures (opening
    /// or closing the transaction) propagate; per-item failures do not.
    fn run(
        &self,
        storage: &mut dyn StorageProvider,
        resolver: &dyn DuplicateResolver,
        list: ImportList,
    ) -> Result<ImportReport> {
        storage.new_transaction(self.label(), false)?;
        let mut report = ImportReport::default();

        for item in list.into_items() {
            if item.cancelled {
                report.push(ItemOutcome::new(
                    ItemStatus::CancelledFiltered,
                    item.source,
                    None,
                    "",
                ));
                continue;
            }
            let source = item.source.clone();
            match self.import_one(storage, resolver, item) {
                Ok(outcome) => report.push(outcome),
                Err(e) => {
                    error!(op = self.label(), source = %source.display(), error = %e, "item failed; batch continues");
                    report.push(ItemOutcome::failed(source, &e));
                }
            }
        }

        storage.end_transaction()?;
        info!(op = self.label(), summary = %report.summary(), "batch finished");
        Ok(report)
    }
}

#[derive(Debug, Clone, Copy)]
enum TransferKind {
    Copy,
    Move,
}

/// Shared copy/move flow: resolve a conflicting destination, transfer, then
/// stamp creation time from the descriptor and modification time with "now".
fn transfer_one(
    kind: TransferKind,
    storage: &mut dyn StorageProvider,
    resolver: &dyn DuplicateResolver,
    mut item: ImportItem,
) -> Result<ItemOutcome> {
    let planned = item.destination.clone();
    if storage.file_exists(&item.destination) {
        item = resolver.resolve(&*storage, item)?;
        if item.cancelled {
            let status = if item.duplicate {
                ItemStatus::CancelledDuplicate
            } else {
                ItemStatus::CancelledFiltered
            };
            return Ok(ItemOutcome::new(status, item.source, Some(planned), ""));
        }
    }
    let renamed = item.destination != planned;

    let opts = TransferOptions {
        create_dirs: true,
        overwrite: item.overwrite,
    };
    match kind {
        TransferKind::Copy => storage.copy_file(&item.source, &item.destination, opts)?,
        TransferKind::Move => storage.move_file(&item.source, &item.destination, opts)?,
    }
    storage.set_created(&item.destination, item.descriptor.suitable_timestamp())?;
    storage.set_modified(&item.destination, Utc::now())?;

    let status = if renamed {
        ItemStatus::Renamed
    } else {
        match kind {
            TransferKind::Copy => ItemStatus::Copied,
            TransferKind::Move => ItemStatus::Moved,
        }
    };
    Ok(ItemOutcome::new(
        status,
        item.source,
        Some(item.destination),
        "",
    ))
}

/// Copies every planned item into the album.
#[derive(Debug, Default, Clone, Copy)]
pub struct CopyImporter;

impl Importer for CopyImporter {
    fn label(&self) -> &'static str {
        "Copy"
    }

    fn import_one(
        &self,
        storage: &mut dyn StorageProvider,
        resolver: &dyn DuplicateResolver,
        item: ImportItem,
    ) -> Result<ItemOutcome> {
        transfer_one(TransferKind::Copy, storage, resolver, item)
    }
}

/// Moves every planned item into the album, removing the source.
#[derive(Debug, Default, Clone, Copy)]
pub struct MoveImporter;

impl Importer for MoveImporter {
    fn label(&self) -> &'static str {
        "Move"
    }

    fn import_one(
        &self,
        storage: &mut dyn StorageProvider,
        resolver: &dyn DuplicateResolver,
        item: ImportItem,
    ) -> Result<ItemOutcome> {
        transfer_one(TransferKind::Move, storage, resolver, item)
    }
}

/// Duplicate-awareness of the delete importer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteMode {
    /// Delete every non-cancelled item regardless of content.
    #[default]
    Everything,
    /// Delete an item only when a content-checking resolver confirms its
    /// counterpart holds the same bytes (pruning a backup mirror).
    ConfirmedDuplicatesOnly,
}

/// Deletes planned items; under the journal every deletion is a recoverable
/// move into the trash.
#[derive(Debug, Default, Clone, Copy)]
pub struct DeleteImporter {
    pub mode: DeleteMode,
}

impl DeleteImporter {
    pub fn new(mode: DeleteMode) -> Self {
        Self { mode }
    }
}

impl Importer for DeleteImporter {
    fn label(&self) -> &'static str {
        "Delete"
    }

    fn import_one(
        &self,
        storage: &mut dyn StorageProvider,
        resolver: &dyn DuplicateResolver,
        item: ImportItem,
    ) -> Result<ItemOutcome> {
        match self.mode {
            DeleteMode::Everything => {
                // No resolver consultation: the user asked for deletion.
                storage.delete_file(&item.source)?;
                Ok(ItemOutcome::new(
                    ItemStatus::Deleted,
                    item.source,
                    None,
                    "",
                ))
            }
            DeleteMode::ConfirmedDuplicatesOnly => {
                if !storage.file_exists(&item.destination) {
                    return Ok(ItemOutcome::new(
                        ItemStatus::Skipped,
                        item.source,
                        Some(item.destination),
                        "no counterpart to compare against",
                    ));
                }
                let planned = item.destination.clone();
                let resolved = resolver.resolve(&*storage, item)?;

                if resolved.cancelled && resolved.duplicate {
                    storage.delete_file(&resolved.source)?;
                    return Ok(ItemOutcome::new(
                        ItemStatus::Deleted,
                        resolved.source,
                        Some(planned),
                        "content matched",
                    ));
                }
                if resolved.overwrite || resolved.destination != planned {
                    // Incorrect behaviour: a rename/overwrite outcome means
                    // the file is not a confirmed duplicate.
                    warn!(
                        source = %resolved.source.display(),
                        "incorrect behaviour: resolver offered rename/overwrite during duplicate-checked delete; skipping"
                    );
                    return Ok(ItemOutcome::new(
                        ItemStatus::Skipped,
                        resolved.source,
                        Some(planned),
                        "not a confirmed duplicate",
                    ));
                }
                Ok(ItemOutcome::new(
                    ItemStatus::Skipped,
                    resolved.source,
                    Some(planned),
                    "content differs",
                ))
            }
        }
    }
}

