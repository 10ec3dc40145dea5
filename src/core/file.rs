//! Attachment storage - Downloaded files on disk and their database records.
//!
//! Files are downloaded while the order is being drafted, recorded together
//! with the order, and purged from disk once the order reaches a terminal
//! state. Purging stamps `purged_at` so the bytes are removed exactly once
//! while the rows stay as part of the audit trail.

use crate::{
    core::chat::{ChatClient, IncomingAttachment},
    entities::{File, MediaKind, file},
    errors::Result,
};
use chrono::Utc;
use sea_orm::{QueryOrder, Set, prelude::*, sea_query::Expr};
use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::atomic::{AtomicU64, Ordering},
};
use tracing::{debug, info, warn};

/// Longest stored filename component, in characters.
const MAX_NAME_CHARS: usize = 80;

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// A downloaded attachment that is not attached to an order yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub path: PathBuf,
    pub filename: String,
    pub kind: MediaKind,
}

/// Replaces anything outside `[A-Za-z0-9._-]` so the name is safe on disk.
#[must_use]
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .take(MAX_NAME_CHARS)
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "attachment".to_string()
    } else {
        cleaned.to_string()
    }
}

/// A fresh, unique location for an attachment inside `dir`.
#[must_use]
pub fn storage_path(dir: &Path, filename: &str) -> PathBuf {
    let sequence = SEQUENCE.fetch_add(1, Ordering::Relaxed);
    dir.join(format!(
        "{}_{}_{}",
        Utc::now().timestamp_millis(),
        sequence,
        sanitize_filename(filename)
    ))
}

/// Downloads every attachment into `dir`.
///
/// On failure the files downloaded so far are removed again.
pub async fn download_all(
    chat: &dyn ChatClient,
    dir: &Path,
    attachments: &[IncomingAttachment],
) -> Result<Vec<StoredFile>> {
    tokio::fs::create_dir_all(dir).await?;
    let mut stored = Vec::with_capacity(attachments.len());
    for attachment in attachments {
        match chat.download_attachment(attachment, dir).await {
            Ok(path) => stored.push(StoredFile {
                path,
                filename: attachment.filename.clone(),
                kind: attachment.kind,
            }),
            Err(e) => {
                warn!(filename = %attachment.filename, error = %e, "Attachment download failed");
                discard(&stored).await;
                return Err(e);
            }
        }
    }
    debug!(count = stored.len(), "Attachments downloaded");
    Ok(stored)
}

/// Removes downloaded files that never made it into an order.
pub async fn discard(stored: &[StoredFile]) {
    for file in stored {
        remove_from_disk(&file.path).await;
    }
}

/// Records downloaded files as belonging to an order.
pub async fn record_files<C>(
    db: &C,
    order_id: i64,
    stored: &[StoredFile],
) -> Result<Vec<file::Model>>
where
    C: ConnectionTrait,
{
    let now = Utc::now();
    let mut saved = Vec::with_capacity(stored.len());
    for item in stored {
        let model = file::ActiveModel {
            path: Set(item.path.to_string_lossy().into_owned()),
            filename: Set(item.filename.clone()),
            media_kind: Set(item.kind),
            order_id: Set(order_id),
            created_at: Set(now),
            purged_at: Set(None),
            ..Default::default()
        }
        .insert(db)
        .await?;
        saved.push(model);
    }
    Ok(saved)
}

/// Files of an order in upload order.
pub async fn files_for_order<C>(db: &C, order_id: i64) -> Result<Vec<file::Model>>
where
    C: ConnectionTrait,
{
    File::find()
        .filter(file::Column::OrderId.eq(order_id))
        .order_by_asc(file::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Removes the stored bytes of an order's files and stamps `purged_at`.
///
/// Files already purged are skipped, so calling this twice is harmless. A file
/// that is already missing on disk counts as purged; any other removal failure
/// is logged and leaves the row unstamped. Returns how many rows were stamped.
pub async fn purge_order_files<C>(db: &C, order_id: i64) -> Result<usize>
where
    C: ConnectionTrait,
{
    let pending = File::find()
        .filter(file::Column::OrderId.eq(order_id))
        .filter(file::Column::PurgedAt.is_null())
        .all(db)
        .await?;

    let mut purged = 0;
    for record in pending {
        match tokio::fs::remove_file(&record.path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %record.path, "Stored file already gone");
            }
            Err(e) => {
                warn!(path = %record.path, error = %e, "Failed to remove stored file");
                continue;
            }
        }
        let result = File::update_many()
            .col_expr(file::Column::PurgedAt, Expr::value(Utc::now()))
            .filter(file::Column::Id.eq(record.id))
            .filter(file::Column::PurgedAt.is_null())
            .exec(db)
            .await?;
        purged += usize::try_from(result.rows_affected).unwrap_or_default();
    }
    info!(order_id, purged, "Purged order attachments");
    Ok(purged)
}

async fn remove_from_disk(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "Failed to remove file");
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::entities::Role;
    use crate::test_utils::{
        RecordingChat, create_test_order, create_test_user, setup_test_db, test_attachment,
    };

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("invoice 2024.pdf"), "invoice_2024.pdf");
        assert_eq!(sanitize_filename("../../etc/passwd"), "_.._etc_passwd");
        assert_eq!(sanitize_filename("..."), "attachment");
        assert_eq!(sanitize_filename("счёт.pdf"), "____.pdf");
        assert_eq!(sanitize_filename(&"a".repeat(200)).len(), MAX_NAME_CHARS);
    }

    #[test]
    fn test_storage_paths_are_unique() {
        let dir = Path::new("/tmp/files");
        let first = storage_path(dir, "a.png");
        let second = storage_path(dir, "a.png");
        assert_ne!(first, second);
        assert!(first.starts_with(dir));
        assert!(first.to_string_lossy().ends_with("_a.png"));
    }

    #[tokio::test]
    async fn test_download_record_and_purge_once() -> Result<()> {
        let db = setup_test_db().await?;
        let storage = tempfile::tempdir()?;
        let chat = RecordingChat::new();
        let user = create_test_user(&db, "sam", &[Role::Initiator]).await?;
        let order = create_test_order(&db, user.id, 1, 1).await?;

        let stored = download_all(
            &chat,
            storage.path(),
            &[test_attachment("a.png"), test_attachment("b.pdf")],
        )
        .await?;
        assert!(stored.iter().all(|f| f.path.exists()));

        let records = record_files(&db, order.id, &stored).await?;
        assert_eq!(records.len(), 2);

        assert_eq!(purge_order_files(&db, order.id).await?, 2);
        assert!(stored.iter().all(|f| !f.path.exists()));
        // Second purge finds nothing left to do
        assert_eq!(purge_order_files(&db, order.id).await?, 0);

        let rows = files_for_order(&db, order.id).await?;
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|f| f.purged_at.is_some()));
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_file_counts_as_purged() -> Result<()> {
        let db = setup_test_db().await?;
        let storage = tempfile::tempdir()?;
        let user = create_test_user(&db, "tina", &[Role::Initiator]).await?;
        let order = create_test_order(&db, user.id, 1, 1).await?;
        let ghost = StoredFile {
            path: storage.path().join("never-written.bin"),
            filename: "never-written.bin".to_string(),
            kind: MediaKind::Document,
        };
        record_files(&db, order.id, &[ghost]).await?;

        assert_eq!(purge_order_files(&db, order.id).await?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_download_discards_partial_batch() -> Result<()> {
        let storage = tempfile::tempdir()?;
        let chat = RecordingChat::new();
        chat.fail_downloads_after(1);

        let result = download_all(
            &chat,
            storage.path(),
            &[test_attachment("a.png"), test_attachment("b.png")],
        )
        .await;
        assert!(result.is_err());
        assert_eq!(std::fs::read_dir(storage.path())?.count(), 0);
        Ok(())
    }
}
