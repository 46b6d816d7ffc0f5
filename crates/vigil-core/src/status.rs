//! Backup freshness classification.
//!
//! A file belongs to a server when its lowercased filename contains the
//! server's lowercased hostname or IP address as a substring. The newest
//! matching file decides the status. Substring matching can collide (a
//! server named `db` matches `db2-backup.tar`); the rule is kept as-is
//! because existing backup naming conventions depend on it.

use chrono::{DateTime, Utc};

use crate::types::{BackupStatus, FileRecord, ServerRecord, ServerStatus};

/// Backups at most this many whole days old are `Green`.
pub const FRESHNESS_THRESHOLD_DAYS: i64 = 365;

/// Lowercased identifiers a backup filename may contain for this server.
fn server_identifiers(server: &ServerRecord) -> Vec<String> {
    std::iter::once(server.hostname.as_str())
        .chain(server.ip_address.as_deref())
        .filter(|id| !id.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Find the newest file whose name contains one of the server's identifiers.
///
/// Ties on `last_modified` keep the file encountered first in `files`.
pub fn newest_matching_backup<'a>(
    server: &ServerRecord,
    files: &'a [FileRecord],
) -> Option<&'a FileRecord> {
    let identifiers = server_identifiers(server);

    files
        .iter()
        .filter(|file| {
            let name = file.filename.to_lowercase();
            identifiers.iter().any(|id| name.contains(id.as_str()))
        })
        .fold(None::<&'a FileRecord>, |newest, file| match newest {
            Some(current) if file.last_modified <= current.last_modified => Some(current),
            _ => Some(file),
        })
}

/// Classify a server's backup health against the file catalogue.
pub fn classify(server: &ServerRecord, files: &[FileRecord], now: DateTime<Utc>) -> BackupStatus {
    status_for_backup(newest_matching_backup(server, files), now)
}

/// Classify every server in one pass over the same file set.
pub fn classify_all(
    servers: &[ServerRecord],
    files: &[FileRecord],
    now: DateTime<Utc>,
) -> Vec<ServerStatus> {
    servers
        .iter()
        .map(|server| {
            let latest = newest_matching_backup(server, files);
            ServerStatus {
                server: server.clone(),
                status: status_for_backup(latest, now),
                latest_backup: latest.cloned(),
            }
        })
        .collect()
}

/// Status implied by a server's newest matching backup, if it has one.
fn status_for_backup(latest: Option<&FileRecord>, now: DateTime<Utc>) -> BackupStatus {
    let Some(file) = latest else {
        return BackupStatus::Red;
    };
    // num_days truncates toward zero, i.e. floor for non-negative ages.
    let age_days = (now - file.last_modified).num_days();
    if age_days <= FRESHNESS_THRESHOLD_DAYS {
        BackupStatus::Green
    } else {
        BackupStatus::Yellow
    }
}
