//! Sorting for catalogue listings.
//!
//! Keys are named after the record fields they sort on. Sorting is stable,
//! so records with equal keys keep the order the store returned them in,
//! in both directions.

use std::cmp::Ordering;

use clap::ValueEnum;
use vigil_core::{FileRecord, ServerStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "snake_case")]
pub enum FileSortKey {
    Filename,
    Filepath,
    Size,
    LastModified,
    ScanTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "snake_case")]
pub enum ServerSortKey {
    Hostname,
    IpAddress,
    DetectedOs,
    LastScan,
    IsReachable,
    ScanTime,
    /// Green before yellow before red.
    Status,
}

fn directed(ordering: Ordering, descending: bool) -> Ordering {
    if descending {
        ordering.reverse()
    } else {
        ordering
    }
}

pub fn sort_files(files: &mut [FileRecord], key: FileSortKey, descending: bool) {
    files.sort_by(|a, b| {
        let ordering = match key {
            FileSortKey::Filename => a.filename.cmp(&b.filename),
            FileSortKey::Filepath => a.filepath.cmp(&b.filepath),
            FileSortKey::Size => a.size.cmp(&b.size),
            FileSortKey::LastModified => a.last_modified.cmp(&b.last_modified),
            FileSortKey::ScanTime => a.scan_time.cmp(&b.scan_time),
        };
        directed(ordering, descending)
    });
}

/// Sort freshness rows. Servers without an IP sort before those with one.
pub fn sort_servers(rows: &mut [ServerStatus], key: ServerSortKey, descending: bool) {
    rows.sort_by(|a, b| {
        let (x, y) = (&a.server, &b.server);
        let ordering = match key {
            ServerSortKey::Hostname => x.hostname.cmp(&y.hostname),
            ServerSortKey::IpAddress => x.ip_address.cmp(&y.ip_address),
            ServerSortKey::DetectedOs => x.detected_os.cmp(&y.detected_os),
            ServerSortKey::LastScan => x.last_scan.cmp(&y.last_scan),
            ServerSortKey::IsReachable => x.is_reachable.cmp(&y.is_reachable),
            ServerSortKey::ScanTime => x.scan_time.cmp(&y.scan_time),
            ServerSortKey::Status => a.status.cmp(&b.status),
        };
        directed(ordering, descending)
    });
}
