use std::fs;
use std::path::PathBuf;
use std::sync::atomic::Ordering;

use tempfile::TempDir;

use sweepr_common::device::{DeviceErrorKind, ErrorEvent};
use sweepr_core::pipeline::RunSummary;
use sweepr_core::store::csv_file::CsvRecordStore;
use sweepr_core::store::memory::MemoryRecordStore;

use super::fakes::{PortalReply, ShellReply, World, ip};

const ACTIVE: &str = "Active until 2026-01-01";

struct Output {
    _dir: TempDir,
    warranty: PathBuf,
    errors: PathBuf,
}

impl Output {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        Self {
            warranty: dir.path().join("warranty_info.csv"),
            errors: dir.path().join("errors.csv"),
            _dir: dir,
        }
    }

    fn store(&self) -> Box<CsvRecordStore> {
        Box::new(CsvRecordStore::new(&self.warranty, &self.errors))
    }

    fn warranty_csv(&self) -> String {
        fs::read_to_string(&self.warranty).unwrap()
    }

    fn errors_csv(&self) -> String {
        fs::read_to_string(&self.errors).unwrap()
    }
}

fn sorted(mut events: Vec<ErrorEvent>) -> Vec<ErrorEvent> {
    events.sort_by(|a, b| a.device_name.cmp(&b.device_name));
    events
}

fn mixed_world() -> World {
    World::new(&["host1", "ghost-pc", "pc-05"])
        .online("host1", ip(1))
        .offline("pc-05", ip(5))
        .shell("host1", ShellReply::Serial("12345678"))
        .portal("12345678", PortalReply::Text(ACTIVE))
}

#[tokio::test]
async fn happy_path_writes_exactly_one_row() {
    let out = Output::new();
    let wired = World::new(&["host1"])
        .online("host1", ip(1))
        .shell("host1", ShellReply::Serial("12345678"))
        .portal("12345678", PortalReply::Text(ACTIVE))
        .wire(4);

    let summary: RunSummary = wired.pipeline.run(out.store()).await.unwrap();

    assert_eq!(
        out.warranty_csv(),
        "device_name,ip_address,serial_number,warranty_info\n\
         host1,10.0.0.1,12345678,Active until 2026-01-01\n"
    );
    assert_eq!(out.errors_csv(), "device_name,error_type\n");
    assert_eq!(summary.recorded, 1);
    assert_eq!(summary.failures, 0);
    assert_eq!(wired.browser.opened(), 1);
    assert_eq!(wired.browser.closed(), 1);
}

#[tokio::test]
async fn unresolvable_and_offline_devices_are_recorded_once() {
    let out = Output::new();
    let wired = mixed_world().wire(4);

    let summary: RunSummary = wired.pipeline.run(out.store()).await.unwrap();

    assert_eq!(summary.entries, 3);
    assert_eq!(summary.pool, 1);
    assert_eq!(summary.failures, 2);

    let errors: String = out.errors_csv();
    assert!(errors.contains("ghost-pc,DnsResolutionFailed\n"));
    assert!(errors.contains("pc-05,Offline\n"));
    assert_eq!(errors.lines().count(), 3);
    assert!(!wired.shell.sessions.lock().unwrap().contains(&"ghost-pc".to_string()));
    assert!(!wired.shell.sessions.lock().unwrap().contains(&"pc-05".to_string()));
}

#[tokio::test]
async fn rerun_is_idempotent() {
    let out = Output::new();

    mixed_world().wire(4).pipeline.run(out.store()).await.unwrap();
    let warranty_after_first: String = out.warranty_csv();
    let errors_after_first: String = out.errors_csv();

    let second = mixed_world().wire(4);
    let summary: RunSummary = second.pipeline.run(out.store()).await.unwrap();

    assert_eq!(out.warranty_csv(), warranty_after_first);
    assert_eq!(out.errors_csv(), errors_after_first);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.recorded, 0);
    assert!(!second.probe.resolved_names().contains(&"host1".to_string()));
    assert!(second.shell.sessions.lock().unwrap().is_empty());
    assert_eq!(second.browser.opened(), 0);
}

#[tokio::test]
async fn one_lookup_timeout_does_not_sink_the_batch() {
    let store = MemoryRecordStore::new();
    let wired = World::new(&["host1", "host2"])
        .online("host1", ip(1))
        .online("host2", ip(2))
        .shell("host1", ShellReply::Serial("12345678"))
        .shell("host2", ShellReply::Serial("ABCD1234"))
        .portal("12345678", PortalReply::Text(ACTIVE))
        .portal("ABCD1234", PortalReply::Timeout)
        .wire(1);

    let summary: RunSummary = wired.pipeline.run(Box::new(store.clone())).await.unwrap();

    assert_eq!(summary.recorded, 1);
    assert_eq!(store.warranties().len(), 1);
    assert_eq!(store.warranties()[0].device_name, "host1");
    assert_eq!(
        store.errors(),
        vec![ErrorEvent::new("host2", DeviceErrorKind::WarrantyLookupTimeout)]
    );
    assert_eq!(wired.browser.opened(), 1);
    assert_eq!(wired.browser.closed(), 1);
}

#[tokio::test]
async fn portal_errors_are_lookup_failures() {
    let store = MemoryRecordStore::new();
    let wired = World::new(&["host1"])
        .online("host1", ip(1))
        .shell("host1", ShellReply::Serial("ABC1234"))
        .portal("ABC1234", PortalReply::Broken)
        .wire(2);

    wired.pipeline.run(Box::new(store.clone())).await.unwrap();

    assert!(store.warranties().is_empty());
    assert_eq!(
        store.errors(),
        vec![ErrorEvent::new("host1", DeviceErrorKind::WarrantyLookupFailed)]
    );
}

#[tokio::test]
async fn identity_failures_are_classified() {
    let store = MemoryRecordStore::new();
    let wired = World::new(&["pc-a", "pc-b", "pc-c", "pc-d"])
        .online("pc-a", ip(10))
        .online("pc-b", ip(11))
        .online("pc-c", ip(12))
        .online("pc-d", ip(13))
        .shell("pc-a", ShellReply::Status(1))
        .shell("pc-b", ShellReply::Unreachable)
        .shell("pc-c", ShellReply::Serial("ABC123"))
        .shell("pc-d", ShellReply::Bytes(vec![0xc3, 0x28, 0xa0]))
        .wire(4);

    let summary: RunSummary = wired.pipeline.run(Box::new(store.clone())).await.unwrap();

    assert_eq!(summary.pool, 4);
    assert_eq!(summary.identified, 0);
    assert_eq!(
        sorted(store.errors()),
        vec![
            ErrorEvent::new("pc-a", DeviceErrorKind::RemoteExecNonZeroExit),
            ErrorEvent::new("pc-b", DeviceErrorKind::RemoteExecFailed),
            ErrorEvent::new("pc-c", DeviceErrorKind::InvalidSerialFormat),
            ErrorEvent::new("pc-d", DeviceErrorKind::SerialDecodeFailed),
        ]
    );
    assert_eq!(wired.browser.opened(), 0);
}

#[tokio::test]
async fn directory_is_released_when_the_search_fails() {
    let wired = World::new(&["host1"]).failing_search().wire(1);

    let res = wired.pipeline.run(Box::new(MemoryRecordStore::new())).await;

    assert!(res.is_err());
    assert_eq!(wired.directory.connects.load(Ordering::SeqCst), 1);
    assert_eq!(wired.directory.disconnects.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn browser_launch_failure_is_fatal_but_releases_the_directory() {
    let store = MemoryRecordStore::new();
    let wired = World::new(&["host1"])
        .online("host1", ip(1))
        .shell("host1", ShellReply::Serial("12345678"))
        .failing_browser()
        .wire(2);

    let res = wired.pipeline.run(Box::new(store.clone())).await;

    assert!(res.is_err());
    assert!(store.warranties().is_empty());
    assert_eq!(wired.directory.disconnects.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn uninitializable_store_stops_before_the_directory() {
    let dir = TempDir::new().unwrap();
    let blocker: PathBuf = dir.path().join("not-a-dir");
    fs::write(&blocker, "").unwrap();
    let store = CsvRecordStore::new(blocker.join("warranty_info.csv"), blocker.join("errors.csv"));

    let wired = World::new(&["host1"]).wire(1);
    let res = wired.pipeline.run(Box::new(store)).await;

    assert!(res.is_err());
    assert_eq!(wired.directory.connects.load(Ordering::SeqCst), 0);
}
