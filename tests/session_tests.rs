// Session tests for pkgtidy
//
// Concurrent acquisition, incremental events and the uninstall round trip,
// all through the single-writer Session.

mod common;

use common::{config_in, failed, ok, FakeSystem, SNAP_LIST};
use pkgtidy::error::{PkgTidyError, Result};
use pkgtidy::session::unlisted_message;
use pkgtidy::{
    AptBackend, CommandRunner, PackageBackend, PackageRecord, PackageSource, Session,
    SessionEvent, SnapBackend, ToolPaths, UninstallExecutor,
};
use std::path::PathBuf;
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;
use tempfile::tempdir;

/// Backend returning a fixed result, optionally waiting for a go signal
struct Scripted {
    source: PackageSource,
    result: std::result::Result<Vec<PackageRecord>, String>,
    gate: Option<Mutex<mpsc::Receiver<()>>>,
}

impl Scripted {
    fn ok(source: PackageSource, records: Vec<PackageRecord>) -> Self {
        Self {
            source,
            result: Ok(records),
            gate: None,
        }
    }

    fn failing(source: PackageSource, reason: &str) -> Self {
        Self {
            source,
            result: Err(reason.to_string()),
            gate: None,
        }
    }

    fn gated(mut self, gate: mpsc::Receiver<()>) -> Self {
        self.gate = Some(Mutex::new(gate));
        self
    }
}

impl PackageBackend for Scripted {
    fn source(&self) -> PackageSource {
        self.source
    }
    fn is_available(&self) -> bool {
        true
    }
    fn list_packages(&self) -> Result<Vec<PackageRecord>> {
        if let Some(gate) = &self.gate {
            let _ = gate.lock().unwrap().recv();
        }
        self.result
            .clone()
            .map_err(|reason| PkgTidyError::query("scripted", reason))
    }
    fn find_icon(&self, _name: &str) -> Option<PathBuf> {
        None
    }
}

fn uninstaller(system: &Arc<FakeSystem>) -> UninstallExecutor {
    UninstallExecutor::new(
        ToolPaths::default(),
        Arc::clone(system) as Arc<dyn CommandRunner>,
    )
}

fn apt_records() -> Vec<PackageRecord> {
    vec![
        PackageRecord::apt("git", "2.43.0", "VCS", None),
        PackageRecord::apt("vlc", "3.0.20", "media player", None),
    ]
}

fn snap_records() -> Vec<PackageRecord> {
    vec![PackageRecord::snap("spotify", "1.2.26", "spotify✓", None)]
}

#[test]
fn test_each_backend_reports_once_and_merges() {
    let system = Arc::new(FakeSystem::new());
    let mut session = Session::new(
        vec![
            Arc::new(Scripted::ok(PackageSource::Apt, apt_records())),
            Arc::new(Scripted::ok(PackageSource::Snap, snap_records())),
        ],
        uninstaller(&system),
    );

    session.start_acquisition();
    assert!(!session.is_idle());

    let mut seen = Vec::new();
    session.run_until_idle(|event, _| match event {
        SessionEvent::PackagesLoaded { source, .. } => seen.push(*source),
        other => panic!("unexpected event {:?}", other),
    });
    seen.sort();

    assert_eq!(seen, vec![PackageSource::Apt, PackageSource::Snap]);
    assert!(session.is_idle());
    let counts = session.inventory().counts();
    assert_eq!((counts.all, counts.apt, counts.snap), (3, 2, 1));
}

#[test]
fn test_first_backend_visible_before_second_finishes() {
    let (release, gate) = mpsc::channel();
    let system = Arc::new(FakeSystem::new());
    let mut session = Session::new(
        vec![
            Arc::new(Scripted::ok(PackageSource::Apt, apt_records()).gated(gate)),
            Arc::new(Scripted::ok(PackageSource::Snap, snap_records())),
        ],
        uninstaller(&system),
    );
    session.start_acquisition();

    let first = session.next_event(Some(Duration::from_secs(10))).unwrap();
    assert!(matches!(
        first,
        SessionEvent::PackagesLoaded {
            source: PackageSource::Snap,
            ..
        }
    ));
    assert_eq!(session.inventory().len(), 1);
    assert!(!session.is_idle());

    release.send(()).unwrap();
    let second = session.next_event(Some(Duration::from_secs(10))).unwrap();
    assert!(matches!(
        second,
        SessionEvent::PackagesLoaded {
            source: PackageSource::Apt,
            ..
        }
    ));
    assert_eq!(session.inventory().len(), 3);
    assert!(session.next_event(Some(Duration::from_millis(10))).is_none());
}

#[test]
fn test_failing_backend_does_not_block_the_other() {
    let system = Arc::new(FakeSystem::new());
    let mut session = Session::new(
        vec![
            Arc::new(Scripted::failing(PackageSource::Apt, "exit status 2")),
            Arc::new(Scripted::ok(PackageSource::Snap, snap_records())),
        ],
        uninstaller(&system),
    );
    session.start_acquisition();

    let mut failures = Vec::new();
    session.run_until_idle(|event, _| {
        if let SessionEvent::AcquisitionFailed { source, reason } = event {
            failures.push((*source, reason.clone()));
        }
    });

    assert_eq!(
        failures,
        vec![(
            PackageSource::Apt,
            "Query `scripted` failed: exit status 2".to_string()
        )]
    );
    assert_eq!(session.inventory().len(), 1);
    assert!(session.inventory().get(PackageSource::Snap, "spotify").is_some());
}

#[test]
fn test_successful_uninstall_removes_record() {
    let system = Arc::new(FakeSystem::new().with_removal(ok("")));
    let mut session = Session::new(
        vec![
            Arc::new(Scripted::ok(PackageSource::Apt, apt_records())),
            Arc::new(Scripted::ok(PackageSource::Snap, snap_records())),
        ],
        uninstaller(&system),
    );
    session.start_acquisition();
    session.run_until_idle(|_, _| {});

    session.start_uninstall("vlc", PackageSource::Apt);
    let event = session.next_event(None).unwrap();
    assert_eq!(
        event,
        SessionEvent::UninstallCompleted {
            name: "vlc".to_string(),
            source: PackageSource::Apt,
            success: true,
            message: "Successfully uninstalled vlc".to_string(),
        }
    );
    assert!(session.inventory().get(PackageSource::Apt, "vlc").is_none());
    assert_eq!(session.inventory().len(), 2);
}

#[test]
fn test_failed_uninstall_keeps_record() {
    let system = Arc::new(
        FakeSystem::new().with_removal(failed(100, "E: Unable to locate package")),
    );
    let mut session = Session::new(
        vec![Arc::new(Scripted::ok(PackageSource::Snap, snap_records()))],
        uninstaller(&system),
    );
    session.start_acquisition();
    session.run_until_idle(|_, _| {});

    session.start_uninstall("spotify", PackageSource::Snap);
    match session.next_event(None).unwrap() {
        SessionEvent::UninstallCompleted {
            success, message, ..
        } => {
            assert!(!success);
            assert_eq!(message, "E: Unable to locate package");
        }
        other => panic!("unexpected event {:?}", other),
    }
    assert!(session.inventory().get(PackageSource::Snap, "spotify").is_some());
}

#[test]
fn test_uninstall_removes_only_matching_source() {
    let system = Arc::new(FakeSystem::new().with_removal(ok("")));
    let mut session = Session::new(
        vec![
            Arc::new(Scripted::ok(
                PackageSource::Apt,
                vec![PackageRecord::apt("vlc", "3.0.20", "media player", None)],
            )),
            Arc::new(Scripted::ok(
                PackageSource::Snap,
                vec![PackageRecord::snap("vlc", "3.0.20", "videolan✓", None)],
            )),
        ],
        uninstaller(&system),
    );
    session.start_acquisition();
    session.run_until_idle(|_, _| {});

    session.start_uninstall("vlc", PackageSource::Snap);
    session.run_until_idle(|_, _| {});
    assert!(session.inventory().get(PackageSource::Apt, "vlc").is_some());
    assert!(session.inventory().get(PackageSource::Snap, "vlc").is_none());
}

#[test]
fn test_unlisted_package_is_refused_without_spawning() {
    let system = Arc::new(FakeSystem::new().with_removal(ok("")));
    let mut session = Session::new(
        vec![Arc::new(Scripted::ok(PackageSource::Apt, apt_records()))],
        uninstaller(&system),
    );
    session.start_acquisition();
    session.run_until_idle(|_, _| {});

    session.start_uninstall("libc6", PackageSource::Apt);
    assert_eq!(
        session.next_event(None).unwrap(),
        SessionEvent::UninstallCompleted {
            name: "libc6".to_string(),
            source: PackageSource::Apt,
            success: false,
            message: unlisted_message("libc6", PackageSource::Apt),
        }
    );
    assert!(!system.ran("pkexec"));
    assert!(session.is_idle());
    assert_eq!(session.inventory().len(), 2);
}

#[test]
fn test_empty_session_refuses_any_removal() {
    let system = Arc::new(FakeSystem::new().with_removal(ok("")));
    let mut session = Session::new(Vec::new(), uninstaller(&system));

    session.start_uninstall("vlc", PackageSource::Snap);
    session.run_until_idle(|event, _| {
        assert!(matches!(
            event,
            SessionEvent::UninstallCompleted { success: false, .. }
        ));
    });
    assert!(system.calls().is_empty());
}

#[test]
fn test_forced_removal_skips_working_set_check() {
    let system = Arc::new(FakeSystem::new().with_removal(ok("")));
    let mut session = Session::new(Vec::new(), uninstaller(&system));

    session.force_uninstall("libc6", PackageSource::Apt);
    match session.next_event(None).unwrap() {
        SessionEvent::UninstallCompleted { success, .. } => assert!(success),
        other => panic!("unexpected event {:?}", other),
    }
    assert_eq!(
        system.calls(),
        vec![vec!["pkexec", "apt-get", "remove", "--purge", "-y", "libc6"]]
    );
}

#[test]
fn test_idle_session_returns_no_event() {
    let system = Arc::new(FakeSystem::new());
    let mut session = Session::new(Vec::new(), uninstaller(&system));
    assert!(session.is_idle());
    assert!(session.next_event(None).is_none());
}

#[test]
fn test_real_backends_over_scripted_tools() {
    let dir = tempdir().unwrap();
    let mut config = config_in(&dir);
    config.classification.whitelist_names.insert("git".to_string());

    let system = Arc::new(
        FakeSystem::new()
            .with_manual(&["git", "libfoo"])
            .with_details(&[("git", "1:2.43.0", "revision control")])
            .with_snap_list(SNAP_LIST),
    );
    let runner = Arc::clone(&system) as Arc<dyn CommandRunner>;
    let backends: Vec<Arc<dyn PackageBackend>> = vec![
        Arc::new(AptBackend::new(&config, Arc::clone(&runner))),
        Arc::new(SnapBackend::new(&config, runner)),
    ];
    let mut session = Session::new(backends, uninstaller(&system));
    session.start_acquisition();
    session.run_until_idle(|_, _| {});

    let names: Vec<String> = session
        .inventory()
        .records()
        .map(|r| format!("{}:{}", r.source(), r.name()))
        .collect();
    assert_eq!(names, vec!["APT:git", "Snap:firefox", "Snap:spotify"]);
}
