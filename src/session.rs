//! Orchestrator owning the package working set.
//!
//! A [`Session`] starts acquisition and uninstall workers, then consumes
//! their [`SessionEvent`]s one at a time. Applying an event to the
//! [`Inventory`] happens only here, on the caller's thread, so workers never
//! share mutable state. Presentation code drives the loop with
//! [`Session::next_event`] and re-renders after each event.

use crate::acquisition::{panic_message, spawn_acquisition};
use crate::apt::AptBackend;
use crate::backend::PackageBackend;
use crate::command_runner::{CommandRunner, SystemRunner};
use crate::config::AppConfig;
use crate::inventory::Inventory;
use crate::snap::SnapBackend;
use crate::types::{PackageRecord, PackageSource};
use crate::uninstall::{UninstallExecutor, UninstallOutcome};
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Notifications delivered to the presentation layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// One backend finished; sent once per backend
    PackagesLoaded {
        source: PackageSource,
        packages: Vec<PackageRecord>,
    },
    /// One backend could not produce a list
    AcquisitionFailed { source: PackageSource, reason: String },
    /// A removal finished, successfully or not
    UninstallCompleted {
        name: String,
        source: PackageSource,
        success: bool,
        message: String,
    },
}

/// Failure message for a removal request naming a package outside the
/// working set
pub fn unlisted_message(name: &str, source: PackageSource) -> String {
    format!(
        "{} ({}) is not in the list of user-installed packages; refusing to remove it",
        name, source
    )
}

pub struct Session {
    inventory: Inventory,
    backends: Vec<Arc<dyn PackageBackend>>,
    uninstaller: Arc<UninstallExecutor>,
    events_tx: Sender<SessionEvent>,
    events_rx: Receiver<SessionEvent>,
    /// Workers whose event has not been consumed yet
    in_flight: usize,
    workers: Vec<JoinHandle<()>>,
}

impl Session {
    pub fn new(backends: Vec<Arc<dyn PackageBackend>>, uninstaller: UninstallExecutor) -> Self {
        let (events_tx, events_rx) = mpsc::channel();
        Self {
            inventory: Inventory::new(),
            backends,
            uninstaller: Arc::new(uninstaller),
            events_tx,
            events_rx,
            in_flight: 0,
            workers: Vec::new(),
        }
    }

    /// Session wired to the real APT and Snap tools
    pub fn from_config(config: &AppConfig, dry_run: bool) -> Self {
        let queries: Arc<dyn CommandRunner> =
            Arc::new(SystemRunner::queries(config.query_timeout()));
        let privileged: Arc<dyn CommandRunner> =
            Arc::new(SystemRunner::privileged(config.uninstall_timeout()));

        let backends: Vec<Arc<dyn PackageBackend>> = vec![
            Arc::new(AptBackend::new(config, Arc::clone(&queries))),
            Arc::new(SnapBackend::new(config, queries)),
        ];
        let uninstaller =
            UninstallExecutor::new(config.tools.clone(), privileged).with_dry_run(dry_run);

        Self::new(backends, uninstaller)
    }

    pub fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    /// True when no worker result is pending
    pub fn is_idle(&self) -> bool {
        self.in_flight == 0
    }

    /// Start one acquisition worker per backend
    pub fn start_acquisition(&mut self) {
        let backends = self.backends.clone();
        for backend in &backends {
            let source = backend.source();
            match spawn_acquisition(Arc::clone(backend), self.events_tx.clone()) {
                Ok(handle) => {
                    self.workers.push(handle);
                    self.in_flight += 1;
                }
                Err(e) => {
                    warn!(%source, "could not start acquisition worker: {}", e);
                    self.report(SessionEvent::AcquisitionFailed {
                        source,
                        reason: e.to_string(),
                    });
                }
            }
        }
        info!(workers = self.in_flight, "acquisition started");
    }

    /// Start a removal worker for a package in the working set. Anything
    /// else is refused with a failed `UninstallCompleted`, so base-system
    /// packages the classifier dropped cannot be removed by name.
    pub fn start_uninstall(&mut self, name: &str, source: PackageSource) {
        if self.inventory.get(source, name).is_none() {
            warn!(package = name, %source, "refusing to remove an unlisted package");
            self.report(SessionEvent::UninstallCompleted {
                name: name.to_string(),
                source,
                success: false,
                message: unlisted_message(name, source),
            });
            return;
        }
        self.spawn_uninstall(name, source);
    }

    /// Start a removal worker without checking the working set
    pub fn force_uninstall(&mut self, name: &str, source: PackageSource) {
        warn!(package = name, %source, "removing without working-set check");
        self.spawn_uninstall(name, source);
    }

    fn spawn_uninstall(&mut self, name: &str, source: PackageSource) {
        let uninstaller = Arc::clone(&self.uninstaller);
        let events = self.events_tx.clone();
        let worker_name = name.to_string();

        let spawned = thread::Builder::new()
            .name("uninstall".to_string())
            .spawn(move || {
                let result = panic::catch_unwind(AssertUnwindSafe(|| {
                    uninstaller.uninstall(&worker_name, source)
                }))
                .unwrap_or_else(|payload| Err(panic_message(payload.as_ref())));
                let outcome = UninstallOutcome::from(result);
                let _ = events.send(SessionEvent::UninstallCompleted {
                    name: worker_name,
                    source,
                    success: outcome.success,
                    message: outcome.message,
                });
            });

        match spawned {
            Ok(handle) => {
                self.workers.push(handle);
                self.in_flight += 1;
            }
            Err(e) => self.report(SessionEvent::UninstallCompleted {
                name: name.to_string(),
                source,
                success: false,
                message: e.to_string(),
            }),
        }
    }

    /// Wait for the next worker event, apply it to the inventory and return
    /// it. `None` when nothing is pending or `timeout` elapsed first.
    pub fn next_event(&mut self, timeout: Option<Duration>) -> Option<SessionEvent> {
        if self.in_flight == 0 {
            return None;
        }
        let event = match timeout {
            Some(limit) => match self.events_rx.recv_timeout(limit) {
                Ok(event) => event,
                Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => return None,
            },
            // The session holds a sender, so this cannot disconnect
            None => self.events_rx.recv().ok()?,
        };

        self.in_flight -= 1;
        self.workers.retain(|handle| !handle.is_finished());
        self.apply(&event);
        Some(event)
    }

    /// Drain every pending event, calling `on_event` after each is applied
    pub fn run_until_idle(&mut self, mut on_event: impl FnMut(&SessionEvent, &Inventory)) {
        while let Some(event) = self.next_event(None) {
            on_event(&event, &self.inventory);
        }
    }

    fn apply(&mut self, event: &SessionEvent) {
        match event {
            SessionEvent::PackagesLoaded { source, packages } => {
                debug!(%source, count = packages.len(), "merging packages");
                self.inventory.merge(packages.iter().cloned());
            }
            SessionEvent::AcquisitionFailed { source, reason } => {
                warn!(%source, "no packages from this source: {}", reason);
            }
            SessionEvent::UninstallCompleted {
                name,
                source,
                success,
                ..
            } => {
                if *success {
                    self.inventory.remove(*source, name);
                }
            }
        }
    }

    /// Queue an event produced on this thread (a worker that failed to
    /// start) so it flows through `next_event` like any other
    fn report(&mut self, event: SessionEvent) {
        if self.events_tx.send(event).is_ok() {
            self.in_flight += 1;
        }
    }
}
