//! Background acquisition of package lists.
//!
//! Each backend runs on its own worker thread and reports exactly one
//! [`SessionEvent`] over the channel: `PackagesLoaded` or `AcquisitionFailed`.
//! Workers never touch the working set; the receiving side merges. A failing
//! or panicking backend cannot delay or suppress another backend's result.

use crate::backend::PackageBackend;
use crate::session::SessionEvent;
use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, warn};

/// Spawn one worker enumerating `backend`, reporting on `events`.
/// `Err` only when the OS refuses to start a thread.
pub fn spawn_acquisition(
    backend: Arc<dyn PackageBackend>,
    events: Sender<SessionEvent>,
) -> io::Result<JoinHandle<()>> {
    let source = backend.source();
    thread::Builder::new()
        .name(format!("acquire-{}", source).to_lowercase())
        .spawn(move || {
            debug!(%source, "acquisition worker started");
            let event = match panic::catch_unwind(AssertUnwindSafe(|| backend.acquire())) {
                Ok(Ok(packages)) => SessionEvent::PackagesLoaded { source, packages },
                Ok(Err(e)) => {
                    warn!(%source, "acquisition failed: {}", e);
                    SessionEvent::AcquisitionFailed {
                        source,
                        reason: e.to_string(),
                    }
                }
                Err(payload) => {
                    let reason = panic_message(payload.as_ref());
                    error!(%source, "acquisition worker panicked: {}", reason);
                    SessionEvent::AcquisitionFailed { source, reason }
                }
            };
            if events.send(event).is_err() {
                debug!(%source, "session gone, dropping acquisition result");
            }
        })
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker panicked".to_string()
    }
}
