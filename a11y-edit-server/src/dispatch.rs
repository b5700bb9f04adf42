//! Per-session request queues.
//!
//! Every session gets its own worker task that owns the session state and
//! handles that session's requests strictly in arrival order. Edits run on the
//! blocking pool with the session moved in and handed back, so two edits of the
//! same session never overlap. Different sessions proceed independently. A
//! session id reopened after `close-session` waits for its closed worker to
//! finish before touching the source.

use a11y_edit::{ElementId, LiveEditor, RuntimeComponent, Session, SessionContext};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::protocol::{Lookup, Notification, Request};

pub struct SessionManager {
    editor: Arc<LiveEditor>,
    source_root: PathBuf,
    notify: mpsc::UnboundedSender<Notification>,
    workers: HashMap<String, Worker>,
    /// Workers of closed sessions that may still be draining
    closing: HashMap<String, JoinHandle<()>>,
}

struct Worker {
    queue: mpsc::UnboundedSender<Request>,
    handle: JoinHandle<()>,
}

impl SessionManager {
    pub fn new(editor: Arc<LiveEditor>, notify: mpsc::UnboundedSender<Notification>) -> Self {
        let source_root = editor.config().source_root.clone();
        Self {
            editor,
            source_root,
            notify,
            workers: HashMap::new(),
            closing: HashMap::new(),
        }
    }

    pub fn session_count(&self) -> usize {
        self.workers.len()
    }

    /// Queue `request` on its session's worker, starting one if needed.
    pub fn dispatch(&mut self, request: Request) {
        let id = request.session().to_string();

        if let Request::CloseSession { .. } = request {
            // dropping the queue lets the worker finish what it already has
            if let Some(worker) = self.workers.remove(&id) {
                info!("Closed session {}", id);
                self.closing.retain(|_, handle| !handle.is_finished());
                self.closing.insert(id, worker.handle);
            }
            return;
        }

        let worker = self.workers.entry(id.clone()).or_insert_with(|| {
            debug!("Starting worker for session {}", id);
            spawn_worker(
                Session::new(id.as_str(), self.source_root.clone()),
                self.editor.clone(),
                self.notify.clone(),
                self.closing.remove(&id),
            )
        });

        if worker.queue.send(request).is_err() {
            error!("Worker for session {} is gone", id);
            let _ = self
                .notify
                .send(Notification::error(Some(&id), "session worker stopped"));
            self.workers.remove(&id);
        }
    }

    /// Close every queue and wait for the workers to drain.
    pub async fn shutdown(self) {
        let handles: Vec<JoinHandle<()>> = self
            .workers
            .into_values()
            .map(|worker| {
                drop(worker.queue);
                worker.handle
            })
            .chain(self.closing.into_values())
            .collect();

        for handle in handles {
            if let Err(e) = handle.await {
                error!("Session worker failed: {:?}", e);
            }
        }
    }
}

fn spawn_worker(
    session: Session,
    editor: Arc<LiveEditor>,
    notify: mpsc::UnboundedSender<Notification>,
    previous: Option<JoinHandle<()>>,
) -> Worker {
    let (queue, rx) = mpsc::unbounded_channel();
    let handle = tokio::spawn(run_worker(session, editor, rx, notify, previous));
    Worker { queue, handle }
}

async fn run_worker(
    mut session: Session,
    editor: Arc<LiveEditor>,
    mut rx: mpsc::UnboundedReceiver<Request>,
    notify: mpsc::UnboundedSender<Notification>,
    previous: Option<JoinHandle<()>>,
) {
    if let Some(previous) = previous {
        if let Err(e) = previous.await {
            error!("Closed worker for session {} failed: {:?}", session.session_id(), e);
        }
    }

    while let Some(request) = rx.recv().await {
        let id = request.session().to_string();

        let notification = if let Some(edit) = request.edit() {
            let editor = editor.clone();
            let outcome = tokio::task::spawn_blocking(move || {
                let result = editor.apply(&mut session, &edit);
                (session, edit, result)
            })
            .await;

            let (returned, edit, result) = match outcome {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!("Edit task for session {} panicked: {:?}", id, e);
                    let _ = notify.send(Notification::error(Some(&id), "internal error"));
                    return;
                }
            };
            session = returned;

            match result {
                Ok(report) => {
                    info!("Session {}: {}", id, report.summary);
                    let message = if report.changed {
                        report.summary
                    } else {
                        format!("{} (no changes needed)", report.summary)
                    };
                    Notification::success(&id, message)
                }
                Err(e) => {
                    error!("Session {}: {} failed: {:?}", id, edit.operation(), e);
                    Notification::error(Some(&id), e.to_string())
                }
            }
        } else if let Some(lookup) = request.lookup() {
            let editor = editor.clone();
            let outcome = tokio::task::spawn_blocking(move || {
                let result = match lookup {
                    Lookup::Element(element) => editor.show_location(&session, element),
                    Lookup::CurrentView => editor.show_route(&session),
                };
                (session, result)
            })
            .await;

            let (returned, result) = match outcome {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!("Lookup task for session {} panicked: {:?}", id, e);
                    let _ = notify.send(Notification::error(Some(&id), "internal error"));
                    return;
                }
            };
            session = returned;

            match result {
                Ok(site) => {
                    debug!("Session {}: {:?} is at {}", id, lookup, site);
                    Notification::success(&id, site.to_string())
                }
                Err(e) => {
                    error!("Session {}: lookup of {:?} failed: {:?}", id, lookup, e);
                    Notification::error(Some(&id), e.to_string())
                }
            }
        } else {
            record(&mut session, request);
            continue;
        };

        if notify.send(notification).is_err() {
            debug!("Notification channel closed, stopping session {}", id);
            return;
        }
    }
}

/// Apply a bookkeeping request to the session.
fn record(session: &mut Session, request: Request) {
    match request {
        Request::RegisterComponent {
            node_id,
            component_type,
            capabilities,
            location,
            ..
        } => {
            let component = RuntimeComponent::new(
                ElementId(node_id),
                component_type,
                capabilities.unwrap_or_default(),
            );
            session.register(component, location);
        }
        Request::SetCurrentView { node_id, .. } => session.set_current_view(ElementId(node_id)),
        other => debug!("Ignoring {:?} in bookkeeping", other),
    }
}
