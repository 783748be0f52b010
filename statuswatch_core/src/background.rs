//! Scheduler and cache persister running next to the HTTP server

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::cache::CachePersister;
use crate::monitor::{Monitor, Scheduler};

/// Handles to the background tasks, stopped in two phases: everything that
/// writes results first, the persister last.
pub struct BackgroundTasks {
    probes_stop: watch::Sender<bool>,
    probes: Vec<JoinHandle<()>>,
    persist_stop: watch::Sender<bool>,
    persister: JoinHandle<()>,
}

impl BackgroundTasks {
    pub fn start(monitor: Arc<Monitor>, persister: CachePersister, tick: Duration) -> Self {
        let (probes_stop, probes_rx) = watch::channel(false);
        let (persist_stop, persist_rx) = watch::channel(false);

        let store = monitor.store().clone();
        let scheduler = tokio::spawn(Scheduler::new(monitor, tick).run(probes_rx));
        let persister = tokio::spawn(persister.run(store, persist_rx));

        Self {
            probes_stop,
            probes: vec![scheduler],
            persist_stop,
            persister,
        }
    }

    /// Shutdown signal for tasks that write results, such as a reload
    /// listener. Register them with [`BackgroundTasks::track`].
    pub fn probe_shutdown(&self) -> watch::Receiver<bool> {
        self.probes_stop.subscribe()
    }

    pub fn track(&mut self, task: JoinHandle<()>) {
        self.probes.push(task);
    }

    /// Stops the scheduler and tracked tasks and waits for any sweep in
    /// progress. Only then does the persister get its signal, so its final
    /// flush includes that sweep.
    pub async fn shutdown(self) {
        let _ = self.probes_stop.send(true);
        for task in self.probes {
            if let Err(e) = task.await {
                error!("Background task failed: {}", e);
            }
        }

        let _ = self.persist_stop.send(true);
        if let Err(e) = self.persister.await {
            error!("Cache persister failed: {}", e);
        }
        info!("Background tasks stopped");
    }
}
