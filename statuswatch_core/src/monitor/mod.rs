//! Probe execution and sweeps over the current target model

pub mod scheduler;

pub use scheduler::{Scheduler, SweepSchedule};

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures_util::stream::{self, StreamExt};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info};

use crate::config::{
    resolve_endpoint_url, ConfigHandle, Configuration, Endpoint, Group, LoadedConfiguration,
};
use crate::error::{AppError, Result};
use crate::models::{EndpointResult, ResultStatus};
use crate::probe::{evaluate, Clock, HttpTransport};
use crate::store::ResultStore;

/// What a single probe attempt did.
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeOutcome {
    /// The endpoint URL could not be resolved; nothing was written.
    Skipped(String),
    /// The stored result is younger than the refresh interval.
    Throttled,
    /// Another probe of the same URL is still running.
    InFlight,
    Inactive { changed: bool },
    Probed(ResultStatus),
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepSummary {
    pub visited: usize,
    pub probed: usize,
    pub throttled: usize,
    pub inactive: usize,
    pub skipped: usize,
}

pub struct Monitor {
    config: ConfigHandle,
    store: ResultStore,
    transport: Arc<dyn HttpTransport>,
    clock: Arc<dyn Clock>,
    max_concurrent_probes: usize,
    in_flight: Mutex<HashSet<String>>,
    last_sweep: RwLock<Option<DateTime<Utc>>>,
}

impl Monitor {
    pub fn new(
        config: ConfigHandle,
        store: ResultStore,
        transport: Arc<dyn HttpTransport>,
        clock: Arc<dyn Clock>,
        max_concurrent_probes: usize,
    ) -> Self {
        Self {
            config,
            store,
            transport,
            clock,
            max_concurrent_probes: max_concurrent_probes.max(1),
            in_flight: Mutex::new(HashSet::new()),
            last_sweep: RwLock::new(None),
        }
    }

    pub fn configuration(&self) -> Arc<LoadedConfiguration> {
        self.config.current()
    }

    /// Swaps in a new target model. Sweeps already running keep the
    /// snapshot they started with.
    pub fn replace_configuration(&self, loaded: LoadedConfiguration) -> Arc<LoadedConfiguration> {
        self.config.replace(loaded)
    }

    /// Swaps in a new target model and sweeps it straight away.
    pub async fn reload(&self, loaded: LoadedConfiguration) -> SweepSummary {
        let groups = loaded.targets.groups.len();
        self.replace_configuration(loaded);
        info!("Configuration reloaded with {} groups", groups);
        self.sweep().await
    }

    pub fn store(&self) -> &ResultStore {
        &self.store
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn last_sweep(&self) -> Option<DateTime<Utc>> {
        *self.last_sweep.read()
    }

    /// Visits every endpoint of the current model once.
    pub async fn sweep(&self) -> SweepSummary {
        let loaded = self.config.current();
        let targets = &loaded.targets;
        let started = Instant::now();

        let probes: Vec<_> = targets
            .endpoints()
            .map(|(group, endpoint)| self.probe_endpoint(targets, group, endpoint))
            .collect();
        let outcomes: Vec<ProbeOutcome> = stream::iter(probes)
            .buffer_unordered(self.max_concurrent_probes)
            .collect()
            .await;

        let mut summary = SweepSummary {
            visited: outcomes.len(),
            ..SweepSummary::default()
        };
        for outcome in &outcomes {
            match outcome {
                ProbeOutcome::Probed(_) => summary.probed += 1,
                ProbeOutcome::Throttled | ProbeOutcome::InFlight => summary.throttled += 1,
                ProbeOutcome::Inactive { .. } => summary.inactive += 1,
                ProbeOutcome::Skipped(_) => summary.skipped += 1,
            }
        }

        *self.last_sweep.write() = Some(self.clock.now());

        info!(
            visited = summary.visited,
            probed = summary.probed,
            throttled = summary.throttled,
            inactive = summary.inactive,
            skipped = summary.skipped,
            duration_ms = started.elapsed().as_millis() as u64,
            "Sweep finished"
        );
        summary
    }

    /// Brings one endpoint's stored result up to date.
    pub async fn probe_endpoint(
        &self,
        targets: &Configuration,
        group: &Group,
        endpoint: &Endpoint,
    ) -> ProbeOutcome {
        let url = match resolve_endpoint_url(group, endpoint) {
            Ok(url) => url,
            Err(e) => {
                error!(group = %group.name, endpoint = %endpoint.name, "{}", e);
                return ProbeOutcome::Skipped(e.to_string());
            }
        };
        let key = url.to_string();
        let previous = self.store.get(&key);
        let now = self.clock.now();

        if group.inactive || endpoint.inactive {
            let changed = previous.map(|result| result.status) != Some(ResultStatus::Inactive);
            let result = EndpointResult::inactive(now);
            if changed {
                debug!(group = %group.name, endpoint = %endpoint.name, "Endpoint is now inactive");
                self.store.put(key, result);
            } else {
                self.store.put_untracked(key, result);
            }
            return ProbeOutcome::Inactive { changed };
        }

        let Some(_guard) = InFlightGuard::acquire(&self.in_flight, &key) else {
            debug!(url = %key, "Probe already in flight");
            return ProbeOutcome::InFlight;
        };

        let interval = targets.refresh_interval();
        if let Some(previous) = &previous {
            if is_fresh(previous.updated, now, interval) {
                return ProbeOutcome::Throttled;
            }
        }

        let started = Instant::now();
        let response = self.transport.fetch(endpoint.http_method(), &url).await;
        let elapsed = started.elapsed();

        let result = evaluate(&endpoint.target_status, response, elapsed, self.clock.now());
        let status = result.status;

        debug!(
            group = %group.name,
            endpoint = %endpoint.name,
            url = %key,
            code = result.code,
            status = %status,
            duration_ms = elapsed.as_millis() as u64,
            "Probed endpoint"
        );

        self.store.put(key, result);
        ProbeOutcome::Probed(status)
    }

    /// Latest result for one endpoint.
    pub fn read(&self, group_name: &str, endpoint_name: &str) -> Result<EndpointResult> {
        let loaded = self.config.current();
        let (group, endpoint) = loaded
            .targets
            .find(group_name, endpoint_name)
            .ok_or(AppError::Lookup)?;
        let url = resolve_endpoint_url(group, endpoint).map_err(|_| AppError::Lookup)?;

        self.store.get(url.as_str()).ok_or_else(|| {
            AppError::NotFound(format!(
                "No result yet for {}/{}",
                group_name, endpoint_name
            ))
        })
    }

    /// Probes one endpoint (throttle still applies) and returns its result.
    pub async fn refresh(&self, group_name: &str, endpoint_name: &str) -> Result<EndpointResult> {
        let loaded = self.config.current();
        let (group, endpoint) = loaded
            .targets
            .find(group_name, endpoint_name)
            .ok_or(AppError::Lookup)?;

        if let ProbeOutcome::Skipped(_) = self.probe_endpoint(&loaded.targets, group, endpoint).await
        {
            return Err(AppError::Lookup);
        }

        self.read(group_name, endpoint_name)
    }

    pub fn read_all(&self) -> BTreeMap<String, EndpointResult> {
        self.store.snapshot().results
    }

    pub async fn refresh_all(&self) -> BTreeMap<String, EndpointResult> {
        self.sweep().await;
        self.read_all()
    }
}

fn is_fresh(updated: DateTime<Utc>, now: DateTime<Utc>, interval: Duration) -> bool {
    match (now - updated).to_std() {
        Ok(age) => age < interval,
        // Stamped in the future; treat as fresh.
        Err(_) => true,
    }
}

/// Holds a URL in the in-flight set until dropped.
struct InFlightGuard<'a> {
    set: &'a Mutex<HashSet<String>>,
    url: String,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(set: &'a Mutex<HashSet<String>>, url: &str) -> Option<Self> {
        if !set.lock().insert(url.to_string()) {
            return None;
        }
        Some(Self {
            set,
            url: url.to_string(),
        })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.set.lock().remove(&self.url);
    }
}
