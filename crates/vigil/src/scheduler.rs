//! Check scheduler.
//!
//! A supervisor task keeps one worker task per enabled endpoint. Workers own
//! their timer, so a slow endpoint never delays another one. The supervisor
//! reconciles the worker set against the registry periodically and whenever
//! the registry signals a change.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::model::{HealthStatus, StatusEvent};
use crate::probe::{self, Transport};
use crate::registry::{Assignment, Registry};

/// How often the supervisor re-reads the registry without being woken
pub const DEFAULT_RECONCILE_INTERVAL: Duration = Duration::from_secs(30);

pub struct Scheduler {
    registry: Arc<Registry>,
    transport: Arc<dyn Transport>,
    events: mpsc::Sender<StatusEvent>,
    reconcile_interval: Duration,
}

/// Running scheduler. Dropping the handle also stops it.
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Stop the supervisor and abort every worker, including in-flight probes
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.join.await {
            warn!("scheduler task ended abnormally: {}", e);
        }
    }
}

struct Worker {
    assignment: Assignment,
    handle: JoinHandle<()>,
}

impl Scheduler {
    pub fn new(
        registry: Arc<Registry>,
        transport: Arc<dyn Transport>,
        events: mpsc::Sender<StatusEvent>,
    ) -> Self {
        Self { registry, transport, events, reconcile_interval: DEFAULT_RECONCILE_INTERVAL }
    }

    pub fn with_reconcile_interval(mut self, reconcile_interval: Duration) -> Self {
        self.reconcile_interval = reconcile_interval.max(Duration::from_secs(1));
        self
    }

    pub fn spawn(self) -> SchedulerHandle {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let join = tokio::spawn(self.supervise(shutdown_rx));
        SchedulerHandle { shutdown, join }
    }

    async fn supervise(self, mut shutdown: watch::Receiver<bool>) {
        let mut workers: HashMap<String, Worker> = HashMap::new();
        let mut tick = interval(self.reconcile_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!("scheduler started");
        loop {
            tokio::select! {
                _ = tick.tick() => {}
                _ = self.registry.changed() => {}
                _ = shutdown.changed() => break,
            }
            self.reconcile(&mut workers);
        }

        for worker in workers.into_values() {
            worker.handle.abort();
        }
        info!("scheduler stopped");
    }

    /// Stop workers whose endpoint is gone, disabled, re-created or edited,
    /// and start workers for enabled endpoints that have none.
    fn reconcile(&self, workers: &mut HashMap<String, Worker>) {
        let assignments = self.registry.assignments();
        let wanted: HashMap<&str, &Assignment> =
            assignments.iter().map(|assignment| (assignment.config.id.as_str(), assignment)).collect();

        workers.retain(|id, worker| {
            let current = !worker.handle.is_finished()
                && wanted.get(id.as_str()).is_some_and(|assignment| **assignment == worker.assignment);
            if !current {
                worker.handle.abort();
                debug!(id = %id, "worker stopped");
            }
            current
        });

        for assignment in assignments {
            if workers.contains_key(&assignment.config.id) {
                continue;
            }
            debug!(id = %assignment.config.id, interval_minutes = assignment.config.interval_minutes, "worker started");
            let handle = tokio::spawn(run_worker(
                self.registry.clone(),
                self.transport.clone(),
                self.events.clone(),
                assignment.clone(),
            ));
            workers.insert(assignment.config.id.clone(), Worker { assignment, handle });
        }
    }
}

/// Probe one endpoint on its own interval, first probe immediately. Ticks
/// missed while a probe is in flight are skipped. Events are handed off
/// without waiting, so a slow consumer never delays probing.
async fn run_worker(
    registry: Arc<Registry>,
    transport: Arc<dyn Transport>,
    events: mpsc::Sender<StatusEvent>,
    assignment: Assignment,
) {
    let Assignment { epoch, config } = assignment;
    let mut timer = interval(config.interval());
    let id = config.id;
    timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        timer.tick().await;

        let Some(current) = registry.assignment(&id, epoch) else {
            break;
        };
        let outcome = probe::execute(transport.as_ref(), &current.config).await;

        let Some(event) = registry.record_probe(&id, epoch, &outcome, Utc::now()) else {
            debug!(id = %id, "endpoint changed during probe, result discarded");
            break;
        };

        match event.current {
            HealthStatus::Error => warn!(
                id = %id,
                reason = event.reason.map(|r| r.as_str()).unwrap_or_default(),
                "probe failed: {}",
                event.detail
            ),
            _ => debug!(id = %id, "probe ok: {}", event.detail),
        }

        // the status is already recorded; a busy consumer only loses the event
        match events.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                warn!(id = %id, status = %event.current, "event channel full, status event dropped")
            }
            Err(TrySendError::Closed(_)) => debug!(id = %id, "status event dropped, no receiver"),
        }
    }
}
