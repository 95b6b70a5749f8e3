//! One connected session, from attach to release.
//!
//! ```text
//! Starting ──start()──► Running ──shutdown()──► Stopped
//! ```
//!
//! `shutdown` cancels every producer and joins it before the device is shut
//! down, so no task ever touches a released handle.

use super::scheduler::{DeviceReader, ReportScheduler, StatsSnapshot};
use chrono::{DateTime, Local};
use statum::{machine, state};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

#[state]
#[derive(Debug, Clone)]
pub enum LinkState {
    Starting,
    Running,
    Stopped,
}

#[machine]
pub struct Link<S: LinkState> {
    scheduler: Arc<ReportScheduler>,
    reader: Option<DeviceReader>,
    token: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
    connected_at: DateTime<Local>,
}

impl<S: LinkState> Link<S> {
    pub fn scheduler(&self) -> &Arc<ReportScheduler> {
        &self.scheduler
    }

    pub fn connected_at(&self) -> DateTime<Local> {
        self.connected_at
    }
}

impl Link<Starting> {
    pub fn create(
        scheduler: Arc<ReportScheduler>,
        reader: DeviceReader,
        token: CancellationToken,
    ) -> Self {
        Self::new(scheduler, Some(reader), token, Vec::new(), Local::now())
    }

    /// Spawns the sequence counter and the read loop. The input report timer
    /// stays off until the host asks for it.
    pub fn start(mut self) -> Link<Running> {
        info!(
            "Starting link at {}",
            self.connected_at.format("%H:%M:%S.%3f")
        );
        self.tasks.push(self.scheduler.spawn_counter());
        if let Some(reader) = self.reader.take() {
            self.tasks.push(self.scheduler.spawn_read_loop(reader));
        }
        debug!("Spawned {} link tasks", self.tasks.len());
        self.transition()
    }
}

impl Link<Running> {
    /// Signals every producer without waiting for it.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub async fn shutdown(mut self) -> Link<Stopped> {
        self.token.cancel();
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                error!("Link task ended abnormally: {}", e);
            }
        }
        self.scheduler.disable_reports().await;
        self.scheduler.close_device().await;
        self.transition()
    }
}

impl Link<Stopped> {
    /// Logs the session summary and drops the device.
    pub fn release(self) -> StatsSnapshot {
        let stats = self.scheduler.stats();
        let uptime = Local::now() - self.connected_at;
        info!(
            "Link closed after {} ms: {} frames read, {} reports written, {} malformed",
            uptime.num_milliseconds(),
            stats.frames_read,
            stats.reports_written,
            stats.malformed_frames
        );
        stats
    }
}
