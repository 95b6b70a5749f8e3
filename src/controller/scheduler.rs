//! Report scheduling for one connected session.
//!
//! Three producers share the device:
//!
//! ```text
//! counter task  ──► SequenceCounter (every 5 ms)
//! report timer  ──► 0x30 input report (every 30 ms, while enabled)   ─┐
//! read loop     ──► handshake / sub-command dispatch ──► reply report ─┴─► writer mutex ──► device
//! ```
//!
//! All writes go through one mutex, so a reply and a periodic report never
//! interleave inside a frame. Cancellation is observed between frames: a
//! write already in flight completes first.

use super::counter::SequenceCounter;
use super::input::InputState;
use crate::config::Verbosity;
use crate::protocol::calibration::CalibrationStore;
use crate::protocol::codec::{self, REPORT_LEN, SNAPSHOT_LEN};
use crate::protocol::handshake::{self, HandshakeAction};
use crate::protocol::subcommand::SubCommandDispatcher;
use crate::protocol::{hex, HostRequest, INPUT_REPORT};
use std::io;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub type DeviceReader = Box<dyn AsyncRead + Send + Unpin>;
pub type DeviceWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Inbound reports are at most 64 bytes; the extra room keeps an oversized
/// read from being split across two frames.
const READ_BUFFER_LEN: usize = 128;

#[derive(Clone, Debug)]
pub struct SchedulerSettings {
    pub counter_period: Duration,
    pub report_period: Duration,
    pub verbosity: Verbosity,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            counter_period: Duration::from_millis(5),
            report_period: Duration::from_millis(30),
            verbosity: Verbosity::Silent,
        }
    }
}

/// Traffic counters for one session.
#[derive(Debug, Default)]
pub struct SessionStats {
    frames_read: AtomicU64,
    reports_written: AtomicU64,
    malformed_frames: AtomicU64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub frames_read: u64,
    pub reports_written: u64,
    pub malformed_frames: u64,
}

impl SessionStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            frames_read: self.frames_read.load(Ordering::Relaxed),
            reports_written: self.reports_written.load(Ordering::Relaxed),
            malformed_frames: self.malformed_frames.load(Ordering::Relaxed),
        }
    }
}

struct ReportTimer {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl ReportTimer {
    async fn stop(self) {
        self.token.cancel();
        if let Err(e) = self.handle.await {
            error!("Input report timer ended abnormally: {}", e);
        }
    }
}

// Decrements the live timer count however the timer task ends.
struct LiveTimer(Arc<AtomicUsize>);

impl Drop for LiveTimer {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct ReportScheduler {
    writer: Mutex<Option<DeviceWriter>>,
    counter: SequenceCounter,
    input: watch::Receiver<InputState>,
    dispatcher: SubCommandDispatcher,
    settings: SchedulerSettings,
    token: CancellationToken,
    report_timer: Mutex<Option<ReportTimer>>,
    live_timers: Arc<AtomicUsize>,
    stats: SessionStats,
}

impl ReportScheduler {
    pub fn new(
        writer: DeviceWriter,
        counter: SequenceCounter,
        input: watch::Receiver<InputState>,
        settings: SchedulerSettings,
        token: CancellationToken,
    ) -> Arc<Self> {
        debug!("Creating report scheduler with settings: {:?}", settings);
        Arc::new(Self {
            writer: Mutex::new(Some(writer)),
            counter,
            input,
            dispatcher: SubCommandDispatcher::new(CalibrationStore::global(), settings.verbosity),
            settings,
            token,
            report_timer: Mutex::new(None),
            live_timers: Arc::new(AtomicUsize::new(0)),
            stats: SessionStats::default(),
        })
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Number of input report timers currently running. Never more than one.
    pub fn active_report_timers(&self) -> usize {
        self.live_timers.load(Ordering::SeqCst)
    }

    pub fn spawn_counter(self: &Arc<Self>) -> JoinHandle<()> {
        let scheduler = Arc::clone(self);
        let token = self.token.child_token();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(scheduler.settings.counter_period);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        scheduler.counter.tick();
                    }
                }
            }
            debug!("Sequence counter stopped at {}", scheduler.counter.get());
        })
    }

    pub fn spawn_read_loop(self: &Arc<Self>, reader: DeviceReader) -> JoinHandle<()> {
        let scheduler = Arc::clone(self);
        let token = self.token.child_token();
        tokio::spawn(async move { scheduler.run_read_loop(reader, token).await })
    }

    async fn run_read_loop(self: Arc<Self>, mut reader: DeviceReader, token: CancellationToken) {
        info!("Read loop started");
        let mut buf = [0u8; READ_BUFFER_LEN];

        loop {
            let read = tokio::select! {
                _ = token.cancelled() => break,
                read = reader.read(&mut buf) => read,
            };

            match read {
                Ok(0) => {
                    info!("Device reached end of stream");
                    break;
                }
                Ok(n) => self.handle_report(&buf[..n]).await,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    error!("Device read failed: {}", e);
                    break;
                }
            }
        }
        info!("Read loop stopped");
    }

    async fn handle_report(self: &Arc<Self>, report: &[u8]) {
        self.stats.frames_read.fetch_add(1, Ordering::Relaxed);
        if self.settings.verbosity >= Verbosity::Frames {
            info!("read: {}", hex(report));
        }

        let request = match HostRequest::parse(report) {
            Ok(request) => request,
            Err(e) => {
                self.stats.malformed_frames.fetch_add(1, Ordering::Relaxed);
                if self.settings.verbosity >= Verbosity::Protocol {
                    warn!("Skipping malformed report: {}", e);
                }
                return;
            }
        };

        match request {
            HostRequest::UsbCommand(code) => self.handle_usb_command(code).await,
            HostRequest::SubCommand { code, args } => self.handle_subcommand(code, args).await,
            HostRequest::Ignored(_) => {}
            HostRequest::Unknown(id) => {
                if self.settings.verbosity >= Verbosity::Protocol {
                    warn!("Unknown request {:#04x}", id);
                }
            }
        }
    }

    async fn handle_usb_command(self: &Arc<Self>, code: u8) {
        match handshake::handle(code) {
            Ok(HandshakeAction::Reply(report)) => self.send_reply(&report).await,
            Ok(HandshakeAction::EnableReports) => self.enable_reports().await,
            Ok(HandshakeAction::DisableReports) => self.disable_reports().await,
            Ok(HandshakeAction::Unrecognized(code)) => {
                if self.settings.verbosity >= Verbosity::Protocol {
                    warn!("Unknown USB command {:#04x}", code);
                }
            }
            Err(e) => error!("Failed to frame USB reply: {}", e),
        }
    }

    async fn handle_subcommand(&self, code: u8, args: &[u8]) {
        let Some(reply) = self.dispatcher.dispatch(code, args) else {
            return;
        };
        let snapshot = self.snapshot();
        match reply.encode(self.counter.get(), &snapshot) {
            Ok(report) => self.send_reply(&report).await,
            Err(e) => error!("Failed to frame reply to sub-command {:#04x}: {}", code, e),
        }
    }

    /// Starts the periodic input report. A timer that is already running is
    /// stopped first, so repeated enables never stack.
    pub async fn enable_reports(self: &Arc<Self>) {
        let mut slot = self.report_timer.lock().await;
        if let Some(previous) = slot.take() {
            debug!("Replacing running input report timer");
            previous.stop().await;
        }
        if self.token.is_cancelled() {
            return;
        }

        self.live_timers.fetch_add(1, Ordering::SeqCst);
        let live = LiveTimer(Arc::clone(&self.live_timers));
        let token = self.token.child_token();
        let scheduler = Arc::clone(self);
        let timer_token = token.clone();
        let handle = tokio::spawn(async move {
            let _live = live;
            scheduler.run_report_timer(timer_token).await;
        });

        *slot = Some(ReportTimer { token, handle });
        info!(
            "Input reports enabled every {} ms",
            self.settings.report_period.as_millis()
        );
    }

    pub async fn disable_reports(&self) {
        let previous = self.report_timer.lock().await.take();
        if let Some(timer) = previous {
            timer.stop().await;
            info!("Input reports disabled");
        }
    }

    async fn run_report_timer(&self, token: CancellationToken) {
        let mut ticker = tokio::time::interval(self.settings.report_period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let snapshot = self.snapshot();
            let report = match codec::frame(INPUT_REPORT, self.counter.get(), &snapshot) {
                Ok(report) => report,
                Err(e) => {
                    error!("Failed to frame input report: {}", e);
                    break;
                }
            };
            if let Err(e) = self.write_report(&report).await {
                warn!("Input report write failed: {}", e);
            }
        }
    }

    // One consistent copy per report; input sources keep writing meanwhile.
    fn snapshot(&self) -> [u8; SNAPSHOT_LEN] {
        codec::encode_input_snapshot(&self.input.borrow())
    }

    async fn send_reply(&self, report: &[u8; REPORT_LEN]) {
        if self.settings.verbosity >= Verbosity::Frames {
            info!("write: {}", hex(report));
        }
        if let Err(e) = self.write_report(report).await {
            warn!("Reply write failed: {}", e);
        }
    }

    async fn write_report(&self, report: &[u8; REPORT_LEN]) -> io::Result<()> {
        let mut slot = self.writer.lock().await;
        let writer = slot
            .as_mut()
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotConnected))?;
        writer.write_all(report).await?;
        writer.flush().await?;
        self.stats.reports_written.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Shuts down and drops the write side. Call only after every producer
    /// has stopped; with the read half already gone this closes the device.
    pub async fn close_device(&self) {
        let Some(mut writer) = self.writer.lock().await.take() else {
            return;
        };
        if let Err(e) = writer.shutdown().await {
            debug!("Device shutdown reported: {}", e);
        }
    }
}
