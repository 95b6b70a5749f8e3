//! Controller Handle - the emulated Pro Controller as seen by its owner
//!
//! Owns the live input state, the sequence counter and at most one running
//! [`Link`]. External input sources get an [`InputHandle`] and write to it at
//! any time; the link picks the state up on its next report.
//!

use super::counter::SequenceCounter;
use super::device::HidDevice;
use super::input::InputHandle;
use super::link::{Link, Running};
use super::scheduler::{ReportScheduler, SchedulerSettings, StatsSnapshot};
use crate::config::{EmulatorConfig, Verbosity};
use crate::gadget::{GadgetError, Peripheral, UsbGadget};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Configuration for one emulated controller.
///
/// # Examples
///
/// ```rust
/// use procon_gadget::controller::ControllerSettings;
/// use std::time::Duration;
///
/// let settings = ControllerSettings {
///     report_period: Duration::from_millis(15),
///     ..ControllerSettings::default()
/// };
/// assert_eq!(settings.counter_period, Duration::from_millis(5));
/// ```
#[derive(Clone, Debug)]
pub struct ControllerSettings {
    /// Character device `connect` opens.
    pub device_path: PathBuf,

    /// Sequence counter period. The host expects 5 ms.
    pub counter_period: Duration,

    /// Input report period while reporting is enabled.
    pub report_period: Duration,

    pub verbosity: Verbosity,

    /// Turn gadget activation failures into connect errors.
    pub strict_activation: bool,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self::from(&EmulatorConfig::default())
    }
}

impl From<&EmulatorConfig> for ControllerSettings {
    fn from(config: &EmulatorConfig) -> Self {
        Self {
            device_path: config.device_path.clone(),
            counter_period: Duration::from_millis(config.counter_period_ms),
            report_period: Duration::from_millis(config.report_period_ms),
            verbosity: config.verbosity(),
            strict_activation: config.strict_activation,
        }
    }
}

/// Errors returned by [`Controller::connect`].
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    /// A link is already running; close it first.
    #[error("controller is already connected")]
    AlreadyConnected,

    #[error("failed to open {path}: {source}")]
    DeviceOpenFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Only raised with `strict_activation`.
    #[error("gadget activation failed: {0}")]
    ActivationFailed(#[from] GadgetError),
}

pub struct Controller {
    settings: ControllerSettings,
    peripheral: Option<Box<dyn Peripheral>>,
    input: InputHandle,
    counter: SequenceCounter,
    link: Option<Link<Running>>,
}

impl Controller {
    /// A controller without gadget management.
    pub fn new(settings: ControllerSettings) -> Self {
        info!("Initializing controller with settings: {:?}", settings);
        Self {
            settings,
            peripheral: None,
            input: InputHandle::new(),
            counter: SequenceCounter::new(),
            link: None,
        }
    }

    pub fn with_peripheral(settings: ControllerSettings, peripheral: Box<dyn Peripheral>) -> Self {
        let mut controller = Self::new(settings);
        controller.peripheral = Some(peripheral);
        controller
    }

    /// Builds a controller from file configuration. An empty gadget name
    /// leaves the gadget alone.
    pub fn from_config(config: &EmulatorConfig) -> Self {
        let settings = ControllerSettings::from(config);
        if config.gadget_name.is_empty() {
            return Self::new(settings);
        }
        let gadget = UsbGadget::new(
            config.gadget_name.clone(),
            config.configfs_root.clone(),
            config.udc_class_root.clone(),
        );
        Self::with_peripheral(settings, Box::new(gadget))
    }

    pub fn settings(&self) -> &ControllerSettings {
        &self.settings
    }

    /// Writer for the live input state.
    pub fn input(&self) -> InputHandle {
        self.input.clone()
    }

    pub fn sequence(&self) -> u8 {
        self.counter.get()
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_some()
    }

    /// Input report timers currently running (0 or 1).
    pub fn active_report_timers(&self) -> usize {
        self.link
            .as_ref()
            .map_or(0, |link| link.scheduler().active_report_timers())
    }

    pub fn stats(&self) -> Option<StatsSnapshot> {
        self.link.as_ref().map(|link| link.scheduler().stats())
    }

    /// Binds the gadget if needed, opens the configured device and starts the link.
    pub async fn connect(&mut self) -> Result<(), ConnectError> {
        let path = self.settings.device_path.clone();
        self.connect_path(&path).await
    }

    pub async fn connect_path(&mut self, path: &Path) -> Result<(), ConnectError> {
        if self.is_connected() {
            return Err(ConnectError::AlreadyConnected);
        }

        self.activate_peripheral()?;

        info!("Opening {}", path.display());
        let device = HidDevice::open(path).map_err(|source| ConnectError::DeviceOpenFailed {
            path: path.to_path_buf(),
            source,
        })?;

        self.attach(device)
    }

    /// Starts a link over an already open bidirectional transport.
    pub fn attach<D>(&mut self, device: D) -> Result<(), ConnectError>
    where
        D: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let (reader, writer) = tokio::io::split(device);
        self.attach_split(reader, writer)
    }

    /// Starts a link over separate read and write handles to one device.
    pub fn attach_split<R, W>(&mut self, reader: R, writer: W) -> Result<(), ConnectError>
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        if self.is_connected() {
            return Err(ConnectError::AlreadyConnected);
        }

        self.counter.reset();

        let scheduler_settings = SchedulerSettings {
            counter_period: self.settings.counter_period,
            report_period: self.settings.report_period,
            verbosity: self.settings.verbosity,
        };
        let token = CancellationToken::new();
        let scheduler = ReportScheduler::new(
            Box::new(writer),
            self.counter.clone(),
            self.input.subscribe(),
            scheduler_settings,
            token.clone(),
        );

        let link = Link::create(scheduler, Box::new(reader), token).start();
        self.link = Some(link);
        info!("Controller connected");
        Ok(())
    }

    /// Stops every producer, releases the device and unbinds the gadget.
    /// The device descriptor is closed by the time this returns. Closing a
    /// closed controller does nothing.
    pub async fn close(&mut self) {
        let Some(link) = self.link.take() else {
            debug!("Already closed");
            return;
        };

        link.shutdown().await.release();

        if let Some(peripheral) = &self.peripheral {
            if let Err(e) = peripheral.deactivate() {
                warn!("Failed to deactivate gadget {}: {}", peripheral.name(), e);
            }
        }
        info!("Controller closed");
    }

    fn activate_peripheral(&self) -> Result<(), ConnectError> {
        let Some(peripheral) = &self.peripheral else {
            return Ok(());
        };
        if peripheral.is_active() {
            debug!("Gadget {} already active", peripheral.name());
            return Ok(());
        }

        match peripheral.activate() {
            Ok(()) => Ok(()),
            Err(e) if self.settings.strict_activation => {
                error!("Failed to activate gadget {}: {}", peripheral.name(), e);
                Err(ConnectError::ActivationFailed(e))
            }
            Err(e) => {
                warn!(
                    "Failed to activate gadget {}, continuing: {}",
                    peripheral.name(),
                    e
                );
                Ok(())
            }
        }
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        if let Some(link) = &self.link {
            warn!("Controller dropped while connected, cancelling link");
            link.cancel();
        }
    }
}
