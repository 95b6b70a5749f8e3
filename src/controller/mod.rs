//! Controller subsystem: the emulated Pro Controller and its report producers
//!
//! 1. [`input`] - live button and stick state, written by input sources
//! 2. [`counter`] - the wrapping sequence counter
//! 3. [`device`] - the non-blocking gadget device
//! 4. [`scheduler`] - counter task, input report timer and read loop
//! 5. [`link`] - lifecycle of one connected session
//! 6. [`controller_handle`] - the [`Controller`] façade
//!
//! # Architecture
//!
//! ```text
//! InputHandle ──watch──► ReportScheduler ──► writer mutex ──► /dev/hidgN
//!                              ▲                                  │
//!                              └──────────── read loop ◄──────────┘
//! ```

pub mod controller_handle;
pub mod counter;
pub mod device;
pub mod input;
pub mod link;
pub mod scheduler;

pub use controller_handle::{ConnectError, Controller, ControllerSettings};
pub use counter::SequenceCounter;
pub use device::HidDevice;
pub use input::{Button, InputHandle, InputState, Stick, StickState};
pub use scheduler::{SchedulerSettings, StatsSnapshot};
