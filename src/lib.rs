//! Wired Nintendo Switch Pro Controller emulation over a Linux HID gadget.
//!
//! The host console drives the exchange: it negotiates the link with USB
//! commands, queries the controller with sub-commands and then expects an
//! input report every few milliseconds. [`Controller`] answers all of it from
//! a live [`InputState`] that any input source can write through an
//! [`InputHandle`].

pub mod config;
pub mod controller;
pub mod gadget;
pub mod protocol;

pub use config::{EmulatorConfig, Verbosity};
pub use controller::{Button, ConnectError, Controller, ControllerSettings, InputHandle, InputState, Stick};
pub use gadget::{GadgetError, Peripheral, UsbGadget};
