//! Sub-command dispatch for full output reports (`0x01`).
//!
//! Replies go out as `0x21` reports:
//!
//! ```text
//! [0]      0x21
//! [1]      sequence counter
//! [2..13]  input snapshot
//! [13]     ack byte
//! [14]     echoed sub-command
//! [15..]   reply data
//! ```

use super::calibration::CalibrationStore;
use super::codec::{self, FrameError, MAX_PAYLOAD_LEN, REPORT_LEN, SNAPSHOT_LEN};
use super::{hex, SPI_READ_ARGS_LEN, SUBCOMMAND_REPLY};
use crate::config::Verbosity;
use tracing::{info, warn};

pub const MANUAL_PAIRING: u8 = 0x01;
pub const DEVICE_INFO: u8 = 0x02;
pub const SET_INPUT_MODE: u8 = 0x03;
pub const TRIGGER_ELAPSED: u8 = 0x04;
pub const SET_SHIPMENT_MODE: u8 = 0x08;
pub const SPI_FLASH_READ: u8 = 0x10;
pub const SET_MCU_CONFIG: u8 = 0x21;
pub const SET_PLAYER_LIGHTS: u8 = 0x30;
pub const SET_HOME_LIGHT: u8 = 0x38;
pub const ENABLE_IMU: u8 = 0x40;
pub const SET_IMU_SENSITIVITY: u8 = 0x41;
pub const ENABLE_VIBRATION: u8 = 0x48;

pub const ACK: u8 = 0x80;
pub const NACK: u8 = 0x00;

const PAIRING_REPLY: [u8; 2] = [0x03, 0x01];

/// Firmware 3.72, Pro Controller, MAC, colours stored in flash.
const DEVICE_INFO_REPLY: [u8; 12] = [
    0x03, 0x48, 0x03, 0x02, 0x5e, 0x53, 0x00, 0x5e, 0x00, 0x00, 0x03, 0x01,
];

const MCU_CONFIG_REPLY: [u8; 8] = [0x01, 0x00, 0xff, 0x00, 0x03, 0x00, 0x05, 0x01];

/// 0x21 is acknowledged without looking at the request. Swap this for a real
/// check once the MCU configuration payload is validated.
pub const MCU_CONFIG_ALWAYS_ACK: bool = true;

/// Longest flash read whose reply still fits in one report.
pub const MAX_SPI_READ_LEN: usize = MAX_PAYLOAD_LEN - SNAPSHOT_LEN - 2 - SPI_READ_ARGS_LEN;

/// Outcome of one sub-command, before framing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubCommandReply {
    pub code: u8,
    pub acknowledged: bool,
    pub data: Vec<u8>,
}

impl SubCommandReply {
    fn ack(code: u8, data: impl Into<Vec<u8>>) -> Self {
        Self {
            code,
            acknowledged: true,
            data: data.into(),
        }
    }

    fn nack(code: u8) -> Self {
        Self {
            code,
            acknowledged: false,
            data: Vec::new(),
        }
    }

    /// 0x00 when refused, otherwise 0x80, or'd with the code when data follows.
    pub fn ack_byte(&self) -> u8 {
        if !self.acknowledged {
            return NACK;
        }
        if self.data.is_empty() {
            ACK
        } else {
            ACK | self.code
        }
    }

    /// Frames the reply behind `snapshot` as a 0x21 report.
    pub fn encode(
        &self,
        sequence: u8,
        snapshot: &[u8; SNAPSHOT_LEN],
    ) -> Result<[u8; REPORT_LEN], FrameError> {
        let mut payload = Vec::with_capacity(SNAPSHOT_LEN + 2 + self.data.len());
        payload.extend_from_slice(snapshot);
        payload.push(self.ack_byte());
        payload.push(self.code);
        payload.extend_from_slice(&self.data);
        codec::frame(SUBCOMMAND_REPLY, sequence, &payload)
    }
}

pub struct SubCommandDispatcher {
    store: &'static CalibrationStore,
    verbosity: Verbosity,
}

impl SubCommandDispatcher {
    pub fn new(store: &'static CalibrationStore, verbosity: Verbosity) -> Self {
        Self { store, verbosity }
    }

    /// Answers sub-command `code`. `args` are the report bytes following the
    /// code. Unknown codes get no reply.
    pub fn dispatch(&self, code: u8, args: &[u8]) -> Option<SubCommandReply> {
        let reply = match code {
            MANUAL_PAIRING => SubCommandReply::ack(code, PAIRING_REPLY),
            DEVICE_INFO => SubCommandReply::ack(code, DEVICE_INFO_REPLY),
            SET_INPUT_MODE | SET_SHIPMENT_MODE | SET_PLAYER_LIGHTS | SET_HOME_LIGHT
            | ENABLE_IMU | SET_IMU_SENSITIVITY | ENABLE_VIBRATION => {
                SubCommandReply::ack(code, Vec::new())
            }
            TRIGGER_ELAPSED => SubCommandReply::ack(code, Vec::new()),
            SPI_FLASH_READ => self.read_flash(args),
            SET_MCU_CONFIG => SubCommandReply {
                code,
                acknowledged: MCU_CONFIG_ALWAYS_ACK,
                data: MCU_CONFIG_REPLY.to_vec(),
            },
            _ => {
                if self.verbosity >= Verbosity::Protocol {
                    warn!("Unknown sub-command {:#04x}: {}", code, hex(args));
                }
                return None;
            }
        };
        Some(reply)
    }

    fn read_flash(&self, args: &[u8]) -> SubCommandReply {
        let Some(header) = args.get(..SPI_READ_ARGS_LEN) else {
            return SubCommandReply::nack(SPI_FLASH_READ);
        };
        let (offset, bank, length) = (header[0], header[1], header[4]);

        if usize::from(length) > MAX_SPI_READ_LEN {
            if self.verbosity >= Verbosity::Protocol {
                warn!(
                    "Flash read of {} bytes at {:02x}{:02x} does not fit in a report",
                    length, bank, offset
                );
            }
            return SubCommandReply::nack(SPI_FLASH_READ);
        }

        match self.store.read(bank, offset, length) {
            Ok(data) => {
                if self.verbosity >= Verbosity::Protocol {
                    info!(
                        "Read SPI address {:02x}{:02x}[{}]: {}",
                        bank,
                        offset,
                        length,
                        hex(data)
                    );
                }
                let mut reply = header.to_vec();
                reply.extend_from_slice(data);
                SubCommandReply::ack(SPI_FLASH_READ, reply)
            }
            Err(e) => {
                if self.verbosity >= Verbosity::Protocol {
                    warn!("Unknown SPI address: {}", e);
                }
                SubCommandReply::nack(SPI_FLASH_READ)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::calibration::FACTORY_BANK;

    fn dispatcher() -> SubCommandDispatcher {
        SubCommandDispatcher::new(CalibrationStore::global(), Verbosity::Silent)
    }

    #[test]
    fn ack_byte_flags_data() {
        assert_eq!(SubCommandReply::ack(0x02, vec![1]).ack_byte(), 0x82);
        assert_eq!(SubCommandReply::ack(0x03, Vec::new()).ack_byte(), 0x80);
        assert_eq!(SubCommandReply::nack(0x10).ack_byte(), 0x00);
    }

    #[test]
    fn device_info_reply() {
        let reply = dispatcher().dispatch(DEVICE_INFO, &[]).unwrap();
        assert_eq!(reply.ack_byte(), 0x82);
        assert_eq!(reply.data, DEVICE_INFO_REPLY);
    }

    #[test]
    fn configuration_commands_ack_empty() {
        for code in [0x03, 0x04, 0x08, 0x30, 0x38, 0x40, 0x41, 0x48] {
            let reply = dispatcher().dispatch(code, &[0x01]).unwrap();
            assert_eq!(reply.ack_byte(), ACK, "{code:#04x}");
            assert!(reply.data.is_empty());
        }
    }

    #[test]
    fn flash_read_echoes_address() {
        let reply = dispatcher()
            .dispatch(SPI_FLASH_READ, &[0x50, FACTORY_BANK, 0x00, 0x00, 0x03])
            .unwrap();
        assert_eq!(reply.ack_byte(), 0x90);
        assert_eq!(reply.data, vec![0x50, 0x60, 0x00, 0x00, 0x03, 0x32, 0x32, 0x32]);
    }

    #[test]
    fn flash_read_misses_are_refused() {
        let unknown = dispatcher()
            .dispatch(SPI_FLASH_READ, &[0x00, 0x99, 0x00, 0x00, 0x10])
            .unwrap();
        assert_eq!(unknown.ack_byte(), NACK);
        assert!(unknown.data.is_empty());

        let oversized = dispatcher()
            .dispatch(SPI_FLASH_READ, &[0x00, FACTORY_BANK, 0x00, 0x00, 0x2d])
            .unwrap();
        assert_eq!(oversized.ack_byte(), NACK);
    }

    #[test]
    fn mcu_config_is_always_acknowledged() {
        let reply = dispatcher().dispatch(SET_MCU_CONFIG, &[]).unwrap();
        assert_eq!(reply.ack_byte(), 0xa1);
        assert_eq!(reply.data, MCU_CONFIG_REPLY);
    }

    #[test]
    fn unknown_subcommand_has_no_reply() {
        assert_eq!(dispatcher().dispatch(0x7f, &[]), None);
    }

    #[test]
    fn largest_flash_read_fits_in_one_report() {
        let reply = dispatcher()
            .dispatch(
                SPI_FLASH_READ,
                &[0x00, FACTORY_BANK, 0x00, 0x00, MAX_SPI_READ_LEN as u8],
            )
            .unwrap();
        let report = reply.encode(7, &[0u8; SNAPSHOT_LEN]).unwrap();
        assert_eq!(report[0], SUBCOMMAND_REPLY);
        assert_eq!(report[1], 7);
        assert_eq!(report[13], 0x90);
        assert_eq!(report[14], SPI_FLASH_READ);
        assert_eq!(report[15..20], [0x00, 0x60, 0x00, 0x00, 0x2c]);
    }
}
