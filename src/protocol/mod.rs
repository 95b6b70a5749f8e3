//! Wire protocol of the wired Pro Controller.
//!
//! The host talks to the controller through two layers:
//!
//! 1. **USB commands** (`0x80 xx`) negotiate the link and switch periodic
//!    input reporting on and off. Handled by [`handshake`].
//! 2. **Sub-commands** ride inside full output reports (`0x01`) and query or
//!    configure the controller itself. Handled by [`subcommand`], which reads
//!    flash contents from [`calibration`].
//!
//! Every byte the controller sends back is a 64-byte report built by [`codec`].

pub mod calibration;
pub mod codec;
pub mod handshake;
pub mod subcommand;

use thiserror::Error;

/// Host → device: USB command.
pub const USB_COMMAND: u8 = 0x80;
/// Device → host: USB command reply.
pub const USB_REPLY: u8 = 0x81;
/// Host → device: rumble data plus a sub-command.
pub const FULL_OUTPUT: u8 = 0x01;
/// Host → device: rumble data only.
pub const RUMBLE_ONLY: u8 = 0x10;
/// Host → device: empty keep-alive.
pub const KEEP_ALIVE: u8 = 0x00;
/// Device → host: input state plus a sub-command reply.
pub const SUBCOMMAND_REPLY: u8 = 0x21;
/// Device → host: periodic full input report.
pub const INPUT_REPORT: u8 = 0x30;

/// Position of the sub-command code inside a full output report.
pub const SUBCOMMAND_OFFSET: usize = 10;

/// Sub-command 0x10 carries offset, bank, two unused bytes and a length.
pub const SPI_READ_ARGS_LEN: usize = 5;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("empty report")]
    Empty,

    #[error("report {report:#04x} needs {needed} bytes, got {got}")]
    TooShort {
        report: u8,
        needed: usize,
        got: usize,
    },
}

/// One decoded report from the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostRequest<'a> {
    UsbCommand(u8),
    SubCommand { code: u8, args: &'a [u8] },
    /// Recognized, carries nothing the emulator acts on.
    Ignored(u8),
    Unknown(u8),
}

impl<'a> HostRequest<'a> {
    pub fn parse(report: &'a [u8]) -> Result<Self, RequestError> {
        let (&id, _) = report.split_first().ok_or(RequestError::Empty)?;

        match id {
            USB_COMMAND => {
                require(report, 2)?;
                Ok(HostRequest::UsbCommand(report[1]))
            }
            FULL_OUTPUT => {
                require(report, SUBCOMMAND_OFFSET + 1)?;
                let code = report[SUBCOMMAND_OFFSET];
                let args = &report[SUBCOMMAND_OFFSET + 1..];
                if code == subcommand::SPI_FLASH_READ {
                    require(report, SUBCOMMAND_OFFSET + 1 + SPI_READ_ARGS_LEN)?;
                }
                Ok(HostRequest::SubCommand { code, args })
            }
            KEEP_ALIVE | RUMBLE_ONLY => Ok(HostRequest::Ignored(id)),
            other => Ok(HostRequest::Unknown(other)),
        }
    }
}

fn require(report: &[u8], needed: usize) -> Result<(), RequestError> {
    if report.len() < needed {
        return Err(RequestError::TooShort {
            report: report[0],
            needed,
            got: report.len(),
        });
    }
    Ok(())
}

/// Lowercase hex dump used by frame tracing.
pub fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_usb_command() {
        assert_eq!(
            HostRequest::parse(&[0x80, 0x02]),
            Ok(HostRequest::UsbCommand(0x02))
        );
    }

    #[test]
    fn parses_subcommand_with_arguments() {
        let mut report = [0u8; 49];
        report[0] = FULL_OUTPUT;
        report[SUBCOMMAND_OFFSET] = 0x10;
        report[11] = 0x3d;
        report[12] = 0x60;
        report[15] = 0x12;

        match HostRequest::parse(&report) {
            Ok(HostRequest::SubCommand { code, args }) => {
                assert_eq!(code, 0x10);
                assert_eq!(&args[..5], &[0x3d, 0x60, 0x00, 0x00, 0x12]);
            }
            other => panic!("unexpected parse result {other:?}"),
        }
    }

    #[test]
    fn rejects_truncated_reports() {
        assert_eq!(HostRequest::parse(&[]), Err(RequestError::Empty));
        assert_eq!(
            HostRequest::parse(&[0x80]),
            Err(RequestError::TooShort {
                report: 0x80,
                needed: 2,
                got: 1
            })
        );
        assert!(HostRequest::parse(&[0x01; 10]).is_err());

        let mut spi = [0u8; 15];
        spi[0] = FULL_OUTPUT;
        spi[SUBCOMMAND_OFFSET] = 0x10;
        assert_eq!(
            HostRequest::parse(&spi),
            Err(RequestError::TooShort {
                report: 0x01,
                needed: 16,
                got: 15
            })
        );
    }

    #[test]
    fn classifies_rumble_and_unknown_reports() {
        assert_eq!(HostRequest::parse(&[0x10, 0, 0]), Ok(HostRequest::Ignored(0x10)));
        assert_eq!(HostRequest::parse(&[0x00]), Ok(HostRequest::Ignored(0x00)));
        assert_eq!(HostRequest::parse(&[0x42]), Ok(HostRequest::Unknown(0x42)));
    }

    #[test]
    fn hex_dump_is_compact() {
        assert_eq!(hex(&[0x81, 0x01, 0x0a]), "81010a");
    }
}
