//! USB command handling (`0x80 xx` reports).

use super::codec::{self, FrameError, REPORT_LEN};
use super::USB_REPLY;

/// Controller type (Pro Controller) followed by the MAC address.
pub const IDENTITY: [u8; 8] = [0x00, 0x03, 0x00, 0x00, 0x5e, 0x00, 0x53, 0x5e];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum UsbCommand {
    /// Request controller type and MAC.
    Status = 0x01,
    /// Handshake at the current baud rate.
    Handshake = 0x02,
    /// Switch to 3 Mbit.
    HighSpeed = 0x03,
    /// Talk HID only: start periodic input reports.
    EnableReports = 0x04,
    /// Back to the default mode: stop periodic input reports.
    DisableReports = 0x05,
}

impl UsbCommand {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x01 => Some(Self::Status),
            0x02 => Some(Self::Handshake),
            0x03 => Some(Self::HighSpeed),
            0x04 => Some(Self::EnableReports),
            0x05 => Some(Self::DisableReports),
            _ => None,
        }
    }
}

/// What the link has to do in response to a USB command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeAction {
    Reply([u8; REPORT_LEN]),
    EnableReports,
    DisableReports,
    Unrecognized(u8),
}

/// Maps a USB command code onto its action.
pub fn handle(code: u8) -> Result<HandshakeAction, FrameError> {
    let action = match UsbCommand::from_code(code) {
        Some(UsbCommand::Status) => HandshakeAction::Reply(codec::frame(USB_REPLY, code, &IDENTITY)?),
        Some(UsbCommand::Handshake) | Some(UsbCommand::HighSpeed) => {
            HandshakeAction::Reply(codec::frame(USB_REPLY, code, &[])?)
        }
        Some(UsbCommand::EnableReports) => HandshakeAction::EnableReports,
        Some(UsbCommand::DisableReports) => HandshakeAction::DisableReports,
        None => HandshakeAction::Unrecognized(code),
    };
    Ok(action)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_replies_with_identity() {
        let HandshakeAction::Reply(report) = handle(0x01).unwrap() else {
            panic!("status must produce a reply");
        };
        assert_eq!(
            &report[..10],
            &[0x81, 0x01, 0x00, 0x03, 0x00, 0x00, 0x5e, 0x00, 0x53, 0x5e]
        );
        assert!(report[10..].iter().all(|b| *b == 0));
    }

    #[test]
    fn baud_rate_steps_reply_empty() {
        for code in [0x02, 0x03] {
            let HandshakeAction::Reply(report) = handle(code).unwrap() else {
                panic!("baud step {code:#04x} must produce a reply");
            };
            assert_eq!(&report[..2], &[0x81, code]);
            assert!(report[2..].iter().all(|b| *b == 0));
        }
    }

    #[test]
    fn report_toggles_and_unknown_codes() {
        assert_eq!(handle(0x04), Ok(HandshakeAction::EnableReports));
        assert_eq!(handle(0x05), Ok(HandshakeAction::DisableReports));
        assert_eq!(handle(0x91), Ok(HandshakeAction::Unrecognized(0x91)));
    }
}
