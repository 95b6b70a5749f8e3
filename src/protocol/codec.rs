//! Report codec: packs live input into wire bytes and frames replies.
//!
//! Every outbound report is exactly [`REPORT_LEN`] bytes. The input snapshot
//! that rides in both periodic (0x30) and reply (0x21) reports is laid out as
//!
//! ```text
//! [0]     connection info (0x81)
//! [1]     right-hand buttons  Y X B A - - R ZR
//! [2]     shared buttons      - + RS LS Home Capture - -
//! [3]     left-hand buttons   Down Up Right Left - - L ZL
//! [4..7]  left stick  (two 12-bit values in 3 bytes)
//! [7..10] right stick
//! [10]    reserved
//! ```

use crate::controller::input::{InputState, StickState};
use thiserror::Error;

/// Size of every report written to the device.
pub const REPORT_LEN: usize = 64;

/// Bytes left for payload after report id and sequence/command byte.
pub const MAX_PAYLOAD_LEN: usize = REPORT_LEN - 2;

/// Size of the encoded input snapshot.
pub const SNAPSHOT_LEN: usize = 11;

/// Battery full, powered over USB.
pub const CONNECTION_INFO: u8 = 0x81;

pub const STICK_CENTER: u16 = 2048;
pub const STICK_MAX: u16 = 0x0fff;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("payload of {len} bytes exceeds the {max} byte report body")]
    PayloadTooLong { len: usize, max: usize },
}

/// Encodes the full 11-byte input snapshot for `state`.
pub fn encode_input_snapshot(state: &InputState) -> [u8; SNAPSHOT_LEN] {
    let left_stick = encode_stick(&state.left_stick);
    let right_stick = encode_stick(&state.right_stick);

    [
        CONNECTION_INFO,
        right_hand_group(state),
        shared_group(state),
        left_hand_group(state),
        left_stick[0],
        left_stick[1],
        left_stick[2],
        right_stick[0],
        right_stick[1],
        right_stick[2],
        0x00,
    ]
}

// Face buttons, R and ZR.
fn right_hand_group(state: &InputState) -> u8 {
    let b = &state.buttons;
    bit(b.y, 0) | bit(b.x, 1) | bit(b.b, 2) | bit(b.a, 3) | bit(b.r, 6) | bit(b.zr, 7)
}

fn shared_group(state: &InputState) -> u8 {
    let b = &state.buttons;
    bit(b.minus, 0)
        | bit(b.plus, 1)
        | bit(state.right_stick.pressed, 2)
        | bit(state.left_stick.pressed, 3)
        | bit(b.home, 4)
        | bit(b.capture, 5)
}

// D-pad, L and ZL.
fn left_hand_group(state: &InputState) -> u8 {
    let d = &state.dpad;
    let b = &state.buttons;
    bit(d.down, 0) | bit(d.up, 1) | bit(d.right, 2) | bit(d.left, 3) | bit(b.l, 6) | bit(b.zl, 7)
}

fn bit(pressed: bool, position: u8) -> u8 {
    u8::from(pressed) << position
}

fn encode_stick(stick: &StickState) -> [u8; 3] {
    pack_12bit_pair(quantize_axis(stick.x), quantize_axis(stick.y))
}

/// Maps a normalized axis in [-1, 1] onto the 12-bit stick range.
///
/// `round((1 + axis) * 2048)` centres at 2048. Results outside the 12-bit
/// range saturate at 0 or 4095 and NaN reads as centred, so out-of-range
/// input can never wrap into the opposite extreme.
pub fn quantize_axis(axis: f64) -> u16 {
    if axis.is_nan() {
        return STICK_CENTER;
    }
    ((1.0 + axis) * 2048.0).round().clamp(0.0, f64::from(STICK_MAX)) as u16
}

/// Packs two 12-bit values into 3 bytes, low nibble first.
pub fn pack_12bit_pair(a: u16, b: u16) -> [u8; 3] {
    [
        (a & 0xff) as u8,
        (((b << 4) & 0xf0) | ((a >> 8) & 0x0f)) as u8,
        ((b >> 4) & 0xff) as u8,
    ]
}

/// Inverse of [`pack_12bit_pair`].
pub fn unpack_12bit_pair(bytes: [u8; 3]) -> (u16, u16) {
    let a = u16::from(bytes[0]) | (u16::from(bytes[1] & 0x0f) << 8);
    let b = (u16::from(bytes[1]) >> 4) | (u16::from(bytes[2]) << 4);
    (a, b)
}

/// Frames `payload` into a zero-padded 64-byte report.
pub fn frame(report_id: u8, seq_or_cmd: u8, payload: &[u8]) -> Result<[u8; REPORT_LEN], FrameError> {
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(FrameError::PayloadTooLong {
            len: payload.len(),
            max: MAX_PAYLOAD_LEN,
        });
    }

    let mut report = [0u8; REPORT_LEN];
    report[0] = report_id;
    report[1] = seq_or_cmd;
    report[2..2 + payload.len()].copy_from_slice(payload);
    Ok(report)
}
