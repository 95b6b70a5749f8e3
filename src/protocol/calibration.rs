//! Emulated SPI flash: the calibration pages a genuine controller answers
//! sub-command 0x10 from.

use std::collections::HashMap;
use std::sync::OnceLock;
use thiserror::Error;

/// Factory page (serial, IMU factory calibration, colours, stick parameters).
pub const FACTORY_BANK: u8 = 0x60;

/// User calibration page.
pub const USER_BANK: u8 = 0x80;

const FACTORY_PAGE: [u8; 176] = [
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0xff, 0xff, 0x03, 0xa0, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x02, 0xff, 0xff, 0xff, 0xff,
    0xf0, 0xff, 0x89, 0x00, 0xf0, 0x01, 0x00, 0x40, 0x00, 0x40, 0x00, 0x40, 0xf9, 0xff, 0x06, 0x00,
    0x09, 0x00, 0xe7, 0x3b, 0xe7, 0x3b, 0xe7, 0x3b, 0xff, 0xff, 0xff, 0xff, 0xff, 0xba, 0x15, 0x62,
    0x11, 0xb8, 0x7f, 0x29, 0x06, 0x5b, 0xff, 0xe7, 0x7e, 0x0e, 0x36, 0x56, 0x9e, 0x85, 0x60, 0xff,
    0x32, 0x32, 0x32, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0x50, 0xfd, 0x00, 0x00, 0xc6, 0x0f, 0x0f, 0x30, 0x61, 0x96, 0x30, 0xf3, 0xd4, 0x14, 0x54, 0x41,
    0x15, 0x54, 0xc7, 0x79, 0x9c, 0x33, 0x36, 0x63, 0x0f, 0x30, 0x61, 0x96, 0x30, 0xf3, 0xd4, 0x14,
    0x54, 0x41, 0x15, 0x54, 0xc7, 0x79, 0x9c, 0x33, 0x36, 0x63, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
];

const USER_PAGE: [u8; 64] = [
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xb2, 0xa1, 0xbe, 0xff, 0x3e, 0x00, 0xf0, 0x01, 0x00, 0x40,
    0x00, 0x40, 0x00, 0x40, 0xfe, 0xff, 0xfe, 0xff, 0x08, 0x00, 0xe7, 0x3b, 0xe7, 0x3b, 0xe7, 0x3b,
];

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CalibrationError {
    #[error("no calibration data at bank {bank:#04x}, offset {offset:#04x}, length {length}")]
    NotFound { bank: u8, offset: u8, length: u8 },
}

/// Read-only bank → page lookup.
#[derive(Debug, Clone)]
pub struct CalibrationStore {
    banks: HashMap<u8, &'static [u8]>,
}

impl CalibrationStore {
    /// The process-wide store seeded with the factory and user pages.
    pub fn global() -> &'static CalibrationStore {
        static STORE: OnceLock<CalibrationStore> = OnceLock::new();
        STORE.get_or_init(|| {
            CalibrationStore::from_banks([
                (FACTORY_BANK, &FACTORY_PAGE[..]),
                (USER_BANK, &USER_PAGE[..]),
            ])
        })
    }

    pub fn from_banks(banks: impl IntoIterator<Item = (u8, &'static [u8])>) -> Self {
        Self {
            banks: banks.into_iter().collect(),
        }
    }

    /// Returns `length` bytes at `offset` within `bank`.
    ///
    /// Unknown banks and ranges running past the end of a page both report
    /// [`CalibrationError::NotFound`].
    pub fn read(&self, bank: u8, offset: u8, length: u8) -> Result<&'static [u8], CalibrationError> {
        let not_found = CalibrationError::NotFound {
            bank,
            offset,
            length,
        };
        let page = self.banks.get(&bank).ok_or_else(|| not_found.clone())?;
        let start = usize::from(offset);
        let end = start + usize::from(length);
        page.get(start..end).ok_or(not_found)
    }
}
