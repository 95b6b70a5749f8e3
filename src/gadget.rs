//! USB peripheral activation through configfs.
//!
//! A gadget is active when its `UDC` attribute names a controller. Binding
//! writes the first UDC listed under the class directory; unbinding writes a
//! bare newline.

use std::fs;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum GadgetError {
    #[error("no USB device controller found in {0}")]
    NoUdc(PathBuf),

    #[error("gadget I/O on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Anything that can bind and unbind the HID function to the bus.
pub trait Peripheral: Send + Sync {
    fn is_active(&self) -> bool;
    fn activate(&self) -> Result<(), GadgetError>;
    fn deactivate(&self) -> Result<(), GadgetError>;
    fn name(&self) -> &str;
}

#[derive(Clone, Debug)]
pub struct UsbGadget {
    name: String,
    configfs_root: PathBuf,
    udc_class_root: PathBuf,
}

impl UsbGadget {
    pub fn new(
        name: impl Into<String>,
        configfs_root: impl Into<PathBuf>,
        udc_class_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            configfs_root: configfs_root.into(),
            udc_class_root: udc_class_root.into(),
        }
    }

    fn udc_attribute(&self) -> PathBuf {
        self.configfs_root.join(&self.name).join("UDC")
    }

    fn first_udc(&self) -> Result<String, GadgetError> {
        let io_err = |source| GadgetError::Io {
            path: self.udc_class_root.clone(),
            source,
        };

        let mut names = fs::read_dir(&self.udc_class_root)
            .map_err(io_err)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect::<Vec<_>>();
        names.sort();

        names
            .into_iter()
            .next()
            .ok_or_else(|| GadgetError::NoUdc(self.udc_class_root.clone()))
    }

    fn write_udc(&self, value: &[u8]) -> Result<(), GadgetError> {
        let path = self.udc_attribute();
        fs::write(&path, value).map_err(|source| GadgetError::Io { path, source })
    }
}

impl Peripheral for UsbGadget {
    fn is_active(&self) -> bool {
        match fs::read(self.udc_attribute()) {
            Ok(content) => content.len() > 1,
            Err(e) => {
                debug!("Gadget {} state unreadable: {}", self.name, e);
                false
            }
        }
    }

    fn activate(&self) -> Result<(), GadgetError> {
        let udc = self.first_udc()?;
        self.write_udc(udc.as_bytes())?;
        info!("Bound gadget {} to {}", self.name, udc);
        Ok(())
    }

    fn deactivate(&self) -> Result<(), GadgetError> {
        self.write_udc(b"\n")?;
        info!("Unbound gadget {}", self.name);
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
