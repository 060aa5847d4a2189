//! VMU configuration.

use serde::{Deserialize, Serialize};

use crate::error::VmuError;
use crate::memory::{FLASH_SIZE, ROM_SIZE};

/// Configuration for creating a [`Vmu`](crate::Vmu).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VmuConfig {
    /// Mask ROM image. Without one the firmware calls are emulated and the
    /// VMU boots straight into flash.
    pub bios: Option<Vec<u8>>,
    /// Initial flash contents.
    pub flash: Option<Vec<u8>>,
    /// Pretend the clock was already set so the BIOS skips its date
    /// screen. Only meaningful with a BIOS image.
    pub skip_bios_setup: bool,
}

impl VmuConfig {
    /// Boot `image` from flash with emulated firmware.
    #[must_use]
    pub fn with_flash(image: Vec<u8>) -> Self {
        Self {
            flash: Some(image),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), VmuError> {
        if let Some(bios) = &self.bios
            && bios.len() > ROM_SIZE
        {
            return Err(VmuError::Config(format!(
                "BIOS image is {} bytes, at most {ROM_SIZE} fit",
                bios.len()
            )));
        }
        if let Some(flash) = &self.flash
            && flash.len() > FLASH_SIZE
        {
            return Err(VmuError::Config(format!(
                "flash image is {} bytes, at most {FLASH_SIZE} fit",
                flash.len()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert!(VmuConfig::default().validate().is_ok());
    }

    #[test]
    fn oversize_images_rejected() {
        let config = VmuConfig {
            bios: Some(vec![0; ROM_SIZE + 1]),
            ..VmuConfig::default()
        };
        assert!(matches!(config.validate(), Err(VmuError::Config(_))));
        assert!(matches!(
            VmuConfig::with_flash(vec![0; FLASH_SIZE + 1]).validate(),
            Err(VmuError::Config(_))
        ));
    }

    #[test]
    fn serde_round_trip() {
        let config = VmuConfig {
            bios: None,
            flash: Some(vec![1, 2, 3]),
            skip_bios_setup: true,
        };
        let json = serde_json::to_string(&config).unwrap();
        let back: VmuConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.flash, Some(vec![1, 2, 3]));
        assert!(back.skip_bios_setup);
    }
}
