//! Bulb control facade
//!
//! Turns the three logical commands into Wyze API calls. Direct on/off calls
//! use the configured model identifier; `toggle` uses the mac and model the
//! service reports for the device.

use crate::directory::DeviceDirectory;
use crate::wyze::{BulbInfo, DeviceApi, WyzeError};
use std::sync::Arc;
use tracing::debug;

/// Brightness and color temperature applied together on power-on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LightLevels {
    pub brightness: i64,
    pub color_temp: i64,
}

pub struct BulbController {
    api: Arc<dyn DeviceApi>,
    device_model: String,
    directory: Option<Arc<DeviceDirectory>>,
}

impl BulbController {
    pub fn new(api: Arc<dyn DeviceApi>, device_model: impl Into<String>) -> Self {
        Self {
            api,
            device_model: device_model.into(),
            directory: None,
        }
    }

    /// Resolve toggle targets from the startup device list when possible,
    /// so only the power state has to be fetched
    pub fn with_directory(mut self, directory: Arc<DeviceDirectory>) -> Self {
        self.directory = Some(directory);
        self
    }

    pub fn device_model(&self) -> &str {
        &self.device_model
    }

    /// Turn the bulb on, applying `levels` instead of a plain power-on when
    /// given. A zero brightness is sent as-is.
    pub async fn turn_on(
        &self,
        device_mac: &str,
        levels: Option<LightLevels>,
    ) -> Result<(), WyzeError> {
        self.power_on(device_mac, &self.device_model, levels).await
    }

    pub async fn turn_off(&self, device_mac: &str) -> Result<(), WyzeError> {
        debug!("Turning bulb {} off", device_mac);
        self.api.turn_off(device_mac, &self.device_model).await
    }

    /// Flip the bulb's current power state
    pub async fn toggle(
        &self,
        device_mac: &str,
        levels: Option<LightLevels>,
    ) -> Result<(), WyzeError> {
        let bulb = self.bulb_info(device_mac).await?;

        if bulb.is_on {
            debug!("Toggling bulb {} to off", bulb.mac);
            self.api.turn_off(&bulb.mac, &bulb.model).await
        } else {
            debug!("Toggling bulb {} to on", bulb.mac);
            self.power_on(&bulb.mac, &bulb.model, levels).await
        }
    }

    async fn bulb_info(&self, device_mac: &str) -> Result<BulbInfo, WyzeError> {
        let known = self
            .directory
            .as_deref()
            .and_then(|directory| directory.find(device_mac))
            .and_then(|record| Some((record.mac()?, record.product_model()?)));

        match known {
            Some((mac, model)) => {
                let is_on = self.api.power_state(mac, model).await?;
                Ok(BulbInfo {
                    mac: mac.to_string(),
                    model: model.to_string(),
                    is_on,
                })
            }
            None => self.api.bulb_info(device_mac).await,
        }
    }

    async fn power_on(
        &self,
        device_mac: &str,
        device_model: &str,
        levels: Option<LightLevels>,
    ) -> Result<(), WyzeError> {
        match levels {
            Some(LightLevels {
                brightness,
                color_temp,
            }) => {
                debug!(
                    "Turning bulb {} on with brightness {} and temperature {}",
                    device_mac, brightness, color_temp
                );
                self.api
                    .set_brightness(device_mac, device_model, brightness)
                    .await?;
                self.api
                    .set_color_temp(device_mac, device_model, color_temp)
                    .await
            }
            None => {
                debug!("Turning bulb {} on", device_mac);
                self.api.turn_on(device_mac, device_model).await
            }
        }
    }
}
