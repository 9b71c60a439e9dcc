//! Device directory
//!
//! Holds the device list fetched once at startup. The snapshot is never
//! refreshed for the lifetime of the process.

use crate::wyze::{DeviceApi, DeviceRecord};
use tracing::{error, info, warn};

#[derive(Debug, Clone, Default)]
pub struct DeviceDirectory {
    devices: Vec<DeviceRecord>,
}

impl DeviceDirectory {
    pub fn new(devices: Vec<DeviceRecord>) -> Self {
        Self { devices }
    }

    /// Fetch the device list; a failed fetch leaves the directory empty
    pub async fn load(api: &dyn DeviceApi) -> Self {
        match api.devices_list().await {
            Ok(devices) => {
                info!("Loaded {} devices from Wyze", devices.len());
                Self::new(devices)
            }
            Err(e) => {
                error!("Error getting the device list from Wyze: {}", e);
                Self::default()
            }
        }
    }

    pub fn list(&self) -> &[DeviceRecord] {
        &self.devices
    }

    /// Record whose mac matches `device_mac`, ignoring ASCII case
    pub fn find(&self, device_mac: &str) -> Option<&DeviceRecord> {
        self.devices
            .iter()
            .find(|device| device.mac().is_some_and(|mac| mac.eq_ignore_ascii_case(device_mac)))
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// One serialized payload per device, in load order
    pub fn inventory_payloads(&self) -> Vec<Vec<u8>> {
        self.devices
            .iter()
            .filter_map(|device| match device.to_payload() {
                Ok(payload) => Some(payload),
                Err(e) => {
                    warn!("Skipping device {:?} in inventory: {}", device.mac(), e);
                    None
                }
            })
            .collect()
    }
}
