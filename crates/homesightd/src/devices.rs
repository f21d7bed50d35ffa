//! Device registry — the controllable endpoints and their gesture rules.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::store::{self, StoreError};

/// On/off state, serialized in the wire form device rules use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceStatus {
    #[serde(rename = "ON")]
    On,
    #[serde(rename = "OFF")]
    Off,
}

impl std::fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            DeviceStatus::On => "ON",
            DeviceStatus::Off => "OFF",
        })
    }
}

/// One controllable device and its global gesture bindings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub id: String,
    pub name: String,
    pub status: DeviceStatus,
    pub on_gesture: String,
    pub off_gesture: String,
    pub icon: String,
}

/// The device list, persisted as a JSON array.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: Vec<Device>,
}

impl DeviceRegistry {
    /// Load the registry; a missing store is seeded with the default pair
    /// of devices and written back, a malformed one degrades to empty.
    pub fn load_or_seed(path: &Path) -> Result<Self, StoreError> {
        if !path.exists() {
            let registry = Self {
                devices: default_devices(),
            };
            registry.save(path)?;
            tracing::info!(path = %path.display(), "seeded default device registry");
            return Ok(registry);
        }
        Ok(Self {
            devices: store::load_json_or_default(path),
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        store::save_json(path, &self.devices)
    }

    /// Add a device; false if the id is already taken.
    pub fn add(&mut self, device: Device) -> bool {
        if self.devices.iter().any(|d| d.id == device.id) {
            return false;
        }
        self.devices.push(device);
        true
    }

    /// Remove by id; false if no such device.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.devices.len();
        self.devices.retain(|d| d.id != id);
        self.devices.len() != before
    }

    pub fn get(&self, id: &str) -> Option<&Device> {
        self.devices.iter().find(|d| d.id == id)
    }

    /// Set a device's status. `None` for an unknown id, otherwise whether
    /// the status actually changed.
    pub fn set_status(&mut self, id: &str, status: DeviceStatus) -> Option<bool> {
        let device = self.devices.iter_mut().find(|d| d.id == id)?;
        if device.status == status {
            return Some(false);
        }
        device.status = status;
        Some(true)
    }

    pub fn list(&self) -> &[Device] {
        &self.devices
    }
}

fn default_devices() -> Vec<Device> {
    vec![
        Device {
            id: "light".into(),
            name: "Main Light".into(),
            status: DeviceStatus::Off,
            on_gesture: "OPEN_HAND".into(),
            off_gesture: "FIST".into(),
            icon: "fa-lightbulb".into(),
        },
        Device {
            id: "fan".into(),
            name: "Ceiling Fan".into(),
            status: DeviceStatus::Off,
            on_gesture: "POINTING".into(),
            off_gesture: "VICTORY".into(),
            icon: "fa-fan".into(),
        },
    ]
}
