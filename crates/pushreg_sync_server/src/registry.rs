//! Server-side device registry.

use parking_lot::RwLock;
use pushreg_protocol::{RegistrationRequest, TrackingBatch, WireEngagement, WireEvent, WirePreference};
use std::collections::{BTreeSet, HashMap};

/// What the server holds for one device.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceRecord {
    /// Hex-encoded push token.
    pub device_token: Option<String>,
    /// Registered user ID.
    pub user_id: Option<String>,
    /// Registered categories.
    pub categories: BTreeSet<String>,
    /// Last preference set received.
    pub preferences: Vec<WirePreference>,
    /// Time zone.
    pub time_zone: Option<String>,
    /// Fingerprint of the last registration.
    pub fingerprint: String,
    /// Number of registrations received for this device.
    pub registrations: u64,
}

/// Devices, engagements and events received by the server.
///
/// The registry maintains:
/// - The current registration of each device
/// - Engagements and events in arrival order
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: RwLock<HashMap<String, DeviceRecord>>,
    engagements: RwLock<Vec<(String, WireEngagement)>>,
    events: RwLock<Vec<(String, WireEvent)>>,
}

impl DeviceRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a registration, replacing the previous one.
    ///
    /// A request without preferences keeps the preferences held before.
    pub fn upsert(&self, request: RegistrationRequest) -> String {
        let mut devices = self.devices.write();
        let previous = devices.remove(&request.device_id);
        let registrations = previous.as_ref().map_or(0, |p| p.registrations) + 1;
        let preferences = match request.preferences {
            Some(prefs) => prefs,
            None => previous.map(|p| p.preferences).unwrap_or_default(),
        };

        let fingerprint = request.fingerprint.clone();
        devices.insert(
            request.device_id,
            DeviceRecord {
                device_token: request.device_token,
                user_id: request.user_id,
                categories: request.categories.into_iter().collect(),
                preferences,
                time_zone: request.time_zone,
                fingerprint: fingerprint.clone(),
                registrations,
            },
        );
        fingerprint
    }

    /// Removes a device. Returns true if it was registered.
    pub fn remove(&self, device_id: &str) -> bool {
        self.devices.write().remove(device_id).is_some()
    }

    /// Returns the record of a device.
    pub fn get(&self, device_id: &str) -> Option<DeviceRecord> {
        self.devices.read().get(device_id).cloned()
    }

    /// Returns the number of registered devices.
    pub fn len(&self) -> usize {
        self.devices.read().len()
    }

    /// Returns true if no device is registered.
    pub fn is_empty(&self) -> bool {
        self.devices.read().is_empty()
    }

    /// Returns the devices registered for `category`, sorted.
    pub fn devices_in_category(&self, category: &str) -> Vec<String> {
        let mut ids: Vec<String> = self
            .devices
            .read()
            .iter()
            .filter(|(_, record)| record.categories.contains(category))
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Returns the devices registered for `user_id`, sorted.
    pub fn devices_for_user(&self, user_id: &str) -> Vec<String> {
        let mut ids: Vec<String> = self
            .devices
            .read()
            .iter()
            .filter(|(_, record)| record.user_id.as_deref() == Some(user_id))
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Appends a tracking batch.
    pub fn record_tracking(&self, batch: TrackingBatch) {
        let device_id = batch.device_id;
        self.engagements.write().extend(
            batch
                .engagements
                .into_iter()
                .map(|e| (device_id.clone(), e)),
        );
        self.events
            .write()
            .extend(batch.events.into_iter().map(|e| (device_id.clone(), e)));
    }

    /// Returns every engagement received, in arrival order.
    pub fn engagements(&self) -> Vec<(String, WireEngagement)> {
        self.engagements.read().clone()
    }

    /// Returns every event received, in arrival order.
    pub fn events(&self) -> Vec<(String, WireEvent)> {
        self.events.read().clone()
    }
}
