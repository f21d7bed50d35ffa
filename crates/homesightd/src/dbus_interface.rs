use zbus::interface;
use zbus::object_server::SignalEmitter;

use homesight_core::Frame;

use crate::devices::DeviceStatus;
use crate::engine::{EngineHandle, ExecutedCommand};
use crate::prefs::GesturePair;

/// D-Bus interface for the Homesight daemon.
///
/// Bus name: dev.homesight.Homesight1
/// Object path: /dev/homesight/Homesight1
///
/// Structured replies are JSON strings; dispatched device commands are
/// additionally announced through the `CommandDispatched` signal, which is
/// the boundary where external notification sinks attach.
pub struct HomesightService {
    engine: EngineHandle,
}

impl HomesightService {
    pub fn new(engine: EngineHandle) -> Self {
        Self { engine }
    }

    async fn announce(
        emitter: &SignalEmitter<'_>,
        command: &ExecutedCommand,
    ) -> zbus::fdo::Result<()> {
        Self::command_dispatched(
            emitter,
            &command.device_id,
            &command.device_name,
            &command.action.to_string(),
            &command.user,
            &command.trigger.to_string(),
        )
        .await
        .map_err(internal)
    }
}

#[interface(name = "dev.homesight.Homesight1")]
impl HomesightService {
    /// Run one raw grayscale frame through the pipeline. Returns the frame
    /// report (identity, gesture, overlay, executed commands) as JSON.
    async fn process_frame(
        &self,
        width: u32,
        height: u32,
        luma: Vec<u8>,
        #[zbus(signal_emitter)] emitter: SignalEmitter<'_>,
    ) -> zbus::fdo::Result<String> {
        let frame = Frame::from_luma(luma, width, height)
            .map_err(|e| zbus::fdo::Error::InvalidArgs(e.to_string()))?;
        let report = self.engine.process_frame(frame).await.map_err(internal)?;
        for command in &report.commands {
            Self::announce(&emitter, command).await?;
        }
        serde_json::to_string(&report).map_err(internal)
    }

    /// Register an identity from an encoded photo (PNG/JPEG bytes).
    /// False when no face was found or the face failed the quality gate.
    async fn register_image(&self, name: &str, image: Vec<u8>) -> zbus::fdo::Result<bool> {
        tracing::info!(name, bytes = image.len(), "register requested");
        self.engine
            .register_image(name.to_string(), image)
            .await
            .map_err(internal)
    }

    /// Remove a registered identity and their gesture overrides.
    async fn remove_user(&self, name: &str) -> zbus::fdo::Result<bool> {
        tracing::info!(name, "remove_user requested");
        self.engine
            .remove_user(name.to_string())
            .await
            .map_err(internal)
    }

    async fn list_users(&self) -> zbus::fdo::Result<Vec<String>> {
        self.engine.list_users().await.map_err(internal)
    }

    /// List devices with their status and gesture rules, as JSON.
    async fn list_devices(&self) -> zbus::fdo::Result<String> {
        let devices = self.engine.list_devices().await.map_err(internal)?;
        serde_json::to_string(&devices).map_err(internal)
    }

    /// Add a device. False when the id is already taken.
    async fn add_device(
        &self,
        id: &str,
        name: &str,
        on_gesture: &str,
        off_gesture: &str,
        icon: &str,
    ) -> zbus::fdo::Result<bool> {
        tracing::info!(id, name, "add_device requested");
        self.engine
            .add_device(crate::devices::Device {
                id: id.to_string(),
                name: name.to_string(),
                status: DeviceStatus::Off,
                on_gesture: on_gesture.to_string(),
                off_gesture: off_gesture.to_string(),
                icon: icon.to_string(),
            })
            .await
            .map_err(internal)
    }

    async fn remove_device(&self, id: &str) -> zbus::fdo::Result<bool> {
        tracing::info!(id, "remove_device requested");
        self.engine.remove_device(id.to_string()).await.map_err(internal)
    }

    /// Manually switch a device. True when the state actually changed.
    async fn toggle_device(
        &self,
        id: &str,
        on: bool,
        #[zbus(signal_emitter)] emitter: SignalEmitter<'_>,
    ) -> zbus::fdo::Result<bool> {
        let action = if on { DeviceStatus::On } else { DeviceStatus::Off };
        let executed = self
            .engine
            .toggle_device(id.to_string(), action)
            .await
            .map_err(internal)?;
        match executed {
            Some(command) => {
                Self::announce(&emitter, &command).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Bind a user's personal on/off gestures for one device. Empty
    /// strings leave that side unbound.
    async fn set_user_pref(
        &self,
        user: &str,
        device_id: &str,
        on_gesture: &str,
        off_gesture: &str,
    ) -> zbus::fdo::Result<()> {
        let pair = GesturePair {
            on: non_empty(on_gesture),
            off: non_empty(off_gesture),
        };
        self.engine
            .set_user_pref(user.to_string(), device_id.to_string(), pair)
            .await
            .map_err(internal)
    }

    /// A user's overrides (device id → on/off gestures), as JSON.
    async fn get_user_pref(&self, user: &str) -> zbus::fdo::Result<String> {
        let rules = self.engine.get_user_pref(user.to_string()).await.map_err(internal)?;
        serde_json::to_string(&rules).map_err(internal)
    }

    /// History aggregates in chart shape: per-user and per-hour counts.
    async fn analytics(&self) -> zbus::fdo::Result<String> {
        let analytics = self.engine.analytics().await.map_err(internal)?;
        let hours: Vec<String> = (0..24).map(|h| format!("{h}h")).collect();
        Ok(serde_json::json!({
            "users": { "labels": analytics.user_labels, "data": analytics.user_counts },
            "hours": { "labels": hours, "data": analytics.hour_counts.to_vec() },
        })
        .to_string())
    }

    /// Daemon status information.
    async fn status(&self) -> zbus::fdo::Result<String> {
        let status = self.engine.status().await.map_err(internal)?;
        Ok(serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "backend": status.backend,
            "users": status.users,
            "devices": status.devices,
            "gallery_recovered": status.gallery_recovered,
            "last_action": status.last_action,
        })
        .to_string())
    }

    /// Emitted for every executed device command, gesture-driven or manual.
    #[zbus(signal)]
    async fn command_dispatched(
        emitter: &SignalEmitter<'_>,
        device_id: &str,
        device_name: &str,
        action: &str,
        user: &str,
        method: &str,
    ) -> zbus::Result<()>;
}

fn internal(e: impl std::fmt::Display) -> zbus::fdo::Error {
    zbus::fdo::Error::Failed(e.to_string())
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}
