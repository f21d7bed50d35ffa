//! The engine thread — exclusive owner of the gallery, device registry,
//! preferences and history.
//!
//! All mutation and all per-frame work happen on one dedicated OS thread
//! that drains a request channel; D-Bus handlers hold a clone-safe handle
//! and await oneshot replies. A reader therefore always sees either the
//! pre- or post-registration gallery, never a half-applied write.

use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use homesight_core::frame::FrameError;
use homesight_core::gallery::GalleryError;
use homesight_core::{
    classify, CosineMatcher, Frame, Gesture, IdentityGallery, LoadOutcome, MatchResult, Matcher,
    Perception, QualityGate,
};

use crate::config::Config;
use crate::devices::{Device, DeviceRegistry, DeviceStatus};
use crate::fusion::{self, Command, Trigger};
use crate::history::{Analytics, HistoryStore};
use crate::prefs::{GesturePair, UserPrefs};
use crate::store::StoreError;

/// Identity reported when no gallery entry clears the threshold.
pub const UNKNOWN_IDENTITY: &str = "Unknown";

/// User recorded for manual (non-gesture) device toggles.
const MANUAL_USER: &str = "admin";

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("gallery: {0}")]
    Gallery(#[from] GalleryError),
    #[error("store: {0}")]
    Store(#[from] StoreError),
    #[error("frame: {0}")]
    Frame(#[from] FrameError),
    #[error("engine thread exited")]
    ChannelClosed,
}

/// Overlay geometry for one face, ready for a caller to draw.
#[derive(Debug, Clone, Serialize)]
pub struct FaceOverlay {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    /// "name (score)" for gated faces, the rejection reason otherwise.
    pub label: String,
    pub accepted: bool,
}

/// Frame annotation data handed back to the video caller.
#[derive(Debug, Clone, Serialize)]
pub struct Overlay {
    pub faces: Vec<FaceOverlay>,
    pub caption: Option<String>,
}

/// A device state change that was actually applied.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutedCommand {
    pub device_id: String,
    pub device_name: String,
    pub action: DeviceStatus,
    pub user: String,
    pub trigger: Trigger,
}

/// Everything one frame produced.
#[derive(Debug, Clone, Serialize)]
pub struct FrameReport {
    pub identity: String,
    pub best_score: f32,
    pub gesture: Option<Gesture>,
    pub overlay: Overlay,
    pub commands: Vec<ExecutedCommand>,
}

/// Daemon state summary for the Status call.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub backend: String,
    pub users: Vec<String>,
    pub devices: usize,
    /// True when the persisted gallery was unreadable at startup and the
    /// daemon recovered to an empty one.
    pub gallery_recovered: bool,
    pub last_action: Option<String>,
}

enum EngineRequest {
    ProcessFrame {
        frame: Frame,
        reply: oneshot::Sender<FrameReport>,
    },
    RegisterImage {
        name: String,
        image: Vec<u8>,
        reply: oneshot::Sender<Result<bool, EngineError>>,
    },
    RemoveUser {
        name: String,
        reply: oneshot::Sender<Result<bool, EngineError>>,
    },
    ListUsers {
        reply: oneshot::Sender<Vec<String>>,
    },
    ListDevices {
        reply: oneshot::Sender<Vec<Device>>,
    },
    AddDevice {
        device: Device,
        reply: oneshot::Sender<Result<bool, EngineError>>,
    },
    RemoveDevice {
        id: String,
        reply: oneshot::Sender<Result<bool, EngineError>>,
    },
    ToggleDevice {
        id: String,
        action: DeviceStatus,
        reply: oneshot::Sender<Result<Option<ExecutedCommand>, EngineError>>,
    },
    SetUserPref {
        user: String,
        device_id: String,
        pair: GesturePair,
        reply: oneshot::Sender<Result<(), EngineError>>,
    },
    GetUserPref {
        user: String,
        reply: oneshot::Sender<BTreeMap<String, GesturePair>>,
    },
    Analytics {
        reply: oneshot::Sender<Result<Analytics, EngineError>>,
    },
    Status {
        reply: oneshot::Sender<StatusReport>,
    },
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> EngineRequest,
    ) -> Result<T, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(build(reply_tx))
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)
    }

    /// Run one frame through the full pipeline.
    pub async fn process_frame(&self, frame: Frame) -> Result<FrameReport, EngineError> {
        self.request(|reply| EngineRequest::ProcessFrame { frame, reply })
            .await
    }

    /// Register an identity from an encoded photo. False when no usable
    /// face was found.
    pub async fn register_image(&self, name: String, image: Vec<u8>) -> Result<bool, EngineError> {
        self.request(|reply| EngineRequest::RegisterImage { name, image, reply })
            .await?
    }

    pub async fn remove_user(&self, name: String) -> Result<bool, EngineError> {
        self.request(|reply| EngineRequest::RemoveUser { name, reply })
            .await?
    }

    pub async fn list_users(&self) -> Result<Vec<String>, EngineError> {
        self.request(|reply| EngineRequest::ListUsers { reply }).await
    }

    pub async fn list_devices(&self) -> Result<Vec<Device>, EngineError> {
        self.request(|reply| EngineRequest::ListDevices { reply })
            .await
    }

    pub async fn add_device(&self, device: Device) -> Result<bool, EngineError> {
        self.request(|reply| EngineRequest::AddDevice { device, reply })
            .await?
    }

    pub async fn remove_device(&self, id: String) -> Result<bool, EngineError> {
        self.request(|reply| EngineRequest::RemoveDevice { id, reply })
            .await?
    }

    pub async fn toggle_device(
        &self,
        id: String,
        action: DeviceStatus,
    ) -> Result<Option<ExecutedCommand>, EngineError> {
        self.request(|reply| EngineRequest::ToggleDevice { id, action, reply })
            .await?
    }

    pub async fn set_user_pref(
        &self,
        user: String,
        device_id: String,
        pair: GesturePair,
    ) -> Result<(), EngineError> {
        self.request(|reply| EngineRequest::SetUserPref {
            user,
            device_id,
            pair,
            reply,
        })
        .await?
    }

    pub async fn get_user_pref(
        &self,
        user: String,
    ) -> Result<BTreeMap<String, GesturePair>, EngineError> {
        self.request(|reply| EngineRequest::GetUserPref { user, reply })
            .await
    }

    pub async fn analytics(&self) -> Result<Analytics, EngineError> {
        self.request(|reply| EngineRequest::Analytics { reply }).await?
    }

    pub async fn status(&self) -> Result<StatusReport, EngineError> {
        self.request(|reply| EngineRequest::Status { reply }).await
    }
}

/// Spawn the engine on a dedicated OS thread.
///
/// Loads all persisted state synchronously (fail-fast for the stores that
/// must be writable), then enters the request loop.
pub fn spawn_engine(config: &Config, perception: Perception) -> Result<EngineHandle, EngineError> {
    let mut engine = Engine::new(config, perception)?;
    let (tx, mut rx) = mpsc::channel::<EngineRequest>(16);

    std::thread::Builder::new()
        .name("homesight-engine".into())
        .spawn(move || {
            tracing::info!("engine thread started");
            while let Some(request) = rx.blocking_recv() {
                engine.handle(request);
            }
            tracing::info!("engine thread exiting");
        })
        .expect("failed to spawn engine thread");

    Ok(EngineHandle { tx })
}

struct Engine {
    perception: Perception,
    gate: QualityGate,
    matcher: CosineMatcher,
    match_threshold: f32,
    gallery: IdentityGallery,
    gallery_recovered: bool,
    devices: DeviceRegistry,
    prefs: UserPrefs,
    history: HistoryStore,
    backend: String,
    gallery_path: std::path::PathBuf,
    devices_path: std::path::PathBuf,
    prefs_path: std::path::PathBuf,
}

impl Engine {
    fn new(config: &Config, perception: Perception) -> Result<Self, EngineError> {
        std::fs::create_dir_all(&config.data_dir).map_err(StoreError::Io)?;

        let (gallery, outcome) = IdentityGallery::load(&config.gallery_path);
        match &outcome {
            LoadOutcome::Fresh => tracing::info!("no persisted gallery, starting empty"),
            LoadOutcome::Loaded(n) => tracing::info!(entries = n, "gallery loaded"),
            LoadOutcome::Recovered { backup } => tracing::warn!(
                backup = ?backup,
                "gallery was unreadable; prior registrations were set aside"
            ),
        }

        let devices = DeviceRegistry::load_or_seed(&config.devices_path)?;
        let prefs = UserPrefs::load(&config.prefs_path);
        let history = HistoryStore::open(&config.history_db_path)?;

        Ok(Self {
            perception,
            gate: QualityGate::new(config.sharpness_floor),
            matcher: CosineMatcher,
            match_threshold: config.match_threshold,
            gallery,
            gallery_recovered: matches!(outcome, LoadOutcome::Recovered { .. }),
            devices,
            prefs,
            history,
            backend: config.backend.clone(),
            gallery_path: config.gallery_path.clone(),
            devices_path: config.devices_path.clone(),
            prefs_path: config.prefs_path.clone(),
        })
    }

    fn handle(&mut self, request: EngineRequest) {
        match request {
            EngineRequest::ProcessFrame { frame, reply } => {
                let _ = reply.send(self.process_frame(&frame));
            }
            EngineRequest::RegisterImage { name, image, reply } => {
                let _ = reply.send(self.register_image(&name, &image));
            }
            EngineRequest::RemoveUser { name, reply } => {
                let _ = reply.send(self.remove_user(&name));
            }
            EngineRequest::ListUsers { reply } => {
                let _ = reply.send(self.gallery.names());
            }
            EngineRequest::ListDevices { reply } => {
                let _ = reply.send(self.devices.list().to_vec());
            }
            EngineRequest::AddDevice { device, reply } => {
                let _ = reply.send(self.add_device(device));
            }
            EngineRequest::RemoveDevice { id, reply } => {
                let _ = reply.send(self.remove_device(&id));
            }
            EngineRequest::ToggleDevice { id, action, reply } => {
                let _ = reply.send(self.toggle_device(&id, action));
            }
            EngineRequest::SetUserPref {
                user,
                device_id,
                pair,
                reply,
            } => {
                let _ = reply.send(self.set_user_pref(&user, &device_id, pair));
            }
            EngineRequest::GetUserPref { user, reply } => {
                let rules = self.prefs.rules_for(&user).cloned().unwrap_or_default();
                let _ = reply.send(rules);
            }
            EngineRequest::Analytics { reply } => {
                let _ = reply.send(self.history.analytics().map_err(EngineError::from));
            }
            EngineRequest::Status { reply } => {
                let _ = reply.send(self.status());
            }
        }
    }

    /// The per-frame pipeline: detect → gate → embed → match, and
    /// independently landmark → classify, then fuse into commands.
    ///
    /// Nothing here is fatal — store write failures are logged and the
    /// frame still reports.
    fn process_frame(&mut self, frame: &Frame) -> FrameReport {
        let mut faces = Vec::new();
        let mut best: Option<MatchResult> = None;

        for face in self.perception.detector.detect(frame) {
            let verdict = self.gate.evaluate(frame, &face);
            if !verdict.is_accepted() {
                tracing::debug!(reason = %verdict, "face rejected by quality gate");
                faces.push(FaceOverlay {
                    x: face.x,
                    y: face.y,
                    width: face.width,
                    height: face.height,
                    label: verdict.to_string(),
                    accepted: false,
                });
                continue;
            }

            let Some(embedding) = self.perception.embedder.embed(frame, &face) else {
                faces.push(FaceOverlay {
                    x: face.x,
                    y: face.y,
                    width: face.width,
                    height: face.height,
                    label: "no embedding".into(),
                    accepted: false,
                });
                continue;
            };

            let result = self
                .matcher
                .compare(&embedding, &self.gallery, self.match_threshold);
            let display = result.name.as_deref().unwrap_or(UNKNOWN_IDENTITY);
            faces.push(FaceOverlay {
                x: face.x,
                y: face.y,
                width: face.width,
                height: face.height,
                label: format!("{display} ({:.2})", result.score),
                accepted: true,
            });

            if best.as_ref().map_or(true, |b| result.score > b.score) {
                best = Some(result);
            }
        }

        let (identity, best_score) = match best {
            Some(result) => (
                result.name.unwrap_or_else(|| UNKNOWN_IDENTITY.to_string()),
                result.score,
            ),
            None => (UNKNOWN_IDENTITY.to_string(), 0.0),
        };

        // One hand at a time: when the detector reports several, each is
        // classified and the last result stands.
        let mut gesture = None;
        for hand in self.perception.hands.detect(frame) {
            gesture = classify(&hand);
        }

        let commands = match gesture {
            Some(g) if identity != UNKNOWN_IDENTITY => {
                let resolved = fusion::resolve(&identity, g, self.devices.list(), &self.prefs);
                self.execute(&identity, resolved)
            }
            _ => Vec::new(),
        };

        FrameReport {
            overlay: Overlay {
                faces,
                caption: gesture.map(|g| format!("CMD: {g}")),
            },
            identity,
            best_score,
            gesture,
            commands,
        }
    }

    /// Apply resolved commands: flip the device, persist, log history.
    fn execute(&mut self, user: &str, commands: Vec<Command>) -> Vec<ExecutedCommand> {
        let mut executed = Vec::new();
        for command in commands {
            if self.devices.set_status(&command.device_id, command.action) != Some(true) {
                continue;
            }
            let device_name = self
                .devices
                .get(&command.device_id)
                .map(|d| d.name.clone())
                .unwrap_or_default();

            if let Err(e) = self.devices.save(&self.devices_path) {
                tracing::warn!(error = %e, "device registry save failed");
            }
            let action_text = format!("{} {device_name}", command.action);
            if let Err(e) = self.history.record(user, &action_text, command.trigger) {
                tracing::warn!(error = %e, "history append failed");
            }

            tracing::info!(
                user,
                device = %command.device_id,
                action = %command.action,
                trigger = %command.trigger,
                "command dispatched"
            );
            executed.push(ExecutedCommand {
                device_id: command.device_id,
                device_name,
                action: command.action,
                user: user.to_string(),
                trigger: command.trigger,
            });
        }
        executed
    }

    fn register_image(&mut self, name: &str, image: &[u8]) -> Result<bool, EngineError> {
        let frame = Frame::decode(image)?;
        self.register(name, &frame)
    }

    /// Registration: first detection → quality gate → embed → insert →
    /// save, all inside this one request. A missing or rejected face is a
    /// false, not an error.
    fn register(&mut self, name: &str, frame: &Frame) -> Result<bool, EngineError> {
        let candidates = self.perception.detector.detect(frame);
        let Some(face) = candidates.first() else {
            tracing::info!(name, "registration: no face detected");
            return Ok(false);
        };

        let verdict = self.gate.evaluate(frame, face);
        if !verdict.is_accepted() {
            tracing::info!(name, reason = %verdict, "registration: face rejected");
            return Ok(false);
        }

        let Some(embedding) = self.perception.embedder.embed(frame, face) else {
            tracing::info!(name, "registration: embedding unavailable");
            return Ok(false);
        };

        self.gallery.insert(name, embedding);
        self.gallery.save(&self.gallery_path)?;
        tracing::info!(name, entries = self.gallery.len(), "identity registered");
        Ok(true)
    }

    fn remove_user(&mut self, name: &str) -> Result<bool, EngineError> {
        if !self.gallery.remove(name) {
            return Ok(false);
        }
        self.gallery.save(&self.gallery_path)?;
        if self.prefs.remove_user(name) {
            self.prefs.save(&self.prefs_path)?;
        }
        tracing::info!(name, "identity removed");
        Ok(true)
    }

    fn add_device(&mut self, device: Device) -> Result<bool, EngineError> {
        let id = device.id.clone();
        if !self.devices.add(device) {
            return Ok(false);
        }
        self.devices.save(&self.devices_path)?;
        tracing::info!(device = %id, "device added");
        Ok(true)
    }

    fn remove_device(&mut self, id: &str) -> Result<bool, EngineError> {
        if !self.devices.remove(id) {
            return Ok(false);
        }
        self.devices.save(&self.devices_path)?;
        tracing::info!(device = %id, "device removed");
        Ok(true)
    }

    fn toggle_device(
        &mut self,
        id: &str,
        action: DeviceStatus,
    ) -> Result<Option<ExecutedCommand>, EngineError> {
        if self.devices.set_status(id, action) != Some(true) {
            return Ok(None);
        }
        let device_name = self
            .devices
            .get(id)
            .map(|d| d.name.clone())
            .unwrap_or_default();
        self.devices.save(&self.devices_path)?;
        self.history
            .record(MANUAL_USER, &format!("{action} {device_name}"), Trigger::Manual)?;
        tracing::info!(device = %id, %action, "device toggled manually");
        Ok(Some(ExecutedCommand {
            device_id: id.to_string(),
            device_name,
            action,
            user: MANUAL_USER.to_string(),
            trigger: Trigger::Manual,
        }))
    }

    fn set_user_pref(
        &mut self,
        user: &str,
        device_id: &str,
        pair: GesturePair,
    ) -> Result<(), EngineError> {
        self.prefs.set(user, device_id, pair);
        self.prefs.save(&self.prefs_path)?;
        tracing::info!(user, device = %device_id, "user preference saved");
        Ok(())
    }

    fn status(&self) -> StatusReport {
        StatusReport {
            backend: self.backend.clone(),
            users: self.gallery.names(),
            devices: self.devices.list().len(),
            gallery_recovered: self.gallery_recovered,
            last_action: self.history.last_action().unwrap_or_else(|e| {
                tracing::warn!(error = %e, "history read failed");
                None
            }),
        }
    }
}
