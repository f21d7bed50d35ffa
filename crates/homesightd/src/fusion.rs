//! Command fusion — turn one (identity, gesture) pair into device commands.
//!
//! Personal overrides are consulted first across every device; when any
//! override matched the gesture (even as a no-op), the global device rules
//! are skipped for this frame. Commands that would not change device state
//! are dropped.

use homesight_core::Gesture;
use serde::Serialize;

use crate::devices::{Device, DeviceStatus};
use crate::prefs::UserPrefs;

/// What bound the gesture to the command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trigger {
    Personal,
    Global,
    Manual,
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Trigger::Personal => "personal",
            Trigger::Global => "global",
            Trigger::Manual => "manual",
        })
    }
}

/// A state change to apply to one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub device_id: String,
    pub action: DeviceStatus,
    pub trigger: Trigger,
}

/// Resolve the commands a recognized user's gesture implies.
pub fn resolve(
    user: &str,
    gesture: Gesture,
    devices: &[Device],
    prefs: &UserPrefs,
) -> Vec<Command> {
    let label = gesture.label();
    let mut commands = Vec::new();
    let mut personal_matched = false;

    if let Some(rules) = prefs.rules_for(user) {
        for device in devices {
            let Some(pair) = rules.get(&device.id) else {
                continue;
            };
            let action = if pair.on.as_deref() == Some(label) {
                DeviceStatus::On
            } else if pair.off.as_deref() == Some(label) {
                DeviceStatus::Off
            } else {
                continue;
            };
            personal_matched = true;
            if device.status != action {
                commands.push(Command {
                    device_id: device.id.clone(),
                    action,
                    trigger: Trigger::Personal,
                });
            }
        }
    }

    if !personal_matched {
        for device in devices {
            let action = if device.on_gesture == label {
                DeviceStatus::On
            } else if device.off_gesture == label {
                DeviceStatus::Off
            } else {
                continue;
            };
            if device.status != action {
                commands.push(Command {
                    device_id: device.id.clone(),
                    action,
                    trigger: Trigger::Global,
                });
            }
        }
    }

    commands
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prefs::GesturePair;

    fn device(id: &str, status: DeviceStatus, on: &str, off: &str) -> Device {
        Device {
            id: id.into(),
            name: id.to_uppercase(),
            status,
            on_gesture: on.into(),
            off_gesture: off.into(),
            icon: String::new(),
        }
    }

    #[test]
    fn test_global_rule_turns_on() {
        let devices = [device("light", DeviceStatus::Off, "OPEN_HAND", "FIST")];
        let commands = resolve("alice", Gesture::OpenHand, &devices, &UserPrefs::default());
        assert_eq!(
            commands,
            vec![Command {
                device_id: "light".into(),
                action: DeviceStatus::On,
                trigger: Trigger::Global,
            }]
        );
    }

    #[test]
    fn test_noop_command_dropped() {
        let devices = [device("light", DeviceStatus::On, "OPEN_HAND", "FIST")];
        let commands = resolve("alice", Gesture::OpenHand, &devices, &UserPrefs::default());
        assert!(commands.is_empty());
    }

    #[test]
    fn test_unbound_gesture_does_nothing() {
        let devices = [device("light", DeviceStatus::Off, "OPEN_HAND", "FIST")];
        let commands = resolve("alice", Gesture::Rock, &devices, &UserPrefs::default());
        assert!(commands.is_empty());
    }

    #[test]
    fn test_personal_override_beats_global() {
        // Global: OPEN_HAND turns the light on. Alice rebinds OPEN_HAND to
        // the fan; the global light rule must not also fire.
        let devices = [
            device("light", DeviceStatus::Off, "OPEN_HAND", "FIST"),
            device("fan", DeviceStatus::Off, "POINTING", "VICTORY"),
        ];
        let mut prefs = UserPrefs::default();
        prefs.set(
            "alice",
            "fan",
            GesturePair {
                on: Some("OPEN_HAND".into()),
                off: None,
            },
        );

        let commands = resolve("alice", Gesture::OpenHand, &devices, &prefs);
        assert_eq!(
            commands,
            vec![Command {
                device_id: "fan".into(),
                action: DeviceStatus::On,
                trigger: Trigger::Personal,
            }]
        );
    }

    #[test]
    fn test_personal_noop_still_suppresses_global() {
        // Alice's override matches but is a no-op; global rules stay
        // suppressed for this gesture anyway.
        let devices = [
            device("light", DeviceStatus::Off, "OPEN_HAND", "FIST"),
            device("fan", DeviceStatus::On, "POINTING", "VICTORY"),
        ];
        let mut prefs = UserPrefs::default();
        prefs.set(
            "alice",
            "fan",
            GesturePair {
                on: Some("OPEN_HAND".into()),
                off: None,
            },
        );

        let commands = resolve("alice", Gesture::OpenHand, &devices, &prefs);
        assert!(commands.is_empty());
    }

    #[test]
    fn test_other_users_prefs_do_not_apply() {
        let devices = [device("light", DeviceStatus::Off, "OPEN_HAND", "FIST")];
        let mut prefs = UserPrefs::default();
        prefs.set(
            "bob",
            "light",
            GesturePair {
                on: Some("ROCK".into()),
                off: None,
            },
        );

        let commands = resolve("alice", Gesture::OpenHand, &devices, &prefs);
        assert_eq!(commands[0].trigger, Trigger::Global);
    }

    #[test]
    fn test_one_gesture_may_drive_many_devices() {
        let devices = [
            device("light", DeviceStatus::On, "OPEN_HAND", "FIST"),
            device("fan", DeviceStatus::On, "OPEN_HAND", "FIST"),
        ];
        let commands = resolve("alice", Gesture::Fist, &devices, &UserPrefs::default());
        assert_eq!(commands.len(), 2);
        assert!(commands.iter().all(|c| c.action == DeviceStatus::Off));
    }
}
