//! Append-only platform event log for off-chain observers.

use serde::Serialize;

use crate::types::Address;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    ModuleRegistered {
        module_id: String,
        address: Address,
        dependencies: Vec<String>,
    },
    ModuleInitialized {
        module_id: String,
    },
    ModuleDeactivated {
        module_id: String,
    },
    ModuleReactivated {
        module_id: String,
    },
    ModuleUpgraded {
        module_id: String,
        previous: Address,
        current: Address,
    },
    Paused {
        account: Address,
    },
    Unpaused {
        account: Address,
    },
    RoleGranted {
        role: String,
        account: Address,
        sender: Address,
    },
    RoleRevoked {
        role: String,
        account: Address,
        sender: Address,
    },
    PrimarySourceConfigured {
        token: Address,
        enabled: bool,
    },
    ManualRateSet {
        token: Address,
        #[serde(with = "u128_string")]
        rate: u128,
    },
    ManualRateRemoved {
        token: Address,
    },
    EmergencyRateSet {
        token: Address,
        #[serde(with = "u128_string")]
        rate: u128,
        account: Address,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct PlatformEvent {
    pub id: uuid::Uuid,
    pub sequence: u64,
    pub timestamp: u64,
    #[serde(flatten)]
    pub kind: EventKind,
}

#[derive(Debug, Default)]
pub struct EventLog {
    events: Vec<PlatformEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, timestamp: u64, kind: EventKind) -> &PlatformEvent {
        let sequence = self.events.len() as u64;
        tracing::info!("Event #{}: {:?}", sequence, kind);
        self.events.push(PlatformEvent {
            id: uuid::Uuid::new_v4(),
            sequence,
            timestamp,
            kind,
        });
        &self.events[self.events.len() - 1]
    }

    pub fn all(&self) -> &[PlatformEvent] {
        &self.events
    }

    /// Events with `sequence >= since`.
    pub fn since(&self, since: u64) -> &[PlatformEvent] {
        let start = (since as usize).min(self.events.len());
        &self.events[start..]
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Serializes a `u128` as a decimal string.
mod u128_string {
    use serde::Serializer;

    pub fn serialize<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_and_since() {
        let mut log = EventLog::new();
        log.emit(1, EventKind::ModuleInitialized { module_id: "a".into() });
        log.emit(2, EventKind::ModuleInitialized { module_id: "b".into() });
        log.emit(3, EventKind::ModuleDeactivated { module_id: "a".into() });

        assert_eq!(log.len(), 3);
        assert_eq!(log.since(1).len(), 2);
        assert_eq!(log.since(1)[0].sequence, 1);
        assert!(log.since(99).is_empty());
    }

    #[test]
    fn test_event_json_shape() {
        let mut log = EventLog::new();
        let event = log
            .emit(
                7,
                EventKind::ManualRateSet {
                    token: Address::from_low_u64(1),
                    rate: 10_000_000_000_000_000,
                },
            )
            .clone();
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "manual_rate_set");
        assert_eq!(json["rate"], "10000000000000000");
        assert_eq!(json["timestamp"], 7);
    }
}
