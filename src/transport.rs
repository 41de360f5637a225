//! Boundary to the mesh stack that actually moves bytes.
//!
//! The engine hands over fully encoded status payloads. Addressing, keys and
//! segmentation belong to the implementation of [`Transport`].

use crate::core::{ElementId, MeshAddress, ModelKind};
use std::sync::{Arc, Mutex, MutexGuard};

/// TTL value asking the stack to use its configured default.
pub const DEFAULT_TTL: u8 = 0xFF;

/// Lower bound of the random response delay, in milliseconds.
pub const RESPONSE_MIN_DELAY_MS: u32 = 20;

/// Upper bound of the response delay when the request was sent to a unicast address.
pub const RESPONSE_MAX_DELAY_UNICAST_MS: u32 = 50;

/// Upper bound of the response delay for group and virtual destinations.
pub const RESPONSE_MAX_DELAY_GROUP_MS: u32 = 500;

/// Point-to-point message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendInfo {
    pub element: ElementId,
    pub model: ModelKind,
    pub dst: MeshAddress,
    pub app_key_index: u16,
    pub ttl: u8,
    pub payload: Vec<u8>,
    pub min_delay_ms: u32,
    pub max_delay_ms: u32,
}

/// Message to the model's publish address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishInfo {
    pub element: ElementId,
    pub model: ModelKind,
    pub payload: Vec<u8>,
}

/// Outbound primitives of the mesh stack.
pub trait Transport: Send {
    fn send(&mut self, info: SendInfo);
    fn publish(&mut self, info: PublishInfo);
}

/// Transport that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullTransport;

impl Transport for NullTransport {
    fn send(&mut self, _info: SendInfo) {}
    fn publish(&mut self, _info: PublishInfo) {}
}

/// Message captured by [`RecordingTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Sent(SendInfo),
    Published(PublishInfo),
}

impl Outbound {
    pub fn element(&self) -> ElementId {
        match self {
            Self::Sent(info) => info.element,
            Self::Published(info) => info.element,
        }
    }

    pub fn payload(&self) -> &[u8] {
        match self {
            Self::Sent(info) => &info.payload,
            Self::Published(info) => &info.payload,
        }
    }
}

/// Transport that records every message in order.
///
/// Clones share the same log, so a test keeps one handle and gives the other
/// to the engine.
#[derive(Debug, Default, Clone)]
pub struct RecordingTransport {
    log: Arc<Mutex<Vec<Outbound>>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Outbound>> {
        // A poisoned log still holds every message recorded before the panic.
        self.log.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn messages(&self) -> Vec<Outbound> {
        self.lock().clone()
    }

    pub fn published(&self) -> Vec<PublishInfo> {
        self.lock()
            .iter()
            .filter_map(|m| match m {
                Outbound::Published(info) => Some(info.clone()),
                Outbound::Sent(_) => None,
            })
            .collect()
    }

    pub fn sent(&self) -> Vec<SendInfo> {
        self.lock()
            .iter()
            .filter_map(|m| match m {
                Outbound::Sent(info) => Some(info.clone()),
                Outbound::Published(_) => None,
            })
            .collect()
    }

    /// Remove and return everything recorded so far.
    pub fn take(&self) -> Vec<Outbound> {
        std::mem::take(&mut *self.lock())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl Transport for RecordingTransport {
    fn send(&mut self, info: SendInfo) {
        self.lock().push(Outbound::Sent(info));
    }

    fn publish(&mut self, info: PublishInfo) {
        self.lock().push(Outbound::Published(info));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_log() {
        let handle = RecordingTransport::new();
        let mut engine_side = handle.clone();

        engine_side.publish(PublishInfo {
            element: 3,
            model: ModelKind::GenOnOff,
            payload: vec![0x01],
        });

        assert_eq!(handle.published().len(), 1);
        assert!(handle.sent().is_empty());
        assert_eq!(handle.take().len(), 1);
        assert!(handle.is_empty());
    }
}
