//! ## mqttrace-core::classifier
//! **Best-effort classification of outbound frames**
//!
//! Frames are first handed to the strict decoder. Frames it rejects (connect
//! handshakes, disconnects, fragments) are classified from their first
//! bytes instead, so every write can still be reported.

use mqttrace_protocols::{Message, MessageType, PacketDecoder, DISCONNECT_PACKET};
use serde::Serialize;

use crate::policy::Content;

/// Coarse interpretation of a wire buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PacketKind {
    Connect,
    Disconnect,
    Decoded(Message),
    Unknown,
}

/// Result of classifying one outbound buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedPacket {
    pub kind: PacketKind,
    pub raw_length: usize,
}

impl ClassifiedPacket {
    /// Type key reported in telemetry, e.g. `PUBLISH` or `UNKNOWN`.
    pub fn type_key(&self) -> &'static str {
        match &self.kind {
            PacketKind::Connect => MessageType::Connect.key(),
            PacketKind::Disconnect => MessageType::Disconnect.key(),
            PacketKind::Decoded(message) => message.message_type().key(),
            PacketKind::Unknown => "UNKNOWN",
        }
    }

    pub fn topic(&self) -> Option<&str> {
        match &self.kind {
            PacketKind::Decoded(message) => message.topic(),
            _ => None,
        }
    }

    /// Body reported for this packet. Handshake and unknown frames report
    /// the raw bytes; a disconnect has none.
    pub fn content<'a>(&'a self, raw: &'a [u8]) -> Content<'a> {
        match &self.kind {
            PacketKind::Connect | PacketKind::Unknown => Content::Raw(raw),
            PacketKind::Disconnect => Content::Omitted,
            PacketKind::Decoded(message) => Content::Decoded(message.content().map(|c| c.as_ref())),
        }
    }

    pub fn metadata(&self) -> PacketMetadata {
        match &self.kind {
            PacketKind::Decoded(message) => PacketMetadata::from_message(message),
            _ => PacketMetadata::bare(self.type_key()),
        }
    }
}

/// Protocol metadata snapshot; serialized into the headers field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PacketMetadata {
    #[serde(rename = "type")]
    pub packet_type: String,
    pub quality_of_service: u8,
    pub message_id: Option<u16>,
    pub topic: Option<String>,
    pub acknowledged_quality_of_services: Vec<u8>,
}

impl PacketMetadata {
    pub fn from_message(message: &Message) -> Self {
        Self {
            packet_type: message.message_type().key().to_owned(),
            quality_of_service: message.quality_of_service(),
            message_id: message.message_id(),
            topic: message.topic().map(str::to_owned),
            acknowledged_quality_of_services: message.acknowledged_quality_of_services().to_vec(),
        }
    }

    fn bare(packet_type: &str) -> Self {
        Self {
            packet_type: packet_type.to_owned(),
            quality_of_service: 0,
            message_id: None,
            topic: None,
            acknowledged_quality_of_services: Vec::new(),
        }
    }
}

pub struct PacketClassifier {
    decoder: Box<dyn PacketDecoder>,
}

impl PacketClassifier {
    pub fn new(decoder: impl PacketDecoder + 'static) -> Self {
        Self {
            decoder: Box::new(decoder),
        }
    }

    /// Never fails: decode errors resolve to `Connect`, `Disconnect` or
    /// `Unknown`.
    pub fn classify(&self, data: &[u8]) -> ClassifiedPacket {
        let kind = match self.decoder.decode(data) {
            Ok(message) => PacketKind::Decoded(message),
            Err(error) => {
                tracing::debug!(%error, length = data.len(), "strict decode failed, classifying by header");
                match data.first() {
                    Some(first) if first >> 4 == MessageType::Connect.control_nibble() => {
                        PacketKind::Connect
                    }
                    _ if data == DISCONNECT_PACKET => PacketKind::Disconnect,
                    _ => PacketKind::Unknown,
                }
            }
        };

        ClassifiedPacket {
            kind,
            raw_length: data.len(),
        }
    }
}
