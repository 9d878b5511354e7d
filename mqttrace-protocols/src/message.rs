//! ## mqttrace-protocols::message
//! Decoded MQTT control packets as seen by the message processor.

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// MQTT control packet types, keyed by the high nibble of the fixed header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    Connect = 1,
    ConnectAcknowledgement = 2,
    Publish = 3,
    PublishAcknowledgement = 4,
    PublishReceipt = 5,
    PublishRelease = 6,
    PublishComplete = 7,
    Subscribe = 8,
    SubscribeAcknowledgement = 9,
    Unsubscribe = 10,
    UnsubscribeAcknowledgement = 11,
    PingRequest = 12,
    PingResponse = 13,
    Disconnect = 14,
}

impl MessageType {
    /// Maps a control packet nibble (0-15) to its type. 0 and 15 are reserved
    /// in MQTT 3.x and yield `None`.
    pub fn from_control_nibble(nibble: u8) -> Option<Self> {
        let message_type = match nibble {
            1 => Self::Connect,
            2 => Self::ConnectAcknowledgement,
            3 => Self::Publish,
            4 => Self::PublishAcknowledgement,
            5 => Self::PublishReceipt,
            6 => Self::PublishRelease,
            7 => Self::PublishComplete,
            8 => Self::Subscribe,
            9 => Self::SubscribeAcknowledgement,
            10 => Self::Unsubscribe,
            11 => Self::UnsubscribeAcknowledgement,
            12 => Self::PingRequest,
            13 => Self::PingResponse,
            14 => Self::Disconnect,
            _ => return None,
        };
        Some(message_type)
    }

    #[inline]
    pub fn control_nibble(self) -> u8 {
        self as u8
    }

    /// Protocol key name, e.g. `PUBLISH_ACKNOWLEDGEMENT`.
    pub fn key(self) -> &'static str {
        match self {
            Self::Connect => "CONNECT",
            Self::ConnectAcknowledgement => "CONNECT_ACKNOWLEDGEMENT",
            Self::Publish => "PUBLISH",
            Self::PublishAcknowledgement => "PUBLISH_ACKNOWLEDGEMENT",
            Self::PublishReceipt => "PUBLISH_RECEIPT",
            Self::PublishRelease => "PUBLISH_RELEASE",
            Self::PublishComplete => "PUBLISH_COMPLETE",
            Self::Subscribe => "SUBSCRIBE",
            Self::SubscribeAcknowledgement => "SUBSCRIBE_ACKNOWLEDGEMENT",
            Self::Unsubscribe => "UNSUBSCRIBE",
            Self::UnsubscribeAcknowledgement => "UNSUBSCRIBE_ACKNOWLEDGEMENT",
            Self::PingRequest => "PING_REQUEST",
            Self::PingResponse => "PING_RESPONSE",
            Self::Disconnect => "DISCONNECT",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// MQTT protocol revision spoken by the client.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProtocolVersion {
    #[default]
    #[serde(rename = "3.1")]
    V31,
    #[serde(rename = "3.1.1")]
    V311,
}

impl ProtocolVersion {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::V31 => "3.1",
            Self::V311 => "3.1.1",
        }
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProtocolVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "3.1" | "31" => Ok(Self::V31),
            "3.1.1" | "311" => Ok(Self::V311),
            other => Err(format!("unsupported MQTT protocol version '{}'", other)),
        }
    }
}

/// A decoded MQTT control packet.
///
/// Only the parts relevant to instrumentation are kept: type, delivery
/// guarantee, identifiers and the application payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    message_type: MessageType,
    quality_of_service: u8,
    message_id: Option<u16>,
    topic: Option<String>,
    content: Option<Bytes>,
    acknowledged_quality_of_services: Vec<u8>,
    retained: bool,
    duplicate: bool,
}

impl Message {
    pub fn new(message_type: MessageType) -> Self {
        Self {
            message_type,
            quality_of_service: 0,
            message_id: None,
            topic: None,
            content: None,
            acknowledged_quality_of_services: Vec::new(),
            retained: false,
            duplicate: false,
        }
    }

    pub fn with_quality_of_service(mut self, qos: u8) -> Self {
        self.quality_of_service = qos;
        self
    }

    pub fn with_message_id(mut self, message_id: u16) -> Self {
        self.message_id = Some(message_id);
        self
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    pub fn with_content(mut self, content: impl Into<Bytes>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_acknowledged_quality_of_services(mut self, qos: Vec<u8>) -> Self {
        self.acknowledged_quality_of_services = qos;
        self
    }

    pub fn with_retained(mut self, retained: bool) -> Self {
        self.retained = retained;
        self
    }

    /// Marks a PUBLISH as a redelivery (DUP flag).
    pub fn with_duplicate(mut self, duplicate: bool) -> Self {
        self.duplicate = duplicate;
        self
    }

    pub fn message_type(&self) -> MessageType {
        self.message_type
    }

    pub fn quality_of_service(&self) -> u8 {
        self.quality_of_service
    }

    pub fn message_id(&self) -> Option<u16> {
        self.message_id
    }

    pub fn topic(&self) -> Option<&str> {
        self.topic.as_deref()
    }

    /// Raw application payload, if the packet type carries one.
    pub fn content(&self) -> Option<&Bytes> {
        self.content.as_ref()
    }

    pub fn acknowledged_quality_of_services(&self) -> &[u8] {
        &self.acknowledged_quality_of_services
    }

    pub fn retained(&self) -> bool {
        self.retained
    }

    pub fn duplicate(&self) -> bool {
        self.duplicate
    }
}
