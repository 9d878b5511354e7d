//! # mqttrace Protocol Decoding
//!
//! Crate for decoding MQTT 3.1 / 3.1.1 control packets into the metadata the
//! instrumentation layer reports on.

pub mod message;
pub mod mqtt;

pub use message::{Message, MessageType, ProtocolVersion};
pub use mqtt::{
    parse_fixed_header, read_packet, DecodeError, FixedHeader, MessageProcessor, PacketDecoder,
    DISCONNECT_PACKET,
};
