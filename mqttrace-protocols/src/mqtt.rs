//! ## mqttrace-protocols::mqtt
//! Strict MQTT 3.1 / 3.1.1 decoder.
//!
//! The fixed header is parsed in place (control nibble, flags and the
//! variable-length "remaining length"), then the variable header and payload
//! are validated per packet type. Only the packets a client message processor
//! deals with are accepted; CONNECT and DISCONNECT are rejected with
//! [`DecodeError::UnsupportedPacketType`].

use std::io::{self, Read};

use bytes::Bytes;
use thiserror::Error;

use crate::message::{Message, MessageType, ProtocolVersion};

/// Fixed two-byte encoding of a DISCONNECT packet.
pub const DISCONNECT_PACKET: [u8; 2] = [0xE0, 0x00];

/// Errors that can occur while decoding an MQTT packet.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("Insufficient data to parse MQTT packet")]
    InsufficientData,
    #[error("Reserved control packet type {0}")]
    ReservedPacketType(u8),
    #[error("Malformed remaining length field")]
    RemainingLengthMalformed,
    #[error("Incomplete MQTT packet")]
    PacketIncomplete,
    #[error("{0} trailing bytes after MQTT packet")]
    TrailingData(usize),
    #[error("Invalid fixed header flags {flags:#06b} for {packet_type}")]
    InvalidFlags { packet_type: MessageType, flags: u8 },
    #[error("Invalid body length {length} for {packet_type}")]
    InvalidLength {
        packet_type: MessageType,
        length: usize,
    },
    #[error("Invalid quality of service level {0}")]
    InvalidQualityOfService(u8),
    #[error("Invalid topic")]
    InvalidTopic,
    #[error("{0} is not handled by the message processor")]
    UnsupportedPacketType(MessageType),
}

/// Strict decoder for raw MQTT frames.
pub trait PacketDecoder: Send + Sync {
    /// Decodes exactly one complete frame.
    fn decode(&self, data: &[u8]) -> Result<Message, DecodeError>;
}

/// Parsed fixed header of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedHeader {
    pub packet_type: MessageType,
    pub flags: u8,
    pub remaining_length: usize,
    /// Length of the fixed header itself (1 control byte + 1-4 length bytes).
    pub header_length: usize,
}

impl FixedHeader {
    #[inline]
    pub fn frame_length(&self) -> usize {
        self.header_length + self.remaining_length
    }
}

/// Decodes MQTT's variable-length "remaining length" field.
///
/// Returns a tuple of (decoded_value, number_of_bytes_used).
fn decode_remaining_length(input: &[u8]) -> Result<(usize, usize), DecodeError> {
    let mut multiplier: usize = 1;
    let mut value: usize = 0;
    for (i, byte) in input.iter().enumerate() {
        // The length field is limited to 4 bytes.
        if i == 4 {
            return Err(DecodeError::RemainingLengthMalformed);
        }
        value += usize::from(byte & 0x7F) * multiplier;
        if (byte & 0x80) == 0 {
            return Ok((value, i + 1));
        }
        multiplier *= 128;
    }
    if input.len() >= 4 {
        Err(DecodeError::RemainingLengthMalformed)
    } else {
        Err(DecodeError::PacketIncomplete)
    }
}

/// Parses the fixed header at the start of `data`.
pub fn parse_fixed_header(data: &[u8]) -> Result<FixedHeader, DecodeError> {
    if data.len() < 2 {
        return Err(DecodeError::InsufficientData);
    }
    let nibble = data[0] >> 4;
    let packet_type =
        MessageType::from_control_nibble(nibble).ok_or(DecodeError::ReservedPacketType(nibble))?;
    let (remaining_length, length_field_size) = decode_remaining_length(&data[1..])?;

    Ok(FixedHeader {
        packet_type,
        flags: data[0] & 0x0F,
        remaining_length,
        header_length: 1 + length_field_size,
    })
}

/// Upper bound on the buffer reserved up front by [`read_packet`].
const READ_CHUNK: usize = 4096;

/// Reads exactly one frame from a byte stream.
pub fn read_packet<R: Read>(reader: &mut R) -> io::Result<Bytes> {
    let mut frame = Vec::with_capacity(16);
    let mut byte = [0u8; 1];

    reader.read_exact(&mut byte)?;
    frame.push(byte[0]);

    let mut multiplier: usize = 1;
    let mut remaining_length: usize = 0;
    loop {
        if frame.len() > 4 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                DecodeError::RemainingLengthMalformed,
            ));
        }
        reader.read_exact(&mut byte)?;
        frame.push(byte[0]);
        remaining_length += usize::from(byte[0] & 0x7F) * multiplier;
        if byte[0] & 0x80 == 0 {
            break;
        }
        multiplier *= 128;
    }

    // The buffer grows with the bytes actually received, not the announced length.
    let header_length = frame.len();
    frame.reserve(remaining_length.min(READ_CHUNK));
    let received = reader
        .take(remaining_length as u64)
        .read_to_end(&mut frame)?;
    if received < remaining_length {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            DecodeError::PacketIncomplete,
        ));
    }
    debug_assert_eq!(frame.len(), header_length + remaining_length);
    Ok(Bytes::from(frame))
}

/// Cursor over the variable header and payload of a frame.
struct Body<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> Body<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    fn read_u8(&mut self) -> Result<u8, DecodeError> {
        let byte = *self
            .data
            .get(self.position)
            .ok_or(DecodeError::PacketIncomplete)?;
        self.position += 1;
        Ok(byte)
    }

    fn read_u16(&mut self) -> Result<u16, DecodeError> {
        let high = self.read_u8()?;
        let low = self.read_u8()?;
        Ok(u16::from_be_bytes([high, low]))
    }

    fn read_string(&mut self) -> Result<String, DecodeError> {
        let length = usize::from(self.read_u16()?);
        if self.remaining() < length {
            return Err(DecodeError::PacketIncomplete);
        }
        let raw = &self.data[self.position..self.position + length];
        self.position += length;
        String::from_utf8(raw.to_vec()).map_err(|_| DecodeError::InvalidTopic)
    }

    fn rest(&mut self) -> &'a [u8] {
        let rest = &self.data[self.position..];
        self.position = self.data.len();
        rest
    }
}

/// Message processor for MQTT 3.1 and 3.1.1 clients.
#[derive(Debug, Default, Clone, Copy)]
pub struct MessageProcessor {
    version: ProtocolVersion,
}

impl MessageProcessor {
    pub fn new(version: ProtocolVersion) -> Self {
        Self { version }
    }

    pub fn version(&self) -> ProtocolVersion {
        self.version
    }

    fn validate_flags(&self, header: &FixedHeader) -> Result<(), DecodeError> {
        if header.packet_type == MessageType::Publish {
            let qos = (header.flags >> 1) & 0x03;
            if qos == 3 {
                return Err(DecodeError::InvalidQualityOfService(qos));
            }
            return Ok(());
        }
        // MQTT 3.1 leaves the lower nibble unchecked.
        if self.version == ProtocolVersion::V31 {
            return Ok(());
        }
        let expected = match header.packet_type {
            MessageType::PublishRelease | MessageType::Subscribe | MessageType::Unsubscribe => 0x02,
            _ => 0x00,
        };
        if header.flags != expected {
            return Err(DecodeError::InvalidFlags {
                packet_type: header.packet_type,
                flags: header.flags,
            });
        }
        Ok(())
    }

    fn expect_length(header: &FixedHeader, length: usize) -> Result<(), DecodeError> {
        if header.remaining_length != length {
            return Err(DecodeError::InvalidLength {
                packet_type: header.packet_type,
                length: header.remaining_length,
            });
        }
        Ok(())
    }

    fn decode_publish(header: &FixedHeader, body: &mut Body<'_>) -> Result<Message, DecodeError> {
        let qos = (header.flags >> 1) & 0x03;
        let topic = body.read_string()?;
        if topic.is_empty() || topic.contains(|c| c == '#' || c == '+') {
            return Err(DecodeError::InvalidTopic);
        }

        let mut message = Message::new(MessageType::Publish)
            .with_quality_of_service(qos)
            .with_retained(header.flags & 0x01 == 0x01)
            .with_duplicate(header.flags & 0x08 == 0x08)
            .with_topic(topic);
        if qos > 0 {
            message = message.with_message_id(body.read_u16()?);
        }
        Ok(message.with_content(Bytes::copy_from_slice(body.rest())))
    }

    fn decode_subscribe(body: &mut Body<'_>) -> Result<Message, DecodeError> {
        let message_id = body.read_u16()?;
        let topic = body.read_string()?;
        let qos = body.read_u8()?;
        if qos > 2 {
            return Err(DecodeError::InvalidQualityOfService(qos));
        }
        // Further filters are validated but not reported.
        while body.remaining() > 0 {
            body.read_string()?;
            let qos = body.read_u8()?;
            if qos > 2 {
                return Err(DecodeError::InvalidQualityOfService(qos));
            }
        }
        if topic.is_empty() {
            return Err(DecodeError::InvalidTopic);
        }
        Ok(Message::new(MessageType::Subscribe)
            .with_message_id(message_id)
            .with_quality_of_service(qos)
            .with_topic(topic))
    }

    fn decode_subscribe_acknowledgement(
        &self,
        header: &FixedHeader,
        body: &mut Body<'_>,
    ) -> Result<Message, DecodeError> {
        let message_id = body.read_u16()?;
        let codes = body.rest().to_vec();
        if codes.is_empty() {
            return Err(DecodeError::InvalidLength {
                packet_type: header.packet_type,
                length: header.remaining_length,
            });
        }
        for &code in &codes {
            let failure = self.version == ProtocolVersion::V311 && code == 0x80;
            if code > 2 && !failure {
                return Err(DecodeError::InvalidQualityOfService(code));
            }
        }
        Ok(Message::new(MessageType::SubscribeAcknowledgement)
            .with_message_id(message_id)
            .with_acknowledged_quality_of_services(codes))
    }

    fn decode_unsubscribe(body: &mut Body<'_>) -> Result<Message, DecodeError> {
        let message_id = body.read_u16()?;
        let topic = body.read_string()?;
        while body.remaining() > 0 {
            body.read_string()?;
        }
        if topic.is_empty() {
            return Err(DecodeError::InvalidTopic);
        }
        Ok(Message::new(MessageType::Unsubscribe)
            .with_message_id(message_id)
            .with_topic(topic))
    }
}

impl PacketDecoder for MessageProcessor {
    fn decode(&self, data: &[u8]) -> Result<Message, DecodeError> {
        let header = parse_fixed_header(data)?;
        if data.len() < header.frame_length() {
            return Err(DecodeError::PacketIncomplete);
        }
        if data.len() > header.frame_length() {
            return Err(DecodeError::TrailingData(data.len() - header.frame_length()));
        }
        self.validate_flags(&header)?;

        let mut body = Body::new(&data[header.header_length..]);
        match header.packet_type {
            MessageType::Connect | MessageType::Disconnect => {
                Err(DecodeError::UnsupportedPacketType(header.packet_type))
            }
            MessageType::ConnectAcknowledgement => {
                Self::expect_length(&header, 2)?;
                Ok(Message::new(header.packet_type))
            }
            MessageType::Publish => Self::decode_publish(&header, &mut body),
            MessageType::PublishAcknowledgement
            | MessageType::PublishReceipt
            | MessageType::PublishRelease
            | MessageType::PublishComplete
            | MessageType::UnsubscribeAcknowledgement => {
                Self::expect_length(&header, 2)?;
                Ok(Message::new(header.packet_type).with_message_id(body.read_u16()?))
            }
            MessageType::Subscribe => Self::decode_subscribe(&mut body),
            MessageType::SubscribeAcknowledgement => {
                self.decode_subscribe_acknowledgement(&header, &mut body)
            }
            MessageType::Unsubscribe => Self::decode_unsubscribe(&mut body),
            MessageType::PingRequest | MessageType::PingResponse => {
                Self::expect_length(&header, 0)?;
                Ok(Message::new(header.packet_type))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn publish_frame() -> Vec<u8> {
        let mut packet = hex::decode("30170008").unwrap();
        packet.extend_from_slice(b"test/foo");
        packet.extend_from_slice(&[0x00, 0x2a]);
        packet.extend_from_slice(b"hello world");
        packet
    }

    #[test]
    fn test_decode_publish_qos0() {
        let processor = MessageProcessor::new(ProtocolVersion::V31);
        let message = processor.decode(&publish_frame()).unwrap();
        assert_eq!(message.message_type(), MessageType::Publish);
        assert_eq!(message.quality_of_service(), 0);
        assert_eq!(message.message_id(), None);
        assert_eq!(message.topic(), Some("test/foo"));
        // At QoS 0 there is no packet id, so the two bytes belong to the payload.
        assert_eq!(message.content().unwrap().as_ref(), b"\x00\x2ahello world");
    }

    #[test]
    fn test_decode_publish_qos1_carries_message_id() {
        let mut packet = publish_frame();
        packet[0] = 0x32;
        let processor = MessageProcessor::new(ProtocolVersion::V311);
        let message = processor.decode(&packet).unwrap();
        assert_eq!(message.quality_of_service(), 1);
        assert_eq!(message.message_id(), Some(42));
        assert_eq!(message.content().unwrap().as_ref(), b"hello world");
    }

    #[test]
    fn test_publish_qos3_is_rejected() {
        let mut packet = publish_frame();
        packet[0] = 0x36;
        let result = MessageProcessor::default().decode(&packet);
        assert_eq!(result, Err(DecodeError::InvalidQualityOfService(3)));
    }

    #[test]
    fn test_connect_and_disconnect_are_not_processed() {
        let processor = MessageProcessor::default();
        assert_eq!(
            processor.decode(&DISCONNECT_PACKET),
            Err(DecodeError::UnsupportedPacketType(MessageType::Disconnect))
        );

        // Source: https://www.hivemq.com/mqtt-essentials/mqtt-message-format/
        let mut connect = vec![0x10, 0x17, 0x00, 0x04, b'M', b'Q', b'T', b'T', 0x04, 0x02, 0x00, 0x3C];
        connect.extend_from_slice(&[0x00, 0x0B]);
        connect.extend_from_slice(b"testclient1");
        assert_eq!(
            processor.decode(&connect),
            Err(DecodeError::UnsupportedPacketType(MessageType::Connect))
        );
    }

    #[test]
    fn test_decode_acknowledgements() {
        let processor = MessageProcessor::new(ProtocolVersion::V311);
        let puback = processor.decode(&[0x40, 0x02, 0x01, 0x02]).unwrap();
        assert_eq!(puback.message_type(), MessageType::PublishAcknowledgement);
        assert_eq!(puback.message_id(), Some(0x0102));

        let pubrel = processor.decode(&[0x62, 0x02, 0x00, 0x07]).unwrap();
        assert_eq!(pubrel.message_type(), MessageType::PublishRelease);

        let suback = processor.decode(&[0x90, 0x05, 0x00, 0x09, 0x00, 0x01, 0x80]).unwrap();
        assert_eq!(suback.message_id(), Some(9));
        assert_eq!(suback.acknowledged_quality_of_services(), &[0, 1, 0x80]);

        let pingresp = processor.decode(&[0xD0, 0x00]).unwrap();
        assert_eq!(pingresp.message_type(), MessageType::PingResponse);
    }

    #[test]
    fn test_suback_failure_code_requires_311() {
        let frame = [0x90, 0x03, 0x00, 0x01, 0x80];
        assert!(MessageProcessor::new(ProtocolVersion::V311).decode(&frame).is_ok());
        assert_eq!(
            MessageProcessor::new(ProtocolVersion::V31).decode(&frame),
            Err(DecodeError::InvalidQualityOfService(0x80))
        );
    }

    #[test]
    fn test_reserved_flags_checked_only_for_311() {
        // PUBREL with flags 0 is invalid in 3.1.1 but tolerated in 3.1.
        let frame = [0x60, 0x02, 0x00, 0x07];
        assert!(MessageProcessor::new(ProtocolVersion::V31).decode(&frame).is_ok());
        assert_eq!(
            MessageProcessor::new(ProtocolVersion::V311).decode(&frame),
            Err(DecodeError::InvalidFlags {
                packet_type: MessageType::PublishRelease,
                flags: 0
            })
        );
    }

    #[test]
    fn test_decode_subscribe_reports_first_filter() {
        let mut frame = vec![0x82, 0x0E, 0x00, 0x05, 0x00, 0x03];
        frame.extend_from_slice(b"a/b");
        frame.push(0x01);
        frame.extend_from_slice(&[0x00, 0x03]);
        frame.extend_from_slice(b"c/#");
        frame.push(0x02);
        let message = MessageProcessor::new(ProtocolVersion::V311)
            .decode(&frame)
            .unwrap();
        assert_eq!(message.message_type(), MessageType::Subscribe);
        assert_eq!(message.message_id(), Some(5));
        assert_eq!(message.topic(), Some("a/b"));
        assert_eq!(message.quality_of_service(), 1);
    }

    #[test]
    fn test_incomplete_packet() {
        // A packet that claims to have more bytes than are provided.
        let packet = vec![0x30, 0x07, b'a'];
        let result = MessageProcessor::default().decode(&packet);
        assert!(matches!(result, Err(DecodeError::PacketIncomplete)));
    }

    #[test]
    fn test_trailing_data() {
        let packet = vec![0xC0, 0x00, 0xC0, 0x00];
        let result = MessageProcessor::default().decode(&packet);
        assert_eq!(result, Err(DecodeError::TrailingData(2)));
    }

    #[test]
    fn test_malformed_remaining_length() {
        // A packet with a remaining length field that does not terminate.
        let packet = vec![0x30, 0xFF, 0xFF, 0xFF, 0xFF];
        let result = MessageProcessor::default().decode(&packet);
        assert!(matches!(
            result,
            Err(DecodeError::RemainingLengthMalformed)
        ));
    }

    #[test]
    fn test_reserved_type_and_short_input() {
        let processor = MessageProcessor::default();
        assert_eq!(processor.decode(&[0xF0, 0x00]), Err(DecodeError::ReservedPacketType(15)));
        assert_eq!(processor.decode(&[0x30]), Err(DecodeError::InsufficientData));
        assert_eq!(processor.decode(&[]), Err(DecodeError::InsufficientData));
    }

    #[test]
    fn test_multi_byte_remaining_length() {
        let header = parse_fixed_header(&[0x30, 0xC1, 0x02]).unwrap();
        assert_eq!(header.remaining_length, 321);
        assert_eq!(header.header_length, 3);
    }

    #[test]
    fn test_read_packet_from_stream() {
        let mut stream: &[u8] = &[0x20, 0x02, 0x00, 0x00, 0xD0, 0x00];
        let connack = read_packet(&mut stream).unwrap();
        assert_eq!(connack.as_ref(), &[0x20, 0x02, 0x00, 0x00]);
        let pingresp = read_packet(&mut stream).unwrap();
        assert_eq!(pingresp.as_ref(), &[0xD0, 0x00]);
        assert!(read_packet(&mut stream).is_err());
    }

    #[test]
    fn test_read_packet_does_not_trust_announced_length() {
        // Announces the maximum remaining length but delivers three bytes.
        let mut stream: &[u8] = &[0x30, 0xFF, 0xFF, 0xFF, 0x7F, 0x00, 0x01, b't'];
        let err = read_packet(&mut stream).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_decode_publish_flags() {
        let mut packet = publish_frame();
        packet[0] = 0x3B;
        let message = MessageProcessor::new(ProtocolVersion::V311).decode(&packet).unwrap();
        assert!(message.duplicate());
        assert!(message.retained());
        assert_eq!(message.quality_of_service(), 1);

        let message = MessageProcessor::default().decode(&publish_frame()).unwrap();
        assert!(!message.duplicate());
        assert!(!message.retained());
    }
}
