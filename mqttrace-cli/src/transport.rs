//! Transports the CLI can instrument.

use std::io::{self, Write};
use std::net::TcpStream;

use bytes::Bytes;
use mqttrace_core::MqttTransport;
use mqttrace_protocols::{read_packet, Message};

/// Accepts every frame and message without doing I/O.
pub struct DiscardTransport {
    host: String,
}

impl DiscardTransport {
    pub fn new(host: impl Into<String>) -> Self {
        Self { host: host.into() }
    }
}

impl MqttTransport for DiscardTransport {
    type Error = io::Error;

    fn write_to_socket(&mut self, _data: &[u8], _length: Option<usize>) -> io::Result<()> {
        Ok(())
    }

    fn handle_message(&mut self, _message: &Message) -> io::Result<()> {
        Ok(())
    }

    fn host(&self) -> &str {
        &self.host
    }
}

/// Plain TCP connection to a broker.
pub struct TcpTransport {
    stream: TcpStream,
    host: String,
}

impl TcpTransport {
    pub fn connect(host: &str, port: u16) -> io::Result<Self> {
        let stream = TcpStream::connect((host, port))?;
        stream.set_nodelay(true)?;
        tracing::info!(host, port, "connected to broker");
        Ok(Self {
            stream,
            host: host.to_owned(),
        })
    }

    /// Blocks until one complete frame has been received.
    pub fn read_frame(&mut self) -> io::Result<Bytes> {
        read_packet(&mut self.stream)
    }
}

impl MqttTransport for TcpTransport {
    type Error = io::Error;

    fn write_to_socket(&mut self, data: &[u8], length: Option<usize>) -> io::Result<()> {
        let end = length.map_or(data.len(), |length| length.min(data.len()));
        self.stream.write_all(&data[..end])?;
        self.stream.flush()
    }

    fn handle_message(&mut self, message: &Message) -> io::Result<()> {
        tracing::info!(
            packet_type = %message.message_type(),
            topic = message.topic(),
            message_id = message.message_id(),
            "broker response"
        );
        Ok(())
    }

    fn host(&self) -> &str {
        &self.host
    }
}
