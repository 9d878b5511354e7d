//! ## mqttrace-core::interceptor
//! **Instrumented MQTT client**
//!
//! [`InstrumentedClient`] wraps any [`MqttTransport`] and records one
//! telemetry event per outbound write and per inbound message. The wrapped
//! call always runs and its result is handed back as is; telemetry failures
//! surface as [`InterceptError::Tracing`] or [`InterceptError::Sink`].

use std::sync::Arc;

use mqttrace_config::DetailLevel;
use mqttrace_protocols::{Message, PacketDecoder};
use mqttrace_telemetry::{EventLogger, Fields, MetricsRecorder, TracingController};

use crate::classifier::{PacketClassifier, PacketMetadata};
use crate::emitter::TelemetryEmitter;
use crate::error::InterceptError;
use crate::policy::{select_fields, Content, Direction};
use crate::timing::{measure, Clock, SystemClock, TimingWindow};

/// The I/O surface of an MQTT client that can be instrumented.
pub trait MqttTransport {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Writes raw frame bytes to the broker. `length` limits how many bytes
    /// of `data` are written.
    fn write_to_socket(&mut self, data: &[u8], length: Option<usize>) -> Result<(), Self::Error>;

    /// Processes a decoded message received from the broker.
    fn handle_message(&mut self, message: &Message) -> Result<(), Self::Error>;

    /// Broker host name, reported as the `domain` tag.
    fn host(&self) -> &str;
}

pub struct InstrumentedClient<C: MqttTransport> {
    client: C,
    classifier: PacketClassifier,
    emitter: TelemetryEmitter,
    clock: Arc<dyn Clock>,
    level: DetailLevel,
    metrics: Option<MetricsRecorder>,
}

impl<C: MqttTransport> InstrumentedClient<C> {
    pub fn new(
        client: C,
        decoder: impl PacketDecoder + 'static,
        tracing: Arc<dyn TracingController>,
        events: Arc<dyn EventLogger>,
    ) -> Self {
        Self {
            client,
            classifier: PacketClassifier::new(decoder),
            emitter: TelemetryEmitter::new(tracing, events),
            clock: Arc::new(SystemClock),
            level: DetailLevel::default(),
            metrics: None,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_detail_level(mut self, level: DetailLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_metrics(mut self, metrics: MetricsRecorder) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn set_detail_level(&mut self, level: DetailLevel) {
        self.level = level;
    }

    pub fn detail_level(&self) -> DetailLevel {
        self.level
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn client_mut(&mut self) -> &mut C {
        &mut self.client
    }

    pub fn into_inner(self) -> C {
        self.client
    }

    /// Writes `data` through the wrapped client and records a request event.
    pub fn on_outbound_write(
        &mut self,
        data: &[u8],
        length: Option<usize>,
    ) -> Result<(), InterceptError<C::Error>> {
        let level = self.level;
        self.emitter.open_span();
        let (outcome, window) = measure(self.clock.as_ref(), || {
            self.client.write_to_socket(data, length)
        });

        let classified = self.classifier.classify(data);
        let fields = select_fields(
            level,
            Direction::Request,
            &classified.metadata(),
            classified.content(data),
            &window,
        );
        self.finish(Direction::Request, classified.type_key(), outcome, &window, fields)
    }

    /// Hands `message` to the wrapped client and records a response event.
    pub fn on_inbound_message(&mut self, message: &Message) -> Result<(), InterceptError<C::Error>> {
        let level = self.level;
        self.emitter.open_span();
        let (outcome, window) = measure(self.clock.as_ref(), || {
            self.client.handle_message(message)
        });

        let fields = select_fields(
            level,
            Direction::Response,
            &PacketMetadata::from_message(message),
            Content::Decoded(message.content().map(|c| c.as_ref())),
            &window,
        );
        self.finish(
            Direction::Response,
            message.message_type().key(),
            outcome,
            &window,
            fields,
        )
    }

    /// Records the event, then resolves the call's result. A client error
    /// takes precedence over a telemetry error.
    fn finish<T>(
        &self,
        direction: Direction,
        packet_type: &str,
        outcome: Result<T, C::Error>,
        window: &TimingWindow,
        fields: Fields,
    ) -> Result<T, InterceptError<C::Error>> {
        let emitted = self.emitter.record(direction, self.client.host(), fields);

        if let Some(metrics) = &self.metrics {
            match &emitted {
                Ok(()) => metrics.observe_event(direction.label(), packet_type, window.duration().to_f64()),
                Err(error) => metrics.inc_telemetry_failure(error.reason()),
            }
        }

        match (outcome, emitted) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(error)) => Err(error.into()),
            (Err(client_error), Ok(())) => Err(InterceptError::Client(client_error)),
            (Err(client_error), Err(error)) => {
                tracing::warn!(
                    direction = direction.label(),
                    packet_type,
                    %error,
                    "telemetry not recorded for failed client call"
                );
                Err(InterceptError::Client(client_error))
            }
        }
    }
}
