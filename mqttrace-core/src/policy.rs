//! ## mqttrace-core::policy
//! **Detail-level field selection**
//!
//! Decides which fields an event carries. Timing and the topic are always
//! reported; protocol headers and payloads only from `Detailed` upwards, and
//! payloads are cut short at `Detailed`.

use std::borrow::Cow;

use mqttrace_config::DetailLevel;
use mqttrace_telemetry::{FieldValue, Fields};

use crate::classifier::PacketMetadata;
use crate::timing::TimingWindow;

/// Maximum body length, in bytes, kept at [`DetailLevel::Detailed`].
pub const BODY_TRUNCATION_LIMIT: usize = 512;
pub const TRUNCATION_MARKER: &str = "...";

/// Which side of the exchange an event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Request,
    Response,
}

impl Direction {
    /// Value of the `type` tag.
    pub fn type_tag(self) -> &'static str {
        match self {
            Direction::Request => "MQTT-request",
            Direction::Response => "MQTT-response",
        }
    }

    pub fn body_field(self) -> &'static str {
        match self {
            Direction::Request => "requestBody",
            Direction::Response => "responseBody",
        }
    }

    pub fn headers_field(self) -> &'static str {
        match self {
            Direction::Request => "requestHeaders",
            Direction::Response => "responseHeaders",
        }
    }

    /// Short label for logs and metrics.
    pub fn label(self) -> &'static str {
        match self {
            Direction::Request => "request",
            Direction::Response => "response",
        }
    }
}

/// Payload an event may report as its body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Content<'a> {
    /// Undecoded wire bytes, reported hex-encoded.
    Raw(&'a [u8]),
    /// Decoded application payload, reported as text. `None` reports null.
    Decoded(Option<&'a [u8]>),
    /// No body field at all.
    Omitted,
}

impl Content<'_> {
    fn to_field(self) -> Option<FieldValue> {
        match self {
            Content::Raw(bytes) => Some(FieldValue::Text(hex::encode(bytes))),
            // Invalid UTF-8 sequences become U+FFFD.
            Content::Decoded(Some(bytes)) => {
                Some(FieldValue::Text(String::from_utf8_lossy(bytes).into_owned()))
            }
            Content::Decoded(None) => Some(FieldValue::Null),
            Content::Omitted => None,
        }
    }
}

/// Cuts `body` to at most [`BODY_TRUNCATION_LIMIT`] bytes plus the marker.
/// The cut backs off to the previous character boundary. Bodies at or below
/// the limit are returned unchanged.
pub fn truncate_body(body: &str) -> Cow<'_, str> {
    if body.len() <= BODY_TRUNCATION_LIMIT {
        return Cow::Borrowed(body);
    }
    let mut cut = BODY_TRUNCATION_LIMIT;
    while !body.is_char_boundary(cut) {
        cut -= 1;
    }
    Cow::Owned(format!("{}{}", &body[..cut], TRUNCATION_MARKER))
}

pub fn select_fields(
    level: DetailLevel,
    direction: Direction,
    metadata: &PacketMetadata,
    content: Content<'_>,
    window: &TimingWindow,
) -> Fields {
    let mut fields = Fields::new();
    fields.insert("startTimestamp".into(), window.start().as_decimal().into());
    fields.insert("endTimestamp".into(), window.end().as_decimal().into());
    fields.insert("executionTime".into(), window.duration().into());
    fields.insert("url".into(), metadata.topic.as_deref().into());

    if !level.at_least(DetailLevel::Detailed) {
        return fields;
    }

    // PacketMetadata holds only strings and integers.
    let headers = serde_json::to_string(metadata).unwrap_or_default();
    fields.insert(direction.headers_field().into(), FieldValue::Text(headers));

    if let Some(body) = content.to_field() {
        let body = match body {
            FieldValue::Text(text) if level == DetailLevel::Detailed => {
                FieldValue::Text(truncate_body(&text).into_owned())
            }
            other => other,
        };
        fields.insert(direction.body_field().into(), body);
    }

    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timing::Timestamp;
    use proptest::prelude::*;

    fn window() -> TimingWindow {
        TimingWindow::new(
            Timestamp::from_micros(1_734_352_683_351_600),
            Timestamp::from_micros(1_734_352_683_351_735),
        )
    }

    fn publish_metadata() -> PacketMetadata {
        PacketMetadata {
            packet_type: "PUBLISH".into(),
            quality_of_service: 1,
            message_id: Some(10),
            topic: Some("plant/line-1/temp".into()),
            acknowledged_quality_of_services: Vec::new(),
        }
    }

    fn unknown_metadata() -> PacketMetadata {
        PacketMetadata {
            packet_type: "UNKNOWN".into(),
            quality_of_service: 0,
            message_id: None,
            topic: None,
            acknowledged_quality_of_services: Vec::new(),
        }
    }

    fn keys(fields: &Fields) -> Vec<&str> {
        fields.keys().map(String::as_str).collect()
    }

    #[test]
    fn info_reports_timing_and_url_only() {
        let fields = select_fields(
            DetailLevel::Info,
            Direction::Request,
            &publish_metadata(),
            Content::Decoded(Some(&b"21.5"[..])),
            &window(),
        );
        assert_eq!(keys(&fields), ["endTimestamp", "executionTime", "startTimestamp", "url"]);
        assert_eq!(fields["url"].as_text(), Some("plant/line-1/temp"));
        assert_eq!(fields["executionTime"].to_string(), "0.0001");
        assert_eq!(fields["startTimestamp"].to_string(), "1734352683.351600");
    }

    #[test]
    fn url_is_null_without_topic() {
        let fields = select_fields(
            DetailLevel::Full,
            Direction::Request,
            &unknown_metadata(),
            Content::Raw(b"1data"),
            &window(),
        );
        assert!(fields["url"].is_null());
        assert_eq!(fields["requestBody"].as_text(), Some("3164617461"));
    }

    #[test]
    fn detailed_adds_headers_and_body() {
        let fields = select_fields(
            DetailLevel::Detailed,
            Direction::Response,
            &publish_metadata(),
            Content::Decoded(Some(&b"21.5"[..])),
            &window(),
        );
        assert_eq!(
            fields["responseHeaders"].as_text(),
            Some(
                r#"{"type":"PUBLISH","qualityOfService":1,"messageId":10,"topic":"plant/line-1/temp","acknowledgedQualityOfServices":[]}"#
            )
        );
        assert_eq!(fields["responseBody"].as_text(), Some("21.5"));
        assert!(!fields.contains_key("requestBody"));
    }

    #[test]
    fn null_content_is_reported_as_null_body() {
        let fields = select_fields(
            DetailLevel::Detailed,
            Direction::Request,
            &publish_metadata(),
            Content::Decoded(None),
            &window(),
        );
        assert!(fields["requestBody"].is_null());
    }

    #[test]
    fn omitted_content_keeps_headers_only() {
        let fields = select_fields(
            DetailLevel::Full,
            Direction::Request,
            &unknown_metadata(),
            Content::Omitted,
            &window(),
        );
        assert!(fields.contains_key("requestHeaders"));
        assert!(!fields.contains_key("requestBody"));
    }

    #[test]
    fn detailed_truncates_hex_body() {
        let raw = [0xABu8; 300];
        let detailed = select_fields(
            DetailLevel::Detailed,
            Direction::Request,
            &unknown_metadata(),
            Content::Raw(&raw),
            &window(),
        );
        let body = detailed["requestBody"].as_text().unwrap();
        assert_eq!(body.len(), BODY_TRUNCATION_LIMIT + TRUNCATION_MARKER.len());
        assert!(body.starts_with("abab"));
        assert!(body.ends_with("..."));

        let full = select_fields(
            DetailLevel::Full,
            Direction::Request,
            &unknown_metadata(),
            Content::Raw(&raw),
            &window(),
        );
        assert_eq!(full["requestBody"].as_text().unwrap().len(), 600);
    }

    #[test]
    fn truncation_counts_bytes() {
        let body = "é".repeat(300);
        let cut = truncate_body(&body);
        assert_eq!(cut.len(), BODY_TRUNCATION_LIMIT + TRUNCATION_MARKER.len());
        assert_eq!(cut.chars().count(), 256 + 3);

        // Byte 512 falls inside a two-byte character.
        let odd = format!("a{}", "é".repeat(300));
        let cut = truncate_body(&odd);
        assert_eq!(cut.len(), BODY_TRUNCATION_LIMIT - 1 + TRUNCATION_MARKER.len());
        assert!(cut.ends_with("é..."));

        assert!(matches!(truncate_body("short"), Cow::Borrowed("short")));
        let exact = "x".repeat(BODY_TRUNCATION_LIMIT);
        assert_eq!(truncate_body(&exact), exact.as_str());
    }

    #[test]
    fn detailed_truncates_multibyte_payload() {
        let payload = "é".repeat(300);
        let detailed = select_fields(
            DetailLevel::Detailed,
            Direction::Response,
            &publish_metadata(),
            Content::Decoded(Some(payload.as_bytes())),
            &window(),
        );
        let body = detailed["responseBody"].as_text().unwrap();
        assert_eq!(body.len(), BODY_TRUNCATION_LIMIT + TRUNCATION_MARKER.len());
        assert!(body.ends_with("é..."));

        let full = select_fields(
            DetailLevel::Full,
            Direction::Response,
            &publish_metadata(),
            Content::Decoded(Some(payload.as_bytes())),
            &window(),
        );
        assert_eq!(full["responseBody"].as_text(), Some(payload.as_str()));
    }

    #[test]
    fn invalid_utf8_payload_is_replaced() {
        let fields = select_fields(
            DetailLevel::Full,
            Direction::Response,
            &publish_metadata(),
            Content::Decoded(Some(&[0xFF, 0xFE, 0x41][..])),
            &window(),
        );
        assert_eq!(fields["responseBody"].as_text(), Some("\u{FFFD}\u{FFFD}A"));
    }

    fn any_level() -> impl Strategy<Value = DetailLevel> {
        prop_oneof![
            Just(DetailLevel::Info),
            Just(DetailLevel::Detailed),
            Just(DetailLevel::Full),
        ]
    }

    fn any_direction() -> impl Strategy<Value = Direction> {
        prop_oneof![Just(Direction::Request), Just(Direction::Response)]
    }

    proptest! {
        #[test]
        fn url_always_present(
            level in any_level(),
            direction in any_direction(),
            topic in proptest::option::of("[a-z/]{1,20}"),
            payload in proptest::collection::vec(any::<u8>(), 0..64),
        ) {
            let metadata = PacketMetadata { topic: topic.clone(), ..unknown_metadata() };
            let fields = select_fields(level, direction, &metadata, Content::Raw(&payload), &window());
            prop_assert_eq!(fields["url"].as_text(), topic.as_deref());
            prop_assert!(fields.contains_key("executionTime"));
        }

        #[test]
        fn info_never_reports_payload(
            direction in any_direction(),
            payload in proptest::collection::vec(any::<u8>(), 0..2048),
        ) {
            let fields = select_fields(
                DetailLevel::Info,
                direction,
                &publish_metadata(),
                Content::Raw(&payload),
                &window(),
            );
            prop_assert_eq!(fields.len(), 4);
        }

        #[test]
        fn detailed_bodies_are_bounded(payload in proptest::collection::vec(any::<u8>(), 0..1024)) {
            let fields = select_fields(
                DetailLevel::Detailed,
                Direction::Request,
                &unknown_metadata(),
                Content::Raw(&payload),
                &window(),
            );
            let body = fields["requestBody"].as_text().unwrap();
            let encoded_len = payload.len() * 2;
            if encoded_len > BODY_TRUNCATION_LIMIT {
                prop_assert_eq!(body.len(), BODY_TRUNCATION_LIMIT + TRUNCATION_MARKER.len());
            } else {
                prop_assert_eq!(body, hex::encode(&payload));
            }
        }

        #[test]
        fn full_never_truncates(text in "\\PC{0,900}") {
            let fields = select_fields(
                DetailLevel::Full,
                Direction::Response,
                &publish_metadata(),
                Content::Decoded(Some(text.as_bytes())),
                &window(),
            );
            prop_assert_eq!(fields["responseBody"].as_text(), Some(text.as_str()));
        }
    }
}
