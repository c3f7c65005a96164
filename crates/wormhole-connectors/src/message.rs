//! Wire envelopes carried through the spool.
//!
//! Every line of a spool file is the JSON encoding of one envelope. Ingest
//! modules produce the bytes; the delivery side turns them back into an
//! [`Envelope`] with the module's [`Transform`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::SerdeError;

/// Placeholder standing in for the host in [`HttpMessage::url`].
pub const HOST_PLACEHOLDER: &str = "%s";

/// One Kafka record.
///
/// `value` holds raw bytes in memory and is standard base64 in JSON, so a
/// binary value never breaks the line framing of a spool file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KafkaMessage {
    /// Topic the record came from or goes to.
    pub topic: String,
    /// Record key.
    #[serde(default)]
    pub key: String,
    /// Record value.
    #[serde(with = "base64_value", default)]
    pub value: Vec<u8>,
    /// Record timestamp in milliseconds since the epoch.
    #[serde(default)]
    pub timestamp: i64,
}

impl KafkaMessage {
    /// Creates a record.
    #[must_use]
    pub fn new(
        topic: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<Vec<u8>>,
        timestamp: i64,
    ) -> Self {
        Self {
            topic: topic.into(),
            key: key.into(),
            value: value.into(),
            timestamp,
        }
    }

    /// Encodes the record as one JSON line.
    ///
    /// # Errors
    ///
    /// Returns `SerdeError::Json` if encoding fails.
    pub fn encode(&self) -> Result<Vec<u8>, SerdeError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decodes a record from one JSON line.
    ///
    /// # Errors
    ///
    /// Returns `SerdeError::Json` on malformed JSON or a malformed base64
    /// value.
    pub fn decode(line: &[u8]) -> Result<Self, SerdeError> {
        Ok(serde_json::from_slice(line)?)
    }
}

mod base64_value {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&STANDARD.encode(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(d)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

/// A captured HTTP request.
///
/// `url` is the request URI with the host replaced by `%s`, so the
/// delivery side can replay it against a different host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpMessage {
    /// Request method.
    pub method: String,
    /// Request URI with the host replaced by `%s`.
    pub url: String,
    /// Header name to values.
    #[serde(default)]
    pub header: HashMap<String, Vec<String>>,
    /// Request body as text.
    #[serde(default)]
    pub body: String,
    /// Peer address of the original request.
    #[serde(default)]
    pub remote_addr: String,
    /// Protocol version, e.g. `HTTP/1.1`.
    #[serde(default)]
    pub proto: String,
    /// Declared body length, or -1 if unknown.
    #[serde(default)]
    pub content_length: i64,
    /// Transfer encodings of the original request.
    #[serde(default)]
    pub transfer_encoding: Vec<String>,
    /// Query and form parameters.
    #[serde(default)]
    pub form: HashMap<String, Vec<String>>,
    /// Form parameters from a urlencoded body.
    #[serde(default)]
    pub post_form: HashMap<String, Vec<String>>,
    /// Trailer headers.
    #[serde(default)]
    pub trailer: HashMap<String, Vec<String>>,
}

impl HttpMessage {
    /// Absolute URL of this request against `host`.
    #[must_use]
    pub fn target_url(&self, host: &str) -> String {
        let replaced = if self.url.contains(HOST_PLACEHOLDER) {
            self.url.replacen(HOST_PLACEHOLDER, host, 1)
        } else {
            format!("{host}{}", self.url)
        };
        if replaced.starts_with("http://") || replaced.starts_with("https://") {
            replaced
        } else {
            format!("http://{replaced}")
        }
    }

    /// Encodes the request as one JSON line.
    ///
    /// # Errors
    ///
    /// Returns `SerdeError::Json` if encoding fails.
    pub fn encode(&self) -> Result<Vec<u8>, SerdeError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decodes a request from one JSON line.
    ///
    /// # Errors
    ///
    /// Returns `SerdeError::Json` on malformed input.
    pub fn decode(line: &[u8]) -> Result<Self, SerdeError> {
        Ok(serde_json::from_slice(line)?)
    }
}

/// What a delivery queue carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Envelope {
    /// A captured HTTP request.
    Http(HttpMessage),
    /// A Kafka record.
    Kafka(KafkaMessage),
}

impl Envelope {
    /// Short name of the envelope kind.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Envelope::Http(_) => "http",
            Envelope::Kafka(_) => "kafka",
        }
    }
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Envelope::Http(m) => write!(f, "http {} {}", m.method, m.url),
            Envelope::Kafka(m) => write!(f, "kafka {}/{}", m.topic, m.key),
        }
    }
}

/// Turns one spool line into an [`Envelope`].
pub type Transform = Arc<dyn Fn(&[u8]) -> Result<Envelope, SerdeError> + Send + Sync>;

/// Transform for lines written by the HTTP ingest module.
#[must_use]
pub fn http_transform() -> Transform {
    Arc::new(|line| HttpMessage::decode(line).map(Envelope::Http))
}

/// Transform for lines written by the Kafka ingest module.
#[must_use]
pub fn kafka_transform() -> Transform {
    Arc::new(|line| KafkaMessage::decode(line).map(Envelope::Kafka))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kafka_roundtrip() {
        let msg = KafkaMessage::new("orders", "k-1", vec![0u8, 159, 146, 150, b'\n'], 1_700_000_000_123);
        let line = msg.encode().unwrap();
        assert!(!line.contains(&b'\n'));
        assert_eq!(KafkaMessage::decode(&line).unwrap(), msg);
    }

    #[test]
    fn test_kafka_empty_value_and_zero_timestamp() {
        let msg = KafkaMessage::new("t", "", Vec::new(), 0);
        let line = msg.encode().unwrap();
        let json: serde_json::Value = serde_json::from_slice(&line).unwrap();
        assert_eq!(json["value"], "");
        assert_eq!(json["timestamp"], 0);
        assert_eq!(KafkaMessage::decode(&line).unwrap(), msg);
    }

    #[test]
    fn test_kafka_value_is_standard_base64() {
        let line = br#"{"topic":"t","key":"k","value":"aGVsbG8=","timestamp":5}"#;
        let msg = KafkaMessage::decode(line).unwrap();
        assert_eq!(msg.value, b"hello");
        assert_eq!(msg.timestamp, 5);
    }

    #[test]
    fn test_kafka_rejects_bad_base64() {
        let line = br#"{"topic":"t","key":"k","value":"***","timestamp":5}"#;
        assert!(matches!(KafkaMessage::decode(line), Err(SerdeError::Json(_))));
    }

    #[test]
    fn test_http_field_names() {
        let msg = HttpMessage {
            method: "POST".into(),
            url: "%s/api/v1?x=1".into(),
            remote_addr: "10.0.0.1:5555".into(),
            post_form: HashMap::from([("a".into(), vec!["b".into()])]),
            content_length: 3,
            ..HttpMessage::default()
        };
        let json: serde_json::Value = serde_json::from_slice(&msg.encode().unwrap()).unwrap();
        assert_eq!(json["remoteAddr"], "10.0.0.1:5555");
        assert_eq!(json["contentLength"], 3);
        assert_eq!(json["postForm"]["a"][0], "b");
        assert!(json.get("transferEncoding").is_some());
    }

    #[test]
    fn test_http_target_url() {
        let msg = HttpMessage {
            url: "%s/api/v1?x=1".into(),
            ..HttpMessage::default()
        };
        assert_eq!(msg.target_url("127.0.0.1:8081"), "http://127.0.0.1:8081/api/v1?x=1");

        let bare = HttpMessage {
            url: "/health".into(),
            ..HttpMessage::default()
        };
        assert_eq!(bare.target_url("svc:80"), "http://svc:80/health");
    }

    #[test]
    fn test_transforms() {
        let kafka = KafkaMessage::new("t", "k", b"v".to_vec(), 1).encode().unwrap();
        assert_eq!(kafka_transform()(&kafka).unwrap().kind(), "kafka");
        assert!(http_transform()(b"not json").is_err());
    }
}
