//! Topic grammar for the device's broker session
//!
//! Three topic families: attribute request/response and pushed updates under
//! the configurable device namespace, telemetry under the same namespace, and
//! the firmware chunk request/response pair under the fixed `fw/` prefix.

use once_cell::sync::Lazy;
use regex::Regex;

/// Fixed transfer unit for firmware downloads, in bytes.
pub const FIRMWARE_CHUNK_SIZE: usize = 4096;

/// Subscription filter matching every firmware chunk response.
pub const FIRMWARE_RESPONSE_FILTER: &str = "fw/response/+/chunk/+";

const FIRMWARE_RESPONSE_PREFIX: &str = "fw/response/";

static CHUNK_TOPIC_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^fw/response/([0-9]*)/chunk/([0-9]*)$").expect("chunk topic pattern compiles")
});

/// Topic for requesting one firmware chunk.
pub fn firmware_request_topic(request_id: u32, chunk_index: u32) -> String {
    format!("fw/request/{request_id}/chunk/{chunk_index}")
}

/// Topic a chunk response arrives on. The server echoes the requested pair.
pub fn firmware_response_topic(request_id: u32, chunk_index: u32) -> String {
    format!("fw/response/{request_id}/chunk/{chunk_index}")
}

/// Parse `(requestId, chunkIndex)` out of a firmware response topic.
///
/// Malformed suffixes parse to zero rather than failing; the transfer engine
/// discards anything that does not match the current session's request id.
pub fn parse_chunk_topic(topic: &str) -> (u32, u32) {
    match CHUNK_TOPIC_PATTERN.captures(topic) {
        Some(caps) => (
            caps[1].parse().unwrap_or(0),
            caps[2].parse().unwrap_or(0),
        ),
        None => (0, 0),
    }
}

/// Classification of an inbound topic into the families the agent handles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopicClass {
    /// Reply to an attribute request; descriptor fields nested under `shared`.
    AttributeResponse,
    /// Pushed attribute update; descriptor fields at the top level.
    AttributeUpdate,
    /// Firmware chunk response with the echoed request pair.
    FirmwareChunk { request_id: u32, chunk_index: u32 },
    /// Not a topic this agent acts on.
    Unknown,
}

/// Topic set for one device session, rooted at the configured namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceTopics {
    base: String,
}

impl DeviceTopics {
    pub fn new<S: Into<String>>(base: S) -> Self {
        Self { base: base.into() }
    }

    /// Subscription filter for attribute request responses.
    pub fn attribute_response_filter(&self) -> String {
        format!("{}/attributes/response/+", self.base)
    }

    /// Exact topic pushed attribute updates arrive on.
    pub fn attribute_updates(&self) -> String {
        format!("{}/attributes", self.base)
    }

    /// Topic for the initial shared-attribute request.
    pub fn attribute_request(&self) -> String {
        format!("{}/attributes/request/0", self.base)
    }

    /// Topic telemetry readings are published on.
    pub fn telemetry(&self) -> String {
        format!("{}/telemetry", self.base)
    }

    /// The three filters re-issued on every successful (re)connect, in order.
    pub fn subscription_filters(&self) -> [String; 3] {
        [
            self.attribute_response_filter(),
            self.attribute_updates(),
            FIRMWARE_RESPONSE_FILTER.to_string(),
        ]
    }

    /// Route an inbound topic to the family that handles it.
    pub fn classify(&self, topic: &str) -> TopicClass {
        if topic.starts_with(FIRMWARE_RESPONSE_PREFIX) {
            let (request_id, chunk_index) = parse_chunk_topic(topic);
            return TopicClass::FirmwareChunk {
                request_id,
                chunk_index,
            };
        }
        if topic == self.attribute_updates() {
            return TopicClass::AttributeUpdate;
        }
        let response_prefix = format!("{}/attributes/response/", self.base);
        if topic.starts_with(&response_prefix) {
            return TopicClass::AttributeResponse;
        }
        TopicClass::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn parse_round_trips_valid_topics(request_id in any::<u32>(), chunk_index in any::<u32>()) {
            let topic = firmware_response_topic(request_id, chunk_index);
            prop_assert_eq!(parse_chunk_topic(&topic), (request_id, chunk_index));
        }

        #[test]
        fn parse_never_panics(topic in ".*") {
            // Property: any input yields a pair, malformed or not
            let (request_id, chunk_index) = parse_chunk_topic(&topic);
            let _ = (request_id, chunk_index);
        }

        #[test]
        fn parse_rejects_non_numeric_suffixes(junk in "[a-zA-Z][a-zA-Z0-9]{0,8}", chunk_index in any::<u32>()) {
            // Non-numeric request segment never matches the pattern
            let topic = format!("fw/response/{junk}/chunk/{chunk_index}");
            prop_assert_eq!(parse_chunk_topic(&topic), (0, 0));
        }
    }

    #[test]
    fn test_parse_chunk_topic_examples() {
        assert_eq!(parse_chunk_topic("fw/response/3/chunk/7"), (3, 7));
        assert_eq!(parse_chunk_topic("fw/response/0/chunk/0"), (0, 0));
        assert_eq!(
            parse_chunk_topic("fw/response/4294967295/chunk/1"),
            (u32::MAX, 1)
        );
    }

    #[test]
    fn test_parse_chunk_topic_malformed_yields_zero() {
        // Empty segments still match the pattern but fail the integer parse
        assert_eq!(parse_chunk_topic("fw/response//chunk/"), (0, 0));
        // Overflow beyond u32 falls back to zero
        assert_eq!(
            parse_chunk_topic("fw/response/99999999999999999999/chunk/2"),
            (0, 2)
        );
        // Shape mismatches never match at all
        assert_eq!(parse_chunk_topic("fw/response/1/chunk/2/extra"), (0, 0));
        assert_eq!(parse_chunk_topic("fw/request/1/chunk/2"), (0, 0));
        assert_eq!(parse_chunk_topic("nonsense"), (0, 0));
        assert_eq!(parse_chunk_topic(""), (0, 0));
    }

    #[test]
    fn test_request_topic_format() {
        assert_eq!(firmware_request_topic(0, 0), "fw/request/0/chunk/0");
        assert_eq!(firmware_request_topic(12, 34), "fw/request/12/chunk/34");
    }

    #[test]
    fn test_device_topic_builders() {
        let topics = DeviceTopics::new("v1/devices/me");

        assert_eq!(
            topics.attribute_response_filter(),
            "v1/devices/me/attributes/response/+"
        );
        assert_eq!(topics.attribute_updates(), "v1/devices/me/attributes");
        assert_eq!(
            topics.attribute_request(),
            "v1/devices/me/attributes/request/0"
        );
        assert_eq!(topics.telemetry(), "v1/devices/me/telemetry");
    }

    #[test]
    fn test_subscription_filters_order() {
        let topics = DeviceTopics::new("v1/devices/me");
        let filters = topics.subscription_filters();

        assert_eq!(filters[0], "v1/devices/me/attributes/response/+");
        assert_eq!(filters[1], "v1/devices/me/attributes");
        assert_eq!(filters[2], "fw/response/+/chunk/+");
    }

    #[test]
    fn test_classify_routes_each_family() {
        let topics = DeviceTopics::new("v1/devices/me");

        assert_eq!(
            topics.classify("v1/devices/me/attributes/response/1"),
            TopicClass::AttributeResponse
        );
        assert_eq!(
            topics.classify("v1/devices/me/attributes"),
            TopicClass::AttributeUpdate
        );
        assert_eq!(
            topics.classify("fw/response/2/chunk/5"),
            TopicClass::FirmwareChunk {
                request_id: 2,
                chunk_index: 5
            }
        );
        assert_eq!(
            topics.classify("v1/devices/me/telemetry"),
            TopicClass::Unknown
        );
        assert_eq!(topics.classify("some/other/topic"), TopicClass::Unknown);
    }

    #[test]
    fn test_classify_malformed_chunk_topic_is_still_a_chunk() {
        let topics = DeviceTopics::new("v1/devices/me");

        // Permissive parse: a mangled suffix routes as chunk (0, 0)
        assert_eq!(
            topics.classify("fw/response/junk"),
            TopicClass::FirmwareChunk {
                request_id: 0,
                chunk_index: 0
            }
        );
    }
}
