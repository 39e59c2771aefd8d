use crate::error::{Error, Result};

/// Characters Zenoh reserves for wildcards and verbatim chunks.
const RESERVED: [char; 4] = ['*', '$', '?', '#'];

/// Check that a topic can be used verbatim as a Zenoh key expression for `put`.
///
/// # Example
/// ```
/// use hmi_common::keyexpr::validate_topic;
///
/// assert!(validate_topic("hmi/pcm/battery_soc").is_ok());
/// assert!(validate_topic("hmi/pcm/*").is_err());
/// ```
pub fn validate_topic(topic: &str) -> Result<()> {
    let invalid = |reason: &str| Error::Topic {
        topic: topic.to_string(),
        reason: reason.to_string(),
    };

    if topic.is_empty() {
        return Err(invalid("topic is empty"));
    }

    if topic.split('/').any(str::is_empty) {
        return Err(invalid("topic has an empty chunk"));
    }

    if let Some(c) = topic.chars().find(|c| RESERVED.contains(c)) {
        return Err(invalid(&format!("reserved character '{}'", c)));
    }

    Ok(())
}

/// Build the key expression the bridge publishes its status to.
///
/// # Example
/// ```
/// use hmi_common::keyexpr::status_key;
///
/// assert_eq!(status_key("hmi/telemetry"), "hmi/telemetry/@/status");
/// ```
pub fn status_key(prefix: &str) -> String {
    format!("{}/@/status", prefix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_topics_are_valid() {
        for topic in [
            "hmi/pcm/battery_soc",
            "hmi/pcm/hv_battery_pack_temp",
            "hmi/cav/distance_to_lead_vehicle",
        ] {
            assert!(validate_topic(topic).is_ok(), "{}", topic);
        }
    }

    #[test]
    fn test_invalid_topics() {
        assert!(validate_topic("").is_err());
        assert!(validate_topic("/hmi/pcm").is_err());
        assert!(validate_topic("hmi/pcm/").is_err());
        assert!(validate_topic("hmi//pcm").is_err());
        assert!(validate_topic("hmi/**").is_err());
        assert!(validate_topic("hmi/$x").is_err());
        assert!(validate_topic("hmi/pcm?a=1").is_err());
    }

    #[test]
    fn test_invalid_topic_error_names_topic() {
        let err = validate_topic("hmi/*").unwrap_err().to_string();
        assert!(err.contains("hmi/*"));
        assert!(err.contains('*'));
    }
}
