use serde::{Deserialize, Serialize};

/// How a subscription's notifications are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    /// Description shown inline, with an image when one can be found.
    Full,
    /// Title and link only.
    #[default]
    Link,
}

impl DeliveryMode {
    /// Stored as the `channel` column: 1 for full, anything else for link.
    pub fn from_channel(channel: i64) -> Self {
        if channel == 1 {
            DeliveryMode::Full
        } else {
            DeliveryMode::Link
        }
    }

    pub fn as_channel(self) -> i64 {
        match self {
            DeliveryMode::Full => 1,
            DeliveryMode::Link => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub id: i64,
    pub url: String,
    pub name: String,
    pub mode: DeliveryMode,
    pub users: Vec<i64>,
}

/// Parse a stored subscriber list such as `[1, 2]` or `1,2`.
///
/// Entries that are not positive integers are dropped, as are repeats.
pub fn parse_user_ids(raw: &str) -> Vec<i64> {
    let trimmed = raw.trim().trim_start_matches('[').trim_end_matches(']');
    let mut ids = Vec::new();
    for part in trimmed.split(',') {
        if let Ok(id) = part.trim().parse::<i64>() {
            if id > 0 && !ids.contains(&id) {
                ids.push(id);
            }
        }
    }
    ids
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bracketed_list() {
        assert_eq!(parse_user_ids("[12, 34,56]"), vec![12, 34, 56]);
    }

    #[test]
    fn test_parse_skips_garbage_and_duplicates() {
        assert_eq!(parse_user_ids("7, abc, -3, 0, 7, 9"), vec![7, 9]);
    }

    #[test]
    fn test_parse_empty() {
        assert!(parse_user_ids("[]").is_empty());
        assert!(parse_user_ids("  ").is_empty());
    }

    #[test]
    fn test_channel_mapping() {
        assert_eq!(DeliveryMode::from_channel(1), DeliveryMode::Full);
        assert_eq!(DeliveryMode::from_channel(0), DeliveryMode::Link);
        assert_eq!(DeliveryMode::from_channel(5), DeliveryMode::Link);
        assert_eq!(DeliveryMode::Full.as_channel(), 1);
    }
}
