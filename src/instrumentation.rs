//! Dropped-message instrumentation.

use std::collections::BTreeMap;
use std::fmt;

/// Name of the per-sink lost-message metric.
pub const MESSAGES_LOST: &str = "numberOfMessagesLost";

/// A named, tagged value exposed for external monitoring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metric {
    pub name: &'static str,
    pub tags: BTreeMap<&'static str, String>,
    pub value: u64,
}

impl Metric {
    /// Lost-message metric for one sink, tagged with `appId` and `drainUrl`.
    pub fn messages_lost(app_id: &str, drain_url: &str, value: u64) -> Self {
        let mut tags = BTreeMap::new();
        tags.insert("appId", app_id.to_string());
        tags.insert("drainUrl", drain_url.to_string());
        Self { name: MESSAGES_LOST, tags, value }
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{{", self.name)?;
        for (i, (k, v)) in self.tags.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{k}={v}")?;
        }
        write!(f, "}} {}", self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_lost_is_tagged() {
        let metric = Metric::messages_lost("app-1", "syslog://drain:514", 3);
        assert_eq!(metric.name, "numberOfMessagesLost");
        assert_eq!(metric.tag("appId"), Some("app-1"));
        assert_eq!(metric.tag("drainUrl"), Some("syslog://drain:514"));
        assert_eq!(metric.tag("missing"), None);
        assert_eq!(metric.value, 3);
    }

    #[test]
    fn display_lists_sorted_tags() {
        let metric = Metric::messages_lost("a", "d", 7);
        assert_eq!(metric.to_string(), "numberOfMessagesLost{appId=a,drainUrl=d} 7");
    }
}
