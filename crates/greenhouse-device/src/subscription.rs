//! User-configured topic subscriptions.
//!
//! The topics listed in the configuration are subscribed on every
//! connection. Inbound payloads on them are kept as the last value per
//! concrete topic so other parts of the firmware can read them. Wildcard
//! filters can match any number of topics, so at most
//! [`MAX_TOPIC_VALUES`] distinct topics are kept.

use std::collections::BTreeMap;

use greenhouse_core::TopicFilter;
use tracing::{debug, warn};

/// Distinct topics whose last value is kept.
pub const MAX_TOPIC_VALUES: usize = 32;

/// One configured subscription.
#[derive(Debug, Clone)]
pub struct TopicSubscription {
    /// Filter as configured (may contain `+` / `#`).
    pub filter: String,
    matcher: TopicFilter,
}

impl TopicSubscription {
    pub fn new(filter: &str) -> Option<Self> {
        match TopicFilter::new(filter) {
            Ok(matcher) => Some(Self {
                filter: filter.to_string(),
                matcher,
            }),
            Err(error) => {
                warn!(filter, %error, "ignoring invalid topic filter");
                None
            }
        }
    }

    pub fn matches(&self, topic: &str) -> bool {
        self.matcher.matches(topic)
    }
}

/// Subscriptions plus the last payload seen per topic.
#[derive(Debug, Default)]
pub struct SubscriptionManager {
    /// Filters as last configured, including rejected ones.
    configured: Vec<String>,
    subscriptions: Vec<TopicSubscription>,
    values: BTreeMap<String, String>,
}

impl SubscriptionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the configured filters. Returns `true` when the set changed.
    ///
    /// Last values of topics no longer matched by any filter are dropped.
    pub fn set_filters(&mut self, filters: &[String]) -> bool {
        if self.configured == filters {
            return false;
        }

        self.configured = filters.to_vec();
        self.subscriptions = filters
            .iter()
            .filter_map(|f| TopicSubscription::new(f))
            .collect();
        let subscriptions = &self.subscriptions;
        self.values
            .retain(|topic, _| subscriptions.iter().any(|s| s.matches(topic)));
        true
    }

    pub fn filters(&self) -> impl Iterator<Item = &str> {
        self.subscriptions.iter().map(|s| s.filter.as_str())
    }

    /// Check if any subscription matches a topic.
    pub fn matches(&self, topic: &str) -> bool {
        self.subscriptions.iter().any(|s| s.matches(topic))
    }

    /// Record an inbound payload. Returns `false` if no filter matches.
    ///
    /// Once [`MAX_TOPIC_VALUES`] topics are held, payloads on further new
    /// topics are dropped; known topics keep updating.
    pub fn record(&mut self, topic: &str, payload: &[u8]) -> bool {
        if !self.matches(topic) {
            return false;
        }
        let value = String::from_utf8_lossy(payload).into_owned();
        let len = self.values.len();
        match self.values.get_mut(topic) {
            Some(slot) => *slot = value,
            None if len >= MAX_TOPIC_VALUES => {
                warn!(topic, "topic value table full, payload dropped");
                return true;
            }
            None => {
                self.values.insert(topic.to_string(), value);
            }
        }
        debug!(topic, "topic value updated");
        true
    }

    pub fn last_value(&self, topic: &str) -> Option<&str> {
        self.values.get(topic).map(String::as_str)
    }

    pub fn values(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(t, v)| (t.as_str(), v.as_str()))
    }
}
