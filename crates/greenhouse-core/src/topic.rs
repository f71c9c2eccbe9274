//! MQTT topic filter matching.
//!
//! Topics are `/`-separated levels. Filters may contain the MQTT wildcards
//! `+` (exactly one level) and `#` (any remaining levels, last position
//! only). Matching is segment based rather than regex based so it stays
//! cheap enough to run on every inbound message.

/// A segment in a topic filter.
#[derive(Debug, Clone, PartialEq)]
enum FilterSegment {
    /// Exact literal match for this level
    Literal(String),
    /// `+` - matches exactly one level
    SingleLevel,
}

/// A subscription filter that may contain wildcards.
///
/// Supported filters:
/// - Exact: "greenhouse/tower/pump/set"
/// - Single-level wildcard: "greenhouse/+/pump/set"
/// - Multi-level wildcard: "greenhouse/#"
/// - Everything: "#"
#[derive(Debug, Clone)]
pub struct TopicFilter {
    raw: String,
    segments: Vec<FilterSegment>,
    /// True if the filter ends with `#` (matches any suffix, including none)
    multi_level: bool,
}

impl TopicFilter {
    /// Parse a topic filter.
    pub fn new(filter: &str) -> Result<Self, FilterError> {
        if filter.is_empty() {
            return Err(FilterError::EmptyFilter);
        }

        let parts: Vec<&str> = filter.split('/').collect();
        let multi_level = parts.last() == Some(&"#");
        let body = if multi_level {
            &parts[..parts.len() - 1]
        } else {
            &parts[..]
        };

        let mut segments = Vec::with_capacity(body.len());
        for part in body {
            match *part {
                "+" => segments.push(FilterSegment::SingleLevel),
                "#" => return Err(FilterError::MisplacedMultiLevel(filter.to_string())),
                p if p.contains('+') || p.contains('#') => {
                    return Err(FilterError::PartialWildcard(filter.to_string()))
                }
                p => segments.push(FilterSegment::Literal(p.to_string())),
            }
        }

        Ok(Self {
            raw: filter.to_string(),
            segments,
            multi_level,
        })
    }

    /// Check if a concrete topic matches this filter.
    pub fn matches(&self, topic: &str) -> bool {
        let levels: Vec<&str> = topic.split('/').collect();

        if self.multi_level {
            if levels.len() < self.segments.len() {
                return false;
            }
        } else if levels.len() != self.segments.len() {
            return false;
        }

        self.segments
            .iter()
            .zip(levels.iter())
            .all(|(segment, level)| match segment {
                FilterSegment::Literal(lit) => lit == level,
                FilterSegment::SingleLevel => true,
            })
    }

    /// Get the raw filter string.
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

/// Errors that can occur when parsing a topic filter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FilterError {
    #[error("Empty topic filter")]
    EmptyFilter,
    #[error("'#' must be the last level: {0}")]
    MisplacedMultiLevel(String),
    #[error("Wildcard must occupy a whole level: {0}")]
    PartialWildcard(String),
}
