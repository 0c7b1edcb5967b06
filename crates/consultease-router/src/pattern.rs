// [crates/consultease-router/src/pattern.rs]
//! Topic patterns. A pattern is a `/`-separated sequence of literal
//! segments and `{name}` placeholders; a placeholder captures exactly
//! one segment and never crosses a `/` boundary (spec §4.4 route
//! table: `consultease/faculty/{id}/status` etc).

use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

#[derive(Debug, Clone)]
pub struct TopicPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl TopicPattern {
    pub fn new(pattern: &str) -> Self {
        let segments = pattern
            .split('/')
            .map(|part| {
                if let Some(name) = part.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                    Segment::Param(name.to_string())
                } else {
                    Segment::Literal(part.to_string())
                }
            })
            .collect();
        Self { raw: pattern.to_string(), segments }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Matches `topic` against this pattern, returning the captured
    /// placeholder values on success.
    pub fn matches(&self, topic: &str) -> Option<HashMap<String, String>> {
        let parts: Vec<&str> = topic.split('/').collect();
        if parts.len() != self.segments.len() {
            return None;
        }

        let mut params = HashMap::new();
        for (segment, part) in self.segments.iter().zip(parts.iter()) {
            match segment {
                Segment::Literal(lit) if lit == part => {}
                Segment::Literal(_) => return None,
                Segment::Param(name) => {
                    params.insert(name.clone(), part.to_string());
                }
            }
        }
        Some(params)
    }
}

impl fmt::Display for TopicPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_and_captures_param() {
        let pattern = TopicPattern::new("consultease/faculty/{id}/status");
        let params = pattern.matches("consultease/faculty/42/status").unwrap();
        assert_eq!(params.get("id").unwrap(), "42");
    }

    #[test]
    fn rejects_wrong_segment_count() {
        let pattern = TopicPattern::new("consultease/faculty/{id}/status");
        assert!(pattern.matches("consultease/faculty/42/status/extra").is_none());
    }

    #[test]
    fn rejects_literal_mismatch() {
        let pattern = TopicPattern::new("consultease/faculty/{id}/status");
        assert!(pattern.matches("consultease/student/42/status").is_none());
    }

    #[test]
    fn matches_topic_with_no_params() {
        let pattern = TopicPattern::new("consultease/system/notifications");
        assert!(pattern.matches("consultease/system/notifications").is_some());
    }
}
