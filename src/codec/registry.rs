//! Per-topic codec assignments
//!
//! A single broker connection carries several independently typed topics.
//! The registry records which codec each topic uses so producers and
//! listeners agree on the wire format without passing codecs around.

use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use super::{codec_for, traits::PayloadCodec, PayloadKind, SerializationFormat};
use crate::error::{PubSubError, Result};

/// Registry of topic → codec assignments
#[derive(Debug, Default)]
pub struct CodecRegistry {
    /// Exact topic name assignments
    exact: RwLock<HashMap<String, Arc<dyn PayloadCodec>>>,
    /// Prefix patterns (`orders-*`, `*`), checked in insertion order
    patterns: RwLock<Vec<(String, Arc<dyn PayloadCodec>)>>,
}

impl CodecRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign a codec to a topic name or pattern.
    ///
    /// Re-assigning the same topic replaces the previous codec.
    pub fn assign(&self, topic_pattern: impl Into<String>, codec: Arc<dyn PayloadCodec>) -> Result<()> {
        let topic_pattern = topic_pattern.into();
        if topic_pattern.is_empty() {
            return Err(PubSubError::invalid_parameter(
                "topic",
                "Topic pattern cannot be empty",
            ));
        }

        if topic_pattern.ends_with('*') {
            let mut patterns = self.patterns.write().unwrap();
            patterns.retain(|(existing, _)| existing != &topic_pattern);
            patterns.push((topic_pattern, codec));
        } else {
            self.exact.write().unwrap().insert(topic_pattern, codec);
        }

        Ok(())
    }

    /// Assign the codec for a kind/format pair
    pub fn assign_format(
        &self,
        topic_pattern: impl Into<String>,
        kind: PayloadKind,
        format: SerializationFormat,
    ) -> Result<()> {
        self.assign(topic_pattern, codec_for(kind, format)?)
    }

    /// Resolve the codec assigned to a topic
    pub fn codec_for_topic(&self, topic: &str) -> Option<Arc<dyn PayloadCodec>> {
        // First try exact match
        if let Some(codec) = self.exact.read().unwrap().get(topic) {
            return Some(codec.clone());
        }

        // Then try pattern matching
        let patterns = self.patterns.read().unwrap();
        patterns
            .iter()
            .find(|(pattern, _)| topic_matches_pattern(topic, pattern))
            .map(|(_, codec)| codec.clone())
    }

    /// List exact topic assignments as (topic, codec name)
    pub fn assignments(&self) -> Vec<(String, String)> {
        let mut listed: Vec<_> = self
            .exact
            .read()
            .unwrap()
            .iter()
            .map(|(topic, codec)| (topic.clone(), codec.name()))
            .collect();
        listed.sort();
        listed
    }
}

fn topic_matches_pattern(topic: &str, pattern: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => topic.starts_with(prefix),
        None => topic == pattern,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{JsonRiderCodec, TextCodec};

    #[test]
    fn test_topic_pattern_matching() {
        assert!(topic_matches_pattern("my-topic", "*"));
        assert!(topic_matches_pattern("rider-eu", "rider-*"));
        assert!(!topic_matches_pattern("orders", "rider-*"));
        assert!(topic_matches_pattern("my-topic", "my-topic"));
        assert!(!topic_matches_pattern("my-topic-new", "my-topic"));
    }

    #[test]
    fn test_exact_beats_pattern() {
        let registry = CodecRegistry::new();
        registry.assign("*", Arc::new(TextCodec)).unwrap();
        registry
            .assign("my-topic-new", Arc::new(JsonRiderCodec))
            .unwrap();

        let codec = registry.codec_for_topic("my-topic-new").unwrap();
        assert_eq!(codec.kind(), PayloadKind::RiderLocation);

        let codec = registry.codec_for_topic("my-topic").unwrap();
        assert_eq!(codec.kind(), PayloadKind::Text);
    }

    #[test]
    fn test_unknown_topic() {
        let registry = CodecRegistry::new();
        assert!(registry.codec_for_topic("nope").is_none());
        assert!(registry.assignments().is_empty());
    }

    #[test]
    fn test_assignments_list_exact_topics() {
        let registry = CodecRegistry::new();
        registry.assign("rider-*", Arc::new(JsonRiderCodec)).unwrap();
        registry.assign("my-topic", Arc::new(TextCodec)).unwrap();
        registry
            .assign("my-topic-new", Arc::new(JsonRiderCodec))
            .unwrap();

        let listed = registry.assignments();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].0, "my-topic");
        assert_eq!(listed[0].1, TextCodec.name());
        assert_eq!(listed[1].0, "my-topic-new");
        assert_eq!(listed[1].1, JsonRiderCodec.name());
    }

    #[test]
    fn test_assign_format_rejects_bad_pair() {
        let registry = CodecRegistry::new();
        assert!(registry
            .assign_format("t", PayloadKind::Text, SerializationFormat::Bincode)
            .is_err());
        assert!(registry.assign("", Arc::new(TextCodec)).is_err());
    }
}
