//! Startup declaration of topic shapes
//!
//! Producers rely on their topics existing with a known shape. The registry
//! asserts each declared topic against the broker once at process start;
//! re-declaring an identical topic is a no-op, a mismatched shape is
//! reported without touching the existing topic.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use crate::{
    broker::{BrokerAdmin, TopicOutcome},
    error::{PubSubError, Result},
    topic::TopicSpec,
};

/// Counters for declarations made through a registry
#[derive(Debug, Default)]
pub struct TopicRegistryStats {
    pub topics_created: AtomicUsize,
    pub topics_confirmed: AtomicUsize,
    pub shape_conflicts: AtomicUsize,
}

/// Declares topics through the broker's admin interface
pub struct TopicRegistry {
    admin: Arc<dyn BrokerAdmin>,
    stats: TopicRegistryStats,
}

impl TopicRegistry {
    pub fn new(admin: Arc<dyn BrokerAdmin>) -> Self {
        Self {
            admin,
            stats: TopicRegistryStats::default(),
        }
    }

    /// Idempotently declare a topic
    pub fn ensure_topic(&self, spec: &TopicSpec) -> Result<TopicOutcome> {
        spec.validate()?;

        match self.admin.create_topic_if_absent(spec) {
            Ok(TopicOutcome::Created) => {
                self.stats.topics_created.fetch_add(1, Ordering::Relaxed);
                log::info!("Declared topic {}", spec);
                Ok(TopicOutcome::Created)
            }
            Ok(TopicOutcome::AlreadyExists) => {
                self.stats.topics_confirmed.fetch_add(1, Ordering::Relaxed);
                log::debug!("Topic {} already present", spec);
                Ok(TopicOutcome::AlreadyExists)
            }
            Err(err @ PubSubError::TopicShapeConflict { .. }) => {
                self.stats.shape_conflicts.fetch_add(1, Ordering::Relaxed);
                log::warn!("{}", err);
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    /// Shorthand for [`ensure_topic`](Self::ensure_topic)
    pub fn ensure(
        &self,
        name: &str,
        partitions: u32,
        replication_factor: u16,
    ) -> Result<TopicOutcome> {
        self.ensure_topic(&TopicSpec::new(name, partitions, replication_factor))
    }

    /// Declare every topic; a failure on one does not stop the rest
    pub fn ensure_all<'a, I>(&self, specs: I) -> Vec<(String, Result<TopicOutcome>)>
    where
        I: IntoIterator<Item = &'a TopicSpec>,
    {
        specs
            .into_iter()
            .map(|spec| (spec.name.clone(), self.ensure_topic(spec)))
            .collect()
    }

    pub fn stats(&self) -> &TopicRegistryStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::InMemoryBroker;

    fn registry() -> (InMemoryBroker, TopicRegistry) {
        let broker = InMemoryBroker::new();
        let registry = TopicRegistry::new(Arc::new(broker.clone()));
        (broker, registry)
    }

    #[test]
    fn test_ensure_twice_is_noop() {
        let (broker, registry) = registry();
        assert_eq!(registry.ensure("t", 3, 1).unwrap(), TopicOutcome::Created);
        assert_eq!(
            registry.ensure("t", 3, 1).unwrap(),
            TopicOutcome::AlreadyExists
        );
        assert_eq!(broker.list_topics(), vec![TopicSpec::new("t", 3, 1)]);
        assert_eq!(registry.stats().topics_created.load(Ordering::Relaxed), 1);
        assert_eq!(registry.stats().topics_confirmed.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_conflict_reported() {
        let (broker, registry) = registry();
        registry.ensure("t", 3, 1).unwrap();
        let err = registry.ensure("t", 6, 1).unwrap_err();
        assert!(matches!(err, PubSubError::TopicShapeConflict { .. }));
        assert_eq!(broker.describe_topic("t").unwrap().partitions, 3);
        assert_eq!(registry.stats().shape_conflicts.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_invalid_spec_rejected_before_broker() {
        let (broker, registry) = registry();
        assert!(registry.ensure("t", 0, 1).is_err());
        assert!(broker.list_topics().is_empty());
    }

    #[test]
    fn test_ensure_all_continues_past_conflict() {
        let (broker, registry) = registry();
        registry.ensure("a", 1, 1).unwrap();

        let specs = vec![
            TopicSpec::new("a", 2, 1),
            TopicSpec::new("b", 1, 1),
            TopicSpec::new("c", 4, 1),
        ];
        let results = registry.ensure_all(&specs);

        assert!(results[0].1.is_err());
        assert_eq!(results[1].1.as_ref().unwrap(), &TopicOutcome::Created);
        assert_eq!(results[2].1.as_ref().unwrap(), &TopicOutcome::Created);
        assert_eq!(broker.list_topics().len(), 3);
    }
}
