use crate::auto_hold::AutoHold;
use thiserror::Error;

/// Index of an instance, stable for the lifetime of the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceId(usize);

impl InstanceId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("auto-hold registry is full ({capacity} instances)")]
    Full { capacity: usize },

    #[error("auto-hold instance '{0}' is already registered")]
    Duplicate(String),
}

/// Append-only, bounded collection of auto-hold instances in declaration order.
#[derive(Debug)]
pub struct Registry {
    capacity: usize,
    instances: Vec<AutoHold>,
}

impl Registry {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            instances: Vec::with_capacity(capacity),
        }
    }

    pub fn register(&mut self, instance: AutoHold) -> Result<InstanceId, RegistryError> {
        if self.find(instance.name()).is_some() {
            return Err(RegistryError::Duplicate(instance.name().to_string()));
        }
        if self.instances.len() >= self.capacity {
            return Err(RegistryError::Full {
                capacity: self.capacity,
            });
        }
        self.instances.push(instance);
        Ok(InstanceId(self.instances.len() - 1))
    }

    pub fn find(&self, name: &str) -> Option<InstanceId> {
        self.instances
            .iter()
            .position(|i| i.name() == name)
            .map(InstanceId)
    }

    pub fn get(&self, id: InstanceId) -> Option<&AutoHold> {
        self.instances.get(id.0)
    }

    pub fn by_name_mut(&mut self, name: &str) -> Option<&mut AutoHold> {
        self.instances.iter_mut().find(|i| i.name() == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AutoHold> {
        self.instances.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut AutoHold> {
        self.instances.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Earliest pending timer across all instances.
    pub fn next_deadline(&self) -> Option<i64> {
        self.instances.iter().filter_map(|i| i.next_deadline()).min()
    }

    /// Fire every due timer. Returns how many instances became held.
    pub fn poll_timers(&mut self, now: i64) -> usize {
        self.instances
            .iter_mut()
            .map(|i| i.poll_timer(now))
            .filter(|held| *held)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auto_hold::{AutoHoldConfig, Phase};
    use crate::behavior::Behavior;
    use crate::binding::Binding;
    use crate::test_support::{event, RecordingInvoker};

    fn instance(name: &str, timeout_ms: u64) -> AutoHold {
        AutoHold::new(
            name,
            AutoHoldConfig {
                binding: Binding::new("kp", 0, 0),
                timeout_ms,
            },
        )
    }

    #[test]
    fn register_assigns_indices_in_order() {
        let mut reg = Registry::with_capacity(4);
        let a = reg.register(instance("a", 100)).unwrap();
        let b = reg.register(instance("b", 100)).unwrap();
        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);
        let names: Vec<&str> = reg.iter().map(|i| i.name()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn register_past_capacity_fails() {
        let mut reg = Registry::with_capacity(1);
        reg.register(instance("a", 100)).unwrap();
        assert_eq!(
            reg.register(instance("b", 100)),
            Err(RegistryError::Full { capacity: 1 })
        );
        assert_eq!(reg.len(), 1);
        assert!(reg.find("b").is_none());
    }

    #[test]
    fn duplicate_name_is_rejected() {
        let mut reg = Registry::with_capacity(4);
        reg.register(instance("a", 100)).unwrap();
        assert_eq!(
            reg.register(instance("a", 200)),
            Err(RegistryError::Duplicate("a".into()))
        );
        assert_eq!(reg.get(reg.find("a").unwrap()).unwrap().config().timeout_ms, 100);
    }

    #[test]
    fn zero_capacity_registry_accepts_nothing() {
        let mut reg = Registry::with_capacity(0);
        assert!(reg.register(instance("a", 100)).is_err());
        assert!(reg.is_empty());
    }

    #[test]
    fn next_deadline_is_earliest_pending() {
        let mut reg = Registry::with_capacity(4);
        reg.register(instance("slow", 500)).unwrap();
        reg.register(instance("fast", 100)).unwrap();
        assert_eq!(reg.next_deadline(), None);

        let mut inv = RecordingInvoker::new();
        for name in ["slow", "fast"] {
            reg.by_name_mut(name)
                .unwrap()
                .on_pressed(&Binding::new(name, 4, 0), event(1, 0, 0), &mut inv)
                .unwrap();
        }
        assert_eq!(reg.next_deadline(), Some(100));
    }

    #[test]
    fn poll_timers_only_fires_due_instances() {
        let mut reg = Registry::with_capacity(4);
        reg.register(instance("slow", 500)).unwrap();
        reg.register(instance("fast", 100)).unwrap();
        let mut inv = RecordingInvoker::new();
        for name in ["slow", "fast"] {
            reg.by_name_mut(name)
                .unwrap()
                .on_pressed(&Binding::new(name, 4, 0), event(1, 0, 0), &mut inv)
                .unwrap();
        }

        assert_eq!(reg.poll_timers(100), 1);
        let phases: Vec<Phase> = reg.iter().map(|i| i.phase()).collect();
        assert_eq!(phases, vec![Phase::Armed, Phase::Held]);
        assert_eq!(reg.next_deadline(), Some(500));
    }
}
