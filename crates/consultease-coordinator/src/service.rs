// [crates/consultease-coordinator/src/service.rs]
//! The unit the System Coordinator manages: a named, orderable
//! component with `start`/`stop`/`healthy` hooks (spec §4.7).

use async_trait::async_trait;

#[async_trait]
pub trait Service: Send + Sync {
    fn name(&self) -> &str;

    async fn start(&self) -> anyhow::Result<()>;

    async fn stop(&self);

    async fn healthy(&self) -> bool;
}

/// A service together with the names of services it must start after
/// (spec §4.7 "Services declare a dependency graph").
pub struct ServiceEntry {
    pub service: Box<dyn Service>,
    pub depends_on: Vec<String>,
}

impl ServiceEntry {
    pub fn new(service: impl Service + 'static, depends_on: Vec<&str>) -> Self {
        Self {
            service: Box::new(service),
            depends_on: depends_on.into_iter().map(str::to_string).collect(),
        }
    }
}

/// Computes a topological start order (Kahn's algorithm) over the
/// declared dependency edges. The shutdown order is this list reversed.
pub fn topological_order(entries: &[ServiceEntry]) -> Result<Vec<String>, crate::errors::CoordinatorError> {
    use std::collections::{HashMap, HashSet, VecDeque};

    let names: HashSet<&str> = entries.iter().map(|e| e.service.name()).collect();
    for entry in entries {
        for dep in &entry.depends_on {
            if !names.contains(dep.as_str()) {
                return Err(crate::errors::CoordinatorError::UnknownDependency(
                    entry.service.name().to_string(),
                    dep.clone(),
                ));
            }
        }
    }

    let mut in_degree: HashMap<&str, usize> = entries.iter().map(|e| (e.service.name(), 0)).collect();
    let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
    for entry in entries {
        let name = entry.service.name();
        for dep in &entry.depends_on {
            *in_degree.get_mut(name).unwrap() += 1;
            dependents.entry(dep.as_str()).or_default().push(name);
        }
    }

    let mut queue: VecDeque<&str> = in_degree
        .iter()
        .filter(|(_, deg)| **deg == 0)
        .map(|(name, _)| *name)
        .collect();
    // Deterministic ordering among equally-ready services.
    let mut queue: Vec<&str> = queue.drain(..).collect();
    queue.sort_unstable();
    let mut queue: VecDeque<&str> = queue.into();

    let mut order = Vec::with_capacity(entries.len());
    while let Some(name) = queue.pop_front() {
        order.push(name.to_string());
        if let Some(children) = dependents.get(name) {
            let mut ready = Vec::new();
            for child in children {
                let degree = in_degree.get_mut(child).unwrap();
                *degree -= 1;
                if *degree == 0 {
                    ready.push(*child);
                }
            }
            ready.sort_unstable();
            queue.extend(ready);
        }
    }

    if order.len() != entries.len() {
        let stuck = entries
            .iter()
            .map(|e| e.service.name())
            .find(|name| !order.contains(&name.to_string()))
            .unwrap_or("<unknown>");
        return Err(crate::errors::CoordinatorError::CyclicDependency(stuck.to_string()));
    }

    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop(&'static str);

    #[async_trait]
    impl Service for Noop {
        fn name(&self) -> &str {
            self.0
        }
        async fn start(&self) -> anyhow::Result<()> {
            Ok(())
        }
        async fn stop(&self) {}
        async fn healthy(&self) -> bool {
            true
        }
    }

    #[test]
    fn orders_dependencies_before_dependents() {
        let entries = vec![
            ServiceEntry::new(Noop("router"), vec!["db", "mqtt"]),
            ServiceEntry::new(Noop("db"), vec![]),
            ServiceEntry::new(Noop("mqtt"), vec![]),
        ];

        let order = topological_order(&entries).unwrap();
        let router_pos = order.iter().position(|n| n == "router").unwrap();
        let db_pos = order.iter().position(|n| n == "db").unwrap();
        let mqtt_pos = order.iter().position(|n| n == "mqtt").unwrap();

        assert!(db_pos < router_pos);
        assert!(mqtt_pos < router_pos);
    }

    #[test]
    fn rejects_unknown_dependency() {
        let entries = vec![ServiceEntry::new(Noop("router"), vec!["ghost"])];
        assert!(topological_order(&entries).is_err());
    }

    #[test]
    fn rejects_cycles() {
        let entries = vec![ServiceEntry::new(Noop("a"), vec!["b"]), ServiceEntry::new(Noop("b"), vec!["a"])];
        assert!(topological_order(&entries).is_err());
    }
}
