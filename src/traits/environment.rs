use indexmap::IndexMap;
use std::sync::RwLock;
use tracing::debug;

/// Single place where variables destined for the terraform child process
/// are written.
///
/// The accumulated overlay is handed to the command executor on every spawn,
/// so the child inherits it the same way it would inherit the parent's
/// environment.
pub trait Environment: Send + Sync {
    /// Set a variable; empty names or values are ignored
    fn set(&self, name: &str, value: &str);

    /// Current value of a variable in the overlay
    #[cfg(test)]
    fn get(&self, name: &str) -> Option<String>;

    /// Snapshot of the overlay in insertion order
    fn vars(&self) -> Vec<(String, String)>;
}

/// In-process overlay shared by every child spawned during one task run
pub struct ChildEnvironment {
    vars: RwLock<IndexMap<String, String>>,
}

impl ChildEnvironment {
    pub fn new() -> Self {
        Self {
            vars: RwLock::new(IndexMap::new()),
        }
    }
}

impl Default for ChildEnvironment {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment for ChildEnvironment {
    fn set(&self, name: &str, value: &str) {
        if name.is_empty() || value.is_empty() {
            return;
        }

        // Values may be credentials; only the name is logged
        debug!(variable = name, "Set environment variable");
        self.vars
            .write()
            .unwrap()
            .insert(name.to_string(), value.to_string());
    }

    #[cfg(test)]
    fn get(&self, name: &str) -> Option<String> {
        self.vars.read().unwrap().get(name).cloned()
    }

    fn vars(&self) -> Vec<(String, String)> {
        self.vars
            .read()
            .unwrap()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_ignores_empty_values() {
        let env = ChildEnvironment::new();
        env.set("ARM_TENANT_ID", "");
        env.set("", "value");

        assert!(env.vars().is_empty());
    }

    #[test]
    fn test_vars_keep_insertion_order_and_overwrite_in_place() {
        let env = ChildEnvironment::new();
        env.set("ARM_TENANT_ID", "t1");
        env.set("ARM_USE_MSI", "true");
        env.set("ARM_TENANT_ID", "t2");

        assert_eq!(
            env.vars(),
            vec![
                ("ARM_TENANT_ID".to_string(), "t2".to_string()),
                ("ARM_USE_MSI".to_string(), "true".to_string()),
            ]
        );
        assert_eq!(env.get("ARM_USE_MSI").as_deref(), Some("true"));
    }
}
