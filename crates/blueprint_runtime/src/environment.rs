// Environment - Name bindings shared by the nodes of one graph
//
// Parameter tokens are resolved against the environment, node functions may
// read and write it, and a latent continuation snapshots it so the graph
// resumes with the bindings it had when it suspended.

use std::collections::BTreeMap;

use blueprint_types::Value;

/// Binding holding the sub-graph key currently executing
pub const KEY_BINDING: &str = "__key__";

/// Local-execution environment of a graph
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Environment {
    bindings: BTreeMap<String, Value>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bindings.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.bindings.insert(name.into(), value.into());
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.bindings.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.bindings.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Key of the sub-graph being executed, if any
    pub fn current_key(&self) -> Option<&str> {
        self.get(KEY_BINDING).and_then(Value::as_str)
    }

    /// Bind an event argument as `__<name>__`
    pub fn set_event_arg(&mut self, name: &str, value: impl Into<Value>) {
        self.set(format!("__{name}__"), value);
    }

    pub fn event_arg(&self, name: &str) -> Option<&Value> {
        self.get(&format!("__{name}__"))
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Environment {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            bindings: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_args_are_wrapped() {
        let mut env = Environment::new();
        env.set_event_arg("deltaTime", 0.5);
        assert_eq!(env.get("__deltaTime__"), Some(&Value::Float(0.5)));
        assert_eq!(env.event_arg("deltaTime"), Some(&Value::Float(0.5)));
    }

    #[test]
    fn test_snapshot_is_independent() {
        let mut env: Environment = [("score", 1)].into_iter().collect();
        let snapshot = env.clone();
        env.set("score", 2);
        assert_eq!(snapshot.get("score"), Some(&Value::Int(1)));
    }
}
