// Class Types - Serialized blueprint class records
//
// A blueprint class that exists only as data names its parent class path and
// overrides a set of attributes. It may also carry the node graph its
// instances run.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::graph::GraphData;
use crate::value::Value;

/// Persisted blueprint class
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassRecord {
    /// Dotted path of the parent class (native or another record)
    pub parent: String,
    /// Attribute overrides, applied over the parent's attributes
    #[serde(default, with = "plain_attrs")]
    pub attrs: BTreeMap<String, Value>,
    /// Node graph executed by instances of this class
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graph: Option<GraphData>,
}

impl ClassRecord {
    pub fn new(parent: impl Into<String>) -> Self {
        Self {
            parent: parent.into(),
            attrs: BTreeMap::new(),
            graph: None,
        }
    }

    pub fn attr(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.attrs.insert(name.to_string(), value.into());
        self
    }

    pub fn with_graph(mut self, graph: GraphData) -> Self {
        self.graph = Some(graph);
        self
    }

    /// Parse a record from its JSON file contents
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Attributes are stored as plain JSON literals rather than tagged values
mod plain_attrs {
    use std::collections::BTreeMap;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use crate::value::Value;

    pub fn serialize<S: Serializer>(
        attrs: &BTreeMap<String, Value>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let plain: serde_json::Map<String, serde_json::Value> = attrs
            .iter()
            .map(|(k, v)| (k.clone(), serde_json::Value::from(v.clone())))
            .collect();
        plain.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<String, Value>, D::Error> {
        let plain = serde_json::Map::<String, serde_json::Value>::deserialize(deserializer)?;
        Ok(plain.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_json_record() {
        let record = ClassRecord::from_json(
            r#"{
                "parent": "Engine.Gameplay.Actors.Character",
                "attrs": {"hp": 30, "texturePath": "slime.png"}
            }"#,
        )
        .unwrap();

        assert_eq!(record.parent, "Engine.Gameplay.Actors.Character");
        assert_eq!(record.attrs.get("hp"), Some(&Value::Int(30)));
        assert!(record.graph.is_none());

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["attrs"]["hp"], 30);
    }
}
