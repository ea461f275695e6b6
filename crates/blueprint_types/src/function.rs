// Function Types - Metadata describing a callable node function
//
// A node function declares its parameters (the node's input pins, in order),
// what it returns, and optionally how its result picks an exec pin (branch
// configuration) or suspends the graph (latent configuration).

use serde::{Deserialize, Serialize};

use crate::value::Value;

// ─────────────────────────────────────────────────────────────────────────────
// Parameter Types
// ─────────────────────────────────────────────────────────────────────────────

/// Declared semantic type of a parameter or return slot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum ParamType {
    #[default]
    Any,
    Bool,
    Int,
    Float,
    String,
    /// Reference to a host object (the owner bound by `self`, another actor)
    Handle,
}

impl ParamType {
    /// Lossless conversion of a resolved value to this declared type
    ///
    /// Values that cannot be converted are passed through unchanged; the
    /// function decides how strict it wants to be.
    pub fn coerce(&self, value: Value) -> Value {
        match (self, value) {
            (ParamType::Float, Value::Int(i)) => Value::Float(i as f64),
            (ParamType::Int, Value::Float(f)) if f.fract() == 0.0 && f.is_finite() => {
                Value::Int(f as i64)
            }
            (_, v) => v,
        }
    }
}

/// Definition of one parameter (node input pin) or return slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamDef {
    pub name: String,
    #[serde(rename = "type", default)]
    pub param_type: ParamType,
    /// Used when the node carries neither a token nor an incoming data link
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl ParamDef {
    pub fn new(name: &str, param_type: ParamType) -> Self {
        Self {
            name: name.to_string(),
            param_type,
            default: None,
        }
    }

    pub fn with_default(name: &str, param_type: ParamType, default: impl Into<Value>) -> Self {
        Self {
            name: name.to_string(),
            param_type,
            default: Some(default.into()),
        }
    }
}

/// Ordered parameter list of a function; order is pin order
pub type ParameterSchema = Vec<ParamDef>;

// ─────────────────────────────────────────────────────────────────────────────
// Branch Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// One labelled exec output and the literal results that select it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchSet {
    pub label: String,
    pub values: Vec<Value>,
}

/// Ordered branch labels; a label's position is its exec output pin
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BranchConfig(pub Vec<BranchSet>);

impl BranchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, label: &str, values: Vec<Value>) -> Self {
        self.0.push(BranchSet {
            label: label.to_string(),
            values,
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterate `(pin, label set)` in configuration order
    pub fn pins(&self) -> impl Iterator<Item = (usize, &BranchSet)> {
        self.0.iter().enumerate()
    }

    /// Exec pin whose literal set contains `value`
    pub fn pin_for(&self, value: &Value) -> Option<usize> {
        self.pins()
            .find(|(_, set)| set.values.iter().any(|v| v == value))
            .map(|(pin, _)| pin)
    }

    /// First literal that is neither a boolean nor an integer
    fn first_unsupported_literal(&self) -> Option<(&str, &Value)> {
        self.0.iter().find_map(|set| {
            set.values
                .iter()
                .find(|v| !matches!(v, Value::Bool(_) | Value::Int(_)))
                .map(|v| (set.label.as_str(), v))
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Function Metadata
// ─────────────────────────────────────────────────────────────────────────────

/// Invalid function metadata
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FunctionMetaError {
    #[error("Function '{function}': branch '{label}' uses unsupported literal {value} (only bool/int)")]
    UnsupportedLiteral {
        function: String,
        label: String,
        value: String,
    },
    #[error("Function '{0}' declares both branch and latent outputs")]
    BranchAndLatent(String),
}

/// Describes a node function: signature plus exec routing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionMeta {
    /// Name as referenced from node descriptors (e.g. `Print`, `Math.Lerp`)
    pub name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub params: ParameterSchema,
    #[serde(default)]
    pub returns: Vec<ParamDef>,
    /// Exec routing chosen from the result tuple
    #[serde(default, skip_serializing_if = "BranchConfig::is_empty")]
    pub branches: BranchConfig,
    /// Exec routing chosen later, from a latent condition's result
    #[serde(default, skip_serializing_if = "BranchConfig::is_empty")]
    pub latents: BranchConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl FunctionMeta {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            category: String::new(),
            params: Vec::new(),
            returns: Vec::new(),
            branches: BranchConfig::default(),
            latents: BranchConfig::default(),
            description: None,
        }
    }

    pub fn category(mut self, category: &str) -> Self {
        self.category = category.to_string();
        self
    }

    pub fn param(mut self, name: &str, param_type: ParamType) -> Self {
        self.params.push(ParamDef::new(name, param_type));
        self
    }

    pub fn param_default(
        mut self,
        name: &str,
        param_type: ParamType,
        default: impl Into<Value>,
    ) -> Self {
        self.params.push(ParamDef::with_default(name, param_type, default));
        self
    }

    pub fn returns(mut self, name: &str, param_type: ParamType) -> Self {
        self.returns.push(ParamDef::new(name, param_type));
        self
    }

    pub fn branch(mut self, label: &str, values: Vec<Value>) -> Self {
        self.branches.0.push(BranchSet {
            label: label.to_string(),
            values,
        });
        self
    }

    pub fn latent(mut self, label: &str, values: Vec<Value>) -> Self {
        self.latents.0.push(BranchSet {
            label: label.to_string(),
            values,
        });
        self
    }

    pub fn description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn is_latent(&self) -> bool {
        !self.latents.is_empty()
    }

    /// Position of a parameter in the schema
    pub fn param_index(&self, name: &str) -> Option<usize> {
        self.params.iter().position(|p| p.name == name)
    }

    /// Reject configurations the engine cannot route
    pub fn validate(&self) -> Result<(), FunctionMetaError> {
        if !self.branches.is_empty() && !self.latents.is_empty() {
            return Err(FunctionMetaError::BranchAndLatent(self.name.clone()));
        }
        for config in [&self.branches, &self.latents] {
            if let Some((label, value)) = config.first_unsupported_literal() {
                return Err(FunctionMetaError::UnsupportedLiteral {
                    function: self.name.clone(),
                    label: label.to_string(),
                    value: value.to_string(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pin_is_label_ordinal() {
        let branches = BranchConfig::new()
            .with("TRUE", vec![Value::Bool(true)])
            .with("FALSE", vec![Value::Bool(false)]);
        assert_eq!(branches.pin_for(&Value::Bool(true)), Some(0));
        assert_eq!(branches.pin_for(&Value::Bool(false)), Some(1));
        assert_eq!(branches.pin_for(&Value::Int(1)), None);
    }

    #[test]
    fn test_validate_rejects_string_literals() {
        let meta = FunctionMeta::new("Pick").branch("A", vec![Value::from("a")]);
        assert!(matches!(
            meta.validate(),
            Err(FunctionMetaError::UnsupportedLiteral { .. })
        ));

        let ok = FunctionMeta::new("IF")
            .param("condition", ParamType::Bool)
            .branch("TRUE", vec![Value::Int(0)])
            .branch("FALSE", vec![Value::Int(1)]);
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn test_coerce_is_lossless_only() {
        assert_eq!(ParamType::Float.coerce(Value::Int(2)), Value::Float(2.0));
        assert_eq!(ParamType::Int.coerce(Value::Float(3.0)), Value::Int(3));
        assert_eq!(ParamType::Int.coerce(Value::Float(3.5)), Value::Float(3.5));
        assert_eq!(ParamType::Bool.coerce(Value::from("x")), Value::from("x"));
    }
}
