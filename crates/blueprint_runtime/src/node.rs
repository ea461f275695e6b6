// Node Instance - One executable slot of a built graph
//
// A node pairs a resolved function with the parameter tokens of its
// descriptor. Input pin `i` is parameter `i` of the function's schema.

use std::collections::BTreeMap;

use blueprint_types::{FunctionMeta, Handle, NodeDescriptor, Outputs, ParameterSchema, Position, Value};

use crate::context::CallContext;
use crate::environment::Environment;
use crate::error::{Result, RuntimeError};
use crate::expr::resolve_token;
use crate::latent::LatentCondition;
use crate::library::FunctionEntry;

/// Token that binds the owning object
pub const SELF_TOKEN: &str = "self";

/// Outputs of one node call, plus the wait it requested (if any)
pub struct NodeCall {
    pub outputs: Outputs,
    pub wait: Option<LatentCondition>,
}

/// A node bound to its function
#[derive(Debug, Clone)]
pub struct NodeInstance {
    function_ref: String,
    entry: FunctionEntry,
    params: Vec<String>,
    position: Option<Position>,
    owner: Option<Handle>,
}

impl NodeInstance {
    pub fn new(descriptor: &NodeDescriptor, entry: FunctionEntry, owner: Option<Handle>) -> Self {
        Self {
            function_ref: descriptor.node_function.clone(),
            entry,
            params: descriptor.params.clone(),
            position: descriptor.pos,
            owner,
        }
    }

    /// Function token as written in the descriptor
    pub fn function_ref(&self) -> &str {
        &self.function_ref
    }

    pub fn meta(&self) -> &FunctionMeta {
        self.entry.meta()
    }

    pub fn schema(&self) -> &ParameterSchema {
        &self.entry.meta().params
    }

    pub fn params(&self) -> &[String] {
        &self.params
    }

    pub fn owner(&self) -> Option<&Handle> {
        self.owner.as_ref()
    }

    pub fn to_descriptor(&self) -> NodeDescriptor {
        NodeDescriptor {
            node_function: self.function_ref.clone(),
            params: self.params.clone(),
            pos: self.position,
        }
    }

    /// Bind every declared parameter, in schema order
    pub fn bind(&self, overrides: &BTreeMap<usize, Value>, env: &Environment) -> Vec<(String, Value)> {
        self.schema()
            .iter()
            .enumerate()
            .map(|(pin, def)| {
                let token = self.params.get(pin).map(|t| t.trim());
                let value = if token == Some(SELF_TOKEN) {
                    self.owner.clone().map(Value::Handle).unwrap_or_default()
                } else if let Some(value) = overrides.get(&pin) {
                    value.clone()
                } else {
                    match token {
                        Some(token) if !token.is_empty() => resolve_token(token, env),
                        _ => def.default.clone().unwrap_or_default(),
                    }
                };
                (def.name.clone(), def.param_type.coerce(value))
            })
            .collect()
    }

    /// Run the function with inputs pulled from upstream nodes
    pub fn execute(&self, overrides: &BTreeMap<usize, Value>, env: &mut Environment) -> Result<NodeCall> {
        let args = self.bind(overrides, env);
        let mut ctx = CallContext::new(&self.function_ref, args, self.owner.as_ref(), env);

        let outputs = self
            .entry
            .function()
            .call(&mut ctx)
            .map_err(|source| RuntimeError::Node {
                function: self.function_ref.clone(),
                source,
            })?;

        let wait = ctx.take_wait();
        if wait.is_some() && !self.meta().is_latent() {
            return Err(RuntimeError::NotLatent(self.function_ref.clone()));
        }

        Ok(NodeCall { outputs, wait })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NodeError;
    use blueprint_types::ParamType;

    fn echo_entry() -> FunctionEntry {
        let meta = FunctionMeta::new("Echo")
            .param("a", ParamType::Any)
            .param("b", ParamType::Float)
            .param_default("c", ParamType::Int, 9);
        FunctionEntry::from_fn(meta, |ctx| {
            Ok(Outputs::many(ctx.args().map(|(_, v)| v.clone()).collect()))
        })
        .unwrap()
    }

    #[test]
    fn test_bind_precedence() {
        let owner = Handle::new("Data.Actors.BP_Hero");
        let node = NodeInstance::new(
            &NodeDescriptor::new("Echo", &["self", "speed"]),
            echo_entry(),
            Some(owner.clone()),
        );
        let env: Environment = [("speed", 2)].into_iter().collect();

        let args = node.bind(&BTreeMap::new(), &env);
        assert_eq!(args[0].1, Value::Handle(owner));
        assert_eq!(args[1].1, Value::Float(2.0));
        assert_eq!(args[2].1, Value::Int(9));

        let overrides = BTreeMap::from([(1, Value::Int(5))]);
        let args = node.bind(&overrides, &env);
        assert_eq!(args[1].1, Value::Float(5.0));
    }

    #[test]
    fn test_execute_returns_tuple() {
        let node = NodeInstance::new(&NodeDescriptor::new("Echo", &["1", "x"]), echo_entry(), None);
        let mut env = Environment::new();
        let call = node.execute(&BTreeMap::new(), &mut env).unwrap();
        assert_eq!(
            call.outputs.into_vec(),
            vec![Value::Int(1), Value::from("x"), Value::Int(9)]
        );
        assert!(call.wait.is_none());
    }

    #[test]
    fn test_wait_requires_latent_metadata() {
        let entry = FunctionEntry::from_fn(FunctionMeta::new("Sneaky"), |ctx| {
            ctx.wait_until(|_| Value::Bool(true));
            Ok(Outputs::none())
        })
        .unwrap();
        let node = NodeInstance::new(&NodeDescriptor::new("Sneaky", &[]), entry, None);
        let result = node.execute(&BTreeMap::new(), &mut Environment::new());
        assert!(matches!(result, Err(RuntimeError::NotLatent(_))));
    }

    #[test]
    fn test_node_errors_are_wrapped() {
        let entry = FunctionEntry::from_fn(FunctionMeta::new("Boom"), |_| {
            Err(NodeError::failed("exploded"))
        })
        .unwrap();
        let node = NodeInstance::new(&NodeDescriptor::new("Boom", &[]), entry, None);
        let err = node
            .execute(&BTreeMap::new(), &mut Environment::new())
            .err()
            .unwrap();
        assert_eq!(err.to_string(), "Node function 'Boom' failed: exploded");
    }
}
