// Call Context - What a node function sees while it runs
//
// The engine binds every declared parameter to a value before the call and
// hands the function this context: keyword arguments, the owning object, the
// graph environment, and the ability to request a latent wait.

use blueprint_types::{Handle, Value};

use crate::environment::Environment;
use crate::error::NodeError;
use crate::latent::LatentCondition;

/// Context passed to node functions
pub struct CallContext<'a> {
    function: &'a str,
    args: Vec<(String, Value)>,
    owner: Option<&'a Handle>,
    env: &'a mut Environment,
    wait: Option<LatentCondition>,
}

impl<'a> CallContext<'a> {
    pub fn new(
        function: &'a str,
        args: Vec<(String, Value)>,
        owner: Option<&'a Handle>,
        env: &'a mut Environment,
    ) -> Self {
        Self {
            function,
            args,
            owner,
            env,
            wait: None,
        }
    }

    /// Name the node used to reference this function
    pub fn function(&self) -> &str {
        self.function
    }

    /// Bound arguments in parameter order
    pub fn args(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.args.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn arg(&self, name: &str) -> Option<&Value> {
        self.args.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    /// Argument that must be present and non-null
    pub fn require(&self, name: &str) -> Result<&Value, NodeError> {
        self.arg(name)
            .filter(|v| !v.is_null())
            .ok_or_else(|| NodeError::MissingArgument(name.to_string()))
    }

    pub fn arg_bool(&self, name: &str) -> Option<bool> {
        self.arg(name).and_then(Value::as_bool)
    }

    pub fn arg_i64(&self, name: &str) -> Option<i64> {
        self.arg(name).and_then(Value::as_i64)
    }

    pub fn arg_f64(&self, name: &str) -> Option<f64> {
        self.arg(name).and_then(Value::as_f64)
    }

    pub fn arg_str(&self, name: &str) -> Option<&str> {
        self.arg(name).and_then(Value::as_str)
    }

    pub fn arg_handle(&self, name: &str) -> Option<&Handle> {
        self.arg(name).and_then(Value::as_handle)
    }

    /// Convert a required argument, reporting which one failed
    pub fn typed<T>(&self, name: &str) -> Result<T, NodeError>
    where
        T: TryFrom<Value, Error = blueprint_types::ValueConversionError>,
    {
        T::try_from(self.require(name)?.clone()).map_err(|source| NodeError::Argument {
            name: name.to_string(),
            source,
        })
    }

    /// The object owning the graph (what `self` binds to)
    pub fn owner(&self) -> Option<&Handle> {
        self.owner
    }

    pub fn env(&self) -> &Environment {
        &*self.env
    }

    pub fn env_mut(&mut self) -> &mut Environment {
        &mut *self.env
    }

    /// Suspend the graph after this node until `condition` yields one of the
    /// function's latent literals
    pub fn wait_until<F>(&mut self, condition: F)
    where
        F: FnMut(&Environment) -> Value + Send + 'static,
    {
        self.wait = Some(Box::new(condition));
    }

    pub fn is_waiting(&self) -> bool {
        self.wait.is_some()
    }

    pub(crate) fn take_wait(&mut self) -> Option<LatentCondition> {
        self.wait.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argument_accessors() {
        let mut env = Environment::new();
        let owner = Handle::new("Data.Actors.BP_Hero");
        let ctx = CallContext::new(
            "Lerp",
            vec![
                ("a".to_string(), Value::Float(1.0)),
                ("b".to_string(), Value::Int(3)),
                ("label".to_string(), Value::from("x")),
                ("missing".to_string(), Value::Null),
            ],
            Some(&owner),
            &mut env,
        );

        assert_eq!(ctx.arg_f64("a"), Some(1.0));
        assert_eq!(ctx.arg_f64("b"), Some(3.0));
        assert_eq!(ctx.arg_str("label"), Some("x"));
        assert!(matches!(ctx.require("missing"), Err(NodeError::MissingArgument(_))));
        assert!(matches!(
            ctx.typed::<bool>("label"),
            Err(NodeError::Argument { .. })
        ));
        assert_eq!(ctx.owner().map(|h| h.type_id.as_str()), Some("Data.Actors.BP_Hero"));
    }

    #[test]
    fn test_wait_is_taken_once() {
        let mut env = Environment::new();
        let mut ctx = CallContext::new("Delay", Vec::new(), None, &mut env);
        assert!(!ctx.is_waiting());
        ctx.wait_until(|_| Value::Bool(true));
        assert!(ctx.is_waiting());
        assert!(ctx.take_wait().is_some());
        assert!(ctx.take_wait().is_none());
    }
}
