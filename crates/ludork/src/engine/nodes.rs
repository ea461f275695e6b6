//! Built-in Node Functions
//!
//! Registers the shared function module every graph can call without a
//! `self.` prefix: flow control, locals, attribute access, math, strings and
//! the latent waits.

use std::cmp::Ordering;

use rand::Rng;

use blueprint_runtime::{CallContext, FunctionLibrary, NodeError, RuntimeError};
use blueprint_types::{FunctionMeta, Outputs, ParamType, Value};

use crate::actor::{ActorStore, HostServices};

/// Register all built-in node functions
pub fn register_builtin_nodes(
    library: &mut FunctionLibrary,
    host: &HostServices,
) -> Result<(), RuntimeError> {
    register_flow_nodes(library)?;
    register_local_nodes(library)?;
    register_object_nodes(library, &host.actors)?;
    register_math_nodes(library)?;
    register_string_nodes(library)?;
    register_latent_nodes(library, host)?;

    tracing::info!("Registered {} built-in node functions", library.len());
    Ok(())
}

/// Truthiness used by the flow nodes
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Int(i) => *i != 0,
        Value::Float(f) => *f != 0.0,
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object { fields, .. } => !fields.is_empty(),
        Value::Handle(_) => true,
    }
}

fn number(ctx: &CallContext<'_>, name: &str) -> Result<f64, NodeError> {
    ctx.typed::<f64>(name)
}

// ─────────────────────────────────────────────────────────────────────────────
// Flow Control
// ─────────────────────────────────────────────────────────────────────────────

fn register_flow_nodes(library: &mut FunctionLibrary) -> Result<(), RuntimeError> {
    // IF: exec pin 0 when true, 1 when false
    library.register_fn(
        FunctionMeta::new("IF")
            .category("Flow")
            .param("condition", ParamType::Bool)
            .returns("pin", ParamType::Int)
            .branch("TRUE", vec![Value::Int(0)])
            .branch("FALSE", vec![Value::Int(1)])
            .description("Route on a condition"),
        |ctx| {
            let condition = ctx.arg("condition").map(truthy).unwrap_or(false);
            Ok(Outputs::one(if condition { 0 } else { 1 }))
        },
    )?;

    library.register_fn(
        FunctionMeta::new("Branch")
            .category("Flow")
            .param("condition", ParamType::Bool)
            .returns("condition", ParamType::Bool)
            .branch("TRUE", vec![Value::Bool(true)])
            .branch("FALSE", vec![Value::Bool(false)]),
        |ctx| {
            let condition = ctx.arg("condition").map(truthy).unwrap_or(false);
            Ok(Outputs::one(condition))
        },
    )?;

    library.register_fn(
        FunctionMeta::new("Print")
            .category("Flow")
            .param("message", ParamType::Any),
        |ctx| {
            let message = ctx.arg("message").cloned().unwrap_or_default();
            tracing::info!(target: "ludork::print", "{message}");
            Ok(Outputs::none())
        },
    )?;

    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Locals
// ─────────────────────────────────────────────────────────────────────────────

fn register_local_nodes(library: &mut FunctionLibrary) -> Result<(), RuntimeError> {
    library.register_fn(
        FunctionMeta::new("SetLocalValue")
            .category("Locals")
            .param("valueName", ParamType::String)
            .param("value", ParamType::Any),
        |ctx| {
            let name: String = ctx.typed("valueName")?;
            let value = ctx.arg("value").cloned().unwrap_or_default();
            ctx.env_mut().set(name, value);
            Ok(Outputs::none())
        },
    )?;

    library.register_fn(
        FunctionMeta::new("GetLocalValue")
            .category("Locals")
            .param("valueName", ParamType::String)
            .param_default("default", ParamType::Any, Value::Null)
            .returns("value", ParamType::Any),
        |ctx| {
            let name: String = ctx.typed("valueName")?;
            let value = ctx
                .env()
                .get(&name)
                .or_else(|| ctx.arg("default"))
                .cloned()
                .unwrap_or_default();
            Ok(Outputs::many(vec![value]))
        },
    )?;

    library.register_fn(
        FunctionMeta::new("IsValidValue")
            .category("Locals")
            .param("value", ParamType::Any)
            .returns("valid", ParamType::Bool),
        |ctx| {
            let valid = ctx.arg("value").is_some_and(|v| !v.is_null());
            Ok(Outputs::one(valid))
        },
    )?;

    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Objects
// ─────────────────────────────────────────────────────────────────────────────

fn register_object_nodes(library: &mut FunctionLibrary, actors: &ActorStore) -> Result<(), RuntimeError> {
    library.register_fn(
        FunctionMeta::new("SELF")
            .category("Object")
            .returns("self", ParamType::Handle),
        |ctx| {
            let owner = ctx.owner().cloned().map(Value::Handle).unwrap_or_default();
            Ok(Outputs::many(vec![owner]))
        },
    )?;

    let store = actors.clone();
    library.register_fn(
        FunctionMeta::new("GetAttr")
            .category("Object")
            .param("obj", ParamType::Any)
            .param("attrName", ParamType::String)
            .returns("value", ParamType::Any),
        move |ctx| {
            let name: String = ctx.typed("attrName")?;
            let value = match ctx.require("obj")? {
                Value::Handle(handle) => store.get_attr(handle.id, &name),
                object @ Value::Object { .. } => object.get(&name).cloned(),
                other => {
                    return Err(NodeError::failed(format!(
                        "cannot read '{name}' from {}",
                        other.type_name()
                    )));
                }
            };
            Ok(Outputs::many(vec![value.unwrap_or_default()]))
        },
    )?;

    let store = actors.clone();
    library.register_fn(
        FunctionMeta::new("SetAttr")
            .category("Object")
            .param("obj", ParamType::Any)
            .param("attrName", ParamType::String)
            .param("value", ParamType::Any),
        move |ctx| {
            let name: String = ctx.typed("attrName")?;
            let value = ctx.arg("value").cloned().unwrap_or_default();
            match ctx.require("obj")? {
                Value::Handle(handle) => {
                    if !store.set_attr(handle.id, &name, value) {
                        return Err(NodeError::failed(format!("actor {} no longer exists", handle.id)));
                    }
                }
                other => {
                    return Err(NodeError::failed(format!(
                        "cannot write '{name}' on {}",
                        other.type_name()
                    )));
                }
            }
            Ok(Outputs::none())
        },
    )?;

    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Math
// ─────────────────────────────────────────────────────────────────────────────

fn register_math_nodes(library: &mut FunctionLibrary) -> Result<(), RuntimeError> {
    library.register_fn(
        FunctionMeta::new("Add")
            .category("Math")
            .param("a", ParamType::Any)
            .param("b", ParamType::Any)
            .returns("result", ParamType::Any),
        |ctx| {
            let result = match (ctx.require("a")?, ctx.require("b")?) {
                (Value::Int(a), Value::Int(b)) => Value::Int(a.wrapping_add(*b)),
                (Value::String(a), b) => Value::String(format!("{a}{b}")),
                (a, b) => match (a.as_f64(), b.as_f64()) {
                    (Some(a), Some(b)) => Value::Float(a + b),
                    _ => {
                        return Err(NodeError::failed(format!(
                            "cannot add {} and {}",
                            a.type_name(),
                            b.type_name()
                        )));
                    }
                },
            };
            Ok(Outputs::one(result))
        },
    )?;

    library.register_fn(
        FunctionMeta::new("Compare")
            .category("Math")
            .param("a", ParamType::Any)
            .param("b", ParamType::Any)
            .param_default("op", ParamType::String, "==")
            .returns("result", ParamType::Bool),
        |ctx| {
            let a = ctx.arg("a").cloned().unwrap_or_default();
            let b = ctx.arg("b").cloned().unwrap_or_default();
            let op = ctx.arg_str("op").unwrap_or("==");
            let ordering = match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => x.partial_cmp(&y),
                _ => None,
            };
            let equal = ordering.map(|o| o == Ordering::Equal).unwrap_or(a == b);
            let result = match op {
                "==" => equal,
                "!=" => !equal,
                "<" => ordering == Some(Ordering::Less),
                "<=" => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
                ">" => ordering == Some(Ordering::Greater),
                ">=" => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
                other => return Err(NodeError::failed(format!("unknown comparison '{other}'"))),
            };
            Ok(Outputs::one(result))
        },
    )?;

    library.register_fn(
        FunctionMeta::new("Clamp")
            .category("Math")
            .param("value", ParamType::Float)
            .param("min_val", ParamType::Float)
            .param("max_val", ParamType::Float)
            .returns("value", ParamType::Float),
        |ctx| {
            let value = number(ctx, "value")?;
            let min = number(ctx, "min_val")?;
            let max = number(ctx, "max_val")?;
            Ok(Outputs::one(value.max(min).min(max)))
        },
    )?;

    library.register_fn(
        FunctionMeta::new("Lerp")
            .category("Math")
            .param("a", ParamType::Float)
            .param("b", ParamType::Float)
            .param("t", ParamType::Float)
            .returns("value", ParamType::Float),
        |ctx| {
            let a = number(ctx, "a")?;
            let b = number(ctx, "b")?;
            let t = number(ctx, "t")?;
            Ok(Outputs::one(a + (b - a) * t))
        },
    )?;

    library.register_fn(
        FunctionMeta::new("IsNearZero")
            .category("Math")
            .param("num", ParamType::Float)
            .param_default("epsilon", ParamType::Float, 0.1)
            .returns("nearZero", ParamType::Bool),
        |ctx| {
            let num = number(ctx, "num")?;
            let epsilon = number(ctx, "epsilon")?;
            Ok(Outputs::one(num.abs() < epsilon))
        },
    )?;

    library.register_fn(
        FunctionMeta::new("RandomRange")
            .category("Math")
            .param("min", ParamType::Any)
            .param("max", ParamType::Any)
            .returns("value", ParamType::Any),
        |ctx| {
            let mut rng = rand::thread_rng();
            if let (Value::Int(min), Value::Int(max)) = (ctx.require("min")?, ctx.require("max")?) {
                if min > max {
                    return Err(NodeError::failed(format!("empty range {min}..={max}")));
                }
                return Ok(Outputs::one(rng.gen_range(*min..=*max)));
            }

            let (min, max) = (number(ctx, "min")?, number(ctx, "max")?);
            if min > max {
                return Err(NodeError::failed(format!("empty range {min}..={max}")));
            }
            Ok(Outputs::one(rng.gen_range(min..=max)))
        },
    )?;

    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Strings
// ─────────────────────────────────────────────────────────────────────────────

fn register_string_nodes(library: &mut FunctionLibrary) -> Result<(), RuntimeError> {
    library.register_fn(
        FunctionMeta::new("ToString")
            .category("String")
            .param("value", ParamType::Any)
            .returns("text", ParamType::String),
        |ctx| {
            let value = ctx.arg("value").cloned().unwrap_or_default();
            Ok(Outputs::one(value.to_string()))
        },
    )?;

    library.register_fn(
        FunctionMeta::new("StringConcat")
            .category("String")
            .param("str1", ParamType::String)
            .param("str2", ParamType::String)
            .returns("text", ParamType::String),
        |ctx| {
            let a = ctx.arg("str1").cloned().unwrap_or_default();
            let b = ctx.arg("str2").cloned().unwrap_or_default();
            Ok(Outputs::one(format!("{a}{b}")))
        },
    )?;

    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Latent
// ─────────────────────────────────────────────────────────────────────────────

fn register_latent_nodes(library: &mut FunctionLibrary, host: &HostServices) -> Result<(), RuntimeError> {
    let clock = host.clock.clone();
    library.register_fn(
        FunctionMeta::new("Delay")
            .category("Latent")
            .param("seconds", ParamType::Float)
            .latent("Completed", vec![Value::Bool(true)])
            .description("Continue once the game clock has advanced by `seconds`"),
        move |ctx| {
            let seconds = number(ctx, "seconds")?;
            let deadline = clock.now() + seconds.max(0.0);
            let clock = clock.clone();
            ctx.wait_until(move |_| Value::Bool(clock.now() >= deadline));
            Ok(Outputs::none())
        },
    )?;

    let store = host.actors.clone();
    library.register_fn(
        FunctionMeta::new("WaitForAttr")
            .category("Latent")
            .param("obj", ParamType::Handle)
            .param("attrName", ParamType::String)
            .param("value", ParamType::Any)
            .latent("Matched", vec![Value::Bool(true)]),
        move |ctx| {
            let handle = ctx.arg_handle("obj").cloned().ok_or_else(|| {
                NodeError::failed("WaitForAttr needs an actor handle")
            })?;
            let name: String = ctx.typed("attrName")?;
            let expected = ctx.arg("value").cloned().unwrap_or_default();
            let store = store.clone();
            ctx.wait_until(move |_| {
                Value::Bool(store.get_attr(handle.id, &name).as_ref() == Some(&expected))
            });
            Ok(Outputs::none())
        },
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use blueprint_runtime::Environment;
    use blueprint_types::Handle;

    fn library(host: &HostServices) -> FunctionLibrary {
        let mut library = FunctionLibrary::new();
        register_builtin_nodes(&mut library, host).unwrap();
        library
    }

    fn call(
        library: &FunctionLibrary,
        name: &str,
        args: Vec<(&str, Value)>,
        owner: Option<&Handle>,
        env: &mut Environment,
    ) -> Result<Outputs, NodeError> {
        let entry = library.get(name).unwrap();
        let args = args.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
        let mut ctx = CallContext::new(name, args, owner, env);
        entry.function().call(&mut ctx)
    }

    #[test]
    fn test_all_builtins_registered() {
        let library = library(&HostServices::default());
        for name in [
            "IF", "Branch", "Print", "SetLocalValue", "GetLocalValue", "IsValidValue", "SELF",
            "GetAttr", "SetAttr", "Clamp", "Lerp", "IsNearZero", "Add", "Compare", "RandomRange",
            "Delay", "WaitForAttr", "ToString", "StringConcat",
        ] {
            assert!(library.contains(name), "{name} missing");
        }
        assert!(library.get("Delay").unwrap().meta().is_latent());
    }

    #[test]
    fn test_math() {
        let library = library(&HostServices::default());
        let mut env = Environment::new();

        let out = call(&library, "Add", vec![("a", Value::Int(2)), ("b", Value::Int(3))], None, &mut env).unwrap();
        assert_eq!(out.get(0), Some(&Value::Int(5)));
        let out = call(&library, "Add", vec![("a", Value::Int(2)), ("b", Value::Float(0.5))], None, &mut env).unwrap();
        assert_eq!(out.get(0), Some(&Value::Float(2.5)));

        let out = call(
            &library,
            "Clamp",
            vec![("value", Value::Float(7.0)), ("min_val", Value::Float(0.0)), ("max_val", Value::Float(5.0))],
            None,
            &mut env,
        )
        .unwrap();
        assert_eq!(out.get(0), Some(&Value::Float(5.0)));

        let out = call(
            &library,
            "Lerp",
            vec![("a", Value::Float(0.0)), ("b", Value::Float(10.0)), ("t", Value::Float(0.25))],
            None,
            &mut env,
        )
        .unwrap();
        assert_eq!(out.get(0), Some(&Value::Float(2.5)));

        let out = call(
            &library,
            "Compare",
            vec![("a", Value::Int(2)), ("b", Value::Float(3.0)), ("op", Value::from("<"))],
            None,
            &mut env,
        )
        .unwrap();
        assert_eq!(out.get(0), Some(&Value::Bool(true)));

        let out = call(&library, "RandomRange", vec![("min", Value::Int(4)), ("max", Value::Int(4))], None, &mut env).unwrap();
        assert_eq!(out.get(0), Some(&Value::Int(4)));
    }

    #[test]
    fn test_locals_and_attributes() {
        let host = HostServices::default();
        let library = library(&host);
        let hero = Handle::new("Data.Actors.BP_Hero");
        host.actors.insert(hero.clone(), "hero", BTreeMap::new());
        let mut env = Environment::new();

        call(
            &library,
            "SetLocalValue",
            vec![("valueName", Value::from("score")), ("value", Value::Int(4))],
            None,
            &mut env,
        )
        .unwrap();
        assert_eq!(env.get("score"), Some(&Value::Int(4)));

        let out = call(
            &library,
            "GetLocalValue",
            vec![("valueName", Value::from("missing")), ("default", Value::Int(1))],
            None,
            &mut env,
        )
        .unwrap();
        assert_eq!(out.get(0), Some(&Value::Int(1)));

        call(
            &library,
            "SetAttr",
            vec![
                ("obj", Value::Handle(hero.clone())),
                ("attrName", Value::from("hp")),
                ("value", Value::Int(9)),
            ],
            None,
            &mut env,
        )
        .unwrap();
        let out = call(
            &library,
            "GetAttr",
            vec![("obj", Value::Handle(hero.clone())), ("attrName", Value::from("hp"))],
            None,
            &mut env,
        )
        .unwrap();
        assert_eq!(out.get(0), Some(&Value::Int(9)));

        let out = call(&library, "SELF", vec![], Some(&hero), &mut env).unwrap();
        assert_eq!(out.get(0), Some(&Value::Handle(hero)));

        let err = call(
            &library,
            "SetAttr",
            vec![("obj", Value::Int(1)), ("attrName", Value::from("hp")), ("value", Value::Int(1))],
            None,
            &mut env,
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_if_routes_by_integer() {
        let library = library(&HostServices::default());
        let mut env = Environment::new();
        let yes = call(&library, "IF", vec![("condition", Value::Bool(true))], None, &mut env).unwrap();
        let no = call(&library, "IF", vec![("condition", Value::Bool(false))], None, &mut env).unwrap();
        assert_eq!(yes.get(0), Some(&Value::Int(0)));
        assert_eq!(no.get(0), Some(&Value::Int(1)));
    }

    #[test]
    fn test_delay_waits_on_clock() {
        let host = HostServices::default();
        let library = library(&host);
        let mut env = Environment::new();

        let entry = library.get("Delay").unwrap();
        let mut ctx = CallContext::new("Delay", vec![("seconds".to_string(), Value::Float(1.0))], None, &mut env);
        entry.function().call(&mut ctx).unwrap();
        assert!(ctx.is_waiting());
    }
}
