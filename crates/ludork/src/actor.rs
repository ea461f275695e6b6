//! Actors
//!
//! Host-side actor state: per-actor attribute tables shared with node
//! functions, the game clock, and the native base class every blueprint
//! actor class ultimately derives from.

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;

use blueprint_runtime::{NativeClass, RuntimeError};
use blueprint_types::{FunctionMeta, Handle, HandleId, Outputs, ParamType, Value};

/// Class path of the native actor base class
pub const ACTOR_CLASS: &str = "Engine.Gameplay.Actors.Actor";

// ─────────────────────────────────────────────────────────────────────────────
// Actor Store
// ─────────────────────────────────────────────────────────────────────────────

/// State of one live actor
#[derive(Debug, Clone)]
pub struct ActorState {
    pub handle: Handle,
    pub name: String,
    pub attrs: BTreeMap<String, Value>,
}

/// Shared attribute storage for every live actor
#[derive(Debug, Clone, Default)]
pub struct ActorStore {
    actors: Arc<DashMap<HandleId, ActorState>>,
}

impl ActorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, handle: Handle, name: impl Into<String>, attrs: BTreeMap<String, Value>) {
        let state = ActorState {
            handle: handle.clone(),
            name: name.into(),
            attrs,
        };
        self.actors.insert(handle.id, state);
    }

    pub fn remove(&self, id: HandleId) -> Option<ActorState> {
        self.actors.remove(&id).map(|(_, state)| state)
    }

    pub fn contains(&self, id: HandleId) -> bool {
        self.actors.contains_key(&id)
    }

    pub fn get(&self, id: HandleId) -> Option<ActorState> {
        self.actors.get(&id).map(|state| state.value().clone())
    }

    pub fn get_attr(&self, id: HandleId, name: &str) -> Option<Value> {
        self.actors
            .get(&id)
            .and_then(|state| state.attrs.get(name).cloned())
    }

    /// Set an attribute; `false` when the actor no longer exists
    pub fn set_attr(&self, id: HandleId, name: &str, value: Value) -> bool {
        match self.actors.get_mut(&id) {
            Some(mut state) => {
                state.attrs.insert(name.to_string(), value);
                true
            }
            None => false,
        }
    }

    pub fn find_by_name(&self, name: &str) -> Option<Handle> {
        self.actors
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| entry.handle.clone())
    }

    pub fn len(&self) -> usize {
        self.actors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Game Clock
// ─────────────────────────────────────────────────────────────────────────────

/// Seconds of game time, shared with latent conditions
#[derive(Debug, Clone, Default)]
pub struct GameClock(Arc<RwLock<f64>>);

impl GameClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> f64 {
        *self.0.read()
    }

    pub fn advance(&self, dt: f64) -> f64 {
        let mut now = self.0.write();
        *now += dt;
        *now
    }
}

/// Host state node functions may touch
#[derive(Debug, Clone, Default)]
pub struct HostServices {
    pub actors: ActorStore,
    pub clock: GameClock,
}

// ─────────────────────────────────────────────────────────────────────────────
// Native Base Class
// ─────────────────────────────────────────────────────────────────────────────

/// The native `Actor` class
///
/// Its `onTick` accumulates `lifetime`; a blueprint that defines its own
/// `onTick` graph replaces it.
pub fn actor_class(host: &HostServices) -> Result<NativeClass, RuntimeError> {
    let on_tick = host.actors.clone();
    let get_name = host.actors.clone();

    NativeClass::new(ACTOR_CLASS)
        .attr("lifetime", 0.0)
        .function_fn(
            FunctionMeta::new("onTick")
                .category("Actor")
                .param_default("deltaTime", ParamType::Float, 0.0),
            move |ctx| {
                let Some(owner) = ctx.owner() else {
                    return Ok(Outputs::none());
                };
                let dt = ctx.arg_f64("deltaTime").unwrap_or(0.0);
                let lifetime = on_tick
                    .get_attr(owner.id, "lifetime")
                    .and_then(|v| v.as_f64())
                    .unwrap_or(0.0);
                on_tick.set_attr(owner.id, "lifetime", Value::Float(lifetime + dt));
                Ok(Outputs::none())
            },
        )?
        .function_fn(
            FunctionMeta::new("GetName")
                .category("Actor")
                .returns("name", ParamType::String),
            move |ctx| {
                let name = ctx
                    .owner()
                    .and_then(|owner| get_name.get(owner.id))
                    .map(|state| Value::String(state.name))
                    .unwrap_or_default();
                Ok(Outputs::from(name))
            },
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_attributes() {
        let store = ActorStore::new();
        let hero = Handle::new("Data.Actors.BP_Hero");
        store.insert(hero.clone(), "hero", BTreeMap::from([("hp".to_string(), Value::Int(3))]));

        assert_eq!(store.get_attr(hero.id, "hp"), Some(Value::Int(3)));
        assert!(store.set_attr(hero.id, "hp", Value::Int(2)));
        assert_eq!(store.get_attr(hero.id, "hp"), Some(Value::Int(2)));
        assert_eq!(store.find_by_name("hero"), Some(hero.clone()));

        store.remove(hero.id);
        assert!(!store.set_attr(hero.id, "hp", Value::Int(1)));
        assert!(store.is_empty());
    }

    #[test]
    fn test_clock_is_shared() {
        let clock = GameClock::new();
        let view = clock.clone();
        clock.advance(0.25);
        clock.advance(0.25);
        assert_eq!(view.now(), 0.5);
    }
}
