//! World
//!
//! Owns everything a running game needs to execute blueprints: the class
//! registry, the function library, the graph arena, the latent scheduler and
//! the host services. Drives actor lifecycle events and polls latent
//! continuations once per tick.

use std::sync::Arc;

use blueprint_runtime::{
    CallContext, ClassRecordStore, ClassRegistry, Environment, FunctionLibrary, GraphArena, GraphBuilder,
    GraphId, LatentScheduler, PollReport, ResolvedBehavior, Result, RuntimeError,
    DEFAULT_STEP_LIMIT,
};
use blueprint_types::{Handle, Outputs, Value};

use crate::actor::{actor_class, ActorStore, GameClock, HostServices};
use crate::engine::nodes::register_builtin_nodes;

pub const ON_CREATE: &str = "onCreate";
pub const ON_TICK: &str = "onTick";
pub const ON_FIXED_TICK: &str = "onFixedTick";
pub const ON_DESTROY: &str = "onDestroy";

/// A spawned actor and the graph built for it
#[derive(Debug, Clone)]
pub struct Actor {
    pub handle: Handle,
    pub name: String,
    pub class: Arc<ResolvedBehavior>,
    pub graph: Option<GraphId>,
}

/// Outcome of one frame
#[derive(Debug, Default)]
pub struct TickReport {
    pub time: f64,
    /// Actors whose event handler failed this frame
    pub failures: Vec<(Handle, RuntimeError)>,
    pub latent: PollReport,
}

pub struct World {
    registry: ClassRegistry,
    library: FunctionLibrary,
    arena: GraphArena,
    scheduler: LatentScheduler,
    host: HostServices,
    actors: Vec<Actor>,
    step_limit: usize,
}

impl World {
    /// Create a world reading blueprint classes from `store`
    pub fn new(store: impl ClassRecordStore + 'static) -> Result<Self> {
        let host = HostServices::default();

        let mut registry = ClassRegistry::new(store);
        registry.register_native(actor_class(&host)?);

        let mut library = FunctionLibrary::new();
        register_builtin_nodes(&mut library, &host)?;

        Ok(Self {
            registry,
            library,
            arena: GraphArena::new(),
            scheduler: LatentScheduler::new(),
            host,
            actors: Vec::new(),
            step_limit: DEFAULT_STEP_LIMIT,
        })
    }

    pub fn with_step_limit(mut self, limit: usize) -> Self {
        self.step_limit = limit;
        self
    }

    pub fn registry(&self) -> &ClassRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ClassRegistry {
        &mut self.registry
    }

    pub fn library(&self) -> &FunctionLibrary {
        &self.library
    }

    pub fn library_mut(&mut self) -> &mut FunctionLibrary {
        &mut self.library
    }

    pub fn host(&self) -> &HostServices {
        &self.host
    }

    pub fn store(&self) -> &ActorStore {
        &self.host.actors
    }

    pub fn clock(&self) -> &GameClock {
        &self.host.clock
    }

    pub fn arena(&self) -> &GraphArena {
        &self.arena
    }

    pub fn scheduler(&self) -> &LatentScheduler {
        &self.scheduler
    }

    pub fn actors(&self) -> &[Actor] {
        &self.actors
    }

    pub fn actor(&self, name: &str) -> Option<&Actor> {
        self.actors.iter().find(|a| a.name == name)
    }

    pub fn attr(&self, actor: &Handle, name: &str) -> Option<Value> {
        self.host.actors.get_attr(actor.id, name)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Resolve a class, build its graph, and dispatch `onCreate`
    ///
    /// When `onCreate` fails the actor is discarded and the error returned.
    pub fn spawn(&mut self, class_path: &str, name: &str) -> Result<Handle> {
        let class = self.registry.resolve(class_path)?;
        let handle = Handle::new(class.path());

        let graph = match class.graph() {
            Some(data) => {
                let graph = GraphBuilder::new(&self.library)
                    .class(class.clone())
                    .owner(handle.clone())
                    .step_limit(self.step_limit)
                    .build(data)?;
                Some(self.arena.insert(graph))
            }
            None => None,
        };

        self.host
            .actors
            .insert(handle.clone(), name, class.attributes());
        self.actors.push(Actor {
            handle: handle.clone(),
            name: name.to_string(),
            class,
            graph,
        });

        if let Err(error) = self.dispatch(&handle, ON_CREATE, &[]) {
            tracing::warn!(actor = %name, class = %class_path, error = %error, "onCreate failed, discarding actor");
            self.discard(&handle);
            return Err(error);
        }

        tracing::info!(actor = %name, class = %class_path, id = %handle.id, "Spawned actor");
        Ok(handle)
    }

    /// Advance the clock, tick every actor, then poll latent continuations
    pub fn tick(&mut self, dt: f64) -> TickReport {
        let time = self.host.clock.advance(dt);
        let failures = self.broadcast(ON_TICK, &[("deltaTime", Value::Float(dt))]);
        let latent = self.scheduler.poll(&mut self.arena);

        TickReport {
            time,
            failures,
            latent,
        }
    }

    /// Dispatch `onFixedTick` to every actor
    pub fn fixed_tick(&mut self, dt: f64) -> Vec<(Handle, RuntimeError)> {
        self.broadcast(ON_FIXED_TICK, &[("fixedDelta", Value::Float(dt))])
    }

    /// Dispatch `onDestroy`, then drop the actor's graph and state
    ///
    /// Pending latent continuations of the actor become inert and are
    /// discarded on the next poll.
    pub fn destroy(&mut self, actor: &Handle) -> Result<()> {
        let Some(index) = self.actors.iter().position(|a| a.handle == *actor) else {
            return Ok(());
        };
        let result = self.dispatch(actor, ON_DESTROY, &[]);

        let name = self.actors[index].name.clone();
        self.discard(actor);
        tracing::info!(actor = %name, id = %actor.id, "Destroyed actor");

        result.map(|_| ())
    }

    /// Drop an actor's graph, world entry and attribute state
    fn discard(&mut self, actor: &Handle) {
        if let Some(index) = self.actors.iter().position(|a| a.handle == *actor) {
            let removed = self.actors.remove(index);
            if let Some(id) = removed.graph {
                self.arena.remove(id);
            }
        }
        self.host.actors.remove(actor.id);
    }

    /// Run an actor event
    ///
    /// The actor's graph key of the same name wins, with the arguments bound
    /// as `__<name>__`; otherwise the class member function of that name is
    /// called; otherwise nothing happens.
    pub fn dispatch(
        &mut self,
        actor: &Handle,
        event: &str,
        args: &[(&str, Value)],
    ) -> Result<Option<Outputs>> {
        let Some(record) = self.actors.iter().find(|a| a.handle == *actor) else {
            return Ok(None);
        };

        if let Some(graph) = record.graph.and_then(|id| self.arena.get_mut(id)) {
            if graph.has_key(event) {
                for (name, value) in args {
                    graph.environment_mut().set_event_arg(name, value.clone());
                }
                tracing::debug!(actor = %record.name, event, "Running event graph");
                return graph.execute(event, &mut self.scheduler).map(Some);
            }
        }

        let Some(entry) = record.class.function(event) else {
            return Ok(None);
        };
        let args = entry
            .meta()
            .params
            .iter()
            .map(|def| {
                let value = args
                    .iter()
                    .find(|(name, _)| *name == def.name)
                    .map(|(_, value)| value.clone())
                    .or_else(|| def.default.clone())
                    .unwrap_or_default();
                (def.name.clone(), def.param_type.coerce(value))
            })
            .collect();
        let mut env = Environment::new();
        let mut ctx = CallContext::new(event, args, Some(actor), &mut env);
        entry
            .function()
            .call(&mut ctx)
            .map(Some)
            .map_err(|source| RuntimeError::Node {
                function: event.to_string(),
                source,
            })
    }

    fn broadcast(&mut self, event: &str, args: &[(&str, Value)]) -> Vec<(Handle, RuntimeError)> {
        let handles: Vec<Handle> = self.actors.iter().map(|a| a.handle.clone()).collect();
        let mut failures = Vec::new();
        for handle in handles {
            if let Err(error) = self.dispatch(&handle, event, args) {
                tracing::error!(id = %handle.id, event, error = %error, "Actor event failed");
                failures.push((handle, error));
            }
        }
        failures
    }
}
