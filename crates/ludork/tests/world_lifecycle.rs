//! Drives a `World` through spawn, several ticks and destroy.

use blueprint_runtime::MemoryClassStore;
use blueprint_types::{ClassRecord, Value};
use serde_json::json;

use ludork::actor::ACTOR_CLASS;
use ludork::engine::World;

fn record(value: serde_json::Value) -> ClassRecord {
    serde_json::from_value(value).unwrap()
}

fn store() -> MemoryClassStore {
    MemoryClassStore::new()
        .with(
            "Data.Actors.BP_Counter",
            record(json!({
                "parent": ACTOR_CLASS,
                "attrs": { "count": 0 },
                "graph": {
                    "nodeGraph": {
                        "onTick": {
                            "nodes": [
                                { "nodeFunction": "SetAttr", "params": ["self", "count", ""] },
                                { "nodeFunction": "Add", "params": ["", "1"] },
                                { "nodeFunction": "GetAttr", "params": ["self", "count"] }
                            ],
                            "links": [
                                { "left": 1, "leftOutPin": 0, "right": 0, "rightInPin": 2, "linkType": "Params" },
                                { "left": 2, "leftOutPin": 0, "right": 1, "rightInPin": 0, "linkType": "Params" }
                            ]
                        }
                    },
                    "startNodes": { "onTick": 0 }
                }
            })),
        )
        .with(
            "Data.Actors.BP_Waiter",
            record(json!({
                "parent": ACTOR_CLASS,
                "attrs": { "ready": false },
                "graph": {
                    "nodeGraph": {
                        "onCreate": {
                            "nodes": [
                                { "nodeFunction": "Delay", "params": ["0.05"] },
                                { "nodeFunction": "SetAttr", "params": ["self", "ready", "true"] }
                            ],
                            "links": [
                                { "left": 0, "leftOutPin": 0, "right": 1, "rightInPin": 0, "linkType": "Exec" }
                            ]
                        }
                    },
                    "startNodes": { "onCreate": 0 }
                }
            })),
        )
        .with(
            "Data.Actors.BP_Broken",
            record(json!({
                "parent": ACTOR_CLASS,
                "graph": {
                    "nodeGraph": {
                        "onCreate": {
                            "nodes": [
                                { "nodeFunction": "WaitForAttr", "params": ["", "x", "1"] }
                            ],
                            "links": []
                        }
                    },
                    "startNodes": { "onCreate": 0 }
                }
            })),
        )
        .with(
            "Data.Actors.BP_Prop",
            record(json!({ "parent": ACTOR_CLASS, "attrs": { "color": "red" } })),
        )
}

#[test]
fn test_tick_graph_counts_frames() {
    let mut world = World::new(store()).unwrap();
    let counter = world.spawn("Data.Actors.BP_Counter", "counter").unwrap();

    for _ in 0..3 {
        let report = world.tick(0.1);
        assert!(report.failures.is_empty(), "{:?}", report.failures);
    }

    assert_eq!(world.attr(&counter, "count"), Some(Value::Int(3)));
    // The graph's onTick replaces the native one
    assert_eq!(world.attr(&counter, "lifetime"), Some(Value::Float(0.0)));
}

#[test]
fn test_native_tick_without_graph() {
    let mut world = World::new(store()).unwrap();
    let prop = world.spawn("Data.Actors.BP_Prop", "prop").unwrap();
    assert!(world.actor("prop").unwrap().graph.is_none());

    world.tick(0.5);
    world.tick(0.5);

    assert_eq!(world.attr(&prop, "lifetime"), Some(Value::Float(1.0)));
    assert_eq!(world.attr(&prop, "color"), Some(Value::String("red".into())));
}

#[test]
fn test_delay_resumes_after_deadline() {
    let mut world = World::new(store()).unwrap();
    let waiter = world.spawn("Data.Actors.BP_Waiter", "waiter").unwrap();
    assert_eq!(world.scheduler().len(), 1);

    let first = world.tick(0.02);
    let second = world.tick(0.02);
    assert_eq!(first.latent.resumed + second.latent.resumed, 0);
    assert_eq!(world.attr(&waiter, "ready"), Some(Value::Bool(false)));

    let third = world.tick(0.02);
    assert_eq!(third.latent.resumed, 1);
    assert!(third.latent.failures.is_empty());
    assert_eq!(world.attr(&waiter, "ready"), Some(Value::Bool(true)));
    assert!(world.scheduler().is_empty());
}

#[test]
fn test_destroy_expires_pending_latent() {
    let mut world = World::new(store()).unwrap();
    let waiter = world.spawn("Data.Actors.BP_Waiter", "waiter").unwrap();
    let graph = world.actor("waiter").unwrap().graph.unwrap();

    world.destroy(&waiter).unwrap();
    assert!(!world.arena().contains(graph));
    assert!(world.store().is_empty());

    let report = world.tick(1.0);
    assert_eq!(report.latent.expired, 1);
    assert_eq!(report.latent.resumed, 0);
    assert!(world.scheduler().is_empty());
}

#[test]
fn test_unknown_class_fails_to_spawn() {
    let mut world = World::new(store()).unwrap();
    assert!(world.spawn("Data.Actors.Missing", "ghost").is_err());
    assert!(world.actors().is_empty());
}

#[test]
fn test_failed_on_create_discards_actor() {
    let mut world = World::new(store()).unwrap();
    world.spawn("Data.Actors.BP_Prop", "prop").unwrap();

    assert!(world.spawn("Data.Actors.BP_Broken", "broken").is_err());
    assert!(world.actor("broken").is_none());
    assert_eq!(world.actors().len(), 1);
    assert_eq!(world.arena().len(), 0);
    assert_eq!(world.store().len(), 1);
    assert!(world.store().find_by_name("broken").is_none());

    let report = world.tick(0.1);
    assert!(report.failures.is_empty());
    assert!(world.scheduler().is_empty());
}
