//! Object Graph Integration Tests
//!
//! Exercises the full materialization and dispatch flow through
//! `MapComponent`:
//! - Idempotent materialization and cycle safety
//! - Diff application and registry completeness
//! - Remote operations and forwarded events

use geomap_core::{
    materialize_all, BasicValue, EngineCall, EventLog, EventRouter, HandlerCategory,
    HeadlessEngine, LatLng, LiveState, MapComponent, MapError, MapOptions, ObjectId,
    ObjectRegistry, OperationRequest, Splice,
};
use serde_json::{json, Value};

/// Create a component with a headless engine and a collecting sink.
fn component() -> (MapComponent, EventLog, geomap_core::EngineJournal) {
    let engine = HeadlessEngine::new();
    let journal = engine.journal();
    let log = EventLog::new();
    let options = MapOptions {
        id: ObjectId::new("map"),
        zoom: 3.0,
        events: vec!["zoomend".to_string(), "layeradd".to_string()],
        ..MapOptions::default()
    };
    let map = MapComponent::new(options, Box::new(engine), Box::new(log.clone()))
        .expect("should create component");
    (map, log, journal)
}

fn marker(id: &str) -> Value {
    json!({"typeTag": "Marker", "id": id, "latLng": {"lat": 51.5, "lng": -0.09}})
}

fn call(map: &mut MapComponent, target: &str, method: &str, args: Value) -> Result<Value, MapError> {
    map.call(&OperationRequest::new(target, method, args.to_string()))
}

// ============================================================================
// Materialization
// ============================================================================

#[test]
fn test_same_id_twice_yields_one_object() {
    let (mut map, _, journal) = component();
    map.set_layers(&[marker("m")]).expect("should set layers");
    let group = json!({"typeTag": "LayerGroup", "id": "g", "children": [marker("m")]});
    map.set_layers(&[group]).expect("should set layers");

    let first = map.registry().lookup("m").expect("should find marker");
    let ids = map.registry().ids();
    assert_eq!(ids.iter().filter(|id| id.as_str() == "m").count(), 1);

    let LiveState::Group(group) = map.lookup("g").expect("should find group").state() else {
        panic!("g should be a group");
    };
    assert_eq!(group.children, vec![first]);

    let attaches = journal
        .calls()
        .into_iter()
        .filter(|c| *c == EngineCall::Attach(ObjectId::new("m")))
        .count();
    assert_eq!(attaches, 1);
}

#[test]
fn test_self_referencing_group_terminates() {
    let (mut map, _, _) = component();
    let cyclic = json!({
        "typeTag": "FeatureGroup",
        "id": "outer",
        "children": [
            {"typeTag": "LayerGroup", "id": "inner", "children": [
                {"typeTag": "FeatureGroup", "id": "outer"}
            ]}
        ]
    });
    map.set_layers(&[cyclic]).expect("should terminate");
    assert!(map.lookup("outer").is_some());
    assert!(map.lookup("inner").is_some());

    let bounds = call(&mut map, "outer", "getBounds", json!([])).expect("should compute bounds");
    assert_eq!(bounds, Value::Null);
}

#[test]
fn test_children_keep_descriptor_order() {
    let (mut map, _, _) = component();
    let ids = ["c3", "c1", "c2"];
    let group = json!({
        "typeTag": "LayerGroup",
        "id": "g",
        "children": ids.iter().map(|id| marker(id)).collect::<Vec<_>>(),
    });
    map.set_layers(&[group]).expect("should set layers");

    let layers = call(&mut map, "g", "getLayers", json!([])).expect("should list layers");
    assert_eq!(layers, json!(["c3", "c1", "c2"]));
}

#[test]
fn test_unknown_type_aborts_whole_batch() {
    let (mut map, _, _) = component();
    let err = map
        .set_layers(&[marker("ok"), json!({"typeTag": "Hexagon", "id": "bad"})])
        .expect_err("should fail");
    assert!(matches!(err, MapError::UnsupportedType(ref tag) if tag == "Hexagon"));
    assert!(map.lookup("ok").is_none());
    assert_eq!(map.view().expect("should have view").layers.len(), 0);
}

#[test]
fn test_coordinate_descriptor_round_trip() {
    let mut registry = ObjectRegistry::new();
    let router = EventRouter::default();
    let mut converter = geomap_core::GraphConverter::new(&router);
    let converted = converter
        .convert(&mut registry, &json!({"typeTag": "LatLng", "lat": 10, "lng": 20}))
        .expect("should convert");
    let geomap_core::Argument::Basic(BasicValue::LatLng(value)) = converted else {
        panic!("expected a coordinate");
    };
    assert!(value.equals(&LatLng::new(10.0, 20.0)));
    assert!(registry.is_empty());
}

#[test]
fn test_materialize_all_registers_every_node() {
    let mut registry = ObjectRegistry::new();
    let router = EventRouter::default();
    let tree = json!({
        "typeTag": "LayerGroup",
        "id": "root-group",
        "children": [
            marker("a"),
            {"typeTag": "FeatureGroup", "id": "nested", "children": [marker("b")]},
            {"typeTag": "Polyline", "id": "line", "latLngs": [[0, 0], [1, 1]]}
        ]
    });
    materialize_all(&mut registry, &router, &[tree]).expect("should materialize");
    for id in ["root-group", "a", "nested", "b", "line"] {
        assert!(registry.lookup(id).is_some(), "{id} should be discoverable");
    }
}

// ============================================================================
// Diff application
// ============================================================================

#[test]
fn test_splice_removes_a_and_b_then_adds_c() {
    let (mut map, _, _) = component();
    map.set_layers(&[marker("a"), marker("b"), marker("other")])
        .expect("should set layers");
    let untouched = map.lookup("other").expect("should find other").state().clone();

    let splice: Splice = serde_json::from_value(json!({
        "index": 0,
        "removed": [marker("a"), marker("b")],
        "addedCount": 1,
        "added": [marker("c")]
    }))
    .expect("should parse splice");
    map.apply_layer_splices(&[splice]).expect("should apply");

    assert!(map.lookup("a").is_none());
    assert!(map.lookup("b").is_none());
    assert!(map.lookup("c").is_some());
    assert_eq!(
        map.lookup("other").expect("should find other").state(),
        &untouched
    );
}

#[test]
fn test_removing_group_destroys_sole_owned_children() {
    let (mut map, _, _) = component();
    let group = json!({"typeTag": "LayerGroup", "id": "g", "children": [marker("inside")]});
    map.set_layers(&[group, marker("outside")]).expect("should set layers");

    let splice = Splice {
        index: 0,
        removed: vec![json!("g")],
        added_count: 0,
        added: Vec::new(),
    };
    let outcome = map.apply_layer_splices(&[splice]).expect("should apply");
    assert_eq!(outcome.removed, vec![ObjectId::new("g"), ObjectId::new("inside")]);
    assert!(map.lookup("inside").is_none());
    assert!(map.lookup("outside").is_some());
}

#[test]
fn test_failed_splice_keeps_earlier_splices() {
    let (mut map, _, _) = component();
    map.set_layers(&[marker("a")]).expect("should set layers");
    let splices = vec![
        Splice {
            index: 0,
            removed: vec![json!("a")],
            added_count: 1,
            added: vec![marker("b")],
        },
        Splice {
            index: 1,
            removed: Vec::new(),
            added_count: 2,
            added: vec![marker("c"), json!({"typeTag": "Nope", "id": "d"})],
        },
    ];
    assert!(map.apply_layer_splices(&splices).is_err());
    assert!(map.lookup("a").is_none());
    assert!(map.lookup("b").is_some());
    assert!(map.lookup("c").is_none());
}

#[test]
fn test_added_count_mismatch_uses_entries() {
    let (mut map, _, _) = component();
    let splice = Splice {
        index: 0,
        removed: Vec::new(),
        added_count: 5,
        added: vec![marker("only")],
    };
    let outcome = map.apply_layer_splices(&[splice]).expect("should apply");
    assert_eq!(outcome.added, vec![ObjectId::new("only")]);
}

// ============================================================================
// Operations
// ============================================================================

#[test]
fn test_set_zoom_dispatches_and_forwards_zoomend() {
    let (mut map, log, _) = component();
    let result = map
        .call(&OperationRequest::new("map", "setZoom", "[5]"))
        .expect("should dispatch");
    assert_eq!(result, Value::Null);
    assert_eq!(call(&mut map, "map", "getZoom", json!([])).expect("should get"), json!(5.0));

    let events = log.drain();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event, "zoomend");
    assert_eq!(events[0].category, HandlerCategory::Base);
}

#[test]
fn test_missing_target_invokes_nothing() {
    let (mut map, log, journal) = component();
    journal.clear();
    let err = map
        .call(&OperationRequest::new("missing-id", "x", "[]"))
        .expect_err("should fail");
    assert!(matches!(err, MapError::TargetNotFound(ref id) if id == "missing-id"));
    assert!(journal.calls().is_empty());
    assert!(log.names().is_empty());
}

#[test]
fn test_argument_descriptor_attaches_new_layer() {
    let (mut map, log, _) = component();
    call(&mut map, "map", "addLayer", json!([marker("fresh")])).expect("should add");
    assert!(map.lookup("fresh").is_some());
    assert!(call(&mut map, "map", "hasLayer", json!(["fresh"])).expect("should check") == json!(true));
    assert_eq!(log.names(), vec!["layeradd"]);
}

#[test]
fn test_existing_id_argument_reuses_object() {
    let (mut map, _, _) = component();
    map.set_layers(&[json!({"typeTag": "LayerGroup", "id": "g"}), marker("m")])
        .expect("should set layers");
    // A full descriptor with a known id denotes the registered object.
    call(&mut map, "g", "addLayer", json!([marker("m")])).expect("should add");
    assert_eq!(call(&mut map, "g", "getLayers", json!([])).expect("should list"), json!(["m"]));
    assert_eq!(map.registry().ids().len(), 3);
}

#[test]
fn test_group_remove_layer_keeps_object_registered() {
    let (mut map, _, _) = component();
    let group = json!({"typeTag": "LayerGroup", "id": "g", "children": [marker("m")]});
    map.set_layers(&[group]).expect("should set layers");
    call(&mut map, "g", "removeLayer", json!(["m"])).expect("should remove");
    assert_eq!(call(&mut map, "g", "getLayers", json!([])).expect("should list"), json!([]));
    assert!(map.lookup("m").is_some());
}

#[test]
fn test_popup_lifecycle_events() {
    let (mut map, log, _) = component();
    let descriptor = json!({
        "typeTag": "Marker",
        "id": "m",
        "latLng": [0, 0],
        "events": ["popupopen", "popupclose"],
        "popup": {"content": "hello"}
    });
    map.set_layers(&[descriptor]).expect("should set layers");
    log.drain();

    call(&mut map, "m", "openPopup", json!([])).expect("should open");
    assert_eq!(call(&mut map, "m", "isPopupOpen", json!([])).expect("should query"), json!(true));
    call(&mut map, "m", "togglePopup", json!([])).expect("should toggle");

    let events = log.drain();
    let names: Vec<&str> = events.iter().map(|e| e.event.as_str()).collect();
    assert_eq!(names, vec!["popupopen", "popupclose"]);
    assert!(events.iter().all(|e| e.category == HandlerCategory::Popup));
    assert_eq!(events[0].payload["popup"], json!("hello"));
}

#[test]
fn test_open_popup_without_binding_is_invalid() {
    let (mut map, _, _) = component();
    map.set_layers(&[marker("m")]).expect("should set layers");
    let err = call(&mut map, "m", "openPopup", json!([])).expect_err("should fail");
    assert!(matches!(err, MapError::InvalidArgument { .. }));
}

#[test]
fn test_fit_bounds_centers_view() {
    let (mut map, _, _) = component();
    call(
        &mut map,
        "map",
        "fitBounds",
        json!([{"typeTag": "LatLngBounds", "southWest": [40, -10], "northEast": [50, 10]}]),
    )
    .expect("should fit");
    let center: LatLng =
        serde_json::from_value(call(&mut map, "map", "getCenter", json!([])).expect("should get"))
            .expect("should decode");
    assert!(center.equals_within(&LatLng::new(45.0, 0.0), 1e-9));

    let bounds = call(&mut map, "map", "getBounds", json!([])).expect("should get bounds");
    assert!(bounds["southWest"]["lat"].as_f64().expect("should be a number") <= 40.0);
    assert!(bounds["northEast"]["lat"].as_f64().expect("should be a number") >= 50.0);
}

#[test]
fn test_layers_control_owns_entries() {
    let (mut map, _, _) = component();
    map.set_layers(&[marker("base")]).expect("should set layers");
    map.add_controls(&[json!({
        "typeTag": "layers",
        "id": "switcher",
        "baseLayers": {"Streets": {"typeTag": "TileLayer", "id": "streets", "url": "https://tiles/{z}/{x}/{y}.png"}}
    })])
    .expect("should add controls");

    assert!(map.lookup("streets").is_some());
    call(&mut map, "switcher", "addOverlay", json!(["base", "Markers"])).expect("should add overlay");
    call(&mut map, "switcher", "collapse", json!([])).expect("should collapse");
    assert_eq!(
        call(&mut map, "switcher", "getPosition", json!([])).expect("should get"),
        json!("topright")
    );
    let err = call(&mut map, "switcher", "setPosition", json!(["middle"])).expect_err("should fail");
    assert!(matches!(err, MapError::InvalidArgument { .. }));
}
