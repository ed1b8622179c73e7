use vizij_timeline_core::{
    binding::PropertyBinder,
    config::{Config, Mode},
    data::{Handles, Spline, Timeline},
    diagnostics::{Diagnostics, Severity},
    engine::Engine,
    error::TimelineError,
    host::Host,
    hydration::{
        HydrationCommand, HydrationService, KeyframeAction, KeyframeParams, SplineAction,
        SplineParams, StaticPropAction, StaticPropParams, TrackAction, TrackParams,
    },
    ids::{KeyframeId, SplineKey, TrackKey},
    scene::{SceneGraph, SceneObject},
    spline::{CardinalSplineProvider, SplineCache},
    stored_timeline::timeline_to_json,
    value::{Value, Vec3},
};

fn engine_with(cfg: Config, fixture: &str) -> (Engine, SceneGraph) {
    let scene = SceneGraph::new();
    scene.mount(
        SceneObject::new("cube")
            .with("opacity", 0.0)
            .with("position", Vec3::ZERO)
            .with("scale", Vec3::new(1.0, 1.0, 1.0)),
    );
    let mut engine = Engine::new(cfg, Host::new(scene.clone()));
    let json = vizij_test_fixtures::timelines::json(fixture).unwrap();
    engine.load_timelines_json(&json).unwrap();
    (engine, scene)
}

fn static_params(vxkey: &str, path: &str, action: StaticPropAction) -> StaticPropParams {
    StaticPropParams {
        vxkey: vxkey.into(),
        property_path: path.into(),
        action,
    }
}

#[test]
fn tracked_and_static_are_mutually_exclusive() {
    let (mut engine, _scene) = engine_with(Config::development(), "fade-cube");

    // `opacity` is tracked: a static prop for it is a conflict.
    assert!(!engine.hydrate_static_prop(&static_params(
        "cube",
        "opacity",
        StaticPropAction::Create {
            value: Value::Number(1.0)
        }
    )));
    // `scale.x` is static: a track for it is a conflict.
    assert!(!engine.hydrate_track(&TrackParams {
        vxkey: "cube".into(),
        property_path: "scale.x".into(),
        action: TrackAction::Create,
    }));

    let timeline = engine.current_timeline().unwrap();
    let opacity = TrackKey::new("cube", "opacity");
    let scale = TrackKey::new("cube", "scale.x");
    assert!(timeline.is_tracked(&opacity) && !timeline.is_static(&opacity));
    assert!(timeline.is_static(&scale) && !timeline.is_tracked(&scale));
    assert_eq!(engine.diagnostics().count(Severity::Warning), 2);
    assert!(engine
        .diagnostics()
        .entries()
        .all(|d| d.message.starts_with("[representation]")));
}

#[test]
fn transitions_keep_exclusivity() {
    let (mut engine, _scene) = engine_with(Config::development(), "fade-cube");
    let key = TrackKey::new("cube", "scale.x");

    assert!(engine.make_property_tracked("cube", "scale.x").is_some());
    let timeline = engine.current_timeline().unwrap();
    assert!(timeline.is_tracked(&key) && !timeline.is_static(&key));

    assert!(engine.make_property_static("cube", "scale.x"));
    let timeline = engine.current_timeline().unwrap();
    assert!(timeline.is_static(&key) && !timeline.is_tracked(&key));
    assert_eq!(
        timeline.static_prop(&key).map(|p| p.value),
        Some(Value::Number(2.0))
    );
}

#[test]
fn production_rejects_hydration_without_mutating() {
    let (mut engine, _scene) = engine_with(Config::production(), "fade-cube");
    assert_eq!(engine.mode(), Mode::Production);
    let before = timeline_to_json(engine.current_timeline().unwrap()).unwrap();

    let applied = engine.hydrate_keyframe(&KeyframeParams {
        vxkey: "cube".into(),
        property_path: "opacity".into(),
        keyframe_id: KeyframeId::from("kf-new"),
        action: KeyframeAction::Create {
            time: 5.0,
            value: Value::Number(0.5),
            handles: Handles::default(),
        },
    });

    assert!(!applied);
    let after = timeline_to_json(engine.current_timeline().unwrap()).unwrap();
    assert_eq!(before, after);
    assert_eq!(engine.diagnostics().count(Severity::Error), 1);
    let entry = engine
        .diagnostics()
        .entries()
        .find(|d| d.severity == Severity::Error)
        .unwrap();
    assert!(entry.message.contains("production"), "{}", entry.message);
}

#[test]
fn keyframe_actions_from_json() {
    let (mut engine, scene) = engine_with(Config::development(), "fade-cube");
    let key = TrackKey::new("cube", "opacity");

    assert!(engine.hydrate_command_json(
        r#"{"kind":"keyframe","action":"create","vxkey":"cube","propertyPath":"opacity",
            "keyframeId":"kf-mid","time":5,"value":0.9}"#
    ));
    assert!(engine.hydrate_command_json(
        r#"{"kind":"keyframe","action":"updateTime","vxkey":"cube","propertyPath":"opacity",
            "keyframeId":"kf-opacity-start","newTime":6}"#
    ));

    let track = engine.current_timeline().unwrap().track(&key).unwrap();
    assert!(track.keyframes.is_sorted());
    let ids: Vec<&str> = track.keyframes.iter().map(|k| k.id.as_str()).collect();
    assert_eq!(ids, vec!["kf-mid", "kf-opacity-start", "kf-opacity-end"]);

    // Not playing, so the mutation was rendered straight away.
    let cube = scene.get("cube").unwrap();
    assert_eq!(cube.read().read("opacity"), Some(Value::Number(0.9)));
}

#[test]
fn unknown_action_is_ignored() {
    let (mut engine, _scene) = engine_with(Config::development(), "fade-cube");
    let before = timeline_to_json(engine.current_timeline().unwrap()).unwrap();

    let err = HydrationCommand::parse(
        r#"{"kind":"keyframe","action":"explode","vxkey":"cube","propertyPath":"opacity","keyframeId":"x"}"#,
    )
    .unwrap_err();
    assert!(matches!(err, TimelineError::UnknownAction { .. }));

    assert!(!engine.hydrate_command_json(
        r#"{"kind":"keyframe","action":"explode","vxkey":"cube","propertyPath":"opacity","keyframeId":"x"}"#
    ));
    assert_eq!(
        timeline_to_json(engine.current_timeline().unwrap()).unwrap(),
        before
    );
    assert_eq!(engine.diagnostics().count(Severity::Warning), 1);
    assert_eq!(engine.diagnostics().count(Severity::Error), 0);
}

#[test]
fn mismatched_value_kind_is_rejected() {
    let (mut engine, _scene) = engine_with(Config::development(), "fade-cube");
    assert!(!engine.hydrate_keyframe(&KeyframeParams {
        vxkey: "cube".into(),
        property_path: "opacity".into(),
        keyframe_id: KeyframeId::from("kf-opacity-end"),
        action: KeyframeAction::UpdateValue {
            new_value: Value::Vector3(Vec3::new(1.0, 2.0, 3.0)),
        },
    }));
    let key = TrackKey::new("cube", "opacity");
    let track = engine.current_timeline().unwrap().track(&key).unwrap();
    assert_eq!(
        track
            .keyframes
            .get(&KeyframeId::from("kf-opacity-end"))
            .map(|k| k.value),
        Some(Value::Number(1.0))
    );
}

#[test]
fn spline_create_with_cached_curve_is_an_invariant_violation() {
    let mut timeline = Timeline::new("t", "T", 5.0);
    let scene = SceneGraph::new();
    let provider = CardinalSplineProvider;
    let mut splines = SplineCache::new();
    let mut binder = PropertyBinder::new();
    let mut diagnostics = Diagnostics::default();

    let key = SplineKey::for_object("drone");
    let nodes = vec![Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0)];
    // A curve that outlived its raw spline.
    splines.insert(
        &provider,
        &Spline {
            spline_key: key.clone(),
            vxkey: "drone".into(),
            nodes: nodes.clone(),
            tension: 0.5,
            closed: false,
        },
    );

    let mut service = HydrationService {
        mode: Mode::Development,
        time: 0.0,
        timeline: &mut timeline,
        splines: &mut splines,
        provider: &provider,
        binder: &mut binder,
        scene: &scene,
        diagnostics: &mut diagnostics,
    };
    let err = service
        .spline(&SplineParams {
            vxkey: "drone".into(),
            spline_key: key,
            action: SplineAction::Create {
                nodes,
                tension: None,
                closed: false,
            },
        })
        .unwrap_err();
    assert!(matches!(err, TimelineError::InvariantViolation(_)));
    assert!(timeline.splines.is_empty());
}

#[test]
fn spline_node_edits_rebuild_the_curve() {
    let (mut engine, _scene) = engine_with(Config::development(), "fade-cube");
    let key = engine
        .create_spline(
            "cube",
            vec![
                Vec3::ZERO,
                Vec3::new(10.0, 0.0, 0.0),
                Vec3::new(10.0, 10.0, 0.0),
            ],
        )
        .unwrap();
    assert_eq!(key.as_str(), "cube.spline");

    let timeline = engine.current_timeline().unwrap();
    let obj = timeline.object("cube").unwrap();
    assert_eq!(obj.settings.get("useSplinePath"), Some(&true));
    assert!(obj.track("position").is_none());
    assert_eq!(
        timeline
            .static_prop(&TrackKey::new("cube", "splineProgress"))
            .map(|p| p.value),
        Some(Value::Number(0.0))
    );

    assert!(engine.insert_spline_node(&key, 0));
    let nodes = &engine.current_timeline().unwrap().splines[&key].nodes;
    assert_eq!(nodes.len(), 4);
    assert_eq!(nodes[1], Vec3::new(5.0, 0.0, 0.0));
    assert_eq!(engine.spline_point_at(&key, 0.0), Some(Vec3::ZERO));

    assert!(engine.hydrate_spline(&SplineParams {
        vxkey: "cube".into(),
        spline_key: key.clone(),
        action: SplineAction::UpdateNode {
            index: 0,
            node: Vec3::new(-1.0, 0.0, 0.0),
        },
    }));
    assert_eq!(
        engine.spline_point_at(&key, 0.0),
        Some(Vec3::new(-1.0, 0.0, 0.0))
    );

    // Two nodes is the floor.
    for _ in 0..2 {
        assert!(engine.hydrate_spline(&SplineParams {
            vxkey: "cube".into(),
            spline_key: key.clone(),
            action: SplineAction::RemoveNode { index: 0 },
        }));
    }
    assert!(!engine.hydrate_spline(&SplineParams {
        vxkey: "cube".into(),
        spline_key: key.clone(),
        action: SplineAction::RemoveNode { index: 0 },
    }));

    assert!(engine.remove_spline("cube"));
    assert!(engine.spline_point_at(&key, 0.5).is_none());
    let obj = engine.current_timeline().unwrap().object("cube").unwrap();
    assert!(obj.static_prop("splineProgress").is_none());
    assert!(obj.settings.get("useSplinePath").is_none());
}

#[test]
fn static_prop_update_through_params() {
    let (mut engine, scene) = engine_with(Config::development(), "fade-cube");
    assert!(engine.hydrate_static_prop(&static_params(
        "cube",
        "scale.x",
        StaticPropAction::Update {
            new_value: Value::Number(3.0)
        }
    )));
    let cube = scene.get("cube").unwrap();
    assert_eq!(cube.read().read("scale.x"), Some(Value::Number(3.0)));
    assert!(engine.hydrate_command(&HydrationCommand::StaticProp(static_params(
        "cube",
        "scale.x",
        StaticPropAction::Remove
    ))));
    assert!(!engine
        .current_timeline()
        .unwrap()
        .is_static(&TrackKey::new("cube", "scale.x")));
}

#[test]
fn non_finite_spline_tension_leaves_the_model_untouched() {
    let mut cfg = Config::development();
    cfg.default_spline_tension = f64::NAN;
    let (mut engine, _scene) = engine_with(cfg, "fade-cube");
    let before = timeline_to_json(engine.current_timeline().unwrap()).unwrap();

    let created = engine.create_spline("cube", vec![Vec3::ZERO, Vec3::new(10.0, 0.0, 0.0)]);

    assert!(created.is_none());
    let after = timeline_to_json(engine.current_timeline().unwrap()).unwrap();
    assert_eq!(before, after);
    assert!(engine
        .diagnostics()
        .entries()
        .any(|d| d.message.contains("not finite")));

    let key = SplineKey::for_object("cube");
    assert!(!engine.hydrate_spline(&SplineParams {
        vxkey: "cube".into(),
        spline_key: key.clone(),
        action: SplineAction::Create {
            nodes: vec![Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0)],
            tension: Some(f64::INFINITY),
            closed: false,
        },
    }));
    assert!(engine.spline_point_at(&key, 0.5).is_none());
    assert!(engine.current_timeline().unwrap().splines.is_empty());
}
