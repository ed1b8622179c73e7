use std::sync::{Arc, Mutex};

use vizij_timeline_core::{
    clock::{PlayOptions, PlaybackState},
    config::Config,
    engine::{Engine, ReRender},
    error::{EntityKind, TimelineError},
    events::{EngineEvent, EngineObserver},
    host::{FramePump, Host},
    hydration::{StaticPropAction, StaticPropParams},
    ids::TrackKey,
    parse_timelines_json,
    scene::{SceneGraph, SceneObject},
    value::{Value, Vec3},
};

fn approx(a: f64, b: f64, eps: f64) {
    assert!((a - b).abs() <= eps, "left={a} right={b} eps={eps}");
}

fn cube() -> SceneObject {
    SceneObject::new("cube")
        .with("opacity", 0.0)
        .with("position", Vec3::ZERO)
        .with("scale", Vec3::new(1.0, 1.0, 1.0))
}

fn opacity(scene: &SceneGraph) -> f64 {
    scene
        .get("cube")
        .and_then(|h| h.read().read("opacity"))
        .and_then(|v| v.as_number())
        .unwrap()
}

#[derive(Clone, Default)]
struct Recorder {
    events: Arc<Mutex<Vec<EngineEvent>>>,
}

impl EngineObserver for Recorder {
    fn on_event(&mut self, event: &EngineEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

/// Refuses manual seeks past `limit`.
struct SeekLimit {
    limit: f64,
}

impl EngineObserver for SeekLimit {
    fn before_set_time(&mut self, time: f64) -> bool {
        time <= self.limit
    }

    fn before_set_play_rate(&mut self, rate: f64) -> bool {
        rate > 0.0
    }
}

#[derive(Clone, Default)]
struct Frames {
    requested: Arc<Mutex<usize>>,
    cancelled: Arc<Mutex<usize>>,
}

impl FramePump for Frames {
    fn request_frame(&mut self) {
        *self.requested.lock().unwrap() += 1;
    }

    fn cancel_frame(&mut self) {
        *self.cancelled.lock().unwrap() += 1;
    }
}

fn fade_cube(host: Host) -> Engine {
    let mut engine = Engine::new(Config::development(), host);
    let json = vizij_test_fixtures::timelines::json("fade-cube").unwrap();
    engine.load_timelines_json(&json).unwrap();
    engine
}

#[test]
fn plays_to_the_end_and_stops() {
    let scene = SceneGraph::new();
    scene.mount(cube());
    let frames = Frames::default();
    let recorder = Recorder::default();
    let mut engine = fade_cube(Host::new(scene.clone()).with_frame_pump(frames.clone()));
    engine.add_observer(recorder.clone());

    assert!(engine.play(PlayOptions::to_end()));
    assert!(!engine.play(PlayOptions::to_end()), "already playing");
    assert_eq!(engine.state(), PlaybackState::Playing);

    // First frame establishes the timestamp only.
    engine.tick(1_000.0);
    approx(engine.current_time(), 0.0, 0.0);
    engine.tick(1_500.0);
    approx(engine.current_time(), 0.5, 1e-9);
    approx(opacity(&scene), 0.05, 1e-9);

    // A long stall is capped at one second.
    engine.tick(60_000.0);
    approx(engine.current_time(), 1.5, 1e-9);

    let mut now = 60_000.0;
    let mut guard = 0;
    while engine.is_playing() {
        now += 1_000.0;
        engine.tick(now);
        guard += 1;
        assert!(guard < 100, "playback never ended");
    }

    approx(engine.current_time(), 10.0, 0.0);
    approx(opacity(&scene), 1.0, 1e-12);
    assert_eq!(engine.state(), PlaybackState::Stopped);
    assert!(*frames.cancelled.lock().unwrap() >= 1);
    assert!(*frames.requested.lock().unwrap() >= 3);

    let events = recorder.events.lock().unwrap();
    assert_eq!(
        events.first(),
        Some(&EngineEvent::Played {
            to_time: Some(10.0)
        })
    );
    assert_eq!(events.last(), Some(&EngineEvent::Ended { time: 10.0 }));
    assert!(events.contains(&EngineEvent::Paused { time: 10.0 }));
    assert!(events
        .iter()
        .any(|e| matches!(e, EngineEvent::TimeUpdatedAutomatically { .. })));
}

#[test]
fn play_until_is_refused_behind_the_playhead() {
    let scene = SceneGraph::new();
    scene.mount(cube());
    let mut engine = fade_cube(Host::new(scene));
    assert!(engine.set_current_time(4.0, false));
    assert!(!engine.play(PlayOptions::until(4.0)));
    assert!(!engine.play(PlayOptions::until(2.0)));
    assert!(engine.play(PlayOptions::until(6.0)));

    engine.advance(0.0);
    engine.advance(5.0);
    approx(engine.current_time(), 6.0, 0.0);
    assert!(!engine.is_playing());
}

#[test]
fn play_rate_scales_advance() {
    let scene = SceneGraph::new();
    scene.mount(cube());
    let mut engine = fade_cube(Host::new(scene));
    assert!(engine.set_play_rate(2.0));
    assert!(engine.play(PlayOptions::default()));
    engine.advance(1.5);
    approx(engine.current_time(), 3.0, 1e-12);
    // No end time: playback runs past the timeline length.
    engine.advance(10.0);
    approx(engine.current_time(), 23.0, 1e-12);
    assert!(engine.is_playing());
    engine.pause();
    engine.pause();
    assert!(!engine.is_playing());
}

#[test]
fn observers_can_veto_manual_changes() {
    let scene = SceneGraph::new();
    scene.mount(cube());
    let recorder = Recorder::default();
    let mut engine = fade_cube(Host::new(scene.clone()));
    engine.add_observer(SeekLimit { limit: 5.0 });
    engine.add_observer(recorder.clone());

    assert!(engine.set_current_time(5.0, false));
    approx(opacity(&scene), 0.5, 1e-9);
    assert!(!engine.set_current_time(7.0, false));
    approx(engine.current_time(), 5.0, 0.0);
    approx(opacity(&scene), 0.5, 1e-9);

    // Clock-driven updates are not subject to the veto.
    assert!(engine.set_current_time(7.0, true));
    approx(opacity(&scene), 0.7, 1e-9);

    assert!(!engine.set_play_rate(-1.0));
    approx(engine.play_rate(), 1.0, 0.0);
    assert!(!engine.set_current_time(f64::NAN, false));

    let events = recorder.events.lock().unwrap();
    assert_eq!(
        events.as_slice(),
        &[
            EngineEvent::TimeSetManually { time: 5.0 },
            EngineEvent::TimeUpdatedAutomatically { time: 7.0 },
        ]
    );
}

#[test]
fn remounted_targets_are_rebound() {
    let scene = SceneGraph::new();
    let first = scene.mount(cube());
    let mut engine = fade_cube(Host::new(scene.clone()));
    assert!(engine.init_object_on_mount("cube"));
    assert!(engine.set_current_time(5.0, false));
    assert_eq!(first.read().read("opacity"), Some(Value::Number(0.5)));

    // The host swaps the object without telling the engine.
    let second = scene.mount(cube());
    assert!(engine.set_current_time(2.5, false));
    assert_eq!(second.read().read("opacity"), Some(Value::Number(0.25)));
    assert_eq!(first.read().read("opacity"), Some(Value::Number(0.5)));
    assert!(engine.is_setter_resolved(&TrackKey::new("cube", "opacity")));
}

#[test]
fn unmount_drops_setters_and_skips_the_object() {
    let scene = SceneGraph::new();
    let handle = scene.mount(cube());
    let mut engine = fade_cube(Host::new(scene.clone()));
    let key = TrackKey::new("cube", "opacity");
    assert!(engine.has_setter(&key));

    scene.unmount("cube");
    engine.on_object_unmount("cube");
    assert!(!engine.has_setter(&key));

    assert!(engine.set_current_time(8.0, false));
    assert_eq!(handle.read().read("opacity"), Some(Value::Number(0.0)));
    assert!(!engine.init_object_on_mount("cube"));
}

#[test]
fn mounting_late_applies_current_values() {
    let scene = SceneGraph::new();
    let mut engine = fade_cube(Host::new(scene.clone()));
    assert!(engine.set_current_time(4.0, false));

    let handle = scene.mount(cube());
    assert!(engine.init_object_on_mount("cube"));
    let obj = handle.read();
    assert_eq!(obj.read("opacity"), Some(Value::Number(0.4)));
    assert_eq!(
        obj.read("position"),
        Some(Value::Vector3(Vec3::new(4.0, 2.0, 0.0)))
    );
    assert_eq!(obj.read("scale.x"), Some(Value::Number(2.0)));
}

#[test]
fn missing_intermediates_become_noops() {
    let scene = SceneGraph::new();
    let handle = scene.mount(SceneObject::new("cube").with("opacity", 0.0));
    let mut engine = fade_cube(Host::new(scene.clone()));
    assert!(engine.hydrate_static_prop(&StaticPropParams {
        vxkey: "cube".into(),
        property_path: "geometry.width".into(),
        action: StaticPropAction::Create {
            value: Value::Number(2.0),
        },
    }));

    let width = TrackKey::new("cube", "geometry.width");
    assert!(engine.has_setter(&width));
    assert!(!engine.is_setter_resolved(&width));
    // Top-level leaves always bind; the field is created on first write.
    assert!(engine.is_setter_resolved(&TrackKey::new("cube", "position")));

    for time in [0.0, 2.5, 5.0, 12.0] {
        assert!(engine.set_current_time(time, false));
    }
    approx(opacity(&scene), 1.0, 1e-9);
    let obj = handle.read();
    assert!(obj.node("geometry").is_none());
    assert_eq!(
        obj.read("position"),
        Some(Value::Vector3(Vec3::new(4.0, 2.0, 0.0)))
    );
    let reports = engine
        .diagnostics()
        .entries()
        .filter(|d| d.module == "binding" && d.message.contains("geometry.width"))
        .count();
    assert_eq!(reports, 1);
}

#[test]
fn rebuilding_setters_binds_the_current_target() {
    let scene = SceneGraph::new();
    let first = scene.mount(cube());
    let mut engine = fade_cube(Host::new(scene.clone()));
    assert!(engine.init_object_on_mount("cube"));
    assert_eq!(first.read().read("opacity"), Some(Value::Number(0.0)));

    let second = scene.mount(cube());
    assert!(engine.rebuild_object_property_setters("cube"));
    let paths = ["opacity", "position", "scale.x"];
    for path in paths {
        let key = TrackKey::new("cube", path);
        assert!(engine.has_setter(&key), "{path}");
        assert!(engine.is_setter_resolved(&key), "{path}");
    }
    assert!(engine.set_current_time(5.0, false));
    assert_eq!(second.read().read("opacity"), Some(Value::Number(0.5)));
    assert_eq!(second.read().read("scale.x"), Some(Value::Number(2.0)));
    assert_eq!(first.read().read("opacity"), Some(Value::Number(0.0)));

    // A replacement without `scale` leaves that path bound to a no-op.
    let third = scene.mount(SceneObject::new("cube").with("opacity", 0.0));
    assert!(engine.rebuild_object_property_setters("cube"));
    assert!(engine.has_setter(&TrackKey::new("cube", "scale.x")));
    assert!(!engine.is_setter_resolved(&TrackKey::new("cube", "scale.x")));
    assert!(engine.is_setter_resolved(&TrackKey::new("cube", "opacity")));
    assert!(engine.set_current_time(2.5, false));
    assert_eq!(third.read().read("opacity"), Some(Value::Number(0.25)));
    assert!(third.read().node("scale").is_none());

    // Objects the timeline does not animate get no setters.
    scene.mount(SceneObject::new("lamp").with("opacity", 1.0));
    assert!(engine.rebuild_object_property_setters("lamp"));
    assert!(!engine.has_setter(&TrackKey::new("lamp", "opacity")));

    scene.unmount("cube");
    assert!(!engine.rebuild_object_property_setters("cube"));
    for path in paths {
        assert!(!engine.has_setter(&TrackKey::new("cube", path)), "{path}");
    }
}

#[test]
fn switching_timelines_resets_runtime_state() {
    let scene = SceneGraph::new();
    let title = scene.mount(SceneObject::new("title").with("opacity", 0.0));
    let recorder = Recorder::default();
    let mut engine = Engine::new(Config::development(), Host::new(scene.clone()));
    engine.add_observer(recorder.clone());
    let json = vizij_test_fixtures::timelines::json("two-timelines").unwrap();
    engine.load_timelines_json(&json).unwrap();

    assert_eq!(engine.current_timeline_id(), Some("intro"));
    assert!(engine.set_current_time(1.0, false));
    assert_eq!(title.read().read("opacity"), Some(Value::Number(0.5)));

    engine.set_current_timeline("outro").unwrap();
    let outro = title
        .read()
        .read("opacity")
        .and_then(|v| v.as_number())
        .unwrap();
    approx(outro, 2.0 / 3.0, 1e-12);
    assert!(engine.set_current_timeline("missing").is_err());
    assert_eq!(engine.current_timeline_id(), Some("outro"));

    engine.re_render(ReRender {
        time: Some(3.0),
        force: false,
    });
    assert_eq!(title.read().read("opacity"), Some(Value::Number(0.0)));
    approx(engine.current_time(), 1.0, 0.0);

    let events = recorder.events.lock().unwrap();
    assert!(events.contains(&EngineEvent::TimelineChanged { id: "outro".into() }));
}

#[test]
fn duplicate_timeline_ids_are_rejected() {
    let scene = SceneGraph::new();
    let title = scene.mount(SceneObject::new("title").with("opacity", 0.0));
    let mut engine = Engine::new(Config::development(), Host::new(scene.clone()));
    let json = vizij_test_fixtures::timelines::json("two-timelines").unwrap();
    engine.load_timelines_json(&json).unwrap();
    assert!(engine.set_current_time(1.0, false));

    let mut timelines = parse_timelines_json(&json).unwrap();
    let mut copy = timelines[1].clone();
    copy.id = "intro".into();
    copy.length = 99.0;
    timelines.push(copy);

    let err = engine.load_timelines(timelines).unwrap_err();
    assert_eq!(
        err,
        TimelineError::AlreadyExists {
            kind: EntityKind::Timeline,
            key: "intro".into(),
        }
    );
    // The loaded set is unchanged.
    assert_eq!(engine.timelines().count(), 2);
    assert_eq!(engine.timeline("intro").map(|t| t.length), Some(2.0));
    assert_eq!(engine.current_timeline_id(), Some("intro"));
    assert_eq!(title.read().read("opacity"), Some(Value::Number(0.5)));
}
