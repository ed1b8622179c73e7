use vizij_timeline_core::{
    config::Config,
    data::{Handles, Keyframe, KeyframeSet, RawObject, Timeline, Track},
    engine::Engine,
    host::Host,
    hydration::{KeyframeAction, KeyframeParams},
    ids::{KeyframeId, TrackKey},
    interp::{self, Easing},
    scene::{SceneGraph, SceneObject},
    value::{Value, Vec2, Vec3},
};

fn approx(a: f64, b: f64, eps: f64) {
    assert!((a - b).abs() <= eps, "left={a} right={b} eps={eps}");
}

fn number(v: Option<Value>) -> f64 {
    v.and_then(|v| v.as_number()).expect("numeric value")
}

fn mk_track(path: &str, keys: &[(f64, f64)]) -> Track {
    let mut track = Track::new(path);
    for (i, (time, value)) in keys.iter().enumerate() {
        track
            .keyframes
            .insert(Keyframe::new(format!("k{i}"), *time, *value))
            .unwrap();
    }
    track
}

#[test]
fn keyframes_stay_sorted_through_mutations() {
    let mut set = KeyframeSet::new();
    for (id, time) in [("c", 3.0), ("a", 1.0), ("d", 0.5), ("b", 2.0)] {
        set.insert(Keyframe::new(id, time, 0.0)).unwrap();
    }
    assert!(set.is_sorted());

    assert!(set.set_time(&KeyframeId::from("d"), 10.0));
    assert!(set.is_sorted());
    let ids: Vec<&str> = set.iter().map(|k| k.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b", "c", "d"]);

    assert!(set.remove(&KeyframeId::from("b")).is_some());
    assert!(set.is_sorted());
    assert_eq!(set.len(), 3);
}

#[test]
fn hydrated_keyframe_edits_keep_tracks_sorted() {
    let scene = SceneGraph::new();
    scene.mount(SceneObject::new("cube").with("opacity", 0.0));
    let mut engine = Engine::new(Config::development(), Host::new(scene.clone()));
    let json = vizij_test_fixtures::timelines::json("fade-cube").unwrap();
    engine.load_timelines_json(&json).unwrap();

    let key = TrackKey::new("cube", "opacity");
    let mut live: Vec<KeyframeId> = vec!["kf-opacity-start".into(), "kf-opacity-end".into()];
    // xorshift64, fixed seed
    let mut state: u64 = 0x9e37_79b9_7f4a_7c15;
    let mut next = move || {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        state
    };

    for step in 0..300 {
        let roll = next();
        let time = (next() % 10_000) as f64 / 1000.0;
        let action = match roll % 3 {
            _ if live.is_empty() => None,
            0 => None,
            1 => Some(KeyframeAction::UpdateTime { new_time: time }),
            _ => Some(KeyframeAction::Remove),
        };
        let (keyframe_id, action) = match action {
            Some(action) => {
                let index = (next() % live.len() as u64) as usize;
                let id = match action {
                    KeyframeAction::Remove => live.swap_remove(index),
                    _ => live[index].clone(),
                };
                (id, action)
            }
            None => {
                let id = KeyframeId::from(format!("kf-{step}"));
                live.push(id.clone());
                let action = KeyframeAction::Create {
                    time,
                    value: Value::Number(time / 10.0),
                    handles: Handles::default(),
                };
                (id, action)
            }
        };
        assert!(
            engine.hydrate_keyframe(&KeyframeParams {
                vxkey: "cube".into(),
                property_path: "opacity".into(),
                keyframe_id,
                action,
            }),
            "step {step}"
        );

        let track = engine.current_timeline().unwrap().track(&key).unwrap();
        assert!(track.keyframes.is_sorted(), "step {step}");
        assert_eq!(track.keyframes.len(), live.len(), "step {step}");
    }
}

#[test]
fn duplicate_keyframe_ids_are_rejected() {
    let mut set = KeyframeSet::new();
    set.insert(Keyframe::new("a", 0.0, 1.0)).unwrap();
    let rejected = set.insert(Keyframe::new("a", 5.0, 2.0)).unwrap_err();
    assert_eq!(rejected.time, 5.0);
    assert_eq!(set.len(), 1);
}

#[test]
fn evaluation_clamps_outside_the_keyframes() {
    let track = mk_track("opacity", &[(2.0, 10.0), (4.0, 20.0)]);
    approx(
        number(interp::evaluate(&track.keyframes, -100.0)),
        10.0,
        1e-12,
    );
    approx(number(interp::evaluate(&track.keyframes, 2.0)), 10.0, 1e-12);
    approx(number(interp::evaluate(&track.keyframes, 4.0)), 20.0, 1e-12);
    approx(number(interp::evaluate(&track.keyframes, 1e9)), 20.0, 1e-12);
}

#[test]
fn linear_midpoint() {
    let track = mk_track("x", &[(0.0, 0.0), (10.0, 100.0)]);
    approx(number(interp::evaluate(&track.keyframes, 5.0)), 50.0, 1e-9);
    // Default handles sit on the diagonal, so eased evaluation matches linear.
    approx(
        number(interp::evaluate_with(&track.keyframes, 5.0, Easing::Handles)),
        50.0,
        1e-9,
    );
}

#[test]
fn empty_and_single_keyframe_tracks() {
    let empty = Track::new("x");
    assert_eq!(interp::evaluate(&empty.keyframes, 1.0), None);

    let single = mk_track("x", &[(3.0, 7.0)]);
    approx(number(interp::evaluate(&single.keyframes, 0.0)), 7.0, 1e-12);
    approx(number(interp::evaluate(&single.keyframes, 9.0)), 7.0, 1e-12);
}

#[test]
fn eased_handles_bend_the_segment() {
    // Ease-in: slow start, so the midpoint value lags behind linear.
    let ease_in = Handles {
        r#in: Vec2::new(1.0, 1.0),
        r#out: Vec2::new(0.42, 0.0),
    };
    let mut track = Track::new("x");
    track
        .keyframes
        .insert(Keyframe::new("a", 0.0, 0.0).with_handles(ease_in))
        .unwrap();
    track
        .keyframes
        .insert(Keyframe::new("b", 1.0, 1.0).with_handles(ease_in))
        .unwrap();

    let eased = number(interp::evaluate_with(&track.keyframes, 0.5, Easing::Handles));
    let linear = number(interp::evaluate_with(&track.keyframes, 0.5, Easing::Linear));
    approx(linear, 0.5, 1e-12);
    assert!(eased < 0.5, "eased={eased}");
    assert!(eased > 0.0, "eased={eased}");
}

#[test]
fn vector_tracks_interpolate_per_component() {
    let mut track = Track::new("position");
    track
        .keyframes
        .insert(Keyframe::new("a", 0.0, Vec3::new(0.0, 0.0, 0.0)))
        .unwrap();
    track
        .keyframes
        .insert(Keyframe::new("b", 4.0, Vec3::new(4.0, 2.0, -8.0)))
        .unwrap();
    let v = interp::evaluate(&track.keyframes, 1.0)
        .and_then(|v| v.as_vector3())
        .unwrap();
    approx(v.x, 1.0, 1e-12);
    approx(v.y, 0.5, 1e-12);
    approx(v.z, -2.0, 1e-12);
}

#[test]
fn set_current_time_writes_interpolated_value() {
    let scene = SceneGraph::new();
    let cube = scene.mount(SceneObject::new("cube").with("opacity", 0.0));

    let mut timeline = Timeline::new("main", "Main", 10.0);
    let mut obj = RawObject::new("cube");
    let track = mk_track("opacity", &[(0.0, 0.0), (10.0, 1.0)]);
    obj.tracks.push(track);
    timeline.objects.push(obj);

    let mut engine = Engine::new(Config::development(), Host::new(scene.clone()));
    engine.load_timelines([timeline]).unwrap();
    assert!(engine.init_object_on_mount("cube"));

    assert!(engine.set_current_time(2.5, false));
    approx(number(cube.read().read("opacity")), 0.25, 1e-9);
    approx(engine.current_time(), 2.5, 0.0);
}
