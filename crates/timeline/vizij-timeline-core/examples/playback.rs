//! Headless playback of a small timeline.
//!
//! Run with `RUST_LOG=vizij_timeline=debug VIZIJ_ENV=development cargo run --example playback`.

use vizij_timeline_core::{
    clock::PlayOptions,
    data::{Keyframe, RawObject, Timeline, Track},
    engine::Engine,
    host::Host,
    ids::TrackKey,
    scene::{SceneGraph, SceneObject},
    value::Vec3,
};

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let scene = SceneGraph::new();
    let cube = scene.mount(
        SceneObject::new("cube")
            .with("opacity", 0.0)
            .with("position", Vec3::ZERO),
    );

    let mut timeline = Timeline::new("demo", "Demo", 2.0);
    let mut obj = RawObject::new("cube");
    let mut opacity = Track::new("opacity");
    opacity
        .keyframes
        .insert(Keyframe::new("kf-0", 0.0, 0.0))
        .map_err(|kf| anyhow::anyhow!("duplicate keyframe {}", kf.id))?;
    opacity
        .keyframes
        .insert(Keyframe::new("kf-1", 2.0, 1.0))
        .map_err(|kf| anyhow::anyhow!("duplicate keyframe {}", kf.id))?;
    obj.tracks.push(opacity);
    timeline.objects.push(obj);

    let mut engine = Engine::from_env(Host::new(scene))?;
    engine.load_timelines([timeline])?;
    engine.create_spline(
        "cube",
        vec![
            Vec3::ZERO,
            Vec3::new(1.0, 2.0, 0.0),
            Vec3::new(3.0, 0.0, 0.0),
        ],
    );
    engine.modify_param_value("cube", "splineProgress", 25.0, true);

    engine.play(PlayOptions::to_end());
    let mut now_ms = 0.0;
    while engine.is_playing() {
        engine.tick(now_ms);
        let obj = cube.read();
        println!(
            "t={:.3} opacity={:?} position={:?}",
            engine.current_time(),
            obj.read("opacity"),
            obj.read("position"),
        );
        now_ms += 250.0;
    }

    let key = TrackKey::new("cube", "opacity");
    println!(
        "final opacity: {:?}",
        engine.evaluate_property(&key, engine.current_time())
    );
    for d in engine.diagnostics().entries() {
        println!("{:?} [{}] {}", d.severity, d.module, d.message);
    }
    Ok(())
}
