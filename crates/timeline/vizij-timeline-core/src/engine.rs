//! Engine: owns the loaded timelines, the clock, the runtime caches and the host seams.
//!
//! Per frame the host calls [`Engine::tick`]; the engine advances the clock, evaluates every
//! track of the current timeline and writes the values through the property binder, firing
//! side effects as it goes. Authoring calls go through [`HydrationService`] and are committed
//! (redraw + persist) here.
//!
//! Errors never escape a frame: they are reported to [`Diagnostics`] and the public API returns
//! `bool`/`Option`, except for [`Engine::set_current_timeline`] and loading, which return
//! `Result`.

use indexmap::IndexMap;

use crate::batcher::{ModelUpdate, UpdateBatcher};
use crate::binding::PropertyBinder;
use crate::clock::{Clock, PlayOptions, PlaybackState};
use crate::config::{Config, Mode};
use crate::data::{Handles, RawObject, Timeline};
use crate::diagnostics::Diagnostics;
use crate::effects::{EffectContext, SideEffect, SideEffectRegistry};
use crate::error::{ConfigError, EntityKind, TimelineError};
use crate::events::{EngineEvent, EngineObserver};
use crate::host::Host;
use crate::hydration::{
    HydrationCommand, HydrationService, KeyframeAction, KeyframeParams, SettingParams,
    SplineAction, SplineParams, StaticPropAction, StaticPropParams, TrackParams,
};
use crate::ids::{KeyframeId, SplineKey, TrackKey};
use crate::interp::{self, Easing};
use crate::scene::TargetHandle;
use crate::spline::SplineCache;
use crate::stored_timeline::parse_timelines_json;
use crate::value::{Value, Vec3};

/// Two keyframe times closer than this are the same position on the time ruler.
pub const KEYFRAME_EPSILON: f64 = 1e-6;

/// Options for [`Engine::re_render`].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ReRender {
    /// Evaluate at this time instead of the current time. The clock is not moved.
    pub time: Option<f64>,
    /// Render even while playing.
    pub force: bool,
}

impl ReRender {
    pub fn forced() -> Self {
        Self {
            time: None,
            force: true,
        }
    }
}

/// One evaluated property value, produced by the evaluation pass.
#[derive(Clone, Debug, PartialEq)]
pub struct PropertyWrite {
    pub key: TrackKey,
    pub value: Value,
}

/// Static props first, then tracks, for one object.
fn collect_object_writes(
    obj: &RawObject,
    time: f64,
    easing: Easing,
    out: &mut Vec<PropertyWrite>,
) {
    for prop in &obj.static_props {
        out.push(PropertyWrite {
            key: TrackKey::new(&obj.vxkey, &prop.property_path),
            value: prop.value,
        });
    }
    for track in &obj.tracks {
        if let Some(value) = interp::evaluate_with(&track.keyframes, time, easing) {
            out.push(PropertyWrite {
                key: TrackKey::new(&obj.vxkey, &track.property_path),
                value,
            });
        }
    }
}

pub struct Engine {
    cfg: Config,
    host: Host,
    timelines: IndexMap<String, Timeline>,
    current: Option<String>,
    clock: Clock,
    binder: PropertyBinder,
    effects: SideEffectRegistry,
    splines: SplineCache,
    batcher: UpdateBatcher,
    diagnostics: Diagnostics,
    observers: Vec<Box<dyn EngineObserver>>,
    scratch: Vec<PropertyWrite>,
}

impl Engine {
    pub fn new(cfg: Config, host: Host) -> Self {
        Self {
            clock: Clock::new(cfg.max_frame_delta_ms),
            diagnostics: Diagnostics::with_capacity(cfg.max_diagnostics),
            scratch: Vec::with_capacity(cfg.scratch_writes),
            cfg,
            host,
            timelines: IndexMap::new(),
            current: None,
            binder: PropertyBinder::new(),
            effects: SideEffectRegistry::new(),
            splines: SplineCache::new(),
            batcher: UpdateBatcher::new(),
            observers: Vec::new(),
        }
    }

    /// Construct with the mode taken from the environment. A missing mode is fatal.
    pub fn from_env(host: Host) -> Result<Self, ConfigError> {
        Ok(Self::new(Config::from_env()?, host))
    }

    // ---- accessors ----

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    pub fn mode(&self) -> Mode {
        self.cfg.mode
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn diagnostics_mut(&mut self) -> &mut Diagnostics {
        &mut self.diagnostics
    }

    pub fn batcher(&self) -> &UpdateBatcher {
        &self.batcher
    }

    pub fn spline_cache(&self) -> &SplineCache {
        &self.splines
    }

    pub fn current_time(&self) -> f64 {
        self.clock.current_time()
    }

    pub fn play_rate(&self) -> f64 {
        self.clock.play_rate()
    }

    pub fn state(&self) -> PlaybackState {
        self.clock.state()
    }

    pub fn is_playing(&self) -> bool {
        self.clock.is_playing()
    }

    pub fn add_observer(&mut self, observer: impl EngineObserver + 'static) {
        self.observers.push(Box::new(observer));
    }

    fn emit(&mut self, event: EngineEvent) {
        for observer in self.observers.iter_mut() {
            observer.on_event(&event);
        }
    }

    fn report(&mut self, module: &'static str, err: &TimelineError) {
        self.diagnostics.report(module, err);
    }

    // ---- timelines ----

    /// Replace all loaded timelines and make the first one current. Nothing changes if any
    /// timeline fails validation.
    pub fn load_timelines<I>(&mut self, timelines: I) -> Result<(), TimelineError>
    where
        I: IntoIterator<Item = Timeline>,
    {
        let mut loaded = IndexMap::new();
        for timeline in timelines {
            let checked = timeline.validate_basic().and_then(|()| {
                if loaded.contains_key(&timeline.id) {
                    Err(TimelineError::already_exists(EntityKind::Timeline, &timeline.id))
                } else {
                    Ok(())
                }
            });
            if let Err(err) = checked {
                self.report("engine", &err);
                return Err(err);
            }
            loaded.insert(timeline.id.clone(), timeline);
        }
        self.timelines = loaded;
        self.current = None;
        self.binder.clear();
        self.splines.clear();
        self.batcher.clear();
        match self.timelines.keys().next().cloned() {
            Some(first) => self.set_current_timeline(&first),
            None => Ok(()),
        }
    }

    pub fn load_timelines_json(&mut self, json: &str) -> Result<(), TimelineError> {
        match parse_timelines_json(json) {
            Ok(timelines) => self.load_timelines(timelines),
            Err(err) => {
                self.report("engine", &err);
                Err(err)
            }
        }
    }

    pub fn timelines(&self) -> impl Iterator<Item = &Timeline> {
        self.timelines.values()
    }

    pub fn timeline(&self, id: &str) -> Option<&Timeline> {
        self.timelines.get(id)
    }

    pub fn current_timeline_id(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn current_timeline(&self) -> Option<&Timeline> {
        self.current.as_ref().and_then(|id| self.timelines.get(id))
    }

    /// Switch the active timeline. Setter, spline and pending-update state of the previous
    /// timeline is discarded before the new one is evaluated.
    pub fn set_current_timeline(&mut self, id: &str) -> Result<(), TimelineError> {
        if !self.timelines.contains_key(id) {
            let err = TimelineError::not_found(EntityKind::Timeline, id);
            self.report("engine", &err);
            return Err(err);
        }
        self.binder.clear();
        self.splines.clear();
        self.batcher.clear();
        self.current = Some(id.to_string());

        if let Some(timeline) = self.timelines.get(id) {
            for spline in timeline.splines.values() {
                self.splines.insert(self.host.splines.as_ref(), spline);
            }
        }
        self.rebind_all();
        self.emit(EngineEvent::TimelineChanged { id: id.to_string() });
        self.re_render(ReRender::forced());
        Ok(())
    }

    /// Rebuild setters for every mounted object of the current timeline.
    fn rebind_all(&mut self) {
        let Some(timeline) = self.current.as_ref().and_then(|id| self.timelines.get(id)) else {
            return;
        };
        for obj in &timeline.objects {
            if let Some(target) = self.host.scene.resolve(&obj.vxkey) {
                let paths = obj.property_paths();
                self.binder
                    .rebuild(&obj.vxkey, &target, paths, &mut self.diagnostics);
            }
        }
    }

    // ---- clock ----

    /// Move the playhead and run one evaluation pass. Manual seeks (`is_tick == false`) can be
    /// vetoed by observers; returns `false` in that case.
    pub fn set_current_time(&mut self, time: f64, is_tick: bool) -> bool {
        if !time.is_finite() {
            self.diagnostics
                .warn("engine", format!("ignoring non-finite time {time}"));
            return false;
        }
        if !is_tick && !self.observers.iter_mut().all(|o| o.before_set_time(time)) {
            return false;
        }
        self.clock.set_time(time);
        self.evaluate_pass(time);
        self.emit(if is_tick {
            EngineEvent::TimeUpdatedAutomatically { time }
        } else {
            EngineEvent::TimeSetManually { time }
        });
        true
    }

    /// Start playback. Returns `false` if already playing or if `to_time` is not ahead of the
    /// current time.
    pub fn play(&mut self, opts: PlayOptions) -> bool {
        let length = self.current_timeline().map_or(0.0, |t| t.length);
        if !self.clock.play(opts, length) {
            return false;
        }
        self.emit(EngineEvent::Played {
            to_time: self.clock.end_time(),
        });
        self.host.frames.request_frame();
        true
    }

    /// Stop playback and cancel the pending frame. Idempotent.
    pub fn pause(&mut self) {
        let changed = self.clock.pause();
        self.host.frames.cancel_frame();
        if changed {
            let time = self.clock.current_time();
            self.emit(EngineEvent::Paused { time });
        }
    }

    /// Host frame callback; `now_ms` is a monotonic timestamp in milliseconds.
    pub fn tick(&mut self, now_ms: f64) {
        if !self.clock.is_playing() {
            return;
        }
        let delta = self.clock.frame_delta(now_ms);
        self.advance(delta);
    }

    /// Advance playback by `delta_seconds` of wall time (scaled by the play rate).
    pub fn advance(&mut self, delta_seconds: f64) {
        if !self.clock.is_playing() {
            return;
        }
        let step = self.clock.advance(delta_seconds);
        self.set_current_time(step.time, true);
        self.flush_ui_updates();
        if step.ended {
            self.pause();
            self.emit(EngineEvent::Ended { time: step.time });
        } else {
            self.host.frames.request_frame();
        }
    }

    pub fn set_play_rate(&mut self, rate: f64) -> bool {
        if !rate.is_finite() {
            self.diagnostics
                .warn("engine", format!("ignoring non-finite play rate {rate}"));
            return false;
        }
        if !self
            .observers
            .iter_mut()
            .all(|o| o.before_set_play_rate(rate))
        {
            return false;
        }
        self.clock.set_play_rate(rate);
        self.emit(EngineEvent::PlayRateChanged { rate });
        true
    }

    /// Re-apply every value without moving the clock. Skipped while playing unless forced.
    pub fn re_render(&mut self, opts: ReRender) {
        if self.clock.is_playing() && !opts.force {
            return;
        }
        let time = opts.time.unwrap_or_else(|| self.clock.current_time());
        self.evaluate_pass(time);
    }

    fn evaluate_pass(&mut self, time: f64) {
        let Some(timeline) = self.current.as_ref().and_then(|id| self.timelines.get(id)) else {
            return;
        };
        let mut writes = std::mem::take(&mut self.scratch);
        writes.clear();
        for obj in &timeline.objects {
            collect_object_writes(obj, time, self.cfg.easing, &mut writes);
        }
        self.apply_writes(&writes);
        self.scratch = writes;
        self.host.render.invalidate();
    }

    /// Writes for one object are contiguous, so each target is resolved once.
    fn apply_writes(&mut self, writes: &[PropertyWrite]) {
        let mut resolved: Option<(&str, Option<TargetHandle>)> = None;
        for write in writes {
            let vxkey = write.key.vxkey();
            if resolved.as_ref().map_or(true, |(k, _)| *k != vxkey) {
                resolved = Some((vxkey, self.host.scene.resolve(vxkey)));
            }
            match resolved.as_ref().and_then(|(_, t)| t.as_ref()) {
                Some(target) => self.apply_property(&write.key, target, &write.value),
                None => {
                    log::trace!(target: "vizij_timeline", "'{vxkey}' is not mounted; skipping");
                }
            }
        }
    }

    /// Setter write followed by at most one side effect.
    fn apply_property(&mut self, key: &TrackKey, target: &TargetHandle, value: &Value) {
        self.binder
            .setter_for(key, target, &mut self.diagnostics)
            .apply(value);
        let mut ctx = EffectContext {
            splines: &mut self.splines,
            diagnostics: &mut self.diagnostics,
        };
        self.effects.dispatch(&mut ctx, key, target, value);
    }

    // ---- object lifecycle ----

    /// Called by the host after it mounted `vxkey`: builds its setters and applies its values
    /// at the current time.
    pub fn init_object_on_mount(&mut self, vxkey: &str) -> bool {
        let Some(target) = self.host.scene.resolve(vxkey) else {
            let err = TimelineError::not_found(EntityKind::Target, vxkey);
            self.report("engine", &err);
            return false;
        };
        let Some(timeline) = self
            .current
            .as_ref()
            .and_then(|id| self.timelines.get_mut(id))
        else {
            return true;
        };
        let obj = timeline.object_or_insert(vxkey);
        self.binder
            .rebuild(vxkey, &target, obj.property_paths(), &mut self.diagnostics);

        let mut writes = std::mem::take(&mut self.scratch);
        writes.clear();
        let time = self.clock.current_time();
        collect_object_writes(obj, time, self.cfg.easing, &mut writes);
        for write in &writes {
            self.apply_property(&write.key, &target, &write.value);
        }
        self.scratch = writes;
        self.host.render.invalidate();
        true
    }

    /// Called by the host before or after it unmounted `vxkey`.
    pub fn on_object_unmount(&mut self, vxkey: &str) {
        self.binder.remove_object(vxkey);
        self.batcher.clear_object(vxkey);
    }

    /// Drop and regenerate every setter of `vxkey` against its current target.
    pub fn rebuild_object_property_setters(&mut self, vxkey: &str) -> bool {
        let Some(target) = self.host.scene.resolve(vxkey) else {
            self.binder.remove_object(vxkey);
            return false;
        };
        let Some(obj) = self
            .current
            .as_ref()
            .and_then(|id| self.timelines.get(id))
            .and_then(|t| t.object(vxkey))
        else {
            self.binder.remove_object(vxkey);
            return true;
        };
        self.binder
            .rebuild(vxkey, &target, obj.property_paths(), &mut self.diagnostics);
        true
    }

    pub fn has_setter(&self, key: &TrackKey) -> bool {
        self.binder.has_setter(key)
    }

    /// `false` when the property path could not be bound (the UI flags such properties).
    pub fn is_setter_resolved(&self, key: &TrackKey) -> bool {
        self.binder.is_resolved(key)
    }

    // ---- side effects ----

    pub fn register_side_effect(&mut self, key: TrackKey, effect: SideEffect) {
        self.effects.register(key, effect);
    }

    pub fn unregister_side_effect(&mut self, key: &TrackKey) {
        self.effects.unregister(key);
    }

    pub fn register_fallback_side_effect(&mut self, suffix: &str, effect: SideEffect) {
        self.effects.register_fallback(suffix, effect);
    }

    pub fn has_side_effect(&self, key: &TrackKey) -> bool {
        self.effects.has_side_effect(key)
    }

    // ---- hydration ----

    /// Run `f` against the current timeline. On success: re-render (unless playing), notify the
    /// renderer and persist. On failure: report and return `None`.
    fn with_hydration<T, F>(&mut self, f: F) -> Option<T>
    where
        F: FnOnce(&mut HydrationService<'_>) -> Result<T, TimelineError>,
    {
        let time = self.clock.current_time();
        let result = match self
            .current
            .as_ref()
            .and_then(|id| self.timelines.get_mut(id))
        {
            Some(timeline) => {
                let mut service = HydrationService {
                    mode: self.cfg.mode,
                    time,
                    timeline,
                    splines: &mut self.splines,
                    provider: self.host.splines.as_ref(),
                    binder: &mut self.binder,
                    scene: self.host.scene.as_ref(),
                    diagnostics: &mut self.diagnostics,
                };
                f(&mut service)
            }
            None => Err(TimelineError::not_found(EntityKind::Timeline, "<no current timeline>")),
        };
        match result {
            Ok(value) => {
                self.re_render(ReRender::default());
                self.commit();
                Some(value)
            }
            Err(err) => {
                self.report("hydration", &err);
                None
            }
        }
    }

    fn commit(&mut self) {
        self.host.render.invalidate();
        let Some(timeline) = self.current.as_ref().and_then(|id| self.timelines.get(id)) else {
            return;
        };
        if let Err(err) = self.host.persistence.save(timeline) {
            self.diagnostics.error(
                "persistence",
                format!("failed to save timeline '{}': {err:#}", timeline.id),
            );
        }
    }

    pub fn hydrate_track(&mut self, params: &TrackParams) -> bool {
        self.with_hydration(|h| h.track(params)).is_some()
    }

    pub fn hydrate_keyframe(&mut self, params: &KeyframeParams) -> bool {
        self.with_hydration(|h| h.keyframe(params)).is_some()
    }

    pub fn hydrate_static_prop(&mut self, params: &StaticPropParams) -> bool {
        self.with_hydration(|h| h.static_prop(params)).is_some()
    }

    pub fn hydrate_spline(&mut self, params: &SplineParams) -> bool {
        self.with_hydration(|h| h.spline(params)).is_some()
    }

    pub fn hydrate_setting(&mut self, params: &SettingParams) -> bool {
        self.with_hydration(|h| h.setting(params)).is_some()
    }

    pub fn hydrate_command(&mut self, command: &HydrationCommand) -> bool {
        log::debug!(target: "vizij_timeline", "{}", command.operation());
        self.with_hydration(|h| h.apply(command)).is_some()
    }

    /// Parse and apply a JSON hydration command. Unknown actions are logged and ignored.
    pub fn hydrate_command_json(&mut self, json: &str) -> bool {
        match HydrationCommand::parse(json) {
            Ok(command) => self.hydrate_command(&command),
            Err(err) => {
                self.report("hydration", &err);
                false
            }
        }
    }

    /// Convert a static property into a track with one keyframe at the current time.
    pub fn make_property_tracked(
        &mut self,
        vxkey: &str,
        property_path: &str,
    ) -> Option<KeyframeId> {
        let key = TrackKey::new(vxkey, property_path);
        self.with_hydration(|h| h.make_property_tracked(&key))
    }

    /// Convert a track into a static property holding the current value.
    pub fn make_property_static(&mut self, vxkey: &str, property_path: &str) -> bool {
        let key = TrackKey::new(vxkey, property_path);
        self.with_hydration(|h| h.make_property_static(&key))
            .is_some()
    }

    /// Attach a spline path to `vxkey`, using the configured default tension.
    pub fn create_spline(&mut self, vxkey: &str, nodes: Vec<Vec3>) -> Option<SplineKey> {
        let tension = self.cfg.default_spline_tension;
        self.with_hydration(|h| h.create_spline(vxkey, nodes, tension))
    }

    pub fn remove_spline(&mut self, vxkey: &str) -> bool {
        self.with_hydration(|h| h.remove_spline(vxkey)).is_some()
    }

    /// Insert the midpoint between node `index` and node `index + 1`.
    pub fn insert_spline_node(&mut self, spline_key: &SplineKey, index: usize) -> bool {
        let spline = self
            .current_timeline()
            .and_then(|t| t.splines.get(spline_key));
        let Some((vxkey, midpoint)) = spline.and_then(|s| {
            let a = *s.nodes.get(index)?;
            let b = *s.nodes.get(index + 1)?;
            Some((s.vxkey.clone(), a.midpoint(b)))
        }) else {
            let err =
                TimelineError::not_found(EntityKind::SplineNode, format!("{spline_key}[{index}]"));
            self.report("hydration", &err);
            return false;
        };
        self.hydrate_spline(&SplineParams {
            vxkey,
            spline_key: spline_key.clone(),
            action: SplineAction::InsertNode {
                index: index + 1,
                node: midpoint,
            },
        })
    }

    pub fn set_timeline_length(&mut self, length: f64) -> bool {
        self.with_hydration(|h| h.set_length(length)).is_some()
    }

    // ---- authoring (property control) ----

    fn authoring_value(&self, value: Value) -> Value {
        match self.cfg.value_precision {
            Some(decimals) => value.truncated(decimals),
            None => value,
        }
    }

    /// Id of the keyframe sitting at `time` on the track `key`, if any.
    pub fn keyframe_at(&self, key: &TrackKey, time: f64) -> Option<KeyframeId> {
        let track = self.current_timeline()?.track(key)?;
        let index = interp::keyframe_index_at(&track.keyframes, time, KEYFRAME_EPSILON)?;
        track.keyframes.at(index).map(|kf| kf.id.clone())
    }

    /// Edit a property live ("changing" path): the raw model is updated immediately and the
    /// value is queued for display.
    ///
    /// - tracked, keyframe under the playhead: that keyframe's value is updated;
    /// - tracked, no keyframe there: a keyframe is created at the current time;
    /// - static: the static value is updated;
    /// - neither: a static prop is created.
    pub fn modify_param_value(
        &mut self,
        vxkey: &str,
        property_path: &str,
        value: impl Into<Value>,
        re_render: bool,
    ) -> &mut Self {
        let value = self.authoring_value(value.into());
        let key = TrackKey::new(vxkey, property_path);
        let time = self.clock.current_time();
        let tracked = self.current_timeline().is_some_and(|t| t.is_tracked(&key));
        let keyframe = self.keyframe_at(&key, time);

        let queued = self.with_hydration(|h| {
            if tracked {
                let (keyframe_id, action) = match keyframe {
                    Some(id) => (id, KeyframeAction::UpdateValue { new_value: value }),
                    None => (
                        KeyframeId::generate(),
                        KeyframeAction::Create {
                            time,
                            value,
                            handles: Handles::default(),
                        },
                    ),
                };
                let update = matches!(action, KeyframeAction::UpdateValue { .. }).then(|| {
                    ModelUpdate::Keyframe {
                        key: key.clone(),
                        keyframe_id: keyframe_id.clone(),
                        value,
                    }
                });
                h.keyframe(&KeyframeParams {
                    vxkey: vxkey.to_string(),
                    property_path: property_path.to_string(),
                    keyframe_id,
                    action,
                })?;
                Ok(update)
            } else if h.timeline.is_static(&key) {
                h.static_prop(&StaticPropParams {
                    vxkey: vxkey.to_string(),
                    property_path: property_path.to_string(),
                    action: StaticPropAction::Update { new_value: value },
                })?;
                Ok(Some(ModelUpdate::StaticProp {
                    key: key.clone(),
                    value,
                }))
            } else {
                h.static_prop(&StaticPropParams {
                    vxkey: vxkey.to_string(),
                    property_path: property_path.to_string(),
                    action: StaticPropAction::Create { value },
                })?;
                Ok(None)
            }
        });

        let Some(update) = queued else {
            return self;
        };
        match update {
            Some(ModelUpdate::Keyframe {
                key,
                keyframe_id,
                value,
            }) => self.batcher.queue_keyframe(key, keyframe_id, value, true),
            Some(ModelUpdate::StaticProp { key, value }) => {
                self.batcher.queue_static_prop(key, value, true)
            }
            None => {}
        }
        self.batcher.queue_display(key, value);
        if re_render {
            self.re_render(ReRender::forced());
        }
        self
    }

    /// Edit a property without touching the raw model yet (drag "end" path): the target is
    /// updated and the value is queued; [`Engine::flush_timeline_state_updates`] commits it.
    /// Edits that would create a keyframe or static prop are applied immediately instead.
    pub fn queue_param_value(
        &mut self,
        vxkey: &str,
        property_path: &str,
        value: impl Into<Value>,
    ) -> &mut Self {
        if !self.cfg.mode.is_development() {
            let err = TimelineError::ModeViolation {
                mode: self.cfg.mode,
                operation: "queue param value",
            };
            self.report("batcher", &err);
            return self;
        }
        let value = self.authoring_value(value.into());
        let key = TrackKey::new(vxkey, property_path);
        let time = self.clock.current_time();
        let (tracked, is_static) = self
            .current_timeline()
            .map_or((false, false), |t| (t.is_tracked(&key), t.is_static(&key)));

        match (tracked, self.keyframe_at(&key, time)) {
            (true, Some(id)) => self.batcher.queue_keyframe(key.clone(), id, value, false),
            _ if is_static => self.batcher.queue_static_prop(key.clone(), value, false),
            _ => return self.modify_param_value(vxkey, property_path, value, false),
        }
        if let Some(target) = self.host.scene.resolve(vxkey) {
            self.apply_property(&key, &target, &value);
        }
        self.batcher.queue_display(key, value);
        self
    }

    /// Deliver queued display values. Returns how many were delivered; 0 when empty.
    pub fn flush_ui_updates(&mut self) -> usize {
        let updates = self.batcher.take_display();
        if updates.is_empty() {
            return 0;
        }
        self.host.sink.apply_display_updates(&updates);
        updates.len()
    }

    /// Commit queued model values that are not yet in the raw model, then deliver the batch.
    /// Returns how many updates were delivered; 0 when empty.
    pub fn flush_timeline_state_updates(&mut self) -> usize {
        let pending = self.batcher.take_model();
        if pending.is_empty() {
            return 0;
        }
        let uncommitted: Vec<ModelUpdate> = pending
            .iter()
            .filter(|p| !p.committed)
            .map(|p| p.update.clone())
            .collect();
        if !uncommitted.is_empty() {
            self.with_hydration(|h| {
                for update in &uncommitted {
                    if let Err(err) = commit_model_update(h, update) {
                        h.diagnostics.report("batcher", &err);
                    }
                }
                Ok(())
            });
        }
        let updates: Vec<ModelUpdate> = pending.into_iter().map(|p| p.update).collect();
        self.host.sink.apply_model_updates(&updates);
        updates.len()
    }

    // ---- queries ----

    /// Value of a property at `time` from the current timeline (track or static prop).
    pub fn evaluate_property(&self, key: &TrackKey, time: f64) -> Option<Value> {
        let timeline = self.current_timeline()?;
        match timeline.track(key) {
            Some(track) => interp::evaluate_with(&track.keyframes, time, self.cfg.easing),
            None => timeline.static_prop(key).map(|p| p.value),
        }
    }

    pub fn previous_keyframe_time(&self, key: &TrackKey) -> Option<f64> {
        let track = self.current_timeline()?.track(key)?;
        let time = self.clock.current_time() - KEYFRAME_EPSILON;
        interp::previous_keyframe_time(&track.keyframes, time)
    }

    pub fn next_keyframe_time(&self, key: &TrackKey) -> Option<f64> {
        let track = self.current_timeline()?.track(key)?;
        let time = self.clock.current_time() + KEYFRAME_EPSILON;
        interp::next_keyframe_time(&track.keyframes, time)
    }

    pub fn spline_point_at(&self, spline_key: &SplineKey, progress: f64) -> Option<Vec3> {
        self.splines
            .get(spline_key)
            .map(|curve| curve.evaluate(progress))
    }
}

fn commit_model_update(
    h: &mut HydrationService<'_>,
    update: &ModelUpdate,
) -> Result<(), TimelineError> {
    match update {
        ModelUpdate::Keyframe {
            key,
            keyframe_id,
            value,
        } => h.keyframe(&KeyframeParams {
            vxkey: key.vxkey().to_string(),
            property_path: key.property_path().to_string(),
            keyframe_id: keyframe_id.clone(),
            action: KeyframeAction::UpdateValue { new_value: *value },
        }),
        ModelUpdate::StaticProp { key, value } => h.static_prop(&StaticPropParams {
            vxkey: key.vxkey().to_string(),
            property_path: key.property_path().to_string(),
            action: StaticPropAction::Update { new_value: *value },
        }),
    }
}
