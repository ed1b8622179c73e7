//! Hydration: authoring-time mutations of the raw timeline model.
//!
//! Every entry point checks the build mode first; outside development nothing is mutated and a
//! [`TimelineError::ModeViolation`] is returned. Operations validate before they mutate, so a
//! failed call leaves the model untouched. Keyframe order is rebuilt by [`KeyframeSet`] on every
//! mutation and spline curves are rebuilt from their raw nodes on every node edit.
//!
//! The service borrows the engine's parts for the duration of one call; the engine reports
//! errors and runs the post-mutation notifications.

use serde::{Deserialize, Serialize};

use crate::binding::PropertyBinder;
use crate::config::Mode;
use crate::data::{Handles, Keyframe, KeyframeSet, Spline, StaticProp, Timeline, Track};
use crate::diagnostics::Diagnostics;
use crate::effects::{SPLINE_PROGRESS, SPLINE_TENSION};
use crate::error::{EntityKind, TimelineError};
use crate::ids::{KeyframeId, SplineKey, TrackKey};
use crate::interp;
use crate::scene::SceneStore;
use crate::spline::{SplineCache, SplineProvider};
use crate::value::{Value, Vec3};

/// Object setting toggled while an object follows its spline path.
pub const USE_SPLINE_PATH: &str = "useSplinePath";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum TrackAction {
    Create,
    Remove,
}

impl TrackAction {
    pub const NAMES: &'static [&'static str] = &["create", "remove"];
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackParams {
    pub vxkey: String,
    pub property_path: String,
    #[serde(flatten)]
    pub action: TrackAction,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum KeyframeAction {
    Create {
        time: f64,
        value: Value,
        #[serde(default)]
        handles: Handles,
    },
    Update {
        time: f64,
        value: Value,
        handles: Handles,
    },
    #[serde(rename_all = "camelCase")]
    UpdateTime {
        new_time: f64,
    },
    #[serde(rename_all = "camelCase")]
    UpdateValue {
        new_value: Value,
    },
    #[serde(rename_all = "camelCase")]
    UpdateHandles {
        new_handles: Handles,
    },
    Remove,
}

impl KeyframeAction {
    pub const NAMES: &'static [&'static str] = &[
        "create",
        "update",
        "updateTime",
        "updateValue",
        "updateHandles",
        "remove",
    ];
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyframeParams {
    pub vxkey: String,
    pub property_path: String,
    pub keyframe_id: KeyframeId,
    #[serde(flatten)]
    pub action: KeyframeAction,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum StaticPropAction {
    Create {
        value: Value,
    },
    #[serde(rename_all = "camelCase")]
    Update {
        new_value: Value,
    },
    Remove,
}

impl StaticPropAction {
    pub const NAMES: &'static [&'static str] = &["create", "update", "remove"];
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaticPropParams {
    pub vxkey: String,
    pub property_path: String,
    #[serde(flatten)]
    pub action: StaticPropAction,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum SplineAction {
    Create {
        nodes: Vec<Vec3>,
        #[serde(default)]
        tension: Option<f64>,
        #[serde(default)]
        closed: bool,
    },
    Remove,
    /// Replace the whole node list.
    Clone {
        nodes: Vec<Vec3>,
    },
    UpdateNode {
        index: usize,
        node: Vec3,
    },
    RemoveNode {
        index: usize,
    },
    /// Insert `node` so that it ends up at `index`.
    InsertNode {
        index: usize,
        node: Vec3,
    },
    UpdateTension {
        tension: f64,
    },
}

impl SplineAction {
    pub const NAMES: &'static [&'static str] = &[
        "create",
        "remove",
        "clone",
        "updateNode",
        "removeNode",
        "insertNode",
        "updateTension",
    ];
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SplineParams {
    pub vxkey: String,
    pub spline_key: SplineKey,
    #[serde(flatten)]
    pub action: SplineAction,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum SettingAction {
    Set { value: bool },
    Remove,
}

impl SettingAction {
    pub const NAMES: &'static [&'static str] = &["set", "remove"];
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingParams {
    pub vxkey: String,
    pub setting_key: String,
    #[serde(flatten)]
    pub action: SettingAction,
}

/// Host-facing command envelope: `{"kind": "keyframe", "action": "updateValue", ...}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum HydrationCommand {
    Track(TrackParams),
    Keyframe(KeyframeParams),
    StaticProp(StaticPropParams),
    Spline(SplineParams),
    Setting(SettingParams),
}

impl HydrationCommand {
    /// Parse a JSON command. Unrecognised actions are reported as
    /// [`TimelineError::UnknownAction`] rather than as a parse failure.
    pub fn parse(json: &str) -> Result<Self, TimelineError> {
        let raw: serde_json::Value =
            serde_json::from_str(json).map_err(|e| TimelineError::Malformed(e.to_string()))?;
        let field = |name: &str| {
            raw.get(name)
                .and_then(|v| v.as_str())
                .ok_or_else(|| TimelineError::Malformed(format!("command is missing '{name}'")))
        };
        let kind = field("kind")?;
        let action = field("action")?;
        let known = match kind {
            "track" => TrackAction::NAMES,
            "keyframe" => KeyframeAction::NAMES,
            "staticProp" => StaticPropAction::NAMES,
            "spline" => SplineAction::NAMES,
            "setting" => SettingAction::NAMES,
            other => {
                return Err(TimelineError::Malformed(format!("unknown command kind '{other}'")));
            }
        };
        if !known.contains(&action) {
            return Err(TimelineError::UnknownAction {
                kind: kind.to_string(),
                action: action.to_string(),
            });
        }
        serde_json::from_value(raw).map_err(|e| TimelineError::Malformed(e.to_string()))
    }

    /// Operation label used in logs.
    pub fn operation(&self) -> &'static str {
        match self {
            HydrationCommand::Track(_) => "hydrate track",
            HydrationCommand::Keyframe(_) => "hydrate keyframe",
            HydrationCommand::StaticProp(_) => "hydrate static prop",
            HydrationCommand::Spline(_) => "hydrate spline",
            HydrationCommand::Setting(_) => "hydrate setting",
        }
    }
}

pub struct HydrationService<'a> {
    pub mode: Mode,
    /// Engine time, used where an operation places a keyframe "here".
    pub time: f64,
    pub timeline: &'a mut Timeline,
    pub splines: &'a mut SplineCache,
    pub provider: &'a dyn SplineProvider,
    pub binder: &'a mut PropertyBinder,
    pub scene: &'a dyn SceneStore,
    pub diagnostics: &'a mut Diagnostics,
}

fn check_value(value: &Value) -> Result<(), TimelineError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(TimelineError::InvalidValue(format!("{value:?} is not finite")))
    }
}

fn check_time(time: f64) -> Result<(), TimelineError> {
    if time.is_finite() {
        Ok(())
    } else {
        Err(TimelineError::InvalidValue(format!("time {time} is not finite")))
    }
}

/// New values must match the kind already stored on the track.
fn check_kind(keyframes: &KeyframeSet, value: &Value) -> Result<(), TimelineError> {
    match keyframes.first() {
        Some(kf) if kf.value.kind() != value.kind() => Err(TimelineError::InvalidValue(format!(
            "expected a {:?}, got a {:?}",
            kf.value.kind(),
            value.kind()
        ))),
        _ => Ok(()),
    }
}

impl<'a> HydrationService<'a> {
    fn guard(&self, operation: &'static str) -> Result<(), TimelineError> {
        if self.mode.is_development() {
            Ok(())
        } else {
            Err(TimelineError::ModeViolation {
                mode: self.mode,
                operation,
            })
        }
    }

    pub fn apply(&mut self, command: &HydrationCommand) -> Result<(), TimelineError> {
        match command {
            HydrationCommand::Track(p) => self.track(p),
            HydrationCommand::Keyframe(p) => self.keyframe(p),
            HydrationCommand::StaticProp(p) => self.static_prop(p),
            HydrationCommand::Spline(p) => self.spline(p),
            HydrationCommand::Setting(p) => self.setting(p),
        }
    }

    /// Make sure the binder has a setter for `key` if its target is mounted.
    fn ensure_setter(&mut self, key: &TrackKey) {
        if let Some(target) = self.scene.resolve(key.vxkey()) {
            self.binder.setter_for(key, &target, self.diagnostics);
        }
    }

    fn live_value(&self, key: &TrackKey) -> Option<Value> {
        let target = self.scene.resolve(key.vxkey())?;
        let value = target.read().read(key.property_path());
        value
    }

    fn track_mut(&mut self, key: &TrackKey) -> Result<&mut Track, TimelineError> {
        self.timeline
            .object_mut(key.vxkey())
            .ok_or_else(|| TimelineError::not_found(EntityKind::Object, key.vxkey()))?
            .track_mut(key.property_path())
            .ok_or_else(|| TimelineError::not_found(EntityKind::Track, key.to_string()))
    }

    fn static_prop_mut(&mut self, key: &TrackKey) -> Result<&mut StaticProp, TimelineError> {
        self.timeline
            .object_mut(key.vxkey())
            .ok_or_else(|| TimelineError::not_found(EntityKind::Object, key.vxkey()))?
            .static_prop_mut(key.property_path())
            .ok_or_else(|| TimelineError::not_found(EntityKind::StaticProp, key.to_string()))
    }

    // ---- tracks ----

    pub fn track(&mut self, params: &TrackParams) -> Result<(), TimelineError> {
        self.guard("hydrate track")?;
        let key = TrackKey::new(&params.vxkey, &params.property_path);
        match params.action {
            TrackAction::Create => self.create_track(&key),
            TrackAction::Remove => self.remove_track(&key),
        }
    }

    fn create_track(&mut self, key: &TrackKey) -> Result<(), TimelineError> {
        if self.timeline.is_tracked(key) {
            return Err(TimelineError::already_exists(EntityKind::Track, key.to_string()));
        }
        if self.timeline.is_static(key) {
            return Err(TimelineError::RepresentationConflict {
                key: key.to_string(),
                existing: "static",
            });
        }
        self.ensure_setter(key);
        self.timeline
            .object_or_insert(key.vxkey())
            .tracks
            .push(Track::new(key.property_path()));
        Ok(())
    }

    fn remove_track(&mut self, key: &TrackKey) -> Result<(), TimelineError> {
        let obj = self
            .timeline
            .object_mut(key.vxkey())
            .ok_or_else(|| TimelineError::not_found(EntityKind::Object, key.vxkey()))?;
        let before = obj.tracks.len();
        obj.tracks
            .retain(|t| t.property_path != key.property_path());
        if obj.tracks.len() == before {
            return Err(TimelineError::not_found(EntityKind::Track, key.to_string()));
        }
        Ok(())
    }

    // ---- keyframes ----

    pub fn keyframe(&mut self, params: &KeyframeParams) -> Result<(), TimelineError> {
        self.guard("hydrate keyframe")?;
        let key = TrackKey::new(&params.vxkey, &params.property_path);
        let id = &params.keyframe_id;
        let track = self.track_mut(&key)?;
        let keyframes = &mut track.keyframes;
        let missing = || TimelineError::not_found(EntityKind::Keyframe, id.to_string());

        match &params.action {
            KeyframeAction::Create {
                time,
                value,
                handles,
            } => {
                check_time(*time)?;
                check_value(value)?;
                check_kind(keyframes, value)?;
                let keyframe = Keyframe {
                    id: id.clone(),
                    time: *time,
                    value: *value,
                    handles: *handles,
                };
                keyframes
                    .insert(keyframe)
                    .map_err(|kf| TimelineError::already_exists(EntityKind::Keyframe, kf.id.0))
            }
            KeyframeAction::Update {
                time,
                value,
                handles,
            } => {
                check_time(*time)?;
                check_value(value)?;
                check_kind(keyframes, value)?;
                keyframes
                    .replace(id, *time, *value, *handles)
                    .then_some(())
                    .ok_or_else(missing)
            }
            KeyframeAction::UpdateTime { new_time } => {
                check_time(*new_time)?;
                keyframes
                    .set_time(id, *new_time)
                    .then_some(())
                    .ok_or_else(missing)
            }
            KeyframeAction::UpdateValue { new_value } => {
                check_value(new_value)?;
                check_kind(keyframes, new_value)?;
                keyframes
                    .set_value(id, *new_value)
                    .then_some(())
                    .ok_or_else(missing)
            }
            KeyframeAction::UpdateHandles { new_handles } => keyframes
                .set_handles(id, *new_handles)
                .then_some(())
                .ok_or_else(missing),
            KeyframeAction::Remove => keyframes.remove(id).map(|_| ()).ok_or_else(missing),
        }
    }

    // ---- static props ----

    pub fn static_prop(&mut self, params: &StaticPropParams) -> Result<(), TimelineError> {
        self.guard("hydrate static prop")?;
        let key = TrackKey::new(&params.vxkey, &params.property_path);
        match &params.action {
            StaticPropAction::Create { value } => self.create_static_prop(&key, *value),
            StaticPropAction::Update { new_value } => {
                check_value(new_value)?;
                self.static_prop_mut(&key)?.value = *new_value;
                Ok(())
            }
            StaticPropAction::Remove => self.remove_static_prop(&key),
        }
    }

    fn create_static_prop(&mut self, key: &TrackKey, value: Value) -> Result<(), TimelineError> {
        check_value(&value)?;
        if self.timeline.is_static(key) {
            return Err(TimelineError::already_exists(EntityKind::StaticProp, key.to_string()));
        }
        if self.timeline.is_tracked(key) {
            return Err(TimelineError::RepresentationConflict {
                key: key.to_string(),
                existing: "tracked",
            });
        }
        self.ensure_setter(key);
        self.timeline
            .object_or_insert(key.vxkey())
            .static_props
            .push(StaticProp {
                vxkey: key.vxkey().to_string(),
                property_path: key.property_path().to_string(),
                value,
            });
        Ok(())
    }

    fn remove_static_prop(&mut self, key: &TrackKey) -> Result<(), TimelineError> {
        let obj = self
            .timeline
            .object_mut(key.vxkey())
            .ok_or_else(|| TimelineError::not_found(EntityKind::Object, key.vxkey()))?;
        let before = obj.static_props.len();
        obj.static_props
            .retain(|p| p.property_path != key.property_path());
        if obj.static_props.len() == before {
            return Err(TimelineError::not_found(EntityKind::StaticProp, key.to_string()));
        }
        Ok(())
    }

    // ---- splines ----

    pub fn spline(&mut self, params: &SplineParams) -> Result<(), TimelineError> {
        self.guard("hydrate spline")?;
        let key = &params.spline_key;
        match &params.action {
            SplineAction::Create {
                nodes,
                tension,
                closed,
            } => {
                if self.splines.contains(key) {
                    return Err(TimelineError::InvariantViolation(format!(
                        "a curve is already cached for spline '{key}'"
                    )));
                }
                if self.timeline.splines.contains_key(key) {
                    return Err(TimelineError::already_exists(EntityKind::Spline, key.as_str()));
                }
                check_nodes(nodes)?;
                if let Some(tension) = tension {
                    check_value(&Value::Number(*tension))?;
                }
                let spline = Spline {
                    spline_key: key.clone(),
                    vxkey: params.vxkey.clone(),
                    nodes: nodes.clone(),
                    tension: tension.unwrap_or(crate::data::DEFAULT_SPLINE_TENSION),
                    closed: *closed,
                };
                self.splines.insert(self.provider, &spline);
                self.timeline.splines.insert(key.clone(), spline);
                Ok(())
            }
            SplineAction::Remove => {
                self.timeline
                    .splines
                    .shift_remove(key)
                    .ok_or_else(|| TimelineError::not_found(EntityKind::Spline, key.as_str()))?;
                self.splines.remove(key);
                Ok(())
            }
            action => self.edit_spline_nodes(key, action),
        }
    }

    /// Node edits: mutate the raw spline, then rebuild its curve from scratch.
    fn edit_spline_nodes(
        &mut self,
        key: &SplineKey,
        action: &SplineAction,
    ) -> Result<(), TimelineError> {
        let spline = self
            .timeline
            .splines
            .get_mut(key)
            .ok_or_else(|| TimelineError::not_found(EntityKind::Spline, key.as_str()))?;
        let node_missing = |index: usize| {
            TimelineError::not_found(EntityKind::SplineNode, format!("{key}[{index}]"))
        };

        match action {
            SplineAction::Clone { nodes } => {
                check_nodes(nodes)?;
                spline.nodes = nodes.clone();
            }
            SplineAction::UpdateNode { index, node } => {
                check_value(&Value::Vector3(*node))?;
                let slot = spline
                    .nodes
                    .get_mut(*index)
                    .ok_or_else(|| node_missing(*index))?;
                *slot = *node;
            }
            SplineAction::RemoveNode { index } => {
                if *index >= spline.nodes.len() {
                    return Err(node_missing(*index));
                }
                if spline.nodes.len() <= 2 {
                    return Err(TimelineError::InvalidValue(format!(
                        "spline '{key}' needs at least two nodes"
                    )));
                }
                spline.nodes.remove(*index);
            }
            SplineAction::InsertNode { index, node } => {
                check_value(&Value::Vector3(*node))?;
                if *index > spline.nodes.len() {
                    return Err(node_missing(*index));
                }
                spline.nodes.insert(*index, *node);
            }
            SplineAction::UpdateTension { tension } => {
                check_value(&Value::Number(*tension))?;
                spline.tension = *tension;
            }
            SplineAction::Create { .. } | SplineAction::Remove => {}
        }
        self.splines.rebuild(self.provider, spline);
        Ok(())
    }

    // ---- settings ----

    pub fn setting(&mut self, params: &SettingParams) -> Result<(), TimelineError> {
        self.guard("hydrate setting")?;
        match params.action {
            SettingAction::Set { value } => {
                self.timeline
                    .object_or_insert(&params.vxkey)
                    .settings
                    .insert(params.setting_key.clone(), value);
            }
            SettingAction::Remove => {
                if let Some(obj) = self.timeline.object_mut(&params.vxkey) {
                    obj.settings.shift_remove(&params.setting_key);
                }
            }
        }
        Ok(())
    }

    // ---- composite transitions ----

    /// Static -> tracked. The new track gets one keyframe at the current time holding the
    /// static value (or the live target value, or 0).
    pub fn make_property_tracked(&mut self, key: &TrackKey) -> Result<KeyframeId, TimelineError> {
        self.guard("make property tracked")?;
        if self.timeline.is_tracked(key) {
            return Err(TimelineError::already_exists(EntityKind::Track, key.to_string()));
        }
        let value = self
            .timeline
            .static_prop(key)
            .map(|p| p.value)
            .or_else(|| self.live_value(key))
            .unwrap_or_default();
        check_time(self.time)?;

        if let Some(obj) = self.timeline.object_mut(key.vxkey()) {
            obj.static_props
                .retain(|p| p.property_path != key.property_path());
        }
        self.ensure_setter(key);
        let id = KeyframeId::generate();
        let mut track = Track::new(key.property_path());
        // Fresh id on an empty set: cannot collide.
        let keyframe = Keyframe::new(id.clone(), self.time, value);
        let _ = track.keyframes.insert(keyframe);
        let obj = self.timeline.object_or_insert(key.vxkey());
        obj.tracks.push(track);
        Ok(id)
    }

    /// Tracked -> static. The static value is the live target value (or the track evaluated at
    /// the current time, or 0).
    pub fn make_property_static(&mut self, key: &TrackKey) -> Result<(), TimelineError> {
        self.guard("make property static")?;
        let track = self
            .timeline
            .track(key)
            .ok_or_else(|| TimelineError::not_found(EntityKind::Track, key.to_string()))?;
        let value = self
            .live_value(key)
            .or_else(|| interp::evaluate(&track.keyframes, self.time))
            .unwrap_or_default();

        self.remove_track(key)?;
        self.create_static_prop(key, value)
    }

    /// Attach a spline path to `vxkey`: creates the spline, enables the spline-path setting,
    /// drops `position` tracks and adds the progress/tension static props.
    pub fn create_spline(
        &mut self,
        vxkey: &str,
        nodes: Vec<Vec3>,
        tension: f64,
    ) -> Result<SplineKey, TimelineError> {
        self.guard("create spline")?;
        let spline_key = SplineKey::for_object(vxkey);
        let progress = TrackKey::new(vxkey, SPLINE_PROGRESS);
        let tension_key = TrackKey::new(vxkey, SPLINE_TENSION);
        check_value(&Value::Number(tension))?;
        for key in [&progress, &tension_key] {
            if self.timeline.is_tracked(key) || self.timeline.is_static(key) {
                return Err(TimelineError::already_exists(EntityKind::StaticProp, key.to_string()));
            }
        }
        self.spline(&SplineParams {
            vxkey: vxkey.to_string(),
            spline_key: spline_key.clone(),
            action: SplineAction::Create {
                nodes,
                tension: Some(tension),
                closed: false,
            },
        })?;

        let obj = self.timeline.object_or_insert(vxkey);
        obj.settings.insert(USE_SPLINE_PATH.to_string(), true);
        obj.tracks.retain(|t| !is_position_path(&t.property_path));
        self.create_static_prop(&progress, Value::Number(0.0))?;
        self.create_static_prop(&tension_key, Value::Number(tension))?;
        Ok(spline_key)
    }

    /// Undo [`Self::create_spline`].
    pub fn remove_spline(&mut self, vxkey: &str) -> Result<(), TimelineError> {
        self.guard("remove spline")?;
        let spline_key = SplineKey::for_object(vxkey);
        self.spline(&SplineParams {
            vxkey: vxkey.to_string(),
            spline_key,
            action: SplineAction::Remove,
        })?;
        if let Some(obj) = self.timeline.object_mut(vxkey) {
            for path in [SPLINE_PROGRESS, SPLINE_TENSION] {
                obj.tracks.retain(|t| t.property_path != path);
                obj.static_props.retain(|p| p.property_path != path);
            }
            obj.settings.shift_remove(USE_SPLINE_PATH);
        }
        Ok(())
    }

    pub fn set_length(&mut self, length: f64) -> Result<(), TimelineError> {
        self.guard("set timeline length")?;
        if !length.is_finite() || length < 0.0 {
            return Err(TimelineError::InvalidValue(format!(
                "timeline length {length} must be a finite, non-negative number"
            )));
        }
        self.timeline.length = length;
        Ok(())
    }
}

fn check_nodes(nodes: &[Vec3]) -> Result<(), TimelineError> {
    if nodes.len() < 2 {
        return Err(TimelineError::InvalidValue("a spline needs at least two nodes".to_string()));
    }
    if let Some(bad) = nodes.iter().find(|n| !n.is_finite()) {
        return Err(TimelineError::InvalidValue(format!("spline node {bad:?} is not finite")));
    }
    Ok(())
}

fn is_position_path(property_path: &str) -> bool {
    property_path == "position" || property_path.starts_with("position.")
}
