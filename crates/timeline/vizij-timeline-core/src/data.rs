//! Raw timeline model: timelines, objects, tracks, keyframes, static props and splines.
//!
//! This is the persisted shape; runtime caches (setters, spline curves, pending updates) live
//! elsewhere and are rebuilt from it.

use hashbrown::HashMap;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{EntityKind, TimelineError};
use crate::ids::{KeyframeId, SplineKey, TrackKey};
use crate::interp::KeyframeSeq;
use crate::value::{Value, Vec2, Vec3};

pub const DEFAULT_SPLINE_TENSION: f64 = 0.5;

/// Easing handles of a keyframe. `out` shapes the segment leaving this keyframe, `in` the
/// segment arriving at it. Defaults sit on the diagonal and describe a linear segment.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct Handles {
    #[serde(rename = "in")]
    pub r#in: Vec2,
    #[serde(rename = "out")]
    pub r#out: Vec2,
}

impl Default for Handles {
    fn default() -> Self {
        Self {
            r#in: Vec2::new(0.7, 0.7),
            r#out: Vec2::new(0.3, 0.3),
        }
    }
}

impl Handles {
    /// `[in.x, in.y, out.x, out.y]`, the tuple shape used by authoring tools.
    pub fn from_array(a: [f64; 4]) -> Self {
        Self {
            r#in: Vec2::new(a[0], a[1]),
            r#out: Vec2::new(a[2], a[3]),
        }
    }

    pub fn to_array(&self) -> [f64; 4] {
        [self.r#in.x, self.r#in.y, self.r#out.x, self.r#out.y]
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Keyframe {
    pub id: KeyframeId,
    pub time: f64,
    pub value: Value,
    #[serde(default)]
    pub handles: Handles,
}

impl Keyframe {
    pub fn new(id: impl Into<KeyframeId>, time: f64, value: impl Into<Value>) -> Self {
        Self {
            id: id.into(),
            time,
            value: value.into(),
            handles: Handles::default(),
        }
    }

    pub fn with_handles(mut self, handles: Handles) -> Self {
        self.handles = handles;
        self
    }
}

/// Keyframes of one track: an arena keyed by id plus an index list ordered by time.
///
/// Every mutation goes through this type and rebuilds the order before returning, so readers
/// always observe `order` sorted non-decreasingly by time. Ties keep their previous relative
/// order (stable sort).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<Keyframe>", into = "Vec<Keyframe>")]
pub struct KeyframeSet {
    arena: HashMap<KeyframeId, Keyframe>,
    order: Vec<KeyframeId>,
}

impl KeyframeSet {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Keyframe at sorted position `index`.
    #[inline]
    pub fn at(&self, index: usize) -> Option<&Keyframe> {
        self.order.get(index).and_then(|id| self.arena.get(id))
    }

    #[inline]
    pub fn get(&self, id: &KeyframeId) -> Option<&Keyframe> {
        self.arena.get(id)
    }

    #[inline]
    pub fn contains(&self, id: &KeyframeId) -> bool {
        self.arena.contains_key(id)
    }

    /// Keyframes in time order.
    pub fn iter(&self) -> impl Iterator<Item = &Keyframe> + '_ {
        self.order.iter().filter_map(move |id| self.arena.get(id))
    }

    pub fn first(&self) -> Option<&Keyframe> {
        self.at(0)
    }

    pub fn last(&self) -> Option<&Keyframe> {
        self.order.len().checked_sub(1).and_then(|i| self.at(i))
    }

    /// Insert a new keyframe. Returns it back if the id is already taken.
    pub fn insert(&mut self, keyframe: Keyframe) -> Result<(), Keyframe> {
        if self.arena.contains_key(&keyframe.id) {
            return Err(keyframe);
        }
        self.order.push(keyframe.id.clone());
        self.arena.insert(keyframe.id.clone(), keyframe);
        self.reindex();
        Ok(())
    }

    pub fn remove(&mut self, id: &KeyframeId) -> Option<Keyframe> {
        let removed = self.arena.remove(id)?;
        self.order.retain(|k| k != id);
        self.reindex();
        Some(removed)
    }

    pub fn set_time(&mut self, id: &KeyframeId, time: f64) -> bool {
        let Some(kf) = self.arena.get_mut(id) else {
            return false;
        };
        kf.time = time;
        self.reindex();
        true
    }

    pub fn set_value(&mut self, id: &KeyframeId, value: Value) -> bool {
        let Some(kf) = self.arena.get_mut(id) else {
            return false;
        };
        kf.value = value;
        self.reindex();
        true
    }

    pub fn set_handles(&mut self, id: &KeyframeId, handles: Handles) -> bool {
        let Some(kf) = self.arena.get_mut(id) else {
            return false;
        };
        kf.handles = handles;
        self.reindex();
        true
    }

    /// Replace time, value and handles in one step.
    pub fn replace(&mut self, id: &KeyframeId, time: f64, value: Value, handles: Handles) -> bool {
        let Some(kf) = self.arena.get_mut(id) else {
            return false;
        };
        kf.time = time;
        kf.value = value;
        kf.handles = handles;
        self.reindex();
        true
    }

    /// True when `order` is sorted by time; holds after every public mutation.
    pub fn is_sorted(&self) -> bool {
        self.iter()
            .zip(self.iter().skip(1))
            .all(|(a, b)| a.time <= b.time)
    }

    fn reindex(&mut self) {
        let arena = &self.arena;
        self.order.sort_by(|a, b| {
            let ta = arena.get(a).map_or(f64::INFINITY, |k| k.time);
            let tb = arena.get(b).map_or(f64::INFINITY, |k| k.time);
            ta.total_cmp(&tb)
        });
    }
}

impl KeyframeSeq for KeyframeSet {
    #[inline]
    fn len(&self) -> usize {
        self.order.len()
    }

    #[inline]
    fn at(&self, index: usize) -> &Keyframe {
        &self.arena[&self.order[index]]
    }
}

impl PartialEq for KeyframeSet {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().eq(other.iter())
    }
}

impl TryFrom<Vec<Keyframe>> for KeyframeSet {
    type Error = String;

    fn try_from(keyframes: Vec<Keyframe>) -> Result<Self, Self::Error> {
        let mut set = KeyframeSet::new();
        for kf in keyframes {
            if set.arena.contains_key(&kf.id) {
                return Err(format!("duplicate keyframe id '{}'", kf.id));
            }
            set.order.push(kf.id.clone());
            set.arena.insert(kf.id.clone(), kf);
        }
        set.reindex();
        Ok(set)
    }
}

impl From<KeyframeSet> for Vec<Keyframe> {
    fn from(mut set: KeyframeSet) -> Self {
        set.order
            .iter()
            .filter_map(|id| set.arena.remove(id))
            .collect()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub property_path: String,
    #[serde(default)]
    pub keyframes: KeyframeSet,
}

impl Track {
    pub fn new(property_path: impl Into<String>) -> Self {
        Self {
            property_path: property_path.into(),
            keyframes: KeyframeSet::new(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StaticProp {
    pub vxkey: String,
    pub property_path: String,
    pub value: Value,
}

/// Per-object authoring data. One per vxkey within a timeline.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RawObject {
    pub vxkey: String,
    #[serde(default)]
    pub tracks: Vec<Track>,
    #[serde(default)]
    pub static_props: Vec<StaticProp>,
    /// Boolean object settings; an object without settings serializes without the map.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub settings: IndexMap<String, bool>,
}

impl RawObject {
    pub fn new(vxkey: impl Into<String>) -> Self {
        Self {
            vxkey: vxkey.into(),
            tracks: Vec::new(),
            static_props: Vec::new(),
            settings: IndexMap::new(),
        }
    }

    pub fn track(&self, property_path: &str) -> Option<&Track> {
        self.tracks
            .iter()
            .find(|t| t.property_path == property_path)
    }

    pub fn track_mut(&mut self, property_path: &str) -> Option<&mut Track> {
        self.tracks
            .iter_mut()
            .find(|t| t.property_path == property_path)
    }

    pub fn static_prop(&self, property_path: &str) -> Option<&StaticProp> {
        self.static_props
            .iter()
            .find(|p| p.property_path == property_path)
    }

    pub fn static_prop_mut(&mut self, property_path: &str) -> Option<&mut StaticProp> {
        self.static_props
            .iter_mut()
            .find(|p| p.property_path == property_path)
    }

    /// Every property path this object animates or pins.
    pub fn property_paths(&self) -> impl Iterator<Item = &str> + '_ {
        self.tracks
            .iter()
            .map(|t| t.property_path.as_str())
            .chain(self.static_props.iter().map(|p| p.property_path.as_str()))
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Spline {
    pub spline_key: SplineKey,
    pub vxkey: String,
    pub nodes: Vec<Vec3>,
    #[serde(default = "default_tension")]
    pub tension: f64,
    #[serde(default)]
    pub closed: bool,
}

fn default_tension() -> f64 {
    DEFAULT_SPLINE_TENSION
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Timeline {
    pub id: String,
    pub name: String,
    /// Length in seconds.
    pub length: f64,
    #[serde(default)]
    pub objects: Vec<RawObject>,
    #[serde(default)]
    pub splines: IndexMap<SplineKey, Spline>,
    /// Arbitrary host settings; preserved but not interpreted.
    #[serde(default)]
    pub settings: serde_json::Value,
}

impl Timeline {
    pub fn new(id: impl Into<String>, name: impl Into<String>, length: f64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            length,
            objects: Vec::new(),
            splines: IndexMap::new(),
            settings: serde_json::Value::Null,
        }
    }

    pub fn object(&self, vxkey: &str) -> Option<&RawObject> {
        self.objects.iter().find(|o| o.vxkey == vxkey)
    }

    pub fn object_mut(&mut self, vxkey: &str) -> Option<&mut RawObject> {
        self.objects.iter_mut().find(|o| o.vxkey == vxkey)
    }

    /// Lookup-or-create; never produces a duplicate entry.
    pub fn object_or_insert(&mut self, vxkey: &str) -> &mut RawObject {
        let index = match self.objects.iter().position(|o| o.vxkey == vxkey) {
            Some(i) => i,
            None => {
                self.objects.push(RawObject::new(vxkey));
                self.objects.len() - 1
            }
        };
        &mut self.objects[index]
    }

    pub fn track(&self, key: &TrackKey) -> Option<&Track> {
        self.object(key.vxkey())?.track(key.property_path())
    }

    pub fn static_prop(&self, key: &TrackKey) -> Option<&StaticProp> {
        self.object(key.vxkey())?.static_prop(key.property_path())
    }

    pub fn is_tracked(&self, key: &TrackKey) -> bool {
        self.track(key).is_some()
    }

    pub fn is_static(&self, key: &TrackKey) -> bool {
        self.static_prop(key).is_some()
    }

    /// Structural checks applied when a timeline is loaded from JSON.
    pub fn validate_basic(&self) -> Result<(), TimelineError> {
        if !self.length.is_finite() || self.length < 0.0 {
            return Err(TimelineError::InvalidValue(format!(
                "timeline '{}' has invalid length {}",
                self.id, self.length
            )));
        }
        for (i, obj) in self.objects.iter().enumerate() {
            if obj.vxkey.is_empty() || obj.vxkey.contains('.') {
                return Err(TimelineError::Malformed(format!(
                    "invalid vxkey '{}' in timeline '{}'",
                    obj.vxkey, self.id
                )));
            }
            if self.objects[..i].iter().any(|o| o.vxkey == obj.vxkey) {
                return Err(TimelineError::already_exists(EntityKind::Object, obj.vxkey.clone()));
            }
            for track in &obj.tracks {
                if let Some(kf) = track.keyframes.iter().find(|k| !k.time.is_finite()) {
                    return Err(TimelineError::InvalidValue(format!(
                        "keyframe '{}' on {}.{} has a non-finite time",
                        kf.id, obj.vxkey, track.property_path
                    )));
                }
                if obj.static_prop(&track.property_path).is_some() {
                    return Err(TimelineError::RepresentationConflict {
                        key: format!("{}.{}", obj.vxkey, track.property_path),
                        existing: "tracked and static",
                    });
                }
            }
        }
        Ok(())
    }
}
