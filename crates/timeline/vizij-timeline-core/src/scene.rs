//! Animated targets and the scene store that resolves them by vxkey.
//!
//! A [`SceneObject`] is a small property tree. The host owns the objects; the engine only holds
//! [`TargetHandle`]s obtained from a [`SceneStore`].

use std::sync::Arc;

use hashbrown::HashMap;
use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::value::{Value, Vec3};

/// Shared handle to a live target. Identity (pointer equality) is what the binder checks to
/// detect a remounted object.
pub type TargetHandle = Arc<RwLock<SceneObject>>;

/// Resolves a vxkey to the currently mounted target.
pub trait SceneStore {
    fn resolve(&self, vxkey: &str) -> Option<TargetHandle>;
}

#[derive(Clone, Debug, PartialEq)]
pub enum PropertyNode {
    Number(f64),
    Vector3(Vec3),
    /// Plain nested fields (`material.color`).
    Struct(IndexMap<String, PropertyNode>),
    /// Keyed container whose entries are usually [`PropertyNode::Uniform`] holders
    /// (`material.uniforms.uTime`).
    Map(IndexMap<String, PropertyNode>),
    /// One-field `{ value }` holder stored inside a [`PropertyNode::Map`].
    Uniform(Value),
}

impl PropertyNode {
    pub fn struct_of<I, K>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, PropertyNode)>,
        K: Into<String>,
    {
        PropertyNode::Struct(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn map_of<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, PropertyNode)>,
        K: Into<String>,
    {
        PropertyNode::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Leaf value, if this node holds one.
    pub fn value(&self) -> Option<Value> {
        match self {
            PropertyNode::Number(n) => Some(Value::Number(*n)),
            PropertyNode::Vector3(v) => Some(Value::Vector3(*v)),
            PropertyNode::Uniform(v) => Some(*v),
            PropertyNode::Struct(_) | PropertyNode::Map(_) => None,
        }
    }

    pub(crate) fn children(&self) -> Option<&IndexMap<String, PropertyNode>> {
        match self {
            PropertyNode::Struct(c) | PropertyNode::Map(c) => Some(c),
            _ => None,
        }
    }

    pub(crate) fn children_mut(&mut self) -> Option<&mut IndexMap<String, PropertyNode>> {
        match self {
            PropertyNode::Struct(c) | PropertyNode::Map(c) => Some(c),
            _ => None,
        }
    }
}

impl From<Value> for PropertyNode {
    fn from(v: Value) -> Self {
        match v {
            Value::Number(n) => PropertyNode::Number(n),
            Value::Vector3(v) => PropertyNode::Vector3(v),
        }
    }
}

impl From<f64> for PropertyNode {
    fn from(n: f64) -> Self {
        PropertyNode::Number(n)
    }
}

impl From<Vec3> for PropertyNode {
    fn from(v: Vec3) -> Self {
        PropertyNode::Vector3(v)
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SceneObject {
    pub vxkey: String,
    pub root: IndexMap<String, PropertyNode>,
}

impl SceneObject {
    pub fn new(vxkey: impl Into<String>) -> Self {
        Self {
            vxkey: vxkey.into(),
            root: IndexMap::new(),
        }
    }

    /// Builder-style field insert.
    pub fn with(mut self, field: impl Into<String>, node: impl Into<PropertyNode>) -> Self {
        self.root.insert(field.into(), node.into());
        self
    }

    pub fn into_handle(self) -> TargetHandle {
        Arc::new(RwLock::new(self))
    }

    /// Node addressed by a dotted path. Vector components are not nodes; use [`Self::read`].
    pub fn node(&self, path: &str) -> Option<&PropertyNode> {
        let mut segments = path.split('.');
        let mut node = self.root.get(segments.next()?)?;
        for segment in segments {
            node = node.children()?.get(segment)?;
        }
        Some(node)
    }

    /// Current value at a dotted path, including `x`/`y`/`z` components of vectors.
    pub fn read(&self, path: &str) -> Option<Value> {
        if let Some(node) = self.node(path) {
            return node.value();
        }
        let (parent, component) = path.rsplit_once('.')?;
        let v = self.node(parent)?.value()?.as_vector3()?;
        let n = match component {
            "x" => v.x,
            "y" => v.y,
            "z" => v.z,
            _ => return None,
        };
        Some(Value::Number(n))
    }
}

/// In-memory scene store. Clones share the same object table, so a host can keep one copy for
/// mounting while the engine resolves through another.
#[derive(Clone, Debug, Default)]
pub struct SceneGraph {
    objects: Arc<RwLock<HashMap<String, TargetHandle>>>,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mount (or remount) an object under its vxkey; returns the new handle.
    pub fn mount(&self, object: SceneObject) -> TargetHandle {
        let vxkey = object.vxkey.clone();
        let handle = object.into_handle();
        self.objects.write().insert(vxkey, handle.clone());
        handle
    }

    pub fn unmount(&self, vxkey: &str) -> Option<TargetHandle> {
        self.objects.write().remove(vxkey)
    }

    pub fn get(&self, vxkey: &str) -> Option<TargetHandle> {
        self.objects.read().get(vxkey).cloned()
    }

    pub fn is_mounted(&self, vxkey: &str) -> bool {
        self.objects.read().contains_key(vxkey)
    }

    pub fn vxkeys(&self) -> Vec<String> {
        self.objects.read().keys().cloned().collect()
    }
}

impl SceneStore for SceneGraph {
    fn resolve(&self, vxkey: &str) -> Option<TargetHandle> {
        self.get(vxkey)
    }
}
