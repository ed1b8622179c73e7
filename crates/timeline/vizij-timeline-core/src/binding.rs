//! Property binder: turns `vxkey.property.path` into a typed setter and caches it.
//!
//! Paths are resolved once against the live target into a [`BindingDescriptor`] (split, checked
//! segment names into the target's property tree). Writes then walk those names instead of
//! re-parsing the path string.
//! A path that cannot be resolved yields a no-op setter; the failure is reported once, when the
//! setter is built, and never on the per-frame path.

use std::sync::{Arc, Weak};

use hashbrown::HashMap;
use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::diagnostics::Diagnostics;
use crate::error::BindError;
use crate::ids::TrackKey;
use crate::scene::{PropertyNode, SceneObject, TargetHandle};
use crate::value::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    fn parse(segment: &str) -> Option<Axis> {
        match segment {
            "x" => Some(Axis::X),
            "y" => Some(Axis::Y),
            "z" => Some(Axis::Z),
            _ => None,
        }
    }
}

/// Resolved write location. Paths name entries of nested `IndexMap`s from the root, so a host
/// that reorders or removes sibling fields cannot redirect a cached write.
#[derive(Clone, Debug, PartialEq)]
pub enum BindingDescriptor {
    /// Plain field on a struct (inserted if absent).
    Field { parent: Vec<String>, field: String },
    /// One component of a vector field, e.g. `position.x`.
    VectorComponent { vector: Vec<String>, axis: Axis },
    /// Keyed-map entry that is a `{ value }` holder; writes go to the holder's value.
    MapEntry { map: Vec<String>, entry: String },
}

/// Resolve `property_path` against `object`.
pub fn resolve(object: &SceneObject, property_path: &str) -> Result<BindingDescriptor, BindError> {
    let segments: Vec<&str> = property_path.split('.').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(BindError::EmptyPath);
    }
    let Some((last, parents)) = segments.split_last() else {
        return Err(BindError::EmptyPath);
    };

    let mut names = Vec::with_capacity(parents.len());
    let mut container = &object.root;
    let mut in_map = false;
    for (i, segment) in parents.iter().enumerate() {
        let Some(node) = container.get(*segment) else {
            return Err(BindError::MissingIntermediate((*segment).to_string()));
        };
        names.push((*segment).to_string());
        match node {
            PropertyNode::Struct(children) => {
                container = children;
                in_map = false;
            }
            PropertyNode::Map(children) => {
                container = children;
                in_map = true;
            }
            PropertyNode::Vector3(_) if i + 1 == parents.len() => {
                let axis = Axis::parse(last)
                    .ok_or_else(|| BindError::InvalidComponent((*last).to_string()))?;
                return Ok(BindingDescriptor::VectorComponent {
                    vector: names,
                    axis,
                });
            }
            _ => return Err(BindError::MissingIntermediate((*segment).to_string())),
        }
    }

    if in_map && matches!(container.get(*last), Some(PropertyNode::Uniform(_))) {
        return Ok(BindingDescriptor::MapEntry {
            map: names,
            entry: (*last).to_string(),
        });
    }
    Ok(BindingDescriptor::Field {
        parent: names,
        field: (*last).to_string(),
    })
}

fn container_mut<'a>(
    root: &'a mut IndexMap<String, PropertyNode>,
    path: &[String],
) -> Option<&'a mut IndexMap<String, PropertyNode>> {
    let mut container = root;
    for name in path {
        container = container.get_mut(name.as_str())?.children_mut()?;
    }
    Some(container)
}

fn node_mut<'a>(
    root: &'a mut IndexMap<String, PropertyNode>,
    path: &[String],
) -> Option<&'a mut PropertyNode> {
    let (last, parents) = path.split_last()?;
    container_mut(root, parents)?.get_mut(last.as_str())
}

impl BindingDescriptor {
    /// Write `value` into `object`. Returns `false` when the tree no longer has the shape the
    /// descriptor was resolved against, or the value kind does not fit.
    pub fn write(&self, object: &mut SceneObject, value: &Value) -> bool {
        match self {
            BindingDescriptor::Field { parent, field } => {
                match container_mut(&mut object.root, parent) {
                    Some(container) => {
                        container.insert(field.clone(), PropertyNode::from(*value));
                        true
                    }
                    None => false,
                }
            }
            BindingDescriptor::VectorComponent { vector, axis } => {
                let (Some(PropertyNode::Vector3(v)), Some(n)) =
                    (node_mut(&mut object.root, vector), value.as_number())
                else {
                    return false;
                };
                match axis {
                    Axis::X => v.x = n,
                    Axis::Y => v.y = n,
                    Axis::Z => v.z = n,
                }
                true
            }
            BindingDescriptor::MapEntry { map, entry } => {
                let Some(container) = container_mut(&mut object.root, map) else {
                    return false;
                };
                match container.get_mut(entry.as_str()) {
                    Some(PropertyNode::Uniform(held)) => {
                        *held = *value;
                        true
                    }
                    _ => false,
                }
            }
        }
    }
}

#[derive(Clone, Debug)]
struct BoundSetter {
    target: Weak<RwLock<SceneObject>>,
    descriptor: BindingDescriptor,
}

/// Callable setter for one property of one target. The default setter is a no-op.
#[derive(Clone, Debug, Default)]
pub struct Setter {
    inner: Option<BoundSetter>,
}

static NOOP_SETTER: Setter = Setter { inner: None };

impl Setter {
    pub fn noop() -> Self {
        Self::default()
    }

    #[inline]
    pub fn is_noop(&self) -> bool {
        self.inner.is_none()
    }

    /// Write `value` to the bound target. No-op setters and dropped targets return `false`.
    pub fn apply(&self, value: &Value) -> bool {
        let Some(bound) = &self.inner else {
            return false;
        };
        match bound.target.upgrade() {
            Some(target) => bound.descriptor.write(&mut target.write(), value),
            None => false,
        }
    }
}

/// Build a setter for `property_path` on `target`.
pub fn bind(target: &TargetHandle, property_path: &str) -> Result<Setter, BindError> {
    let descriptor = resolve(&target.read(), property_path)?;
    Ok(Setter {
        inner: Some(BoundSetter {
            target: Arc::downgrade(target),
            descriptor,
        }),
    })
}

#[derive(Clone, Debug)]
struct CachedSetter {
    /// Target the setter was built for, kept even for no-op setters.
    target: Weak<RwLock<SceneObject>>,
    setter: Setter,
    resolved: bool,
}

impl CachedSetter {
    #[inline]
    fn is_for(&self, target: &TargetHandle) -> bool {
        std::ptr::eq(self.target.as_ptr(), Arc::as_ptr(target))
    }
}

/// Setter cache keyed by track key.
#[derive(Debug, Default)]
pub struct PropertyBinder {
    setters: HashMap<TrackKey, CachedSetter>,
}

impl PropertyBinder {
    pub fn new() -> Self {
        Self::default()
    }

    fn build(
        key: &TrackKey,
        target: &TargetHandle,
        diagnostics: &mut Diagnostics,
    ) -> CachedSetter {
        let (setter, resolved) = match bind(target, key.property_path()) {
            Ok(setter) => (setter, true),
            Err(err) => {
                diagnostics.warn(
                    "binding",
                    format!("cannot bind '{key}': {err}; writes to it are ignored"),
                );
                (Setter::noop(), false)
            }
        };
        CachedSetter {
            target: Arc::downgrade(target),
            setter,
            resolved,
        }
    }

    /// Cached setter for `key`, rebuilt first if it was built for a different target instance.
    pub fn setter_for(
        &mut self,
        key: &TrackKey,
        target: &TargetHandle,
        diagnostics: &mut Diagnostics,
    ) -> &Setter {
        let fresh = self.setters.get(key).is_some_and(|c| c.is_for(target));
        if !fresh {
            let cached = Self::build(key, target, diagnostics);
            self.setters.insert(key.clone(), cached);
        }
        self.setters
            .get(key)
            .map(|c| &c.setter)
            .unwrap_or(&NOOP_SETTER)
    }

    /// Rebuild the setter for `key` unconditionally. Returns whether the path resolved.
    pub fn generate(
        &mut self,
        key: &TrackKey,
        target: &TargetHandle,
        diagnostics: &mut Diagnostics,
    ) -> bool {
        let cached = Self::build(key, target, diagnostics);
        let resolved = cached.resolved;
        self.setters.insert(key.clone(), cached);
        resolved
    }

    /// Drop every setter of `vxkey` and regenerate one per path against `target`.
    pub fn rebuild<'a, I>(
        &mut self,
        vxkey: &str,
        target: &TargetHandle,
        paths: I,
        diagnostics: &mut Diagnostics,
    ) where
        I: IntoIterator<Item = &'a str>,
    {
        self.remove_object(vxkey);
        for path in paths {
            self.generate(&TrackKey::new(vxkey, path), target, diagnostics);
        }
    }

    /// Drop all setters whose key belongs to `vxkey`. Returns how many were removed.
    pub fn remove_object(&mut self, vxkey: &str) -> usize {
        let before = self.setters.len();
        self.setters.retain(|key, _| !key.belongs_to(vxkey));
        before - self.setters.len()
    }

    pub fn remove(&mut self, key: &TrackKey) -> bool {
        self.setters.remove(key).is_some()
    }

    pub fn has_setter(&self, key: &TrackKey) -> bool {
        self.setters.contains_key(key)
    }

    /// `false` for unknown keys and for keys cached as no-op.
    pub fn is_resolved(&self, key: &TrackKey) -> bool {
        self.setters.get(key).is_some_and(|c| c.resolved)
    }

    pub fn len(&self) -> usize {
        self.setters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.setters.is_empty()
    }

    pub fn clear(&mut self) {
        self.setters.clear();
    }
}
