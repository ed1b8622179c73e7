//! Identifiers for timeline entities.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TimelineError;

/// `vxkey + "." + property_path`. The vxkey never contains a `.`, so the key is split at the
/// first one. Static props use the same key shape.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrackKey {
    vxkey: String,
    property_path: String,
}

impl TrackKey {
    pub fn new(vxkey: impl Into<String>, property_path: impl Into<String>) -> Self {
        Self {
            vxkey: vxkey.into(),
            property_path: property_path.into(),
        }
    }

    pub fn parse(raw: &str) -> Result<Self, TimelineError> {
        match raw.split_once('.') {
            Some((vxkey, path)) if !vxkey.is_empty() && !path.is_empty() => {
                Ok(Self::new(vxkey, path))
            }
            _ => Err(TimelineError::Malformed(format!(
                "'{raw}' is not a <vxkey>.<propertyPath> key"
            ))),
        }
    }

    #[inline]
    pub fn vxkey(&self) -> &str {
        &self.vxkey
    }

    #[inline]
    pub fn property_path(&self) -> &str {
        &self.property_path
    }

    /// Last `.`-separated segment of the property path (`"position.x"` -> `"x"`).
    pub fn suffix(&self) -> &str {
        self.property_path
            .rsplit('.')
            .next()
            .unwrap_or(&self.property_path)
    }

    #[inline]
    pub fn belongs_to(&self, vxkey: &str) -> bool {
        self.vxkey == vxkey
    }
}

impl fmt::Display for TrackKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.vxkey, self.property_path)
    }
}

impl FromStr for TrackKey {
    type Err = TimelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for TrackKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TrackKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Keyframe identity; stable across reorderings.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyframeId(pub String);

impl KeyframeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh `keyframe-<uuid>` identifier.
    pub fn generate() -> Self {
        Self(format!("keyframe-{}", uuid::Uuid::new_v4()))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KeyframeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for KeyframeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for KeyframeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SplineKey(pub String);

impl SplineKey {
    /// Conventional key of the spline path owned by `vxkey`.
    pub fn for_object(vxkey: &str) -> Self {
        Self(format!("{vxkey}.spline"))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SplineKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn track_key_splits_at_first_dot() {
        let key = TrackKey::parse("cube.material.uniforms.uTime").unwrap();
        assert_eq!(key.vxkey(), "cube");
        assert_eq!(key.property_path(), "material.uniforms.uTime");
        assert_eq!(key.suffix(), "uTime");
        assert_eq!(key.to_string(), "cube.material.uniforms.uTime");
        assert!(TrackKey::parse("cube").is_err());
        assert!(TrackKey::parse(".x").is_err());
    }

    #[test]
    fn track_key_serializes_as_string() {
        let key = TrackKey::new("cube", "position.x");
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, "\"cube.position.x\"");
        let back: TrackKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key);
    }

    #[test]
    fn generated_keyframe_ids_are_unique() {
        let a = KeyframeId::generate();
        let b = KeyframeId::generate();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("keyframe-"));
        assert_eq!(SplineKey::for_object("cube").as_str(), "cube.spline");
    }
}
