//! Buff definitions and the per-member buff table.

use std::collections::BTreeMap;

use crate::pipeline::Stage;
use crate::stats::ModifierBucket;
use crate::types::Frame;

/// Modifier a buff contributes while active.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BuffModifier {
    pub path: String,
    pub bucket: ModifierBucket,
    pub value: f64,
}

/// Pipeline stage a buff splices into one of the member's pipelines.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct BuffStage {
    pub pipeline: String,
    pub after_stage: String,
    pub stage: Stage,
    #[cfg_attr(feature = "serde", serde(default))]
    pub priority: i32,
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct BuffSpec {
    pub id: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub name: String,
    /// `None` lasts until removed.
    #[cfg_attr(feature = "serde", serde(default))]
    pub duration_frames: Option<u64>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub modifiers: Vec<BuffModifier>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub stages: Vec<BuffStage>,
}

impl BuffSpec {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            duration_frames: None,
            modifiers: Vec::new(),
            stages: Vec::new(),
        }
    }

    pub fn with_duration(mut self, frames: u64) -> Self {
        self.duration_frames = Some(frames);
        self
    }

    pub fn with_modifier(mut self, path: impl Into<String>, bucket: ModifierBucket, value: f64) -> Self {
        self.modifiers.push(BuffModifier {
            path: path.into(),
            bucket,
            value,
        });
        self
    }

    pub fn with_stage(mut self, stage: BuffStage) -> Self {
        self.stages.push(stage);
        self
    }

    /// Attribution tag on every modifier entry and stage this buff adds.
    pub fn origin(&self) -> String {
        buff_origin(&self.id)
    }
}

pub fn buff_origin(id: &str) -> String {
    format!("buff:{id}")
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ActiveBuff {
    pub spec: BuffSpec,
    pub applied_at: Frame,
    pub expires_at: Option<Frame>,
    /// Who applied it (intent source).
    pub source: String,
}

/// Active buffs keyed by id; one instance per id.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BuffManager {
    active: BTreeMap<String, ActiveBuff>,
}

impl BuffManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `spec`, returning the instance it replaced.
    pub fn add(&mut self, spec: BuffSpec, frame: Frame, source: impl Into<String>) -> Option<ActiveBuff> {
        let expires_at = spec.duration_frames.map(|d| frame + d);
        self.active.insert(
            spec.id.clone(),
            ActiveBuff {
                spec,
                applied_at: frame,
                expires_at,
                source: source.into(),
            },
        )
    }

    pub fn remove(&mut self, id: &str) -> Option<ActiveBuff> {
        self.active.remove(id)
    }

    pub fn get(&self, id: &str) -> Option<&ActiveBuff> {
        self.active.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.active.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.active.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Ids whose lifetime ended at or before `frame`.
    pub fn expired(&self, frame: Frame) -> Vec<String> {
        self.active
            .iter()
            .filter(|(_, buff)| buff.expires_at.is_some_and(|end| frame >= end))
            .map(|(id, _)| id.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_replaces_same_id() {
        let mut buffs = BuffManager::new();
        assert!(buffs.add(BuffSpec::new("rage"), Frame(0), "a").is_none());
        let old = buffs
            .add(BuffSpec::new("rage").with_duration(10), Frame(5), "b")
            .unwrap();
        assert_eq!(old.source, "a");
        assert_eq!(buffs.len(), 1);
        assert_eq!(buffs.get("rage").unwrap().expires_at, Some(Frame(15)));
    }

    #[test]
    fn unbounded_duration_never_expires() {
        let mut buffs = BuffManager::new();
        buffs.add(BuffSpec::new("ward").with_duration(u64::MAX), Frame(7), "x");
        assert_eq!(buffs.get("ward").unwrap().expires_at, Some(Frame(u64::MAX)));
        assert!(buffs.expired(Frame(u64::MAX - 1)).is_empty());
    }

    #[test]
    fn expiry_is_inclusive() {
        let mut buffs = BuffManager::new();
        buffs.add(BuffSpec::new("a").with_duration(3), Frame(2), "x");
        buffs.add(BuffSpec::new("b"), Frame(2), "x");
        assert!(buffs.expired(Frame(4)).is_empty());
        assert_eq!(buffs.expired(Frame(5)), vec!["a".to_string()]);
    }
}
