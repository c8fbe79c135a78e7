//! Named, mutable stage lists.

use std::collections::BTreeMap;

use super::error::PipelineError;
use super::stage::Stage;

#[derive(Clone, Debug, PartialEq)]
struct Slot {
    stage: Stage,
    /// Attribution for dynamically inserted stages.
    source: Option<String>,
    /// Anchor the stage was inserted after.
    anchor: Option<String>,
    priority: i32,
}

/// A member's pipelines, keyed by name.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PipelineManager {
    pipelines: BTreeMap<String, Vec<Slot>>,
}

impl PipelineManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defines (or redefines) a pipeline from static stages.
    pub fn define(&mut self, name: impl Into<String>, stages: impl IntoIterator<Item = Stage>) {
        let slots = stages
            .into_iter()
            .map(|stage| Slot {
                stage,
                source: None,
                anchor: None,
                priority: 0,
            })
            .collect();
        self.pipelines.insert(name.into(), slots);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.pipelines.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.pipelines.keys().map(String::as_str)
    }

    pub fn stages(&self, name: &str) -> Option<impl Iterator<Item = &Stage>> {
        self.pipelines
            .get(name)
            .map(|slots| slots.iter().map(|slot| &slot.stage))
    }

    pub fn stage_ids(&self, name: &str) -> Vec<&str> {
        self.pipelines
            .get(name)
            .map(|slots| slots.iter().map(|s| s.stage.id.as_str()).collect())
            .unwrap_or_default()
    }

    /// Inserts `stage` right after `after_stage`.
    ///
    /// Stages inserted after the same anchor are ordered by descending
    /// priority, ties by insertion order.
    pub fn insert_stage(
        &mut self,
        pipeline: &str,
        after_stage: &str,
        stage: Stage,
        source: impl Into<String>,
        priority: i32,
    ) -> Result<(), PipelineError> {
        let slots = self
            .pipelines
            .get_mut(pipeline)
            .ok_or_else(|| PipelineError::UnknownPipeline(pipeline.to_string()))?;

        if slots.iter().any(|s| s.stage.id == stage.id) {
            return Err(PipelineError::DuplicateStage {
                pipeline: pipeline.to_string(),
                stage: stage.id,
            });
        }

        let anchor = slots
            .iter()
            .position(|s| s.stage.id == after_stage)
            .ok_or_else(|| PipelineError::UnknownAnchor {
                pipeline: pipeline.to_string(),
                anchor: after_stage.to_string(),
            })?;

        let mut at = anchor + 1;
        while let Some(slot) = slots.get(at) {
            let same_anchor = slot.anchor.as_deref() == Some(after_stage);
            if !same_anchor || slot.priority < priority {
                break;
            }
            at += 1;
        }

        slots.insert(
            at,
            Slot {
                stage,
                source: Some(source.into()),
                anchor: Some(after_stage.to_string()),
                priority,
            },
        );
        Ok(())
    }

    /// Removes every stage inserted by `source`; returns how many.
    pub fn remove_stages_by_source(&mut self, source: &str) -> usize {
        let mut removed = 0;
        for slots in self.pipelines.values_mut() {
            let before = slots.len();
            slots.retain(|slot| slot.source.as_deref() != Some(source));
            removed += before - slots.len();
        }
        removed
    }
}
