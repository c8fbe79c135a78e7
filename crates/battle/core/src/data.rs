//! Battle definition loaded at [`GameEngine::start`](crate::GameEngine::start).

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{ErrorSeverity, SimError};
use crate::expr::NestedSchema;
use crate::fsm::{SkillBook, SkillDefinition};
use crate::member::MemberSpec;
use crate::pipeline::Stage;
use crate::types::MemberId;

#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase", default))]
pub struct BattleData {
    pub skills: Vec<SkillDefinition>,
    /// Pipelines installed on every member.
    pub pipelines: BTreeMap<String, Vec<Stage>>,
    pub members: Vec<MemberSpec>,
    /// Attribute paths accepted after `self.` / `target.`; unchecked when
    /// absent.
    pub stat_schema: Option<NestedSchema>,
}

impl BattleData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_skill(mut self, skill: SkillDefinition) -> Self {
        self.skills.push(skill);
        self
    }

    pub fn with_pipeline(mut self, name: impl Into<String>, stages: Vec<Stage>) -> Self {
        self.pipelines.insert(name.into(), stages);
        self
    }

    pub fn with_member(mut self, member: MemberSpec) -> Self {
        self.members.push(member);
        self
    }

    pub fn with_stat_schema(mut self, schema: NestedSchema) -> Self {
        self.stat_schema = Some(schema);
        self
    }

    pub fn skill_book(&self) -> SkillBook {
        self.skills
            .iter()
            .map(|skill| (skill.id.clone(), skill.clone()))
            .collect()
    }

    /// Structural checks that do not need a running world.
    pub fn validate(&self) -> Result<(), DataError> {
        let mut ids = BTreeSet::new();
        for member in &self.members {
            if !ids.insert(member.id) {
                return Err(DataError::DuplicateMember(member.id));
            }
        }

        let mut skills = BTreeSet::new();
        for skill in &self.skills {
            if !skills.insert(skill.id.as_str()) {
                return Err(DataError::DuplicateSkill(skill.id.clone()));
            }
            for pipeline in [&skill.start_pipeline, &skill.pipeline].into_iter().flatten() {
                if !self.defines_pipeline(pipeline) {
                    return Err(DataError::UnknownPipeline {
                        skill: skill.id.clone(),
                        pipeline: pipeline.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    fn defines_pipeline(&self, name: &str) -> bool {
        self.pipelines.contains_key(name)
            || self.members.iter().any(|m| m.pipelines.contains_key(name))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DataError {
    #[error("member id {0} is used more than once")]
    DuplicateMember(MemberId),

    #[error("skill `{0}` is defined more than once")]
    DuplicateSkill(String),

    #[error("skill `{skill}` refers to undefined pipeline `{pipeline}`")]
    UnknownPipeline { skill: String, pipeline: String },
}

impl SimError for DataError {
    fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Validation
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::DuplicateMember(_) => "DATA_DUPLICATE_MEMBER",
            Self::DuplicateSkill(_) => "DATA_DUPLICATE_SKILL",
            Self::UnknownPipeline { .. } => "DATA_UNKNOWN_PIPELINE",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::member::MemberKind;

    #[test]
    fn validation_catches_structural_mistakes() {
        let base = BattleData::new()
            .with_member(MemberSpec::new(1, "blue", MemberKind::Player))
            .with_skill(SkillDefinition::new("slash").with_pipeline("slash"));
        assert_eq!(
            base.validate(),
            Err(DataError::UnknownPipeline {
                skill: "slash".into(),
                pipeline: "slash".into()
            })
        );

        let fixed = base.clone().with_pipeline("slash", Vec::new());
        assert_eq!(fixed.validate(), Ok(()));

        let twice = fixed.with_member(MemberSpec::new(1, "red", MemberKind::Mob));
        assert_eq!(twice.validate(), Err(DataError::DuplicateMember(MemberId(1))));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn loads_from_json() {
        let json = r#"{
            "skills": [{ "id": "slash", "startupFrames": "5", "pipeline": "slash" }],
            "pipelines": {
                "slash": [
                    { "id": "hit", "kind": "sendEvent", "target": "target",
                      "event": { "event": "damage", "expression": "self.atk" } }
                ]
            },
            "members": [
                { "id": 1, "camp": "blue", "attributes": { "atk": 40, "crit": "atk / 10" } },
                { "id": 2, "camp": "red", "kind": "mob", "position": { "x": 2, "y": 0, "z": 0 } }
            ]
        }"#;
        let data: BattleData = serde_json::from_str(json).unwrap();
        assert_eq!(data.validate(), Ok(()));
        assert_eq!(data.skills[0].startup_frames, "5");
        assert_eq!(data.skills[0].recovery_frames, "0");
        assert_eq!(data.members[1].kind, MemberKind::Mob);
        assert_eq!(
            data.members[0].attributes.get("crit"),
            Some(&crate::member::AttributeSpec::Formula("atk / 10".into()))
        );
    }
}
