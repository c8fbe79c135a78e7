//! Declarative member definitions used to populate a battle.

use std::collections::BTreeMap;

use super::{Camp, Member, MemberKind};
use crate::pipeline::Stage;
use crate::types::{MemberId, Vec3};

/// Initial value of an attribute: a number or a formula over other
/// attributes of the same member.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum AttributeSpec {
    Value(f64),
    Formula(String),
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct MemberSpec {
    pub id: MemberId,
    #[cfg_attr(feature = "serde", serde(default))]
    pub name: String,
    pub camp: Camp,
    #[cfg_attr(feature = "serde", serde(default))]
    pub kind: MemberKind,
    #[cfg_attr(feature = "serde", serde(default))]
    pub position: Vec3,
    #[cfg_attr(feature = "serde", serde(default))]
    pub attributes: BTreeMap<String, AttributeSpec>,
    /// Member-specific pipelines; override shared ones of the same name.
    #[cfg_attr(feature = "serde", serde(default))]
    pub pipelines: BTreeMap<String, Vec<Stage>>,
}

impl MemberSpec {
    pub fn new(id: u32, camp: &str, kind: MemberKind) -> Self {
        Self {
            id: MemberId(id),
            name: format!("{kind}#{id}"),
            camp: Camp::from(camp),
            kind,
            position: Vec3::ZERO,
            attributes: BTreeMap::new(),
            pipelines: BTreeMap::new(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn at(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    pub fn attribute(mut self, path: impl Into<String>, value: f64) -> Self {
        self.attributes.insert(path.into(), AttributeSpec::Value(value));
        self
    }

    pub fn formula(mut self, path: impl Into<String>, formula: impl Into<String>) -> Self {
        self.attributes
            .insert(path.into(), AttributeSpec::Formula(formula.into()));
        self
    }

    pub fn pipeline(mut self, name: impl Into<String>, stages: Vec<Stage>) -> Self {
        self.pipelines.insert(name.into(), stages);
        self
    }

    /// Builds the member.
    ///
    /// Every path is declared before any formula is installed so formulas
    /// may reference attributes regardless of map order. A formula that
    /// fails to compile leaves its attribute at 0 and is logged.
    pub fn build(&self, shared_pipelines: &BTreeMap<String, Vec<Stage>>) -> Member {
        let mut member = Member::new(self.id, self.name.clone(), self.camp.clone(), self.kind);
        member.set_position(self.position);

        let stats = member.stats_mut();
        for (path, attribute) in &self.attributes {
            let base = match attribute {
                AttributeSpec::Value(v) => *v,
                AttributeSpec::Formula(_) => 0.0,
            };
            stats.declare(path.clone(), base);
        }
        for (path, attribute) in &self.attributes {
            let AttributeSpec::Formula(formula) = attribute else {
                continue;
            };
            match stats.set_formula(path, formula) {
                Ok(warnings) => {
                    for warning in warnings {
                        tracing::warn!(target: "battle::stats", member = %self.id, %path, "{warning}");
                    }
                }
                Err(err) => {
                    tracing::warn!(
                        target: "battle::stats",
                        member = %self.id,
                        %path,
                        error = %err,
                        "attribute formula rejected"
                    );
                }
            }
        }

        let pipelines = member.pipelines_mut();
        for (name, stages) in shared_pipelines.iter().chain(&self.pipelines) {
            pipelines.define(name.clone(), stages.iter().cloned());
        }
        member
    }
}
