//! Insertion-ordered member storage.

use std::collections::BTreeMap;

use super::{Camp, Member, MemberSpec, MemberView};
use crate::expr::{ExpressionEvaluator, StatLookup};
use crate::intent::IntentError;
use crate::pipeline::{ActionOutput, PipelineContext, PipelineEnv, Stage};
use crate::types::{Frame, MemberId, Vec3};

/// Members of a battle, iterated in insertion order.
///
/// Insertion order is the member tick order and the order spatial queries
/// report hits in.
#[derive(Clone, Debug, Default)]
pub struct MemberRegistry {
    members: BTreeMap<MemberId, Member>,
    order: Vec<MemberId>,
}

impl MemberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `member`. A member with the same id is replaced in place and
    /// keeps its position in the tick order.
    pub fn insert(&mut self, member: Member) -> Option<Member> {
        let id = member.id();
        let previous = self.members.insert(id, member);
        if previous.is_none() {
            self.order.push(id);
        }
        previous
    }

    /// Builds a member from `spec` without shared pipelines.
    pub fn insert_spec(&mut self, spec: &MemberSpec) -> MemberId {
        self.insert_spec_with(spec, &BTreeMap::new())
    }

    pub fn insert_spec_with(
        &mut self,
        spec: &MemberSpec,
        shared_pipelines: &BTreeMap<String, Vec<Stage>>,
    ) -> MemberId {
        let id = spec.id;
        self.insert(spec.build(shared_pipelines));
        id
    }

    pub fn remove(&mut self, id: MemberId) -> Option<Member> {
        let removed = self.members.remove(&id)?;
        self.order.retain(|other| *other != id);
        Some(removed)
    }

    pub fn get(&self, id: MemberId) -> Option<&Member> {
        self.members.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: MemberId) -> Option<&mut Member> {
        self.members.get_mut(&id)
    }

    pub fn ids(&self) -> &[MemberId] {
        &self.order
    }

    pub fn iter(&self) -> impl Iterator<Item = &Member> {
        self.order.iter().filter_map(|id| self.members.get(id))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Runs `pipeline` of member `id` on a working copy of its context and
    /// merges the result back into the live context.
    ///
    /// `prepare` adjusts the working copy before the run. On failure the
    /// live context is left untouched.
    pub(crate) fn run_pipeline(
        &mut self,
        id: MemberId,
        pipeline: &str,
        evaluator: &mut ExpressionEvaluator,
        frame: Frame,
        prepare: impl FnOnce(&mut PipelineContext),
    ) -> Result<Vec<ActionOutput>, IntentError> {
        let member = self.members.get(&id).ok_or(IntentError::MemberNotFound(id))?;
        let mut working = member.context().clone();
        prepare(&mut working);

        let mut env = PipelineEnv {
            frame,
            world: &*self,
            evaluator,
        };
        let run = member.pipelines().run(pipeline, working, &mut env)?;

        if let Some(member) = self.members.get_mut(&id) {
            member.context_mut().merge(run.ctx);
        }
        Ok(run.outputs)
    }

    pub fn clear(&mut self) {
        self.members.clear();
        self.order.clear();
    }
}

impl StatLookup for MemberRegistry {
    fn stat_value(&self, member: MemberId, path: &str) -> Option<f64> {
        self.members.get(&member)?.stats().get_value(path)
    }
}

impl MemberView for MemberRegistry {
    fn contains(&self, id: MemberId) -> bool {
        self.members.contains_key(&id)
    }

    fn position(&self, id: MemberId) -> Option<Vec3> {
        self.members.get(&id).map(Member::position)
    }

    fn camp(&self, id: MemberId) -> Option<&Camp> {
        self.members.get(&id).map(Member::camp)
    }

    fn stats(&self) -> &dyn StatLookup {
        self
    }
}
