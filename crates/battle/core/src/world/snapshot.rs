//! Read-only views of the world handed across the worker boundary.

use crate::area::AreaSummary;
use crate::expr::Locals;
use crate::fsm::{MemberState, QueuedSkill};
use crate::member::{Camp, Member, MemberKind};
use crate::stats::StatSnapshot;
use crate::types::{Frame, MemberId, Vec3};

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct MemberSnapshot {
    pub id: MemberId,
    pub name: String,
    pub camp: Camp,
    pub kind: MemberKind,
    pub position: Vec3,
    pub state: MemberState,
    pub current_skill: Option<String>,
    pub action_frame_index: Option<u64>,
    pub queued: Vec<QueuedSkill>,
    pub buffs: Vec<String>,
    pub stats: StatSnapshot,
    pub vars: Locals,
}

impl MemberSnapshot {
    pub fn capture(member: &Member) -> Self {
        let fsm = member.fsm();
        Self {
            id: member.id(),
            name: member.name().to_string(),
            camp: member.camp().clone(),
            kind: member.kind(),
            position: member.position(),
            state: fsm.state(),
            current_skill: fsm.current_skill().map(str::to_string),
            action_frame_index: fsm.action_frame_index(),
            queued: fsm.queued().cloned().collect(),
            buffs: member.buffs().ids().map(str::to_string).collect(),
            stats: member.stats().snapshot(),
            vars: member.context().vars.clone(),
        }
    }
}

/// Lightweight member listing.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct MemberSummary {
    pub id: MemberId,
    pub name: String,
    pub camp: Camp,
    pub kind: MemberKind,
    pub position: Vec3,
    pub state: MemberState,
    /// Dynamic value of the health attribute, if the member has one.
    pub health: Option<f64>,
}

#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct WorldSnapshot {
    pub frame: Frame,
    pub members: Vec<MemberSnapshot>,
    pub areas: Vec<AreaSummary>,
    pub scheduled_events: usize,
}

impl WorldSnapshot {
    pub fn member(&self, id: MemberId) -> Option<&MemberSnapshot> {
        self.members.iter().find(|m| m.id == id)
    }
}
