//! Cross-frame spatial effects: damage zones, buff auras and traps.
//!
//! [`AreaManager::tick`] runs the systems in a fixed order (damage, trap,
//! buff) against a [`SpatialGrid`] rebuilt from member positions each frame.
//! Systems only emit intents; they never touch members.
mod buff;
mod damage;
mod request;
mod spatial;
mod trap;

pub use buff::{BuffAreaInstance, BuffAreaSystem};
pub use damage::{DamageAreaInstance, DamageAreaSystem, Trajectory};
pub use request::{
    AreaAffects, AreaAnchor, AreaRequest, BuffAreaRequest, BuffAreaSpec, DamageAreaRequest,
    DamageAreaSpec, RangeKind, SpawnOrigin, TrapAreaRequest, TrapAreaSpec,
};
pub use spatial::{GridEntry, SpatialGrid};
pub use trap::{TrapAreaInstance, TrapAreaSystem};

use std::fmt;

use crate::expr::Locals;
use crate::fsm::{DamageRequest, FsmEvent};
use crate::intent::{Intent, IntentPayload};
use crate::types::{Frame, MemberId, Vec3};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AreaId(pub u64);

impl fmt::Display for AreaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "area#{}", self.0)
    }
}

/// Public view of one live area.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct AreaSummary {
    pub id: AreaId,
    pub kind: String,
    pub source: String,
    pub caster: MemberId,
    pub center: Vec3,
    pub radius: f64,
}

fn damage_intent(
    caster: MemberId,
    target: MemberId,
    source: &str,
    expression: &str,
    attack_count: u32,
    damage_count: u32,
    vars: Locals,
) -> Intent {
    let request = DamageRequest {
        source: caster,
        expression: expression.to_string(),
        attack_count,
        damage_count,
        vars,
    };
    Intent::new(
        caster,
        IntentPayload::SendFsmEvent {
            event: FsmEvent::TakeDamage(request),
        },
    )
    .with_target(Some(target))
    .with_source(source)
}

#[derive(Clone, Debug, Default)]
pub struct AreaManager {
    next_id: u64,
    damage: DamageAreaSystem,
    trap: TrapAreaSystem,
    buff: BuffAreaSystem,
}

impl AreaManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Instantiates `request`; ids are unique across all three systems.
    pub fn add(&mut self, request: AreaRequest) -> AreaId {
        self.next_id += 1;
        let id = AreaId(self.next_id);
        tracing::debug!(
            target: "battle::area",
            area = %id,
            kind = request.kind(),
            source = request.source(),
            "area spawned"
        );
        match request {
            AreaRequest::Damage(r) => self.damage.add(id, r),
            AreaRequest::Buff(r) => self.buff.add(id, r),
            AreaRequest::Trap(r) => self.trap.add(id, r),
        }
        id
    }

    pub fn remove(&mut self, id: AreaId) -> bool {
        self.damage.remove(id) || self.trap.remove(id) || self.buff.remove(id)
    }

    pub fn remove_by_source(&mut self, source: &str) -> usize {
        self.damage.remove_by_source(source)
            + self.trap.remove_by_source(source)
            + self.buff.remove_by_source(source)
    }

    pub fn len(&self) -> usize {
        self.damage.len() + self.trap.len() + self.buff.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn damage_areas(&self) -> &DamageAreaSystem {
        &self.damage
    }

    pub fn trap_areas(&self) -> &TrapAreaSystem {
        &self.trap
    }

    pub fn buff_areas(&self) -> &BuffAreaSystem {
        &self.buff
    }

    pub fn tick(&mut self, frame: Frame, grid: &SpatialGrid) -> Vec<Intent> {
        let mut intents = self.damage.tick(frame, grid);
        intents.extend(self.trap.tick(frame, grid));
        intents.extend(self.buff.tick(frame, grid));
        intents
    }

    /// Live areas ordered by id.
    pub fn summaries(&self, frame: Frame) -> Vec<AreaSummary> {
        let damage = self.damage.iter().map(|a| AreaSummary {
            id: a.id,
            kind: "damage".into(),
            source: a.request.source.clone(),
            caster: a.request.caster,
            center: a.center(frame),
            radius: a.radius,
        });
        let trap = self.trap.iter().map(|a| AreaSummary {
            id: a.id,
            kind: "trap".into(),
            source: a.request.source.clone(),
            caster: a.request.caster,
            center: a.request.center,
            radius: a.request.radius,
        });
        let buff = self.buff.iter().map(|a| AreaSummary {
            id: a.id,
            kind: "buff".into(),
            source: a.request.source.clone(),
            caster: a.request.caster,
            center: a.request.center,
            radius: a.request.radius,
        });
        let mut all: Vec<AreaSummary> = damage.chain(trap).chain(buff).collect();
        all.sort_by_key(|s| s.id);
        all
    }

    pub fn clear(&mut self) {
        *self = Self {
            next_id: self.next_id,
            ..Self::default()
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::member::{BuffSpec, Camp, MemberKind, MemberRegistry, MemberSpec};

    fn origin() -> SpawnOrigin {
        SpawnOrigin {
            caster: MemberId(1),
            camp: Camp::from("blue"),
            caster_position: Vec3::ZERO,
            target: None,
            target_position: None,
            frame: Frame(0),
            source: "skill:mix".into(),
            vars: Locals::new(),
        }
    }

    #[test]
    fn ticks_damage_then_trap_then_buff() {
        let mut registry = MemberRegistry::new();
        registry.insert_spec(&MemberSpec::new(1, "blue", MemberKind::Player));
        registry.insert_spec(&MemberSpec::new(2, "red", MemberKind::Mob).at(Vec3::new(1.0, 0.0, 0.0)));
        let grid = SpatialGrid::from_registry(&registry, 4.0);

        let mut areas = AreaManager::new();
        let buff = BuffAreaSpec {
            radius: 3.0,
            duration_frames: 10,
            buff: BuffSpec::new("ward"),
            affects: AreaAffects::Allies,
            anchor: AreaAnchor::Caster,
        };
        let trap = TrapAreaSpec {
            radius: 3.0,
            duration_frames: 10,
            arm_delay_frames: 0,
            rearm_frames: 1,
            max_triggers: 1,
            expression: "1".into(),
            attack_count: 1,
            damage_count: 1,
            anchor: AreaAnchor::Caster,
        };
        let damage = DamageAreaSpec {
            range_kind: RangeKind::Enemy,
            radius: 3.0,
            width: 0.0,
            speed: 0.0,
            direction: None,
            duration_frames: 10,
            hit_interval_frames: 1,
            expression: "2".into(),
            attack_count: 1,
            damage_count: 1,
        };
        let buff_id = areas.add(buff.to_request(&origin()));
        areas.add(trap.to_request(&origin()));
        areas.add(damage.to_request(&origin()));
        assert_eq!(areas.len(), 3);

        let kinds: Vec<_> = areas
            .tick(Frame(0), &grid)
            .iter()
            .map(|i| match &i.payload {
                IntentPayload::SendFsmEvent {
                    event: FsmEvent::TakeDamage(r),
                } => r.expression.clone(),
                other => other.kind().to_string(),
            })
            .collect();
        assert_eq!(kinds, vec!["2", "1", "addBuff"]);

        assert!(areas.remove(buff_id));
        assert_eq!(areas.remove_by_source("skill:mix"), 1);
        assert!(areas.is_empty());
    }
}
