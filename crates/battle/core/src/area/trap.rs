//! Traps: armed after a delay, triggered by enemies inside, consumed after
//! a number of triggers.

use std::collections::BTreeMap;

use super::request::TrapAreaRequest;
use super::spatial::SpatialGrid;
use super::{AreaId, damage_intent};
use crate::expr::Value;
use crate::intent::Intent;
use crate::types::Frame;

#[derive(Clone, Debug, PartialEq)]
pub struct TrapAreaInstance {
    pub id: AreaId,
    pub request: TrapAreaRequest,
    triggers: u32,
    ready_at: Frame,
}

impl TrapAreaInstance {
    pub fn new(id: AreaId, request: TrapAreaRequest) -> Self {
        let ready_at = request.start_frame + request.arm_delay_frames;
        Self {
            id,
            request,
            triggers: 0,
            ready_at,
        }
    }

    pub fn triggers(&self) -> u32 {
        self.triggers
    }

    pub fn is_armed(&self, frame: Frame) -> bool {
        frame >= self.ready_at
    }

    pub fn is_expired(&self, frame: Frame) -> bool {
        frame >= self.request.start_frame + self.request.duration_frames
    }

    pub fn is_consumed(&self) -> bool {
        self.request.max_triggers > 0 && self.triggers >= self.request.max_triggers
    }
}

#[derive(Clone, Debug, Default)]
pub struct TrapAreaSystem {
    instances: BTreeMap<AreaId, TrapAreaInstance>,
}

impl TrapAreaSystem {
    pub fn add(&mut self, id: AreaId, request: TrapAreaRequest) {
        self.instances.insert(id, TrapAreaInstance::new(id, request));
    }

    pub fn remove(&mut self, id: AreaId) -> bool {
        self.instances.remove(&id).is_some()
    }

    pub fn remove_by_source(&mut self, source: &str) -> usize {
        let before = self.instances.len();
        self.instances.retain(|_, trap| trap.request.source != source);
        before - self.instances.len()
    }

    pub fn get(&self, id: AreaId) -> Option<&TrapAreaInstance> {
        self.instances.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrapAreaInstance> {
        self.instances.values()
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn tick(&mut self, frame: Frame, grid: &SpatialGrid) -> Vec<Intent> {
        self.instances.retain(|_, trap| !trap.is_expired(frame));

        let mut intents = Vec::new();
        for trap in self.instances.values_mut() {
            if !trap.is_armed(frame) {
                continue;
            }
            let center = trap.request.center;
            let victims: Vec<_> = grid
                .query(center, trap.request.radius)
                .into_iter()
                .filter(|entry| trap.request.camp.is_enemy_of(&entry.camp))
                .map(|entry| (entry.id, entry.position.planar_distance(center)))
                .collect();
            if victims.is_empty() {
                continue;
            }

            trap.triggers += 1;
            trap.ready_at = frame + trap.request.rearm_frames.max(1);
            tracing::debug!(
                target: "battle::area",
                area = %trap.id,
                triggers = trap.triggers,
                victims = victims.len(),
                "trap triggered"
            );

            let target_count = victims.len() as f64;
            for (target, distance) in victims {
                let mut vars = trap.request.vars.clone();
                vars.insert("distance".into(), Value::Number(distance));
                vars.insert("targetCount".into(), Value::Number(target_count));
                intents.push(damage_intent(
                    trap.request.caster,
                    target,
                    &trap.request.source,
                    &trap.request.expression,
                    trap.request.attack_count,
                    trap.request.damage_count,
                    vars,
                ));
            }
        }

        self.instances.retain(|_, trap| !trap.is_consumed());
        intents
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Locals;
    use crate::member::{Camp, MemberKind, MemberRegistry, MemberSpec};
    use crate::types::{MemberId, Vec3};

    fn request(max_triggers: u32) -> TrapAreaRequest {
        TrapAreaRequest {
            caster: MemberId(1),
            camp: Camp::from("blue"),
            source: "skill:trap".into(),
            start_frame: Frame(0),
            duration_frames: 100,
            arm_delay_frames: 5,
            rearm_frames: 10,
            max_triggers,
            center: Vec3::ZERO,
            radius: 2.0,
            expression: "30".into(),
            attack_count: 1,
            damage_count: 1,
            vars: Locals::new(),
        }
    }

    fn grid(enemy_x: f64) -> SpatialGrid {
        let mut registry = MemberRegistry::new();
        registry.insert_spec(&MemberSpec::new(1, "blue", MemberKind::Player));
        registry.insert_spec(&MemberSpec::new(2, "red", MemberKind::Mob).at(Vec3::new(enemy_x, 0.0, 0.0)));
        registry.insert_spec(&MemberSpec::new(3, "red", MemberKind::Mob).at(Vec3::new(enemy_x, 0.0, 0.5)));
        SpatialGrid::from_registry(&registry, 4.0)
    }

    #[test]
    fn waits_for_arming_then_hits_everyone_inside() {
        let mut system = TrapAreaSystem::default();
        system.add(AreaId(1), request(0));
        let inside = grid(1.0);
        for f in 0..5 {
            assert!(system.tick(Frame(f), &inside).is_empty());
        }
        let intents = system.tick(Frame(5), &inside);
        let targets: Vec<_> = intents.iter().filter_map(|i| i.target_id).collect();
        assert_eq!(targets, vec![MemberId(2), MemberId(3)]);
    }

    #[test]
    fn rearms_and_is_consumed() {
        let mut system = TrapAreaSystem::default();
        system.add(AreaId(1), request(2));
        let inside = grid(1.0);
        let mut fired = Vec::new();
        for f in 0..40 {
            if !system.tick(Frame(f), &inside).is_empty() {
                fired.push(f);
            }
        }
        assert_eq!(fired, vec![5, 15]);
        assert!(system.is_empty());
    }

    #[test]
    fn stays_armed_while_nobody_steps_in() {
        let mut system = TrapAreaSystem::default();
        system.add(AreaId(1), request(1));
        assert!(system.tick(Frame(6), &grid(9.0)).is_empty());
        assert_eq!(system.get(AreaId(1)).map(|t| t.triggers()), Some(0));
        assert_eq!(system.tick(Frame(7), &grid(0.0)).len(), 2);
        assert!(system.is_empty());
    }
}
