//! Damage zones: lifetime, trajectory, spatial hit detection and per-target
//! hit throttling.

use std::collections::BTreeMap;

use super::request::{DamageAreaRequest, RangeKind};
use super::spatial::SpatialGrid;
use super::{AreaId, damage_intent};
use crate::expr::Value;
use crate::intent::Intent;
use crate::types::{Frame, MemberId, Vec3};

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Trajectory {
    Static(Vec3),
    Linear {
        start: Vec3,
        direction: Vec3,
        speed: f64,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct DamageAreaInstance {
    pub id: AreaId,
    pub request: DamageAreaRequest,
    pub radius: f64,
    pub trajectory: Trajectory,
    last_hit: BTreeMap<MemberId, Frame>,
}

impl DamageAreaInstance {
    pub fn new(id: AreaId, request: DamageAreaRequest) -> Self {
        let target_or_cast = request.target_position.unwrap_or(request.cast_position);
        let (radius, trajectory) = match request.range_kind {
            RangeKind::Enemy => (request.radius, Trajectory::Static(request.cast_position)),
            RangeKind::Range => (request.radius, Trajectory::Static(target_or_cast)),
            RangeKind::MoveAttack => (
                request.width / 2.0,
                Trajectory::Linear {
                    start: request.cast_position,
                    direction: request.direction,
                    speed: request.speed,
                },
            ),
            RangeKind::None => (0.0, Trajectory::Static(target_or_cast)),
        };
        Self {
            id,
            request,
            radius,
            trajectory,
            last_hit: BTreeMap::new(),
        }
    }

    pub fn center(&self, frame: Frame) -> Vec3 {
        match self.trajectory {
            Trajectory::Static(center) => center,
            Trajectory::Linear {
                start,
                direction,
                speed,
            } => {
                let elapsed = frame.since(self.request.start_frame) as f64;
                start + direction.scale(speed * elapsed)
            }
        }
    }

    pub fn is_expired(&self, frame: Frame) -> bool {
        frame >= self.request.start_frame + self.request.duration_frames
    }

    pub fn last_hit(&self, target: MemberId) -> Option<Frame> {
        self.last_hit.get(&target).copied()
    }

    fn can_hit(&self, target: MemberId, frame: Frame) -> bool {
        let interval = self.request.hit_interval_frames.max(1);
        self.last_hit(target)
            .is_none_or(|last| frame.since(last) >= interval)
    }
}

#[derive(Clone, Debug, Default)]
pub struct DamageAreaSystem {
    instances: BTreeMap<AreaId, DamageAreaInstance>,
}

impl DamageAreaSystem {
    pub fn add(&mut self, id: AreaId, request: DamageAreaRequest) {
        self.instances.insert(id, DamageAreaInstance::new(id, request));
    }

    pub fn remove(&mut self, id: AreaId) -> bool {
        self.instances.remove(&id).is_some()
    }

    pub fn remove_by_source(&mut self, source: &str) -> usize {
        let before = self.instances.len();
        self.instances.retain(|_, area| area.request.source != source);
        before - self.instances.len()
    }

    pub fn get(&self, id: AreaId) -> Option<&DamageAreaInstance> {
        self.instances.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DamageAreaInstance> {
        self.instances.values()
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn tick(&mut self, frame: Frame, grid: &SpatialGrid) -> Vec<Intent> {
        self.instances.retain(|id, area| {
            let keep = !area.is_expired(frame);
            if !keep {
                tracing::debug!(target: "battle::area", area = %id, "damage area expired");
            }
            keep
        });

        let mut intents = Vec::new();
        for area in self.instances.values_mut() {
            let center = area.center(frame);
            let hits: Vec<(MemberId, f64)> = grid
                .query(center, area.radius)
                .into_iter()
                .filter(|entry| area.request.camp.is_enemy_of(&entry.camp))
                .filter(|entry| area.can_hit(entry.id, frame))
                .map(|entry| (entry.id, entry.position.planar_distance(center)))
                .collect();

            let target_count = hits.len() as f64;
            for (target, distance) in hits {
                area.last_hit.insert(target, frame);
                let mut vars = area.request.vars.clone();
                vars.insert("distance".into(), Value::Number(distance));
                vars.insert("targetCount".into(), Value::Number(target_count));
                intents.push(damage_intent(
                    area.request.caster,
                    target,
                    &area.request.source,
                    &area.request.expression,
                    area.request.attack_count,
                    area.request.damage_count,
                    vars,
                ));
            }
        }
        intents
    }
}
