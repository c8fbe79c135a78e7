//! Aura zones that hold a buff on every affected member standing inside.
//!
//! Occupancy is edge-triggered: entering the circle sends one `addBuff`,
//! leaving it (or the area ending) sends one `removeBuff`. Removal is scoped
//! to the area's source. When another live area granting the same buff id
//! still holds the member, that area re-grants it instead.

use std::collections::{BTreeMap, BTreeSet};

use super::AreaId;
use super::request::BuffAreaRequest;
use super::spatial::SpatialGrid;
use crate::intent::{Intent, IntentPayload};
use crate::types::{Frame, MemberId};

#[derive(Clone, Debug, PartialEq)]
pub struct BuffAreaInstance {
    pub id: AreaId,
    pub request: BuffAreaRequest,
    occupants: BTreeSet<MemberId>,
}

impl BuffAreaInstance {
    pub fn occupants(&self) -> impl Iterator<Item = MemberId> + '_ {
        self.occupants.iter().copied()
    }

    pub fn is_expired(&self, frame: Frame) -> bool {
        frame >= self.request.start_frame + self.request.duration_frames
    }

    fn enter(&self, member: MemberId) -> Intent {
        Intent::new(
            self.request.caster,
            IntentPayload::AddBuff {
                buff: self.request.buff.clone(),
            },
        )
        .with_target(Some(member))
        .with_source(self.request.source.clone())
    }

    fn exit(&self, member: MemberId) -> Intent {
        Intent::new(
            self.request.caster,
            IntentPayload::RemoveBuff {
                buff_id: self.request.buff.id.clone(),
                granted_by: Some(self.request.source.clone()),
            },
        )
        .with_target(Some(member))
        .with_source(self.request.source.clone())
    }

    fn holds(&self, buff_id: &str, member: MemberId) -> bool {
        self.request.buff.id == buff_id && self.occupants.contains(&member)
    }
}

#[derive(Clone, Debug, Default)]
pub struct BuffAreaSystem {
    instances: BTreeMap<AreaId, BuffAreaInstance>,
    /// Exit intents of areas removed between ticks.
    pending: Vec<Intent>,
}

impl BuffAreaSystem {
    pub fn add(&mut self, id: AreaId, request: BuffAreaRequest) {
        self.instances.insert(
            id,
            BuffAreaInstance {
                id,
                request,
                occupants: BTreeSet::new(),
            },
        );
    }

    pub fn remove(&mut self, id: AreaId) -> bool {
        match self.instances.remove(&id) {
            Some(area) => {
                let released = self.release_all(area);
                self.pending.extend(released);
                true
            }
            None => false,
        }
    }

    pub fn remove_by_source(&mut self, source: &str) -> usize {
        let ids: Vec<AreaId> = self
            .instances
            .values()
            .filter(|area| area.request.source == source)
            .map(|area| area.id)
            .collect();
        ids.into_iter().filter(|&id| self.remove(id)).count()
    }

    pub fn get(&self, id: AreaId) -> Option<&BuffAreaInstance> {
        self.instances.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &BuffAreaInstance> {
        self.instances.values()
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn tick(&mut self, frame: Frame, grid: &SpatialGrid) -> Vec<Intent> {
        let mut intents = std::mem::take(&mut self.pending);

        let expired: Vec<AreaId> = self
            .instances
            .values()
            .filter(|area| area.is_expired(frame))
            .map(|area| area.id)
            .collect();
        for id in expired {
            if let Some(area) = self.instances.remove(&id) {
                tracing::debug!(target: "battle::area", area = %id, "buff area expired");
                intents.extend(self.release_all(area));
            }
        }

        let ids: Vec<AreaId> = self.instances.keys().copied().collect();
        for id in ids {
            let Some(area) = self.instances.get_mut(&id) else {
                continue;
            };
            let inside: Vec<MemberId> = grid
                .query(area.request.center, area.request.radius)
                .into_iter()
                .filter(|entry| area.request.affects.includes(&area.request.camp, &entry.camp))
                .map(|entry| entry.id)
                .collect();

            for &member in &inside {
                if area.occupants.insert(member) {
                    intents.push(area.enter(member));
                }
            }
            let left: Vec<MemberId> = area
                .occupants
                .iter()
                .copied()
                .filter(|member| !inside.contains(member))
                .collect();
            for member in &left {
                area.occupants.remove(member);
            }
            if let Some(area) = self.instances.get(&id) {
                intents.extend(left.into_iter().map(|member| self.release(area, member)));
            }
        }
        intents
    }

    /// Exit intent for `member` leaving `area`, or a re-grant from another
    /// area that still holds it under the same buff id.
    fn release(&self, area: &BuffAreaInstance, member: MemberId) -> Intent {
        let buff_id = area.request.buff.id.as_str();
        self.instances
            .values()
            .find(|other| other.id != area.id && other.holds(buff_id, member))
            .map_or_else(|| area.exit(member), |other| other.enter(member))
    }

    fn release_all(&self, area: BuffAreaInstance) -> Vec<Intent> {
        area.occupants
            .iter()
            .map(|&member| self.release(&area, member))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::area::AreaAffects;
    use crate::member::{BuffSpec, Camp, MemberKind, MemberRegistry, MemberSpec};
    use crate::types::Vec3;

    fn request() -> BuffAreaRequest {
        BuffAreaRequest {
            caster: MemberId(1),
            camp: Camp::from("blue"),
            source: "skill:aura".into(),
            start_frame: Frame(0),
            duration_frames: 30,
            center: Vec3::ZERO,
            radius: 2.0,
            buff: BuffSpec::new("blessed"),
            affects: AreaAffects::Allies,
        }
    }

    fn grid(ally_x: f64) -> SpatialGrid {
        let mut registry = MemberRegistry::new();
        registry.insert_spec(&MemberSpec::new(1, "blue", MemberKind::Player));
        registry.insert_spec(&MemberSpec::new(2, "blue", MemberKind::Player).at(Vec3::new(ally_x, 0.0, 0.0)));
        registry.insert_spec(&MemberSpec::new(3, "red", MemberKind::Mob).at(Vec3::new(1.0, 0.0, 0.0)));
        SpatialGrid::from_registry(&registry, 4.0)
    }

    fn summary(intents: &[Intent]) -> Vec<(&'static str, u32)> {
        intents
            .iter()
            .map(|i| (i.kind(), i.subject().0))
            .collect()
    }

    #[test]
    fn enter_and_exit_are_edge_triggered() {
        let mut system = BuffAreaSystem::default();
        system.add(AreaId(1), request());

        assert_eq!(
            summary(&system.tick(Frame(0), &grid(1.0))),
            vec![("addBuff", 1), ("addBuff", 2)]
        );
        assert!(system.tick(Frame(1), &grid(1.0)).is_empty());
        assert_eq!(summary(&system.tick(Frame(2), &grid(5.0))), vec![("removeBuff", 2)]);
        assert_eq!(summary(&system.tick(Frame(3), &grid(0.0))), vec![("addBuff", 2)]);
    }

    #[test]
    fn expiry_and_removal_release_occupants() {
        let mut system = BuffAreaSystem::default();
        system.add(AreaId(1), request());
        system.tick(Frame(0), &grid(1.0));
        assert_eq!(
            summary(&system.tick(Frame(30), &grid(1.0))),
            vec![("removeBuff", 1), ("removeBuff", 2)]
        );
        assert!(system.is_empty());

        let mut late = request();
        late.start_frame = Frame(31);
        system.add(AreaId(2), late);
        system.tick(Frame(31), &grid(1.0));
        assert_eq!(system.remove_by_source("skill:aura"), 1);
        assert_eq!(summary(&system.tick(Frame(32), &grid(1.0))).len(), 2);
    }

    #[test]
    fn overlapping_areas_hand_the_buff_over() {
        let mut system = BuffAreaSystem::default();
        system.add(AreaId(1), request());
        let mut second = request();
        second.source = "skill:chant".into();
        second.center = Vec3::new(4.0, 0.0, 0.0);
        system.add(AreaId(2), second);

        assert_eq!(
            summary(&system.tick(Frame(0), &grid(2.0))),
            vec![("addBuff", 1), ("addBuff", 2), ("addBuff", 2)]
        );

        let handed = system.tick(Frame(1), &grid(5.0));
        assert_eq!(summary(&handed), vec![("addBuff", 2)]);
        assert_eq!(handed[0].source, "skill:chant");

        let left = system.tick(Frame(2), &grid(7.0));
        assert_eq!(summary(&left), vec![("removeBuff", 2)]);
        assert!(matches!(
            &left[0].payload,
            IntentPayload::RemoveBuff { granted_by: Some(source), .. } if source == "skill:chant"
        ));
    }

    #[test]
    fn permanent_area_never_expires() {
        let mut system = BuffAreaSystem::default();
        let mut forever = request();
        forever.start_frame = Frame(5);
        forever.duration_frames = u64::MAX;
        system.add(AreaId(1), forever);

        assert_eq!(summary(&system.tick(Frame(6), &grid(1.0))).len(), 2);
        assert!(system.tick(Frame(u64::MAX - 1), &grid(1.0)).is_empty());
        assert_eq!(system.len(), 1);
    }
}
