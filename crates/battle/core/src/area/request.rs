//! Area definitions (as authored in pipelines) and the resolved requests
//! the area systems instantiate.

use crate::expr::Locals;
use crate::member::{BuffSpec, Camp};
use crate::types::{Frame, MemberId, Vec3};

/// Where a spawn happened, captured when the spawning stage runs.
#[derive(Clone, Debug, PartialEq)]
pub struct SpawnOrigin {
    pub caster: MemberId,
    pub camp: Camp,
    pub caster_position: Vec3,
    pub target: Option<MemberId>,
    pub target_position: Option<Vec3>,
    pub frame: Frame,
    pub source: String,
    /// Pipeline variables at spawn time, forwarded to damage expressions.
    pub vars: Locals,
}

impl SpawnOrigin {
    fn anchor_position(&self, anchor: AreaAnchor) -> Vec3 {
        match anchor {
            AreaAnchor::Caster => self.caster_position,
            AreaAnchor::Target => self.target_position.unwrap_or(self.caster_position),
        }
    }
}

/// How a damage area derives its shape and trajectory.
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RangeKind {
    /// Static circle at the cast position.
    Enemy,
    /// Static circle at the target position (cast position without one).
    Range,
    /// Circle of radius `width / 2` moving along `direction` at `speed`.
    MoveAttack,
    /// Radius-0 point at the target.
    None,
}

/// Which member an area is centered on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub enum AreaAnchor {
    Caster,
    #[default]
    Target,
}

/// Camps a buff area applies to, relative to its caster.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub enum AreaAffects {
    #[default]
    Allies,
    Enemies,
    All,
}

impl AreaAffects {
    pub fn includes(self, caster: &Camp, other: &Camp) -> bool {
        match self {
            AreaAffects::Allies => caster == other,
            AreaAffects::Enemies => caster.is_enemy_of(other),
            AreaAffects::All => true,
        }
    }
}

#[cfg(feature = "serde")]
fn one() -> u32 {
    1
}

#[cfg(feature = "serde")]
fn one_frame() -> u64 {
    1
}

// ============================================================================
// Authored definitions
// ============================================================================

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct DamageAreaSpec {
    pub range_kind: RangeKind,
    #[cfg_attr(feature = "serde", serde(default))]
    pub radius: f64,
    /// Swath width of a `MoveAttack` area.
    #[cfg_attr(feature = "serde", serde(default))]
    pub width: f64,
    /// Units per frame.
    #[cfg_attr(feature = "serde", serde(default))]
    pub speed: f64,
    /// Travel direction; defaults to caster → target, then +x.
    #[cfg_attr(feature = "serde", serde(default))]
    pub direction: Option<Vec3>,
    pub duration_frames: u64,
    #[cfg_attr(feature = "serde", serde(default = "one_frame"))]
    pub hit_interval_frames: u64,
    pub expression: String,
    #[cfg_attr(feature = "serde", serde(default = "one"))]
    pub attack_count: u32,
    #[cfg_attr(feature = "serde", serde(default = "one"))]
    pub damage_count: u32,
}

impl DamageAreaSpec {
    pub fn to_request(&self, origin: &SpawnOrigin) -> AreaRequest {
        let direction = self
            .direction
            .or_else(|| {
                origin
                    .target_position
                    .map(|target| target - origin.caster_position)
            })
            .map(Vec3::normalized)
            .filter(|d| *d != Vec3::ZERO)
            .unwrap_or(Vec3::new(1.0, 0.0, 0.0));

        AreaRequest::Damage(DamageAreaRequest {
            caster: origin.caster,
            camp: origin.camp.clone(),
            source: origin.source.clone(),
            start_frame: origin.frame,
            duration_frames: self.duration_frames,
            hit_interval_frames: self.hit_interval_frames,
            attack_count: self.attack_count,
            damage_count: self.damage_count,
            range_kind: self.range_kind,
            radius: self.radius,
            width: self.width,
            speed: self.speed,
            direction,
            expression: self.expression.clone(),
            cast_position: origin.caster_position,
            target_position: origin.target_position,
            vars: origin.vars.clone(),
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct BuffAreaSpec {
    pub radius: f64,
    pub duration_frames: u64,
    pub buff: BuffSpec,
    #[cfg_attr(feature = "serde", serde(default))]
    pub affects: AreaAffects,
    #[cfg_attr(feature = "serde", serde(default))]
    pub anchor: AreaAnchor,
}

impl BuffAreaSpec {
    pub fn to_request(&self, origin: &SpawnOrigin) -> AreaRequest {
        AreaRequest::Buff(BuffAreaRequest {
            caster: origin.caster,
            camp: origin.camp.clone(),
            source: origin.source.clone(),
            start_frame: origin.frame,
            duration_frames: self.duration_frames,
            center: origin.anchor_position(self.anchor),
            radius: self.radius,
            buff: self.buff.clone(),
            affects: self.affects,
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct TrapAreaSpec {
    pub radius: f64,
    pub duration_frames: u64,
    #[cfg_attr(feature = "serde", serde(default))]
    pub arm_delay_frames: u64,
    #[cfg_attr(feature = "serde", serde(default = "one_frame"))]
    pub rearm_frames: u64,
    /// Triggers before the trap is consumed; 0 for unlimited.
    #[cfg_attr(feature = "serde", serde(default = "one"))]
    pub max_triggers: u32,
    pub expression: String,
    #[cfg_attr(feature = "serde", serde(default = "one"))]
    pub attack_count: u32,
    #[cfg_attr(feature = "serde", serde(default = "one"))]
    pub damage_count: u32,
    #[cfg_attr(feature = "serde", serde(default))]
    pub anchor: AreaAnchor,
}

impl TrapAreaSpec {
    pub fn to_request(&self, origin: &SpawnOrigin) -> AreaRequest {
        AreaRequest::Trap(TrapAreaRequest {
            caster: origin.caster,
            camp: origin.camp.clone(),
            source: origin.source.clone(),
            start_frame: origin.frame,
            duration_frames: self.duration_frames,
            arm_delay_frames: self.arm_delay_frames,
            rearm_frames: self.rearm_frames,
            max_triggers: self.max_triggers,
            center: origin.anchor_position(self.anchor),
            radius: self.radius,
            expression: self.expression.clone(),
            attack_count: self.attack_count,
            damage_count: self.damage_count,
            vars: origin.vars.clone(),
        })
    }
}

// ============================================================================
// Resolved requests
// ============================================================================

#[derive(Clone, Debug, PartialEq)]
pub struct DamageAreaRequest {
    pub caster: MemberId,
    pub camp: Camp,
    pub source: String,
    pub start_frame: Frame,
    pub duration_frames: u64,
    pub hit_interval_frames: u64,
    pub attack_count: u32,
    pub damage_count: u32,
    pub range_kind: RangeKind,
    pub radius: f64,
    pub width: f64,
    pub speed: f64,
    pub direction: Vec3,
    /// Canonical compiled form once the world has accepted the request.
    pub expression: String,
    pub cast_position: Vec3,
    pub target_position: Option<Vec3>,
    pub vars: Locals,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BuffAreaRequest {
    pub caster: MemberId,
    pub camp: Camp,
    pub source: String,
    pub start_frame: Frame,
    pub duration_frames: u64,
    pub center: Vec3,
    pub radius: f64,
    pub buff: BuffSpec,
    pub affects: AreaAffects,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TrapAreaRequest {
    pub caster: MemberId,
    pub camp: Camp,
    pub source: String,
    pub start_frame: Frame,
    pub duration_frames: u64,
    pub arm_delay_frames: u64,
    pub rearm_frames: u64,
    pub max_triggers: u32,
    pub center: Vec3,
    pub radius: f64,
    pub expression: String,
    pub attack_count: u32,
    pub damage_count: u32,
    pub vars: Locals,
}

#[derive(Clone, Debug, PartialEq)]
pub enum AreaRequest {
    Damage(DamageAreaRequest),
    Buff(BuffAreaRequest),
    Trap(TrapAreaRequest),
}

impl AreaRequest {
    pub fn kind(&self) -> &'static str {
        match self {
            AreaRequest::Damage(_) => "damage",
            AreaRequest::Buff(_) => "buff",
            AreaRequest::Trap(_) => "trap",
        }
    }

    pub fn source(&self) -> &str {
        match self {
            AreaRequest::Damage(r) => &r.source,
            AreaRequest::Buff(r) => &r.source,
            AreaRequest::Trap(r) => &r.source,
        }
    }

    /// Damage expression, for areas that carry one.
    pub fn expression_mut(&mut self) -> Option<&mut String> {
        match self {
            AreaRequest::Damage(r) => Some(&mut r.expression),
            AreaRequest::Trap(r) => Some(&mut r.expression),
            AreaRequest::Buff(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin(target: Option<Vec3>) -> SpawnOrigin {
        SpawnOrigin {
            caster: MemberId(1),
            camp: Camp::from("blue"),
            caster_position: Vec3::new(1.0, 0.0, 1.0),
            target: target.map(|_| MemberId(2)),
            target_position: target,
            frame: Frame(12),
            source: "skill:test".into(),
            vars: Locals::new(),
        }
    }

    fn move_attack(direction: Option<Vec3>) -> DamageAreaSpec {
        DamageAreaSpec {
            range_kind: RangeKind::MoveAttack,
            radius: 0.0,
            width: 2.0,
            speed: 1.0,
            direction,
            duration_frames: 10,
            hit_interval_frames: 1,
            expression: "10".into(),
            attack_count: 1,
            damage_count: 1,
        }
    }

    #[test]
    fn direction_defaults_toward_target_then_x() {
        let AreaRequest::Damage(aimed) =
            move_attack(None).to_request(&origin(Some(Vec3::new(1.0, 0.0, 5.0))))
        else {
            panic!("expected a damage request");
        };
        assert_eq!(aimed.direction, Vec3::new(0.0, 0.0, 1.0));
        assert_eq!(aimed.start_frame, Frame(12));

        let AreaRequest::Damage(blind) = move_attack(None).to_request(&origin(None)) else {
            panic!("expected a damage request");
        };
        assert_eq!(blind.direction, Vec3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn anchors_fall_back_to_caster() {
        let spec = TrapAreaSpec {
            radius: 1.0,
            duration_frames: 60,
            arm_delay_frames: 0,
            rearm_frames: 1,
            max_triggers: 1,
            expression: "5".into(),
            attack_count: 1,
            damage_count: 1,
            anchor: AreaAnchor::Target,
        };
        let AreaRequest::Trap(trap) = spec.to_request(&origin(None)) else {
            panic!("expected a trap request");
        };
        assert_eq!(trap.center, Vec3::new(1.0, 0.0, 1.0));
    }
}
