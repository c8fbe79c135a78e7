//! Shared battle fixture for runtime integration tests.

use battle_core::{
    BattleData, DamageAreaSpec, FsmEvent, Intent, IntentPayload, MemberId, MemberKind, MemberSpec,
    RangeKind, SkillDefinition, Stage, StageKind, Vec3,
};
use battle_runtime::{Runtime, RuntimeConfig};

/// Two blue fighters against one red mob. `slash` spawns a short-lived
/// damage area around its target.
pub fn duel() -> BattleData {
    let burst = DamageAreaSpec {
        range_kind: RangeKind::Range,
        radius: 2.0,
        width: 0.0,
        speed: 0.0,
        direction: None,
        duration_frames: 4,
        hit_interval_frames: 2,
        expression: "self.atk - target.def".into(),
        attack_count: 1,
        damage_count: 1,
    };
    BattleData::new()
        .with_skill(
            SkillDefinition::new("slash")
                .with_frames("2", "1", "0", "2")
                .with_pipeline("slash"),
        )
        .with_pipeline(
            "slash",
            vec![Stage::new("burst", StageKind::SpawnDamageArea(burst))],
        )
        .with_member(
            MemberSpec::new(1, "blue", MemberKind::Player)
                .attribute("atk", 60.0)
                .attribute("hp.current", 400.0),
        )
        .with_member(
            MemberSpec::new(2, "blue", MemberKind::Player)
                .at(Vec3::new(1.0, 0.0, 0.0))
                .attribute("atk", 45.0)
                .attribute("hp.current", 350.0),
        )
        .with_member(
            MemberSpec::new(3, "red", MemberKind::Mob)
                .at(Vec3::new(4.0, 0.0, 0.0))
                .attribute("def", 15.0)
                .attribute("hp.current", 900.0),
        )
}

pub fn use_skill(actor: u32, skill: &str, target: u32) -> Intent {
    Intent::new(
        MemberId(actor),
        IntentPayload::SendFsmEvent {
            event: FsmEvent::UseSkill {
                skill_id: skill.into(),
                target: Some(MemberId(target)),
            },
        },
    )
}

/// Runtime that only advances on `Step` requests.
pub fn manual_runtime() -> Runtime {
    Runtime::start(RuntimeConfig::default().with_autoplay(false))
}
