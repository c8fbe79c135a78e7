/// Action phase of a member, derived from the action clock.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, strum::Display, strum::AsRefStr,
)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[strum(serialize_all = "snake_case")]
pub enum MemberState {
    #[default]
    Free,
    Startup,
    Chanting,
    Charging,
    Channeling,
    Recovery,
}

impl MemberState {
    /// Startup and the cast window; the phases damage can interrupt.
    pub fn is_casting(self) -> bool {
        matches!(
            self,
            MemberState::Startup
                | MemberState::Chanting
                | MemberState::Charging
                | MemberState::Channeling
        )
    }
}

/// Frame thresholds of one skill use, resolved when the action starts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SkillTiming {
    pub startup: u64,
    pub chanting: u64,
    pub charging: u64,
    pub recovery: u64,
}

impl SkillTiming {
    pub fn new(startup: u64, chanting: u64, charging: u64, recovery: u64) -> Self {
        Self {
            startup,
            chanting,
            charging,
            recovery,
        }
    }

    /// End of the cast window (first recovery frame).
    pub fn cast_end(&self) -> u64 {
        self.startup
            .saturating_add(self.chanting)
            .saturating_add(self.charging)
    }

    pub fn duration(&self) -> u64 {
        self.cast_end().saturating_add(self.recovery)
    }
}

/// Pure phase derivation from the action frame index.
///
/// ```text
/// [0, startup)                      Startup
/// [startup, startup + cast)         Chanting | Charging | Channeling
/// [cast_end, duration)              Recovery
/// [duration, ..)                    Free
/// ```
///
/// The cast window is `Chanting` when only chanting frames exist,
/// `Charging` when only charging frames exist and `Channeling` (spanning
/// both) when there are both.
pub fn derive_state(action_frame_index: u64, timing: &SkillTiming) -> MemberState {
    if action_frame_index < timing.startup {
        return MemberState::Startup;
    }
    if action_frame_index < timing.cast_end() {
        return match (timing.chanting > 0, timing.charging > 0) {
            (true, true) => MemberState::Channeling,
            (true, false) => MemberState::Chanting,
            _ => MemberState::Charging,
        };
    }
    if action_frame_index < timing.duration() {
        return MemberState::Recovery;
    }
    MemberState::Free
}

#[cfg(test)]
mod tests {
    use super::*;

    fn states(timing: SkillTiming) -> Vec<MemberState> {
        (0..=timing.duration())
            .map(|i| derive_state(i, &timing))
            .collect()
    }

    #[test]
    fn chanting_only() {
        use MemberState::*;
        assert_eq!(
            states(SkillTiming::new(2, 2, 0, 1)),
            vec![Startup, Startup, Chanting, Chanting, Recovery, Free]
        );
    }

    #[test]
    fn oversized_timing_saturates() {
        let timing = SkillTiming::new(u64::MAX, 3, 0, u64::MAX);
        assert_eq!(timing.duration(), u64::MAX);
        assert_eq!(derive_state(u64::MAX - 1, &timing), MemberState::Startup);
        assert_eq!(derive_state(u64::MAX, &timing), MemberState::Free);
    }

    #[test]
    fn charging_only() {
        use MemberState::*;
        assert_eq!(
            states(SkillTiming::new(1, 0, 2, 1)),
            vec![Startup, Charging, Charging, Recovery, Free]
        );
    }

    #[test]
    fn both_become_one_channeling_window() {
        use MemberState::*;
        assert_eq!(
            states(SkillTiming::new(1, 1, 2, 0)),
            vec![Startup, Channeling, Channeling, Channeling, Free]
        );
    }

    #[test]
    fn no_cast_window_goes_straight_to_recovery() {
        use MemberState::*;
        assert_eq!(
            states(SkillTiming::new(2, 0, 0, 2)),
            vec![Startup, Startup, Recovery, Recovery, Free]
        );
        assert_eq!(states(SkillTiming::default()), vec![Free]);
    }
}
