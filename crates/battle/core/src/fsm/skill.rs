use std::collections::BTreeMap;

/// Static description of a skill.
///
/// Frame counts are expressions evaluated with the caster as `self` when
/// the action starts, so speed stats can shorten them
/// (`"30 - self.speed.cast / 10"`). Results are clamped at zero.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct SkillDefinition {
    pub id: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub name: String,
    #[cfg_attr(feature = "serde", serde(default = "zero_frames"))]
    pub startup_frames: String,
    #[cfg_attr(feature = "serde", serde(default = "zero_frames"))]
    pub chanting_frames: String,
    #[cfg_attr(feature = "serde", serde(default = "zero_frames"))]
    pub charging_frames: String,
    #[cfg_attr(feature = "serde", serde(default = "zero_frames"))]
    pub recovery_frames: String,
    /// Damage never interrupts this skill.
    #[cfg_attr(feature = "serde", serde(default))]
    pub uninterruptible: bool,
    /// Pipeline run when the action enters startup.
    #[cfg_attr(feature = "serde", serde(default))]
    pub start_pipeline: Option<String>,
    /// Effect pipeline run when the cast window closes.
    #[cfg_attr(feature = "serde", serde(default))]
    pub pipeline: Option<String>,
}

#[cfg(feature = "serde")]
fn zero_frames() -> String {
    "0".to_string()
}

impl SkillDefinition {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            startup_frames: "0".into(),
            chanting_frames: "0".into(),
            charging_frames: "0".into(),
            recovery_frames: "0".into(),
            uninterruptible: false,
            start_pipeline: None,
            pipeline: None,
        }
    }

    pub fn with_frames(
        mut self,
        startup: impl Into<String>,
        chanting: impl Into<String>,
        charging: impl Into<String>,
        recovery: impl Into<String>,
    ) -> Self {
        self.startup_frames = startup.into();
        self.chanting_frames = chanting.into();
        self.charging_frames = charging.into();
        self.recovery_frames = recovery.into();
        self
    }

    pub fn with_pipeline(mut self, pipeline: impl Into<String>) -> Self {
        self.pipeline = Some(pipeline.into());
        self
    }

    pub fn with_start_pipeline(mut self, pipeline: impl Into<String>) -> Self {
        self.start_pipeline = Some(pipeline.into());
        self
    }

    pub fn uninterruptible(mut self) -> Self {
        self.uninterruptible = true;
        self
    }
}

/// Skills known to a battle, keyed by id.
pub type SkillBook = BTreeMap<String, SkillDefinition>;
