//! Runtime settings.
//!
//! Defaults suit an interactive host; [`RuntimeConfig::from_env`] lets a
//! deployment override them without recompiling.

use std::str::FromStr;

use battle_core::EngineConfig;

use crate::api::{Result, RuntimeError};

/// Runtime configuration shared across the orchestrator and workers.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeConfig {
    pub engine: EngineConfig,
    pub command_buffer_size: usize,
    /// Capacity of each event bus topic.
    pub event_buffer_size: usize,
    /// Advance frames on a wall-clock interval while running. When off,
    /// frames only advance through `Step` requests.
    pub autoplay: bool,
}

impl RuntimeConfig {
    pub const ENV_FPS: &'static str = "BATTLE_FPS";
    pub const ENV_COMMAND_BUFFER: &'static str = "BATTLE_COMMAND_BUFFER";
    pub const ENV_EVENT_BUFFER: &'static str = "BATTLE_EVENT_BUFFER";
    pub const ENV_AUTOPLAY: &'static str = "BATTLE_AUTOPLAY";
    pub const ENV_EVAL_CACHE: &'static str = "BATTLE_EVAL_CACHE";

    /// Defaults overridden by any `BATTLE_*` variable that is set.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an explicit variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(fps) = parse::<u32>(&lookup, Self::ENV_FPS)? {
            config.engine = config.engine.with_fps(fps);
        }
        if let Some(capacity) = parse::<usize>(&lookup, Self::ENV_EVAL_CACHE)? {
            config.engine = config.engine.with_eval_cache_capacity(capacity);
        }
        if let Some(size) = parse::<usize>(&lookup, Self::ENV_COMMAND_BUFFER)? {
            config.command_buffer_size = size.max(1);
        }
        if let Some(size) = parse::<usize>(&lookup, Self::ENV_EVENT_BUFFER)? {
            config.event_buffer_size = size.max(1);
        }
        if let Some(value) = lookup(Self::ENV_AUTOPLAY) {
            config.autoplay = parse_flag(Self::ENV_AUTOPLAY, &value)?;
        }
        Ok(config)
    }

    pub fn with_engine(mut self, engine: EngineConfig) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_autoplay(mut self, autoplay: bool) -> Self {
        self.autoplay = autoplay;
        self
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            command_buffer_size: 32,
            event_buffer_size: 256,
            autoplay: true,
        }
    }
}

fn parse<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &'static str) -> Result<Option<T>> {
    lookup(key)
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|_| RuntimeError::InvalidConfig {
                key,
                value: raw.clone(),
            })
        })
        .transpose()
}

fn parse_flag(key: &'static str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(RuntimeError::InvalidConfig {
            key,
            value: raw.to_string(),
        }),
    }
}
