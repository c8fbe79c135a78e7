/// Engine configuration constants and tunable parameters.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EngineConfig {
    /// Simulated frames per second of logical time.
    pub fps: u32,

    /// Capacity of the compiled-expression cache before FIFO eviction.
    pub eval_cache_capacity: usize,

    /// Attribute path that damage requests subtract from.
    pub health_path: String,

    /// Edge length of one spatial grid cell (world units).
    pub spatial_cell_size: f64,

    /// Upper bound on follow-up intents carried into the next frame.
    ///
    /// Guards against pipelines that keep re-triggering each other.
    pub max_follow_up_intents: usize,
}

impl EngineConfig {
    // ===== compile-time constants =====
    pub const REFERENCE_FPS: u32 = 60;
    pub const DEFAULT_EVAL_CACHE_CAPACITY: usize = 6000;
    pub const DEFAULT_HEALTH_PATH: &'static str = "hp.current";
    pub const DEFAULT_SPATIAL_CELL_SIZE: f64 = 8.0;
    pub const DEFAULT_MAX_FOLLOW_UP_INTENTS: usize = 4096;

    pub fn new() -> Self {
        Self {
            fps: Self::REFERENCE_FPS,
            eval_cache_capacity: Self::DEFAULT_EVAL_CACHE_CAPACITY,
            health_path: Self::DEFAULT_HEALTH_PATH.to_string(),
            spatial_cell_size: Self::DEFAULT_SPATIAL_CELL_SIZE,
            max_follow_up_intents: Self::DEFAULT_MAX_FOLLOW_UP_INTENTS,
        }
    }

    pub fn with_fps(mut self, fps: u32) -> Self {
        self.fps = fps.max(1);
        self
    }

    pub fn with_eval_cache_capacity(mut self, capacity: usize) -> Self {
        self.eval_cache_capacity = capacity.max(1);
        self
    }

    pub fn with_health_path(mut self, path: impl Into<String>) -> Self {
        self.health_path = path.into();
        self
    }

    pub fn with_spatial_cell_size(mut self, size: f64) -> Self {
        if size > 0.0 {
            self.spatial_cell_size = size;
        }
        self
    }

    pub fn with_max_follow_up_intents(mut self, limit: usize) -> Self {
        self.max_follow_up_intents = limit;
        self
    }

    /// Duration of one frame in milliseconds of logical time.
    pub fn frame_millis(&self) -> f64 {
        1000.0 / f64::from(self.fps)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}
