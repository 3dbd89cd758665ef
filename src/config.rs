//! Agent configuration parsed from environment variables.
//!
//! Every knob has a compiled-in default so the agent runs with an empty
//! environment; tests build configs with `AgentConfig::default()`.

pub const DEFAULT_WORLD_WIDTH: f64 = 5000.0;
pub const DEFAULT_WORLD_HEIGHT: f64 = 5000.0;
pub const DEFAULT_VIEWPORT_WIDTH: f64 = 1200.0;
pub const DEFAULT_VIEWPORT_HEIGHT: f64 = 800.0;
pub const DEFAULT_MIN_OBJECT_SIZE: f64 = 10.0;
pub const DEFAULT_QUEUE_DISPLAY_DELAY_MS: u64 = 1500;
pub const DEFAULT_LLM_CALL_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_LLM_RETRY_BACKOFF_MS: u64 = 500;
pub const DEFAULT_RECENT_MESSAGE_WINDOW: usize = 20;
pub const DEFAULT_PLAN_OBJECT_LIMIT: usize = 100;
pub const DEFAULT_GUARD_DELETE_LIMIT: usize = 3;
pub const DEFAULT_GUARD_RESIZE_FACTOR: f64 = 3.0;
pub const DEFAULT_AI_MAX_TOKENS: u32 = 1024;

pub const DEFAULT_RECT_WIDTH: f64 = 120.0;
pub const DEFAULT_RECT_HEIGHT: f64 = 80.0;
pub const DEFAULT_CIRCLE_RADIUS: f64 = 50.0;
pub const DEFAULT_FONT_SIZE: f64 = 16.0;
pub const DEFAULT_SPACING: f64 = 20.0;
pub const DEFAULT_FILL: &str = "#3B82F6";
pub const DEFAULT_TEXT_FILL: &str = "#111827";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgentConfig {
    /// Width of the world coordinate space.
    pub world_width: f64,
    /// Height of the world coordinate space.
    pub world_height: f64,
    /// Client viewport width in screen pixels (before zoom).
    pub viewport_width: f64,
    /// Client viewport height in screen pixels (before zoom).
    pub viewport_height: f64,
    /// Smallest width/height any shape may have.
    pub min_object_size: f64,
    /// How long a terminal queue record stays visible before deletion.
    pub queue_display_delay_ms: u64,
    /// Upper bound on a single completion call.
    pub llm_call_timeout_secs: u64,
    /// Fixed backoff before the single retry of a transient failure.
    pub llm_retry_backoff_ms: u64,
    /// Number of chat messages kept per canvas for prompt context.
    pub recent_message_window: usize,
    /// Maximum objects serialized into a planner prompt.
    pub plan_object_limit: usize,
    /// Deletes above this many targets require confirmation.
    pub guard_delete_limit: usize,
    /// Resizes growing a side beyond this factor require confirmation.
    pub guard_resize_factor: f64,
    /// Token ceiling for each completion call.
    pub ai_max_tokens: u32,
}

impl AgentConfig {
    /// Build the config from environment variables, falling back to defaults
    /// for anything missing or unparseable.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            world_width: env_parse("WORLD_WIDTH", defaults.world_width),
            world_height: env_parse("WORLD_HEIGHT", defaults.world_height),
            viewport_width: env_parse("VIEWPORT_WIDTH", defaults.viewport_width),
            viewport_height: env_parse("VIEWPORT_HEIGHT", defaults.viewport_height),
            min_object_size: env_parse("MIN_OBJECT_SIZE", defaults.min_object_size),
            queue_display_delay_ms: env_parse("QUEUE_DISPLAY_DELAY_MS", defaults.queue_display_delay_ms),
            llm_call_timeout_secs: env_parse("LLM_CALL_TIMEOUT_SECS", defaults.llm_call_timeout_secs),
            llm_retry_backoff_ms: env_parse("LLM_RETRY_BACKOFF_MS", defaults.llm_retry_backoff_ms),
            recent_message_window: env_parse("RECENT_MESSAGE_WINDOW", defaults.recent_message_window),
            plan_object_limit: env_parse("PLAN_OBJECT_LIMIT", defaults.plan_object_limit),
            guard_delete_limit: env_parse("GUARD_DELETE_LIMIT", defaults.guard_delete_limit),
            guard_resize_factor: env_parse("GUARD_RESIZE_FACTOR", defaults.guard_resize_factor),
            ai_max_tokens: env_parse("AI_MAX_TOKENS", defaults.ai_max_tokens),
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            world_width: DEFAULT_WORLD_WIDTH,
            world_height: DEFAULT_WORLD_HEIGHT,
            viewport_width: DEFAULT_VIEWPORT_WIDTH,
            viewport_height: DEFAULT_VIEWPORT_HEIGHT,
            min_object_size: DEFAULT_MIN_OBJECT_SIZE,
            queue_display_delay_ms: DEFAULT_QUEUE_DISPLAY_DELAY_MS,
            llm_call_timeout_secs: DEFAULT_LLM_CALL_TIMEOUT_SECS,
            llm_retry_backoff_ms: DEFAULT_LLM_RETRY_BACKOFF_MS,
            recent_message_window: DEFAULT_RECENT_MESSAGE_WINDOW,
            plan_object_limit: DEFAULT_PLAN_OBJECT_LIMIT,
            guard_delete_limit: DEFAULT_GUARD_DELETE_LIMIT,
            guard_resize_factor: DEFAULT_GUARD_RESIZE_FACTOR,
            ai_max_tokens: DEFAULT_AI_MAX_TOKENS,
        }
    }
}

/// Parse a comma- or whitespace-separated list of canvas ids. Returns the
/// valid ids and the entries that failed to parse.
#[must_use]
pub fn parse_canvas_ids(raw: &str) -> (Vec<uuid::Uuid>, Vec<String>) {
    let mut ids = Vec::new();
    let mut invalid = Vec::new();
    for entry in raw.split(|c: char| c == ',' || c.is_whitespace()).filter(|e| !e.is_empty()) {
        match entry.parse::<uuid::Uuid>() {
            Ok(id) if !ids.contains(&id) => ids.push(id),
            Ok(_) => {}
            Err(_) => invalid.push(entry.to_string()),
        }
    }
    (ids, invalid)
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
