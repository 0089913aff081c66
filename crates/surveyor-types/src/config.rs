//! Engine configuration.
//!
//! `EngineConfig` represents the `config.toml` in the data directory and
//! controls rate limits, content bounds, cleanup intervals, and the two
//! named session policies. All fields have sensible defaults, so an empty
//! file (or no file) yields a working engine.

use serde::{Deserialize, Serialize};

use crate::identity::{Identity, Role};

/// Top-level configuration for the survey engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Identities granted the admin role.
    #[serde(default)]
    pub admin_ids: Vec<i64>,

    #[serde(default)]
    pub limits: ContentLimits,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    #[serde(default)]
    pub cleanup: CleanupConfig,

    /// What happens when a completed survey is started again.
    #[serde(default)]
    pub reentry_policy: ReentryPolicy,

    /// What happens when an already-answered question is answered again
    /// while the session is still in progress.
    #[serde(default)]
    pub reanswer_policy: ReanswerPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            admin_ids: Vec::new(),
            limits: ContentLimits::default(),
            rate_limit: RateLimitConfig::default(),
            cleanup: CleanupConfig::default(),
            reentry_policy: ReentryPolicy::default(),
            reanswer_policy: ReanswerPolicy::default(),
        }
    }
}

impl EngineConfig {
    /// Resolve the role of an identity against the admin list.
    pub fn role_of(&self, identity: Identity) -> Role {
        if self.admin_ids.contains(&identity.as_i64()) {
            Role::Admin
        } else {
            Role::User
        }
    }
}

/// Bounds on survey content and answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentLimits {
    #[serde(default = "default_min_title")]
    pub min_title_len: usize,
    #[serde(default = "default_max_title")]
    pub max_title_len: usize,
    #[serde(default = "default_min_description")]
    pub min_description_len: usize,
    #[serde(default = "default_max_description")]
    pub max_description_len: usize,
    #[serde(default = "default_min_questions")]
    pub min_questions: usize,
    #[serde(default = "default_max_questions")]
    pub max_questions: usize,
    #[serde(default = "default_max_surveys")]
    pub max_surveys: usize,
    #[serde(default = "default_max_answer")]
    pub max_answer_len: usize,
}

fn default_min_title() -> usize {
    3
}
fn default_max_title() -> usize {
    100
}
fn default_min_description() -> usize {
    10
}
fn default_max_description() -> usize {
    500
}
fn default_min_questions() -> usize {
    1
}
fn default_max_questions() -> usize {
    20
}
fn default_max_surveys() -> usize {
    10
}
fn default_max_answer() -> usize {
    1000
}

impl Default for ContentLimits {
    fn default() -> Self {
        Self {
            min_title_len: default_min_title(),
            max_title_len: default_max_title(),
            min_description_len: default_min_description(),
            max_description_len: default_max_description(),
            min_questions: default_min_questions(),
            max_questions: default_max_questions(),
            max_surveys: default_max_surveys(),
            max_answer_len: default_max_answer(),
        }
    }
}

/// Sliding-window admission budgets per role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_user_max_requests")]
    pub user_max_requests: usize,
    #[serde(default = "default_user_window_secs")]
    pub user_window_secs: u64,
    #[serde(default = "default_admin_max_requests")]
    pub admin_max_requests: usize,
    #[serde(default = "default_admin_window_secs")]
    pub admin_window_secs: u64,
    /// Idle windows older than this are evicted by the cleanup sweep.
    #[serde(default = "default_rate_limit_cleanup_secs")]
    pub cleanup_secs: u64,
}

fn default_user_max_requests() -> usize {
    5
}
fn default_user_window_secs() -> u64 {
    60
}
fn default_admin_max_requests() -> usize {
    20
}
fn default_admin_window_secs() -> u64 {
    60
}
fn default_rate_limit_cleanup_secs() -> u64 {
    3600
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            user_max_requests: default_user_max_requests(),
            user_window_secs: default_user_window_secs(),
            admin_max_requests: default_admin_max_requests(),
            admin_window_secs: default_admin_window_secs(),
            cleanup_secs: default_rate_limit_cleanup_secs(),
        }
    }
}

/// Background sweep intervals and retention windows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupConfig {
    /// Seconds between cleanup sweeps.
    #[serde(default = "default_cleanup_interval_secs")]
    pub interval_secs: u64,
    /// Export artifacts older than this many hours are deleted.
    #[serde(default = "default_export_retention_hours")]
    pub export_retention_hours: u64,
    /// In-progress sessions idle longer than this are marked abandoned.
    #[serde(default = "default_session_stale_secs")]
    pub session_stale_secs: u64,
    /// Completed or abandoned sessions idle longer than this are dropped
    /// from the in-memory table entirely.
    #[serde(default = "default_session_evict_secs")]
    pub session_evict_secs: u64,
}

fn default_cleanup_interval_secs() -> u64 {
    3600
}
fn default_export_retention_hours() -> u64 {
    24
}
fn default_session_stale_secs() -> u64 {
    86_400
}
fn default_session_evict_secs() -> u64 {
    604_800
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_cleanup_interval_secs(),
            export_retention_hours: default_export_retention_hours(),
            session_stale_secs: default_session_stale_secs(),
            session_evict_secs: default_session_evict_secs(),
        }
    }
}

/// Policy for starting a survey whose session is already completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReentryPolicy {
    /// Report "already completed"; keep the finished session.
    Reject,
    /// Discard the finished session and start over from question 0.
    Restart,
}

impl Default for ReentryPolicy {
    fn default() -> Self {
        ReentryPolicy::Reject
    }
}

/// Policy for re-answering an already-answered question mid-session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReanswerPolicy {
    /// Replace the prior value; the cursor does not move.
    Overwrite,
    /// Refuse; only the current question is answerable.
    Reject,
}

impl Default for ReanswerPolicy {
    fn default() -> Self {
        ReanswerPolicy::Overwrite
    }
}
