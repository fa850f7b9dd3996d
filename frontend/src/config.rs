use log::Level;

use crate::fomo::identity::{NamePool, PURCHASE_POOL, TESTIMONIAL_POOL};

#[cfg(debug_assertions)]
pub fn log_level() -> Level {
    Level::Debug
}

#[cfg(not(debug_assertions))]
pub fn log_level() -> Level {
    Level::Info
}

/// Pepper for the storage obfuscation key, baked in at build time.
pub fn fomo_pepper() -> &'static str {
    option_env!("FOMO_SECRET").unwrap_or("eds-default-fomo-secret")
}

const DAY_MS: i64 = 1000 * 60 * 60 * 24;

/// Persistence and expiry of one seen-set.
#[derive(Debug, Clone, PartialEq)]
pub struct DimensionConfig {
    pub storage_key: &'static str,
    pub ttl_ms: i64,
    pub max_size: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleConfig {
    /// Delay before the first event. `None` uses a steady-state delay.
    pub cold_start_ms: Option<u32>,
    pub desktop_range_ms: (u32, u32),
    pub mobile_range_ms: (u32, u32),
}

/// How the persisted seen-sets constrain new identities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeenPolicy {
    /// Seen names and avatars are rejected until they expire.
    Ban,
    /// Seen names only steer the name generator; only on-screen and recent
    /// keys are rejected.
    Steer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedKind {
    Purchases,
    Testimonials,
}

#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub kind: FeedKind,
    pub pool: NamePool,
    pub names: DimensionConfig,
    pub avatars: DimensionConfig,
    pub gender_cache_key: &'static str,
    pub channel: &'static str,
    pub seen_policy: SeenPolicy,
    pub max_visible: usize,
    pub auto_dismiss_ms: Option<u32>,
    pub recent_names: usize,
    pub recent_avatars: usize,
    /// Whole identities tried per tick before giving up.
    pub attempts: usize,
    pub schedule: ScheduleConfig,
    /// How far back `created_at` is pushed, in seconds.
    pub backdate_secs: Option<(u32, u32)>,
    pub seed_on_hydrate: bool,
    pub id_prefix: &'static str,
}

pub const MOBILE_QUERY: &str = "(max-width: 640px)";
const GENDER_CACHE_KEY: &str = "eds_fomo_gender_overrides_v1";

impl FeedConfig {
    pub fn purchase_toasts() -> Self {
        Self {
            kind: FeedKind::Purchases,
            pool: PURCHASE_POOL,
            names: DimensionConfig {
                storage_key: "eds_fomo_seen_names_v2",
                ttl_ms: 21 * DAY_MS,
                max_size: 8000,
            },
            // ~100 portraits per gender, so these have to recycle much faster
            avatars: DimensionConfig {
                storage_key: "eds_fomo_seen_avatars_v2",
                ttl_ms: 7 * DAY_MS,
                max_size: 2000,
            },
            gender_cache_key: GENDER_CACHE_KEY,
            channel: "eds_fomo_seen_broadcast_v1",
            seen_policy: SeenPolicy::Ban,
            max_visible: 1,
            auto_dismiss_ms: Some(5200),
            recent_names: 150,
            recent_avatars: 700,
            attempts: 10,
            schedule: ScheduleConfig {
                cold_start_ms: Some(4500),
                desktop_range_ms: (12_000, 20_000),
                mobile_range_ms: (16_000, 26_000),
            },
            backdate_secs: None,
            seed_on_hydrate: false,
            id_prefix: "fomo",
        }
    }

    pub fn testimonials() -> Self {
        Self {
            kind: FeedKind::Testimonials,
            pool: TESTIMONIAL_POOL,
            names: DimensionConfig {
                storage_key: "eds_seen_names_v6",
                ttl_ms: 21 * DAY_MS,
                max_size: 8000,
            },
            avatars: DimensionConfig {
                storage_key: "eds_seen_imgs_v6",
                ttl_ms: 7 * DAY_MS,
                max_size: 2000,
            },
            gender_cache_key: GENDER_CACHE_KEY,
            channel: "eds_seen_broadcast_v6",
            seen_policy: SeenPolicy::Steer,
            max_visible: 3,
            auto_dismiss_ms: None,
            recent_names: 120,
            recent_avatars: 120,
            attempts: 9,
            schedule: ScheduleConfig {
                cold_start_ms: None,
                desktop_range_ms: (6_000, 9_000),
                mobile_range_ms: (8_000, 12_000),
            },
            backdate_secs: Some((10, 179)),
            seed_on_hydrate: true,
            id_prefix: "t",
        }
    }
}
