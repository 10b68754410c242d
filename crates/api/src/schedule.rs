//! Visibility schedule types.

use crate::*;

/// A configured visibility schedule.
///
/// Either recurring (weekday set plus a local time window in a time zone)
/// or one-shot (visible for a number of hours after activation).
#[derive(
    Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize,
)]
#[serde(default, rename_all = "camelCase")]
pub struct ScheduleState {
    /// Explicitly recurring. Populating any weekday/time field also
    /// implies recurring.
    pub recurring: bool,

    /// One-shot: visible this many hours after `last_activated_utc`.
    pub display_duration_hours: Option<u32>,

    /// Recurring: active weekdays, Monday = 0 through Sunday = 6.
    pub active_weekdays: Option<Vec<u8>>,

    /// Recurring: local window start, `HH:MM` or `HH:MM:SS`.
    pub time_start_local: Option<String>,

    /// Recurring: local window end, `HH:MM` or `HH:MM:SS`.
    pub time_end_local: Option<String>,

    /// IANA time zone identifier. Unrecognized identifiers mean utc.
    pub time_zone: Option<String>,

    /// One-shot: when visibility was last activated.
    pub last_activated_utc: Option<chrono::DateTime<chrono::Utc>>,
}

impl ScheduleState {
    /// True if this schedule is evaluated in recurring mode.
    pub fn is_recurring(&self) -> bool {
        fn filled(s: &Option<String>) -> bool {
            s.as_deref().map(|s| !s.trim().is_empty()).unwrap_or(false)
        }

        self.recurring
            || self
                .active_weekdays
                .as_ref()
                .map(|w| !w.is_empty())
                .unwrap_or(false)
            || filled(&self.time_start_local)
            || filled(&self.time_end_local)
    }
}

/// The desired visibility signal produced by evaluating a schedule.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub enum Visibility {
    /// The schedule wants presence published.
    Visible,

    /// The schedule wants presence withdrawn.
    Hidden,

    /// The schedule has no authoritative answer. Whoever publishes
    /// presence should keep doing what it was doing.
    Unknown,
}

impl From<bool> for Visibility {
    fn from(b: bool) -> Self {
        if b {
            Self::Visible
        } else {
            Self::Hidden
        }
    }
}

/// Durable storage for visibility schedules, keyed by group.
///
/// Calls are synchronous and expected to be short (a local file or an
/// embedded database). Callers treat failures as non-fatal.
pub trait ScheduleRepo: 'static + Send + Sync + std::fmt::Debug {
    /// Load every stored schedule.
    fn load_all(
        &self,
    ) -> RvResult<std::collections::HashMap<GroupId, ScheduleState>>;

    /// Insert or replace the schedule of a group.
    fn save(&self, group_id: &GroupId, state: &ScheduleState) -> RvResult<()>;

    /// Remove the schedule of a group. Removing an absent group is not
    /// an error.
    fn remove(&self, group_id: &GroupId) -> RvResult<()>;
}

/// Trait-object [ScheduleRepo].
pub type DynScheduleRepo = std::sync::Arc<dyn ScheduleRepo>;
