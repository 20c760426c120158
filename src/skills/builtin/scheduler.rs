//! Alarms and reminders
//!
//! Reminders persist to a JSON file so they survive restarts. A background
//! task polls the store and publishes [`EventKind::ReminderDue`] for every
//! reminder whose time has passed, removing it from the store.

use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local, TimeDelta, TimeZone, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::Result;
use crate::events::{EventBus, EventKind};
use crate::response::{Entities, SkillResponse};
use crate::skills::{Skill, SkillCatalog, SkillContext, slot};

/// How often the checker looks for due reminders
const CHECK_INTERVAL: Duration = Duration::from_secs(5);

pub fn register(catalog: &mut SkillCatalog, ctx: &SkillContext) {
    let store = Arc::new(ReminderStore::load(ctx.config.reminders_path()));
    register_with_store(catalog, store, ctx.events.clone());
}

/// Register the scheduler over an existing store
///
/// Every instance the catalog builds shares `store`, so the checker of an
/// outgoing instance and its replacement drain the same list during a reload.
pub fn register_with_store(catalog: &mut SkillCatalog, store: Arc<ReminderStore>, events: EventBus) {
    catalog.register("scheduler", move || {
        Ok(Arc::new(SchedulerSkill::new(Arc::clone(&store), events.clone())) as Arc<dyn Skill>)
    });
}

/// A pending reminder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reminder {
    pub id: Uuid,
    pub message: String,
    pub due_at: DateTime<Utc>,
}

/// Pending reminders, optionally backed by a file
#[derive(Debug)]
pub struct ReminderStore {
    path: Option<PathBuf>,
    reminders: Mutex<Vec<Reminder>>,
}

impl ReminderStore {
    /// Load reminders from `path`, starting empty if missing or unreadable
    #[must_use]
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let reminders = match read_reminders(&path) {
            Ok(reminders) => reminders,
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "failed to load reminders");
                Vec::new()
            }
        };
        tracing::debug!(pending = reminders.len(), "reminders loaded");

        Self {
            path: Some(path),
            reminders: Mutex::new(reminders),
        }
    }

    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            path: None,
            reminders: Mutex::new(Vec::new()),
        }
    }

    /// Schedule a reminder
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot be saved
    pub async fn add(&self, message: &str, due_at: DateTime<Utc>) -> Result<Reminder> {
        let reminder = Reminder {
            id: Uuid::new_v4(),
            message: message.to_string(),
            due_at,
        };
        let mut reminders = self.reminders.lock().await;
        reminders.push(reminder.clone());
        self.save(&reminders).await?;
        Ok(reminder)
    }

    /// Remove and return every reminder due at or before `now`, oldest first
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot be saved
    pub async fn take_due(&self, now: DateTime<Utc>) -> Result<Vec<Reminder>> {
        let mut reminders = self.reminders.lock().await;
        let (mut due, pending): (Vec<_>, Vec<_>) = reminders.drain(..).partition(|r| r.due_at <= now);
        *reminders = pending;
        if !due.is_empty() {
            self.save(&reminders).await?;
        }
        due.sort_by_key(|r| r.due_at);
        Ok(due)
    }

    /// Pending reminders
    pub async fn pending(&self) -> Vec<Reminder> {
        self.reminders.lock().await.clone()
    }

    async fn save(&self, reminders: &[Reminder]) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, serde_json::to_string_pretty(reminders)?).await?;
        Ok(())
    }
}

fn read_reminders(path: &Path) -> Result<Vec<Reminder>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let contents = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

fn relative_regex() -> Option<&'static Regex> {
    static RELATIVE: OnceLock<Option<Regex>> = OnceLock::new();
    RELATIVE
        .get_or_init(|| Regex::new(r"(?i)(\d+)\s*(seconds?|secs?|minutes?|mins?|hours?|hrs?)\b").ok())
        .as_ref()
}

fn clock_regex() -> Option<&'static Regex> {
    static CLOCK: OnceLock<Option<Regex>> = OnceLock::new();
    CLOCK
        .get_or_init(|| Regex::new(r"(?i)\b(\d{1,2}):(\d{2})\s*(am|pm|a\.m\.|p\.m\.)?").ok())
        .as_ref()
}

/// Resolve a spoken time relative to `now`
///
/// Understands durations ("10 minutes", "in 2 hours", "30 secs") and clock
/// times ("7:30", "07:30 pm"). A clock time already past today means
/// tomorrow.
#[must_use]
pub fn parse_when<Tz: TimeZone>(text: &str, now: &DateTime<Tz>) -> Option<DateTime<Tz>> {
    if let Some(captures) = relative_regex()?.captures(text) {
        let amount: i64 = captures[1].parse().ok()?;
        let unit = captures[2].to_lowercase();
        let delta = if unit.starts_with('s') {
            TimeDelta::try_seconds(amount)?
        } else if unit.starts_with('m') {
            TimeDelta::try_minutes(amount)?
        } else {
            TimeDelta::try_hours(amount)?
        };
        return now.clone().checked_add_signed(delta);
    }

    let captures = clock_regex()?.captures(text)?;
    let mut hour: u32 = captures[1].parse().ok()?;
    let minute: u32 = captures[2].parse().ok()?;
    match captures.get(3).map(|m| m.as_str().to_lowercase()) {
        Some(suffix) if suffix.starts_with('p') && hour < 12 => hour += 12,
        Some(suffix) if suffix.starts_with('a') && hour == 12 => hour = 0,
        _ => {}
    }

    let naive = now.date_naive().and_hms_opt(hour, minute, 0)?;
    let mut at = now.timezone().from_local_datetime(&naive).earliest()?;
    if at <= *now {
        at = at.checked_add_signed(TimeDelta::days(1))?;
    }
    Some(at)
}

/// Alarm and reminder skill with its background checker
pub struct SchedulerSkill {
    store: Arc<ReminderStore>,
    checker: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for SchedulerSkill {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchedulerSkill")
            .field("store", &self.store)
            .field("checker", &self.checker.is_some())
            .finish()
    }
}

impl SchedulerSkill {
    /// Create the skill and start the checker on the current runtime
    ///
    /// Outside a runtime no checker runs; reminders are stored but never fire.
    #[must_use]
    pub fn new(store: Arc<ReminderStore>, events: EventBus) -> Self {
        let checker = match tokio::runtime::Handle::try_current() {
            Ok(handle) => Some(handle.spawn(check_loop(Arc::clone(&store), events))),
            Err(_) => {
                tracing::warn!("no runtime, reminder checker not started");
                None
            }
        };
        Self { store, checker }
    }

    /// Backing store
    #[must_use]
    pub fn store(&self) -> &ReminderStore {
        &self.store
    }
}

impl Drop for SchedulerSkill {
    fn drop(&mut self) {
        if let Some(checker) = self.checker.take() {
            checker.abort();
        }
    }
}

async fn check_loop(store: Arc<ReminderStore>, events: EventBus) {
    let mut interval = tokio::time::interval(CHECK_INTERVAL);
    loop {
        interval.tick().await;
        match store.take_due(Utc::now()).await {
            Ok(due) => {
                for reminder in due {
                    tracing::info!(id = %reminder.id, message = %reminder.message, "reminder due");
                    events.publish(EventKind::ReminderDue {
                        message: reminder.message,
                        due_at: reminder.due_at,
                    });
                }
            }
            Err(e) => tracing::error!(error = %e, "failed to check reminders"),
        }
    }
}

#[async_trait]
impl Skill for SchedulerSkill {
    fn name(&self) -> &str {
        "scheduler"
    }

    fn intents(&self) -> &[&str] {
        &["set_alarm", "set_reminder"]
    }

    fn description(&self) -> &str {
        "Set an alarm or a reminder for a time of day or after a duration."
    }

    fn slots(&self) -> &[(&str, &str)] {
        &[
            ("time", "When, e.g. '10 minutes' or '07:30'"),
            ("message", "What to be reminded about"),
        ]
    }

    fn examples(&self) -> &[&str] {
        &["wake me up at 7", "remind me to call mom in 10 minutes", "set a timer for 5 minutes"]
    }

    async fn execute(&self, intent: &str, entities: &Entities) -> Result<SkillResponse> {
        let kind = if intent == "set_alarm" { "alarm" } else { "reminder" };
        let Some(time) = slot(entities, "time") else {
            return Ok(SkillResponse::failure(format!("When should I set the {kind} for?")).with_intent(intent));
        };

        let now = Local::now();
        let Some(due) = parse_when(time, &now) else {
            return Ok(SkillResponse::failure(format!("I couldn't understand the time '{time}'.")).with_intent(intent));
        };

        let default_message = if intent == "set_alarm" { "Alarm" } else { "Reminder" };
        let message = slot(entities, "message").unwrap_or(default_message);
        let reminder = self.store.add(message, due.with_timezone(&Utc)).await?;

        Ok(SkillResponse::text(format!("Set {kind} for {}: {message}", due.format("%I:%M %p")))
            .with_intent(intent)
            .with_data("id", reminder.id.to_string())
            .with_data("due_at", reminder.due_at.to_rfc3339()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, h, m, 0).unwrap()
    }

    #[test]
    fn relative_durations() {
        let now = at(10, 0);
        assert_eq!(parse_when("in 10 minutes", &now), Some(at(10, 10)));
        assert_eq!(parse_when("2 hours", &now), Some(at(12, 0)));
        assert_eq!(parse_when("30 secs", &now), now.checked_add_signed(TimeDelta::seconds(30)));
    }

    #[test]
    fn clock_times_roll_over() {
        let now = at(10, 0);
        assert_eq!(parse_when("11:15", &now), Some(at(11, 15)));
        assert_eq!(parse_when("7:30 pm", &now), Some(at(19, 30)));
        assert_eq!(
            parse_when("09:00", &now),
            Some(Utc.with_ymd_and_hms(2024, 5, 2, 9, 0, 0).unwrap())
        );
    }

    #[test]
    fn nonsense_is_rejected() {
        assert_eq!(parse_when("whenever", &at(10, 0)), None);
        assert_eq!(parse_when("25:00", &at(10, 0)), None);
    }

    #[tokio::test]
    async fn due_reminders_are_taken_once() {
        let store = ReminderStore::in_memory();
        store.add("later", at(12, 0)).await.unwrap();
        store.add("second", at(11, 0)).await.unwrap();
        store.add("first", at(10, 30)).await.unwrap();

        let due = store.take_due(at(11, 0)).await.unwrap();
        let messages: Vec<_> = due.iter().map(|r| r.message.as_str()).collect();
        assert_eq!(messages, vec!["first", "second"]);
        assert!(store.take_due(at(11, 0)).await.unwrap().is_empty());
        assert_eq!(store.pending().await.len(), 1);
    }

    #[tokio::test]
    async fn reminders_persist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reminders.json");

        let store = ReminderStore::load(&path);
        store.add("stretch", at(9, 0)).await.unwrap();

        let reloaded = ReminderStore::load(&path);
        let pending = reloaded.pending().await;
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].message, "stretch");
    }

    #[tokio::test]
    async fn skill_schedules_reminder() {
        let skill = SchedulerSkill::new(Arc::new(ReminderStore::in_memory()), EventBus::new());
        let mut entities = Entities::new();
        entities.insert("time".to_string(), "5 minutes".to_string());
        entities.insert("message".to_string(), "tea".to_string());

        let response = skill.execute("set_reminder", &entities).await.unwrap();
        assert!(response.success);
        assert!(response.text.starts_with("Set reminder for "));
        assert!(response.text.ends_with(": tea"));
        assert_eq!(skill.store().pending().await.len(), 1);
    }

    #[tokio::test]
    async fn skill_requires_time() {
        let skill = SchedulerSkill::new(Arc::new(ReminderStore::in_memory()), EventBus::new());
        let response = skill.execute("set_alarm", &Entities::new()).await.unwrap();
        assert!(!response.success);
    }

    #[tokio::test]
    async fn reload_fires_each_reminder_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(ReminderStore::load(dir.path().join("reminders.json")));
        store.add("overdue", Utc::now() - TimeDelta::seconds(1)).await.unwrap();

        let events = EventBus::new();
        let mut rx = events.subscribe();
        let mut catalog = SkillCatalog::new();
        register_with_store(&mut catalog, Arc::clone(&store), events);
        let registry = crate::skills::SkillRegistry::new(catalog, None);
        registry.load().await;
        // Keep the first instance and its checker alive across the reload
        let _outgoing = registry.snapshot();
        registry.reload().await;

        let event = tokio::time::timeout(Duration::from_secs(10), rx.recv()).await.unwrap().unwrap();
        assert!(matches!(event.kind, EventKind::ReminderDue { ref message, .. } if message == "overdue"));
        assert!(tokio::time::timeout(Duration::from_secs(1), rx.recv()).await.is_err());
        assert!(store.pending().await.is_empty());
    }

    #[tokio::test]
    async fn checker_publishes_due_reminders() {
        let store = Arc::new(ReminderStore::in_memory());
        let events = EventBus::new();
        let mut rx = events.subscribe();
        store.add("overdue", Utc::now() - TimeDelta::seconds(1)).await.unwrap();

        let _skill = SchedulerSkill::new(Arc::clone(&store), events);
        let event = tokio::time::timeout(Duration::from_secs(10), rx.recv()).await.unwrap().unwrap();
        assert!(matches!(event.kind, EventKind::ReminderDue { ref message, .. } if message == "overdue"));
    }
}
