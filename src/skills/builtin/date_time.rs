//! Current time and date

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Local, TimeZone};

use crate::Result;
use crate::response::{Entities, SkillResponse};
use crate::skills::{Skill, SkillCatalog, SkillContext};

pub fn register(catalog: &mut SkillCatalog, _ctx: &SkillContext) {
    catalog.register("date_time", || Ok(Arc::new(DateTimeSkill) as Arc<dyn Skill>));
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DateTimeSkill;

fn time_text<Tz: TimeZone>(now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("The current time is {}", now.format("%H:%M:%S"))
}

fn date_text<Tz: TimeZone>(now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("Today's date is {}", now.format("%b %d %Y"))
}

#[async_trait]
impl Skill for DateTimeSkill {
    fn name(&self) -> &str {
        "date_time"
    }

    fn intents(&self) -> &[&str] {
        &["get_time", "get_date"]
    }

    fn description(&self) -> &str {
        "Tell the current local time or today's date."
    }

    fn examples(&self) -> &[&str] {
        &["what's the time", "what day is it today", "what is today's date"]
    }

    async fn execute(&self, intent: &str, _entities: &Entities) -> Result<SkillResponse> {
        let now = Local::now();
        let response = if intent == "get_date" {
            SkillResponse::text(date_text(&now)).with_data("date", now.format("%Y-%m-%d").to_string())
        } else {
            SkillResponse::text(time_text(&now)).with_data("time", now.format("%H:%M:%S").to_string())
        };
        Ok(response.with_intent(intent))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    #[test]
    fn formats() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 3).unwrap();
        assert_eq!(time_text(&at), "The current time is 07:05:03");
        assert_eq!(date_text(&at), "Today's date is Mar 09 2024");
    }

    #[tokio::test]
    async fn intent_selects_answer() {
        let date = DateTimeSkill.execute("get_date", &Entities::new()).await.unwrap();
        assert!(date.text.starts_with("Today's date is"));
        assert_eq!(date.intent, "get_date");
        assert!(!date.streaming);

        let time = DateTimeSkill.execute("get_time", &Entities::new()).await.unwrap();
        assert!(time.text.starts_with("The current time is"));
        assert!(time.data.contains_key("time"));
    }
}
