use chrono::{Datelike, NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

use super::MenuError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OpeningHours {
    pub day: Weekday,
    pub open: NaiveTime,
    /// A close time at or before `open` means the shop trades past midnight.
    pub close: NaiveTime,
}

impl OpeningHours {
    fn crosses_midnight(&self) -> bool {
        self.close <= self.open
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BusinessProfile {
    pub name: String,
    pub phone: String,
    pub hours: Vec<OpeningHours>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BusinessDocument {
    name: String,
    #[serde(default)]
    phone: String,
    #[serde(default)]
    hours: Vec<HoursDocument>,
}

#[derive(Debug, Deserialize)]
struct HoursDocument {
    day: String,
    open: String,
    close: String,
}

impl BusinessProfile {
    pub(crate) fn from_document(document: BusinessDocument) -> Result<Self, MenuError> {
        let mut hours = Vec::with_capacity(document.hours.len());
        for entry in document.hours {
            let day = entry
                .day
                .parse::<Weekday>()
                .map_err(|_| MenuError::Invalid(format!("unknown weekday `{}`", entry.day)))?;
            if hours.iter().any(|existing: &OpeningHours| existing.day == day) {
                return Err(MenuError::Invalid(format!("opening hours for {day} listed twice")));
            }
            hours.push(OpeningHours {
                day,
                open: parse_time(&entry.open)?,
                close: parse_time(&entry.close)?,
            });
        }

        Ok(Self { name: document.name, phone: document.phone, hours })
    }

    pub fn hours_on(&self, day: Weekday) -> Option<&OpeningHours> {
        self.hours.iter().find(|entry| entry.day == day)
    }

    pub fn is_open_at(&self, at: NaiveDateTime) -> bool {
        let time = at.time();
        let today = at.weekday();

        if let Some(window) = self.hours_on(today) {
            let open_today = if window.crosses_midnight() {
                time >= window.open
            } else {
                time >= window.open && time < window.close
            };
            if open_today {
                return true;
            }
        }

        // Late trading carried over from the previous day.
        self.hours_on(today.pred())
            .map(|window| window.crosses_midnight() && time < window.close)
            .unwrap_or(false)
    }
}

fn parse_time(raw: &str) -> Result<NaiveTime, MenuError> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .map_err(|_| MenuError::Invalid(format!("opening time `{raw}` must be HH:MM")))
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveDateTime, Weekday};

    use crate::menu::MenuCatalog;

    fn at(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(year, month, day)
            .and_then(|date| date.and_hms_opt(hour, minute, 0))
            .expect("valid timestamp")
    }

    #[test]
    fn reference_profile_reports_regular_hours() {
        let catalog = MenuCatalog::reference().expect("reference menu loads");
        let profile = catalog.business();

        // 2026-10-19 is a Monday.
        assert!(profile.is_open_at(at(2026, 10, 19, 12, 30)));
        assert!(!profile.is_open_at(at(2026, 10, 19, 10, 59)));
        assert!(!profile.is_open_at(at(2026, 10, 19, 22, 0)));
        assert!(profile.hours_on(Weekday::Mon).is_some());
    }

    #[test]
    fn late_trading_carries_into_the_next_morning() {
        let catalog = MenuCatalog::reference().expect("reference menu loads");
        let profile = catalog.business();

        // Friday 2026-10-23 closes at 02:00 on Saturday.
        assert!(profile.is_open_at(at(2026, 10, 23, 23, 45)));
        assert!(profile.is_open_at(at(2026, 10, 24, 1, 30)));
        assert!(!profile.is_open_at(at(2026, 10, 24, 3, 0)));
    }
}
