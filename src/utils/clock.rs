use chrono::{NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Tz;

/// Wall clock pinned to the deployment time zone. Request timestamps are
/// stored as local time in this zone.
#[derive(Debug, Clone, Copy)]
pub struct LocalClock {
    tz: Tz,
}

impl LocalClock {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    pub fn now(&self) -> NaiveDateTime {
        Utc::now().with_timezone(&self.tz).naive_local()
    }

    pub fn today(&self) -> NaiveDate {
        self.now().date()
    }
}

impl Default for LocalClock {
    fn default() -> Self {
        Self::new(chrono_tz::America::Santiago)
    }
}
