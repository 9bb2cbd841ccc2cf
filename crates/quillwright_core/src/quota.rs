//! crates/quillwright_core/src/quota.rs
//!
//! Daily AI call quota. The counter resets the first time it is touched on a
//! day later than the stored date; "today" is supplied by the caller in
//! server-local time.

use chrono::NaiveDate;
use serde::Serialize;

use crate::domain::AiUsage;

pub const FREE_DAILY_LIMIT: u32 = 50;
pub const PREMIUM_DAILY_LIMIT: u32 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyLimits {
    pub free: u32,
    pub premium: u32,
}

impl Default for DailyLimits {
    fn default() -> Self {
        Self {
            free: FREE_DAILY_LIMIT,
            premium: PREMIUM_DAILY_LIMIT,
        }
    }
}

impl DailyLimits {
    pub fn for_user(&self, is_premium: bool) -> u32 {
        if is_premium {
            self.premium
        } else {
            self.free
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Daily AI limit of {limit} requests reached. Try again tomorrow.")]
pub struct QuotaExceeded {
    pub limit: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsageReport {
    pub used: u32,
    pub limit: u32,
    pub remaining: u32,
    pub resets_on: Option<NaiveDate>,
}

impl AiUsage {
    /// Calls made on `today`; a stale date counts as zero.
    pub fn used_on(&self, today: NaiveDate) -> u32 {
        match self.date {
            Some(date) if date >= today => self.count,
            _ => 0,
        }
    }

    /// Records one call. Fails without touching the counter when the limit is
    /// already reached; otherwise returns the calls left today.
    pub fn consume(&mut self, today: NaiveDate, limit: u32) -> Result<u32, QuotaExceeded> {
        let used = self.used_on(today);
        if used >= limit {
            return Err(QuotaExceeded { limit });
        }
        if self.date.map_or(true, |d| d < today) {
            self.date = Some(today);
        }
        self.count = used + 1;
        Ok(limit - self.count)
    }

    pub fn report(&self, today: NaiveDate, limit: u32) -> UsageReport {
        let used = self.used_on(today);
        UsageReport {
            used,
            limit,
            remaining: limit.saturating_sub(used),
            resets_on: today.succ_opt(),
        }
    }
}
