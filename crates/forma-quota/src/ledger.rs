//! Quota ledger: rolling-period usage accounting per (user, category).
//!
//! Admission checks happen strictly before enqueue; the optimistic increment
//! happens when a generation attempt is dispatched and is reversed via
//! [`QuotaLedger::decrement`] if the job terminates in failure. Each
//! operation is an internally atomic read-modify-write (one lock scope), but
//! check-then-increment across operations is deliberately NOT transactional:
//! two nearly simultaneous requests can both pass admission before either
//! increments. The resulting overrun is bounded by the category's worker
//! concurrency and accepted as a cost/complexity tradeoff.

use std::collections::HashMap;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use forma_core::defaults::QUOTA_UNLIMITED;
use forma_core::{Category, QuotaRecord, QuotaUsage, Result};

/// Per-category limits and the rolling period length.
#[derive(Debug, Clone)]
pub struct QuotaConfig {
    limits: HashMap<Category, i64>,
    period: ChronoDuration,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        let limits = Category::ALL
            .iter()
            .map(|c| (*c, c.default_quota_limit()))
            .collect();
        Self {
            limits,
            period: ChronoDuration::days(forma_core::defaults::QUOTA_PERIOD_DAYS),
        }
    }
}

impl QuotaConfig {
    /// Load limits from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `QUOTA_LIMIT_WORKOUT` | `4` | Workout plans per period |
    /// | `QUOTA_LIMIT_MEAL` | `4` | Meal plans per period |
    /// | `QUOTA_LIMIT_INBODY_SCAN` | `8` | InBody scans per period |
    /// | `QUOTA_LIMIT_BODY_PHOTO` | `8` | Body photo analyses per period |
    /// | `QUOTA_PERIOD_DAYS` | `30` | Rolling period length |
    ///
    /// A limit of `-1` means unlimited.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        let vars = [
            (Category::Workout, "QUOTA_LIMIT_WORKOUT"),
            (Category::Meal, "QUOTA_LIMIT_MEAL"),
            (Category::InbodyScan, "QUOTA_LIMIT_INBODY_SCAN"),
            (Category::BodyPhoto, "QUOTA_LIMIT_BODY_PHOTO"),
        ];
        for (category, var) in vars {
            if let Ok(val) = std::env::var(var) {
                match val.parse::<i64>() {
                    Ok(limit) if limit >= QUOTA_UNLIMITED => {
                        config.limits.insert(category, limit);
                    }
                    _ => warn!(value = %val, variable = var, "Invalid quota limit, using default"),
                }
            }
        }

        if let Ok(val) = std::env::var("QUOTA_PERIOD_DAYS") {
            if let Ok(days) = val.parse::<i64>() {
                config.period = ChronoDuration::days(days.max(1));
            }
        }

        config
    }

    /// Set one category's limit (`-1` = unlimited).
    pub fn with_limit(mut self, category: Category, limit: i64) -> Self {
        self.limits.insert(category, limit);
        self
    }

    /// Set the rolling period length.
    pub fn with_period(mut self, period: ChronoDuration) -> Self {
        self.period = period;
        self
    }

    fn limit_for(&self, category: Category) -> i64 {
        self.limits
            .get(&category)
            .copied()
            .unwrap_or_else(|| category.default_quota_limit())
    }
}

/// Rolling-period usage ledger.
///
/// Records are mutated only through this type; workers never touch them
/// directly.
pub struct QuotaLedger {
    config: QuotaConfig,
    records: Mutex<HashMap<(Uuid, Category), QuotaRecord>>,
}

impl QuotaLedger {
    pub fn new(config: QuotaConfig) -> Self {
        Self {
            config,
            records: Mutex::new(HashMap::new()),
        }
    }

    /// True when the user can admit one more job in this category.
    pub async fn has_available(&self, user_id: Uuid, category: Category) -> Result<bool> {
        let mut records = self.records.lock().await;
        let record = self.entry_reset(&mut records, user_id, category);
        Ok(record.limit == QUOTA_UNLIMITED || record.used < record.limit)
    }

    /// Charge one use. Called optimistically when an attempt is dispatched.
    pub async fn increment(&self, user_id: Uuid, category: Category) -> Result<()> {
        let mut records = self.records.lock().await;
        let record = self.entry_reset(&mut records, user_id, category);
        record.used += 1;
        debug!(
            user_id = %user_id,
            category = %category,
            quota_used = record.used,
            quota_limit = record.limit,
            "Quota incremented"
        );
        Ok(())
    }

    /// Undo an optimistic increment after a failed generation.
    ///
    /// Saturates at zero: decrementing a record that was never incremented
    /// (or was reset by a new period) is a no-op, never a negative count.
    pub async fn decrement(&self, user_id: Uuid, category: Category) -> Result<()> {
        let mut records = self.records.lock().await;
        let record = self.entry_reset(&mut records, user_id, category);
        if record.used > 0 {
            record.used -= 1;
        }
        debug!(
            user_id = %user_id,
            category = %category,
            quota_used = record.used,
            "Quota decremented"
        );
        Ok(())
    }

    /// Usage snapshot for one category.
    pub async fn remaining(&self, user_id: Uuid, category: Category) -> Result<QuotaUsage> {
        let mut records = self.records.lock().await;
        let record = self.entry_reset(&mut records, user_id, category);
        Ok(usage_of(record))
    }

    /// Per-category usage snapshot for one user.
    pub async fn stats(&self, user_id: Uuid) -> Result<HashMap<Category, QuotaUsage>> {
        let mut records = self.records.lock().await;
        let mut out = HashMap::new();
        for category in Category::ALL {
            let record = self.entry_reset(&mut records, user_id, category);
            out.insert(category, usage_of(record));
        }
        Ok(out)
    }

    /// Look up (or create) the record, applying the lazy period reset.
    ///
    /// Must be called with the ledger lock held so the read-modify-write is
    /// one logical step.
    fn entry_reset<'a>(
        &self,
        records: &'a mut HashMap<(Uuid, Category), QuotaRecord>,
        user_id: Uuid,
        category: Category,
    ) -> &'a mut QuotaRecord {
        let now = Utc::now();
        let limit = self.config.limit_for(category);
        let record = records.entry((user_id, category)).or_insert(QuotaRecord {
            period_start: now,
            used: 0,
            limit,
        });

        if expired(record.period_start, now, self.config.period) {
            debug!(
                user_id = %user_id,
                category = %category,
                "Quota period elapsed, resetting counters"
            );
            record.period_start = now;
            record.used = 0;
        }
        // Limit changes (config reload) take effect on next access.
        record.limit = limit;
        record
    }
}

fn expired(period_start: DateTime<Utc>, now: DateTime<Utc>, period: ChronoDuration) -> bool {
    now - period_start >= period
}

fn usage_of(record: &QuotaRecord) -> QuotaUsage {
    let remaining = if record.limit == QUOTA_UNLIMITED {
        i64::MAX
    } else {
        (record.limit - record.used).max(0)
    };
    QuotaUsage {
        used: record.used,
        limit: record.limit,
        remaining,
    }
}
