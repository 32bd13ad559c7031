use std::time::Duration;

/// Which tier of the principal chain a budget counter belongs to (spec.md
/// §3 "Budget Counter"). Precedence for denial decisions is
/// `Team > User > Key`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Team,
    User,
    Key,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Team => "team",
            EntityKind::User => "user",
            EntityKind::Key => "key",
        }
    }
}

/// Reset cadence for a budget counter's period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Daily,
    Weekly,
    Monthly,
    Yearly,
    /// Never rolls over.
    None,
}

impl Period {
    pub fn duration(&self) -> Option<Duration> {
        const DAY: u64 = 86_400;
        match self {
            Period::Daily => Some(Duration::from_secs(DAY)),
            Period::Weekly => Some(Duration::from_secs(7 * DAY)),
            Period::Monthly => Some(Duration::from_secs(30 * DAY)),
            Period::Yearly => Some(Duration::from_secs(365 * DAY)),
            Period::None => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Daily => "daily",
            Period::Weekly => "weekly",
            Period::Monthly => "monthly",
            Period::Yearly => "yearly",
            Period::None => "none",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "daily" => Period::Daily,
            "weekly" => Period::Weekly,
            "monthly" => Period::Monthly,
            "yearly" => Period::Yearly,
            _ => Period::None,
        }
    }
}

/// The durable per-entity budget state (spec.md §3 "Budget Counter").
/// `max = None` means no configured limit: always allowed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BudgetCounter {
    pub max: Option<f64>,
    pub spend: f64,
    pub period: Period,
    pub next_reset_ms: Option<u64>,
}

impl BudgetCounter {
    pub fn unlimited() -> Self {
        Self {
            max: None,
            spend: 0.0,
            period: Period::None,
            next_reset_ms: None,
        }
    }

    pub fn remaining(&self) -> Option<f64> {
        self.max.map(|max| max - self.spend)
    }
}
