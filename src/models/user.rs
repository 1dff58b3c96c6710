//! Subscription plans and their sync limits

use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanType {
    Free,
    Starter,
    Pro,
    Business,
}

impl PlanType {
    /// Maximum number of syncs; `None` is unlimited
    pub fn sync_limit(&self) -> Option<u64> {
        match self {
            PlanType::Free => Some(1),
            PlanType::Starter => Some(3),
            PlanType::Pro => Some(10),
            PlanType::Business => None,
        }
    }

    pub fn can_create_sync(&self, current_count: u64) -> bool {
        self.sync_limit().is_none_or(|limit| current_count < limit)
    }
}

impl FromStr for PlanType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(PlanType::Free),
            "starter" => Ok(PlanType::Starter),
            "pro" => Ok(PlanType::Pro),
            "business" => Ok(PlanType::Business),
            other => Err(format!("unknown plan '{}'", other)),
        }
    }
}
