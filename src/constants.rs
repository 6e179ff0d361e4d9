/// The version of this crate.
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const VARIATION_ON: &str = "on";
pub const VARIATION_OFF: &str = "off";
pub const SYSTEM_ACTOR: &str = "system";

pub const USER_ID_ATTRIBUTE: &str = "userId";
pub const TENANT_ID_ATTRIBUTE: &str = "tenantId";

pub const REASON_SCHEDULE_NOT_REACHED: &str = "Scheduled enable date not reached";
pub const REASON_SCHEDULE_PASSED: &str = "Scheduled disable date passed";
pub const REASON_SCHEDULE_REACHED: &str = "Scheduled enable date reached";

pub const REASON_WINDOW_ALWAYS_OPEN: &str = "Flag operational window is always open.";
pub const REASON_OUTSIDE_DAYS: &str = "Outside allowed days";
pub const REASON_WITHIN_WINDOW: &str = "Within time window";
pub const REASON_OUTSIDE_WINDOW: &str = "Outside time window";

pub const REASON_NO_RULE_MATCHED: &str = "No targeting rules matched";
