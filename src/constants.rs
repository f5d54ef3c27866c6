pub const SYSTEM_ERROR_MSG: &str = "System error. Reported to administrators.";

pub const SYSTEM_STAGE: &str = "system";
pub const TEST_STEP: &str = "test";

/// Candidates above this share of the baseline score (in permille) fail.
pub const BASELINE_THRESHOLD_PERMILLE: u64 = 1200;
