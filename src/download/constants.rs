//! Constants for the download module (timeouts, server-mandated delays).

use std::time::Duration;

/// Default HTTP connect timeout (30 seconds).
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default whole-request timeout (30 seconds; catalogue and content pages are small).
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum Retry-After header value (1 hour) to prevent excessive delays.
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(3600);

/// Warning threshold for cumulative politeness delay within one run (10 minutes).
pub const CUMULATIVE_DELAY_WARNING_THRESHOLD: Duration = Duration::from_secs(600);
