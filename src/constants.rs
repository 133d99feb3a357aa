//! Shared constants used across the application.

use std::time::Duration;

/// User agent sent when no user-agent pool is supplied.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Well-known local SOCKS5 ports: Tor daemon first, then Tor Browser.
pub const TOR_PROXY_PORTS: [u16; 2] = [9050, 9150];

/// Host probed for a local Tor proxy.
pub const TOR_PROXY_HOST: &str = "127.0.0.1";

/// Category assigned when no keyword matches.
pub const DEFAULT_CATEGORY: &str = "Genel";

/// Longest content kept from a whole-element or whole-page fallback.
pub const FALLBACK_CONTENT_LIMIT: usize = 2000;

/// Posts whose cleaned content is shorter than this are treated as noise.
pub const MIN_POST_CONTENT_CHARS: usize = 3;

/// Timestamp format for post/thread dates that could not be found on the page.
pub const FALLBACK_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Date format for listing-page thread stubs.
pub const LISTING_DATE_FORMAT: &str = "%Y-%m-%d";

/// Timestamp format stored in the database.
pub const DB_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Activity-log sources.
pub const SOURCE_SCANNER: &str = "SCANNER";
pub const SOURCE_WATCHLIST: &str = "WATCHLIST";

/// How long shutdown waits for in-flight scans and queued writes.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);
