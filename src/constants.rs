/// Raw handle value the native library uses for "no live surface".
pub const SENTINEL_HANDLE: usize = 0;

/// Base name of the native surface library; the platform prefix/suffix is added at load time.
pub const DEFAULT_LIBRARY_NAME: &str = "wvbridge";

/// Priority used by `add_navigation_handler` when the caller does not pick one.
pub const DEFAULT_NAVIGATION_PRIORITY: i32 = 0;

/// How long a foreign navigation callback waits for the UI thread to produce a verdict.
pub const DEFAULT_NAVIGATION_REPLY_TIMEOUT_MS: u64 = 5_000;

/// Upper bound on URLs queued by `load_url` before the surface is attached.
pub const DEFAULT_MAX_PENDING_LOADS: usize = 16;

pub const DEFAULT_LOG_FILTER: &str = "info";

pub const ENV_LIBRARY_DIR: &str = "WVBRIDGE_LIBRARY_DIR";
pub const ENV_LOG_FILTER: &str = "WVBRIDGE_LOG";

/// Name given to the dedicated UI runner thread.
pub const UI_THREAD_NAME: &str = "wvbridge-ui";
