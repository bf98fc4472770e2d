//! Shared helpers for integration tests.

use std::io::Write;

use midi_router::config::RouterSettings;
use tempfile::NamedTempFile;

/// Write a route file to a temporary location.
pub fn route_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

/// Settings pointing at `routes`, with background tasks off unless a test
/// turns them on.
pub fn quiet_settings(routes: &NamedTempFile) -> RouterSettings {
    let mut settings = RouterSettings::default();
    settings.routes_path = routes.path().to_path_buf();
    settings.stats.enabled = false;
    settings.watchdog.enabled = false;
    settings
}
