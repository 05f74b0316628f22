use std::path::PathBuf;

use directories::BaseDirs;
use tracing::warn;

/// Default directory for the file-backed consumer offset store, used when a
/// `Consumer` is built without an explicit `offset_dir`.
pub fn default_offset_dir() -> PathBuf {
    let Some(base_dirs) = BaseDirs::new() else {
        warn!("couldn't resolve base directories, storing offsets in /tmp/lwp-client");
        return PathBuf::from("/tmp/lwp-client/offsets");
    };
    base_dirs.data_dir().join("lwp-client").join("offsets")
}
