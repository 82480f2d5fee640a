use bytes::Bytes;
use std::ffi::OsStr;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::Config;
use crate::log::log_sink::LogSink;
use crate::{sink_info, sink_warn};

/// Used when the declared name has no usable file component.
const UNNAMED_PAYLOAD: &str = "payload.bin";

/// Writes completed payloads under the configured storage directory.
pub struct PayloadStore {
    root: PathBuf,
    log_sink: Arc<dyn LogSink>,
}

impl PayloadStore {
    /// Storage root comes from `[sideload] storage_path`, default
    /// `./downloads`.
    pub fn new(config: &Config, log_sink: Arc<dyn LogSink>) -> Self {
        let root = config.get_non_empty_or_default("sideload", "storage_path", "./downloads");
        Self {
            root: PathBuf::from(root),
            log_sink,
        }
    }

    /// Materializes one payload. A failed write removes the partial file.
    pub fn save(&self, name: &str, payload: &Bytes) -> Result<PathBuf, String> {
        // Keep only the final path component of the declared name, so a
        // remote peer cannot steer the write outside the storage root.
        let file_name = Path::new(name)
            .file_name()
            .unwrap_or_else(|| OsStr::new(UNNAMED_PAYLOAD));
        let full_path = self.root.join(file_name);

        fs::create_dir_all(&self.root).map_err(|e| e.to_string())?;
        let file = File::create(&full_path).map_err(|e| e.to_string())?;
        let mut writer = BufWriter::new(file);

        if let Err(e) = writer.write_all(payload).and_then(|()| writer.flush()) {
            sink_warn!(
                self.log_sink,
                "[STORE] write of {:?} failed: {}, removing partial file",
                full_path,
                e
            );
            let _ = fs::remove_file(&full_path);
            return Err(e.to_string());
        }

        sink_info!(
            self.log_sink,
            "[STORE] saved {} bytes to {:?}",
            payload.len(),
            full_path
        );
        Ok(full_path)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use crate::log::NoopLogSink;

    fn store_in(dir: &Path) -> PayloadStore {
        let mut config = Config::empty();
        config
            .sections
            .entry("sideload".to_string())
            .or_default()
            .insert(
                "storage_path".to_string(),
                dir.to_string_lossy().to_string(),
            );
        PayloadStore::new(&config, Arc::new(NoopLogSink))
    }

    #[test]
    fn saves_payload_under_configured_root() {
        let dir = std::env::temp_dir().join("sidecast_store_test");
        let _ = fs::remove_dir_all(&dir);
        let store = store_in(&dir);

        let path = store
            .save("tool.wasm", &Bytes::from_static(b"abc"))
            .expect("save");
        assert_eq!(path, dir.join("tool.wasm"));
        assert_eq!(fs::read(&path).unwrap(), b"abc");

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn declared_name_cannot_escape_the_root() {
        let dir = std::env::temp_dir().join("sidecast_store_escape_test");
        let _ = fs::remove_dir_all(&dir);
        let store = store_in(&dir);

        let path = store
            .save("../../etc/passwd", &Bytes::from_static(b"x"))
            .expect("save");
        assert_eq!(path, dir.join("passwd"));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn empty_name_gets_a_fallback() {
        let dir = std::env::temp_dir().join("sidecast_store_unnamed_test");
        let _ = fs::remove_dir_all(&dir);
        let store = store_in(&dir);

        let path = store.save("", &Bytes::from_static(b"x")).expect("save");
        assert_eq!(path, dir.join(UNNAMED_PAYLOAD));

        let _ = fs::remove_dir_all(&dir);
    }
}
