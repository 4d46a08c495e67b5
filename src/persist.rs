use crate::util::assert_valid_device_id;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const DEVICE_FILE_PREFIX: &str = "iobeam-device-";

/// File holding the device id of `project_id` inside `dir`
pub fn device_file(dir: &Path, project_id: u64) -> PathBuf {
    dir.join(format!("{}{}", DEVICE_FILE_PREFIX, project_id))
}

/// Reads a previously saved device id. Missing files yield `None`; unreadable or invalid
/// content is logged and ignored.
pub fn read_device_id(dir: &Path, project_id: u64) -> Option<String> {
    let path = device_file(dir, project_id);
    let contents = match fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => return None,
        Err(e) => {
            log::warn!("Unable to read device id from {}: {}", path.display(), e);
            return None;
        }
    };

    let device_id = contents.trim();
    if device_id.is_empty() {
        return None;
    }
    match assert_valid_device_id(device_id) {
        Ok(()) => Some(device_id.to_string()),
        Err(e) => {
            log::warn!("Ignoring saved device id in {}: {}", path.display(), e);
            None
        }
    }
}

/// Saves `device_id`, best-effort: failures are logged and otherwise ignored
pub fn write_device_id(dir: &Path, project_id: u64, device_id: &str) {
    let path = device_file(dir, project_id);
    let written = fs::create_dir_all(dir).and_then(|_| fs::write(&path, device_id));
    match written {
        Ok(()) => log::debug!("Saved device id to {}", path.display()),
        Err(e) => log::warn!("Unable to save device id to {}: {}", path.display(), e),
    }
}
