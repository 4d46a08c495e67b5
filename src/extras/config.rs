use crate::api::ClientError;
use serde::Deserialize;
use serde_yaml::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// The `ClientConfig` struct is the file based form of the builder settings.
///
/// Properties:
///
/// * `project_id`: The project to send data to.
/// * `token`: The project token to start with.
/// * `device_id`: A known device id. Leave it out to rely on the save path or a registration.
/// * `save_path`: Directory holding the saved device id.
/// * `base_url`: Override for the API base URL.
/// * `timeout_ms`: Request timeout in milliseconds.
///
/// A minimal file looks like this:
///
/// ```yaml
/// project_id: 1
/// token: "eyJhbGciOi..."
/// save_path: /var/lib/iobeam
/// ```
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct ClientConfig {
    pub project_id: u64,
    pub token: String,
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub save_path: Option<PathBuf>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

/// Reads a single YAML configuration file.
pub fn read_config(path: impl AsRef<Path>) -> Result<ClientConfig, ClientError> {
    read_layered_config(&[path])
}

/// This function reads several YAML files and merges them, later files overriding earlier ones.
///
/// Arguments:
///
/// * `paths`: The files to read, from the most generic (e.g. shipped defaults) to the most
/// specific (e.g. a per-host override). Empty files are skipped.
///
/// Returns:
///
/// The merged `ClientConfig`, or the first I/O or parse error met. Mappings are merged key by
/// key, any other value is replaced wholesale.
pub fn read_layered_config<P: AsRef<Path>>(paths: &[P]) -> Result<ClientConfig, ClientError> {
    if paths.is_empty() {
        return Err(ClientError::validation("No configuration files given"));
    }

    let mut merged = Value::Null;
    for path in paths {
        let contents = fs::read_to_string(path.as_ref())?;
        let layer = serde_yaml::from_str::<Value>(&contents)?;
        log::debug!("Merging configuration from {}", path.as_ref().display());
        merged = merge_values(merged, layer);
    }
    Ok(serde_yaml::from_value(merged)?)
}

fn merge_values(destination: Value, source: Value) -> Value {
    match (destination, source) {
        (Value::Mapping(mut map1), Value::Mapping(map2)) => {
            for (key, value) in map2 {
                let merged_value = match map1.remove(&key) {
                    Some(existing_value) => merge_values(existing_value, value),
                    None => value,
                };
                map1.insert(key, merged_value);
            }
            Value::Mapping(map1)
        }
        (destination, Value::Null) => destination,
        (_, value) => value,
    }
}
