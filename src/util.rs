use crate::api::ClientError;

/// Milliseconds since the Unix epoch according to the wall clock
pub fn now_millis() -> i64 {
    let start = std::time::SystemTime::now();
    match start.duration_since(std::time::UNIX_EPOCH) {
        Ok(since_the_epoch) => since_the_epoch.as_millis() as i64,
        Err(e) => -(e.duration().as_millis() as i64),
    }
}

pub fn assert_valid_project_id(project_id: u64) -> Result<(), ClientError> {
    if project_id == 0 {
        return Err(ClientError::validation(format!(
            "Invalid projectId: {}",
            project_id
        )));
    }
    Ok(())
}

pub fn assert_valid_token(token: &str) -> Result<(), ClientError> {
    if token.is_empty() {
        return Err(ClientError::validation("token is too short: 0"));
    }
    Ok(())
}

/// Device ids are non-empty and limited to `[a-zA-Z0-9:_-]`
pub fn assert_valid_device_id(device_id: &str) -> Result<(), ClientError> {
    if device_id.is_empty() {
        return Err(ClientError::validation("deviceId too short: 0"));
    }
    let valid = device_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == ':' || c == '_' || c == '-');
    if !valid {
        return Err(ClientError::validation(format!(
            "Invalid deviceId: {:?}",
            device_id
        )));
    }
    Ok(())
}
