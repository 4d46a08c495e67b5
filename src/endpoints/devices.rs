use super::{execute, BindingSlot, Endpoint};
use crate::api::ClientError;
use crate::requester::{RequestResult, Requester};
use crate::resources::Device;
use crate::response::{first_error, parse_body, ApiResponse};
use crate::util::assert_valid_project_id;
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::sync::Arc;

#[async_trait]
pub trait DeviceService: Endpoint {
    /// Registers `device` with the project. Without a device the server assigns an id.
    async fn register(
        &self,
        project_id: u64,
        device: Option<&Device>,
    ) -> Result<ApiResponse<Device>, ClientError>;

    /// Current server time in milliseconds
    async fn timestamp(&self) -> Result<ApiResponse<i64>, ClientError>;
}

/// The `/devices` resource
#[derive(Default)]
pub struct Devices {
    binding: BindingSlot,
}

impl Endpoint for Devices {
    fn initialize(&self, token: &str, requester: Arc<dyn Requester>) -> Result<(), ClientError> {
        self.binding.bind(token, requester)
    }
}

#[async_trait]
impl DeviceService for Devices {
    async fn register(
        &self,
        project_id: u64,
        device: Option<&Device>,
    ) -> Result<ApiResponse<Device>, ClientError> {
        assert_valid_project_id(project_id)?;
        let binding = self.binding.get("devices")?;
        let url = binding.requester.full_endpoint("/devices");

        let mut body = Map::new();
        body.insert("project_id".to_string(), json!(project_id));
        if let Some(device) = device {
            if let Value::Object(fields) = serde_json::to_value(device)? {
                body.extend(fields);
            }
        }
        log::debug!("Registering device {:?}", device.map(Device::id));

        let request =
            binding
                .requester
                .post_request(&url, Some(Value::Object(body)), Some(&binding.token));
        Ok(execute(binding.requester.as_ref(), request, parse_body).await)
    }

    async fn timestamp(&self) -> Result<ApiResponse<i64>, ClientError> {
        let binding = self.binding.get("devices")?;
        let url = binding.requester.full_endpoint("/devices/timestamp");
        let request = binding.requester.get_request(&url, Some(&binding.token));

        let handle_body =
            |resp: &mut ApiResponse<i64>, body: Option<&Value>, result: RequestResult| {
                if result == RequestResult::Success {
                    resp.body = body
                        .and_then(|b| b.get("server_timestamp"))
                        .and_then(Value::as_i64);
                } else {
                    resp.error = first_error(body);
                }
            };
        Ok(execute(binding.requester.as_ref(), request, handle_body).await)
    }
}
