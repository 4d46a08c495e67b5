use super::{execute, BindingSlot, Endpoint};
use crate::api::ClientError;
use crate::requester::{RequestResult, Requester};
use crate::resources::DataStore;
use crate::response::{first_error, ApiResponse};
use crate::util::{assert_valid_device_id, assert_valid_project_id};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

#[async_trait]
pub trait ImportService: Endpoint {
    /// Uploads the rows of `store` for `device_id` in table form
    async fn import_batch(
        &self,
        project_id: u64,
        device_id: &str,
        store: &DataStore,
    ) -> Result<ApiResponse<()>, ClientError>;
}

/// The `/imports` resource
#[derive(Default)]
pub struct Imports {
    binding: BindingSlot,
}

impl Imports {
    /// Request body for a table import
    pub fn batch_body(project_id: u64, device_id: &str, store: &DataStore) -> Value {
        json!({
            "project_id": project_id,
            "device_id": device_id,
            "sources": store.to_payload(),
        })
    }
}

impl Endpoint for Imports {
    fn initialize(&self, token: &str, requester: Arc<dyn Requester>) -> Result<(), ClientError> {
        self.binding.bind(token, requester)
    }
}

#[async_trait]
impl ImportService for Imports {
    async fn import_batch(
        &self,
        project_id: u64,
        device_id: &str,
        store: &DataStore,
    ) -> Result<ApiResponse<()>, ClientError> {
        assert_valid_project_id(project_id)?;
        assert_valid_device_id(device_id)?;
        let binding = self.binding.get("imports")?;
        let url = binding.requester.full_endpoint("/imports");

        let body = Imports::batch_body(project_id, device_id, store);
        let request = binding
            .requester
            .post_request(&url, Some(body), Some(&binding.token))
            .query("fmt", "table");
        log::debug!(
            "Importing {} values for device {}",
            store.size(),
            device_id
        );

        let handle_body =
            |resp: &mut ApiResponse<()>, body: Option<&Value>, result: RequestResult| {
                if result != RequestResult::Success {
                    resp.error = first_error(body);
                }
            };
        Ok(execute(binding.requester.as_ref(), request, handle_body).await)
    }
}
