use super::{execute, BindingSlot, Endpoint};
use crate::api::ClientError;
use crate::requester::{Request, Requester};
use crate::response::{parse_body, ApiResponse};
use crate::util::{assert_valid_device_id, assert_valid_project_id};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Optional filters for an export query. Unset fields are left out of the query string.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExportOptions {
    pub limit: Option<u64>,
    pub from: Option<i64>,
    pub to: Option<i64>,
    pub output: Option<String>,
    pub group_by: Option<String>,
    pub operator: Option<String>,
    pub timefmt: Option<String>,
}

impl ExportOptions {
    fn apply(&self, mut request: Request) -> Request {
        if let Some(limit) = self.limit {
            request = request.query("limit", limit);
        }
        if let Some(from) = self.from {
            request = request.query("from", from);
        }
        if let Some(to) = self.to {
            request = request.query("to", to);
        }
        for (key, value) in [
            ("output", &self.output),
            ("group_by", &self.group_by),
            ("operator", &self.operator),
            ("timefmt", &self.timefmt),
        ] {
            if let Some(value) = value {
                request = request.query(key, value);
            }
        }
        request
    }
}

/// The `/exports` resource, for reading data back
#[derive(Default)]
pub struct Exports {
    binding: BindingSlot,
}

impl Endpoint for Exports {
    fn initialize(&self, token: &str, requester: Arc<dyn Requester>) -> Result<(), ClientError> {
        self.binding.bind(token, requester)
    }
}

#[async_trait]
pub trait ExportService: Endpoint {
    /// Fetches data for one device and series; `None` selects all of them
    async fn query(
        &self,
        project_id: u64,
        device_id: Option<&str>,
        series: Option<&str>,
        options: &ExportOptions,
    ) -> Result<ApiResponse<Value>, ClientError>;
}

#[async_trait]
impl ExportService for Exports {
    async fn query(
        &self,
        project_id: u64,
        device_id: Option<&str>,
        series: Option<&str>,
        options: &ExportOptions,
    ) -> Result<ApiResponse<Value>, ClientError> {
        assert_valid_project_id(project_id)?;
        if let Some(device_id) = device_id {
            assert_valid_device_id(device_id)?;
        }
        let binding = self.binding.get("exports")?;
        let path = format!(
            "/exports/{}/{}/{}",
            project_id,
            device_id.unwrap_or("all"),
            series.unwrap_or("all")
        );
        let url = binding.requester.full_endpoint(&path);
        let request = options.apply(binding.requester.get_request(&url, Some(&binding.token)));

        Ok(execute(binding.requester.as_ref(), request, parse_body).await)
    }
}
