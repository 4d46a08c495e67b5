use super::{execute, BindingSlot, Endpoint};
use crate::api::ClientError;
use crate::requester::{Request, RequestResult, Requester};
use crate::response::{first_error, ApiResponse};
use crate::util::assert_valid_device_id;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Namespace queried when none is given
pub const DEFAULT_NAMESPACE: &str = "input";

/// Optional parameters of a data query. Unset fields are left out of the query string.
///
/// Each `filters` entry is sent as its own `where` pair and reads `comparator(field, value)`,
/// e.g. `gt(temperature,20)`. `group_by` and `operator` are only sent as a pair, and
/// `limit_periods` only along with them.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DataOptions {
    pub limit: Option<u64>,
    pub limit_by: Option<String>,
    pub time: Option<String>,
    pub timefmt: Option<String>,
    pub filters: Vec<String>,
    pub group_by: Option<String>,
    pub operator: Option<String>,
    pub limit_periods: Option<u64>,
    pub output: Option<String>,
}

impl DataOptions {
    fn apply(&self, mut request: Request, device_id: Option<&str>) -> Request {
        if let Some(limit) = self.limit {
            request = request.query("limit", limit);
        }
        for (key, value) in [
            ("limit_by", &self.limit_by),
            ("time", &self.time),
            ("timefmt", &self.timefmt),
        ] {
            if let Some(value) = value {
                request = request.query(key, value);
            }
        }

        for filter in &self.filters {
            request = request.query("where", filter);
        }
        if let Some(device_id) = device_id {
            request = request.query("where", format!("eq(device_id,{})", device_id));
        }

        if let (Some(group_by), Some(operator)) = (&self.group_by, &self.operator) {
            request = request.query("group_by", group_by).query("operator", operator);
            if let Some(periods) = self.limit_periods {
                request = request.query("limit_periods", periods);
            }
        }

        match self.output.as_deref() {
            Some(output @ ("csv" | "json")) => request.query("output", output),
            Some(other) => {
                log::warn!("Unknown output format {}; using json", other);
                request.query("output", "json")
            }
            None => request,
        }
    }
}

#[async_trait]
pub trait DataService: Endpoint {
    /// Reads rows from `namespace`, optionally narrowed to one field and one device
    async fn query(
        &self,
        namespace: &str,
        field: Option<&str>,
        device_id: Option<&str>,
        options: &DataOptions,
    ) -> Result<ApiResponse<Value>, ClientError>;
}

/// The `/data` resource
#[derive(Default)]
pub struct Data {
    binding: BindingSlot,
}

impl Endpoint for Data {
    fn initialize(&self, token: &str, requester: Arc<dyn Requester>) -> Result<(), ClientError> {
        self.binding.bind(token, requester)
    }
}

#[async_trait]
impl DataService for Data {
    async fn query(
        &self,
        namespace: &str,
        field: Option<&str>,
        device_id: Option<&str>,
        options: &DataOptions,
    ) -> Result<ApiResponse<Value>, ClientError> {
        if let Some(device_id) = device_id {
            assert_valid_device_id(device_id)?;
        }
        let namespace = if namespace.is_empty() {
            DEFAULT_NAMESPACE
        } else {
            namespace
        };
        let binding = self.binding.get("data")?;
        let path = match field {
            Some(field) => format!("/data/{}/{}/", namespace, field),
            None => format!("/data/{}/", namespace),
        };
        let url = binding.requester.full_endpoint(&path);
        let request = options.apply(
            binding.requester.get_request(&url, Some(&binding.token)),
            device_id,
        );

        let handle_body =
            |resp: &mut ApiResponse<Value>, body: Option<&Value>, result: RequestResult| {
                if result == RequestResult::Success {
                    resp.body = body.cloned();
                } else {
                    resp.error = first_error(body);
                }
            };
        Ok(execute(binding.requester.as_ref(), request, handle_body).await)
    }
}
