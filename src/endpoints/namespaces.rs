use super::{execute, BindingSlot, Endpoint};
use crate::api::ClientError;
use crate::requester::{RequestResult, Requester};
use crate::response::{first_error, ApiResponse};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Which namespaces a query returns
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum NamespaceQuery {
    /// Every namespace the token can see
    #[default]
    All,
    Name(String),
    Id(u64),
}

#[async_trait]
pub trait NamespaceService: Endpoint {
    async fn query(&self, query: &NamespaceQuery) -> Result<ApiResponse<Value>, ClientError>;
}

/// The `/namespaces` resource
#[derive(Default)]
pub struct Namespaces {
    binding: BindingSlot,
}

impl Endpoint for Namespaces {
    fn initialize(&self, token: &str, requester: Arc<dyn Requester>) -> Result<(), ClientError> {
        self.binding.bind(token, requester)
    }
}

#[async_trait]
impl NamespaceService for Namespaces {
    async fn query(&self, query: &NamespaceQuery) -> Result<ApiResponse<Value>, ClientError> {
        if *query == NamespaceQuery::Name(String::new()) {
            return Err(ClientError::validation("Namespace name must not be empty"));
        }
        let binding = self.binding.get("namespaces")?;
        let path = match query {
            NamespaceQuery::Id(id) => format!("/namespaces/{}", id),
            _ => "/namespaces/".to_string(),
        };
        let url = binding.requester.full_endpoint(&path);
        let mut request = binding.requester.get_request(&url, Some(&binding.token));
        if let NamespaceQuery::Name(name) = query {
            request = request.query("name", name);
        }
        log::debug!("Querying namespaces: {:?}", query);

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
