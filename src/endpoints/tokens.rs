use super::{execute, Endpoint};
use crate::api::ClientError;
use crate::requester::Requester;
use crate::response::{parse_body, ApiResponse};
use crate::util::{assert_valid_project_id, assert_valid_token};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::{Arc, PoisonError, RwLock};

/// Access requested for a project token
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Permissions {
    pub read: bool,
    pub write: bool,
    pub admin: bool,
}

/// A project token as issued or refreshed by the server
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct ProjectToken {
    pub token: String,
    #[serde(default)]
    pub expires: Option<String>,
    #[serde(default)]
    pub project_id: Option<u64>,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub write: bool,
    #[serde(default)]
    pub admin: bool,
}

#[async_trait]
pub trait TokenService: Endpoint {
    /// Exchanges user credentials for a user token
    async fn get_user_token(
        &self,
        username: &str,
        password: &str,
    ) -> Result<ApiResponse<Value>, ClientError>;

    async fn get_project_token(
        &self,
        project_id: u64,
        permissions: Permissions,
        user_token: &str,
    ) -> Result<ApiResponse<ProjectToken>, ClientError>;

    /// Trades a (possibly expired) project token for a fresh one
    async fn refresh_project_token(
        &self,
        project_token: &str,
    ) -> Result<ApiResponse<ProjectToken>, ClientError>;
}

/// The `/tokens` resource. Every operation carries its own credentials, so only the
/// requester of the binding is used.
#[derive(Default)]
pub struct Tokens {
    requester: RwLock<Option<Arc<dyn Requester>>>,
}

impl Tokens {
    fn requester(&self) -> Result<Arc<dyn Requester>, ClientError> {
        self.requester
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| ClientError::validation("tokens endpoint used before initialize"))
    }
}

impl Endpoint for Tokens {
    fn initialize(&self, _token: &str, requester: Arc<dyn Requester>) -> Result<(), ClientError> {
        *self.requester.write().unwrap_or_else(PoisonError::into_inner) = Some(requester);
        Ok(())
    }
}

#[async_trait]
impl TokenService for Tokens {
    async fn get_user_token(
        &self,
        username: &str,
        password: &str,
    ) -> Result<ApiResponse<Value>, ClientError> {
        let requester = self.requester()?;
        let url = requester.full_endpoint("/tokens/user");
        let credentials = STANDARD.encode(format!("{}:{}", username, password));
        let request = requester
            .get_request(&url, None)
            .header("Authorization", format!("Basic {}", credentials));

        Ok(execute(requester.as_ref(), request, parse_body).await)
    }

    async fn get_project_token(
        &self,
        project_id: u64,
        permissions: Permissions,
        user_token: &str,
    ) -> Result<ApiResponse<ProjectToken>, ClientError> {
        assert_valid_project_id(project_id)?;
        assert_valid_token(user_token)?;
        let requester = self.requester()?;
        let url = requester.full_endpoint("/tokens/project");
        let request = requester
            .get_request(&url, Some(user_token))
            .query("read", permissions.read)
            .query("write", permissions.write)
            .query("admin", permissions.admin)
            .query("project_id", project_id)
            .query("include_user", false);

        Ok(execute(requester.as_ref(), request, parse_body).await)
    }

    async fn refresh_project_token(
        &self,
        project_token: &str,
    ) -> Result<ApiResponse<ProjectToken>, ClientError> {
        assert_valid_token(project_token)?;
        let requester = self.requester()?;
        let url = requester.full_endpoint("/tokens/project");
        let request =
            requester.post_request(&url, Some(json!({ "refresh_token": project_token })), None);

        log::debug!("Refreshing project token");
        Ok(execute(requester.as_ref(), request, parse_body).await)
    }
}
