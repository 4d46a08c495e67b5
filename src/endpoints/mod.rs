//! Narrow service interfaces over the REST resources the client talks to.
//!
//! Each endpoint is bound to a token and a requester through [`Endpoint::initialize`] and
//! may be re-bound at any time, e.g. after the project token was refreshed. Operations return
//! `Err` only for misuse or invalid input; network outcomes are always carried by the
//! [`ApiResponse`](crate::response::ApiResponse) envelope.

pub mod data;
pub mod devices;
pub mod exports;
pub mod imports;
pub mod namespaces;
pub mod tokens;

pub use data::{Data, DataOptions, DataService};
pub use devices::{DeviceService, Devices};
pub use exports::{ExportOptions, ExportService, Exports};
pub use imports::{ImportService, Imports};
pub use namespaces::{NamespaceQuery, NamespaceService, Namespaces};
pub use tokens::{Permissions, ProjectToken, TokenService, Tokens};

use crate::api::ClientError;
use crate::requester::{Request, RequestResult, Requester};
use crate::response::{create_inner_cb, ApiResponse};
use crate::util::assert_valid_token;
use serde_json::Value;
use std::sync::{Arc, RwLock};

/// Binding shared by every endpoint
pub trait Endpoint: Send + Sync {
    fn initialize(&self, token: &str, requester: Arc<dyn Requester>) -> Result<(), ClientError>;
}

/// The set of endpoints a client drives
#[derive(Clone)]
pub struct Services {
    pub devices: Arc<dyn DeviceService>,
    pub imports: Arc<dyn ImportService>,
    pub tokens: Arc<dyn TokenService>,
}

impl Default for Services {
    fn default() -> Services {
        Services {
            devices: Arc::new(Devices::default()),
            imports: Arc::new(Imports::default()),
            tokens: Arc::new(Tokens::default()),
        }
    }
}

#[derive(Clone)]
pub(crate) struct Binding {
    pub token: String,
    pub requester: Arc<dyn Requester>,
}

/// Token and requester an endpoint was last initialised with
#[derive(Default)]
pub(crate) struct BindingSlot {
    binding: RwLock<Option<Binding>>,
}

impl BindingSlot {
    pub fn bind(&self, token: &str, requester: Arc<dyn Requester>) -> Result<(), ClientError> {
        assert_valid_token(token)?;
        let mut slot = self
            .binding
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *slot = Some(Binding {
            token: token.to_string(),
            requester,
        });
        Ok(())
    }

    pub fn get(&self, endpoint: &str) -> Result<Binding, ClientError> {
        self.binding
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
            .ok_or_else(|| {
                ClientError::validation(format!("{} endpoint used before initialize", endpoint))
            })
    }
}

/// Runs `request` and collects the envelope built by `handle_body`
pub(crate) async fn execute<T, H>(
    requester: &dyn Requester,
    request: Request,
    handle_body: H,
) -> ApiResponse<T>
where
    T: Send,
    H: FnOnce(&mut ApiResponse<T>, Option<&Value>, RequestResult) + Send,
{
    let mut slot = None;
    {
        let mut callback = create_inner_cb(|resp, ()| slot = Some(resp), (), handle_body);
        requester.execute(request, &mut callback).await;
    }
    slot.unwrap_or_else(|| {
        log::warn!("Requester finished without a terminal outcome");
        ApiResponse::timed_out()
    })
}
