use crate::api::{ClientError, ConnectionSettings};
use crate::client::{Client, ClientParts};
use crate::endpoints::Services;
#[cfg(feature = "config")]
use crate::extras::config::ClientConfig;
use crate::requester::Requester;
use crate::resources::Device;
use crate::token::{JwtExpiry, TokenValidator};
use crate::util::{assert_valid_device_id, assert_valid_project_id, assert_valid_token};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

type RegisterCallback = Box<dyn FnOnce(Result<Device, ClientError>) + Send>;

struct Registration {
    device: Option<Device>,
    callback: RegisterCallback,
    set_on_dupe: bool,
}

/// The `Builder` collects everything needed to wire up a [`Client`].
///
/// Properties:
///
/// * `project_id`: The project the client sends data to. Validated when the builder is created.
/// * `token`: The project token the endpoints authenticate with. It is replaced on the client
/// whenever it expires and a refresh succeeds.
/// * `device_id`: A known device id. When unset the client tries the save path, and otherwise
/// waits for a registration.
/// * `save_path`: Directory in which the device id is saved, so the next client for the same
/// project can pick it up again.
/// * `settings`: Connection settings for the default HTTP requester. Ignored when a requester
/// is supplied with `set_requester`.
/// * `requester`, `validator`, `services`: Replacements for the default transport, token
/// expiry check and endpoints.
/// * `registration`: A registration to queue as soon as the client exists.
///
/// Nothing touches the network before `build`.
pub struct Builder {
    project_id: u64,
    token: String,
    device_id: Option<String>,
    save_path: Option<PathBuf>,
    settings: ConnectionSettings,
    requester: Option<Arc<dyn Requester>>,
    validator: Option<Arc<dyn TokenValidator>>,
    services: Option<Services>,
    registration: Option<Registration>,
}

impl Builder {
    pub fn new(project_id: u64, token: &str) -> Result<Builder, ClientError> {
        assert_valid_project_id(project_id)?;
        assert_valid_token(token)?;

        Ok(Builder {
            project_id,
            token: token.to_string(),
            device_id: None,
            save_path: None,
            settings: ConnectionSettings::default(),
            requester: None,
            validator: None,
            services: None,
            registration: None,
        })
    }

    /// Seeds a builder from a file based configuration
    #[cfg(feature = "config")]
    pub fn from_config(config: &ClientConfig) -> Result<Builder, ClientError> {
        let mut builder = Builder::new(config.project_id, &config.token)?;
        if let Some(device_id) = &config.device_id {
            builder = builder.set_device_id(device_id)?;
        }
        if let Some(save_path) = &config.save_path {
            builder = builder.set_save_path(save_path);
        }
        if let Some(base_url) = &config.base_url {
            builder = builder.set_backend(base_url)?;
        }
        if let Some(timeout_ms) = config.timeout_ms {
            builder = builder.set_timeout(Duration::from_millis(timeout_ms));
        }
        Ok(builder)
    }

    pub fn set_device_id(mut self, device_id: &str) -> Result<Builder, ClientError> {
        assert_valid_device_id(device_id)?;
        self.device_id = Some(device_id.to_string());
        Ok(self)
    }

    pub fn set_save_path(mut self, path: impl Into<PathBuf>) -> Builder {
        self.save_path = Some(path.into());
        self
    }

    /// Points the default requester at another deployment, e.g. `http://localhost:8080/v1`
    pub fn set_backend(mut self, base_url: &str) -> Result<Builder, ClientError> {
        url::Url::parse(base_url)?;
        self.settings.base_url = base_url.to_string();
        Ok(self)
    }

    pub fn set_timeout(mut self, timeout: Duration) -> Builder {
        self.settings.timeout = timeout;
        self
    }

    pub fn set_connection_settings(mut self, settings: ConnectionSettings) -> Builder {
        self.settings = settings;
        self
    }

    /// Uses `requester` instead of building an HTTP requester from the connection settings.
    /// Several clients may share one requester.
    pub fn set_requester(mut self, requester: Arc<dyn Requester>) -> Builder {
        self.requester = Some(requester);
        self
    }

    pub fn set_token_validator(mut self, validator: Arc<dyn TokenValidator>) -> Builder {
        self.validator = Some(validator);
        self
    }

    pub fn set_services(mut self, services: Services) -> Builder {
        self.services = Some(services);
        self
    }

    /// Queues a registration right after the client is built. See [`Client::register`].
    pub fn register<F>(mut self, device: Option<Device>, callback: F, set_on_dupe: bool) -> Builder
    where
        F: FnOnce(Result<Device, ClientError>) + Send + 'static,
    {
        self.registration = Some(Registration {
            device,
            callback: Box::new(callback),
            set_on_dupe,
        });
        self
    }

    /// Builds the client and starts the requested registration, if any.
    ///
    /// Must be called from within a tokio runtime; the client's operations are executed on it.
    pub fn build(self) -> Result<Client, ClientError> {
        let requester = match self.requester {
            Some(requester) => requester,
            None => default_requester(self.settings)?,
        };
        let validator = self
            .validator
            .unwrap_or_else(|| Arc::new(JwtExpiry) as Arc<dyn TokenValidator>);

        let client = Client::new(ClientParts {
            project_id: self.project_id,
            token: self.token,
            device_id: self.device_id,
            save_path: self.save_path,
            requester,
            validator,
            services: self.services.unwrap_or_default(),
        })?;

        if let Some(registration) = self.registration {
            client.register(
                registration.device,
                registration.callback,
                registration.set_on_dupe,
            );
        }
        Ok(client)
    }
}

#[cfg(feature = "http")]
fn default_requester(settings: ConnectionSettings) -> Result<Arc<dyn Requester>, ClientError> {
    let requester = crate::httpclient::HttpRequester::new(Arc::new(settings))?;
    Ok(Arc::new(requester))
}

#[cfg(not(feature = "http"))]
fn default_requester(_settings: ConnectionSettings) -> Result<Arc<dyn Requester>, ClientError> {
    Err(ClientError::validation(
        "No requester configured; enable the `http` feature or call set_requester",
    ))
}
