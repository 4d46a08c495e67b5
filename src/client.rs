use crate::api::ClientError;
use crate::endpoints::Services;
use crate::persist;
use crate::queue::{Operation, OperationQueue, State};
use crate::requester::Requester;
use crate::resources::{DataStore, Device};
use crate::token::TokenValidator;
use crate::util::{assert_valid_device_id, assert_valid_project_id, assert_valid_token};
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

/// Everything the builder hands over to construct a client
pub(crate) struct ClientParts {
    pub project_id: u64,
    pub token: String,
    pub device_id: Option<String>,
    pub save_path: Option<PathBuf>,
    pub requester: Arc<dyn Requester>,
    pub validator: Arc<dyn TokenValidator>,
    pub services: Services,
}

struct Shared {
    project_id: u64,
    token: RwLock<String>,
    device_id: RwLock<Option<String>>,
    save_path: Option<PathBuf>,
    data_stores: Mutex<Vec<Arc<DataStore>>>,
    requester: Arc<dyn Requester>,
    validator: Arc<dyn TokenValidator>,
    services: Services,
    pending_registrations: AtomicUsize,
    refresh_queued: AtomicBool,
}

/// Releases a pending registration slot when dropped, also on unwind
struct PendingRegistration(Arc<Shared>);

impl PendingRegistration {
    fn new(shared: Arc<Shared>) -> PendingRegistration {
        shared.pending_registrations.fetch_add(1, Ordering::SeqCst);
        PendingRegistration(shared)
    }
}

impl Drop for PendingRegistration {
    fn drop(&mut self) {
        self.0.pending_registrations.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Clears the queued refresh flag when dropped, also on unwind
struct QueuedRefresh(Arc<Shared>);

impl Drop for QueuedRefresh {
    fn drop(&mut self) {
        self.0.refresh_queued.store(false, Ordering::SeqCst);
    }
}

/// Awaits `fut`, turning a panic into `ClientError::Aborted`
async fn guarded<T, F>(what: &str, fut: F) -> Result<T, ClientError>
where
    F: Future<Output = Result<T, ClientError>>,
{
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(result) => result,
        Err(_) => {
            log::error!("{} panicked", what);
            Err(ClientError::Aborted(format!("{} panicked", what)))
        }
    }
}

impl Shared {
    fn token(&self) -> String {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn device_id(&self) -> Option<String> {
        self.device_id
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn store_device_id(&self, device_id: &str) {
        *self.device_id.write().unwrap_or_else(PoisonError::into_inner) =
            Some(device_id.to_string());
        if let Some(dir) = &self.save_path {
            persist::write_device_id(dir, self.project_id, device_id);
        }
    }

    /// Swaps in a refreshed token and re-binds the endpoints that authenticate with it
    fn update_token(&self, token: String) {
        if let Err(e) = assert_valid_token(&token) {
            log::warn!("Refreshed token rejected: {}", e);
            return;
        }
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = token.clone();

        if let Err(e) = self
            .services
            .devices
            .initialize(&token, self.requester.clone())
        {
            log::warn!("Unable to re-bind devices endpoint: {}", e);
        }
        if let Err(e) = self
            .services
            .imports
            .initialize(&token, self.requester.clone())
        {
            log::warn!("Unable to re-bind imports endpoint: {}", e);
        }
    }

    async fn refresh_token(&self) {
        let current = self.token();
        match self.services.tokens.refresh_project_token(&current).await {
            Ok(resp) => match resp.into_result() {
                Ok(Some(fresh)) => {
                    log::info!("Project token refreshed");
                    self.update_token(fresh.token);
                }
                Ok(None) => log::warn!("Token refresh returned no token; keeping the current one"),
                Err(e) => log::warn!(
                    "Project token refresh failed: {}; continuing with the current token",
                    e
                ),
            },
            Err(e) => log::warn!("Project token refresh not attempted: {}", e),
        }
    }

    async fn register(
        &self,
        device: Option<Device>,
        set_on_dupe: bool,
    ) -> Result<Device, ClientError> {
        // An earlier operation in the queue may have settled the id in the meantime
        if let Some(current) = self.device_id() {
            log::debug!("Device {} already registered", current);
            return Device::new(current);
        }

        let resp = self
            .services
            .devices
            .register(self.project_id, device.as_ref())
            .await?;
        let code = resp.code;
        match resp.into_result() {
            Ok(Some(registered)) => {
                log::info!("Registered device {}", registered.id());
                self.store_device_id(registered.id());
                Ok(registered)
            }
            Ok(None) => match device {
                Some(requested) => {
                    self.store_device_id(requested.id());
                    Ok(requested)
                }
                None => Err(ClientError::Api {
                    code,
                    error_code: None,
                    message: "registration response carried no device".to_string(),
                }),
            },
            Err(e) if set_on_dupe && e.is_duplicate_device() => match device {
                Some(requested) => {
                    log::info!("Device {} already exists; adopting it", requested.id());
                    self.store_device_id(requested.id());
                    Ok(requested)
                }
                None => Err(e),
            },
            Err(e) => Err(e),
        }
    }

    async fn import(&self, store: &DataStore) -> Result<(), ClientError> {
        let device_id = self.device_id().ok_or_else(|| {
            ClientError::validation("Device id not set; register the device before sending")
        })?;
        let resp = self
            .services
            .imports
            .import_batch(self.project_id, &device_id, store)
            .await?;
        resp.into_result().map(|_| ())
    }
}

/// A client for one project, and optionally one device.
///
/// Network operations (`register`, `send` and the token refreshes they may trigger) go through
/// a per-client FIFO queue with a single in-flight slot: an operation's network call never
/// starts before the previous operation's callback has returned. Input errors are returned
/// directly and never reach the queue; network outcomes are always delivered to callbacks.
///
/// Clones share the same state and queue. Independently built clients share nothing except
/// what was explicitly handed to both (e.g. a requester).
#[derive(Clone)]
pub struct Client {
    shared: Arc<Shared>,
    queue: OperationQueue,
}

impl Client {
    pub(crate) fn new(parts: ClientParts) -> Result<Client, ClientError> {
        assert_valid_project_id(parts.project_id)?;
        assert_valid_token(&parts.token)?;
        let queue = OperationQueue::new()?;

        let device_id = match parts.device_id {
            Some(id) => {
                assert_valid_device_id(&id)?;
                if let Some(dir) = &parts.save_path {
                    persist::write_device_id(dir, parts.project_id, &id);
                }
                Some(id)
            }
            None => parts
                .save_path
                .as_deref()
                .and_then(|dir| persist::read_device_id(dir, parts.project_id)),
        };

        let services = parts.services;
        services
            .devices
            .initialize(&parts.token, parts.requester.clone())?;
        services
            .imports
            .initialize(&parts.token, parts.requester.clone())?;
        services
            .tokens
            .initialize(&parts.token, parts.requester.clone())?;

        log::debug!(
            "Client for project {} created with device {:?}",
            parts.project_id,
            device_id
        );
        Ok(Client {
            shared: Arc::new(Shared {
                project_id: parts.project_id,
                token: RwLock::new(parts.token),
                device_id: RwLock::new(device_id),
                save_path: parts.save_path,
                data_stores: Mutex::new(vec![]),
                requester: parts.requester,
                validator: parts.validator,
                services,
                pending_registrations: AtomicUsize::new(0),
                refresh_queued: AtomicBool::new(false),
            }),
            queue,
        })
    }

    pub fn project_id(&self) -> u64 {
        self.shared.project_id
    }

    /// The project token currently in use; replaced whenever a refresh succeeds
    pub fn token(&self) -> String {
        self.shared.token()
    }

    pub fn device_id(&self) -> Option<String> {
        self.shared.device_id()
    }

    /// Sets the device id explicitly, saving it if a save path was configured
    pub fn set_device_id(&self, device_id: &str) -> Result<(), ClientError> {
        assert_valid_device_id(device_id)?;
        self.shared.store_device_id(device_id);
        Ok(())
    }

    /// Creates a store with `columns` and tracks it for `send`
    pub fn create_data_store<I, S>(&self, columns: I) -> Result<Arc<DataStore>, ClientError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let store = Arc::new(DataStore::new(columns)?);
        self.add_data_store(store.clone());
        Ok(store)
    }

    /// Tracks a store built by the caller. Adding the same store twice has no effect.
    pub fn add_data_store(&self, store: Arc<DataStore>) {
        let mut stores = self
            .shared
            .data_stores
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if stores.iter().any(|s| Arc::ptr_eq(s, &store)) {
            log::debug!("Data store already tracked");
            return;
        }
        stores.push(store);
    }

    pub fn data_stores(&self) -> Vec<Arc<DataStore>> {
        self.shared
            .data_stores
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Whether an operation is currently executing
    pub fn queue_state(&self) -> State {
        self.queue.state()
    }

    /// Registers `device` (or lets the server pick an id when `None`).
    ///
    /// When a device id is already set nothing is sent and `callback` receives the existing
    /// device right away. Otherwise the registration is queued; on success the returned id
    /// becomes this client's device id. With `set_on_dupe`, a "duplicate id" rejection is
    /// treated as success and the requested id is adopted as is.
    pub fn register<F>(&self, device: Option<Device>, callback: F, set_on_dupe: bool)
    where
        F: FnOnce(Result<Device, ClientError>) + Send + 'static,
    {
        if let Some(current) = self.device_id() {
            match device.as_ref().map(Device::id) {
                Some(requested) if requested != current => log::warn!(
                    "Device id already set to {}; not registering {}",
                    current,
                    requested
                ),
                _ => log::debug!("Device {} already registered", current),
            }
            callback(Device::new(current));
            return;
        }

        let pending = PendingRegistration::new(self.shared.clone());
        let shared = self.shared.clone();
        let op: Operation = Box::new(move || {
            async move {
                let result =
                    guarded("Registration", shared.register(device, set_on_dupe)).await;
                drop(pending);
                callback(result);
            }
            .boxed()
        });
        self.enqueue_with_refresh(vec![op]);
    }

    /// Sends every tracked store that holds rows.
    ///
    /// Each such store is snapshotted and reset, and the snapshot is queued for upload;
    /// `callback` is then called once per store with the outcome and the snapshot, so failed
    /// rows can be re-added. Empty stores are reported as sent right away.
    ///
    /// Fails without touching any store when no device id is set and no registration is
    /// pending; `callback` is not called in that case. If a pending registration does not
    /// produce an id, the queued sends report a validation error through `callback` instead.
    pub fn send<F>(&self, callback: F) -> Result<(), ClientError>
    where
        F: Fn(Result<(), ClientError>, DataStore) + Send + Sync + 'static,
    {
        if self.device_id().is_none()
            && self.shared.pending_registrations.load(Ordering::SeqCst) == 0
        {
            return Err(ClientError::validation(
                "Device id not set; register or set a device id before sending",
            ));
        }

        let callback = Arc::new(callback);
        let mut ops: Vec<Operation> = vec![];
        for store in self.data_stores() {
            let snapshot = store.detach();
            if snapshot.is_empty() {
                (*callback)(Ok(()), snapshot);
                continue;
            }

            let shared = self.shared.clone();
            let callback = callback.clone();
            ops.push(Box::new(move || {
                async move {
                    let result = guarded("Send", shared.import(&snapshot)).await;
                    if let Err(e) = &result {
                        log::warn!("Sending {} values failed: {}", snapshot.size(), e);
                    }
                    (*callback)(result, snapshot);
                }
                .boxed()
            }));
        }

        if !ops.is_empty() {
            self.enqueue_with_refresh(ops);
        }
        Ok(())
    }

    /// Queues `ops`, preceded by a token refresh when the current token has expired
    fn enqueue_with_refresh(&self, mut ops: Vec<Operation>) {
        let token = self.shared.token();
        if self.shared.validator.is_expired(&token)
            && !self.shared.refresh_queued.swap(true, Ordering::SeqCst)
        {
            log::info!("Project token expired; refreshing before the next operation");
            let queued = QueuedRefresh(self.shared.clone());
            ops.insert(
                0,
                Box::new(move || {
                    async move {
                        let _ = guarded("Token refresh", async {
                            queued.0.refresh_token().await;
                            Ok::<(), ClientError>(())
                        })
                        .await;
                        drop(queued);
                    }
                    .boxed()
                }),
            );
        }
        self.queue.enqueue_all(ops);
    }
}
