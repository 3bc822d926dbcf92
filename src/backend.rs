//! Backend connections.
//!
//! A [`BackendClient`] keeps one [`BackendHandle`] per backend address. The
//! handle dials lazily through a [`Connector`] the first time a call needs it,
//! and concurrent first calls share a single dial. Every call runs under a
//! deadline and can be cancelled; neither case is retried here.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::BackendError;
use crate::model::{Article, Operation, Reply};

/// Stand-in for "no deadline" when a timeout would overflow `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// `start + timeout`, saturating to a far-future instant on overflow.
pub fn deadline_after(start: Instant, timeout: Duration) -> Instant {
    start
        .checked_add(timeout)
        .unwrap_or_else(|| start + FAR_FUTURE)
}

/// Typed remote calls exposed by a per-site fetch service.
#[async_trait]
pub trait FetcherService: Send + Sync {
    async fn list_articles(&self) -> Result<Vec<Article>, BackendError>;

    async fn get_article(&self, id: &str) -> Result<Article, BackendError>;

    async fn search_articles(&self, keyword: &str) -> Result<Vec<Article>, BackendError>;
}

/// Establishes connections to backend addresses.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, address: &str) -> Result<Arc<dyn FetcherService>, BackendError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connected,
}

pub struct BackendHandle {
    address: String,
    service: OnceCell<Arc<dyn FetcherService>>,
}

impl BackendHandle {
    fn new(address: &str) -> Self {
        Self {
            address: address.to_string(),
            service: OnceCell::new(),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn connection_state(&self) -> ConnectionState {
        if self.service.initialized() {
            ConnectionState::Connected
        } else {
            ConnectionState::Idle
        }
    }

    async fn service(
        &self,
        connector: &dyn Connector,
    ) -> Result<Arc<dyn FetcherService>, BackendError> {
        let service = self
            .service
            .get_or_try_init(|| async {
                debug!("Dialing backend {}", self.address);
                connector.connect(&self.address).await
            })
            .await?;
        Ok(service.clone())
    }
}

pub struct BackendClient {
    connector: Arc<dyn Connector>,
    handles: Mutex<HashMap<String, Arc<BackendHandle>>>,
}

impl BackendClient {
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            handles: Mutex::new(HashMap::new()),
        }
    }

    /// Run `operation` against the backend at `address`.
    ///
    /// Connection setup counts against the same deadline as the call itself.
    pub async fn invoke(
        &self,
        address: &str,
        operation: &Operation,
        deadline: Instant,
        cancel: &CancellationToken,
    ) -> Result<Reply, BackendError> {
        let handle = self.handle(address);

        let call = async {
            let service = handle.service(self.connector.as_ref()).await?;
            match operation {
                Operation::List => service.list_articles().await.map(Reply::Articles),
                Operation::Get { id } => service.get_article(id).await.map(Reply::Article),
                Operation::Search { keyword } => {
                    service.search_articles(keyword).await.map(Reply::Articles)
                }
            }
        };

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(BackendError::Cancelled),
            outcome = tokio::time::timeout_at(deadline, call) => {
                outcome.unwrap_or(Err(BackendError::DeadlineExceeded))
            }
        };

        if let Err(BackendError::ConnectionRefused { .. }) = &result {
            self.invalidate(&handle);
        }

        result
    }

    pub fn handle_state(&self, address: &str) -> ConnectionState {
        self.lock_handles()
            .get(address)
            .map(|handle| handle.connection_state())
            .unwrap_or(ConnectionState::Idle)
    }

    /// Drop every cached connection.
    pub fn shutdown(&self) {
        let mut handles = self.lock_handles();
        let connected = handles
            .values()
            .filter(|h| h.connection_state() == ConnectionState::Connected)
            .count();
        handles.clear();
        info!("Closed {} backend connections", connected);
    }

    fn handle(&self, address: &str) -> Arc<BackendHandle> {
        self.lock_handles()
            .entry(address.to_string())
            .or_insert_with(|| Arc::new(BackendHandle::new(address)))
            .clone()
    }

    fn invalidate(&self, handle: &Arc<BackendHandle>) {
        let mut handles = self.lock_handles();
        if let Some(current) = handles.get(handle.address()) {
            // A newer handle may already have replaced this one.
            if Arc::ptr_eq(current, handle) {
                handles.remove(handle.address());
                debug!("Invalidated connection to {}", handle.address());
            }
        }
    }

    fn lock_handles(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<BackendHandle>>> {
        self.handles.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
