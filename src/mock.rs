//! In-memory backends for unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use crate::backend::{Connector, FetcherService};
use crate::error::BackendError;
use crate::model::Article;

/// Article whose timestamp is `secs` after the epoch.
pub fn article(id: &str, secs: i64) -> Article {
    Article {
        id: id.to_string(),
        title: format!("Article {}", id),
        body: format!("Body of article {}", id),
        summary: format!("Summary {}", id),
        timestamp: Utc.timestamp_opt(secs, 0).unwrap(),
        website: None,
    }
}

/// Counts calls that reached a backend and calls that ran to completion.
#[derive(Default)]
pub struct CallCounter {
    started: AtomicUsize,
    finished: AtomicUsize,
}

impl CallCounter {
    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }
}

pub struct MockBackend {
    articles: Vec<Article>,
    delay: Duration,
    failure: Option<BackendError>,
    counter: Arc<CallCounter>,
}

impl MockBackend {
    pub fn new(articles: Vec<Article>) -> Self {
        Self {
            articles,
            delay: Duration::ZERO,
            failure: None,
            counter: Arc::default(),
        }
    }

    pub fn failing(error: BackendError) -> Self {
        Self {
            articles: Vec::new(),
            delay: Duration::ZERO,
            failure: Some(error),
            counter: Arc::default(),
        }
    }

    /// Sleep this long before answering any call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_counter(mut self, counter: Arc<CallCounter>) -> Self {
        self.counter = counter;
        self
    }

    async fn answer(&self) -> Result<Vec<Article>, BackendError> {
        self.counter.started.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.counter.finished.fetch_add(1, Ordering::SeqCst);
        match &self.failure {
            Some(error) => Err(error.clone()),
            None => Ok(self.articles.clone()),
        }
    }
}

#[async_trait]
impl FetcherService for MockBackend {
    async fn list_articles(&self) -> Result<Vec<Article>, BackendError> {
        self.answer().await
    }

    async fn get_article(&self, id: &str) -> Result<Article, BackendError> {
        self.answer()
            .await?
            .into_iter()
            .find(|a| a.id == id)
            .ok_or_else(|| BackendError::Remote {
                status: 404,
                message: format!("article {} not found", id),
            })
    }

    async fn search_articles(&self, _keyword: &str) -> Result<Vec<Article>, BackendError> {
        self.answer().await
    }
}

pub struct MockConnector {
    backends: HashMap<String, Arc<MockBackend>>,
    refusing: Mutex<HashSet<String>>,
    connect_delay: Duration,
    connects: AtomicUsize,
}

impl MockConnector {
    pub fn new() -> Self {
        Self {
            backends: HashMap::new(),
            refusing: Mutex::new(HashSet::new()),
            connect_delay: Duration::ZERO,
            connects: AtomicUsize::new(0),
        }
    }

    pub fn with_backend(mut self, address: &str, backend: MockBackend) -> Self {
        self.backends.insert(address.to_string(), Arc::new(backend));
        self
    }

    pub fn refusing(self, address: &str) -> Self {
        self.set_refusing(address, true);
        self
    }

    pub fn with_connect_delay(mut self, delay: Duration) -> Self {
        self.connect_delay = delay;
        self
    }

    pub fn set_refusing(&self, address: &str, refuse: bool) {
        let mut refusing = self.refusing.lock().unwrap();
        if refuse {
            refusing.insert(address.to_string());
        } else {
            refusing.remove(address);
        }
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, address: &str) -> Result<Arc<dyn FetcherService>, BackendError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.connect_delay).await;

        let refused = self.refusing.lock().unwrap().contains(address);
        match self.backends.get(address) {
            Some(backend) if !refused => Ok(backend.clone() as Arc<dyn FetcherService>),
            _ => Err(BackendError::ConnectionRefused {
                address: address.to_string(),
                reason: "connection refused".to_string(),
            }),
        }
    }
}
