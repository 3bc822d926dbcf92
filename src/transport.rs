//! JSON-over-HTTP transport to backend fetch services.
//!
//! Each backend exposes three POST endpoints:
//!
//! - `/v1/articles:list` with `{}` returns `{"articles": [...]}`
//! - `/v1/articles:get` with `{"id": "..."}` returns one article
//! - `/v1/articles:search` with `{"keyword": "..."}` returns `{"articles": [...]}`

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tracing::{debug, info};

use crate::backend::{Connector, FetcherService};
use crate::error::BackendError;
use crate::model::Article;

const USER_AGENT: &str = "NewsGateway/1.0";

#[derive(Serialize)]
struct ListArticlesRequest {}

#[derive(Serialize)]
struct GetArticleRequest<'a> {
    id: &'a str,
}

#[derive(Serialize)]
struct SearchArticlesRequest<'a> {
    keyword: &'a str,
}

#[derive(Deserialize)]
struct ArticlesReply {
    #[serde(default)]
    articles: Vec<Article>,
}

/// Prefix `http://` unless the address already names a scheme.
pub fn base_url(address: &str) -> Result<Url, BackendError> {
    let raw = if address.contains("://") {
        address.to_string()
    } else {
        format!("http://{}", address)
    };
    Url::parse(&raw).map_err(|e| BackendError::Transport(format!("invalid address {}: {}", address, e)))
}

pub struct HttpConnector {
    connect_timeout: Duration,
}

impl HttpConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for HttpConnector {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

#[async_trait]
impl Connector for HttpConnector {
    /// Dial the backend once so an unreachable address fails here, then keep
    /// a dedicated client (and its connection pool) for it.
    async fn connect(&self, address: &str) -> Result<Arc<dyn FetcherService>, BackendError> {
        let base = base_url(address)?;
        let host = base
            .host_str()
            .ok_or_else(|| BackendError::Transport(format!("address {} has no host", address)))?
            .to_string();
        let port = base.port_or_known_default().unwrap_or(80);

        TcpStream::connect((host.as_str(), port))
            .await
            .map_err(|e| BackendError::ConnectionRefused {
                address: address.to_string(),
                reason: e.to_string(),
            })?;

        let client = Client::builder()
            .connect_timeout(self.connect_timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| BackendError::Transport(format!("failed to build client: {}", e)))?;

        info!("Connected to backend {}", address);
        Ok(Arc::new(HttpFetcher {
            client,
            address: address.to_string(),
            base,
        }))
    }
}

pub struct HttpFetcher {
    client: Client,
    address: String,
    base: Url,
}

impl HttpFetcher {
    fn endpoint(&self, method: &str) -> String {
        format!(
            "{}/v1/articles:{}",
            self.base.as_str().trim_end_matches('/'),
            method
        )
    }

    async fn call<Req, Resp>(&self, method: &str, body: &Req) -> Result<Resp, BackendError>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let url = self.endpoint(method);
        debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(BackendError::Remote {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<Resp>()
            .await
            .map_err(|e| BackendError::Transport(format!("invalid {} response: {}", method, e)))
    }

    fn classify(&self, err: reqwest::Error) -> BackendError {
        if err.is_connect() {
            BackendError::ConnectionRefused {
                address: self.address.clone(),
                reason: err.to_string(),
            }
        } else if err.is_timeout() {
            BackendError::DeadlineExceeded
        } else {
            BackendError::Transport(err.to_string())
        }
    }
}

#[async_trait]
impl FetcherService for HttpFetcher {
    async fn list_articles(&self) -> Result<Vec<Article>, BackendError> {
        let reply: ArticlesReply = self.call("list", &ListArticlesRequest {}).await?;
        Ok(reply.articles)
    }

    async fn get_article(&self, id: &str) -> Result<Article, BackendError> {
        self.call("get", &GetArticleRequest { id }).await
    }

    async fn search_articles(&self, keyword: &str) -> Result<Vec<Article>, BackendError> {
        let reply: ArticlesReply = self
            .call("search", &SearchArticlesRequest { keyword })
            .await?;
        Ok(reply.articles)
    }
}
