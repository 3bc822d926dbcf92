use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::aggregator::Aggregator;
use crate::backend::{deadline_after, BackendClient};
use crate::config::Config;
use crate::error::{BackendError, DispatchError};
use crate::model::{Operation, Reply, RequestEnvelope, Response, SiteArticle};
use crate::registry::SiteRegistry;

/// Routes a [`RequestEnvelope`] to the right backend or backends.
///
/// Holds nothing request-scoped, so the same envelope can be dispatched any
/// number of times.
pub struct Dispatcher {
    registry: Arc<SiteRegistry>,
    client: Arc<BackendClient>,
    aggregator: Aggregator,
    call_timeout: Duration,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<SiteRegistry>,
        client: Arc<BackendClient>,
        call_timeout: Duration,
        aggregate_ceiling: Duration,
    ) -> Self {
        let aggregator = Aggregator::new(client.clone(), call_timeout, aggregate_ceiling);
        Self {
            registry,
            client,
            aggregator,
            call_timeout,
        }
    }

    pub fn from_config(
        config: &Config,
        registry: Arc<SiteRegistry>,
        client: Arc<BackendClient>,
    ) -> Self {
        Self::new(
            registry,
            client,
            config.call_timeout(),
            config.aggregate_ceiling(),
        )
    }

    pub fn registry(&self) -> &SiteRegistry {
        &self.registry
    }

    pub async fn dispatch(
        &self,
        envelope: &RequestEnvelope,
        cancel: &CancellationToken,
    ) -> Result<Response, DispatchError> {
        let operation = &envelope.operation;

        match (operation, envelope.target_domain.as_deref()) {
            (Operation::Search { .. }, None) => {
                let result = self
                    .aggregator
                    .fan_out(operation, self.registry.all(), cancel)
                    .await;
                if cancel.is_cancelled() {
                    return Err(DispatchError::Cancelled);
                }
                Ok(Response::Aggregate(result))
            }
            (_, None) => Err(DispatchError::MissingTarget {
                operation: operation.name(),
            }),
            (_, Some(domain)) => {
                let reply = self.call_site(domain, operation, cancel).await?;
                Ok(match reply {
                    Reply::Article(article) => Response::Article(SiteArticle::new(domain, article)),
                    Reply::Articles(articles) => Response::Articles(
                        articles
                            .into_iter()
                            .map(|article| SiteArticle::new(domain, article))
                            .collect(),
                    ),
                })
            }
        }
    }

    async fn call_site(
        &self,
        domain: &str,
        operation: &Operation,
        cancel: &CancellationToken,
    ) -> Result<Reply, DispatchError> {
        let site = self.registry.resolve(domain)?;
        let deadline = deadline_after(Instant::now(), self.call_timeout);

        debug!("{} on {} via {}", operation.name(), domain, site.address);
        self.client
            .invoke(&site.address, operation, deadline, cancel)
            .await
            .map_err(|source| match source {
                BackendError::Cancelled => DispatchError::Cancelled,
                source => {
                    warn!("{} on {} failed: {}", operation.name(), domain, source);
                    DispatchError::Backend {
                        domain: domain.to_string(),
                        source,
                    }
                }
            })
    }
}
