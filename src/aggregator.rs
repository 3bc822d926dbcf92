use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backend::{deadline_after, BackendClient};
use crate::config::SiteConfig;
use crate::error::BackendError;
use crate::model::{AggregateResult, Operation, SiteArticle};

/// Fans one operation out to many sites and merges whatever comes back.
pub struct Aggregator {
    client: Arc<BackendClient>,
    call_timeout: Duration,
    ceiling: Duration,
}

impl Aggregator {
    pub fn new(client: Arc<BackendClient>, call_timeout: Duration, ceiling: Duration) -> Self {
        Self {
            client,
            call_timeout,
            ceiling,
        }
    }

    /// Call every site concurrently and never fail as a whole.
    ///
    /// Each site gets its own deadline; the join is also capped at the
    /// ceiling, and a site still pending then is recorded as timed out.
    pub async fn fan_out(
        &self,
        operation: &Operation,
        sites: &[SiteConfig],
        cancel: &CancellationToken,
    ) -> AggregateResult {
        let started = Instant::now();
        let ceiling = deadline_after(started, self.ceiling);

        let calls = sites.iter().map(|site| async move {
            let deadline = deadline_after(Instant::now(), self.call_timeout);
            let outcome = tokio::time::timeout_at(
                ceiling,
                self.client
                    .invoke(&site.address, operation, deadline, cancel),
            )
            .await
            .unwrap_or(Err(BackendError::DeadlineExceeded));
            (site, outcome)
        });
        let outcomes = join_all(calls).await;

        let mut result = AggregateResult {
            dispatched: sites.iter().map(|site| site.domain.clone()).collect(),
            ..Default::default()
        };

        for (site, outcome) in outcomes {
            match outcome {
                Ok(reply) => {
                    let articles = reply.into_articles();
                    debug!("{} returned {} articles", site.domain, articles.len());
                    result.articles.extend(
                        articles
                            .into_iter()
                            .map(|article| SiteArticle::new(&site.domain, article)),
                    );
                }
                Err(error) => {
                    if error.is_backend_fault() {
                        warn!(
                            "{} on {} failed: {}",
                            operation.name(),
                            site.domain,
                            error
                        );
                    } else {
                        debug!("{} on {} cancelled", operation.name(), site.domain);
                    }
                    result.per_site_errors.insert(site.domain.clone(), error);
                }
            }
        }

        // Stable, so a backend's own order survives exact ties.
        result.articles.sort_by(|a, b| a.merge_order(b));

        info!(
            "{} across {} sites finished in {:?}: {} articles, {} failed",
            operation.name(),
            result.source_count(),
            started.elapsed(),
            result.articles.len(),
            result.failed_count()
        );

        result
    }
}
