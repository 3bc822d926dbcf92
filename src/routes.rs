use std::sync::Arc;

use askama::Template;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::config::SiteConfig;
use crate::dispatcher::Dispatcher;
use crate::error::{BackendError, DispatchError};
use crate::filters;
use crate::model::{RequestEnvelope, Response as DispatchResponse, SiteArticle};

pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
}

pub fn router(state: Arc<AppState>, static_dir: &str) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/list/", get(list))
        .route("/article/", get(article))
        .route("/search/", get(search))
        .route("/health", get(health))
        .nest_service("/s", ServeDir::new(static_dir))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// Template structs
#[derive(Template)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub sites: Vec<SiteConfig>,
}

#[derive(Template)]
#[template(path = "list.html")]
pub struct ListTemplate {
    pub title: String,
    pub domain: String,
    pub articles: Vec<SiteArticle>,
}

#[derive(Template)]
#[template(path = "article.html")]
pub struct ArticleTemplate {
    pub item: SiteArticle,
}

#[derive(Template)]
#[template(path = "search.html")]
pub struct SearchTemplate {
    pub keyword: String,
    pub articles: Vec<SiteArticle>,
    pub failures: Vec<SiteFailure>,
    pub failed: usize,
    pub total: usize,
}

pub struct SiteFailure {
    pub domain: String,
    pub reason: String,
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub status: u16,
    pub message: String,
}

// Wrapper for HTML responses
struct HtmlTemplate<T>(T);

impl<T: Template> IntoResponse for HtmlTemplate<T> {
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(html) => Html(html).into_response(),
            Err(err) => {
                error!("Failed to render template: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Failed to render template: {}", err),
                )
                    .into_response()
            }
        }
    }
}

pub struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    fn unexpected(what: &str) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: format!("unexpected {} response", what),
        }
    }
}

impl From<DispatchError> for AppError {
    fn from(err: DispatchError) -> Self {
        let status = match &err {
            DispatchError::UnknownSite(_) => StatusCode::NOT_FOUND,
            DispatchError::MissingTarget { .. } => StatusCode::BAD_REQUEST,
            DispatchError::Backend {
                source: BackendError::DeadlineExceeded,
                ..
            } => StatusCode::GATEWAY_TIMEOUT,
            DispatchError::Backend {
                source: BackendError::Remote { status: 404, .. },
                ..
            } => StatusCode::NOT_FOUND,
            DispatchError::Backend { .. } => StatusCode::BAD_GATEWAY,
            DispatchError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let page = ErrorTemplate {
            status: self.status.as_u16(),
            message: self.message,
        };
        (self.status, HtmlTemplate(page)).into_response()
    }
}

/// Dispatch on behalf of one HTTP request. Dropping the handler future
/// cancels every backend call still in flight.
async fn dispatch(
    state: &AppState,
    envelope: &RequestEnvelope,
) -> Result<DispatchResponse, DispatchError> {
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();
    state.dispatcher.dispatch(envelope, &cancel).await
}

// Route handlers
pub async fn home(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    HtmlTemplate(HomeTemplate {
        sites: state.dispatcher.registry().all().to_vec(),
    })
}

#[derive(Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub v: String,
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let title = state
        .dispatcher
        .registry()
        .resolve(&query.v)
        .map(|site| site.title().to_string())?;

    match dispatch(&state, &RequestEnvelope::list(query.v.clone())).await? {
        DispatchResponse::Articles(articles) => Ok(HtmlTemplate(ListTemplate {
            title,
            domain: query.v,
            articles,
        })),
        _ => Err(AppError::unexpected("list")),
    }
}

#[derive(Deserialize)]
pub struct ArticleQuery {
    #[serde(default)]
    pub website: String,
    #[serde(default)]
    pub id: String,
}

pub async fn article(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ArticleQuery>,
) -> Result<impl IntoResponse, AppError> {
    let envelope = RequestEnvelope::get(query.website, query.id);
    match dispatch(&state, &envelope).await? {
        DispatchResponse::Article(item) => Ok(HtmlTemplate(ArticleTemplate { item })),
        _ => Err(AppError::unexpected("article")),
    }
}

#[derive(Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub v: String,
    #[serde(default)]
    pub website: Option<String>,
}

pub async fn search(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> Result<impl IntoResponse, AppError> {
    let keyword = query.v.trim().to_string();
    let website = query.website.filter(|w| !w.is_empty());

    if keyword.is_empty() {
        return Ok(HtmlTemplate(SearchTemplate {
            keyword,
            articles: Vec::new(),
            failures: Vec::new(),
            failed: 0,
            total: 0,
        }));
    }

    let envelope = RequestEnvelope::search(keyword.clone(), website);
    let page = match dispatch(&state, &envelope).await? {
        DispatchResponse::Aggregate(result) => SearchTemplate {
            keyword,
            failed: result.failed_count(),
            total: result.source_count(),
            failures: result
                .per_site_errors
                .iter()
                .map(|(domain, err)| SiteFailure {
                    domain: domain.clone(),
                    reason: err.to_string(),
                })
                .collect(),
            articles: result.articles,
        },
        DispatchResponse::Articles(articles) => SearchTemplate {
            keyword,
            articles,
            failures: Vec::new(),
            failed: 0,
            total: 1,
        },
        DispatchResponse::Article(_) => return Err(AppError::unexpected("search")),
    };

    Ok(HtmlTemplate(page))
}

pub async fn health() -> impl IntoResponse {
    Html("OK")
}
