//! Blog server with on-demand generation and background revalidation
//!
//! Generated pages are served from the public directory. A post that was not
//! generated at build time is generated on the first request while the
//! visitor sees a loading placeholder. Pages older than `revalidate_secs`
//! are still served, and regenerated in the background.

use anyhow::Result;
use axum::{
    body::Body,
    extract::{Path as UrlPath, Query, State},
    http::{header, Request, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use url::Url;

use crate::content::{DetailRegistry, DetailState, Lookup};
use crate::feed;
use crate::generator::{post_route, Generator, LIST_ROUTE};
use crate::helpers::is_route_safe;
use crate::provider::without_access_token;
use crate::Blog;

/// Server state
pub struct AppState {
    generator: Arc<Generator>,
    registry: DetailRegistry,
    /// Routes with a regeneration in flight
    revalidating: Mutex<HashSet<String>>,
    /// Generate unknown posts and revalidate stale pages
    on_demand: bool,
}

impl AppState {
    pub fn new(generator: Generator, on_demand: bool) -> Self {
        // a missing post is asked for again once a page would be revalidated
        let registry = DetailRegistry::new(generator.blog().config.revalidate_after());
        Self {
            generator: Arc::new(generator),
            registry,
            revalidating: Mutex::new(HashSet::new()),
            on_demand,
        }
    }

    pub fn registry(&self) -> &DetailRegistry {
        &self.registry
    }

    /// Whether a cursor points at the configured content service
    fn trusts_cursor(&self, cursor: &str) -> bool {
        let endpoint = &self.generator.blog().config.provider.endpoint;
        match (Url::parse(cursor), Url::parse(endpoint)) {
            (Ok(cursor), Ok(endpoint)) => {
                matches!(cursor.scheme(), "http" | "https")
                    && cursor.scheme() == endpoint.scheme()
                    && cursor.host_str().is_some()
                    && cursor.host_str() == endpoint.host_str()
                    && cursor.port_or_known_default() == endpoint.port_or_known_default()
            }
            _ => false,
        }
    }
}

/// A page that can be regenerated
#[derive(Debug, Clone, PartialEq, Eq)]
enum Target {
    List,
    Post(String),
}

impl Target {
    fn route(&self) -> String {
        match self {
            Target::List => LIST_ROUTE.to_string(),
            Target::Post(uid) => post_route(uid),
        }
    }
}

/// Start the blog server
pub async fn start(blog: &Blog, ip: &str, port: u16, on_demand: bool) -> Result<()> {
    let generator = Generator::new(blog, blog.provider()?)?;

    if on_demand {
        match generator.generate(false).await {
            Ok(report) => tracing::info!(
                "Generated {} of {} posts ({} files written)",
                report.ready,
                report.posts,
                report.written
            ),
            Err(e) => tracing::warn!("Initial generation failed, serving existing output: {:#}", e),
        }
    }

    let app = router(Arc::new(AppState::new(generator, on_demand)));

    // Parse address - handle "localhost" specially
    let bind_ip = if ip == "localhost" { "127.0.0.1" } else { ip };
    let addr: SocketAddr = format!("{}:{}", bind_ip, port).parse()?;

    println!("Server running at http://{}:{}", ip, port);
    if !on_demand {
        println!("Static mode: serving generated files only.");
    }
    println!("Press Ctrl+C to stop.");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the application router
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(list_handler))
        .route("/index.html", get(list_handler))
        .route("/post/:uid", get(post_handler))
        .route("/post/:uid/", get(post_handler))
        .route("/api/posts", get(api_posts_handler))
        .fallback(fallback_handler)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn list_handler(State(state): State<Arc<AppState>>) -> Response {
    let generator = &state.generator;

    if generator.has_output(LIST_ROUTE) {
        let response = serve_page(&state, LIST_ROUTE).await;
        if state.on_demand && generator.is_stale(LIST_ROUTE).await {
            revalidate(&state, Target::List).await;
        }
        return response;
    }

    if !state.on_demand {
        return not_found(&state);
    }

    // Nothing usable on disk, e.g. the provider was down at startup
    match generator.generate_list().await {
        Ok(_) => {
            save_cache(&state).await;
            serve_page(&state, LIST_ROUTE).await
        }
        Err(e) => {
            tracing::error!("Generating the post list failed: {:#}", e);
            html(
                StatusCode::SERVICE_UNAVAILABLE,
                generator.renderer().render_unavailable(),
            )
        }
    }
}

async fn post_handler(
    State(state): State<Arc<AppState>>,
    UrlPath(uid): UrlPath<String>,
) -> Response {
    if !is_route_safe(&uid) {
        return not_found(&state);
    }

    let route = post_route(&uid);
    let generator = &state.generator;

    if generator.has_output(&route) {
        let response = serve_page(&state, &route).await;
        if state.on_demand && generator.is_stale(&route).await {
            revalidate(&state, Target::Post(uid)).await;
        }
        return response;
    }

    if !state.on_demand {
        return not_found(&state);
    }

    match state.registry.begin(&uid).await {
        Lookup::Started => {
            let task_state = state.clone();
            tokio::spawn(async move {
                let outcome = task_state.generator.generate_post(&uid).await;
                if outcome.is_ok() {
                    save_cache(&task_state).await;
                }
                task_state.registry.complete(&uid, outcome).await;
            });
            loading(&state)
        }
        Lookup::Pending => loading(&state),
        Lookup::NotFound => not_found(&state),
    }
}

#[derive(Debug, Deserialize)]
struct CursorQuery {
    cursor: Option<String>,
}

/// Next page of the post list as JSON, for the "load more" control
async fn api_posts_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CursorQuery>,
) -> Response {
    let Some(cursor) = query.cursor.filter(|c| !c.trim().is_empty()) else {
        return api_error(StatusCode::BAD_REQUEST, "missing cursor");
    };
    if !state.trusts_cursor(&cursor) {
        tracing::warn!(
            "Rejected cursor outside the content provider: {}",
            without_access_token(&cursor)
        );
        return api_error(StatusCode::BAD_REQUEST, "invalid cursor");
    }

    let generator = &state.generator;
    let result = feed::fetch_page(
        generator.provider(),
        &cursor,
        generator.helpers().date_formatter(),
        generator.blog().config.load_more_timeout(),
    )
    .await;

    match result {
        Ok(page) => Json(page).into_response(),
        Err(e) => {
            tracing::warn!("Loading more posts failed: {}", e);
            let status = if e.is_timeout() {
                StatusCode::GATEWAY_TIMEOUT
            } else {
                StatusCode::BAD_GATEWAY
            };
            api_error(status, &e.to_string())
        }
    }
}

/// Serve assets and anything else in the public directory
async fn fallback_handler(State(state): State<Arc<AppState>>, request: Request<Body>) -> Response {
    let mut service = ServeDir::new(&state.generator.blog().public_dir)
        .append_index_html_on_directories(true);
    match service.try_call(request).await {
        Ok(response) if response.status() == StatusCode::NOT_FOUND => not_found(&state),
        Ok(response) => response.into_response(),
        Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Server error").into_response(),
    }
}

/// Regenerate a page in the background unless that is already happening
async fn revalidate(state: &Arc<AppState>, target: Target) {
    let route = target.route();
    if !state.revalidating.lock().await.insert(route.clone()) {
        return;
    }

    let state = state.clone();
    tokio::spawn(async move {
        tracing::info!("Revalidating {}", route);
        let result = match &target {
            Target::List => state.generator.generate_list().await.map(|_| ()),
            Target::Post(uid) => match state.generator.generate_post(uid).await {
                Ok(DetailState::NotFound) => {
                    state.registry.complete(uid, Ok(DetailState::NotFound)).await;
                    Ok(())
                }
                Ok(_) => Ok(()),
                Err(e) => Err(e.into()),
            },
        };

        match result {
            Ok(()) => save_cache(&state).await,
            Err(e) => tracing::warn!("Revalidating {} failed, keeping the last page: {:#}", route, e),
        }
        state.revalidating.lock().await.remove(&route);
    });
}

async fn save_cache(state: &AppState) {
    if let Err(e) = state.generator.save_cache().await {
        tracing::warn!("Failed to save the revalidation cache: {:#}", e);
    }
}

async fn serve_page(state: &AppState, route: &str) -> Response {
    match tokio::fs::read_to_string(state.generator.output_file(route)).await {
        Ok(content) => Html(content).into_response(),
        Err(e) => {
            tracing::error!("Failed to read page {}: {}", route, e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Server error").into_response()
        }
    }
}

fn loading(state: &AppState) -> Response {
    let mut response = html(StatusCode::OK, state.generator.renderer().render_fallback());
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, header::HeaderValue::from_static("no-store"));
    response
}

fn not_found(state: &AppState) -> Response {
    html(
        StatusCode::NOT_FOUND,
        state.generator.renderer().render_not_found(),
    )
}

fn html(status: StatusCode, rendered: Result<String>) -> Response {
    match rendered {
        Ok(body) => (status, Html(body)).into_response(),
        Err(e) => {
            tracing::error!("Template error: {:#}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Server error").into_response()
        }
    }
}

fn api_error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}
