use crate::{
    api::handlers::{health, root},
    auth::{Authenticator, SessionResolver, TokenCodec},
    store::{CredentialStore, TaskStore},
};
use anyhow::{anyhow, Context, Result};
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderName, HeaderValue, Method, Request,
    },
    routing::{get, options},
    Extension, Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use ulid::Ulid;
use url::Url;
use utoipa_swagger_ui::SwaggerUi;

pub(crate) mod handlers;
mod openapi;

pub use openapi::openapi;

/// Services shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub authenticator: Authenticator,
    pub sessions: SessionResolver,
    pub users: Arc<dyn CredentialStore>,
    pub tasks: Arc<dyn TaskStore>,
}

impl AppState {
    #[must_use]
    pub fn new(
        users: Arc<dyn CredentialStore>,
        tasks: Arc<dyn TaskStore>,
        codec: Arc<TokenCodec>,
    ) -> Self {
        Self {
            authenticator: Authenticator::new(Arc::clone(&users), Arc::clone(&codec)),
            sessions: SessionResolver::new(Arc::clone(&users), codec),
            users,
            tasks,
        }
    }
}

/// Build the full application: documented routes, `/`, Swagger UI and the
/// middleware stack.
///
/// # Errors
/// Returns an error if a CORS origin is not a valid URL.
pub fn app(state: AppState, cors_origins: &[String]) -> Result<Router> {
    let (router, openapi) = openapi::api_router().split_for_parts();

    let app = router
        .route("/", get(root::root))
        .route("/health", options(health::health))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(Extension(state.authenticator))
                .layer(Extension(state.sessions))
                .layer(Extension(state.users))
                .layer(Extension(state.tasks)),
        );

    if cors_origins.is_empty() {
        return Ok(app);
    }

    let origins = cors_origins
        .iter()
        .map(|origin| cors_origin(origin))
        .collect::<Result<Vec<_>>>()?;
    let cors = CorsLayer::new()
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_origin(AllowOrigin::list(origins));

    Ok(app.layer(cors))
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(port: u16, state: AppState, cors_origins: &[String]) -> Result<()> {
    let app = app(state, cors_origins)?;

    let listener = TcpListener::bind(format!("::0:{port}"))
        .await
        .with_context(|| format!("Failed to bind port {port}"))?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Gracefully shutdown");
            }
        })
        .await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

/// Normalize a configured origin to `scheme://host[:port]`.
fn cors_origin(origin: &str) -> Result<HeaderValue> {
    let parsed = Url::parse(origin).with_context(|| format!("Invalid CORS origin: {origin}"))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| anyhow!("CORS origin must include a valid host: {origin}"))?;
    let port = parsed
        .port()
        .map_or_else(String::new, |port| format!(":{port}"));
    let origin = format!("{}://{}{}", parsed.scheme(), host, port);
    HeaderValue::from_str(&origin).context("Failed to build CORS origin header")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cors_origin_drops_path() -> Result<()> {
        assert_eq!(
            cors_origin("https://app.example.com/some/path")?,
            HeaderValue::from_static("https://app.example.com")
        );
        assert_eq!(
            cors_origin("http://localhost:3000")?,
            HeaderValue::from_static("http://localhost:3000")
        );
        Ok(())
    }

    #[test]
    fn cors_origin_rejects_garbage() {
        assert!(cors_origin("not a url").is_err());
    }
}
