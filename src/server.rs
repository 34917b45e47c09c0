use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::{FromRequest, Multipart, Query, Request, State};
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::config::{BIND_ADDR, FORM_PATH, WEBHOOK_PATH};
use crate::dispatcher::Dispatcher;
use crate::keygen::{KeyGenerator, OFFER_KEY_LENGTH};
use crate::offer::{format_offer, FormFields};
use crate::runtime::BotRuntime;
use crate::store::OfferStore;
use crate::telegram::{Update, SECRET_TOKEN_HEADER};

#[derive(Clone)]
pub struct ServerState {
    pub dispatcher: Arc<Dispatcher>,
    pub store: Arc<dyn OfferStore>,
    pub keys: Arc<KeyGenerator>,
    pub webhook_secret: String,
}

pub async fn serve(runtime: BotRuntime) -> Result<()> {
    let bind_addr = BIND_ADDR
        .parse::<SocketAddr>()
        .context("Invalid bind address")?;
    let origin = HeaderValue::from_str(&runtime.config.web_app_domain)
        .context("WEB_APP_DOMAIN is not a valid origin header value")?;

    let app = build_router(Arc::new(runtime.server_state()), origin);

    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("Failed to bind offer bot server to {}", bind_addr))?;
    tracing::info!("Offer bot listening on http://{}", bind_addr);
    axum::serve(listener, app)
        .await
        .context("Offer bot server failed")?;
    Ok(())
}

pub fn build_router(state: Arc<ServerState>, web_app_origin: HeaderValue) -> Router {
    // Only the form is called from the browser.
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::exact(web_app_origin))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    let form = Router::new()
        .route(FORM_PATH, get(submit_form).post(submit_form))
        .layer(cors);

    Router::new()
        .route(WEBHOOK_PATH, post(receive_update))
        .merge(form)
        .with_state(state)
}

async fn receive_update(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, (StatusCode, String)> {
    authorize_webhook(&headers, &state.webhook_secret)?;

    let update: Update = serde_json::from_slice(&body).map_err(|error| {
        tracing::warn!("Rejected malformed update: {}", error);
        (StatusCode::BAD_REQUEST, format!("invalid update: {error}"))
    })?;

    state.dispatcher.dispatch(update).await;
    Ok(StatusCode::OK)
}

fn authorize_webhook(headers: &HeaderMap, secret: &str) -> Result<(), (StatusCode, String)> {
    let provided = headers
        .get(SECRET_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok());
    if provided != Some(secret) {
        tracing::warn!("Rejected webhook call with missing or wrong secret token");
        return Err((StatusCode::UNAUTHORIZED, "invalid secret token".to_string()));
    }
    Ok(())
}

async fn submit_form(
    State(state): State<Arc<ServerState>>,
    fields: FormFields,
) -> Result<String, (StatusCode, String)> {
    tracing::debug!("Offer form submitted: {:?}", fields);

    let message = format_offer(&fields).map_err(|error| {
        tracing::warn!("Rejected offer form: {}", error);
        (StatusCode::BAD_REQUEST, error.to_string())
    })?;

    let key = state.keys.generate(OFFER_KEY_LENGTH);
    state.store.put(&key, message);
    tracing::info!(
        "Stored offer under key {} ({} pending)",
        key,
        state.store.len()
    );
    Ok(key)
}

/// Accepts url-encoded bodies, GET query strings and multipart forms. On other
/// methods the query string is merged in after the body, so body values win.
#[async_trait]
impl<S> FromRequest<S> for FormFields
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let query_pairs = if req.method() == Method::GET || req.method() == Method::HEAD {
            Vec::new()
        } else {
            let Query(pairs) = Query::<Vec<(String, String)>>::try_from_uri(req.uri())
                .map_err(IntoResponse::into_response)?;
            pairs
        };

        let mut pairs = if is_multipart(req.headers()) {
            multipart_pairs(req, state).await?
        } else {
            let Form(pairs) = Form::<Vec<(String, String)>>::from_request(req, state)
                .await
                .map_err(IntoResponse::into_response)?;
            pairs
        };
        pairs.extend(query_pairs);
        Ok(FormFields::new(pairs))
    }
}

fn is_multipart(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .map(|mime| mime.trim().eq_ignore_ascii_case("multipart/form-data"))
        .unwrap_or(false)
}

async fn multipart_pairs<S>(req: Request, state: &S) -> Result<Vec<(String, String)>, Response>
where
    S: Send + Sync,
{
    let mut multipart = Multipart::from_request(req, state)
        .await
        .map_err(IntoResponse::into_response)?;
    let mut pairs = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|error| (StatusCode::BAD_REQUEST, error.to_string()).into_response())?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        let value = field
            .text()
            .await
            .map_err(|error| (StatusCode::BAD_REQUEST, error.to_string()).into_response())?;
        pairs.push((name, value));
    }
    Ok(pairs)
}
