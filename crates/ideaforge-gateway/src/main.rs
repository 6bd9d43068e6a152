//! IdeaForge gateway: form, progress and results pages for one operator.
//! Generation cycles run on a spawned task; pages poll the session state.

mod view;

use axum::{
    body::Body,
    extract::{ConnectInfo, Form, Path, State},
    http::{header, Request, StatusCode},
    middleware::Next,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use ideaforge_core::{
    build_session, ForgeConfig, IdeaFormData, Session, SessionError, SessionSnapshot,
    MEDIA_ROUTE_PREFIX,
};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

struct AppState {
    session: Session,
}

#[derive(Deserialize)]
struct CredentialForm {
    api_key: String,
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = serve().await {
        tracing::error!(error = %e, "gateway stopped");
        std::process::exit(1);
    }
}

async fn serve() -> Result<(), Box<dyn std::error::Error>> {
    let config = ForgeConfig::load()?;
    let session = build_session(&config)?;
    let initial = session.check_credentials().await;
    tracing::info!(
        version = ideaforge_core::version(),
        state = ?initial,
        image_model = %config.image_model,
        video_model = %config.video_model,
        "session ready"
    );

    let state = Arc::new(AppState { session });

    let app = Router::new()
        .route("/health", get(health))
        .route("/", get(index))
        .route("/credentials", post(select_credentials_handler))
        .route("/generate", post(generate_handler))
        .route("/back", post(back_handler))
        .route("/api/state", get(state_handler))
        .route("/media/:id", get(media_handler))
        .with_state(state)
        .layer(axum::middleware::from_fn(log_request));

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}

async fn log_request(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request<Body>,
    next: Next,
) -> Response {
    tracing::debug!(%addr, method = %request.method(), path = %request.uri().path(), "request");
    next.run(request).await
}

async fn health() -> &'static str {
    "OK"
}

/// Page for whatever state the session is in.
async fn index(State(state): State<Arc<AppState>>) -> Html<String> {
    let snapshot = state.session.snapshot().await;
    Html(view::render_page(&snapshot))
}

async fn select_credentials_handler(
    State(state): State<Arc<AppState>>,
    Form(form): Form<CredentialForm>,
) -> Result<Redirect, (StatusCode, String)> {
    let key = form.api_key.trim();
    if key.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "API key must not be empty.".into()));
    }
    state
        .session
        .select_credentials(key)
        .await
        .map_err(session_rejection)?;
    Ok(Redirect::to("/"))
}

/// Accept the submission and run the cycle in the background.
async fn generate_handler(
    State(state): State<Arc<AppState>>,
    Form(form): Form<IdeaFormData>,
) -> Result<Redirect, (StatusCode, String)> {
    let ticket = match state.session.begin(form).await {
        Ok(ticket) => ticket,
        // Key prompt is rendered at `/`.
        Err(SessionError::CredentialsRequired) => return Ok(Redirect::to("/")),
        Err(e) => return Err(session_rejection(e)),
    };
    let session = state.session.clone();
    let cycle = ticket.cycle();
    tokio::spawn(async move {
        let outcome = session.run(ticket).await;
        tracing::info!(cycle, state = ?outcome, "cycle settled");
    });
    Ok(Redirect::to("/"))
}

async fn back_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Redirect, (StatusCode, String)> {
    state
        .session
        .back_to_form()
        .await
        .map_err(session_rejection)?;
    Ok(Redirect::to("/"))
}

async fn state_handler(State(state): State<Arc<AppState>>) -> Json<SessionSnapshot> {
    Json(state.session.snapshot().await)
}

/// Serve a downloaded video while its reference is live.
async fn media_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, (StatusCode, String)> {
    let reference = format!("{}{}", MEDIA_ROUTE_PREFIX, id);
    let asset = state
        .session
        .vault()
        .get_by_reference(&reference)
        .await
        .ok_or_else(|| (StatusCode::NOT_FOUND, "Media not found.".to_string()))?;
    Ok((
        [(header::CONTENT_TYPE, asset.mime_type.clone())],
        asset.bytes.clone(),
    )
        .into_response())
}

fn session_rejection(e: SessionError) -> (StatusCode, String) {
    let status = match e {
        SessionError::AlreadyLoading => StatusCode::CONFLICT,
        SessionError::CredentialsRequired | SessionError::InvalidTransition { .. } => {
            StatusCode::BAD_REQUEST
        }
        SessionError::Generation(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, e.to_string())
}
