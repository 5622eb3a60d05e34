use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use domain::services::{
    AccountService, CalendarError, CalendarGateway, ChangeFeed, ChatBoard, ChatStore,
    ConsultationService, ConsultationStore, IdentityError, IdentityProvider,
    InMemoryChatStore, InMemoryConsultationStore, InMemoryUserStore, MockCalendarGateway,
    MockIdentityProvider, UserStore,
};
use persistence::db::PgPool;
use persistence::repositories::{ChatRepository, ConsultationRepository, UserRepository};
use shared::jwt::{JwtConfig, JwtError};
use shared::time::{offset_from_minutes, TimeError};

use crate::config::{CalendarConfig, Config, IdentityConfig, IdentityProviderKind};
use crate::middleware::{
    metrics_handler, metrics_middleware, security_headers_middleware, trace_id,
};
use crate::routes::{auth, chat, consultations, health, labs, users};
use crate::services::{FirebaseIdentityProvider, GoogleCalendarGateway};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub jwt: Arc<JwtConfig>,
    pub consultations: Arc<ConsultationService>,
    pub accounts: Arc<AccountService>,
    pub chat: Arc<ChatBoard>,
}

/// Failure while wiring the application together.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("JWT configuration: {0}")]
    Jwt(#[from] JwtError),

    #[error("Time zone: {0}")]
    Time(#[from] TimeError),

    #[error("Calendar gateway: {0}")]
    Calendar(#[from] CalendarError),

    #[error("Identity provider: {0}")]
    Identity(#[from] IdentityError),
}

/// Stores and external gateways the services run on.
pub struct Backends {
    pub consultations: Arc<dyn ConsultationStore>,
    pub users: Arc<dyn UserStore>,
    pub chat: Arc<dyn ChatStore>,
    pub calendar: Arc<dyn CalendarGateway>,
    pub identity: Arc<dyn IdentityProvider>,
}

impl Backends {
    /// Process-local stores, lost on restart.
    pub fn in_memory(
        calendar: Arc<dyn CalendarGateway>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self {
            consultations: Arc::new(InMemoryConsultationStore::new()),
            users: Arc::new(InMemoryUserStore::new()),
            chat: Arc::new(InMemoryChatStore::new()),
            calendar,
            identity,
        }
    }

    pub fn postgres(
        pool: PgPool,
        calendar: Arc<dyn CalendarGateway>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self {
            consultations: Arc::new(ConsultationRepository::new(pool.clone())),
            users: Arc::new(UserRepository::new(pool.clone())),
            chat: Arc::new(ChatRepository::new(pool)),
            calendar,
            identity,
        }
    }
}

/// Google Calendar when enabled, otherwise a gateway that accepts everything.
pub fn calendar_gateway(
    config: &CalendarConfig,
) -> Result<Arc<dyn CalendarGateway>, StartupError> {
    if !config.enabled {
        tracing::warn!("Calendar integration disabled, approvals will not create events");
        return Ok(Arc::new(MockCalendarGateway::new()));
    }
    let offset = offset_from_minutes(config.utc_offset_minutes)?;
    Ok(Arc::new(GoogleCalendarGateway::new(config, offset)?))
}

pub fn identity_provider(
    config: &IdentityConfig,
) -> Result<Arc<dyn IdentityProvider>, StartupError> {
    match config.provider {
        IdentityProviderKind::Firebase => Ok(Arc::new(FirebaseIdentityProvider::new(config)?)),
        IdentityProviderKind::Mock if config.auto_verify => {
            tracing::warn!("Using mock identity provider with automatic e-mail verification");
            Ok(Arc::new(MockIdentityProvider::auto_verifying()))
        }
        IdentityProviderKind::Mock => {
            tracing::warn!("Using mock identity provider");
            Ok(Arc::new(MockIdentityProvider::new()))
        }
    }
}

impl AppState {
    pub fn new(config: Config, backends: Backends) -> Result<Self, StartupError> {
        let jwt = JwtConfig::with_leeway(
            &config.jwt.private_key,
            &config.jwt.public_key,
            config.jwt.access_token_expiry_secs,
            config.jwt.refresh_token_expiry_secs,
            config.jwt.leeway_secs,
        )?;
        let offset = offset_from_minutes(config.calendar.utc_offset_minutes)?;

        let consultations = ConsultationService::new(
            backends.consultations,
            backends.calendar,
            ChangeFeed::default(),
            config.calendar.time_zone.clone(),
            offset,
        );
        let accounts = AccountService::new(backends.identity, backends.users);
        let chat = ChatBoard::new(backends.chat);

        Ok(Self {
            config: Arc::new(config),
            jwt: Arc::new(jwt),
            consultations: Arc::new(consultations),
            accounts: Arc::new(accounts),
            chat: Arc::new(chat),
        })
    }
}

pub fn create_app(state: AppState) -> Router {
    let config = state.config.clone();

    let cors = if config.security.cors_origins.is_empty() {
        // Development: any origin.
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        use tower_http::cors::AllowOrigin;
        let origins: Vec<_> = config
            .security
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    };

    let api_routes = Router::new()
        // Accounts
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh))
        .route("/users/me", get(users::get_me).put(users::update_me))
        .route("/users/staff", get(users::list_staff))
        .route("/users/options", get(users::profile_options))
        // Consultations
        .route(
            "/consultations",
            post(consultations::create_consultation).get(consultations::list_consultations),
        )
        .route("/consultations/agenda", get(consultations::get_agenda))
        .route("/consultations/watch", get(consultations::watch_consultations))
        .route("/consultations/free-busy", post(consultations::check_free_busy))
        .route(
            "/consultations/:id",
            get(consultations::get_consultation)
                .put(consultations::edit_consultation)
                .delete(consultations::delete_consultation),
        )
        .route(
            "/consultations/:id/approve",
            post(consultations::approve_consultation),
        )
        .route("/consultations/:id/deny", post(consultations::deny_consultation))
        // Chat board
        .route(
            "/chat/messages",
            get(chat::list_threads).post(chat::post_message),
        )
        .route("/chat/messages/:id", delete(chat::delete_message))
        // Lab booking
        .route("/labs", get(labs::list_labs))
        .route("/labs/bookings", post(labs::book_lab));

    Router::new()
        .route("/api/health", get(health::health_check))
        .route("/api/health/live", get(health::live))
        .route("/api/health/ready", get(health::ready))
        .route("/metrics", get(metrics_handler))
        .nest("/api/v1", api_routes)
        .with_state(state.clone())
        // Bottom layers run first.
        .layer(middleware::from_fn_with_state(
            state,
            security_headers_middleware,
        ))
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(trace_id))
        .layer(cors)
}
