use axum::{middleware, routing::{get, post}, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod config;
pub mod models;
pub mod routes;
pub mod schema;
pub mod services;
pub mod store;

use referral_shared::clients::email_verifier::EmailVerifier;
use referral_shared::types::auth::{AuthState, TokenKeys};

use crate::config::AppConfig;
use crate::services::referral_service::CodePolicy;
use crate::store::ReferralStore;

pub struct AppState {
    pub store: Arc<dyn ReferralStore>,
    pub config: AppConfig,
    pub tokens: TokenKeys,
    pub policy: CodePolicy,
    pub email_verifier: Option<EmailVerifier>,
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn ReferralStore>) -> Self {
        let tokens = TokenKeys::new(&config.jwt_secret, config.jwt_ttl);
        let policy = CodePolicy::from_config(&config);
        let email_verifier = (!config.email_verifier_api_key.is_empty())
            .then(|| EmailVerifier::new(&config.email_verifier_url, &config.email_verifier_api_key));

        Self {
            store,
            config,
            tokens,
            policy,
            email_verifier,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

impl AuthState for AppState {
    fn token_keys(&self) -> &TokenKeys {
        &self.tokens
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let mut app = Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/register", post(routes::register::register))
        .route("/register-by-code/:code", post(routes::register::register_by_code))
        .route("/login", post(routes::login::login))
        .route(
            "/referral-code",
            post(routes::referral_code::create_code)
                .delete(routes::referral_code::delete_code)
                .get(routes::referral_code::code_by_email),
        )
        .route("/referrals/:account_id", get(routes::referrals::list_referrals));

    if state.metrics.is_some() {
        app = app.route("/metrics", get(routes::health::metrics));
    }

    app.layer(middleware::from_fn(referral_shared::middleware::metrics_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
