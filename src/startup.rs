use actix_web::dev::Server;
use actix_web::{error::JsonPayloadError, web, App, HttpRequest, HttpServer};
use sqlx::postgres::PgPoolOptions;
use std::net::TcpListener;
use std::sync::Arc;

use crate::auth::{BcryptHasher, Clock, SessionService, SystemClock, TokenCodec};
use crate::configuration::{DatabaseSettings, JwtSettings, Settings, StorageBackend};
use crate::error::{AppError, ValidationError};
use crate::logger::LoggerMiddleware;
use crate::middleware::JwtMiddleware;
use crate::routes::{
    create_note, create_user, delete_note, delete_user, health_check, list_notes, list_users,
    login, logout, refresh, update_note, update_user,
};
use crate::store::Storage;

/// Everything the HTTP layer needs, assembled once at startup
#[derive(Clone)]
pub struct AppState {
    pub storage: Storage,
    pub jwt: JwtSettings,
    pub hasher: BcryptHasher,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    /// Production state: configured storage backend and the system clock.
    ///
    /// The Postgres pool connects lazily, so this does not wait for the database.
    pub fn from_settings(settings: &Settings) -> Result<Self, AppError> {
        let storage = match settings.application.storage {
            StorageBackend::Postgres => Storage::postgres(connection_pool(&settings.database)?),
            StorageBackend::Memory => {
                tracing::warn!("Using in-memory storage, data is lost on restart");
                Storage::in_memory()
            }
        };

        Ok(Self {
            storage,
            jwt: settings.jwt.clone(),
            hasher: BcryptHasher::new(settings.application.bcrypt_cost),
            clock: Arc::new(SystemClock),
        })
    }
}

fn connection_pool(settings: &DatabaseSettings) -> Result<sqlx::PgPool, AppError> {
    PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .connect_lazy(&settings.connection_string())
        .map_err(AppError::from)
}

/// Malformed JSON bodies answer with the same error shape as every other 400
fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    AppError::Validation(ValidationError::InvalidFormat(format!("request body ({})", err))).into()
}

pub fn run(listener: TcpListener, state: AppState) -> Result<Server, std::io::Error> {
    let sessions = SessionService::new(
        state.storage.users.clone(),
        Arc::new(state.hasher),
        TokenCodec::new(state.clock.clone()),
        state.jwt.clone(),
    );

    let sessions_data = web::Data::new(sessions.clone());
    let users = web::Data::from(state.storage.users.clone());
    let notes = web::Data::from(state.storage.notes.clone());
    let hasher = web::Data::new(state.hasher);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(LoggerMiddleware)
            .app_data(web::JsonConfig::default().error_handler(json_error_handler))
            .app_data(sessions_data.clone())
            .app_data(users.clone())
            .app_data(notes.clone())
            .app_data(hasher.clone())
            // Public routes
            .route("/health_check", web::get().to(health_check))
            .route("/auth", web::post().to(login))
            .route("/auth/refresh", web::get().to(refresh))
            .route("/auth/logout", web::post().to(logout))
            // Protected routes (require a valid access token)
            .service(
                web::scope("/users")
                    .wrap(JwtMiddleware::new(sessions.clone()))
                    .route("", web::get().to(list_users))
                    .route("", web::post().to(create_user))
                    .route("", web::patch().to(update_user))
                    .route("", web::delete().to(delete_user)),
            )
            .service(
                web::scope("/notes")
                    .wrap(JwtMiddleware::new(sessions.clone()))
                    .route("", web::get().to(list_notes))
                    .route("", web::post().to(create_note))
                    .route("", web::patch().to(update_note))
                    .route("", web::delete().to(delete_note)),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}
