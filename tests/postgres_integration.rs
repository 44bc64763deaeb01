//! Runs the same flows as the other suites against a real Postgres database.
//!
//! Each test creates a fresh database and applies `./migrations`. The server
//! settings come from `configuration.yaml`. These tests are ignored by default;
//! with Postgres running, use `cargo test -- --ignored`.

use std::net::TcpListener;
use std::sync::Arc;

use notes_api::auth::{AccessClaims, BcryptHasher, ManualClock, TokenCodec};
use notes_api::configuration::{get_configuration, DatabaseSettings, JwtSettings};
use notes_api::error::{AppError, DatabaseError};
use notes_api::startup::{run, AppState};
use notes_api::store::{NewNote, NewUser, Storage, User, UserStore};
use serde_json::{json, Value};
use sqlx::{Connection, Executor, PgConnection, PgPool};
use uuid::Uuid;

const ACCESS_SECRET: &str = "pg-access-secret";
const REFRESH_SECRET: &str = "pg-refresh-secret";

pub struct TestApp {
    pub address: String,
    pub storage: Storage,
    pub codec: TokenCodec,
}

impl TestApp {
    async fn add_user(&self, username: &str, password: &str, roles: &[&str]) -> User {
        self.storage
            .users
            .create(NewUser {
                username: username.to_string(),
                password_hash: bcrypt::hash(password, 4).expect("Failed to hash password"),
                roles: roles.iter().map(|r| r.to_string()).collect(),
            })
            .await
            .expect("Failed to create user")
    }

    /// Log in and return (access token, refresh token)
    async fn login(&self, username: &str, password: &str) -> (String, String) {
        let response = reqwest::Client::new()
            .post(&format!("{}/auth", &self.address))
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await
            .expect("Failed to execute request.");
        assert_eq!(200, response.status().as_u16());

        let refresh_token = response
            .headers()
            .get_all("set-cookie")
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find(|v| v.starts_with("jwt="))
            .and_then(|v| v.split(';').next())
            .map(|v| v.trim_start_matches("jwt=").to_string())
            .expect("Missing refresh cookie");
        let body: Value = response.json().await.expect("Failed to parse response");
        let access_token = body["accessToken"].as_str().expect("Missing accessToken").to_string();

        (access_token, refresh_token)
    }

    async fn get_refresh(&self, refresh_token: &str) -> reqwest::Response {
        reqwest::Client::new()
            .get(&format!("{}/auth/refresh", &self.address))
            .header("Cookie", format!("jwt={}", refresh_token))
            .send()
            .await
            .expect("Failed to execute request.")
    }

    async fn send(
        &self,
        method: reqwest::Method,
        path: &str,
        access_token: &str,
        body: Value,
    ) -> reqwest::Response {
        reqwest::Client::new()
            .request(method, &format!("{}{}", &self.address, path))
            .bearer_auth(access_token)
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request.")
    }
}

async fn spawn_app() -> TestApp {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    // Secrets are environment-only; the real values are replaced below
    std::env::set_var("APP_JWT__ACCESS_TOKEN_SECRET", ACCESS_SECRET);
    std::env::set_var("APP_JWT__REFRESH_TOKEN_SECRET", REFRESH_SECRET);
    let mut configuration = get_configuration().expect("Failed to read configuration.");
    configuration.database.database_name = Uuid::new_v4().to_string();
    let connection_pool = configure_database(&configuration.database).await;

    let clock = Arc::new(ManualClock::new(1_700_000_000));
    let storage = Storage::postgres(connection_pool);
    let state = AppState {
        storage: storage.clone(),
        jwt: JwtSettings {
            access_token_secret: ACCESS_SECRET.to_string(),
            refresh_token_secret: REFRESH_SECRET.to_string(),
            access_token_expiry: 900,
            refresh_token_expiry: 604800,
        },
        hasher: BcryptHasher::new(4),
        clock: clock.clone(),
    };

    let server = run(listener, state).expect("Failed to bind address");
    let _ = tokio::spawn(server);

    TestApp {
        address,
        storage,
        codec: TokenCodec::new(clock),
    }
}

pub async fn configure_database(config: &DatabaseSettings) -> PgPool {
    // Create database
    let mut connection = PgConnection::connect(&config.connection_string_without_db())
        .await
        .expect("Failed to connect to Postgres");
    connection
        .execute(&*format!(r#"CREATE DATABASE "{}";"#, config.database_name))
        .await
        .expect("Failed to create database.");
    // Migrate database
    let connection_pool = PgPool::connect(&config.connection_string())
        .await
        .expect("Failed to connect to Postgres.");
    sqlx::migrate!("./migrations")
        .run(&connection_pool)
        .await
        .expect("Failed to migrate the database.");
    connection_pool
}

// --- Sessions ---

#[tokio::test]
#[ignore = "needs a running Postgres"]
async fn login_and_refresh_follow_stored_roles() {
    let app = spawn_app().await;
    let mut alice = app.add_user("alice", "s3cret", &["Admin", "Manager"]).await;
    assert_eq!(alice.roles, vec!["Admin".to_string(), "Manager".to_string()]);

    let (access_token, refresh_token) = app.login("alice", "s3cret").await;
    let before: AccessClaims = app.codec.verify(&access_token, ACCESS_SECRET).unwrap();
    assert_eq!(before.roles(), ["Admin".to_string(), "Manager".to_string()]);

    alice.roles = vec!["Employee".to_string()];
    app.storage.users.update(&alice).await.unwrap();

    let response = app.get_refresh(&refresh_token).await;
    assert_eq!(200, response.status().as_u16());

    let body: Value = response.json().await.unwrap();
    let after: AccessClaims = app
        .codec
        .verify(body["accessToken"].as_str().unwrap(), ACCESS_SECRET)
        .unwrap();
    assert_eq!(after.roles(), ["Employee".to_string()]);
}

#[tokio::test]
#[ignore = "needs a running Postgres"]
async fn refresh_returns_401_once_the_user_row_is_gone() {
    let app = spawn_app().await;
    let alice = app.add_user("alice", "s3cret", &["Employee"]).await;
    let (_, refresh_token) = app.login("alice", "s3cret").await;

    let deleted = app.storage.users.delete(alice.id).await.unwrap();
    assert_eq!(deleted.map(|u| u.username), Some("alice".to_string()));

    let response = app.get_refresh(&refresh_token).await;
    assert_eq!(401, response.status().as_u16());
}

// --- Stores ---

#[tokio::test]
#[ignore = "needs a running Postgres"]
async fn duplicate_username_violates_unique_constraint() {
    let app = spawn_app().await;
    app.add_user("alice", "s3cret", &["Employee"]).await;

    let result = app
        .storage
        .users
        .create(NewUser {
            username: "alice".to_string(),
            password_hash: "hash".to_string(),
            roles: vec!["Employee".to_string()],
        })
        .await;

    assert!(matches!(
        result,
        Err(AppError::Database(DatabaseError::UniqueConstraintViolation(_)))
    ));
}

#[tokio::test]
#[ignore = "needs a running Postgres"]
async fn updating_unknown_rows_is_not_found() {
    let app = spawn_app().await;
    let mut ghost = app.add_user("ghost", "s3cret", &["Employee"]).await;
    app.storage.users.delete(ghost.id).await.unwrap();
    ghost.id = Uuid::new_v4();

    let result = app.storage.users.update(&ghost).await;
    assert!(matches!(result, Err(AppError::Database(DatabaseError::NotFound(_)))));

    assert!(app.storage.notes.find_by_id(Uuid::new_v4()).await.unwrap().is_none());
    assert!(app.storage.notes.delete(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "needs a running Postgres"]
async fn notes_round_trip_through_sql() {
    let app = spawn_app().await;
    let alice = app.add_user("alice", "s3cret", &["Employee"]).await;

    let first = app
        .storage
        .notes
        .create(NewNote {
            user_id: alice.id,
            title: "First".to_string(),
            text: "one".to_string(),
        })
        .await
        .unwrap();
    app.storage
        .notes
        .create(NewNote {
            user_id: alice.id,
            title: "Second".to_string(),
            text: "two".to_string(),
        })
        .await
        .unwrap();

    assert!(!first.completed);
    assert!(app.storage.notes.exists_for_user(alice.id).await.unwrap());

    let mut stored = app.storage.notes.find_by_id(first.id).await.unwrap().unwrap();
    stored.completed = true;
    app.storage.notes.update(&stored).await.unwrap();

    let titles: Vec<String> = app
        .storage
        .notes
        .find_all()
        .await
        .unwrap()
        .into_iter()
        .map(|n| n.title)
        .collect();
    assert_eq!(titles, vec!["First".to_string(), "Second".to_string()]);
    assert!(app.storage.notes.find_by_id(first.id).await.unwrap().unwrap().completed);
}

// --- HTTP CRUD ---

#[tokio::test]
#[ignore = "needs a running Postgres"]
async fn crud_rejects_duplicates_and_unknown_ids() {
    let app = spawn_app().await;
    app.add_user("admin", "admin-pass", &["Admin"]).await;
    let (token, _) = app.login("admin", "admin-pass").await;

    let response = app
        .send(
            reqwest::Method::POST,
            "/users",
            &token,
            json!({ "username": "admin", "password": "x", "roles": ["Employee"] }),
        )
        .await;
    assert_eq!(409, response.status().as_u16());

    let response = app
        .send(
            reqwest::Method::PATCH,
            "/users",
            &token,
            json!({
                "id": Uuid::new_v4().to_string(),
                "username": "nobody",
                "roles": ["Employee"],
                "active": true
            }),
        )
        .await;
    assert_eq!(400, response.status().as_u16());

    let response = app
        .send(
            reqwest::Method::DELETE,
            "/notes",
            &token,
            json!({ "id": Uuid::new_v4().to_string() }),
        )
        .await;
    assert_eq!(400, response.status().as_u16());
}

#[tokio::test]
#[ignore = "needs a running Postgres"]
async fn user_with_notes_cannot_be_deleted() {
    let app = spawn_app().await;
    app.add_user("admin", "admin-pass", &["Admin"]).await;
    let bob = app.add_user("bob", "pa55", &["Employee"]).await;
    let (token, _) = app.login("admin", "admin-pass").await;

    let response = app
        .send(
            reqwest::Method::POST,
            "/notes",
            &token,
            json!({ "user": bob.id.to_string(), "title": "Fix printer", "text": "Tray 2" }),
        )
        .await;
    assert_eq!(201, response.status().as_u16());

    let response = app
        .send(reqwest::Method::GET, "/notes", &token, json!({}))
        .await;
    assert_eq!(200, response.status().as_u16());
    let notes: Value = response.json().await.unwrap();
    assert_eq!(notes[0]["username"], "bob");

    let response = app
        .send(
            reqwest::Method::DELETE,
            "/users",
            &token,
            json!({ "id": bob.id.to_string() }),
        )
        .await;
    assert_eq!(400, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "User has assigned notes");
}
