mod common;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use atelier::store::{
    CreateUserOutcome, MemoryStore, NewUser, User, UserStore, DEFAULT_ROLE,
};
use axum::http::{header::SET_COOKIE, Method, StatusCode};
use common::{
    app, app_with, assert_redirect, body_text, login, registration, Browser, EMAIL, PASSWORD,
};
use std::sync::Arc;
use uuid::Uuid;

fn h5p_dir() -> Result<tempfile::TempDir> {
    Ok(tempfile::tempdir()?)
}

#[tokio::test]
async fn registration_then_login_then_logout() -> Result<()> {
    let dir = h5p_dir()?;
    let store = Arc::new(MemoryStore::new());
    let mut browser = Browser::new(app(store.clone(), dir.path())?);

    let response = browser
        .post("/registration", registration(EMAIL, PASSWORD, PASSWORD))
        .await?;
    assert_redirect(&response, "/login");

    assert_eq!(store.user_count().await, 1);
    let user = store
        .find_by_email(EMAIL)
        .await?
        .ok_or_else(|| anyhow!("user not stored"))?;
    assert_ne!(user.password_hash.as_str(), PASSWORD);
    assert!(user.password_hash.as_str().starts_with("$2b$"));
    assert_eq!(store.roles(user.id).await?, vec![DEFAULT_ROLE.to_string()]);

    let page = body_text(browser.get("/login").await?).await?;
    assert!(page.contains("Registration successful, please login"));

    // The flash message is consumed.
    let page = body_text(browser.get("/login").await?).await?;
    assert!(!page.contains("Registration successful"));

    let response = browser.post("/login", login(EMAIL, PASSWORD)).await?;
    assert_redirect(&response, "/");
    assert!(browser.cookie().is_some());

    let page = body_text(browser.get("/").await?).await?;
    assert!(page.contains("Ada Lovelace"));

    let response = browser.send(Method::DELETE, "/logout", None).await?;
    assert_redirect(&response, "/login");
    assert!(browser.cookie().is_none());
    assert_eq!(store.session_count().await, 0);

    let page = body_text(browser.get("/").await?).await?;
    assert!(!page.contains("Ada Lovelace"));
    Ok(())
}

#[tokio::test]
async fn repeat_registration_is_rejected() -> Result<()> {
    let dir = h5p_dir()?;
    let store = Arc::new(MemoryStore::new());
    let app = app(store.clone(), dir.path())?;

    let mut first = Browser::new(app.clone());
    first
        .post("/registration", registration(EMAIL, PASSWORD, PASSWORD))
        .await?;

    let mut second = Browser::new(app);
    let response = second
        .post("/registration", registration("A@X.COM", PASSWORD, PASSWORD))
        .await?;
    assert_redirect(&response, "/login");

    let page = body_text(second.get("/login").await?).await?;
    assert!(page.contains("User is already registered. Please login."));

    assert_eq!(store.user_count().await, 1);
    assert_eq!(store.role_rows().await.len(), 1);
    Ok(())
}

#[tokio::test]
async fn weak_password_is_flashed_and_nothing_is_stored() -> Result<()> {
    let dir = h5p_dir()?;
    let store = Arc::new(MemoryStore::new());
    let mut browser = Browser::new(app(store.clone(), dir.path())?);

    let response = browser
        .post("/registration", registration(EMAIL, "abcdefgh", "abcdefgi"))
        .await?;
    assert_redirect(&response, "/registration");

    let page = body_text(browser.get("/registration").await?).await?;
    assert!(page.contains("Passwords do not match"));
    assert!(page.contains("Password must include a special character"));
    assert!(page.contains("Password must include an uppercase letter"));
    assert!(!page.contains("Password must be at least"));

    assert_eq!(store.user_count().await, 0);
    assert!(store.role_rows().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn passwords_past_bcrypt_limit_are_refused() -> Result<()> {
    let dir = h5p_dir()?;
    let store = Arc::new(MemoryStore::new());
    let app = app(store.clone(), dir.path())?;
    let longest = format!("A!{}", "a".repeat(70));

    let mut too_long = Browser::new(app.clone());
    let password = format!("{longest}Secret-Part-1");
    let response = too_long
        .post("/registration", registration(EMAIL, &password, &password))
        .await?;
    assert_redirect(&response, "/registration");
    let page = body_text(too_long.get("/registration").await?).await?;
    assert!(page.contains("Password must be at most 72 bytes long"));
    assert_eq!(store.user_count().await, 0);

    let mut browser = Browser::new(app);
    let response = browser
        .post("/registration", registration(EMAIL, &longest, &longest))
        .await?;
    assert_redirect(&response, "/login");

    // Sharing the first 72 bytes is not enough.
    let response = browser
        .post("/login", login(EMAIL, &format!("{longest}WRONG")))
        .await?;
    assert_redirect(&response, "/login");
    let page = body_text(browser.get("/login").await?).await?;
    assert!(page.contains("Invalid email or password"));

    let response = browser.post("/login", login(EMAIL, &longest)).await?;
    assert_redirect(&response, "/");
    Ok(())
}

#[tokio::test]
async fn every_registration_gets_exactly_one_role() -> Result<()> {
    let dir = h5p_dir()?;
    let store = Arc::new(MemoryStore::new());
    let app = app(store.clone(), dir.path())?;

    for email in ["one@x.com", "two@x.com", "three@x.com"] {
        let mut browser = Browser::new(app.clone());
        let response = browser
            .post("/registration", registration(email, PASSWORD, PASSWORD))
            .await?;
        assert_redirect(&response, "/login");
    }

    let rows = store.role_rows().await;
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().all(|row| row.role == DEFAULT_ROLE));
    Ok(())
}

#[tokio::test]
async fn login_failures_are_indistinguishable() -> Result<()> {
    let dir = h5p_dir()?;
    let store = Arc::new(MemoryStore::new());
    let app = app(store.clone(), dir.path())?;

    Browser::new(app.clone())
        .post("/registration", registration(EMAIL, PASSWORD, PASSWORD))
        .await?;

    let mut unknown = Browser::new(app.clone());
    let unknown_response = unknown.post("/login", login("b@x.com", PASSWORD)).await?;
    let mut wrong = Browser::new(app);
    let wrong_response = wrong.post("/login", login(EMAIL, "Abcdef1?")).await?;

    assert_eq!(unknown_response.status(), wrong_response.status());
    assert_redirect(&unknown_response, "/login");
    assert_redirect(&wrong_response, "/login");

    let unknown_page = body_text(unknown.get("/login").await?).await?;
    let wrong_page = body_text(wrong.get("/login").await?).await?;
    assert!(unknown_page.contains("Invalid email or password"));
    assert_eq!(unknown_page, wrong_page);
    Ok(())
}

#[tokio::test]
async fn guards_redirect() -> Result<()> {
    let dir = h5p_dir()?;
    let store = Arc::new(MemoryStore::new());
    let mut browser = Browser::new(app(store, dir.path())?);

    // Anonymous visitors can not log out.
    let response = browser.send(Method::POST, "/logout", None).await?;
    assert_redirect(&response, "/login");

    let response = browser.get("/registration").await?;
    assert_eq!(response.status(), StatusCode::OK);

    browser
        .post("/registration", registration(EMAIL, PASSWORD, PASSWORD))
        .await?;
    browser.post("/login", login(EMAIL, PASSWORD)).await?;

    // Signed-in users are sent home from the guest pages.
    assert_redirect(&browser.get("/login").await?, "/");
    assert_redirect(&browser.get("/registration").await?, "/");
    assert_redirect(
        &browser
            .post("/registration", registration("c@x.com", PASSWORD, PASSWORD))
            .await?,
        "/",
    );
    Ok(())
}

#[tokio::test]
async fn anonymous_visits_do_not_create_sessions() -> Result<()> {
    let dir = h5p_dir()?;
    let store = Arc::new(MemoryStore::new());
    let mut browser = Browser::new(app(store.clone(), dir.path())?);

    let response = browser.get("/").await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get(SET_COOKIE).is_none());

    let response = browser.get("/login").await?;
    assert!(response.headers().get(SET_COOKIE).is_none());
    assert_eq!(store.session_count().await, 0);
    Ok(())
}

#[tokio::test]
async fn session_of_removed_user_is_invalidated() -> Result<()> {
    let dir = h5p_dir()?;
    let store = Arc::new(MemoryStore::new());
    let mut browser = Browser::new(app(store.clone(), dir.path())?);

    browser
        .post("/registration", registration(EMAIL, PASSWORD, PASSWORD))
        .await?;
    browser.post("/login", login(EMAIL, PASSWORD)).await?;
    assert_eq!(store.session_count().await, 1);

    let user = store
        .find_by_email(EMAIL)
        .await?
        .ok_or_else(|| anyhow!("user not stored"))?;
    assert!(store.remove_user(user.id).await);

    let response = browser.get("/").await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(browser.cookie().is_none());
    assert_eq!(store.session_count().await, 0);
    Ok(())
}

#[tokio::test]
async fn tampered_cookie_is_ignored() -> Result<()> {
    let dir = h5p_dir()?;
    let store = Arc::new(MemoryStore::new());
    let app = app(store, dir.path())?;

    let mut browser = Browser::new(app.clone());
    browser
        .post("/registration", registration(EMAIL, PASSWORD, PASSWORD))
        .await?;
    browser.post("/login", login(EMAIL, PASSWORD)).await?;
    let cookie = browser
        .cookie()
        .ok_or_else(|| anyhow!("no session cookie"))?
        .to_string();
    let (token, _) = cookie
        .split_once('.')
        .ok_or_else(|| anyhow!("unsigned cookie"))?;

    let request = axum::http::Request::builder()
        .uri("/logout")
        .method(Method::POST)
        .header(axum::http::header::COOKIE, format!("{token}.forged"))
        .body(axum::body::Body::empty())?;
    let response = tower::ServiceExt::oneshot(app, request).await?;
    assert_redirect(&response, "/login");
    Ok(())
}

/// Users live somewhere that fails every write.
struct BrokenUsers;

#[async_trait]
impl UserStore for BrokenUsers {
    async fn create_user(&self, _user: NewUser<'_>) -> Result<CreateUserOutcome> {
        Err(anyhow!("connection reset"))
    }

    async fn find_by_email(&self, _email: &str) -> Result<Option<User>> {
        Err(anyhow!("connection reset"))
    }

    async fn find_by_id(&self, _id: Uuid) -> Result<Option<User>> {
        Ok(None)
    }

    async fn roles(&self, _user_id: Uuid) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    async fn ping(&self) -> Result<()> {
        Err(anyhow!("connection reset"))
    }
}

#[tokio::test]
async fn persistence_failure_is_flashed() -> Result<()> {
    let dir = h5p_dir()?;
    let sessions = Arc::new(MemoryStore::new());
    let mut browser = Browser::new(app_with(Arc::new(BrokenUsers), sessions, dir.path())?);

    let response = browser
        .post("/registration", registration(EMAIL, PASSWORD, PASSWORD))
        .await?;
    assert_redirect(&response, "/registration");

    let page = body_text(browser.get("/registration").await?).await?;
    assert!(page.contains("Registration failed, please try again"));

    let response = browser.get("/health").await?;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    Ok(())
}

#[tokio::test]
async fn health_reports_build_and_request_id() -> Result<()> {
    let dir = h5p_dir()?;
    let mut browser = Browser::new(app(Arc::new(MemoryStore::new()), dir.path())?);

    let response = browser.get("/health").await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-app"));
    assert!(response.headers().contains_key("x-request-id"));

    let body: serde_json::Value = serde_json::from_str(&body_text(response).await?)?;
    assert_eq!(body["name"], "atelier");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert!(body["build"].is_string());
    Ok(())
}
