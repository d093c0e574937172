//! Integration tests against an in-process fake backend.
//!
//! One axum server plays the REST API, the identity provider, the image host
//! and the mail relay; the crate's real clients talk to it over HTTP.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{FromRequest, Multipart, Path, Query, Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Form, Json, Router,
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;

use crate::api::{ContactMessage, DeleteOutcome, MESSAGE_SENT};
use crate::auth::{
    GateView, SessionState, INVALID_CREDENTIALS, RESET_EMAIL_FAILED, RESET_EMAIL_SENT,
};
use crate::config::Config;
use crate::errors::ClientError;
use crate::models::{optional_field, Comment, Project, ProjectFields};
use crate::routes::LOGIN_PATH;
use crate::upload::ImageFile;
use crate::workflow::{FormMode, Phase, COMMENT_SUBMITTED, PROJECT_ADDED, PROJECT_UPDATED};
use crate::{init_tracing, Portfolio};

const SECRET: &[u8] = b"fake-identity-secret";
const API_KEY: &str = "test-key";
const HOST_KEY: &str = "host-key";
const ADMIN_EMAIL: &str = "admin@example.com";
const EDITOR_EMAIL: &str = "editor@example.com";
const PASSWORD: &str = "correct horse";

static TRACING: Lazy<()> = Lazy::new(|| {
    let quiet = |key: &str| (key == "PORTFOLIO_LOG_LEVEL").then(|| "warn".to_string());
    if let Ok(config) = Config::from_vars(quiet) {
        init_tracing(&config);
    }
});

/// State of the fake services.
#[derive(Default)]
struct Backend {
    comments: Mutex<Vec<Comment>>,
    projects: Mutex<Vec<Project>>,
    /// `METHOD /path` for every API request
    calls: Mutex<Vec<String>>,
    uploads: Mutex<Vec<String>>,
    reject_upload: Mutex<Option<String>>,
    fail_approve: AtomicBool,
    mail: Mutex<Vec<Value>>,
    api_delay_ms: AtomicU64,
    /// ID token lifetime handed out at sign-in; 0 means one hour
    token_lifetime_secs: AtomicI64,
    refreshes: AtomicUsize,
    revoke_refresh: AtomicBool,
}

type Shared = Arc<Backend>;

impl Backend {
    fn count(&self, call: &str) -> usize {
        self.calls.lock().iter().filter(|c| c.as_str() == call).count()
    }

    fn lifetime(&self) -> i64 {
        match self.token_lifetime_secs.load(Ordering::SeqCst) {
            0 => 3600,
            secs => secs,
        }
    }
}

fn message(status: StatusCode, text: &str) -> Response {
    (status, Json(json!({ "message": text }))).into_response()
}

fn identity_error(code: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": { "code": 400, "message": code } })),
    )
        .into_response()
}

fn uid_for(email: &str) -> String {
    format!("uid-{}", email.split('@').next().unwrap_or(email))
}

fn issue_token(email: &str, lifetime: i64) -> String {
    let mut claims = json!({
        "sub": uid_for(email),
        "email": email,
        "exp": Utc::now().timestamp() + lifetime,
    });
    if email == ADMIN_EMAIL {
        claims["role"] = json!("admin");
    }
    encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET)).unwrap()
}

fn require_bearer(headers: &HeaderMap) -> Result<(), Response> {
    let valid = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .is_some_and(|token| {
            decode::<Value>(
                token,
                &DecodingKey::from_secret(SECRET),
                &Validation::new(Algorithm::HS256),
            )
            .is_ok()
        });
    if valid {
        Ok(())
    } else {
        Err(message(StatusCode::UNAUTHORIZED, "Unauthorized"))
    }
}

async fn record(State(backend): State<Shared>, request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();
    if path.starts_with("/api/") {
        backend
            .calls
            .lock()
            .push(format!("{} {}", request.method(), path));
        let delay = backend.api_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
    }
    next.run(request).await
}

async fn list_comments(State(backend): State<Shared>) -> Json<Vec<Comment>> {
    let approved = backend
        .comments
        .lock()
        .iter()
        .filter(|c| c.approved)
        .cloned()
        .collect();
    Json(approved)
}

async fn list_all_comments(State(backend): State<Shared>, headers: HeaderMap) -> Response {
    if let Err(rejection) = require_bearer(&headers) {
        return rejection;
    }
    let all = backend.comments.lock().clone();
    Json(all).into_response()
}

async fn create_comment(State(backend): State<Shared>, Json(body): Json<Value>) -> Response {
    let text = body["text"].as_str().unwrap_or_default();
    let author = body["userEmail"].as_str().unwrap_or_default();
    if text.is_empty() || author.is_empty() {
        return message(StatusCode::BAD_REQUEST, "Text and name are required");
    }

    let comment = Comment {
        id: uuid::Uuid::new_v4().to_string(),
        text: text.to_string(),
        user_email: author.to_string(),
        created_at: Utc::now(),
        approved: false,
    };
    backend.comments.lock().push(comment.clone());
    (StatusCode::CREATED, Json(comment)).into_response()
}

async fn approve_comment(
    State(backend): State<Shared>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    if let Err(rejection) = require_bearer(&headers) {
        return rejection;
    }
    if backend.fail_approve.load(Ordering::SeqCst) {
        return message(StatusCode::INTERNAL_SERVER_ERROR, "Approval failed");
    }
    let mut comments = backend.comments.lock();
    match comments.iter_mut().find(|c| c.id == id) {
        Some(comment) => {
            comment.approved = true;
            Json(comment.clone()).into_response()
        }
        None => message(StatusCode::NOT_FOUND, "Comment not found"),
    }
}

async fn delete_comment(
    State(backend): State<Shared>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    if let Err(rejection) = require_bearer(&headers) {
        return rejection;
    }
    let mut comments = backend.comments.lock();
    let before = comments.len();
    comments.retain(|c| c.id != id);
    if comments.len() == before {
        message(StatusCode::NOT_FOUND, "Comment not found")
    } else {
        message(StatusCode::OK, "Comment deleted")
    }
}

async fn list_projects(State(backend): State<Shared>) -> Json<Vec<Project>> {
    let projects = backend.projects.lock().clone();
    Json(projects)
}

async fn read_project_form(multipart: &mut Multipart) -> ProjectFields {
    let mut fields = ProjectFields::default();
    while let Some(field) = multipart.next_field().await.unwrap() {
        let name = field.name().unwrap_or_default().to_string();
        if name == "images" {
            let file_name = field.file_name().unwrap_or("unnamed").to_string();
            field.bytes().await.unwrap();
            fields
                .images
                .push(format!("https://uploads.example/{}", file_name));
            continue;
        }

        let value = field.text().await.unwrap();
        match name.as_str() {
            "name" => fields.name = value,
            "github" => fields.github = optional_field(&value),
            "live" => fields.live = optional_field(&value),
            "description" => fields.description = optional_field(&value),
            "technologies" => fields.technologies = serde_json::from_str(&value).unwrap(),
            _ => {}
        }
    }
    fields
}

fn store_project(id: String, fields: ProjectFields) -> Project {
    Project {
        id,
        name: fields.name,
        github: fields.github,
        live: fields.live,
        description: fields.description,
        technologies: fields.technologies,
        images: fields.images,
    }
}

async fn create_project(State(backend): State<Shared>, request: Request) -> Response {
    if let Err(rejection) = require_bearer(request.headers()) {
        return rejection;
    }
    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("multipart/form-data"));

    let fields = if is_multipart {
        let mut multipart = match Multipart::from_request(request, &()).await {
            Ok(multipart) => multipart,
            Err(rejection) => return rejection.into_response(),
        };
        read_project_form(&mut multipart).await
    } else {
        match Json::<ProjectFields>::from_request(request, &()).await {
            Ok(Json(fields)) => fields,
            Err(rejection) => return rejection.into_response(),
        }
    };

    if fields.name == "Taken" {
        return message(StatusCode::BAD_REQUEST, "Project name taken");
    }

    let project = store_project(uuid::Uuid::new_v4().to_string(), fields);
    backend.projects.lock().push(project.clone());
    (StatusCode::CREATED, Json(project)).into_response()
}

async fn update_project(
    State(backend): State<Shared>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(fields): Json<ProjectFields>,
) -> Response {
    if let Err(rejection) = require_bearer(&headers) {
        return rejection;
    }
    let mut projects = backend.projects.lock();
    match projects.iter_mut().find(|p| p.id == id) {
        Some(project) => {
            *project = store_project(id, fields);
            Json(project.clone()).into_response()
        }
        None => message(StatusCode::NOT_FOUND, "Project not found"),
    }
}

async fn delete_project(
    State(backend): State<Shared>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    if let Err(rejection) = require_bearer(&headers) {
        return rejection;
    }
    let mut projects = backend.projects.lock();
    let before = projects.len();
    projects.retain(|p| p.id != id);
    if projects.len() == before {
        message(StatusCode::NOT_FOUND, "Project not found")
    } else {
        message(StatusCode::OK, "Project deleted")
    }
}

async fn upload_image(
    State(backend): State<Shared>,
    Query(query): Query<HashMap<String, String>>,
    mut multipart: Multipart,
) -> Response {
    let rejected = |text: &str| {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({ "success": false, "status_code": 400, "error": { "message": text } })),
        )
            .into_response()
    };
    if query.get("key").map(String::as_str) != Some(HOST_KEY) {
        return rejected("Invalid API v1 key.");
    }

    let reject_name = backend.reject_upload.lock().clone();
    while let Some(field) = multipart.next_field().await.unwrap() {
        if field.name() != Some("image") {
            continue;
        }
        let file_name = field.file_name().unwrap_or("unnamed").to_string();
        field.bytes().await.unwrap();
        backend.uploads.lock().push(file_name.clone());

        if reject_name.as_deref() == Some(file_name.as_str()) {
            return rejected("Invalid image");
        }
        return Json(json!({
            "success": true,
            "data": { "url": format!("https://img.example/{}", file_name) },
        }))
        .into_response();
    }
    rejected("Empty upload source.")
}

async fn identity_action(
    State(backend): State<Shared>,
    Path(action): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> Response {
    if query.get("key").map(String::as_str) != Some(API_KEY) {
        return identity_error("API key not valid. Please pass a valid API key.");
    }
    let email = body["email"].as_str().unwrap_or_default().to_string();
    let known = email == ADMIN_EMAIL || email == EDITOR_EMAIL;

    match action.as_str() {
        "accounts:signInWithPassword" => {
            if !known || body["password"].as_str() != Some(PASSWORD) {
                return identity_error("INVALID_LOGIN_CREDENTIALS");
            }
            let lifetime = backend.lifetime();
            Json(json!({
                "localId": uid_for(&email),
                "email": email,
                "idToken": issue_token(&email, lifetime),
                "refreshToken": format!("refresh:{}", email),
                "expiresIn": lifetime.to_string(),
            }))
            .into_response()
        }
        "accounts:sendOobCode" => {
            if !known {
                return identity_error("EMAIL_NOT_FOUND");
            }
            Json(json!({ "email": email })).into_response()
        }
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn refresh_token(
    State(backend): State<Shared>,
    Query(query): Query<HashMap<String, String>>,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    if query.get("key").map(String::as_str) != Some(API_KEY) {
        return identity_error("API key not valid. Please pass a valid API key.");
    }
    if form.get("grant_type").map(String::as_str) != Some("refresh_token") {
        return identity_error("INVALID_GRANT_TYPE");
    }
    if backend.revoke_refresh.load(Ordering::SeqCst) {
        return identity_error("TOKEN_EXPIRED");
    }
    let Some(email) = form
        .get("refresh_token")
        .and_then(|t| t.strip_prefix("refresh:"))
    else {
        return identity_error("INVALID_REFRESH_TOKEN");
    };

    backend.refreshes.fetch_add(1, Ordering::SeqCst);
    Json(json!({
        "id_token": issue_token(email, 3600),
        "refresh_token": format!("refresh:{}", email),
        "expires_in": "3600",
        "user_id": uid_for(email),
    }))
    .into_response()
}

async fn send_mail(State(backend): State<Shared>, Json(body): Json<Value>) -> &'static str {
    backend.mail.lock().push(body);
    "OK"
}

fn router(backend: Shared) -> Router {
    Router::new()
        .route("/api/comments", get(list_comments).post(create_comment))
        .route("/api/comments/all", get(list_all_comments))
        .route("/api/comments/approve/{id}", put(approve_comment))
        .route("/api/comments/{id}", axum::routing::delete(delete_comment))
        .route("/api/projects", get(list_projects).post(create_project))
        .route(
            "/api/projects/{id}",
            put(update_project).delete(delete_project),
        )
        .route("/upload", post(upload_image))
        .route("/identity/{action}", post(identity_action))
        .route("/securetoken/token", post(refresh_token))
        .route("/mail/send", post(send_mail))
        .layer(middleware::from_fn_with_state(backend.clone(), record))
        .layer(TraceLayer::new_for_http())
        .with_state(backend)
}

/// Test fixture: fake backend plus a client wired to it.
struct Fixture {
    backend: Shared,
    portfolio: Portfolio,
}

impl Fixture {
    async fn new() -> Self {
        Self::with_vars(&[]).await
    }

    async fn with_vars(extra: &[(&str, &str)]) -> Self {
        Lazy::force(&TRACING);

        let backend = Arc::new(Backend::default());
        let app = router(backend.clone());

        // Bind to random port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get addr");
        let base_url = format!("http://{}", addr);

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let mut vars: HashMap<String, String> = [
            ("PORTFOLIO_API_BASE_URL", format!("{}/api", base_url)),
            ("PORTFOLIO_IDENTITY_API_KEY", API_KEY.to_string()),
            ("PORTFOLIO_IDENTITY_URL", format!("{}/identity", base_url)),
            ("PORTFOLIO_TOKEN_URL", format!("{}/securetoken", base_url)),
            ("PORTFOLIO_IMAGE_HOST_URL", format!("{}/upload", base_url)),
            ("PORTFOLIO_IMAGE_HOST_KEY", HOST_KEY.to_string()),
            ("PORTFOLIO_MAIL_URL", format!("{}/mail/send", base_url)),
            ("PORTFOLIO_MAIL_SERVICE_ID", "service_test".to_string()),
            ("PORTFOLIO_MAIL_TEMPLATE_ID", "template_test".to_string()),
            ("PORTFOLIO_MAIL_PUBLIC_KEY", "public_test".to_string()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
        for (key, value) in extra {
            vars.insert(key.to_string(), value.to_string());
        }

        let config = Config::from_vars(|key| vars.get(key).cloned()).unwrap();
        let portfolio = Portfolio::from_config(config).unwrap();

        Fixture { backend, portfolio }
    }

    async fn sign_in(&self, email: &str) {
        self.portfolio
            .login()
            .submit(email, PASSWORD, None)
            .await
            .unwrap();
    }

    fn seed_comment(&self, id: &str, approved: bool) {
        self.backend.comments.lock().push(Comment {
            id: id.to_string(),
            text: format!("comment {}", id),
            user_email: "Visitor".to_string(),
            created_at: Utc::now(),
            approved,
        });
    }

    fn seed_project(&self, id: &str, images: &[&str]) {
        self.backend.projects.lock().push(Project {
            id: id.to_string(),
            name: format!("Project {}", id),
            github: Some("https://github.com/example/shop".to_string()),
            live: None,
            description: Some("An online shop".to_string()),
            technologies: vec!["React".to_string()],
            images: images.iter().map(|i| format!("https://img.example/{}", i)).collect(),
        });
    }
}

fn png(name: &str) -> ImageFile {
    ImageFile::new(name, "image/png", vec![0x89, b'P', b'N', b'G'])
}

#[tokio::test]
async fn test_gate_redirects_then_login_returns_to_requested_page() {
    let fixture = Fixture::new().await;
    let gate = fixture.portfolio.gate();

    let GateView::Redirect(redirect) = gate.enter("/admin/dashboard/manage-projects").await else {
        panic!("anonymous visitor was not redirected");
    };
    assert_eq!(redirect.to, LOGIN_PATH);
    assert_eq!(redirect.from, "/admin/dashboard/manage-projects");

    let target = fixture
        .portfolio
        .login()
        .submit(ADMIN_EMAIL, PASSWORD, Some(redirect.from.as_str()))
        .await
        .unwrap();
    assert_eq!(target, "/admin/dashboard/manage-projects");

    match gate.enter(&target).await {
        GateView::Render(session) => {
            assert_eq!(session.uid, "uid-admin");
            assert!(session.has_role("admin"));
        }
        other => panic!("expected access, got {:?}", other),
    }
}

#[tokio::test]
async fn test_public_pages_are_open() {
    let fixture = Fixture::new().await;
    let gate = fixture.portfolio.gate();

    assert_eq!(gate.enter("/").await, GateView::Open);
    assert_eq!(gate.enter("/projects").await, GateView::Open);
    assert!(fixture.backend.calls.lock().is_empty());
}

#[tokio::test]
async fn test_wrong_password_shows_generic_message() {
    let fixture = Fixture::new().await;
    let login = fixture.portfolio.login();

    let err = login
        .submit(ADMIN_EMAIL, "wrong", Some("/admin/dashboard"))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Auth(_)));

    let state = login.state();
    assert!(!state.submitting);
    assert_eq!(state.error.as_deref(), Some(INVALID_CREDENTIALS));
}

#[tokio::test]
async fn test_blank_login_is_rejected_locally() {
    let fixture = Fixture::new().await;
    let login = fixture.portfolio.login();

    let err = login.submit("  ", "", None).await.unwrap_err();
    assert!(matches!(err, ClientError::Validation(_)));
    assert!(login.state().error.is_some());
}

#[tokio::test]
async fn test_role_policy_turns_away_non_admins() {
    let fixture = Fixture::new().await;
    fixture.sign_in(EDITOR_EMAIL).await;

    let view = fixture.portfolio.gate().enter("/admin/dashboard").await;
    assert!(matches!(view, GateView::Redirect(_)));
}

#[tokio::test]
async fn test_signed_in_policy_admits_any_session() {
    let fixture = Fixture::with_vars(&[("PORTFOLIO_ACCESS_POLICY", "signed-in")]).await;
    fixture.sign_in(EDITOR_EMAIL).await;

    let view = fixture
        .portfolio
        .gate()
        .enter("/admin/dashboard/manage-experience")
        .await;
    assert!(matches!(view, GateView::Render(_)));
}

#[tokio::test]
async fn test_password_reset_messages() {
    let fixture = Fixture::new().await;
    let login = fixture.portfolio.login();

    assert!(login.forgot_password(" ").await.is_err());

    login.forgot_password(ADMIN_EMAIL).await.unwrap();
    assert_eq!(login.state().notice.as_deref(), Some(RESET_EMAIL_SENT));

    assert!(login.forgot_password("nobody@example.com").await.is_err());
    let state = login.state();
    assert!(state.notice.is_none());
    assert_eq!(state.error.as_deref(), Some(RESET_EMAIL_FAILED));
}

#[tokio::test]
async fn test_sign_out_closes_the_gate() {
    let fixture = Fixture::new().await;
    fixture.sign_in(ADMIN_EMAIL).await;
    let gate = fixture.portfolio.gate();
    assert!(matches!(gate.enter("/admin/dashboard").await, GateView::Render(_)));

    let identity = fixture.portfolio.identity();
    let changes = identity.subscribe();
    identity.sign_out().await;

    assert_eq!(*changes.borrow(), SessionState::SignedOut);
    assert!(matches!(gate.enter("/admin/dashboard").await, GateView::Redirect(_)));
}

#[tokio::test]
async fn test_expiring_token_is_renewed_before_use() {
    let fixture = Fixture::new().await;
    fixture.backend.token_lifetime_secs.store(30, Ordering::SeqCst);
    fixture.sign_in(ADMIN_EMAIL).await;

    let moderation = fixture.portfolio.comment_moderation();
    moderation.mount().await.unwrap();
    assert_eq!(fixture.backend.refreshes.load(Ordering::SeqCst), 1);

    moderation.refresh().await.unwrap();
    assert_eq!(fixture.backend.refreshes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_rejected_refresh_ends_session() {
    let fixture = Fixture::new().await;
    fixture.backend.token_lifetime_secs.store(30, Ordering::SeqCst);
    fixture.backend.revoke_refresh.store(true, Ordering::SeqCst);
    fixture.sign_in(ADMIN_EMAIL).await;

    let changes = fixture.portfolio.identity().subscribe();
    let view = fixture.portfolio.gate().enter("/admin/dashboard").await;

    assert!(matches!(view, GateView::Redirect(_)));
    assert_eq!(*changes.borrow(), SessionState::SignedOut);
}

#[tokio::test]
async fn test_public_comment_waits_for_approval() {
    let fixture = Fixture::new().await;
    let board = fixture.portfolio.comment_board();
    board.mount().await.unwrap();

    assert!(board.submit().await.is_err());
    assert_eq!(fixture.backend.count("POST /api/comments"), 0);

    board.update_draft(|draft| {
        draft.author = " Karim ".to_string();
        draft.text = "Great portfolio".to_string();
    });
    board.submit().await.unwrap();

    let state = board.snapshot();
    assert_eq!(state.notice.as_deref(), Some(COMMENT_SUBMITTED));
    assert!(state.items.is_empty());
    assert!(state.draft.text.is_empty());

    let stored = fixture.backend.comments.lock().clone();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].user_email, "Karim");
    assert!(!stored[0].approved);
}

#[tokio::test]
async fn test_approve_comment_reaches_public_list() {
    let fixture = Fixture::new().await;
    fixture.seed_comment("c0", true);
    fixture.seed_comment("c1", false);

    let board = fixture.portfolio.comment_board();
    board.mount().await.unwrap();
    let public: Vec<String> = board.snapshot().items.into_iter().map(|c| c.id).collect();
    assert_eq!(public, vec!["c0"]);

    fixture.sign_in(ADMIN_EMAIL).await;
    let moderation = fixture.portfolio.comment_moderation();
    moderation.mount().await.unwrap();

    let pending = moderation.snapshot();
    assert_eq!(pending.items.len(), 2);
    let c1 = pending.items.iter().find(|c| c.id == "c1").unwrap();
    assert!(c1.can_approve());

    moderation.approve("c1").await.unwrap();
    let state = moderation.snapshot();
    let c1 = state.items.iter().find(|c| c.id == "c1").unwrap();
    assert!(c1.approved);
    assert!(!c1.can_approve());
    assert_eq!(state.phase, Phase::Ready);
    assert_eq!(fixture.backend.count("PUT /api/comments/approve/c1"), 1);

    board.refresh().await.unwrap();
    let public: Vec<String> = board.snapshot().items.into_iter().map(|c| c.id).collect();
    assert_eq!(public, vec!["c0", "c1"]);
}

#[tokio::test]
async fn test_moderation_requires_login() {
    let fixture = Fixture::new().await;
    let moderation = fixture.portfolio.comment_moderation();

    let err = moderation.mount().await.unwrap_err();
    assert!(matches!(err, ClientError::Auth(_)));

    let state = moderation.snapshot();
    assert_eq!(state.phase, Phase::Error);
    assert_eq!(state.error.as_deref(), Some("Admin login required"));
    assert_eq!(fixture.backend.count("GET /api/comments/all"), 0);
}

#[tokio::test]
async fn test_delete_comment_after_confirmation() {
    let fixture = Fixture::new().await;
    fixture.seed_comment("c1", false);
    fixture.sign_in(ADMIN_EMAIL).await;

    let moderation = fixture.portfolio.comment_moderation();
    moderation.mount().await.unwrap();
    moderation.request_delete("c1").unwrap();
    moderation.confirm_delete().await.unwrap();

    assert!(moderation.snapshot().items.is_empty());
    assert!(fixture.backend.comments.lock().is_empty());
}

#[tokio::test]
async fn test_refused_approval_is_reverted() {
    let fixture = Fixture::new().await;
    fixture.seed_comment("c1", false);
    fixture.sign_in(ADMIN_EMAIL).await;

    let moderation = fixture.portfolio.comment_moderation();
    moderation.mount().await.unwrap();
    fixture.backend.fail_approve.store(true, Ordering::SeqCst);

    let err = moderation.approve("c1").await.unwrap_err();
    assert!(matches!(err, ClientError::Server { status: 500, .. }));

    let state = moderation.snapshot();
    assert_eq!(state.phase, Phase::Ready);
    assert_eq!(state.error.as_deref(), Some("Approval failed"));
    let c1 = state.items.iter().find(|c| c.id == "c1").unwrap();
    assert!(!c1.approved);
    assert!(c1.can_approve());
    assert!(!fixture.backend.comments.lock()[0].approved);
}

#[tokio::test]
async fn test_deleting_comment_already_gone_still_removes_it() {
    let fixture = Fixture::new().await;
    fixture.seed_comment("c1", false);
    fixture.seed_comment("c2", false);
    fixture.sign_in(ADMIN_EMAIL).await;

    let moderation = fixture.portfolio.comment_moderation();
    moderation.mount().await.unwrap();
    assert_eq!(moderation.snapshot().items.len(), 2);

    // Someone else removed it in the meantime
    fixture.backend.comments.lock().retain(|c| c.id != "c1");

    moderation.request_delete("c1").unwrap();
    let outcome = moderation.confirm_delete().await.unwrap();
    assert_eq!(outcome, DeleteOutcome::NotFound);
    assert_eq!(fixture.backend.count("DELETE /api/comments/c1"), 1);
    assert_eq!(fixture.backend.count("GET /api/comments/all"), 2);

    let state = moderation.snapshot();
    assert_eq!(state.phase, Phase::Ready);
    assert!(state.error.is_none());
    let ids: Vec<String> = state.items.into_iter().map(|c| c.id).collect();
    assert_eq!(ids, vec!["c2"]);
}

#[tokio::test]
async fn test_invalid_project_never_reaches_server() {
    let fixture = Fixture::new().await;
    fixture.sign_in(ADMIN_EMAIL).await;
    let admin = fixture.portfolio.project_admin();
    admin.mount().await.unwrap();

    admin.add_image(png("a.png")).unwrap();
    let err = admin.submit().await.unwrap_err();
    assert!(matches!(err, ClientError::Validation(_)));
    assert_eq!(
        admin.snapshot().error.as_deref(),
        Some("Project name is required.")
    );

    admin.update_draft(|draft| {
        draft.name = "Shop".to_string();
        draft.new_images.clear();
    });
    let err = admin.submit().await.unwrap_err();
    assert!(matches!(err, ClientError::Validation(_)));
    assert_eq!(admin.snapshot().phase, Phase::Ready);

    assert_eq!(fixture.backend.count("POST /api/projects"), 0);
    assert!(fixture.backend.uploads.lock().is_empty());
}

#[tokio::test]
async fn test_failed_upload_stops_the_batch() {
    let fixture = Fixture::new().await;
    *fixture.backend.reject_upload.lock() = Some("b.png".to_string());
    fixture.sign_in(ADMIN_EMAIL).await;

    let admin = fixture.portfolio.project_admin();
    admin.mount().await.unwrap();
    admin.update_draft(|draft| draft.name = "Shop".to_string());
    for name in ["a.png", "b.png", "c.png"] {
        admin.add_image(png(name)).unwrap();
    }

    match admin.submit().await.unwrap_err() {
        ClientError::Upload {
            position,
            file_name,
            message,
        } => {
            assert_eq!(position, 2);
            assert_eq!(file_name, "b.png");
            assert_eq!(message, "Invalid image");
        }
        other => panic!("unexpected error: {:?}", other),
    }

    assert_eq!(*fixture.backend.uploads.lock(), vec!["a.png", "b.png"]);
    assert_eq!(fixture.backend.count("POST /api/projects"), 0);

    let state = admin.snapshot();
    assert_eq!(state.phase, Phase::Ready);
    assert!(state.error.unwrap().contains("b.png"));
    assert_eq!(state.draft.new_images.len(), 3);
}

#[tokio::test]
async fn test_create_project_uploads_then_refetches() {
    let fixture = Fixture::new().await;
    fixture.sign_in(ADMIN_EMAIL).await;
    let admin = fixture.portfolio.project_admin();
    admin.mount().await.unwrap();

    admin.update_draft(|draft| {
        draft.name = "Shop".to_string();
        draft.technologies = "React, , Node.js,".to_string();
        draft.live = "https://shop.example".to_string();
    });
    admin.add_image(png("a.png")).unwrap();
    admin.add_image(png("b.png")).unwrap();
    admin.submit().await.unwrap();

    let stored = fixture.backend.projects.lock().clone();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].technologies, vec!["React", "Node.js"]);
    assert_eq!(
        stored[0].images,
        vec!["https://img.example/a.png", "https://img.example/b.png"]
    );
    assert!(stored[0].github.is_none());

    let state = admin.snapshot();
    assert_eq!(state.items, stored);
    assert_eq!(state.notice.as_deref(), Some(PROJECT_ADDED));
    assert_eq!(state.mode, FormMode::Create);
    assert!(state.draft.new_images.is_empty());
}

#[tokio::test]
async fn test_edit_project_merges_and_caps_images() {
    let fixture = Fixture::new().await;
    fixture.seed_project("p1", &["a", "b", "c"]);
    fixture.sign_in(ADMIN_EMAIL).await;

    let admin = fixture.portfolio.project_admin();
    admin.mount().await.unwrap();
    admin.edit("p1").unwrap();
    admin.add_image(png("d.png")).unwrap();
    admin.add_image(png("e.png")).unwrap();
    admin.submit().await.unwrap();

    let stored = fixture.backend.projects.lock()[0].clone();
    assert_eq!(
        stored.images,
        vec![
            "https://img.example/a",
            "https://img.example/b",
            "https://img.example/c",
            "https://img.example/d.png",
        ]
    );
    assert_eq!(stored.technologies, vec!["React"]);
    assert_eq!(fixture.backend.count("PUT /api/projects/p1"), 1);
    assert_eq!(fixture.backend.count("POST /api/projects"), 0);
    assert_eq!(admin.snapshot().notice.as_deref(), Some(PROJECT_UPDATED));
}

#[tokio::test]
async fn test_server_message_is_shown() {
    let fixture = Fixture::new().await;
    fixture.seed_project("p1", &["a"]);
    fixture.sign_in(ADMIN_EMAIL).await;

    let admin = fixture.portfolio.project_admin();
    admin.mount().await.unwrap();
    admin.update_draft(|draft| draft.name = "Taken".to_string());
    admin.add_image(png("a.png")).unwrap();

    let err = admin.submit().await.unwrap_err();
    assert!(matches!(err, ClientError::Server { status: 400, .. }));

    let state = admin.snapshot();
    assert_eq!(state.error.as_deref(), Some("Project name taken"));
    assert_eq!(state.phase, Phase::Ready);
    assert_eq!(state.items.len(), 1);
    assert_eq!(state.draft.name, "Taken");
}

#[tokio::test]
async fn test_delete_project_requires_confirmation() {
    let fixture = Fixture::new().await;
    fixture.seed_project("p1", &["a"]);
    fixture.sign_in(ADMIN_EMAIL).await;

    let admin = fixture.portfolio.project_admin();
    admin.mount().await.unwrap();

    admin.request_delete("p1").unwrap();
    admin.cancel_delete();
    assert!(admin.confirm_delete().await.is_err());
    assert_eq!(fixture.backend.count("DELETE /api/projects/p1"), 0);

    admin.request_delete("p1").unwrap();
    let outcome = admin.confirm_delete().await.unwrap();
    assert_eq!(outcome, DeleteOutcome::Deleted);
    assert_eq!(fixture.backend.count("DELETE /api/projects/p1"), 1);
    assert!(admin.snapshot().items.is_empty());
}

#[tokio::test]
async fn test_deleting_missing_project_reports_not_found() {
    let fixture = Fixture::new().await;
    fixture.sign_in(ADMIN_EMAIL).await;

    let outcome = fixture.portfolio.projects().delete("ghost").await.unwrap();
    assert_eq!(outcome, DeleteOutcome::NotFound);
}

#[tokio::test]
async fn test_multipart_create_sends_binaries() {
    let fixture = Fixture::new().await;
    fixture.sign_in(ADMIN_EMAIL).await;

    let fields = ProjectFields {
        name: "Shop".to_string(),
        description: Some("An online shop".to_string()),
        technologies: vec!["Rust".to_string(), "Axum".to_string()],
        ..Default::default()
    };
    let created = fixture
        .portfolio
        .projects()
        .create_multipart(&fields, &[png("a.png"), png("b.png")])
        .await
        .unwrap();

    assert_eq!(created.name, "Shop");
    assert_eq!(created.technologies, vec!["Rust", "Axum"]);
    assert_eq!(
        created.images,
        vec![
            "https://uploads.example/a.png",
            "https://uploads.example/b.png"
        ]
    );
    assert!(created.github.is_none());
}

#[tokio::test]
async fn test_showcase_lists_projects_without_login() {
    let fixture = Fixture::new().await;
    fixture.seed_project("p1", &["a"]);

    let showcase = fixture.portfolio.project_showcase();
    showcase.mount().await.unwrap();
    assert_eq!(showcase.snapshot().items.len(), 1);
}

#[tokio::test]
async fn test_second_submit_while_submitting_is_busy() {
    let fixture = Fixture::new().await;
    fixture.sign_in(ADMIN_EMAIL).await;
    let admin = fixture.portfolio.project_admin();
    admin.mount().await.unwrap();

    admin.update_draft(|draft| draft.name = "Shop".to_string());
    admin.add_image(png("a.png")).unwrap();
    fixture.backend.api_delay_ms.store(300, Ordering::SeqCst);

    let first = {
        let admin = admin.clone();
        tokio::spawn(async move { admin.submit().await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(admin.snapshot().phase, Phase::Submitting);
    assert!(matches!(admin.submit().await, Err(ClientError::Busy)));

    first.await.unwrap().unwrap();
    assert_eq!(fixture.backend.count("POST /api/projects"), 1);
    assert_eq!(fixture.backend.projects.lock().len(), 1);
}

#[tokio::test]
async fn test_response_after_unmount_is_dropped() {
    let fixture = Fixture::new().await;
    fixture.seed_project("p1", &["a"]);
    fixture.backend.api_delay_ms.store(200, Ordering::SeqCst);

    let showcase = fixture.portfolio.project_showcase();
    let pending = {
        let showcase = showcase.clone();
        tokio::spawn(async move { showcase.mount().await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    showcase.unmount();

    pending.await.unwrap().unwrap();
    let state = showcase.snapshot();
    assert_eq!(state.phase, Phase::Loading);
    assert!(state.items.is_empty());
}

#[tokio::test]
async fn test_hung_request_times_out() {
    let fixture = Fixture::with_vars(&[("PORTFOLIO_REQUEST_TIMEOUT_SECS", "1")]).await;
    fixture.seed_project("p1", &["a"]);
    fixture.backend.api_delay_ms.store(1_500, Ordering::SeqCst);

    let showcase = fixture.portfolio.project_showcase();
    let err = showcase.mount().await.unwrap_err();
    assert!(matches!(err, ClientError::Network(_)));

    let state = showcase.snapshot();
    assert_eq!(state.phase, Phase::Error);
    assert!(state.items.is_empty());
    assert!(state.error.is_some());
}

#[tokio::test]
async fn test_contact_message_is_relayed() {
    let fixture = Fixture::new().await;
    let mailer = fixture.portfolio.contact().unwrap();

    mailer
        .send(&ContactMessage {
            name: "Ana".to_string(),
            email: "ana@example.com".to_string(),
            message: "Let's work together".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(mailer.state().notice.as_deref(), Some(MESSAGE_SENT));

    let sent = fixture.backend.mail.lock().clone();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0]["service_id"], "service_test");
    assert_eq!(sent[0]["user_id"], "public_test");
    assert_eq!(sent[0]["template_params"]["from_email"], "ana@example.com");
}
