use std::sync::Arc;

use askama::Template;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Router,
};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::error;

use crate::article::Category;
use crate::fetcher::Fetcher;
use crate::login::{attempt_login, Session};
use crate::speech::SpeechController;
use crate::view::{AggregatorView, FetchResult, ViewEvent};

const MISSING_CREDENTIALS: &str = "Email and password are required";

pub struct AppState {
    pub session: Session,
    pub view: Mutex<AggregatorView>,
    pub fetcher: Fetcher,
    pub speech: SpeechController,
}

impl AppState {
    pub fn new(fetcher: Fetcher, speech: SpeechController) -> Self {
        Self {
            session: Session::new(),
            view: Mutex::new(AggregatorView::new()),
            fetcher,
            speech,
        }
    }
}

pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/login", get(login_page).post(login))
        .route("/news", get(news))
        .route("/speech/listen", post(listen))
        .route("/speech/stop", post(stop))
        .route("/health", get(health))
        .with_state(state)
}

// Template structs
#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub email: String,
    pub error: Option<String>,
}

#[derive(Template)]
#[template(path = "news.html")]
pub struct NewsTemplate {
    pub categories: Vec<CategoryOption>,
    pub query: String,
    pub loading: bool,
    pub result: FetchResult,
}

pub struct CategoryOption {
    pub value: &'static str,
    pub label: &'static str,
    pub selected: bool,
}

impl NewsTemplate {
    fn from_view(view: &AggregatorView) -> Self {
        let current = view.query();
        Self {
            categories: Category::ALL
                .iter()
                .map(|c| CategoryOption {
                    value: c.as_str(),
                    label: c.label(),
                    selected: *c == current.category,
                })
                .collect(),
            query: current.query.clone(),
            loading: matches!(view.result(), FetchResult::Loading),
            result: view.result().clone(),
        }
    }
}

// Wrapper for HTML responses
struct HtmlTemplate<T>(T);

impl<T: Template> IntoResponse for HtmlTemplate<T> {
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(html) => Html(html).into_response(),
            Err(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to render template: {}", err),
            )
                .into_response(),
        }
    }
}

// Route handlers
pub async fn index(State(state): State<Arc<AppState>>) -> Redirect {
    if state.session.is_authenticated() {
        Redirect::to("/news")
    } else {
        Redirect::to("/login")
    }
}

pub async fn login_page(State(state): State<Arc<AppState>>) -> Response {
    if state.session.is_authenticated() {
        return Redirect::to("/news").into_response();
    }

    HtmlTemplate(LoginTemplate {
        email: String::new(),
        error: None,
    })
    .into_response()
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

pub async fn login(State(state): State<Arc<AppState>>, Form(form): Form<LoginForm>) -> Response {
    if form.email.trim().is_empty() || form.password.is_empty() {
        let page = LoginTemplate {
            email: form.email,
            error: Some(MISSING_CREDENTIALS.to_string()),
        };
        return (StatusCode::UNPROCESSABLE_ENTITY, HtmlTemplate(page)).into_response();
    }

    match attempt_login(&form.email, &form.password) {
        Ok(()) => {
            state.session.authenticate();
            Redirect::to("/news").into_response()
        }
        Err(e) => {
            let page = LoginTemplate {
                email: form.email,
                error: Some(e.to_string()),
            };
            (StatusCode::UNAUTHORIZED, HtmlTemplate(page)).into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct NewsQuery {
    pub category: Option<Category>,
    pub q: Option<String>,
}

pub async fn news(State(state): State<Arc<AppState>>, Query(params): Query<NewsQuery>) -> Response {
    if !state.session.is_authenticated() {
        return Redirect::to("/login").into_response();
    }

    // Only the last request survives; earlier tags are already stale
    let request = {
        let mut view = state.view.lock().await;
        let mut pending = view.apply(ViewEvent::Mount);
        if let Some(category) = params.category {
            pending = view.apply(ViewEvent::SelectCategory(category)).or(pending);
        }
        if let Some(q) = params.q {
            pending = view.apply(ViewEvent::SubmitQuery(q)).or(pending);
        }
        pending
    };

    // The fetch runs detached so the view settles even if this request is dropped
    if let Some(request) = request {
        let task_state = state.clone();
        let settle = tokio::spawn(async move {
            let outcome = task_state
                .fetcher
                .fetch_news(request.query.category, &request.query.query)
                .await;
            task_state.view.lock().await.apply(ViewEvent::Settled {
                tag: request.tag,
                outcome,
            });
        });
        if let Err(e) = settle.await {
            error!("News fetch task failed: {}", e);
        }
    }

    let page = NewsTemplate::from_view(&*state.view.lock().await);
    HtmlTemplate(page).into_response()
}

#[derive(Debug, Deserialize)]
pub struct ListenForm {
    #[serde(default)]
    pub text: String,
}

pub async fn listen(State(state): State<Arc<AppState>>, Form(form): Form<ListenForm>) -> Redirect {
    if !state.session.is_authenticated() {
        return Redirect::to("/login");
    }

    state.speech.speak(&form.text);
    Redirect::to("/news")
}

pub async fn stop(State(state): State<Arc<AppState>>) -> Redirect {
    if !state.session.is_authenticated() {
        return Redirect::to("/login");
    }

    state.speech.stop();
    Redirect::to("/news")
}

pub async fn health() -> impl IntoResponse {
    Html("OK")
}
