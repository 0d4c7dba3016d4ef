use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::api::TicketApi;
use crate::config::{Config, RetryPolicy};
use crate::error::{FieldErrors, HelpdeskError, Result};
use crate::responses::{
    AssignRequest, Credentials, Envelope, Listing, LoginResponse, NewResponse, NewTicket, Page,
    Registration, TicketFilters, TicketUpdate,
};
use crate::session::SessionStore;
use crate::types::{Category, Ticket, TicketResponse, User};
use crate::upload::PendingUpload;
use crate::workflow::staff_candidates;

/// Whether a 401 on this request means the stored session is dead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Auth {
    Session,
    /// Login and registration. Their own 401 is a bad password, not an expired session.
    Exempt,
}

pub struct HelpdeskClient {
    http: Client,
    base_url: String,
    session: Arc<SessionStore>,
    retry: RetryPolicy,
}

/// Raw attachment bytes plus what the server said about them.
#[derive(Debug)]
pub struct DownloadedFile {
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Deserialize, Default)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    errors: Option<Value>,
}

impl HelpdeskClient {
    pub fn new(config: &Config, session: Arc<SessionStore>) -> Result<Self> {
        let http = Client::builder().timeout(config.timeout()).build()?;
        Ok(Self::with_http(
            http,
            config.api_url()?.as_str(),
            config.retry_policy(),
            session,
        ))
    }

    pub fn with_http(
        http: Client,
        base_url: &str,
        retry: RetryPolicy,
        session: Arc<SessionStore>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
            retry,
        }
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    /// Send with the retry policy. Only GET is retried, and only on transient
    /// failures.
    async fn send<F>(&self, method: Method, path: &str, auth: Auth, build: F) -> Result<Response>
    where
        F: Fn(RequestBuilder) -> Result<RequestBuilder> + Send + Sync,
    {
        let retries = if method == Method::GET {
            self.retry.attempts
        } else {
            0
        };
        let mut attempt = 0;

        loop {
            match self.send_once(&method, path, auth, &build).await {
                Err(e) if e.is_transient() && attempt < retries => {
                    attempt += 1;
                    let delay = self.retry.delay * attempt;
                    warn!(%method, path, attempt, "transient failure, retrying in {delay:?}: {e}");
                    tokio::time::sleep(delay).await;
                }
                result => return result,
            }
        }
    }

    async fn send_once<F>(
        &self,
        method: &Method,
        path: &str,
        auth: Auth,
        build: &F,
    ) -> Result<Response>
    where
        F: Fn(RequestBuilder) -> Result<RequestBuilder> + Send + Sync,
    {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self
            .http
            .request(method.clone(), url)
            .header("Accept", "application/json");

        if auth == Auth::Session {
            if let Some(token) = self.session.token() {
                request = request.bearer_auth(token);
            }
        }

        let started = Instant::now();
        let response = build(request)?.send().await?;
        let status = response.status();
        debug!(
            %method,
            path,
            status = status.as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "request"
        );

        if status.is_success() {
            return Ok(response);
        }
        Err(self.status_error(status, response, auth).await)
    }

    async fn status_error(
        &self,
        status: StatusCode,
        response: Response,
        auth: Auth,
    ) -> HelpdeskError {
        let text = response
            .text()
            .await
            .unwrap_or_else(|_| "<failed to read response body>".to_string());
        let body: ErrorBody = serde_json::from_str(&text).unwrap_or_default();
        let errors = body
            .errors
            .as_ref()
            .map(FieldErrors::from_value)
            .unwrap_or_default();
        let message = body
            .message
            .or(body.error)
            .filter(|m| !m.trim().is_empty())
            .or_else(|| Some(errors.general()).filter(|g| !g.is_empty()))
            .or_else(|| status.canonical_reason().map(String::from))
            .unwrap_or(text);

        match status {
            StatusCode::UNAUTHORIZED => {
                if auth == Auth::Session {
                    warn!("server rejected the session; signing out");
                    self.session.clear();
                }
                HelpdeskError::Unauthorized { message }
            }
            StatusCode::FORBIDDEN => HelpdeskError::Forbidden { message },
            StatusCode::NOT_FOUND => HelpdeskError::NotFound { message },
            StatusCode::UNPROCESSABLE_ENTITY => HelpdeskError::ValidationFailed { message, errors },
            s if s.is_server_error() => HelpdeskError::ServerUnavailable {
                status: s.as_u16(),
                message,
            },
            s => HelpdeskError::Api {
                status: s.as_u16(),
                message,
            },
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.send(Method::GET, path, Auth::Session, Ok).await?;
        decode(response).await
    }

    async fn get_with_query<T, Q>(&self, path: &str, query: &Q) -> Result<T>
    where
        T: DeserializeOwned,
        Q: serde::Serialize + Sync + ?Sized,
    {
        let response = self
            .send(Method::GET, path, Auth::Session, |r| Ok(r.query(query)))
            .await?;
        decode(response).await
    }

    async fn post_login<B>(&self, path: &str, body: &B) -> Result<LoginResponse>
    where
        B: serde::Serialize + Sync,
    {
        let response = self
            .send(Method::POST, path, Auth::Exempt, |r| Ok(r.json(body)))
            .await?;
        let value: Value = serde_json::from_str(&response.text().await?)?;
        login_payload(value)
    }

    async fn acknowledge(&self, method: Method, path: &str, body: Option<&Value>) -> Result<()> {
        let response = self
            .send(method, path, Auth::Session, |r| {
                Ok(match body {
                    Some(body) => r.json(body),
                    None => r,
                })
            })
            .await?;

        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(());
        }
        let envelope: Envelope<Value> = serde_json::from_str(&text)?;
        ensure_success(&envelope)
    }

    pub async fn register(&self, registration: &Registration) -> Result<LoginResponse> {
        self.post_login("/v1/auth/register", registration).await
    }

    pub async fn list_categories(&self) -> Result<Vec<Category>> {
        let listing: Listing<Category> = self
            .get_with_query("/v1/ticket-categories", &[("active_only", "true")])
            .await?;
        Ok(listing.into_page().data)
    }

    /// Active users who may take tickets.
    pub async fn list_staff(&self) -> Result<Vec<User>> {
        let listing: Listing<User> = self
            .get_with_query(
                "/v1/users",
                &[
                    ("status", "1"),
                    ("per_page", "100"),
                    ("sort_by", "name"),
                    ("sort_order", "asc"),
                ],
            )
            .await?;
        Ok(staff_candidates(listing.into_page().data))
    }

    pub async fn download_attachment(&self, id: u64) -> Result<DownloadedFile> {
        let response = self
            .send(
                Method::GET,
                &format!("/v1/tickets/attachments/{id}"),
                Auth::Session,
                Ok,
            )
            .await?;

        let header = |name: &str| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(String::from)
        };
        let file_name = header("content-disposition").and_then(|v| disposition_file_name(&v));
        let mime_type = header("content-type");
        let bytes = response.bytes().await?.to_vec();

        Ok(DownloadedFile {
            file_name,
            mime_type,
            bytes,
        })
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let envelope: Envelope<T> = serde_json::from_str(&response.text().await?)?;
    ensure_success(&envelope)?;
    envelope.data.ok_or(HelpdeskError::EmptyResponse)
}

fn ensure_success<T>(envelope: &Envelope<T>) -> Result<()> {
    if envelope.success {
        return Ok(());
    }
    Err(HelpdeskError::Envelope {
        message: envelope
            .message
            .clone()
            .unwrap_or_else(|| "request was not successful".to_string()),
    })
}

/// Login answers `{jwt, user}` at the top level; tolerate it under `data` too.
fn login_payload(value: Value) -> Result<LoginResponse> {
    if value.get("success").and_then(Value::as_bool) == Some(false) {
        return Err(HelpdeskError::Envelope {
            message: value
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("authentication failed")
                .to_string(),
        });
    }

    let payload = match value.get("data") {
        Some(data) if data.get("user").is_some() => data.clone(),
        _ => value,
    };
    Ok(serde_json::from_value(payload)?)
}

fn disposition_file_name(header: &str) -> Option<String> {
    header
        .split(';')
        .map(str::trim)
        .find_map(|part| part.strip_prefix("filename="))
        .map(|name| name.trim_matches('"').to_string())
        .filter(|name| !name.is_empty())
}

fn file_part(file: &PendingUpload) -> Result<Part> {
    Ok(Part::bytes(file.bytes().to_vec())
        .file_name(file.file_name.clone())
        .mime_str(&file.mime_type)?)
}

fn ticket_form(ticket: &NewTicket, files: &[PendingUpload]) -> Result<Form> {
    let mut form = Form::new()
        .text("title", ticket.title.clone())
        .text("description", ticket.description.clone())
        .text("priority", ticket.priority.as_str());

    if let Some(category) = ticket.ticket_category_id {
        form = form.text("ticket_category_id", category.to_string());
    }
    if let Some(user_id) = ticket.user_id {
        form = form.text("user_id", user_id.to_string());
    }
    for (i, file) in files.iter().enumerate() {
        form = form.part(format!("attachments[{i}]"), file_part(file)?);
    }
    Ok(form)
}

fn response_form(response: &NewResponse, files: &[PendingUpload]) -> Result<Form> {
    let mut form = Form::new().text("body", response.body().to_string());

    if let Some(internal) = response.internal() {
        form = form.text("internal", if internal { "1" } else { "0" });
    }
    for file in files {
        form = form.part("attachments[]", file_part(file)?);
    }
    Ok(form)
}

#[async_trait]
impl TicketApi for HelpdeskClient {
    async fn authenticate(&self, credentials: &Credentials) -> Result<LoginResponse> {
        self.post_login("/login", credentials).await
    }

    async fn fetch_ticket(&self, id: u64) -> Result<Ticket> {
        self.get(&format!("/v1/tickets/{id}")).await
    }

    async fn fetch_tickets(&self, filters: &TicketFilters) -> Result<Page<Ticket>> {
        let listing: Listing<Ticket> = self.get_with_query("/v1/tickets", filters).await?;
        Ok(listing.into_page())
    }

    async fn create_ticket(
        &self,
        ticket: &NewTicket,
        attachments: &[PendingUpload],
    ) -> Result<Ticket> {
        let response = self
            .send(Method::POST, "/v1/tickets", Auth::Session, |r| {
                if attachments.is_empty() {
                    Ok(r.json(ticket))
                } else {
                    Ok(r.multipart(ticket_form(ticket, attachments)?))
                }
            })
            .await?;
        decode(response).await
    }

    async fn update_ticket(&self, id: u64, update: &TicketUpdate) -> Result<()> {
        let body = serde_json::to_value(update)?;
        self.acknowledge(Method::PUT, &format!("/v1/tickets/{id}"), Some(&body))
            .await
    }

    async fn assign_ticket(&self, id: u64, user_id: u64) -> Result<()> {
        let body = serde_json::to_value(AssignRequest {
            assigned_to: user_id,
        })?;
        self.acknowledge(Method::POST, &format!("/v1/tickets/{id}/assign"), Some(&body))
            .await
    }

    async fn reopen_ticket(&self, id: u64) -> Result<()> {
        let body = Value::Object(Default::default());
        self.acknowledge(Method::POST, &format!("/v1/tickets/{id}/reopen"), Some(&body))
            .await
    }

    async fn add_response(
        &self,
        ticket_id: u64,
        response: &NewResponse,
        attachments: &[PendingUpload],
    ) -> Result<TicketResponse> {
        let path = format!("/v1/tickets/{ticket_id}/responses");
        let reply = self
            .send(Method::POST, &path, Auth::Session, |r| {
                if attachments.is_empty() {
                    Ok(r.json(response))
                } else {
                    Ok(r.multipart(response_form(response, attachments)?))
                }
            })
            .await?;
        decode(reply).await
    }

    async fn delete_ticket(&self, id: u64) -> Result<()> {
        self.acknowledge(Method::DELETE, &format!("/v1/tickets/{id}"), None)
            .await
    }

    async fn delete_attachment(&self, id: u64) -> Result<()> {
        self.acknowledge(
            Method::DELETE,
            &format!("/v1/tickets/attachments/{id}"),
            None,
        )
        .await
    }

    async fn search_users(&self, term: &str, limit: u32) -> Result<Page<User>> {
        let per_page = limit.to_string();
        let listing: Listing<User> = self
            .get_with_query(
                "/v1/users",
                &[
                    ("name", term),
                    ("status", "1"),
                    ("per_page", per_page.as_str()),
                    ("sort_by", "name"),
                    ("sort_order", "asc"),
                ],
            )
            .await?;
        Ok(listing.into_page())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::types::TicketStatus;

    const FAST_RETRY: RetryPolicy = RetryPolicy {
        attempts: 2,
        delay: Duration::from_millis(5),
    };

    fn signed_in() -> Arc<SessionStore> {
        let session = SessionStore::in_memory();
        let user = User {
            id: 100,
            ..Default::default()
        };
        session.establish("tok".into(), user).unwrap();
        Arc::new(session)
    }

    fn client(server: &MockServer, session: Arc<SessionStore>) -> HelpdeskClient {
        HelpdeskClient::with_http(Client::new(), &server.uri(), FAST_RETRY, session)
    }

    fn ticket_json(status: &str) -> Value {
        json!({
            "id": 42,
            "user_id": 100,
            "status": status,
            "priority": "high",
            "title": "VPN down",
            "assigned_to": 7,
            "assignedTo": { "id": 7, "name": "Tomás" }
        })
    }

    #[tokio::test]
    async fn test_login_unauthorized_keeps_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({ "message": "Invalid credentials" })),
            )
            .mount(&server)
            .await;

        let session = signed_in();
        let api = client(&server, session.clone());
        let err = api
            .authenticate(&Credentials {
                email: "ana@example.com".into(),
                password: "wrong".into(),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, HelpdeskError::Unauthorized { ref message } if message == "Invalid credentials"));
        assert!(session.is_authenticated());
    }

    #[tokio::test]
    async fn test_unauthorized_elsewhere_clears_session() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/tickets/42"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let session = signed_in();
        let mut rx = session.subscribe();
        let api = client(&server, session.clone());

        let err = api.fetch_ticket(42).await.unwrap_err();

        assert!(matches!(err, HelpdeskError::Unauthorized { .. }));
        assert!(!session.is_authenticated());
        assert!(rx.has_changed().unwrap());
        assert!(!rx.borrow_and_update().authenticated);
    }

    #[tokio::test]
    async fn test_login_reads_top_level_jwt() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login"))
            .and(body_json(json!({ "email": "ana@example.com", "password": "pw" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jwt": "abc",
                "user": { "id": 3, "name": "Ana", "my_profile": { "name": "Admin" } }
            })))
            .mount(&server)
            .await;

        let api = client(&server, Arc::new(SessionStore::in_memory()));
        let login = api
            .authenticate(&Credentials {
                email: "ana@example.com".into(),
                password: "pw".into(),
            })
            .await
            .unwrap();

        assert_eq!(login.jwt, "abc");
        assert_eq!(login.user.id, 3);
    }

    #[tokio::test]
    async fn test_fetch_ticket_sends_bearer_and_unwraps_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/tickets/42"))
            .and(header("Authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "message": "ok",
                "data": ticket_json("assigned")
            })))
            .mount(&server)
            .await;

        let api = client(&server, signed_in());
        let ticket = api.fetch_ticket(42).await.unwrap();

        assert_eq!(ticket.status, TicketStatus::Assigned);
        assert_eq!(ticket.assignee_id(), Some(7));
    }

    #[tokio::test]
    async fn test_get_retried_on_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/tickets/42"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/tickets/42"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "data": ticket_json("open") })),
            )
            .mount(&server)
            .await;

        let api = client(&server, signed_in());
        let ticket = api.fetch_ticket(42).await.unwrap();

        assert_eq!(ticket.id, 42);
        assert_eq!(server.received_requests().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_mutation_never_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/tickets/42/assign"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let api = client(&server, signed_in());
        let err = api.assign_ticket(42, 7).await.unwrap_err();

        assert!(err.is_transient());
        assert!(matches!(err, HelpdeskError::ServerUnavailable { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_validation_errors_map_to_fields() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/tickets"))
            .respond_with(ResponseTemplate::new(422).set_body_json(json!({
                "message": "The given data was invalid.",
                "errors": {
                    "title": ["The title field is required."],
                    "attachments.0": ["The file may not be greater than 10240 kilobytes."]
                }
            })))
            .mount(&server)
            .await;

        let api = client(&server, signed_in());
        let err = api
            .create_ticket(
                &NewTicket {
                    title: String::new(),
                    description: "x".into(),
                    priority: Default::default(),
                    ticket_category_id: None,
                    user_id: None,
                },
                &[],
            )
            .await
            .unwrap_err();

        let HelpdeskError::ValidationFailed { errors, .. } = err else {
            panic!("expected validation failure, got {err:?}");
        };
        assert_eq!(errors.for_field("title").len(), 1);
        assert_eq!(errors.for_field("attachments").len(), 1);
    }

    #[tokio::test]
    async fn test_update_sends_only_changed_fields() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/v1/tickets/42"))
            .and(body_json(json!({ "priority": "urgent" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": ticket_json("open")
            })))
            .expect(1)
            .mount(&server)
            .await;

        let api = client(&server, signed_in());
        api.update_ticket(
            42,
            &TicketUpdate {
                priority: Some(crate::types::Priority::Urgent),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_envelope_failure_surfaces_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/tickets/42/reopen"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": false,
                "message": "Ticket is not closed"
            })))
            .mount(&server)
            .await;

        let api = client(&server, signed_in());
        let err = api.reopen_ticket(42).await.unwrap_err();
        assert_eq!(err.to_string(), "Request rejected: Ticket is not closed");
    }

    #[tokio::test]
    async fn test_search_users_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/users"))
            .and(query_param("name", "ana"))
            .and(query_param("status", "1"))
            .and(query_param("per_page", "20"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": {
                    "current_page": 1,
                    "last_page": 1,
                    "total": 1,
                    "per_page": 20,
                    "data": [{ "id": 5, "name": "Ana" }]
                }
            })))
            .mount(&server)
            .await;

        let api = client(&server, signed_in());
        let page = api.search_users("ana", 20).await.unwrap();
        assert_eq!(page.data.len(), 1);
        assert_eq!(page.data[0].id, 5);
    }

    #[test]
    fn test_disposition_file_name() {
        assert_eq!(
            disposition_file_name("attachment; filename=\"report.pdf\""),
            Some("report.pdf".to_string())
        );
        assert_eq!(disposition_file_name("inline"), None);
    }
}
