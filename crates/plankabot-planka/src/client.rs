use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header::CONTENT_TYPE, Method, RequestBuilder, Response};
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use plankabot_core::{
    board::{
        port::BoardPort,
        types::{
            ActivityPage, Attachment, Board, Card, CardDetails, Task, TaskList,
            CHECKLIST_POSITION_STEP, POSITION_TOP,
        },
    },
    config::Config,
    errors::Error,
    Result,
};

use crate::decode;

const BODY_PREVIEW_CHARS: usize = 200;
const INVALID_JSON_PREVIEW_CHARS: usize = 500;

/// Planka REST client. Log in once with [`PlankaClient::authenticate`]; the
/// token is cached and sent as a bearer token on every later request.
pub struct PlankaClient {
    base_url: String,
    username_or_email: String,
    password: String,
    http: reqwest::Client,
    token: RwLock<Option<String>>,
}

impl PlankaClient {
    pub fn new(
        base_url: impl Into<String>,
        username_or_email: impl Into<String>,
        password: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("planka http client: {e}")))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            username_or_email: username_or_email.into(),
            password: password.into(),
            http,
            token: RwLock::new(None),
        })
    }

    pub fn from_config(cfg: &Config) -> Result<Self> {
        Self::new(
            &cfg.planka_base_url,
            &cfg.planka_username_or_email,
            &cfg.planka_password,
            cfg.planka_request_timeout,
        )
    }

    /// Exchange credentials for an access token and cache it.
    pub async fn authenticate(&self) -> Result<String> {
        let resp = send(self.http.post(self.url("/api/access-tokens")).json(&json!({
            "emailOrUsername": self.username_or_email,
            "password": self.password,
        })))
        .await?;

        let status = resp.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(Error::Auth(
                "Planka login failed: invalid credentials".to_string(),
            ));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Api(format!(
                "Planka login failed: {status} {}",
                preview(&body, BODY_PREVIEW_CHARS)
            )));
        }

        let payload: Value = resp
            .json()
            .await
            .map_err(|e| Error::Api(format!("Planka login returned invalid JSON: {e}")))?;
        let token = decode::access_token(&payload)
            .ok_or_else(|| Error::Auth("Planka login failed: no token returned".to_string()))?;

        *self.token.write().await = Some(token.clone());
        info!(base_url = %self.base_url, "authenticated with Planka");
        Ok(token)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn bearer(&self) -> Result<String> {
        if let Some(token) = self.token.read().await.clone() {
            return Ok(token);
        }
        self.authenticate().await
    }

    async fn authorized(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let token = self.bearer().await?;
        Ok(self
            .http
            .request(method, self.url(path))
            .bearer_auth(token)
            .header(reqwest::header::ACCEPT, "application/json"))
    }

    async fn get_json(&self, path: &str) -> Result<Value> {
        self.request_json(Method::GET, path, None).await
    }

    async fn request_json(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value> {
        let mut req = self.authorized(method, path).await?;
        if let Some(body) = body {
            req = req.json(&body);
        }
        handle_response(send(req).await?).await
    }
}

async fn send(req: RequestBuilder) -> Result<Response> {
    req.send().await.map_err(|e| {
        if e.is_timeout() {
            Error::Api("Planka API timed out".to_string())
        } else {
            Error::Api(format!("Planka API request failed: {e}"))
        }
    })
}

fn preview(body: &str, max_chars: usize) -> String {
    body.chars().take(max_chars).collect()
}

async fn handle_response(resp: Response) -> Result<Value> {
    let status = resp.status();
    let url = resp.url().to_string();
    let content_type = resp
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();
    let body = resp
        .text()
        .await
        .map_err(|e| Error::Api(format!("Planka API response could not be read: {e}")))?;

    match status.as_u16() {
        401 => return Err(Error::Auth("Planka authentication failed".to_string())),
        403 => {
            return Err(Error::Api(format!(
                "Planka API forbidden: {}",
                preview(&body, BODY_PREVIEW_CHARS)
            )))
        }
        404 => {
            return Err(Error::NotFound(format!(
                "Planka API returned 404: {}",
                preview(&body, BODY_PREVIEW_CHARS)
            )))
        }
        _ if !status.is_success() => {
            return Err(Error::Api(format!(
                "Planka API returned {}: {}",
                status.as_u16(),
                preview(&body, BODY_PREVIEW_CHARS)
            )))
        }
        _ => {}
    }

    serde_json::from_str(&body).map_err(|e| {
        let body_preview = if body.is_empty() {
            "(empty)".to_string()
        } else {
            preview(&body, INVALID_JSON_PREVIEW_CHARS)
        };
        warn!(
            url = %url,
            status = status.as_u16(),
            content_type = %content_type,
            body_preview = %body_preview,
            error = %e,
            "Planka API returned invalid JSON"
        );
        Error::Api("Planka API returned invalid JSON".to_string())
    })
}

#[async_trait]
impl BoardPort for PlankaClient {
    async fn list_boards(&self) -> Result<Vec<Board>> {
        match self.get_json("/api/boards").await {
            Ok(payload) => {
                if let Some(items) = decode::items(&payload) {
                    return decode::boards(items);
                }
            }
            // Some deployments do not serve /api/boards as JSON.
            Err(e) => debug!(error = %e, "GET /api/boards failed, falling back to projects"),
        }
        let payload = self.get_json("/api/projects").await?;
        decode::project_boards(&payload)
    }

    async fn create_card(&self, list_id: &str, name: &str, card_type: &str) -> Result<Card> {
        let body = json!({
            "name": name,
            "type": card_type,
            "position": POSITION_TOP,
        });
        let payload = self
            .request_json(Method::POST, &format!("/api/lists/{list_id}/cards"), Some(body))
            .await?;
        decode::card(decode::item(&payload)?)
    }

    async fn list_cards(&self, list_id: &str) -> Result<Vec<Card>> {
        let payload = self.get_json(&format!("/api/lists/{list_id}/cards")).await?;
        decode::cards(decode::items(&payload).unwrap_or_default())
    }

    async fn get_card(&self, card_id: &str) -> Result<Option<CardDetails>> {
        match self.get_json(&format!("/api/cards/{card_id}")).await {
            Ok(payload) => decode::card_details(&payload).map(Some),
            Err(Error::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn move_card(&self, card_id: &str, list_id: &str, position: f64) -> Result<Card> {
        let payload = self
            .request_json(
                Method::PATCH,
                &format!("/api/cards/{card_id}"),
                Some(json!({ "listId": list_id, "position": position })),
            )
            .await?;
        decode::card(decode::item(&payload)?)
    }

    async fn create_task_list(&self, card_id: &str, name: &str) -> Result<TaskList> {
        let payload = self
            .request_json(
                Method::POST,
                &format!("/api/cards/{card_id}/task-lists"),
                Some(json!({
                    "name": name,
                    "position": CHECKLIST_POSITION_STEP,
                    "showOnFrontOfCard": true,
                })),
            )
            .await?;
        decode::task_list(decode::item(&payload)?)
    }

    async fn create_task(&self, task_list_id: &str, name: &str, position: f64) -> Result<Task> {
        let payload = self
            .request_json(
                Method::POST,
                &format!("/api/task-lists/{task_list_id}/tasks"),
                Some(json!({ "name": name, "position": position })),
            )
            .await?;
        decode::task(decode::item(&payload)?)
    }

    async fn create_attachment(
        &self,
        card_id: &str,
        file_name: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<Attachment> {
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(content_type)
            .map_err(|e| Error::Api(format!("planka multipart error: {e}")))?;
        let form = reqwest::multipart::Form::new()
            .text("type", "file")
            .text("name", file_name.to_string())
            .part("file", part);

        let req = self
            .authorized(Method::POST, &format!("/api/cards/{card_id}/attachments"))
            .await?
            .multipart(form);
        let payload = handle_response(send(req).await?).await?;
        decode::attachment(decode::item(&payload)?)
    }

    async fn download_attachment(&self, attachment_id: &str) -> Option<Vec<u8>> {
        let path = format!("/api/attachments/{attachment_id}/file");
        let resp = match self.authorized(Method::GET, &path).await {
            Ok(req) => send(req).await.ok()?,
            Err(e) => {
                debug!(attachment_id, error = %e, "attachment download skipped");
                return None;
            }
        };
        if !resp.status().is_success() {
            debug!(attachment_id, status = resp.status().as_u16(), "attachment download failed");
            return None;
        }
        resp.bytes().await.ok().map(|b| b.to_vec())
    }

    async fn activity_feed(&self, board_id: &str, before_id: Option<&str>) -> Result<ActivityPage> {
        let mut req = self
            .authorized(Method::GET, &format!("/api/boards/{board_id}/actions"))
            .await?;
        if let Some(before) = before_id.filter(|b| !b.is_empty()) {
            req = req.query(&[("beforeId", before)]);
        }
        let payload = handle_response(send(req).await?).await?;
        decode::activity_page(&payload)
    }
}
