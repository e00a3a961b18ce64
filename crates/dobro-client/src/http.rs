//! HTTP side of the backend API.
//!
//! Everything realtime rides the socket; the token handshake and
//! multipart file uploads are the only plain HTTP calls the client makes.

use std::time::Duration;

use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use dobro_shared::types::{Role, TaskId, UserId};

use crate::error::{ClientError, Result};

/// Thin wrapper over the auth and upload endpoints.
#[derive(Debug, Clone)]
pub struct HttpApi {
    client: reqwest::Client,
    base_url: String,
}

/// What a successful login hands back.
#[derive(Debug, Clone)]
pub struct LoginReply {
    pub token: String,
    pub user_id: UserId,
}

/// One file queued for upload, already read into memory.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

// The backend tucks the user id two levels deep on login.
#[derive(Deserialize)]
struct LoginBody {
    token: String,
    message: LoginMessage,
}

#[derive(Deserialize)]
struct LoginMessage {
    body: LoginUser,
}

#[derive(Deserialize)]
struct LoginUser {
    user_id: UserId,
}

#[derive(Serialize)]
struct RegisterRequest<'a> {
    email: &'a str,
    full_name: &'a str,
    password: &'a str,
    role: Role,
}

#[derive(Serialize)]
struct ConfirmRequest<'a> {
    email: &'a str,
    confirmation_code: &'a str,
}

#[derive(Deserialize)]
struct UploadBody {
    #[serde(default)]
    uploaded: Vec<String>,
}

impl HttpApi {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    /// Exchange credentials for a token and the caller's user id.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginReply> {
        let resp = self
            .client
            .post(format!("{}/login", self.base_url))
            .json(&LoginRequest { email, password })
            .send()
            .await?;
        let body: LoginBody = check(resp).await?.json().await?;
        info!(user_id = %body.message.body.user_id, "logged in");
        Ok(LoginReply {
            token: body.token,
            user_id: body.message.body.user_id,
        })
    }

    /// First half of signup. The backend emails a confirmation code.
    pub async fn register(
        &self,
        email: &str,
        full_name: &str,
        password: &str,
        role: Role,
    ) -> Result<()> {
        let resp = self
            .client
            .post(format!("{}/register", self.base_url))
            .json(&RegisterRequest {
                email,
                full_name,
                password,
                role,
            })
            .send()
            .await?;
        check(resp).await?;
        info!(email, "registration submitted");
        Ok(())
    }

    /// Second half of signup: redeem the emailed code.
    pub async fn confirm_registration(&self, email: &str, code: &str) -> Result<()> {
        let resp = self
            .client
            .post(format!("{}/confirm-registration", self.base_url))
            .json(&ConfirmRequest {
                email,
                confirmation_code: code,
            })
            .send()
            .await?;
        check(resp).await?;
        info!(email, "registration confirmed");
        Ok(())
    }

    /// Push files to the backend and get their served URLs back.
    ///
    /// With a `task_id` the backend also links the files to that task on
    /// its side; without one it only stores them (event reports use this).
    pub async fn upload_attachments(
        &self,
        task_id: Option<&TaskId>,
        files: Vec<UploadFile>,
    ) -> Result<Vec<String>> {
        let mut form = Form::new();
        if let Some(id) = task_id {
            form = form.text("task_id", id.as_str().to_string());
        }
        let count = files.len();
        for file in files {
            form = form.part(
                "attachments",
                Part::bytes(file.bytes).file_name(file.file_name),
            );
        }

        let resp = self
            .client
            .post(format!("{}/upload-task-attachments", self.base_url))
            .multipart(form)
            .send()
            .await?;
        let body: UploadBody = check(resp).await?.json().await?;
        debug!(sent = count, uploaded = body.uploaded.len(), "attachments uploaded");
        Ok(body.uploaded)
    }
}

/// Turn a non-2xx response into [`ClientError::Api`], pulling a human
/// message out of the JSON body when there is one.
async fn check(resp: reqwest::Response) -> Result<reqwest::Response> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status().as_u16();
    let message = match resp.json::<Value>().await {
        Ok(body) => body
            .get("message")
            .and_then(Value::as_str)
            .or_else(|| body.get("error").and_then(Value::as_str))
            .unwrap_or("request failed")
            .to_string(),
        Err(_) => "request failed".to_string(),
    };
    Err(ClientError::Api { status, message })
}
