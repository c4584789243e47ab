use log::{debug, error};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;

use crate::model::{SessionDetailsDto, SessionId, StatusResponse, SubmitAnswersRequest};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("could not reach backend: {0}")]
    Transport(String),

    #[error("backend answered {status}: {message}")]
    Status { status: u16, message: String },

    #[error("unexpected response body: {0}")]
    Decode(String),
}

/// The four backend operations the session core consumes.
pub trait SessionApi {
    fn session_details(&self, id: &SessionId) -> Result<SessionDetailsDto, ApiError>;
    fn start_session(&self, id: &SessionId) -> Result<StatusResponse, ApiError>;
    fn submit_answers(
        &self,
        id: &SessionId,
        request: &SubmitAnswersRequest,
    ) -> Result<StatusResponse, ApiError>;
    fn submitted_session(&self, id: &SessionId) -> Result<SessionDetailsDto, ApiError>;
}

impl<T: SessionApi + ?Sized> SessionApi for Box<T> {
    fn session_details(&self, id: &SessionId) -> Result<SessionDetailsDto, ApiError> {
        (**self).session_details(id)
    }

    fn start_session(&self, id: &SessionId) -> Result<StatusResponse, ApiError> {
        (**self).start_session(id)
    }

    fn submit_answers(
        &self,
        id: &SessionId,
        request: &SubmitAnswersRequest,
    ) -> Result<StatusResponse, ApiError> {
        (**self).submit_answers(id, request)
    }

    fn submitted_session(&self, id: &SessionId) -> Result<SessionDetailsDto, ApiError> {
        (**self).submitted_session(id)
    }
}

/// REST client for the interview backend
#[derive(Debug, Clone)]
pub struct HttpSessionApi {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpSessionApi {
    pub fn new(
        base_url: &str,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    pub fn session_url(&self, id: &SessionId, suffix: &str) -> String {
        if suffix.is_empty() {
            format!("{}/interview-sessions/{}", self.base_url, id)
        } else {
            format!("{}/interview-sessions/{}/{}", self.base_url, id, suffix)
        }
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, ApiError> {
        let resp = self.authorize(req).send().map_err(|e| {
            error!("request failed: {}", e);
            ApiError::Transport(e.to_string())
        })?;
        decode(resp)
    }
}

fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, ApiError> {
    let status = resp.status();
    debug!("{} {}", status, resp.url());

    if !status.is_success() {
        let body = resp.text().unwrap_or_default();
        return Err(ApiError::Status {
            status: status.as_u16(),
            message: error_message(status, &body),
        });
    }

    resp.json::<T>()
        .map_err(|e| ApiError::Decode(e.to_string()))
}

/// Pulls `message`/`error` out of a JSON error body, falling back to the reason phrase.
fn error_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("message")
                .or_else(|| v.get("error"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("unknown error")
                .to_string()
        })
}

impl SessionApi for HttpSessionApi {
    fn session_details(&self, id: &SessionId) -> Result<SessionDetailsDto, ApiError> {
        self.send(self.client.get(self.session_url(id, "")))
    }

    fn start_session(&self, id: &SessionId) -> Result<StatusResponse, ApiError> {
        self.send(self.client.post(self.session_url(id, "start")))
    }

    fn submit_answers(
        &self,
        id: &SessionId,
        request: &SubmitAnswersRequest,
    ) -> Result<StatusResponse, ApiError> {
        self.send(
            self.client
                .post(self.session_url(id, "submit"))
                .json(request),
        )
    }

    fn submitted_session(&self, id: &SessionId) -> Result<SessionDetailsDto, ApiError> {
        self.send(self.client.get(self.session_url(id, "submission")))
    }
}
