// Response decoding: success payloads and typed failures.

use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;

use crate::error::{Error, ErrorBody, HttpError};
use crate::gateway::request::ResponseKind;

/// Decoded body of a successful response.
#[derive(Debug)]
pub enum Payload {
    /// 204/205, or an empty JSON body.
    Empty,
    Json(serde_json::Value),
    Text(String),
    Bytes(Bytes),
    Raw(Response),
}

impl Payload {
    /// Deserialize a JSON payload. `Empty` yields `None`.
    pub fn into_json<T: DeserializeOwned>(self) -> Result<Option<T>, Error> {
        match self {
            Self::Empty => Ok(None),
            Self::Json(value) => {
                let raw = value.to_string();
                serde_json::from_value(value)
                    .map(Some)
                    .map_err(|e| Error::Deserialization {
                        message: e.to_string(),
                        body: raw,
                    })
            }
            Self::Text(text) => serde_json::from_str(&text)
                .map(Some)
                .map_err(|e| Error::Deserialization {
                    message: e.to_string(),
                    body: text,
                }),
            Self::Bytes(_) | Self::Raw(_) => Err(Error::Deserialization {
                message: "payload was not requested as JSON".into(),
                body: String::new(),
            }),
        }
    }

    pub fn into_text(self) -> Option<String> {
        match self {
            Self::Text(text) => Some(text),
            Self::Json(value) => Some(value.to_string()),
            Self::Bytes(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
            Self::Empty | Self::Raw(_) => None,
        }
    }

    pub fn into_raw(self) -> Option<Response> {
        match self {
            Self::Raw(response) => Some(response),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

fn has_no_content(status: StatusCode) -> bool {
    status == StatusCode::NO_CONTENT || status == StatusCode::RESET_CONTENT
}

fn is_json(response: &Response) -> bool {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.contains("application/json"))
}

/// Decode a 2xx response according to `kind`.
pub(crate) async fn decode_success(response: Response, kind: ResponseKind) -> Result<Payload, Error> {
    if kind == ResponseKind::Raw {
        return Ok(Payload::Raw(response));
    }
    if has_no_content(response.status()) {
        return Ok(Payload::Empty);
    }

    match kind {
        ResponseKind::Text => Ok(Payload::Text(response.text().await?)),
        ResponseKind::Bytes => Ok(Payload::Bytes(response.bytes().await?)),
        ResponseKind::Json | ResponseKind::Raw => {
            let body = response.text().await?;
            if body.is_empty() {
                return Ok(Payload::Empty);
            }
            serde_json::from_str(&body)
                .map(Payload::Json)
                .map_err(|e| Error::Deserialization {
                    message: e.to_string(),
                    body,
                })
        }
    }
}

/// Turn a non-2xx response into a typed failure.
///
/// The payload is best effort: absent for 204/205, JSON when the server says
/// so and it parses, otherwise non-empty text. Body read errors are
/// swallowed so the status is never lost.
pub(crate) async fn decode_error(response: Response) -> HttpError {
    let status = response.status();
    let url = response.url().clone();
    let headers = response.headers().clone();

    let data = if has_no_content(status) {
        None
    } else if is_json(&response) {
        response
            .json::<serde_json::Value>()
            .await
            .ok()
            .map(ErrorBody::Json)
    } else {
        response
            .text()
            .await
            .ok()
            .filter(|text| !text.is_empty())
            .map(ErrorBody::Text)
    };

    HttpError {
        status,
        url,
        headers,
        data,
    }
}
