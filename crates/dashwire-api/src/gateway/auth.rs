// Session endpoints: login, validate, logout.
//
// None of these trigger the unauthorized handler: a 401 here is the answer,
// not a sign that some other call lost its session.

use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use crate::error::Error;
use crate::gateway::client::Gateway;
use crate::gateway::request::{RequestOptions, ResponseKind};
use crate::models::{LoginRequest, LoginResponse, ValidateSessionRequest, ValidateSessionResponse};

impl Gateway {
    /// Exchange an auth key for a session.
    ///
    /// `POST /api/login` with `{"auth_key": ...}`
    ///
    /// A rejected key surfaces as [`Error::Http`] (401) whose payload carries
    /// the server's message.
    pub async fn login(&self, auth_key: &SecretString) -> Result<LoginResponse, Error> {
        debug!("logging in");
        let body = LoginRequest {
            auth_key: auth_key.expose_secret(),
        };
        self.fetch(
            "/login",
            RequestOptions::post().json(&body)?.skip_unauthorized_handler(),
        )
        .await
    }

    /// Ask the server whether `session_id` is still valid.
    ///
    /// `POST /api/validate-session` with `{"session_id": ...}`
    pub async fn validate_session(&self, session_id: &str) -> Result<bool, Error> {
        debug!("validating session");
        let body = ValidateSessionRequest { session_id };
        let response: ValidateSessionResponse = self
            .fetch(
                "/validate-session",
                RequestOptions::post().json(&body)?.skip_unauthorized_handler(),
            )
            .await?;
        Ok(response.valid)
    }

    /// End the current session.
    ///
    /// `POST /api/logout`
    pub async fn logout(&self) -> Result<(), Error> {
        debug!("logging out");
        self.send(
            "/logout",
            RequestOptions::post()
                .response(ResponseKind::Raw)
                .skip_unauthorized_handler(),
        )
        .await?;
        Ok(())
    }
}
