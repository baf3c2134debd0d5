//! Client for the account endpoints (login, register, verification).
//!
//! The backend answers auth failures two ways: a non-2xx status with a
//! `detail` field, or a 200 whose body carries a `message` but no token
//! (wrong verification code). Both surface as auth-kind errors carrying
//! the body's message, so a form can show it verbatim.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{ApiError, ApiResult, USER_AGENT, classify_reqwest_error, extract_body_message};

/// Client for `/api/login`, `/api/register` and the verification endpoints.
pub struct AuthClient {
    base_url: String,
    http: reqwest::Client,
    timeout: Duration,
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct RegisterRequest<'a> {
    email: &'a str,
    password: &'a str,
    code: &'a str,
}

#[derive(Debug, Serialize)]
struct EmailRequest<'a> {
    email: &'a str,
}

#[derive(Debug, Serialize)]
struct CaptchaRequest<'a> {
    email: &'a str,
    #[serde(rename = "captchaToken")]
    captcha_token: &'a str,
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    token: Option<String>,
}

/// A successful login or registration.
#[derive(Debug, Clone)]
pub struct AuthOutcome {
    /// Opaque session token.
    pub token: String,
    /// Informational message from the backend, if any.
    pub message: Option<String>,
}

impl AuthClient {
    /// Creates a client with the default request timeout.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_request_timeout(base_url, Duration::from_secs(30))
    }

    /// Creates a client with an explicit per-request timeout.
    pub fn with_request_timeout(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into(),
            http: reqwest::Client::new(),
            timeout,
        }
    }

    /// Logs in with email and password, returning the session token.
    ///
    /// # Errors
    /// Validation errors before any network call; auth errors with the
    /// backend's message; transport errors otherwise.
    pub async fn login(&self, email: &str, password: &str) -> ApiResult<AuthOutcome> {
        validate_email(email)?;
        validate_password(password)?;
        self.token_request("/api/login", &LoginRequest { email, password })
            .await
    }

    /// Registers an account; `code` is the emailed verification code.
    ///
    /// # Errors
    /// Validation errors before any network call; auth errors with the
    /// backend's message; transport errors otherwise.
    pub async fn register(&self, email: &str, password: &str, code: &str) -> ApiResult<AuthOutcome> {
        validate_email(email)?;
        validate_password(password)?;
        validate_code(code)?;
        self.token_request(
            "/api/register",
            &RegisterRequest {
                email,
                password,
                code,
            },
        )
        .await
    }

    /// Asks the backend to email a verification code.
    ///
    /// # Errors
    /// Validation errors before any network call; transport errors otherwise.
    pub async fn send_verification_code(&self, email: &str) -> ApiResult<String> {
        validate_email(email)?;
        self.message_request("/api/send-verification-code", &EmailRequest { email })
            .await
    }

    /// Forwards a CAPTCHA token for verification; returns the backend's
    /// message (the widget itself lives elsewhere).
    ///
    /// # Errors
    /// Validation errors before any network call; transport errors otherwise.
    pub async fn verify_captcha(&self, email: &str, captcha_token: &str) -> ApiResult<String> {
        validate_email(email)?;
        self.message_request(
            "/api/verify-captcha",
            &CaptchaRequest {
                email,
                captcha_token,
            },
        )
        .await
    }

    async fn send<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> ApiResult<(u16, String)> {
        let response = self
            .http
            .post(format!("{}{path}", self.base_url))
            .header("user-agent", USER_AGENT)
            .timeout(self.timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| classify_reqwest_error(&e))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| classify_reqwest_error(&e))?;
        Ok((status, text))
    }

    async fn token_request<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> ApiResult<AuthOutcome> {
        let (status, text) = self.send(path, body).await?;
        if !(200..300).contains(&status) {
            let message =
                extract_body_message(&text).unwrap_or_else(|| format!("HTTP {status}"));
            return Err(ApiError {
                kind: super::ApiErrorKind::Auth,
                message,
                details: Some(text),
            });
        }

        let parsed: AuthResponse = serde_json::from_str(&text)
            .map_err(|err| ApiError::parse(format!("unparsable auth response: {err}")))?;

        match parsed.token {
            Some(token) => Ok(AuthOutcome {
                token,
                message: parsed.message,
            }),
            // 200 without a token is how the backend reports a rejected
            // verification code.
            None => Err(ApiError::auth(
                parsed
                    .message
                    .unwrap_or_else(|| "request rejected".to_string()),
            )),
        }
    }

    async fn message_request<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> ApiResult<String> {
        let (status, text) = self.send(path, body).await?;
        if !(200..300).contains(&status) {
            return Err(ApiError::http_status(status, &text));
        }

        let parsed: AuthResponse = serde_json::from_str(&text)
            .map_err(|err| ApiError::parse(format!("unparsable auth response: {err}")))?;
        Ok(parsed.message.unwrap_or_default())
    }
}

/// Checks the rough shape of an email address (form-level validation only;
/// the backend does the real check).
///
/// # Errors
/// Returns a validation-kind error.
pub fn validate_email(email: &str) -> ApiResult<()> {
    let trimmed = email.trim();
    let valid = trimmed
        .split_once('@')
        .is_some_and(|(local, domain)| {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.')
        })
        && !trimmed.contains(char::is_whitespace);
    if valid {
        Ok(())
    } else {
        Err(ApiError::validation(format!(
            "'{trimmed}' is not a valid email address"
        )))
    }
}

/// Minimum password length check.
///
/// # Errors
/// Returns a validation-kind error.
pub fn validate_password(password: &str) -> ApiResult<()> {
    if password.len() >= 8 {
        Ok(())
    } else {
        Err(ApiError::validation(
            "password must be at least 8 characters",
        ))
    }
}

/// The verification code must be present.
///
/// # Errors
/// Returns a validation-kind error.
pub fn validate_code(code: &str) -> ApiResult<()> {
    if code.trim().is_empty() {
        Err(ApiError::validation("verification code must not be empty"))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::api::ApiErrorKind;

    #[test]
    fn email_validation_rejects_obvious_garbage() {
        assert!(validate_email("user@example.com").is_ok());
        assert!(validate_email("user@sub.example.com").is_ok());

        for bad in ["", "no-at-sign", "@example.com", "user@nodot", "a b@x.com"] {
            let err = validate_email(bad).unwrap_err();
            assert_eq!(err.kind, ApiErrorKind::Validation, "{bad}");
        }
    }

    #[test]
    fn password_and_code_validation() {
        assert!(validate_password("longenough").is_ok());
        assert_eq!(
            validate_password("short").unwrap_err().kind,
            ApiErrorKind::Validation
        );
        assert!(validate_code("123456").is_ok());
        assert!(validate_code("  ").is_err());
    }

    #[tokio::test]
    async fn login_returns_the_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/login"))
            .and(body_json(json!({
                "email": "user@example.com",
                "password": "hunter22hunter22"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "message": "Login successful",
                "token": "tok-abc"
            })))
            .mount(&server)
            .await;

        let client = AuthClient::new(server.uri());
        let outcome = client
            .login("user@example.com", "hunter22hunter22")
            .await
            .unwrap();
        assert_eq!(outcome.token, "tok-abc");
        assert_eq!(outcome.message.as_deref(), Some("Login successful"));
    }

    #[tokio::test]
    async fn bad_credentials_surface_the_body_detail() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/login"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({"detail": "Invalid credentials"})),
            )
            .mount(&server)
            .await;

        let client = AuthClient::new(server.uri());
        let err = client
            .login("user@example.com", "wrongpassword")
            .await
            .unwrap_err();
        assert_eq!(err.kind, ApiErrorKind::Auth);
        assert_eq!(err.message, "Invalid credentials");
    }

    #[tokio::test]
    async fn register_without_token_in_body_is_an_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/register"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"message": "wrong code"})),
            )
            .mount(&server)
            .await;

        let client = AuthClient::new(server.uri());
        let err = client
            .register("user@example.com", "hunter22hunter22", "000000")
            .await
            .unwrap_err();
        assert_eq!(err.kind, ApiErrorKind::Auth);
        assert_eq!(err.message, "wrong code");
    }

    #[tokio::test]
    async fn validation_failure_makes_no_request() {
        let server = MockServer::start().await;
        // No mocks mounted: any request would 404 and the error kind would
        // differ from Validation.
        let client = AuthClient::new(server.uri());
        let err = client.login("not-an-email", "hunter22").await.unwrap_err();
        assert_eq!(err.kind, ApiErrorKind::Validation);
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn send_code_returns_the_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/send-verification-code"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"message": "code sent"})),
            )
            .mount(&server)
            .await;

        let client = AuthClient::new(server.uri());
        let message = client
            .send_verification_code("user@example.com")
            .await
            .unwrap();
        assert_eq!(message, "code sent");
    }
}
