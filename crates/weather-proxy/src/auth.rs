//! Basic credential validation for the protected route.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use sha2::{Digest, Sha256};

use crate::error::AuthError;

/// The single static login/password pair the proxy accepts.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    login: String,
    password: String,
}

impl Credentials {
    #[must_use]
    pub fn new(login: impl Into<String>, password: impl Into<String>) -> Self {
        Self { login: login.into(), password: password.into() }
    }

    #[must_use]
    pub fn login(&self) -> &str {
        &self.login
    }

    /// True when either half is empty. Such a pair can never authenticate.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.login.is_empty() || self.password.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("login", &self.login)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Validates `Authorization` headers against the configured [`Credentials`].
#[derive(Debug, Clone)]
pub struct Authenticator {
    credentials: Credentials,
}

impl Authenticator {
    #[must_use]
    pub const fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }

    /// Check a raw `Authorization` header value.
    ///
    /// The header is `<scheme> <base64(login:password)>`. Only the presence of the
    /// scheme token matters; the payload is decoded and split on the first colon.
    /// Any decode failure, empty field or mismatch is rejected.
    pub fn authenticate(&self, header: Option<&str>) -> Result<(), AuthError> {
        let header = header.ok_or(AuthError::MissingHeader)?;
        let (login, password) = decode_basic(header)?;

        if login.is_empty() || password.is_empty() {
            return Err(AuthError::MalformedHeader("empty login or password"));
        }

        if digest_eq(&login, &self.credentials.login)
            && digest_eq(&password, &self.credentials.password)
        {
            Ok(())
        } else {
            Err(AuthError::InvalidCredentials)
        }
    }
}

/// Decode `<scheme> <payload>` into `(login, password)`.
fn decode_basic(header: &str) -> Result<(String, String), AuthError> {
    let payload = header
        .split(' ')
        .nth(1)
        .filter(|p| !p.is_empty())
        .ok_or(AuthError::MalformedHeader("missing credential payload"))?;

    let bytes = STANDARD
        .decode(payload)
        .map_err(|_| AuthError::MalformedHeader("payload is not valid base64"))?;
    let decoded =
        String::from_utf8(bytes).map_err(|_| AuthError::MalformedHeader("payload is not UTF-8"))?;

    let (login, password) = decoded
        .split_once(':')
        .ok_or(AuthError::MalformedHeader("payload has no ':' separator"))?;

    Ok((login.to_string(), password.to_string()))
}

/// Compare via SHA-256 digests so timing does not track the shared prefix of the secret.
fn digest_eq(presented: &str, expected: &str) -> bool {
    Sha256::digest(presented.as_bytes()) == Sha256::digest(expected.as_bytes())
}
