//! Browser sessions carried in a signed cookie.
//!
//! The cookie value is an HS256 JWT holding the logged-in user (if any) and
//! pending flash messages, so the server keeps no session table. A cookie
//! that fails verification is treated as an empty anonymous session.

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{
        header::{COOKIE, SET_COOKIE},
        request::Parts,
        HeaderValue, StatusCode,
    },
    response::{IntoResponse, IntoResponseParts, Redirect, Response, ResponseParts},
    Json,
};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::json;
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::{debug, error, warn};

use crate::auth::repo_types::{User, UserId};
use crate::state::AppState;

/// Pending flashes kept in the cookie; older ones are dropped first.
pub const MAX_FLASHES: usize = 5;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FlashKind {
    Success,
    Error,
    Info,
}

impl FlashKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FlashKind::Success => "success",
            FlashKind::Error => "error",
            FlashKind::Info => "info",
        }
    }
}

/// One-shot message shown on the next rendered page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Flash {
    pub kind: FlashKind,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flashes: Vec<Flash>,
}

impl SessionData {
    fn is_empty(&self) -> bool {
        self.uid.is_none() && self.username.is_none() && self.flashes.is_empty()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct SessionClaims {
    #[serde(flatten)]
    data: SessionData,
    iat: usize,
    exp: usize,
    iss: String,
}

/// Signing keys and cookie settings derived from the session config.
#[derive(Clone)]
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    cookie_name: String,
    ttl: Duration,
}

impl FromRef<AppState> for SessionKeys {
    fn from_ref(state: &AppState) -> Self {
        let cfg = &state.config.session;
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            cookie_name: cfg.cookie_name.clone(),
            ttl: Duration::from_secs((cfg.ttl_minutes.max(1) as u64) * 60),
        }
    }
}

impl SessionKeys {
    fn sign(&self, data: &SessionData) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let exp = now + TimeDuration::seconds(self.ttl.as_secs() as i64);
        let claims = SessionClaims {
            data: data.clone(),
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
        };
        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?)
    }

    fn verify(&self, token: &str) -> anyhow::Result<SessionData> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let claims = decode::<SessionClaims>(token, &self.decoding, &validation)?.claims;
        Ok(claims.data)
    }

    fn cookie_value<'a>(&self, header: &'a str) -> Option<&'a str> {
        header.split(';').find_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            (name == self.cookie_name).then_some(value)
        })
    }
}

/// The session of the current request. Mutations are written back as a
/// `Set-Cookie` header when the session is returned as part of a response.
pub struct Session {
    data: SessionData,
    keys: SessionKeys,
    dirty: bool,
}

impl Session {
    fn load(parts: &Parts, keys: SessionKeys) -> Self {
        let token = parts
            .headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|h| h.to_str().ok())
            .find_map(|h| keys.cookie_value(h));

        let data = match token {
            Some(token) => keys.verify(token).unwrap_or_else(|e| {
                warn!(error = %e, "discarding unverifiable session cookie");
                SessionData::default()
            }),
            None => SessionData::default(),
        };
        Self {
            data,
            keys,
            dirty: false,
        }
    }

    /// Bind this browser to `user`, replacing any previous binding.
    pub fn establish(&mut self, user: &User) {
        self.data.uid = Some(user.id);
        self.data.username = Some(user.username.clone());
        self.dirty = true;
        debug!(user_id = user.id, "session established");
    }

    pub fn current(&self) -> Option<UserId> {
        self.data.uid
    }

    pub fn username(&self) -> Option<&str> {
        self.data.username.as_deref()
    }

    /// Drop the user binding and any pending messages.
    pub fn terminate(&mut self) {
        self.data = SessionData::default();
        self.dirty = true;
    }

    pub fn flash(&mut self, kind: FlashKind, message: impl Into<String>) {
        let flashes = &mut self.data.flashes;
        if flashes.len() >= MAX_FLASHES {
            flashes.drain(..=flashes.len() - MAX_FLASHES);
        }
        flashes.push(Flash {
            kind,
            message: message.into(),
        });
        self.dirty = true;
    }

    pub fn take_flashes(&mut self) -> Vec<Flash> {
        if !self.data.flashes.is_empty() {
            self.dirty = true;
        }
        std::mem::take(&mut self.data.flashes)
    }

    fn set_cookie(&self) -> Option<HeaderValue> {
        if !self.dirty {
            return None;
        }
        let name = &self.keys.cookie_name;
        let cookie = if self.data.is_empty() {
            format!("{name}=; Path=/; Max-Age=0; HttpOnly; SameSite=Lax")
        } else {
            let token = match self.keys.sign(&self.data) {
                Ok(t) => t,
                Err(e) => {
                    error!(error = %e, "session signing failed");
                    return None;
                }
            };
            format!("{name}={token}; Path=/; HttpOnly; SameSite=Lax")
        };
        HeaderValue::from_str(&cookie).ok()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
    SessionKeys: FromRef<S>,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Ok(Session::load(parts, SessionKeys::from_ref(state)))
    }
}

impl IntoResponseParts for Session {
    type Error = Infallible;

    fn into_response_parts(self, mut res: ResponseParts) -> Result<ResponseParts, Self::Error> {
        if let Some(cookie) = self.set_cookie() {
            res.headers_mut().append(SET_COOKIE, cookie);
        }
        Ok(res)
    }
}

/// Logged-in user for JSON endpoints; rejects with 401 JSON.
pub struct AuthUser(pub UserId);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    SessionKeys: FromRef<S>,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = Session::load(parts, SessionKeys::from_ref(state));
        match session.current() {
            Some(id) => Ok(AuthUser(id)),
            None => {
                warn!("json request without session");
                Err((
                    StatusCode::UNAUTHORIZED,
                    Json(json!({ "error": "Please login first" })),
                )
                    .into_response())
            }
        }
    }
}

/// Logged-in user for HTML pages; anonymous visitors are sent to `/`.
pub struct PageUser {
    pub id: UserId,
    pub username: String,
    pub session: Session,
}

#[async_trait]
impl<S> FromRequestParts<S> for PageUser
where
    S: Send + Sync,
    SessionKeys: FromRef<S>,
{
    type Rejection = Redirect;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = Session::load(parts, SessionKeys::from_ref(state));
        let Some(id) = session.current() else {
            return Err(Redirect::to("/"));
        };
        let username = session.username().unwrap_or_default().to_string();
        Ok(PageUser {
            id,
            username,
            session,
        })
    }
}
