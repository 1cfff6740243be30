use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::Origin;
use crate::event::UserId;

pub const AUTHORIZATION_HEADER: &str = "Authorization";
pub const MAX_HEADER_NAME_LENGTH: usize = 256;
pub const MAX_HEADER_VALUE_LENGTH: usize = 8192;
pub const MAX_HEADERS_COUNT: usize = 32;

/// Backend routes the profile screen talks to, relative to the API origin.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Endpoint {
    TagSettings,
    Profile(UserId),
    FollowStatus(UserId),
    Follow(UserId),
}

impl Endpoint {
    /// Path segments below the API origin. A user id is always one segment.
    pub fn segments(&self) -> Vec<&str> {
        match self {
            Endpoint::TagSettings => vec!["settings", "tags"],
            Endpoint::Profile(user) => vec!["users", user.as_str(), "profile"],
            Endpoint::FollowStatus(user) => vec!["users", user.as_str(), "follow-status"],
            Endpoint::Follow(user) => vec!["users", user.as_str(), "follow"],
        }
    }

    pub fn path(&self) -> String {
        self.segments().join("/")
    }

    pub fn url(&self, origin: &Origin) -> Result<String, HttpError> {
        let invalid = |reason: &str| HttpError::InvalidUrl {
            url: format!("{}/{}", origin.as_str(), self.path()),
            reason: reason.to_string(),
        };

        let segments = self.segments();
        // Dot segments would be dropped or resolved by the URL parser.
        if segments.iter().any(|s| s.is_empty() || *s == "." || *s == "..") {
            return Err(invalid("empty or relative path segment"));
        }
        origin
            .join_segments(segments)
            .ok_or_else(|| invalid("could not be parsed"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpHeaders {
    headers: Vec<(String, String)>,
}

impl HttpHeaders {
    pub fn new() -> Self {
        Self {
            headers: Vec::new(),
        }
    }

    /// Headers for an authenticated request, or none without a session.
    pub fn for_session(bearer: Option<&SecretString>) -> Self {
        let mut headers = Self::new();
        if let Some(token) = bearer {
            let token = token.expose_secret().trim();
            if !token.is_empty() {
                // A token with CR/LF cannot be sent; the request goes out anonymous.
                if let Err(e) = headers.insert(AUTHORIZATION_HEADER, format!("Bearer {token}")) {
                    tracing::warn!(error = %e, "dropping malformed session credential");
                }
            }
        }
        headers
    }

    pub fn insert(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), HttpError> {
        if self.headers.len() >= MAX_HEADERS_COUNT {
            return Err(HttpError::TooManyHeaders {
                count: self.headers.len(),
                max: MAX_HEADERS_COUNT,
            });
        }

        let name = name.into();
        let value = value.into();

        Self::validate_header_name(&name)?;
        Self::validate_header_value(&name, &value)?;

        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(&name));
        self.headers.push((name, value));

        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    pub fn into_vec(self) -> Vec<(String, String)> {
        self.headers
    }

    fn validate_header_name(name: &str) -> Result<(), HttpError> {
        if name.is_empty() {
            return Err(HttpError::InvalidHeader {
                name: name.to_string(),
                reason: "header name cannot be empty".to_string(),
            });
        }

        if name.len() > MAX_HEADER_NAME_LENGTH {
            return Err(HttpError::InvalidHeader {
                name: name.chars().take(50).collect::<String>() + "...",
                reason: format!(
                    "header name exceeds maximum length of {} bytes",
                    MAX_HEADER_NAME_LENGTH
                ),
            });
        }

        if let Some(c) = name
            .chars()
            .find(|c| !c.is_ascii_alphanumeric() && *c != '-' && *c != '_')
        {
            return Err(HttpError::InvalidHeader {
                name: name.to_string(),
                reason: format!("invalid character '{}' in header name", c),
            });
        }

        Ok(())
    }

    fn validate_header_value(name: &str, value: &str) -> Result<(), HttpError> {
        if value.len() > MAX_HEADER_VALUE_LENGTH {
            return Err(HttpError::InvalidHeader {
                name: name.to_string(),
                reason: format!(
                    "header value exceeds maximum length of {} bytes",
                    MAX_HEADER_VALUE_LENGTH
                ),
            });
        }

        if value.chars().any(|c| c == '\r' || c == '\n' || c == '\0') {
            return Err(HttpError::InvalidHeader {
                name: name.to_string(),
                reason: "header value contains invalid characters (CR, LF, or NULL)".to_string(),
            });
        }

        Ok(())
    }
}

impl Default for HttpHeaders {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum HttpError {
    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("invalid header '{name}': {reason}")]
    InvalidHeader { name: String, reason: String },

    #[error("too many headers: {count} exceeds maximum of {max}")]
    TooManyHeaders { count: usize, max: usize },

    #[error("server responded with status {status}")]
    Status { status: u16 },

    #[error("response body missing or not JSON")]
    EmptyBody,

    #[error("transport error: {message}")]
    Transport { message: String },
}

impl HttpError {
    pub fn status(&self) -> Option<u16> {
        match self {
            HttpError::Status { status } => Some(*status),
            _ => None,
        }
    }
}

impl From<crux_http::Error> for HttpError {
    fn from(e: crux_http::Error) -> Self {
        HttpError::Transport {
            message: e.to_string(),
        }
    }
}
