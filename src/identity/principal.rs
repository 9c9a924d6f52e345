use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

pub const MAX_USER_ID_LEN: usize = 128;

/// Opaque caller reference issued by the identity service.
///
/// Restricted to `[A-Za-z0-9_-]` so it can be embedded in artifact file names
/// and profile URLs without escaping.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
    pub fn parse<S: Into<String>>(raw: S) -> Result<Self, InvalidUserId> {
        let s = raw.into();
        if s.is_empty() || s.len() > MAX_USER_ID_LEN {
            return Err(InvalidUserId(s));
        }
        if !s.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-') {
            return Err(InvalidUserId(s));
        }
        Ok(UserId(s))
    }

    pub fn as_str(&self) -> &str { &self.0 }
}

impl Display for UserId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result { f.write_str(&self.0) }
}

impl TryFrom<String> for UserId {
    type Error = InvalidUserId;
    fn try_from(value: String) -> Result<Self, Self::Error> { UserId::parse(value) }
}

impl From<UserId> for String {
    fn from(value: UserId) -> Self { value.0 }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid user id: {0:?}")]
pub struct InvalidUserId(pub String);

/// Claims obtained from a verified bearer token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Principal {
    pub user_id: UserId,
}

impl Principal {
    pub fn new(user_id: UserId) -> Self {
        Self { user_id }
    }
}
