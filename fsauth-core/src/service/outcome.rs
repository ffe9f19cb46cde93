use std::fmt;

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::directory::{NewEmail, User};
use crate::token::IssuedToken;

/// Status discriminator shared by every operation's response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthStatus {
    /// Success; a token accompanies it.
    Ok,
    /// A user with that name or email already exists.
    AlreadyExists,
    /// No user by that name.
    NotFound,
    /// Wrong password, or the account has none.
    PasswordMismatch,
    /// The user exists but did not opt into public lookup.
    NotPublic,
}

impl AuthStatus {
    /// Wire name, e.g. `ALREADY_EXISTS`.
    pub fn as_str(self) -> &'static str {
        match self {
            AuthStatus::Ok => "OK",
            AuthStatus::AlreadyExists => "ALREADY_EXISTS",
            AuthStatus::NotFound => "NOT_FOUND",
            AuthStatus::PasswordMismatch => "PASSWORD_MISMATCH",
            AuthStatus::NotPublic => "NOT_PUBLIC",
        }
    }
}

impl fmt::Display for AuthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of [`AuthService::create_user`](super::AuthService::create_user).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateUserOutcome {
    /// The user was stored and a token issued.
    Created(IssuedToken),
    /// Name or email already taken.
    AlreadyExists,
}

/// Result of [`AuthService::authenticate`](super::AuthService::authenticate).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthUserOutcome {
    /// Credentials matched.
    Authenticated(IssuedToken),
    /// No user by that name.
    NotFound,
    /// Wrong password.
    PasswordMismatch,
}

/// Result of [`AuthService::authenticate_public`](super::AuthService::authenticate_public).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublicUserOutcome {
    /// The user is public.
    Authenticated(IssuedToken),
    /// No user by that name.
    NotFound,
    /// The user is private.
    NotPublic,
}

impl CreateUserOutcome {
    /// Wire status.
    pub fn status(&self) -> AuthStatus {
        match self {
            Self::Created(_) => AuthStatus::Ok,
            Self::AlreadyExists => AuthStatus::AlreadyExists,
        }
    }

    /// The issued token, when there is one.
    pub fn token(&self) -> Option<&IssuedToken> {
        match self {
            Self::Created(token) => Some(token),
            Self::AlreadyExists => None,
        }
    }
}

impl AuthUserOutcome {
    /// Wire status.
    pub fn status(&self) -> AuthStatus {
        match self {
            Self::Authenticated(_) => AuthStatus::Ok,
            Self::NotFound => AuthStatus::NotFound,
            Self::PasswordMismatch => AuthStatus::PasswordMismatch,
        }
    }

    /// The issued token, when there is one.
    pub fn token(&self) -> Option<&IssuedToken> {
        match self {
            Self::Authenticated(token) => Some(token),
            _ => None,
        }
    }
}

impl PublicUserOutcome {
    /// Wire status.
    pub fn status(&self) -> AuthStatus {
        match self {
            Self::Authenticated(_) => AuthStatus::Ok,
            Self::NotFound => AuthStatus::NotFound,
            Self::NotPublic => AuthStatus::NotPublic,
        }
    }

    /// The issued token, when there is one.
    pub fn token(&self) -> Option<&IssuedToken> {
        match self {
            Self::Authenticated(token) => Some(token),
            _ => None,
        }
    }
}

/// Register a new user. The plaintext password is wiped on drop.
#[derive(Clone, Deserialize)]
pub struct CreateUserRequest {
    /// Unique user name.
    pub name: String,
    /// Plaintext password.
    pub password: Zeroizing<String>,
    /// Opt into public lookup.
    #[serde(default)]
    pub public: bool,
    /// Upserted alongside the user.
    #[serde(default)]
    pub emails: Vec<NewEmail>,
}

impl CreateUserRequest {
    /// A request without email addresses.
    pub fn new(name: impl Into<String>, password: impl Into<String>, public: bool) -> Self {
        Self {
            name: name.into(),
            password: Zeroizing::new(password.into()),
            public,
            emails: Vec::new(),
        }
    }

    /// Attach an email address.
    pub fn with_email(mut self, email: NewEmail) -> Self {
        self.emails.push(email);
        self
    }
}

impl fmt::Debug for CreateUserRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreateUserRequest")
            .field("name", &self.name)
            .field("password", &"[redacted]")
            .field("public", &self.public)
            .field("emails", &self.emails)
            .finish()
    }
}

/// Log in with a name and password.
#[derive(Clone, Deserialize)]
pub struct AuthUserRequest {
    /// User name.
    pub name: String,
    /// Plaintext password.
    pub password: Zeroizing<String>,
}

impl AuthUserRequest {
    /// Build a login request.
    pub fn new(name: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            password: Zeroizing::new(password.into()),
        }
    }
}

impl fmt::Debug for AuthUserRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthUserRequest")
            .field("name", &self.name)
            .field("password", &"[redacted]")
            .finish()
    }
}

/// Look up a public user by name. No password.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthPublicUserRequest {
    /// User name.
    pub name: String,
}

impl AuthPublicUserRequest {
    /// Build a public lookup request.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// A public user as exposed outside the directory: no hash, no
/// verification codes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicIdentity {
    /// Directory id.
    pub id: i64,
    /// User name.
    pub name: String,
    /// Every address on the account, in insertion order.
    pub emails: Vec<String>,
}

impl From<User> for PublicIdentity {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            emails: user.emails.into_iter().map(|email| email.address).collect(),
        }
    }
}
