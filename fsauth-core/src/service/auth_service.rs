use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use zeroize::Zeroizing;

use super::context::CallContext;
use super::outcome::{
    AuthPublicUserRequest, AuthUserOutcome, AuthUserRequest, CreateUserOutcome,
    CreateUserRequest, PublicIdentity, PublicUserOutcome,
};
use super::validation::{
    ValidationError, validate_email, validate_name, validate_password,
};
use crate::directory::{Directory, DirectoryError, NewUser, User};
use crate::password::{PasswordCrypto, PasswordError, PasswordHash};
use crate::token::{IssuedToken, TokenError, TokenIssuer};

/// Failures that are not business outcomes.
///
/// Everything except [`Validation`](AuthServiceError::Validation) is an
/// internal error: log it, answer the caller opaquely.
#[derive(Debug, Error)]
pub enum AuthServiceError {
    /// Rejected input. The only variant a caller may see in detail.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// Hashing a new password failed.
    #[error("password hashing failed: {0}")]
    Hashing(#[source] PasswordError),
    /// A stored hash is not a parseable PHC string.
    #[error("stored credential for user {user_id} is corrupt: {source}")]
    CorruptCredential {
        /// Owner of the hash.
        user_id: i64,
        /// Parse failure.
        #[source]
        source: PasswordError,
    },
    /// Signing a token failed.
    #[error("token signing failed: {0}")]
    Signing(#[from] TokenError),
    /// The directory failed.
    #[error("directory failure: {0}")]
    Storage(#[source] DirectoryError),
    /// The per-call deadline passed first.
    #[error("deadline exceeded")]
    DeadlineExceeded,
    /// The call was cancelled, e.g. by server shutdown.
    #[error("call cancelled")]
    Cancelled,
}

impl AuthServiceError {
    /// Whether the error should be logged and hidden from the caller.
    pub fn is_internal(&self) -> bool {
        !matches!(self, AuthServiceError::Validation(_))
    }
}

/// The register / authenticate / public lookup operations.
///
/// Stateless between calls; every dependency is shared and immutable.
pub struct AuthService {
    directory: Arc<dyn Directory>,
    crypto: Arc<PasswordCrypto>,
    issuer: Arc<TokenIssuer>,
    /// Verified against on paths that have no real hash, so a missing user
    /// costs the same Argon2 work as a wrong password.
    dummy_hash: PasswordHash,
}

impl fmt::Debug for AuthService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthService")
            .field("crypto", &self.crypto)
            .field("issuer", &self.issuer)
            .finish_non_exhaustive()
    }
}

impl AuthService {
    /// Fails only if the timing-equalisation hash cannot be computed.
    pub fn new(
        directory: Arc<dyn Directory>,
        crypto: Arc<PasswordCrypto>,
        issuer: Arc<TokenIssuer>,
    ) -> Result<Self, AuthServiceError> {
        let dummy_hash = crypto
            .hash_password("fsauth.timing-equaliser")
            .map_err(AuthServiceError::Hashing)?;
        Ok(Self {
            directory,
            crypto,
            issuer,
            dummy_hash,
        })
    }

    /// Register a user and issue their first token.
    #[instrument(skip_all, fields(name = %request.name, public = request.public))]
    pub async fn create_user(
        &self,
        ctx: &CallContext,
        request: CreateUserRequest,
    ) -> Result<CreateUserOutcome, AuthServiceError> {
        validate_name(&request.name)?;
        validate_password(&request.password)?;
        for email in &request.emails {
            validate_email(email)?;
        }

        let CreateUserRequest {
            name,
            password,
            public,
            emails,
        } = request;

        let password_hash = self.hash(password).await?;
        let new_user = NewUser {
            name,
            password_hash: Some(password_hash),
            public,
            emails,
        };

        match ctx.bound(self.directory.create(new_user)).await? {
            Ok(user) => {
                let token = self.issue_for(&user)?;
                info!(user_id = user.id, "registered user");
                Ok(CreateUserOutcome::Created(token))
            }
            Err(DirectoryError::AlreadyExists { what }) => {
                debug!(conflict = what, "registration rejected");
                Ok(CreateUserOutcome::AlreadyExists)
            }
            Err(err) => Err(AuthServiceError::Storage(err)),
        }
    }

    /// Check a name and password and issue a token.
    #[instrument(skip_all, fields(name = %request.name))]
    pub async fn authenticate(
        &self,
        ctx: &CallContext,
        request: AuthUserRequest,
    ) -> Result<AuthUserOutcome, AuthServiceError> {
        validate_name(&request.name)?;
        validate_password(&request.password)?;
        let AuthUserRequest { name, password } = request;

        let user = match ctx.bound(self.directory.find_by_name(&name)).await? {
            Ok(user) => user,
            Err(DirectoryError::NotFound) => {
                self.equalise_timing(password).await;
                debug!("authentication failed: unknown user");
                return Ok(AuthUserOutcome::NotFound);
            }
            Err(err) => return Err(AuthServiceError::Storage(err)),
        };

        let Some(stored) = user.password_hash.clone() else {
            self.equalise_timing(password).await;
            debug!(user_id = user.id, "authentication failed: no password set");
            return Ok(AuthUserOutcome::PasswordMismatch);
        };

        match self.verify(stored, password).await {
            Ok(true) => {
                let token = self.issue_for(&user)?;
                info!(user_id = user.id, "authenticated user");
                Ok(AuthUserOutcome::Authenticated(token))
            }
            Ok(false) => {
                debug!(user_id = user.id, "authentication failed: password mismatch");
                Ok(AuthUserOutcome::PasswordMismatch)
            }
            Err(source @ PasswordError::MalformedHash(_)) => {
                Err(AuthServiceError::CorruptCredential {
                    user_id: user.id,
                    source,
                })
            }
            Err(err) => Err(AuthServiceError::Hashing(err)),
        }
    }

    /// Issue a token for a user that opted into public lookup. No password
    /// is involved, so this must never succeed for a private user.
    #[instrument(skip_all, fields(name = %request.name))]
    pub async fn authenticate_public(
        &self,
        ctx: &CallContext,
        request: AuthPublicUserRequest,
    ) -> Result<PublicUserOutcome, AuthServiceError> {
        validate_name(&request.name)?;

        let user = match ctx.bound(self.directory.find_by_name(&request.name)).await? {
            Ok(user) => user,
            Err(DirectoryError::NotFound) => return Ok(PublicUserOutcome::NotFound),
            Err(err) => return Err(AuthServiceError::Storage(err)),
        };

        if !user.public {
            debug!(user_id = user.id, "public lookup rejected: user is private");
            return Ok(PublicUserOutcome::NotPublic);
        }

        let token = self.issue_for(&user)?;
        Ok(PublicUserOutcome::Authenticated(token))
    }

    /// Every public user, ordered by name.
    pub async fn list_public_users(
        &self,
        ctx: &CallContext,
    ) -> Result<Vec<PublicIdentity>, AuthServiceError> {
        let users = ctx
            .bound(self.directory.list_public_users())
            .await?
            .map_err(AuthServiceError::Storage)?;
        Ok(users.into_iter().map(PublicIdentity::from).collect())
    }

    fn issue_for(&self, user: &User) -> Result<IssuedToken, AuthServiceError> {
        Ok(self.issuer.issue(&user.identity())?)
    }

    async fn hash(
        &self,
        password: Zeroizing<String>,
    ) -> Result<PasswordHash, AuthServiceError> {
        let crypto = Arc::clone(&self.crypto);
        tokio::task::spawn_blocking(move || crypto.hash_password(&password))
            .await
            .map_err(|err| {
                AuthServiceError::Hashing(PasswordError::Hashing(err.to_string()))
            })?
            .map_err(AuthServiceError::Hashing)
    }

    async fn verify(
        &self,
        stored: PasswordHash,
        password: Zeroizing<String>,
    ) -> Result<bool, PasswordError> {
        let crypto = Arc::clone(&self.crypto);
        tokio::task::spawn_blocking(move || crypto.verify_password(&stored, &password))
            .await
            .map_err(|err| PasswordError::Hashing(err.to_string()))?
    }

    async fn equalise_timing(&self, password: Zeroizing<String>) {
        if let Err(err) = self.verify(self.dummy_hash.clone(), password).await {
            warn!(error = %err, "timing equaliser verification failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::Utc;

    use super::*;
    use crate::directory::{MockDirectory, NewEmail};
    use crate::password::Argon2Params;
    use crate::service::AuthStatus;
    use crate::token::{
        Algorithm, KeyMaterial, SystemClock, TokenSettings, TokenVerifier, test_keys,
    };

    fn keys() -> KeyMaterial {
        KeyMaterial::from_pem(
            Algorithm::EdDsa,
            test_keys::ED25519_PRIVATE,
            test_keys::ED25519_PUBLIC,
        )
        .unwrap()
    }

    fn crypto() -> Arc<PasswordCrypto> {
        Arc::new(PasswordCrypto::with_params("pepper", Argon2Params::MINIMAL).unwrap())
    }

    fn service(directory: impl Directory + 'static) -> (AuthService, TokenVerifier) {
        let keys = keys();
        let issuer = TokenIssuer::new(&keys, TokenSettings::default(), Arc::new(SystemClock));
        let verifier = issuer.verifier(&keys);
        let service =
            AuthService::new(Arc::new(directory), crypto(), Arc::new(issuer)).unwrap();
        (service, verifier)
    }

    fn stored_user(name: &str, password_hash: Option<PasswordHash>, public: bool) -> User {
        User {
            id: 11,
            name: name.to_string(),
            password_hash,
            public,
            created_at: Utc::now(),
            emails: Vec::new(),
        }
    }

    #[tokio::test]
    async fn create_maps_conflict_to_outcome() {
        let mut directory = MockDirectory::new();
        directory
            .expect_create()
            .times(1)
            .returning(|_| Err(DirectoryError::AlreadyExists { what: "name" }));
        let (service, _) = service(directory);

        let outcome = service
            .create_user(&CallContext::default(), CreateUserRequest::new("bob", "pw", false))
            .await
            .unwrap();
        assert_eq!(outcome.status(), AuthStatus::AlreadyExists);
        assert!(outcome.token().is_none());
    }

    #[tokio::test]
    async fn create_hashes_before_storing_and_issues_token() {
        let mut directory = MockDirectory::new();
        directory
            .expect_create()
            .withf(|user| {
                user.name == "bob"
                    && user
                        .password_hash
                        .as_ref()
                        .is_some_and(|hash| hash.as_str().starts_with("$argon2id$"))
                    && user.emails.len() == 1
            })
            .times(1)
            .returning(|user| {
                Ok(User {
                    id: 5,
                    name: user.name,
                    password_hash: user.password_hash,
                    public: user.public,
                    created_at: Utc::now(),
                    emails: Vec::new(),
                })
            });
        let (service, verifier) = service(directory);

        let request = CreateUserRequest::new("bob", "secret", true)
            .with_email(NewEmail::new("bob@example.com"));
        let outcome = service
            .create_user(&CallContext::default(), request)
            .await
            .unwrap();
        let token = outcome.token().unwrap();
        let claims = verifier.verify(&token.value).unwrap();
        assert_eq!(claims.user.id, 5);
        assert!(claims.user.public);
    }

    #[tokio::test]
    async fn storage_failures_are_internal() {
        let mut directory = MockDirectory::new();
        directory
            .expect_create()
            .returning(|_| Err(DirectoryError::Storage(anyhow::anyhow!("disk on fire"))));
        directory
            .expect_find_by_name()
            .returning(|_| Err(DirectoryError::Storage(anyhow::anyhow!("disk on fire"))));
        let (service, _) = service(directory);
        let ctx = CallContext::default();

        let err = service
            .create_user(&ctx, CreateUserRequest::new("bob", "pw", false))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthServiceError::Storage(_)));
        assert!(err.is_internal());

        let err = service
            .authenticate(&ctx, AuthUserRequest::new("bob", "pw"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthServiceError::Storage(_)));

        let err = service
            .authenticate_public(&ctx, AuthPublicUserRequest::new("bob"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthServiceError::Storage(_)));
    }

    #[tokio::test]
    async fn invalid_input_never_reaches_storage() {
        let mut directory = MockDirectory::new();
        directory.expect_create().times(0);
        directory.expect_find_by_name().times(0);
        let (service, _) = service(directory);
        let ctx = CallContext::default();

        let err = service
            .create_user(&ctx, CreateUserRequest::new(" bob", "pw", false))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AuthServiceError::Validation(ValidationError::NameWhitespace)
        ));
        assert!(!err.is_internal());

        let err = service
            .create_user(
                &ctx,
                CreateUserRequest::new("bob", "pw", false).with_email(NewEmail::new("nope")),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AuthServiceError::Validation(ValidationError::InvalidEmail(_))
        ));

        let err = service
            .authenticate(&ctx, AuthUserRequest::new("bob", ""))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AuthServiceError::Validation(ValidationError::EmptyPassword)
        ));
    }

    #[tokio::test]
    async fn unknown_user_is_not_found() {
        let mut directory = MockDirectory::new();
        directory
            .expect_find_by_name()
            .withf(|name| name == "ghost")
            .returning(|_| Err(DirectoryError::NotFound));
        let (service, _) = service(directory);
        let ctx = CallContext::default();

        let outcome = service
            .authenticate(&ctx, AuthUserRequest::new("ghost", "pw"))
            .await
            .unwrap();
        assert_eq!(outcome, AuthUserOutcome::NotFound);

        let outcome = service
            .authenticate_public(&ctx, AuthPublicUserRequest::new("ghost"))
            .await
            .unwrap();
        assert_eq!(outcome, PublicUserOutcome::NotFound);
    }

    #[tokio::test]
    async fn missing_hash_never_matches() {
        let mut directory = MockDirectory::new();
        directory
            .expect_find_by_name()
            .returning(|name| Ok(stored_user(name, None, false)));
        let (service, _) = service(directory);

        let outcome = service
            .authenticate(&CallContext::default(), AuthUserRequest::new("bob", "anything"))
            .await
            .unwrap();
        assert_eq!(outcome, AuthUserOutcome::PasswordMismatch);
    }

    #[tokio::test]
    async fn corrupt_hash_is_internal_not_mismatch() {
        let mut directory = MockDirectory::new();
        directory.expect_find_by_name().returning(|name| {
            Ok(stored_user(name, Some(PasswordHash::from_phc("garbage")), false))
        });
        let (service, _) = service(directory);

        let err = service
            .authenticate(&CallContext::default(), AuthUserRequest::new("bob", "pw"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AuthServiceError::CorruptCredential { user_id: 11, .. }
        ));
    }

    #[tokio::test]
    async fn correct_password_authenticates() {
        let hash = crypto().hash_password("secret").unwrap();
        let mut directory = MockDirectory::new();
        directory
            .expect_find_by_name()
            .returning(move |name| Ok(stored_user(name, Some(hash.clone()), false)));
        let (service, verifier) = service(directory);
        let ctx = CallContext::default();

        let outcome = service
            .authenticate(&ctx, AuthUserRequest::new("bob", "secret"))
            .await
            .unwrap();
        let claims = verifier.verify(&outcome.token().unwrap().value).unwrap();
        assert_eq!(claims.user.name, "bob");

        let outcome = service
            .authenticate(&ctx, AuthUserRequest::new("bob", "wrong"))
            .await
            .unwrap();
        assert_eq!(outcome, AuthUserOutcome::PasswordMismatch);
    }

    #[tokio::test]
    async fn private_users_are_not_publicly_resolvable() {
        let mut directory = MockDirectory::new();
        directory
            .expect_find_by_name()
            .returning(|name| Ok(stored_user(name, None, name == "carol")));
        let (service, verifier) = service(directory);
        let ctx = CallContext::default();

        let outcome = service
            .authenticate_public(&ctx, AuthPublicUserRequest::new("bob"))
            .await
            .unwrap();
        assert_eq!(outcome.status(), AuthStatus::NotPublic);

        let outcome = service
            .authenticate_public(&ctx, AuthPublicUserRequest::new("carol"))
            .await
            .unwrap();
        let claims = verifier.verify(&outcome.token().unwrap().value).unwrap();
        assert!(claims.user.public);
    }

    #[derive(Debug)]
    struct StalledDirectory;

    #[async_trait]
    impl Directory for StalledDirectory {
        async fn find_by_name(&self, _name: &str) -> Result<User, DirectoryError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Err(DirectoryError::NotFound)
        }

        async fn find_by_email(&self, _address: &str) -> Result<User, DirectoryError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Err(DirectoryError::NotFound)
        }

        async fn create(&self, _user: NewUser) -> Result<User, DirectoryError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Err(DirectoryError::NotFound)
        }

        async fn list_public_users(&self) -> Result<Vec<User>, DirectoryError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(Vec::new())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slow_storage_hits_the_deadline() {
        let (service, _) = service(StalledDirectory);
        let ctx = CallContext::with_timeout(Duration::from_millis(200));

        let err = service
            .authenticate_public(&ctx, AuthPublicUserRequest::new("bob"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthServiceError::DeadlineExceeded));

        let err = service.list_public_users(&ctx).await.unwrap_err();
        assert!(matches!(err, AuthServiceError::DeadlineExceeded));
    }
}
