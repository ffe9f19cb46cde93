use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use fsauth_core::directory::{MemoryDirectory, NewEmail};
use fsauth_core::password::{Argon2Params, PasswordCrypto};
use fsauth_core::service::{
    AuthPublicUserRequest, AuthService, AuthStatus, AuthUserRequest, CallContext,
    CreateUserRequest,
};
use fsauth_core::token::{
    Algorithm, KeyMaterial, ManualClock, TokenError, TokenIssuer, TokenSettings,
    TokenVerifier,
};

const PRIVATE_PEM: &str = include_str!("fixtures/ed25519_private.pem");
const PUBLIC_PEM: &str = include_str!("fixtures/ed25519_public.pem");

struct Harness {
    service: AuthService,
    verifier: TokenVerifier,
    clock: Arc<ManualClock>,
}

fn harness() -> Harness {
    let keys = KeyMaterial::from_pem(Algorithm::EdDsa, PRIVATE_PEM, PUBLIC_PEM).unwrap();
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap(),
    ));
    let issuer = TokenIssuer::new(
        &keys,
        TokenSettings {
            ttl: Duration::from_secs(15 * 60),
            ..TokenSettings::default()
        },
        clock.clone(),
    );
    let verifier = issuer.verifier(&keys);
    let crypto = PasswordCrypto::with_params("integration-pepper", Argon2Params::MINIMAL)
        .unwrap();
    let service = AuthService::new(
        Arc::new(MemoryDirectory::new()),
        Arc::new(crypto),
        Arc::new(issuer),
    )
    .unwrap();

    Harness {
        service,
        verifier,
        clock,
    }
}

#[tokio::test]
async fn register_login_and_public_lookup() {
    let Harness {
        service, verifier, ..
    } = harness();
    let ctx = CallContext::default();

    let created = service
        .create_user(&ctx, CreateUserRequest::new("bob", "secret", false))
        .await
        .unwrap();
    assert_eq!(created.status(), AuthStatus::Ok);
    assert!(created.token().is_some());

    let login = service
        .authenticate(&ctx, AuthUserRequest::new("bob", "secret"))
        .await
        .unwrap();
    assert_eq!(login.status(), AuthStatus::Ok);
    let claims = verifier.verify(&login.token().unwrap().value).unwrap();
    assert_eq!(claims.user.name, "bob");
    assert!(!claims.user.public);

    let wrong = service
        .authenticate(&ctx, AuthUserRequest::new("bob", "wrong"))
        .await
        .unwrap();
    assert_eq!(wrong.status(), AuthStatus::PasswordMismatch);
    assert!(wrong.token().is_none());

    let lookup = service
        .authenticate_public(&ctx, AuthPublicUserRequest::new("bob"))
        .await
        .unwrap();
    assert_eq!(lookup.status(), AuthStatus::NotPublic);

    let carol = service
        .create_user(&ctx, CreateUserRequest::new("carol", "x", true))
        .await
        .unwrap();
    assert_eq!(carol.status(), AuthStatus::Ok);
    let lookup = service
        .authenticate_public(&ctx, AuthPublicUserRequest::new("carol"))
        .await
        .unwrap();
    let claims = verifier.verify(&lookup.token().unwrap().value).unwrap();
    assert_eq!(claims.user.name, "carol");
    assert!(claims.user.public);
}

#[tokio::test]
async fn second_registration_of_a_name_is_already_exists() {
    let Harness { service, .. } = harness();
    let ctx = CallContext::default();

    let first = service
        .create_user(&ctx, CreateUserRequest::new("dana", "one", false))
        .await
        .unwrap();
    let second = service
        .create_user(&ctx, CreateUserRequest::new("dana", "two", true))
        .await
        .unwrap();
    assert_eq!(first.status(), AuthStatus::Ok);
    assert_eq!(second.status(), AuthStatus::AlreadyExists);

    // The original credentials still hold.
    let login = service
        .authenticate(&ctx, AuthUserRequest::new("dana", "one"))
        .await
        .unwrap();
    assert_eq!(login.status(), AuthStatus::Ok);
}

#[tokio::test]
async fn email_conflicts_are_already_exists() {
    let Harness { service, .. } = harness();
    let ctx = CallContext::default();

    service
        .create_user(
            &ctx,
            CreateUserRequest::new("erin", "pw", true)
                .with_email(NewEmail::new("erin@example.com").primary()),
        )
        .await
        .unwrap();
    let clash = service
        .create_user(
            &ctx,
            CreateUserRequest::new("frank", "pw", true)
                .with_email(NewEmail::new("erin@example.com")),
        )
        .await
        .unwrap();
    assert_eq!(clash.status(), AuthStatus::AlreadyExists);

    let unknown = service
        .authenticate(&ctx, AuthUserRequest::new("frank", "pw"))
        .await
        .unwrap();
    assert_eq!(unknown.status(), AuthStatus::NotFound);

    let listed = service.list_public_users(&ctx).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].name, "erin");
    assert_eq!(listed[0].emails, ["erin@example.com"]);
}

#[tokio::test]
async fn tokens_expire_with_the_clock() {
    let Harness {
        service,
        verifier,
        clock,
    } = harness();
    let ctx = CallContext::default();

    let created = service
        .create_user(&ctx, CreateUserRequest::new("gail", "pw", false))
        .await
        .unwrap();
    let token = created.token().unwrap().clone();
    assert!(verifier.verify(&token.value).is_ok());

    clock.advance(chrono::Duration::minutes(15));
    assert_eq!(verifier.verify(&token.value), Err(TokenError::Expired));
}
