// Integration tests for the authentication flows
//
// These tests exercise the orchestration end-to-end against real backing
// stores:
// - registration creates an inactive identity plus an active verification
// - verification tokens are single-use and expire
// - two-factor logins park at the OTP challenge instead of issuing tokens
// - the spam guard blocks the sixth call in a window with the initial block
// - device upserts overwrite the public key in place
//
// To run them with actual services:
//   docker-compose up -d postgres redis
//   DATABASE_URL=postgres://localhost/auth_test REDIS_URL=redis://localhost \
//     cargo test --test auth_flow_test -- --include-ignored --nocapture

use auth_service::config::{
    AppConfig, Config, DatabaseConfig, EmailConfig, FrontendConfig, JwtConfig, RedisConfig,
};
use auth_service::db::{self, device_repo, otp_repo, user_repo, verification_repo};
use auth_service::error::AppError;
use auth_service::models::password_reason;
use auth_service::redis::{SpamClass, SpamGuard};
use auth_service::security::password::hash_password;
use auth_service::services::auth::LoginOutcome;
use auth_service::services::email::{Mailer, OutboundEmail};
use auth_service::services::{AuthService, RequestContext};
use chrono::{Duration, Utc};
use sqlx::PgPool;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

fn test_config() -> Config {
    Config {
        app: AppConfig {
            env: "test".to_string(),
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        database: DatabaseConfig {
            url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgres://localhost/auth_test".to_string()),
            max_connections: 5,
        },
        redis: RedisConfig {
            url: std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost".to_string()),
        },
        jwt: JwtConfig {
            access_ttl_secs: 3600,
            refresh_ttl_secs: 86400,
        },
        email: EmailConfig {
            smtp_host: String::new(),
            smtp_port: 587,
            smtp_username: None,
            smtp_password: None,
            smtp_from: "noreply@auth.local".to_string(),
            use_starttls: false,
        },
        frontend: FrontendConfig {
            base_url: "http://localhost:3000".to_string(),
        },
    }
}

struct TestHarness {
    pool: PgPool,
    redis: redis::aio::ConnectionManager,
    auth: AuthService,
    outbox: mpsc::Receiver<OutboundEmail>,
}

async fn harness() -> TestHarness {
    let config = test_config();

    let pool = db::create_pool(&config.database.url, config.database.max_connections)
        .await
        .expect("postgres available");
    db::run_migrations(&pool).await.expect("migrations apply");

    let redis_client = redis::Client::open(config.redis.url.as_str()).expect("redis url");
    let redis = redis_client
        .get_connection_manager()
        .await
        .expect("redis available");

    let (mailer, outbox) = Mailer::channel();
    let auth = AuthService::new(pool.clone(), redis.clone(), mailer, Arc::new(config));

    TestHarness {
        pool,
        redis,
        auth,
        outbox,
    }
}

fn unique_email() -> String {
    format!("it-{}@example.com", Uuid::new_v4().simple())
}

fn ctx() -> RequestContext {
    RequestContext {
        device_id: format!("device-{}", Uuid::new_v4().simple()),
        user_agent: Some("integration-test".to_string()),
        // Unique per test run so spam counters never cross-talk.
        ip: Some(format!("10.0.{}.{}", rand_byte(), rand_byte())),
    }
}

fn rand_byte() -> u8 {
    use rand::Rng;
    rand::thread_rng().gen()
}

/// Register a user and activate it through the real verification flow.
async fn activated_user(h: &TestHarness, email: &str) -> Uuid {
    let context = ctx();
    let registered = h.auth.register(&context, email).await.expect("register");
    h.auth
        .verify_account(&context, registered.id, email, &registered.token)
        .await
        .expect("verify account");
    registered.id
}

#[tokio::test]
#[ignore = "requires postgres and redis"]
async fn register_creates_inactive_identity_with_pending_verification() {
    let mut h = harness().await;
    let email = unique_email();

    let outcome = h.auth.register(&ctx(), &email).await.expect("register");

    assert_eq!(outcome.email, email);
    assert_eq!(outcome.token.len(), 32);

    let user = user_repo::find_by_email(&h.pool, &email)
        .await
        .unwrap()
        .expect("identity created");
    assert!(!user.is_active);
    assert!(user.password_hash.is_none());

    let pending = verification_repo::count_pending(&h.pool, user.id)
        .await
        .unwrap();
    assert_eq!(pending, 1);

    // A verification email was scheduled.
    let mail = h.outbox.try_recv().expect("email enqueued");
    assert_eq!(mail.to, email);
    assert!(mail.text_body.contains(&outcome.token));
}

#[tokio::test]
#[ignore = "requires postgres and redis"]
async fn expired_verification_leaves_identity_inactive() {
    let h = harness().await;
    let email = unique_email();

    let user = user_repo::create(&h.pool, &email).await.unwrap();
    let token = verification_repo::generate_token();
    verification_repo::create(&h.pool, user.id, &token, Utc::now() - Duration::hours(1))
        .await
        .unwrap();

    let result = h.auth.verify_account(&ctx(), user.id, &email, &token).await;
    assert!(matches!(result, Err(AppError::Expired(_))));

    let user = user_repo::find_by_email(&h.pool, &email)
        .await
        .unwrap()
        .unwrap();
    assert!(!user.is_active);
}

#[tokio::test]
#[ignore = "requires postgres and redis"]
async fn verification_consume_is_single_use() {
    let h = harness().await;
    let email = unique_email();

    let user = user_repo::create(&h.pool, &email).await.unwrap();
    let token = verification_repo::generate_token();
    verification_repo::create(&h.pool, user.id, &token, Utc::now() + Duration::hours(24))
        .await
        .unwrap();

    verification_repo::consume(&h.pool, &token, user.id)
        .await
        .expect("first consume succeeds");

    let second = verification_repo::consume(&h.pool, &token, user.id).await;
    assert!(matches!(second, Err(AppError::InvalidState(_))));
}

#[tokio::test]
#[ignore = "requires postgres and redis"]
async fn otp_lookup_is_single_use() {
    let h = harness().await;
    let email = unique_email();
    let user = user_repo::create(&h.pool, &email).await.unwrap();

    let code = otp_repo::generate_otp(otp_repo::OTP_LENGTH);
    otp_repo::create(&h.pool, user.id, &code, Utc::now() + Duration::minutes(5))
        .await
        .unwrap();

    let first = otp_repo::take_active(&h.pool, &code).await.unwrap();
    assert!(first.is_some());

    let second = otp_repo::take_active(&h.pool, &code).await.unwrap();
    assert!(second.is_none());
}

#[tokio::test]
#[ignore = "requires postgres and redis"]
async fn two_factor_login_returns_pending_challenge_without_tokens() {
    let mut h = harness().await;
    let email = unique_email();

    let user_id = activated_user(&h, &email).await;

    // Give the account a known password and enable 2FA.
    let password = "Kn0wn&Pass!word";
    let hash = hash_password(password).unwrap();
    user_repo::update_password(&h.pool, user_id, &hash).await.unwrap();
    user_repo::set_two_factor(&h.pool, user_id, true).await.unwrap();

    // Drain the registration/activation emails.
    while h.outbox.try_recv().is_ok() {}

    let outcome = h
        .auth
        .login_identifier(&ctx(), &email, password)
        .await
        .expect("login reaches challenge");

    match outcome {
        LoginOutcome::PendingTwoFactor { user_id: id, .. } => assert_eq!(id, user_id),
        LoginOutcome::Session(_) => panic!("2FA login must not issue tokens"),
    }

    // The challenge email carries a 6-digit code.
    let mail = h.outbox.try_recv().expect("otp email enqueued");
    assert_eq!(mail.to, email);
}

#[tokio::test]
#[ignore = "requires postgres and redis"]
async fn sixth_call_in_window_is_blocked_with_initial_block() {
    let h = harness().await;
    let guard = SpamGuard::new(h.redis.clone());
    let subject = format!("subject-{}", Uuid::new_v4().simple());

    for _ in 0..5 {
        let verdict = guard.check(SpamClass::Login, &subject).await.unwrap();
        assert!(!verdict.is_blocked);
    }

    let verdict = guard.check(SpamClass::Login, &subject).await.unwrap();
    assert!(verdict.is_blocked);
    // InitialBlock is 5 minutes; allow for clock skew between EXPIRE and TTL.
    assert!((295..=300).contains(&verdict.retry_after_secs));
}

#[tokio::test]
#[ignore = "requires postgres and redis"]
async fn device_upsert_overwrites_public_key_in_place() {
    let h = harness().await;
    let email = unique_email();
    let user = user_repo::create(&h.pool, &email).await.unwrap();

    let device_id = format!("device-{}", Uuid::new_v4().simple());

    let first = device_repo::upsert(
        &h.pool,
        device_repo::UpsertDeviceParams {
            user_id: user.id,
            device_id: &device_id,
            device_type: Some("agent-one"),
            ip: Some("10.1.1.1"),
            public_key: "PEM-ONE",
        },
    )
    .await
    .unwrap();

    let second = device_repo::upsert(
        &h.pool,
        device_repo::UpsertDeviceParams {
            user_id: user.id,
            device_id: &device_id,
            device_type: Some("agent-one"),
            ip: Some("10.1.1.1"),
            public_key: "PEM-TWO",
        },
    )
    .await
    .unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(first.user_id, second.user_id);
    assert_eq!(first.device_id, second.device_id);
    assert_eq!(second.public_key, "PEM-TWO");
}

#[tokio::test]
#[ignore = "requires postgres and redis"]
async fn password_history_rejects_recent_reuse() {
    let h = harness().await;
    let email = unique_email();
    let user = user_repo::create(&h.pool, &email).await.unwrap();

    let reused = "Re&Used#Pass1";
    let hash = hash_password(reused).unwrap();
    auth_service::db::password_history_repo::insert(
        &h.pool,
        user.id,
        &hash,
        password_reason::CHANGE,
    )
    .await
    .unwrap();

    let rejected = auth_service::services::password_guard::check_and_hash(
        &h.pool, user.id, reused, 10,
    )
    .await;
    assert!(matches!(rejected, Err(AppError::ReuseRejected)));

    let accepted = auth_service::services::password_guard::check_and_hash(
        &h.pool,
        user.id,
        "Fresh&New#Pass2",
        10,
    )
    .await;
    assert!(accepted.is_ok());
}
