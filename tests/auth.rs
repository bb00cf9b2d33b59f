use anyhow::Result;
use accountdeck_lib::auth::{authenticate, create_user, find_user_by_username, verify_password};
use accountdeck_lib::ErrorKind;

#[path = "util.rs"]
mod util;

const ITERATIONS: u32 = 1_000;

#[tokio::test]
async fn created_user_can_log_in() -> Result<()> {
    let pool = util::memory_pool().await;
    let user = create_user(&pool, " admin ", "hunter2", true, ITERATIONS).await?;
    assert_eq!(user.username, "admin");
    assert!(user.is_admin);
    assert!(user.created_at > 0);
    assert!(user.password_hash.starts_with("pbkdf2_sha256$1000$"));
    assert_eq!(verify_password("hunter2", &user.password_hash), Ok(true));

    let found = find_user_by_username(&pool, "admin").await?;
    assert_eq!(found.as_ref().map(|u| u.id), Some(user.id));

    let authed = authenticate(&pool, "admin", "hunter2").await?;
    assert_eq!(authed.id, user.id);

    let json = serde_json::to_value(&authed)?;
    assert!(json.get("password_hash").is_none());
    Ok(())
}

#[tokio::test]
async fn bad_credentials_are_indistinguishable() -> Result<()> {
    let pool = util::memory_pool().await;
    create_user(&pool, "admin", "hunter2", false, ITERATIONS).await?;

    let wrong = authenticate(&pool, "admin", "nope").await.expect_err("wrong password");
    let unknown = authenticate(&pool, "ghost", "hunter2").await.expect_err("unknown user");
    assert_eq!(wrong.kind(), ErrorKind::Unauthorized);
    assert_eq!(unknown.kind(), ErrorKind::Unauthorized);
    assert_eq!(wrong.message(), unknown.message());
    Ok(())
}

#[tokio::test]
async fn unreadable_hash_is_rejected() -> Result<()> {
    let pool = util::memory_pool().await;
    sqlx::query("INSERT INTO users (username, password_hash) VALUES ('old', 'md5$abc')")
        .execute(&pool)
        .await?;
    let err = authenticate(&pool, "old", "whatever").await.expect_err("bad hash");
    assert_eq!(err.kind(), ErrorKind::Unauthorized);
    Ok(())
}

#[tokio::test]
async fn admin_from_flask_setup_script_can_log_in() -> Result<()> {
    let pool = util::memory_pool().await;
    // werkzeug 3 `generate_password_hash("correct horse", "scrypt:1024:8:1")`
    let stored = "scrypt:1024:8:1$bGdOdC6Q05hjHWUq$54e78456b3b6a402ef19d23138da14a0a6cef722471eab04ed2f097e1371e56bcbbd783942436d123fb806cf92a6d4f00bcecca82245b5be491dba4072485f35";
    sqlx::query("INSERT INTO users (username, password_hash, is_admin) VALUES ('admin', ?, 1)")
        .bind(stored)
        .execute(&pool)
        .await?;

    let user = authenticate(&pool, "admin", "correct horse").await?;
    assert!(user.is_admin);
    let err = authenticate(&pool, "admin", "wrong horse").await.expect_err("wrong password");
    assert_eq!(err.kind(), ErrorKind::Unauthorized);
    Ok(())
}

#[tokio::test]
async fn create_user_validates_and_conflicts() -> Result<()> {
    let pool = util::memory_pool().await;
    let err = create_user(&pool, "  ", "pw", false, ITERATIONS)
        .await
        .expect_err("blank username");
    assert_eq!(err.kind(), ErrorKind::Validation);
    let err = create_user(&pool, "admin", "", false, ITERATIONS)
        .await
        .expect_err("blank password");
    assert_eq!(err.kind(), ErrorKind::Validation);

    create_user(&pool, "admin", "pw", false, ITERATIONS).await?;
    let err = create_user(&pool, "admin", "other", true, ITERATIONS)
        .await
        .expect_err("duplicate");
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert!(find_user_by_username(&pool, "nobody").await?.is_none());
    Ok(())
}
