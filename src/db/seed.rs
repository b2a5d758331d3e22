use crate::db;
use crate::domain::models::AccountRole;
use anyhow::Result;
use sqlx::PgPool;

/// Bootstrap the first sys-admin account so a fresh deployment can log in
/// and approve surveys. No-op once any account exists.
pub async fn seed_admin(pool: &PgPool) -> Result<()> {
    if db::count_accounts(pool).await? > 0 {
        return Ok(());
    }

    let email =
        std::env::var("SEED_ADMIN_EMAIL").unwrap_or_else(|_| "admin@fullcircle.local".to_string());
    let password = std::env::var("SEED_ADMIN_PASSWORD").unwrap_or_else(|_| "changeme".to_string());

    let hash = db::hash_password(&password)?;
    db::create_account(pool, &email, &hash, "System Administrator", AccountRole::SysAdmin).await?;
    tracing::info!("Seeded initial sys admin account: {email}");
    Ok(())
}
