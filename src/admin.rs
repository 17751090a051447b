use crate::auth;
use crate::models::NewAccount;
use crate::repo::{Repo, RepoError, RepoResult};

/// Built-in administrative identity. The email/password pair can be
/// overridden through `LAF_ADMIN_EMAIL` / `LAF_ADMIN_PASSWORD`; username and
/// phone only matter for the seeded record.
pub const DEFAULT_ADMIN_EMAIL: &str = "laf@admin.com";
pub const DEFAULT_ADMIN_PASSWORD: &str = "admin@123";
const ADMIN_USERNAME: &str = "Admin";
const ADMIN_PHONE: &str = "9265379915";

pub fn admin_email() -> String {
    std::env::var("LAF_ADMIN_EMAIL")
        .unwrap_or_else(|_| DEFAULT_ADMIN_EMAIL.to_string())
        .to_lowercase()
}

fn admin_password() -> String {
    std::env::var("LAF_ADMIN_PASSWORD").unwrap_or_else(|_| DEFAULT_ADMIN_PASSWORD.to_string())
}

pub fn is_admin_email(email: &str) -> bool {
    email.to_lowercase() == admin_email()
}

/// Plaintext comparison against the fixed pair. This is a deliberate
/// privileged bootstrap path, separate from the argon2 verifier; admin login
/// additionally requires the seeded account to be present.
pub fn verify_admin_credentials(email: &str, password: &str) -> bool {
    is_admin_email(email) && password == admin_password()
}

/// Idempotent startup seeding: create the admin account when missing, leave
/// it untouched otherwise. A registration racing the seed is resolved by the
/// email uniqueness constraint; losing that race counts as seeded.
pub async fn ensure_admin_seed(repo: &dyn Repo) -> RepoResult<()> {
    let email = admin_email();
    if repo.get_account(&email).await?.is_some() {
        log::info!("admin account already present ({email})");
        return Ok(());
    }
    let password_hash =
        auth::hash_password(&admin_password()).map_err(|e| RepoError::Internal(e.to_string()))?;
    match repo
        .create_account(NewAccount {
            username: ADMIN_USERNAME.to_string(),
            email: email.clone(),
            password_hash,
            phone: ADMIN_PHONE.to_string(),
        })
        .await
    {
        Ok(_) => {
            log::info!("admin account seeded ({email})");
            Ok(())
        }
        Err(RepoError::Conflict) => Ok(()),
        Err(e) => Err(e),
    }
}
