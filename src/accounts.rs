use crate::admin;
use crate::auth;
use crate::models::{Account, NewAccount, RegisterRequest};
use crate::repo::{Repo, RepoError, RepoResult};

/// Registration and login flows over the account store.
pub struct AccountService<'a> {
    repo: &'a dyn Repo,
}

impl<'a> AccountService<'a> {
    pub fn new(repo: &'a dyn Repo) -> Self {
        Self { repo }
    }

    /// Normalize the email, reject duplicates, hash the password, persist.
    /// The uniqueness constraint in the store is the tie-breaker for
    /// registrations racing each other (or the admin seed).
    pub async fn register(&self, req: RegisterRequest) -> RepoResult<Account> {
        let email = req.email.trim().to_lowercase();
        if self.repo.get_account(&email).await?.is_some() {
            return Err(RepoError::Conflict);
        }
        let password_hash =
            auth::hash_password(&req.password).map_err(|e| RepoError::Internal(e.to_string()))?;
        self.repo
            .create_account(NewAccount {
                username: req.username,
                email,
                password_hash,
                phone: req.phone,
            })
            .await
    }

    /// Unknown email and wrong password both come back as `Ok(None)`;
    /// callers must not be able to tell them apart.
    pub async fn authenticate(&self, email: &str, password: &str) -> RepoResult<Option<Account>> {
        let Some(account) = self.repo.get_account(&email.to_lowercase()).await? else {
            return Ok(None);
        };
        match auth::verify_password(password, &account.password_hash) {
            Ok(true) => Ok(Some(account)),
            Ok(false) => Ok(None),
            Err(e) => Err(RepoError::Internal(e.to_string())),
        }
    }

    /// Fixed-pair admin login. Succeeds only when the pair matches AND the
    /// seeded admin account exists; any failure is the same `Ok(None)` as a
    /// regular bad login.
    pub async fn authenticate_admin(
        &self,
        email: &str,
        password: &str,
    ) -> RepoResult<Option<Account>> {
        if !admin::verify_admin_credentials(email, password) {
            return Ok(None);
        }
        self.repo.get_account(&admin::admin_email()).await
    }
}
