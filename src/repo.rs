use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::Utc;

use crate::models::*;

#[derive(thiserror::Error, Debug)]
pub enum RepoError {
    #[error("not found")] NotFound,
    #[error("conflict")] Conflict,
    #[error("malformed id")] BadId,
    #[error("internal: {0}")] Internal(String),
}

pub type RepoResult<T> = Result<T, RepoError>;

use async_trait::async_trait;

#[async_trait]
pub trait AccountRepo: Send + Sync {
    /// Insert a new account. `Conflict` when the normalized email is taken.
    async fn create_account(&self, new: NewAccount) -> RepoResult<Account>;
    /// Lookup by email, case-insensitive. `Ok(None)` when absent.
    async fn get_account(&self, email: &str) -> RepoResult<Option<Account>>;
    async fn list_accounts(&self) -> RepoResult<Vec<Account>>;
    /// Append a report id to the account's ownership index.
    async fn link_report(&self, email: &str, report_id: Id) -> RepoResult<()>;
    /// Remove a report id from the index. `Ok(false)` when the account or
    /// the entry is missing; deletion flows tolerate that.
    async fn unlink_report(&self, email: &str, report_id: Id) -> RepoResult<bool>;
}

#[async_trait]
pub trait ReportRepo: Send + Sync {
    /// Persist a submission, assigning id and created_at.
    async fn create_report(&self, new: NewReport) -> RepoResult<Report>;
    async fn get_report(&self, id: Id) -> RepoResult<Report>;
    /// All reports, newest first.
    async fn list_reports(&self) -> RepoResult<Vec<Report>>;
    async fn latest_reports(&self, limit: usize) -> RepoResult<Vec<Report>>;
    /// Case-insensitive substring match on item name, newest first.
    async fn search_reports(&self, name: &str) -> RepoResult<Vec<Report>>;
    /// Reports whose denormalized filer email matches, newest first.
    async fn reports_by_email(&self, email: &str) -> RepoResult<Vec<Report>>;
    /// Bulk fetch by id; missing ids are skipped, not errors.
    async fn reports_by_ids(&self, ids: &[Id]) -> RepoResult<Vec<Report>>;
    /// Full-field replace, except the stored photo survives when the
    /// incoming one is empty or identical. id and created_at are immutable.
    async fn update_report(&self, id: Id, upd: NewReport) -> RepoResult<Report>;
    async fn delete_report(&self, id: Id) -> RepoResult<()>;
    /// Report count per non-empty category.
    async fn category_stats(&self) -> RepoResult<Vec<CategoryCount>>;
}

pub trait Repo: AccountRepo + ReportRepo {}

impl<T> Repo for T where T: AccountRepo + ReportRepo {}

#[cfg(feature = "inmem-store")]
pub mod inmem {
    use super::*;
    use serde::{Deserialize, Serialize};
    use std::path::{Path, PathBuf};

    const SNAPSHOT_PATH: &str = "data/state.json";

    #[derive(Default, Serialize, Deserialize)]
    struct State {
        /// Keyed by lower-cased email.
        accounts: HashMap<String, Account>,
        reports: HashMap<Id, Report>,
    }

    #[derive(Clone)]
    pub struct InMemRepo {
        state: Arc<RwLock<State>>,
        snapshot_path: Arc<PathBuf>,
    }

    impl InMemRepo {
        fn data_dir() -> PathBuf {
            std::env::var("LAF_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("data"))
        }

        fn snapshot_path() -> PathBuf {
            if std::env::var("LAF_DATA_DIR").is_ok() {
                let mut p = Self::data_dir();
                p.push("state.json");
                p
            } else {
                PathBuf::from(SNAPSHOT_PATH)
            }
        }

        fn load_state_from(path: &Path) -> State {
            match std::fs::read(path) {
                Ok(bytes) => match serde_json::from_slice::<State>(&bytes) {
                    Ok(s) => {
                        eprintln!("[inmem] Loaded snapshot '{}'", path.display());
                        s
                    }
                    Err(e) => {
                        eprintln!(
                            "[inmem] Failed to parse snapshot '{}': {e}. Starting empty.",
                            path.display()
                        );
                        State::default()
                    }
                },
                Err(e) => {
                    eprintln!("[inmem] No snapshot at '{}': {e}. Starting empty.", path.display());
                    State::default()
                }
            }
        }

        fn persist(&self) {
            let path = self.snapshot_path.clone();
            if let Ok(s) = serde_json::to_vec_pretty(&*self.state.read().unwrap()) {
                if let Some(dir) = path.parent() {
                    let _ = std::fs::create_dir_all(dir);
                }
                if let Err(e) = std::fs::write(&*path, s) {
                    eprintln!("[inmem] Failed to write snapshot '{}': {e}", path.display());
                }
            }
        }

        pub fn new() -> Self {
            let snapshot_path = Self::snapshot_path();
            let state = Self::load_state_from(&snapshot_path);
            Self {
                state: Arc::new(RwLock::new(state)),
                snapshot_path: Arc::new(snapshot_path),
            }
        }
    }

    impl Default for InMemRepo {
        fn default() -> Self {
            Self::new()
        }
    }

    fn newest_first(v: &mut [Report]) {
        v.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    }

    #[async_trait]
    impl AccountRepo for InMemRepo {
        async fn create_account(&self, new: NewAccount) -> RepoResult<Account> {
            let mut s = self.state.write().unwrap();
            let key = new.email.to_lowercase();
            if s.accounts.contains_key(&key) {
                return Err(RepoError::Conflict);
            }
            let account = Account {
                id: Id::new(),
                username: new.username,
                email: new.email,
                password_hash: new.password_hash,
                phone: new.phone,
                created_at: Utc::now(),
                report_ids: Vec::new(),
            };
            s.accounts.insert(key, account.clone());
            drop(s);
            self.persist();
            Ok(account)
        }

        async fn get_account(&self, email: &str) -> RepoResult<Option<Account>> {
            let s = self.state.read().unwrap();
            Ok(s.accounts.get(&email.to_lowercase()).cloned())
        }

        async fn list_accounts(&self) -> RepoResult<Vec<Account>> {
            let s = self.state.read().unwrap();
            let mut v: Vec<_> = s.accounts.values().cloned().collect();
            v.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.email.cmp(&b.email)));
            Ok(v)
        }

        async fn link_report(&self, email: &str, report_id: Id) -> RepoResult<()> {
            let mut s = self.state.write().unwrap();
            let account = s
                .accounts
                .get_mut(&email.to_lowercase())
                .ok_or(RepoError::NotFound)?;
            account.report_ids.push(report_id);
            drop(s);
            self.persist();
            Ok(())
        }

        async fn unlink_report(&self, email: &str, report_id: Id) -> RepoResult<bool> {
            let mut s = self.state.write().unwrap();
            let Some(account) = s.accounts.get_mut(&email.to_lowercase()) else {
                return Ok(false);
            };
            let before = account.report_ids.len();
            account.report_ids.retain(|id| *id != report_id);
            let removed = account.report_ids.len() != before;
            drop(s);
            if removed {
                self.persist();
            }
            Ok(removed)
        }
    }

    #[async_trait]
    impl ReportRepo for InMemRepo {
        async fn create_report(&self, new: NewReport) -> RepoResult<Report> {
            let mut s = self.state.write().unwrap();
            let report = Report {
                id: Id::new(),
                item_type: new.item_type,
                item_name: new.item_name,
                item_category: new.item_category,
                item_location: new.item_location,
                item_date: new.item_date,
                item_description: new.item_description,
                item_photo: new.item_photo,
                email: new.email,
                phone: new.phone,
                created_at: Utc::now(),
            };
            s.reports.insert(report.id, report.clone());
            drop(s);
            self.persist();
            Ok(report)
        }

        async fn get_report(&self, id: Id) -> RepoResult<Report> {
            let s = self.state.read().unwrap();
            s.reports.get(&id).cloned().ok_or(RepoError::NotFound)
        }

        async fn list_reports(&self) -> RepoResult<Vec<Report>> {
            let s = self.state.read().unwrap();
            let mut v: Vec<_> = s.reports.values().cloned().collect();
            newest_first(&mut v);
            Ok(v)
        }

        async fn latest_reports(&self, limit: usize) -> RepoResult<Vec<Report>> {
            let mut v = self.list_reports().await?;
            v.truncate(limit);
            Ok(v)
        }

        async fn search_reports(&self, name: &str) -> RepoResult<Vec<Report>> {
            let needle = name.to_lowercase();
            let s = self.state.read().unwrap();
            let mut v: Vec<_> = s
                .reports
                .values()
                .filter(|r| r.item_name.to_lowercase().contains(&needle))
                .cloned()
                .collect();
            newest_first(&mut v);
            Ok(v)
        }

        async fn reports_by_email(&self, email: &str) -> RepoResult<Vec<Report>> {
            let s = self.state.read().unwrap();
            let mut v: Vec<_> = s
                .reports
                .values()
                .filter(|r| r.email.eq_ignore_ascii_case(email))
                .cloned()
                .collect();
            newest_first(&mut v);
            Ok(v)
        }

        async fn reports_by_ids(&self, ids: &[Id]) -> RepoResult<Vec<Report>> {
            let s = self.state.read().unwrap();
            Ok(ids.iter().filter_map(|id| s.reports.get(id).cloned()).collect())
        }

        async fn update_report(&self, id: Id, upd: NewReport) -> RepoResult<Report> {
            let mut s = self.state.write().unwrap();
            let report = s.reports.get_mut(&id).ok_or(RepoError::NotFound)?;
            report.item_type = upd.item_type;
            report.item_name = upd.item_name;
            report.item_category = upd.item_category;
            report.item_location = upd.item_location;
            report.item_date = upd.item_date;
            report.item_description = upd.item_description;
            report.email = upd.email;
            report.phone = upd.phone;
            // keep the stored photo unless a different, non-empty one arrives
            if !upd.item_photo.is_empty() && upd.item_photo != report.item_photo {
                report.item_photo = upd.item_photo;
            }
            let updated = report.clone();
            drop(s);
            self.persist();
            Ok(updated)
        }

        async fn delete_report(&self, id: Id) -> RepoResult<()> {
            let mut s = self.state.write().unwrap();
            if s.reports.remove(&id).is_none() {
                return Err(RepoError::NotFound);
            }
            drop(s);
            self.persist();
            Ok(())
        }

        async fn category_stats(&self) -> RepoResult<Vec<CategoryCount>> {
            let s = self.state.read().unwrap();
            let mut counts: HashMap<String, i64> = HashMap::new();
            for r in s.reports.values() {
                if !r.item_category.is_empty() {
                    *counts.entry(r.item_category.clone()).or_insert(0) += 1;
                }
            }
            let mut v: Vec<_> = counts
                .into_iter()
                .map(|(category, count)| CategoryCount { category, count })
                .collect();
            v.sort_by(|a, b| a.category.cmp(&b.category));
            Ok(v)
        }
    }
}

// Postgres implementation (feature = "postgres-store")
#[cfg(feature = "postgres-store")]
pub mod pg {
    use super::*;
    use sqlx::{Pool, Postgres};

    #[derive(Clone)]
    pub struct PgRepo {
        pool: Pool<Postgres>,
    }

    impl PgRepo {
        pub fn new(pool: Pool<Postgres>) -> Self {
            Self { pool }
        }
    }

    fn map_sqlx(e: sqlx::Error) -> RepoError {
        match &e {
            sqlx::Error::RowNotFound => RepoError::NotFound,
            sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
                RepoError::Conflict
            }
            _ => RepoError::Internal(e.to_string()),
        }
    }

    // ILIKE pattern metacharacters in user input match literally
    fn escape_like(s: &str) -> String {
        s.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
    }

    const REPORT_COLS: &str =
        "id, item_type, item_name, item_category, item_location, item_date, \
         item_description, item_photo, email, phone, created_at";

    #[async_trait]
    impl AccountRepo for PgRepo {
        async fn create_account(&self, new: NewAccount) -> RepoResult<Account> {
            let account = sqlx::query_as::<_, Account>(
                "INSERT INTO accounts (id, username, email, password_hash, phone, report_ids) \
                 VALUES ($1, $2, $3, $4, $5, '{}') \
                 RETURNING id, username, email, password_hash, phone, created_at, report_ids",
            )
            .bind(Id::new())
            .bind(&new.username)
            .bind(&new.email)
            .bind(&new.password_hash)
            .bind(&new.phone)
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx)?;
            Ok(account)
        }

        async fn get_account(&self, email: &str) -> RepoResult<Option<Account>> {
            let account = sqlx::query_as::<_, Account>(
                "SELECT id, username, email, password_hash, phone, created_at, report_ids \
                 FROM accounts WHERE LOWER(email) = LOWER($1)",
            )
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;
            Ok(account)
        }

        async fn list_accounts(&self) -> RepoResult<Vec<Account>> {
            let accounts = sqlx::query_as::<_, Account>(
                "SELECT id, username, email, password_hash, phone, created_at, report_ids \
                 FROM accounts ORDER BY created_at, email",
            )
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx)?;
            Ok(accounts)
        }

        async fn link_report(&self, email: &str, report_id: Id) -> RepoResult<()> {
            let res = sqlx::query(
                "UPDATE accounts SET report_ids = array_append(report_ids, $2) \
                 WHERE LOWER(email) = LOWER($1)",
            )
            .bind(email)
            .bind(report_id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;
            if res.rows_affected() == 0 {
                return Err(RepoError::NotFound);
            }
            Ok(())
        }

        async fn unlink_report(&self, email: &str, report_id: Id) -> RepoResult<bool> {
            let res = sqlx::query(
                "UPDATE accounts SET report_ids = array_remove(report_ids, $2) \
                 WHERE LOWER(email) = LOWER($1) AND $2 = ANY(report_ids)",
            )
            .bind(email)
            .bind(report_id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;
            Ok(res.rows_affected() > 0)
        }
    }

    #[async_trait]
    impl ReportRepo for PgRepo {
        async fn create_report(&self, new: NewReport) -> RepoResult<Report> {
            let sql = format!(
                "INSERT INTO reports (id, item_type, item_name, item_category, item_location, \
                 item_date, item_description, item_photo, email, phone) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING {REPORT_COLS}"
            );
            let report = sqlx::query_as::<_, Report>(&sql)
                .bind(Id::new())
                .bind(&new.item_type)
                .bind(&new.item_name)
                .bind(&new.item_category)
                .bind(&new.item_location)
                .bind(&new.item_date)
                .bind(&new.item_description)
                .bind(&new.item_photo)
                .bind(&new.email)
                .bind(&new.phone)
                .fetch_one(&self.pool)
                .await
                .map_err(map_sqlx)?;
            Ok(report)
        }

        async fn get_report(&self, id: Id) -> RepoResult<Report> {
            let sql = format!("SELECT {REPORT_COLS} FROM reports WHERE id = $1");
            let report = sqlx::query_as::<_, Report>(&sql)
                .bind(id)
                .fetch_one(&self.pool)
                .await
                .map_err(map_sqlx)?;
            Ok(report)
        }

        async fn list_reports(&self) -> RepoResult<Vec<Report>> {
            let sql = format!(
                "SELECT {REPORT_COLS} FROM reports ORDER BY created_at DESC, id DESC"
            );
            let reports = sqlx::query_as::<_, Report>(&sql)
                .fetch_all(&self.pool)
                .await
                .map_err(map_sqlx)?;
            Ok(reports)
        }

        async fn latest_reports(&self, limit: usize) -> RepoResult<Vec<Report>> {
            let sql = format!(
                "SELECT {REPORT_COLS} FROM reports ORDER BY created_at DESC, id DESC LIMIT $1"
            );
            let reports = sqlx::query_as::<_, Report>(&sql)
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await
                .map_err(map_sqlx)?;
            Ok(reports)
        }

        async fn search_reports(&self, name: &str) -> RepoResult<Vec<Report>> {
            let sql = format!(
                "SELECT {REPORT_COLS} FROM reports WHERE item_name ILIKE $1 \
                 ORDER BY created_at DESC, id DESC"
            );
            let reports = sqlx::query_as::<_, Report>(&sql)
                .bind(format!("%{}%", escape_like(name)))
                .fetch_all(&self.pool)
                .await
                .map_err(map_sqlx)?;
            Ok(reports)
        }

        async fn reports_by_email(&self, email: &str) -> RepoResult<Vec<Report>> {
            let sql = format!(
                "SELECT {REPORT_COLS} FROM reports WHERE LOWER(email) = LOWER($1) \
                 ORDER BY created_at DESC, id DESC"
            );
            let reports = sqlx::query_as::<_, Report>(&sql)
                .bind(email)
                .fetch_all(&self.pool)
                .await
                .map_err(map_sqlx)?;
            Ok(reports)
        }

        async fn reports_by_ids(&self, ids: &[Id]) -> RepoResult<Vec<Report>> {
            let sql = format!(
                "SELECT {REPORT_COLS} FROM reports WHERE id = ANY($1) ORDER BY created_at, id"
            );
            let reports = sqlx::query_as::<_, Report>(&sql)
                .bind(ids.to_vec())
                .fetch_all(&self.pool)
                .await
                .map_err(map_sqlx)?;
            Ok(reports)
        }

        async fn update_report(&self, id: Id, upd: NewReport) -> RepoResult<Report> {
            let sql = format!(
                "UPDATE reports SET item_type = $2, item_name = $3, item_category = $4, \
                 item_location = $5, item_date = $6, item_description = $7, \
                 item_photo = CASE WHEN $8 = '' THEN item_photo ELSE $8 END, \
                 email = $9, phone = $10 \
                 WHERE id = $1 RETURNING {REPORT_COLS}"
            );
            let report = sqlx::query_as::<_, Report>(&sql)
                .bind(id)
                .bind(&upd.item_type)
                .bind(&upd.item_name)
                .bind(&upd.item_category)
                .bind(&upd.item_location)
                .bind(&upd.item_date)
                .bind(&upd.item_description)
                .bind(&upd.item_photo)
                .bind(&upd.email)
                .bind(&upd.phone)
                .fetch_one(&self.pool)
                .await
                .map_err(map_sqlx)?;
            Ok(report)
        }

        async fn delete_report(&self, id: Id) -> RepoResult<()> {
            let res = sqlx::query("DELETE FROM reports WHERE id = $1")
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(map_sqlx)?;
            if res.rows_affected() == 0 {
                return Err(RepoError::NotFound);
            }
            Ok(())
        }

        async fn category_stats(&self) -> RepoResult<Vec<CategoryCount>> {
            let rows = sqlx::query_as::<_, CategoryCount>(
                "SELECT item_category AS category, COUNT(*) AS count FROM reports \
                 WHERE item_category <> '' GROUP BY item_category ORDER BY item_category",
            )
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx)?;
            Ok(rows)
        }
    }
}
