use crate::admin;
use crate::models::{Id, NewReport, Report};
use crate::repo::{Repo, RepoError, RepoResult};

/// Keeps the account-side report index consistent with the report store and
/// enforces the duplicate-submission policy.
pub struct OwnershipManager<'a> {
    repo: &'a dyn Repo,
}

/// Content-level duplicate: name, category and location match
/// case-insensitively, date matches exactly.
fn is_duplicate(existing: &Report, candidate: &NewReport) -> bool {
    existing.item_name.to_lowercase() == candidate.item_name.to_lowercase()
        && existing.item_category.to_lowercase() == candidate.item_category.to_lowercase()
        && existing.item_location.to_lowercase() == candidate.item_location.to_lowercase()
        && existing.item_date == candidate.item_date
}

impl<'a> OwnershipManager<'a> {
    pub fn new(repo: &'a dyn Repo) -> Self {
        Self { repo }
    }

    /// File a report under `email`. `Ok(None)` covers both "duplicate" and
    /// "no such account"; the API surfaces them as a single 409.
    pub async fn add_entry(&self, mut new: NewReport, email: &str) -> RepoResult<Option<Report>> {
        let email = email.trim().to_lowercase();
        new.email = email.clone();

        // Admin submissions skip account bookkeeping and the duplicate check.
        if admin::is_admin_email(&email) {
            let report = self.repo.create_report(new).await?;
            log::info!("admin report saved: {}", report.id);
            return Ok(Some(report));
        }

        let Some(account) = self.repo.get_account(&email).await? else {
            return Ok(None);
        };

        // Scan the account's own filings; ids dangling after a partial
        // delete are skipped by reports_by_ids. The scan and the append are
        // separate repo calls, so two concurrent identical submissions can
        // both pass.
        let existing = self.repo.reports_by_ids(&account.report_ids).await?;
        if existing.iter().any(|r| is_duplicate(r, &new)) {
            return Ok(None);
        }

        let report = self.repo.create_report(new).await?;
        self.repo.link_report(&email, report.id).await?;
        Ok(Some(report))
    }

    /// Delete by raw id string. Malformed input is `BadId`, distinct from
    /// `NotFound`. The owner's index entry is detached first; a missing
    /// owner account never blocks deletion of the report itself.
    pub async fn delete_report_by_id(&self, raw_id: &str) -> RepoResult<()> {
        let id: Id = raw_id.parse().map_err(|_| RepoError::BadId)?;
        let report = self.repo.get_report(id).await?;
        self.repo.unlink_report(&report.email, id).await?;
        self.repo.delete_report(id).await
    }
}
