#![cfg(feature = "inmem-store")]

use laf::admin::{self, DEFAULT_ADMIN_EMAIL, DEFAULT_ADMIN_PASSWORD};
use laf::auth;
use laf::repo::{inmem::InMemRepo, AccountRepo};
use serial_test::serial;

fn repo() -> InMemRepo {
    std::env::set_var("LAF_DATA_DIR", tempfile::tempdir().unwrap().path());
    InMemRepo::new()
}

#[tokio::test]
#[serial]
async fn seeding_creates_the_admin_account_once() {
    let r = repo();
    admin::ensure_admin_seed(&r).await.unwrap();

    let acct = r
        .get_account(DEFAULT_ADMIN_EMAIL)
        .await
        .unwrap()
        .expect("seeded");
    assert_eq!(acct.username, "Admin");
    // the seeded record carries a real hash, usable by the normal login path
    assert!(auth::verify_password(DEFAULT_ADMIN_PASSWORD, &acct.password_hash).unwrap());

    // a second run leaves the store untouched
    admin::ensure_admin_seed(&r).await.unwrap();
    assert_eq!(r.list_accounts().await.unwrap().len(), 1);
}

#[test]
#[serial]
fn admin_pair_check_is_email_case_insensitive() {
    assert!(admin::verify_admin_credentials(
        "LAF@Admin.Com",
        DEFAULT_ADMIN_PASSWORD
    ));
    assert!(!admin::verify_admin_credentials(DEFAULT_ADMIN_EMAIL, "wrong"));
    assert!(!admin::verify_admin_credentials(
        "user@example.com",
        DEFAULT_ADMIN_PASSWORD
    ));
}
