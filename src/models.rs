use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// 12-byte record identifier, exchanged as a 24-character lowercase hex
/// string: 4 bytes of unix seconds, 5 bytes of per-process random, 3 bytes
/// of counter. Byte order makes ids roughly sortable by creation time.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Id([u8; 12]);

static PROCESS_RANDOM: Lazy<[u8; 5]> = Lazy::new(rand::random);
static COUNTER: Lazy<AtomicU32> = Lazy::new(|| AtomicU32::new(rand::random()));

impl Id {
    pub fn new() -> Self {
        let mut raw = [0u8; 12];
        raw[..4].copy_from_slice(&(Utc::now().timestamp() as u32).to_be_bytes());
        raw[4..9].copy_from_slice(&*PROCESS_RANDOM);
        let count = COUNTER.fetch_add(1, Ordering::Relaxed).to_be_bytes();
        raw[9..].copy_from_slice(&count[1..]);
        Self(raw)
    }
}

impl Default for Id {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("invalid id: expected 24 hex characters")]
pub struct ParseIdError;

impl FromStr for Id {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 24 {
            return Err(ParseIdError);
        }
        let bytes = hex::decode(s).map_err(|_| ParseIdError)?;
        let mut raw = [0u8; 12];
        raw.copy_from_slice(&bytes);
        Ok(Self(raw))
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({self})")
    }
}

impl Serialize for Id {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Id {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl<'s> utoipa::ToSchema<'s> for Id {
    fn schema() -> (
        &'s str,
        utoipa::openapi::RefOr<utoipa::openapi::schema::Schema>,
    ) {
        (
            "Id",
            utoipa::openapi::ObjectBuilder::new()
                .schema_type(utoipa::openapi::SchemaType::String)
                .description(Some("24-character hex record id"))
                .pattern(Some("^[0-9a-fA-F]{24}$"))
                .into(),
        )
    }
}

// Ids live in TEXT columns (TEXT[] for the ownership index) under the
// postgres-store backend.
impl sqlx::Type<sqlx::Postgres> for Id {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }
}

impl sqlx::postgres::PgHasArrayType for Id {
    fn array_type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::postgres::PgHasArrayType>::array_type_info()
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Postgres> for Id {
    fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
        <String as sqlx::Encode<'q, sqlx::Postgres>>::encode(self.to_string(), buf)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Id {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<'r, sqlx::Postgres>>::decode(value)?;
        Ok(s.parse()?)
    }
}

/// Stored account record. `password_hash` stays internal: API responses go
/// through [`AccountResponse`], which drops it.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Account {
    pub id: Id,
    pub username: String,
    /// Login key; unique per lowercased value.
    pub email: String,
    pub password_hash: String,
    pub phone: String,
    pub created_at: DateTime<Utc>,
    /// Secondary index over reports filed by this account (ids only).
    pub report_ids: Vec<Id>,
}

/// Repo-level input for account creation. The password arrives already
/// hashed; plaintext never reaches the store.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub phone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccountResponse {
    pub id: Id,
    pub username: String,
    pub email: String,
    pub phone: String,
    pub created_at: DateTime<Utc>,
    pub report_ids: Vec<Id>,
}

impl From<Account> for AccountResponse {
    fn from(a: Account) -> Self {
        Self {
            id: a.id,
            username: a.username,
            email: a.email,
            phone: a.phone,
            created_at: a.created_at,
            report_ids: a.report_ids,
        }
    }
}

/// A single lost/found item submission.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: Id,
    /// Expected values "lost" or "found"; stored as an open string.
    pub item_type: String,
    pub item_name: String,
    pub item_category: String,
    pub item_location: String,
    pub item_date: String,
    pub item_description: String,
    /// Base64 image payload, optionally with a `data:...;base64,` prefix.
    /// Empty string means no photo.
    pub item_photo: String,
    /// Filer's email, normalized at submission. Denormalized copy; the
    /// ownership index on the account is authoritative.
    pub email: String,
    pub phone: String,
    pub created_at: DateTime<Utc>,
}

/// Input record for report submission. Full-replace updates reuse it since
/// every descriptive field is overwritten anyway. Missing JSON fields fall
/// back to empty strings, matching the permissive wire format the web
/// client relies on.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct NewReport {
    pub item_type: String,
    pub item_name: String,
    pub item_category: String,
    pub item_location: String,
    pub item_date: String,
    pub item_description: String,
    pub item_photo: String,
    pub email: String,
    pub phone: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub phone: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub token: String,
    pub email: String,
    pub username: String,
    pub is_admin: bool,
}

/// Per-category report counts for the stats endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct CategoryCount {
    pub category: String,
    pub count: i64,
}
