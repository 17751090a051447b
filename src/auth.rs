use actix_web::{dev::Payload, Error, FromRequest, HttpRequest};
use actix_web_httpauth::extractors::bearer::BearerAuth;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::env;
use std::future::{ready, Ready};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Normalized email of the authenticated account.
    pub sub: String,
    pub exp: usize,
    pub roles: Vec<Role>,
}

impl Claims {
    pub fn is_admin(&self) -> bool {
        self.roles.contains(&Role::Admin)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    /// Stored hash does not parse; data corruption, not a login failure.
    #[error("malformed password hash")]
    MalformedHash,
    #[error("password hashing failed")]
    Hash,
}

/// Salted one-way hash in PHC string form.
pub fn hash_password(plain: &str) -> Result<String, CredentialError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|_| CredentialError::Hash)
}

/// `Ok(false)` on mismatch; errors only for unparseable stored hashes.
pub fn verify_password(plain: &str, stored: &str) -> Result<bool, CredentialError> {
    let parsed = PasswordHash::new(stored).map_err(|_| CredentialError::MalformedHash)?;
    match Argon2::default().verify_password(plain.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(_) => Err(CredentialError::MalformedHash),
    }
}

/// Validate a JWT and return its claims.
fn decode_jwt(token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let secret = env::var("JWT_SECRET").expect("JWT_SECRET not set");
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )?;
    Ok(data.claims)
}

/// Extractor yielding validated `Claims`.
pub struct Auth(pub Claims);

impl FromRequest for Auth {
    type Error = Error;
    type Future = Ready<Result<Self, Error>>;

    fn from_request(req: &HttpRequest, pl: &mut Payload) -> Self::Future {
        // Delegate to BearerAuth to parse the header.
        if let Ok(bearer) = BearerAuth::from_request(req, pl).into_inner() {
            match decode_jwt(bearer.token()) {
                Ok(claims) => return ready(Ok(Auth(claims))),
                Err(_) => return ready(Err(actix_web::error::ErrorUnauthorized("Invalid JWT"))),
            }
        }
        ready(Err(actix_web::error::ErrorUnauthorized(
            "Authorization required",
        )))
    }
}

/// Create a JWT bound to an account email, valid for 24 hours.
pub fn create_jwt(email: &str, roles: Vec<Role>) -> Result<String, jsonwebtoken::errors::Error> {
    let secret = env::var("JWT_SECRET").expect("JWT_SECRET not set");
    let expiration = chrono::Utc::now()
        .checked_add_signed(chrono::Duration::hours(24))
        .expect("valid timestamp")
        .timestamp() as usize;

    let claims = Claims {
        sub: email.to_lowercase(),
        exp: expiration,
        roles,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}
