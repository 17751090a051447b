use std::collections::BTreeMap;
use std::sync::Arc;

use actix_web::{web, HttpRequest, HttpResponse};
use base64::Engine as _;
use serde::Serialize;
use utoipa::ToSchema;

use crate::accounts::AccountService;
use crate::admin;
use crate::auth::{self, Auth, Role};
use crate::error::ApiError;
use crate::models::*;
use crate::ownership::OwnershipManager;
use crate::rate_limit::RateLimiterFacade;
use crate::repo::{Repo, RepoError};

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .service(web::resource("/auth/register").route(web::post().to(register)))
            .service(web::resource("/auth/login").route(web::post().to(login)))
            .service(web::resource("/auth/admin-login").route(web::post().to(admin_login)))
            .service(web::resource("/auth/me").route(web::get().to(auth_me)))
            .service(web::resource("/accounts").route(web::get().to(list_accounts)))
            .service(
                web::resource("/accounts/{email}/reports")
                    .route(web::get().to(account_reports))
                    .route(web::post().to(submit_report)),
            )
            .service(web::resource("/accounts/{email}").route(web::get().to(get_account)))
            .service(web::resource("/reports").route(web::get().to(list_reports)))
            // literal report paths stay registered ahead of /reports/{id}
            .service(web::resource("/reports/latest").route(web::get().to(latest_reports)))
            .service(web::resource("/reports/search").route(web::get().to(search_reports)))
            .service(
                web::resource("/reports/category-stats").route(web::get().to(category_stats)),
            )
            .service(
                web::resource("/reports/{id}")
                    .route(web::get().to(get_report))
                    .route(web::put().to(update_report))
                    .route(web::delete().to(delete_report)),
            ),
    );
}

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn Repo>,
    /// `None` disables rate limiting (tests).
    pub rate_limiter: Option<RateLimiterFacade>,
}

fn client_ip(req: &HttpRequest) -> String {
    req.peer_addr()
        .map(|a| a.ip().to_string())
        .unwrap_or_else(|| "unknown".into())
}

/// Page size for the home screen's latest-reports grid.
const LATEST_LIMIT: usize = 16;

const PHOTO_SIZE_LIMIT: usize = 10 * 1024 * 1024; // 10 MB decoded

const ALLOWED_PHOTO_MIME: &[&str] = &["image/png", "image/jpeg", "image/gif", "image/webp"];

/// Photos arrive as base64 strings, usually with the `data:<mime>;base64,`
/// prefix browsers produce. Empty string means "no photo" and passes. The
/// string itself is stored untouched; validation only decodes a scratch
/// copy to bound the size and sniff the format.
fn validate_photo(photo: &str) -> Result<(), ApiError> {
    if photo.is_empty() {
        return Ok(());
    }
    let b64 = match photo.strip_prefix("data:") {
        Some(rest) => rest.split_once(',').map(|(_, d)| d).unwrap_or(rest),
        None => photo,
    };
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(b64)
        .map_err(|_| ApiError::UnsupportedPhoto)?;
    if bytes.len() > PHOTO_SIZE_LIMIT {
        return Err(ApiError::PhotoTooLarge);
    }
    let mime = infer::get(&bytes)
        .map(|t| t.mime_type().to_string())
        .unwrap_or_else(|| "application/octet-stream".into());
    if !ALLOWED_PHOTO_MIME.contains(&mime.as_str()) {
        return Err(ApiError::UnsupportedPhoto);
    }
    Ok(())
}

fn auth_success(account: Account) -> Result<HttpResponse, ApiError> {
    let is_admin = admin::is_admin_email(&account.email);
    let roles = if is_admin {
        vec![Role::User, Role::Admin]
    } else {
        vec![Role::User]
    };
    let token = auth::create_jwt(&account.email, roles).map_err(|_| ApiError::Internal)?;
    Ok(HttpResponse::Ok().json(AuthResponse {
        token,
        email: account.email,
        username: account.username,
        is_admin,
    }))
}

// ---------------- auth -----------------------------------------------

#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = AccountResponse),
        (status = 409, description = "Email already registered"),
        (status = 429, description = "Too many requests")
    )
)]
pub async fn register(
    req: HttpRequest,
    data: web::Data<AppState>,
    payload: web::Json<RegisterRequest>,
) -> Result<HttpResponse, ApiError> {
    if let Some(rl) = &data.rate_limiter {
        if !rl.allow_register(&client_ip(&req)) {
            return Err(ApiError::TooManyRequests);
        }
    }
    let account = AccountService::new(data.repo.as_ref())
        .register(payload.into_inner())
        .await
        .map_err(|e| match e {
            RepoError::Conflict => ApiError::EmailTaken,
            other => other.into(),
        })?;
    log::info!("account registered: {}", account.email);
    Ok(HttpResponse::Created().json(AccountResponse::from(account)))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Authenticated", body = AuthResponse),
        (status = 401, description = "Invalid email or password"),
        (status = 429, description = "Too many requests")
    )
)]
pub async fn login(
    req: HttpRequest,
    data: web::Data<AppState>,
    payload: web::Json<LoginRequest>,
) -> Result<HttpResponse, ApiError> {
    if let Some(rl) = &data.rate_limiter {
        if !rl.allow_login(&client_ip(&req)) {
            return Err(ApiError::TooManyRequests);
        }
    }
    let LoginRequest { email, password } = payload.into_inner();
    let account = AccountService::new(data.repo.as_ref())
        .authenticate(&email, &password)
        .await?
        .ok_or(ApiError::InvalidCredentials)?;
    auth_success(account)
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/admin-login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Admin authenticated", body = AuthResponse),
        (status = 401, description = "Invalid admin credentials"),
        (status = 429, description = "Too many requests")
    )
)]
pub async fn admin_login(
    req: HttpRequest,
    data: web::Data<AppState>,
    payload: web::Json<LoginRequest>,
) -> Result<HttpResponse, ApiError> {
    if let Some(rl) = &data.rate_limiter {
        if !rl.allow_login(&client_ip(&req)) {
            return Err(ApiError::TooManyRequests);
        }
    }
    let LoginRequest { email, password } = payload.into_inner();
    let account = AccountService::new(data.repo.as_ref())
        .authenticate_admin(&email, &password)
        .await?
        .ok_or(ApiError::InvalidCredentials)?;
    auth_success(account)
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MeResponse {
    pub email: String,
    pub role: String,
}

#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    responses(
        (status = 200, description = "Current account info", body = MeResponse),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn auth_me(auth: Auth) -> Result<HttpResponse, ApiError> {
    let role = if auth.0.is_admin() { "admin" } else { "user" };
    Ok(HttpResponse::Ok().json(MeResponse {
        email: auth.0.sub.clone(),
        role: role.to_string(),
    }))
}

// ---------------- accounts -------------------------------------------

#[utoipa::path(
    get,
    path = "/api/v1/accounts",
    responses(
        (status = 200, description = "All accounts", body = [AccountResponse]),
        (status = 403, description = "Forbidden - Admins only")
    )
)]
pub async fn list_accounts(
    auth: Auth,
    data: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    if !auth.0.is_admin() {
        return Err(ApiError::Forbidden);
    }
    let accounts = data.repo.list_accounts().await?;
    let out: Vec<AccountResponse> = accounts.into_iter().map(Into::into).collect();
    Ok(HttpResponse::Ok().json(out))
}

#[utoipa::path(
    get,
    path = "/api/v1/accounts/{email}",
    params(("email" = String, Path, description = "Account email")),
    responses(
        (status = 200, description = "Account", body = AccountResponse),
        (status = 404, description = "Account not found")
    )
)]
pub async fn get_account(
    _auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let account = data
        .repo
        .get_account(&path.into_inner())
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(HttpResponse::Ok().json(AccountResponse::from(account)))
}

#[utoipa::path(
    get,
    path = "/api/v1/accounts/{email}/reports",
    params(("email" = String, Path, description = "Filer email")),
    responses(
        (status = 200, description = "Reports filed under this email", body = [Report])
    )
)]
pub async fn account_reports(
    _auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let reports = data.repo.reports_by_email(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(reports))
}

#[utoipa::path(
    post,
    path = "/api/v1/accounts/{email}/reports",
    request_body = NewReport,
    params(("email" = String, Path, description = "Filer email")),
    responses(
        (status = 201, description = "Report filed", body = Report),
        (status = 400, description = "Blank email"),
        (status = 409, description = "Duplicate report or unknown account"),
        (status = 413, description = "Photo too large"),
        (status = 415, description = "Unsupported photo format"),
        (status = 429, description = "Too many requests")
    )
)]
pub async fn submit_report(
    req: HttpRequest,
    _auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<NewReport>,
) -> Result<HttpResponse, ApiError> {
    if let Some(rl) = &data.rate_limiter {
        if !rl.allow_report(&client_ip(&req)) {
            return Err(ApiError::TooManyRequests);
        }
    }
    let email = path.into_inner();
    if email.trim().is_empty() {
        return Err(ApiError::BadRequest);
    }
    validate_photo(&payload.item_photo)?;
    let report = OwnershipManager::new(data.repo.as_ref())
        .add_entry(payload.into_inner(), &email)
        .await?
        .ok_or(ApiError::ReportNotAdded)?;
    Ok(HttpResponse::Created().json(report))
}

// ---------------- reports --------------------------------------------

#[utoipa::path(
    get,
    path = "/api/v1/reports",
    responses((status = 200, description = "All reports, newest first", body = [Report]))
)]
pub async fn list_reports(data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let reports = data.repo.list_reports().await?;
    Ok(HttpResponse::Ok().json(reports))
}

#[utoipa::path(
    get,
    path = "/api/v1/reports/latest",
    responses((status = 200, description = "Most recent reports", body = [Report]))
)]
pub async fn latest_reports(data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let reports = data.repo.latest_reports(LATEST_LIMIT).await?;
    Ok(HttpResponse::Ok().json(reports))
}

#[derive(Debug, serde::Deserialize)]
pub struct SearchQuery {
    name: String,
}

#[utoipa::path(
    get,
    path = "/api/v1/reports/search",
    params(("name" = String, Query, description = "Item name fragment, case-insensitive")),
    responses((status = 200, description = "Matching reports", body = [Report]))
)]
pub async fn search_reports(
    data: web::Data<AppState>,
    query: web::Query<SearchQuery>,
) -> Result<HttpResponse, ApiError> {
    let reports = data.repo.search_reports(&query.name).await?;
    Ok(HttpResponse::Ok().json(reports))
}

#[utoipa::path(
    get,
    path = "/api/v1/reports/category-stats",
    responses((status = 200, description = "Report count per category", body = Object))
)]
pub async fn category_stats(data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let rows = data.repo.category_stats().await?;
    let stats: BTreeMap<String, i64> = rows.into_iter().map(|c| (c.category, c.count)).collect();
    Ok(HttpResponse::Ok().json(stats))
}

#[utoipa::path(
    get,
    path = "/api/v1/reports/{id}",
    params(("id" = String, Path, description = "Report id (24 hex chars)")),
    responses(
        (status = 200, description = "Report", body = Report),
        (status = 400, description = "Invalid id format"),
        (status = 404, description = "Report not found")
    )
)]
pub async fn get_report(
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id: Id = path.into_inner().parse().map_err(|_| ApiError::InvalidId)?;
    let report = data.repo.get_report(id).await?;
    Ok(HttpResponse::Ok().json(report))
}

#[utoipa::path(
    put,
    path = "/api/v1/reports/{id}",
    request_body = NewReport,
    params(("id" = String, Path, description = "Report id (24 hex chars)")),
    responses(
        (status = 200, description = "Report updated", body = Report),
        (status = 400, description = "Invalid id format"),
        (status = 404, description = "Report not found"),
        (status = 413, description = "Photo too large"),
        (status = 415, description = "Unsupported photo format")
    )
)]
pub async fn update_report(
    _auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<NewReport>,
) -> Result<HttpResponse, ApiError> {
    let id: Id = path.into_inner().parse().map_err(|_| ApiError::InvalidId)?;
    validate_photo(&payload.item_photo)?;
    let report = data.repo.update_report(id, payload.into_inner()).await?;
    Ok(HttpResponse::Ok().json(report))
}

#[utoipa::path(
    delete,
    path = "/api/v1/reports/{id}",
    params(("id" = String, Path, description = "Report id (24 hex chars)")),
    responses(
        (status = 204, description = "Report deleted"),
        (status = 400, description = "Invalid id format"),
        (status = 404, description = "Report not found")
    )
)]
pub async fn delete_report(
    _auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    OwnershipManager::new(data.repo.as_ref())
        .delete_report_by_id(&path.into_inner())
        .await?;
    Ok(HttpResponse::NoContent().finish())
}
