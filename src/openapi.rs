use crate::models::{
    AccountResponse, AuthResponse, Id, LoginRequest, NewReport, RegisterRequest, Report,
};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::register,
        crate::routes::login,
        crate::routes::admin_login,
        crate::routes::auth_me,
        crate::routes::list_accounts,
        crate::routes::get_account,
        crate::routes::account_reports,
        crate::routes::submit_report,
        crate::routes::list_reports,
        crate::routes::latest_reports,
        crate::routes::search_reports,
        crate::routes::category_stats,
        crate::routes::get_report,
        crate::routes::update_report,
        crate::routes::delete_report,
    ),
    components(schemas(
        Id, Report, NewReport, AccountResponse,
        RegisterRequest, LoginRequest, AuthResponse,
        crate::routes::MeResponse
    )),
    tags(
        (name = "auth", description = "Registration and login"),
        (name = "accounts", description = "Account lookup and report history"),
        (name = "reports", description = "Lost/found report operations"),
    )
)]
pub struct ApiDoc;
