use crate::auth::{issue_token, SESSION_COOKIE};
use crate::state::AppState;
use actix_web::cookie::time::Duration;
use actix_web::cookie::{Cookie, SameSite};
use actix_web::{web, HttpResponse};
use chrono::Utc;
use common::requests::LoginRequest;
use log::{error, info, warn};
use serde_json::json;

/// Checks the shared credentials and hands out a session cookie.
///
/// Unknown email and wrong password get the same answer.
pub async fn process(state: web::Data<AppState>, payload: web::Json<LoginRequest>) -> HttpResponse {
    let auth = &state.config.auth;
    let email = payload.email.trim();

    let known = auth
        .allowed_emails
        .iter()
        .any(|allowed| allowed.eq_ignore_ascii_case(email));
    if !known || payload.password != auth.login_password {
        warn!("Failed sign-in attempt for {}", email);
        return HttpResponse::Unauthorized().json(json!({ "error": "Invalid email or password" }));
    }

    let token = match issue_token(&auth.secret, email, auth.session_ttl_secs, Utc::now().timestamp()) {
        Ok(token) => token,
        Err(e) => {
            error!("Could not issue session for {}: {}", email, e);
            return HttpResponse::InternalServerError().json(json!({ "error": "Internal server error" }));
        }
    };

    let cookie = Cookie::build(SESSION_COOKIE, token)
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(auth.cookie_secure)
        .max_age(Duration::seconds(auth.session_ttl_secs))
        .finish();

    info!("{} signed in", email);
    HttpResponse::Ok()
        .cookie(cookie)
        .json(json!({ "success": true }))
}
