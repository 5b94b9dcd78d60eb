//! Session tokens and the guard in front of every non-auth route.
//!
//! A session is a compact HS256 JWT carried in the `auth-token` cookie. The token
//! holds the signed-in email and an expiry; nothing is kept server side.

use crate::state::AppState;
use actix_web::body::{EitherBody, MessageBody};
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::http::header::LOCATION;
use actix_web::middleware::Next;
use actix_web::{web, Error, HttpResponse};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use log::{debug, error};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

pub const SESSION_COOKIE: &str = "auth-token";
const EXEMPT_PREFIX: &str = "/api/auth/";
const LOGIN_PAGE: &str = "/login";

#[derive(Debug, Error, PartialEq)]
pub enum AuthError {
    #[error("malformed session token")]
    Malformed,
    #[error("session token signature mismatch")]
    BadSignature,
    #[error("session expired")]
    Expired,
    #[error("could not sign session token: {0}")]
    Signing(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub email: String,
    /// Expiry, seconds since the Unix epoch.
    pub exp: i64,
}

#[derive(Serialize, Deserialize)]
struct TokenHeader {
    alg: String,
    typ: String,
}

fn mac(secret: &str) -> Result<HmacSha256, AuthError> {
    HmacSha256::new_from_slice(secret.as_bytes()).map_err(|e| AuthError::Signing(e.to_string()))
}

/// Signs a session for `email` that expires `ttl_secs` after `now`.
pub fn issue_token(secret: &str, email: &str, ttl_secs: i64, now: i64) -> Result<String, AuthError> {
    let header = TokenHeader {
        alg: "HS256".into(),
        typ: "JWT".into(),
    };
    let claims = SessionClaims {
        email: email.to_string(),
        exp: now + ttl_secs,
    };
    let header = serde_json::to_vec(&header).map_err(|e| AuthError::Signing(e.to_string()))?;
    let claims = serde_json::to_vec(&claims).map_err(|e| AuthError::Signing(e.to_string()))?;
    let signing_input = format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(header),
        URL_SAFE_NO_PAD.encode(claims)
    );

    let mut mac = mac(secret)?;
    mac.update(signing_input.as_bytes());
    let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
    Ok(format!("{}.{}", signing_input, signature))
}

/// Checks signature and expiry of a token produced by `issue_token`.
pub fn verify_token(secret: &str, token: &str, now: i64) -> Result<SessionClaims, AuthError> {
    let (signing_input, signature) = token.rsplit_once('.').ok_or(AuthError::Malformed)?;
    let (header, claims) = signing_input
        .split_once('.')
        .filter(|(_, claims)| !claims.contains('.'))
        .ok_or(AuthError::Malformed)?;

    let header: TokenHeader = URL_SAFE_NO_PAD
        .decode(header)
        .ok()
        .and_then(|bytes| serde_json::from_slice(&bytes).ok())
        .ok_or(AuthError::Malformed)?;
    if header.alg != "HS256" {
        return Err(AuthError::Malformed);
    }
    let signature = URL_SAFE_NO_PAD
        .decode(signature)
        .map_err(|_| AuthError::Malformed)?;

    let mut mac = mac(secret)?;
    mac.update(signing_input.as_bytes());
    mac.verify_slice(&signature)
        .map_err(|_| AuthError::BadSignature)?;

    let claims: SessionClaims = URL_SAFE_NO_PAD
        .decode(claims)
        .ok()
        .and_then(|bytes| serde_json::from_slice(&bytes).ok())
        .ok_or(AuthError::Malformed)?;
    if claims.exp <= now {
        return Err(AuthError::Expired);
    }
    Ok(claims)
}

/// Rejects requests without a valid session.
///
/// Routes under `/api/auth/` and the login page pass through. Otherwise API calls get a 401 JSON
/// body and page requests are redirected to the login page.
pub async fn require_session<B: MessageBody>(
    req: ServiceRequest,
    next: Next<B>,
) -> Result<ServiceResponse<EitherBody<B>>, Error> {
    let path = req.path().to_string();
    if path.starts_with(EXEMPT_PREFIX) || path == LOGIN_PAGE {
        return next.call(req).await.map(ServiceResponse::map_into_left_body);
    }

    let Some(state) = req.app_data::<web::Data<AppState>>() else {
        error!("Application state missing, refusing {}", path);
        return Err(actix_web::error::ErrorInternalServerError("server misconfigured"));
    };
    let secret = state.config.auth.secret.clone();

    let had_cookie = match req.cookie(SESSION_COOKIE) {
        Some(cookie) => match verify_token(&secret, cookie.value(), Utc::now().timestamp()) {
            Ok(claims) => {
                debug!("{} authorized for {}", claims.email, path);
                return next.call(req).await.map(ServiceResponse::map_into_left_body);
            }
            Err(e) => {
                debug!("Rejected session for {}: {}", path, e);
                true
            }
        },
        None => false,
    };

    let mut response = if path.starts_with("/api/") {
        HttpResponse::Unauthorized().json(json!({ "error": "Unauthorized - Please login" }))
    } else {
        HttpResponse::Found()
            .insert_header((LOCATION, LOGIN_PAGE))
            .finish()
    };
    if had_cookie {
        let mut removal = actix_web::cookie::Cookie::new(SESSION_COOKIE, "");
        removal.set_path("/");
        response.add_removal_cookie(&removal)?;
    }

    let (request, _) = req.into_parts();
    Ok(ServiceResponse::new(request, response).map_into_right_body())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IngestSettings;
    use crate::state::testing::{state, SECRET};
    use actix_web::cookie::Cookie;
    use actix_web::http::StatusCode;
    use actix_web::middleware::from_fn;
    use actix_web::{test as web_test, App};

    const NOW: i64 = 1_700_000_000;

    #[test]
    fn issued_tokens_verify_until_expiry() {
        let token = issue_token(SECRET, "ops@example.com", 60, NOW).unwrap();
        assert_eq!(token.split('.').count(), 3);

        let claims = verify_token(SECRET, &token, NOW + 59).unwrap();
        assert_eq!(claims.email, "ops@example.com");
        assert_eq!(claims.exp, NOW + 60);
        assert_eq!(verify_token(SECRET, &token, NOW + 60), Err(AuthError::Expired));
    }

    #[test]
    fn tampering_is_detected() {
        let token = issue_token(SECRET, "ops@example.com", 60, NOW).unwrap();
        assert_eq!(
            verify_token("another-secret", &token, NOW),
            Err(AuthError::BadSignature)
        );

        let forged_claims = URL_SAFE_NO_PAD.encode(br#"{"email":"root@example.com","exp":9999999999}"#);
        let parts: Vec<&str> = token.split('.').collect();
        let forged = format!("{}.{}.{}", parts[0], forged_claims, parts[2]);
        assert_eq!(verify_token(SECRET, &forged, NOW), Err(AuthError::BadSignature));
    }

    #[test]
    fn garbage_is_malformed() {
        for token in ["", "abc", "a.b", "a.b.c.d", "!!.??.**"] {
            assert_eq!(verify_token(SECRET, token, NOW), Err(AuthError::Malformed), "{token}");
        }
    }

    async fn ok() -> HttpResponse {
        HttpResponse::Ok().finish()
    }

    #[actix_web::test]
    async fn guard_gates_api_and_pages() {
        let (state, _) = state(IngestSettings::default());
        let app = web_test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .wrap(from_fn(require_session))
                .route("/api/auth/login", web::post().to(ok))
                .route("/api/upload", web::post().to(ok))
                .route("/login", web::get().to(ok))
                .route("/", web::get().to(ok)),
        )
        .await;

        let res = web_test::call_service(&app, web_test::TestRequest::get().uri("/login").to_request()).await;
        assert_eq!(res.status(), StatusCode::OK);

        let res = web_test::call_service(&app, web_test::TestRequest::post().uri("/api/auth/login").to_request()).await;
        assert_eq!(res.status(), StatusCode::OK);

        let res = web_test::call_service(&app, web_test::TestRequest::post().uri("/api/upload").to_request()).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

        let res = web_test::call_service(&app, web_test::TestRequest::get().uri("/").to_request()).await;
        assert_eq!(res.status(), StatusCode::FOUND);
        assert_eq!(res.headers().get(LOCATION).unwrap(), "/login");

        let token = issue_token(SECRET, "ops@example.com", 600, Utc::now().timestamp()).unwrap();
        let req = web_test::TestRequest::post()
            .uri("/api/upload")
            .cookie(Cookie::new(SESSION_COOKIE, token))
            .to_request();
        assert_eq!(web_test::call_service(&app, req).await.status(), StatusCode::OK);

        let req = web_test::TestRequest::post()
            .uri("/api/upload")
            .cookie(Cookie::new(SESSION_COOKIE, "not-a-token"))
            .to_request();
        let res = web_test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert!(res
            .response()
            .cookies()
            .any(|c| c.name() == SESSION_COOKIE && c.value().is_empty()));
    }
}
