//! Sign-in and sign-out under `/api/auth`, the only routes the session guard lets
//! through without a cookie.

mod login;
mod logout;

use actix_web::web::{post, scope};
use actix_web::Scope;

const API_PATH: &str = "/api/auth";

pub fn configure_routes() -> Scope {
    scope(API_PATH)
        .route("/login", post().to(login::process))
        .route("/logout", post().to(logout::process))
}
