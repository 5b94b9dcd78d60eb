use crate::auth::SESSION_COOKIE;
use actix_web::cookie::Cookie;
use actix_web::HttpResponse;
use serde_json::json;

pub async fn process() -> HttpResponse {
    let mut cookie = Cookie::build(SESSION_COOKIE, "").path("/").finish();
    cookie.make_removal();
    HttpResponse::Ok()
        .cookie(cookie)
        .json(json!({ "success": true }))
}
