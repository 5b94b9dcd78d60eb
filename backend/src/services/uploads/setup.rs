use crate::state::AppState;
use actix_web::{web, HttpResponse};
use log::{error, info};
use serde_json::json;

pub async fn process(state: web::Data<AppState>) -> HttpResponse {
    match state.store.setup_history().await {
        Ok(()) => {
            info!("upload_history is ready");
            HttpResponse::Ok().json(json!({
                "success": true,
                "message": "Upload history table created successfully",
            }))
        }
        Err(e) => {
            error!("Failed to set up upload_history: {}", e);
            HttpResponse::InternalServerError().json(json!({
                "error": "Failed to create upload_history table",
                "details": e.to_string(),
            }))
        }
    }
}
