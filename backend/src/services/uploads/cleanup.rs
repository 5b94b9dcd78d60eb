use crate::state::AppState;
use actix_web::{web, HttpResponse};
use log::{error, info};
use serde_json::json;

/// Deletes history records of uploads that inserted no rows.
pub async fn process(state: web::Data<AppState>) -> HttpResponse {
    match state.store.delete_empty_history().await {
        Ok(deleted) => {
            info!("Removed {} empty upload record(s)", deleted);
            HttpResponse::Ok().json(json!({
                "success": true,
                "message": format!("Cleaned up {} failed upload records", deleted),
                "deleted_count": deleted,
            }))
        }
        Err(e) => {
            error!("Failed to clean up upload history: {}", e);
            HttpResponse::InternalServerError().json(json!({
                "error": "Failed to cleanup failed uploads",
                "details": e.to_string(),
            }))
        }
    }
}
