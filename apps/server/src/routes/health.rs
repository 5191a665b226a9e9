use actix_web::{HttpResponse, Responder, get, web};
use checker::Checker;
use serde_json::json;

macros_utils::routes! {
    route health_route,
}

/// Health check route
/// Reports how many checks are currently scheduled.
#[get("/")]
pub async fn health_route(checker: web::Data<Checker>) -> impl Responder {
    HttpResponse::Ok().json(json!({ "scheduled_checks": checker.scheduler().len() }))
}
