use actix_web::{HttpResponse, Responder, delete, post, put, web};
use checker::Checker;
use checker::checker::{CheckResourceRequest, TestCheckRequest};
use tracing::debug;

use crate::error::AppError;

macros_utils::routes! {
    route create_checks,
    route retrieve_checks,
    route update_checks,
    route delete_checks,
    route test_check,
}

#[post("/checks")]
pub async fn create_checks(checker: web::Data<Checker>, request: web::Json<CheckResourceRequest>) -> impl Responder {
    debug!("Creating {} checks", request.checks.len());
    HttpResponse::Ok().json(checker.create_check(&request).await)
}

#[post("/checks/retrieve")]
pub async fn retrieve_checks(checker: web::Data<Checker>, request: web::Json<CheckResourceRequest>) -> impl Responder {
    HttpResponse::Ok().json(checker.retrieve_check(&request))
}

#[put("/checks")]
pub async fn update_checks(checker: web::Data<Checker>, request: web::Json<CheckResourceRequest>) -> impl Responder {
    HttpResponse::Ok().json(checker.update_check(&request).await)
}

#[delete("/checks")]
pub async fn delete_checks(checker: web::Data<Checker>, request: web::Json<CheckResourceRequest>) -> impl Responder {
    HttpResponse::Ok().json(checker.delete_check(&request))
}

/// Run a check once and return its responses. The request must carry a
/// deadline.
#[post("/checks/test")]
pub async fn test_check(
    checker: web::Data<Checker>,
    request: web::Json<TestCheckRequest>,
) -> Result<HttpResponse, AppError> {
    let response = checker.test_check(request.into_inner()).await?;
    Ok(HttpResponse::Ok().json(response))
}
