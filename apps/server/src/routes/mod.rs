use actix_web::web::ServiceConfig;

mod checks;
mod health;

/// Register every route
pub fn routes(cfg: &mut ServiceConfig) {
    health::routes(cfg);
    checks::routes(cfg);
}
