//! Declarative helpers shared by the workspace apps.

#[cfg(feature = "actix")]
#[doc(hidden)]
pub use actix_web;

/// Generate a `routes` function that registers the listed actix-web
/// handlers on a `ServiceConfig`.
///
/// ```ignore
/// macros_utils::routes! {
///     route health_route,
///     route create_checks,
/// }
/// ```
#[cfg(feature = "actix")]
#[macro_export]
macro_rules! routes {
    ($(route $handler:ident),* $(,)?) => {
        pub fn routes(cfg: &mut $crate::actix_web::web::ServiceConfig) {
            $(cfg.service($handler);)*
        }
    };
}
