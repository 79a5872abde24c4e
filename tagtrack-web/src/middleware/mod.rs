pub(crate) mod auth;

use actix_cors::Cors;

pub(crate) fn cors() -> Cors {
    Cors::default()
        .allow_any_origin()
        .allow_any_method()
        .allow_any_header()
        .max_age(3600)
}
