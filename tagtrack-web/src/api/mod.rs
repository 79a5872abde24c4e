mod asset;
mod device;
mod ws;

use actix_web::web;

pub(crate) fn configure_routes(cfg: &mut web::ServiceConfig) {
    device::configure_routes(cfg);
    asset::configure_routes(cfg);
    cfg.route("/ws/events", web::get().to(ws::events_ws));
}
