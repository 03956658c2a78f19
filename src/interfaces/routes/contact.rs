use actix_web::web;

use crate::handlers::contact::submit_contact;

pub fn config_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(submit_contact);
}
