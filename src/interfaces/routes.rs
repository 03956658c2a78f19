use actix_web::web;

mod contact;
mod system;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.configure(system::config_routes);

    cfg.service(
        web::scope("/api")
            .configure(contact::config_routes)
    );
}
