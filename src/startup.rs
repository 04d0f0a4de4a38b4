use std::net::TcpListener;

use actix_web::{dev::Server, middleware::Logger, web, App, HttpServer};

use crate::{
    configuration::Settings,
    routes::{default_route, health_route, scrape_route},
    services::SessionGate,
};

pub fn run(listener: TcpListener, settings: Settings) -> Result<Server, std::io::Error> {
    let gate = web::Data::new(SessionGate::new(settings.scraper.max_sessions));
    let settings = web::Data::new(settings);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .service(default_route::default)
            .service(health_route::health)
            .service(scrape_route::scrape)
            .service(scrape_route::debug_scrape)
            .app_data(settings.clone())
            .app_data(gate.clone())
    })
    .listen(listener)?
    .run();

    Ok(server)
}
