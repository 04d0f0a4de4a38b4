use actix_web::{post, web, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::configuration::Settings;
use crate::domain::listing::Listing;
use crate::services::{orchestrator, ScrapeMode, SessionGate};

#[derive(Deserialize)]
struct ScrapeBody {
    #[serde(rename = "baseURL")]
    base_url: Option<String>,
}

#[derive(Serialize)]
struct ScrapeOk {
    success: bool,
    count: usize,
    listings: Vec<Listing>,
}

#[derive(Serialize)]
struct ScrapeFailed {
    success: bool,
    error: String,
}

#[derive(Serialize)]
struct MissingBaseUrl {
    error: String,
}

#[post("/scrape")]
async fn scrape(
    settings: web::Data<Settings>,
    gate: web::Data<SessionGate>,
    body: Option<web::Json<ScrapeBody>>,
) -> HttpResponse {
    run_scrape(settings, gate, body, ScrapeMode::Full).await
}

#[post("/debug-scrape")]
async fn debug_scrape(
    settings: web::Data<Settings>,
    gate: web::Data<SessionGate>,
    body: Option<web::Json<ScrapeBody>>,
) -> HttpResponse {
    run_scrape(settings, gate, body, ScrapeMode::Debug).await
}

async fn run_scrape(
    settings: web::Data<Settings>,
    gate: web::Data<SessionGate>,
    body: Option<web::Json<ScrapeBody>>,
    mode: ScrapeMode,
) -> HttpResponse {
    // Validation happens before a gate permit or browser is ever taken.
    // A missing body counts the same as a missing baseURL.
    let base_url = match body
        .as_ref()
        .and_then(|body| body.base_url.as_deref())
        .map(str::trim)
    {
        Some(url) if !url.is_empty() => url.to_string(),
        _ => {
            return HttpResponse::BadRequest().json(MissingBaseUrl {
                error: "baseURL is required in request body".to_string(),
            })
        }
    };

    log::info!("Starting {:?} scrape for {}", mode, base_url);
    let _permit = gate.enter().await;

    match orchestrator::scrape(settings.get_ref(), &base_url, mode).await {
        Ok(listings) => HttpResponse::Ok().json(ScrapeOk {
            success: true,
            count: listings.len(),
            listings,
        }),
        Err(error) => {
            log::error!("Scrape failed: {}", error);
            HttpResponse::InternalServerError().json(ScrapeFailed {
                success: false,
                error: error.to_string(),
            })
        }
    }
}
