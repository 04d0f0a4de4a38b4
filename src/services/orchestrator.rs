use std::time::Duration;

use crate::configuration::Settings;
use crate::domain::listing::Listing;
use crate::services::droid::{Droid, SessionError};
use crate::services::extractor::{extract_page, LISTING_CARD_SELECTOR};
use crate::services::navigator::{self, NavOutcome, NavPolicy};
use crate::services::paginator::{
    build_page_url, resolve_total_pages, PAGINATION_CONTAINER_SELECTOR,
};

/// Budget for noticing the pagination bar once the first page settles.
const PAGINATION_PROBE_BUDGET: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrapeMode {
    /// Every result page.
    Full,
    /// One page, first listing only.
    Debug,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PageOutcome {
    Succeeded(Vec<Listing>),
    Skipped(String),
}

#[derive(thiserror::Error, Debug)]
pub enum ScrapeError {
    #[error("browser session failed: {0}")]
    Session(#[from] SessionError),
    #[error("browser call failed: {0}")]
    Browser(#[from] chromiumoxide::error::CdpError),
}

/// Once acquired, the session is released on every path before the
/// result leaves this function.
pub async fn scrape(
    settings: &Settings,
    base_url: &str,
    mode: ScrapeMode,
) -> Result<Vec<Listing>, ScrapeError> {
    let droid = Droid::acquire(&settings.browser, settings.scraper.navigation_timeout()).await?;
    let policy = NavPolicy::from_settings(&settings.scraper);

    let result = match mode {
        ScrapeMode::Full => run_full(&droid, base_url, &policy).await,
        ScrapeMode::Debug => run_debug(&droid, base_url, &policy).await,
    };
    droid.release().await;

    result
}

async fn run_full(
    droid: &Droid,
    base_url: &str,
    policy: &NavPolicy,
) -> Result<Vec<Listing>, ScrapeError> {
    let page = droid.page();

    let landing = navigator::goto(page, base_url, Some(LISTING_CARD_SELECTOR), policy).await;
    if !landing.is_success() {
        log::error!(
            "Could not open {}: {}",
            base_url,
            landing.reason().unwrap_or("unknown")
        );
        return Ok(Vec::new());
    }

    if !navigator::wait_for_selector(page, PAGINATION_CONTAINER_SELECTOR, PAGINATION_PROBE_BUDGET)
        .await
    {
        log::info!("No pagination bar found, assuming a single page");
    }

    let html = page.content().await?;
    let total_pages = resolve_total_pages(&html);
    log::info!("Search spans {} page(s)", total_pages);

    let mut outcomes = Vec::with_capacity(total_pages as usize);
    for page_number in 1..=total_pages {
        log::info!("Scraping page {} of {}", page_number, total_pages);
        let page_url = build_page_url(base_url, page_number);
        let outcome = visit_page(droid, &page_url, policy).await?;
        match &outcome {
            PageOutcome::Succeeded(listings) => {
                log::info!("Page {} produced {} listings", page_number, listings.len())
            }
            PageOutcome::Skipped(reason) => {
                log::error!("Skipping page {}: {}", page_number, reason)
            }
        }
        outcomes.push(outcome);
    }

    Ok(aggregate(outcomes))
}

async fn run_debug(
    droid: &Droid,
    base_url: &str,
    policy: &NavPolicy,
) -> Result<Vec<Listing>, ScrapeError> {
    let landing =
        navigator::goto(droid.page(), base_url, Some(LISTING_CARD_SELECTOR), policy).await;
    if !landing.is_success() {
        log::error!(
            "Could not open {}: {}",
            base_url,
            landing.reason().unwrap_or("unknown")
        );
        return Ok(Vec::new());
    }

    let html = droid.page().content().await?;
    Ok(debug_sample(extract_page(&html)))
}

async fn visit_page(
    droid: &Droid,
    url: &str,
    policy: &NavPolicy,
) -> Result<PageOutcome, ScrapeError> {
    match navigator::goto(droid.page(), url, Some(LISTING_CARD_SELECTOR), policy).await {
        NavOutcome::Succeeded => {
            let html = droid.page().content().await?;
            let listings = extract_page(&html);
            if listings.is_empty() {
                Ok(PageOutcome::Skipped("no listings extracted".to_string()))
            } else {
                Ok(PageOutcome::Succeeded(listings))
            }
        }
        NavOutcome::SoftFailed(reason) | NavOutcome::FatalFailed(reason) => {
            Ok(PageOutcome::Skipped(reason))
        }
    }
}

/// Flattens page outcomes in visit order; skipped pages contribute
/// nothing and never fail the run.
fn aggregate(outcomes: Vec<PageOutcome>) -> Vec<Listing> {
    outcomes
        .into_iter()
        .flat_map(|outcome| match outcome {
            PageOutcome::Succeeded(listings) => listings,
            PageOutcome::Skipped(_) => Vec::new(),
        })
        .collect()
}

fn debug_sample(listings: Vec<Listing>) -> Vec<Listing> {
    listings.into_iter().take(1).collect()
}

#[cfg(test)]
mod tests {
    use super::{aggregate, debug_sample, PageOutcome};
    use crate::domain::listing::Listing;

    fn listing(title: &str) -> Listing {
        Listing {
            title: title.to_string(),
            ..Listing::default()
        }
    }

    #[test]
    fn skipped_pages_drop_out_and_order_is_kept() {
        let outcomes = vec![
            PageOutcome::Succeeded(vec![listing("a"), listing("b")]),
            PageOutcome::Skipped("timed out".to_string()),
            PageOutcome::Succeeded(vec![listing("c")]),
        ];

        let listings = aggregate(outcomes);

        let titles: Vec<&str> = listings.iter().map(|l| l.title.as_str()).collect();
        assert_eq!(titles, vec!["a", "b", "c"]);
    }

    #[test]
    fn a_run_of_only_skipped_pages_is_empty_not_an_error() {
        let outcomes = vec![
            PageOutcome::Skipped("no listings extracted".to_string()),
            PageOutcome::Skipped("no listings extracted".to_string()),
        ];

        assert!(aggregate(outcomes).is_empty());
    }

    #[test]
    fn debug_sample_keeps_at_most_one_listing() {
        assert!(debug_sample(Vec::new()).is_empty());

        let sampled = debug_sample(vec![listing("a"), listing("b"), listing("c")]);
        assert_eq!(sampled.len(), 1);
        assert_eq!(sampled[0].title, "a");
    }
}
