use scraper::{Html, Selector};

/// Wrapper around the numbered page controls at the bottom of a results page.
pub const PAGINATION_CONTAINER_SELECTOR: &str = "div.at__sc-mhrryp-2.MGZFC";
const PAGE_LINK_SELECTOR: &str = "a.at__sc-dyg8rq-2.bmWDjW";
const CURRENT_PAGE_SELECTOR: &str = "span.at__sc-dyg8rq-2.at__sc-dyg8rq-3.bmWDjW.cDQLMB";

/// Highest page number advertised by the pagination bar, never below one.
/// A missing bar or a bar with nothing numeric both mean a single page.
pub fn resolve_total_pages(html: &str) -> u32 {
    let document = Html::parse_document(html);
    let container_selector = Selector::parse(PAGINATION_CONTAINER_SELECTOR).unwrap();
    let link_selector = Selector::parse(PAGE_LINK_SELECTOR).unwrap();
    let current_selector = Selector::parse(CURRENT_PAGE_SELECTOR).unwrap();

    let container = match document.select(&container_selector).next() {
        Some(container) => container,
        None => return 1,
    };

    let mut numbers: Vec<u32> = container
        .select(&link_selector)
        .filter_map(|link| link.text().collect::<String>().trim().parse().ok())
        .collect();

    if let Some(current) = container.select(&current_selector).next() {
        if let Ok(number) = current.text().collect::<String>().trim().parse::<u32>() {
            numbers.push(number);
        }
    }

    numbers.into_iter().max().map_or(1, |highest| highest.max(1))
}

/// The search URL already carries a query string, so the page index is
/// appended with `&`; a bare URL without one would need `?` instead.
pub fn build_page_url(base_url: &str, page: u32) -> String {
    format!("{}&page={}", base_url, page)
}

#[cfg(test)]
mod tests {
    use super::{build_page_url, resolve_total_pages};

    fn results_page(pagination: &str) -> String {
        format!(
            r#"<html><body>
            <ul><li data-testid="advertCard">one</li></ul>
            {}
            </body></html>"#,
            pagination
        )
    }

    #[test]
    fn missing_pagination_means_one_page() {
        let html = results_page("");

        assert_eq!(resolve_total_pages(&html), 1);
    }

    #[test]
    fn current_page_label_counts_towards_the_maximum() {
        let html = results_page(
            r##"<div class="at__sc-mhrryp-2 MGZFC">
                <a class="at__sc-dyg8rq-2 bmWDjW" href="#">1</a>
                <a class="at__sc-dyg8rq-2 bmWDjW" href="#">2</a>
                <a class="at__sc-dyg8rq-2 bmWDjW" href="#">3</a>
                <span class="at__sc-dyg8rq-2 at__sc-dyg8rq-3 bmWDjW cDQLMB">4</span>
            </div>"##,
        );

        assert_eq!(resolve_total_pages(&html), 4);
    }

    #[test]
    fn link_labels_alone_decide_when_no_current_marker_exists() {
        let html = results_page(
            r##"<div class="at__sc-mhrryp-2 MGZFC">
                <a class="at__sc-dyg8rq-2 bmWDjW" href="#">2</a>
                <a class="at__sc-dyg8rq-2 bmWDjW" href="#">7</a>
            </div>"##,
        );

        assert_eq!(resolve_total_pages(&html), 7);
    }

    #[test]
    fn non_numeric_labels_fall_back_to_one_page() {
        let html = results_page(
            r##"<div class="at__sc-mhrryp-2 MGZFC">
                <a class="at__sc-dyg8rq-2 bmWDjW" href="#">Next</a>
                <a class="at__sc-dyg8rq-2 bmWDjW" href="#">Previous</a>
            </div>"##,
        );

        assert_eq!(resolve_total_pages(&html), 1);
    }

    #[test]
    fn a_zero_label_still_means_at_least_one_page() {
        let html = results_page(
            r##"<div class="at__sc-mhrryp-2 MGZFC">
                <a class="at__sc-dyg8rq-2 bmWDjW" href="#">0</a>
            </div>"##,
        );

        assert_eq!(resolve_total_pages(&html), 1);
    }

    #[test]
    fn page_index_is_appended_to_the_query_string() {
        let url = build_page_url("https://www.autotrader.co.uk/car-search?postcode=M1", 3);

        assert_eq!(
            url,
            "https://www.autotrader.co.uk/car-search?postcode=M1&page=3"
        );
    }
}
