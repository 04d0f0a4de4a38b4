use scraper::{ElementRef, Html, Selector};

use crate::domain::listing::{Listing, ListingField};

/// One advert card on a search-results page.
pub const LISTING_CARD_SELECTOR: &str = r#"[data-testid="advertCard"]"#;

const SITE_ORIGIN: &str = "https://www.autotrader.co.uk";

const TITLE_SELECTOR: &str = r#"a[data-testid="search-listing-title"] h3"#;
const SUBTITLE_SELECTOR: &str = r#"p[data-testid="search-listing-subtitle"]"#;
const PRICE_SELECTOR: &str = "span.at__sc-1mc7cl3-7.icLPGk";
const SPEC_LIST_SELECTOR: &str = "li.at__sc-1n64n0d-9.hYdVyl";
const SELLER_SELECTOR: &str = "span.at__sc-1mc7cl3-15.kLylrw.ideECV";
const LOCATION_SELECTOR: &str = "span.at__sc-m0lx8i-1.grrelV";
const DISTANCE_SELECTOR: &str = "span.at__sc-m0lx8i-2.gJLdRk";
const TITLE_LINK_SELECTOR: &str = r#"a[data-testid="search-listing-title"]"#;

enum FieldRule {
    /// Trimmed text of the first element matching the selector.
    Text(&'static str),
    /// Among elements matching the selector, the trimmed text of the
    /// first one containing `marker`, with `strip` removed once.
    MarkedValue {
        selector: &'static str,
        marker: &'static str,
        strip: &'static str,
    },
    /// Among elements matching the selector, the first whitespace token
    /// of the first one containing `marker`.
    MarkedFirstToken {
        selector: &'static str,
        marker: &'static str,
    },
    /// Dealer-location label minus its `drop` prefix, joined by one
    /// space with the distance fragment (empty when absent).
    LabelWithDistance {
        label: &'static str,
        distance: &'static str,
        drop: &'static str,
    },
    /// `href` of the first element matching the selector, absolutized
    /// against the site origin when relative.
    Link(&'static str),
}

const FIELD_RULES: &[(ListingField, FieldRule)] = &[
    (ListingField::Title, FieldRule::Text(TITLE_SELECTOR)),
    (ListingField::Description, FieldRule::Text(SUBTITLE_SELECTOR)),
    (
        ListingField::Year,
        FieldRule::MarkedFirstToken {
            selector: SPEC_LIST_SELECTOR,
            marker: "reg",
        },
    ),
    (ListingField::Price, FieldRule::Text(PRICE_SELECTOR)),
    (
        ListingField::Mileage,
        FieldRule::MarkedValue {
            selector: SPEC_LIST_SELECTOR,
            marker: "miles",
            strip: " miles",
        },
    ),
    (ListingField::Seller, FieldRule::Text(SELLER_SELECTOR)),
    (
        ListingField::Location,
        FieldRule::LabelWithDistance {
            label: LOCATION_SELECTOR,
            distance: DISTANCE_SELECTOR,
            drop: "Dealer location",
        },
    ),
    (ListingField::Url, FieldRule::Link(TITLE_LINK_SELECTOR)),
];

/// Every advert card on the page, in DOM order. Cards that are missing
/// fields still produce a listing; absent values keep the placeholder.
pub fn extract_page(html: &str) -> Vec<Listing> {
    let document = Html::parse_document(html);
    let card_selector = Selector::parse(LISTING_CARD_SELECTOR).unwrap();

    document
        .select(&card_selector)
        .map(|card| extract_card(&card))
        .collect()
}

pub fn extract_card(card: &ElementRef) -> Listing {
    let mut listing = Listing::default();
    for (field, rule) in FIELD_RULES {
        if let Some(value) = apply_rule(card, rule) {
            listing.set(*field, value);
        }
    }
    listing
}

fn apply_rule(card: &ElementRef, rule: &FieldRule) -> Option<String> {
    match rule {
        FieldRule::Text(selector) => {
            element_text(card, selector).filter(|text| !text.is_empty())
        }
        FieldRule::MarkedValue {
            selector,
            marker,
            strip,
        } => marked_text(card, selector, marker)
            .map(|text| text.replacen(strip, "", 1).trim().to_string()),
        FieldRule::MarkedFirstToken { selector, marker } => marked_text(card, selector, marker)
            .and_then(|text| text.split_whitespace().next().map(str::to_string)),
        FieldRule::LabelWithDistance {
            label,
            distance,
            drop,
        } => {
            let place = element_text(card, label)?.replacen(drop, "", 1);
            let away = element_text(card, distance).unwrap_or_default();
            let combined = format!("{} {}", place, away);
            if combined.trim().is_empty() {
                None
            } else {
                Some(combined)
            }
        }
        FieldRule::Link(selector) => {
            let parsed = Selector::parse(selector).ok()?;
            card.select(&parsed)
                .next()
                .and_then(|el| el.value().attr("href"))
                .map(|href| {
                    if href.starts_with("http") {
                        href.to_string()
                    } else {
                        format!("{}{}", SITE_ORIGIN, href)
                    }
                })
        }
    }
}

fn element_text(card: &ElementRef, selector: &str) -> Option<String> {
    let parsed = Selector::parse(selector).ok()?;
    card.select(&parsed)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
}

fn marked_text(card: &ElementRef, selector: &str, marker: &str) -> Option<String> {
    let parsed = Selector::parse(selector).ok()?;
    card.select(&parsed)
        .map(|el| el.text().collect::<String>().trim().to_string())
        .find(|text| text.contains(marker))
}

#[cfg(test)]
mod tests {
    use super::extract_page;
    use crate::domain::listing::MISSING_FIELD;

    const COMPLETE_CARD: &str = r#"
        <div data-testid="advertCard">
            <a data-testid="search-listing-title" href="/car-details/202408059657472">
                <h3>Ford Fiesta</h3>
            </a>
            <p data-testid="search-listing-subtitle">1.0T EcoBoost ST-Line 5dr</p>
            <span class="at__sc-1mc7cl3-7 icLPGk">£12,495</span>
            <ul>
                <li class="at__sc-1n64n0d-9 hYdVyl">2019 (19 reg)</li>
                <li class="at__sc-1n64n0d-9 hYdVyl">36,000 miles</li>
                <li class="at__sc-1n64n0d-9 hYdVyl">Petrol</li>
            </ul>
            <span class="at__sc-1mc7cl3-15 kLylrw ideECV">Arnold Clark Stockport</span>
            <span class="at__sc-m0lx8i-1 grrelV"><span>Dealer location</span>Stockport</span>
            <span class="at__sc-m0lx8i-2 gJLdRk">(14 miles)</span>
        </div>
    "#;

    fn page(cards: &str) -> String {
        format!("<html><body><main>{}</main></body></html>", cards)
    }

    #[test]
    fn extracts_every_field_from_a_complete_card() {
        let listings = extract_page(&page(COMPLETE_CARD));

        assert_eq!(listings.len(), 1);
        let listing = &listings[0];
        assert_eq!(listing.title, "Ford Fiesta");
        assert_eq!(listing.description, "1.0T EcoBoost ST-Line 5dr");
        assert_eq!(listing.year, "2019");
        assert_eq!(listing.price, "£12,495");
        assert_eq!(listing.mileage, "36,000");
        assert_eq!(listing.seller, "Arnold Clark Stockport");
        assert_eq!(listing.location, "Stockport (14 miles)");
        assert_eq!(
            listing.url,
            "https://www.autotrader.co.uk/car-details/202408059657472"
        );
    }

    #[test]
    fn a_missing_price_leaves_every_other_field_intact() {
        let card = r#"
            <div data-testid="advertCard">
                <a data-testid="search-listing-title" href="/car-details/1"><h3>Vauxhall Corsa</h3></a>
                <ul><li class="at__sc-1n64n0d-9 hYdVyl">22,000 miles</li></ul>
            </div>
        "#;

        let listings = extract_page(&page(card));

        assert_eq!(listings.len(), 1);
        let listing = &listings[0];
        assert_eq!(listing.price, MISSING_FIELD);
        assert_eq!(listing.title, "Vauxhall Corsa");
        assert_eq!(listing.mileage, "22,000");
        assert_eq!(listing.year, MISSING_FIELD);
    }

    #[test]
    fn an_empty_card_is_all_placeholders() {
        let listings = extract_page(&page(r#"<div data-testid="advertCard"></div>"#));

        assert_eq!(listings.len(), 1);
        let listing = &listings[0];
        assert_eq!(listing.title, MISSING_FIELD);
        assert_eq!(listing.location, MISSING_FIELD);
        assert_eq!(listing.url, MISSING_FIELD);
    }

    #[test]
    fn cards_come_back_in_page_order() {
        let cards = r#"
            <div data-testid="advertCard">
                <a data-testid="search-listing-title" href="/car-details/1"><h3>First</h3></a>
            </div>
            <div data-testid="advertCard">
                <a data-testid="search-listing-title" href="/car-details/2"><h3>Second</h3></a>
            </div>
        "#;

        let listings = extract_page(&page(cards));

        assert_eq!(listings.len(), 2);
        assert_eq!(listings[0].title, "First");
        assert_eq!(listings[1].title, "Second");
    }

    #[test]
    fn absolute_links_are_kept_as_they_are() {
        let card = r#"
            <div data-testid="advertCard">
                <a data-testid="search-listing-title"
                   href="https://www.autotrader.co.uk/car-details/9"><h3>Kept</h3></a>
            </div>
        "#;

        let listings = extract_page(&page(card));

        assert_eq!(listings[0].url, "https://www.autotrader.co.uk/car-details/9");
    }

    #[test]
    fn whitespace_only_text_counts_as_missing() {
        let card = r#"
            <div data-testid="advertCard">
                <a data-testid="search-listing-title" href="/car-details/3"><h3>   </h3></a>
            </div>
        "#;

        let listings = extract_page(&page(card));

        assert_eq!(listings[0].title, MISSING_FIELD);
        assert_eq!(listings[0].url, "https://www.autotrader.co.uk/car-details/3");
    }

    #[test]
    fn no_cards_means_no_listings() {
        let listings = extract_page(&page("<p>0 results</p>"));

        assert!(listings.is_empty());
    }
}
