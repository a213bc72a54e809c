//! Agent profile page parser.
//!
//! [`parse_profile`] is pure with respect to its input: page text in,
//! [`RawAgentFields`] out, no network or disk access, so it can be tested
//! directly against captured page fixtures.
//!
//! Every field is extracted independently. A missing or malformed field
//! is left unknown and the parse proceeds; only a page with no
//! recognizable profile structure at all fails the whole operation.

use crate::error::ParseError;
use crate::models::{Broker, PriceSummary, RawAgentFields, Review, SoldSummary};
use crate::normalize::{coerce_float, coerce_int};
use crate::utils::collapse_ws;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, instrument};

static PROFILE_ROOT: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("[data-testid='agent-profile'], .agent-profile, #agent-detail").unwrap()
});
static TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("h1").unwrap());
static DESCRIPTION: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("[data-testid='agent-description'], .agent-description, .bio").unwrap()
});
static PHOTO: Lazy<Selector> =
    Lazy::new(|| Selector::parse("img[src*='rdcpix'], img[alt*='agent photo']").unwrap());
static EXPERIENCE: Lazy<Selector> =
    Lazy::new(|| Selector::parse("[data-testid='experience'], .agent-experience").unwrap());
static FIRST_YEAR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("[data-testid='first-year'], .first-year").unwrap());
static RATING: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("[data-testid='rating'], .rating-value, .review-rating").unwrap()
});
static REVIEW_COUNT: Lazy<Selector> =
    Lazy::new(|| Selector::parse("[data-testid='review-count'], .review-count").unwrap());
static PHONES: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("[data-testid='phone'], .agent-phone, a[href^='tel:']").unwrap()
});
static ADDRESS: Lazy<Selector> =
    Lazy::new(|| Selector::parse("[data-testid='address'], .agent-address, address").unwrap());
static OFFICE: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("[data-testid='office-info'], .office-info, .brokerage").unwrap()
});
static OFFICE_NAME: Lazy<Selector> = Lazy::new(|| Selector::parse("h2, h3").unwrap());
static OFFICE_ADDRESS: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("[data-testid='office-address'], .office-address, address").unwrap()
});
static ANCHOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());
static BROKER: Lazy<Selector> =
    Lazy::new(|| Selector::parse("[data-testid='broker'], .broker-info").unwrap());
static BROKER_NAME: Lazy<Selector> =
    Lazy::new(|| Selector::parse("[data-testid='broker-name'], .broker-name, strong").unwrap());
static SPECIALIZATIONS: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("[data-testid='specialties'] li, .specialties li").unwrap()
});
static REVIEWS: Lazy<Selector> =
    Lazy::new(|| Selector::parse("[data-testid='review'], .review-card").unwrap());
static REVIEW_RATING: Lazy<Selector> =
    Lazy::new(|| Selector::parse("[data-testid='rating'], .rating").unwrap());
static REVIEW_COMMENT: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".comment, .review-text, p").unwrap());
static REVIEW_DATE: Lazy<Selector> =
    Lazy::new(|| Selector::parse("time, .review-date").unwrap());
static RECOMMENDATIONS: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("[data-testid='recommendation'], .recommendation-card").unwrap()
});
static FOR_SALE: Lazy<Selector> =
    Lazy::new(|| Selector::parse("[data-testid='for-sale'], .for-sale-summary").unwrap());
static RECENTLY_SOLD: Lazy<Selector> =
    Lazy::new(|| Selector::parse("[data-testid='recently-sold'], .recently-sold").unwrap());
static META_ADVERTISER: Lazy<Selector> =
    Lazy::new(|| Selector::parse("meta[name='advertiser-id']").unwrap());

static EXT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)ext\.?\s*(\d+)").unwrap());
static YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(19|20)\d{2}\b").unwrap());
static PRICE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$([\d,]+)").unwrap());

fn text_of(element: ElementRef) -> String {
    collapse_ws(&element.text().collect::<Vec<_>>().join(" "))
}

fn first_text(document: &Html, selector: &Selector) -> Option<String> {
    document
        .select(selector)
        .next()
        .map(text_of)
        .filter(|s| !s.is_empty())
}

/// Parse one agent profile page into raw fields.
///
/// Fails only when the page carries no recognizable profile root (error
/// pages, redirects to search, interstitials); everything else degrades
/// field by field.
#[instrument(level = "debug", skip(html))]
pub fn parse_profile(url: &str, html: &str) -> Result<RawAgentFields, ParseError> {
    let document = Html::parse_document(html);

    let root = document
        .select(&PROFILE_ROOT)
        .next()
        .ok_or_else(|| ParseError::UnrecognizedPage {
            url: url.to_string(),
        })?;

    let mut raw = RawAgentFields {
        web_url: url.to_string(),
        ..RawAgentFields::default()
    };

    raw.advertiser_id = root
        .value()
        .attr("data-advertiser-id")
        .map(str::to_string)
        .or_else(|| {
            document
                .select(&META_ADVERTISER)
                .next()
                .and_then(|m| m.value().attr("content"))
                .map(str::to_string)
        })
        .filter(|s| !s.trim().is_empty());

    raw.title = first_text(&document, &TITLE);
    raw.description = first_text(&document, &DESCRIPTION);
    raw.photo = document
        .select(&PHOTO)
        .next()
        .and_then(|img| img.value().attr("src"))
        .map(str::to_string);

    raw.experience = first_text(&document, &EXPERIENCE);
    raw.first_year = first_text(&document, &FIRST_YEAR)
        .as_deref()
        .and_then(extract_year)
        .or_else(|| raw.experience.as_deref().and_then(extract_year));

    raw.agent_rating = first_text(&document, &RATING).as_deref().and_then(coerce_float);
    raw.review_count = first_text(&document, &REVIEW_COUNT)
        .as_deref()
        .and_then(coerce_int)
        .and_then(|n| u32::try_from(n).ok());

    for node in document.select(&PHONES) {
        let text = text_of(node);
        let href_number = node
            .value()
            .attr("href")
            .and_then(|h| h.strip_prefix("tel:"))
            .map(str::to_string);
        if let Some(phone) = parse_phone(&text, href_number) {
            raw.phones.push(phone);
        }
    }

    raw.address = first_text(&document, &ADDRESS);

    if let Some(block) = document.select(&OFFICE).next() {
        raw.office_name = block.select(&OFFICE_NAME).next().map(text_of);
        raw.office_website = block
            .select(&ANCHOR)
            .next()
            .and_then(|a| a.value().attr("href"))
            .map(str::to_string);
        raw.office_address = block
            .select(&OFFICE_ADDRESS)
            .next()
            .map(text_of)
            .filter(|s| !s.is_empty());
    }

    if let Some(block) = document.select(&BROKER).next() {
        let name = block
            .select(&BROKER_NAME)
            .next()
            .map(text_of)
            .filter(|s| !s.is_empty())
            .or_else(|| Some(text_of(block)).filter(|s| !s.is_empty()));
        let website = block
            .select(&ANCHOR)
            .next()
            .and_then(|a| a.value().attr("href"))
            .map(str::to_string);
        if name.is_some() || website.is_some() {
            raw.broker = Some(Broker { name, website });
        }
    }

    parse_detail_sections(&document, &mut raw);

    raw.for_sale = first_text(&document, &FOR_SALE)
        .as_deref()
        .map(parse_price_summary);
    raw.recently_sold = first_text(&document, &RECENTLY_SOLD)
        .as_deref()
        .and_then(coerce_int)
        .and_then(|n| u32::try_from(n).ok())
        .map(|count| SoldSummary { count: Some(count) });

    debug!(
        url,
        advertiser_id = ?raw.advertiser_id,
        phones = raw.phones.len(),
        "Parsed agent profile"
    );
    Ok(raw)
}

/// Parse the deep-details sub-page fetched under `fullAgentDetails`.
///
/// Tolerates any page shape: sections found here replace the inline ones
/// from the main profile page; sections absent leave the inline data
/// standing.
pub fn parse_profile_details(html: &str, raw: &mut RawAgentFields) {
    let document = Html::parse_document(html);
    parse_detail_sections(&document, raw);
}

/// Specializations, reviews, and recommendations appear both inline on
/// profile pages and expanded on the details sub-page. Found sections
/// overwrite, absent sections are left alone.
fn parse_detail_sections(document: &Html, raw: &mut RawAgentFields) {
    let specs: Vec<String> = document
        .select(&SPECIALIZATIONS)
        .map(text_of)
        .filter(|s| !s.is_empty())
        .collect();
    if !specs.is_empty() {
        raw.specializations = specs;
    }

    let reviews: Vec<Review> = document
        .select(&REVIEWS)
        .filter_map(|card| {
            let rating = card
                .select(&REVIEW_RATING)
                .next()
                .map(text_of)
                .as_deref()
                .and_then(coerce_float);
            let comment = card
                .select(&REVIEW_COMMENT)
                .next()
                .map(text_of)
                .filter(|s| !s.is_empty());
            let date = card
                .select(&REVIEW_DATE)
                .next()
                .map(text_of)
                .filter(|s| !s.is_empty());
            if rating.is_none() && comment.is_none() && date.is_none() {
                None
            } else {
                Some(Review {
                    rating,
                    comment,
                    date,
                })
            }
        })
        .collect();
    if !reviews.is_empty() {
        raw.reviews = reviews;
    }

    let recs: Vec<String> = document
        .select(&RECOMMENDATIONS)
        .map(text_of)
        .filter(|s| !s.is_empty())
        .collect();
    if !recs.is_empty() {
        raw.recommendations = recs;
    }
}

/// Split one phone node's text into number text, label, and extension.
fn parse_phone(text: &str, href_number: Option<String>) -> Option<crate::models::Phone> {
    let lower = text.to_ascii_lowercase();
    let phone_type = if lower.contains("mobile") {
        Some("Mobile".to_string())
    } else if lower.contains("office") {
        Some("Office".to_string())
    } else if lower.contains("fax") {
        Some("Fax".to_string())
    } else {
        None
    };

    let extension = EXT_RE
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string());

    // Keep extension digits out of the number text.
    let number_text = match EXT_RE.find(text) {
        Some(m) => text[..m.start()].to_string(),
        None => text.to_string(),
    };
    let number = href_number.unwrap_or(number_text);
    if number.trim().is_empty() {
        return None;
    }

    Some(crate::models::Phone {
        number,
        phone_type,
        extension,
    })
}

fn extract_year(text: &str) -> Option<i32> {
    YEAR_RE.find(text).and_then(|m| m.as_str().parse().ok())
}

/// Pull `{min, max, count}` out of a summary line like
/// "12 listings for sale from $250,000 to $1,200,000".
fn parse_price_summary(text: &str) -> PriceSummary {
    let count = coerce_int(text).and_then(|n| u32::try_from(n).ok());
    let prices: Vec<i64> = PRICE_RE
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .filter_map(|m| m.as_str().replace(',', "").parse().ok())
        .collect();
    PriceSummary {
        min: prices.iter().min().copied(),
        max: prices.iter().max().copied(),
        count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_PROFILE: &str = r#"<html><body>
      <div data-testid="agent-profile" data-advertiser-id="9081726354">
        <h1>Jane Doe</h1>
        <div data-testid="agent-description">Twin Cities  agent focused on
          first-time buyers.</div>
        <img src="https://ap.rdcpix.com/photo/jane.jpg" alt="agent photo">
        <div data-testid="experience">In business since 2016</div>
        <span data-testid="rating">4.9 out of 5</span>
        <span data-testid="review-count">27 reviews</span>
        <a href="tel:+16125550100" data-testid="phone">Mobile: (612) 555-0100</a>
        <div class="agent-phone">Office: (612) 555-0199 ext. 204</div>
        <div data-testid="address">500 Nicollet Mall, Minneapolis, MN 55402</div>
        <div data-testid="office-info">
          <h2>Lakeside Realty Group</h2>
          <a href="https://lakesiderealty.example.com">Website</a>
          <div class="office-address">120 Lake St W, Minneapolis, MN 55408</div>
        </div>
        <div data-testid="broker">
          <span data-testid="broker-name">North Star Brokerage</span>
        </div>
        <ul data-testid="specialties"><li>Buyer agent</li><li>Relocation</li></ul>
        <div data-testid="review">
          <span class="rating">5.0</span>
          <p class="comment">Jane made the whole process painless.</p>
          <time>2024-11-02</time>
        </div>
        <div data-testid="recommendation">Best agent we ever worked with.</div>
        <div data-testid="for-sale">12 listings for sale from $250,000 to $1,200,000</div>
        <div data-testid="recently-sold">34 homes recently sold</div>
      </div>
    </body></html>"#;

    const URL: &str = "https://www.realtor.com/realestateagents/jane-doe";

    #[test]
    fn test_full_profile_parse() {
        let raw = parse_profile(URL, FULL_PROFILE).unwrap();
        assert_eq!(raw.advertiser_id.as_deref(), Some("9081726354"));
        assert_eq!(raw.title.as_deref(), Some("Jane Doe"));
        assert_eq!(
            raw.description.as_deref(),
            Some("Twin Cities agent focused on first-time buyers.")
        );
        assert_eq!(raw.first_year, Some(2016));
        assert_eq!(raw.agent_rating, Some(4.9));
        assert_eq!(raw.review_count, Some(27));
        assert_eq!(raw.phones.len(), 2);
        assert_eq!(raw.phones[0].number, "+16125550100");
        assert_eq!(raw.phones[0].phone_type.as_deref(), Some("Mobile"));
        assert_eq!(raw.phones[1].phone_type.as_deref(), Some("Office"));
        assert_eq!(raw.phones[1].extension.as_deref(), Some("204"));
        assert_eq!(raw.office_name.as_deref(), Some("Lakeside Realty Group"));
        assert_eq!(
            raw.office_address.as_deref(),
            Some("120 Lake St W, Minneapolis, MN 55408")
        );
        assert_eq!(
            raw.broker.as_ref().and_then(|b| b.name.as_deref()),
            Some("North Star Brokerage")
        );
        assert_eq!(raw.specializations, vec!["Buyer agent", "Relocation"]);
        assert_eq!(raw.reviews.len(), 1);
        assert_eq!(raw.reviews[0].rating, Some(5.0));
        assert_eq!(raw.recommendations.len(), 1);
        let for_sale = raw.for_sale.unwrap();
        assert_eq!(for_sale.count, Some(12));
        assert_eq!(for_sale.min, Some(250_000));
        assert_eq!(for_sale.max, Some(1_200_000));
        assert_eq!(raw.recently_sold.unwrap().count, Some(34));
    }

    #[test]
    fn test_unrecognized_page_fails_whole_parse() {
        let html = "<html><body><h1>404</h1><p>Page not found</p></body></html>";
        let err = parse_profile(URL, html).unwrap_err();
        assert!(matches!(err, ParseError::UnrecognizedPage { .. }));
    }

    #[test]
    fn test_missing_fields_stay_unknown() {
        let html = r#"<html><body><div class="agent-profile"><h1>John Roe</h1></div></body></html>"#;
        let raw = parse_profile(URL, html).unwrap();
        assert_eq!(raw.title.as_deref(), Some("John Roe"));
        assert_eq!(raw.review_count, None);
        assert_eq!(raw.agent_rating, None);
        assert_eq!(raw.first_year, None);
        assert!(raw.phones.is_empty());
        assert!(raw.office_name.is_none());
    }

    #[test]
    fn test_explicit_zero_reviews_is_zero_not_unknown() {
        let html = r#"<html><body><div class="agent-profile">
            <h1>John Roe</h1>
            <span data-testid="review-count">0 reviews</span>
        </div></body></html>"#;
        let raw = parse_profile(URL, html).unwrap();
        assert_eq!(raw.review_count, Some(0));
    }

    #[test]
    fn test_malformed_numbers_become_unknown_not_zero() {
        let html = r#"<html><body><div class="agent-profile">
            <h1>John Roe</h1>
            <span data-testid="rating">No rating yet</span>
            <span data-testid="review-count">none</span>
        </div></body></html>"#;
        let raw = parse_profile(URL, html).unwrap();
        assert_eq!(raw.agent_rating, None);
        assert_eq!(raw.review_count, None);
    }

    #[test]
    fn test_repeated_parse_is_identical() {
        let a = parse_profile(URL, FULL_PROFILE).unwrap();
        let b = parse_profile(URL, FULL_PROFILE).unwrap();
        assert_eq!(format!("{a:?}"), format!("{b:?}"));
    }

    #[test]
    fn test_details_page_overwrites_inline_sections() {
        let mut raw = parse_profile(URL, FULL_PROFILE).unwrap();
        let details = r#"<html><body>
          <ul data-testid="specialties">
            <li>Buyer agent</li><li>Relocation</li><li>Waterfront</li>
          </ul>
          <div data-testid="review"><span class="rating">4.0</span>
            <p class="comment">Solid experience overall.</p></div>
          <div data-testid="review"><span class="rating">5.0</span>
            <p class="comment">Would hire again.</p></div>
        </body></html>"#;
        parse_profile_details(details, &mut raw);
        assert_eq!(raw.specializations.len(), 3);
        assert_eq!(raw.reviews.len(), 2);
        // Sections absent from the details page keep the inline data.
        assert_eq!(raw.recommendations.len(), 1);
    }

    #[test]
    fn test_price_summary_parsing() {
        let summary = parse_price_summary("3 listings for sale from $420,000 to $890,500");
        assert_eq!(summary.count, Some(3));
        assert_eq!(summary.min, Some(420_000));
        assert_eq!(summary.max, Some(890_500));

        let bare = parse_price_summary("listings for sale");
        assert_eq!(bare.count, None);
        assert_eq!(bare.min, None);
    }
}
