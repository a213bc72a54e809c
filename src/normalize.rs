//! Field normalization and stable identity/content hashing.
//!
//! [`normalize`] turns raw parser output into the canonical
//! [`AgentRecord`] shape: cleaned strings, canonical phone numbers, a
//! consistent address field set, and a stable identity key.
//!
//! [`content_hash`] is the change-detection fingerprint. Its central
//! invariant: two parses of byte-identical page content normalize to
//! byte-identical records and identical hashes. Nothing time- or
//! order-of-iteration-dependent goes into it; the one unordered
//! collection (`specializations`) is hashed from a sorted copy while the
//! record itself keeps page order for display.

use crate::discover::canonical_url;
use crate::models::{Address, AgentRecord, Office, Phone, RawAgentFields, Review};
use crate::utils::collapse_ws;
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};

/// Review comments longer than this are cut to keep exports bounded.
const MAX_COMMENT_LEN: usize = 2000;

static INT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d[\d,]*").unwrap());
static FLOAT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+(?:\.\d+)?").unwrap());
static ADDRESS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(.*?),\s*([^,]+),\s*([A-Z]{2})\s+(\d{5}(?:-\d{4})?)$").unwrap()
});

/// First integer in a text blob; absent or non-numeric text is `None`,
/// never zero.
pub fn coerce_int(text: &str) -> Option<i64> {
    INT_RE
        .find(text)
        .and_then(|m| m.as_str().replace(',', "").parse().ok())
}

/// First decimal number in a text blob, same unknown policy as
/// [`coerce_int`].
pub fn coerce_float(text: &str) -> Option<f64> {
    FLOAT_RE.find(text).and_then(|m| m.as_str().parse().ok())
}

fn clean_text(value: Option<String>) -> Option<String> {
    value
        .map(|s| collapse_ws(&s))
        .filter(|s| !s.is_empty())
}

/// Canonicalize one phone entry: digits plus a leading `+`, labels and
/// extensions trimmed. Entries with no digits at all are dropped.
fn clean_phone(phone: Phone) -> Option<Phone> {
    let number: String = phone
        .number
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '+')
        .collect();
    if number.chars().filter(|c| c.is_ascii_digit()).count() == 0 {
        return None;
    }
    Some(Phone {
        number,
        phone_type: clean_text(phone.phone_type),
        extension: clean_text(phone.extension),
    })
}

/// Split "500 Nicollet Mall, Minneapolis, MN 55402" into components.
/// Text that does not match the common shape lands whole in `line`.
fn parse_address(text: &str) -> Option<Address> {
    let text = collapse_ws(text);
    if text.is_empty() {
        return None;
    }
    match ADDRESS_RE.captures(&text) {
        Some(caps) => Some(Address {
            line: Some(caps[1].to_string()),
            city: Some(caps[2].to_string()),
            state: Some(caps[3].to_string()),
            postal_code: Some(caps[4].to_string()),
        }),
        None => Some(Address {
            line: Some(text),
            city: None,
            state: None,
            postal_code: None,
        }),
    }
}

fn clean_review(review: Review) -> Review {
    let comment = clean_text(review.comment).map(|text| {
        if text.chars().count() > MAX_COMMENT_LEN {
            let truncated: String = text.chars().take(MAX_COMMENT_LEN).collect();
            format!("{truncated}...")
        } else {
            text
        }
    });
    Review {
        rating: review.rating,
        comment,
        date: clean_text(review.date),
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Derive the stable identity key for a record.
///
/// The site's advertiser id wins when present; otherwise the identity is
/// derived from the canonical profile URL. The prefixes keep the two
/// schemes from ever colliding.
pub fn derive_identity(advertiser_id: Option<&str>, web_url: &str) -> String {
    match advertiser_id.map(str::trim).filter(|s| !s.is_empty()) {
        Some(id) => format!("advertiser:{id}"),
        None => {
            let digest = sha256_hex(web_url.as_bytes());
            format!("url:{}", &digest[..16])
        }
    }
}

/// Canonicalize raw parser output into an [`AgentRecord`].
pub fn normalize(raw: RawAgentFields) -> AgentRecord {
    let web_url = canonical_url(&raw.web_url).unwrap_or(raw.web_url);
    let advertiser_id = clean_text(raw.advertiser_id);
    let identity = derive_identity(advertiser_id.as_deref(), &web_url);

    let phones: Vec<Phone> = raw
        .phones
        .into_iter()
        .filter_map(clean_phone)
        .unique_by(|p| p.number.clone())
        .collect();

    let specializations: Vec<String> = raw
        .specializations
        .into_iter()
        .map(|s| collapse_ws(&s))
        .filter(|s| !s.is_empty())
        .unique()
        .collect();

    let recommendations: Vec<String> = raw
        .recommendations
        .into_iter()
        .map(|s| collapse_ws(&s))
        .filter(|s| !s.is_empty())
        .unique()
        .collect();

    let reviews: Vec<Review> = raw.reviews.into_iter().map(clean_review).collect();

    let office_name = clean_text(raw.office_name);
    let office_website = clean_text(raw.office_website);
    let office_address = raw.office_address.as_deref().and_then(parse_address);
    let office = if office_name.is_some() || office_website.is_some() || office_address.is_some() {
        Some(Office {
            name: office_name,
            website: office_website,
            address: office_address,
        })
    } else {
        None
    };

    let broker = raw.broker.and_then(|b| {
        let name = clean_text(b.name);
        let website = clean_text(b.website);
        if name.is_some() || website.is_some() {
            Some(crate::models::Broker { name, website })
        } else {
            None
        }
    });

    AgentRecord {
        identity,
        advertiser_id,
        web_url,
        title: clean_text(raw.title),
        description: clean_text(raw.description),
        photo: clean_text(raw.photo),
        experience: clean_text(raw.experience),
        first_year: raw.first_year,
        agent_rating: raw.agent_rating,
        review_count: raw.review_count,
        phones,
        specializations,
        reviews,
        recommendations,
        address: raw.address.as_deref().and_then(parse_address),
        office,
        broker,
        for_sale: raw.for_sale,
        recently_sold: raw.recently_sold,
    }
}

/// Deterministic fingerprint over all normalized fields of a record.
///
/// Serializes a copy of the record with `specializations` sorted, then
/// hashes the JSON bytes. Struct field order is fixed by the type
/// definition and `serde_json` emits no map-iteration-order or timestamp
/// dependence, so identical records always produce identical hashes.
/// Reviews keep page order in the hash: a reordered review feed reads as
/// a content change.
pub fn content_hash(record: &AgentRecord) -> String {
    let mut canonical = record.clone();
    canonical.specializations.sort();
    let json = serde_json::to_string(&canonical)
        .unwrap_or_else(|_| format!("{}|{}", canonical.identity, canonical.web_url));
    sha256_hex(json.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Broker, Phone};

    fn raw_fixture() -> RawAgentFields {
        RawAgentFields {
            advertiser_id: Some("9081726354".to_string()),
            web_url: "https://www.realtor.com/realestateagents/jane-doe?utm_source=x".to_string(),
            title: Some("  Jane   Doe ".to_string()),
            first_year: Some(2016),
            review_count: None,
            phones: vec![
                Phone {
                    number: "Mobile: (612) 555-0100".to_string(),
                    phone_type: Some("Mobile".to_string()),
                    extension: None,
                },
                Phone {
                    number: "(612) 555-0100".to_string(),
                    phone_type: None,
                    extension: None,
                },
            ],
            address: Some("500 Nicollet Mall, Minneapolis, MN 55402".to_string()),
            specializations: vec!["Relocation".to_string(), "Buyer agent".to_string()],
            ..RawAgentFields::default()
        }
    }

    #[test]
    fn test_coerce_int_policy() {
        assert_eq!(coerce_int("27 reviews"), Some(27));
        assert_eq!(coerce_int("1,234 homes"), Some(1234));
        assert_eq!(coerce_int("0 reviews"), Some(0));
        assert_eq!(coerce_int("no reviews"), None);
        assert_eq!(coerce_int(""), None);
    }

    #[test]
    fn test_coerce_float_policy() {
        assert_eq!(coerce_float("4.9 out of 5"), Some(4.9));
        assert_eq!(coerce_float("5"), Some(5.0));
        assert_eq!(coerce_float("n/a"), None);
    }

    #[test]
    fn test_identity_prefers_advertiser_id() {
        let record = normalize(raw_fixture());
        assert_eq!(record.identity, "advertiser:9081726354");
    }

    #[test]
    fn test_identity_from_url_is_stable() {
        let mut raw = raw_fixture();
        raw.advertiser_id = None;
        let a = normalize(raw.clone());
        let b = normalize(raw);
        assert_eq!(a.identity, b.identity);
        assert!(a.identity.starts_with("url:"));
        assert_eq!(a.identity.len(), "url:".len() + 16);
    }

    #[test]
    fn test_identity_ignores_tracking_params() {
        let mut a = raw_fixture();
        a.advertiser_id = None;
        let mut b = a.clone();
        b.web_url = "https://www.realtor.com/realestateagents/jane-doe".to_string();
        assert_eq!(normalize(a).identity, normalize(b).identity);
    }

    #[test]
    fn test_phones_canonicalized_and_deduped() {
        let record = normalize(raw_fixture());
        // Both raw entries canonicalize to the same digits.
        assert_eq!(record.phones.len(), 1);
        assert_eq!(record.phones[0].number, "6125550100");
        assert_eq!(record.phones[0].phone_type.as_deref(), Some("Mobile"));
    }

    #[test]
    fn test_phone_with_no_digits_is_dropped() {
        let mut raw = raw_fixture();
        raw.phones = vec![Phone {
            number: "call me".to_string(),
            phone_type: None,
            extension: None,
        }];
        assert!(normalize(raw).phones.is_empty());
    }

    #[test]
    fn test_address_components() {
        let record = normalize(raw_fixture());
        let addr = record.address.unwrap();
        assert_eq!(addr.line.as_deref(), Some("500 Nicollet Mall"));
        assert_eq!(addr.city.as_deref(), Some("Minneapolis"));
        assert_eq!(addr.state.as_deref(), Some("MN"));
        assert_eq!(addr.postal_code.as_deref(), Some("55402"));
    }

    #[test]
    fn test_unstructured_address_falls_back_to_line() {
        let mut raw = raw_fixture();
        raw.address = Some("Downtown   Minneapolis".to_string());
        let addr = normalize(raw).address.unwrap();
        assert_eq!(addr.line.as_deref(), Some("Downtown Minneapolis"));
        assert!(addr.city.is_none());
    }

    #[test]
    fn test_broker_with_empty_fields_is_dropped() {
        let mut raw = raw_fixture();
        raw.broker = Some(Broker {
            name: Some("   ".to_string()),
            website: None,
        });
        assert!(normalize(raw).broker.is_none());
    }

    #[test]
    fn test_long_review_comment_is_truncated() {
        let mut raw = raw_fixture();
        raw.reviews = vec![crate::models::Review {
            rating: Some(5.0),
            comment: Some("x".repeat(3000)),
            date: None,
        }];
        let record = normalize(raw);
        let comment = record.reviews[0].comment.as_ref().unwrap();
        assert_eq!(comment.chars().count(), MAX_COMMENT_LEN + 3);
        assert!(comment.ends_with("..."));
    }

    #[test]
    fn test_unknown_review_count_stays_unknown() {
        let record = normalize(raw_fixture());
        assert_eq!(record.review_count, None);
        let mut raw = raw_fixture();
        raw.review_count = Some(0);
        assert_eq!(normalize(raw).review_count, Some(0));
    }

    #[test]
    fn test_content_hash_is_stable() {
        let a = normalize(raw_fixture());
        let b = normalize(raw_fixture());
        assert_eq!(content_hash(&a), content_hash(&b));
    }

    #[test]
    fn test_content_hash_sees_field_changes() {
        let a = normalize(raw_fixture());
        let mut raw = raw_fixture();
        raw.first_year = Some(2017);
        let b = normalize(raw);
        assert_ne!(content_hash(&a), content_hash(&b));
    }

    #[test]
    fn test_specialization_order_affects_record_not_hash() {
        let a = normalize(raw_fixture());
        let mut shuffled = raw_fixture();
        shuffled.specializations.reverse();
        let b = normalize(shuffled);
        assert_ne!(a.specializations, b.specializations);
        assert_eq!(content_hash(&a), content_hash(&b));
    }

    #[test]
    fn test_review_order_does_affect_hash() {
        let mut raw = raw_fixture();
        raw.reviews = vec![
            crate::models::Review {
                rating: Some(5.0),
                comment: Some("great".to_string()),
                date: None,
            },
            crate::models::Review {
                rating: Some(3.0),
                comment: Some("fine".to_string()),
                date: None,
            },
        ];
        let a = normalize(raw.clone());
        raw.reviews.reverse();
        let b = normalize(raw);
        assert_ne!(content_hash(&a), content_hash(&b));
    }
}
