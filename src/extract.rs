//! Per-field extraction over rendered review-page HTML.
//!
//! Every extractor is a pure function over a parsed document. A missing
//! element or attribute is logged and yields an absent value for that field
//! only, so a thin page still produces a record.

use percent_encoding::percent_decode_str;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::core::types::{ReviewDetails, MAX_STAR, MIN_STAR};

/// Assemble the full record for one page.
pub fn review_details(document: &Html, source_url: &str) -> ReviewDetails {
    let mut ratings = ReviewDetails::empty_ratings();
    for star in MIN_STAR..=MAX_STAR {
        ratings.insert(star.to_string(), star_rating_count(document, star));
    }

    ReviewDetails {
        company_name: company_name(document),
        review_count: review_count(document),
        average_rating: average_rating(document),
        website: website(document),
        ratings,
        g2_url: source_url.to_string(),
    }
}

/// Company the page reviews; `"Unknown"` when the meta tag is absent.
pub fn company_name(document: &Html) -> String {
    meta_itemprop_content(document, "itemReviewed")
        .unwrap_or_else(|| "Unknown".to_string())
}

pub fn review_count(document: &Html) -> Option<String> {
    meta_itemprop_content(document, "reviewCount")
}

pub fn average_rating(document: &Html) -> Option<String> {
    meta_itemprop_content(document, "ratingValue")
}

/// Company website: the link following the container labeled "Website",
/// percent-decoded.
pub fn website(document: &Html) -> Option<String> {
    let Ok(div_sel) = Selector::parse("div") else {
        return None;
    };

    let label = document
        .select(&div_sel)
        .find(|el| el.text().collect::<String>().trim() == "Website");
    let Some(label) = label else {
        debug!("no labeled website container on this page");
        return None;
    };

    let Some(sibling) = label.next_siblings().find_map(ElementRef::wrap) else {
        debug!("website label has no element sibling");
        return None;
    };

    let href = sibling.value().attr("href").or_else(|| {
        let a_sel = Selector::parse("a[href]").ok()?;
        sibling
            .select(&a_sel)
            .next()
            .and_then(|a| a.value().attr("href"))
    });

    match href {
        Some(href) if !href.is_empty() => {
            Some(percent_decode_str(href).decode_utf8_lossy().into_owned())
        }
        _ => {
            debug!("website sibling carries no link target");
            None
        }
    }
}

/// Review count for one star bucket: the right-aligned counter next to the
/// radio control whose value equals the star level. Thousands separators and
/// surrounding whitespace are stripped.
pub fn star_rating_count(document: &Html, star: u8) -> Option<String> {
    let selector = format!(r#"input[type="radio"][value="{star}"]"#);
    let Ok(radio_sel) = Selector::parse(&selector) else {
        return None;
    };

    let Some(radio) = document.select(&radio_sel).next() else {
        debug!(star, "no radio control for this star level");
        return None;
    };

    let Some(sibling) = radio.next_siblings().find_map(ElementRef::wrap) else {
        debug!(star, "star radio has no element sibling");
        return None;
    };

    let counter_sel = Selector::parse("div.text-right").ok()?;
    let Some(counter) = sibling.select(&counter_sel).next() else {
        debug!(star, "no counter element beside the star radio");
        return None;
    };

    let count = counter
        .text()
        .collect::<String>()
        .replace(',', "")
        .trim()
        .to_string();
    if count.is_empty() {
        None
    } else {
        Some(count)
    }
}

fn meta_itemprop_content(document: &Html, itemprop: &str) -> Option<String> {
    let selector = format!(r#"meta[itemprop="{itemprop}"]"#);
    let Ok(sel) = Selector::parse(&selector) else {
        return None;
    };

    let content = document
        .select(&sel)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty());

    if content.is_none() {
        debug!(itemprop, "meta tag missing or empty");
    }
    content
}
