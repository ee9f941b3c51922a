use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Lowest and highest star bucket on a review distribution.
pub const MIN_STAR: u8 = 1;
pub const MAX_STAR: u8 = 5;

/// Review aggregates harvested from one product review page.
///
/// Assembled once per successfully-processed URL and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReviewDetails {
    /// Company the reviews are about; `"Unknown"` when the page does not say.
    pub company_name: String,
    pub review_count: Option<String>,
    pub average_rating: Option<String>,
    /// Company website, percent-decoded.
    #[serde(default)]
    pub website: Option<String>,
    /// Star bucket ("1".."5") → review count for that bucket.
    pub ratings: BTreeMap<String, Option<String>>,
    /// Source URL the record was harvested from.
    pub g2_url: String,
}

impl ReviewDetails {
    /// An all-absent ratings map with every star bucket present.
    pub fn empty_ratings() -> BTreeMap<String, Option<String>> {
        (MIN_STAR..=MAX_STAR)
            .map(|star| (star.to_string(), None))
            .collect()
    }
}

/// Accumulated run output: company name → its review aggregates.
///
/// Serializes transparently as one JSON object keyed by company name.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompanyDetailsIndex {
    companies: BTreeMap<String, ReviewDetails>,
}

impl CompanyDetailsIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record under its company name. Duplicate names overwrite
    /// (last write wins), logged so the replacement is visible in the run log.
    pub fn insert(&mut self, details: ReviewDetails) {
        let key = details.company_name.clone();
        if let Some(previous) = self.companies.insert(key, details) {
            warn!(
                company = %previous.company_name,
                replaced_url = %previous.g2_url,
                "duplicate company name, keeping the later record"
            );
        }
    }

    pub fn get(&self, company_name: &str) -> Option<&ReviewDetails> {
        self.companies.get(company_name)
    }

    pub fn len(&self) -> usize {
        self.companies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.companies.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ReviewDetails)> {
        self.companies.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn details(name: &str, url: &str) -> ReviewDetails {
        ReviewDetails {
            company_name: name.to_string(),
            review_count: Some("12".to_string()),
            average_rating: Some("4.5".to_string()),
            website: None,
            ratings: ReviewDetails::empty_ratings(),
            g2_url: url.to_string(),
        }
    }

    #[test]
    fn empty_ratings_covers_every_star_bucket() {
        let ratings = ReviewDetails::empty_ratings();
        assert_eq!(ratings.len(), 5);
        for star in 1..=5u8 {
            assert_eq!(ratings.get(&star.to_string()), Some(&None));
        }
    }

    #[test]
    fn duplicate_company_names_keep_the_later_record() {
        let mut index = CompanyDetailsIndex::new();
        index.insert(details("Acme", "https://www.g2.com/products/acme/reviews"));
        index.insert(details("Acme", "https://www.g2.com/products/acme-2/reviews"));

        assert_eq!(index.len(), 1);
        assert_eq!(
            index.get("Acme").map(|d| d.g2_url.as_str()),
            Some("https://www.g2.com/products/acme-2/reviews")
        );
    }

    #[test]
    fn index_serializes_as_object_keyed_by_company_name() {
        let mut index = CompanyDetailsIndex::new();
        index.insert(details("Acme", "https://www.g2.com/products/acme/reviews"));

        let json = serde_json::to_value(&index).unwrap();
        let record = &json["Acme"];
        assert_eq!(record["company_name"], "Acme");
        assert_eq!(record["review_count"], "12");
        assert_eq!(record["average_rating"], "4.5");
        assert_eq!(record["website"], serde_json::Value::Null);
        assert_eq!(record["g2_url"], "https://www.g2.com/products/acme/reviews");
        assert_eq!(record["ratings"]["1"], serde_json::Value::Null);
        assert_eq!(record["ratings"]["5"], serde_json::Value::Null);
    }
}
