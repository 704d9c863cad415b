//! Core domain types: raw listings, canonical records, and sources.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use url::Url;

use crate::dates::pick_sold_date;
use crate::error::{HarvestError, Result};

// ---------------------------------------------------------------------------
// Source
// ---------------------------------------------------------------------------

/// One auction house, identified by its base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    base: String,
    host: String,
}

impl Source {
    /// Parse a base URL such as `https://bid.example.com`.
    ///
    /// A trailing slash is dropped so derived URLs never contain `//`.
    pub fn parse(base_url: &str) -> Result<Self> {
        let trimmed = base_url.trim().trim_end_matches('/');
        let url = Url::parse(trimmed)
            .map_err(|e| HarvestError::validation(format!("invalid source URL '{base_url}': {e}")))?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(HarvestError::validation(format!(
                "source URL must be http(s): {base_url}"
            )));
        }

        let host = url
            .host_str()
            .ok_or_else(|| HarvestError::validation(format!("source URL has no host: {base_url}")))?
            .to_string();

        Ok(Self {
            base: trimmed.to_string(),
            host,
        })
    }

    /// Base URL without trailing slash.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Host name, used to name the dataset file.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Dataset file name for this source: `{host}_lots.json`.
    pub fn dataset_file_name(&self) -> String {
        format!("{}_lots.json", self.host)
    }

    /// Public page of a lot: `{base}/lots/view/{row_id}`.
    pub fn lot_url(&self, row_id: &RowId) -> String {
        format!("{}/lots/view/{row_id}", self.base)
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base)
    }
}

// ---------------------------------------------------------------------------
// RowId
// ---------------------------------------------------------------------------

/// Stable lot identifier. Sources emit either integers or strings.
///
/// The two forms are distinct keys: `12` and `"12"` never merge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RowId {
    Int(i64),
    Text(String),
}

impl RowId {
    /// Extract an id from a raw JSON value. Empty strings, zero, and
    /// non-scalar values do not identify a lot.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().filter(|n| *n != 0).map(Self::Int),
            Value::String(s) if !s.is_empty() => Some(Self::Text(s.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

/// A lot exactly as the source's API returned it.
///
/// Kept untyped because schemas differ per auction house; the accessors below
/// are the only way the rest of the system reads it, and
/// [`CanonicalRecord::from_listing`] is where it becomes typed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Listing(pub Map<String, Value>);

impl Listing {
    /// Raw field value, if present.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Field value, only if present and JSON-truthy.
    pub fn truthy(&self, key: &str) -> Option<&Value> {
        self.get(key).filter(|v| is_truthy(v))
    }

    /// Field of the nested `auction` object, only if present and truthy.
    pub fn auction_field(&self, key: &str) -> Option<&Value> {
        self.get("auction")
            .and_then(Value::as_object)
            .and_then(|auction| auction.get(key))
            .filter(|v| is_truthy(v))
    }

    /// Lot identifier, if usable.
    pub fn row_id(&self) -> Option<RowId> {
        self.get("row_id").and_then(RowId::from_value)
    }

    pub fn title(&self) -> Option<&Value> {
        self.non_null("title")
    }

    pub fn status(&self) -> Option<&Value> {
        self.non_null("status")
    }

    /// Hammer price, non-null values only.
    pub fn sold_price(&self) -> Option<&Value> {
        self.non_null("sold_price")
    }

    /// Title of the auction this lot belonged to, whatever its JSON type.
    pub fn auction_title(&self) -> Option<&Value> {
        self.get("auction")
            .and_then(Value::as_object)
            .and_then(|auction| auction.get("title"))
            .filter(|v| !v.is_null())
    }

    /// Whether this lot represents a completed sale.
    pub fn is_sold(&self) -> bool {
        self.truthy("sold_price").is_some()
    }

    fn non_null(&self, key: &str) -> Option<&Value> {
        self.get(key).filter(|v| !v.is_null())
    }
}

/// JSON truthiness: null, false, zero, and empty strings/arrays/objects are false.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

// ---------------------------------------------------------------------------
// CanonicalRecord
// ---------------------------------------------------------------------------

/// A field that may be absent from the stored document, present as `null`,
/// or present with a value.
///
/// `None` is absent, `Some(None)` is an explicit `null`.
pub type Slot<T> = Option<Option<T>>;

/// A lot as persisted in a source's dataset.
///
/// Absent and `null` fields are kept apart so that merges only fill fields
/// the stored document genuinely lacks. Fields this type does not know about
/// are carried through in `extra`.
///
/// `row_id`, `title`, `status` and `auction_title` hold whatever JSON the
/// source sent, so datasets with numeric titles or a broken id still load.
/// A record whose id is unusable is kept but can never be merged into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub row_id: Slot<Value>,

    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub title: Slot<Value>,

    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub status: Slot<Value>,

    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub sold_price: Slot<Value>,

    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub url: Slot<String>,

    /// `YYYY-MM-DD` in UTC.
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub sold_date: Slot<String>,

    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub auction_title: Slot<Value>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CanonicalRecord {
    /// Build the full candidate record for a listing.
    ///
    /// Every known field is present in the result (possibly as `null`).
    /// Returns `None` when the listing has no usable `row_id`.
    pub fn from_listing(listing: &Listing, source: &Source) -> Option<Self> {
        let row_id = listing.row_id()?;
        let url = source.lot_url(&row_id);

        Some(Self {
            row_id: Some(listing.get("row_id").cloned()),
            title: Some(listing.title().cloned()),
            status: Some(listing.status().cloned()),
            sold_price: Some(listing.sold_price().cloned()),
            url: Some(Some(url)),
            sold_date: Some(pick_sold_date(listing)),
            auction_title: Some(listing.auction_title().cloned()),
            extra: Map::new(),
        })
    }

    /// Merge key, if the stored `row_id` identifies a lot.
    pub fn key(&self) -> Option<RowId> {
        self.row_id.as_ref()?.as_ref().and_then(RowId::from_value)
    }

    /// Whether the stored sale date is missing and may be backfilled.
    pub fn sold_date_is_blank(&self) -> bool {
        match &self.sold_date {
            None | Some(None) => true,
            Some(Some(date)) => date.is_empty() || date == "null",
        }
    }
}

/// Deserialize a field that is present in the document, `null` or not.
fn present<'de, D, T>(deserializer: D) -> std::result::Result<Slot<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn listing(value: Value) -> Listing {
        serde_json::from_value(value).expect("listing object")
    }

    fn source() -> Source {
        Source::parse("https://auctions.example.co.za/").unwrap()
    }

    #[test]
    fn source_parsing_and_derived_names() {
        let src = source();
        assert_eq!(src.base(), "https://auctions.example.co.za");
        assert_eq!(src.host(), "auctions.example.co.za");
        assert_eq!(src.dataset_file_name(), "auctions.example.co.za_lots.json");
        assert_eq!(
            src.lot_url(&RowId::Int(42)),
            "https://auctions.example.co.za/lots/view/42"
        );
    }

    #[test]
    fn source_rejects_bad_urls() {
        assert!(Source::parse("not a url").is_err());
        assert!(Source::parse("ftp://files.example.com").is_err());
    }

    #[test]
    fn row_id_extraction() {
        assert_eq!(RowId::from_value(&json!(17)), Some(RowId::Int(17)));
        assert_eq!(
            RowId::from_value(&json!("A-17")),
            Some(RowId::Text("A-17".into()))
        );
        assert_eq!(RowId::from_value(&json!("")), None);
        assert_eq!(RowId::from_value(&json!(0)), None);
        assert_eq!(RowId::from_value(&json!(null)), None);
        assert_eq!(RowId::from_value(&json!([1])), None);
    }

    #[test]
    fn truthiness() {
        assert!(!is_truthy(&json!(null)));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!(0.0)));
        assert!(!is_truthy(&json!("")));
        assert!(!is_truthy(&json!(false)));
        assert!(is_truthy(&json!(1500)));
        assert!(is_truthy(&json!("1500.00")));
    }

    #[test]
    fn sold_predicate() {
        assert!(listing(json!({ "sold_price": 1500 })).is_sold());
        assert!(!listing(json!({ "sold_price": null })).is_sold());
        assert!(!listing(json!({ "title": "Unsold vase" })).is_sold());
        assert!(!listing(json!({ "sold_price": 0 })).is_sold());
    }

    #[test]
    fn record_from_listing_fills_every_field() {
        let lot = listing(json!({
            "row_id": 99,
            "title": "Oak sideboard",
            "status": "closed",
            "sold_price": 1500,
            "extended_end_time": "2024-03-01T14:30:00Z",
            "auction": { "title": "March Estate Sale" },
            "irrelevant": true,
        }));

        let record = CanonicalRecord::from_listing(&lot, &source()).unwrap();
        assert_eq!(record.key(), Some(RowId::Int(99)));
        assert_eq!(record.title, Some(Some(json!("Oak sideboard"))));
        assert_eq!(record.sold_price, Some(Some(json!(1500))));
        assert_eq!(
            record.url,
            Some(Some("https://auctions.example.co.za/lots/view/99".into()))
        );
        assert_eq!(record.sold_date, Some(Some("2024-03-01".into())));
        assert_eq!(record.auction_title, Some(Some(json!("March Estate Sale"))));
        assert!(record.extra.is_empty());
    }

    #[test]
    fn non_string_fields_are_kept_as_sent() {
        let lot = listing(json!({
            "row_id": 1,
            "sold_price": 5,
            "status": 2,
            "title": 12345,
            "auction": { "title": 7 },
        }));

        let record = CanonicalRecord::from_listing(&lot, &source()).unwrap();
        assert_eq!(record.status, Some(Some(json!(2))));
        assert_eq!(record.title, Some(Some(json!(12345))));
        assert_eq!(record.auction_title, Some(Some(json!(7))));
    }

    #[test]
    fn stored_records_with_numeric_fields_load() {
        let records: Vec<CanonicalRecord> =
            serde_json::from_str(r#"[{"row_id": 1, "status": 2, "title": 12345}]"#).unwrap();
        assert_eq!(records[0].key(), Some(RowId::Int(1)));
        assert_eq!(records[0].status, Some(Some(json!(2))));
        assert_eq!(records[0].title, Some(Some(json!(12345))));
    }

    #[test]
    fn stored_records_without_usable_id_load_unkeyed() {
        let records: Vec<CanonicalRecord> = serde_json::from_str(
            r#"[{"row_id": null, "title": "x"}, {"title": "y"}, {"row_id": 0}]"#,
        )
        .unwrap();
        assert!(records.iter().all(|r| r.key().is_none()));

        let back = serde_json::to_value(&records).unwrap();
        assert_eq!(
            back,
            json!([{ "row_id": null, "title": "x" }, { "title": "y" }, { "row_id": 0 }])
        );
    }

    #[test]
    fn record_requires_row_id() {
        let lot = listing(json!({ "title": "No id", "sold_price": 10 }));
        assert!(CanonicalRecord::from_listing(&lot, &source()).is_none());
    }

    #[test]
    fn record_serializes_nulls_and_keeps_field_order() {
        let lot = listing(json!({ "row_id": "x1", "sold_price": "200" }));
        let record = CanonicalRecord::from_listing(&lot, &source()).unwrap();
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(
            json,
            r#"{"row_id":"x1","title":null,"status":null,"sold_price":"200","url":"https://auctions.example.co.za/lots/view/x1","sold_date":null,"auction_title":null}"#
        );
    }

    #[test]
    fn stored_record_distinguishes_absent_from_null() {
        let record: CanonicalRecord =
            serde_json::from_value(json!({ "row_id": 5, "title": null, "notes": "kept" }))
                .unwrap();
        assert_eq!(record.title, Some(None));
        assert_eq!(record.status, None);
        assert_eq!(record.extra.get("notes"), Some(&json!("kept")));

        let back = serde_json::to_value(&record).unwrap();
        assert_eq!(back, json!({ "row_id": 5, "title": null, "notes": "kept" }));
    }

    #[test]
    fn blank_sold_date_detection() {
        let mut record: CanonicalRecord = serde_json::from_value(json!({ "row_id": 1 })).unwrap();
        assert!(record.sold_date_is_blank());
        record.sold_date = Some(Some("null".into()));
        assert!(record.sold_date_is_blank());
        record.sold_date = Some(Some(String::new()));
        assert!(record.sold_date_is_blank());
        record.sold_date = Some(Some("2024-01-01".into()));
        assert!(!record.sold_date_is_blank());
    }
}
