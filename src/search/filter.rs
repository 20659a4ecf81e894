//! Search filters: matching in memory and rendering for PostgREST

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ingest::search_keys;
use crate::model::{InwardRow, OutwardRow, PolicyRow};

/// Field name of a broad term
pub const ANY_FIELD: &str = "_any";

/// Prefix shortcuts and the column each one filters
const SHORTCUTS: &[(&str, &str)] = &[
    ("broker", "broker_name"),
    ("class", "class_of_business"),
    ("cedant", "cedant_name"),
    ("insured", "insured_name"),
    ("reinsurer", "reinsurer_name"),
    ("ref", "reference_number"),
    ("slip", "reference_number"),
    ("agreement", "agreement_number"),
    ("policy", "policy_number"),
    ("contract", "contract_number"),
    ("currency", "currency"),
    ("status", "status"),
    ("territory", "territory"),
    ("country", "territory"),
];

/// Text columns a broad term is tried against
pub const BROAD_COLUMNS: &[&str] = &[
    "broker_name",
    "cedant_name",
    "insured_name",
    "reinsurer_name",
    "policy_number",
    "contract_number",
    "reference_number",
    "agreement_number",
    "class_of_business",
    "territory",
];

/// Column for a shortcut prefix, case-insensitive
pub fn field_for_shortcut(prefix: &str) -> Option<&'static str> {
    let prefix = prefix.trim().to_lowercase();
    SHORTCUTS
        .iter()
        .find(|(shortcut, _)| *shortcut == prefix)
        .map(|(_, column)| *column)
}

// =============================================================================
// FILTER
// =============================================================================

/// One AND-ed condition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchFilter {
    /// Column name, or `_any` for a broad term
    pub field: String,
    pub value: String,
}

impl SearchFilter {
    pub fn field(field: &str, value: &str) -> Self {
        Self {
            field: field.to_string(),
            value: value.to_string(),
        }
    }

    pub fn any(value: &str) -> Self {
        Self::field(ANY_FIELD, value)
    }

    pub fn is_any(&self) -> bool {
        self.field == ANY_FIELD
    }

    /// Case-insensitive substring match; broad terms match if any of
    /// `broad_columns` does
    pub fn matches<S: Searchable + ?Sized>(&self, record: &S, broad_columns: &[&str]) -> bool {
        let needle = self.value.to_lowercase();
        let hit = |column: &str| {
            record
                .field_text(column)
                .is_some_and(|text| text.to_lowercase().contains(&needle))
        };
        if self.is_any() {
            broad_columns.iter().any(|c| hit(*c))
        } else {
            hit(self.field.as_str())
        }
    }
}

/// True when every filter matches
pub fn matches_all<S: Searchable + ?Sized>(
    filters: &[SearchFilter],
    record: &S,
    broad_columns: &[&str],
) -> bool {
    filters.iter().all(|f| f.matches(record, broad_columns))
}

// =============================================================================
// POSTGREST
// =============================================================================

/// Render filters as PostgREST query parameters.
///
/// Field filters become `column=ilike.*value*`. Broad terms become one
/// `or=(...)` across `broad_columns`; several broad terms are wrapped in
/// `and=(or(...),or(...))` since a query string holds a single `or` key.
pub fn to_postgrest_params(filters: &[SearchFilter], broad_columns: &[&str]) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = filters
        .iter()
        .filter(|f| !f.is_any())
        .map(|f| (f.field.clone(), format!("ilike.*{}*", f.value)))
        .collect();

    if broad_columns.is_empty() {
        return params;
    }

    let groups: Vec<String> = filters
        .iter()
        .filter(|f| f.is_any())
        .map(|f| {
            let pattern = list_pattern(&f.value);
            broad_columns
                .iter()
                .map(|c| format!("{}.ilike.{}", c, pattern))
                .collect::<Vec<_>>()
                .join(",")
        })
        .collect();

    match groups.as_slice() {
        [] => {}
        [single] => params.push(("or".to_string(), format!("({})", single))),
        many => {
            let inner: Vec<String> = many.iter().map(|g| format!("or({})", g)).collect();
            params.push(("and".to_string(), format!("({})", inner.join(","))));
        }
    }
    params
}

/// Inside logic trees, values with reserved characters must be quoted
fn list_pattern(value: &str) -> String {
    let pattern = format!("*{}*", value);
    if pattern.contains([',', '(', ')', '.', ':', '"', '\\']) {
        format!("\"{}\"", pattern.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        pattern
    }
}

// =============================================================================
// SEARCHABLE
// =============================================================================

/// A record whose columns can be read as text by name
pub trait Searchable {
    fn field_text(&self, column: &str) -> Option<String>;
}

/// Raw store rows; numbers are matched on their rendering. A column is read
/// under every spelling ingestion accepts for it (`brokerName` as well as
/// `broker_name`), first present key wins.
impl Searchable for Value {
    fn field_text(&self, column: &str) -> Option<String> {
        let literal = [column];
        let keys: &[&str] = match search_keys(column) {
            Some(keys) => keys,
            None => &literal,
        };
        keys.iter().find_map(|key| match self.get(*key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
    }
}

impl Searchable for PolicyRow {
    fn field_text(&self, column: &str) -> Option<String> {
        match column {
            "broker_name" => self.broker_name.clone(),
            "insured_name" => self.insured_name.clone(),
            "policy_number" => self.policy_number.clone(),
            "class_of_business" => self.class_code.clone(),
            "territory" => self.territory.clone(),
            "currency" => Some(self.currency.clone()),
            "status" => Some(self.status.clone()),
            _ => None,
        }
    }
}

impl Searchable for OutwardRow {
    fn field_text(&self, column: &str) -> Option<String> {
        match column {
            "broker_name" => self.broker_name.clone(),
            "insured_name" => self.insured_name.clone(),
            "reinsurer_name" => self.reinsurer_name.clone(),
            "policy_number" => self.policy_number.clone(),
            "reference_number" => self.slip_number.clone(),
            "class_of_business" => self.class_code.clone(),
            "currency" => Some(self.currency.clone()),
            "status" => Some(self.status.clone()),
            _ => None,
        }
    }
}

impl Searchable for InwardRow {
    fn field_text(&self, column: &str) -> Option<String> {
        match column {
            "broker_name" => self.broker_name.clone(),
            "cedant_name" => self.cedant_name.clone(),
            "contract_number" => self.contract_number.clone(),
            "class_of_business" => self.class_code.clone(),
            "territory" => self.territory.clone(),
            "currency" => Some(self.currency.clone()),
            "status" => Some(self.status.clone()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_shortcut_lookup() {
        assert_eq!(field_for_shortcut("Broker"), Some("broker_name"));
        assert_eq!(field_for_shortcut("country"), Some("territory"));
        assert_eq!(field_for_shortcut("colour"), None);
    }

    #[test]
    fn test_field_match_is_case_insensitive_substring() {
        let row = json!({"broker_name": "Howden Insurance Brokers", "class_of_business": 8.9});
        assert!(SearchFilter::field("broker_name", "howden").matches(&row, BROAD_COLUMNS));
        assert!(SearchFilter::field("class_of_business", "8.9").matches(&row, BROAD_COLUMNS));
        assert!(!SearchFilter::field("broker_name", "marsh").matches(&row, BROAD_COLUMNS));
        assert!(!SearchFilter::field("cedant_name", "howden").matches(&row, BROAD_COLUMNS));
    }

    #[test]
    fn test_broad_term_matches_any_column() {
        let row = json!({"insured_name": "PT Indonesia Power", "broker_name": "Aon"});
        assert!(SearchFilter::any("indonesia").matches(&row, BROAD_COLUMNS));
        assert!(!SearchFilter::any("indonesia").matches(&row, &["broker_name"]));
    }

    #[test]
    fn test_raw_rows_read_every_accepted_spelling() {
        let row = json!({"brokerName": "Howden", "insured_name": null,
                         "insuredName": "PT Indonesia", "classOfCover": "Marine"});
        assert_eq!(row.field_text("broker_name").as_deref(), Some("Howden"));
        assert_eq!(row.field_text("insured_name").as_deref(), Some("PT Indonesia"));
        assert_eq!(row.field_text("class_of_business").as_deref(), Some("Marine"));
        assert_eq!(row.field_text("colour"), None);
        assert_eq!(json!({"colour": "red"}).field_text("colour").as_deref(), Some("red"));
    }

    #[test]
    fn test_matches_all_is_and() {
        let row = json!({"broker_name": "Aon", "territory": "Uzbekistan"});
        let filters = vec![
            SearchFilter::field("broker_name", "aon"),
            SearchFilter::any("uzbek"),
        ];
        assert!(matches_all(&filters, &row, BROAD_COLUMNS));
        let filters = vec![
            SearchFilter::field("broker_name", "aon"),
            SearchFilter::any("kazakh"),
        ];
        assert!(!matches_all(&filters, &row, BROAD_COLUMNS));
        assert!(matches_all(&[], &row, BROAD_COLUMNS));
    }

    #[test]
    fn test_typed_rows_are_searchable() {
        let row = InwardRow {
            cedant_name: Some("Kapital Sug'urta".into()),
            status: "Active".into(),
            ..Default::default()
        };
        assert!(SearchFilter::field("cedant_name", "kapital").matches(&row, BROAD_COLUMNS));
        assert!(SearchFilter::field("status", "ACTIVE").matches(&row, BROAD_COLUMNS));
        assert!(!SearchFilter::field("insured_name", "kapital").matches(&row, BROAD_COLUMNS));
    }

    #[test]
    fn test_postgrest_params() {
        let filters = vec![
            SearchFilter::field("broker_name", "Howden"),
            SearchFilter::any("Indonesia"),
        ];
        let params = to_postgrest_params(&filters, &["insured_name", "territory"]);
        assert_eq!(
            params,
            vec![
                ("broker_name".to_string(), "ilike.*Howden*".to_string()),
                (
                    "or".to_string(),
                    "(insured_name.ilike.*Indonesia*,territory.ilike.*Indonesia*)".to_string()
                ),
            ]
        );
    }

    #[test]
    fn test_postgrest_params_several_broad_terms() {
        let filters = vec![SearchFilter::any("a"), SearchFilter::any("8.9")];
        let params = to_postgrest_params(&filters, &["territory"]);
        assert_eq!(
            params,
            vec![(
                "and".to_string(),
                "(or(territory.ilike.*a*),or(territory.ilike.\"*8.9*\"))".to_string()
            )]
        );
    }
}
