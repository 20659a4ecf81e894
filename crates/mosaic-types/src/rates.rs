//! Central-bank rate payloads
//!
//! The rate feed publishes one entry per currency, quoted as local currency
//! (UZS) per `Nominal` units of `Ccy`. Numbers arrive as strings.

use serde::{Deserialize, Serialize};

/// One currency quote from the central-bank JSON feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CbuRateEntry {
    #[serde(rename = "Ccy")]
    pub ccy: String,
    #[serde(rename = "Rate")]
    pub rate: String,
    #[serde(rename = "Nominal", default = "default_nominal")]
    pub nominal: String,
    /// `DD.MM.YYYY`
    #[serde(rename = "Date", default)]
    pub date: String,
    #[serde(rename = "CcyNm_EN", default, skip_serializing_if = "Option::is_none")]
    pub name_en: Option<String>,
}

fn default_nominal() -> String {
    "1".to_string()
}

/// Error body returned by the rate proxy when the upstream call fails
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyErrorEnvelope {
    pub error: String,
    pub status: u16,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_feed_entry_ignores_extra_fields() {
        let json = r#"{"id":69,"Code":"840","Ccy":"USD","CcyNm_EN":"US Dollar",
            "Nominal":"1","Rate":"12650.55","Diff":"-13.45","Date":"15.01.2024"}"#;
        let entry: CbuRateEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.ccy, "USD");
        assert_eq!(entry.rate, "12650.55");
        assert_eq!(entry.nominal, "1");
        assert_eq!(entry.name_en.as_deref(), Some("US Dollar"));
    }

    #[test]
    fn test_nominal_defaults_to_one() {
        let entry: CbuRateEntry =
            serde_json::from_str(r#"{"Ccy":"EUR","Rate":"13800.10"}"#).unwrap();
        assert_eq!(entry.nominal, "1");
        assert!(entry.date.is_empty());
    }
}
