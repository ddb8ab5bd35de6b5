//! Structured field extraction from OCR text using regex patterns.
//!
//! Pure functions, no async. Patterns are compiled once into a
//! [`FieldExtractor`] and shared by all requests.

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Fields found in an insurance document. Missing fields are omitted from
/// the JSON output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tc_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dates: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_numbers: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amounts: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl StructuredFields {
    /// Number of fields present.
    pub fn len(&self) -> usize {
        [
            self.policy_number.is_some(),
            self.tc_number.is_some(),
            self.dates.is_some(),
            self.phone_numbers.is_some(),
            self.amounts.is_some(),
            self.name.is_some(),
        ]
        .iter()
        .filter(|present| **present)
        .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Apply [`normalize_field`] to every value.
    pub fn normalized(self) -> Self {
        let one = |field: &str, v: Option<String>| v.map(|v| normalize_field(field, &v));
        let many = |field: &str, v: Option<Vec<String>>| {
            v.map(|vs| vs.iter().map(|v| normalize_field(field, v)).collect())
        };
        Self {
            policy_number: one("policy_number", self.policy_number),
            tc_number: one("tc_number", self.tc_number),
            dates: many("dates", self.dates),
            phone_numbers: many("phone_numbers", self.phone_numbers),
            amounts: many("amounts", self.amounts),
            name: one("name", self.name),
        }
    }
}

/// Output field a pattern feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    PolicyNumber,
    TcNumber,
    Dates,
    PhoneNumbers,
    Amounts,
    Name,
}

impl Field {
    fn id(&self) -> &'static str {
        match self {
            Self::PolicyNumber => "policy_number",
            Self::TcNumber => "tc_number",
            Self::Dates => "dates",
            Self::PhoneNumbers => "phone_numbers",
            Self::Amounts => "amounts",
            Self::Name => "name",
        }
    }

    /// Single-valued fields keep only the first match.
    fn is_single(&self) -> bool {
        matches!(self, Self::PolicyNumber | Self::TcNumber | Self::Name)
    }
}

/// Field patterns in extraction order. A field may have several patterns;
/// for single-valued fields they are alternatives tried in turn.
const FIELD_PATTERNS: &[(Field, &str)] = &[
    (Field::PolicyNumber, r"(?i)Poliçe\s*No[:\s]+([A-Z0-9\-]+)"),
    (Field::PolicyNumber, r"(?i)Policy\s*Number[:\s]+([A-Z0-9\-]+)"),
    (Field::PolicyNumber, r"(?i)Poliçe\s*Numarası[:\s]+([A-Z0-9\-]+)"),
    (Field::TcNumber, r"\b([0-9]{11})\b"),
    (Field::Dates, r"(\d{2}[./-]\d{2}[./-]\d{4})"),
    (Field::PhoneNumbers, r"(\+?90\s?)?(\d{3})\s?(\d{3})\s?(\d{2})\s?(\d{2})"),
    (Field::Amounts, r"(\d{1,3}(?:[.,]\d{3})*(?:[.,]\d{2})?)\s*(?:TL|₺)"),
    (
        Field::Name,
        r"(?i)(?:Adı?\s*Soyadı?|İsim)[:\s]+([A-ZÇĞİÖŞÜ][a-zçğıöşü]+(?:\s+[A-ZÇĞİÖŞÜ][a-zçğıöşü]+)+)",
    ),
];

struct CompiledPattern {
    field: Field,
    regex: Regex,
}

/// Pre-compiled field patterns ready for matching.
pub struct FieldExtractor {
    patterns: Vec<CompiledPattern>,
}

impl FieldExtractor {
    pub fn new() -> Self {
        Self::compile(FIELD_PATTERNS)
    }

    /// Compile patterns in order. Compilation stops at the first invalid
    /// pattern, so extraction then yields only the fields before it.
    fn compile(patterns: &[(Field, &str)]) -> Self {
        let mut compiled = Vec::new();
        for (field, pattern) in patterns {
            match Regex::new(pattern) {
                Ok(regex) => compiled.push(CompiledPattern {
                    field: *field,
                    regex,
                }),
                Err(e) => {
                    warn!(
                        "Invalid pattern for '{}' ({}): {}; later fields are disabled",
                        field.id(),
                        pattern,
                        e
                    );
                    break;
                }
            }
        }
        debug!("Compiled {} field patterns", compiled.len());
        Self { patterns: compiled }
    }

    /// Returns true if there are no compiled patterns.
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Extract every field that has at least one match in `text`.
    pub fn extract(&self, text: &str) -> StructuredFields {
        let mut fields = StructuredFields::default();

        for pattern in &self.patterns {
            if pattern.field.is_single() {
                if single_slot(&mut fields, pattern.field).is_some() {
                    continue;
                }
                if let Some(caps) = pattern.regex.captures(text) {
                    let value = joined_groups(&caps).trim().to_string();
                    *single_slot(&mut fields, pattern.field) = Some(value);
                }
            } else {
                let values: Vec<String> = pattern
                    .regex
                    .captures_iter(text)
                    .map(|caps| joined_groups(&caps))
                    .collect();
                if !values.is_empty() {
                    multi_slot(&mut fields, pattern.field)
                        .get_or_insert_with(Vec::new)
                        .extend(values);
                }
            }
        }

        debug!("Extracted {} structured fields", fields.len());
        fields
    }
}

impl Default for FieldExtractor {
    fn default() -> Self {
        Self::new()
    }
}

fn single_slot(fields: &mut StructuredFields, field: Field) -> &mut Option<String> {
    match field {
        Field::PolicyNumber => &mut fields.policy_number,
        Field::TcNumber => &mut fields.tc_number,
        _ => &mut fields.name,
    }
}

fn multi_slot(fields: &mut StructuredFields, field: Field) -> &mut Option<Vec<String>> {
    match field {
        Field::Dates => &mut fields.dates,
        Field::PhoneNumbers => &mut fields.phone_numbers,
        _ => &mut fields.amounts,
    }
}

/// Concatenation of all participating capture groups (group 0 if none).
fn joined_groups(caps: &regex::Captures<'_>) -> String {
    if caps.len() <= 1 {
        return caps.get(0).map(|m| m.as_str().to_string()).unwrap_or_default();
    }
    caps.iter()
        .skip(1)
        .flatten()
        .map(|m| m.as_str())
        .collect()
}

/// Canonical form of a field value, chosen by the field name.
///
/// Dates use `.` separators, phone numbers keep digits and `+`, amounts keep
/// digits and separators. Other fields are only trimmed.
pub fn normalize_field(field_name: &str, value: &str) -> String {
    if value.is_empty() {
        return String::new();
    }
    let name = field_name.to_lowercase();

    let mut value = value.to_string();
    if name.contains("date") {
        value = value.replace(['.', '/', '-'], ".");
    }
    if name.contains("phone") || name.contains("tel") {
        value.retain(|c| c.is_ascii_digit() || c == '+');
    }
    if name.contains("amount") || name.contains("price") {
        value.retain(|c| c.is_ascii_digit() || c == ',' || c == '.');
    }
    value.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_patterns() {
        let extractor = FieldExtractor::new();
        assert_eq!(extractor.patterns.len(), FIELD_PATTERNS.len());
        assert!(!extractor.is_empty());
    }

    #[test]
    fn test_policy_date_and_phone() {
        let extractor = FieldExtractor::new();
        let fields =
            extractor.extract("Poliçe No: AB-12345 tarih 01.02.2023 tel 0532 123 45 67");

        assert_eq!(fields.policy_number.as_deref(), Some("AB-12345"));
        assert_eq!(fields.dates, Some(vec!["01.02.2023".to_string()]));
        let phones = fields.phone_numbers.clone().unwrap();
        assert_eq!(phones, vec!["5321234567".to_string()]);
        assert!(fields.tc_number.is_none());

        let json = serde_json::to_value(&fields).unwrap();
        assert!(json.get("tc_number").is_none());
        assert!(json.get("amounts").is_none());
        assert_eq!(json["policy_number"], "AB-12345");
    }

    #[test]
    fn test_policy_label_variants() {
        let extractor = FieldExtractor::new();
        assert_eq!(
            extractor.extract("POLICY NUMBER: XK-77").policy_number.as_deref(),
            Some("XK-77")
        );
        assert_eq!(
            extractor
                .extract("Poliçe Numarası 2024000123")
                .policy_number
                .as_deref(),
            Some("2024000123")
        );
    }

    #[test]
    fn test_tc_number_first_match_only() {
        let extractor = FieldExtractor::new();
        let fields = extractor.extract("TC: 12345678901 eş: 10987654321");
        assert_eq!(fields.tc_number.as_deref(), Some("12345678901"));

        // Twelve digits are not a TC number.
        assert!(extractor.extract("no 123456789012").tc_number.is_none());
    }

    #[test]
    fn test_all_dates_in_order() {
        let extractor = FieldExtractor::new();
        let fields = extractor.extract("Başlangıç 01/03/2024 Bitiş 01-03-2025 Tanzim 15.02.2024");
        assert_eq!(
            fields.dates.unwrap(),
            vec!["01/03/2024", "01-03-2025", "15.02.2024"]
        );
    }

    #[test]
    fn test_phone_with_country_code() {
        let extractor = FieldExtractor::new();
        let fields = extractor.extract("Tel: +90 532 123 45 67");
        assert_eq!(fields.phone_numbers.unwrap(), vec!["+90 5321234567"]);
    }

    #[test]
    fn test_amounts() {
        let extractor = FieldExtractor::new();
        let fields = extractor.extract("Prim: 1.250,50 TL, teminat 100.000 ₺");
        assert_eq!(fields.amounts.unwrap(), vec!["1.250,50", "100.000"]);
    }

    #[test]
    fn test_name() {
        let extractor = FieldExtractor::new();
        let fields = extractor.extract("Adı Soyadı: Ahmet Yılmaz, 01.01.1990");
        assert_eq!(fields.name.as_deref(), Some("Ahmet Yılmaz"));

        let fields = extractor.extract("İsim: Ayşe Nur Çelik");
        assert_eq!(fields.name.as_deref(), Some("Ayşe Nur Çelik"));

        // A single word is not a full name.
        assert!(extractor.extract("İsim: Ahmet").name.is_none());
    }

    #[test]
    fn test_empty_text_has_no_fields() {
        let fields = FieldExtractor::new().extract("");
        assert!(fields.is_empty());
        assert_eq!(serde_json::to_string(&fields).unwrap(), "{}");
    }

    #[test]
    fn test_invalid_pattern_stops_compilation() {
        let patterns = [
            (Field::PolicyNumber, r"(?i)Poliçe\s*No[:\s]+([A-Z0-9\-]+)"),
            (Field::TcNumber, r"[invalid"),
            (Field::Dates, r"(\d{2}[./-]\d{2}[./-]\d{4})"),
        ];
        let extractor = FieldExtractor::compile(&patterns);
        assert_eq!(extractor.patterns.len(), 1);

        let fields = extractor.extract("Poliçe No: P-1 01.02.2023");
        assert_eq!(fields.policy_number.as_deref(), Some("P-1"));
        assert!(fields.dates.is_none());
    }

    #[test]
    fn test_normalize_field() {
        assert_eq!(normalize_field("dates", "01/02/2023"), "01.02.2023");
        assert_eq!(normalize_field("phone_numbers", "+90 532-123"), "+90532123");
        assert_eq!(normalize_field("amounts", "1.250,50 TL"), "1.250,50");
        assert_eq!(normalize_field("name", " Ahmet Yılmaz "), "Ahmet Yılmaz");
        assert_eq!(normalize_field("dates", ""), "");
    }

    #[test]
    fn test_normalized_fields() {
        let fields = StructuredFields {
            dates: Some(vec!["01-02-2023".to_string()]),
            phone_numbers: Some(vec!["+90 5321234567".to_string()]),
            ..Default::default()
        }
        .normalized();
        assert_eq!(fields.dates.unwrap(), vec!["01.02.2023"]);
        assert_eq!(fields.phone_numbers.unwrap(), vec!["+905321234567"]);
    }
}
