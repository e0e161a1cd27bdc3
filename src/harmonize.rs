//! Schema Harmonizer - maps source column names onto the canonical vocabulary
//!
//! Matching is case-insensitive. `FullName` is resolved from a fixed priority
//! list; every other canonical field either already exists under some casing
//! or is taken from the first known variant present. Unmapped fields pass
//! through untouched.

use crate::record::{Record, CANONICAL_FIELDS, FULL_NAME};
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};

const FULL_NAME_CANDIDATES: &[&str] = &["fullname", "full_name", "name", "full name"];

fn default_variants(field: &str) -> &'static [&'static str] {
    match field {
        "job_title" => &["job title", "title", "position", "jobtitle"],
        "department" => &["dept", "division"],
        "company" => &["company_name", "organization", "organisation", "employer", "company name"],
        "address" => &["street", "mailing address", "fulladdress", "full address"],
        "email" => &["email_address", "email address", "e-mail", "mail"],
        "website" => &["site", "url", "web", "web site", "web url"],
        "mobile_number" => &["mobile", "cell", "cellphone", "cell phone", "phone mobile", "mobile no", "mobile_no"],
        "phone_number" => &["phone", "telephone", "tel", "office number", "office_number"],
        "country" => &["country_name"],
        "city" => &["town"],
        _ => &[],
    }
}

#[derive(Debug, Clone)]
pub struct SchemaHarmonizer {
    full_name_candidates: Vec<String>,
    /// Canonical field -> lowercase source variants, tried in order.
    aliases: Vec<(String, Vec<String>)>,
}

impl Default for SchemaHarmonizer {
    fn default() -> Self {
        Self {
            full_name_candidates: FULL_NAME_CANDIDATES.iter().map(|s| s.to_string()).collect(),
            aliases: CANONICAL_FIELDS
                .iter()
                .map(|f| {
                    let variants: Vec<String> = default_variants(f).iter().map(|s| s.to_string()).collect();
                    (f.to_string(), variants)
                })
                .collect(),
        }
    }
}

impl SchemaHarmonizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an extra source variant for a canonical field.
    pub fn with_alias(mut self, canonical: &str, variant: &str) -> Self {
        let variant = variant.to_lowercase();
        match self.aliases.iter_mut().find(|(f, _)| f == canonical) {
            Some((_, variants)) => variants.push(variant),
            None => self.aliases.push((canonical.to_string(), vec![variant])),
        }
        self
    }

    /// Compute `source name -> canonical name` renames for a set of field names.
    pub fn rename_plan<'a, I>(&self, fields: I) -> IndexMap<String, String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let fields: Vec<&str> = fields.into_iter().collect();
        let exact: HashSet<&str> = fields.iter().copied().collect();

        // Case-insensitive lookup; the first field with a given lowercase form wins.
        let mut by_lower: HashMap<String, String> = HashMap::new();
        for field in &fields {
            by_lower.entry(field.to_lowercase()).or_insert_with(|| field.to_string());
        }

        let mut renames: IndexMap<String, String> = IndexMap::new();

        if !exact.contains(FULL_NAME) {
            if let Some(source) = self
                .full_name_candidates
                .iter()
                .find_map(|cand| by_lower.get(cand.as_str()))
            {
                renames.insert(source.clone(), FULL_NAME.to_string());
            }
        }

        for (canonical, variants) in &self.aliases {
            // A field already spelled exactly like the canonical name stays put,
            // and nothing else may be renamed onto it.
            if exact.contains(canonical.as_str()) {
                continue;
            }
            let existing = by_lower.get(&canonical.to_lowercase());
            let source = existing.or_else(|| {
                variants
                    .iter()
                    .filter_map(|v| by_lower.get(v.as_str()))
                    .find(|src| !renames.contains_key(*src))
            });
            if let Some(source) = source {
                if !renames.contains_key(source) {
                    renames.insert(source.clone(), canonical.clone());
                }
            }
        }

        renames.retain(|from, to| *from != *to);
        renames
    }

    /// Rename a record's fields onto the canonical vocabulary and make sure
    /// `FullName` exists.
    pub fn harmonize(&self, mut record: Record) -> Record {
        let plan = self.rename_plan(record.field_names());
        self.apply(&mut record, &plan);
        record
    }

    /// Apply a precomputed plan; used when every row of a source shares one header.
    pub fn apply(&self, record: &mut Record, plan: &IndexMap<String, String>) {
        if !plan.is_empty() {
            record.rename_fields(plan);
        }
        if !record.contains(FULL_NAME) {
            record.set(FULL_NAME, Some(String::new()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(r: &Record) -> Vec<&str> {
        r.field_names().collect()
    }

    #[test]
    fn test_full_name_priority() {
        let h = SchemaHarmonizer::new();
        let r = Record::from_pairs([("Name", Some("Short")), ("Full_Name", Some("Jane Doe"))]);
        let r = h.harmonize(r);
        assert_eq!(r.get(FULL_NAME), Some("Jane Doe"));
        assert_eq!(r.get("Name"), Some("Short"));
    }

    #[test]
    fn test_full_name_added_when_missing() {
        let h = SchemaHarmonizer::new();
        let r = h.harmonize(Record::from_pairs([("email", Some("a@x.com"))]));
        assert_eq!(r.get(FULL_NAME), Some(""));
    }

    #[test]
    fn test_existing_canonical_is_recased() {
        let h = SchemaHarmonizer::new();
        let r = Record::from_pairs([("full name", Some("A")), ("EMAIL", Some("a@x.com")), ("mail", Some("b@x.com"))]);
        let r = h.harmonize(r);
        assert_eq!(names(&r), vec!["FullName", "email", "mail"]);
        assert_eq!(r.get("email"), Some("a@x.com"));
    }

    #[test]
    fn test_variants_and_passthrough() {
        let h = SchemaHarmonizer::new();
        let r = Record::from_pairs([
            ("fullname", Some("A")),
            ("Email Address", Some("a@x.com")),
            ("Cell Phone", Some("555")),
            ("Organisation", Some("Acme")),
            ("Notes", Some("met at expo")),
        ]);
        let r = h.harmonize(r);
        assert_eq!(names(&r), vec!["FullName", "email", "mobile_number", "company", "Notes"]);
    }

    #[test]
    fn test_rename_never_overwrites_existing_field() {
        let h = SchemaHarmonizer::new();
        let r = Record::from_pairs([("FullName", Some("Jane")), ("Email", Some("work@x.com")), ("email", Some("home@x.com"))]);
        let r = h.harmonize(r);
        assert_eq!(names(&r), vec!["FullName", "Email", "email"]);
        assert_eq!(r.get("Email"), Some("work@x.com"));
        assert_eq!(r.get("email"), Some("home@x.com"));

        let r = h.harmonize(Record::from_pairs([("fullname", Some("a")), ("FullName", Some("A"))]));
        assert_eq!(r.get(FULL_NAME), Some("A"));
        assert_eq!(r.get("fullname"), Some("a"));
    }

    #[test]
    fn test_custom_alias() {
        let h = SchemaHarmonizer::new().with_alias("company", "Firm");
        let r = h.harmonize(Record::from_pairs([("name", Some("A")), ("firm", Some("Acme"))]));
        assert_eq!(r.get("company"), Some("Acme"));
    }
}
