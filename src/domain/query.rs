use std::collections::HashMap;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariantKind {
    Exact,
    Broad,
    TranslatedExact,
    TranslatedBroad,
    Bundle,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryVariant {
    pub text: String,
    pub kind: VariantKind,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ExpandOptions {
    pub include_translation: bool,
    pub include_broad: bool,
}

const PHRASES: &[(&str, &str)] = &[
    ("marketing agency", "Marketingagentur"),
    ("advertising agency", "Werbeagentur"),
    ("web design", "Webdesign"),
    ("software company", "Softwarefirma"),
    ("tax advisor", "Steuerberater"),
    ("accountant", "Buchhalter"),
    ("lawyer", "Rechtsanwalt"),
    ("dentist", "Zahnarzt"),
    ("doctor", "Arzt"),
    ("plumber", "Klempner"),
    ("electrician", "Elektriker"),
    ("real estate agent", "Immobilienmakler"),
    ("car dealer", "Autohaus"),
    ("bakery", "Bäckerei"),
    ("hairdresser", "Friseur"),
    ("construction company", "Bauunternehmen"),
];

const BUNDLES: &[(&str, &[&str])] = &[
    (
        "marketing",
        &[
            "Marketingagentur",
            "Werbeagentur",
            "Online Marketing Agentur",
            "marketing agency",
        ],
    ),
    (
        "legal",
        &["Rechtsanwalt", "Anwaltskanzlei", "Notar", "law firm"],
    ),
    (
        "tax",
        &["Steuerberater", "Steuerkanzlei", "Buchhaltung", "tax advisor"],
    ),
    (
        "health",
        &["Zahnarzt", "Arztpraxis", "Physiotherapie", "dentist"],
    ),
    (
        "trades",
        &["Elektriker", "Klempner", "Sanitär Heizung", "Dachdecker"],
    ),
];

/// Phrase table and category bundles, built once and shared by every job.
pub struct QueryCatalog {
    phrases: Vec<(String, String)>,
    bundles: HashMap<String, Vec<String>>,
}

impl Default for QueryCatalog {
    fn default() -> Self {
        QueryCatalog::new(
            PHRASES
                .iter()
                .map(|(from, to)| (from.to_string(), to.to_string()))
                .collect(),
            BUNDLES
                .iter()
                .map(|(key, queries)| {
                    (
                        key.to_string(),
                        queries.iter().map(|q| q.to_string()).collect(),
                    )
                })
                .collect(),
        )
    }
}

impl QueryCatalog {
    pub fn new(phrases: Vec<(String, String)>, bundles: HashMap<String, Vec<String>>) -> Self {
        QueryCatalog { phrases, bundles }
    }

    pub fn category_keys(&self) -> Vec<&str> {
        self.bundles.keys().map(String::as_str).sorted().collect()
    }

    pub fn expand(&self, base_term: &str, options: ExpandOptions) -> Vec<QueryVariant> {
        let base_term = base_term.trim();
        let mut variants = variants_for(base_term, options.include_broad, false);

        if options.include_translation {
            let translated = self.phrases.iter().find_map(|(from, to)| {
                replace_case_insensitive(base_term, from, to)
            });
            if let Some(translated) = translated {
                variants.extend(variants_for(&translated, options.include_broad, true));
            }
        }

        variants
            .into_iter()
            .unique_by(|v| v.text.to_lowercase())
            .collect()
    }

    pub fn bundle(&self, category: &str) -> Option<Vec<QueryVariant>> {
        self.bundles.get(&category.trim().to_lowercase()).map(|queries| {
            queries
                .iter()
                .map(|q| QueryVariant {
                    text: q.clone(),
                    kind: VariantKind::Bundle,
                })
                .collect()
        })
    }
}

fn variants_for(term: &str, include_broad: bool, translated: bool) -> Vec<QueryVariant> {
    let (exact_kind, broad_kind) = match translated {
        true => (VariantKind::TranslatedExact, VariantKind::TranslatedBroad),
        false => (VariantKind::Exact, VariantKind::Broad),
    };

    let mut variants = vec![QueryVariant {
        text: format!(r#""{}""#, term),
        kind: exact_kind,
    }];
    if include_broad {
        variants.push(QueryVariant {
            text: term.to_string(),
            kind: broad_kind,
        });
    }
    variants
}

/// Replaces the first case-insensitive occurrence of `phrase` in `text`.
fn replace_case_insensitive(text: &str, phrase: &str, replacement: &str) -> Option<String> {
    let phrase: Vec<char> = phrase.chars().flat_map(char::to_lowercase).collect();
    if phrase.is_empty() {
        return None;
    }

    for (start, _) in text.char_indices() {
        let mut matched = 0;
        let mut end = start;
        for (offset, c) in text[start..].char_indices() {
            let lowered: Vec<char> = c.to_lowercase().collect();
            if phrase.len() < matched + lowered.len()
                || phrase[matched..matched + lowered.len()] != lowered[..]
            {
                break;
            }
            matched += lowered.len();
            end = start + offset + c.len_utf8();
            if matched == phrase.len() {
                break;
            }
        }

        if matched == phrase.len() {
            return Some(format!("{}{}{}", &text[..start], replacement, &text[end..]));
        }
    }

    None
}
