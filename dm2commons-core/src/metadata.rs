//! Turns an [`ArtifactRecord`] into what Commons needs: a file name, wikitext
//! description, categories and structured-data statements.
//!
//! Everything here is pure. Missing fields fall back to "Untitled", "Unknown" or an
//! empty string; nothing in this module can fail.

use regex::Regex;
use serde_json::{json, Value};
use std::sync::OnceLock;
use tracing::debug;

use crate::artifact::{ArtifactRecord, LicenseInfo};

const FILENAME_PREFIX: &str = "Digitalt_Museum";
const FILE_EXTENSION: &str = "jpg";
const MAX_TITLE_CHARS: usize = 100;
/// MediaWiki limit on page titles, in UTF-8 bytes.
const MAX_FILENAME_BYTES: usize = 240;
const SOURCE_PAGE_BASE: &str = "https://digitaltmuseum.se/";

pub const UNTITLED: &str = "Untitled";
pub const UNKNOWN: &str = "Unknown";

const BASE_CATEGORIES: &[&str] = &["Images from Digitalt Museum", "Uploaded with dm2commons"];

const PROP_TITLE: &str = "P1476";
const PROP_CREATOR: &str = "P170";
const PROP_AUTHOR_NAME: &str = "P2093";
const PROP_COLLECTION: &str = "P195";

/// Known institutions and their Wikidata items.
const INSTITUTIONS: &[(&str, &str)] = &[
    ("Nordiska museet", "Q1140196"),
    ("Nationalmuseum", "Q842858"),
    ("Skansen", "Q631881"),
    ("Norsk Folkemuseum", "Q1541437"),
    ("Hallwylska museet", "Q1636053"),
    ("Livrustkammaren", "Q1637002"),
];

fn forbidden_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"[#<>\[\]|{}:/\\?*"\x00-\x1f]"#).expect("forbidden-character pattern is valid")
    })
}

fn separator_runs() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[\s_]+").expect("separator pattern is valid"))
}

/// Makes a title safe for use inside a Commons file name.
pub fn sanitize_title(title: &str) -> String {
    let stripped = forbidden_chars().replace_all(title, "");
    let joined = separator_runs().replace_all(stripped.trim(), "_");
    let trimmed: String = joined
        .trim_matches(|c| c == '_' || c == '.')
        .chars()
        .take(MAX_TITLE_CHARS)
        .collect();
    let trimmed = trimmed.trim_end_matches('_');
    if trimmed.is_empty() {
        UNTITLED.to_string()
    } else {
        trimmed.to_string()
    }
}

/// `Digitalt_Museum_{id}_{title}.jpg`
pub fn upload_filename(artifact: &ArtifactRecord) -> String {
    let id = sanitize_title(&artifact.id);
    let id = if artifact.id.trim().is_empty() {
        UNKNOWN.to_string()
    } else {
        id
    };
    let title = sanitize_title(artifact.title.or(UNTITLED));
    let fixed_bytes = FILENAME_PREFIX.len() + id.len() + FILE_EXTENSION.len() + 3;
    let title = truncate_to_bytes(&title, MAX_FILENAME_BYTES.saturating_sub(fixed_bytes))
        .trim_end_matches(['_', '.']);
    let title = if title.is_empty() { UNTITLED } else { title };
    format!("{FILENAME_PREFIX}_{id}_{title}.{FILE_EXTENSION}")
}

/// Longest prefix of `s` that fits in `max` bytes without splitting a character.
fn truncate_to_bytes(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let end = (0..=max).rev().find(|&i| s.is_char_boundary(i)).unwrap_or(0);
    &s[..end]
}

/// Wikitext page content for the uploaded file.
pub fn description(artifact: &ArtifactRecord, license: &LicenseInfo) -> String {
    let institution = if artifact.owner.trim().is_empty() {
        UNKNOWN
    } else {
        artifact.owner.trim()
    };
    format!(
        "=={{{{int:filedesc}}}}==\n\
         {{{{Artwork\n\
         \x20|artist = {creator}\n\
         \x20|title = {title}\n\
         \x20|object type = {object_type}\n\
         \x20|date = {dating}\n\
         \x20|medium = {material}\n\
         \x20|dimensions = {dimensions}\n\
         \x20|institution = {institution}\n\
         \x20|accession number = {id}\n\
         \x20|source = {source_base}{id}\n\
         \x20|permission = {license_text}\n\
         }}}}\n\
         \n\
         =={{{{int:license-header}}}}==\n\
         {license_template}\n",
        creator = artifact.creator.or(UNKNOWN),
        title = artifact.title.or(UNTITLED),
        object_type = artifact.object_type.or(""),
        dating = artifact.dating.or(""),
        material = artifact.material.or(""),
        dimensions = artifact.dimensions.or(""),
        institution = institution,
        id = artifact.id,
        source_base = SOURCE_PAGE_BASE,
        license_text = license.text,
        license_template = license.template,
    )
}

/// Base categories plus material- and object-type-derived ones.
///
/// The list is not deduplicated.
pub fn categories(artifact: &ArtifactRecord) -> Vec<String> {
    let mut categories: Vec<String> = BASE_CATEGORIES.iter().map(|c| c.to_string()).collect();
    if let Some(material) = artifact.material.best() {
        categories.push(format!("Objects made of {}", material.trim().to_lowercase()));
    }
    if let Some(object_type) = artifact.object_type.best() {
        categories.push(format!(
            "{} in Digitalt Museum",
            object_type.trim().to_lowercase()
        ));
    }
    categories
}

/// Wikidata item for an institution name, or an empty string when unmapped.
pub fn institution_qid(name: &str) -> &'static str {
    let name = name.trim();
    INSTITUTIONS
        .iter()
        .find(|(known, _)| known.eq_ignore_ascii_case(name))
        .map(|(_, qid)| *qid)
        .unwrap_or("")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatementValue {
    MonolingualText { text: String, language: String },
    /// Reference to a Wikibase item by id.
    Item(String),
    /// An unidentified entity described only by an author-name qualifier.
    NamedSomeValue(String),
}

/// One structured-data claim on the file's MediaInfo entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub property: String,
    pub value: StatementValue,
}

impl Statement {
    pub fn to_json(&self) -> Value {
        let mut statement = match &self.value {
            StatementValue::MonolingualText { text, language } => json!({
                "mainsnak": {
                    "snaktype": "value",
                    "property": self.property,
                    "datavalue": {
                        "value": { "text": text, "language": language },
                        "type": "monolingualtext"
                    }
                }
            }),
            StatementValue::Item(id) => json!({
                "mainsnak": {
                    "snaktype": "value",
                    "property": self.property,
                    "datavalue": {
                        "value": { "entity-type": "item", "id": id },
                        "type": "wikibase-entityid"
                    }
                }
            }),
            StatementValue::NamedSomeValue(name) => json!({
                "mainsnak": { "snaktype": "somevalue", "property": self.property },
                "qualifiers": {
                    PROP_AUTHOR_NAME: [{
                        "snaktype": "value",
                        "property": PROP_AUTHOR_NAME,
                        "datavalue": { "value": name, "type": "string" }
                    }]
                }
            }),
        };
        statement["type"] = json!("statement");
        statement["rank"] = json!("normal");
        statement
    }
}

/// One statement per populated field: title, creator, institution.
///
/// An owner missing from the institution table still yields a P195 statement with
/// an empty item id. `wbeditentity` refuses the entire claims batch in that case, so
/// the title and creator statements are not attached either. The upload itself is
/// unaffected.
pub fn structured_data(artifact: &ArtifactRecord) -> Vec<Statement> {
    let mut statements = Vec::new();
    if let Some((language, text)) = artifact.title.best_entry() {
        statements.push(Statement {
            property: PROP_TITLE.to_string(),
            value: StatementValue::MonolingualText {
                text: text.trim().to_string(),
                language: language.to_string(),
            },
        });
    }
    if let Some(creator) = artifact.creator.best() {
        statements.push(Statement {
            property: PROP_CREATOR.to_string(),
            value: StatementValue::NamedSomeValue(creator.trim().to_string()),
        });
    }
    if !artifact.owner.trim().is_empty() {
        let qid = institution_qid(&artifact.owner);
        if qid.is_empty() {
            debug!(
                owner = %artifact.owner,
                "Institution not in lookup table; P195 carries an empty item id, \
                 which makes Commons reject the whole claims batch"
            );
        }
        statements.push(Statement {
            property: PROP_COLLECTION.to_string(),
            value: StatementValue::Item(qid.to_string()),
        });
    }
    statements
}

/// `wbeditentity` `data` payload for a list of statements.
pub fn claims_payload(statements: &[Statement]) -> Value {
    json!({ "claims": statements.iter().map(Statement::to_json).collect::<Vec<_>>() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::{LocalizedText, MediaRef};

    fn text(pairs: &[(&str, &str)]) -> LocalizedText {
        pairs.iter().map(|(k, v)| (*k, *v)).collect()
    }

    fn full_artifact() -> ArtifactRecord {
        ArtifactRecord {
            id: "021016343404".into(),
            title: text(&[("sv", "Vas med lock")]),
            creator: text(&[("sv", "Gunnar Nylund")]),
            material: text(&[("sv", "Stengods")]),
            dating: text(&[("sv", "1950-talet")]),
            object_type: text(&[("sv", "Vas")]),
            dimensions: text(&[("sv", "H 25 cm")]),
            owner: "Nordiska museet".into(),
            media: vec![MediaRef {
                media_id: "m1".into(),
            }],
        }
    }

    #[test]
    fn filename_matches_expected_shape() {
        let artifact = ArtifactRecord {
            id: "123".into(),
            title: text(&[("sv", "Vas")]),
            ..ArtifactRecord::default()
        };
        assert_eq!(upload_filename(&artifact), "Digitalt_Museum_123_Vas.jpg");
        assert_eq!(
            upload_filename(&full_artifact()),
            "Digitalt_Museum_021016343404_Vas_med_lock.jpg"
        );
    }

    #[test]
    fn sanitize_strips_forbidden_characters() {
        assert_eq!(sanitize_title("Vas [del 1/2]: blå #3"), "Vas_del_12_blå_3");
        assert_eq!(sanitize_title("  many   spaces\tand_tabs "), "many_spaces_and_tabs");
        assert_eq!(sanitize_title("###"), "Untitled");
        assert_eq!(sanitize_title(&"a".repeat(300)).len(), MAX_TITLE_CHARS);
    }

    #[test]
    fn filename_fits_byte_limit_for_multibyte_titles() {
        for title in ["å".repeat(100), "花".repeat(100), "a".repeat(100)] {
            let artifact = ArtifactRecord {
                id: "021016343404".into(),
                title: [("sv", title.as_str())].into_iter().collect(),
                ..ArtifactRecord::default()
            };
            let filename = upload_filename(&artifact);
            assert!(
                filename.len() <= MAX_FILENAME_BYTES,
                "{} bytes: {filename}",
                filename.len()
            );
            assert!(filename.starts_with("Digitalt_Museum_021016343404_"));
            assert!(filename.ends_with(".jpg"));
        }
    }

    #[test]
    fn truncation_respects_character_boundaries() {
        assert_eq!(truncate_to_bytes("blå", 3), "bl");
        assert_eq!(truncate_to_bytes("blå", 4), "blå");
        assert_eq!(truncate_to_bytes("花花", 5), "花");
    }

    #[test]
    fn empty_artifact_uses_defaults() {
        let artifact = ArtifactRecord::default();

        assert_eq!(upload_filename(&artifact), "Digitalt_Museum_Unknown_Untitled.jpg");

        let desc = description(&artifact, &LicenseInfo::cc_by_sa_4());
        assert!(desc.contains("|title = Untitled\n"));
        assert!(desc.contains("|artist = Unknown\n"));
        assert!(desc.contains("|institution = Unknown\n"));
        assert!(desc.contains("|medium = \n"));

        assert_eq!(categories(&artifact), BASE_CATEGORIES);
        assert!(structured_data(&artifact).is_empty());
    }

    #[test]
    fn description_interpolates_every_field() {
        let desc = description(&full_artifact(), &LicenseInfo::cc_by_sa_4());

        assert!(desc.starts_with("=={{int:filedesc}}==\n{{Artwork\n"));
        assert!(desc.contains(" |artist = Gunnar Nylund\n"));
        assert!(desc.contains(" |title = Vas med lock\n"));
        assert!(desc.contains(" |object type = Vas\n"));
        assert!(desc.contains(" |date = 1950-talet\n"));
        assert!(desc.contains(" |medium = Stengods\n"));
        assert!(desc.contains(" |dimensions = H 25 cm\n"));
        assert!(desc.contains(" |institution = Nordiska museet\n"));
        assert!(desc.contains(" |accession number = 021016343404\n"));
        assert!(desc.contains(" |source = https://digitaltmuseum.se/021016343404\n"));
        assert!(desc.contains("Creative Commons Attribution-ShareAlike 4.0"));
        assert!(desc.ends_with("=={{int:license-header}}==\n{{cc-by-sa-4.0}}\n"));
    }

    #[test]
    fn categories_derive_from_material_and_type() {
        assert_eq!(
            categories(&full_artifact()),
            vec![
                "Images from Digitalt Museum".to_string(),
                "Uploaded with dm2commons".to_string(),
                "Objects made of stengods".to_string(),
                "vas in Digitalt Museum".to_string(),
            ]
        );
    }

    #[test]
    fn statements_cover_populated_fields() {
        let statements = structured_data(&full_artifact());

        assert_eq!(statements.len(), 3);
        assert_eq!(
            statements[0],
            Statement {
                property: "P1476".into(),
                value: StatementValue::MonolingualText {
                    text: "Vas med lock".into(),
                    language: "sv".into()
                }
            }
        );
        assert_eq!(
            statements[1].value,
            StatementValue::NamedSomeValue("Gunnar Nylund".into())
        );
        assert_eq!(statements[2].value, StatementValue::Item("Q1140196".into()));
    }

    #[test]
    fn unmapped_institution_falls_back_to_empty_id() {
        assert_eq!(institution_qid("nordiska MUSEET"), "Q1140196");
        assert_eq!(institution_qid("Some Local Museum"), "");

        let artifact = ArtifactRecord {
            owner: "Some Local Museum".into(),
            ..ArtifactRecord::default()
        };
        assert_eq!(
            structured_data(&artifact),
            vec![Statement {
                property: "P195".into(),
                value: StatementValue::Item(String::new())
            }]
        );
    }

    #[test]
    fn claims_payload_is_wikibase_shaped() {
        let payload = claims_payload(&structured_data(&full_artifact()));
        let claims = payload["claims"].as_array().unwrap();

        assert_eq!(claims.len(), 3);
        assert_eq!(claims[0]["mainsnak"]["datavalue"]["value"]["text"], "Vas med lock");
        assert_eq!(claims[0]["type"], "statement");
        assert_eq!(claims[1]["mainsnak"]["snaktype"], "somevalue");
        assert_eq!(
            claims[1]["qualifiers"]["P2093"][0]["datavalue"]["value"],
            "Gunnar Nylund"
        );
        assert_eq!(claims[2]["mainsnak"]["datavalue"]["value"]["id"], "Q1140196");
        assert_eq!(claims[2]["rank"], "normal");
    }
}
