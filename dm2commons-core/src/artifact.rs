//! Records fetched from the Digitalt Museum API, and the license attached to an upload.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Display-language preference when a field carries several translations.
const LANGUAGE_PREFERENCE: &[&str] = &["sv", "no", "nb", "nn", "en"];

/// A field keyed by language code, e.g. `{"sv": "Vas", "en": "Vase"}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalizedText(pub BTreeMap<String, String>);

impl LocalizedText {
    /// Returns the preferred non-empty translation, if any.
    pub fn best(&self) -> Option<&str> {
        self.best_entry().map(|(_, text)| text)
    }

    /// Returns the preferred non-empty translation together with its language code.
    pub fn best_entry(&self) -> Option<(&str, &str)> {
        LANGUAGE_PREFERENCE
            .iter()
            .find_map(|lang| {
                self.0
                    .get_key_value(*lang)
                    .filter(|(_, text)| !text.trim().is_empty())
            })
            .or_else(|| self.0.iter().find(|(_, text)| !text.trim().is_empty()))
            .map(|(lang, text)| (lang.as_str(), text.as_str()))
    }

    pub fn or<'a>(&'a self, default: &'a str) -> &'a str {
        self.best().unwrap_or(default)
    }

    pub fn is_empty(&self) -> bool {
        self.best().is_none()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for LocalizedText {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        LocalizedText(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Reference from an artifact to one of its media records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef {
    #[serde(rename = "mediaId")]
    pub media_id: String,
}

/// A catalogued museum object. Immutable once fetched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: LocalizedText,
    #[serde(default, deserialize_with = "null_as_default")]
    pub creator: LocalizedText,
    #[serde(default, deserialize_with = "null_as_default")]
    pub material: LocalizedText,
    #[serde(default, deserialize_with = "null_as_default")]
    pub dating: LocalizedText,
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub object_type: LocalizedText,
    #[serde(default, deserialize_with = "null_as_default")]
    pub dimensions: LocalizedText,
    /// Name of the owning institution.
    #[serde(default, deserialize_with = "null_as_default")]
    pub owner: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub media: Vec<MediaRef>,
}

/// One downloadable rendition of a media record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaVariant {
    #[serde(rename = "contentType")]
    pub content_type: String,
    pub url: String,
}

/// A media record; only used to pick an image URL.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub variants: Vec<MediaVariant>,
}

impl MediaRecord {
    /// First variant whose content type is an image.
    pub fn image_url(&self) -> Option<&str> {
        self.variants
            .iter()
            .find(|v| v.content_type.starts_with("image/"))
            .map(|v| v.url.as_str())
    }
}

/// License applied to every upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseInfo {
    /// Wikitext license template, e.g. `{{cc-by-sa-4.0}}`.
    pub template: String,
    pub text: String,
    pub code: String,
}

impl LicenseInfo {
    /// The fixed license currently used for all artifacts.
    pub fn cc_by_sa_4() -> Self {
        LicenseInfo {
            template: "{{cc-by-sa-4.0}}".to_string(),
            text: "Creative Commons Attribution-ShareAlike 4.0".to_string(),
            code: "CC-BY-SA-4.0".to_string(),
        }
    }

    /// License for a given artifact. Every artifact gets the same one for now.
    pub fn for_artifact(_artifact: &ArtifactRecord) -> Self {
        Self::cc_by_sa_4()
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
