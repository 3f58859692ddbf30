//! Content model for a slide deck.
//!
//! Deserialisation is deliberately forgiving: a field with the wrong JSON type
//! is treated as absent so that one sloppy entry degrades a single block
//! instead of failing the whole deck.

use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::theme::ThemeId;

pub const DEFAULT_DECK_TITLE: &str = "Deck";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Deck {
    #[serde(default, deserialize_with = "lenient_or_default")]
    pub meta: DeckMeta,
    #[serde(default, deserialize_with = "lenient_or_default")]
    pub slides: Vec<SlideEntry>,
}

impl Deck {
    /// Parse a content description. Only malformed JSON is an error; a
    /// document of the wrong shape yields an empty deck.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_str(text)?;
        Ok(Self::from_value(value))
    }

    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(_) => Deck::deserialize(value).unwrap_or_else(|e| {
                warn!("Content description has an unexpected shape: {e}");
                Deck::default()
            }),
            other => {
                warn!(
                    "Content description is not an object ({}), using an empty deck",
                    kind_of(&other)
                );
                Deck::default()
            }
        }
    }

    pub fn title(&self) -> &str {
        self.meta.title.as_deref().unwrap_or(DEFAULT_DECK_TITLE)
    }

    pub fn theme(&self) -> ThemeId {
        self.meta.theme
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeckMeta {
    #[serde(default, deserialize_with = "lenient")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "theme_name")]
    pub theme: ThemeId,
}

/// One element of the `slides` array.
#[derive(Debug, Clone)]
pub enum SlideEntry {
    Spec(SlideSpec),
    /// Anything that is not a JSON object. The builder rejects these.
    Unusable(Value),
}

impl<'de> Deserialize<'de> for SlideEntry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(SlideEntry::from_value(value))
    }
}

impl SlideEntry {
    fn from_value(value: Value) -> Self {
        if !value.is_object() {
            return SlideEntry::Unusable(value);
        }
        match SlideSpec::deserialize(&value) {
            Ok(spec) => SlideEntry::Spec(spec),
            Err(e) => {
                debug!("Slide entry could not be read: {e}");
                SlideEntry::Unusable(value)
            }
        }
    }
}

impl From<SlideSpec> for SlideEntry {
    fn from(spec: SlideSpec) -> Self {
        SlideEntry::Spec(spec)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SlideType {
    Title,
    Closing,
    Section,
    #[default]
    Content,
}

impl SlideType {
    /// Exact tag match; anything unrecognised renders as a content slide.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "title" => SlideType::Title,
            "closing" => SlideType::Closing,
            "section" => SlideType::Section,
            _ => SlideType::Content,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SlideType::Title => "title",
            SlideType::Closing => "closing",
            SlideType::Section => "section",
            SlideType::Content => "content",
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SlideSpec {
    #[serde(rename = "type", default, deserialize_with = "slide_type")]
    pub slide_type: SlideType,
    #[serde(default, deserialize_with = "lenient")]
    pub headline: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub subheadline: Option<String>,
    #[serde(default, deserialize_with = "string_list")]
    pub bullets: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient_column")]
    pub left: Option<ColumnSpec>,
    #[serde(default, deserialize_with = "lenient_column")]
    pub right: Option<ColumnSpec>,
}

impl SlideSpec {
    pub fn has_columns(&self) -> bool {
        self.left.is_some() || self.right.is_some()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ColumnSpec {
    #[serde(default, deserialize_with = "lenient")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "string_list")]
    pub bullets: Option<Vec<String>>,
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(None);
    }
    match T::deserialize(&value) {
        Ok(parsed) => Ok(Some(parsed)),
        Err(e) => {
            debug!("Ignoring field of unexpected type {}: {e}", kind_of(&value));
            Ok(None)
        }
    }
}

fn lenient_or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    Ok(lenient(deserializer)?.unwrap_or_default())
}

// `left: {}` still declares a column, but `left: 7` does not.
fn lenient_column<'de, D>(deserializer: D) -> Result<Option<ColumnSpec>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    if !value.is_object() {
        return Ok(None);
    }
    Ok(ColumnSpec::deserialize(&value).ok())
}

fn string_list<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::Array(items) => Ok(Some(
            items
                .into_iter()
                .filter_map(|item| match item {
                    Value::String(text) => Some(text),
                    other => {
                        debug!("Skipping non-string bullet ({})", kind_of(&other));
                        None
                    }
                })
                .collect(),
        )),
        _ => Ok(None),
    }
}

fn slide_type<'de, D>(deserializer: D) -> Result<SlideType, D::Error>
where
    D: Deserializer<'de>,
{
    let tag: Option<String> = lenient(deserializer)?;
    Ok(tag.as_deref().map(SlideType::from_tag).unwrap_or_default())
}

fn theme_name<'de, D>(deserializer: D) -> Result<ThemeId, D::Error>
where
    D: Deserializer<'de>,
{
    let name: Option<String> = lenient(deserializer)?;
    Ok(name.as_deref().map(ThemeId::from_name).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_document() {
        let deck = Deck::from_json(
            r#"{
                "meta": {"title": "Pitch", "theme": "Purple"},
                "slides": [
                    {"type": "title", "headline": "Welcome", "subheadline": "to the show"},
                    {"type": "content", "left": {"title": "Before", "bullets": ["slow"]},
                     "right": {"bullets": ["fast"]}}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(deck.title(), "Pitch");
        assert_eq!(deck.theme(), ThemeId::Purple);
        assert_eq!(deck.slides.len(), 2);

        let SlideEntry::Spec(first) = &deck.slides[0] else {
            panic!("first slide should be usable");
        };
        assert_eq!(first.slide_type, SlideType::Title);
        assert_eq!(first.headline.as_deref(), Some("Welcome"));

        let SlideEntry::Spec(second) = &deck.slides[1] else {
            panic!("second slide should be usable");
        };
        assert!(second.has_columns());
        assert_eq!(second.left.as_ref().unwrap().title.as_deref(), Some("Before"));
        assert!(second.right.as_ref().unwrap().title.is_none());
    }

    #[test]
    fn missing_meta_uses_defaults() {
        let deck = Deck::from_json(r#"{"slides": []}"#).unwrap();
        assert_eq!(deck.title(), DEFAULT_DECK_TITLE);
        assert_eq!(deck.theme(), ThemeId::Blue);
        assert!(deck.slides.is_empty());
    }

    #[test]
    fn wrong_shaped_document_is_empty_deck() {
        let deck = Deck::from_json("[1, 2, 3]").unwrap();
        assert!(deck.slides.is_empty());

        let deck = Deck::from_json(r#"{"slides": "nope"}"#).unwrap();
        assert!(deck.slides.is_empty());
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(Deck::from_json("{\"slides\": [").is_err());
    }

    #[test]
    fn non_object_entries_are_unusable() {
        let deck = Deck::from_json(r#"{"slides": [null, 3, "text", {"headline": "ok"}]}"#).unwrap();
        assert_eq!(deck.slides.len(), 4);
        assert!(matches!(deck.slides[0], SlideEntry::Unusable(Value::Null)));
        assert!(matches!(deck.slides[1], SlideEntry::Unusable(_)));
        assert!(matches!(deck.slides[2], SlideEntry::Unusable(_)));
        assert!(matches!(deck.slides[3], SlideEntry::Spec(_)));
    }

    #[test]
    fn wrong_typed_fields_degrade_to_absent() {
        let deck = Deck::from_json(
            r#"{"slides": [{"type": 4, "headline": ["x"], "subheadline": "kept",
                            "bullets": ["a", 1, null, "b"], "left": 9}]}"#,
        )
        .unwrap();
        let SlideEntry::Spec(spec) = &deck.slides[0] else {
            panic!("entry should stay usable");
        };
        assert_eq!(spec.slide_type, SlideType::Content);
        assert!(spec.headline.is_none());
        assert_eq!(spec.subheadline.as_deref(), Some("kept"));
        assert_eq!(spec.bullets.as_deref(), Some(&["a".to_string(), "b".to_string()][..]));
        assert!(spec.left.is_none());
    }

    #[test]
    fn unknown_slide_type_is_content() {
        assert_eq!(SlideType::from_tag("agenda"), SlideType::Content);
        assert_eq!(SlideType::from_tag("Title"), SlideType::Content);
        assert_eq!(SlideType::from_tag("closing"), SlideType::Closing);
    }
}
