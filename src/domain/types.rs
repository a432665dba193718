//! Shared domain enumerations aligned with persisted database enums.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Kind of content a bit stores and how the resolver presents it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "bit_type", rename_all = "snake_case")]
pub enum BitType {
    PlainText,
    Html,
    Image,
}

impl BitType {
    pub const ALL: [BitType; 3] = [BitType::PlainText, BitType::Html, BitType::Image];

    pub fn as_str(self) -> &'static str {
        match self {
            BitType::PlainText => "plain_text",
            BitType::Html => "html",
            BitType::Image => "image",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            BitType::PlainText => "Plain text",
            BitType::Html => "HTML",
            BitType::Image => "Image",
        }
    }

    /// True for types whose payload lives in the text column.
    pub fn stores_text(self) -> bool {
        matches!(self, BitType::PlainText | BitType::Html)
    }
}

impl fmt::Display for BitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant(pub String);

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown variant `{}`", self.0)
    }
}

impl std::error::Error for UnknownVariant {}

impl FromStr for BitType {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        BitType::ALL
            .into_iter()
            .find(|kind| kind.as_str() == value)
            .ok_or_else(|| UnknownVariant(value.to_string()))
    }
}

/// Input widget hint for text bits in the content edit form.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text_widget", rename_all = "snake_case")]
pub enum TextWidget {
    #[default]
    CharField,
    Textarea,
}

impl TextWidget {
    pub fn as_str(self) -> &'static str {
        match self {
            TextWidget::CharField => "char_field",
            TextWidget::Textarea => "textarea",
        }
    }
}

impl FromStr for TextWidget {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "char_field" => Ok(TextWidget::CharField),
            "textarea" => Ok(TextWidget::Textarea),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bit_type_parses_its_wire_name() {
        for kind in BitType::ALL {
            assert_eq!(kind.as_str().parse::<BitType>(), Ok(kind));
        }
        assert!("rich_text".parse::<BitType>().is_err());
    }

    #[test]
    fn only_text_kinds_store_text() {
        assert!(BitType::PlainText.stores_text());
        assert!(BitType::Html.stores_text());
        assert!(!BitType::Image.stores_text());
    }

    #[test]
    fn bit_type_serializes_snake_case() {
        let json = serde_json::to_string(&BitType::PlainText).expect("serialize");
        assert_eq!(json, "\"plain_text\"");
    }
}
