//! Conversion of a bit and its stored data into a template-ready value.

use serde::Serialize;

use crate::domain::{
    entities::{BitDataRecord, BitRecord, ImageRef},
    types::BitType,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum BitValue {
    /// Raw text; the template layer escapes it on output.
    Text(String),
    /// Markup emitted verbatim. Must never be escaped again.
    SafeHtml(String),
    /// `None` until an editor uploads an image.
    Image(Option<ImageRef>),
}

impl BitValue {
    pub fn is_pre_escaped(&self) -> bool {
        matches!(self, BitValue::SafeHtml(_))
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            BitValue::Text(text) | BitValue::SafeHtml(text) => Some(text),
            BitValue::Image(_) => None,
        }
    }

    pub fn as_image(&self) -> Option<&ImageRef> {
        match self {
            BitValue::Image(image) => image.as_ref(),
            _ => None,
        }
    }
}

pub fn resolve(bit: &BitRecord, data: &BitDataRecord) -> BitValue {
    match bit.bit_type {
        BitType::PlainText => BitValue::Text(data.text.clone()),
        BitType::Html => BitValue::SafeHtml(data.text.clone()),
        BitType::Image => BitValue::Image(data.image.clone()),
    }
}
