//! Admin form building for groups.
//!
//! Two view-models over the same stored group:
//! - [`GroupDefinitionView`] for administrators defining bits.
//! - [`ContentForm`] for editors filling in bit data.
//!
//! Field widgets and validation rules come from [`field_spec`], a closed
//! dispatch over `(BitType, TextWidget)`.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use serde::Serialize;
use uuid::Uuid;

use crate::{
    application::repos::UpdateBitDataParams,
    domain::{
        entities::{GroupRecord, ImageRef, LoadedGroup},
        types::{BitType, TextWidget},
    },
};

pub const REQUIRED_MESSAGE: &str = "This field is required.";
pub const EXPECTS_IMAGE_MESSAGE: &str = "This field accepts an image upload only.";
pub const EXPECTS_TEXT_MESSAGE: &str = "This field accepts text only.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    TextInput,
    Textarea,
    /// Textarea flagged for a rich-text editor.
    RichText,
    ImageUpload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldRule {
    Text,
    Image,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub kind: FieldKind,
    pub rule: FieldRule,
}

pub const fn field_spec(bit_type: BitType, widget: TextWidget) -> FieldSpec {
    match (bit_type, widget) {
        (BitType::PlainText, TextWidget::CharField) => FieldSpec {
            kind: FieldKind::TextInput,
            rule: FieldRule::Text,
        },
        (BitType::PlainText, TextWidget::Textarea) => FieldSpec {
            kind: FieldKind::Textarea,
            rule: FieldRule::Text,
        },
        (BitType::Html, _) => FieldSpec {
            kind: FieldKind::RichText,
            rule: FieldRule::Text,
        },
        (BitType::Image, _) => FieldSpec {
            kind: FieldKind::ImageUpload,
            rule: FieldRule::Image,
        },
    }
}

pub fn field_key(bit_id: Uuid) -> String {
    format!("bit_{bit_id}")
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormField {
    pub key: String,
    pub bit_id: Uuid,
    pub label: String,
    pub help_text: String,
    pub required: bool,
    pub kind: FieldKind,
    pub initial_text: String,
    pub initial_image: Option<ImageRef>,
}

/// Editor-facing view: the data form of one group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContentForm {
    pub group_id: Uuid,
    pub slug: String,
    pub name: String,
    pub instructions: Option<String>,
    pub fields: Vec<FormField>,
}

pub fn build_content_form(group: &LoadedGroup) -> ContentForm {
    let fields = group
        .bits
        .iter()
        .map(|entry| {
            let spec = field_spec(entry.bit.bit_type, entry.bit.text_widget);
            let (initial_text, initial_image) = match spec.rule {
                FieldRule::Text => (entry.data.text.clone(), None),
                FieldRule::Image => (String::new(), entry.data.image.clone()),
            };
            FormField {
                key: field_key(entry.bit.id),
                bit_id: entry.bit.id,
                label: entry.bit.name.clone(),
                help_text: entry.bit.help_text.clone(),
                required: entry.bit.required,
                kind: spec.kind,
                initial_text,
                initial_image,
            }
        })
        .collect();

    ContentForm {
        group_id: group.group.id,
        slug: group.group.slug.clone(),
        name: group.group.name.clone(),
        instructions: group.group.instructions.clone(),
        fields,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BitDefinitionView {
    pub id: Uuid,
    pub name: String,
    pub context_name: String,
    pub bit_type: BitType,
    pub sort_order: i32,
    pub required: bool,
    pub help_text: String,
    pub text_widget: TextWidget,
}

/// Administrator-facing view: group metadata and bit definitions, no data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupDefinitionView {
    pub group: GroupRecord,
    pub bits: Vec<BitDefinitionView>,
}

impl From<&LoadedGroup> for GroupDefinitionView {
    fn from(loaded: &LoadedGroup) -> Self {
        let bits = loaded
            .bits
            .iter()
            .map(|entry| BitDefinitionView {
                id: entry.bit.id,
                name: entry.bit.name.clone(),
                context_name: entry.bit.context_name.clone(),
                bit_type: entry.bit.bit_type,
                sort_order: entry.bit.sort_order,
                required: entry.bit.required,
                help_text: entry.bit.help_text.clone(),
                text_widget: entry.bit.text_widget,
            })
            .collect();
        Self {
            group: loaded.group.clone(),
            bits,
        }
    }
}

/// Values posted from the content form, keyed by [`field_key`].
///
/// A text field absent from the submission keeps its stored value. An image
/// field keeps its stored image unless a new one is supplied or it is cleared.
#[derive(Debug, Clone, Default)]
pub struct Submission {
    texts: HashMap<String, String>,
    images: HashMap<String, ImageRef>,
    cleared: HashSet<String>,
}

impl Submission {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_text(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.texts.insert(key.into(), value.into());
    }

    pub fn set_image(&mut self, key: impl Into<String>, image: ImageRef) {
        self.images.insert(key.into(), image);
    }

    pub fn clear_image(&mut self, key: impl Into<String>) {
        self.cleared.insert(key.into());
    }

    pub fn with_text(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_text(key, value);
        self
    }

    pub fn with_image(mut self, key: impl Into<String>, image: ImageRef) -> Self {
        self.set_image(key, image);
        self
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        self.texts.get(key).map(String::as_str)
    }

    /// Images carried by this submission, for cleanup when it is rejected.
    pub fn images(&self) -> impl Iterator<Item = &ImageRef> {
        self.images.values()
    }
}

/// Field errors keyed by [`field_key`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FormErrors {
    errors: BTreeMap<String, String>,
}

impl FormErrors {
    pub fn insert(&mut self, key: impl Into<String>, message: impl Into<String>) {
        self.errors.insert(key.into(), message.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.errors.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }
}

impl fmt::Display for FormErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .errors
            .iter()
            .map(|(key, message)| format!("{key}: {message}"))
            .collect();
        f.write_str(&parts.join("; "))
    }
}

/// Validate `submission` against the group's bits and return the data
/// updates for bits whose payload changed.
pub fn apply_submission(
    group: &LoadedGroup,
    submission: &Submission,
) -> Result<Vec<UpdateBitDataParams>, FormErrors> {
    let mut errors = FormErrors::default();
    let mut updates = Vec::new();

    for entry in &group.bits {
        let key = field_key(entry.bit.id);
        let spec = field_spec(entry.bit.bit_type, entry.bit.text_widget);

        let update = match spec.rule {
            FieldRule::Text => {
                if submission.images.contains_key(&key) {
                    errors.insert(&key, EXPECTS_TEXT_MESSAGE);
                    continue;
                }
                let text = submission
                    .texts
                    .get(&key)
                    .cloned()
                    .unwrap_or_else(|| entry.data.text.clone());
                if entry.bit.required && text.trim().is_empty() {
                    errors.insert(&key, REQUIRED_MESSAGE);
                    continue;
                }
                UpdateBitDataParams {
                    bit_id: entry.bit.id,
                    text,
                    image: None,
                }
            }
            FieldRule::Image => {
                if submission
                    .texts
                    .get(&key)
                    .is_some_and(|text| !text.is_empty())
                {
                    errors.insert(&key, EXPECTS_IMAGE_MESSAGE);
                    continue;
                }
                let image = match submission.images.get(&key) {
                    Some(image) => Some(image.clone()),
                    None if submission.cleared.contains(&key) => None,
                    None => entry.data.image.clone(),
                };
                if entry.bit.required && image.is_none() {
                    errors.insert(&key, REQUIRED_MESSAGE);
                    continue;
                }
                UpdateBitDataParams {
                    bit_id: entry.bit.id,
                    text: String::new(),
                    image,
                }
            }
        };

        let unchanged = update.text == entry.data.text && update.image == entry.data.image;
        if !unchanged {
            updates.push(update);
        }
    }

    if errors.is_empty() {
        Ok(updates)
    } else {
        Err(errors)
    }
}
