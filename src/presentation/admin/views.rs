use askama::Template;

use crate::{
    application::forms::{ContentForm, FieldKind, FormErrors, Submission},
    infra::uploads::MediaUrls,
};

pub struct ContentFieldView {
    pub key: String,
    pub label: String,
    pub help_text: String,
    pub required: bool,
    /// One of `text`, `textarea`, `richtext`, `image`.
    pub widget: &'static str,
    pub text: String,
    pub image_url: Option<String>,
    pub image_filename: Option<String>,
    pub error: Option<String>,
}

pub struct ContentFormView {
    pub group_name: String,
    pub group_slug: String,
    pub instructions: Option<String>,
    pub action: String,
    pub fields: Vec<ContentFieldView>,
    pub saved: bool,
    pub has_errors: bool,
}

#[derive(Template)]
#[template(path = "admin/group_content.html")]
pub struct GroupContentTemplate {
    pub view: ContentFormView,
}

fn widget_name(kind: FieldKind) -> &'static str {
    match kind {
        FieldKind::TextInput => "text",
        FieldKind::Textarea => "textarea",
        FieldKind::RichText => "richtext",
        FieldKind::ImageUpload => "image",
    }
}

/// Build the editor form. Submitted text wins over stored text so a rejected
/// submission is shown back as entered.
pub fn build_content_form_view(
    form: &ContentForm,
    action: String,
    media: &MediaUrls,
    submitted: Option<(&Submission, &FormErrors)>,
    saved: bool,
) -> ContentFormView {
    let fields = form
        .fields
        .iter()
        .map(|field| {
            let text = submitted
                .and_then(|(submission, _)| submission.text(&field.key))
                .map(str::to_string)
                .unwrap_or_else(|| field.initial_text.clone());
            ContentFieldView {
                key: field.key.clone(),
                label: field.label.clone(),
                help_text: field.help_text.clone(),
                required: field.required,
                widget: widget_name(field.kind),
                text,
                image_url: field.initial_image.as_ref().map(|image| media.url_for(image)),
                image_filename: field
                    .initial_image
                    .as_ref()
                    .map(|image| image.filename.clone()),
                error: submitted
                    .and_then(|(_, errors)| errors.get(&field.key))
                    .map(str::to_string),
            }
        })
        .collect();

    ContentFormView {
        group_name: form.name.clone(),
        group_slug: form.slug.clone(),
        instructions: form.instructions.clone(),
        action,
        fields,
        saved,
        has_errors: submitted.is_some_and(|(_, errors)| !errors.is_empty()),
    }
}
