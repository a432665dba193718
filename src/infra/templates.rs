//! Site template engine backed by Tera.
//!
//! Autoescaping is disabled. Values are escaped when the assembled context is
//! converted, so pre-escaped HTML bits pass through untouched while plain
//! text bits and image fields are always escaped.

use std::{
    collections::HashMap,
    error::Error as StdError,
    path::{Path, PathBuf},
    sync::Arc,
};

use serde_json::{Map, Value, json};
use tera::{Context, Tera};
use tokio::runtime::Handle;
use tracing::{debug, info};

use crate::{
    application::assemble::ContextAssembler,
    domain::{context::ContextMap, resolve::BitValue},
    infra::{error::InfraError, uploads::MediaUrls},
};

const SOURCE: &str = "pagebits::infra::templates";
const PAGEBITS_FUNCTION: &str = "pagebits";

pub struct TemplateEngine {
    tera: Tera,
    directory: PathBuf,
    media: MediaUrls,
}

impl TemplateEngine {
    /// Load every `*.html` file below `directory` and register the
    /// `pagebits(slug=...)` template function.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn load(
        directory: &Path,
        assembler: ContextAssembler,
        media: MediaUrls,
    ) -> Result<Self, InfraError> {
        if !directory.is_dir() {
            return Err(InfraError::configuration(format!(
                "templates directory `{}` does not exist",
                directory.display()
            )));
        }

        let pattern = directory.join("**/*.html");
        let pattern = pattern.to_str().ok_or_else(|| {
            InfraError::configuration("templates directory path is not valid UTF-8")
        })?;

        let mut tera = Tera::new(pattern).map_err(|err| {
            InfraError::configuration(format!(
                "failed to load templates: {}",
                error_chain(&err)
            ))
        })?;
        tera.autoescape_on(vec![]);

        let runtime = Handle::try_current()
            .map_err(|err| InfraError::configuration(format!("no async runtime: {err}")))?;
        tera.register_function(
            PAGEBITS_FUNCTION,
            pagebits_function(assembler, media.clone(), runtime),
        );

        info!(
            target = SOURCE,
            directory = %directory.display(),
            count = tera.get_template_names().count(),
            "site templates loaded"
        );

        Ok(Self {
            tera,
            directory: directory.to_path_buf(),
            media,
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn has_template(&self, name: &str) -> bool {
        self.tera.get_template_names().any(|loaded| loaded == name)
    }

    /// Render synchronously. Must not run on an async worker thread when the
    /// template calls `pagebits`.
    pub fn render(&self, template: &str, context: &ContextMap) -> Result<String, InfraError> {
        let context = to_tera_context(context, &self.media);
        debug!(target = SOURCE, template, "rendering template");
        self.tera
            .render(template, &context)
            .map_err(|err| InfraError::render(format!("{template}: {}", error_chain(&err))))
    }

    /// Render on the blocking pool.
    pub async fn render_blocking(
        self: Arc<Self>,
        template: String,
        context: ContextMap,
    ) -> Result<String, InfraError> {
        tokio::task::spawn_blocking(move || self.render(&template, &context))
            .await
            .map_err(|err| InfraError::render(format!("render task failed: {err}")))?
    }
}

/// Template-facing representation of one resolved value.
pub fn context_value(value: &BitValue, media: &MediaUrls) -> Value {
    match value {
        BitValue::Text(text) => Value::String(tera::escape_html(text)),
        BitValue::SafeHtml(html) => Value::String(html.clone()),
        BitValue::Image(Some(image)) => json!({
            "url": tera::escape_html(&media.url_for(image)),
            "path": tera::escape_html(&image.stored_path),
            "filename": tera::escape_html(&image.filename),
            "content_type": tera::escape_html(&image.content_type),
            "width": image.width,
            "height": image.height,
        }),
        BitValue::Image(None) => Value::Null,
    }
}

pub fn context_object(context: &ContextMap, media: &MediaUrls) -> Map<String, Value> {
    context
        .iter()
        .map(|(name, value)| (name.to_string(), context_value(value, media)))
        .collect()
}

fn to_tera_context(context: &ContextMap, media: &MediaUrls) -> Context {
    let mut tera_context = Context::new();
    for (name, value) in context_object(context, media) {
        tera_context.insert(name, &value);
    }
    tera_context
}

fn pagebits_function(
    assembler: ContextAssembler,
    media: MediaUrls,
    runtime: Handle,
) -> impl Fn(&HashMap<String, Value>) -> tera::Result<Value> + Send + Sync + 'static {
    move |args: &HashMap<String, Value>| {
        let slug = args
            .get("slug")
            .and_then(Value::as_str)
            .ok_or_else(|| tera::Error::msg("pagebits() requires a `slug` string argument"))?;

        let context = runtime
            .block_on(assembler.pagebits(slug))
            .map_err(|err| tera::Error::msg(format!("pagebits(`{slug}`) failed: {err}")))?;

        Ok(Value::Object(context_object(&context, &media)))
    }
}

fn error_chain(err: &dyn StdError) -> String {
    let mut parts = vec![err.to_string()];
    let mut current = err.source();
    while let Some(inner) = current {
        parts.push(inner.to_string());
        current = inner.source();
    }
    parts.join(": ")
}
