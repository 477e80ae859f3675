/*!
Project scaffolding.

A [`ScaffoldContext`] is threaded through a pipeline of [`Step`]s. Each step
reads what it needs from the merged template data and returns the updated
context. File bodies come from a [`TemplateCopier`], usually
[`HandlebarsTemplates`]. Nothing touches the disk until
[`ScaffoldContext::write`], which goes through the project writer and so never
clobbers existing metadata keys.
*/

use crate::project::writer::{merge_shallow, write_json_merged};
use crate::project::{
    write_project, Collection, CollectionMetadata, Fragment, FragmentComposition,
    FragmentCompositionMetadata, FragmentMetadata, FragmentType, Project, UnknownFile,
    DEFAULT_COMPOSITION_DEFINITION, PROJECT_MANIFEST,
};
use crate::{FragkitError, Result};
use handlebars::{handlebars_helper, Handlebars};
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use tracing::info;

/// Renders a named template against JSON data
pub trait TemplateCopier {
    fn copy_template(&self, name: &str, data: &Value) -> Result<String>;
}

const BUILTIN_TEMPLATES: [(&str, &str); 8] = [
    (
        "package.json",
        r#"{
  "name": {{{json projectSlug}}},
  "version": "1.0.0",
  "description": {{{json projectName}}},
  "private": true,
  "scripts": {
    "compress": "fragkit compress",
    "export": "fragkit export",
    "import": "fragkit import",
    "watch": "fragkit watch"
  }
}
"#,
    ),
    (
        "README.md",
        "# {{projectName}}\n\nFragments project. Run `fragkit add-collection` to get started.\n",
    ),
    (
        "fragment/index.html",
        "<div class=\"fragment-{{slug}}\">\n\t<h2>{{name}}</h2>\n</div>\n",
    ),
    ("fragment/styles.css", ".fragment-{{slug}} {\n}\n"),
    (
        "fragment/main.js",
        "const root = fragmentElement.querySelector('.fragment-{{slug}}');\n",
    ),
    (
        "fragment/react.js",
        "import React from 'react';\nimport ReactDOM from 'react-dom';\n\nfunction {{component}}() {\n\treturn <div className=\"fragment-{{slug}}\">{{name}}</div>;\n}\n\nReactDOM.render(<{{component}} />, fragmentElement);\n",
    ),
    ("fragment/configuration.json", "{\n\t\"fieldSets\": []\n}\n"),
    (
        "composition/definition.json",
        "{\n\t\"pageElement\": {\n\t\t\"type\": \"Section\",\n\t\t\"pageElements\": []\n\t}\n}\n",
    ),
];

/// [`TemplateCopier`] backed by the built-in Handlebars templates
pub struct HandlebarsTemplates {
    registry: Handlebars<'static>,
}

impl HandlebarsTemplates {
    pub fn new() -> Result<Self> {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(true);

        handlebars_helper!(json: |v: Value| v.to_string());
        registry.register_helper("json", Box::new(json));

        let mut templates = Self { registry };
        for (name, source) in BUILTIN_TEMPLATES {
            templates.register(name, source)?;
        }
        Ok(templates)
    }

    /// Add or replace a template
    pub fn register(&mut self, name: &str, source: &str) -> Result<()> {
        self.registry
            .register_template_string(name, source)
            .map_err(|e| FragkitError::template(format!("Invalid template {name}: {e}")))
    }
}

impl TemplateCopier for HandlebarsTemplates {
    fn copy_template(&self, name: &str, data: &Value) -> Result<String> {
        self.registry
            .render(name, data)
            .map_err(|e| FragkitError::template(format!("Failed to render {name}: {e}")))
    }
}

/// One named scaffolding step
pub type Step = fn(ScaffoldContext, &dyn TemplateCopier) -> Result<ScaffoldContext>;

/// State threaded through a scaffolding pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct ScaffoldContext {
    pub project: Project,
    pub defaults: Value,
    pub options: Value,
    pub answers: Value,
    /// Rendered root manifest, merged into `package.json` on write
    pub manifest: Option<Value>,
    /// Collection targeted by later steps
    pub current_collection: Option<String>,
}

fn default_data() -> Value {
    json!({
        "collectionDescription": "",
        "fragmentType": "component",
    })
}

impl ScaffoldContext {
    /// Context for a new project under `base_path`
    pub fn new<P: Into<PathBuf>>(base_path: P) -> Self {
        Self::from_project(Project::new(base_path, ""))
    }

    /// Context for adding to an existing project
    pub fn from_project(project: Project) -> Self {
        Self {
            project,
            defaults: default_data(),
            options: Value::Object(Map::new()),
            answers: Value::Object(Map::new()),
            manifest: None,
            current_collection: None,
        }
    }

    pub fn with_options(mut self, options: Value) -> Self {
        self.options = options;
        self
    }

    pub fn with_answer<V: Into<Value>>(mut self, key: &str, value: V) -> Self {
        if let Value::Object(answers) = &mut self.answers {
            answers.insert(key.to_string(), value.into());
        }
        self
    }

    /// `{defaults, options, answers}` merged in that order
    pub fn template_data(&self) -> Value {
        let merged = merge_shallow(self.defaults.clone(), self.options.clone());
        merge_shallow(merged, self.answers.clone())
    }

    fn answer(&self, key: &str) -> Option<String> {
        match self.template_data().get(key)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            _ => None,
        }
    }

    fn require(&self, key: &str) -> Result<String> {
        self.answer(key)
            .ok_or_else(|| FragkitError::validation(format!("Missing answer: {key}")))
    }

    fn data_with(&self, locals: Value) -> Value {
        merge_shallow(self.template_data(), locals)
    }

    /// Write the scaffolded project, merging over whatever already exists
    pub async fn write(&self) -> Result<()> {
        let base_path = &self.project.base_path;
        if let Some(manifest) = &self.manifest {
            tokio::fs::create_dir_all(base_path).await?;
            write_json_merged(&base_path.join(PROJECT_MANIFEST), manifest).await?;
        }
        write_project(base_path, &self.project).await?;
        info!(path = %base_path.display(), "Scaffolded project");
        Ok(())
    }
}

/// Lowercase dash-separated identifier for a display name
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.trim().chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_matches('-').to_string()
}

fn slug_for(name: &str) -> Result<String> {
    let slug = slugify(name);
    if slug.is_empty() {
        return Err(FragkitError::validation(format!("Cannot derive a slug from {name:?}")));
    }
    Ok(slug)
}

fn component_name(slug: &str) -> String {
    slug.split('-')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            chars
                .next()
                .map(|first| first.to_uppercase().chain(chars).collect::<String>())
                .unwrap_or_default()
        })
        .collect()
}

fn target_collection(context: &ScaffoldContext) -> Result<String> {
    let slug = context
        .answer("collectionSlug")
        .or_else(|| context.current_collection.clone())
        .ok_or_else(|| FragkitError::validation("No collection selected"))?;
    if context.project.collection(&slug).is_none() {
        return Err(FragkitError::validation(format!("Collection {slug} does not exist")));
    }
    Ok(slug)
}

/// Name the project and render its manifest and README
pub fn create_project(
    mut context: ScaffoldContext,
    templates: &dyn TemplateCopier,
) -> Result<ScaffoldContext> {
    let name = context.require("projectName")?;
    let slug = slug_for(&name)?;
    let data = context.data_with(json!({ "projectName": name, "projectSlug": slug }));

    let manifest: Value = serde_json::from_str(&templates.copy_template("package.json", &data)?)?;
    let readme = templates.copy_template("README.md", &data)?;

    context.project.name = slug;
    context.manifest = Some(manifest);
    context
        .project
        .unknown_files
        .push(UnknownFile::new("README.md", readme.into_bytes()));
    Ok(context)
}

/// Add an empty collection and select it for later steps
pub fn add_collection(
    mut context: ScaffoldContext,
    _templates: &dyn TemplateCopier,
) -> Result<ScaffoldContext> {
    let name = context.require("collectionName")?;
    let slug = slug_for(&name)?;
    if context.project.collection(&slug).is_some() {
        return Err(FragkitError::validation(format!("Collection {slug} already exists")));
    }

    let description = context.answer("collectionDescription").unwrap_or_default();
    context
        .project
        .collections
        .push(Collection::new(slug.clone(), CollectionMetadata { name, description }));
    context.current_collection = Some(slug);
    Ok(context)
}

/// Add a fragment to the selected collection
pub fn add_fragment(
    mut context: ScaffoldContext,
    templates: &dyn TemplateCopier,
) -> Result<ScaffoldContext> {
    let collection_slug = target_collection(&context)?;
    let name = context.require("fragmentName")?;
    let slug = slug_for(&name)?;
    let fragment_type: FragmentType = context
        .answer("fragmentType")
        .map(|t| t.parse())
        .transpose()?
        .unwrap_or_default();

    let data = context.data_with(json!({
        "name": name,
        "slug": slug,
        "type": fragment_type.as_str(),
        "component": component_name(&slug),
    }));
    let script = match fragment_type {
        FragmentType::React => "fragment/react.js",
        _ => "fragment/main.js",
    };

    let mut fragment = Fragment::new(slug.clone(), FragmentMetadata::with_defaults(name, fragment_type));
    fragment.html = templates.copy_template("fragment/index.html", &data)?;
    fragment.css = templates.copy_template("fragment/styles.css", &data)?;
    fragment.js = templates.copy_template(script, &data)?;
    fragment.configuration = templates.copy_template("fragment/configuration.json", &data)?;

    let collection = context
        .project
        .collection_mut(&collection_slug)
        .ok_or_else(|| FragkitError::validation(format!("Collection {collection_slug} does not exist")))?;
    if collection.fragments.iter().any(|f| f.slug == slug) {
        return Err(FragkitError::validation(format!(
            "Fragment {slug} already exists in {collection_slug}"
        )));
    }
    collection.fragments.push(fragment);
    Ok(context)
}

/// Add an empty composition to the selected collection
pub fn add_composition(
    mut context: ScaffoldContext,
    templates: &dyn TemplateCopier,
) -> Result<ScaffoldContext> {
    let collection_slug = target_collection(&context)?;
    let name = context.require("compositionName")?;
    let slug = slug_for(&name)?;
    let data = context.data_with(json!({ "name": name, "slug": slug }));
    let definition_data = templates.copy_template("composition/definition.json", &data)?;

    let collection = context
        .project
        .collection_mut(&collection_slug)
        .ok_or_else(|| FragkitError::validation(format!("Collection {collection_slug} does not exist")))?;
    if collection.fragment_compositions.iter().any(|c| c.slug == slug) {
        return Err(FragkitError::validation(format!(
            "Composition {slug} already exists in {collection_slug}"
        )));
    }
    collection.fragment_compositions.push(FragmentComposition {
        slug,
        metadata: FragmentCompositionMetadata {
            name,
            fragment_composition_definition_path: DEFAULT_COMPOSITION_DEFINITION.to_string(),
        },
        definition_data,
    });
    Ok(context)
}

/// Run `steps` in order, stopping at the first failure
pub fn run_pipeline(
    context: ScaffoldContext,
    steps: &[Step],
    templates: &dyn TemplateCopier,
) -> Result<ScaffoldContext> {
    steps
        .iter()
        .try_fold(context, |context, step| step(context, templates))
}
