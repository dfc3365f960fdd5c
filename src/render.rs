//! Reply layout.
//!
//! The renderer does not write answers. It takes section bodies from a
//! [`ContentSource`] and lays them out in template order, each section once,
//! stopping at the design checkpoint until the user confirms.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::category::Category;
use crate::dispatch::{Phase, ResponsePlan, Section, template_for};

/// Where section bodies come from.
pub trait ContentSource {
    /// Body for one section, or `None` if the source has nothing for it.
    fn section(&self, category: Category, section: &Section) -> Option<String>;
}

/// Fills every section with its guidance line, producing a reply skeleton.
#[derive(Debug, Default, Clone, Copy)]
pub struct GuidanceContent;

impl ContentSource for GuidanceContent {
    fn section(&self, _category: Category, section: &Section) -> Option<String> {
        Some(section.guidance.to_string())
    }
}

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("failed to read content file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid content file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Section bodies loaded from TOML, keyed by template id then section slug.
///
/// ```toml
/// [design]
/// options = "1. SQLite\n2. Postgres"
/// recommendation = "Postgres."
/// ```
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(transparent)]
pub struct TableContent {
    tables: HashMap<String, HashMap<String, String>>,
}

impl TableContent {
    pub fn from_toml(contents: &str) -> Result<Self, ContentError> {
        let content: TableContent = toml::from_str(contents)?;
        content.warn_unknown_keys();
        Ok(content)
    }

    pub fn load(path: &Path) -> Result<Self, ContentError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ContentError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = ?path, "content_file_loaded");
        Self::from_toml(&contents)
    }

    fn warn_unknown_keys(&self) {
        for (template_id, sections) in &self.tables {
            let Some(category) = Category::from_name(template_id) else {
                warn!(table = %template_id, "content_unknown_template");
                continue;
            };
            let template = template_for(category);
            for slug in sections.keys() {
                if template.section(slug).is_none() {
                    warn!(table = %template_id, section = %slug, "content_unknown_section");
                }
            }
        }
    }
}

impl ContentSource for TableContent {
    fn section(&self, category: Category, section: &Section) -> Option<String> {
        self.tables
            .get(category.template_id())
            .and_then(|t| t.get(section.slug))
            .map(|body| body.trim().to_string())
            .filter(|body| !body.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("no content for section `{section}` of the {template} template")]
    MissingSection {
        template: &'static str,
        section: &'static str,
    },
}

/// Output format for rendered replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Markdown,
    Json,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "markdown" | "md" => Some(Self::Markdown),
            "json" => Some(Self::Json),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Markdown => "markdown",
            Self::Json => "json",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedSection {
    pub category: Category,
    pub name: &'static str,
    pub slug: &'static str,
    #[serde(skip)]
    pub guidance: &'static str,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedReply {
    /// True when no template applied and the reply is free-form.
    pub adaptive: bool,
    pub categories: Vec<Category>,
    pub sections: Vec<RenderedSection>,
    /// True when the reply stopped at the confirmation checkpoint.
    pub awaiting_confirmation: bool,
    /// Names of the sections held back until confirmation.
    pub pending_sections: Vec<&'static str>,
}

impl RenderedReply {
    pub fn section(&self, slug: &str) -> Option<&RenderedSection> {
        self.sections.iter().find(|s| s.slug == slug)
    }

    pub fn to_markdown(&self, show_guidance: bool) -> String {
        if self.adaptive {
            return "_No question tag recognized. Answering without a template._\n".to_string();
        }

        let merged = self.categories.len() > 1;
        let section_level = if merged { "###" } else { "##" };
        let mut out = String::new();
        let mut current: Option<Category> = None;

        for section in &self.sections {
            if merged && current != Some(section.category) {
                out.push_str(&format!("## {}\n\n", section.category.label()));
                current = Some(section.category);
            }
            out.push_str(&format!("{} {}\n\n", section_level, section.name));
            if show_guidance && section.body != section.guidance {
                out.push_str(&format!("_{}_\n\n", section.guidance));
            }
            out.push_str(section.body.trim_end());
            out.push_str("\n\n");
        }

        if self.awaiting_confirmation {
            out.push_str(&format!(
                "> Waiting for confirmation. Reply `yes` to continue with {}, or say what to change.\n",
                self.pending_sections.join(" and ")
            ));
        }

        out
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn format(&self, format: OutputFormat, show_guidance: bool) -> serde_json::Result<String> {
        match format {
            OutputFormat::Markdown => Ok(self.to_markdown(show_guidance)),
            OutputFormat::Json => self.to_json(),
        }
    }
}

pub struct Renderer<'a, C: ContentSource + ?Sized> {
    content: &'a C,
}

impl<'a, C: ContentSource + ?Sized> Renderer<'a, C> {
    pub fn new(content: &'a C) -> Self {
        Self { content }
    }

    /// Render the sections of one phase of a plan.
    ///
    /// `Phase::Immediate` renders the first reply, which ends at the
    /// checkpoint when the plan has one. `Phase::AfterConfirmation` renders
    /// only the held-back sections.
    pub fn render(&self, plan: &ResponsePlan, phase: Phase) -> Result<RenderedReply, RenderError> {
        let categories: Vec<Category> = plan.templates().iter().map(|t| t.category).collect();

        if plan.is_adaptive() {
            return Ok(RenderedReply {
                adaptive: true,
                categories,
                sections: Vec::new(),
                awaiting_confirmation: false,
                pending_sections: Vec::new(),
            });
        }

        let mut sections = Vec::new();
        for planned in plan.sections_in(phase) {
            let body = self
                .content
                .section(planned.category, planned.section)
                .ok_or(RenderError::MissingSection {
                    template: planned.category.template_id(),
                    section: planned.section.name,
                })?;
            sections.push(RenderedSection {
                category: planned.category,
                name: planned.section.name,
                slug: planned.section.slug,
                guidance: planned.section.guidance,
                body,
            });
        }

        let pending_sections: Vec<&'static str> = if phase == Phase::Immediate {
            plan.sections_in(Phase::AfterConfirmation)
                .iter()
                .map(|p| p.section.name)
                .collect()
        } else {
            Vec::new()
        };

        debug!(
            sections = sections.len(),
            pending = pending_sections.len(),
            "reply_rendered"
        );

        Ok(RenderedReply {
            adaptive: false,
            categories,
            sections,
            awaiting_confirmation: !pending_sections.is_empty(),
            pending_sections,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::{CategorySet, Classification};
    use crate::dispatch::dispatch;

    fn plan(categories: &[Category]) -> ResponsePlan {
        dispatch(&Classification::from_set(
            categories.iter().copied().collect::<CategorySet>(),
        ))
    }

    fn slugs(reply: &RenderedReply) -> Vec<&'static str> {
        reply.sections.iter().map(|s| s.slug).collect()
    }

    #[test]
    fn test_quick_skeleton() {
        let reply = Renderer::new(&GuidanceContent)
            .render(&plan(&[Category::QuickQuestion]), Phase::Immediate)
            .unwrap();
        assert_eq!(slugs(&reply), vec!["answer", "reasoning"]);
        assert!(!reply.awaiting_confirmation);
        assert!(!reply.adaptive);
    }

    #[test]
    fn test_design_stops_at_checkpoint() {
        let reply = Renderer::new(&GuidanceContent)
            .render(&plan(&[Category::DesignQuestion]), Phase::Immediate)
            .unwrap();
        assert_eq!(
            slugs(&reply),
            vec!["options", "comparison_matrix", "recommendation", "validation"]
        );
        assert!(reply.awaiting_confirmation);
        assert_eq!(reply.pending_sections, vec!["Diagram", "Implementation Plan"]);
        assert!(reply.section("diagram").is_none());
    }

    #[test]
    fn test_design_after_confirmation() {
        let reply = Renderer::new(&GuidanceContent)
            .render(&plan(&[Category::DesignQuestion]), Phase::AfterConfirmation)
            .unwrap();
        assert_eq!(slugs(&reply), vec!["diagram", "implementation_plan"]);
        assert!(!reply.awaiting_confirmation);
    }

    #[test]
    fn test_adaptive_reply() {
        let reply = Renderer::new(&GuidanceContent)
            .render(&ResponsePlan::Adaptive, Phase::Immediate)
            .unwrap();
        assert!(reply.adaptive);
        assert!(reply.sections.is_empty());
        assert!(reply.to_markdown(true).contains("No question tag recognized"));
    }

    #[test]
    fn test_missing_section_is_error() {
        let content = TableContent::from_toml(
            r#"
[debug]
problem = "ModuleNotFoundError: no module named foo"
root_cause = "The venv is not activated."
"#,
        )
        .unwrap();
        let err = Renderer::new(&content)
            .render(&plan(&[Category::DebugQuestion]), Phase::Immediate)
            .unwrap_err();
        assert_eq!(
            err,
            RenderError::MissingSection {
                template: "debug",
                section: "Solution Steps",
            }
        );
    }

    #[test]
    fn test_table_content_renders_in_template_order() {
        // keys deliberately out of order
        let content = TableContent::from_toml(
            r#"
[quick]
reasoning = "Y has better tooling."
answer = "Use Y."
"#,
        )
        .unwrap();
        let reply = Renderer::new(&content)
            .render(&plan(&[Category::QuickQuestion]), Phase::Immediate)
            .unwrap();
        let md = reply.to_markdown(false);
        let answer = md.find("## Answer").unwrap();
        let reasoning = md.find("## Reasoning").unwrap();
        assert!(answer < reasoning);
        assert!(md.contains("Use Y."));
    }

    #[test]
    fn test_blank_table_entry_counts_as_missing() {
        let content = TableContent::from_toml("[quick]\nanswer = \"  \"\nreasoning = \"r\"\n").unwrap();
        assert!(
            Renderer::new(&content)
                .render(&plan(&[Category::QuickQuestion]), Phase::Immediate)
                .is_err()
        );
    }

    #[test]
    fn test_invalid_toml_is_parse_error() {
        let err = TableContent::from_toml("[quick\nanswer =").unwrap_err();
        assert!(matches!(err, ContentError::Parse(_)));
    }

    #[test]
    fn test_load_missing_file() {
        let err = TableContent::load(Path::new("/nonexistent/asktag/content.toml")).unwrap_err();
        assert!(matches!(err, ContentError::Read { .. }));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("content.toml");
        std::fs::write(&path, "[quick]\nanswer = \"a\"\nreasoning = \"b\"\n").unwrap();
        let content = TableContent::load(&path).unwrap();
        let section = template_for(Category::QuickQuestion).sections[0];
        assert_eq!(
            content.section(Category::QuickQuestion, &section),
            Some("a".to_string())
        );
    }

    #[test]
    fn test_merged_markdown_has_category_headings() {
        let reply = Renderer::new(&GuidanceContent)
            .render(
                &plan(&[Category::LearningQuestion, Category::DesignQuestion]),
                Phase::Immediate,
            )
            .unwrap();
        let md = reply.to_markdown(false);
        let learning = md.find("## Learning Question").unwrap();
        let design = md.find("## Design Question").unwrap();
        assert!(learning < design);
        assert!(md.contains("### Concept"));
        assert!(md.contains("### Validation"));
        assert!(!md.contains("### Diagram"));
        assert!(md.contains("Diagram and Implementation Plan"));
    }

    #[test]
    fn test_show_guidance_only_for_real_content() {
        let skeleton = Renderer::new(&GuidanceContent)
            .render(&plan(&[Category::QuickQuestion]), Phase::Immediate)
            .unwrap();
        let guidance = template_for(Category::QuickQuestion).sections[0].guidance;
        assert_eq!(skeleton.to_markdown(true).matches(guidance).count(), 1);

        let content = TableContent::from_toml("[quick]\nanswer = \"a\"\nreasoning = \"b\"\n").unwrap();
        let reply = Renderer::new(&content)
            .render(&plan(&[Category::QuickQuestion]), Phase::Immediate)
            .unwrap();
        assert!(reply.to_markdown(true).contains(&format!("_{}_", guidance)));
        assert!(!reply.to_markdown(false).contains(guidance));
    }

    #[test]
    fn test_json_output() {
        let reply = Renderer::new(&GuidanceContent)
            .render(&plan(&[Category::DesignQuestion]), Phase::Immediate)
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&reply.to_json().unwrap()).unwrap();
        assert_eq!(value["awaiting_confirmation"], true);
        assert_eq!(value["categories"][0], "design_question");
        assert_eq!(value["sections"][0]["slug"], "options");
        assert!(value["sections"][0].get("guidance").is_none());
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!(OutputFormat::from_str("JSON"), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::from_str("md"), Some(OutputFormat::Markdown));
        assert_eq!(OutputFormat::from_str("yaml"), None);
    }
}
