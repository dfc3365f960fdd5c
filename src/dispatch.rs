//! Response templates and the category → template lookup.

use serde::Serialize;
use tracing::debug;

use crate::category::{Category, Classification};

/// A named section of a response template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Section {
    pub name: &'static str,
    /// Key used by content files, e.g. `comparison_matrix`.
    pub slug: &'static str,
    /// One line describing what the section should contain.
    pub guidance: &'static str,
}

/// An ordered list of sections for one category.
#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct Template {
    pub category: Category,
    pub summary: &'static str,
    pub sections: &'static [Section],
    /// Index of the last section rendered before the reply pauses for
    /// explicit confirmation.
    pub checkpoint: Option<usize>,
    /// Whether a reply in this template may create or edit files.
    pub writes_files: bool,
}

impl Template {
    pub fn id(&self) -> &'static str {
        self.category.template_id()
    }

    /// Sections rendered in the first reply.
    pub fn before_checkpoint(&self) -> &'static [Section] {
        let sections: &'static [Section] = self.sections;
        match self.checkpoint {
            Some(idx) => &sections[..=idx],
            None => sections,
        }
    }

    /// Sections held back until the user confirms. Empty without a checkpoint.
    pub fn after_checkpoint(&self) -> &'static [Section] {
        let sections: &'static [Section] = self.sections;
        match self.checkpoint {
            Some(idx) => &sections[idx + 1..],
            None => &[],
        }
    }

    pub fn section(&self, slug: &str) -> Option<&'static Section> {
        self.sections.iter().find(|s| s.slug == slug)
    }
}

const QUICK_SECTIONS: &[Section] = &[
    Section {
        name: "Answer",
        slug: "answer",
        guidance: "One or two sentences that answer the question directly.",
    },
    Section {
        name: "Reasoning",
        slug: "reasoning",
        guidance: "A short justification. No files, no long examples.",
    },
];

const LEARNING_SECTIONS: &[Section] = &[
    Section {
        name: "Concept",
        slug: "concept",
        guidance: "Name the idea and where it fits.",
    },
    Section {
        name: "Explanation",
        slug: "explanation",
        guidance: "How it works, building from what the user already knows.",
    },
    Section {
        name: "Example",
        slug: "example",
        guidance: "A small example drawn from this project where possible.",
    },
    Section {
        name: "Common Pitfalls",
        slug: "common_pitfalls",
        guidance: "Mistakes people usually make with it.",
    },
    Section {
        name: "Resources",
        slug: "resources",
        guidance: "Links to documentation or articles for further reading.",
    },
];

const DEBUG_SECTIONS: &[Section] = &[
    Section {
        name: "Problem",
        slug: "problem",
        guidance: "Restate the error and where it shows up.",
    },
    Section {
        name: "Root Cause",
        slug: "root_cause",
        guidance: "Why it happens, not just what happens.",
    },
    Section {
        name: "Solution Steps",
        slug: "solution_steps",
        guidance: "Numbered steps to fix it.",
    },
    Section {
        name: "Verify",
        slug: "verify",
        guidance: "A command or check that proves the fix works.",
    },
    Section {
        name: "Prevention",
        slug: "prevention",
        guidance: "How to keep it from coming back.",
    },
];

const DESIGN_SECTIONS: &[Section] = &[
    Section {
        name: "Options",
        slug: "options",
        guidance: "Two to four viable approaches, each in a sentence or two.",
    },
    Section {
        name: "Comparison Matrix",
        slug: "comparison_matrix",
        guidance: "A table comparing the options on the criteria that matter here.",
    },
    Section {
        name: "Recommendation",
        slug: "recommendation",
        guidance: "The recommended option and the deciding factors.",
    },
    Section {
        name: "Validation",
        slug: "validation",
        guidance: "Ask the user to confirm or adjust before anything is built.",
    },
    Section {
        name: "Diagram",
        slug: "diagram",
        guidance: "A diagram of the confirmed structure.",
    },
    Section {
        name: "Implementation Plan",
        slug: "implementation_plan",
        guidance: "The components to generate, one per line, in build order.",
    },
];

static QUICK: Template = Template {
    category: Category::QuickQuestion,
    summary: "Short direct answer",
    sections: QUICK_SECTIONS,
    checkpoint: None,
    writes_files: false,
};

static LEARNING: Template = Template {
    category: Category::LearningQuestion,
    summary: "Educational explanation with resource links",
    sections: LEARNING_SECTIONS,
    checkpoint: None,
    writes_files: false,
};

static DEBUG: Template = Template {
    category: Category::DebugQuestion,
    summary: "Root cause and step-by-step fix",
    sections: DEBUG_SECTIONS,
    checkpoint: None,
    writes_files: true,
};

static DESIGN: Template = Template {
    category: Category::DesignQuestion,
    summary: "Options, recommendation, then diagram and build after confirmation",
    sections: DESIGN_SECTIONS,
    checkpoint: Some(3),
    writes_files: true,
};

/// Look up the template for a category.
pub fn template_for(category: Category) -> &'static Template {
    match category {
        Category::QuickQuestion => &QUICK,
        Category::LearningQuestion => &LEARNING,
        Category::DebugQuestion => &DEBUG,
        Category::DesignQuestion => &DESIGN,
    }
}

/// Whether a planned section belongs to the first reply or waits for
/// confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Immediate,
    AfterConfirmation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlannedSection {
    pub category: Category,
    pub section: &'static Section,
    pub phase: Phase,
}

/// The templates that apply to a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponsePlan {
    /// No recognized tag: no template applies and the reply adapts freely.
    Adaptive,
    /// One template per category, in category order.
    Templated(Vec<&'static Template>),
}

impl ResponsePlan {
    pub fn templates(&self) -> &[&'static Template] {
        match self {
            Self::Adaptive => &[],
            Self::Templated(templates) => templates,
        }
    }

    pub fn is_adaptive(&self) -> bool {
        matches!(self, Self::Adaptive)
    }

    /// True if any template pauses for confirmation.
    pub fn has_checkpoint(&self) -> bool {
        self.templates().iter().any(|t| t.checkpoint.is_some())
    }

    pub fn writes_files(&self) -> bool {
        self.templates().iter().any(|t| t.writes_files)
    }

    /// All sections in render order, each template's order preserved.
    pub fn sections(&self) -> Vec<PlannedSection> {
        let mut planned = Vec::new();
        for template in self.templates() {
            for section in template.before_checkpoint() {
                planned.push(PlannedSection {
                    category: template.category,
                    section,
                    phase: Phase::Immediate,
                });
            }
            for section in template.after_checkpoint() {
                planned.push(PlannedSection {
                    category: template.category,
                    section,
                    phase: Phase::AfterConfirmation,
                });
            }
        }
        planned
    }

    /// Sections of the given phase, in render order.
    pub fn sections_in(&self, phase: Phase) -> Vec<PlannedSection> {
        self.sections()
            .into_iter()
            .filter(|p| p.phase == phase)
            .collect()
    }
}

/// Map a classification to its response plan. Pure lookup.
pub fn dispatch(classification: &Classification) -> ResponsePlan {
    match classification {
        Classification::Unclassified => {
            debug!("template_dispatched_adaptive");
            ResponsePlan::Adaptive
        }
        Classification::Tagged(set) => {
            let templates: Vec<&'static Template> = set.iter().map(template_for).collect();
            debug!(
                templates = ?templates.iter().map(|t| t.id()).collect::<Vec<_>>(),
                "template_dispatched"
            );
            ResponsePlan::Templated(templates)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::CategorySet;

    fn names(sections: &[Section]) -> Vec<&'static str> {
        sections.iter().map(|s| s.name).collect()
    }

    fn tagged(categories: &[Category]) -> Classification {
        Classification::from_set(categories.iter().copied().collect::<CategorySet>())
    }

    #[test]
    fn test_design_section_order() {
        assert_eq!(
            names(template_for(Category::DesignQuestion).sections),
            vec![
                "Options",
                "Comparison Matrix",
                "Recommendation",
                "Validation",
                "Diagram",
                "Implementation Plan",
            ]
        );
    }

    #[test]
    fn test_design_checkpoint_splits_after_validation() {
        let design = template_for(Category::DesignQuestion);
        assert_eq!(
            names(design.before_checkpoint()),
            vec!["Options", "Comparison Matrix", "Recommendation", "Validation"]
        );
        assert_eq!(
            names(design.after_checkpoint()),
            vec!["Diagram", "Implementation Plan"]
        );
    }

    #[test]
    fn test_debug_section_order() {
        assert_eq!(
            names(template_for(Category::DebugQuestion).sections),
            vec!["Problem", "Root Cause", "Solution Steps", "Verify", "Prevention"]
        );
    }

    #[test]
    fn test_quick_is_short_and_writes_no_files() {
        let quick = template_for(Category::QuickQuestion);
        assert!(!quick.writes_files);
        assert!(quick.checkpoint.is_none());
        assert!(quick.sections.len() <= 2);
        assert!(quick.after_checkpoint().is_empty());
    }

    #[test]
    fn test_learning_has_resources() {
        let learning = template_for(Category::LearningQuestion);
        assert!(learning.section("resources").is_some());
    }

    #[test]
    fn test_only_design_has_checkpoint() {
        for category in Category::ALL {
            let template = template_for(category);
            assert_eq!(template.category, category);
            assert_eq!(
                template.checkpoint.is_some(),
                category == Category::DesignQuestion
            );
        }
    }

    #[test]
    fn test_section_slugs_unique_per_template() {
        for category in Category::ALL {
            let template = template_for(category);
            let mut slugs: Vec<_> = template.sections.iter().map(|s| s.slug).collect();
            slugs.sort();
            slugs.dedup();
            assert_eq!(slugs.len(), template.sections.len());
        }
    }

    #[test]
    fn test_dispatch_unclassified_is_adaptive() {
        let plan = dispatch(&Classification::Unclassified);
        assert!(plan.is_adaptive());
        assert!(plan.sections().is_empty());
        assert!(!plan.has_checkpoint());
    }

    #[test]
    fn test_dispatch_single() {
        let plan = dispatch(&tagged(&[Category::DebugQuestion]));
        assert_eq!(plan.templates().len(), 1);
        assert_eq!(plan.templates()[0].id(), "debug");
        assert!(plan.sections_in(Phase::AfterConfirmation).is_empty());
    }

    #[test]
    fn test_dispatch_merged_learning_and_design() {
        let plan = dispatch(&tagged(&[Category::DesignQuestion, Category::LearningQuestion]));
        let ids: Vec<_> = plan.templates().iter().map(|t| t.id()).collect();
        assert_eq!(ids, vec!["learning", "design"]);
        assert!(plan.has_checkpoint());

        let immediate = plan.sections_in(Phase::Immediate);
        assert_eq!(immediate.len(), 5 + 4);
        assert_eq!(immediate[0].section.name, "Concept");
        assert_eq!(immediate.last().map(|p| p.section.name), Some("Validation"));

        let later = plan.sections_in(Phase::AfterConfirmation);
        let later_names: Vec<_> = later.iter().map(|p| p.section.name).collect();
        assert_eq!(later_names, vec!["Diagram", "Implementation Plan"]);
    }
}
