//! Question categories and the tag literals that select them.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

/// A question category, selected by a bracketed tag at the start of a message.
///
/// Variants are ordered Quick < Learning < Debug < Design. Merged templates
/// are laid out in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    QuickQuestion,
    LearningQuestion,
    DebugQuestion,
    DesignQuestion,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::QuickQuestion,
        Category::LearningQuestion,
        Category::DebugQuestion,
        Category::DesignQuestion,
    ];

    /// The exact bracketed literal a user types. Matching is case sensitive.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::QuickQuestion => "[Quick Question]",
            Self::LearningQuestion => "[Learning Question]",
            Self::DebugQuestion => "[Debug Question]",
            Self::DesignQuestion => "[Design Question]",
        }
    }

    /// Get the display label for this category.
    pub fn label(&self) -> &'static str {
        match self {
            Self::QuickQuestion => "Quick Question",
            Self::LearningQuestion => "Learning Question",
            Self::DebugQuestion => "Debug Question",
            Self::DesignQuestion => "Design Question",
        }
    }

    /// Identifier of the response template this category selects.
    pub fn template_id(&self) -> &'static str {
        match self {
            Self::QuickQuestion => "quick",
            Self::LearningQuestion => "learning",
            Self::DebugQuestion => "debug",
            Self::DesignQuestion => "design",
        }
    }

    /// Parse a short name as typed on the command line (`quick`, `design`, ...).
    /// Accepts the template id or the label, ignoring case.
    pub fn from_name(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::ALL.into_iter().find(|c| {
            c.template_id().eq_ignore_ascii_case(s) || c.label().eq_ignore_ascii_case(s)
        })
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// An ordered, duplicate-free set of categories.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CategorySet(BTreeSet<Category>);

impl CategorySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a category. Returns false if it was already present.
    pub fn insert(&mut self, category: Category) -> bool {
        self.0.insert(category)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates in category order.
    pub fn iter(&self) -> impl Iterator<Item = Category> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<Category> for CategorySet {
    fn from_iter<I: IntoIterator<Item = Category>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Result of reading the tag prefix of a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "categories", rename_all = "snake_case")]
pub enum Classification {
    /// No recognized tag. The reply adapts to the message.
    Unclassified,
    /// One or more tags. Never empty.
    Tagged(CategorySet),
}

impl Classification {
    /// Builds a classification, mapping an empty set to `Unclassified`.
    pub fn from_set(set: CategorySet) -> Self {
        if set.is_empty() {
            Self::Unclassified
        } else {
            Self::Tagged(set)
        }
    }

    pub fn is_unclassified(&self) -> bool {
        matches!(self, Self::Unclassified)
    }

    /// Categories in order; empty when unclassified.
    pub fn categories(&self) -> Vec<Category> {
        match self {
            Self::Unclassified => Vec::new(),
            Self::Tagged(set) => set.iter().collect(),
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unclassified => f.write_str("unclassified"),
            Self::Tagged(set) => {
                let labels: Vec<&str> = set.iter().map(|c| c.label()).collect();
                f.write_str(&labels.join(" + "))
            }
        }
    }
}
