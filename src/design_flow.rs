//! The Design Question flow.
//!
//! A design reply first presents options and a recommendation, then stops
//! and waits. Only an explicit affirmative reply moves it on to the diagram
//! and the implementation. Feedback sends it back for another revision.
//!
//! ```text
//! PresentingOptions ──presented──▶ AwaitingConfirmation ──yes──▶ Diagramming
//!        ▲                               │                         │
//!        └────────── feedback ───────────┘                  diagram rendered
//!                                                                  ▼
//!                               Complete ◀── all generated ── Implementing
//! ```
//!
//! `DesignPhase` is a plain value. Each turn takes the current phase and an
//! event and returns the next phase, so callers carry it between turns
//! explicitly.

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

/// Phrases accepted as explicit confirmation.
const AFFIRMATIVES: &[&str] = &[
    "yes",
    "y",
    "yep",
    "ok",
    "okay",
    "confirm",
    "confirmed",
    "approve",
    "approved",
    "go ahead",
    "proceed",
    "lgtm",
    "sounds good",
    "looks good",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DesignPhase {
    PresentingOptions {
        revision: u32,
    },
    AwaitingConfirmation {
        revision: u32,
    },
    Diagramming {
        revision: u32,
    },
    Implementing {
        components: Vec<String>,
        generated: Vec<String>,
    },
    Complete,
}

/// A user's answer at the confirmation checkpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Affirmative,
    /// Anything else that says something: adjustments, objections, questions.
    Feedback(String),
    /// Blank input. Changes nothing.
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DesignEvent {
    OptionsPresented,
    Reply(Reply),
    DiagramRendered { components: Vec<String> },
    ComponentGenerated(String),
}

impl DesignEvent {
    fn name(&self) -> &'static str {
        match self {
            Self::OptionsPresented => "options_presented",
            Self::Reply(_) => "reply",
            Self::DiagramRendered { .. } => "diagram_rendered",
            Self::ComponentGenerated(_) => "component_generated",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlowError {
    #[error("cannot apply {event} while {state}")]
    InvalidTransition {
        state: &'static str,
        event: &'static str,
    },
    #[error("component `{0}` is not in the implementation plan")]
    UnknownComponent(String),
}

impl Default for DesignPhase {
    fn default() -> Self {
        Self::PresentingOptions { revision: 1 }
    }
}

impl DesignPhase {
    /// Get the display label for this phase.
    pub fn label(&self) -> &'static str {
        match self {
            Self::PresentingOptions { .. } => "presenting options",
            Self::AwaitingConfirmation { .. } => "awaiting confirmation",
            Self::Diagramming { .. } => "diagramming",
            Self::Implementing { .. } => "implementing",
            Self::Complete => "complete",
        }
    }

    pub fn is_awaiting_confirmation(&self) -> bool {
        matches!(self, Self::AwaitingConfirmation { .. })
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete)
    }

    /// Components still to generate while implementing.
    pub fn remaining(&self) -> Vec<&str> {
        match self {
            Self::Implementing {
                components,
                generated,
            } => components
                .iter()
                .filter(|c| !generated.contains(c))
                .map(String::as_str)
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Compute the phase that follows `event`. `self` is left untouched.
    pub fn apply(&self, event: &DesignEvent) -> Result<DesignPhase, FlowError> {
        let next = match (self, event) {
            (Self::PresentingOptions { revision }, DesignEvent::OptionsPresented) => {
                Self::AwaitingConfirmation {
                    revision: *revision,
                }
            }
            (Self::AwaitingConfirmation { revision }, DesignEvent::Reply(reply)) => match reply {
                Reply::Affirmative => {
                    info!(revision, "design_confirmed");
                    Self::Diagramming {
                        revision: *revision,
                    }
                }
                Reply::Feedback(feedback) => {
                    info!(
                        revision,
                        feedback_len = feedback.len(),
                        "design_revision_requested"
                    );
                    Self::PresentingOptions {
                        revision: revision + 1,
                    }
                }
                Reply::Empty => self.clone(),
            },
            (Self::Diagramming { .. }, DesignEvent::DiagramRendered { components }) => {
                let components = dedup_preserving_order(components);
                if components.is_empty() {
                    Self::Complete
                } else {
                    Self::Implementing {
                        components,
                        generated: Vec::new(),
                    }
                }
            }
            (
                Self::Implementing {
                    components,
                    generated,
                },
                DesignEvent::ComponentGenerated(name),
            ) => {
                if !components.contains(name) {
                    return Err(FlowError::UnknownComponent(name.clone()));
                }
                let mut generated = generated.clone();
                if generated.contains(name) {
                    debug!(component = %name, "component_already_generated");
                } else {
                    generated.push(name.clone());
                }
                if generated.len() == components.len() {
                    info!(components = components.len(), "design_implementation_complete");
                    Self::Complete
                } else {
                    Self::Implementing {
                        components: components.clone(),
                        generated,
                    }
                }
            }
            _ => {
                return Err(FlowError::InvalidTransition {
                    state: self.label(),
                    event: event.name(),
                });
            }
        };

        debug!(from = self.label(), to = next.label(), "design_phase_changed");
        Ok(next)
    }
}

/// Classify a reply typed at the confirmation checkpoint.
///
/// Only an exact affirmative phrase (case and trailing `.`/`!` ignored)
/// confirms. `extra` adds configured phrases.
pub fn classify_reply(text: &str, extra: &[String]) -> Reply {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Reply::Empty;
    }

    let normalized = normalize_reply(trimmed);
    let affirmative = AFFIRMATIVES.contains(&normalized.as_str())
        || extra.iter().any(|phrase| normalize_reply(phrase) == normalized);

    if affirmative {
        Reply::Affirmative
    } else {
        Reply::Feedback(trimmed.to_string())
    }
}

/// Lower-cased with surrounding whitespace and trailing `.`/`!` removed.
/// Applied to typed replies and configured phrases alike.
fn normalize_reply(text: &str) -> String {
    text.trim().trim_end_matches(['.', '!']).trim().to_lowercase()
}

/// Read component names out of an implementation plan, one per line.
///
/// List markers (`-`, `*`, `1.`) and blank lines are dropped.
pub fn components_from_plan(plan: &str) -> Vec<String> {
    let names: Vec<String> = plan
        .lines()
        .map(strip_list_marker)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();
    dedup_preserving_order(&names)
}

fn strip_list_marker(line: &str) -> &str {
    let line = line.trim();
    if let Some(rest) = line.strip_prefix("- ").or_else(|| line.strip_prefix("* ")) {
        return rest.trim();
    }
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0
        && let Some(rest) = line[digits..].strip_prefix('.').or_else(|| line[digits..].strip_prefix(')'))
    {
        return rest.trim();
    }
    line
}

fn dedup_preserving_order(items: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(items.len());
    for item in items {
        if !out.contains(item) {
            out.push(item.clone());
        }
    }
    out
}
