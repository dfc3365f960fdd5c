//! Turn handling.
//!
//! Each turn takes the previous [`ConversationState`] and a message and
//! returns an outcome plus the next state. The only thing carried across
//! turns is a design flow waiting on the user.

use thiserror::Error;
use tracing::info;

use crate::design_flow::{DesignEvent, DesignPhase, FlowError, Reply, classify_reply, components_from_plan};
use crate::dispatch::{Phase, ResponsePlan, dispatch};
use crate::parser::parse_message;
use crate::render::{ContentSource, RenderError, RenderedReply, Renderer};

#[derive(Debug, Error)]
pub enum ConversationError {
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Flow(#[from] FlowError),
    #[error("no design is in progress")]
    NoDesignInProgress,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingDesign {
    plan: ResponsePlan,
    phase: DesignPhase,
}

/// State carried from one turn to the next.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationState {
    pending: Option<PendingDesign>,
}

impl ConversationState {
    /// The design flow in progress, if any.
    pub fn phase(&self) -> Option<&DesignPhase> {
        self.pending.as_ref().map(|p| &p.phase)
    }

    pub fn is_awaiting_confirmation(&self) -> bool {
        self.phase().is_some_and(DesignPhase::is_awaiting_confirmation)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// A fresh reply to a new message.
    Reply(RenderedReply),
    /// The design options, revised after feedback.
    Revised { revision: u32, reply: RenderedReply },
    /// The held-back sections, rendered after confirmation, with the
    /// components the implementation plan lists.
    Confirmed {
        reply: RenderedReply,
        components: Vec<String>,
    },
    /// Blank input at the checkpoint.
    StillWaiting,
}

pub struct Conversation<'a, C: ContentSource + ?Sized> {
    renderer: Renderer<'a, C>,
    extra_affirmatives: &'a [String],
}

impl<'a, C: ContentSource + ?Sized> Conversation<'a, C> {
    pub fn new(content: &'a C, extra_affirmatives: &'a [String]) -> Self {
        Self {
            renderer: Renderer::new(content),
            extra_affirmatives,
        }
    }

    /// Handle one message.
    pub fn turn(
        &self,
        state: &ConversationState,
        message: &str,
    ) -> Result<(TurnOutcome, ConversationState), ConversationError> {
        let parsed = parse_message(message);
        info!(
            classification = %parsed.classification,
            content_len = parsed.content.len(),
            "message_classified"
        );

        if let Some(pending) = &state.pending {
            if parsed.classification.is_unclassified() {
                if pending.phase.is_awaiting_confirmation() {
                    return self.answer_checkpoint(state, pending, message);
                }
            } else {
                info!(phase = pending.phase.label(), "design_abandoned_for_new_question");
            }
        }

        let plan = dispatch(&parsed.classification);
        let reply = self.renderer.render(&plan, Phase::Immediate)?;

        let next = if plan.has_checkpoint() {
            let phase = DesignPhase::default().apply(&DesignEvent::OptionsPresented)?;
            ConversationState {
                pending: Some(PendingDesign { plan, phase }),
            }
        } else if plan.is_adaptive() {
            // untagged chatter leaves an implementing design alone
            state.clone()
        } else {
            ConversationState::default()
        };

        Ok((TurnOutcome::Reply(reply), next))
    }

    fn answer_checkpoint(
        &self,
        state: &ConversationState,
        pending: &PendingDesign,
        message: &str,
    ) -> Result<(TurnOutcome, ConversationState), ConversationError> {
        let reply = classify_reply(message, self.extra_affirmatives);
        if reply == Reply::Empty {
            return Ok((TurnOutcome::StillWaiting, state.clone()));
        }

        let phase = pending.phase.apply(&DesignEvent::Reply(reply))?;
        match phase {
            DesignPhase::PresentingOptions { revision } => {
                let rendered = self.renderer.render(&pending.plan, Phase::Immediate)?;
                let phase = phase.apply(&DesignEvent::OptionsPresented)?;
                Ok((
                    TurnOutcome::Revised {
                        revision,
                        reply: rendered,
                    },
                    ConversationState {
                        pending: Some(PendingDesign {
                            plan: pending.plan.clone(),
                            phase,
                        }),
                    },
                ))
            }
            DesignPhase::Diagramming { .. } => {
                let rendered = self.renderer.render(&pending.plan, Phase::AfterConfirmation)?;
                let components = rendered
                    .section("implementation_plan")
                    .map(|s| components_from_plan(&s.body))
                    .unwrap_or_default();
                let phase = phase.apply(&DesignEvent::DiagramRendered {
                    components: components.clone(),
                })?;
                let pending = (!phase.is_complete()).then(|| PendingDesign {
                    plan: pending.plan.clone(),
                    phase,
                });
                Ok((
                    TurnOutcome::Confirmed {
                        reply: rendered,
                        components,
                    },
                    ConversationState { pending },
                ))
            }
            // classify_reply never yields another transition out of the checkpoint
            other => Ok((
                TurnOutcome::StillWaiting,
                ConversationState {
                    pending: Some(PendingDesign {
                        plan: pending.plan.clone(),
                        phase: other,
                    }),
                },
            )),
        }
    }

    /// Mark one component of the implementation plan as generated.
    pub fn component_generated(
        &self,
        state: &ConversationState,
        name: &str,
    ) -> Result<ConversationState, ConversationError> {
        let pending = state
            .pending
            .as_ref()
            .ok_or(ConversationError::NoDesignInProgress)?;
        let phase = pending
            .phase
            .apply(&DesignEvent::ComponentGenerated(name.to_string()))?;

        if phase.is_complete() {
            info!("design_flow_finished");
            return Ok(ConversationState::default());
        }
        Ok(ConversationState {
            pending: Some(PendingDesign {
                plan: pending.plan.clone(),
                phase,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{GuidanceContent, TableContent};

    fn design_content() -> TableContent {
        TableContent::from_toml(
            r#"
[design]
options = "Redis, cookies, database"
comparison_matrix = "| | latency |"
recommendation = "Redis"
validation = "Does Redis fit?"
diagram = "app -> redis"
implementation_plan = "1. session store\n2. middleware"

[learning]
concept = "c"
explanation = "e"
example = "x"
common_pitfalls = "p"
resources = "r"
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_quick_question_leaves_state_empty() {
        let conversation = Conversation::new(&GuidanceContent, &[]);
        let (outcome, state) = conversation
            .turn(&ConversationState::default(), "[Quick Question] X or Y?")
            .unwrap();
        assert!(matches!(outcome, TurnOutcome::Reply(ref r) if !r.awaiting_confirmation));
        assert_eq!(state, ConversationState::default());
    }

    #[test]
    fn test_unclassified_is_adaptive() {
        let conversation = Conversation::new(&GuidanceContent, &[]);
        let (outcome, _) = conversation
            .turn(&ConversationState::default(), "how do I fix this bug")
            .unwrap();
        assert!(matches!(outcome, TurnOutcome::Reply(ref r) if r.adaptive));
    }

    #[test]
    fn test_design_waits_then_confirms() {
        let content = design_content();
        let conversation = Conversation::new(&content, &[]);

        let (outcome, state) = conversation
            .turn(&ConversationState::default(), "[Design Question] sessions?")
            .unwrap();
        match outcome {
            TurnOutcome::Reply(reply) => {
                assert!(reply.awaiting_confirmation);
                assert!(reply.section("diagram").is_none());
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(state.is_awaiting_confirmation());

        let (outcome, state) = conversation.turn(&state, "yes").unwrap();
        match outcome {
            TurnOutcome::Confirmed { reply, components } => {
                assert!(reply.section("diagram").is_some());
                assert_eq!(components, vec!["session store", "middleware"]);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(state.phase().map(DesignPhase::label), Some("implementing"));

        let state = conversation.component_generated(&state, "middleware").unwrap();
        assert_eq!(state.phase().unwrap().remaining(), vec!["session store"]);
        let state = conversation
            .component_generated(&state, "session store")
            .unwrap();
        assert_eq!(state, ConversationState::default());
    }

    #[test]
    fn test_feedback_revises_and_keeps_waiting() {
        let content = design_content();
        let conversation = Conversation::new(&content, &[]);
        let (_, state) = conversation
            .turn(&ConversationState::default(), "[Design Question] sessions?")
            .unwrap();

        let (outcome, state) = conversation.turn(&state, "what about JWTs?").unwrap();
        assert!(matches!(outcome, TurnOutcome::Revised { revision: 2, .. }));
        assert_eq!(
            state.phase(),
            Some(&DesignPhase::AwaitingConfirmation { revision: 2 })
        );

        let (outcome, state) = conversation.turn(&state, "no").unwrap();
        assert!(matches!(outcome, TurnOutcome::Revised { revision: 3, .. }));
        assert!(state.is_awaiting_confirmation());
    }

    #[test]
    fn test_blank_reply_keeps_waiting() {
        let content = design_content();
        let conversation = Conversation::new(&content, &[]);
        let (_, state) = conversation
            .turn(&ConversationState::default(), "[Design Question] sessions?")
            .unwrap();
        let (outcome, next) = conversation.turn(&state, "   ").unwrap();
        assert_eq!(outcome, TurnOutcome::StillWaiting);
        assert_eq!(next, state);
    }

    #[test]
    fn test_extra_affirmative_confirms() {
        let content = design_content();
        let extra = vec!["ship it".to_string()];
        let conversation = Conversation::new(&content, &extra);
        let (_, state) = conversation
            .turn(&ConversationState::default(), "[Design Question] sessions?")
            .unwrap();
        let (outcome, _) = conversation.turn(&state, "Ship it!").unwrap();
        assert!(matches!(outcome, TurnOutcome::Confirmed { .. }));
    }

    #[test]
    fn test_tagged_message_abandons_waiting_design() {
        let conversation = Conversation::new(&GuidanceContent, &[]);
        let (_, state) = conversation
            .turn(&ConversationState::default(), "[Design Question] layout?")
            .unwrap();
        let (outcome, state) = conversation
            .turn(&state, "[Quick Question] tabs or spaces?")
            .unwrap();
        assert!(matches!(outcome, TurnOutcome::Reply(_)));
        assert!(state.phase().is_none());
    }

    fn implementing_state(conversation: &Conversation<'_, TableContent>) -> ConversationState {
        let (_, state) = conversation
            .turn(&ConversationState::default(), "[Design Question] sessions?")
            .unwrap();
        let (_, state) = conversation.turn(&state, "yes").unwrap();
        assert_eq!(state.phase().map(DesignPhase::label), Some("implementing"));
        state
    }

    #[test]
    fn test_tagged_message_abandons_implementing_design() {
        let content = design_content();
        let conversation = Conversation::new(&content, &[]);
        let state = implementing_state(&conversation);

        let mut next = None;
        let logs = crate::logging::capture_logs(|_| {
            next = Some(conversation.turn(&state, "[Learning Question] what is Redis?").unwrap());
        });
        let (outcome, next) = next.unwrap();

        assert!(matches!(outcome, TurnOutcome::Reply(_)));
        assert!(next.phase().is_none());
        assert!(logs.contains("design_abandoned_for_new_question"));
    }

    #[test]
    fn test_new_design_question_replaces_implementing_design() {
        let content = design_content();
        let conversation = Conversation::new(&content, &[]);
        let state = implementing_state(&conversation);

        let mut next = None;
        let logs = crate::logging::capture_logs(|_| {
            next = Some(conversation.turn(&state, "[Design Question] caching?").unwrap());
        });
        let (_, next) = next.unwrap();

        assert!(next.is_awaiting_confirmation());
        assert!(logs.contains("design_abandoned_for_new_question"));
    }

    #[test]
    fn test_untagged_message_keeps_implementing_design() {
        let content = design_content();
        let conversation = Conversation::new(&content, &[]);
        let state = implementing_state(&conversation);

        let (outcome, next) = conversation.turn(&state, "how is it going?").unwrap();
        assert!(matches!(outcome, TurnOutcome::Reply(ref r) if r.adaptive));
        assert_eq!(next, state);
    }

    #[test]
    fn test_merged_learning_design_confirms_only_design_sections() {
        let content = design_content();
        let conversation = Conversation::new(&content, &[]);
        let (outcome, state) = conversation
            .turn(
                &ConversationState::default(),
                "[Learning Question] + [Design Question] explain X and structure Y",
            )
            .unwrap();
        match outcome {
            TurnOutcome::Reply(reply) => {
                assert!(reply.section("concept").is_some());
                assert!(reply.awaiting_confirmation);
            }
            other => panic!("unexpected {other:?}"),
        }

        let (outcome, _) = conversation.turn(&state, "lgtm").unwrap();
        match outcome {
            TurnOutcome::Confirmed { reply, .. } => {
                let slugs: Vec<_> = reply.sections.iter().map(|s| s.slug).collect();
                assert_eq!(slugs, vec!["diagram", "implementation_plan"]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_component_generated_without_design() {
        let conversation = Conversation::new(&GuidanceContent, &[]);
        let err = conversation
            .component_generated(&ConversationState::default(), "api")
            .unwrap_err();
        assert!(matches!(err, ConversationError::NoDesignInProgress));
    }

    #[test]
    fn test_component_generated_while_waiting_is_invalid() {
        let conversation = Conversation::new(&GuidanceContent, &[]);
        let (_, state) = conversation
            .turn(&ConversationState::default(), "[Design Question] layout?")
            .unwrap();
        let err = conversation.component_generated(&state, "api").unwrap_err();
        assert!(matches!(
            err,
            ConversationError::Flow(FlowError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_skeleton_confirmation_reads_guidance_as_plan() {
        // the guidance line for Implementation Plan is a single line, so it becomes one component
        let conversation = Conversation::new(&GuidanceContent, &[]);
        let (_, state) = conversation
            .turn(&ConversationState::default(), "[Design Question] layout?")
            .unwrap();
        let (outcome, state) = conversation.turn(&state, "yes").unwrap();
        match outcome {
            TurnOutcome::Confirmed { components, .. } => assert_eq!(components.len(), 1),
            other => panic!("unexpected {other:?}"),
        }
        assert!(state.phase().is_some());
    }
}
