//! Classify tagged questions and lay out replies in the matching template.
//!
//! # Examples
//!
//! ```sh
//! # Which categories does a message carry?
//! asktag classify "[Learning Question] + [Design Question] explain X and help me structure Y"
//!
//! # Reply skeleton for a debug question
//! asktag render "[Debug Question] ModuleNotFoundError"
//!
//! # Fill sections from a content file, as JSON
//! asktag render "[Design Question] sessions" --content reply.toml --format json
//!
//! # Turn-by-turn session with the design confirmation checkpoint
//! asktag chat --content reply.toml
//!
//! # Write the tagging guide into the current project
//! asktag init
//! ```

mod category;
mod config;
mod conversation;
mod design_flow;
mod dispatch;
mod logging;
mod parser;
mod render;
mod templates;
mod validators;

use std::io::{self, BufRead, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::{debug, info, warn};
use unicode_width::UnicodeWidthStr;

use crate::category::{Category, Classification};
use crate::config::{Config, ConfigLoadStatus, LoadedConfig};
use crate::conversation::{Conversation, ConversationState, TurnOutcome};
use crate::dispatch::{Phase, dispatch, template_for};
use crate::parser::parse_message;
use crate::render::{ContentSource, GuidanceContent, OutputFormat, RenderedReply, Renderer, TableContent};
use crate::validators::{validate_file_exists, validate_output_path};

#[derive(Parser)]
#[command(name = "asktag", version, about = "Question tags and reply templates")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the categories a message is tagged with
    Classify {
        /// Message to classify; read from stdin when omitted
        message: Option<String>,

        /// Read the message from stdin
        #[arg(long)]
        stdin: bool,

        /// Output format
        #[arg(long, value_enum, default_value_t = ClassifyFormat::Text)]
        format: ClassifyFormat,
    },

    /// Print the sections of a category's template
    Template {
        /// quick, learning, debug or design
        category: String,
    },

    /// Lay out a reply for a message in its template
    Render {
        /// Message to answer; read from stdin when omitted
        message: Option<String>,

        /// Read the message from stdin
        #[arg(long)]
        stdin: bool,

        /// TOML file with section bodies, keyed by template then section
        #[arg(long)]
        content: Option<PathBuf>,

        /// Output format (defaults to output.format from config)
        #[arg(long, value_enum)]
        format: Option<OutputFormat>,

        /// Render the sections held back for confirmation as well
        #[arg(long)]
        confirmed: bool,
    },

    /// Answer messages turn by turn from stdin
    Chat {
        /// TOML file with section bodies, keyed by template then section
        #[arg(long)]
        content: Option<PathBuf>,
    },

    /// Print the tagging guide
    Guide {
        /// Only this category (quick, learning, debug, design)
        #[arg(long)]
        category: Option<String>,
    },

    /// Write the tagging guide into a project
    Init {
        /// Where to write the guide
        #[arg(long, default_value = templates::GUIDE_FILE_NAME)]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ClassifyFormat {
    Text,
    Json,
}

#[derive(Serialize)]
struct ClassifyReport<'a> {
    classification: &'a Classification,
    templates: Vec<&'static str>,
    writes_files: bool,
    content: &'a str,
}

fn main() -> Result<()> {
    let start_time = Instant::now();
    let cli = Cli::parse();

    // Logging first so config warnings reach the log file
    let logging_context = match logging::init() {
        Ok(ctx) => Some(ctx),
        Err(e) => {
            eprintln!("Warning: Failed to initialize logging: {}", e);
            None
        }
    };

    let loaded_config = config::load_config();
    if let Some(ctx) = &logging_context {
        logging::apply_configured_level(ctx, &loaded_config.config.logging.level);
    }
    log_config_status(&loaded_config);

    if let Some(ctx) = &logging_context {
        logging::cleanup_old_logs(&ctx.log_directory);
    }

    let result = run(cli.command, &loaded_config);

    if let Err(e) = &result {
        warn!(error = %e, "command_failed");
    }

    if let Some(ctx) = &logging_context {
        info!(
            session_id = %ctx.session_id,
            duration_secs = start_time.elapsed().as_secs_f64(),
            "session_end"
        );
    }

    result
}

fn log_config_status(loaded: &LoadedConfig) {
    match &loaded.status {
        ConfigLoadStatus::Error(error) => warn!(
            config_path = %loaded.config_path.display(),
            error = %error,
            "config_defaults_used"
        ),
        status => debug!(
            config_path = %loaded.config_path.display(),
            project_config = ?loaded.project_config_path,
            status = ?status,
            "config_loaded"
        ),
    }
}

fn run(command: Command, loaded: &LoadedConfig) -> Result<()> {
    let config = &loaded.config;
    match command {
        Command::Classify {
            message,
            stdin,
            format,
        } => classify(&read_message(message, stdin)?, format),
        Command::Template { category } => print_template(parse_category(&category)?),
        Command::Render {
            message,
            stdin,
            content,
            format,
            confirmed,
        } => {
            let message = read_message(message, stdin)?;
            let content = load_content(content.as_deref())?;
            let format = format.unwrap_or_else(|| config.output_format());
            render_message(&message, &*content, format, confirmed, config)
        }
        Command::Chat { content } => {
            let content = load_content(content.as_deref())?;
            let stdin = io::stdin();
            chat(stdin.lock(), io::stdout(), &*content, config)
        }
        Command::Guide { category } => {
            let only = category.as_deref().map(parse_category).transpose()?;
            print!("{}", templates::render_guide(only));
            Ok(())
        }
        Command::Init { path, force } => init_guide(&path, force),
    }
}

fn parse_category(name: &str) -> Result<Category> {
    Category::from_name(name).ok_or_else(|| {
        anyhow!(
            "unknown category `{}` (expected quick, learning, debug or design)",
            name
        )
    })
}

/// Take the message from the argument, or from stdin when asked or when no
/// argument was given.
fn read_message(message: Option<String>, stdin: bool) -> Result<String> {
    match message {
        Some(message) if !stdin => Ok(message),
        _ => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read message from stdin")?;
            Ok(buf)
        }
    }
}

fn load_content(path: Option<&Path>) -> Result<Box<dyn ContentSource>> {
    let Some(path) = path else {
        return Ok(Box::new(GuidanceContent));
    };

    let path = Config::expand_tilde(&path.to_string_lossy());
    if let Some(err) = validate_file_exists(&path) {
        bail!("{}: {}", path.display(), err);
    }
    let content = TableContent::load(&path)?;
    Ok(Box::new(content))
}

fn classify(message: &str, format: ClassifyFormat) -> Result<()> {
    let parsed = parse_message(message);
    let plan = dispatch(&parsed.classification);
    let templates: Vec<&'static str> = parsed
        .classification
        .categories()
        .iter()
        .map(|c| c.template_id())
        .collect();

    match format {
        ClassifyFormat::Json => {
            let report = ClassifyReport {
                classification: &parsed.classification,
                templates,
                writes_files: plan.writes_files(),
                content: &parsed.content,
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        ClassifyFormat::Text => {
            println!("categories: {}", parsed.classification);
            if templates.is_empty() {
                println!("templates:  (none, reply adapts to the question)");
            } else {
                println!("templates:  {}", templates.join(", "));
                println!("files:      {}", if plan.writes_files() { "may edit files" } else { "none" });
            }
            println!("content:    {}", parsed.content);
        }
    }
    Ok(())
}

fn print_template(category: Category) -> Result<()> {
    let template = template_for(category);
    println!("{}  {}", category.label(), category.tag());
    println!("{}", template.summary);
    println!();

    let name_width = template
        .sections
        .iter()
        .map(|s| UnicodeWidthStr::width(s.name))
        .max()
        .unwrap_or(0);

    for (i, section) in template.sections.iter().enumerate() {
        let pad = name_width - UnicodeWidthStr::width(section.name);
        println!(
            "  {}. {}{}  {}",
            i + 1,
            section.name,
            " ".repeat(pad),
            section.guidance
        );
        if template.checkpoint == Some(i) {
            println!("     -- waits for confirmation --");
        }
    }

    if !template.writes_files {
        println!();
        println!("No files are created or edited.");
    }
    Ok(())
}

fn render_message(
    message: &str,
    content: &dyn ContentSource,
    format: OutputFormat,
    confirmed: bool,
    config: &Config,
) -> Result<()> {
    let parsed = parse_message(message);
    info!(classification = %parsed.classification, "message_classified");

    let plan = dispatch(&parsed.classification);
    debug!(format = format.label(), confirmed, "render_requested");
    let renderer = Renderer::new(content);
    let mut reply = renderer.render(&plan, Phase::Immediate)?;

    if confirmed && reply.awaiting_confirmation {
        let rest = renderer.render(&plan, Phase::AfterConfirmation)?;
        reply.sections.extend(rest.sections);
        reply.awaiting_confirmation = false;
        reply.pending_sections.clear();
    }

    println!(
        "{}",
        reply.format(format, config.output.show_guidance)?.trim_end()
    );
    Ok(())
}

fn print_reply<W: Write>(out: &mut W, reply: &RenderedReply, config: &Config) -> Result<()> {
    let text = reply.format(config.output_format(), config.output.show_guidance)?;
    writeln!(out, "{}", text.trim_end())?;
    Ok(())
}

/// Line-oriented session. Lines starting with `/` are commands; everything
/// else is a message.
fn chat<R: BufRead, W: Write>(
    input: R,
    mut out: W,
    content: &dyn ContentSource,
    config: &Config,
) -> Result<()> {
    let conversation = Conversation::new(content, &config.design.extra_affirmatives);
    let mut state = ConversationState::default();

    writeln!(out, "Tag your question, e.g. [Quick Question] ... (/help for commands)")?;

    for line in input.lines() {
        let line = line.context("failed to read input")?;
        let trimmed = line.trim();

        if let Some(command) = trimmed.strip_prefix('/') {
            let (name, arg) = command.split_once(' ').unwrap_or((command, ""));
            match name {
                "quit" | "exit" => break,
                "help" => {
                    writeln!(out, "/status          show the design flow state")?;
                    writeln!(out, "/done <name>     mark an implementation component as generated")?;
                    writeln!(out, "/reset           drop the design flow in progress")?;
                    writeln!(out, "/quit            leave")?;
                }
                "status" => match state.phase() {
                    Some(phase) => {
                        writeln!(out, "design: {}", phase.label())?;
                        let remaining = phase.remaining();
                        if !remaining.is_empty() {
                            writeln!(out, "remaining: {}", remaining.join(", "))?;
                        }
                    }
                    None => writeln!(out, "no design in progress")?,
                },
                "done" => match conversation.component_generated(&state, arg.trim()) {
                    Ok(next) => {
                        state = next;
                        match state.phase() {
                            Some(phase) => {
                                writeln!(out, "remaining: {}", phase.remaining().join(", "))?
                            }
                            None => writeln!(out, "implementation complete")?,
                        }
                    }
                    Err(e) => writeln!(out, "error: {}", e)?,
                },
                "reset" => {
                    state = ConversationState::default();
                    writeln!(out, "design flow cleared")?;
                }
                other => writeln!(out, "unknown command /{} (try /help)", other)?,
            }
            continue;
        }

        if trimmed.is_empty() && !state.is_awaiting_confirmation() {
            continue;
        }

        let (outcome, next) = match conversation.turn(&state, &line) {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, "turn_failed");
                writeln!(out, "error: {}", e)?;
                continue;
            }
        };
        state = next;

        match outcome {
            TurnOutcome::Reply(reply) => print_reply(&mut out, &reply, config)?,
            TurnOutcome::Revised { revision, reply } => {
                writeln!(out, "(revision {})", revision)?;
                print_reply(&mut out, &reply, config)?;
            }
            TurnOutcome::Confirmed { reply, components } => {
                print_reply(&mut out, &reply, config)?;
                if !components.is_empty() {
                    writeln!(
                        out,
                        "components to generate: {} (mark each with /done <name>)",
                        components.join(", ")
                    )?;
                }
            }
            TurnOutcome::StillWaiting => {
                writeln!(out, "Waiting for confirmation: reply `yes` to continue or say what to change.")?;
            }
        }
        out.flush()?;
    }

    Ok(())
}

fn init_guide(path: &Path, force: bool) -> Result<()> {
    let path = Config::expand_tilde(&path.to_string_lossy());
    if let Some(err) = validate_output_path(&path, force) {
        bail!("{}: {}", path.display(), err);
    }

    std::fs::write(&path, templates::render_guide(None))
        .with_context(|| format!("failed to write {}", path.display()))?;
    info!(path = ?path, "guide_written");
    println!("Wrote {}", path.display());
    Ok(())
}
