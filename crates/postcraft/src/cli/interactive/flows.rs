//! Menu flows for the interactive workbench.
//!
//! Each flow reads what it needs with dialoguer prompts, calls into the
//! [`Workbench`](postcraft_core::Workbench), and reports on stderr. Model
//! output goes to stdout.

use super::theme::postcraft_theme;
use super::{handle_interrupt, InteractiveState};
use crate::cli::posts::print_posts;
use crate::cli::{spinner, CtrlCGuard};
use console::Style;
use dialoguer::{Confirm, Input, Select};
use postcraft_core::{
    AnalysisRequest, AnalyzeOutcome, ChatRole, Provider, SessionStore, SlotIndex,
};
use std::io::Write;
use std::path::PathBuf;

/// Ask for image paths and load them into the session.
pub fn load_images(state: &mut InteractiveState) -> anyhow::Result<()> {
    let theme = postcraft_theme();
    let warn = Style::new().for_stderr().yellow();
    let err = Style::new().for_stderr().red();
    let green = Style::new().for_stderr().green();

    let Some(raw) = handle_interrupt(
        Input::<String>::with_theme(&theme)
            .with_prompt(format!(
                "Image paths (png, jpg, jpeg; up to {})",
                state.config.upload.max_slots
            ))
            .interact_text(),
    )?
    else {
        return Ok(());
    };

    let paths = parse_paths(&raw);
    if paths.is_empty() {
        return Ok(());
    }

    let outcome = state.bench.load_images(&mut state.session, &paths);
    if outcome.truncated > 0 {
        let max = state.config.upload.max_slots;
        eprintln!(
            "  {}",
            warn.apply_to(format!(
                "You can only upload up to {max} images. Only the first {max} will be used."
            ))
        );
    }
    for rejected in &outcome.rejected {
        eprintln!("  {} {rejected}", err.apply_to("✗"));
    }
    for image in &outcome.slots {
        eprintln!(
            "  {} Image {}: {}",
            green.apply_to("✓"),
            image.index,
            image.filename
        );
    }
    eprintln!();
    Ok(())
}

/// Analyze one slot's image with the active vision model.
pub async fn analyze(state: &mut InteractiveState) -> anyhow::Result<()> {
    let theme = postcraft_theme();
    let warn = Style::new().for_stderr().yellow();
    let err = Style::new().for_stderr().red();

    let Some(slot) = pick_slot(&state.session, "Image to analyze")? else {
        return Ok(());
    };

    let needs_vision = state
        .active
        .as_ref()
        .map_or(true, |active| !active.provider.accepts_images());
    if needs_vision && !state.choose_model(true)? {
        return Ok(());
    }
    let Some(active) = state.active.as_ref() else {
        return Ok(());
    };

    let Some(prompt) = handle_interrupt(
        Input::<String>::with_theme(&theme)
            .with_prompt("Prompt")
            .with_initial_text(state.session.prompt(slot))
            .allow_empty(true)
            .interact_text(),
    )?
    else {
        return Ok(());
    };

    let request = AnalysisRequest {
        slot_index: slot,
        prompt,
        provider: active.provider,
        model_name: active.options.model.clone(),
        temperature: active.options.temperature,
        top_p: active.options.top_p,
        max_tokens: active.options.max_tokens,
    };

    let guard = CtrlCGuard::new();
    let pb = spinner(format!(
        "Analyzing image {slot} with {}",
        active.provider.label()
    ));
    let outcome = state
        .bench
        .analyze(&mut state.session, &request, guard.token())
        .await;
    pb.finish_and_clear();

    match outcome {
        Ok(AnalyzeOutcome::Stored(text)) => print_block(&format!("Analysis {slot}"), &text),
        Ok(AnalyzeOutcome::MissingPrompt) => {
            eprintln!("  {}", warn.apply_to("Please enter a prompt for the image."));
        }
        Ok(AnalyzeOutcome::EmptySlot) => {
            eprintln!("  {}", warn.apply_to("No image loaded in this slot."));
        }
        Ok(AnalyzeOutcome::NoResult) => {
            eprintln!(
                "  {} No analysis returned; see the log for details",
                err.apply_to("✗")
            );
        }
        Err(e) => eprintln!("  {} {e}", err.apply_to("✗")),
    }
    eprintln!();
    Ok(())
}

/// Edit the caption and hashtags layered over a slot's analysis.
pub fn edit_caption(state: &mut InteractiveState) -> anyhow::Result<()> {
    let theme = postcraft_theme();
    let dim = Style::new().for_stderr().dim();

    let Some(slot) = pick_slot(&state.session, "Image to caption")? else {
        return Ok(());
    };

    let Some(caption) = handle_interrupt(
        Input::<String>::with_theme(&theme)
            .with_prompt("Caption")
            .with_initial_text(state.session.caption(slot))
            .allow_empty(true)
            .interact_text(),
    )?
    else {
        return Ok(());
    };
    let Some(hashtags) = handle_interrupt(
        Input::<String>::with_theme(&theme)
            .with_prompt("Hashtags")
            .with_initial_text(state.session.hashtags(slot))
            .allow_empty(true)
            .interact_text(),
    )?
    else {
        return Ok(());
    };

    let tags = state.bench.composer().hashtag_list(&hashtags);
    state.session.set_caption(slot, caption.trim());
    state.session.set_hashtags(slot, hashtags.trim());
    if !tags.is_empty() {
        eprintln!("  {}", dim.apply_to(format!("Tags: {}", tags.join(" "))));
    }
    eprintln!();
    Ok(())
}

/// Compose a final post for a slot with the active model.
pub async fn compose(state: &mut InteractiveState) -> anyhow::Result<()> {
    let warn = Style::new().for_stderr().yellow();
    let err = Style::new().for_stderr().red();

    let Some(slot) = pick_slot(&state.session, "Image to compose for")? else {
        return Ok(());
    };
    if state.session.analysis(slot).is_none() {
        eprintln!("  {}", warn.apply_to("Analyze this image before composing."));
        eprintln!();
        return Ok(());
    }

    if state.active.is_none() && !state.choose_model(false)? {
        return Ok(());
    }
    let Some(active) = state.active.as_ref() else {
        return Ok(());
    };

    let guard = CtrlCGuard::new();
    let options = active.options.clone().with_cancel(guard.token());
    let pb = spinner(format!("Composing post with {}", active.provider.label()));
    let composed = state
        .bench
        .compose(&mut state.session, slot, active.provider, &options)
        .await;
    pb.finish_and_clear();

    match composed {
        Ok(Some(post)) => print_block(&format!("Post {slot}"), &post),
        Ok(None) => eprintln!(
            "  {} Could not compose a post; see the log for details",
            err.apply_to("✗")
        ),
        Err(e) => eprintln!("  {} {e}", err.apply_to("✗")),
    }
    eprintln!();
    Ok(())
}

/// Append a slot's post to the CSV table.
///
/// The composed post is saved when there is one, otherwise the analysis.
pub fn save(state: &mut InteractiveState) -> anyhow::Result<()> {
    let warn = Style::new().for_stderr().yellow();
    let green = Style::new().for_stderr().green();

    let Some(slot) = pick_slot(&state.session, "Image to save")? else {
        return Ok(());
    };
    let Some(description) = description_for(&state.session, slot) else {
        eprintln!("  {}", warn.apply_to("Nothing to save yet: analyze this image first."));
        eprintln!();
        return Ok(());
    };

    if state.bench.record(&state.session, slot, &description)? {
        eprintln!(
            "  {} Saved to {}",
            green.apply_to("✓"),
            state.bench.recorder().path().display()
        );
    }
    eprintln!();
    Ok(())
}

/// Chat with Groq until an empty message.
///
/// A message starting with `/system ` is sent with the system role.
pub async fn chat(state: &mut InteractiveState) -> anyhow::Result<()> {
    let theme = postcraft_theme();
    let dim = Style::new().for_stderr().dim();
    let err = Style::new().for_stderr().red();

    if let Err(e) = state.bench.dispatcher().require(Provider::Groq) {
        eprintln!("  {} {e}", err.apply_to("✗"));
        eprintln!(
            "  {}",
            dim.apply_to("Choose Groq under \"Choose provider / model\" to enter a key.")
        );
        eprintln!();
        return Ok(());
    }

    let base = match state.active.as_ref() {
        Some(active) if active.provider == Provider::Groq => active.options.clone(),
        _ => state.bench.dispatcher().options_for(Provider::Groq),
    };
    eprintln!(
        "  {}",
        dim.apply_to(format!(
            "Chatting with {} (empty message to return, /system to set context)",
            base.model
        ))
    );

    loop {
        let Some(line) = handle_interrupt(
            Input::<String>::with_theme(&theme)
                .with_prompt("You")
                .allow_empty(true)
                .interact_text(),
        )?
        else {
            break;
        };
        let Some((role, message)) = parse_chat_line(&line) else {
            break;
        };

        let guard = CtrlCGuard::new();
        let options = base.clone().with_cancel(guard.token());
        let reply = state
            .bench
            .chat(
                &mut state.session,
                &message,
                role,
                &options,
                &mut |delta: &str| {
                    let mut stdout = std::io::stdout().lock();
                    let _ = stdout.write_all(delta.as_bytes());
                    let _ = stdout.flush();
                },
            )
            .await?;
        println!();

        if reply.is_none() {
            eprintln!("  {} No reply; see the log for details", err.apply_to("✗"));
        }
    }
    eprintln!();
    Ok(())
}

/// Show the rows already in the CSV table.
pub fn view_posts(state: &InteractiveState) -> anyhow::Result<()> {
    let recorder = state.bench.recorder();
    let posts = recorder.read_all()?;
    if posts.is_empty() {
        let dim = Style::new().for_stderr().dim();
        eprintln!(
            "  {}",
            dim.apply_to(format!("No saved posts in {}", recorder.path().display()))
        );
        eprintln!();
        return Ok(());
    }
    print_posts(&posts);
    Ok(())
}

/// Drop every image, analysis and chat turn after confirmation.
pub fn clear_all(state: &mut InteractiveState) -> anyhow::Result<()> {
    let theme = postcraft_theme();
    let confirmed = Confirm::with_theme(&theme)
        .with_prompt("Clear all images, analyses and chat history?")
        .default(false)
        .interact_opt()?;
    if confirmed == Some(true) {
        state.bench.clear_all(&mut state.session);
        eprintln!("  Session cleared.");
        eprintln!();
    }
    Ok(())
}

/// Let the user pick a loaded slot. `None` when there are no images or the
/// user backs out.
fn pick_slot(session: &SessionStore, prompt: &str) -> anyhow::Result<Option<SlotIndex>> {
    let slots: Vec<SlotIndex> = session.images().map(|image| image.index).collect();
    if slots.is_empty() {
        let warn = Style::new().for_stderr().yellow();
        eprintln!("  {}", warn.apply_to("Load images first."));
        eprintln!();
        return Ok(None);
    }

    let labels: Vec<String> = slots.iter().map(|slot| slot_label(session, *slot)).collect();
    let choice = Select::with_theme(&postcraft_theme())
        .with_prompt(prompt)
        .items(&labels)
        .default(0)
        .interact_opt()?;
    Ok(choice.map(|i| slots[i]))
}

/// Menu label for a slot with its progress.
fn slot_label(session: &SessionStore, slot: SlotIndex) -> String {
    let filename = session
        .image(slot)
        .map(|image| image.filename.as_str())
        .unwrap_or("(empty)");
    let status = if session.composed(slot).is_some() {
        " (composed)"
    } else if session.analysis(slot).is_some() {
        " (analyzed)"
    } else {
        ""
    };
    format!("Image {slot}: {filename}{status}")
}

/// Text to record for a slot: the composed post, else the analysis.
fn description_for(session: &SessionStore, slot: SlotIndex) -> Option<String> {
    session
        .composed(slot)
        .map(str::to_string)
        .or_else(|| session.analysis(slot).map(|a| a.text.clone()))
}

/// Split whitespace separated paths and expand `~`.
fn parse_paths(raw: &str) -> Vec<PathBuf> {
    raw.split_whitespace()
        .map(|p| PathBuf::from(shellexpand::tilde(p).into_owned()))
        .collect()
}

/// Role and text of a chat line, or `None` for an empty line.
fn parse_chat_line(line: &str) -> Option<(ChatRole, String)> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match line.strip_prefix("/system") {
        Some(rest) if rest.is_empty() || rest.starts_with(' ') => {
            let rest = rest.trim();
            (!rest.is_empty()).then(|| (ChatRole::System, rest.to_string()))
        }
        _ => Some((ChatRole::User, line.to_string())),
    }
}

fn print_block(title: &str, body: &str) {
    let heading = Style::new().bold().magenta();
    println!();
    println!("{}", heading.apply_to(format!("── {title} ──")));
    println!("{body}");
}
