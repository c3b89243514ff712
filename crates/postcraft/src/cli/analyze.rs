//! The `postcraft analyze` command.

use super::types::ProviderArg;
use super::{spinner, CtrlCGuard};
use clap::Args;
use console::Style;
use postcraft_core::{
    AnalysisRequest, AnalyzeOutcome, Config, Provider, SessionStore, SlotIndex, Workbench,
};
use std::path::PathBuf;

/// Arguments for the `analyze` command.
#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Image files (png, jpg, jpeg); only the first three are used
    #[arg(required = true)]
    pub images: Vec<PathBuf>,

    /// Prompt for each image, in order. A single prompt applies to every image.
    #[arg(short, long = "prompt", required = true)]
    pub prompts: Vec<String>,

    /// Vision provider
    #[arg(long, value_enum, default_value_t = ProviderArg::Gemini)]
    pub provider: ProviderArg,

    /// Model name (defaults to the provider's configured default)
    #[arg(long)]
    pub model: Option<String>,

    /// Sampling temperature (Gemini only)
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Nucleus sampling (Gemini only)
    #[arg(long)]
    pub top_p: Option<f32>,

    /// Maximum output tokens
    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// Caption to layer over the analysis
    #[arg(long)]
    pub caption: Option<String>,

    /// Hashtags to layer over the analysis (space or comma separated)
    #[arg(long)]
    pub hashtags: Option<String>,

    /// Compose a final post from each analysis
    #[arg(long)]
    pub compose: bool,

    /// Provider used for composition (defaults to --provider)
    #[arg(long, value_enum)]
    pub compose_provider: Option<ProviderArg>,

    /// Append each post to the CSV table
    #[arg(long)]
    pub save: bool,
}

/// Execute the analyze command.
pub async fn execute(args: AnalyzeArgs, config: &Config) -> anyhow::Result<()> {
    let provider = Provider::from(args.provider);
    if !provider.accepts_images() {
        anyhow::bail!(
            "{} is text only. Use gemini, openai or claude for analysis \
             (Groq can still compose via --compose-provider groq).",
            provider.label()
        );
    }

    let bench = Workbench::from_config(config);
    bench.dispatcher().require(provider)?;

    let warn = Style::new().for_stderr().yellow();
    let err = Style::new().for_stderr().red();
    let heading = Style::new().bold().cyan();

    let mut session = SessionStore::new();
    let outcome = bench.load_images(&mut session, &args.images);
    if outcome.truncated > 0 {
        eprintln!(
            "  {}",
            warn.apply_to(format!(
                "You can only upload up to {} images. Only the first {} will be used.",
                config.upload.max_slots, config.upload.max_slots
            ))
        );
    }
    for rejected in &outcome.rejected {
        eprintln!("  {} {rejected}", err.apply_to("✗"));
    }
    if outcome.slots.is_empty() {
        anyhow::bail!("No usable images");
    }

    let settings = bench.dispatcher().settings(provider);
    let model = args
        .model
        .clone()
        .unwrap_or_else(|| settings.default_model.clone());
    let max_tokens = args.max_tokens.unwrap_or(settings.max_tokens);

    let compose_provider = args.compose_provider.map(Provider::from).unwrap_or(provider);
    if args.compose {
        bench.dispatcher().require(compose_provider)?;
    }

    let slots: Vec<SlotIndex> = session.images().map(|image| image.index).collect();
    for (position, slot) in slots.into_iter().enumerate() {
        let prompt = args
            .prompts
            .get(position)
            .or(args.prompts.last())
            .cloned()
            .unwrap_or_default();
        if let Some(caption) = &args.caption {
            session.set_caption(slot, caption.clone());
        }
        if let Some(hashtags) = &args.hashtags {
            session.set_hashtags(slot, hashtags.clone());
        }
        let filename = session
            .image(slot)
            .map(|image| image.filename.clone())
            .unwrap_or_default();

        let request = AnalysisRequest {
            slot_index: slot,
            prompt,
            provider,
            model_name: model.clone(),
            temperature: args.temperature,
            top_p: args.top_p,
            max_tokens,
        };

        let guard = CtrlCGuard::new();
        let pb = spinner(format!("Analyzing {filename} with {}", provider.label()));
        let analyzed = bench.analyze(&mut session, &request, guard.token()).await;
        pb.finish_and_clear();

        let analysis = match analyzed? {
            AnalyzeOutcome::Stored(text) => text,
            AnalyzeOutcome::MissingPrompt => {
                eprintln!("  {}", warn.apply_to("Please enter a prompt for the image."));
                continue;
            }
            AnalyzeOutcome::EmptySlot => continue,
            AnalyzeOutcome::NoResult => {
                eprintln!(
                    "  {} No analysis for {filename}; see the log for details",
                    err.apply_to("✗")
                );
                continue;
            }
        };

        println!("{}", heading.apply_to(format!("── Image {slot}: {filename} ──")));
        println!("{analysis}");
        println!();

        let mut description = analysis;
        if args.compose {
            let options = bench.dispatcher().options_for(compose_provider);
            let pb = spinner(format!("Composing post with {}", compose_provider.label()));
            let composed = bench
                .compose(&mut session, slot, compose_provider, &options.with_cancel(guard.token()))
                .await?;
            pb.finish_and_clear();

            match composed {
                Some(post) => {
                    println!("{}", heading.apply_to(format!("── Post {slot} ──")));
                    println!("{post}");
                    println!();
                    description = post;
                }
                None => eprintln!("  {} Could not compose a post for {filename}", err.apply_to("✗")),
            }
        }

        if args.save && bench.record(&session, slot, &description)? {
            eprintln!(
                "  {}",
                Style::new()
                    .for_stderr()
                    .green()
                    .apply_to(format!("✓ Saved to {}", bench.recorder().path().display()))
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: AnalyzeArgs,
    }

    #[test]
    fn test_parses_repeated_prompts() {
        let cli = TestCli::parse_from([
            "test", "a.jpg", "b.png", "-p", "first", "-p", "second", "--provider", "claude",
        ]);
        assert_eq!(cli.args.images.len(), 2);
        assert_eq!(cli.args.prompts, vec!["first", "second"]);
        assert!(matches!(cli.args.provider, ProviderArg::Claude));
        assert!(!cli.args.compose);
    }

    #[test]
    fn test_compose_flags() {
        let cli = TestCli::parse_from([
            "test",
            "a.jpg",
            "-p",
            "Describe",
            "--compose",
            "--compose-provider",
            "groq",
            "--hashtags",
            "sea,sun",
            "--save",
        ]);
        assert!(cli.args.compose);
        assert!(cli.args.save);
        assert!(matches!(cli.args.compose_provider, Some(ProviderArg::Groq)));
        assert_eq!(cli.args.hashtags.as_deref(), Some("sea,sun"));
    }

    #[tokio::test]
    async fn test_groq_is_rejected_for_analysis() {
        let cli = TestCli::parse_from(["test", "a.jpg", "-p", "Describe", "--provider", "groq"]);
        let err = execute(cli.args, &Config::default()).await.unwrap_err();
        assert!(err.to_string().contains("text only"));
    }
}
