//! The `postcraft chat` command: one Groq turn streamed to stdout.

use super::types::RoleArg;
use super::CtrlCGuard;
use clap::Args;
use postcraft_core::{Config, Provider, SessionStore, Workbench};
use std::io::Write;

/// Arguments for the `chat` command.
#[derive(Args, Debug)]
pub struct ChatArgs {
    /// Message to send
    #[arg(short, long)]
    pub message: String,

    /// Role of the message
    #[arg(long, value_enum, default_value_t = RoleArg::User)]
    pub role: RoleArg,

    /// Groq model (defaults to the configured default)
    #[arg(long)]
    pub model: Option<String>,

    /// Sampling temperature
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Maximum output tokens
    #[arg(long)]
    pub max_tokens: Option<u32>,
}

/// Execute the chat command.
pub async fn execute(args: ChatArgs, config: &Config) -> anyhow::Result<()> {
    let bench = Workbench::from_config(config);
    let mut session = SessionStore::new();

    let mut options = bench.dispatcher().options_for(Provider::Groq);
    if let Some(model) = args.model {
        options = options.with_model(model);
    }
    if let Some(temperature) = args.temperature {
        options = options.with_temperature(temperature);
    }
    if let Some(max_tokens) = args.max_tokens {
        options = options.with_max_tokens(max_tokens);
    }
    let guard = CtrlCGuard::new();
    let options = options.with_cancel(guard.token());

    let reply = bench
        .chat(
            &mut session,
            &args.message,
            args.role.into(),
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
        anyhow::bail!("Groq returned no reply; see the log for details");
    }
    Ok(())
}
