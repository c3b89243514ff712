//! Interactive workbench for a bare `postcraft` invocation.
//!
//! When `postcraft` runs with no subcommand on a TTY, this module drives a
//! menu over the same [`Workbench`] the flag-based commands use. Images,
//! analyses, captions and the chat history live in one [`SessionStore`] for
//! the lifetime of the menu.

pub mod flows;
pub mod setup;
pub mod theme;

use console::Style;
use dialoguer::Select;
use postcraft_core::{Config, GenerationOptions, Provider, SessionStore, Workbench};

/// Convert a dialoguer result into `Ok(Some(value))` on success, `Ok(None)` on
/// interrupt (Ctrl+C / terminal disconnect), and `Err` for other I/O failures.
///
/// Wraps `interact_text()` / `interact()` calls that lack an `_opt` variant.
fn handle_interrupt<T>(result: dialoguer::Result<T>) -> anyhow::Result<Option<T>> {
    match result {
        Ok(v) => Ok(Some(v)),
        Err(dialoguer::Error::IO(e)) if e.kind() == std::io::ErrorKind::Interrupted => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Main menu options presented to the user.
const MENU_ITEMS: &[&str] = &[
    "Load images",
    "Choose provider / model",
    "Analyze an image",
    "Edit caption & hashtags",
    "Compose final post",
    "Save post",
    "Chat with Groq",
    "View saved posts",
    "Configuration",
    "Clear all",
    "Exit",
];

/// Provider, model and generation parameters picked for the session.
pub struct ActiveModel {
    pub provider: Provider,
    pub options: GenerationOptions,
}

/// Everything the menu carries between flows.
pub struct InteractiveState {
    pub config: Config,
    pub bench: Workbench,
    pub session: SessionStore,
    pub active: Option<ActiveModel>,
}

impl InteractiveState {
    fn new(config: Config) -> Self {
        let bench = Workbench::from_config(&config);
        Self {
            config,
            bench,
            session: SessionStore::new(),
            active: None,
        }
    }

    /// Use a key typed during this session and rebuild the provider clients.
    fn apply_session_key(&mut self, provider: Provider, key: String) {
        self.config.providers.get_mut(provider).api_key = key;
        self.bench = Workbench::from_config(&self.config);
    }

    /// Run provider setup and make the result the active model.
    ///
    /// Returns `false` if the user backs out.
    pub fn choose_model(&mut self, vision_only: bool) -> anyhow::Result<bool> {
        let Some(selection) = setup::select_provider(&self.config, vision_only)? else {
            return Ok(false);
        };
        if let Some(key) = selection.api_key {
            self.apply_session_key(selection.provider, key);
        }
        let Some(options) =
            setup::select_generation(&self.config, selection.provider, &selection.model)?
        else {
            return Ok(false);
        };

        let dim = Style::new().for_stderr().dim();
        eprintln!(
            "  {}",
            dim.apply_to(format!(
                "Using {} / {}",
                selection.provider.label(),
                options.model
            ))
        );
        self.active = Some(ActiveModel {
            provider: selection.provider,
            options,
        });
        Ok(true)
    }
}

/// Entry point for interactive mode.
pub async fn run(config: Config) -> anyhow::Result<()> {
    theme::print_banner();

    let theme = theme::postcraft_theme();
    let mut state = InteractiveState::new(config);

    loop {
        let selection = Select::with_theme(&theme)
            .with_prompt("What would you like to do?")
            .items(MENU_ITEMS)
            .default(0)
            .interact_opt()?;

        match selection {
            Some(0) => flows::load_images(&mut state)?,
            Some(1) => {
                state.choose_model(false)?;
            }
            Some(2) => flows::analyze(&mut state).await?,
            Some(3) => flows::edit_caption(&mut state)?,
            Some(4) => flows::compose(&mut state).await?,
            Some(5) => flows::save(&mut state)?,
            Some(6) => flows::chat(&mut state).await?,
            Some(7) => flows::view_posts(&state)?,
            Some(8) => show_config(&state.config)?,
            Some(9) => flows::clear_all(&mut state)?,
            Some(10) | None => break,
            _ => unreachable!(),
        }
    }

    Ok(())
}

/// Interactive config viewer: a summary of current settings, with the full
/// TOML or the config file path on request.
fn show_config(config: &Config) -> anyhow::Result<()> {
    let theme = theme::postcraft_theme();
    let dim = Style::new().for_stderr().dim();
    let magenta = Style::new().for_stderr().magenta();
    let label = Style::new().for_stderr().bold();

    loop {
        eprintln!();
        eprintln!("  {}", magenta.apply_to("Current configuration:"));
        eprintln!();

        let config_path = Config::default_path();
        let path_note = if config_path.exists() {
            "(exists)"
        } else {
            "(using defaults)"
        };

        eprintln!(
            "    {:<20} {} {}",
            label.apply_to("Config file:"),
            config_path.display(),
            dim.apply_to(path_note)
        );
        eprintln!(
            "    {:<20} {}",
            label.apply_to("Posts file:"),
            config.recorder_path().display()
        );
        eprintln!(
            "    {:<20} {} images, {} MB each",
            label.apply_to("Uploads:"),
            config.upload.max_slots,
            config.upload.max_file_size_mb
        );
        eprintln!(
            "    {:<20} {} hashtags, {} chars",
            label.apply_to("Composer:"),
            config.composer.max_hashtags,
            config.composer.max_post_chars
        );
        eprintln!(
            "    {:<20} {}",
            label.apply_to("Log level:"),
            config.logging.level
        );
        eprintln!(
            "    {:<20} {}",
            label.apply_to("Providers ready:"),
            provider_summary(config)
        );
        eprintln!();

        let items = &["View full config (TOML)", "Show config file path", "Back"];

        let selection = Select::with_theme(&theme)
            .with_prompt("Configuration")
            .items(items)
            .default(0)
            .interact_opt()?;

        match selection {
            Some(0) => match config.to_toml() {
                Ok(toml) => {
                    eprintln!();
                    eprintln!("{}", dim.apply_to("─".repeat(50)));
                    eprintln!("{toml}");
                    eprintln!("{}", dim.apply_to("─".repeat(50)));
                    eprintln!();
                }
                Err(e) => {
                    let err = Style::new().for_stderr().red();
                    eprintln!("  {} Failed to serialize config: {e}", err.apply_to("✗"));
                    eprintln!();
                }
            },
            Some(1) => {
                eprintln!();
                eprintln!("  {}", Config::default_path().display());
                eprintln!();
            }
            Some(2) | None => break,
            _ => unreachable!(),
        }
    }

    Ok(())
}

/// Providers whose API key resolves.
fn provider_summary(config: &Config) -> String {
    let ready: Vec<&str> = Provider::ALL
        .into_iter()
        .filter(|p| setup::config_has_key(config, *p))
        .map(|p| p.label())
        .collect();

    if ready.is_empty() {
        "none configured".to_string()
    } else {
        ready.join(", ")
    }
}
