//! Provider setup: API key detection, key entry with optional persistence,
//! and model / generation parameter selection.

use console::Style;
use dialoguer::{Input, Password, Select};
use postcraft_core::llm::resolve_env_var;
use postcraft_core::{Config, GenerationOptions, Provider};
use std::path::Path;

use super::theme::postcraft_theme;

/// Provider and model chosen for the session.
pub struct ProviderSelection {
    pub provider: Provider,
    pub model: String,
    /// API key entered during this session (not from env/config)
    pub api_key: Option<String>,
}

/// Guide the user through choosing a provider, entering a missing key, and
/// picking a model.
///
/// Returns `None` if the user cancels.
pub fn select_provider(config: &Config, vision_only: bool) -> anyhow::Result<Option<ProviderSelection>> {
    let theme = postcraft_theme();
    let dim = Style::new().for_stderr().dim();
    let warn = Style::new().for_stderr().yellow();

    let choices: Vec<Provider> = Provider::ALL
        .into_iter()
        .filter(|p| !vision_only || p.accepts_images())
        .collect();
    let labels: Vec<&str> = choices.iter().map(|p| p.label()).collect();

    let Some(index) = Select::with_theme(&theme)
        .with_prompt(if vision_only {
            "Vision provider"
        } else {
            "Provider"
        })
        .items(&labels)
        .default(0)
        .interact_opt()?
    else {
        return Ok(None);
    };
    let provider = choices[index];

    let mut session_api_key = None;
    if config_has_key(config, provider) {
        eprintln!(
            "  {}",
            dim.apply_to(format!(
                "Using existing API key from {} / config",
                provider.env_var()
            ))
        );
    } else {
        eprintln!("  {}", warn.apply_to(format!("{} not set.", provider.env_var())));

        let key: String = match Password::with_theme(&theme)
            .with_prompt(format!("Enter your {} API key (Esc to skip)", provider.label()))
            .allow_empty_password(true)
            .interact()
        {
            Ok(k) if !k.is_empty() => k,
            _ => return Ok(None),
        };

        let save_options = &["Yes, save to config file", "No, use for this session only"];
        let save_choice = Select::with_theme(&theme)
            .with_prompt("Save this key for future sessions?")
            .items(save_options)
            .default(0)
            .interact_opt()?;

        match save_choice {
            Some(0) => {
                let path = Config::default_path();
                match save_key_to_config(&path, provider, &key) {
                    Ok(()) => eprintln!(
                        "  {}",
                        dim.apply_to(format!("Key saved to {}", path.display()))
                    ),
                    Err(e) => {
                        eprintln!(
                            "  {}",
                            warn.apply_to(format!("Could not save to config: {e}"))
                        );
                        eprintln!("  Using key for this session only.");
                    }
                }
                session_api_key = Some(key);
            }
            Some(1) => session_api_key = Some(key),
            _ => return Ok(None),
        }
    }

    let Some(model) = select_model(config, provider, &theme)? else {
        return Ok(None);
    };

    Ok(Some(ProviderSelection {
        provider,
        model,
        api_key: session_api_key,
    }))
}

/// Pick one of the configured models, or type another.
fn select_model(
    config: &Config,
    provider: Provider,
    theme: &dialoguer::theme::ColorfulTheme,
) -> anyhow::Result<Option<String>> {
    let settings = config.providers.get(provider);
    let mut items: Vec<String> = settings
        .models
        .iter()
        .map(|m| {
            if *m == settings.default_model {
                format!("{m} (default)")
            } else {
                m.clone()
            }
        })
        .collect();
    items.push("Custom model name...".to_string());

    let default = settings
        .models
        .iter()
        .position(|m| *m == settings.default_model)
        .unwrap_or(0);

    let choice = Select::with_theme(theme)
        .with_prompt(format!("{} model", provider.label()))
        .items(&items)
        .default(default)
        .interact_opt()?;

    match choice {
        Some(i) if i < settings.models.len() => Ok(Some(settings.models[i].clone())),
        Some(_) => prompt_custom_model(theme),
        None => Ok(None),
    }
}

/// Prompt for a custom model name.
fn prompt_custom_model(theme: &dialoguer::theme::ColorfulTheme) -> anyhow::Result<Option<String>> {
    let Some(model) = super::handle_interrupt(
        Input::<String>::with_theme(theme)
            .with_prompt("Model name")
            .interact_text(),
    )?
    else {
        return Ok(None);
    };
    let model = model.trim().to_string();
    Ok((!model.is_empty()).then_some(model))
}

/// Ask for generation parameters, starting from the provider defaults.
///
/// Temperature and top-p are only asked for providers that use them.
pub fn select_generation(
    config: &Config,
    provider: Provider,
    model: &str,
) -> anyhow::Result<Option<GenerationOptions>> {
    let theme = postcraft_theme();
    let settings = config.providers.get(provider);
    let mut options = GenerationOptions::from_settings(settings).with_model(model);

    if provider.supports_sampling() {
        let Some(temperature) = super::handle_interrupt(
            Input::<f32>::with_theme(&theme)
                .with_prompt("Temperature (0.0 - 2.0)")
                .default(settings.temperature.unwrap_or(1.0))
                .validate_with(|v: &f32| {
                    if (0.0..=2.0).contains(v) {
                        Ok(())
                    } else {
                        Err("must be between 0.0 and 2.0")
                    }
                })
                .interact_text(),
        )?
        else {
            return Ok(None);
        };
        let Some(top_p) = super::handle_interrupt(
            Input::<f32>::with_theme(&theme)
                .with_prompt("Top P (0.0 - 1.0)")
                .default(settings.top_p.unwrap_or(1.0))
                .validate_with(|v: &f32| {
                    if (0.0..=1.0).contains(v) {
                        Ok(())
                    } else {
                        Err("must be between 0.0 and 1.0")
                    }
                })
                .interact_text(),
        )?
        else {
            return Ok(None);
        };
        options = options.with_temperature(temperature).with_top_p(top_p);
    }

    let limit = settings.max_tokens_limit;
    let Some(max_tokens) = super::handle_interrupt(
        Input::<u32>::with_theme(&theme)
            .with_prompt(format!("Max tokens (1 - {limit})"))
            .default(settings.max_tokens)
            .validate_with(move |v: &u32| {
                if (1..=limit).contains(v) {
                    Ok(())
                } else {
                    Err(format!("must be between 1 and {limit}"))
                }
            })
            .interact_text(),
    )?
    else {
        return Ok(None);
    };

    Ok(Some(options.with_max_tokens(max_tokens)))
}

/// Whether the provider's key is available from the environment or config.
pub(crate) fn config_has_key(config: &Config, provider: Provider) -> bool {
    resolve_env_var(&config.providers.get(provider).api_key).is_some()
}

/// Save an API key to the config file, preserving existing comments.
pub(crate) fn save_key_to_config(path: &Path, provider: Provider, key: &str) -> anyhow::Result<()> {
    let content = if path.exists() {
        std::fs::read_to_string(path)?
    } else {
        String::new()
    };

    let mut doc: toml_edit::DocumentMut = content.parse().unwrap_or_default();
    let section = provider.to_string();

    if !doc.contains_key("providers") {
        doc["providers"] = toml_edit::Item::Table(toml_edit::Table::new());
    }
    if !doc["providers"]
        .as_table()
        .is_some_and(|t| t.contains_key(&section))
    {
        doc["providers"][section.as_str()] = toml_edit::Item::Table(toml_edit::Table::new());
    }
    doc["providers"][section.as_str()]["api_key"] = toml_edit::value(key);

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, doc.to_string())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_has_key_literal() {
        let mut config = Config::default();
        config.providers.claude.api_key = "sk-ant-real-key-123".to_string();
        assert!(config_has_key(&config, Provider::Claude));
    }

    #[test]
    fn test_config_has_key_unset_template() {
        let mut config = Config::default();
        config.providers.openai.api_key = "${POSTCRAFT_TEST_UNSET_KEY_XYZ}".to_string();
        assert!(!config_has_key(&config, Provider::OpenAi));
    }

    #[test]
    fn test_config_has_key_empty() {
        let mut config = Config::default();
        config.providers.groq.api_key = String::new();
        assert!(!config_has_key(&config, Provider::Groq));
    }

    #[test]
    fn test_save_key_preserves_comments_and_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "# my settings\n[recorder]\npath = \"posts.csv\"\n").unwrap();

        save_key_to_config(&path, Provider::Gemini, "g-secret").unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("# my settings"));
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.providers.gemini.api_key, "g-secret");
        assert_eq!(config.providers.gemini.default_model, "gemini-1.5-flash");
        assert_eq!(config.recorder.path, "posts.csv");
    }

    #[test]
    fn test_save_key_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("config.toml");
        save_key_to_config(&path, Provider::OpenAi, "sk-new").unwrap();
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.providers.openai.api_key, "sk-new");
    }
}
