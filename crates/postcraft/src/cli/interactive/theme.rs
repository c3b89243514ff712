//! Custom dialoguer theme and banner for the Postcraft workbench.

use console::{style, Style};
use dialoguer::theme::ColorfulTheme;

/// Returns a `ColorfulTheme` configured with Postcraft's colours.
///
/// - Prompt prefix: magenta `?`
/// - Active item indicator: magenta `▸`
/// - Success prefix: green `✓`
/// - Error prefix: red `✗`
pub fn postcraft_theme() -> ColorfulTheme {
    ColorfulTheme {
        prompt_prefix: style("?".to_string()).for_stderr().magenta(),
        prompt_style: Style::new().for_stderr().bold(),
        prompt_suffix: style("›".to_string()).for_stderr().bright().black(),
        active_item_prefix: style("▸".to_string()).for_stderr().magenta(),
        active_item_style: Style::new().for_stderr().magenta(),
        success_prefix: style("✓".to_string()).for_stderr().green(),
        success_suffix: style("·".to_string()).for_stderr().bright().black(),
        error_prefix: style("✗".to_string()).for_stderr().red(),
        error_style: Style::new().for_stderr().red(),
        values_style: Style::new().for_stderr().green(),
        ..ColorfulTheme::default()
    }
}

/// Prints the Postcraft banner to stderr.
pub fn print_banner() {
    let version_line = format!("Postcraft v{}", postcraft_core::VERSION);
    let tagline = "Image analysis and social post workbench";

    let inner_width = tagline.len() + 4;

    let top = format!("  ╔{:═<width$}╗", "", width = inner_width);
    let mid1 = format!("  ║{:^width$}║", version_line, width = inner_width);
    let mid2 = format!("  ║{:^width$}║", tagline, width = inner_width);
    let bot = format!("  ╚{:═<width$}╝", "", width = inner_width);

    let magenta = Style::new().for_stderr().magenta();

    eprintln!();
    eprintln!("{}", magenta.apply_to(&top));
    eprintln!("{}", magenta.apply_to(&mid1));
    eprintln!("{}", magenta.apply_to(&mid2));
    eprintln!("{}", magenta.apply_to(&bot));
    eprintln!();
}
