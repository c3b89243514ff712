//! The `postcraft posts` command: list rows of the CSV table.

use clap::Args;
use console::Style;
use postcraft_core::{Config, PersistedPost, Recorder};

/// Arguments for the `posts` command.
#[derive(Args, Debug)]
pub struct PostsArgs {
    /// Print rows as a JSON array
    #[arg(long)]
    pub json: bool,
}

/// Execute the posts command.
pub async fn execute(args: PostsArgs, config: &Config) -> anyhow::Result<()> {
    let recorder = Recorder::new(config.recorder_path());
    let posts = recorder.read_all()?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&posts)?);
        return Ok(());
    }

    if posts.is_empty() {
        eprintln!("No saved posts in {}", recorder.path().display());
        return Ok(());
    }

    print_posts(&posts);
    Ok(())
}

/// Print saved posts as numbered blocks on stdout.
pub(crate) fn print_posts(posts: &[PersistedPost]) {
    let label = Style::new().bold();
    let dim = Style::new().dim();
    for (i, post) in posts.iter().enumerate() {
        println!("{} {}", label.apply_to(format!("#{}", i + 1)), post.image_filename);
        println!("  {} {}", dim.apply_to("Caption: "), post.caption);
        println!("  {} {}", dim.apply_to("Hashtags:"), post.hashtags);
        println!("  {} {}", dim.apply_to("Post:    "), post.description.replace('\n', "\n            "));
        println!();
    }
}
