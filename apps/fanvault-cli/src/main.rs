//! FanVault command-line uploader.

mod commands;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use fanvault_protocol::{
    Category, ContentFlags, ContentMetadata, Pricing, PricingKind, UploadId, Visibility,
    parse_tags,
};
use fanvault_upload_queue::Priority;

#[derive(Parser)]
#[command(name = "fanvault", version, about = "Resumable uploads to FanVault")]
struct Cli {
    /// Configuration file (defaults to the platform config directory).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a file and wait for it to finish
    Upload {
        /// Path to the file to upload
        file: PathBuf,
        #[command(flatten)]
        content: ContentArgs,
        #[arg(long, default_value = "normal")]
        priority: Priority,
        /// Resume an interrupted upload instead of starting a new one
        #[arg(long)]
        resume: Option<UploadId>,
    },
    /// List interrupted uploads that can still be resumed
    Sessions,
    /// Draft operations
    Draft {
        #[command(subcommand)]
        sub: DraftCommands,
    },
    /// Show upload history, newest first
    History {
        #[arg(long, default_value = "20")]
        limit: usize,
    },
    /// Show upload statistics
    Stats,
    /// Print the active configuration
    Config,
}

#[derive(Subcommand)]
enum DraftCommands {
    /// Save a file and its metadata for later
    Save {
        file: PathBuf,
        #[command(flatten)]
        content: ContentArgs,
    },
    /// List saved drafts
    List,
    /// Upload a saved draft
    Submit {
        id: uuid::Uuid,
        #[arg(long, default_value = "normal")]
        priority: Priority,
    },
    /// Delete a saved draft
    Delete { id: uuid::Uuid },
}

#[derive(Args)]
struct ContentArgs {
    #[arg(long)]
    title: String,
    #[arg(long, default_value = "")]
    description: String,
    #[arg(long, default_value = "other")]
    category: Category,
    /// Comma-separated tags; may be repeated
    #[arg(long = "tag")]
    tags: Vec<String>,
    #[arg(long, default_value = "public")]
    visibility: Visibility,
    /// Price in cents; makes the content paid
    #[arg(long, conflicts_with = "tier")]
    price: Option<u64>,
    /// Subscription tier required to view the content
    #[arg(long)]
    tier: Option<String>,
    #[arg(long)]
    explicit: bool,
}

impl ContentArgs {
    fn into_metadata(self) -> ContentMetadata {
        let pricing = match (self.price, self.tier) {
            (Some(amount), _) => Pricing {
                kind: PricingKind::Paid,
                amount,
                subscription_tier: None,
            },
            (None, Some(tier)) => Pricing {
                kind: PricingKind::Subscription,
                amount: 0,
                subscription_tier: Some(tier),
            },
            (None, None) => Pricing::default(),
        };

        ContentMetadata {
            title: self.title,
            description: self.description,
            category: self.category,
            tags: parse_tags(&self.tags.join(",")),
            visibility: self.visibility,
            pricing,
            flags: ContentFlags {
                explicit: self.explicit,
                ..ContentFlags::default()
            },
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let config_path = cli
        .config
        .unwrap_or_else(fanvault_uploader::default_config_path);

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(commands::run(cli.command, &config_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_upload_arguments() {
        let cli = Cli::try_parse_from([
            "fanvault",
            "upload",
            "clip.mp4",
            "--title",
            "Morning set",
            "--category",
            "fitness",
            "--tag",
            "yoga, stretch",
            "--tag",
            "morning",
            "--price",
            "499",
            "--priority",
            "high",
        ])
        .unwrap();

        let Commands::Upload {
            file,
            content,
            priority,
            resume,
        } = cli.command
        else {
            panic!("expected upload command");
        };
        assert_eq!(file, PathBuf::from("clip.mp4"));
        assert_eq!(content.category, Category::Fitness);
        assert_eq!(content.price, Some(499));
        assert_eq!(priority, Priority::High);
        assert!(resume.is_none());

        let metadata = content.into_metadata();
        assert_eq!(metadata.title, "Morning set");
        assert_eq!(metadata.tags.len(), 3);
        assert!(metadata.tags.contains("stretch"));
    }

    #[test]
    fn price_and_tier_conflict() {
        let result = Cli::try_parse_from([
            "fanvault", "upload", "a.png", "--title", "t", "--price", "1", "--tier", "gold",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn rejects_unknown_category() {
        let result = Cli::try_parse_from([
            "fanvault",
            "draft",
            "save",
            "a.png",
            "--title",
            "t",
            "--category",
            "cooking",
        ]);
        assert!(result.is_err());
    }
}
