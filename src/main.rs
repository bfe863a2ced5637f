//! tiny11 - reduced Windows 11 image builder.
//!
//! Stages installation media, mounts the install image offline, strips
//! apps, packages, services and files per variant, applies registry tweaks
//! and repackages the result as a bootable ISO.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use tiny11::config::Config;
use tiny11::pipeline::{BuildOptions, Variant};

#[derive(Parser)]
#[command(name = "tiny11")]
#[command(about = "Reduced Windows 11 image builder")]
#[command(
    after_help = "QUICK START:\n  tiny11 preflight --source D:\\   Check tools and media\n  tiny11 build --source D:\\       Build the standard variant\n  tiny11 clean --force-unmount    Recover from a failed build"
)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a reduced image and author the ISO
    Build {
        /// Root of the extracted installation media
        #[arg(long)]
        source: PathBuf,

        /// standard, core or nano
        #[arg(long, default_value = "standard")]
        variant: Variant,

        /// Image index (required when the image holds several editions)
        #[arg(long)]
        index: Option<u32>,

        /// ISO path (default: TINY11_OUTPUT_ISO)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Theme name from the themes directory (default: TINY11_THEME)
        #[arg(long)]
        theme: Option<String>,

        /// Preinstall app id; repeat for several (default: all)
        #[arg(long = "app")]
        apps: Vec<String>,

        /// Enable .NET Framework 3.5 from the media (core and nano)
        #[arg(long)]
        netfx3: bool,

        /// Keep working directories after a successful build
        #[arg(long)]
        keep_staging: bool,

        /// Hash-compare the staged copy against the source
        #[arg(long)]
        verify_copy: bool,

        /// Skip the confirmation for core and nano
        #[arg(short, long)]
        yes: bool,
    },

    /// Remove working directories
    Clean {
        /// Unload hives and discard any mount left by a failed build first
        #[arg(long)]
        force_unmount: bool,
    },

    /// Show information
    Show {
        #[command(subcommand)]
        what: ShowTarget,
    },

    /// Run preflight checks (verify tools and media before a build)
    Preflight {
        /// Source media to validate
        #[arg(long)]
        source: Option<PathBuf>,

        /// Fail if any checks fail (exit code 1)
        #[arg(long)]
        strict: bool,
    },
}

#[derive(Subcommand)]
enum ShowTarget {
    /// Show current configuration
    Config,
    /// List editions in the source's install image
    Images {
        #[arg(long)]
        source: PathBuf,
    },
    /// List available themes
    Themes,
    /// List preinstallable apps
    Apps,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load .env if present
    dotenvy::dotenv().ok();
    tiny11::log::init_subscriber(cli.verbose);

    let work_dir = std::env::current_dir()?;
    let config = Config::load(&work_dir);

    match cli.command {
        Commands::Build {
            source,
            variant,
            index,
            output,
            theme,
            apps,
            netfx3,
            keep_staging,
            verify_copy,
            yes,
        } => {
            let mut options = BuildOptions::new(source, variant);
            options.index = index;
            options.output = output;
            options.theme = theme.unwrap_or_else(|| config.theme.clone());
            options.apps = apps;
            options.netfx3 = netfx3;
            options.keep_staging = keep_staging;
            options.verify_copy = verify_copy;
            commands::cmd_build(&config, options, yes)?;
        }

        Commands::Clean { force_unmount } => {
            commands::cmd_clean(&config, force_unmount)?;
        }

        Commands::Show { what } => {
            let target = match &what {
                ShowTarget::Config => commands::show::ShowTarget::Config,
                ShowTarget::Images { source } => commands::show::ShowTarget::Images { source },
                ShowTarget::Themes => commands::show::ShowTarget::Themes,
                ShowTarget::Apps => commands::show::ShowTarget::Apps,
            };
            commands::cmd_show(target, &config)?;
        }

        Commands::Preflight { source, strict } => {
            commands::cmd_preflight(&config, source.as_deref(), strict)?;
        }
    }

    Ok(())
}
