//! Jailtree - chroot jail tree builder.
//!
//! Turns declarative spec files into a populated jail directory:
//! directories, copied files with their shared libraries, device nodes,
//! links, and post-install commands.

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use jailtree::commands;
use jailtree::commands::build::BuildOptions;
use jailtree::config::Config;
use jailtree::copy::Reflink;

#[derive(Parser)]
#[command(name = "jailtree")]
#[command(about = "Build chroot jail directory trees from spec files")]
#[command(
    after_help = "QUICK START:\n  jailtree build jail/ base.spec   Create or update jail/ from base.spec\n  jailtree plan base.spec          Show the expanded execution plan\n  jailtree deps /bin/sh            List the shared libraries a binary needs"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or update a jail from spec files
    Build {
        /// Jail directory (created if it does not exist)
        jail_dir: PathBuf,

        /// Spec files to apply, in order
        #[arg(required = true)]
        spec_files: Vec<PathBuf>,

        /// If an existing destination file cannot be opened, remove it and
        /// try again
        #[arg(long)]
        force: bool,

        /// Remove each existing destination file before copying
        #[arg(long)]
        remove_destination: bool,

        /// When to use copy-on-write cloning for file copies
        #[arg(long, value_enum, default_value_t = ReflinkMode::Never)]
        reflink: ReflinkMode,

        /// Skip shared-library resolution
        #[arg(long)]
        no_deps: bool,

        /// Explain what is being done
        #[arg(short, long)]
        verbose: bool,
    },

    /// Show the expanded execution plan without touching the filesystem
    Plan {
        /// Spec files to expand, in order
        #[arg(required = true)]
        spec_files: Vec<PathBuf>,

        /// Skip shared-library resolution
        #[arg(long)]
        no_deps: bool,

        /// Emit the plan as JSON
        #[arg(long)]
        json: bool,

        /// Write a JSON plan manifest to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List the shared libraries binaries transitively need
    Deps {
        /// Binaries to inspect
        #[arg(required = true)]
        binaries: Vec<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ReflinkMode {
    /// Always copy bytes
    Never,
    /// Clone or fail
    Always,
    /// Clone when the filesystem supports it
    Auto,
}

impl From<ReflinkMode> for Reflink {
    fn from(mode: ReflinkMode) -> Self {
        match mode {
            ReflinkMode::Never => Reflink::Never,
            ReflinkMode::Always => Reflink::Always,
            ReflinkMode::Auto => Reflink::Auto,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command {
        Commands::Build {
            jail_dir,
            spec_files,
            force,
            remove_destination,
            reflink,
            no_deps,
            verbose,
        } => {
            let options = BuildOptions {
                force,
                remove_destination,
                reflink: reflink.into(),
                skip_dependencies: no_deps,
                verbose,
            };
            commands::cmd_build(&jail_dir, &spec_files, &options, &config)?;
        }

        Commands::Plan {
            spec_files,
            no_deps,
            json,
            output,
        } => {
            commands::cmd_plan(&spec_files, no_deps, json, output.as_deref(), &config)?;
        }

        Commands::Deps { binaries } => {
            commands::cmd_deps(&binaries, &config)?;
        }
    }

    Ok(())
}
