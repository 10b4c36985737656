use std::path::PathBuf;

use clap::{Parser, Subcommand};

use vera_gate::hooks::config::GateMode;
use vera_gate::hooks::protocol::HookStage;

#[derive(Debug, Parser)]
#[command(name = "vera", version, about = "Plan-score and verification gate for agent hooks")]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) command: Commands,

    #[arg(long, global = true, default_value = ".")]
    pub(crate) workdir: PathBuf,

    /// Defaults to <workdir>/.vera/config.yaml
    #[arg(long, global = true)]
    pub(crate) config: Option<PathBuf>,

    #[arg(long, global = true)]
    pub(crate) state_dir: Option<PathBuf>,

    #[arg(long, global = true)]
    pub(crate) profiles_dir: Option<PathBuf>,

    /// Client profile key used for every session.
    #[arg(long, global = true)]
    pub(crate) client: Option<String>,

    #[arg(long, global = true, value_enum)]
    pub(crate) mode: Option<GateMode>,
}

#[derive(Debug, Subcommand)]
pub(crate) enum Commands {
    /// Run one lifecycle gate over the hook payload on stdin.
    Hook(HookArgs),

    Init(InitArgs),

    Profile(ProfileArgs),
}

#[derive(Debug, Parser)]
pub(crate) struct HookArgs {
    #[arg(value_enum)]
    pub(crate) stage: HookStage,
}

#[derive(Debug, Parser)]
pub(crate) struct InitArgs {
    #[arg(long, default_value_t = false)]
    pub(crate) force: bool,

    #[arg(long, default_value_t = false)]
    pub(crate) print: bool,
}

#[derive(Debug, Parser)]
pub(crate) struct ProfileArgs {
    #[command(subcommand)]
    pub(crate) command: ProfileSubcommand,
}

#[derive(Debug, Subcommand)]
pub(crate) enum ProfileSubcommand {
    Show {
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    Resolve {
        outcome: String,

        /// Tool that is not connected; repeatable.
        #[arg(long = "unavailable")]
        unavailable: Vec<String>,
    },
}
