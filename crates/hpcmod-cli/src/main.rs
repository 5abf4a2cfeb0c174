use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use hpcmod_core::{ContainerTech, ModuleSystem};

mod dispatch;
mod logging;
mod prompt;
mod render;

#[derive(Parser, Debug)]
#[command(name = "hpcmod")]
#[command(about = "Container-wrapped environment modules for HPC", long_about = None)]
struct Cli {
    /// Settings file to use instead of the default one.
    #[arg(long, global = true, value_name = "PATH")]
    settings_file: Option<PathBuf>,
    /// Override a setting for this invocation (repeatable).
    #[arg(short = 'c', long = "config", global = true, value_name = "KEY:VALUE")]
    config_params: Vec<String>,
    #[arg(long, global = true, value_enum)]
    module_sys: Option<CliModuleSystem>,
    #[arg(long, global = true, value_enum)]
    container_tech: Option<CliContainerTech>,
    #[arg(long, global = true, conflicts_with = "quiet")]
    debug: bool,
    #[arg(long, global = true)]
    quiet: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Install a recipe, optionally from a local container image.
    Install {
        recipe: String,
        container_image: Option<PathBuf>,
        /// Reference the local image where it is instead of copying it.
        #[arg(long, requires = "container_image")]
        keep_path: bool,
        /// Do not add the module to the default view.
        #[arg(long)]
        no_view: bool,
        #[arg(short, long)]
        force: bool,
    },
    Uninstall {
        #[arg(required_unless_present = "all")]
        recipe: Option<String>,
        #[arg(short, long)]
        all: bool,
        #[arg(short, long)]
        force: bool,
        /// Leave the container image in place.
        #[arg(long)]
        keep_container: bool,
    },
    /// Regenerate module files for installed versions.
    Reinstall {
        #[arg(required_unless_present = "all")]
        recipe: Option<String>,
        /// Local image to reinstall from instead of pulling.
        #[arg(conflicts_with = "all")]
        container_image: Option<PathBuf>,
        #[arg(long, requires = "container_image")]
        keep_path: bool,
        #[arg(short, long)]
        all: bool,
        /// Pull fresh container images instead of reusing the existing ones.
        #[arg(short, long)]
        update_containers: bool,
        #[arg(long)]
        no_view: bool,
    },
    /// Upgrade installed software to the latest version its recipe declares.
    Upgrade {
        #[arg(required_unless_present = "all")]
        recipe: Option<String>,
        #[arg(short, long)]
        all: bool,
        #[arg(short, long)]
        dry_run: bool,
        #[arg(short, long)]
        force: bool,
        /// Print the dry-run report as JSON.
        #[arg(long, requires = "dry_run")]
        json: bool,
    },
    List {
        pattern: Option<String>,
        #[arg(long, conflicts_with = "short")]
        names_only: bool,
        #[arg(long)]
        short: bool,
    },
    Search {
        query: String,
    },
    View {
        #[command(subcommand)]
        command: ViewCommands,
    },
    /// Print the effective settings.
    Settings,
    Completions {
        #[arg(value_enum)]
        shell: CliCompletionShell,
    },
}

#[derive(Subcommand, Debug)]
enum ViewCommands {
    Create {
        view: String,
    },
    Delete {
        view: String,
        #[arg(short, long)]
        force: bool,
    },
    List {
        view: Option<String>,
    },
    Install {
        view: String,
        recipe: String,
    },
    Uninstall {
        view: String,
        recipe: String,
    },
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliModuleSystem {
    Lmod,
    Tcl,
}

impl From<CliModuleSystem> for ModuleSystem {
    fn from(value: CliModuleSystem) -> Self {
        match value {
            CliModuleSystem::Lmod => ModuleSystem::Lmod,
            CliModuleSystem::Tcl => ModuleSystem::Tcl,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliContainerTech {
    Singularity,
    Podman,
    Docker,
}

impl From<CliContainerTech> for ContainerTech {
    fn from(value: CliContainerTech) -> Self {
        match value {
            CliContainerTech::Singularity => ContainerTech::Singularity,
            CliContainerTech::Podman => ContainerTech::Podman,
            CliContainerTech::Docker => ContainerTech::Docker,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliCompletionShell {
    Bash,
    Zsh,
    Fish,
    Powershell,
}

impl From<CliCompletionShell> for Shell {
    fn from(value: CliCompletionShell) -> Self {
        match value {
            CliCompletionShell::Bash => Shell::Bash,
            CliCompletionShell::Zsh => Shell::Zsh,
            CliCompletionShell::Fish => Shell::Fish,
            CliCompletionShell::Powershell => Shell::PowerShell,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.debug, cli.quiet);
    dispatch::run_cli(cli)
}
