mod commands;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use commands::{EXIT_CONFIG_ERROR, EXIT_FAILURE, EXIT_VALIDATION_ERROR};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "modfed",
    version,
    about = "Build federated extensions and assemble their runtime plugin list"
)]
struct Cli {
    /// Output results as structured JSON.
    #[arg(long, default_value_t = false, global = true)]
    json: bool,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Build an extension package.
    Build {
        /// Path to the extension package.
        path: PathBuf,
        /// Build in production mode.
        #[arg(long, default_value_t = false, conflicts_with = "dev")]
        prod: bool,
        /// Build in development mode (the default).
        #[arg(long, default_value_t = false)]
        dev: bool,
        /// Output directory (default is `<path>/build`).
        #[arg(long)]
        output: Option<PathBuf>,
        /// Path to the core application package.
        #[arg(long)]
        core: Option<PathBuf>,
        /// Optional TOML build configuration.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Validate package metadata against the schema before building.
        #[arg(long, default_value_t = false)]
        validate: bool,
    },
    /// Validate the metadata of a package without building it.
    Validate {
        /// Path to the package.
        path: PathBuf,
    },
    /// Show the resolved shared-module table.
    Shared {
        /// Extension package; omit to show the host's own table.
        path: Option<PathBuf>,
        /// Path to the core application package.
        #[arg(long)]
        core: Option<PathBuf>,
    },
    /// List built extensions in a labextensions directory.
    List {
        /// Directory holding built extensions.
        dir: PathBuf,
    },
    /// Emit the page plugin payload for the built extensions in a directory.
    Payload {
        /// Directory holding built extensions.
        dir: PathBuf,
        /// Write the payload to a file instead of stdout.
        #[arg(long)]
        out: Option<PathBuf>,
        /// Wrap the payload in the script element the page embeds.
        #[arg(long, default_value_t = false)]
        html: bool,
    },
    /// Generate shell completions for bash, zsh, fish, elvish, or powershell.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

fn main() -> ExitCode {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let msg = info.to_string();
        if msg.contains("Broken pipe")
            || msg.contains("broken pipe")
            || msg.contains("os error 32")
            || msg.contains("failed printing to stdout")
        {
            std::process::exit(0);
        }
        default_hook(info);
    }));

    let cli = Cli::parse();

    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("MODFED_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    let json_output = cli.json;

    let result = match cli.command {
        Commands::Build {
            path,
            prod,
            dev,
            output,
            core,
            config,
            validate,
        } => commands::build::run(
            &commands::build::BuildArgs {
                path,
                mode: commands::build::mode_flag(prod, dev),
                output,
                core,
                config,
                validate,
            },
            json_output,
        ),
        Commands::Validate { path } => commands::validate::run(&path, json_output),
        Commands::Shared { path, core } => {
            commands::shared::run(path.as_deref(), core.as_deref(), json_output)
        }
        Commands::List { dir } => commands::list::run(&dir, json_output),
        Commands::Payload { dir, out, html } => {
            commands::payload::run(&dir, out.as_deref(), html)
        }
        Commands::Completions { shell } => commands::completions::run::<Cli>(shell),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(msg) => {
            eprintln!("error: {msg}");
            let code = if msg.starts_with("configuration error:")
                || msg.starts_with("config file error:")
            {
                EXIT_CONFIG_ERROR
            } else if msg.starts_with("validation error:") {
                EXIT_VALIDATION_ERROR
            } else {
                EXIT_FAILURE
            };
            ExitCode::from(code)
        }
    }
}
