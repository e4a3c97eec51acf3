use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cfengine::cli::{
    FieldCommands, load_config, run_check, run_field_list, run_init, run_purge_field,
    run_rename_choice,
};

#[derive(Parser)]
#[command(name = "cfengine")]
#[command(about = "Manage custom field definitions and the data stored against them", long_about = None)]
struct Cli {
    /// TOML config file (data_dir, queue_name)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the custom field database
    Init {
        /// Data directory for the database
        #[arg(long)]
        data_dir: Option<String>,
    },

    /// Inspect custom field definitions
    Field {
        #[command(subcommand)]
        command: FieldCommands,
    },

    /// Validate the custom field data of every record of one content type
    Check {
        /// Data directory holding the database
        #[arg(long)]
        data_dir: Option<String>,

        /// Content type to check (app_label.model)
        #[arg(long)]
        model: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Remove a field's key from record data now, instead of waiting for the worker
    PurgeField {
        /// Data directory holding the database
        #[arg(long)]
        data_dir: Option<String>,

        /// Field name as stored in record data
        #[arg(long)]
        name: String,

        /// Content types to purge (app_label.model); repeatable
        #[arg(long = "model", required = true)]
        models: Vec<String>,

        /// Skip interactive prompts
        #[arg(long)]
        non_interactive: bool,

        /// Skip confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },

    /// Rewrite a selection value in record data now
    RenameChoice {
        /// Data directory holding the database
        #[arg(long)]
        data_dir: Option<String>,

        /// ID of the select or multi-select field
        #[arg(long)]
        field_id: String,

        /// Value currently stored
        #[arg(long)]
        old: String,

        /// Replacement value
        #[arg(long)]
        new: String,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("cfengine=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Init { data_dir } => {
            run_init(&load_config(config_path, data_dir)?)?;
        }
        Commands::Field { command } => match command {
            FieldCommands::List {
                data_dir,
                model,
                json,
            } => {
                run_field_list(&load_config(config_path, data_dir)?, model, json)?;
            }
        },
        Commands::Check {
            data_dir,
            model,
            json,
        } => {
            run_check(&load_config(config_path, data_dir)?, model, json)?;
        }
        Commands::PurgeField {
            data_dir,
            name,
            models,
            non_interactive,
            yes,
        } => {
            run_purge_field(
                &load_config(config_path, data_dir)?,
                name,
                models,
                non_interactive,
                yes,
            )?;
        }
        Commands::RenameChoice {
            data_dir,
            field_id,
            old,
            new,
        } => {
            run_rename_choice(&load_config(config_path, data_dir)?, field_id, old, new)?;
        }
    }

    Ok(())
}
