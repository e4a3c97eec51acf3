use clap::Subcommand;

#[derive(Subcommand)]
pub enum FieldCommands {
    /// List custom fields in display order
    List {
        /// Data directory holding the database
        #[arg(long)]
        data_dir: Option<String>,

        /// Only fields assigned to this content type (app_label.model)
        #[arg(long)]
        model: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
