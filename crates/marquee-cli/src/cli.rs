use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "marquee",
    about = "Marquee: festival content backend",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file (TOML). Defaults apply when absent.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the HTTP server
    Serve(ServeArgs),
    /// Show the schema of one or every record kind
    Schema(SchemaArgs),
    /// List records of a kind
    List(ListArgs),
    /// Show one record
    Show(RecordArgs),
    /// Create or update a record
    Upsert(UpsertArgs),
    /// Delete a record and release its assets
    Delete(RecordArgs),
    /// Print the default configuration file
    Config,
}

#[derive(Args)]
pub struct ServeArgs {
    /// Override `server.bind_addr`
    #[arg(long)]
    pub bind: Option<String>,
}

#[derive(Args)]
pub struct SchemaArgs {
    pub kind: Option<String>,
}

#[derive(Args)]
pub struct ListArgs {
    pub kind: String,
    /// Exact-match filter, `field=value`; repeatable
    #[arg(short = 'w', long = "where", value_parser = parse_pair)]
    pub filters: Vec<(String, String)>,
    /// Sort key, `-` prefix for descending (e.g. `-createdAt`)
    #[arg(short, long)]
    pub sort: Option<String>,
}

#[derive(Args)]
pub struct RecordArgs {
    pub kind: String,
    pub id: String,
}

#[derive(Args)]
pub struct UpsertArgs {
    pub kind: String,
    /// Update this record instead of creating one
    #[arg(long)]
    pub id: Option<String>,
    /// Scalar field, `name=value`; repeatable
    #[arg(short, long = "field", value_parser = parse_pair)]
    pub fields: Vec<(String, String)>,
    /// Image to upload, `slot=path`; repeatable
    #[arg(long = "file", value_parser = parse_pair)]
    pub files: Vec<(String, String)>,
    /// Keep or link an existing asset, `slot=url`; repeatable
    #[arg(long = "existing", value_parser = parse_pair)]
    pub existing: Vec<(String, String)>,
    /// Empty an optional slot; repeatable
    #[arg(long)]
    pub clear: Vec<String>,
}

/// Parse `key=value`, splitting on the first `=`.
pub fn parse_pair(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got `{raw}`"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing key in `{raw}`"));
    }
    Ok((key.to_string(), value.to_string()))
}
