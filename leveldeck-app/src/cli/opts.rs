use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Clone, ValueEnum)]
pub enum StoreKind {
    Json,
    Sqlite,
    Postgres,
}

#[derive(Debug, Parser, Clone)]
#[command(name = "leveldeck", version, about = "LevelDeck weighted flashcard scheduler")]
pub struct Cli {
    /// Storage backend
    #[arg(long, value_enum, default_value_t = StoreKind::Json)]
    pub store: StoreKind,

    /// Level file (json) or database (sqlite); defaults to the app data dir
    #[arg(long)]
    pub db_path: Option<PathBuf>,

    /// Connection URL when --store postgres
    #[arg(long, env = "LEVELDECK_DB_URL")]
    pub db_url: Option<String>,

    /// Level assigned to newly added keys
    #[arg(long, default_value_t = 0)]
    pub default_level: usize,

    /// Seed for reproducible draws
    #[arg(long)]
    pub seed: Option<u64>,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Create the deck with the given weights (replacing them on an existing deck)
    Init(InitCmd),
    /// Replace the weights of an existing deck; keys above a new top level move down to it
    Weights(WeightsCmd),
    /// Add keys at the default level
    Add(AddCmd),
    /// Add keys from a text file (one per line) or a CSV file (first column)
    Import(ImportCmd),
    /// Interactive draw/answer loop
    Review(ReviewCmd),
    /// Print counts: deleted, each level, completed
    Progress,
    /// Move every active key to the default level
    Reset,
    /// Serve the command protocol over HTTP
    Api(ApiCmd),
}

#[derive(Debug, Args, Clone)]
pub struct InitCmd {
    /// Comma separated, e.g. 1000,1000,500,100,10,1
    #[arg(value_delimiter = ',', required = true)]
    pub weights: Vec<f64>,
}

#[derive(Debug, Args, Clone)]
pub struct WeightsCmd {
    #[arg(value_delimiter = ',', required = true)]
    pub weights: Vec<f64>,
}

#[derive(Debug, Args, Clone)]
pub struct AddCmd {
    #[arg(required = true)]
    pub keys: Vec<String>,
    /// Only add keys this dictionary knows
    #[arg(long)]
    pub dict: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct ImportCmd {
    pub path: PathBuf,
}

#[derive(Debug, Args, Clone)]
pub struct ReviewCmd {
    /// Dictionary file (.json object or SQLite database)
    #[arg(long)]
    pub dict: Option<PathBuf>,
    #[arg(long, default_value_t = 50)]
    pub max: usize,
}

#[derive(Debug, Args, Clone)]
pub struct ApiCmd {
    /// Bind address (host:port)
    #[arg(long, default_value = "127.0.0.1:8080")]
    pub addr: String,
    /// Dictionary file (.json object or SQLite database)
    #[arg(long)]
    pub dict: PathBuf,
    /// Render values as HTML entries instead of plain text
    #[arg(long)]
    pub html: bool,
}
