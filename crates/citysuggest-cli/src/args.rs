use std::path::PathBuf;

use citysuggest::SchemaGeneration;
use clap::{Parser, Subcommand, ValueEnum};

/// CLI arguments for citysuggest
#[derive(Debug, Parser)]
#[command(
    name = "citysuggest",
    version,
    about = "Suggest cities by name and proximity from a JSON city list"
)]
pub struct CliArgs {
    /// JSON city list to index before querying
    #[arg(short = 'c', long = "cities", global = true, default_value = "cities.json")]
    pub cities: PathBuf,

    /// Optional JSON file overriding the query settings
    #[arg(long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Field layout of the text index
    #[arg(
        long = "generation",
        global = true,
        value_enum,
        default_value_t = GenerationArg::NameCountry
    )]
    pub generation: GenerationArg,

    /// Minimum log level written to stderr (RUST_LOG overrides it)
    #[arg(long = "log-level", global = true, default_value = "warn")]
    pub log_level: tracing::Level,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List the cities around a coordinate, nearest first
    Coord {
        #[arg(long = "lng", allow_hyphen_values = true)]
        lng: Option<String>,
        #[arg(long = "lat", allow_hyphen_values = true)]
        lat: Option<String>,
    },

    /// Search cities by name, optionally near a coordinate
    Search {
        /// Free-text query (e.g. "par")
        #[arg(default_value = "")]
        q: String,
        #[arg(long = "lng", allow_hyphen_values = true)]
        lng: Option<String>,
        #[arg(long = "lat", allow_hyphen_values = true)]
        lat: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum GenerationArg {
    /// Documents carry name and country
    NameCountry,
    /// Documents carry the name only
    NameOnly,
}

impl From<GenerationArg> for SchemaGeneration {
    fn from(value: GenerationArg) -> Self {
        match value {
            GenerationArg::NameCountry => Self::NameCountry,
            GenerationArg::NameOnly => Self::NameOnly,
        }
    }
}
