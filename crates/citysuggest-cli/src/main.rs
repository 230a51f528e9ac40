//! citysuggest: command-line front end for the city suggestion pipeline
//!
//! Loads a JSON city list into an in-memory geo index and text index, runs one
//! query and prints the result as pretty JSON on stdout. A failed query prints
//! the `{status, status_text, message}` error body instead and exits non-zero.
//!
//! Usage examples
//! --------------
//!
//! - Cities near a coordinate
//!   $ citysuggest --cities cities.json coord --lng 2.35 --lat 48.85
//!
//! - Text search, optionally narrowed to a coordinate
//!   $ citysuggest search par
//!   $ citysuggest search par --lng 2.35 --lat 48.85
//!
//! Logs go to stderr. Ctrl-C cancels a query in flight.
mod args;

use std::process::ExitCode;

use anyhow::Context;
use citysuggest::index::{MemoryGeoIndex, TantivySearchIndex};
use citysuggest::{CancellationToken, CitySuggester, SuggestConfig, SuggestError};
use clap::Parser;
use tracing::info;

use crate::args::{CliArgs, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = CliArgs::parse();
    citysuggest::init_logging(args.log_level)?;

    let config = match &args.config {
        Some(path) => SuggestConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => SuggestConfig::default(),
    };

    let geo = MemoryGeoIndex::new();
    let text = TantivySearchIndex::in_memory(args.generation.into())?;
    let report = citysuggest_ingest::ingest_file(&args.cities, &geo, &text)
        .with_context(|| format!("Failed to ingest {}", args.cities.display()))?;
    info!(?report, "City list indexed");

    let suggester = CitySuggester::new(geo, text, config);
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let outcome = match &args.command {
        Commands::Coord { lng, lat } => {
            suggester
                .cities_by_coordinate_with_cancel(lng.as_deref(), lat.as_deref(), &cancel)
                .await
        }
        Commands::Search { q, lng, lat } => {
            suggester
                .cities_by_search_with_cancel(q, lng.as_deref(), lat.as_deref(), &cancel)
                .await
        }
    };

    print_outcome(outcome)
}

fn print_outcome(
    outcome: Result<Vec<citysuggest::CityRecord>, SuggestError>,
) -> anyhow::Result<ExitCode> {
    match outcome {
        Ok(cities) => {
            println!("{}", serde_json::to_string_pretty(&cities)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            println!("{}", serde_json::to_string_pretty(&err.envelope())?);
            Ok(if err.is_client_error() {
                ExitCode::from(2)
            } else {
                ExitCode::FAILURE
            })
        }
    }
}
