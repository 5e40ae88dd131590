// Copyright Kyler Chin <kyler@catenarymaps.org>
// Catenary Transit Initiatives
// Attribution cannot be removed

mod server;

use actix_cors::Cors;
use actix_web::{App, HttpServer, web};
use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use surveyroutes::config::EngineConfig;
use surveyroutes::facets::parse_id_list;
use surveyroutes::loader::{load_buildings, spawn_mode_loads};
use surveyroutes::{
    EngineEvent, FacetSelection, IncomeId, ModeId, ModeSelection, PeriodId, PurposeId,
    RouteLayerOrchestrator, spawn_engine,
};
use tokio::sync::mpsc;
use tracing::{info, warn};

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// RON config file; defaults apply when omitted
    #[arg(long, env = "QUILLAY_CONFIG")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Serve layers and toggles over HTTP
    Serve {
        #[arg(short, long, default_value = "127.0.0.1")]
        address: String,
        #[arg(short, long, default_value_t = 8080)]
        port: u16,
    },
    /// Compute one layer set and write it as JSON
    Export {
        #[arg(short, long, default_value = "layers.json")]
        output: PathBuf,
        /// Comma separated mode ids, in layer order (defaults to the config)
        #[arg(long)]
        modes: Option<String>,
        #[arg(long)]
        periods: Option<String>,
        #[arg(long)]
        purposes: Option<String>,
        #[arg(long)]
        incomes: Option<String>,
    },
}

fn facets_from_args(
    periods: Option<&str>,
    purposes: Option<&str>,
    incomes: Option<&str>,
) -> anyhow::Result<FacetSelection> {
    let mut facets = FacetSelection::all();
    if let Some(list) = periods {
        facets.periods = parse_id_list::<PeriodId>(list).context("invalid --periods")?;
    }
    if let Some(list) = purposes {
        facets.purposes = parse_id_list::<PurposeId>(list).context("invalid --purposes")?;
    }
    if let Some(list) = incomes {
        facets.incomes = parse_id_list::<IncomeId>(list).context("invalid --incomes")?;
    }
    Ok(facets)
}

/// Keeps the order given, since it is the layer order.
fn modes_from_arg(list: &str) -> anyhow::Result<ModeSelection> {
    let modes = list
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::parse::<ModeId>)
        .collect::<Result<Vec<_>, _>>()
        .context("invalid --modes")?;
    Ok(ModeSelection::new(modes))
}

async fn serve(config: EngineConfig, address: String, port: u16) -> anyhow::Result<()> {
    let (engine, engine_task) = spawn_engine(RouteLayerOrchestrator::from_config(&config));

    // Loads for every mode, so toggling one on later finds its data.
    let _loads = spawn_mode_loads(&config, ModeId::domain(), engine.event_sender());

    let buildings = match &config.buildings_path {
        Some(path) => match load_buildings(&reqwest::Client::new(), &config.source, path).await {
            Ok(collection) => Some(Arc::new(collection)),
            Err(e) => {
                warn!("Buildings unavailable: {}", e);
                None
            }
        },
        None => None,
    };

    let state = web::Data::new(server::AppState {
        engine,
        view: config.view.clone(),
        buildings,
    });

    info!("Serving route layers on {}:{}", address, port);
    HttpServer::new(move || {
        let cors = Cors::permissive();
        App::new()
            .wrap(cors)
            .app_data(state.clone())
            .configure(server::config)
    })
    .bind((address, port))?
    .run()
    .await?;

    engine_task.abort();
    Ok(())
}

async fn export(
    config: EngineConfig,
    output: PathBuf,
    modes: ModeSelection,
    facets: FacetSelection,
) -> anyhow::Result<()> {
    // Nothing selected while loading, so the only recomputation is the final one.
    let mut orchestrator = RouteLayerOrchestrator::new(
        ModeSelection::default(),
        facets,
        config.aggregation_options(),
        config.layer_alpha,
    );

    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let mut loads = spawn_mode_loads(&config, modes.iter(), events_tx);
    while let Some(joined) = loads.join_next().await {
        if let Err(e) = joined {
            warn!("Load task failed: {}", e);
        }
    }
    while let Ok(event) = events_rx.try_recv() {
        orchestrator.apply(event);
    }

    let set = orchestrator.apply(EngineEvent::SetModes(modes));
    let edge_count: usize = set.layers.iter().map(|l| l.edges.len()).sum();

    let json = serde_json::to_vec(set.as_ref())?;
    tokio::fs::write(&output, json)
        .await
        .with_context(|| format!("writing {}", output.display()))?;

    info!(
        "Wrote {} layers with {} edges to {}",
        set.layers.len(),
        edge_count,
        output.display()
    );
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args = Args::parse();
    let config = EngineConfig::load(args.config.as_deref())?;

    match args.cmd {
        Command::Serve { address, port } => serve(config, address, port).await,
        Command::Export {
            output,
            modes,
            periods,
            purposes,
            incomes,
        } => {
            let modes = match modes {
                Some(list) => modes_from_arg(&list)?,
                None => config.initial_mode_selection(),
            };
            let facets =
                facets_from_args(periods.as_deref(), purposes.as_deref(), incomes.as_deref())?;
            export(config, output, modes, facets).await
        }
    }
}
