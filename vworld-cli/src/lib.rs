//! Command-line interface for downloading VWorld administrative layers.
#![forbid(unsafe_code)]

mod error;
mod registry;

use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use vworld_core::LayerSpec;
use vworld_wfs::{
    RetrievalConfig, WfsClient, WfsClientConfig, materialise_layer, write_layer_parquet,
};

pub use error::CliError;
pub use registry::LayerRegistry;

/// Run the VWorld CLI with the current process arguments.
///
/// # Errors
///
/// Returns a [`CliError`] when argument parsing, setup, or any layer
/// download fails; individual layer failures do not stop the remaining
/// layers.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    let registry = LayerRegistry::vworld();
    match cli.command {
        Command::Layers => {
            list_layers(&registry);
            Ok(())
        }
        Command::Fetch(args) => run_fetch(&args, &registry),
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "vworld",
    about = "Download VWorld administrative layers as GeoParquet",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List the layers the registry knows about.
    Layers,
    /// Download one or more layers into GeoParquet files.
    Fetch(FetchArgs),
}

/// CLI arguments for the `fetch` subcommand.
#[derive(Debug, Clone, Parser)]
struct FetchArgs {
    /// Layers to download; defaults to every registered layer.
    #[arg(long = "layer", value_name = "name")]
    layers: Vec<String>,
    /// Directory receiving one `<layer>.parquet` file per layer.
    #[arg(long, value_name = "dir", default_value = "output/WFS")]
    output_dir: Utf8PathBuf,
    /// VWorld API key.
    #[arg(long, env = "VWORLD_API_KEY", value_name = "key", hide_env_values = true)]
    api_key: String,
    /// WFS endpoint base URL.
    #[arg(long, value_name = "url", default_value = vworld_wfs::client::DEFAULT_BASE_URL)]
    endpoint: String,
}

fn list_layers(registry: &LayerRegistry) {
    println!("available layers:");
    for layer in registry.iter() {
        let identity = layer.id_attribute.as_deref().unwrap_or("feature id");
        println!("  {}: {} (identity: {})", layer.name, layer.type_name, identity);
    }
}

fn run_fetch(args: &FetchArgs, registry: &LayerRegistry) -> Result<(), CliError> {
    let targets = select_layers(args, registry)?;

    std::fs::create_dir_all(args.output_dir.as_std_path()).map_err(|source| {
        CliError::CreateOutputDir {
            source,
            path: args.output_dir.clone(),
        }
    })?;

    let client = WfsClient::with_config(
        WfsClientConfig::new(args.endpoint.clone()).with_api_key(args.api_key.clone()),
    )?;
    let retrieval = RetrievalConfig::default();

    let attempted = targets.len();
    let mut failed = 0usize;
    for spec in targets {
        if let Err(err) = download_one(&client, spec, registry, &retrieval, &args.output_dir) {
            log::error!("layer {}: {err}", spec.name);
            failed += 1;
        }
    }

    println!("done: {} succeeded, {failed} failed", attempted - failed);
    if failed > 0 {
        return Err(CliError::LayersFailed { failed, attempted });
    }
    Ok(())
}

/// Resolve the requested layer names, warning on unknown names the way
/// the registry listing suggests fixing them.
fn select_layers<'a>(
    args: &FetchArgs,
    registry: &'a LayerRegistry,
) -> Result<Vec<&'a LayerSpec>, CliError> {
    let targets: Vec<&LayerSpec> = if args.layers.is_empty() {
        registry.iter().collect()
    } else {
        args.layers
            .iter()
            .filter_map(|name| {
                let found = registry.get(name);
                if found.is_none() {
                    log::warn!("unknown layer {name}; skipping (use `vworld layers` for the list)");
                }
                found
            })
            .collect()
    };
    if targets.is_empty() {
        return Err(CliError::NoLayers);
    }
    Ok(targets)
}

/// One layer end to end: retrieve, materialise, persist, report.
fn download_one(
    client: &WfsClient,
    spec: &LayerSpec,
    registry: &LayerRegistry,
    retrieval: &RetrievalConfig,
    output_dir: &Utf8PathBuf,
) -> Result<(), LayerDownloadError> {
    log::info!("layer {}: downloading {}", spec.name, spec.type_name);
    let fetch = client.download_layer(spec, Some(registry.default_extent()), retrieval)?;
    let dataset = materialise_layer(spec, fetch);

    if dataset.summary.is_partial() {
        log::warn!(
            "layer {}: dataset is incomplete; {} regions overflowed at minimum extent",
            spec.name,
            dataset.summary.partial_regions.len()
        );
    }
    if dataset.summary.attribute_mismatches > 0 {
        log::warn!(
            "layer {}: {} duplicate returns carried differing attributes",
            spec.name,
            dataset.summary.attribute_mismatches
        );
    }

    let path = output_dir.join(format!("{}.parquet", dataset.name));
    write_layer_parquet(&dataset, path.as_std_path())?;
    println!(
        "{}: {} features -> {path}",
        dataset.name,
        dataset.len()
    );
    Ok(())
}

/// Failure of a single layer's download; reported, then the run
/// continues with the next layer.
#[derive(Debug, thiserror::Error)]
enum LayerDownloadError {
    #[error(transparent)]
    Retrieval(#[from] vworld_wfs::RetrievalError),
    #[error(transparent)]
    Write(#[from] vworld_wfs::DatasetWriteError),
}
