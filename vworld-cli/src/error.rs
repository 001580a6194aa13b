//! Error types emitted by the VWorld CLI.

use camino::Utf8PathBuf;
use thiserror::Error;
use vworld_wfs::ClientBuildError;

/// Errors emitted by the VWorld CLI.
///
/// Per-layer retrieval failures are not listed here: they are reported
/// as they happen and folded into [`CliError::LayersFailed`] so the
/// remaining layers still run.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// No requested layer resolved against the registry.
    #[error("no layers selected for download (use `vworld layers` for the list)")]
    NoLayers,
    /// The WFS client could not be constructed.
    #[error(transparent)]
    Client(#[from] ClientBuildError),
    /// The output directory could not be created.
    #[error("failed to create output directory {path}: {source}")]
    CreateOutputDir {
        /// Underlying IO error.
        source: std::io::Error,
        /// Directory that could not be created.
        path: Utf8PathBuf,
    },
    /// One or more layers failed to download completely.
    #[error("{failed} of {attempted} layers failed to download")]
    LayersFailed {
        /// Layers that ended in a fatal error.
        failed: usize,
        /// Layers attempted in this run.
        attempted: usize,
    },
}
