use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// The buffer ends before the path ids announced by the hop count.
    #[error("malformed INT header: need {needed} bytes, got {available}")]
    MalformedHeader { needed: usize, available: usize },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("corrupt result fragment '{}': {source}", .path.display())]
    CorruptFragment {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("time span of {span}s does not fit into {max_bins} bins of {resolution}s")]
    TimeSpanTooLong {
        span: f64,
        resolution: f64,
        max_bins: usize,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
