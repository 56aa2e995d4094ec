use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures that end the processing of a single script.
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("could not open the project owning {}; is it fully loaded?", .script.display())]
    ProjectNotLoaded { script: PathBuf },

    #[error("no project owns {}", .script.display())]
    ProjectNotFound { script: PathBuf },

    #[error("reading {}: {source}", .path.display())]
    ReadScript {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("writing {}: {source}", .path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
