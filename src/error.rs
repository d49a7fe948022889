use std::path::PathBuf;

/// Errors raised while reading corpora from disk.
#[derive(thiserror::Error, Debug)]
pub enum CorpusError {
    #[error("cannot open corpus file {path:?}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("read error in corpus file {path:?} at line {line}: {source}")]
    Read {
        path: PathBuf,
        line: usize,
        #[source]
        source: std::io::Error,
    },
    #[error("corpus file {path:?} contains no usable sentences")]
    Empty { path: PathBuf },
}

/// Errors raised while parsing CLI flags and building a runnable configuration.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("unknown subcommand {0:?}, expected one of: lm, ws, wsTest")]
    UnknownSubcommand(String),
    #[error("unknown flag {0:?}")]
    UnknownFlag(String),
    #[error("flag {flag} is missing its value")]
    MissingValue { flag: String },
    #[error("flag {flag} has invalid value {value:?}: {reason}")]
    InvalidValue {
        flag: String,
        value: String,
        reason: String,
    },
    #[error("flag {flag} value {value} is out of range ({reason})")]
    OutOfRange {
        flag: String,
        value: String,
        reason: String,
    },
    #[error("missing required input file")]
    MissingInput,
}

/// Errors raised while saving or loading serialized model state.
#[derive(thiserror::Error, Debug)]
pub enum PersistError {
    #[error("cannot open model file {path:?}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Top-level error returned by the `lm`/`ws`/`wsTest` training and decoding
/// entry points, unifying the I/O-boundary error taxonomy above.
#[derive(thiserror::Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Corpus(#[from] CorpusError),
    #[error(transparent)]
    Persist(#[from] PersistError),
    #[error("cannot write decoded output to {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
