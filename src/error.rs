use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures surfaced by the engine.
///
/// Configuration errors are reported before any pass runs. I/O errors on
/// individual input files are not represented here: unreadable inputs are
/// logged and skipped so that the remaining files can still be mined.
#[derive(Debug, Error)]
pub enum Error {
    #[error("'-s', '--support' or '--rsupport' option requires a positive number as parameter")]
    SupportNotPositive,
    #[error("no input files specified")]
    NoInputFiles,
    #[error("'-i' or '--initseed' option requires a positive number as parameter")]
    InitSeedZero,
    #[error("'-w' or '--wtablesize' option requires a positive number as parameter")]
    WordTableSizeZero,
    #[error("bad regular expression given with {option} option: {source}")]
    BadRegex {
        option: &'static str,
        #[source]
        source: regex::Error,
    },
    #[error("if you set '--wfilter', '--wsearch' and '--wreplace' must be set as well")]
    IncompleteTransform,
    #[error("'--wweight' option requires a valid number: 0 < number <= 1")]
    WeightThresholdOutOfRange,
    #[error("'--weightf' option requires a valid number: 1 or 2")]
    WeightFunctionOutOfRange,
    #[error("'--csize' option can not be used together with '--aggrsup' option")]
    SketchWithAggregation,
    #[error("can't open outliers file {path}: {source}")]
    OutlierFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Io(#[from] io::Error),
}
