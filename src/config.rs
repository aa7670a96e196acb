use std::path::PathBuf;

use crate::error::Error;

/// Default slot count of the vocabulary hash table.
pub const DEF_WORD_TABLE_SIZE: u64 = 100_000;
/// Default seed for the master PRNG that derives the per-table hash seeds.
pub const DEF_INIT_SEED: u64 = 1;
/// Default word separator. Tab is not considered a separator.
pub const DEF_SEPARATOR: &str = "[ ]+";

/// Ordering of the emitted clusters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// Descending support (mode 0). With joining active, unjoined and joined
    /// clusters participate in one merged ordering.
    #[default]
    BySupport,
    /// Ascending number of constants (mode 1), insertion order within each
    /// bucket. With joining active, unjoined and joined clusters are printed
    /// as two separate sections.
    ByConstants,
}

/// Run configuration for the clustering [Engine](crate::Engine).
///
/// Mirrors the command line surface: a `Default` value carries the documented
/// defaults, and a run needs at least `inputs` plus one of `support` /
/// `rel_support` filled in. Optional heuristics are enabled by their
/// parameter being non-zero / `Some`.
///
/// # Example
///
/// ```
/// use logcluster_rs::Config;
///
/// let config = Config {
///     support: 2,
///     inputs: vec!["messages.log".into()],
///     ..Config::default()
/// };
/// assert_eq!(config.word_table_size, 100_000);
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// Absolute support threshold. `0` means "derive from `rel_support`".
    pub support: u64,
    /// Relative support as a percentage of the total line count, resolved
    /// after the first pass. `0.0` means unused.
    pub rel_support: f64,
    /// Input files, processed in the order given.
    pub inputs: Vec<PathBuf>,
    /// Word separator regular expression.
    pub separator: String,
    /// Number of bytes dropped from the front of every line.
    pub byte_offset: usize,
    /// Line filter regular expression; non-matching lines are skipped.
    pub line_filter: Option<String>,
    /// Template expanded against the line filter captures; the expansion
    /// becomes the working line. Meaningful only with `line_filter`.
    pub template: Option<String>,
    /// Word sketch modulus; `0` disables the word sketch pass.
    pub word_sketch_size: u64,
    /// Cluster sketch modulus; `0` disables the cluster sketch pass.
    /// Mutually exclusive with `aggregate_supports`.
    pub cluster_sketch_size: u64,
    /// Enable support aggregation over the prefix trie.
    pub aggregate_supports: bool,
    /// Word weight threshold in `(0, 1]`; `0.0` disables cluster joining.
    pub word_weight_threshold: f64,
    /// Word weight function, `1` or `2`.
    pub word_weight_function: u8,
    /// Word transform: filter regular expression.
    pub word_filter: Option<String>,
    /// Word transform: search regular expression.
    pub word_search: Option<String>,
    /// Word transform: replacement string.
    pub word_replace: Option<String>,
    /// Outlier file path; `None` skips the outlier pass.
    pub outliers: Option<PathBuf>,
    /// Slot count of the vocabulary hash table.
    pub word_table_size: u64,
    /// Seed of the master PRNG.
    pub init_seed: u64,
    /// Cluster output ordering.
    pub output_mode: OutputMode,
    /// Always parenthesize token positions, even single-word ones.
    pub detail_token: bool,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            support: 0,
            rel_support: 0.0,
            inputs: Vec::new(),
            separator: DEF_SEPARATOR.to_owned(),
            byte_offset: 0,
            line_filter: None,
            template: None,
            word_sketch_size: 0,
            cluster_sketch_size: 0,
            aggregate_supports: false,
            word_weight_threshold: 0.0,
            word_weight_function: 1,
            word_filter: None,
            word_search: None,
            word_replace: None,
            outliers: None,
            word_table_size: DEF_WORD_TABLE_SIZE,
            init_seed: DEF_INIT_SEED,
            output_mode: OutputMode::BySupport,
            detail_token: false,
        }
    }
}

impl Config {
    /// Checks every constraint that can be verified without touching the
    /// input files. Regex patterns are compiled separately when the engine
    /// is built; this only covers the numeric and combination rules.
    pub fn validate(&self) -> Result<(), Error> {
        if self.support == 0 && self.rel_support <= 0.0 {
            return Err(Error::SupportNotPositive);
        }
        if self.inputs.is_empty() {
            return Err(Error::NoInputFiles);
        }
        if self.init_seed == 0 {
            return Err(Error::InitSeedZero);
        }
        if self.word_table_size == 0 {
            return Err(Error::WordTableSizeZero);
        }
        if self.word_filter.is_some() && (self.word_search.is_none() || self.word_replace.is_none())
        {
            return Err(Error::IncompleteTransform);
        }
        if self.word_weight_threshold < 0.0 || self.word_weight_threshold > 1.0 {
            return Err(Error::WeightThresholdOutOfRange);
        }
        if self.word_weight_function != 1 && self.word_weight_function != 2 {
            return Err(Error::WeightFunctionOutOfRange);
        }
        if self.cluster_sketch_size != 0 && self.aggregate_supports {
            return Err(Error::SketchWithAggregation);
        }
        Ok(())
    }

    /// Whether the cluster joining heuristic is active.
    pub(crate) fn joining(&self) -> bool {
        self.word_weight_threshold > 0.0
    }
}
