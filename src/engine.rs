use std::fs::File;
use std::io::{BufReader, Write};
use std::path::Path;

use rand::rngs::SmallRng;
use rand::{RngCore, SeedableRng};
use tracing::{error, info};

use crate::candidate::{Candidate, Family};
use crate::config::Config;
use crate::error::Error;
use crate::join::JoinedCandidate;
use crate::matrix::DepMatrix;
use crate::process::{LinePipeline, Segments, WordTransform};
use crate::table::ElemTable;
use crate::util::fmt::group_digits;

/// Per-structure hash seeds, drawn from the master PRNG in a fixed order so
/// that a given `initseed` always reproduces the same run.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Seeds {
    pub(crate) word_table: u64,
    pub(crate) word_sketch: u64,
    pub(crate) cluster_sketch: u64,
    pub(crate) cluster_table: u64,
    pub(crate) prefix: u64,
}

impl Seeds {
    fn derive(rng: &mut SmallRng) -> Seeds {
        Seeds {
            word_table: rng.next_u32() as u64,
            word_sketch: rng.next_u32() as u64,
            cluster_sketch: rng.next_u32() as u64,
            cluster_table: rng.next_u32() as u64,
            prefix: rng.next_u32() as u64,
        }
    }
}

/// Counters reported by [Engine::run].
#[derive(Debug, Default, Clone)]
pub struct RunStats {
    pub lines: u64,
    pub support: u64,
    pub vocabulary_words: u64,
    pub frequent_words: u32,
    pub candidates: u64,
    pub clusters: u64,
    pub joined_input: u64,
    pub joined_output: u64,
    pub outliers: Option<u64>,
}

/// The clustering engine: a fixed sequence of passes over the input files
/// that mines line patterns made of frequent words and variable-length gaps.
///
/// The pipeline is single threaded and synchronous. Files are processed in
/// the order configured, lines in file order, and each optional heuristic
/// (sketches, support aggregation, cluster joining, outlier detection) hooks
/// into its fixed place in the chain.
///
/// # Example
///
/// ```
/// use logcluster_rs::{Config, Engine};
///
/// let config = Config {
///     support: 2,
///     inputs: vec!["messages.log".into()],
///     ..Config::default()
/// };
/// let engine = Engine::new(config).unwrap();
/// # let _ = engine;
/// ```
pub struct Engine {
    pub(crate) cfg: Config,
    pub(crate) pipeline: LinePipeline,
    pub(crate) transform: Option<WordTransform>,
    pub(crate) rng: SmallRng,
    pub(crate) seeds: Seeds,
    pub(crate) support: u64,
    pub(crate) line_count: u64,
    pub(crate) words: ElemTable,
    pub(crate) freq_words: u32,
    pub(crate) candidates: Vec<Candidate>,
    pub(crate) family: Family,
    pub(crate) matrix: Option<DepMatrix>,
    pub(crate) joined: Vec<JoinedCandidate>,
    pub(crate) joined_family: Family,
    pub(crate) joined_input: u64,
    pub(crate) joined_output: u64,
    pub(crate) cluster_count: u64,
    pub(crate) token: Vec<u8>,
}

impl Engine {
    /// Validates the configuration, compiles its regular expressions and
    /// derives the hash seeds. No input file is touched yet.
    pub fn new(cfg: Config) -> Result<Engine, Error> {
        cfg.validate()?;
        let pipeline = LinePipeline::new(
            &cfg.separator,
            cfg.byte_offset,
            cfg.line_filter.as_deref(),
            cfg.template.as_deref(),
        )?;
        let transform = match (&cfg.word_filter, &cfg.word_search, &cfg.word_replace) {
            (Some(filter), Some(search), Some(replace)) => {
                Some(WordTransform::new(filter, search, replace)?)
            }
            _ => None,
        };
        let mut rng = SmallRng::seed_from_u64(cfg.init_seed);
        let seeds = Seeds::derive(&mut rng);
        let words = ElemTable::new(cfg.word_table_size, seeds.word_table);
        let support = cfg.support;
        Ok(Engine {
            cfg,
            pipeline,
            transform,
            rng,
            seeds,
            support,
            line_count: 0,
            words,
            freq_words: 0,
            candidates: Vec::new(),
            family: Family::new(),
            matrix: None,
            joined: Vec::new(),
            joined_family: Family::new(),
            joined_input: 0,
            joined_output: 0,
            cluster_count: 0,
            token: b"token".to_vec(),
        })
    }

    /// Runs the full pipeline, writing the cluster listing to `out`.
    ///
    /// An engine carries the state of one run; build a fresh engine to mine
    /// another input set.
    pub fn run<W: Write>(&mut self, out: &mut W) -> Result<RunStats, Error> {
        info!("starting");

        let word_sketch = if self.cfg.word_sketch_size > 0 {
            Some(self.word_sketch_pass()?)
        } else {
            None
        };
        let vocabulary_words = self.vocabulary_pass(word_sketch.as_ref())?;
        drop(word_sketch);

        info!("finding frequent words from vocabulary");
        self.freq_words = self.sweep_frequent_words(vocabulary_words);

        let mut stats = RunStats {
            lines: self.line_count,
            support: self.support,
            vocabulary_words,
            frequent_words: self.freq_words,
            ..RunStats::default()
        };
        if self.freq_words == 0 {
            return Ok(stats);
        }

        let cluster_sketch = if self.cfg.cluster_sketch_size > 0 {
            Some(self.cluster_sketch_pass()?)
        } else {
            None
        };
        let mut clusters = self.candidate_pass(cluster_sketch.as_ref())?;
        drop(cluster_sketch);
        stats.candidates = self.family.len();

        if self.cfg.aggregate_supports {
            self.aggregate_supports(&mut clusters);
        }

        info!("finding clusters");
        self.cluster_count = self.select_clusters();
        info!("{} clusters were found", group_digits(self.cluster_count));
        stats.clusters = self.cluster_count;

        if self.cfg.joining() {
            self.join_clusters(&mut clusters);
            stats.joined_input = self.joined_input;
            stats.joined_output = self.joined_output;
        }

        if self.cluster_count > 0 {
            self.print_clusters(out)?;
        }

        if let Some(path) = self.cfg.outliers.clone() {
            info!("finding outliers");
            let outliers = self.outlier_pass(&mut clusters, &path)?;
            info!(
                "{} outliers were written into file {}",
                group_digits(outliers),
                path.display()
            );
            stats.outliers = Some(outliers);
        }

        Ok(stats)
    }

    /// Remembers the line count of the first pass and resolves a relative
    /// support into the absolute threshold.
    pub(crate) fn resolve_support(&mut self, lines: u64) {
        if self.line_count == 0 {
            self.line_count = lines;
        }
        if self.support == 0 {
            self.support = (self.line_count as f64 * self.cfg.rel_support / 100.0).ceil() as u64;
        }
    }

    /// Opens one input file; failures are logged and the file is skipped.
    pub(crate) fn open_input(path: &Path) -> Option<Segments<BufReader<File>>> {
        match File::open(path) {
            Ok(file) => Some(Segments::new(BufReader::new(file))),
            Err(err) => {
                error!("can't open input file {}: {}", path.display(), err);
                None
            }
        }
    }
}
