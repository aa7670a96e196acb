use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use logcluster_rs::{Config, Engine, OutputMode, DEF_INIT_SEED, DEF_SEPARATOR, DEF_WORD_TABLE_SIZE};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// Find clusters (line patterns) that match at least SUPPORT lines in the
/// input files. Each pattern consists of frequent word constants and
/// variable-length wildcards, e.g. `Interface *{1,1} down`.
#[derive(Debug, Parser)]
#[command(name = "logcluster", version)]
struct Opt {
    /// Support threshold: an absolute line count, or a percentage like '0.1%'
    #[arg(short = 's', long, value_name = "SUPPORT")]
    support: Option<String>,

    /// Support threshold as a percentage of the total number of input lines
    #[arg(long, value_name = "PCT")]
    rsupport: Option<f64>,

    /// Input file or glob pattern; may be given multiple times
    #[arg(long = "input", value_name = "FILE")]
    input: Vec<String>,

    /// Word separator regular expression
    #[arg(short = 'd', long, value_name = "REGEXP", default_value = DEF_SEPARATOR)]
    separator: String,

    /// Ignore the first N bytes of every line
    #[arg(short = 'b', long, value_name = "N", default_value_t = 0)]
    byteoffset: usize,

    /// Cluster only the lines matching this regular expression
    #[arg(short = 'f', long, value_name = "REGEXP")]
    lfilter: Option<String>,

    /// Template with match variables ($2, ${ip}, ...), applied to lines
    /// accepted by --lfilter
    #[arg(short = 't', long, value_name = "TEMPLATE")]
    template: Option<String>,

    /// Enable the word sketch with N counters
    #[arg(short = 'v', long, value_name = "N")]
    wsize: Option<u64>,

    /// Enable the cluster candidate sketch with N counters
    #[arg(short = 'c', long, value_name = "N")]
    csize: Option<u64>,

    /// Aggregate supports of more specific cluster candidates
    #[arg(short = 'a', long)]
    aggrsup: bool,

    /// Enable cluster joining with the given word weight threshold
    #[arg(long, value_name = "THRESHOLD")]
    wweight: Option<f64>,

    /// Word weight function: 1 or 2
    #[arg(long, value_name = "N", default_value_t = 1)]
    weightf: u8,

    /// Word transform filter regular expression
    #[arg(long, value_name = "REGEXP")]
    wfilter: Option<String>,

    /// Word transform search regular expression
    #[arg(long, value_name = "REGEXP")]
    wsearch: Option<String>,

    /// Word transform replacement string
    #[arg(long, value_name = "STRING")]
    wreplace: Option<String>,

    /// Write lines that match no cluster into this file
    #[arg(short = 'o', long, value_name = "FILE")]
    outliers: Option<PathBuf>,

    /// Number of slots in the vocabulary hash table
    #[arg(short = 'w', long, value_name = "N", default_value_t = DEF_WORD_TABLE_SIZE)]
    wtablesize: u64,

    /// Seed of the random number generator that derives the hash seeds
    #[arg(short = 'i', long, value_name = "N", default_value_t = DEF_INIT_SEED)]
    initseed: u64,

    /// Output mode: 0 sorts clusters by support, 1 by number of constants
    #[arg(long, value_name = "MODE", num_args = 0..=1, default_value_t = 0, default_missing_value = "1")]
    outputmode: u8,

    /// Always parenthesize token positions, even single-word ones
    #[arg(long)]
    detailtoken: bool,
}

impl Opt {
    fn into_config(self) -> anyhow::Result<Config> {
        let mut support = 0u64;
        let mut rel_support = self.rsupport.unwrap_or(0.0);
        if let Some(given) = &self.support {
            if let Some(pct) = given.strip_suffix('%') {
                rel_support = pct
                    .parse()
                    .context("'-s' or '--support' option requires a number as parameter")?;
            } else {
                support = given
                    .parse()
                    .context("'-s' or '--support' option requires a number as parameter")?;
            }
        }
        let output_mode = match self.outputmode {
            0 => OutputMode::BySupport,
            1 => OutputMode::ByConstants,
            _ => anyhow::bail!("'--outputmode' option requires a valid number: 0 or 1"),
        };
        let mut inputs: Vec<PathBuf> = Vec::new();
        for pattern in &self.input {
            // A pattern matching nothing is kept as a literal path.
            let mut matched = false;
            if let Ok(paths) = glob::glob(pattern) {
                for path in paths.flatten() {
                    matched = true;
                    inputs.push(path);
                }
            }
            if !matched {
                inputs.push(PathBuf::from(pattern));
            }
        }
        Ok(Config {
            support,
            rel_support,
            inputs,
            separator: self.separator,
            byte_offset: self.byteoffset,
            line_filter: self.lfilter,
            template: self.template,
            word_sketch_size: self.wsize.unwrap_or(0),
            cluster_sketch_size: self.csize.unwrap_or(0),
            aggregate_supports: self.aggrsup,
            word_weight_threshold: self.wweight.unwrap_or(0.0),
            word_weight_function: self.weightf,
            word_filter: self.wfilter,
            word_search: self.wsearch,
            word_replace: self.wreplace,
            outliers: self.outliers,
            word_table_size: self.wtablesize,
            init_seed: self.initseed,
            output_mode,
            detail_token: self.detailtoken,
        })
    }
}

fn main() -> anyhow::Result<()> {
    let opt = Opt::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let config = opt.into_config()?;
    let mut engine = Engine::new(config)?;

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    engine.run(&mut out)?;
    out.flush()?;
    Ok(())
}
