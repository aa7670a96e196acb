mod aggregate;
mod candidate;
mod config;
mod emit;
mod engine;
mod error;
mod join;
mod matrix;
mod outlier;
mod process;
mod sketch;
mod table;
mod util;
mod vocabulary;

pub use config::{Config, OutputMode, DEF_INIT_SEED, DEF_SEPARATOR, DEF_WORD_TABLE_SIZE};
pub use engine::{Engine, RunStats};
pub use error::Error;
pub use process::{LinePipeline, Segments, WordTransform, MAX_LINE_LEN, MAX_WORDS};
pub use sketch::Sketch;
pub use table::{seeded_hash, ElemTable};
