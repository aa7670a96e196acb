mod line;
mod transform;

pub use line::{LinePipeline, Segments};
pub use transform::WordTransform;

/// Maximum length of a line; longer input is consumed in segments of
/// `MAX_LINE_LEN - 1` bytes, each segment treated as its own line.
pub const MAX_LINE_LEN: usize = 10240;
/// Maximum number of words in one line; the rest is dropped.
pub const MAX_WORDS: usize = 512;
