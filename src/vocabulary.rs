use tracing::{debug, info};

use crate::engine::Engine;
use crate::error::Error;
use crate::sketch::Sketch;
use crate::table::ElemTable;
use crate::util::fmt::group_digits;

#[derive(Debug, Default)]
struct WordFreqStat {
    ones: u64,
    twos: u64,
    fives: u64,
    tens: u64,
    twenties: u64,
}

/// Counts `key` at most once per line: a repeated sighting takes the
/// just-applied increment back.
fn count_once(words: &mut ElemTable, seen: &mut Vec<u32>, key: &[u8]) {
    let idx = words.insert(key);
    if seen.contains(&idx) {
        words.entry_mut(idx).count -= 1;
    } else {
        seen.push(idx);
    }
}

impl Engine {
    /// Optional first pass: counts word occurrences into a fixed-size
    /// sketch, so the vocabulary pass can refuse to materialize words that
    /// cannot reach the support threshold.
    pub(crate) fn word_sketch_pass(&mut self) -> Result<Sketch, Error> {
        info!("creating the word sketch");
        let mut sketch = Sketch::new(self.cfg.word_sketch_size, self.seeds.word_sketch);
        let mut tokens: Vec<Vec<u8>> = Vec::new();
        let mut lines = 0u64;
        let transform = self.transform.as_ref();
        for path in &self.cfg.inputs {
            let Some(mut segments) = Engine::open_input(path) else {
                continue;
            };
            while let Some(seg) = segments.next_segment()? {
                self.pipeline.tokenize(seg, &mut tokens);
                for tok in &tokens {
                    if tok.is_empty() {
                        continue;
                    }
                    // Unlike the vocabulary, the sketch counts per occurrence.
                    sketch.bump(tok);
                    if let Some(tr) = transform {
                        if tr.applies(tok) {
                            sketch.bump(&tr.rewrite(tok));
                        }
                    }
                }
                lines += 1;
            }
        }
        self.resolve_support(lines);
        debug!(
            "{} slots in the word sketch >= support threshold",
            group_digits(sketch.slots_at_least(self.support))
        );
        Ok(sketch)
    }

    /// Builds the vocabulary: exact per-line word counts, optionally gated
    /// by the word sketch. Returns the number of words materialized.
    pub(crate) fn vocabulary_pass(&mut self, sketch: Option<&Sketch>) -> Result<u64, Error> {
        info!("creating vocabulary");
        let mut tokens: Vec<Vec<u8>> = Vec::new();
        let mut seen: Vec<u32> = Vec::new();
        let mut lines = 0u64;
        let support_gate = self.support;
        {
            let Engine {
                cfg,
                pipeline,
                transform,
                words,
                ..
            } = self;
            let transform = transform.as_ref();
            for path in &cfg.inputs {
                let Some(mut segments) = Engine::open_input(path) else {
                    continue;
                };
                while let Some(seg) = segments.next_segment()? {
                    pipeline.tokenize(seg, &mut tokens);
                    seen.clear();
                    for tok in &tokens {
                        if tok.is_empty() {
                            continue;
                        }
                        match sketch {
                            Some(sk) => {
                                if sk.estimate(tok) >= support_gate {
                                    count_once(words, &mut seen, tok);
                                }
                                if let Some(tr) = transform {
                                    if tr.applies(tok) {
                                        let synthetic = tr.rewrite(tok);
                                        if sk.estimate(&synthetic) >= support_gate {
                                            count_once(words, &mut seen, &synthetic);
                                        }
                                    }
                                }
                            }
                            None => {
                                count_once(words, &mut seen, tok);
                                if let Some(tr) = transform {
                                    if tr.applies(tok) {
                                        count_once(words, &mut seen, &tr.rewrite(tok));
                                    }
                                }
                            }
                        }
                    }
                    lines += 1;
                }
            }
        }
        self.resolve_support(lines);
        let total = self.words.len() as u64;
        debug!(
            "{} words were inserted into the vocabulary",
            group_digits(total)
        );
        Ok(total)
    }

    /// Evicts words below the support threshold and renumbers the survivors
    /// densely, so the ids stay usable as matrix coordinates.
    pub(crate) fn sweep_frequent_words(&mut self, total: u64) -> u32 {
        let mut stat = WordFreqStat::default();
        for count in self.words.counts() {
            if count == 1 {
                stat.ones += 1;
            }
            if count <= 2 {
                stat.twos += 1;
            }
            if count <= 5 {
                stat.fives += 1;
            }
            if count <= 10 {
                stat.tens += 1;
            }
            if count <= 20 {
                stat.twenties += 1;
            }
        }
        let frequent = self.words.sweep_below(self.support);
        info!("{} frequent words were found", group_digits(frequent.into()));
        if frequent == 0 || total == 0 {
            return frequent;
        }
        let pct = |part: u64| (part as f64 / total as f64) * 100.0;
        debug!(
            "{:.0}% - {} words in vocabulary occur 1 time",
            pct(stat.ones),
            group_digits(stat.ones)
        );
        debug!(
            "{:.0}% - {} words in vocabulary occur 2 times or less",
            pct(stat.twos),
            group_digits(stat.twos)
        );
        debug!(
            "{:.0}% - {} words in vocabulary occur 5 times or less",
            pct(stat.fives),
            group_digits(stat.fives)
        );
        debug!(
            "{:.0}% - {} words in vocabulary occur 10 times or less",
            pct(stat.tens),
            group_digits(stat.tens)
        );
        debug!(
            "{:.0}% - {} words in vocabulary occur 20 times or less",
            pct(stat.twenties),
            group_digits(stat.twenties)
        );
        debug!(
            "{:.2}% - {} words in vocabulary occur less than {} (support) times",
            pct(total - frequent as u64),
            group_digits(total - frequent as u64),
            self.support
        );
        frequent
    }
}
