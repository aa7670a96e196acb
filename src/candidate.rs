use tracing::{debug, info};

use crate::engine::Engine;
use crate::error::Error;
use crate::matrix::DepMatrix;
use crate::process::WordTransform;
use crate::sketch::Sketch;
use crate::table::{ElemTable, NONE};
use crate::util::fmt::group_digits;

/// Separator byte between word keys in a candidate identity key.
pub(crate) const CLUSTER_SEP: u8 = b'\n';

/// Inclusive bounds on the number of variable words in one gap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Gap {
    pub(crate) min: u32,
    pub(crate) max: u32,
}

impl Gap {
    fn exact(n: u32) -> Gap {
        Gap { min: n, max: n }
    }

    pub(crate) fn widen(&mut self, n: u32) {
        if n < self.min {
            self.min = n;
        } else if n > self.max {
            self.max = n;
        }
    }

    /// Union of two bound pairs.
    pub(crate) fn merge(&mut self, other: Gap) {
        if other.min < self.min {
            self.min = other.min;
        }
        if other.max > self.max {
            self.max = other.max;
        }
    }
}

/// A cluster candidate: an ordered sequence of frequent words with the
/// observed wildcard bounds around them.
///
/// `words` holds word-arena indices; `gaps[i]` bounds the variable run in
/// front of `words[i]`, `tail` the run after the last word. `entry` links
/// back to the candidate's cluster-table entry, whose count doubles as the
/// staging counter during support aggregation.
#[derive(Debug)]
pub(crate) struct Candidate {
    pub(crate) words: Vec<u32>,
    pub(crate) gaps: Vec<Gap>,
    pub(crate) tail: Gap,
    pub(crate) count: u64,
    pub(crate) entry: u32,
    pub(crate) last_node: u32,
    pub(crate) joined: bool,
}

impl Candidate {
    fn from_scan(scan: &LineScan, entry: u32) -> Candidate {
        Candidate {
            words: scan.constants.clone(),
            gaps: scan.gaps.iter().map(|&n| Gap::exact(n)).collect(),
            tail: Gap::exact(scan.tail),
            count: 0,
            entry,
            last_node: NONE,
            joined: false,
        }
    }

    /// One more occurrence: bump the count and widen every gap.
    fn absorb(&mut self, scan: &LineScan) {
        self.count += 1;
        for (gap, &n) in self.gaps.iter_mut().zip(&scan.gaps) {
            gap.widen(n);
        }
        self.tail.widen(scan.tail);
    }
}

/// Candidates bucketed by their number of constants. Iteration covers only
/// `1..=biggest`, never a fixed capacity.
#[derive(Debug, Default)]
pub(crate) struct Family {
    buckets: Vec<Vec<u32>>,
}

impl Family {
    pub(crate) fn new() -> Family {
        Family::default()
    }

    pub(crate) fn push(&mut self, constants: usize, ci: u32) {
        if self.buckets.len() <= constants {
            self.buckets.resize_with(constants + 1, Vec::new);
        }
        self.buckets[constants].push(ci);
    }

    pub(crate) fn biggest(&self) -> usize {
        self.buckets.len().saturating_sub(1)
    }

    pub(crate) fn bucket(&self, constants: usize) -> &[u32] {
        self.buckets.get(constants).map_or(&[], |b| b.as_slice())
    }

    /// All candidates, ascending by constant count, insertion order within
    /// a bucket.
    pub(crate) fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.buckets.iter().flat_map(|b| b.iter().copied())
    }

    pub(crate) fn len(&self) -> u64 {
        self.buckets.iter().map(|b| b.len() as u64).sum()
    }

    pub(crate) fn retain(&mut self, mut keep: impl FnMut(u32) -> bool) {
        for bucket in &mut self.buckets {
            bucket.retain(|&ci| keep(ci));
        }
    }
}

/// Per-line scan result: the candidate identity key plus the constant and
/// gap layout that produced it.
#[derive(Debug, Default)]
pub(crate) struct LineScan {
    pub(crate) key: Vec<u8>,
    pub(crate) constants: Vec<u32>,
    pub(crate) gaps: Vec<u32>,
    pub(crate) tail: u32,
}

impl LineScan {
    fn clear(&mut self) {
        self.key.clear();
        self.constants.clear();
        self.gaps.clear();
        self.tail = 0;
    }
}

/// Maps one tokenized line onto its candidate key: every token found in the
/// vocabulary (directly, or through the word transform) becomes a constant,
/// everything else extends the running variable gap.
pub(crate) fn scan_tokens(
    words: &mut ElemTable,
    transform: Option<&WordTransform>,
    tokens: &[Vec<u8>],
    scan: &mut LineScan,
) {
    scan.clear();
    let mut variables = 0u32;
    for tok in tokens {
        let direct = if tok.is_empty() {
            None
        } else {
            words.find(tok)
        };
        if let Some(idx) = direct {
            push_constant(scan, tok, idx, &mut variables);
        } else if let Some(tr) = transform.filter(|tr| tr.applies(tok)) {
            let synthetic = tr.rewrite(tok);
            match (!tok.is_empty()).then(|| words.find(&synthetic)).flatten() {
                Some(idx) => push_constant(scan, &synthetic, idx, &mut variables),
                None => variables += 1,
            }
        } else {
            variables += 1;
        }
    }
    scan.tail = variables;
}

fn push_constant(scan: &mut LineScan, key: &[u8], idx: u32, variables: &mut u32) {
    scan.key.extend_from_slice(key);
    scan.key.push(CLUSTER_SEP);
    scan.constants.push(idx);
    scan.gaps.push(*variables);
    *variables = 0;
}

impl Engine {
    /// Optional pass in front of the candidate table, mirroring the word
    /// sketch: per-line candidate keys counted into a fixed-size sketch.
    pub(crate) fn cluster_sketch_pass(&mut self) -> Result<Sketch, Error> {
        info!("creating the cluster sketch");
        let mut sketch = Sketch::new(self.cfg.cluster_sketch_size, self.seeds.cluster_sketch);
        let mut tokens: Vec<Vec<u8>> = Vec::new();
        let mut scan = LineScan::default();
        {
            let Engine {
                cfg,
                pipeline,
                transform,
                words,
                ..
            } = self;
            for path in &cfg.inputs {
                let Some(mut segments) = Engine::open_input(path) else {
                    continue;
                };
                while let Some(seg) = segments.next_segment()? {
                    pipeline.tokenize(seg, &mut tokens);
                    scan_tokens(words, transform.as_ref(), &tokens, &mut scan);
                    if !scan.key.is_empty() {
                        sketch.bump(&scan.key);
                    }
                }
            }
        }
        debug!(
            "{} slots in the cluster sketch >= support threshold",
            group_digits(sketch.slots_at_least(self.support))
        );
        Ok(sketch)
    }

    /// The candidate pass: finds or creates a candidate per line and widens
    /// its wildcard bounds. When joining is enabled the word dependency
    /// matrix is maintained in the same pass over the data.
    pub(crate) fn candidate_pass(&mut self, sketch: Option<&Sketch>) -> Result<ElemTable, Error> {
        info!("finding cluster candidates");
        let mut clusters = ElemTable::new(100 * self.freq_words as u64, self.seeds.cluster_table);
        let mut matrix = self.cfg.joining().then(|| DepMatrix::new(self.freq_words));
        let mut tokens: Vec<Vec<u8>> = Vec::new();
        let mut scan = LineScan::default();
        let mut unique_ids: Vec<u32> = Vec::new();
        let mut candidate_count = 0u64;
        let support = self.support;
        {
            let Engine {
                cfg,
                pipeline,
                transform,
                words,
                candidates,
                family,
                ..
            } = self;
            for path in &cfg.inputs {
                let Some(mut segments) = Engine::open_input(path) else {
                    continue;
                };
                while let Some(seg) = segments.next_segment()? {
                    pipeline.tokenize(seg, &mut tokens);
                    scan_tokens(words, transform.as_ref(), &tokens, &mut scan);
                    if scan.constants.is_empty() {
                        continue;
                    }
                    if let Some(matrix) = matrix.as_mut() {
                        unique_ids.clear();
                        for &wi in &scan.constants {
                            let id = words.entry(wi).number;
                            if !unique_ids.contains(&id) {
                                unique_ids.push(id);
                            }
                        }
                        matrix.record(&unique_ids);
                    }
                    if let Some(sk) = sketch {
                        if sk.estimate(&scan.key) < support {
                            continue;
                        }
                    }
                    let entry = clusters.insert(&scan.key);
                    if clusters.entry(entry).count == 1 {
                        candidate_count += 1;
                        let ci = candidates.len() as u32;
                        clusters.entry_mut(entry).payload = ci;
                        candidates.push(Candidate::from_scan(&scan, entry));
                        family.push(scan.constants.len(), ci);
                    }
                    let ci = clusters.entry(entry).payload;
                    candidates[ci as usize].absorb(&scan);
                }
            }
        }
        self.matrix = matrix;
        debug!(
            "{} cluster candidates were found",
            group_digits(candidate_count)
        );
        Ok(clusters)
    }

    /// Drops candidates below the support threshold from the family
    /// buckets. Their table entries stay addressable for the outlier pass.
    pub(crate) fn select_clusters(&mut self) -> u64 {
        let support = self.support;
        let Engine {
            family, candidates, ..
        } = self;
        let mut kept = 0u64;
        family.retain(|ci| {
            let keep = candidates[ci as usize].count >= support;
            if keep {
                kept += 1;
            }
            keep
        });
        kept
    }
}
