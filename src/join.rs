use rand::RngCore;
use tracing::{debug, info};

use crate::candidate::{Candidate, Gap, CLUSTER_SEP};
use crate::engine::Engine;
use crate::matrix::DepMatrix;
use crate::table::ElemTable;
use crate::util::fmt::group_digits;

const TOKEN_LEN: usize = 9;
const ALPHANUMERIC: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// A candidate produced by joining: low-weight positions are replaced by a
/// token, and `tokens[i]` collects the originating words of position `i`
/// across every contributing candidate. Non-token positions keep the words
/// of the first contributor in `words`.
#[derive(Debug)]
pub(crate) struct JoinedCandidate {
    pub(crate) words: Vec<u32>,
    pub(crate) gaps: Vec<Gap>,
    pub(crate) tail: Gap,
    pub(crate) count: u64,
    pub(crate) entry: u32,
    pub(crate) tokens: Vec<Vec<u32>>,
}

fn weight_f1(matrix: &DepMatrix, words: &ElemTable, cand: &Candidate, pos: usize) -> f64 {
    let target = words.entry(cand.words[pos]).number;
    let mut sum = 0.0;
    for &wj in &cand.words {
        sum += matrix.dep(words.entry(wj).number, target);
    }
    sum / cand.words.len() as f64
}

/// Averages over the distinct words only; the word's dependency on itself
/// (always 1) is taken out of the numerator. A single-word candidate gets
/// weight 1.
fn weight_f2(matrix: &DepMatrix, words: &ElemTable, cand: &Candidate, pos: usize) -> f64 {
    let target = words.entry(cand.words[pos]).number;
    let mut unique: Vec<u32> = Vec::new();
    for &wj in &cand.words {
        let id = words.entry(wj).number;
        if !unique.contains(&id) {
            unique.push(id);
        }
    }
    if unique.len() == 1 {
        return 1.0;
    }
    let sum: f64 = unique.iter().map(|&id| matrix.dep(id, target)).sum();
    (sum - 1.0) / (unique.len() - 1) as f64
}

impl Engine {
    /// The token must not collide with any frequent word; on collision,
    /// random alphanumeric strings are drawn until one is unique.
    fn choose_token(&mut self) {
        while self.words.find(&self.token).is_some() {
            self.token = (0..TOKEN_LEN)
                .map(|_| ALPHANUMERIC[self.rng.next_u32() as usize % ALPHANUMERIC.len()])
                .collect();
        }
    }

    /// Replaces low-weight positions with the token and merges candidates
    /// whose non-token words agree. Joined candidates are keyed through the
    /// cluster table like ordinary candidates; their table-entry counts are
    /// mirrored at the end so every entry reports its final support.
    pub(crate) fn join_clusters(&mut self, clusters: &mut ElemTable) {
        info!("joining clusters");
        self.choose_token();
        let order: Vec<u32> = self.family.iter().collect();
        let threshold = self.cfg.word_weight_threshold;
        let weight_fn = self.cfg.word_weight_function;
        let mut marks: Vec<bool> = Vec::new();
        let mut key: Vec<u8> = Vec::new();
        {
            let Engine {
                candidates,
                joined,
                joined_family,
                words,
                matrix,
                token,
                joined_input,
                joined_output,
                ..
            } = self;
            let Some(matrix) = matrix.as_ref() else {
                return;
            };
            for ci in order {
                let cand = &candidates[ci as usize];
                let k = cand.words.len();
                marks.clear();
                marks.resize(k, false);
                let mut any = false;
                for pos in 0..k {
                    let weight = match weight_fn {
                        1 => weight_f1(matrix, words, cand, pos),
                        _ => weight_f2(matrix, words, cand, pos),
                    };
                    if weight < threshold {
                        marks[pos] = true;
                        any = true;
                    }
                }
                if !any {
                    continue;
                }

                let cand = &mut candidates[ci as usize];
                cand.joined = true;
                *joined_input += 1;

                key.clear();
                for pos in 0..k {
                    if marks[pos] {
                        key.extend_from_slice(token);
                    } else {
                        key.extend_from_slice(words.entry(cand.words[pos]).key());
                    }
                    key.push(CLUSTER_SEP);
                }

                let entry = clusters.insert(&key);
                if clusters.entry(entry).count == 1 {
                    *joined_output += 1;
                    let ji = joined.len() as u32;
                    clusters.entry_mut(entry).payload = ji;
                    joined.push(JoinedCandidate {
                        words: cand.words.clone(),
                        gaps: cand.gaps.clone(),
                        tail: cand.tail,
                        count: 0,
                        entry,
                        tokens: vec![Vec::new(); k],
                    });
                    joined_family.push(k, ji);
                }

                let ji = clusters.entry(entry).payload;
                let jc = &mut joined[ji as usize];
                jc.count += cand.count;
                for (gap, other) in jc.gaps.iter_mut().zip(&cand.gaps) {
                    gap.merge(*other);
                }
                jc.tail.merge(cand.tail);
                for pos in 0..k {
                    if marks[pos] && !jc.tokens[pos].contains(&cand.words[pos]) {
                        jc.tokens[pos].push(cand.words[pos]);
                    }
                }
            }

            for jc in joined.iter() {
                clusters.entry_mut(jc.entry).count = jc.count;
            }
        }
        debug!(
            "{} clusters contain frequent words under the word weight threshold",
            group_digits(self.joined_input)
        );
        debug!(
            "those clusters were joined into {} clusters",
            group_digits(self.joined_output)
        );
    }
}
