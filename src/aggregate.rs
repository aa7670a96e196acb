use tracing::info;

use crate::candidate::Candidate;
use crate::engine::Engine;
use crate::table::{seeded_hash, ElemTable, NONE};
use crate::util::fmt::group_digits;

/// One trie level: a frequent word or a `(min,max)` wildcard.
///
/// Siblings are kept in descending hash order; all wildcard nodes share the
/// sentinel hash `3F`, which is above every word hash, so wildcards always
/// sit at the front of a sibling list and are told apart by their bounds.
#[derive(Debug, Clone, Copy)]
struct TrieNode {
    parent: u32,
    child: u32,
    next: u32,
    word: u32,
    min: u32,
    max: u32,
    hash: u64,
    terminal: u32,
}

/// Prefix trie over the surviving candidates, used to locate the more
/// specific patterns of a given pattern. Nodes live in an arena, so tearing
/// the trie down is a flat drop and cannot exhaust the stack on deep inputs.
pub(crate) struct PrefixTrie {
    nodes: Vec<TrieNode>,
    modulus: u64,
    seed: u64,
    wildcard_hash: u64,
}

impl PrefixTrie {
    fn new(freq_words: u32, seed: u64) -> PrefixTrie {
        let wildcard_hash = 3 * freq_words as u64;
        let root = TrieNode {
            parent: NONE,
            child: NONE,
            next: NONE,
            word: NONE,
            min: 0,
            max: 0,
            hash: wildcard_hash + 1,
            terminal: NONE,
        };
        PrefixTrie {
            nodes: vec![root],
            modulus: wildcard_hash,
            seed,
            wildcard_hash,
        }
    }

    fn len(&self) -> usize {
        self.nodes.len()
    }

    fn node(&self, idx: u32) -> &TrieNode {
        &self.nodes[idx as usize]
    }

    fn word_hash(&self, key: &[u8]) -> u64 {
        seeded_hash(key, self.modulus, self.seed)
    }

    fn alloc(&mut self, parent: u32, prev: u32, word: u32, min: u32, max: u32, hash: u64) -> u32 {
        let idx = self.nodes.len() as u32;
        let next = if prev == NONE {
            let head = self.nodes[parent as usize].child;
            self.nodes[parent as usize].child = idx;
            head
        } else {
            let head = self.nodes[prev as usize].next;
            self.nodes[prev as usize].next = idx;
            head
        };
        self.nodes.push(TrieNode {
            parent,
            child: NONE,
            next,
            word,
            min,
            max,
            hash,
            terminal: NONE,
        });
        idx
    }

    /// Wildcard siblings all carry the sentinel hash and are scanned
    /// linearly; a miss inserts at the head of the sibling list.
    fn wildcard_child(&mut self, parent: u32, min: u32, max: u32) -> u32 {
        let mut cur = self.nodes[parent as usize].child;
        while cur != NONE {
            let n = self.nodes[cur as usize];
            if n.hash != self.wildcard_hash {
                break;
            }
            if n.min == min && n.max == max {
                return cur;
            }
            cur = n.next;
        }
        self.alloc(parent, NONE, NONE, min, max, self.wildcard_hash)
    }

    /// Word siblings are kept sorted by descending hash; equal hashes fall
    /// back to identity comparison of the word reference.
    fn word_child(&mut self, parent: u32, word: u32, key: &[u8]) -> u32 {
        let hash = self.word_hash(key);
        let mut prev = NONE;
        let mut cur = self.nodes[parent as usize].child;
        while cur != NONE {
            let n = self.nodes[cur as usize];
            if n.hash > hash {
                prev = cur;
                cur = n.next;
                continue;
            }
            if n.hash == hash {
                if n.word == word {
                    return cur;
                }
                prev = cur;
                cur = n.next;
                continue;
            }
            break;
        }
        self.alloc(parent, prev, word, 0, 0, hash)
    }

    /// One wildcard node per non-empty gap, one word node per constant, a
    /// trailing wildcard node for a non-empty tail; the final node gets the
    /// candidate back-pointer.
    fn insert_candidate(&mut self, ci: u32, cand: &mut Candidate, words: &ElemTable) {
        let mut node = 0u32;
        for i in 0..cand.words.len() {
            let gap = cand.gaps[i];
            if gap.max != 0 {
                node = self.wildcard_child(node, gap.min, gap.max);
            }
            node = self.word_child(node, cand.words[i], words.entry(cand.words[i]).key());
        }
        if cand.tail.max != 0 {
            node = self.wildcard_child(node, cand.tail.min, cand.tail.max);
        }
        self.nodes[node as usize].terminal = ci;
        cand.last_node = node;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WildcardLoc {
    /// No wildcard anywhere; nothing can be more specific.
    Nowhere,
    /// Only the trailing gap is variable.
    Tail,
    /// First variable gap sits in front of this 1-based constant.
    Constant(usize),
}

fn first_wildcard_location(cand: &Candidate) -> WildcardLoc {
    for i in 0..cand.words.len() {
        if cand.gaps[i].max != 0 {
            return WildcardLoc::Constant(i + 1);
        }
    }
    if cand.tail.max != 0 {
        return WildcardLoc::Tail;
    }
    WildcardLoc::Nowhere
}

/// Trie levels between the candidate's terminal node and the parent of its
/// first wildcard node, counting one level per constant and one per
/// non-empty gap from the first wildcard onwards.
fn reverse_depth(cand: &Candidate) -> usize {
    match first_wildcard_location(cand) {
        WildcardLoc::Nowhere => 0,
        WildcardLoc::Tail => 1,
        WildcardLoc::Constant(loc) => {
            let mut depth = 0;
            for i in (loc - 1)..cand.words.len() {
                if cand.gaps[i].max != 0 {
                    depth += 1;
                }
                depth += 1;
            }
            if cand.tail.max != 0 {
                depth += 1;
            }
            depth
        }
    }
}

/// Depth-first search for the more specific patterns of one candidate.
///
/// `min`/`max` accumulate the possible word counts along the traversed
/// nodes (a word node is exactly one word, a wildcard node its bounds).
/// A subtree is pruned as soon as the minimum already overshoots the gap
/// being matched; descending continues while the maximum still falls short.
struct Walker<'a> {
    trie: &'a PrefixTrie,
    candidates: &'a [Candidate],
    words: &'a ElemTable,
    cand: &'a Candidate,
    ci: u32,
    gathered: u64,
}

impl Walker<'_> {
    fn gather(&mut self, terminal: u32) {
        if terminal != NONE && terminal != self.ci {
            self.gathered += self.candidates[terminal as usize].count;
        }
    }

    /// Looks for the `target`-th constant (1-based); `target == 0` matches
    /// the trailing gap.
    fn walk(&mut self, parent: u32, target: usize, mut min: i64, mut max: i64, hash: u64) {
        if target == 0 {
            self.walk_tail(parent, min, max);
            return;
        }
        let gap = self.cand.gaps[target - 1];
        let k = self.cand.words.len();
        let mut cur = self.trie.node(parent).child;
        while cur != NONE {
            let n = *self.trie.node(cur);
            let (nmin, nmax) = if n.max == 0 {
                (1, 1)
            } else {
                (n.min as i64, n.max as i64)
            };
            min += nmin;
            max += nmax;
            if min - 1 < gap.min as i64 {
                // Not enough words consumed yet to reach the constant.
                self.walk(cur, target, min, max, hash);
            } else if max - 1 > gap.max as i64 {
                // Jumped over the widest allowed gap, prune the subtree.
            } else if n.hash == hash && n.word == self.cand.words[target - 1] {
                if target < k {
                    let next_key = self.words.entry(self.cand.words[target]).key();
                    let next_hash = self.trie.word_hash(next_key);
                    self.walk(cur, target + 1, 0, 0, next_hash);
                } else if self.cand.tail.max == 0 {
                    self.gather(n.terminal);
                } else {
                    // A terminal right here has no trailing words, which
                    // fits only if the tail may be empty.
                    if self.cand.tail.min == 0 {
                        self.gather(n.terminal);
                    }
                    self.walk_tail(cur, 0, 0);
                }
            } else {
                self.walk(cur, target, min, max, hash);
            }
            min -= nmin;
            max -= nmax;
            cur = n.next;
        }
    }

    fn walk_tail(&mut self, parent: u32, mut min: i64, mut max: i64) {
        let tail = self.cand.tail;
        let mut cur = self.trie.node(parent).child;
        while cur != NONE {
            let n = *self.trie.node(cur);
            let (nmin, nmax) = if n.max == 0 {
                (1, 1)
            } else {
                (n.min as i64, n.max as i64)
            };
            min += nmin;
            max += nmax;
            if min < tail.min as i64 {
                self.walk_tail(cur, min, max);
            } else if max > tail.max as i64 {
                // prune
            } else {
                self.gather(n.terminal);
                self.walk_tail(cur, min, max);
            }
            min -= nmin;
            max -= nmax;
            cur = n.next;
        }
    }
}

impl Engine {
    /// Adds the counts of more-specific candidates into each candidate.
    ///
    /// The additions are staged per candidate and committed only after every
    /// candidate has been processed (ascending by constant count), so one
    /// aggregation result can never feed another and counts are not applied
    /// twice.
    pub(crate) fn aggregate_supports(&mut self, clusters: &mut ElemTable) {
        info!("aggregating cluster candidate supports");
        let mut trie = PrefixTrie::new(self.freq_words, self.seeds.prefix);
        {
            let Engine {
                family,
                candidates,
                words,
                ..
            } = self;
            for ci in family.iter() {
                trie.insert_candidate(ci, &mut candidates[ci as usize], words);
            }
        }

        let mut staged: Vec<u64> = self.candidates.iter().map(|c| c.count).collect();
        {
            let Engine {
                family,
                candidates,
                words,
                ..
            } = self;
            for k in 1..=family.biggest() {
                for &ci in family.bucket(k) {
                    let cand = &candidates[ci as usize];
                    let (target, hash) = match first_wildcard_location(cand) {
                        WildcardLoc::Nowhere => continue,
                        WildcardLoc::Tail => (0, 0),
                        WildcardLoc::Constant(loc) => {
                            let key = words.entry(cand.words[loc - 1]).key();
                            (loc, trie.word_hash(key))
                        }
                    };
                    let mut parent = cand.last_node;
                    for _ in 0..reverse_depth(cand) {
                        parent = trie.node(parent).parent;
                    }
                    let mut walker = Walker {
                        trie: &trie,
                        candidates: candidates.as_slice(),
                        words,
                        cand,
                        ci,
                        gathered: 0,
                    };
                    walker.walk(parent, target, 0, 0, hash);
                    staged[ci as usize] += walker.gathered;
                }
            }
        }

        let Engine {
            family, candidates, ..
        } = self;
        for ci in family.iter() {
            let cand = &mut candidates[ci as usize];
            cand.count = staged[ci as usize];
            clusters.entry_mut(cand.entry).count = staged[ci as usize];
        }
        info!("{} nodes in the prefix trie", group_digits(trie.len() as u64));
    }
}
