use regex::bytes::Regex;

use crate::error::Error;

/// Word rewriting rule: words matching both `filter` and `search` get every
/// `search` match replaced by `replace`, producing a synthetic word that is
/// counted alongside the original.
#[derive(Debug)]
pub struct WordTransform {
    filter: Regex,
    search: Regex,
    replace: Vec<u8>,
}

impl WordTransform {
    pub fn new(filter: &str, search: &str, replace: &str) -> Result<WordTransform, Error> {
        let filter = Regex::new(filter).map_err(|source| Error::BadRegex {
            option: "'--wfilter'",
            source,
        })?;
        let search = Regex::new(search).map_err(|source| Error::BadRegex {
            option: "'--wsearch'",
            source,
        })?;
        Ok(WordTransform {
            filter,
            search,
            replace: replace.as_bytes().to_vec(),
        })
    }

    /// Both expressions have to match; a word matching only the filter would
    /// be counted twice in the vocabulary.
    pub fn applies(&self, word: &[u8]) -> bool {
        self.filter.is_match(word) && self.search.is_match(word)
    }

    /// Repeatedly replaces the first `search` match. After the first
    /// substitution the loop refuses a match whose bytes already equal the
    /// replacement, so rules like `=.+` -> `=VALUE` terminate.
    pub fn rewrite(&self, word: &[u8]) -> Vec<u8> {
        let mut current = word.to_vec();
        let mut substituted = false;
        loop {
            let (start, end) = match self.search.find(&current) {
                Some(found) => (found.start(), found.end()),
                None => break,
            };
            let span = end - start;
            if substituted && span <= self.replace.len() && current[start..end] == self.replace[..span]
            {
                break;
            }
            let mut next = Vec::with_capacity(current.len() - span + self.replace.len());
            next.extend_from_slice(&current[..start]);
            next.extend_from_slice(&self.replace);
            next.extend_from_slice(&current[end..]);
            current = next;
            substituted = true;
        }
        current
    }
}
