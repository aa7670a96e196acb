use std::io::{self, BufRead};

use regex::bytes::Regex;

use crate::error::Error;
use crate::process::{MAX_LINE_LEN, MAX_WORDS};

/// Reads input line by line, bounded by a fixed line buffer: a raw line
/// longer than [MAX_LINE_LEN] `- 1` bytes is yielded in that many segments,
/// and each downstream pass treats every segment as a line of its own.
/// One trailing newline is stripped from each segment.
pub struct Segments<R> {
    inner: R,
    line: Vec<u8>,
    off: usize,
}

impl<R: BufRead> Segments<R> {
    pub fn new(inner: R) -> Segments<R> {
        Segments {
            inner,
            line: Vec::new(),
            off: 0,
        }
    }

    /// Next segment, or `None` at end of input.
    pub fn next_segment(&mut self) -> io::Result<Option<&[u8]>> {
        if self.off >= self.line.len() {
            self.line.clear();
            self.off = 0;
            if self.inner.read_until(b'\n', &mut self.line)? == 0 {
                return Ok(None);
            }
        }
        let take = (self.line.len() - self.off).min(MAX_LINE_LEN - 1);
        let start = self.off;
        self.off += take;
        let mut seg = &self.line[start..start + take];
        if seg.last() == Some(&b'\n') {
            seg = &seg[..seg.len() - 1];
        }
        Ok(Some(seg))
    }
}

/// Per-line preprocessing shared by every pass: byte offset, line filter,
/// template substitution and separator splitting.
///
/// The pipeline is byte oriented; input does not have to be UTF-8. Splitting
/// yields at most [MAX_WORDS] tokens. A separator at the start of a line
/// produces an empty leading token (treated as a variable word downstream);
/// a separator at the end produces no trailing token.
#[derive(Debug)]
pub struct LinePipeline {
    byte_offset: usize,
    filter: Option<Regex>,
    template: Option<Vec<u8>>,
    separator: Regex,
}

impl LinePipeline {
    pub fn new(
        separator: &str,
        byte_offset: usize,
        filter: Option<&str>,
        template: Option<&str>,
    ) -> Result<LinePipeline, Error> {
        let separator = Regex::new(separator).map_err(|source| Error::BadRegex {
            option: "'-d' or '--separator'",
            source,
        })?;
        let filter = filter
            .map(|pattern| {
                Regex::new(pattern).map_err(|source| Error::BadRegex {
                    option: "'-f' or '--lfilter'",
                    source,
                })
            })
            .transpose()?;
        Ok(LinePipeline {
            byte_offset,
            filter,
            template: template.map(|t| t.as_bytes().to_vec()),
            separator,
        })
    }

    /// Splits one newline-stripped line into `tokens`. A skipped line
    /// (empty, shorter than the byte offset, or rejected by the filter)
    /// leaves `tokens` empty.
    pub fn tokenize(&self, line: &[u8], tokens: &mut Vec<Vec<u8>>) {
        tokens.clear();
        if line.is_empty() || self.byte_offset >= line.len() {
            return;
        }
        let mut line = &line[self.byte_offset..];
        let expanded;
        if let Some(filter) = &self.filter {
            let Some(caps) = filter.captures(line) else {
                return;
            };
            if let Some(template) = &self.template {
                let mut buf = Vec::new();
                caps.expand(template, &mut buf);
                expanded = buf;
                line = &expanded;
            }
        }
        split_tokens(&self.separator, line, tokens);
    }
}

fn split_tokens(separator: &Regex, line: &[u8], tokens: &mut Vec<Vec<u8>>) {
    if line.is_empty() {
        return;
    }
    let mut rest = line;
    for _ in 0..MAX_WORDS {
        match separator.find(rest) {
            None => {
                tokens.push(rest.to_vec());
                return;
            }
            Some(sep) => {
                tokens.push(rest[..sep.start()].to_vec());
                rest = &rest[sep.end()..];
                if rest.is_empty() {
                    return;
                }
            }
        }
    }
}
