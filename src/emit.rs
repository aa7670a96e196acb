use std::io::{self, Write};

use tracing::debug;

use crate::candidate::Candidate;
use crate::config::OutputMode;
use crate::engine::Engine;
use crate::join::JoinedCandidate;
use crate::util::fmt::group_digits;

#[derive(Clone, Copy)]
enum Item {
    Plain(u32),
    Joined(u32),
}

impl Engine {
    /// Writes the cluster listing. Mode 0 orders by descending support,
    /// with joined candidates merged into the same ordering; mode 1 orders
    /// by ascending constant count and, when joining is active, prints the
    /// unjoined and joined clusters as two separate sections.
    pub(crate) fn print_clusters<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out)?;
        match self.cfg.output_mode {
            OutputMode::BySupport => self.print_by_support(out)?,
            OutputMode::ByConstants if self.cfg.joining() => {
                self.print_by_constants_joined(out)?
            }
            OutputMode::ByConstants => self.print_by_constants(out)?,
        }
        writeln!(out)?;
        let total = if self.cfg.joining() {
            self.cluster_count - self.joined_input + self.joined_output
        } else {
            self.cluster_count
        };
        debug!("total number of clusters: {}", group_digits(total));
        Ok(())
    }

    fn item_count(&self, item: Item) -> u64 {
        match item {
            Item::Plain(ci) => self.candidates[ci as usize].count,
            Item::Joined(ji) => self.joined[ji as usize].count,
        }
    }

    fn write_item<W: Write>(&self, out: &mut W, item: Item) -> io::Result<()> {
        match item {
            Item::Plain(ci) => self.write_candidate(out, &self.candidates[ci as usize]),
            Item::Joined(ji) => self.write_joined(out, &self.joined[ji as usize]),
        }
    }

    fn print_by_support<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let mut items: Vec<Item> = Vec::new();
        for k in 1..=self.family.biggest() {
            for &ci in self.family.bucket(k) {
                if !self.candidates[ci as usize].joined {
                    items.push(Item::Plain(ci));
                }
            }
            for &ji in self.joined_family.bucket(k) {
                items.push(Item::Joined(ji));
            }
        }
        items.sort_by(|&a, &b| self.item_count(b).cmp(&self.item_count(a)));
        for item in items {
            self.write_item(out, item)?;
        }
        Ok(())
    }

    fn print_by_constants<W: Write>(&self, out: &mut W) -> io::Result<()> {
        for k in 1..=self.family.biggest() {
            for &ci in self.family.bucket(k) {
                self.write_candidate(out, &self.candidates[ci as usize])?;
            }
        }
        Ok(())
    }

    fn print_by_constants_joined<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let unjoined = self.cluster_count - self.joined_input;
        if unjoined > 0 {
            writeln!(out, ">>>>>>The {unjoined} clusters that are not joined:")?;
            writeln!(out)?;
        }
        for k in 1..=self.family.biggest() {
            for &ci in self.family.bucket(k) {
                if !self.candidates[ci as usize].joined {
                    self.write_candidate(out, &self.candidates[ci as usize])?;
                }
            }
        }
        if self.joined_output > 0 {
            writeln!(out, ">>>>>>The {} joined clusters:", self.joined_output)?;
            writeln!(out)?;
        }
        for k in 1..=self.joined_family.biggest() {
            for &ji in self.joined_family.bucket(k) {
                self.write_joined(out, &self.joined[ji as usize])?;
            }
        }
        Ok(())
    }

    fn write_candidate<W: Write>(&self, out: &mut W, cand: &Candidate) -> io::Result<()> {
        for (pos, &wi) in cand.words.iter().enumerate() {
            let gap = cand.gaps[pos];
            if gap.max != 0 {
                write!(out, "*{{{},{}}} ", gap.min, gap.max)?;
            }
            out.write_all(self.words.entry(wi).key())?;
            out.write_all(b" ")?;
        }
        if cand.tail.max != 0 {
            write!(out, "*{{{},{}}}", cand.tail.min, cand.tail.max)?;
        }
        writeln!(out)?;
        writeln!(out, "Support : {}", group_digits(cand.count))?;
        writeln!(out)
    }

    fn write_joined<W: Write>(&self, out: &mut W, jc: &JoinedCandidate) -> io::Result<()> {
        for (pos, &wi) in jc.words.iter().enumerate() {
            let gap = jc.gaps[pos];
            if gap.max != 0 {
                write!(out, "*{{{},{}}} ", gap.min, gap.max)?;
            }
            let tokens = &jc.tokens[pos];
            if tokens.is_empty() {
                out.write_all(self.words.entry(wi).key())?;
                out.write_all(b" ")?;
            } else if tokens.len() == 1 && !self.cfg.detail_token {
                // A single originating word is printed bare.
                out.write_all(self.words.entry(tokens[0]).key())?;
                out.write_all(b" ")?;
            } else {
                out.write_all(b"(")?;
                for (t, &token_word) in tokens.iter().enumerate() {
                    if t > 0 {
                        out.write_all(b"|")?;
                    }
                    out.write_all(self.words.entry(token_word).key())?;
                }
                out.write_all(b") ")?;
            }
        }
        if jc.tail.max != 0 {
            write!(out, "*{{{},{}}}", jc.tail.min, jc.tail.max)?;
        }
        writeln!(out)?;
        writeln!(out, "Support : {}", group_digits(jc.count))?;
        writeln!(out)
    }
}
