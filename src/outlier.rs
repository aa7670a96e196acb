use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::candidate::{scan_tokens, LineScan};
use crate::engine::Engine;
use crate::error::Error;
use crate::table::ElemTable;

impl Engine {
    /// Re-reads the input and writes every line whose candidate key is
    /// absent from the cluster table, or whose entry ended up below the
    /// support threshold, to the outlier file. Lines are emitted as read,
    /// before any byte offset or template processing.
    pub(crate) fn outlier_pass(
        &mut self,
        clusters: &mut ElemTable,
        outlier_path: &Path,
    ) -> Result<u64, Error> {
        let file = File::create(outlier_path).map_err(|source| Error::OutlierFile {
            path: outlier_path.to_path_buf(),
            source,
        })?;
        let mut sink = BufWriter::new(file);
        let mut tokens: Vec<Vec<u8>> = Vec::new();
        let mut scan = LineScan::default();
        let mut outliers = 0u64;
        let support = self.support;
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
                let outlier = scan.key.is_empty()
                    || match clusters.find(&scan.key) {
                        Some(entry) => clusters.entry(entry).count < support,
                        None => true,
                    };
                if outlier {
                    sink.write_all(seg)?;
                    sink.write_all(b"\n")?;
                    outliers += 1;
                }
            }
        }
        sink.flush()?;
        Ok(outliers)
    }
}
