//! Persistence of the generation history.
//!
//! The history is a JSON array with one element per generation, each a best-first array
//! of `{"heuristic": {...}, "wins": ...}` objects. It is rewritten after every
//! generation so that an interrupted run can be resumed from the last complete one.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::population::Generation;

/// Every generation produced so far, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct History {
    generations: Vec<Generation>,
}

impl History {
    pub fn new() -> History {
        History::default()
    }

    /// Read a history written by [`save`](Self::save).
    #[instrument]
    pub fn load(path: &Path) -> anyhow::Result<History> {
        let file = File::open(path)
            .with_context(|| format!("could not open checkpoint '{}'", path.display()))?;
        let history: History = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("checkpoint '{}' is corrupted", path.display()))?;
        debug!(generations = history.len(), "checkpoint loaded");
        Ok(history)
    }

    /// Write the history to `path`, replacing it only once fully written.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = Path::new(&tmp);

        let file = File::create(tmp)
            .with_context(|| format!("could not create '{}'", tmp.display()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self).context("could not serialize history")?;
        writer
            .flush()
            .with_context(|| format!("could not write '{}'", tmp.display()))?;
        drop(writer);

        fs::rename(tmp, path)
            .with_context(|| format!("could not replace checkpoint '{}'", path.display()))?;
        debug!(generations = self.len(), path = %path.display(), "checkpoint saved");
        Ok(())
    }

    pub fn push(&mut self, generation: Generation) {
        self.generations.push(generation);
    }

    pub fn generations(&self) -> &[Generation] {
        &self.generations
    }

    pub fn last(&self) -> Option<&Generation> {
        self.generations.last()
    }

    pub fn len(&self) -> usize {
        self.generations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.generations.is_empty()
    }

    /// 1-based number of the generation that comes next.
    pub fn next_generation_number(&self) -> usize {
        self.generations.len() + 1
    }
}
