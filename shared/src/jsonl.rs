use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Lines, Write};
use std::marker::PhantomData;
use std::path::Path;
use tracing::debug;

use crate::utils::resolve_path;

#[derive(Debug, thiserror::Error)]
pub enum JsonlError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid JSON on line {line} of {path}: {source}")]
    Parse {
        path: String,
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("File {0} already exists")]
    AlreadyExists(String),
}

/// Streams one deserialized record per non-blank line.
pub struct JsonlReader<T> {
    path: String,
    lines: Lines<BufReader<File>>,
    line_number: usize,
    _record: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> JsonlReader<T> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, JsonlError> {
        let path = resolve_path(path)?;
        let file = File::open(&path)?;
        debug!("Reading JSONL from {}", path.display());

        Ok(Self {
            path: path.display().to_string(),
            lines: BufReader::new(file).lines(),
            line_number: 0,
            _record: PhantomData,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl<T: DeserializeOwned> Iterator for JsonlReader<T> {
    type Item = Result<T, JsonlError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(e.into())),
            };
            self.line_number += 1;

            if line.trim().is_empty() {
                continue;
            }

            return Some(
                serde_json::from_str(&line).map_err(|source| JsonlError::Parse {
                    path: self.path.clone(),
                    line: self.line_number,
                    source,
                }),
            );
        }
    }
}

pub fn read_jsonl<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<Vec<T>, JsonlError> {
    JsonlReader::open(path)?.collect()
}

pub struct JsonlWriter {
    writer: BufWriter<File>,
    written: usize,
}

impl JsonlWriter {
    /// Creates (or truncates) the file, creating parent directories as needed.
    /// With `check_exists` an existing file is an error instead.
    pub fn create(path: impl AsRef<Path>, check_exists: bool) -> Result<Self, JsonlError> {
        let path = resolve_path(path)?;

        if check_exists && path.exists() {
            return Err(JsonlError::AlreadyExists(path.display().to_string()));
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = File::create(&path)?;
        Ok(Self {
            writer: BufWriter::new(file),
            written: 0,
        })
    }

    pub fn write<T: Serialize>(&mut self, record: &T) -> Result<(), JsonlError> {
        serde_json::to_writer(&mut self.writer, record)?;
        self.writer.write_all(b"\n")?;
        self.written += 1;
        Ok(())
    }

    /// Flushes the file and returns the number of records written.
    pub fn finish(mut self) -> Result<usize, JsonlError> {
        self.writer.flush()?;
        Ok(self.written)
    }
}
