// Copyright (c) bs-node contributors
// SPDX-License-Identifier: Apache-2.0

//! A two-file ping-pong rotating writer. Each of `log_file1`/`log_file2`
//! gets half of the configured byte budget; once the active file crosses
//! its half, writing continues in the other (truncated) file.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

pub struct Rotator {
    paths: [PathBuf; 2],
    active: usize,
    file: File,
    written: u64,
    half_budget: u64,
}

impl Rotator {
    /// `maximum_size` is the combined budget across both files.
    pub fn create(directory: &Path, file1: &str, file2: &str, maximum_size: u64) -> io::Result<Self> {
        std::fs::create_dir_all(directory)?;
        let paths = [directory.join(file1), directory.join(file2)];
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&paths[0])?;
        let written = file.metadata().map(|m| m.len()).unwrap_or(0);
        Ok(Rotator {
            paths,
            active: 0,
            file,
            written,
            half_budget: maximum_size / 2,
        })
    }

    fn rotate(&mut self) -> io::Result<()> {
        self.active = 1 - self.active;
        self.file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.paths[self.active])?;
        self.written = 0;
        Ok(())
    }

    pub fn write_line(&mut self, line: &str) -> io::Result<()> {
        if self.half_budget > 0 && self.written >= self.half_budget {
            self.rotate()?;
        }
        writeln!(self.file, "{line}")?;
        self.file.flush()?;
        self.written += line.len() as u64 + 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotates_after_half_budget() {
        let dir = tempfile::tempdir().unwrap();
        let mut rotator = Rotator::create(dir.path(), "a.log", "b.log", 20).unwrap();
        // half budget is 10 bytes; each line below is well over that.
        rotator.write_line("0123456789").unwrap();
        rotator.write_line("after-rotate").unwrap();
        let a = std::fs::read_to_string(dir.path().join("a.log")).unwrap();
        let b = std::fs::read_to_string(dir.path().join("b.log")).unwrap();
        assert!(a.contains("0123456789"));
        assert!(b.contains("after-rotate"));
    }
}
