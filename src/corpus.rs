use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::CorpusError;
use crate::progress::Progress;

/// How a line of unsegmented text is split into character-level tokens.
#[derive(Debug, Clone)]
pub enum Splitter {
    /// Every Unicode scalar value is its own character token.
    Rune,
    /// Lines are split on a user-supplied separator string.
    Custom(String),
}

impl Splitter {
    pub fn from_flag(splitter: &str) -> Splitter {
        if splitter.is_empty() {
            Splitter::Rune
        } else {
            Splitter::Custom(splitter.to_string())
        }
    }

    fn split(&self, line: &str) -> Vec<char> {
        match self {
            Splitter::Rune => line.chars().collect(),
            Splitter::Custom(sep) => line
                .split(sep.as_str())
                .filter(|s| !s.is_empty())
                .filter_map(|s| s.chars().next())
                .collect(),
        }
    }
}

/// A loaded training/test corpus: per-sentence character sequences plus,
/// when loaded from segmented data, the word sequences those characters
/// decompose into.
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    pub sents: Vec<Vec<char>>,
    pub word_seqs: Vec<Vec<String>>,
}

impl Corpus {
    pub fn len(&self) -> usize {
        self.sents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sents.is_empty()
    }

    /// Loads an unsegmented corpus: one sentence per line, optionally
    /// lowercased, tokenized with `splitter`. Empty lines are dropped; lines
    /// longer than `max_sent_len` characters are discarded.
    pub fn load_unsegmented(
        path: &Path,
        splitter: &Splitter,
        lowercase: bool,
        max_sent_len: usize,
        quiet: bool,
    ) -> Result<Corpus, CorpusError> {
        require_exists(&path.to_path_buf())?;
        let lines = read_lines(path)?;
        let progress = Progress::for_corpus(lines.len() as u64, quiet);
        let mut sents = Vec::new();
        let mut dropped = 0usize;
        for (i, line) in lines.into_iter().enumerate() {
            let line = line.map_err(|source| CorpusError::Read { path: path.to_path_buf(), line: i, source })?;
            let line = if lowercase { line.to_lowercase() } else { line };
            let chars = splitter.split(&line);
            progress.inc(1);
            if chars.is_empty() {
                continue;
            }
            if chars.len() > max_sent_len {
                dropped += 1;
                continue;
            }
            sents.push(chars);
        }
        progress.finish();
        if dropped > 0 {
            warn!(dropped, path = %path.display(), "dropped sentences longer than max_sent_len");
        }
        if sents.is_empty() {
            return Err(CorpusError::Empty { path: path.to_path_buf() });
        }
        Ok(Corpus { sents, word_seqs: Vec::new() })
    }

    /// Loads a segmented corpus: one space-separated sentence per line. The
    /// character sequence is the concatenation of the words on that line.
    pub fn load_segmented(path: &Path, max_sent_len: usize, quiet: bool) -> Result<Corpus, CorpusError> {
        require_exists(&path.to_path_buf())?;
        let lines = read_lines(path)?;
        let progress = Progress::for_corpus(lines.len() as u64, quiet);
        let mut sents = Vec::new();
        let mut word_seqs = Vec::new();
        let mut dropped = 0usize;
        for (i, line) in lines.into_iter().enumerate() {
            let line = line.map_err(|source| CorpusError::Read { path: path.to_path_buf(), line: i, source })?;
            let words: Vec<String> = line.split_whitespace().map(str::to_string).collect();
            progress.inc(1);
            if words.is_empty() {
                continue;
            }
            let chars: Vec<char> = words.concat().chars().collect();
            if chars.len() > max_sent_len {
                dropped += 1;
                continue;
            }
            sents.push(chars);
            word_seqs.push(words);
        }
        progress.finish();
        if dropped > 0 {
            warn!(dropped, path = %path.display(), "dropped sentences longer than max_sent_len");
        }
        if sents.is_empty() {
            return Err(CorpusError::Empty { path: path.to_path_buf() });
        }
        Ok(Corpus { sents, word_seqs })
    }
}

fn read_lines(path: &Path) -> Result<Vec<std::io::Result<String>>, CorpusError> {
    let file = File::open(path).map_err(|source| CorpusError::Open { path: path.to_path_buf(), source })?;
    Ok(BufReader::new(file).lines().collect())
}

/// Resolves a user-supplied path, surfacing a consistent error if it is
/// missing entirely (used before attempting to open it for more detailed
/// diagnostics).
pub fn require_exists(path: &PathBuf) -> Result<(), CorpusError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(CorpusError::Open {
            path: path.clone(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(contents: &str) -> tempfile_like::TempPath {
        tempfile_like::TempPath::new(contents)
    }

    mod tempfile_like {
        use std::fs;
        use std::io::Write;
        use std::path::PathBuf;

        pub struct TempPath(pub PathBuf);

        impl TempPath {
            pub fn new(contents: &str) -> Self {
                let mut path = std::env::temp_dir();
                path.push(format!("pyhsmm-corpus-test-{}-{}", std::process::id(), contents.len()));
                let mut f = fs::File::create(&path).expect("create temp file");
                f.write_all(contents.as_bytes()).expect("write temp file");
                TempPath(path)
            }
        }

        impl Drop for TempPath {
            fn drop(&mut self) {
                let _ = fs::remove_file(&self.0);
            }
        }

        impl std::ops::Deref for TempPath {
            type Target = PathBuf;
            fn deref(&self) -> &PathBuf {
                &self.0
            }
        }
    }

    #[test]
    fn unsegmented_corpus_drops_empty_and_oversize_lines() {
        let tmp = write_temp("hello\n\nthisistoolong\n");
        let corpus = Corpus::load_unsegmented(&tmp, &Splitter::Rune, false, 6, true).unwrap();
        assert_eq!(corpus.sents.len(), 1);
        assert_eq!(corpus.sents[0].iter().collect::<String>(), "hello");
    }

    #[test]
    fn segmented_corpus_concatenates_words_into_characters() {
        let tmp = write_temp("the cat sat\n");
        let corpus = Corpus::load_segmented(&tmp, 100, true).unwrap();
        assert_eq!(corpus.word_seqs[0], vec!["the".to_string(), "cat".to_string(), "sat".to_string()]);
        assert_eq!(corpus.sents[0].iter().collect::<String>(), "thecatsat");
    }
}
