pub mod restaurant;
pub mod hpylm;
pub mod vpylm;
pub mod npylm;
pub mod pyhsmm;
pub mod sampler;
pub mod corpus;
pub mod config;
pub mod error;
pub mod persist;
pub mod progress;
pub mod baseline;

use std::fs;
use std::io::Write;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::info_span;

use crate::config::{Command, Config};
use crate::corpus::{Corpus, Splitter};
use crate::error::RunError;
use crate::npylm::{Npylm, NpylmConfig};
use crate::persist::{NpylmState, PyhsmmState};
use crate::progress::Progress;
use crate::pyhsmm::{Pyhsmm, PyhsmmConfig};
use crate::sampler::GibbsConfig;

/// Result of the `lm` subcommand: a trained word-level language model,
/// optionally scored against a held-out segmented test set.
#[derive(Debug, Clone)]
pub struct LmReport {
    pub epochs_trained: usize,
    pub test_perplexity: Option<f64>,
}

/// Result of the `ws`/`wsTest` subcommands. `tags` is populated only when
/// `-posSize` selects the joint PYHSMM rather than a plain NPYLM.
#[derive(Debug, Clone)]
pub struct WsReport {
    pub epochs_trained: usize,
    pub decoded: Option<Vec<Vec<String>>>,
    pub decoded_tags: Option<Vec<Vec<usize>>>,
}

fn gibbs_config(cfg: &Config) -> GibbsConfig {
    GibbsConfig { batch_size: cfg.batch, threads: cfg.threads }
}

fn write_decoded(path: &std::path::Path, decoded: &[Vec<String>], tags: Option<&[Vec<usize>]>) -> Result<(), RunError> {
    let mut out = fs::File::create(path).map_err(|source| RunError::Write { path: path.to_path_buf(), source })?;
    for (i, words) in decoded.iter().enumerate() {
        let line = match tags {
            Some(tags) => words
                .iter()
                .zip(tags[i].iter())
                .map(|(w, t)| format!("{w}/{t}"))
                .collect::<Vec<_>>()
                .join(" "),
            None => words.join(" "),
        };
        writeln!(out, "{line}").map_err(|source| RunError::Write { path: path.to_path_buf(), source })?;
    }
    Ok(())
}

/// Trains a fully-supervised word-level language model from `cfg.train`
/// (already segmented), optionally reporting perplexity on `cfg.test`.
pub fn run_lm(cfg: &Config) -> Result<LmReport, RunError> {
    let _span = info_span!("run_lm").entered();
    let train = Corpus::load_segmented(cfg.train.as_ref().expect("validated by Config::new"), cfg.max_sent_len, cfg.quiet)?;

    let npylm_config = NpylmConfig {
        max_ngram: cfg.max_ngram,
        max_word_length: cfg.max_word_length,
        vocab_size: cfg.vocab_size,
        poisson_correction: cfg.poisson_correction,
    };
    let mut npylm = Npylm::new(
        cfg.theta, cfg.d, cfg.gamma_a, cfg.gamma_b, cfg.beta_a, cfg.beta_b, cfg.alpha, cfg.beta, npylm_config,
    );

    let mut rng = ChaCha8Rng::seed_from_u64(cfg.rand_seed);
    let word_seqs = npylm.initialize_from_annotated_data(&train.word_seqs, &mut rng);

    let progress = Progress::for_epochs(cfg.epoch as u64, cfg.quiet);
    sampler::train_npylm_fixed_segmentation(
        &mut npylm,
        &word_seqs,
        cfg.epoch,
        cfg.rand_seed,
        true,
        |_| progress.inc(1),
    );
    progress.finish();

    if let Some(model_path) = &cfg.model {
        NpylmState::new(npylm.clone()).save(model_path)?;
    }

    let test_perplexity = match &cfg.test {
        Some(test_path) => {
            let test = Corpus::load_segmented(test_path, cfg.max_sent_len, cfg.quiet)?;
            Some(baseline::perplexity(&npylm, &test.word_seqs, &npylm.bos, &npylm.eos))
        }
        None => None,
    };

    Ok(LmReport { epochs_trained: cfg.epoch, test_perplexity })
}

/// Trains unsupervised word segmentation from `cfg.train` (unsegmented), and
/// when `cfg.pos_size > 0` jointly induces latent part-of-speech tags.
/// Decodes `cfg.dev` once after training, if given.
pub fn run_ws(cfg: &Config) -> Result<WsReport, RunError> {
    let _span = info_span!("run_ws").entered();
    let splitter = Splitter::from_flag(&cfg.splitter);
    let train = Corpus::load_unsegmented(
        cfg.train.as_ref().expect("validated by Config::new"),
        &splitter,
        cfg.lowercase,
        cfg.max_sent_len,
        cfg.quiet,
    )?;

    let mut rng = ChaCha8Rng::seed_from_u64(cfg.rand_seed);
    let progress = Progress::for_epochs(cfg.epoch as u64, cfg.quiet);

    if cfg.pos_size == 0 {
        let npylm_config = NpylmConfig {
            max_ngram: cfg.max_ngram,
            max_word_length: cfg.max_word_length,
            vocab_size: cfg.vocab_size,
            poisson_correction: cfg.poisson_correction,
        };
        let mut npylm = Npylm::new(
            cfg.theta, cfg.d, cfg.gamma_a, cfg.gamma_b, cfg.beta_a, cfg.beta_b, cfg.alpha, cfg.beta, npylm_config,
        );
        let mut word_seqs = npylm.initialize(&train.sents, &mut rng);

        sampler::train_npylm(
            &mut npylm,
            &train.sents,
            &mut word_seqs,
            &gibbs_config(cfg),
            cfg.epoch,
            cfg.rand_seed,
            true,
            |_| progress.inc(1),
        );
        progress.finish();

        if let Some(model_path) = &cfg.model {
            NpylmState::new(npylm.clone()).save(model_path)?;
        }

        let decoded = match &cfg.dev {
            Some(dev_path) => {
                let dev = Corpus::load_unsegmented(dev_path, &splitter, cfg.lowercase, cfg.max_sent_len, cfg.quiet)?;
                let decoded = sampler::decode_npylm(&npylm, &dev.sents, cfg.threads, false, cfg.rand_seed);
                if let Some(out_path) = &cfg.out {
                    write_decoded(out_path, &decoded, None)?;
                }
                Some(decoded)
            }
            None => None,
        };

        Ok(WsReport { epochs_trained: cfg.epoch, decoded, decoded_tags: None })
    } else {
        let pyhsmm_config = PyhsmmConfig {
            max_word_length: cfg.max_word_length,
            pos_size: cfg.pos_size,
            vocab_size: cfg.vocab_size,
        };
        let mut pyhsmm = Pyhsmm::new(
            cfg.theta, cfg.d, cfg.gamma_a, cfg.gamma_b, cfg.beta_a, cfg.beta_b, cfg.alpha, cfg.beta, pyhsmm_config,
        );
        let (mut word_seqs, mut pos_seqs) = pyhsmm.initialize(&train.sents, &mut rng);

        sampler::train_pyhsmm(
            &mut pyhsmm,
            &train.sents,
            &mut word_seqs,
            &mut pos_seqs,
            &gibbs_config(cfg),
            cfg.epoch,
            cfg.rand_seed,
            true,
            |_| progress.inc(1),
        );
        progress.finish();

        if let Some(model_path) = &cfg.model {
            PyhsmmState::new(pyhsmm.clone()).save(model_path)?;
        }

        let (decoded, decoded_tags) = match &cfg.dev {
            Some(dev_path) => {
                let dev = Corpus::load_unsegmented(dev_path, &splitter, cfg.lowercase, cfg.max_sent_len, cfg.quiet)?;
                let results = sampler::decode_pyhsmm(&pyhsmm, &dev.sents, cfg.threads, false, cfg.rand_seed);
                let (words, tags): (Vec<_>, Vec<_>) = results.into_iter().unzip();
                if let Some(out_path) = &cfg.out {
                    write_decoded(out_path, &words, Some(&tags))?;
                }
                (Some(words), Some(tags))
            }
            None => (None, None),
        };

        Ok(WsReport { epochs_trained: cfg.epoch, decoded, decoded_tags })
    }
}

/// Loads a model previously saved by `run_ws` and decodes `cfg.test` without
/// any further training.
pub fn run_ws_test(cfg: &Config) -> Result<WsReport, RunError> {
    let _span = info_span!("run_ws_test").entered();
    let model_path = cfg.model.as_ref().expect("validated by Config::new");
    let test_path = cfg.test.as_ref().expect("validated by Config::new");
    let splitter = Splitter::from_flag(&cfg.splitter);
    let test = Corpus::load_unsegmented(test_path, &splitter, cfg.lowercase, cfg.max_sent_len, cfg.quiet)?;

    if cfg.pos_size == 0 {
        let state = NpylmState::load(model_path)?;
        let decoded = sampler::decode_npylm(&state.npylm, &test.sents, cfg.threads, false, cfg.rand_seed);
        if let Some(out_path) = &cfg.out {
            write_decoded(out_path, &decoded, None)?;
        }
        Ok(WsReport { epochs_trained: 0, decoded: Some(decoded), decoded_tags: None })
    } else {
        let state = PyhsmmState::load(model_path)?;
        let results = sampler::decode_pyhsmm(&state.pyhsmm, &test.sents, cfg.threads, false, cfg.rand_seed);
        let (words, tags): (Vec<_>, Vec<_>) = results.into_iter().unzip();
        if let Some(out_path) = &cfg.out {
            write_decoded(out_path, &words, Some(&tags))?;
        }
        Ok(WsReport { epochs_trained: 0, decoded: Some(words), decoded_tags: Some(tags) })
    }
}

/// Builder over [`Config`], allowing the three subcommands to be driven with
/// method-chaining syntax in addition to parsing from raw CLI args.
#[derive(Clone)]
pub struct WordSegmenter {
    cfg: Config,
}

impl WordSegmenter {
    /// Builds a segmenter from CLI-style arguments (see [`Config::new`]).
    pub fn new(args: &[String]) -> Result<WordSegmenter, error::ConfigError> {
        Ok(WordSegmenter { cfg: Config::new(args)? })
    }

    pub fn quiet(mut self) -> Self {
        self.cfg.quiet = true;
        self
    }

    pub fn epochs(mut self, epoch: usize) -> Self {
        self.cfg.epoch = epoch;
        self
    }

    pub fn threads(mut self, threads: usize) -> Self {
        self.cfg.threads = threads.max(1);
        self
    }

    pub fn rand_seed(mut self, seed: u64) -> Self {
        self.cfg.rand_seed = seed;
        self
    }

    /// Runs whichever subcommand this builder was configured for.
    pub fn run(self) -> Result<WsOrLmReport, RunError> {
        match self.cfg.command {
            Command::Lm => run_lm(&self.cfg).map(WsOrLmReport::Lm),
            Command::Ws => run_ws(&self.cfg).map(WsOrLmReport::Ws),
            Command::WsTest => run_ws_test(&self.cfg).map(WsOrLmReport::Ws),
        }
    }
}

/// Either outcome of [`WordSegmenter::run`], since the builder does not know
/// at compile time which subcommand it was parsed into.
#[derive(Debug, Clone)]
pub enum WsOrLmReport {
    Lm(LmReport),
    Ws(WsReport),
}
