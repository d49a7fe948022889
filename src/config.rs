use std::path::PathBuf;

use crate::error::ConfigError;

/// Which of the three CLI subcommands was invoked (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Train a (fully segmented) word-level language model and report test
    /// perplexity.
    Lm,
    /// Train unsupervised word segmentation (and, if `pos_size > 0`, latent
    /// POS tagging) from unsegmented data.
    Ws,
    /// Load a previously saved model and decode a held-out file.
    WsTest,
}

impl Command {
    fn from_str(s: &str) -> Result<Command, ConfigError> {
        match s {
            "lm" => Ok(Command::Lm),
            "ws" => Ok(Command::Ws),
            "wsTest" => Ok(Command::WsTest),
            other => Err(ConfigError::UnknownSubcommand(other.to_string())),
        }
    }
}

/// An enum containing each possible parsing state.
enum Parse {
    None,
    Train,
    Test,
    Dev,
    Model,
    Out,
    MaxNgram,
    Theta,
    D,
    GammaA,
    GammaB,
    BetaA,
    BetaB,
    Alpha,
    Beta,
    VocabSize,
    MaxWordLength,
    PosSize,
    Epoch,
    Batch,
    Threads,
    Splitter,
    RandSeed,
    MaxSentLen,
}

/// Fully parsed, validated CLI configuration, ready to drive any of the
/// three subcommands.
#[derive(Debug, Clone)]
pub struct Config {
    pub command: Command,
    pub train: Option<PathBuf>,
    pub test: Option<PathBuf>,
    pub dev: Option<PathBuf>,
    pub model: Option<PathBuf>,
    pub out: Option<PathBuf>,

    pub max_ngram: usize,
    pub theta: f64,
    pub d: f64,
    pub gamma_a: f64,
    pub gamma_b: f64,
    pub beta_a: f64,
    pub beta_b: f64,
    pub alpha: f64,
    pub beta: f64,
    pub vocab_size: usize,
    pub max_word_length: usize,
    pub pos_size: usize,
    pub epoch: usize,
    pub batch: usize,
    pub threads: usize,
    pub splitter: String,
    pub rand_seed: u64,
    pub max_sent_len: usize,
    pub lowercase: bool,
    pub poisson_correction: bool,
    pub quiet: bool,
}

impl Config {
    /// Builds a default configuration for `command`, with every
    /// hyperparameter at the value named in the spec's flag table (§6).
    fn defaults(command: Command) -> Config {
        Config {
            command,
            train: None,
            test: None,
            dev: None,
            model: None,
            out: None,
            max_ngram: 2,
            theta: 1.0,
            d: 0.5,
            gamma_a: 1.0,
            gamma_b: 1.0,
            beta_a: 1.0,
            beta_b: 1.0,
            alpha: 1.0,
            beta: 1.0,
            vocab_size: 1 << 21,
            max_word_length: 16,
            pos_size: 0,
            epoch: 100,
            batch: 32,
            threads: 4,
            splitter: String::new(),
            rand_seed: 0,
            max_sent_len: 300,
            lowercase: false,
            poisson_correction: false,
            quiet: false,
        }
    }

    /// Parses `args` (not including the program name) into a `Config`.
    /// Unknown subcommands/flags and malformed values are reported as
    /// `ConfigError`, never panics -- config parsing is an I/O-adjacent
    /// boundary per §7, not a core invariant.
    pub fn new(args: &[String]) -> Result<Config, ConfigError> {
        let (command_arg, rest) = args.split_first().ok_or(ConfigError::MissingInput)?;
        let command = Command::from_str(command_arg)?;
        let mut cfg = Config::defaults(command);
        let mut parser = Parse::None;

        for arg in rest {
            match arg.as_str() {
                "-train" => { parser = Parse::Train; continue; }
                "-test" => { parser = Parse::Test; continue; }
                "-dev" => { parser = Parse::Dev; continue; }
                "-model" => { parser = Parse::Model; continue; }
                "-out" => { parser = Parse::Out; continue; }
                "-maxNgram" => { parser = Parse::MaxNgram; continue; }
                "-theta" => { parser = Parse::Theta; continue; }
                "-d" => { parser = Parse::D; continue; }
                "-gammaA" => { parser = Parse::GammaA; continue; }
                "-gammaB" => { parser = Parse::GammaB; continue; }
                "-betaA" => { parser = Parse::BetaA; continue; }
                "-betaB" => { parser = Parse::BetaB; continue; }
                "-alpha" => { parser = Parse::Alpha; continue; }
                "-beta" => { parser = Parse::Beta; continue; }
                "-vocabSize" => { parser = Parse::VocabSize; continue; }
                "-maxWordLength" => { parser = Parse::MaxWordLength; continue; }
                "-posSize" => { parser = Parse::PosSize; continue; }
                "-epoch" => { parser = Parse::Epoch; continue; }
                "-batch" => { parser = Parse::Batch; continue; }
                "-threads" => { parser = Parse::Threads; continue; }
                "-splitter" => { parser = Parse::Splitter; continue; }
                "-randSeed" => { parser = Parse::RandSeed; continue; }
                "-maxSentLen" => { parser = Parse::MaxSentLen; continue; }
                "-lowercase" => { cfg.lowercase = true; parser = Parse::None; continue; }
                "-poisson" => { cfg.poisson_correction = true; parser = Parse::None; continue; }
                "-q" => { cfg.quiet = true; parser = Parse::None; continue; }
                "-help" => return Err(ConfigError::UnknownFlag("-help".to_string())),
                _ => {}
            }

            macro_rules! parse_num {
                ($flag:literal, $ty:ty) => {
                    arg.parse::<$ty>().map_err(|_| ConfigError::InvalidValue {
                        flag: $flag.to_string(),
                        value: arg.clone(),
                        reason: format!("expected a {}", stringify!($ty)),
                    })?
                };
            }

            match parser {
                Parse::None => return Err(ConfigError::UnknownFlag(arg.clone())),
                Parse::Train => cfg.train = Some(PathBuf::from(arg)),
                Parse::Test => cfg.test = Some(PathBuf::from(arg)),
                Parse::Dev => cfg.dev = Some(PathBuf::from(arg)),
                Parse::Model => cfg.model = Some(PathBuf::from(arg)),
                Parse::Out => cfg.out = Some(PathBuf::from(arg)),
                Parse::MaxNgram => cfg.max_ngram = parse_num!("-maxNgram", usize),
                Parse::Theta => cfg.theta = parse_num!("-theta", f64),
                Parse::D => cfg.d = parse_num!("-d", f64),
                Parse::GammaA => cfg.gamma_a = parse_num!("-gammaA", f64),
                Parse::GammaB => cfg.gamma_b = parse_num!("-gammaB", f64),
                Parse::BetaA => cfg.beta_a = parse_num!("-betaA", f64),
                Parse::BetaB => cfg.beta_b = parse_num!("-betaB", f64),
                Parse::Alpha => cfg.alpha = parse_num!("-alpha", f64),
                Parse::Beta => cfg.beta = parse_num!("-beta", f64),
                Parse::VocabSize => cfg.vocab_size = parse_num!("-vocabSize", usize),
                Parse::MaxWordLength => cfg.max_word_length = parse_num!("-maxWordLength", usize),
                Parse::PosSize => cfg.pos_size = parse_num!("-posSize", usize),
                Parse::Epoch => cfg.epoch = parse_num!("-epoch", usize),
                Parse::Batch => cfg.batch = parse_num!("-batch", usize),
                Parse::Threads => cfg.threads = parse_num!("-threads", usize),
                Parse::Splitter => cfg.splitter = arg.clone(),
                Parse::RandSeed => cfg.rand_seed = parse_num!("-randSeed", u64),
                Parse::MaxSentLen => cfg.max_sent_len = parse_num!("-maxSentLen", usize),
            }
            parser = Parse::None;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0 < self.d && self.d < 1.0) {
            return Err(ConfigError::OutOfRange {
                flag: "-d".to_string(),
                value: self.d.to_string(),
                reason: "must be in (0, 1)".to_string(),
            });
        }
        if self.theta <= 0.0 {
            return Err(ConfigError::OutOfRange {
                flag: "-theta".to_string(),
                value: self.theta.to_string(),
                reason: "must be > 0".to_string(),
            });
        }
        if self.max_ngram != 2 {
            return Err(ConfigError::OutOfRange {
                flag: "-maxNgram".to_string(),
                value: self.max_ngram.to_string(),
                reason: "only bigram word models (maxNgram=2) are supported".to_string(),
            });
        }
        if self.max_word_length == 0 {
            return Err(ConfigError::OutOfRange {
                flag: "-maxWordLength".to_string(),
                value: self.max_word_length.to_string(),
                reason: "must be >= 1".to_string(),
            });
        }
        if self.batch == 0 {
            return Err(ConfigError::OutOfRange {
                flag: "-batch".to_string(),
                value: self.batch.to_string(),
                reason: "must be >= 1".to_string(),
            });
        }
        match self.command {
            Command::Lm | Command::Ws => {
                if self.train.is_none() {
                    return Err(ConfigError::MissingInput);
                }
            }
            Command::WsTest => {
                if self.model.is_none() || self.test.is_none() {
                    return Err(ConfigError::MissingInput);
                }
            }
        }
        Ok(())
    }
}

/// Print usage information and the full flag reference.
pub fn print_usage() {
    println!();
    println!("pyhsmm - Bayesian nonparametric word segmentation and POS induction");
    println!();
    println!("USAGE: pyhsmm <lm|ws|wsTest> [options]");
    println!();
    println!("COMMANDS:");
    println!("   lm       Train a language model on segmented data; report test perplexity.");
    println!("   ws       Train unsupervised segmentation (and, with -posSize, tagging) from");
    println!("            unsegmented data; optionally decode -dev each epoch.");
    println!("   wsTest   Load a saved -model and decode -test.");
    println!();
    println!("OPTIONS:");
    println!("  -train <path>          Training corpus");
    println!("  -test <path>           Held-out corpus (perplexity for lm, decode input for wsTest)");
    println!("  -dev <path>            Optional held-out decode target, checked every epoch (ws)");
    println!("  -model <path>          Model save/load path");
    println!("  -out <path>            Output path for decoded segmentations");
    println!("  -maxNgram <n>          Word n-gram order (must be 2)");
    println!("  -theta <f>             Initial Pitman-Yor concentration");
    println!("  -d <f>                 Initial Pitman-Yor discount, in (0, 1)");
    println!("  -gammaA/-gammaB <f>    Gamma prior on concentration resampling");
    println!("  -betaA/-betaB <f>      Beta prior on discount resampling");
    println!("  -alpha/-beta <f>       VPYLM stop-probability Beta prior");
    println!("  -vocabSize <n>         Character vocabulary size (default 2^21)");
    println!("  -maxWordLength <n>     Maximum word length in characters");
    println!("  -posSize <n>           Number of latent POS tags (0 = plain NPYLM)");
    println!("  -epoch <n>             Number of Gibbs training epochs");
    println!("  -batch <n>             Mini-batch size for blocked Gibbs sampling");
    println!("  -threads <n>           Worker pool width for parallel backward sampling");
    println!("  -splitter <s>          Custom character splitter (empty = per rune)");
    println!("  -randSeed <n>          Master PRNG seed");
    println!("  -maxSentLen <n>        Maximum sentence length in characters");
    println!("  -lowercase             Lowercase unsegmented input");
    println!("  -poisson               Enable the Poisson word-length correction");
    println!("  -q                     Suppress progress output");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(s: &str) -> Vec<String> {
        s.split_whitespace().map(str::to_string).collect()
    }

    #[test]
    fn unknown_subcommand_is_reported_not_panicked() {
        let err = Config::new(&args("bogus -train foo")).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownSubcommand(_)));
    }

    #[test]
    fn lm_without_train_is_missing_input() {
        let err = Config::new(&args("lm")).unwrap_err();
        assert!(matches!(err, ConfigError::MissingInput));
    }

    #[test]
    fn out_of_range_discount_is_reported() {
        let err = Config::new(&args("lm -train x.txt -d 1.5")).unwrap_err();
        assert!(matches!(err, ConfigError::OutOfRange { .. }));
    }

    #[test]
    fn valid_ws_config_parses_hyperparameters() {
        let cfg = Config::new(&args("ws -train x.txt -maxWordLength 8 -epoch 5 -posSize 4")).unwrap();
        assert_eq!(cfg.command, Command::Ws);
        assert_eq!(cfg.max_word_length, 8);
        assert_eq!(cfg.epoch, 5);
        assert_eq!(cfg.pos_size, 4);
    }
}
