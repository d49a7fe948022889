use std::collections::{HashMap, VecDeque};

use rand::{Rng, RngCore};
use rand_distr::{Distribution, Gamma};
use serde::{Deserialize, Serialize};

use crate::hpylm::Hpylm;
use crate::vpylm::Vpylm;

/// Default size of the character vocabulary assumed by the base measure
/// (2^21, the number of Unicode code points representable in a single UTF-8
/// sequence), used when [`NpylmConfig::vocab_size`] is left at its default.
const DEFAULT_VOCAB_SIZE: usize = 2_097_152;

/// Configuration knobs for [`Npylm`] beyond the raw Pitman-Yor hyperparameters.
#[derive(Debug, Clone, Copy)]
pub struct NpylmConfig {
    pub max_ngram: usize,
    pub max_word_length: usize,
    /// Size of the character vocabulary the uniform base measure is spread
    /// over (the `-vocabSize` flag, §A2).
    pub vocab_size: usize,
    /// Whether `calc_base` applies the Poisson word-length correction
    /// (disabled by default; see DESIGN.md).
    pub poisson_correction: bool,
}

impl Default for NpylmConfig {
    fn default() -> Self {
        NpylmConfig {
            max_ngram: 2,
            max_word_length: 16,
            vocab_size: DEFAULT_VOCAB_SIZE,
            poisson_correction: false,
        }
    }
}

/// A word-level hierarchical Pitman-Yor language model whose base measure is
/// produced character-by-character from a [`Vpylm`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Npylm {
    pub word_hpylm: Hpylm,
    pub char_vpylm: Vpylm,
    max_word_length: usize,
    pub bos: String,
    pub eos: String,
    bow: String,
    eow: String,
    poisson_lambda: f64,
    length2prob: Vec<f64>,
    poisson_correction: bool,
    depth_memory: HashMap<String, VecDeque<Vec<usize>>>,
}

impl Npylm {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        initial_theta: f64,
        initial_d: f64,
        gamma_a: f64,
        gamma_b: f64,
        beta_a: f64,
        beta_b: f64,
        alpha: f64,
        beta: f64,
        config: NpylmConfig,
    ) -> Self {
        assert_eq!(config.max_ngram, 2, "range of max_ngram is 2 to 2");
        let char_base = 1.0 / config.vocab_size as f64;
        let word_hpylm = Hpylm::new(
            config.max_ngram - 1,
            initial_theta,
            initial_d,
            gamma_a,
            gamma_b,
            beta_a,
            beta_b,
            char_base,
        );
        let char_vpylm = Vpylm::new(
            config.max_word_length + 2,
            initial_theta,
            initial_d,
            gamma_a,
            gamma_b,
            beta_a,
            beta_b,
            char_base,
            alpha,
            beta,
        );
        Npylm {
            word_hpylm,
            char_vpylm,
            max_word_length: config.max_word_length,
            bos: "<BOS>".to_string(),
            eos: "<EOS>".to_string(),
            bow: "<BOW>".to_string(),
            eow: "<EOW>".to_string(),
            poisson_lambda: config.max_word_length as f64 / 2.0,
            length2prob: vec![1.0 / config.max_word_length as f64; config.max_word_length],
            poisson_correction: config.poisson_correction,
            depth_memory: HashMap::new(),
        }
    }

    pub fn max_word_length(&self) -> usize {
        self.max_word_length
    }

    fn initial_char_context(&self) -> Vec<String> {
        vec![self.bow.clone(); self.max_word_length]
    }

    /// Character-level probability of generating `word` from the shared
    /// character model, optionally corrected for the Poisson word-length
    /// prior (see DESIGN.md).
    pub fn calc_base(&self, word: &str) -> f64 {
        let chars: Vec<char> = word.chars().collect();
        let mut u = self.initial_char_context();
        let mut p = 1.0;
        for &c in &chars {
            let (mixed, _, _) = self.char_vpylm.prob(&c.to_string(), &u);
            p *= mixed;
            u.remove(0);
            u.push(c.to_string());
        }
        let (mixed, _, _) = self.char_vpylm.prob(&self.eow, &u);
        p *= mixed;

        if self.poisson_correction && !chars.is_empty() {
            let poisson_p = poisson_pmf(self.poisson_lambda, chars.len() as u64);
            p *= poisson_p / self.length2prob[chars.len() - 1];
        }
        p
    }

    pub fn prob(&self, word: &str, u: &[String]) -> f64 {
        let base = self.calc_base(word);
        self.word_hpylm.prob(word, u, base).0
    }

    /// Adds one customer of `word` in word-level context `u`. Base-measure
    /// hits route into the shared character model via a closure over the
    /// disjoint `char_vpylm`/`depth_memory` fields (so `word_hpylm` can be
    /// borrowed mutably by the recursion at the same time).
    pub fn add_customer(&mut self, word: &str, u: &[String], rng: &mut impl Rng) {
        let base = self.calc_base(word);
        let bow = self.bow.clone();
        let eow = self.eow.clone();
        let bos = self.bos.clone();
        let eos = self.eos.clone();
        let max_word_length = self.max_word_length;
        let Npylm {
            word_hpylm,
            char_vpylm,
            depth_memory,
            ..
        } = self;
        word_hpylm.add_customer(word, u, base, rng, |w, rng| {
            add_customer_base(char_vpylm, depth_memory, &bow, &eow, &bos, &eos, max_word_length, w, rng);
        });
    }

    pub fn remove_customer(&mut self, word: &str, u: &[String], rng: &mut impl Rng) {
        let bow = self.bow.clone();
        let eow = self.eow.clone();
        let bos = self.bos.clone();
        let eos = self.eos.clone();
        let max_word_length = self.max_word_length;
        let Npylm {
            word_hpylm,
            char_vpylm,
            depth_memory,
            ..
        } = self;
        word_hpylm.remove_customer(word, u, rng, |w, rng| {
            remove_customer_base(char_vpylm, depth_memory, &bow, &eow, &bos, &eos, max_word_length, w, rng);
        });
    }

    /// Forward lattice: `forward[t][k]` is the log-sum of scores of every
    /// segmentation of `sent[0..=t]` whose last word has length `k+1`.
    pub fn forward(&self, sent: &[char]) -> Vec<Vec<f64>> {
        let t_len = sent.len();
        let max_k = self.max_word_length;
        let mut forward = vec![vec![f64::NEG_INFINITY; max_k]; t_len];
        for t in 0..t_len {
            for k in 0..max_k {
                if t < k {
                    continue;
                }
                let word: String = sent[(t - k)..=t].iter().collect();
                let base = self.calc_base(&word);
                if t - k == 0 {
                    let u = vec![self.bos.clone()];
                    let score = self.word_hpylm.prob(&word, &u, base).0;
                    forward[t][k] = score.ln();
                    continue;
                }
                let prefix_len = t - k;
                let mut scores = Vec::with_capacity(max_k);
                for j in 0..max_k {
                    if j + 1 > prefix_len {
                        continue;
                    }
                    let u = vec![sent[(prefix_len - (j + 1))..prefix_len].iter().collect::<String>()];
                    let score = self.word_hpylm.prob(&word, &u, base).0;
                    scores.push(score.ln() + forward[t - (k + 1)][j]);
                }
                let lse = logsumexp(&scores);
                forward[t][k] = lse - (scores.len() as f64).ln();
            }
        }
        forward
    }

    /// Samples (or, if `sampling` is false, greedily decodes) a word
    /// sequence from a forward lattice via stochastic backward traceback.
    pub fn backward(&self, sent: &[char], forward: &[Vec<f64>], sampling: bool, rng: &mut impl Rng) -> Vec<String> {
        let mut t = sent.len();
        let mut k = 0usize;
        let mut prev_word = self.eos.clone();
        let mut base = self.char_vpylm.hpylm.base;
        let max_k = self.max_word_length;
        let mut out = Vec::new();

        while t.saturating_sub(k) != 0 {
            if prev_word != self.eos {
                base = self.calc_base(&prev_word);
            }
            let mut scores = vec![0.0; max_k];
            let mut max_score = f64::NEG_INFINITY;
            let mut max_j = None;
            let mut sum = 0.0;
            for j in 0..max_k {
                if t >= k + j + 1 {
                    let start = t - k - (j + 1);
                    let end = t - k;
                    let u = vec![sent[start..end].iter().collect::<String>()];
                    let score = self.word_hpylm.prob(&prev_word, &u, base).0.ln() + forward[t - (k + 1)][j];
                    if score > max_score {
                        max_score = score;
                        max_j = Some(j);
                    }
                    let exp_score = score.exp();
                    scores[j] = exp_score;
                    sum += exp_score;
                }
            }
            let j = if sampling {
                let r = rng.gen::<f64>() * sum;
                let mut cum = 0.0;
                let mut chosen = 0;
                loop {
                    cum += scores[chosen];
                    if cum > r {
                        break;
                    }
                    chosen += 1;
                    if chosen >= max_k {
                        panic!("sampling error in NPYLM::backward");
                    }
                }
                chosen
            } else {
                max_j.expect("no valid predecessor in backward traceback")
            };
            let start = t - k - (j + 1);
            let end = t - k;
            let word: String = sent[start..end].iter().collect();
            out.push(word.clone());
            prev_word = word;
            t -= k + 1;
            k = j;
        }
        out.reverse();
        out
    }

    pub fn add_word_seq_as_customer(&mut self, word_seq: &[String], rng: &mut impl Rng) {
        for (i, word) in word_seq.iter().enumerate() {
            let u = if i == 0 {
                vec![self.bos.clone()]
            } else {
                vec![word_seq[i - 1].clone()]
            };
            self.add_customer(word, &u, rng);
        }
        let u = vec![word_seq.last().expect("empty word sequence").clone()];
        let eos = self.eos.clone();
        self.add_customer(&eos, &u, rng);
    }

    pub fn remove_word_seq_as_customer(&mut self, word_seq: &[String], rng: &mut impl Rng) {
        for (i, word) in word_seq.iter().enumerate() {
            let u = if i == 0 {
                vec![self.bos.clone()]
            } else {
                vec![word_seq[i - 1].clone()]
            };
            self.remove_customer(word, &u, rng);
        }
        let u = vec![word_seq.last().expect("empty word sequence").clone()];
        let eos = self.eos.clone();
        self.remove_customer(&eos, &u, rng);
    }

    /// Random span initialization: each sentence is split into spans of
    /// length drawn uniformly from `[1, max_word_length]`.
    pub fn initialize(&mut self, sents: &[Vec<char>], rng: &mut impl Rng) -> Vec<Vec<String>> {
        let mut sampling_word_seqs = Vec::with_capacity(sents.len());
        for sent in sents {
            let mut seq = Vec::new();
            let mut start = 0;
            while start < sent.len() {
                let r = rng.gen_range(1..=self.max_word_length);
                let end = (start + r).min(sent.len());
                seq.push(sent[start..end].iter().collect::<String>());
                start = end;
            }
            self.add_word_seq_as_customer(&seq, rng);
            sampling_word_seqs.push(seq);
        }
        sampling_word_seqs
    }

    /// Initializes from an already-segmented corpus, splitting any word
    /// longer than `max_word_length` into fixed-length chunks.
    pub fn initialize_from_annotated_data(
        &mut self,
        sampling_word_seqs: &[Vec<String>],
        rng: &mut impl Rng,
    ) -> Vec<Vec<String>> {
        let mut adjusted = Vec::with_capacity(sampling_word_seqs.len());
        for word_seq in sampling_word_seqs {
            let mut seq = Vec::new();
            for word in word_seq {
                let chars: Vec<char> = word.chars().collect();
                if chars.len() < self.max_word_length {
                    seq.push(word.clone());
                } else {
                    let mut start = 0;
                    while start < chars.len() {
                        let end = (start + self.max_word_length).min(chars.len());
                        seq.push(chars[start..end].iter().collect::<String>());
                        start = end;
                    }
                }
            }
            self.add_word_seq_as_customer(&seq, rng);
            adjusted.push(seq);
        }
        adjusted
    }

    /// Resamples the Poisson word-length prior from unigram table statistics
    /// and rebuilds `length2prob` by Monte-Carlo sampling from the character
    /// model. Only meaningful when `poisson_correction` is enabled.
    pub fn resample_poisson_correction(&mut self, rng: &mut impl Rng) {
        let mut a = 1.0;
        let mut b = 1.0;
        if let Some(unigram) = self.word_hpylm.restaurant(&[]) {
            for word in unigram.words() {
                let table_count = unigram.table_count_for(word) as f64;
                let len = word.chars().count() as f64;
                a += table_count * len;
                b += table_count;
            }
        }
        let lambda: f64 = Gamma::new(a, 1.0 / b).expect("invalid gamma parameters").sample(rng);
        self.poisson_lambda = lambda;

        let mut length2count = vec![1u64; self.max_word_length];
        let chars: Vec<String> = match self.char_vpylm.hpylm.restaurant(&[]) {
            Some(unigram) => unigram.words().cloned().collect(),
            None => Vec::new(),
        };
        if chars.is_empty() {
            self.length2prob = vec![1.0 / self.max_word_length as f64; self.max_word_length];
            return;
        }
        let sample_size = 10_000;
        for _ in 0..sample_size {
            let mut k: isize = -1;
            let mut u = vec![self.bow.clone()];
            loop {
                let mut prob_array = vec![0.0; chars.len()];
                let mut sum = 0.0;
                for (idx, ch) in chars.iter().enumerate() {
                    if ch == &self.bow {
                        continue;
                    }
                    if ch == &self.eow && k == -1 {
                        continue;
                    }
                    let (p, _, _) = self.char_vpylm.prob(ch, &u);
                    prob_array[idx] = p;
                    sum += p;
                }
                let r = rng.gen::<f64>() * sum;
                let mut cum = 0.0;
                let mut chosen = 0;
                for (idx, &p) in prob_array.iter().enumerate() {
                    cum += p;
                    if cum > r {
                        chosen = idx;
                        break;
                    }
                    chosen = idx;
                }
                let ch = chars[chosen].clone();
                if ch == self.eow || (k + 1) as usize >= self.max_word_length {
                    break;
                }
                k += 1;
                u.push(ch);
            }
            let len = (k.max(0) as usize).min(self.max_word_length - 1);
            length2count[len] += 1;
        }
        self.length2prob = length2count
            .iter()
            .map(|&c| c as f64 / (sample_size as f64 + self.max_word_length as f64))
            .collect();
    }
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn add_customer_base(
    char_vpylm: &mut Vpylm,
    depth_memory: &mut HashMap<String, VecDeque<Vec<usize>>>,
    bow: &str,
    eow: &str,
    bos: &str,
    eos: &str,
    max_word_length: usize,
    word: &str,
    rng: &mut dyn RngCore,
) {
    if word == bos || word == eos {
        return;
    }
    let chars: Vec<char> = word.chars().collect();
    let mut u = vec![bow.to_string(); max_word_length];
    let mut depths = Vec::with_capacity(chars.len() + 1);
    for &c in &chars {
        let depth = char_vpylm.add_customer(&c.to_string(), &u, rng);
        depths.push(depth);
        u.remove(0);
        u.push(c.to_string());
    }
    let depth = char_vpylm.add_customer(eow, &u, rng);
    depths.push(depth);
    depth_memory.entry(word.to_string()).or_default().push_back(depths);
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn remove_customer_base(
    char_vpylm: &mut Vpylm,
    depth_memory: &mut HashMap<String, VecDeque<Vec<usize>>>,
    bow: &str,
    eow: &str,
    bos: &str,
    eos: &str,
    max_word_length: usize,
    word: &str,
    rng: &mut dyn RngCore,
) {
    if word == bos || word == eos {
        return;
    }
    let chars: Vec<char> = word.chars().collect();
    let depths = {
        let queue = depth_memory
            .get_mut(word)
            .unwrap_or_else(|| panic!("removeCustomerBase: no depth memory for word {word:?}"));
        queue
            .pop_front()
            .unwrap_or_else(|| panic!("removeCustomerBase: depth memory for word {word:?} is empty"))
    };
    if depth_memory.get(word).map(VecDeque::is_empty).unwrap_or(false) {
        depth_memory.remove(word);
    }

    let mut u = vec![bow.to_string(); max_word_length];
    for (i, &c) in chars.iter().enumerate() {
        char_vpylm.remove_customer(&c.to_string(), &u, depths[i], rng);
        u.remove(0);
        u.push(c.to_string());
    }
    char_vpylm.remove_customer(eow, &u, depths[chars.len()], rng);
}

impl crate::baseline::LanguageModel for Npylm {
    fn prob(&self, word: &str, u: &[String]) -> f64 {
        Npylm::prob(self, word, u)
    }
}

/// log-sum-exp with the max-shift trick; empty input is treated as `-inf`.
pub fn logsumexp(scores: &[f64]) -> f64 {
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    let sum: f64 = scores.iter().map(|s| (s - max).exp()).sum();
    sum.ln() + max
}

fn poisson_pmf(lambda: f64, k: u64) -> f64 {
    let kf = k as f64;
    (-lambda + kf * lambda.ln() - ln_factorial(k)).exp()
}

fn ln_factorial(n: u64) -> f64 {
    (1..=n).map(|i| (i as f64).ln()).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn npylm() -> Npylm {
        Npylm::new(1.0, 0.5, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, NpylmConfig::default())
    }

    #[test]
    fn add_then_remove_word_seq_empties_graphs() {
        let mut model = npylm();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let seq = vec!["the".to_string(), "cat".to_string(), "sat".to_string()];
        for _ in 0..3 {
            model.add_word_seq_as_customer(&seq, &mut rng);
        }
        for _ in 0..3 {
            model.remove_word_seq_as_customer(&seq, &mut rng);
        }
        assert_eq!(model.word_hpylm.restaurant_count(), 0);
        assert_eq!(model.char_vpylm.hpylm.restaurant_count(), 0);
        assert!(model.depth_memory.is_empty());
    }

    #[test]
    fn forward_backward_deterministic_without_sampling() {
        let mut model = npylm();
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let sent: Vec<char> = "thecatsat".chars().collect();
        model.initialize(&[sent.clone()], &mut rng);
        let fwd = model.forward(&sent);
        let seq1 = model.backward(&sent, &fwd, false, &mut rng);
        let seq2 = model.backward(&sent, &fwd, false, &mut rng);
        assert_eq!(seq1, seq2);
        assert_eq!(seq1.concat(), sent.iter().collect::<String>());
    }
}
