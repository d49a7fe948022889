use std::collections::{HashMap, VecDeque};

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::hpylm::Hpylm;
use crate::npylm::{add_customer_base, logsumexp, remove_customer_base};
use crate::vpylm::Vpylm;

const DEFAULT_VOCAB_SIZE: usize = 2_097_152;

/// Configuration knobs for [`Pyhsmm`] beyond the raw Pitman-Yor hyperparameters.
#[derive(Debug, Clone, Copy)]
pub struct PyhsmmConfig {
    pub max_word_length: usize,
    pub pos_size: usize,
    /// Size of the character vocabulary the uniform base measure is spread
    /// over (the `-vocabSize` flag, §A2).
    pub vocab_size: usize,
}

impl PyhsmmConfig {
    pub fn new(max_word_length: usize, pos_size: usize) -> Self {
        PyhsmmConfig { max_word_length, pos_size, vocab_size: DEFAULT_VOCAB_SIZE }
    }
}

/// Joint segmentation x part-of-speech model: one word-level HPYLM per latent
/// tag (plus a dedicated EOS specialist), all sharing a single character-level
/// VPYLM, coupled with a tag-transition HPYLM over the tag vocabulary.
///
/// `word_hpylms` has `pos_size + 1` entries: indices `0..pos_size` are the
/// real tags, and index `pos_size` (== `eos_pos`) is the EOS specialist used
/// only to score `p(EOS | last_word)`. `bos_pos = pos_size + 1` is a sentinel
/// tag id used only as transition context for the first word of a sentence;
/// it is never assigned to a real word.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pyhsmm {
    word_hpylms: Vec<Hpylm>,
    char_vpylm: Vpylm,
    pos_hpylm: Hpylm,
    pos_size: usize,
    bos_pos: usize,
    eos_pos: usize,
    max_word_length: usize,
    bos: String,
    eos: String,
    bow: String,
    eow: String,
    depth_memory: HashMap<String, VecDeque<Vec<usize>>>,
}

impl Pyhsmm {
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
        config: PyhsmmConfig,
    ) -> Self {
        let char_base = 1.0 / config.vocab_size as f64;
        let word_hpylms = (0..=config.pos_size)
            .map(|_| Hpylm::new(1, initial_theta, initial_d, gamma_a, gamma_b, beta_a, beta_b, char_base))
            .collect();
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
        // Tag vocabulary has pos_size real tags plus the EOS tag; its context
        // depth is always 1 (bigram transition), base measure uniform over
        // pos_size + 1 possible next tags.
        let pos_hpylm = Hpylm::new(1, initial_theta, initial_d, gamma_a, gamma_b, beta_a, beta_b, 1.0 / (config.pos_size as f64 + 1.0));
        Pyhsmm {
            word_hpylms,
            char_vpylm,
            pos_hpylm,
            pos_size: config.pos_size,
            bos_pos: config.pos_size + 1,
            eos_pos: config.pos_size,
            max_word_length: config.max_word_length,
            bos: "<BOS>".to_string(),
            eos: "<EOS>".to_string(),
            bow: "<BOW>".to_string(),
            eow: "<EOW>".to_string(),
            depth_memory: HashMap::new(),
        }
    }

    pub fn pos_size(&self) -> usize {
        self.pos_size
    }

    pub fn max_word_length(&self) -> usize {
        self.max_word_length
    }

    fn initial_char_context(&self) -> Vec<String> {
        vec![self.bow.clone(); self.max_word_length]
    }

    /// Character-level probability of `word` from the single shared character
    /// model (never per-tag; see module docs).
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
        p * mixed
    }

    fn pos_transition_prob(&self, pos: usize, prev_pos: usize) -> f64 {
        let base = self.pos_hpylm.base;
        self.pos_hpylm.prob(&pos.to_string(), &[prev_pos.to_string()], base).0
    }

    fn word_prob(&self, word: &str, u: &[String], tag: usize, base: f64) -> f64 {
        self.word_hpylms[tag].prob(word, u, base).0
    }

    fn add_word_customer(&mut self, word: &str, u: &[String], tag: usize, rng: &mut impl Rng) {
        let base = self.calc_base(word);
        let bow = self.bow.clone();
        let eow = self.eow.clone();
        let bos = self.bos.clone();
        let eos = self.eos.clone();
        let max_word_length = self.max_word_length;
        let Pyhsmm { word_hpylms, char_vpylm, depth_memory, .. } = self;
        word_hpylms[tag].add_customer(word, u, base, rng, |w, rng| {
            add_customer_base(char_vpylm, depth_memory, &bow, &eow, &bos, &eos, max_word_length, w, rng);
        });
    }

    fn remove_word_customer(&mut self, word: &str, u: &[String], tag: usize, rng: &mut impl Rng) {
        let bow = self.bow.clone();
        let eow = self.eow.clone();
        let bos = self.bos.clone();
        let eos = self.eos.clone();
        let max_word_length = self.max_word_length;
        let Pyhsmm { word_hpylms, char_vpylm, depth_memory, .. } = self;
        word_hpylms[tag].remove_customer(word, u, rng, |w, rng| {
            remove_customer_base(char_vpylm, depth_memory, &bow, &eow, &bos, &eos, max_word_length, w, rng);
        });
    }

    fn add_pos_customer(&mut self, tag: usize, prev_tag: usize, rng: &mut impl Rng) {
        let base = self.pos_hpylm.base;
        self.pos_hpylm.add_customer(&tag.to_string(), &[prev_tag.to_string()], base, rng, |_, _| {});
    }

    fn remove_pos_customer(&mut self, tag: usize, prev_tag: usize, rng: &mut impl Rng) {
        self.pos_hpylm.remove_customer(&tag.to_string(), &[prev_tag.to_string()], rng, |_, _| {});
    }

    pub fn add_word_seq_as_customer(&mut self, word_seq: &[String], pos_seq: &[usize], rng: &mut impl Rng) {
        assert_eq!(word_seq.len(), pos_seq.len(), "word and tag sequences must be the same length");
        for (i, word) in word_seq.iter().enumerate() {
            let tag = pos_seq[i];
            let prev_tag = if i == 0 { self.bos_pos } else { pos_seq[i - 1] };
            let u = if i == 0 { vec![self.bos.clone()] } else { vec![word_seq[i - 1].clone()] };
            self.add_word_customer(word, &u, tag, rng);
            self.add_pos_customer(tag, prev_tag, rng);
        }
        let last_tag = *pos_seq.last().expect("empty tag sequence");
        let u = vec![word_seq.last().expect("empty word sequence").clone()];
        let eos = self.eos.clone();
        let eos_pos = self.eos_pos;
        self.add_word_customer(&eos, &u, eos_pos, rng);
        self.add_pos_customer(eos_pos, last_tag, rng);
    }

    pub fn remove_word_seq_as_customer(&mut self, word_seq: &[String], pos_seq: &[usize], rng: &mut impl Rng) {
        assert_eq!(word_seq.len(), pos_seq.len(), "word and tag sequences must be the same length");
        for (i, word) in word_seq.iter().enumerate() {
            let tag = pos_seq[i];
            let prev_tag = if i == 0 { self.bos_pos } else { pos_seq[i - 1] };
            let u = if i == 0 { vec![self.bos.clone()] } else { vec![word_seq[i - 1].clone()] };
            self.remove_word_customer(word, &u, tag, rng);
            self.remove_pos_customer(tag, prev_tag, rng);
        }
        let last_tag = *pos_seq.last().expect("empty tag sequence");
        let u = vec![word_seq.last().expect("empty word sequence").clone()];
        let eos = self.eos.clone();
        let eos_pos = self.eos_pos;
        self.remove_word_customer(&eos, &u, eos_pos, rng);
        self.remove_pos_customer(eos_pos, last_tag, rng);
    }

    /// Joint forward lattice: `forward[t][k][z]` is the log-sum of scores of
    /// every segmentation x tagging of `sent[0..=t]` whose last word has
    /// length `k+1` and tag `z`.
    pub fn forward(&self, sent: &[char]) -> Vec<Vec<Vec<f64>>> {
        let t_len = sent.len();
        let max_k = self.max_word_length;
        let mut forward = vec![vec![vec![f64::NEG_INFINITY; self.pos_size]; max_k]; t_len];
        for t in 0..t_len {
            for k in 0..max_k {
                if t < k {
                    continue;
                }
                let word: String = sent[(t - k)..=t].iter().collect();
                let base = self.calc_base(&word);
                for z in 0..self.pos_size {
                    if t - k == 0 {
                        let u = vec![self.bos.clone()];
                        let word_score = self.word_prob(&word, &u, z, base);
                        let pos_score = self.pos_transition_prob(z, self.bos_pos);
                        forward[t][k][z] = word_score.ln() + pos_score.ln();
                        continue;
                    }
                    let mut scores = Vec::with_capacity(max_k * self.pos_size);
                    for j in 0..max_k {
                        if t as isize - k as isize - (j as isize + 1) < 0 {
                            continue;
                        }
                        let start = t - k - (j + 1);
                        let end = t - k;
                        let u = vec![sent[start..end].iter().collect::<String>()];
                        for prev_z in 0..self.pos_size {
                            let word_score = self.word_prob(&word, &u, z, base);
                            let pos_score = self.pos_transition_prob(z, prev_z);
                            scores.push(word_score.ln() + pos_score.ln() + forward[t - (k + 1)][j][prev_z]);
                        }
                    }
                    let lse = logsumexp(&scores);
                    forward[t][k][z] = lse - (scores.len() as f64).ln();
                }
            }
        }
        forward
    }

    /// Stochastic (or, if `sampling` is false, greedy) backward traceback
    /// over the joint lattice, yielding both a word sequence and a tag
    /// sequence.
    pub fn backward(
        &self,
        sent: &[char],
        forward: &[Vec<Vec<f64>>],
        sampling: bool,
        rng: &mut impl Rng,
    ) -> (Vec<String>, Vec<usize>) {
        let mut t = sent.len();
        let mut k = 0usize;
        let mut prev_word = self.eos.clone();
        let mut prev_pos = self.eos_pos;
        let mut base = self.char_vpylm.hpylm.base;
        let max_k = self.max_word_length;

        let mut words = Vec::new();
        let mut tags = Vec::new();

        while t.saturating_sub(k) != 0 {
            if prev_word != self.eos {
                base = self.calc_base(&prev_word);
            }
            let mut scores = vec![0.0; max_k * self.pos_size];
            let mut max_score = f64::NEG_INFINITY;
            let mut max_choice = None;
            let mut sum = 0.0;
            for j in 0..max_k {
                if t < k + j + 1 {
                    continue;
                }
                let start = t - k - (j + 1);
                let end = t - k;
                let u = vec![sent[start..end].iter().collect::<String>()];
                for prev_z in 0..self.pos_size {
                    let word_score = self.word_prob(&prev_word, &u, prev_pos, base);
                    let pos_score = self.pos_transition_prob(prev_pos, prev_z);
                    let score = word_score.ln() + pos_score.ln() + forward[t - (k + 1)][j][prev_z];
                    let idx = j * self.pos_size + prev_z;
                    if score > max_score {
                        max_score = score;
                        max_choice = Some((j, prev_z));
                    }
                    let exp_score = score.exp();
                    scores[idx] = exp_score;
                    sum += exp_score;
                }
            }
            let (j, z) = if sampling {
                let r = rng.gen::<f64>() * sum;
                let mut cum = 0.0;
                let mut chosen = None;
                'outer: for j in 0..max_k {
                    for prev_z in 0..self.pos_size {
                        cum += scores[j * self.pos_size + prev_z];
                        if cum > r {
                            chosen = Some((j, prev_z));
                            break 'outer;
                        }
                    }
                }
                chosen.expect("sampling error in PYHSMM::backward")
            } else {
                max_choice.expect("no valid predecessor in PYHSMM::backward")
            };
            let start = t - k - (j + 1);
            let end = t - k;
            let word: String = sent[start..end].iter().collect();
            words.push(word.clone());
            tags.push(z);
            prev_word = word;
            prev_pos = z;
            t -= k + 1;
            k = j;
        }
        words.reverse();
        tags.reverse();
        (words, tags)
    }

    /// Reduced forward over tags alone, for resampling POS tags against an
    /// already-fixed word segmentation. `forward[t][z]`.
    pub fn forward_pos_only(&self, word_seq: &[String]) -> Vec<Vec<f64>> {
        let t_len = word_seq.len();
        let mut forward = vec![vec![0.0f64; self.pos_size]; t_len];
        for t in 0..t_len {
            let word = &word_seq[t];
            let base = self.calc_base(word);
            for z in 0..self.pos_size {
                if t == 0 {
                    let u = vec![self.bos.clone()];
                    let word_score = self.word_prob(word, &u, z, base);
                    let pos_score = self.pos_transition_prob(z, self.bos_pos);
                    forward[t][z] = word_score.ln() + pos_score.ln();
                    continue;
                }
                let u = vec![word_seq[t - 1].clone()];
                let mut scores = Vec::with_capacity(self.pos_size);
                for prev_z in 0..self.pos_size {
                    let word_score = self.word_prob(word, &u, z, base);
                    let pos_score = self.pos_transition_prob(z, prev_z);
                    scores.push(word_score.ln() + pos_score.ln() + forward[t - 1][prev_z]);
                }
                forward[t][z] = logsumexp(&scores);
            }
        }
        forward
    }

    /// Backward traceback over the tag-only lattice; returns a resampled tag
    /// sequence for the fixed `word_seq`.
    pub fn backward_pos_only(
        &self,
        word_seq: &[String],
        forward: &[Vec<f64>],
        sampling: bool,
        rng: &mut impl Rng,
    ) -> Vec<usize> {
        let t_len = word_seq.len();
        let mut tags = vec![0usize; t_len];
        let mut next_pos = self.eos_pos;
        for t in (0..t_len).rev() {
            let mut scores = vec![0.0; self.pos_size];
            let mut sum = 0.0;
            let mut max_score = f64::NEG_INFINITY;
            let mut max_z = 0;
            for z in 0..self.pos_size {
                let pos_score = self.pos_transition_prob(next_pos, z);
                let score = pos_score.ln() + forward[t][z];
                if score > max_score {
                    max_score = score;
                    max_z = z;
                }
                let exp_score = score.exp();
                scores[z] = exp_score;
                sum += exp_score;
            }
            let z = if sampling {
                let r = rng.gen::<f64>() * sum;
                let mut cum = 0.0;
                let mut chosen = 0;
                for (idx, &s) in scores.iter().enumerate() {
                    cum += s;
                    chosen = idx;
                    if cum > r {
                        break;
                    }
                }
                chosen
            } else {
                max_z
            };
            tags[t] = z;
            next_pos = z;
        }
        tags
    }

    /// Random span/tag initialization: each sentence is split into spans of
    /// length drawn uniformly from `[1, max_word_length]`, each assigned a
    /// uniformly random tag.
    pub fn initialize(&mut self, sents: &[Vec<char>], rng: &mut impl Rng) -> (Vec<Vec<String>>, Vec<Vec<usize>>) {
        let mut word_seqs = Vec::with_capacity(sents.len());
        let mut pos_seqs = Vec::with_capacity(sents.len());
        for sent in sents {
            let mut words = Vec::new();
            let mut tags = Vec::new();
            let mut start = 0;
            while start < sent.len() {
                let r = rng.gen_range(1..=self.max_word_length);
                let end = (start + r).min(sent.len());
                words.push(sent[start..end].iter().collect::<String>());
                tags.push(rng.gen_range(0..self.pos_size));
                start = end;
            }
            self.add_word_seq_as_customer(&words, &tags, rng);
            word_seqs.push(words);
            pos_seqs.push(tags);
        }
        (word_seqs, pos_seqs)
    }

    /// Initializes from annotated (already-segmented, optionally tagged)
    /// data; a word longer than `max_word_length` is split into fixed-length
    /// chunks that each inherit the parent word's tag (see DESIGN.md).
    pub fn initialize_from_annotated_data(
        &mut self,
        word_seqs: &[Vec<String>],
        pos_seqs: &[Vec<usize>],
        rng: &mut impl Rng,
    ) -> (Vec<Vec<String>>, Vec<Vec<usize>>) {
        let mut adjusted_words = Vec::with_capacity(word_seqs.len());
        let mut adjusted_tags = Vec::with_capacity(word_seqs.len());
        for (word_seq, tag_seq) in word_seqs.iter().zip(pos_seqs.iter()) {
            let mut words = Vec::new();
            let mut tags = Vec::new();
            for (word, &tag) in word_seq.iter().zip(tag_seq.iter()) {
                let chars: Vec<char> = word.chars().collect();
                if chars.len() < self.max_word_length {
                    words.push(word.clone());
                    tags.push(tag);
                } else {
                    let mut start = 0;
                    while start < chars.len() {
                        let end = (start + self.max_word_length).min(chars.len());
                        words.push(chars[start..end].iter().collect::<String>());
                        tags.push(tag);
                        start = end;
                    }
                }
            }
            self.add_word_seq_as_customer(&words, &tags, rng);
            adjusted_words.push(words);
            adjusted_tags.push(tags);
        }
        (adjusted_words, adjusted_tags)
    }

    /// 5-dimensional log-score feature array `g_feats[t][k][z][j][r]` for an
    /// external discriminative model: `log p(w_{t-k..t} | prev word of
    /// length j+1, tag z) + log p(z | tag r)`, clamped below at
    /// `lower_bound`. `sent` is an already word-tokenized sentence (the API
    /// consumes segmented text, unlike `forward`/`backward`).
    pub fn generative_features(&self, sent: &[String], lower_bound: f64) -> Vec<Vec<Vec<Vec<Vec<f64>>>>> {
        let t_len = sent.len();
        let max_k = self.max_word_length;
        let tag_dim = self.pos_size + 2; // real tags + eos_pos + bos_pos
        let mut g_feats =
            vec![vec![vec![vec![vec![lower_bound; tag_dim]; max_k]; tag_dim]; max_k]; t_len + 1];

        for t in 0..t_len {
            for k in 0..max_k {
                if t < k {
                    continue;
                }
                let start = t - k;
                let word: String = sent[start..=t].join("");
                let base = self.calc_base(&word);
                for z in 0..self.pos_size {
                    if start == 0 {
                        let u = vec![self.bos.clone()];
                        let score = self.word_prob(&word, &u, z, base).ln()
                            + self.pos_transition_prob(z, self.bos_pos).ln();
                        let score = if score.is_nan() { lower_bound } else { score.max(lower_bound) };
                        g_feats[t][k][z][0][self.bos_pos] = score;
                        continue;
                    }
                    for j in 0..max_k {
                        if start < j + 1 {
                            continue;
                        }
                        let u = vec![sent[(start - j - 1)..start].join("")];
                        for prev_z in 0..self.pos_size {
                            let score = self.word_prob(&word, &u, z, base).ln()
                                + self.pos_transition_prob(z, prev_z).ln();
                            let score = if score.is_nan() { lower_bound } else { score.max(lower_bound) };
                            g_feats[t][k][z][j][prev_z] = score;
                        }
                    }
                }
            }
        }

        let t = t_len;
        let k = 0;
        let base = self.char_vpylm.hpylm.base;
        for j in 0..max_k {
            if t < j + 1 {
                continue;
            }
            let u = vec![sent[(t - j - 1)..t].join("")];
            for prev_z in 0..self.pos_size {
                let word_score = self.word_prob(&self.eos, &u, self.eos_pos, base).ln();
                let pos_score = self.pos_transition_prob(self.eos_pos, prev_z).ln();
                let score = word_score + pos_score;
                let score = if score.is_nan() { lower_bound } else { score.max(lower_bound) };
                g_feats[t][k][self.eos_pos][j][prev_z] = score;
            }
        }

        g_feats
    }

    /// Resamples discount/concentration hyperparameters across every
    /// per-tag word HPYLM, the shared character VPYLM's inner HPYLM, and
    /// the tag-transition HPYLM (§4.7, run once per epoch).
    pub fn resample_hyperparameters(&mut self, rng: &mut impl Rng) {
        for hp in &mut self.word_hpylms {
            hp.estimate_hyperparameters(rng);
        }
        self.char_vpylm.hpylm.estimate_hyperparameters(rng);
        self.pos_hpylm.estimate_hyperparameters(rng);
    }

    /// Backward sampling against an externally supplied combined score
    /// lattice (generative forward scores plus a discriminative model's
    /// scores), committing the sampled words/tags as customers. Mirrors
    /// `backward`/`add_word_seq_as_customer` but takes the score table
    /// directly instead of recomputing it from `forward`.
    pub fn add_customer_using_external_scores(
        &mut self,
        sent: &[char],
        combined_scores: &[Vec<Vec<f64>>],
        rng: &mut impl Rng,
    ) -> (Vec<String>, Vec<usize>) {
        let (words, tags) = self.backward(sent, combined_scores, true, rng);
        self.add_word_seq_as_customer(&words, &tags, rng);
        (words, tags)
    }

    /// Base-2 geometric average of model probability (§6) over `sents`,
    /// decoding each deterministically and scoring the resulting word/tag
    /// sequence under the joint word x transition model. Used only for the
    /// perplexity-ordering comparison in §8 scenario 5.
    pub fn perplexity(&self, sents: &[Vec<char>], seed: u64) -> f64 {
        let mut rng = <rand_chacha::ChaCha8Rng as rand::SeedableRng>::seed_from_u64(seed);
        let mut log_sum = 0.0f64;
        let mut word_count = 0usize;
        for sent in sents {
            let forward = self.forward(sent);
            let (words, tags) = self.backward(sent, &forward, false, &mut rng);
            let mut prev_word = self.bos.clone();
            let mut prev_tag = self.bos_pos;
            for (word, &tag) in words.iter().zip(tags.iter()) {
                let base = self.calc_base(word);
                let u = vec![prev_word.clone()];
                let wp = self.word_prob(word, &u, tag, base);
                let tp = self.pos_transition_prob(tag, prev_tag);
                log_sum += (wp * tp).log2();
                word_count += 1;
                prev_word = word.clone();
                prev_tag = tag;
            }
            let base = self.char_vpylm.hpylm.base;
            let eos = self.eos.clone();
            let u = vec![prev_word];
            let wp = self.word_prob(&eos, &u, self.eos_pos, base);
            let tp = self.pos_transition_prob(self.eos_pos, prev_tag);
            log_sum += (wp * tp).log2();
            word_count += 1;
        }
        2f64.powf(-log_sum / word_count.max(1) as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn model() -> Pyhsmm {
        Pyhsmm::new(
            1.0, 0.5, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0,
            PyhsmmConfig::new(8, 3),
        )
    }

    #[test]
    fn add_then_remove_word_and_tag_seq_empties_graphs() {
        let mut model = model();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let words = vec!["the".to_string(), "cat".to_string(), "sat".to_string()];
        let tags = vec![0usize, 1, 2];
        for _ in 0..3 {
            model.add_word_seq_as_customer(&words, &tags, &mut rng);
        }
        for _ in 0..3 {
            model.remove_word_seq_as_customer(&words, &tags, &mut rng);
        }
        for hp in &model.word_hpylms {
            assert_eq!(hp.restaurant_count(), 0);
        }
        assert_eq!(model.char_vpylm.hpylm.restaurant_count(), 0);
        assert_eq!(model.pos_hpylm.restaurant_count(), 0);
        assert!(model.depth_memory.is_empty());
    }

    #[test]
    fn forward_backward_deterministic_without_sampling() {
        let mut model = model();
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let sent: Vec<char> = "thecatsat".chars().collect();
        model.initialize(&[sent.clone()], &mut rng);
        let fwd = model.forward(&sent);
        let (words1, tags1) = model.backward(&sent, &fwd, false, &mut rng);
        let (words2, tags2) = model.backward(&sent, &fwd, false, &mut rng);
        assert_eq!(words1, words2);
        assert_eq!(tags1, tags2);
        assert_eq!(words1.concat(), sent.iter().collect::<String>());
    }

    #[test]
    fn pos_only_resampling_preserves_word_boundaries() {
        let mut model = model();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let words = vec!["the".to_string(), "cat".to_string(), "sat".to_string()];
        let tags = vec![0usize, 1, 2];
        model.add_word_seq_as_customer(&words, &tags, &mut rng);
        let fwd = model.forward_pos_only(&words);
        let tags2 = model.backward_pos_only(&words, &fwd, false, &mut rng);
        assert_eq!(tags2.len(), words.len());
    }
}
