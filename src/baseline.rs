use std::collections::HashMap;

/// Common interface shared by the Bayesian nonparametric models and the
/// baseline n-gram, so perplexity comparisons (§8 scenario 5) can be written
/// once against the trait rather than against each concrete model.
pub trait LanguageModel {
    /// Probability of `word` given the preceding context `u` (oldest token
    /// first, nearest-context-last, matching the HPYLM convention).
    fn prob(&self, word: &str, u: &[String]) -> f64;
}

/// A fixed-order, linearly-interpolated Markov n-gram model: maximum
/// likelihood estimates at each order, mixed with a fixed set of weights
/// from the highest order down to the uniform unigram fallback. Used only as
/// a non-Bayesian comparison point for perplexity ordering in tests; it is
/// not part of the Gibbs-sampled training loop.
pub struct InterpolatedNgram {
    order: usize,
    vocab_size: usize,
    /// `counts[n]` maps a context of length `n` (joined the same way HPYLM
    /// does) to a per-word count map, for n in 0..order.
    counts: Vec<HashMap<String, HashMap<String, u64>>>,
    context_totals: Vec<HashMap<String, u64>>,
    /// `order + 2` interpolation weights, highest order first, ending with
    /// the weight given to the uniform `1/vocab_size` floor; must sum to 1.
    lambdas: Vec<f64>,
}

const SEPARATOR: &str = "\u{1}";

fn context_key(u: &[String]) -> String {
    u.join(SEPARATOR)
}

impl InterpolatedNgram {
    /// `order` is the number of conditioning tokens (e.g. `order = 2` is a
    /// trigram model). `lambdas` must have `order + 2` entries, highest order
    /// first, ending with the weight given to the uniform floor.
    pub fn new(order: usize, vocab_size: usize, lambdas: Vec<f64>) -> Self {
        assert_eq!(lambdas.len(), order + 2, "need one lambda per order plus the uniform floor");
        let total: f64 = lambdas.iter().sum();
        assert!((total - 1.0).abs() < 1e-6, "lambdas must sum to 1.0");
        InterpolatedNgram {
            order,
            vocab_size,
            counts: vec![HashMap::new(); order + 1],
            context_totals: vec![HashMap::new(); order + 1],
            lambdas,
        }
    }

    /// Trains maximum-likelihood counts at every order from `order` down to
    /// unigram, over a corpus of already-segmented sentences (each
    /// surrounded implicitly by one `bos`/`eos` pair).
    pub fn train(&mut self, sentences: &[Vec<String>], bos: &str, eos: &str) {
        for sent in sentences {
            let mut padded = vec![bos.to_string(); self.order];
            padded.extend(sent.iter().cloned());
            padded.push(eos.to_string());
            for i in self.order..padded.len() {
                let word = &padded[i];
                for n in 0..=self.order {
                    let ctx = &padded[i - n..i];
                    let key = context_key(ctx);
                    *self.counts[n].entry(key.clone()).or_default().entry(word.clone()).or_insert(0) += 1;
                    *self.context_totals[n].entry(key).or_insert(0) += 1;
                }
            }
        }
    }

    fn mle(&self, n: usize, word: &str, ctx: &[String]) -> f64 {
        let key = context_key(ctx);
        let total = match self.context_totals[n].get(&key) {
            Some(&t) if t > 0 => t,
            _ => return 0.0,
        };
        let count = self.counts[n].get(&key).and_then(|m| m.get(word)).copied().unwrap_or(0);
        count as f64 / total as f64
    }
}

impl LanguageModel for InterpolatedNgram {
    fn prob(&self, word: &str, u: &[String]) -> f64 {
        let uniform = 1.0 / self.vocab_size as f64;
        let mut p = self.lambdas[self.order + 1] * uniform;
        for n in 0..=self.order {
            let take = n.min(u.len());
            let ctx = &u[u.len() - take..];
            p += self.lambdas[self.order - n] * self.mle(n, word, ctx);
        }
        p.max(f64::MIN_POSITIVE)
    }
}

/// Base-2 geometric average of model probability over already-segmented
/// word sequences (§6): `2^(-1/W * sum_i log2 p(w_i | context_i))`, summed
/// over every word including a trailing `eos` per sentence.
pub fn perplexity(model: &impl LanguageModel, word_seqs: &[Vec<String>], bos: &str, eos: &str) -> f64 {
    let mut log_sum = 0.0f64;
    let mut word_count = 0usize;
    for seq in word_seqs {
        let mut prev = bos.to_string();
        for word in seq {
            log_sum += model.prob(word, &[prev.clone()]).log2();
            word_count += 1;
            prev = word.clone();
        }
        log_sum += model.prob(eos, &[prev]).log2();
        word_count += 1;
    }
    2f64.powf(-log_sum / word_count.max(1) as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sent(words: &[&str]) -> Vec<String> {
        words.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn seen_bigram_has_higher_probability_than_unseen_one() {
        let mut model = InterpolatedNgram::new(1, 1000, vec![0.7, 0.25, 0.05]);
        model.train(
            &[sent(&["the", "cat", "sat"]), sent(&["the", "cat", "ran"])],
            "<s>",
            "</s>",
        );
        let seen = model.prob("cat", &["the".to_string()]);
        let unseen = model.prob("zebra", &["the".to_string()]);
        assert!(seen > unseen);
    }

    #[test]
    fn prob_is_never_exactly_zero() {
        let mut model = InterpolatedNgram::new(2, 500, vec![0.6, 0.25, 0.1, 0.05]);
        model.train(&[sent(&["the", "cat", "sat"])], "<s>", "</s>");
        let p = model.prob("anything", &["unseen".to_string(), "context".to_string()]);
        assert!(p > 0.0);
    }
}
