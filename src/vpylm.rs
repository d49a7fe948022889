use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::hpylm::Hpylm;

/// A variable-order Pitman-Yor language model: wraps an [`Hpylm`] and samples
/// an effective n-gram depth per customer via stop/pass statistics, rather
/// than always conditioning on the full context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vpylm {
    pub hpylm: Hpylm,
    alpha: f64,
    beta: f64,
}

impl Vpylm {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        max_depth: usize,
        initial_theta: f64,
        initial_d: f64,
        gamma_a: f64,
        gamma_b: f64,
        beta_a: f64,
        beta_b: f64,
        base: f64,
        alpha: f64,
        beta: f64,
    ) -> Self {
        Vpylm {
            hpylm: Hpylm::new(max_depth, initial_theta, initial_d, gamma_a, gamma_b, beta_a, beta_b, base),
            alpha,
            beta,
        }
    }

    /// Samples a depth and adds `word` as a customer of context `u[len(u)-depth..]`.
    /// Returns the sampled depth so callers (NPYLM's depth memory) can later
    /// undo the exact same traversal.
    pub fn add_customer(&mut self, word: &str, u: &[String], rng: &mut impl Rng) -> usize {
        let (_, _, probs) = self.prob(word, u);
        let sum_score: f64 = probs.iter().sum();
        let r = rng.gen::<f64>() * sum_score;
        let mut cum = 0.0;
        let mut depth = 0;
        loop {
            cum += probs[depth];
            if cum > r {
                break;
            }
            depth += 1;
            if depth > self.hpylm.max_depth() {
                panic!("sampling error in VPYLM::add_customer");
            }
        }
        let base = self.hpylm.base;
        let ctx = &u[u.len() - depth..];
        self.hpylm.add_customer(word, ctx, base, rng, |_, _| {});
        self.hpylm.add_stop_and_pass_count(ctx);
        depth
    }

    pub fn remove_customer(&mut self, word: &str, u: &[String], prev_sampled_depth: usize, rng: &mut impl Rng) {
        let ctx = &u[u.len() - prev_sampled_depth..];
        self.hpylm.remove_stop_and_pass_count(ctx);
        self.hpylm.remove_customer(word, ctx, rng, |_, _| {});
    }

    /// Returns `(p, p_ngrams, probs)`: total probability, per-depth n-gram
    /// probabilities, and per-depth stop-weighted probabilities.
    pub fn prob(&self, word: &str, u: &[String]) -> (f64, Vec<f64>, Vec<f64>) {
        let base = self.hpylm.base;
        let (_, p_ngrams) = self.hpylm.prob(word, u, base);

        let stop_probs = self.calc_stop_probs(u);
        let mut probs = vec![0.0; u.len() + 1];
        let mut p_pass = 1.0;
        let mut p = 0.0;
        for (i, &p_ngram) in p_ngrams.iter().enumerate() {
            let p_stop = stop_probs[i] * p_pass;
            probs[i] = p_stop * p_ngram;
            p += probs[i];
            p_pass *= 1.0 - stop_probs[i];
        }
        (p, p_ngrams, probs)
    }

    fn calc_stop_probs(&self, u: &[String]) -> Vec<f64> {
        assert!(u.len() <= self.hpylm.max_depth(), "maximum depth error");
        let mut stop_probs = vec![0.0; u.len() + 1];
        for i in 0..=u.len() {
            let ctx = &u[i..];
            let (stop, pass) = match self.hpylm.restaurant(ctx) {
                Some(rst) => (rst.stop as f64, rst.pass as f64),
                None => (0.0, 0.0),
            };
            let p = (stop + self.alpha) / (stop + pass + self.alpha + self.beta);
            stop_probs[u.len() - i] = p;
        }
        stop_probs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn ctx(words: &[&str]) -> Vec<String> {
        words.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn stop_prob_at_empty_graph_is_alpha_over_alpha_plus_beta() {
        let vpylm = Vpylm::new(3, 1.0, 0.1, 1.0, 1.0, 1.0, 1.0, 0.1, 2.0, 3.0);
        let stop_probs = vpylm.calc_stop_probs(&ctx(&["a", "b"]));
        for p in stop_probs {
            assert_relative_eq!(p, 2.0 / 5.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn add_remove_round_trip_restores_probability() {
        let mut vpylm = Vpylm::new(3, 1.0, 0.1, 1.0, 1.0, 1.0, 1.0, 0.1, 2.0, 3.0);
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let u = ctx(&["a", "b", "c"]);
        let (p_before, _, _) = vpylm.prob("x", &u);
        let depth = vpylm.add_customer("x", &u, &mut rng);
        vpylm.remove_customer("x", &u, depth, &mut rng);
        let (p_after, _, _) = vpylm.prob("x", &u);
        assert_relative_eq!(p_before, p_after, epsilon = 1e-9);
        assert_eq!(vpylm.hpylm.restaurant_count(), 0);
    }
}
