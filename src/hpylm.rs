use std::collections::HashMap;

use rand::{Rng, RngCore};
use rand_distr::{Bernoulli, Beta, Distribution, Gamma};
use serde::{Deserialize, Serialize};

use crate::restaurant::Restaurant;

/// Separator used to join a context's tokens into a single map key. Contexts
/// never contain this byte in practice (characters/words/tag ids are always
/// escaped or numeric), so it is safe as a flat-map key delimiter.
const CONTEXT_SEPARATOR: &str = "\u{1}";

fn context_key(u: &[String]) -> String {
    u.join(CONTEXT_SEPARATOR)
}

/// A hierarchical Pitman-Yor language model: a map from context to
/// [`Restaurant`], plus per-depth discount/concentration hyperparameters and
/// the Gamma/Beta priors used to resample them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hpylm {
    restaurants: HashMap<String, Restaurant>,
    max_depth: usize,
    theta: Vec<f64>,
    d: Vec<f64>,
    gamma_a: Vec<f64>,
    gamma_b: Vec<f64>,
    beta_a: Vec<f64>,
    beta_b: Vec<f64>,
    pub base: f64,
}

impl Hpylm {
    pub fn new(
        max_depth: usize,
        initial_theta: f64,
        initial_d: f64,
        gamma_a: f64,
        gamma_b: f64,
        beta_a: f64,
        beta_b: f64,
        base: f64,
    ) -> Self {
        assert!(initial_d > 0.0 && initial_d < 1.0, "range of initial_d is 0.0 to 1.0");
        assert!(initial_theta > 0.0, "range of initial_theta is 0.0 to inf");
        assert!(base > 0.0 && base < 1.0, "range of base is 0.0 to 1.0");
        let n = max_depth + 1;
        Hpylm {
            restaurants: HashMap::new(),
            max_depth,
            theta: vec![initial_theta; n],
            d: vec![initial_d; n],
            gamma_a: vec![gamma_a; n],
            gamma_b: vec![gamma_b; n],
            beta_a: vec![beta_a; n],
            beta_b: vec![beta_b; n],
            base,
        }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn restaurant_count(&self) -> usize {
        self.restaurants.len()
    }

    /// Probability of `word` given context `u`, under base measure `base`.
    /// Returns the final probability plus the per-depth probability vector
    /// (index 0 = root/unigram, index `len(u)` = the full context).
    pub fn prob(&self, word: &str, u: &[String], base: f64) -> (f64, Vec<f64>) {
        assert!(u.len() <= self.max_depth, "maximum depth exceeded");
        let mut prob_bodies = vec![0.0; u.len() + 1];
        let mut smoothing = vec![1.0; u.len() + 1];
        for n in 0..=u.len() {
            let ctx = &u[u.len() - n..];
            let theta = self.theta[n];
            let d = self.d[n];
            if let Some(rst) = self.restaurants.get(&context_key(ctx)) {
                let cust = rst.customer_count_for(word) as f64;
                let tbls = rst.table_count_for(word) as f64;
                prob_bodies[n] = (cust - d * tbls) / (theta + rst.total_customer_count() as f64);
                smoothing[n] =
                    (theta + d * rst.total_table_count() as f64) / (theta + rst.total_customer_count() as f64);
            }
        }
        let mut p = base;
        let mut probs = vec![0.0; u.len() + 1];
        for n in 0..=u.len() {
            p = prob_bodies[n] + smoothing[n] * p;
            probs[n] = p;
        }
        (p + f64::MIN_POSITIVE, probs)
    }

    /// Adds one customer of `word` in context `u`, recursing from the fully
    /// specified context down to the root. `add_base` fires exactly when the
    /// recursion discovers a new base-measure hit at the unigram.
    pub fn add_customer(
        &mut self,
        word: &str,
        u: &[String],
        base: f64,
        rng: &mut impl Rng,
        mut add_base: impl FnMut(&str, &mut dyn RngCore),
    ) {
        let (_, probs) = self.prob(word, u, base);
        self.add_customer_recursively(word, u, &probs, base, rng, &mut add_base);
    }

    fn add_customer_recursively(
        &mut self,
        word: &str,
        u: &[String],
        probs: &[f64],
        base: f64,
        rng: &mut impl Rng,
        add_base: &mut dyn FnMut(&str, &mut dyn RngCore),
    ) {
        let n = u.len();
        let theta = self.theta[n];
        let d = self.d[n];
        let rst = self.restaurants.entry(context_key(u)).or_default();

        let table_count = rst.table_count_for(word) as usize;
        let mut score_array = vec![0.0; table_count + 1];
        let mut sum_score = 0.0;
        for (k, &tbl) in rst.tables_for(word).iter().enumerate() {
            score_array[k] = (tbl as f64 - d).max(0.0);
            sum_score += score_array[k];
        }
        let smoothing =
            (theta + d * rst.total_table_count() as f64) / (theta + rst.total_customer_count() as f64);
        let new_table_score = if n == 0 {
            smoothing * base + f64::MIN_POSITIVE
        } else {
            smoothing * probs[n - 1] + f64::MIN_POSITIVE
        };
        score_array[table_count] = new_table_score;
        sum_score += new_table_score;

        let r = rng.gen::<f64>() * sum_score;
        let mut cum = 0.0;
        let mut k = 0;
        loop {
            cum += score_array[k];
            if cum > r {
                break;
            }
            k += 1;
            if k > table_count {
                panic!("sampling error in HPYLM::add_customer");
            }
        }

        let added_table = rst.add_customer(word, k);
        if added_table {
            if n > 0 {
                self.add_customer_recursively(word, &u[1..], probs, base, rng, add_base);
            } else {
                add_base(word, rng);
            }
        }
    }

    /// Removes one customer of `word` from context `u`, recursing down to the
    /// root. `remove_base` mirrors `add_base` in [`Hpylm::add_customer`].
    pub fn remove_customer(
        &mut self,
        word: &str,
        u: &[String],
        rng: &mut impl Rng,
        mut remove_base: impl FnMut(&str, &mut dyn RngCore),
    ) {
        self.remove_customer_recursively(word, u, rng, &mut remove_base);
    }

    fn remove_customer_recursively(
        &mut self,
        word: &str,
        u: &[String],
        rng: &mut impl Rng,
        remove_base: &mut dyn FnMut(&str, &mut dyn RngCore),
    ) {
        let key = context_key(u);
        let rst = self
            .restaurants
            .get_mut(&key)
            .unwrap_or_else(|| panic!("remove error: context {u:?} does not exist in HPYLM"));

        let tables = rst.tables_for(word).to_vec();
        assert!(!tables.is_empty(), "remove error: word {word:?} does not exist in context {u:?}");
        let sum_score: u32 = tables.iter().sum();
        let r = rng.gen_range(0..sum_score.max(1));
        let mut cum = 0u32;
        let mut k = 0;
        loop {
            cum += tables[k];
            if cum > r {
                break;
            }
            k += 1;
            if k >= tables.len() {
                panic!("sampling error in HPYLM::remove_customer");
            }
        }

        let (removed_table, restaurant_empty) = rst.remove_customer(word, k);
        if restaurant_empty {
            self.restaurants.remove(&key);
        }
        if removed_table {
            if u.len() > 0 {
                self.remove_customer_recursively(word, &u[1..], rng, remove_base);
            } else {
                remove_base(word, rng);
            }
        }
    }

    pub fn add_stop_and_pass_count(&mut self, u: &[String]) {
        self.restaurants
            .get_mut(&context_key(u))
            .unwrap_or_else(|| panic!("addStopAndPassCount: context {u:?} does not exist"))
            .stop += 1;
        for i in 1..=u.len() {
            self.restaurants
                .get_mut(&context_key(&u[i..]))
                .unwrap_or_else(|| panic!("addStopAndPassCount: context {:?} does not exist", &u[i..]))
                .pass += 1;
        }
    }

    pub fn remove_stop_and_pass_count(&mut self, u: &[String]) {
        {
            let rst = self
                .restaurants
                .get_mut(&context_key(u))
                .unwrap_or_else(|| panic!("removeStopAndPassCount: context {u:?} does not exist"));
            assert!(rst.stop > 0, "removeStopAndPassCount: stop count already zero for {u:?}");
            rst.stop -= 1;
        }
        for i in 1..=u.len() {
            let ctx = &u[i..];
            let rst = self
                .restaurants
                .get_mut(&context_key(ctx))
                .unwrap_or_else(|| panic!("removeStopAndPassCount: context {ctx:?} does not exist"));
            assert!(rst.pass > 0, "removeStopAndPassCount: pass count already zero for {ctx:?}");
            rst.pass -= 1;
        }
    }

    pub fn restaurant(&self, u: &[String]) -> Option<&Restaurant> {
        self.restaurants.get(&context_key(u))
    }

    /// Auxiliary-variable resampling of discount/concentration per depth
    /// (Teh's HPYLM hyperparameter sampling scheme).
    pub fn estimate_hyperparameters(&mut self, rng: &mut impl Rng) {
        let mut contexts_by_depth: Vec<Vec<String>> = vec![Vec::new(); self.max_depth + 1];
        for key in self.restaurants.keys() {
            let depth = if key.is_empty() { 0 } else { key.matches(CONTEXT_SEPARATOR).count() + 1 };
            contexts_by_depth[depth].push(key.clone());
        }

        for n in 0..=self.max_depth {
            let theta_n = self.theta[n];
            let d_n = self.d[n];
            let mut a_theta = self.gamma_a[n];
            let mut b_theta = self.gamma_b[n];
            let mut a_d = self.beta_a[n];
            let mut b_d = self.beta_b[n];

            for key in &contexts_by_depth[n] {
                let rst = &self.restaurants[key];
                let total_table_count = rst.total_table_count();
                if total_table_count < 2 {
                    continue;
                }
                let beta = Beta::new(theta_n + 1.0, (rst.total_customer_count() as f64 - 1.0).max(f64::MIN_POSITIVE))
                    .expect("invalid beta parameters in hyperparameter resampling");
                let x_u: f64 = beta.sample(rng);
                for t in 1..total_table_count {
                    let p = (theta_n / (theta_n + d_n * t as f64)).clamp(0.0, 1.0);
                    let y = Bernoulli::new(p).unwrap().sample(rng);
                    if y {
                        a_theta += 1.0;
                    } else {
                        a_d += 1.0;
                    }
                    b_theta -= x_u.ln();
                }
                for word in rst.words() {
                    for &count in rst.tables_for(word) {
                        if count < 2 {
                            continue;
                        }
                        for j in 1..count {
                            let p = ((j as f64 - 1.0) / (j as f64 - d_n)).clamp(0.0, 1.0);
                            let z = Bernoulli::new(p).unwrap().sample(rng);
                            if !z {
                                b_d += 1.0;
                            }
                        }
                    }
                }
            }

            let theta_new: f64 = Gamma::new(a_theta, 1.0 / b_theta.max(f64::MIN_POSITIVE))
                .expect("invalid gamma parameters")
                .sample(rng);
            let d_new: f64 = Beta::new(a_d, b_d).expect("invalid beta parameters").sample(rng);
            assert!(theta_new >= 0.0, "theta estimation error");
            assert!(d_new >= 0.0, "d estimation error");
            self.theta[n] = theta_new;
            self.d[n] = d_new;
        }
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
    fn prob_before_any_adds_equals_base() {
        let hpylm = Hpylm::new(2, 1.0, 0.1, 1.0, 1.0, 1.0, 1.0, 0.1);
        let (p, _) = hpylm.prob("abc", &ctx(&["fgh", "de"]), 0.1);
        assert_relative_eq!(p, 0.1, epsilon = 1e-12);
    }

    #[test]
    fn prob_after_one_add_matches_closed_form() {
        let mut hpylm = Hpylm::new(2, 1.0, 0.1, 1.0, 1.0, 1.0, 1.0, 0.1);
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let u = ctx(&["fgh", "de"]);
        hpylm.add_customer("abc", &u, 0.1, &mut rng, |_, _| {});
        let (p, _) = hpylm.prob("abc", &u, 0.1);
        let b = (1.0 - 0.1) / (1.0 + 1.0);
        let s = (1.0 + 0.1) / (1.0 + 1.0);
        let expected = b + s * (b + s * (b + s * 0.1));
        assert_relative_eq!(p, expected, epsilon = 1e-9);
    }

    #[test]
    fn add_then_remove_returns_to_base_and_empties_graph() {
        let mut hpylm = Hpylm::new(2, 1.0, 0.1, 1.0, 1.0, 1.0, 1.0, 0.1);
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let u = ctx(&["fgh", "de"]);
        for _ in 0..5 {
            hpylm.add_customer("abc", &u, 0.1, &mut rng, |_, _| {});
        }
        for _ in 0..5 {
            hpylm.remove_customer("abc", &u, &mut rng, |_, _| {});
        }
        let (p, _) = hpylm.prob("abc", &u, 0.1);
        assert_relative_eq!(p, 0.1, epsilon = 1e-9);
        assert_eq!(hpylm.restaurant_count(), 0);
    }

    #[test]
    fn probability_increases_with_more_observations() {
        let mut hpylm = Hpylm::new(2, 1.0, 0.1, 1.0, 1.0, 1.0, 1.0, 0.1);
        let mut rng = ChaCha8Rng::seed_from_u64(99);
        let u = ctx(&["fgh", "de"]);
        hpylm.add_customer("abc", &u, 0.1, &mut rng, |_, _| {});
        let (p_once, _) = hpylm.prob("abc", &u, 0.1);
        for _ in 0..1000 {
            hpylm.add_customer("abc", &u, 0.1, &mut rng, |_, _| {});
        }
        let (p_many, _) = hpylm.prob("abc", &u, 0.1);
        assert!(p_many > p_once);
    }
}
