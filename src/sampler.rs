use std::thread;

use crossbeam_channel::bounded;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::info;

use crate::npylm::Npylm;
use crate::pyhsmm::Pyhsmm;

/// Outer-loop knobs for blocked Gibbs training (§5): mini-batch size and the
/// bounded worker pool width used during the parallel backward-sampling
/// phase of each batch.
#[derive(Debug, Clone, Copy)]
pub struct GibbsConfig {
    pub batch_size: usize,
    pub threads: usize,
}

fn shuffled_indices(n: usize, rng: &mut impl Rng) -> Vec<usize> {
    let mut order: Vec<usize> = (0..n).collect();
    for i in (1..n).rev() {
        let j = rng.gen_range(0..=i);
        order.swap(i, j);
    }
    order
}

/// One blocked-Gibbs epoch over an NPYLM: permute sentence order, then for
/// each mini-batch remove (sequential) -> sample (parallel, read-only) ->
/// add (sequential). `epoch_seed` must differ across epochs but be
/// reproducible for a fixed master seed, so repeated runs with the same seed
/// resample identically.
pub fn train_npylm_epoch(
    npylm: &mut Npylm,
    sents: &[Vec<char>],
    word_seqs: &mut [Vec<String>],
    cfg: &GibbsConfig,
    epoch_seed: u64,
) {
    let n = sents.len();
    let mut master_rng = ChaCha8Rng::seed_from_u64(epoch_seed);
    let order = shuffled_indices(n, &mut master_rng);
    let threads = cfg.threads.max(1);

    let mut start = 0;
    while start < n {
        let end = (start + cfg.batch_size).min(n);
        let batch = &order[start..end];
        let mut seq_rng = ChaCha8Rng::seed_from_u64(master_rng.gen());

        for &idx in batch {
            npylm.remove_word_seq_as_customer(&word_seqs[idx], &mut seq_rng);
        }

        let (token_tx, token_rx) = bounded::<()>(threads);
        for _ in 0..threads {
            token_tx.send(()).expect("token channel closed");
        }

        let results: Vec<(usize, Vec<String>)> = thread::scope(|scope| {
            let npylm_ref: &Npylm = npylm;
            let mut handles = Vec::with_capacity(batch.len());
            for &idx in batch {
                token_rx.recv().expect("token channel closed");
                let release = token_tx.clone();
                let sent = &sents[idx];
                let worker_seed = master_rng.gen::<u64>();
                handles.push(scope.spawn(move || {
                    let mut worker_rng = ChaCha8Rng::seed_from_u64(worker_seed);
                    let forward = npylm_ref.forward(sent);
                    let sampled = npylm_ref.backward(sent, &forward, true, &mut worker_rng);
                    release.send(()).expect("token channel closed");
                    (idx, sampled)
                }));
            }
            handles.into_iter().map(|h| h.join().expect("sampling worker panicked")).collect()
        });

        for (idx, seq) in results {
            npylm.add_word_seq_as_customer(&seq, &mut seq_rng);
            word_seqs[idx] = seq;
        }

        start = end;
    }
}

/// Decodes (segments) each sentence using the current NPYLM, in parallel,
/// without mutating any state. `sampling = false` gives deterministic
/// (argmax) decoding.
pub fn decode_npylm(npylm: &Npylm, sents: &[Vec<char>], threads: usize, sampling: bool, seed: u64) -> Vec<Vec<String>> {
    let threads = threads.max(1);
    let mut master_rng = ChaCha8Rng::seed_from_u64(seed);
    let (token_tx, token_rx) = bounded::<()>(threads);
    for _ in 0..threads {
        token_tx.send(()).expect("token channel closed");
    }
    thread::scope(|scope| {
        let mut handles = Vec::with_capacity(sents.len());
        for sent in sents {
            token_rx.recv().expect("token channel closed");
            let release = token_tx.clone();
            let worker_seed = master_rng.gen::<u64>();
            handles.push(scope.spawn(move || {
                let mut worker_rng = ChaCha8Rng::seed_from_u64(worker_seed);
                let forward = npylm.forward(sent);
                let seq = npylm.backward(sent, &forward, sampling, &mut worker_rng);
                release.send(()).expect("token channel closed");
                seq
            }));
        }
        handles.into_iter().map(|h| h.join().expect("decode worker panicked")).collect()
    })
}

/// Runs `epochs` blocked-Gibbs passes over the corpus, resampling
/// hyperparameters (and, if enabled, the Poisson length correction) at the
/// end of each epoch.
pub fn train_npylm(
    npylm: &mut Npylm,
    sents: &[Vec<char>],
    word_seqs: &mut [Vec<String>],
    cfg: &GibbsConfig,
    epochs: usize,
    seed: u64,
    resample_hyperparameters: bool,
    mut on_epoch: impl FnMut(usize),
) {
    let mut master_rng = ChaCha8Rng::seed_from_u64(seed);
    for epoch in 0..epochs {
        let epoch_seed = master_rng.gen::<u64>();
        train_npylm_epoch(npylm, sents, word_seqs, cfg, epoch_seed);
        if resample_hyperparameters {
            let mut hp_rng = ChaCha8Rng::seed_from_u64(master_rng.gen());
            npylm.word_hpylm.estimate_hyperparameters(&mut hp_rng);
            npylm.char_vpylm.hpylm.estimate_hyperparameters(&mut hp_rng);
            npylm.resample_poisson_correction(&mut hp_rng);
        }
        info!(epoch, sentences = sents.len(), "completed NPYLM training epoch");
        on_epoch(epoch);
    }
}

/// Trains an NPYLM's word-level HPYLM on a fixed (gold) segmentation: every
/// epoch reseats each sentence's customers (remove then add, resampling
/// table assignments only) and, if enabled, resamples hyperparameters. No
/// forward-backward resegmentation is run, since `word_seqs` is annotated
/// data that must be used as-is (the `lm` subcommand, §6).
pub fn train_npylm_fixed_segmentation(
    npylm: &mut Npylm,
    word_seqs: &[Vec<String>],
    epochs: usize,
    seed: u64,
    resample_hyperparameters: bool,
    mut on_epoch: impl FnMut(usize),
) {
    let mut master_rng = ChaCha8Rng::seed_from_u64(seed);
    for epoch in 0..epochs {
        let mut epoch_rng = ChaCha8Rng::seed_from_u64(master_rng.gen());
        for seq in word_seqs {
            npylm.remove_word_seq_as_customer(seq, &mut epoch_rng);
        }
        for seq in word_seqs {
            npylm.add_word_seq_as_customer(seq, &mut epoch_rng);
        }
        if resample_hyperparameters {
            let mut hp_rng = ChaCha8Rng::seed_from_u64(master_rng.gen());
            npylm.word_hpylm.estimate_hyperparameters(&mut hp_rng);
            npylm.char_vpylm.hpylm.estimate_hyperparameters(&mut hp_rng);
            npylm.resample_poisson_correction(&mut hp_rng);
        }
        info!(epoch, sentences = word_seqs.len(), "completed NPYLM fixed-segmentation training epoch");
        on_epoch(epoch);
    }
}

/// Joint segmentation x tagging analogue of [`train_npylm_epoch`].
pub fn train_pyhsmm_epoch(
    pyhsmm: &mut Pyhsmm,
    sents: &[Vec<char>],
    word_seqs: &mut [Vec<String>],
    pos_seqs: &mut [Vec<usize>],
    cfg: &GibbsConfig,
    epoch_seed: u64,
) {
    let n = sents.len();
    let mut master_rng = ChaCha8Rng::seed_from_u64(epoch_seed);
    let order = shuffled_indices(n, &mut master_rng);
    let threads = cfg.threads.max(1);

    let mut start = 0;
    while start < n {
        let end = (start + cfg.batch_size).min(n);
        let batch = &order[start..end];
        let mut seq_rng = ChaCha8Rng::seed_from_u64(master_rng.gen());

        for &idx in batch {
            pyhsmm.remove_word_seq_as_customer(&word_seqs[idx], &pos_seqs[idx], &mut seq_rng);
        }

        let (token_tx, token_rx) = bounded::<()>(threads);
        for _ in 0..threads {
            token_tx.send(()).expect("token channel closed");
        }

        let results: Vec<(usize, Vec<String>, Vec<usize>)> = thread::scope(|scope| {
            let pyhsmm_ref: &Pyhsmm = pyhsmm;
            let mut handles = Vec::with_capacity(batch.len());
            for &idx in batch {
                token_rx.recv().expect("token channel closed");
                let release = token_tx.clone();
                let sent = &sents[idx];
                let worker_seed = master_rng.gen::<u64>();
                handles.push(scope.spawn(move || {
                    let mut worker_rng = ChaCha8Rng::seed_from_u64(worker_seed);
                    let forward = pyhsmm_ref.forward(sent);
                    let (words, tags) = pyhsmm_ref.backward(sent, &forward, true, &mut worker_rng);
                    release.send(()).expect("token channel closed");
                    (idx, words, tags)
                }));
            }
            handles.into_iter().map(|h| h.join().expect("sampling worker panicked")).collect()
        });

        for (idx, words, tags) in results {
            pyhsmm.add_word_seq_as_customer(&words, &tags, &mut seq_rng);
            word_seqs[idx] = words;
            pos_seqs[idx] = tags;
        }

        start = end;
    }
}

pub fn decode_pyhsmm(
    pyhsmm: &Pyhsmm,
    sents: &[Vec<char>],
    threads: usize,
    sampling: bool,
    seed: u64,
) -> Vec<(Vec<String>, Vec<usize>)> {
    let threads = threads.max(1);
    let mut master_rng = ChaCha8Rng::seed_from_u64(seed);
    let (token_tx, token_rx) = bounded::<()>(threads);
    for _ in 0..threads {
        token_tx.send(()).expect("token channel closed");
    }
    thread::scope(|scope| {
        let mut handles = Vec::with_capacity(sents.len());
        for sent in sents {
            token_rx.recv().expect("token channel closed");
            let release = token_tx.clone();
            let worker_seed = master_rng.gen::<u64>();
            handles.push(scope.spawn(move || {
                let mut worker_rng = ChaCha8Rng::seed_from_u64(worker_seed);
                let forward = pyhsmm.forward(sent);
                let result = pyhsmm.backward(sent, &forward, sampling, &mut worker_rng);
                release.send(()).expect("token channel closed");
                result
            }));
        }
        handles.into_iter().map(|h| h.join().expect("decode worker panicked")).collect()
    })
}

pub fn train_pyhsmm(
    pyhsmm: &mut Pyhsmm,
    sents: &[Vec<char>],
    word_seqs: &mut [Vec<String>],
    pos_seqs: &mut [Vec<usize>],
    cfg: &GibbsConfig,
    epochs: usize,
    seed: u64,
    resample_hyperparameters: bool,
    mut on_epoch: impl FnMut(usize),
) {
    let mut master_rng = ChaCha8Rng::seed_from_u64(seed);
    for epoch in 0..epochs {
        let epoch_seed = master_rng.gen::<u64>();
        train_pyhsmm_epoch(pyhsmm, sents, word_seqs, pos_seqs, cfg, epoch_seed);
        if resample_hyperparameters {
            let mut hp_rng = ChaCha8Rng::seed_from_u64(master_rng.gen());
            pyhsmm.resample_hyperparameters(&mut hp_rng);
        }
        info!(epoch, sentences = sents.len(), "completed PYHSMM training epoch");
        on_epoch(epoch);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::npylm::NpylmConfig;

    fn corpus() -> Vec<Vec<char>> {
        ["thecatsatonthemat", "thedogranfast", "shesawthecat"]
            .iter()
            .map(|s| s.chars().collect())
            .collect()
    }

    #[test]
    fn training_epoch_leaves_graphs_consistent_and_covers_every_sentence() {
        let mut npylm = Npylm::new(1.0, 0.5, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, NpylmConfig::default());
        let sents = corpus();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let mut word_seqs = npylm.initialize(&sents, &mut rng);
        let cfg = GibbsConfig { batch_size: 2, threads: 2 };
        train_npylm_epoch(&mut npylm, &sents, &mut word_seqs, &cfg, 123);
        for (seq, sent) in word_seqs.iter().zip(sents.iter()) {
            assert_eq!(seq.concat(), sent.iter().collect::<String>());
        }
    }

    #[test]
    fn decode_is_deterministic_without_sampling() {
        let mut npylm = Npylm::new(1.0, 0.5, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, NpylmConfig::default());
        let sents = corpus();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let _ = npylm.initialize(&sents, &mut rng);
        let decoded1 = decode_npylm(&npylm, &sents, 2, false, 7);
        let decoded2 = decode_npylm(&npylm, &sents, 2, false, 7);
        assert_eq!(decoded1, decoded2);
    }

    #[test]
    fn fixed_segmentation_training_never_alters_the_gold_word_sequences() {
        let mut npylm = Npylm::new(1.0, 0.5, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, NpylmConfig::default());
        let word_seqs = vec![
            vec!["the".to_string(), "cat".to_string(), "sat".to_string()],
            vec!["the".to_string(), "dog".to_string(), "ran".to_string()],
        ];
        let before = word_seqs.clone();
        train_npylm_fixed_segmentation(&mut npylm, &word_seqs, 3, 5, true, |_| {});
        assert_eq!(word_seqs, before);
        assert!(npylm.word_hpylm.restaurant_count() > 0);
    }
}
