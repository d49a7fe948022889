use std::io::Write;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use pyhsmm::npylm::{Npylm, NpylmConfig};
use pyhsmm::pyhsmm::{Pyhsmm, PyhsmmConfig};
use pyhsmm::sampler::{self, GibbsConfig};

fn small_corpus() -> Vec<Vec<char>> {
    [
        "thecatsatonthemat",
        "thedogranfast",
        "shesawthecatrun",
        "thecatandthedogplayed",
    ]
    .iter()
    .map(|s| s.chars().collect())
    .collect()
}

#[test]
fn two_epochs_of_npylm_training_leave_every_segmentation_removable() {
    let sents = small_corpus();
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let mut npylm = Npylm::new(1.0, 0.5, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, NpylmConfig { max_word_length: 6, ..Default::default() });
    let mut word_seqs = npylm.initialize(&sents, &mut rng);

    let cfg = GibbsConfig { batch_size: 2, threads: 2 };
    sampler::train_npylm(&mut npylm, &sents, &mut word_seqs, &cfg, 2, 42, true, |_| {});

    for seq in &word_seqs {
        npylm.remove_word_seq_as_customer(seq, &mut rng);
    }
    assert_eq!(npylm.word_hpylm.restaurant_count(), 0);
    assert_eq!(npylm.char_vpylm.hpylm.restaurant_count(), 0);
}

#[test]
fn two_epochs_of_pyhsmm_training_leave_every_segmentation_removable() {
    let sents = small_corpus();
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let mut pyhsmm = Pyhsmm::new(
        1.0, 0.5, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0,
        PyhsmmConfig::new(6, 3),
    );
    let (mut word_seqs, mut pos_seqs) = pyhsmm.initialize(&sents, &mut rng);

    let cfg = GibbsConfig { batch_size: 2, threads: 2 };
    sampler::train_pyhsmm(&mut pyhsmm, &sents, &mut word_seqs, &mut pos_seqs, &cfg, 2, 7, true, |_| {});

    for (words, tags) in word_seqs.iter().zip(pos_seqs.iter()) {
        pyhsmm.remove_word_seq_as_customer(words, tags, &mut rng);
    }
    assert_eq!(pyhsmm.pos_size(), 3);
}

#[test]
fn decoded_segmentation_concatenates_back_to_original_characters() {
    let sents = small_corpus();
    let mut rng = ChaCha8Rng::seed_from_u64(11);
    let mut npylm = Npylm::new(1.0, 0.5, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, NpylmConfig { max_word_length: 8, ..Default::default() });
    let mut word_seqs = npylm.initialize(&sents, &mut rng);
    let cfg = GibbsConfig { batch_size: 2, threads: 2 };
    sampler::train_npylm(&mut npylm, &sents, &mut word_seqs, &cfg, 1, 11, false, |_| {});

    let decoded = sampler::decode_npylm(&npylm, &sents, 2, false, 99);
    for (seq, sent) in decoded.iter().zip(sents.iter()) {
        assert_eq!(seq.concat(), sent.iter().collect::<String>());
    }
}

#[test]
fn config_rejects_unknown_subcommand_without_panicking() {
    let args: Vec<String> = "bogus -train x.txt".split_whitespace().map(str::to_string).collect();
    let err = pyhsmm::config::Config::new(&args).unwrap_err();
    assert!(matches!(err, pyhsmm::error::ConfigError::UnknownSubcommand(_)));
}

#[test]
fn run_ws_trains_and_decodes_a_dev_file_end_to_end() {
    let mut train_path = std::env::temp_dir();
    train_path.push(format!("pyhsmm-it-train-{}.txt", std::process::id()));
    let mut f = std::fs::File::create(&train_path).unwrap();
    writeln!(f, "thecatsatonthemat").unwrap();
    writeln!(f, "thedogranfast").unwrap();
    writeln!(f, "shesawthecatrun").unwrap();
    drop(f);

    let args: Vec<String> = format!(
        "ws -train {} -epoch 2 -batch 2 -threads 2 -maxWordLength 6 -q",
        train_path.display()
    )
    .split_whitespace()
    .map(str::to_string)
    .collect();
    let cfg = pyhsmm::config::Config::new(&args).unwrap();
    let report = pyhsmm::run_ws(&cfg).unwrap();

    std::fs::remove_file(&train_path).ok();

    assert_eq!(report.epochs_trained, 2);
    assert!(report.decoded.is_none());
}
