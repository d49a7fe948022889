use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::PersistError;
use crate::npylm::Npylm;
use crate::pyhsmm::Pyhsmm;

/// Serializable top-level state for a trained NPYLM, mirroring the data
/// model of §3: restaurant graphs, per-depth hyperparameters, VPYLM stop/pass
/// counters, depth memory and the Poisson length-correction state are all
/// carried inside `Npylm`'s own `Serialize` impl, so this is a thin envelope
/// naming which model kind and version produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NpylmState {
    pub format_version: u32,
    pub npylm: Npylm,
}

/// Serializable top-level state for a trained PYHSMM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PyhsmmState {
    pub format_version: u32,
    pub pyhsmm: Pyhsmm,
}

const FORMAT_VERSION: u32 = 1;

impl NpylmState {
    pub fn new(npylm: Npylm) -> Self {
        NpylmState { format_version: FORMAT_VERSION, npylm }
    }

    pub fn save(&self, path: &Path) -> Result<(), PersistError> {
        let file = File::create(path).map_err(|source| PersistError::Open { path: path.to_path_buf(), source })?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, PersistError> {
        let file = File::open(path).map_err(|source| PersistError::Open { path: path.to_path_buf(), source })?;
        let state: NpylmState = serde_json::from_reader(BufReader::new(file))?;
        Ok(state)
    }
}

impl PyhsmmState {
    pub fn new(pyhsmm: Pyhsmm) -> Self {
        PyhsmmState { format_version: FORMAT_VERSION, pyhsmm }
    }

    pub fn save(&self, path: &Path) -> Result<(), PersistError> {
        let file = File::create(path).map_err(|source| PersistError::Open { path: path.to_path_buf(), source })?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, PersistError> {
        let file = File::open(path).map_err(|source| PersistError::Open { path: path.to_path_buf(), source })?;
        let state: PyhsmmState = serde_json::from_reader(BufReader::new(file))?;
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::npylm::NpylmConfig;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn npylm_state_round_trips_through_json() {
        let mut npylm = Npylm::new(1.0, 0.5, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, NpylmConfig::default());
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let sent: Vec<char> = "thecatsat".chars().collect();
        npylm.initialize(&[sent], &mut rng);

        let state = NpylmState::new(npylm);
        let mut path = std::env::temp_dir();
        path.push(format!("pyhsmm-persist-test-{}.json", std::process::id()));
        state.save(&path).unwrap();
        let loaded = NpylmState::load(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(state.npylm.word_hpylm.restaurant_count(), loaded.npylm.word_hpylm.restaurant_count());
        assert_eq!(
            state.npylm.char_vpylm.hpylm.restaurant_count(),
            loaded.npylm.char_vpylm.hpylm.restaurant_count()
        );
    }
}
