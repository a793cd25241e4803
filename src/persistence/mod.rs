//! Save/load of trained models and settings
//!
//! Features:
//! - Versioned JSON snapshot of every layer
//! - Topology check on load (wrong input/output size is rejected)
//! - Fallback to a freshly initialized network on any load failure

pub mod store;

pub use store::{KeyValueStore, MemoryStore};
#[cfg(not(target_arch = "wasm32"))]
pub use store::FileStore;
#[cfg(target_arch = "wasm32")]
pub use store::LocalStorage;

use thiserror::Error;

use crate::ai::{ModelError, ModelSnapshot, NeuralController, NeuralNetwork};
use crate::consts::{ACTION_COUNT, FEATURE_COUNT};
use crate::settings::AiSettings;

/// Storage key for the AI model
pub const MODEL_KEY: &str = "quantum_pong_model";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Model rejected: {0}")]
    Model(#[from] ModelError),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Write the network's snapshot under `MODEL_KEY`
pub fn save_model<S: KeyValueStore>(store: &mut S, network: &NeuralNetwork) -> Result<(), StoreError> {
    let json = serde_json::to_string(&network.snapshot())?;
    store.set(MODEL_KEY, &json)?;
    log::info!(
        "Model saved ({} parameters, topology {:?})",
        network.parameter_count(),
        network.topology()
    );
    Ok(())
}

/// Read a saved network, requiring `inputs -> ... -> outputs`.
/// `Ok(None)` when nothing has been saved yet.
pub fn load_model<S: KeyValueStore>(
    store: &S,
    inputs: usize,
    outputs: usize,
) -> Result<Option<NeuralNetwork>, StoreError> {
    let Some(json) = store.get(MODEL_KEY)? else {
        return Ok(None);
    };
    let snapshot: ModelSnapshot = serde_json::from_str(&json)?;
    let network = NeuralNetwork::from_snapshot(snapshot, inputs, outputs)?;
    Ok(Some(network))
}

pub fn clear_model<S: KeyValueStore>(store: &mut S) -> Result<(), StoreError> {
    store.remove(MODEL_KEY)?;
    log::info!("Saved model cleared");
    Ok(())
}

/// Build a controller from the saved model, or a fresh one if there is no
/// usable save. Only a bad `settings` topology is an error.
pub fn load_controller<S: KeyValueStore>(
    store: &S,
    settings: &AiSettings,
) -> Result<NeuralController, ModelError> {
    let mut controller = NeuralController::new(settings)?;
    match load_model(store, FEATURE_COUNT, ACTION_COUNT) {
        Ok(Some(network)) => {
            log::info!("Loaded saved model {:?}", network.topology());
            controller.replace_network(network)?;
        }
        Ok(None) => log::info!("No saved model, starting fresh"),
        Err(e) => log::warn!("Saved model unusable, starting fresh: {}", e),
    }
    Ok(controller)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    #[test]
    fn test_model_round_trip_through_store() {
        let mut store = MemoryStore::default();
        let mut rng = Pcg32::seed_from_u64(3);
        let network = NeuralNetwork::new(&[FEATURE_COUNT, 8, ACTION_COUNT], &mut rng).unwrap();
        save_model(&mut store, &network).unwrap();

        let loaded = load_model(&store, FEATURE_COUNT, ACTION_COUNT).unwrap().unwrap();
        assert_eq!(loaded.to_flat(), network.to_flat());
    }

    #[test]
    fn test_mismatched_topology_is_rejected() {
        let mut store = MemoryStore::default();
        let mut rng = Pcg32::seed_from_u64(3);
        let network = NeuralNetwork::new(&[4, 8, ACTION_COUNT], &mut rng).unwrap();
        save_model(&mut store, &network).unwrap();

        let err = load_model(&store, FEATURE_COUNT, ACTION_COUNT).unwrap_err();
        assert!(matches!(err, StoreError::Model(ModelError::Topology { .. })));
    }

    #[test]
    fn test_missing_model_is_none() {
        let store = MemoryStore::default();
        assert!(load_model(&store, FEATURE_COUNT, ACTION_COUNT).unwrap().is_none());
    }

    #[test]
    fn test_controller_falls_back_on_corrupt_save() {
        let mut store = MemoryStore::default();
        store.set(MODEL_KEY, "garbage").unwrap();
        let settings = AiSettings::default();
        let controller = load_controller(&store, &settings).unwrap();
        let fresh = NeuralController::new(&settings).unwrap();
        assert_eq!(controller.network().to_flat(), fresh.network().to_flat());
    }

    #[test]
    fn test_controller_uses_saved_weights() {
        let mut store = MemoryStore::default();
        let mut rng = Pcg32::seed_from_u64(77);
        let network = NeuralNetwork::new(&[FEATURE_COUNT, 12, ACTION_COUNT], &mut rng).unwrap();
        save_model(&mut store, &network).unwrap();

        let controller = load_controller(&store, &AiSettings::default()).unwrap();
        assert_eq!(controller.network().topology(), vec![FEATURE_COUNT, 12, ACTION_COUNT]);
        assert_eq!(controller.network().to_flat(), network.to_flat());
    }

    #[test]
    fn test_clear_model() {
        let mut store = MemoryStore::default();
        store.set(MODEL_KEY, "{}").unwrap();
        clear_model(&mut store).unwrap();
        assert_eq!(store.get(MODEL_KEY).unwrap(), None);
    }
}
