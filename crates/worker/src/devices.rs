//! Device selection for the worker fleet.

use txr_engine::{Device, Engine};

/// Pick the devices to run job loops on.
///
/// `--cpu` forces a single CPU worker. An explicit `--gpus` list is
/// deduplicated, sorted, and validated against the engine's inventory
/// (invalid indices are dropped with a warning). Without a list, all
/// detected GPUs are used; with none detected, a single CPU worker.
pub fn select_devices(
    requested: Option<&[usize]>,
    cpu_only: bool,
    engine: &dyn Engine,
) -> Vec<Device> {
    if cpu_only {
        return vec![Device::Cpu];
    }

    let available = engine.device_count();
    if available == 0 {
        tracing::info!("No GPUs detected, running a single CPU worker");
        return vec![Device::Cpu];
    }

    match requested {
        Some(list) => {
            let mut indices: Vec<usize> = list.to_vec();
            indices.sort_unstable();
            indices.dedup();

            let (valid, invalid): (Vec<_>, Vec<_>) =
                indices.into_iter().partition(|&i| i < available);
            if !invalid.is_empty() {
                tracing::warn!(?invalid, available, "Ignoring invalid GPU indices");
            }
            if valid.is_empty() {
                tracing::warn!("No valid GPUs selected, running a single CPU worker");
                return vec![Device::Cpu];
            }
            valid.into_iter().map(Device::Gpu).collect()
        }
        None => {
            tracing::info!(count = available, "Using all detected GPUs");
            (0..available).map(Device::Gpu).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use txr_engine::testing::ScriptedEngine;

    #[test]
    fn cpu_flag_wins() {
        let engine = ScriptedEngine::new().with_device_count(4);
        assert_eq!(select_devices(None, true, &engine), vec![Device::Cpu]);
    }

    #[test]
    fn no_gpus_means_cpu() {
        let engine = ScriptedEngine::new().with_device_count(0);
        assert_eq!(select_devices(None, false, &engine), vec![Device::Cpu]);
    }

    #[test]
    fn default_is_all_detected() {
        let engine = ScriptedEngine::new().with_device_count(3);
        assert_eq!(
            select_devices(None, false, &engine),
            vec![Device::Gpu(0), Device::Gpu(1), Device::Gpu(2)]
        );
    }

    #[test]
    fn explicit_list_is_deduplicated_and_sorted() {
        let engine = ScriptedEngine::new().with_device_count(4);
        assert_eq!(
            select_devices(Some(&[3, 0, 3]), false, &engine),
            vec![Device::Gpu(0), Device::Gpu(3)]
        );
    }

    #[test]
    fn invalid_indices_are_dropped() {
        let engine = ScriptedEngine::new().with_device_count(2);
        assert_eq!(
            select_devices(Some(&[1, 7]), false, &engine),
            vec![Device::Gpu(1)]
        );
    }

    #[test]
    fn all_invalid_falls_back_to_cpu() {
        let engine = ScriptedEngine::new().with_device_count(2);
        assert_eq!(
            select_devices(Some(&[5, 6]), false, &engine),
            vec![Device::Cpu]
        );
    }
}
