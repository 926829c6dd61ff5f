//! The authoritative state snapshot and its merge path.

use parking_lot::Mutex;

use crate::error::Result;
use crate::merge::SparseMerge;
use crate::model::DeviceState;

/// One observed window of state change: the snapshot before the first delta,
/// the snapshot after the last, and every delta in receipt order between them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateUpdate {
    pub before: DeviceState,
    pub after: DeviceState,
    pub deltas: Vec<DeviceState>,
}

impl StateUpdate {
    /// An empty window anchored at `state`.
    pub fn initial(state: DeviceState) -> Self {
        Self {
            before: state.clone(),
            after: state,
            deltas: Vec::new(),
        }
    }

    /// Extend this window with a later one: the end snapshot advances and the
    /// deltas concatenate in receipt order.
    pub fn absorb(&mut self, later: StateUpdate) {
        self.after = later.after;
        self.deltas.extend(later.deltas);
    }

    pub fn delta_count(&self) -> usize {
        self.deltas.len()
    }
}

/// Holds the single authoritative snapshot of device state.
///
/// Readers get independent deep copies; writers merge one notification payload
/// at a time under an exclusive lock, so no reader ever observes a torn merge.
#[derive(Debug, Default)]
pub struct StateCache {
    current: Mutex<DeviceState>,
}

impl StateCache {
    /// An empty cache, as at session start.
    pub fn new() -> Self {
        Self::default()
    }

    /// Deep copy of the current snapshot, safe for the caller to mutate.
    pub fn read(&self) -> DeviceState {
        self.current.lock().clone()
    }

    /// Decode one notification payload and sparse-merge it into the snapshot.
    ///
    /// Returns the pre-merge snapshot, the post-merge snapshot, and the delta
    /// (the payload decoded on its own, so it carries only the fields present
    /// in this message). A payload that fails to decode leaves the snapshot
    /// untouched.
    pub fn merge(&self, payload: &[u8]) -> Result<(DeviceState, DeviceState, DeviceState)> {
        let delta: DeviceState = serde_json::from_slice(payload)?;
        let mut current = self.current.lock();
        let before = current.clone();
        current.merge_from(delta.clone());
        Ok((before, current.clone(), delta))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_overwrites_present_and_preserves_absent() {
        let cache = StateCache::new();
        cache
            .merge(br#"{"audio": {"config": {"volume": 5, "shuffle_mode": true}}}"#)
            .unwrap();

        let (before, after, delta) = cache
            .merge(br#"{"audio": {"config": {"volume": 9}}}"#)
            .unwrap();

        assert_eq!(before.volume(), Some(5));
        assert_eq!(after.volume(), Some(9));
        assert_eq!(
            after.audio.as_ref().unwrap().config.as_ref().unwrap().shuffle_mode,
            Some(true)
        );
        // The delta reflects only this message.
        let delta_config = delta.audio.unwrap().config.unwrap();
        assert_eq!(delta_config.volume, Some(9));
        assert_eq!(delta_config.shuffle_mode, None);
    }

    #[test]
    fn test_read_returns_independent_copy() {
        let cache = StateCache::new();
        cache
            .merge(br#"{"wifi": {"ssid": "home"}}"#)
            .unwrap();

        let mut copy = cache.read();
        copy.wifi.as_mut().unwrap().ssid = Some("mangled".to_string());

        assert_eq!(
            cache.read().wifi.unwrap().ssid.as_deref(),
            Some("home")
        );
    }

    #[test]
    fn test_bad_payload_leaves_snapshot_untouched() {
        let cache = StateCache::new();
        cache.merge(br#"{"bt": "on"}"#).unwrap();

        assert!(cache.merge(b"not json").is_err());
        assert_eq!(cache.read().bluetooth.as_deref(), Some("on"));
    }

    #[test]
    fn test_update_absorb_concatenates_deltas() {
        let cache = StateCache::new();
        let mut window = StateUpdate::initial(cache.read());

        for volume in [1u8, 2, 3] {
            let payload =
                format!(r#"{{"audio": {{"config": {{"volume": {volume}}}}}}}"#);
            let (before, after, delta) = cache.merge(payload.as_bytes()).unwrap();
            window.absorb(StateUpdate {
                before,
                after,
                deltas: vec![delta],
            });
        }

        assert_eq!(window.delta_count(), 3);
        assert_eq!(window.before, DeviceState::default());
        assert_eq!(window.after.volume(), Some(3));
        assert_eq!(window.deltas[1].volume(), Some(2));
    }
}
