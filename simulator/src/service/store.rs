use crate::analysis::audio::Clip;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};

/// Analysed clips kept for chunk streaming, keyed by `file_id`.
#[derive(Debug, Default, Clone)]
pub struct ClipStore {
    clips: Arc<RwLock<HashMap<String, Arc<Clip>>>>,
}

impl ClipStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `clip` under a fresh id that keeps the upload's extension.
    pub fn insert(&self, original_name: &str, clip: Clip) -> String {
        let extension = Path::new(original_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| format!(".{}", ext))
            .unwrap_or_default();
        let file_id = format!("{}{}", uuid::Uuid::new_v4(), extension);
        let mut guard = self.clips.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.insert(file_id.clone(), Arc::new(clip));
        file_id
    }

    pub fn get(&self, file_id: &str) -> Option<Arc<Clip>> {
        let guard = self.clips.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.get(file_id).cloned()
    }

    pub fn len(&self) -> usize {
        let guard = self.clips.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_keep_extension_and_resolve() {
        let store = ClipStore::new();
        let id = store.insert("flyby.wav", Clip::new(vec![0.0; 4], 8_000));
        assert!(id.ends_with(".wav"));
        assert_eq!(store.get(&id).unwrap().len(), 4);
        assert!(store.get("missing.wav").is_none());
        assert_eq!(store.len(), 1);
    }
}
