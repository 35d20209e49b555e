use std::collections::HashMap;
use std::sync::RwLock;

use serde::Serialize;

/// Answers whether a model is usable for dispatch.
///
/// A model that is loading keeps its jobs waiting at their queue position;
/// a model the registry does not know is rejected at submission.
pub trait ModelRegistry: Send + Sync + 'static {
    fn is_ready(&self, model: &str) -> bool;
    fn is_loading(&self, model: &str) -> bool;
}

/// Load state of one model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ModelState {
    Loading,
    Ready,
    Failed(String),
}

impl std::fmt::Display for ModelState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelState::Loading => write!(f, "loading"),
            ModelState::Ready => write!(f, "ready"),
            ModelState::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// In-process model registry over a fixed catalog.
///
/// Every cataloged model starts out `Loading`. Whatever loads the models
/// reports progress through the `mark_*` methods; the scheduler only reads.
#[derive(Debug, Default)]
pub struct ModelDirectory {
    models: RwLock<HashMap<String, ModelState>>,
}

impl ModelDirectory {
    pub fn new<I, S>(catalog: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            models: RwLock::new(
                catalog
                    .into_iter()
                    .map(|name| (name.into(), ModelState::Loading))
                    .collect(),
            ),
        }
    }

    pub fn mark_ready(&self, model: &str) {
        self.models
            .write()
            .unwrap()
            .insert(model.to_string(), ModelState::Ready);
    }

    pub fn mark_loading(&self, model: &str) {
        self.models
            .write()
            .unwrap()
            .insert(model.to_string(), ModelState::Loading);
    }

    pub fn mark_failed(&self, model: &str, reason: impl Into<String>) {
        self.models
            .write()
            .unwrap()
            .insert(model.to_string(), ModelState::Failed(reason.into()));
    }

    pub fn state(&self, model: &str) -> Option<ModelState> {
        self.models.read().unwrap().get(model).cloned()
    }

    /// Every cataloged model and its state, sorted by name.
    pub fn statuses(&self) -> Vec<(String, ModelState)> {
        let mut statuses: Vec<(String, ModelState)> = self
            .models
            .read()
            .unwrap()
            .iter()
            .map(|(name, state)| (name.clone(), state.clone()))
            .collect();
        statuses.sort_by(|a, b| a.0.cmp(&b.0));
        statuses
    }
}

impl ModelRegistry for ModelDirectory {
    fn is_ready(&self, model: &str) -> bool {
        matches!(self.state(model), Some(ModelState::Ready))
    }

    fn is_loading(&self, model: &str) -> bool {
        matches!(self.state(model), Some(ModelState::Loading))
    }
}
