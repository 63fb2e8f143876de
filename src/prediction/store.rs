//! Lock-free model slot and the cancelable background fit

use arc_swap::ArcSwapOption;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::{fit, FitOptions, Model, PredictionError};
use crate::types::AuditRecord;

/// Holds the current prediction model, if any.
///
/// Readers take a snapshot with `current()`; a publish swaps the pointer
/// without blocking them. Cloning shares the same slot.
#[derive(Debug, Clone, Default)]
pub struct ModelStore {
    slot: Arc<ArcSwapOption<Model>>,
}

impl ModelStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, model: Model) {
        self.slot.store(Some(Arc::new(model)));
    }

    pub fn current(&self) -> Option<Arc<Model>> {
        self.slot.load_full()
    }

    pub fn has_model(&self) -> bool {
        self.slot.load().is_some()
    }
}

/// Fit a model in the background and publish it into `store`.
///
/// The fit itself runs on the blocking pool. If `cancel` fires first the
/// task returns `PredictionError::Cancelled` and nothing is published; a
/// failed fit leaves the previous model in place.
pub fn spawn_fit(
    history: Vec<AuditRecord>,
    options: FitOptions,
    store: ModelStore,
    cancel: CancellationToken,
) -> JoinHandle<Result<(), PredictionError>> {
    tokio::spawn(async move {
        let records = history.len();
        let fit_task = tokio::task::spawn_blocking(move || fit(&history, &options));

        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                info!(records, "Model fit cancelled");
                Err(PredictionError::Cancelled)
            }

            joined = fit_task => {
                let model = match joined {
                    Ok(Ok(model)) => model,
                    Ok(Err(e)) => {
                        warn!(records, error = %e, "Model fit failed, keeping previous model");
                        return Err(e);
                    }
                    Err(e) => return Err(PredictionError::TaskFailed(e.to_string())),
                };
                if cancel.is_cancelled() {
                    return Err(PredictionError::Cancelled);
                }
                store.publish(model);
                info!(records, "Model published");
                Ok(())
            }
        }
    })
}
