//! Model lifecycle manager
//!
//! Load/unload requests quiesce the pool by leasing every engine, so a
//! transition never overlaps an in-flight translation. Transitions are
//! serialized with each other.

use nllb_core::{Error, Result, TranslationEngine};
use tokio::sync::Mutex;

use crate::pool::EnginePool;

pub struct ModelLifecycle {
    pool: EnginePool,
    transitions: Mutex<()>,
}

impl ModelLifecycle {
    pub fn new(pool: EnginePool) -> Self {
        Self {
            pool,
            transitions: Mutex::new(()),
        }
    }

    /// Unload every engine. Returns `false` if all were already unloaded.
    pub async fn unload_model(&self, to_cpu: bool) -> Result<bool> {
        self.transition("unload", move |engine| engine.unload_model(to_cpu))
            .await
    }

    /// Load every engine back. Returns `false` if all were already loaded.
    pub async fn load_model(&self, keep_cache: bool) -> Result<bool> {
        self.transition("load", move |engine| engine.load_model(keep_cache))
            .await
    }

    /// Number of engines currently loaded; waits for in-flight work
    pub async fn loaded_engines(&self) -> Result<usize> {
        let _serialized = self.transitions.lock().await;
        let leases = self.pool.acquire_all().await?;
        Ok(leases
            .iter()
            .filter(|lease| lease.engine().is_loaded())
            .count())
    }

    async fn transition<F>(&self, action: &'static str, apply: F) -> Result<bool>
    where
        F: Fn(&mut dyn TranslationEngine) -> Result<bool> + Send + 'static,
    {
        let _serialized = self.transitions.lock().await;
        let leases = self.pool.acquire_all().await?;

        let changed = tokio::task::spawn_blocking(move || {
            let mut changed = false;
            for lease in &leases {
                let mut engine = lease.engine();
                changed |= apply(&mut **engine)?;
            }
            Ok::<_, Error>(changed)
        })
        .await
        .map_err(|e| Error::EngineFatal(format!("Model {action} task failed: {e}")))??;

        if changed {
            tracing::info!(action, engines = self.pool.len(), "Model lifecycle transition applied");
        } else {
            tracing::info!(action, "Model lifecycle transition was a no-op");
        }
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stub::StubEngine;
    use nllb_config::DispatchStrategy;
    use nllb_core::LanguageCode;
    use std::sync::Arc;
    use std::time::Duration;

    fn lifecycle(size: usize) -> (EnginePool, ModelLifecycle) {
        let engines = (0..size)
            .map(|_| {
                Box::new(StubEngine::new().with_latency(Duration::from_millis(30)))
                    as Box<dyn TranslationEngine>
            })
            .collect();
        let pool = EnginePool::new(engines, DispatchStrategy::Queue).unwrap();
        (pool.clone(), ModelLifecycle::new(pool))
    }

    #[tokio::test]
    async fn test_unload_then_load_reports_state_changes() {
        let (_, lifecycle) = lifecycle(2);

        assert!(!lifecycle.load_model(true).await.unwrap());
        assert!(lifecycle.unload_model(true).await.unwrap());
        assert_eq!(lifecycle.loaded_engines().await.unwrap(), 0);
        assert!(!lifecycle.unload_model(false).await.unwrap());
        assert!(lifecycle.load_model(false).await.unwrap());
        assert_eq!(lifecycle.loaded_engines().await.unwrap(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_unload_waits_for_in_flight_translation() {
        let (pool, lifecycle) = lifecycle(1);
        let lease = pool.acquire().await.unwrap();

        let translation = tokio::task::spawn_blocking(move || {
            let mut engine = lease.engine();
            engine.translate("slow", LanguageCode::EngLatn, LanguageCode::DeuLatn)
        });

        let lifecycle = Arc::new(lifecycle);
        let unload = {
            let lifecycle = Arc::clone(&lifecycle);
            tokio::spawn(async move { lifecycle.unload_model(false).await })
        };

        // The translation started on a loaded engine and must finish on one
        assert!(translation.await.unwrap().is_ok());
        assert!(unload.await.unwrap().unwrap());
    }
}
