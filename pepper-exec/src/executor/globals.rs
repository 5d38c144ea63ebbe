use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use pepper_core::Variables;
use serde_json::Value as JsonValue;
use tokio::sync::{Mutex, MutexGuard};

/// Variables shared by every leaf of a run.
///
/// Access goes through [`Globals::lock`], which hands out a guard that releases the
/// scope when dropped. Cloning the handle shares the same underlying map.
#[derive(Debug, Clone, Default)]
pub struct Globals {
    inner: Arc<Mutex<Variables>>,
}

impl Globals {
    pub fn new(initial: Variables) -> Self {
        Self {
            inner: Arc::new(Mutex::new(initial)),
        }
    }

    pub async fn lock(&self) -> GlobalsGuard<'_> {
        GlobalsGuard {
            guard: self.inner.lock().await,
        }
    }

    pub async fn get(&self, name: &str) -> Option<JsonValue> {
        self.lock().await.get(name).cloned()
    }

    pub async fn set(&self, name: impl Into<String>, value: JsonValue) {
        self.lock().await.insert(name.into(), value);
    }

    pub async fn snapshot(&self) -> Variables {
        self.lock().await.clone()
    }
}

/// Exclusive view of the globals map, held for the length of one hook call or one
/// template expansion.
pub struct GlobalsGuard<'a> {
    guard: MutexGuard<'a, Variables>,
}

impl Deref for GlobalsGuard<'_> {
    type Target = Variables;

    fn deref(&self) -> &Variables {
        &self.guard
    }
}

impl DerefMut for GlobalsGuard<'_> {
    fn deref_mut(&mut self) -> &mut Variables {
        &mut self.guard
    }
}
