//! Global fallback for errors nobody handles.
//!
//! An error reaches [`error_dropped`] when a subscriber was created without an
//! error callback, or when a signal arrives after the subscriber already
//! terminated. The error is always logged; an installed hook additionally
//! receives it.

use std::sync::{Arc, RwLock};

use once_cell::sync::Lazy;

use crate::error::Error;

type Hook = Arc<dyn Fn(&Error) + Send + Sync>;

static ON_ERROR_DROPPED: Lazy<RwLock<Option<Hook>>> = Lazy::new(|| RwLock::new(None));

/// Installs `hook`, replacing any previous one.
pub fn on_error_dropped(hook: impl Fn(&Error) + Send + Sync + 'static) {
  let mut slot = ON_ERROR_DROPPED.write().unwrap_or_else(|e| e.into_inner());
  *slot = Some(Arc::new(hook));
}

pub fn reset_on_error_dropped() {
  let mut slot = ON_ERROR_DROPPED.write().unwrap_or_else(|e| e.into_inner());
  *slot = None;
}

pub(crate) fn error_dropped(err: &Error) {
  tracing::error!(error = %err, "error dropped: no subscriber handled it");
  let hook = ON_ERROR_DROPPED.read().unwrap_or_else(|e| e.into_inner()).clone();
  if let Some(hook) = hook {
    hook(err);
  }
}

#[cfg(test)]
mod test {
  use std::sync::Mutex;

  use super::*;

  #[rxflux_macro::test]
  fn installed_hook_sees_dropped_errors() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let c_seen = seen.clone();
    on_error_dropped(move |e| c_seen.lock().unwrap().push(e.to_string()));
    error_dropped(&Error::message("lost"));
    reset_on_error_dropped();
    error_dropped(&Error::message("after reset"));
    let seen = seen.lock().unwrap();
    assert!(seen.contains(&"source error: lost".to_string()));
    assert!(!seen.contains(&"source error: after reset".to_string()));
  }
}
