//! Exclusive access to ONNX Runtime sessions.

use std::sync::{Mutex, MutexGuard};

/// Lock a session, recovering it if an earlier holder panicked mid-run.
///
/// A session carries no state between `run` calls, so a panic that poisons
/// the lock leaves nothing half-updated behind it.
pub(crate) fn lock_session<T>(session: &Mutex<T>) -> MutexGuard<'_, T> {
    session.lock().unwrap_or_else(|poisoned| {
        tracing::warn!("recovering session lock poisoned by a panicked request");
        session.clear_poison();
        poisoned.into_inner()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_poisoned_lock_is_recovered() {
        let shared = Arc::new(Mutex::new(7u32));

        let poisoner = Arc::clone(&shared);
        let joined = std::thread::spawn(move || {
            let _guard = poisoner.lock().unwrap();
            panic!("request panicked while holding the session");
        })
        .join();
        assert!(joined.is_err());
        assert!(shared.is_poisoned());

        {
            let mut guard = lock_session(&shared);
            assert_eq!(*guard, 7);
            *guard += 1;
        }
        assert!(!shared.is_poisoned());
        assert_eq!(*lock_session(&shared), 8);
    }
}
