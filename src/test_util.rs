use std::sync::{Mutex, MutexGuard, OnceLock};

fn lock(mutex: &'static OnceLock<Mutex<()>>) -> MutexGuard<'static, ()> {
    mutex
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Serialises tests that change the process working directory or fork.
pub fn lock_current_dir() -> MutexGuard<'static, ()> {
    static MUTEX: OnceLock<Mutex<()>> = OnceLock::new();
    lock(&MUTEX)
}

/// Serialises tests that point the real stderr somewhere else.
pub fn lock_stderr() -> MutexGuard<'static, ()> {
    static MUTEX: OnceLock<Mutex<()>> = OnceLock::new();
    lock(&MUTEX)
}
