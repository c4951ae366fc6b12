use crossbeam::channel::{self, Receiver, Sender};
use std::sync::Mutex;

/// Run-wide fatal-error signal.
///
/// Nothing is ever sent on the underlying channel. `trigger` drops the only
/// sender, which disconnects the receiver and wakes every thread blocked in a
/// `select!` that includes `listener()`.
pub struct AbortSignal {
    trigger: Mutex<Option<Sender<()>>>,
    listener: Receiver<()>,
}

impl AbortSignal {
    pub fn new() -> Self {
        let (sender, listener) = channel::bounded(0);
        Self {
            trigger: Mutex::new(Some(sender)),
            listener,
        }
    }

    pub fn trigger(&self) {
        let mut guard = match self.trigger.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if guard.take().is_some() {
            tracing::warn!("pipeline abort requested");
        }
    }

    #[cfg(test)]
    pub fn is_triggered(&self) -> bool {
        match self.trigger.lock() {
            Ok(guard) => guard.is_none(),
            Err(poisoned) => poisoned.into_inner().is_none(),
        }
    }

    pub fn listener(&self) -> &Receiver<()> {
        &self.listener
    }

    /// Guard that triggers the signal if its thread unwinds.
    pub fn guard(&self) -> AbortGuard<'_> {
        AbortGuard { signal: self }
    }
}

pub struct AbortGuard<'a> {
    signal: &'a AbortSignal,
}

impl Drop for AbortGuard<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.signal.trigger();
        }
    }
}

impl Default for AbortSignal {
    fn default() -> Self {
        Self::new()
    }
}
