//! Background asset loading.
//!
//! [`AssetLoad::spawn`] runs a decode function on a worker thread and hands
//! the result back through a channel. The event loop calls
//! [`AssetLoad::poll`] once per frame; a load moves
//! `Pending -> Loaded -> Attached` or `Pending -> Failed`. There are no
//! retries and no timeouts: a load that never finishes stays pending.

use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

use crate::error::AssetError;

/// State of one asynchronous load.
#[derive(Debug)]
pub enum AssetLoad<T> {
    Pending {
        label: String,
        receiver: Receiver<Result<T, AssetError>>,
    },
    /// Decoded, not yet taken by the scene.
    Loaded(T),
    /// Taken by the scene.
    Attached,
    Failed(AssetError),
}

impl<T: Send + 'static> AssetLoad<T> {
    /// Start `load` on a new worker thread.
    pub fn spawn<F>(label: impl Into<String>, load: F) -> Self
    where
        F: FnOnce() -> Result<T, AssetError> + Send + 'static,
    {
        let label = label.into();
        let (sender, receiver) = mpsc::channel();
        let spawned = thread::Builder::new()
            .name(format!("load {label}"))
            .spawn(move || {
                // The receiver may be gone if the viewer shut down first
                let _ = sender.send(load());
            });
        match spawned {
            Ok(_) => Self::Pending { label, receiver },
            Err(e) => {
                log::error!("could not start loader thread for {label}: {e}");
                Self::Failed(AssetError::WorkerLost(label))
            }
        }
    }
}

impl<T> AssetLoad<T> {
    /// Wrap an existing channel, for loads driven by someone else.
    pub fn from_receiver(label: impl Into<String>, receiver: Receiver<Result<T, AssetError>>) -> Self {
        Self::Pending {
            label: label.into(),
            receiver,
        }
    }

    /// Check for a finished worker without blocking.
    ///
    /// Returns true on the poll that leaves `Pending`.
    pub fn poll(&mut self) -> bool {
        let Self::Pending { label, receiver } = self else {
            return false;
        };
        let next = match receiver.try_recv() {
            Ok(Ok(value)) => Self::Loaded(value),
            Ok(Err(e)) => Self::Failed(e),
            Err(TryRecvError::Empty) => return false,
            Err(TryRecvError::Disconnected) => Self::Failed(AssetError::WorkerLost(label.clone())),
        };
        *self = next;
        true
    }

    /// Take a loaded value, moving to `Attached`. Other states are left alone.
    pub fn take(&mut self) -> Option<T> {
        match std::mem::replace(self, Self::Attached) {
            Self::Loaded(value) => Some(value),
            other => {
                *self = other;
                None
            }
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending { .. })
    }

    pub fn is_attached(&self) -> bool {
        matches!(self, Self::Attached)
    }

    pub fn error(&self) -> Option<&AssetError> {
        match self {
            Self::Failed(e) => Some(e),
            _ => None,
        }
    }
}
