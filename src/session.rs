//! Scoped executor context.

use tracing::debug;

use crate::error::{Error, Result};
use crate::executor::Executor;

/// An established executor context, released exactly once.
///
/// [`Session::begin`] calls `ready()`; [`Session::finish`] or drop calls
/// `finish()`. Everything issued inside the context (statements, cursors,
/// datums) is invalid once the session is finished.
pub(crate) struct Session<'a, E: Executor> {
    executor: &'a mut E,
    active: bool,
}

impl<'a, E: Executor> Session<'a, E> {
    pub(crate) fn begin(executor: &'a mut E) -> Result<Self> {
        if !executor.ready() {
            return Err(Error::executor(-1, "executor is not ready"));
        }
        Ok(Self {
            executor,
            active: true,
        })
    }

    pub(crate) fn executor(&mut self) -> &mut E {
        &mut *self.executor
    }

    pub(crate) fn finish(&mut self) {
        if self.active {
            self.active = false;
            self.executor.finish();
            debug!("executor context released");
        }
    }
}

impl<E: Executor> Drop for Session<'_, E> {
    fn drop(&mut self) {
        self.finish();
    }
}
