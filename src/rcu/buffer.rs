use std::sync::Arc;

use parking_lot::Mutex;

use super::versioned::Rcu;

/// Free list of retired snapshot buffers, emptied but with capacity retained.
type BufferPool = Arc<Mutex<Vec<Vec<u8>>>>;

/// An [`Rcu`] over byte buffers that recycles retired buffers.
///
/// After warm-up every update reuses a buffer a previous version gave back,
/// so publishing a snapshot allocates nothing.
#[derive(Debug)]
pub struct BufferRcu {
    rcu: Rcu<Vec<u8>>,
    pool: BufferPool,
}

impl BufferRcu {
    pub fn new() -> Self {
        let pool: BufferPool = Arc::new(Mutex::new(Vec::new()));
        let free = Arc::clone(&pool);
        let rcu = Rcu::with_release(move |mut buf: Vec<u8>| {
            buf.clear();
            free.lock().push(buf);
        });
        Self { rcu, pool }
    }

    /// Builds a new snapshot in a pooled buffer and publishes it.
    ///
    /// `fill` receives an empty buffer and appends the snapshot in place.
    pub fn update<F>(&self, fill: F)
    where
        F: FnOnce(&mut Vec<u8>),
    {
        let mut buf = self.take();
        fill(&mut buf);
        self.rcu.update(buf);
    }

    /// Like [`BufferRcu::update`], but `fill` may fail.
    ///
    /// On failure the buffer returns to the pool and the current snapshot
    /// stays in place.
    pub fn try_update<F, E>(&self, fill: F) -> Result<(), E>
    where
        F: FnOnce(&mut Vec<u8>) -> Result<(), E>,
    {
        let mut buf = self.take();
        match fill(&mut buf) {
            Ok(()) => {
                self.rcu.update(buf);
                Ok(())
            }
            Err(err) => {
                self.give_back(buf);
                Err(err)
            }
        }
    }

    /// Runs `consume` on the current snapshot, or on an empty slice if nothing
    /// has been published yet. The lease is held only for the duration of the call.
    pub fn read<F, R>(&self, consume: F) -> R
    where
        F: FnOnce(&[u8]) -> R,
    {
        match self.rcu.read() {
            Some(handle) => consume(handle.as_slice()),
            None => consume(&[]),
        }
    }

    /// Number of idle buffers waiting in the pool.
    pub fn pooled(&self) -> usize {
        self.pool.lock().len()
    }

    fn take(&self) -> Vec<u8> {
        let mut buf = self.pool.lock().pop().unwrap_or_default();
        buf.clear();
        buf
    }

    fn give_back(&self, mut buf: Vec<u8>) {
        buf.clear();
        self.pool.lock().push(buf);
    }
}

impl Default for BufferRcu {
    fn default() -> Self {
        Self::new()
    }
}
