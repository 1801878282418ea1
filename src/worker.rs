//! Worker threads and one-shot promises.

use std::{
    io,
    panic::resume_unwind,
    thread::{self, JoinHandle},
};

use crossbeam::channel::Sender;

use crate::drop::defer;

/// Creates a connected pair of [`Promise`] and [`PromiseHandle`].
pub fn promise<T>() -> (Promise<T>, PromiseHandle<T>) {
    // Capacity of 1 means that `Promise::fulfill` will never block.
    let (sender, recv) = crossbeam::channel::bounded(1);
    (Promise { inner: sender }, PromiseHandle { recv })
}

/// An empty slot that can be filled with a `T`, fulfilling the promise.
pub struct Promise<T> {
    inner: Sender<T>,
}

impl<T> Promise<T> {
    /// Fulfills the promise with a value, consuming it.
    ///
    /// This does not block or fail. If the connected [`PromiseHandle`] was dropped, `value` is
    /// dropped and nothing happens.
    pub fn fulfill(self, value: T) {
        self.inner.send(value).ok();
    }
}

/// A handle connected to a [`Promise`] that will eventually resolve to a value of type `T`.
pub struct PromiseHandle<T> {
    recv: crossbeam::channel::Receiver<T>,
}

impl<T> PromiseHandle<T> {
    /// Blocks the calling thread until the [`Promise`] is fulfilled.
    ///
    /// Returns an error if the [`Promise`] was dropped without being fulfilled, which typically
    /// means that the thread holding it has panicked.
    pub fn block(self) -> Result<T, PromiseDropped> {
        self.recv.recv().map_err(|_| PromiseDropped { _priv: () })
    }
}

/// Error returned by [`PromiseHandle::block`] when the connected [`Promise`] was dropped without
/// being fulfilled.
#[derive(Debug, Clone, Copy)]
pub struct PromiseDropped {
    _priv: (),
}

/// A builder object that can be used to configure and spawn a [`Worker`].
#[derive(Clone)]
pub struct WorkerBuilder {
    name: Option<String>,
    capacity: usize,
}

impl WorkerBuilder {
    /// Sets the name of the [`Worker`] thread.
    pub fn name<N: Into<String>>(self, name: N) -> Self {
        Self {
            name: Some(name.into()),
            ..self
        }
    }

    /// Sets the channel capacity of the [`Worker`].
    ///
    /// With the default capacity of 0, [`Worker::send`] blocks until the worker has finished
    /// processing the preceding message.
    pub fn capacity(self, capacity: usize) -> Self {
        Self { capacity, ..self }
    }

    /// Spawns a [`Worker`] thread that uses `handler` to process incoming messages.
    pub fn spawn<I, F>(self, mut handler: F) -> io::Result<Worker<I>>
    where
        I: Send + 'static,
        F: FnMut(I) + Send + 'static,
    {
        let (sender, recv) = crossbeam::channel::bounded(self.capacity);
        let mut builder = thread::Builder::new();
        if let Some(name) = self.name.clone() {
            builder = builder.name(name);
        }
        let handle = builder.spawn(move || {
            let _guard;
            if let Some(name) = self.name {
                log::trace!("worker '{name}' starting");
                _guard = defer(move || log::trace!("worker '{name}' exiting"));
            }
            for message in recv {
                handler(message);
            }
        })?;

        Ok(Worker {
            sender: Some(sender),
            handle: Some(handle),
        })
    }
}

/// A handle to a worker thread that processes messages of type `I`.
///
/// The handle can be shared between threads; messages are processed in the order they are sent.
///
/// When dropped, the channel to the thread is closed and the thread is joined. If the thread has
/// panicked, the panic is forwarded to the thread dropping the `Worker`.
pub struct Worker<I: Send + 'static> {
    sender: Option<Sender<I>>,
    handle: Option<JoinHandle<()>>,
}

impl Worker<()> {
    /// Returns a builder that can be used to configure and spawn a [`Worker`].
    #[inline]
    pub fn builder() -> WorkerBuilder {
        WorkerBuilder {
            name: None,
            capacity: 0,
        }
    }
}

impl<I: Send + 'static> Worker<I> {
    /// Sends a message to the worker thread.
    ///
    /// This blocks until the thread (or the channel buffer) is available to accept the message.
    ///
    /// If the worker thread has exited, the message is handed back in the error. A panic of the
    /// worker is forwarded when the [`Worker`] is dropped.
    pub fn send(&self, msg: I) -> Result<(), WorkerGone<I>> {
        match &self.sender {
            Some(sender) => sender.send(msg).map_err(|e| WorkerGone(e.into_inner())),
            None => Err(WorkerGone(msg)),
        }
    }

    fn wait_for_exit(&mut self) {
        if let Some(handle) = self.handle.take() {
            if let Err(payload) = handle.join() {
                if !thread::panicking() {
                    resume_unwind(payload);
                }
            }
        }
    }
}

impl<I: Send + 'static> Drop for Worker<I> {
    fn drop(&mut self) {
        // Close the channel to signal the thread to exit.
        drop(self.sender.take());

        self.wait_for_exit();
    }
}

/// Error returned by [`Worker::send`] when the worker thread is no longer running.
pub struct WorkerGone<I>(pub I);

impl<I> std::fmt::Debug for WorkerGone<I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("WorkerGone(..)")
    }
}
