//! The world context: a single dedicated thread that owns the host world.
//!
//! World data may only be read or written on this thread. Other components
//! submit closures through [`WorldContext::run`] and await the result; the
//! closures run one at a time, in submission order, without ever blocking a
//! tokio worker.

use std::panic::AssertUnwindSafe;
use std::thread::{JoinHandle, ThreadId};

use tokio::sync::{mpsc, oneshot};

use crate::infrastructure::ports::{WorldContextError, WorldHost};

type Job = Box<dyn FnOnce(&mut dyn WorldHost) + Send>;

enum Command {
    Run(Job),
    Shutdown,
}

/// Cheap, cloneable handle for submitting work to the world thread.
#[derive(Clone)]
pub struct WorldContext {
    commands: mpsc::UnboundedSender<Command>,
    thread_id: ThreadId,
}

/// Owner of the world thread. [`WorldThread::join`] hands the host back once
/// the thread stopped, either through [`WorldContext::shutdown`] or because
/// every handle was dropped.
pub struct WorldThread {
    handle: JoinHandle<Box<dyn WorldHost>>,
}

impl WorldContext {
    /// Move `host` onto a new `world-context` thread.
    pub fn spawn(host: Box<dyn WorldHost>) -> std::io::Result<(Self, WorldThread)> {
        let (commands, mut queue) = mpsc::unbounded_channel::<Command>();

        let handle = std::thread::Builder::new()
            .name("world-context".to_string())
            .spawn(move || {
                let mut host = host;
                tracing::debug!("World context started");
                while let Some(command) = queue.blocking_recv() {
                    let job = match command {
                        Command::Run(job) => job,
                        Command::Shutdown => break,
                    };
                    // A panicking job drops its reply sender; the caller sees
                    // `Dropped` and the thread keeps serving.
                    let result = std::panic::catch_unwind(AssertUnwindSafe(|| job(host.as_mut())));
                    if result.is_err() {
                        tracing::error!("World context job panicked");
                    }
                }
                tracing::debug!("World context stopped");
                host
            })?;

        let thread_id = handle.thread().id();
        Ok((Self { commands, thread_id }, WorldThread { handle }))
    }

    /// Run `job` on the world thread and await its result.
    pub async fn run<F, R>(&self, job: F) -> Result<R, WorldContextError>
    where
        F: FnOnce(&mut dyn WorldHost) -> R + Send + 'static,
        R: Send + 'static,
    {
        let (reply, result) = oneshot::channel();
        let boxed: Job = Box::new(move |host: &mut dyn WorldHost| {
            // Receiver gone means the caller stopped waiting; nothing to do.
            let _ = reply.send(job(host));
        });

        self.commands
            .send(Command::Run(boxed))
            .map_err(|_| WorldContextError::Closed)?;
        result.await.map_err(|_| WorldContextError::Dropped)
    }

    /// Stop the world thread after the jobs already queued. Later `run` calls
    /// fail with [`WorldContextError::Closed`].
    pub fn shutdown(&self) {
        if self.commands.send(Command::Shutdown).is_err() {
            tracing::debug!("World context already stopped");
        }
    }

    /// Whether the current thread is the world thread.
    pub fn is_current(&self) -> bool {
        std::thread::current().id() == self.thread_id
    }
}

impl WorldThread {
    /// Wait for the world thread to finish and take the host back.
    pub fn join(self) -> Option<Box<dyn WorldHost>> {
        match self.handle.join() {
            Ok(host) => Some(host),
            Err(_) => {
                tracing::error!("World context thread panicked outside a job");
                None
            }
        }
    }
}
