use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use eimlcap_frame::{EventSink, Image, LinkReader, ReaderConfig, RxEvent, Step};
use eimlcap_link::{LinkManager, Opener, SerialOpener, DEFAULT_READ_TIMEOUT};
use tracing::{debug, info, trace, warn};

use crate::error::{CaptureError, Result};
use crate::mailbox::Mailbox;

/// Configuration for a capture service.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Polling and demultiplexer settings.
    pub reader: ReaderConfig,
    /// Per-read timeout applied to opened ports.
    pub read_timeout: Duration,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            reader: ReaderConfig::default(),
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }
}

type Subscriber = Box<dyn FnMut(&RxEvent) + Send>;
type Reply = Sender<eimlcap_link::Result<()>>;

enum Command {
    Connect { port: String, baud: u32, reply: Reply },
    Close { reply: Reply },
    Shutdown,
}

/// Builds and spawns a [`Capture`].
pub struct CaptureBuilder<O> {
    opener: O,
    config: CaptureConfig,
    subscriber: Option<Subscriber>,
}

impl CaptureBuilder<SerialOpener> {
    /// Builder for a capture service on OS serial ports.
    pub fn serial() -> Self {
        Self::new(SerialOpener)
    }
}

impl<O: Opener + 'static> CaptureBuilder<O> {
    pub fn new(opener: O) -> Self {
        Self {
            opener,
            config: CaptureConfig::default(),
            subscriber: None,
        }
    }

    /// Override capture config.
    pub fn with_config(mut self, config: CaptureConfig) -> Self {
        self.config = config;
        self
    }

    /// Receive every event (log line, image, dropped frame) on the
    /// producer thread, before images are published to the mailbox.
    pub fn with_subscriber<F>(mut self, subscriber: F) -> Self
    where
        F: FnMut(&RxEvent) + Send + 'static,
    {
        self.subscriber = Some(Box::new(subscriber));
        self
    }

    /// Start the producer thread. The link starts out closed.
    pub fn spawn(self) -> Result<Capture> {
        let (commands, inbox) = mpsc::channel();
        let mailbox = Arc::new(Mailbox::new());

        let worker = Worker {
            link: LinkManager::new(self.opener).with_read_timeout(self.config.read_timeout),
            reader: LinkReader::with_config(self.config.reader.clone()),
            idle_sleep: self.config.reader.idle_sleep,
            commands: inbox,
            sink: PublishSink {
                mailbox: Arc::clone(&mailbox),
                subscriber: self.subscriber,
            },
        };

        let handle = thread::Builder::new()
            .name("eimlcap-capture".to_string())
            .spawn(move || worker.run())
            .map_err(CaptureError::Spawn)?;

        Ok(Capture {
            commands,
            mailbox,
            worker: Some(handle),
        })
    }
}

/// Handle to a running capture service.
///
/// The serial connection is owned by the producer thread; this handle only
/// sends it commands. Dropping the handle stops the thread and closes the
/// port.
pub struct Capture {
    commands: Sender<Command>,
    mailbox: Arc<Mailbox<Image>>,
    worker: Option<JoinHandle<()>>,
}

impl Capture {
    /// Start building a capture service around `opener`.
    pub fn builder<O: Opener + 'static>(opener: O) -> CaptureBuilder<O> {
        CaptureBuilder::new(opener)
    }

    /// Close any open connection, then open `port` at `baud`.
    ///
    /// Blocks until the producer thread has tried to open the port. A
    /// partially received line from an earlier connection is discarded.
    pub fn connect(&self, port: &str, baud: u32) -> Result<()> {
        self.request(|reply| Command::Connect {
            port: port.to_string(),
            baud,
            reply,
        })
    }

    /// Close the connection. The producer stops reading before this returns.
    pub fn close(&self) -> Result<()> {
        self.request(|reply| Command::Close { reply })
    }

    /// Take the most recent unread image, if any. Never blocks.
    pub fn try_take_image(&self) -> Option<Image> {
        self.mailbox.try_take()
    }

    /// Shared handle to the image mailbox, for a consumer on another thread.
    pub fn mailbox(&self) -> Arc<Mailbox<Image>> {
        Arc::clone(&self.mailbox)
    }

    /// True while the producer thread is alive.
    pub fn is_running(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|worker| !worker.is_finished())
    }

    /// Stop the producer thread and close the port.
    pub fn shutdown(self) {
        drop(self);
    }

    fn request(&self, make: impl FnOnce(Reply) -> Command) -> Result<()> {
        let (reply, response) = mpsc::channel();
        self.commands
            .send(make(reply))
            .map_err(|_| CaptureError::WorkerGone)?;
        response
            .recv()
            .map_err(|_| CaptureError::WorkerGone)?
            .map_err(CaptureError::from)
    }
}

impl Drop for Capture {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("capture worker panicked");
            }
        }
    }
}

impl std::fmt::Debug for Capture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capture")
            .field("running", &self.is_running())
            .field("image_pending", &self.mailbox.has_pending())
            .finish()
    }
}

struct PublishSink {
    mailbox: Arc<Mailbox<Image>>,
    subscriber: Option<Subscriber>,
}

impl EventSink for PublishSink {
    fn on_event(&mut self, event: RxEvent) {
        if let Some(subscriber) = self.subscriber.as_mut() {
            subscriber(&event);
        }

        match event {
            RxEvent::Log(line) => info!(line = %line, "recv"),
            RxEvent::Image(image) => {
                debug!(kind = image.kind(), bytes = image.byte_len(), "image received");
                if self.mailbox.publish(image) {
                    trace!("replaced unread image");
                }
            }
            RxEvent::Dropped(err) => {
                warn!(error = %err, offset = err.offset(), "dropped image frame");
            }
        }
    }
}

struct Worker<O> {
    link: LinkManager<O>,
    reader: LinkReader,
    idle_sleep: Duration,
    commands: Receiver<Command>,
    sink: PublishSink,
}

impl<O: Opener> Worker<O> {
    fn run(mut self) {
        debug!("capture worker started");
        loop {
            // While closed there is nothing to poll, so wait for a command.
            let command = if self.link.is_open() {
                match self.commands.try_recv() {
                    Ok(command) => Some(command),
                    Err(TryRecvError::Empty) => None,
                    Err(TryRecvError::Disconnected) => break,
                }
            } else {
                match self.commands.recv() {
                    Ok(command) => Some(command),
                    Err(_) => break,
                }
            };

            if let Some(command) = command {
                if !self.handle(command) {
                    break;
                }
                continue;
            }

            match self.reader.step(&mut self.link, &mut self.sink) {
                Step::Idle => thread::sleep(self.idle_sleep),
                Step::Processed(_) => {}
                Step::Closed => {
                    // The port went away under us; release it and wait for
                    // the next command instead of polling a dead handle.
                    if let Err(err) = self.link.close() {
                        warn!(error = %err, "error closing lost serial link");
                    }
                    self.reader.reset();
                }
            }
        }

        if let Err(err) = self.link.close() {
            warn!(error = %err, "error closing serial link on shutdown");
        }
        debug!("capture worker stopped");
    }

    /// Returns false when the worker should exit.
    fn handle(&mut self, command: Command) -> bool {
        match command {
            Command::Connect { port, baud, reply } => {
                self.reader.reset();
                let result = self.link.connect(&port, baud);
                if let Err(err) = &result {
                    warn!(port = %port, baud, error = %err, "connect failed");
                }
                let _ = reply.send(result);
                true
            }
            Command::Close { reply } => {
                let result = self.link.close();
                self.reader.reset();
                let _ = reply.send(result);
                true
            }
            Command::Shutdown => false,
        }
    }
}
