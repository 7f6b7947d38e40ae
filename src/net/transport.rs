use core::{
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};
use std::{
    collections::VecDeque,
    io::{self, Read, Write},
    net::{Shutdown, TcpStream, ToSocketAddrs},
    sync::Weak,
    time::Instant,
};

use log::*;
use parking_lot::{Condvar, Mutex};

use crate::{config::NetworkConfig, net::LineFramer};

/// receives what a [`Transport`] reads off the socket
pub trait TransportHandler: Send + Sync {
    /// called once per complete line, without the CRLF
    fn on_line(&self, line: &str);
    /// called exactly once each time an open session closes, whatever closed it
    fn on_disconnect(&self);
}

#[derive(Debug, Clone)]
pub struct TransportSettings {
    /// delay between failed connection attempts
    pub retry_interval: Duration,
    /// connect, send, and receive timeout of the socket
    pub operation_timeout: Duration,
    /// minimum delay between two writes
    pub send_inhibit: Duration,
    /// how long the sender sleeps on an empty queue before checking again
    pub idle_delay: Duration,
    pub buffer_size: usize,
}

impl From<&NetworkConfig> for TransportSettings {
    fn from(config: &NetworkConfig) -> Self {
        Self {
            retry_interval: config.retry_interval,
            operation_timeout: config.operation_timeout,
            send_inhibit: config.send_inhibit,
            idle_delay: config.idle_delay,
            buffer_size: config.buffer_size,
        }
    }
}

/// one TCP session at a time, with a queued sender loop and a line reassembling receiver loop.
///
/// the sender loop ([`Transport::run_sender`]) lives for the whole lifetime of the transport and
/// idles while there is no session. the receiver loop ([`Transport::siphon`]) lives for one
/// session and returns once it closes.
pub struct Transport {
    settings: TransportSettings,
    handler: Weak<dyn TransportHandler>,
    // the session's socket. reads happen on a clone so that closing never waits on a read
    reader: Mutex<Option<TcpStream>>,
    writer: Mutex<Option<TcpStream>>,
    queue: Mutex<VecDeque<String>>,
    // signalled on new queued lines, on close, and on shutdown
    wake: Condvar,
    connected: AtomicBool,
    shutdown: AtomicBool,
}

impl Transport {
    pub fn new(settings: TransportSettings, handler: Weak<dyn TransportHandler>) -> Self {
        Self {
            settings,
            handler,
            reader: Mutex::new(None),
            writer: Mutex::new(None),
            queue: Mutex::new(VecDeque::new()),
            wake: Condvar::new(),
            connected: AtomicBool::new(false),
            shutdown: AtomicBool::new(false),
        }
    }

    pub fn settings(&self) -> &TransportSettings {
        &self.settings
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// tries every address of every host in order, pausing for the retry interval after each
    /// failure. returns true once a session is open, or false when every candidate failed or the
    /// transport was shut down.
    pub fn connect(&self, hosts: &[String], port: u16) -> bool {
        let mut failed = false;

        for host in hosts {
            if failed && !self.pause(self.settings.retry_interval) {
                return false;
            }

            let addrs = match (host.as_str(), port).to_socket_addrs() {
                Ok(addrs) => addrs.collect::<Vec<_>>(),
                Err(e) => {
                    warn!("could not resolve {}: {}", host, e);
                    failed = true;
                    continue;
                }
            };

            for addr in addrs {
                if failed && !self.pause(self.settings.retry_interval) {
                    return false;
                }

                debug!("connecting to {} ({})", host, addr);
                match TcpStream::connect_timeout(&addr, self.settings.operation_timeout)
                    .and_then(|stream| self.attach(stream))
                {
                    Ok(()) => {
                        info!("connected to {} ({})", host, addr);
                        return true;
                    }
                    Err(e) => {
                        warn!("could not connect to {} ({}): {}", host, addr, e);
                        failed = true;
                    }
                }
            }
        }

        false
    }

    fn attach(&self, stream: TcpStream) -> io::Result<()> {
        stream.set_read_timeout(Some(self.settings.operation_timeout))?;
        stream.set_write_timeout(Some(self.settings.operation_timeout))?;
        stream.set_nodelay(true)?;
        let reader = stream.try_clone()?;

        *self.reader.lock() = Some(reader);
        *self.writer.lock() = Some(stream);
        self.queue.lock().clear();
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// queues one line for the sender loop. the CRLF is added here. returns false, dropping the
    /// line, when there is no open session.
    pub fn pump(&self, line: &str) -> bool {
        let line = line.trim_end_matches(['\r', '\n']);
        if !self.is_connected() {
            debug!("not connected, dropping {:?}", line);
            return false;
        }

        let mut queue = self.queue.lock();
        queue.push_back(format!("{}\r\n", line));
        self.wake.notify_all();
        true
    }

    /// number of lines waiting to be sent
    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    /// the sender loop. sends queued lines one at a time with the send inhibit delay between
    /// them, until the transport is shut down.
    pub fn run_sender(&self) {
        debug!("sender loop started");
        while !self.is_shutdown() {
            let line = {
                let mut queue = self.queue.lock();
                match queue.pop_front() {
                    Some(line) => line,
                    None => {
                        if !self.is_shutdown() {
                            // idle until something is pumped or the idle delay runs out
                            self.wake.wait_for(&mut queue, self.settings.idle_delay);
                        }
                        continue;
                    }
                }
            };

            match self.write_line(&line) {
                Ok(()) => {
                    trace!("<- {:?}", line.trim_end());
                    self.inhibit(self.settings.send_inhibit);
                }
                Err(e) => {
                    if self.is_connected() {
                        error!("write failed: {}", e);
                    }
                    self.close();
                }
            }
        }
        debug!("sender loop stopped");
    }

    fn write_line(&self, line: &str) -> io::Result<()> {
        let mut writer = self.writer.lock();
        let Some(stream) = writer.as_mut() else {
            return Err(io::ErrorKind::NotConnected.into());
        };

        let bytes = line.as_bytes();
        let mut written = 0;
        while written < bytes.len() {
            if !self.is_connected() {
                return Err(io::ErrorKind::NotConnected.into());
            }
            match stream.write(&bytes[written..]) {
                Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
                Ok(count) => written += count,
                Err(e) if is_transient(&e) => continue,
                Err(e) => return Err(e),
            }
        }
        stream.flush()
    }

    /// the receiver loop for the current session. reads until the session closes, handing every
    /// complete line to the handler.
    pub fn siphon(&self) {
        let reader = self
            .reader
            .lock()
            .as_ref()
            .map(TcpStream::try_clone)
            .transpose();
        let mut stream = match reader {
            Ok(Some(stream)) => stream,
            Ok(None) => return,
            Err(e) => {
                error!("could not clone socket for reading: {}", e);
                self.close();
                return;
            }
        };

        let mut buffer = vec![0_u8; self.settings.buffer_size.max(1)];
        let mut framer = LineFramer::new();
        while self.is_connected() {
            match stream.read(&mut buffer) {
                // TCP streams return Ok(0) when they have been gracefully closed by the other side
                Ok(0) => {
                    if self.is_connected() {
                        info!("server closed the connection");
                    }
                    self.close();
                }
                Ok(count) => {
                    let Some(handler) = self.handler.upgrade() else {
                        self.close();
                        break;
                    };
                    for line in framer.push(&buffer[..count]) {
                        // a line may have closed the session, the rest belongs to no session
                        if !self.is_connected() {
                            trace!("dropping {:?} after close", line);
                            break;
                        }
                        trace!("-> {:?}", line);
                        handler.on_line(&line);
                    }
                }
                Err(e) if is_transient(&e) => {}
                Err(e) => {
                    if self.is_connected() {
                        error!("read failed: {}", e);
                    }
                    self.close();
                }
            }
        }
    }

    /// closes the current session. wakes the sender, unblocks the receiver, drops anything still
    /// queued, and notifies the handler. does nothing if no session is open.
    pub fn close(&self) {
        if !self.connected.swap(false, Ordering::SeqCst) {
            return;
        }

        if let Some(stream) = self.reader.lock().take() {
            // shutting down one handle shuts down the socket under every clone of it
            let _ = stream.shutdown(Shutdown::Both);
        }
        self.writer.lock().take();
        {
            let mut queue = self.queue.lock();
            queue.clear();
            self.wake.notify_all();
        }
        debug!("session closed");

        if let Some(handler) = self.handler.upgrade() {
            handler.on_disconnect();
        }
    }

    /// stops both loops for good and closes any open session
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.close();
        self.interrupt();
    }

    /// wakes anything sleeping in the transport so it re-checks its state
    pub fn interrupt(&self) {
        let _queue = self.queue.lock();
        self.wake.notify_all();
    }

    /// sleeps for `duration` unless the transport is shut down first. new queued lines do not cut
    /// the sleep short. returns false if it was cut short by shutdown.
    pub fn pause(&self, duration: Duration) -> bool {
        self.sleep_unless(duration, || self.is_shutdown())
    }

    /// the delay between two sends. also ends when the session closes.
    fn inhibit(&self, duration: Duration) -> bool {
        self.sleep_unless(duration, || self.is_shutdown() || !self.is_connected())
    }

    fn sleep_unless(&self, duration: Duration, stop: impl Fn() -> bool) -> bool {
        let deadline = Instant::now() + duration;
        let mut queue = self.queue.lock();
        while !stop() {
            if self.wake.wait_until(&mut queue, deadline).timed_out() {
                return true;
            }
        }
        false
    }
}

fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
    )
}
