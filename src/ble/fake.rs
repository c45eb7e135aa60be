//! In-memory transport that records every call, for tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;
use uuid::Uuid;

use crate::ble::transport::{BleTransport, DisconnectCallback};
use crate::error::{Error, Result};

/// One recorded transport call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum FakeEvent {
    Resolve(String),
    Connect(u32),
    Write {
        link: u32,
        characteristic: Uuid,
        data: Vec<u8>,
    },
    Disconnect(u32),
}

#[derive(Default)]
pub(crate) struct FakeTransport {
    known: Mutex<HashSet<String>>,
    events: Mutex<Vec<FakeEvent>>,
    next_link: AtomicU32,
    fail_connect: AtomicBool,
    fail_write_at: Mutex<Option<usize>>,
    write_delay: Mutex<Option<Duration>>,
    on_disconnect: Mutex<Vec<(u32, DisconnectCallback)>>,
}

impl FakeTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_device(address: &str) -> Self {
        let transport = Self::new();
        transport.add_device(address);
        transport
    }

    pub(crate) fn add_device(&self, address: &str) {
        self.known.lock().insert(address.to_string());
    }

    pub(crate) fn set_fail_connect(&self, fail: bool) {
        self.fail_connect.store(fail, Ordering::SeqCst);
    }

    /// Fail the write with this zero-based index (counted over successful
    /// writes). Fires once.
    pub(crate) fn fail_write_at(&self, index: usize) {
        *self.fail_write_at.lock() = Some(index);
    }

    pub(crate) fn set_write_delay(&self, delay: Duration) {
        *self.write_delay.lock() = Some(delay);
    }

    /// Simulate the device dropping the most recent link.
    pub(crate) fn drop_link(&self) {
        let callback = self.on_disconnect.lock().pop();
        if let Some((_, callback)) = callback {
            callback();
        }
    }

    /// Fire the disconnect callback registered for `link`, even if that
    /// link has since been replaced.
    pub(crate) fn drop_link_id(&self, link: u32) {
        let callback = {
            let mut callbacks = self.on_disconnect.lock();
            callbacks
                .iter()
                .position(|(id, _)| *id == link)
                .map(|index| callbacks.remove(index).1)
        };
        if let Some(callback) = callback {
            callback();
        }
    }

    pub(crate) fn events(&self) -> Vec<FakeEvent> {
        self.events.lock().clone()
    }

    pub(crate) fn writes(&self) -> Vec<Vec<u8>> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                FakeEvent::Write { data, .. } => Some(data.clone()),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn connect_count(&self) -> usize {
        self.count(|event| matches!(event, FakeEvent::Connect(_)))
    }

    pub(crate) fn disconnect_count(&self) -> usize {
        self.count(|event| matches!(event, FakeEvent::Disconnect(_)))
    }

    fn count(&self, predicate: impl Fn(&FakeEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|event| predicate(event)).count()
    }
}

#[async_trait]
impl BleTransport for FakeTransport {
    type Device = String;
    type Link = u32;

    async fn resolve(&self, address: &str) -> Result<Option<String>> {
        self.events
            .lock()
            .push(FakeEvent::Resolve(address.to_string()));
        Ok(self.known.lock().get(address).cloned())
    }

    async fn connect(&self, _device: &String, on_disconnect: DisconnectCallback) -> Result<u32> {
        let link = self.next_link.fetch_add(1, Ordering::SeqCst) + 1;
        self.events.lock().push(FakeEvent::Connect(link));

        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(Error::ConnectionFailed {
                reason: "simulated connect failure".to_string(),
            });
        }

        self.on_disconnect.lock().push((link, on_disconnect));
        Ok(link)
    }

    async fn write(&self, link: &u32, characteristic: Uuid, data: &[u8]) -> Result<()> {
        let delay = *self.write_delay.lock();
        match delay {
            Some(delay) => tokio::time::sleep(delay).await,
            None => tokio::task::yield_now().await,
        }

        let mut events = self.events.lock();
        let index = events
            .iter()
            .filter(|event| matches!(event, FakeEvent::Write { .. }))
            .count();
        let mut fail_at = self.fail_write_at.lock();
        if *fail_at == Some(index) {
            *fail_at = None;
            return Err(Error::TransportWriteFailed {
                reason: "simulated write failure".to_string(),
            });
        }

        events.push(FakeEvent::Write {
            link: *link,
            characteristic,
            data: data.to_vec(),
        });
        Ok(())
    }

    async fn disconnect(&self, link: &u32) -> Result<()> {
        self.events.lock().push(FakeEvent::Disconnect(*link));
        Ok(())
    }
}
