//! # Worker Channel
//!
//! The transport between a host and a plugin runtime running in the same process, on a
//! worker thread of its own. `spawn_worker` keeps one end and hands the other to the host.
//! The test suite connects Main and Ext peers the same way.
//!
//! Frames are moved as owned buffers over unbounded tokio channels, one per direction.
//! An end closes when it is dropped or hung up; the other end then drains what was
//! already sent and reads `Ok(None)`.

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::transport;
use crate::transport::Transport;
use crate::transport::TransportError;

pub struct DuplexChannelTransport {
    // `None` once this end hung up.
    outgoing: Mutex<Option<mpsc::UnboundedSender<Vec<u8>>>>,
    // Only the peer's pump reads, so the async lock is never contended.
    incoming: tokio::sync::Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
}

impl DuplexChannelTransport {
    /// Two connected ends: what one sends, the other receives.
    pub fn pair() -> (Self, Self) {
        let (to_second, from_first) = mpsc::unbounded_channel();
        let (to_first, from_second) = mpsc::unbounded_channel();
        (Self::end(to_second, from_second), Self::end(to_first, from_first))
    }

    fn end(outgoing: mpsc::UnboundedSender<Vec<u8>>, incoming: mpsc::UnboundedReceiver<Vec<u8>>) -> Self {
        Self {
            outgoing: Mutex::new(Some(outgoing)),
            incoming: tokio::sync::Mutex::new(incoming),
        }
    }

    /// Stops sending. The other end reads `Ok(None)` after the frames already in flight.
    pub fn hang_up(&self) {
        self.outgoing.lock().take();
    }

    /// Whether the other end can still receive.
    pub fn is_connected(&self) -> bool {
        self.outgoing.lock().as_ref().is_some_and(|tx| !tx.is_closed())
    }
}

#[async_trait::async_trait]
impl Transport for DuplexChannelTransport {
    async fn send(&self, payload: &[u8]) -> transport::Result<()> {
        let outgoing = self.outgoing.lock();
        let Some(tx) = outgoing.as_ref() else {
            return Err(TransportError::ConnectionLost("worker channel hung up".into()));
        };
        tx.send(payload.to_vec())
            .map_err(|_| TransportError::ConnectionLost("worker channel closed by the other end".into()))
    }

    async fn recv(&self) -> transport::Result<Option<Vec<u8>>> {
        Ok(self.incoming.lock().await.recv().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_frames_cross_in_both_directions() {
        let (host, worker) = DuplexChannelTransport::pair();
        host.send(b"one").await.unwrap();
        host.send(b"two").await.unwrap();
        worker.send(b"back").await.unwrap();

        assert_eq!(worker.recv().await.unwrap(), Some(b"one".to_vec()));
        assert_eq!(worker.recv().await.unwrap(), Some(b"two".to_vec()));
        assert_eq!(host.recv().await.unwrap(), Some(b"back".to_vec()));
    }

    #[tokio::test]
    async fn test_hang_up_drains_then_closes() {
        let (host, worker) = DuplexChannelTransport::pair();
        host.send(b"last").await.unwrap();
        host.hang_up();

        assert!(!host.is_connected());
        assert!(matches!(host.send(b"late").await, Err(TransportError::ConnectionLost(_))));
        assert_eq!(worker.recv().await.unwrap(), Some(b"last".to_vec()));
        assert_eq!(worker.recv().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_dropped_end_disconnects() {
        let (host, worker) = DuplexChannelTransport::pair();
        assert!(host.is_connected());
        drop(worker);

        assert!(!host.is_connected());
        assert!(host.send(b"anyone?").await.is_err());
        assert_eq!(host.recv().await.unwrap(), None);
    }
}
