use async_std::channel;
use async_std::channel::{ Receiver, Sender };

/// One-shot cancellation signal shared by clones.
///
/// Nothing is ever sent on the channel; closing it wakes every waiter.
#[derive(Debug, Clone)]
pub struct CancelToken {
    sender: Sender<()>,
    receiver: Receiver<()>,
}

impl CancelToken {
    pub fn new() -> CancelToken {
        let (sender, receiver) = channel::bounded(1);
        CancelToken { sender, receiver }
    }

    pub fn cancel(&self) {
        self.sender.close();
    }

    pub fn is_cancelled(&self) -> bool {
        self.sender.is_closed()
    }

    /// Resolves once `cancel` has been called on any clone.
    pub async fn cancelled(&self) {
        let _ = self.receiver.recv().await;
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        CancelToken::new()
    }
}
