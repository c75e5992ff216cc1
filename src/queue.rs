//! The transmit queue: a singly-linked FIFO of pending outbound messages.

use crate::message::Message;

/// A FIFO queue of messages awaiting write-out by an I/O loop.
///
/// Implemented as an intrusive singly-linked list through
/// [`Message::next`], matching the ownership model of the messages it
/// holds: the queue owns its messages only via that link. Serving a
/// message hands ownership back to the caller, who is responsible for
/// eventually freeing it (dropping it, in Rust terms) once the I/O loop is
/// done with it.
///
/// Pushing walks to the tail, so it's `O(n)` in queue length; serving pops
/// the head, so it's `O(1)`. An I/O loop that serves in a tight loop (the
/// common case) gets the cheap side of that trade.
#[derive(Debug, Default)]
pub struct TxQueue {
    head: Option<Box<Message>>,
}

impl TxQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        TxQueue { head: None }
    }

    /// Returns `true` if the queue has no pending messages.
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Appends `msg` at the tail of the queue.
    ///
    /// `msg.next` is overwritten; the caller must not push a message that
    /// is already a member of some queue (this one or another).
    pub fn push(&mut self, mut msg: Box<Message>) {
        msg.next = None;

        let mut cursor = &mut self.head;
        loop {
            match cursor {
                None => {
                    *cursor = Some(msg);
                    return;
                }
                Some(node) => cursor = &mut node.next,
            }
        }
    }

    /// Removes and returns the head of the queue, or `None` if empty.
    ///
    /// The returned message's `next` link is cleared, so it's safe to push
    /// onto another queue.
    pub fn serve(&mut self) -> Option<Box<Message>> {
        let mut head = self.head.take()?;
        self.head = head.next.take();
        Some(head)
    }
}
