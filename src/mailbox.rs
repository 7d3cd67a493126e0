//! Per actor FIFO mailbox with an owned execution token.
//!
//! State machine: `Idle -> Scheduled` when a producer (or the releasing
//! worker) finds queued work, `Scheduled -> Running` when a worker acquires
//! the [`MailboxToken`], `Running -> Idle` when the token drops. Only the
//! token holder can dequeue, so at most one processing cycle is in flight.

use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};

use crossbeam_queue::SegQueue;

const IDLE: u8 = 0;
const SCHEDULED: u8 = 1;
const RUNNING: u8 = 2;

const SPIN_LIMIT: u32 = 64;

pub(crate) struct Mailbox<T> {
    queue: SegQueue<T>,
    len: AtomicUsize,
    state: AtomicU8,
    closed: AtomicBool,
    producers: AtomicUsize,
}

impl<T> Mailbox<T> {
    pub fn new() -> Self {
        Self {
            queue: SegQueue::new(),
            len: AtomicUsize::new(0),
            state: AtomicU8::new(IDLE),
            closed: AtomicBool::new(false),
            producers: AtomicUsize::new(0),
        }
    }

    /// Appends `item`, handing it back if the mailbox is closed.
    pub fn enqueue(&self, item: T) -> Result<(), T> {
        self.producers.fetch_add(1, Ordering::SeqCst);
        if self.closed.load(Ordering::SeqCst) {
            self.producers.fetch_sub(1, Ordering::SeqCst);
            return Err(item);
        }
        self.push(item);
        self.producers.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }

    /// Closes the mailbox and waits for producers already past the closed
    /// check. Returns true for the call that performed the close.
    ///
    /// The wait is bounded: a producer holds the counter only across one
    /// queue push, and no new producer gets past the flag.
    pub fn close(&self) -> bool {
        let first = !self.closed.swap(true, Ordering::SeqCst);
        let mut spins = 0u32;
        while self.producers.load(Ordering::SeqCst) != 0 {
            if spins < SPIN_LIMIT {
                spins += 1;
                std::hint::spin_loop();
            } else {
                std::thread::yield_now();
            }
        }
        first
    }

    /// Appends after close; used for the stop marker.
    pub fn push_closed(&self, item: T) {
        debug_assert!(self.is_closed());
        self.push(item);
    }

    fn push(&self, item: T) {
        self.queue.push(item);
        self.len.fetch_add(1, Ordering::SeqCst);
    }

    /// Marks the mailbox scheduled if it has work and is idle. Returns true
    /// when the caller must hand the owner to its execution environment.
    pub fn request_schedule(&self) -> bool {
        if self.len.load(Ordering::SeqCst) == 0 {
            return false;
        }
        self.state
            .compare_exchange(IDLE, SCHEDULED, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Acquires the execution token of a scheduled mailbox.
    pub fn try_acquire(&self) -> Option<MailboxToken<'_, T>> {
        self.state
            .compare_exchange(SCHEDULED, RUNNING, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| MailboxToken { mailbox: self })
    }

    /// Acquires the token of an idle or scheduled mailbox without a
    /// scheduling request. Used once no worker will run the owner again.
    pub fn seize(&self) -> Option<MailboxToken<'_, T>> {
        let mut current = self.state.load(Ordering::SeqCst);
        while current != RUNNING {
            match self.state.compare_exchange(
                current,
                RUNNING,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return Some(MailboxToken { mailbox: self }),
                Err(actual) => current = actual,
            }
        }
        None
    }

    pub fn len(&self) -> usize {
        self.len.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Proof that the holder is the only one processing the mailbox.
pub(crate) struct MailboxToken<'a, T> {
    mailbox: &'a Mailbox<T>,
}

impl<T> MailboxToken<'_, T> {
    pub fn dequeue(&self) -> Option<T> {
        let item = self.mailbox.queue.pop()?;
        self.mailbox.len.fetch_sub(1, Ordering::SeqCst);
        Some(item)
    }
}

impl<T> Drop for MailboxToken<'_, T> {
    fn drop(&mut self) {
        self.mailbox.state.store(IDLE, Ordering::SeqCst);
    }
}
