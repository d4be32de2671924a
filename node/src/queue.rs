//! FIFO of work for the worker loop.
//!
//! The capacity bounds intake from the HTTP surface. Follow-up jobs and
//! retries replace the job they come from and bypass the bound.

use std::collections::VecDeque;

use linkid_types::{Ballot, RequestId};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobKind {
    /// Write a user's request to the ledger and relay it to peers.
    Register { id: RequestId },
    /// Follow up a request relayed by a peer.
    Broadcast { id: RequestId },
    SendCode { id: RequestId },
    Vote { id: RequestId, ballot: Ballot },
}

impl JobKind {
    pub fn request_id(&self) -> RequestId {
        match self {
            JobKind::Register { id }
            | JobKind::Broadcast { id }
            | JobKind::SendCode { id }
            | JobKind::Vote { id, .. } => *id,
        }
    }

    /// Metric label.
    pub fn label(&self) -> &'static str {
        match self {
            JobKind::Register { .. } => "register",
            JobKind::Broadcast { .. } => "broadcast",
            JobKind::SendCode { .. } => "send_code",
            JobKind::Vote { .. } => "vote",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Job {
    pub kind: JobKind,
    /// Failed attempts so far.
    pub attempts: u32,
}

impl Job {
    pub fn new(kind: JobKind) -> Self {
        Self { kind, attempts: 0 }
    }
}

#[derive(Debug)]
pub struct JobQueue {
    jobs: VecDeque<Job>,
    capacity: usize,
}

impl JobQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            jobs: VecDeque::new(),
            capacity,
        }
    }

    pub fn has_room(&self) -> bool {
        self.jobs.len() < self.capacity
    }

    /// Enqueue new intake; hands the job back when the queue is full.
    pub fn push(&mut self, kind: JobKind) -> Result<(), JobKind> {
        if !self.has_room() {
            return Err(kind);
        }
        self.jobs.push_back(Job::new(kind));
        Ok(())
    }

    /// Enqueue a follow-up or a retry regardless of capacity.
    pub fn requeue(&mut self, job: Job) {
        self.jobs.push_back(job);
    }

    pub fn pop(&mut self) -> Option<Job> {
        self.jobs.pop_front()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether any queued job concerns `id`.
    pub fn contains(&self, id: &RequestId) -> bool {
        self.jobs.iter().any(|j| j.kind.request_id() == *id)
    }
}
