//! Communication abstraction for intra-process (thread) and inter-process
//! (MPI) message passing.
//!
//! Wire format conventions (for higher-level protocols):
//! - Scalars are LE fixed width (`i32` positions/sums/ranks).
//! - Pixel rows travel as raw bytes, one byte per pixel.
//! - Receivers may truncate to their requested length; the halo protocol
//!   always knows exact lengths up front.

use once_cell::sync::Lazy;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};

/// Anything that can be waited on.
pub trait Wait {
    /// Block until completion and return the received data (if any).
    fn wait(self) -> Option<Vec<u8>>;
}

/// Non-blocking completion test on a posted operation.
///
/// `probe` reports whether the operation has completed; the payload of a
/// completed receive is claimed by the first successful probe and handed
/// out once via `take`.
pub trait Probe {
    fn probe(&mut self) -> bool;
    fn take(&mut self) -> Option<Vec<u8>>;
}

/// Non-blocking point-to-point communication interface.
///
/// Implementors provide asynchronous send/receive operations whose handles
/// support both blocking drain (`Wait`) and cooperative polling (`Probe`).
/// Messages on a fixed `(peer, tag)` pair are delivered in issue order.
pub trait Communicator: Send + Sync + 'static {
    /// Handle returned by `isend`.
    type SendHandle: Wait + Probe;
    /// Handle returned by `irecv`.
    type RecvHandle: Wait + Probe;

    fn isend(&self, peer: usize, tag: CommTag, buf: &[u8]) -> Self::SendHandle;
    /// Post a receive of up to `len` bytes from `peer` on `tag`.
    fn irecv(&self, peer: usize, tag: CommTag, len: usize) -> Self::RecvHandle;

    /// Rank of this process (0..size-1).
    fn rank(&self) -> usize;
    /// Total number of ranks, coordinator included.
    fn size(&self) -> usize;
}

/// Tag newtype for safer tag arithmetic.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct CommTag(u16);

impl CommTag {
    /// Create a new tag from a raw `u16`.
    #[inline]
    pub const fn new(tag: u16) -> Self {
        Self(tag)
    }

    /// Return the underlying `u16` value.
    #[inline]
    pub const fn get(self) -> u16 {
        self.0
    }

    /// Offset the tag by `dx`, wrapping on overflow.
    #[inline]
    pub const fn offset(self, dx: u16) -> Self {
        Self(self.0.wrapping_add(dx))
    }
}

/// Compile-time no-op comm for pure serial unit tests.
///
/// Sends vanish and receives never deliver; suitable only for code paths
/// that post no traffic (a worker whose neighbour table is empty).
#[derive(Clone, Debug, Default)]
pub struct NoComm;

impl Wait for () {
    fn wait(self) -> Option<Vec<u8>> {
        None
    }
}

impl Probe for () {
    fn probe(&mut self) -> bool {
        true
    }
    fn take(&mut self) -> Option<Vec<u8>> {
        None
    }
}

impl Communicator for NoComm {
    type SendHandle = ();
    type RecvHandle = ();

    fn isend(&self, _peer: usize, _tag: CommTag, _buf: &[u8]) {}

    fn irecv(&self, _peer: usize, _tag: CommTag, _len: usize) {}

    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }
}

// --- ThreadComm: intra-process, one rank per thread ---

// (fabric, src, dst, tag); the fabric id isolates concurrently running
// deployments (e.g. parallel test binaries sharing this process).
type Key = (u64, usize, usize, u16);

#[derive(Default)]
struct Slot {
    q: VecDeque<Vec<u8>>,
}

struct Mailbox {
    map: Mutex<HashMap<Key, Arc<(Mutex<Slot>, Condvar)>>>,
}

static MAILBOX: Lazy<Mailbox> = Lazy::new(|| Mailbox {
    map: Mutex::new(HashMap::new()),
});

static NEXT_FABRIC: AtomicU64 = AtomicU64::new(0);

fn mailbox_entry(key: Key) -> Arc<(Mutex<Slot>, Condvar)> {
    let mut g = MAILBOX.map.lock().expect("MAILBOX poisoned");
    g.entry(key)
        .or_insert_with(|| Arc::new((Mutex::new(Slot::default()), Condvar::new())))
        .clone()
}

pub struct LocalSendHandle;

impl Wait for LocalSendHandle {
    fn wait(self) -> Option<Vec<u8>> {
        None
    }
}

impl Probe for LocalSendHandle {
    // The payload is copied into the mailbox at post time.
    fn probe(&mut self) -> bool {
        true
    }
    fn take(&mut self) -> Option<Vec<u8>> {
        None
    }
}

pub struct LocalRecvHandle {
    cell: Arc<(Mutex<Slot>, Condvar)>,
    want_len: usize,
    got: Option<Vec<u8>>,
}

impl Wait for LocalRecvHandle {
    fn wait(mut self) -> Option<Vec<u8>> {
        if let Some(msg) = self.got.take() {
            return Some(msg);
        }
        let (lock, cv) = &*self.cell;
        let mut slot = lock.lock().expect("Slot poisoned");
        while slot.q.is_empty() {
            slot = cv.wait(slot).expect("Condvar poisoned");
        }
        let mut msg = slot.q.pop_front().expect("q non-empty");
        msg.truncate(self.want_len.min(msg.len()));
        Some(msg)
    }
}

impl Probe for LocalRecvHandle {
    fn probe(&mut self) -> bool {
        if self.got.is_some() {
            return true;
        }
        let (lock, _cv) = &*self.cell;
        let mut slot = lock.lock().expect("Slot poisoned");
        match slot.q.pop_front() {
            Some(mut msg) => {
                msg.truncate(self.want_len.min(msg.len()));
                self.got = Some(msg);
                true
            }
            None => false,
        }
    }

    fn take(&mut self) -> Option<Vec<u8>> {
        self.got.take()
    }
}

/// In-process communicator: ranks are threads, messages go through a
/// process-wide mailbox keyed by `(fabric, src, dst, tag)`.
#[derive(Clone, Debug)]
pub struct ThreadComm {
    fabric: u64,
    rank: usize,
    size: usize,
}

impl ThreadComm {
    /// Create one communicator per rank, all wired to a fresh fabric.
    pub fn fabric(size: usize) -> Vec<ThreadComm> {
        let fabric = NEXT_FABRIC.fetch_add(1, Ordering::Relaxed);
        (0..size)
            .map(|rank| ThreadComm { fabric, rank, size })
            .collect()
    }
}

impl Communicator for ThreadComm {
    type SendHandle = LocalSendHandle;
    type RecvHandle = LocalRecvHandle;

    fn isend(&self, peer: usize, tag: CommTag, buf: &[u8]) -> Self::SendHandle {
        let key = (self.fabric, self.rank, peer, tag.get());
        let entry = mailbox_entry(key);
        let (lock, cv) = &*entry;
        {
            let mut slot = lock.lock().expect("Slot poisoned");
            slot.q.push_back(buf.to_vec());
        }
        cv.notify_all();
        LocalSendHandle
    }

    fn irecv(&self, peer: usize, tag: CommTag, len: usize) -> Self::RecvHandle {
        let key = (self.fabric, peer, self.rank, tag.get());
        LocalRecvHandle {
            cell: mailbox_entry(key),
            want_len: len,
            got: None,
        }
    }

    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }
}

// --- MPI backend ---
#[cfg(feature = "mpi-support")]
mod mpi_backend {
    use super::*;
    use core::ptr::NonNull;
    use mpi::environment::Universe;
    use mpi::point_to_point::{Destination, Source};
    use mpi::request::StaticScope;
    use mpi::topology::{Communicator as _, SimpleCommunicator};

    pub struct MpiComm {
        _universe: Universe,
        pub world: SimpleCommunicator,
        rank: usize,
        size: usize,
    }

    unsafe impl Send for MpiComm {}
    unsafe impl Sync for MpiComm {}

    impl Default for MpiComm {
        fn default() -> Self {
            let uni = mpi::initialize().expect("MPI initialization failed");
            let world = uni.world();
            let rank = world.rank() as usize;
            let size = world.size() as usize;
            Self {
                _universe: uni,
                world,
                rank,
                size,
            }
        }
    }

    impl Communicator for MpiComm {
        type SendHandle = MpiSendHandle;
        type RecvHandle = MpiRecvHandle;

        fn isend(&self, peer: usize, tag: CommTag, buf: &[u8]) -> Self::SendHandle {
            let boxed = buf.to_vec().into_boxed_slice();
            let raw: *mut [u8] = Box::into_raw(boxed);
            let slice: &[u8] = unsafe { &*raw };
            let req = self
                .world
                .process_at_rank(peer as i32)
                .immediate_send_with_tag(StaticScope, slice, tag.get() as i32);
            MpiSendHandle {
                req: Some(req),
                buf: Some(unsafe { NonNull::new_unchecked(raw) }),
            }
        }

        fn irecv(&self, peer: usize, tag: CommTag, len: usize) -> Self::RecvHandle {
            let boxed = vec![0u8; len].into_boxed_slice();
            let raw: *mut [u8] = Box::into_raw(boxed);
            let slice_mut: &mut [u8] = unsafe { &mut *raw };
            let req = self
                .world
                .process_at_rank(peer as i32)
                .immediate_receive_into_with_tag(StaticScope, slice_mut, tag.get() as i32);
            MpiRecvHandle {
                req: Some(req),
                buf: Some(unsafe { NonNull::new_unchecked(raw) }),
                len,
                got: None,
            }
        }

        fn rank(&self) -> usize {
            self.rank
        }
        fn size(&self) -> usize {
            self.size
        }
    }

    pub struct MpiSendHandle {
        req: Option<mpi::request::Request<'static, [u8], StaticScope>>,
        buf: Option<NonNull<[u8]>>,
    }

    impl MpiSendHandle {
        fn release_buf(&mut self) {
            if let Some(ptr) = self.buf.take() {
                unsafe {
                    drop(Box::from_raw(ptr.as_ptr()));
                }
            }
        }
    }

    impl Wait for MpiSendHandle {
        fn wait(mut self) -> Option<Vec<u8>> {
            if let Some(r) = self.req.take() {
                let _ = r.wait();
            }
            self.release_buf();
            None
        }
    }

    impl Probe for MpiSendHandle {
        fn probe(&mut self) -> bool {
            let Some(req) = self.req.take() else {
                return true;
            };
            match req.test() {
                Ok(_status) => {
                    self.release_buf();
                    true
                }
                Err(req) => {
                    self.req = Some(req);
                    false
                }
            }
        }

        fn take(&mut self) -> Option<Vec<u8>> {
            None
        }
    }

    impl Drop for MpiSendHandle {
        fn drop(&mut self) {
            if let Some(r) = self.req.take() {
                let _ = r.test();
            }
            self.release_buf();
        }
    }

    pub struct MpiRecvHandle {
        req: Option<mpi::request::Request<'static, [u8], StaticScope>>,
        buf: Option<NonNull<[u8]>>,
        len: usize,
        got: Option<Vec<u8>>,
    }

    impl MpiRecvHandle {
        fn reclaim_buf(&mut self) -> Option<Vec<u8>> {
            let ptr = self.buf.take()?;
            let boxed: Box<[u8]> = unsafe { Box::from_raw(ptr.as_ptr()) };
            let mut v = Vec::from(boxed);
            v.truncate(self.len);
            Some(v)
        }
    }

    impl Wait for MpiRecvHandle {
        fn wait(mut self) -> Option<Vec<u8>> {
            if let Some(msg) = self.got.take() {
                return Some(msg);
            }
            if let Some(r) = self.req.take() {
                let _ = r.wait();
            }
            self.reclaim_buf()
        }
    }

    impl Probe for MpiRecvHandle {
        fn probe(&mut self) -> bool {
            if self.got.is_some() {
                return true;
            }
            let Some(req) = self.req.take() else {
                return true;
            };
            match req.test() {
                Ok(_status) => {
                    self.got = self.reclaim_buf();
                    true
                }
                Err(req) => {
                    self.req = Some(req);
                    false
                }
            }
        }

        fn take(&mut self) -> Option<Vec<u8>> {
            self.got.take()
        }
    }

    impl Drop for MpiRecvHandle {
        fn drop(&mut self) {
            if let Some(r) = self.req.take() {
                let _ = r.test();
            }
            if let Some(ptr) = self.buf.take() {
                unsafe {
                    drop(Box::from_raw(ptr.as_ptr()));
                }
            }
        }
    }
}

#[cfg(feature = "mpi-support")]
pub use mpi_backend::MpiComm;
