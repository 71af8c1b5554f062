//! K-sorted row identifiers and the per-context allocator binding.
//!
//! A [`RowId`] packs, from most to least significant bits:
//! 42 bits of milliseconds since the fixed epoch, 10 bits of node id,
//! and a 12-bit per-millisecond sequence. Ids are therefore roughly
//! time-ordered, unique per node within a millisecond, and collision-free
//! across nodes.

use crate::error::{CoreError, CoreResult};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fmt;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds of the id epoch (2025-01-01T00:00:00Z) since the Unix epoch.
pub const EPOCH_MS: u64 = 1_735_689_600_000;

const NODE_BITS: u32 = 10;
const SEQUENCE_BITS: u32 = 12;

/// Highest valid node id.
pub const MAX_NODE_ID: u16 = (1 << NODE_BITS) - 1;

const MAX_SEQUENCE: u16 = (1 << SEQUENCE_BITS) - 1;
const NODE_SHIFT: u32 = SEQUENCE_BITS;
const TIME_SHIFT: u32 = SEQUENCE_BITS + NODE_BITS;

/// Identifier of a mirrored row.
///
/// Assigned once at insert and immutable thereafter. Serializes as a
/// bare integer on the wire.
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RowId(u64);

impl RowId {
    /// Creates a row id from its raw integer form.
    #[inline]
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw integer form.
    #[inline]
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    /// Milliseconds since [`EPOCH_MS`] at which the id was minted.
    #[must_use]
    pub const fn timestamp_ms(&self) -> u64 {
        self.0 >> TIME_SHIFT
    }

    /// The node that minted the id.
    #[must_use]
    pub const fn node_id(&self) -> u16 {
        ((self.0 >> NODE_SHIFT) & MAX_NODE_ID as u64) as u16
    }

    /// The per-millisecond sequence counter.
    #[must_use]
    pub const fn sequence(&self) -> u16 {
        (self.0 & MAX_SEQUENCE as u64) as u16
    }
}

impl fmt::Debug for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RowId({} ms={} node={} seq={})",
            self.0,
            self.timestamp_ms(),
            self.node_id(),
            self.sequence()
        )
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<RowId> for u64 {
    fn from(id: RowId) -> Self {
        id.0
    }
}

impl From<u64> for RowId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

struct AllocatorState {
    last_ms: u64,
    sequence: u16,
}

/// Generator of unique, roughly time-ordered row ids for one node.
///
/// Safe for concurrent `next_id` calls within one process; the
/// (millisecond, sequence) pair is shared behind a mutex and every
/// caller receives a distinct id.
pub struct IdAllocator {
    node_id: u16,
    state: Mutex<AllocatorState>,
}

impl IdAllocator {
    /// Creates an allocator for the given node.
    ///
    /// Fails with [`CoreError::BadNodeId`] if `node_id` exceeds the
    /// 10-bit range.
    pub fn new(node_id: u16) -> CoreResult<Self> {
        if node_id > MAX_NODE_ID {
            return Err(CoreError::BadNodeId(node_id));
        }
        Ok(Self {
            node_id,
            state: Mutex::new(AllocatorState {
                last_ms: 0,
                sequence: 0,
            }),
        })
    }

    /// Returns the node id this allocator stamps into ids.
    pub fn node_id(&self) -> u16 {
        self.node_id
    }

    fn now_ms() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
            .saturating_sub(EPOCH_MS)
    }

    /// Produces the next id.
    ///
    /// Same-millisecond calls increment the sequence; when the sequence
    /// overflows the allocator spins until the clock advances. A clock
    /// that moved backwards is clamped to the previously used
    /// millisecond so ids never go back in time.
    pub fn next_id(&self) -> RowId {
        let mut state = self.state.lock();

        let mut ms = Self::now_ms();
        if ms < state.last_ms {
            ms = state.last_ms;
        }

        if ms == state.last_ms {
            if state.sequence == MAX_SEQUENCE {
                // Sequence exhausted for this millisecond; wait it out.
                loop {
                    let cur = Self::now_ms();
                    if cur > ms {
                        ms = cur;
                        break;
                    }
                    std::hint::spin_loop();
                }
                state.sequence = 0;
            } else {
                state.sequence += 1;
            }
        } else {
            state.sequence = 0;
        }
        state.last_ms = ms;

        RowId((ms << TIME_SHIFT) | ((self.node_id as u64) << NODE_SHIFT) | state.sequence as u64)
    }
}

impl fmt::Debug for IdAllocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdAllocator")
            .field("node_id", &self.node_id)
            .finish_non_exhaustive()
    }
}

thread_local! {
    static CURRENT_ALLOCATOR: RefCell<Option<Arc<IdAllocator>>> = const { RefCell::new(None) };
}

static DEFAULT_ALLOCATOR: RwLock<Option<Arc<IdAllocator>>> = RwLock::new(None);

/// Scoped binding of an allocator to the current thread.
///
/// Dropping the guard restores whatever binding was active before, on
/// every exit path, so multi-tenant hosts can rebind per request.
#[must_use = "the binding is released when the guard drops"]
pub struct AllocatorGuard {
    previous: Option<Arc<IdAllocator>>,
}

impl Drop for AllocatorGuard {
    fn drop(&mut self) {
        CURRENT_ALLOCATOR.with(|slot| {
            *slot.borrow_mut() = self.previous.take();
        });
    }
}

/// Binds `allocator` as the current thread's id source.
///
/// Returns a guard that restores the previous binding when dropped.
pub fn bind_allocator(allocator: Arc<IdAllocator>) -> AllocatorGuard {
    let previous = CURRENT_ALLOCATOR.with(|slot| slot.borrow_mut().replace(allocator));
    AllocatorGuard { previous }
}

/// Installs the process-wide fallback allocator.
///
/// Single-tenant hosts call this once at startup; per-thread bindings
/// made with [`bind_allocator`] take precedence.
pub fn set_default_allocator(allocator: Arc<IdAllocator>) {
    *DEFAULT_ALLOCATOR.write() = Some(allocator);
}

/// Removes the process-wide fallback allocator.
pub fn clear_default_allocator() {
    *DEFAULT_ALLOCATOR.write() = None;
}

/// Serializes tests that touch the process-wide default allocator.
#[cfg(test)]
pub(crate) fn tests_default_lock() -> &'static Mutex<()> {
    static LOCK: Mutex<()> = Mutex::new(());
    &LOCK
}

/// Resolves the allocator for the current context.
///
/// Thread-local binding first, then the process default. Fails with
/// [`CoreError::NoAllocatorBound`] when neither is set.
pub fn current_allocator() -> CoreResult<Arc<IdAllocator>> {
    if let Some(alloc) = CURRENT_ALLOCATOR.with(|slot| slot.borrow().clone()) {
        return Ok(alloc);
    }
    if let Some(alloc) = DEFAULT_ALLOCATOR.read().clone() {
        return Ok(alloc);
    }
    Err(CoreError::NoAllocatorBound)
}
