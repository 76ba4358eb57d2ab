//! Hierarchical hashed timing wheel for deferred work-item dispatch.
//!
//! Based on "Hashed and Hierarchical Timing Wheels" by Varghese and Lauck.
//! Entries live in buckets on five cascaded circular rings (seconds,
//! minutes, hours, days, weeks); each bucket holds a doubly-linked list of
//! entries expiring within that bucket's tick span. Entries far in the
//! future cascade down to finer rings as the coarse rings rotate, which
//! keeps schedule, cancel, and expiration amortized O(1). Expiration drains
//! whole buckets and fires due entries synchronously on the advancing
//! caller's thread.
//!
//! The wheel does not drive its own clock: the caller advances it with
//! [`TimerWheel::advance`], and firing happens inside that call.
//!
//! NOT thread-safe - caller must synchronize.

use std::collections::HashMap;
use std::hash::Hash;

use crate::entry::{Entry, EntryId, Node, SlotIndex};

/// Number of cascaded rings.
pub(crate) const LEVELS: usize = 5;

/// Buckets per ring.
pub(crate) const BUCKETS: [usize; LEVELS] = [64, 64, 32, 4, 1];

/// Arena offset of each ring's first sentinel.
const SENTINEL_BASE: [usize; LEVELS] = [0, 64, 128, 160, 164];

/// Total sentinel slots at the front of the arena.
const SENTINEL_TOTAL: usize = 165;

const NANOS_PER_SECOND: i64 = 1_000_000_000;
const NANOS_PER_MINUTE: i64 = 60 * NANOS_PER_SECOND;
const NANOS_PER_HOUR: i64 = 60 * NANOS_PER_MINUTE;
const NANOS_PER_DAY: i64 = 24 * NANOS_PER_HOUR;

/// Smallest power of two greater than or equal to `x`.
const fn ceiling_power_of_two(x: i64) -> i64 {
    1_i64 << (64 - (x - 1).leading_zeros())
}

/// Tick width of one bucket per ring, in nanoseconds. The sixth span equals
/// the fifth so the bucket-selection loop can index one past the entry's
/// ring without a bounds branch.
pub(crate) const SPANS: [i64; LEVELS + 1] = [
    ceiling_power_of_two(NANOS_PER_SECOND), // 1.07s
    ceiling_power_of_two(NANOS_PER_MINUTE), // 1.14m
    ceiling_power_of_two(NANOS_PER_HOUR),   // 1.22h
    ceiling_power_of_two(NANOS_PER_DAY),    // 1.63d
    BUCKETS[3] as i64 * ceiling_power_of_two(NANOS_PER_DAY), // 6.5d
    BUCKETS[3] as i64 * ceiling_power_of_two(NANOS_PER_DAY), // 6.5d
];

/// log2 of each ring's span, for shift-based tick math.
pub(crate) const SHIFT: [u32; LEVELS] = [
    SPANS[0].trailing_zeros(),
    SPANS[1].trailing_zeros(),
    SPANS[2].trailing_zeros(),
    SPANS[3].trailing_zeros(),
    SPANS[4].trailing_zeros(),
];

/// Deadlines at or past `cursor + HORIZON_NS` land in the coarsest bucket
/// and wait there until the top ring rotates.
pub const HORIZON_NS: i64 = SPANS[LEVELS];

#[inline]
fn sentinel_index(level: usize, bucket: usize) -> SlotIndex {
    (SENTINEL_BASE[level] + bucket) as SlotIndex
}

/// Five-ring hierarchical timer wheel.
///
/// Entries are stored in an arena owned by the wheel and addressed through
/// [`EntryId`] handles; bucket membership is tracked with index links
/// instead of pointers, and recycled slots bump a generation counter so
/// stale handles become no-ops. The wheel tolerates overdue deadlines at
/// insertion (they fire on the next advance that passes them) and clamps
/// deadlines beyond [`HORIZON_NS`] into the top ring.
pub struct TimerWheel<K, V> {
    nodes: Vec<Node<K, V>>,
    free: Vec<SlotIndex>,
    nanos: i64,
    len: usize,
}

impl<K, V> TimerWheel<K, V> {
    /// Create a wheel whose notion of "now" starts at `initial_cursor_nanos`.
    ///
    /// The cursor domain is whatever monotonic nanosecond timeline the
    /// caller advances with; wall-clock UNIX nanos work fine.
    pub fn new(initial_cursor_nanos: i64) -> Self {
        let mut nodes = Vec::with_capacity(SENTINEL_TOTAL);
        for at in 0..SENTINEL_TOTAL {
            nodes.push(Node::sentinel(at as SlotIndex));
        }
        Self {
            nodes,
            free: Vec::new(),
            nanos: initial_cursor_nanos,
            len: 0,
        }
    }

    /// The wheel's current cursor in nanoseconds.
    #[inline]
    pub fn cursor_nanos(&self) -> i64 {
        self.nanos
    }

    /// Number of scheduled entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Schedule an entry, returning a handle valid until it fires or is
    /// removed.
    pub fn schedule(&mut self, entry: Entry<K, V>) -> EntryId {
        let deadline_ns = entry.deadline_ns;
        let slot = self.alloc(entry);
        let sentinel = self.find_bucket(deadline_ns);
        self.link(sentinel, slot);
        self.len += 1;
        EntryId::new(slot, self.nodes[slot as usize].generation)
    }

    /// Move an entry to the bucket implied by a new deadline.
    ///
    /// The stored deadline is always updated; the entry is only relinked if
    /// it is currently scheduled. Stale handles are ignored.
    pub fn reschedule(&mut self, id: EntryId, deadline_ns: i64) {
        let Some(slot) = self.resolve(id) else {
            return;
        };
        if let Some(entry) = self.nodes[slot as usize].entry.as_mut() {
            entry.deadline_ns = deadline_ns;
        }
        if self.nodes[slot as usize].prev.is_some() {
            self.unlink(slot);
            self.nodes[slot as usize].prev = None;
            self.nodes[slot as usize].next = None;
            let sentinel = self.find_bucket(deadline_ns);
            self.link(sentinel, slot);
        }
    }

    /// Unlink an entry from its bucket, if scheduled. Idempotent; the slot
    /// stays occupied so the entry can still be inspected or removed.
    pub fn cancel(&mut self, id: EntryId) {
        let Some(slot) = self.resolve(id) else {
            return;
        };
        if self.nodes[slot as usize].is_linked() {
            self.unlink(slot);
            self.len -= 1;
        }
        self.nodes[slot as usize].next = None;
        self.nodes[slot as usize].prev = None;
    }

    /// Cancel an entry and release its slot, returning the record.
    pub fn remove(&mut self, id: EntryId) -> Option<Entry<K, V>> {
        let slot = self.resolve(id)?;
        if self.nodes[slot as usize].is_linked() {
            self.unlink(slot);
            self.len -= 1;
        }
        let entry = self.nodes[slot as usize].entry.take();
        self.release(slot);
        entry
    }

    /// The stored deadline of a live entry.
    pub fn deadline(&self, id: EntryId) -> Option<i64> {
        let slot = self.resolve(id)?;
        self.nodes[slot as usize]
            .entry
            .as_ref()
            .map(|entry| entry.deadline_ns)
    }

    /// Whether the handle refers to a live entry currently in a bucket.
    pub fn is_scheduled(&self, id: EntryId) -> bool {
        self.resolve(id)
            .map(|slot| self.nodes[slot as usize].is_linked())
            .unwrap_or(false)
    }

    /// Advance the cursor and fire every entry whose deadline has passed.
    ///
    /// Due entries are activated synchronously on this thread, in
    /// detach-order within each drained bucket; entries drained from a
    /// coarse ring that are not yet due cascade into a finer ring. Returns
    /// the number of entries fired. Advancing with a cursor at or before
    /// the current one expires nothing.
    pub fn advance(&mut self, new_cursor_nanos: i64) -> usize {
        let previous_nanos = self.nanos;
        self.nanos = new_cursor_nanos;
        let mut fired = 0;
        for level in 0..LEVELS {
            let previous_ticks = previous_nanos >> SHIFT[level];
            let current_ticks = new_cursor_nanos >> SHIFT[level];
            if current_ticks - previous_ticks <= 0 {
                break;
            }
            fired += self.expire(level, previous_nanos, new_cursor_nanos);
        }
        fired
    }

    /// Nanoseconds from the cursor until the earliest possibly-non-empty
    /// future tick, or `i64::MAX` if nothing is scheduled.
    ///
    /// Advisory: a parking caller may be woken early by a finer-grained
    /// ring, never late. Sub-bucket precision is not attempted.
    pub fn expiration_delay(&self) -> i64 {
        for level in 0..LEVELS {
            let ticks = self.nanos >> SHIFT[level];
            let span_mask = SPANS[level] - 1;
            let bucket_mask = BUCKETS[level] as i64 - 1;
            for probe in ticks..ticks + BUCKETS[level] as i64 {
                let sentinel = sentinel_index(level, (probe & bucket_mask) as usize);
                if self.bucket_is_empty(sentinel) {
                    continue;
                }
                let mut delay = ((probe - ticks) << SHIFT[level]) - (self.nanos & span_mask);
                if delay <= 0 {
                    delay = SPANS[level];
                }
                for coarser in level + 1..LEVELS {
                    let next_delay = self.peek_ahead(coarser);
                    if next_delay < delay {
                        delay = next_delay;
                    }
                }
                return delay;
            }
        }
        i64::MAX
    }

    /// Delay until the given ring's next bucket expires, or `i64::MAX` if
    /// that bucket is empty. Only the bucket immediately after the current
    /// tick is examined.
    fn peek_ahead(&self, level: usize) -> i64 {
        let ticks = self.nanos >> SHIFT[level];
        let bucket_mask = BUCKETS[level] as i64 - 1;
        let sentinel = sentinel_index(level, ((ticks + 1) & bucket_mask) as usize);
        if self.bucket_is_empty(sentinel) {
            return i64::MAX;
        }
        SPANS[level] - (self.nanos & (SPANS[level] - 1))
    }

    /// Up to `limit` payload pairs in roughly ascending or descending
    /// expiration order.
    ///
    /// Rings are walked fine-to-coarse (ascending) or coarse-to-fine
    /// (descending); buckets start one past the current tick ascending, at
    /// the current tick descending; order within a bucket is not refined.
    /// Entries missing a key or value are skipped. Not a constant-time
    /// operation.
    pub fn snapshot(&self, ascending: bool, limit: usize) -> HashMap<K, V>
    where
        K: Clone + Eq + Hash,
        V: Clone,
    {
        let mut mappings = HashMap::new();
        if limit == 0 {
            return mappings;
        }
        for step in 0..LEVELS {
            let level = if ascending { step } else { LEVELS - 1 - step };
            let ticks = self.nanos >> SHIFT[level];
            let bucket_mask = BUCKETS[level] as i64 - 1;
            let start = (ticks & bucket_mask) + if ascending { 1 } else { 0 };
            for offset in 0..BUCKETS[level] as i64 {
                let probe = if ascending { start + offset } else { start - offset };
                let sentinel = sentinel_index(level, (probe & bucket_mask) as usize);
                let mut cursor = self.neighbor(sentinel, ascending);
                while cursor != sentinel {
                    if mappings.len() >= limit {
                        return mappings;
                    }
                    if let Some(entry) = self.nodes[cursor as usize].entry.as_ref() {
                        if let (Some(key), Some(value)) = (entry.key.as_ref(), entry.value.as_ref())
                        {
                            mappings.insert(key.clone(), value.clone());
                        }
                    }
                    cursor = self.neighbor(cursor, ascending);
                }
            }
        }
        mappings
    }

    /// Sentinel of the bucket an entry with this deadline belongs in: the
    /// finest ring whose next-coarser span still exceeds the remaining
    /// duration. Overdue deadlines select the seconds ring; deadlines past
    /// the horizon select the top ring's only bucket.
    ///
    /// The bucket index hashes the deadline's absolute tick, not the delta
    /// from the cursor, so an entry's bucket is a function of its deadline
    /// alone.
    fn find_bucket(&self, deadline_ns: i64) -> SlotIndex {
        let duration = deadline_ns - self.nanos;
        for level in 0..LEVELS {
            if duration < SPANS[level + 1] {
                let ticks = deadline_ns >> SHIFT[level];
                let bucket = (ticks & (BUCKETS[level] as i64 - 1)) as usize;
                return sentinel_index(level, bucket);
            }
        }
        sentinel_index(LEVELS - 1, 0)
    }

    /// Drain the buckets of `level` whose ticks fall in `(previous, current]`
    /// and fire or cascade their entries. Returns the number fired.
    fn expire(&mut self, level: usize, previous_nanos: i64, current_nanos: i64) -> usize {
        let bucket_count = BUCKETS[level] as i64;
        let previous_ticks = previous_nanos >> SHIFT[level];
        let current_ticks = current_nanos >> SHIFT[level];

        let (start, end) = if current_ticks - previous_ticks >= bucket_count {
            // The whole ring rotated at least once; every bucket is due.
            (0, bucket_count)
        } else {
            let span_mask = SPANS[level] - 1;
            (previous_ticks & span_mask, (current_ticks & span_mask) + 1)
        };

        let bucket_mask = bucket_count - 1;
        let mut fired = 0;
        for tick in start..end {
            let sentinel = sentinel_index(level, (tick & bucket_mask) as usize);

            // Detach the whole chain, then reset the bucket to empty before
            // walking it. Cascading entries relink into already-reset
            // buckets without disturbing the detached chain.
            let mut cursor = self.nodes[sentinel as usize].next.unwrap_or(sentinel);
            self.nodes[sentinel as usize].prev = Some(sentinel);
            self.nodes[sentinel as usize].next = Some(sentinel);

            while cursor != sentinel {
                let following = self.nodes[cursor as usize].next.unwrap_or(sentinel);
                self.nodes[cursor as usize].prev = None;
                self.nodes[cursor as usize].next = None;

                match self.nodes[cursor as usize]
                    .entry
                    .as_ref()
                    .map(|entry| entry.deadline_ns)
                {
                    Some(deadline_ns) if deadline_ns > self.nanos => {
                        // Not yet due: back into a finer ring, or the same
                        // bucket if nothing finer fits.
                        let target = self.find_bucket(deadline_ns);
                        self.link(target, cursor);
                    }
                    Some(_) => {
                        self.fire(cursor);
                        fired += 1;
                    }
                    None => {}
                }
                cursor = following;
            }
        }
        fired
    }

    /// Take the entry out, release the slot, then run the activation.
    ///
    /// The slot is reclaimed before the callback runs; if the callback
    /// panics, the rest of the detached chain is lost from the wheel (its
    /// links were already nulled). Callbacks must not touch the wheel.
    fn fire(&mut self, slot: SlotIndex) {
        if let Some(entry) = self.nodes[slot as usize].entry.take() {
            self.len -= 1;
            self.release(slot);
            (entry.on_fire)();
        }
    }

    /// Splice a node at the tail of a bucket, just before the sentinel.
    fn link(&mut self, sentinel: SlotIndex, slot: SlotIndex) {
        debug_assert!(self.nodes[slot as usize].prev.is_none());
        debug_assert!(self.nodes[slot as usize].next.is_none());
        let tail = self.nodes[sentinel as usize].prev.unwrap_or(sentinel);
        self.nodes[slot as usize].prev = Some(tail);
        self.nodes[slot as usize].next = Some(sentinel);
        self.nodes[tail as usize].next = Some(slot);
        self.nodes[sentinel as usize].prev = Some(slot);
    }

    /// Remove a node from its bucket, preserving the ring around it. The
    /// node's own links are left for the caller to clear.
    fn unlink(&mut self, slot: SlotIndex) {
        if let Some(next) = self.nodes[slot as usize].next {
            let prev = self.nodes[slot as usize].prev.unwrap_or(next);
            self.nodes[next as usize].prev = Some(prev);
            self.nodes[prev as usize].next = Some(next);
        }
    }

    fn alloc(&mut self, entry: Entry<K, V>) -> SlotIndex {
        match self.free.pop() {
            Some(slot) => {
                self.nodes[slot as usize].entry = Some(entry);
                slot
            }
            None => {
                let slot = self.nodes.len() as SlotIndex;
                self.nodes.push(Node::occupied(entry));
                slot
            }
        }
    }

    /// Return a slot to the free list. Bumping the generation invalidates
    /// every handle minted for the old occupant.
    fn release(&mut self, slot: SlotIndex) {
        let node = &mut self.nodes[slot as usize];
        debug_assert!(node.entry.is_none());
        node.prev = None;
        node.next = None;
        node.generation = node.generation.wrapping_add(1);
        self.free.push(slot);
    }

    /// Slot for a live (occupied, generation-matching) entry handle.
    fn resolve(&self, id: EntryId) -> Option<SlotIndex> {
        let slot = id.slot();
        if slot < SENTINEL_TOTAL {
            return None;
        }
        let node = self.nodes.get(slot)?;
        if node.generation != id.generation() || node.entry.is_none() {
            return None;
        }
        Some(slot as SlotIndex)
    }

    #[inline]
    fn bucket_is_empty(&self, sentinel: SlotIndex) -> bool {
        self.nodes[sentinel as usize].next == Some(sentinel)
    }

    #[inline]
    fn neighbor(&self, slot: SlotIndex, forward: bool) -> SlotIndex {
        let node = &self.nodes[slot as usize];
        let link = if forward { node.next } else { node.prev };
        link.unwrap_or(slot)
    }
}
