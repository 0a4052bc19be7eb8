//! Per-frame ordered renderable queue
//!
//! Accumulates (renderable, sort key) pairs during the layer walk and yields
//! them in a deterministic order for draw submission. The sort key is
//! typically eye distance; callers that want the opposite traversal negate
//! the key before offering; the queue only promises one consistent order
//! per frame.

/// One queued renderable with its sort key and insertion ordinal.
#[derive(Debug)]
struct RenderableEntry<R> {
    renderable: R,
    sort_key: f64,
    ordinal: u64,
}

/// Frame-scoped queue yielding renderables largest-key first, with ties
/// broken in favor of the most recently offered entry.
///
/// Sorting is lazy: `offer` only appends and marks the queue dirty, and
/// `peek`/`poll` sort when needed, so offering many renderables in a tight
/// loop stays cheap. `poll` removes from the tail of the sorted backing
/// vector, which keeps removal amortized O(1).
///
/// The queue is not self-clearing: its owner clears it exactly once per
/// frame.
#[derive(Debug)]
pub struct OrderedRenderableQueue<R> {
    entries: Vec<RenderableEntry<R>>,
    next_ordinal: u64,
    sorted: bool,
}

impl<R> OrderedRenderableQueue<R> {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_ordinal: 0,
            sorted: true,
        }
    }

    /// Add a renderable for the current frame.
    pub fn offer(&mut self, renderable: R, sort_key: f64) {
        self.entries.push(RenderableEntry {
            renderable,
            sort_key,
            ordinal: self.next_ordinal,
        });
        self.next_ordinal += 1;
        self.sorted = false;
    }

    /// The renderable `poll` would yield next, without removing it.
    pub fn peek(&mut self) -> Option<&R> {
        self.sort_if_dirty();
        self.entries.last().map(|entry| &entry.renderable)
    }

    /// Remove and return the next renderable in submission order.
    pub fn poll(&mut self) -> Option<R> {
        self.sort_if_dirty();
        self.entries.pop().map(|entry| entry.renderable)
    }

    /// Reset to empty with no sort pending.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.next_ordinal = 0;
        self.sorted = true;
    }

    /// Number of queued renderables.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the queue holds no renderables.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sort ascending by (key, ordinal) so the tail is the largest key and,
    /// within equal keys, the latest insertion. `total_cmp` keeps the order
    /// deterministic even for NaN keys.
    fn sort_if_dirty(&mut self) {
        if !self.sorted {
            self.entries.sort_unstable_by(|a, b| {
                a.sort_key
                    .total_cmp(&b.sort_key)
                    .then_with(|| a.ordinal.cmp(&b.ordinal))
            });
            self.sorted = true;
        }
    }
}

impl<R> Default for OrderedRenderableQueue<R> {
    fn default() -> Self {
        Self::new()
    }
}
