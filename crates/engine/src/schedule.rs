use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// One-shot actions keyed on simulation time. Drained once per tick; actions
/// sharing a due time come out in scheduling order.
#[derive(Debug)]
pub struct DeferredQueue<A> {
    heap: BinaryHeap<Entry<A>>,
    next_seq: u64,
}

#[derive(Debug)]
struct Entry<A> {
    due: f32,
    seq: u64,
    action: A,
}

impl<A> PartialEq for Entry<A> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<A> Eq for Entry<A> {}

impl<A> PartialOrd for Entry<A> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<A> Ord for Entry<A> {
    // Reversed so the max-heap pops the earliest entry.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .due
            .total_cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl<A> Default for DeferredQueue<A> {
    fn default() -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_seq: 0,
        }
    }
}

impl<A> DeferredQueue<A> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, due: f32, action: A) {
        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);
        self.heap.push(Entry { due, seq, action });
    }

    pub fn schedule_after(&mut self, now: f32, delay: f32, action: A) {
        self.schedule(now + delay.max(0.0), action);
    }

    /// Removes and returns every action with `due <= now`, earliest first.
    pub fn drain_due(&mut self, now: f32) -> Vec<A> {
        let mut ready = Vec::new();
        while self.heap.peek().is_some_and(|entry| entry.due <= now) {
            if let Some(entry) = self.heap.pop() {
                ready.push(entry.action);
            }
        }
        ready
    }

    pub fn next_due(&self) -> Option<f32> {
        self.heap.peek().map(|entry| entry.due)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn clear(&mut self) {
        self.heap.clear();
    }
}
