/// Two-phase deferred work queue with strict next-tick semantics: items
/// pushed during the current tick become visible only after `begin_tick`
/// runs at the start of the next one. Deferred actions capture plain ids,
/// never references, and must re-validate their targets when drained.
#[derive(Debug)]
pub struct DeferredQueue<T> {
    pending: Vec<T>,
    ready: Vec<T>,
}

impl<T> Default for DeferredQueue<T> {
    fn default() -> Self {
        Self {
            pending: Vec::new(),
            ready: Vec::new(),
        }
    }
}

impl<T> DeferredQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, item: T) {
        self.pending.push(item);
    }

    /// Promotes last tick's pushes into the ready lane.
    pub fn begin_tick(&mut self) {
        self.ready.append(&mut self.pending);
    }

    pub fn drain_ready(&mut self) -> Vec<T> {
        std::mem::take(&mut self.ready)
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty() && self.ready.is_empty()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
        self.ready.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn items_become_ready_only_after_begin_tick() {
        let mut queue = DeferredQueue::new();
        queue.push(1);
        assert!(queue.drain_ready().is_empty());

        queue.begin_tick();
        assert_eq!(queue.drain_ready(), vec![1]);
        assert!(queue.is_empty());
    }

    #[test]
    fn items_pushed_mid_drain_wait_for_the_next_tick() {
        let mut queue = DeferredQueue::new();
        queue.push("first");
        queue.begin_tick();

        for _ in queue.drain_ready() {
            queue.push("second");
        }
        // Still the same tick: nothing ready.
        assert!(queue.drain_ready().is_empty());

        queue.begin_tick();
        assert_eq!(queue.drain_ready(), vec!["second"]);
    }

    #[test]
    fn begin_tick_preserves_order_across_lanes() {
        let mut queue = DeferredQueue::new();
        queue.push(1);
        queue.begin_tick();
        queue.push(2);
        queue.begin_tick();
        assert_eq!(queue.drain_ready(), vec![1, 2]);
    }
}
