//! LRU List Module
//!
//! Recency ordering for attribute-cache eviction.

// == Handle ==
/// Stable reference to one node of an [`LruList`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Handle(usize);

#[derive(Debug)]
struct Node<T> {
    value: T,
    prev: Option<usize>,
    next: Option<usize>,
}

// == LRU List ==
/// Doubly linked list over an index-stable arena.
///
/// - Head = Most recently used
/// - Tail = Least recently used
///
/// Handles stay valid until their node is removed; freed arena slots are
/// recycled by later pushes.
#[derive(Debug)]
pub struct LruList<T> {
    nodes: Vec<Option<Node<T>>>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
}

impl<T> Default for LruList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> LruList<T> {
    // == Constructor ==
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            len: 0,
        }
    }

    fn node(&self, i: usize) -> Option<&Node<T>> {
        self.nodes.get(i).and_then(Option::as_ref)
    }

    fn node_mut(&mut self, i: usize) -> Option<&mut Node<T>> {
        self.nodes.get_mut(i).and_then(Option::as_mut)
    }

    // == Push Front ==
    /// Inserts `value` as the most recently used node.
    pub fn push_front(&mut self, value: T) -> Handle {
        let node = Node {
            value,
            prev: None,
            next: None,
        };
        let i = match self.free.pop() {
            Some(i) => {
                self.nodes[i] = Some(node);
                i
            }
            None => {
                self.nodes.push(Some(node));
                self.nodes.len() - 1
            }
        };
        self.link_front(i);
        self.len += 1;
        Handle(i)
    }

    // == Touch ==
    /// Marks a node as recently used (moves to head).
    pub fn touch(&mut self, handle: Handle) {
        if self.head == Some(handle.0) || self.node(handle.0).is_none() {
            return;
        }
        self.unlink(handle.0);
        self.link_front(handle.0);
    }

    // == Remove ==
    /// Unlinks a node and hands back its value.
    pub fn remove(&mut self, handle: Handle) -> Option<T> {
        self.node(handle.0)?;
        self.unlink(handle.0);
        let node = self.nodes[handle.0].take()?;
        self.free.push(handle.0);
        self.len -= 1;
        Some(node.value)
    }

    // == Evict Oldest ==
    /// Removes and returns the least recently used value.
    pub fn evict_oldest(&mut self) -> Option<T> {
        let tail = self.tail?;
        self.remove(Handle(tail))
    }

    // == Peek ==
    /// Returns the least recently used value without removing it.
    pub fn peek_oldest(&self) -> Option<&T> {
        self.tail.and_then(|i| self.node(i)).map(|n| &n.value)
    }

    pub fn get(&self, handle: Handle) -> Option<&T> {
        self.node(handle.0).map(|n| &n.value)
    }

    // == Length ==
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Values from most to least recently used.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        std::iter::successors(self.head.and_then(|i| self.node(i)), |n| {
            n.next.and_then(|i| self.node(i))
        })
        .map(|n| &n.value)
    }

    fn link_front(&mut self, i: usize) {
        let old_head = self.head;
        if let Some(node) = self.node_mut(i) {
            node.prev = None;
            node.next = old_head;
        }
        match old_head.and_then(|h| self.node_mut(h)) {
            Some(head) => head.prev = Some(i),
            None => self.tail = Some(i),
        }
        self.head = Some(i);
    }

    fn unlink(&mut self, i: usize) {
        let Some(node) = self.node_mut(i) else {
            return;
        };
        let (prev, next) = (node.prev.take(), node.next.take());

        match prev.and_then(|p| self.node_mut(p)) {
            Some(p) => p.next = next,
            None => self.head = next,
        }
        match next.and_then(|n| self.node_mut(n)) {
            Some(n) => n.prev = prev,
            None => self.tail = prev,
        }
    }
}
