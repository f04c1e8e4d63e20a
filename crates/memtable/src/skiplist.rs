//! Arena-backed skip list.
//!
//! Nodes live in a `Vec` and link to each other by index, so the structure
//! needs no unsafe code and no per-node allocation. Individual removal is
//! never required by the engine (the memtable only ever grows and is then
//! cleared wholesale), which keeps the arena free of holes.
//!
//! Level sampling is geometric: each node is promoted one level with
//! probability `prob / prob_div`, capped at `max_level`. The generator is
//! seeded from the parameters, so a fixed seed gives a reproducible shape.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Sentinel index marking the end of a forward chain.
const NIL: u32 = u32::MAX;

/// Tuning knobs for [`SkipList`].
#[derive(Debug, Clone, Copy)]
pub struct SkipListParams {
    /// Numerator of the promotion probability.
    pub prob: u32,
    /// Denominator of the promotion probability.
    pub prob_div: u32,
    /// Hard cap on node height.
    pub max_level: usize,
    /// Seed for the level-sampling generator.
    pub seed: u64,
}

impl Default for SkipListParams {
    fn default() -> Self {
        Self {
            prob: 1,
            prob_div: 2,
            max_level: 64,
            seed: 0,
        }
    }
}

struct Node<K, V> {
    key: K,
    value: V,
    /// Next-node index per level; `forward.len()` is this node's height.
    forward: Vec<u32>,
}

/// An ordered map with expected O(log n) search and insert.
pub struct SkipList<K, V> {
    /// Forward pointers of the head sentinel, one per possible level.
    head: Vec<u32>,
    nodes: Vec<Node<K, V>>,
    /// Highest level currently in use.
    level: usize,
    len: usize,
    rng: StdRng,
    prob: u32,
    prob_div: u32,
}

impl<K: Copy + Ord, V> SkipList<K, V> {
    pub fn new(params: SkipListParams) -> Self {
        assert!(params.max_level > 0, "max_level must be > 0");
        assert!(
            params.prob < params.prob_div,
            "promotion probability must be < 1"
        );
        Self {
            head: vec![NIL; params.max_level],
            nodes: Vec::new(),
            level: 0,
            len: 0,
            rng: StdRng::seed_from_u64(params.seed),
            prob: params.prob,
            prob_div: params.prob_div,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Drops every entry. Node capacity and the generator state are kept.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.head.iter_mut().for_each(|f| *f = NIL);
        self.level = 0;
        self.len = 0;
    }

    /// Returns the value stored under `key`, if any.
    pub fn search(&self, key: K) -> Option<&V> {
        let mut pred: Option<usize> = None;
        for l in (0..self.level).rev() {
            loop {
                let next = self.forward_of(pred, l);
                if next != NIL && self.nodes[next as usize].key < key {
                    pred = Some(next as usize);
                } else {
                    break;
                }
            }
        }
        let node = self.forward_of(pred, 0);
        if node != NIL && self.nodes[node as usize].key == key {
            Some(&self.nodes[node as usize].value)
        } else {
            None
        }
    }

    /// Inserts `value` under `key`, replacing any prior value.
    pub fn insert(&mut self, key: K, value: V) {
        self.replace(key, |_| Some(value));
    }

    /// Conditional insert/update.
    ///
    /// `f` receives the current value (`None` if the key is absent) and
    /// returns the value to commit, or `None` to leave the list untouched.
    /// Returns whether a commit happened. This is the hook the memtable uses
    /// to test its size projection and mutate atomically.
    pub fn replace<F>(&mut self, key: K, f: F) -> bool
    where
        F: FnOnce(Option<&V>) -> Option<V>,
    {
        let mut update: Vec<Option<usize>> = vec![None; self.head.len()];
        let mut pred: Option<usize> = None;
        for l in (0..self.level).rev() {
            loop {
                let next = self.forward_of(pred, l);
                if next != NIL && self.nodes[next as usize].key < key {
                    pred = Some(next as usize);
                } else {
                    break;
                }
            }
            update[l] = pred;
        }

        let found = self.forward_of(pred, 0);
        if found != NIL && self.nodes[found as usize].key == key {
            let idx = found as usize;
            return match f(Some(&self.nodes[idx].value)) {
                Some(v) => {
                    self.nodes[idx].value = v;
                    true
                }
                None => false,
            };
        }

        let value = match f(None) {
            Some(v) => v,
            None => return false,
        };

        let height = self.random_level();
        while self.level < height {
            update[self.level] = None;
            self.level += 1;
        }

        let idx = self.nodes.len() as u32;
        let mut forward = vec![NIL; height];
        for (l, fwd) in forward.iter_mut().enumerate() {
            *fwd = self.forward_of(update[l], l);
        }
        self.nodes.push(Node {
            key,
            value,
            forward,
        });
        for l in 0..height {
            match update[l] {
                None => self.head[l] = idx,
                Some(p) => self.nodes[p].forward[l] = idx,
            }
        }
        self.len += 1;
        true
    }

    /// Visits every entry in ascending key order.
    pub fn for_each<F>(&self, mut visit: F)
    where
        F: FnMut(K, &V),
    {
        let mut cur = self.head[0];
        while cur != NIL {
            let node = &self.nodes[cur as usize];
            visit(node.key, &node.value);
            cur = node.forward[0];
        }
    }

    /// Visits every entry with `min <= key <= max` in ascending key order.
    pub fn scan<F>(&self, min: K, max: K, mut visit: F)
    where
        F: FnMut(K, &V),
    {
        let mut pred: Option<usize> = None;
        for l in (0..self.level).rev() {
            loop {
                let next = self.forward_of(pred, l);
                if next != NIL && self.nodes[next as usize].key < min {
                    pred = Some(next as usize);
                } else {
                    break;
                }
            }
        }
        let mut cur = self.forward_of(pred, 0);
        while cur != NIL {
            let node = &self.nodes[cur as usize];
            if node.key > max {
                break;
            }
            visit(node.key, &node.value);
            cur = node.forward[0];
        }
    }

    fn forward_of(&self, at: Option<usize>, level: usize) -> u32 {
        match at {
            None => self.head[level],
            Some(idx) => self.nodes[idx].forward[level],
        }
    }

    fn random_level(&mut self) -> usize {
        let mut level = 1;
        while level < self.head.len() && self.rng.gen_range(0..self.prob_div) < self.prob {
            level += 1;
        }
        level
    }
}
