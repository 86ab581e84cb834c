//! A probabilistic ordered set of `(score, value)` pairs.
//!
//! Implements a multi-level linked index over a sentinel header, the same
//! shape LevelDB/Redis use for their sorted-set internals: each node is
//! promoted to a random height, and forward links at height `h` skip over
//! `span` level-0 nodes, giving expected O(log n) search, insert, and
//! delete with O(1)-amortized rank bookkeeping along the way.
//!
//! Ordering is total: compare by `score` first, then by `value` under
//! [`ByteStr`]'s unsigned byte-wise order.
//!
//! Storage is an arena (`Vec<Option<Node>>`) addressed by index rather than
//! raw pointers or `Rc<RefCell<_>>` — deleted slots go on a free list and
//! are reused by later inserts, so a [`NodeHandle`] is only meaningful until
//! the node it names is deleted.

use std::cmp::Ordering;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::bytestr::ByteStr;

/// Highest level a node may be promoted to; also the header's forward width.
pub const MAX_LEVEL: u8 = 32;

/// A handle to a node returned by [`SkipList::insert`] / [`SkipList::update`].
///
/// Valid only until the node it names is removed (by `delete`, or by the
/// delete-then-insert fallback inside `update`); using a stale handle is a
/// logic error in the caller, not something this crate can detect, since a
/// later insert may have reused the slot for an unrelated node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeHandle(usize);

struct Forward {
    target: Option<usize>,
    span: i64,
}

struct Node {
    // `None` only for the header sentinel at index 0.
    entry: Option<(f64, ByteStr)>,
    forward: Vec<Forward>,
    backward: Option<usize>,
}

impl Node {
    fn key(&self) -> (f64, &ByteStr) {
        let (score, value) = self.entry.as_ref().expect("key() called on header");
        (*score, value)
    }
}

/// An ordered set of `(score, value)` pairs, backed by a skip list.
pub struct SkipList {
    nodes: Vec<Option<Node>>,
    free: Vec<usize>,
    level: u8,
    length: u64,
    tail: Option<usize>,
    rng: StdRng,
}

const HEADER: usize = 0;

fn order_key(score: f64, value: &ByteStr, other_score: f64, other_value: &ByteStr) -> Ordering {
    score
        .partial_cmp(&other_score)
        .expect("scores must be finite")
        .then_with(|| value.cmp(other_value))
}

impl SkipList {
    /// Allocates a header sentinel with `MAX_LEVEL` forward slots, `level`
    /// 1, length 0, and `tail` pointing at the header (empty).
    pub fn new() -> Self {
        let header = Node {
            entry: None,
            forward: (0..MAX_LEVEL)
                .map(|_| Forward {
                    target: None,
                    span: 0,
                })
                .collect(),
            backward: None,
        };
        SkipList {
            nodes: vec![Some(header)],
            free: Vec::new(),
            level: 1,
            length: 0,
            tail: None,
            rng: StdRng::from_rng(rand::thread_rng()).expect("seeding RNG from thread_rng"),
        }
    }

    /// Builds a skip list from a sequence of pairs, one `insert` per pair in
    /// the given order (duplicates are preserved, as with repeated
    /// `insert` calls).
    pub fn create_from_pairs(pairs: Vec<(f64, ByteStr)>) -> Self {
        let mut sp = SkipList::new();
        for (score, value) in pairs {
            sp.insert(score, value);
        }
        sp
    }

    /// Number of real (non-sentinel) nodes.
    pub fn len(&self) -> usize {
        self.length as usize
    }

    /// Whether the skip list holds no elements.
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Current number of occupied levels (1 when empty, up to `MAX_LEVEL`).
    pub fn level(&self) -> u8 {
        self.level
    }

    fn node(&self, idx: usize) -> &Node {
        self.nodes[idx].as_ref().expect("dangling node index")
    }

    fn node_mut(&mut self, idx: usize) -> &mut Node {
        self.nodes[idx].as_mut().expect("dangling node index")
    }

    /// Walks down from the top occupied level to level 0, recording for
    /// each level the last node strictly less than `(score, value)` and the
    /// level-0 rank reached at that node. Mirrors `getLastLessNode` in the
    /// original source.
    fn locate(&self, score: f64, value: &ByteStr) -> ([usize; MAX_LEVEL as usize], [u64; MAX_LEVEL as usize]) {
        let mut update = [HEADER; MAX_LEVEL as usize];
        let mut rank = [0u64; MAX_LEVEL as usize];

        let mut cur = HEADER;
        let mut cur_rank = 0u64;

        for lvl in (0..self.level as usize).rev() {
            loop {
                let fwd = &self.node(cur).forward[lvl];
                match fwd.target {
                    Some(next) => {
                        let (next_score, next_value) = self.node(next).key();
                        if order_key(next_score, next_value, score, value) == Ordering::Less {
                            cur_rank += fwd.span as u64;
                            cur = next;
                            continue;
                        }
                    }
                    None => {}
                }
                update[lvl] = cur;
                rank[lvl] = cur_rank;
                break;
            }
        }

        (update, rank)
    }

    /// Draws a new height in `[1, MAX_LEVEL]`: start at 1, keep incrementing
    /// on a coin-flip head while below the cap. The RNG is seeded once, at
    /// construction, and never re-seeded per call.
    fn random_height(&mut self) -> u8 {
        let mut h = 1;
        while h < MAX_LEVEL && self.rng.gen_bool(0.5) {
            h += 1;
        }
        h
    }

    fn alloc_node(&mut self, node: Node) -> usize {
        if let Some(idx) = self.free.pop() {
            self.nodes[idx] = Some(node);
            idx
        } else {
            self.nodes.push(Some(node));
            self.nodes.len() - 1
        }
    }

    /// Inserts a new node for `(score, value)`. Duplicates of an
    /// already-present pair are permitted — each call creates a distinct
    /// node. Returns a handle to the new node.
    pub fn insert(&mut self, score: f64, value: ByteStr) -> NodeHandle {
        let (mut update, mut rank) = self.locate(score, &value);

        let height = self.random_height();
        if height > self.level {
            for lvl in self.level..height {
                update[lvl as usize] = HEADER;
                rank[lvl as usize] = 0;
            }
            self.level = height;
        }

        let new_node = Node {
            entry: Some((score, value)),
            forward: (0..height)
                .map(|_| Forward {
                    target: None,
                    span: 0,
                })
                .collect(),
            backward: None,
        };
        let new_idx = self.alloc_node(new_node);

        for lvl in 0..height as usize {
            let pred = update[lvl];
            let (next, prev_span) = {
                let fwd = &self.node(pred).forward[lvl];
                (fwd.target, fwd.span)
            };

            let new_span = match next {
                Some(_) => prev_span - (rank[0] as i64 - rank[lvl] as i64),
                None => 0,
            };
            {
                let fwd = &mut self.node_mut(new_idx).forward[lvl];
                fwd.target = next;
                fwd.span = new_span;
            }

            let fwd = &mut self.node_mut(pred).forward[lvl];
            fwd.target = Some(new_idx);
            fwd.span = rank[0] as i64 - rank[lvl] as i64 + 1;
        }

        for lvl in height as usize..self.level as usize {
            let pred = update[lvl];
            let fwd = &mut self.node_mut(pred).forward[lvl];
            if fwd.target.is_some() {
                fwd.span += 1;
            }
        }

        let successor = self.node(new_idx).forward[0].target;
        match successor {
            Some(succ) => self.node_mut(succ).backward = Some(new_idx),
            None => self.tail = Some(new_idx),
        }
        self.node_mut(new_idx).backward = if update[0] == HEADER {
            None
        } else {
            Some(update[0])
        };

        self.length += 1;
        NodeHandle(new_idx)
    }

    /// Removes the first node equal to `(score, value)` in total order.
    /// Returns whether a node was removed.
    pub fn delete(&mut self, score: f64, value: &ByteStr) -> bool {
        let (update, _) = self.locate(score, value);
        let victim = match self.node(update[0]).forward[0].target {
            Some(v) => v,
            None => return false,
        };
        {
            let (v_score, v_value) = self.node(victim).key();
            if order_key(v_score, v_value, score, value) != Ordering::Equal {
                return false;
            }
        }

        let victim_height = self.node(victim).forward.len();
        for lvl in 0..victim_height {
            let (v_target, v_span) = {
                let fwd = &self.node(victim).forward[lvl];
                (fwd.target, fwd.span)
            };
            let pred = update[lvl];
            let fwd = &mut self.node_mut(pred).forward[lvl];
            fwd.target = v_target;
            fwd.span += v_span - 1;
        }
        for lvl in victim_height..self.level as usize {
            let pred = update[lvl];
            let fwd = &mut self.node_mut(pred).forward[lvl];
            if fwd.target.is_some() {
                fwd.span -= 1;
            }
        }

        let successor = self.node(update[0]).forward[0].target;
        match successor {
            Some(succ) => {
                self.node_mut(succ).backward = if update[0] == HEADER {
                    None
                } else {
                    Some(update[0])
                };
            }
            None => {
                self.tail = if update[0] == HEADER {
                    None
                } else {
                    Some(update[0])
                };
            }
        }

        self.length -= 1;
        while self.level > 1 && self.node(HEADER).forward[self.level as usize - 1].target.is_none() {
            self.level -= 1;
        }
        if self.length == 0 {
            self.level = 1;
        }

        self.nodes[victim] = None;
        self.free.push(victim);

        true
    }

    /// Replaces the score of the node equal to `(score_old, value)`.
    ///
    /// If no such node exists, behaves as `insert(score_new, value)`. If
    /// the new score keeps the node strictly between its neighbors under
    /// total order, the score is mutated in place; otherwise this is
    /// equivalent to `delete` followed by `insert`.
    pub fn update(&mut self, score_old: f64, value: ByteStr, score_new: f64) -> NodeHandle {
        let (update, _) = self.locate(score_old, &value);
        let target = self.node(update[0]).forward[0].target.filter(|&idx| {
            let (s, v) = self.node(idx).key();
            order_key(s, v, score_old, &value) == Ordering::Equal
        });

        let target = match target {
            Some(t) => t,
            None => return self.insert(score_new, value),
        };

        let backward = self.node(target).backward;
        let forward = self.node(target).forward[0].target;

        let below_ok = match backward {
            None => true,
            Some(b) => {
                let (bs, bv) = self.node(b).key();
                order_key(bs, bv, score_new, &value) == Ordering::Less
            }
        };
        let above_ok = match forward {
            None => true,
            Some(f) => {
                let (fs, fv) = self.node(f).key();
                order_key(fs, fv, score_new, &value) == Ordering::Greater
            }
        };

        if below_ok && above_ok {
            self.node_mut(target).entry.as_mut().expect("real node").0 = score_new;
            return NodeHandle(target);
        }

        self.delete(score_old, &value);
        self.insert(score_new, value)
    }

    /// Returns the 1-based rank of `(score, value)` under total order, or
    /// `None` if no such pair is present. Walks the span-annotated levels
    /// the same way insert/delete bookkeeping does.
    pub fn rank_of(&self, score: f64, value: &ByteStr) -> Option<u64> {
        let mut cur = HEADER;
        let mut cur_rank = 0u64;
        for lvl in (0..self.level as usize).rev() {
            loop {
                let fwd = &self.node(cur).forward[lvl];
                match fwd.target {
                    Some(next) => {
                        let (next_score, next_value) = self.node(next).key();
                        let cmp = order_key(next_score, next_value, score, value);
                        if cmp == Ordering::Less {
                            cur_rank += fwd.span as u64;
                            cur = next;
                            continue;
                        } else if cmp == Ordering::Equal {
                            return Some(cur_rank + fwd.span as u64);
                        }
                    }
                    None => {}
                }
                break;
            }
        }
        None
    }

    /// Returns all elements in ascending total order. Each [`ByteStr`] is a
    /// deep copy, independent of this skip list's internal storage.
    pub fn all_pairs(&self) -> Vec<(f64, ByteStr)> {
        let mut out = Vec::with_capacity(self.length as usize);
        let mut cur = self.node(HEADER).forward[0].target;
        while let Some(idx) = cur {
            let (score, value) = self.node(idx).key();
            out.push((score, value.clone()));
            cur = self.node(idx).forward[0].target;
        }
        out
    }
}

impl Default for SkipList {
    fn default() -> Self {
        SkipList::new()
    }
}
