//! # Keyed edit scripts
//!
//! [`diff_keyed`] computes an ordered edit script between two ordered
//! sequences: the operations that, applied one after another to the old
//! sequence, produce the new one. [`apply`] is the executable definition of
//! that contract and what the list mount point replays against its live
//! registry.
//!
//! ```rust
//! use tether_core::diff::{EditOp, apply, diff_keyed};
//!
//! let old = vec!["a", "b", "c"];
//! let new = vec!["a", "c"];
//! let script = diff_keyed(&old, &new, |v| *v);
//! assert_eq!(script, vec![EditOp::Delete { index: 1 }]);
//!
//! let mut replayed = old.clone();
//! apply(&mut replayed, &script);
//! assert_eq!(replayed, new);
//! ```
//!
//! Identity drives the script: an item whose key appears in both sequences
//! is never torn down and rebuilt. It becomes a [`Move`](EditOp::Move) when
//! its position changed, an [`Update`](EditOp::Update) when only its content
//! did, and nothing at all when neither did (diffing a sequence against
//! itself yields an empty script).
//!
//! The backbone is Myers' greedy shortest-edit search, O((|old|+|new|)·D)
//! for edit distance D, so ordinary UI list sizes diff without quadratic
//! blowup. Leftover delete/insert pairs with equal keys are then folded into
//! moves. The script is deterministic for identical inputs: key lookups go
//! through a map, but nothing ever iterates it.

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;

/// One step of an edit script.
///
/// Indices refer to the working sequence at the moment the step applies,
/// not to the original sequence. `Move` removes at `from`, then inserts at
/// `to` (an index in the shortened sequence), carrying the item's updated
/// content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOp<T> {
    Insert { index: usize, value: T },
    Delete { index: usize },
    Move { from: usize, to: usize, value: T },
    Update { index: usize, value: T },
}

/// Computes the edit script from `old` to `new`, with `key` supplying each
/// item's stable identity.
///
/// Script shape: deletions of vanished keys first (highest index first, so
/// surviving positions stay put while they run), then one pass over the
/// target positions emitting inserts, moves, and updates in ascending
/// order.
pub fn diff_keyed<T, K, F>(old: &[T], new: &[T], key: F) -> Vec<EditOp<T>>
where
    T: Clone + PartialEq,
    K: Eq + Hash + Clone,
    F: Fn(&T) -> K,
{
    let old_keys: Vec<K> = old.iter().map(&key).collect();
    let new_keys: Vec<K> = new.iter().map(&key).collect();

    let mut old_match: Vec<Option<usize>> = vec![None; old.len()];
    let mut new_match: Vec<Option<usize>> = vec![None; new.len()];
    for (i, j) in myers_matches(&old_keys, &new_keys) {
        old_match[i] = Some(j);
        new_match[j] = Some(i);
    }

    // Leftover deletions and insertions that share a key are the same item
    // changing position: pair them up so they become moves, not churn.
    let mut displaced: HashMap<K, VecDeque<usize>> = HashMap::new();
    for (i, k) in old_keys.iter().enumerate() {
        if old_match[i].is_none() {
            displaced.entry(k.clone()).or_default().push_back(i);
        }
    }
    for (j, k) in new_keys.iter().enumerate() {
        if new_match[j].is_none()
            && let Some(queue) = displaced.get_mut(k)
            && let Some(i) = queue.pop_front()
        {
            old_match[i] = Some(j);
            new_match[j] = Some(i);
        }
    }

    let mut script = Vec::new();

    for i in (0..old.len()).rev() {
        if old_match[i].is_none() {
            script.push(EditOp::Delete { index: i });
        }
    }

    // Working sequence after the deletions: surviving old indices, with
    // usize::MAX marking freshly inserted slots.
    const INSERTED: usize = usize::MAX;
    let mut work: Vec<usize> = (0..old.len()).filter(|i| old_match[*i].is_some()).collect();

    for j in 0..new.len() {
        match new_match[j] {
            None => {
                script.push(EditOp::Insert {
                    index: j,
                    value: new[j].clone(),
                });
                work.insert(j, INSERTED);
            }
            Some(i) => {
                // Positions below j are already final, so i sits at or past j.
                let Some(cur) = work.iter().position(|&w| w == i) else {
                    continue;
                };
                if cur == j {
                    if old[i] != new[j] {
                        script.push(EditOp::Update {
                            index: j,
                            value: new[j].clone(),
                        });
                    }
                } else {
                    script.push(EditOp::Move {
                        from: cur,
                        to: j,
                        value: new[j].clone(),
                    });
                    let slot = work.remove(cur);
                    work.insert(j, slot);
                }
            }
        }
    }

    script
}

/// Structural-equality fallback: each item's value is its own identity.
///
/// Known limitation: with the value as the key, a content change at a
/// logical slot is indistinguishable from delete+insert, so move
/// detection degrades for edited items and `Update` never occurs. Supply a
/// key function ([`diff_keyed`]) to track items across content changes.
pub fn diff_by_value<T>(old: &[T], new: &[T]) -> Vec<EditOp<T>>
where
    T: Clone + Eq + Hash,
{
    diff_keyed(old, new, |v| v.clone())
}

/// Applies `script` to `seq` in order. This is the normative semantics of a
/// script: `apply(old, &diff_keyed(old, new, key))` leaves `old` equal to
/// `new`, order and content.
pub fn apply<T: Clone>(seq: &mut Vec<T>, script: &[EditOp<T>]) {
    for op in script {
        match op {
            EditOp::Insert { index, value } => seq.insert(*index, value.clone()),
            EditOp::Delete { index } => {
                seq.remove(*index);
            }
            EditOp::Move { from, to, value } => {
                seq.remove(*from);
                seq.insert(*to, value.clone());
            }
            EditOp::Update { index, value } => seq[*index] = value.clone(),
        }
    }
}

/// Longest-common-subsequence backbone via Myers' greedy shortest-edit
/// search. Returns strictly increasing (old, new) index pairs of items that
/// compare equal.
fn myers_matches<K: PartialEq>(a: &[K], b: &[K]) -> Vec<(usize, usize)> {
    let n = a.len() as isize;
    let m = b.len() as isize;
    if n == 0 || m == 0 {
        return Vec::new();
    }
    let max = n + m;
    let offset = max;
    let width = (2 * max + 1) as usize;
    let mut v = vec![0isize; width];
    let mut trace: Vec<Vec<isize>> = Vec::new();

    'search: for d in 0..=max {
        trace.push(v.clone());
        let mut k = -d;
        while k <= d {
            let idx = (k + offset) as usize;
            let mut x = if k == -d || (k != d && v[idx - 1] < v[idx + 1]) {
                v[idx + 1]
            } else {
                v[idx - 1] + 1
            };
            let mut y = x - k;
            while x < n && y < m && a[x as usize] == b[y as usize] {
                x += 1;
                y += 1;
            }
            v[idx] = x;
            if x >= n && y >= m {
                break 'search;
            }
            k += 2;
        }
    }

    // Walk the recorded rounds backwards, collecting diagonal runs.
    let mut matches = Vec::new();
    let mut x = n;
    let mut y = m;
    for d in (0..trace.len() as isize).rev() {
        let v = &trace[d as usize];
        let k = x - y;
        let idx = (k + offset) as usize;
        let prev_k = if k == -d || (k != d && v[idx - 1] < v[idx + 1]) {
            k + 1
        } else {
            k - 1
        };
        let prev_x = v[(prev_k + offset) as usize];
        let prev_y = prev_x - prev_k;
        while x > prev_x && y > prev_y {
            matches.push(((x - 1) as usize, (y - 1) as usize));
            x -= 1;
            y -= 1;
        }
        if d > 0 {
            x = prev_x;
            y = prev_y;
        }
    }
    matches.reverse();
    matches
}
