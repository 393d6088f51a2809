use std::cmp::Ordering;

use crate::Error;

#[repr(transparent)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Id(u32);

impl Id {
    const NIL: Self = Self(u32::MAX);

    #[inline(always)]
    fn is_nil(self) -> bool {
        self.0 == u32::MAX
    }

    #[inline(always)]
    fn idx(self) -> usize {
        self.0 as usize
    }
}

#[inline(always)]
fn id(v: usize) -> Id {
    debug_assert!(v < u32::MAX as usize);
    Id(v as u32)
}

const LEFT: usize = 0;
const RIGHT: usize = 1;

struct Node<K, V> {
    key: K,
    value: V,
    red: bool,
    ch: [Id; 2],
    p: Id,
}

/// Ordered map backed by a red-black tree.
///
/// Nodes live in a dense arena indexed by `Id` handles; `ch` holds the two
/// owned subtrees and `p` is the non-owning back-reference (`NIL` only for
/// the root). Left/right symmetric logic is written once against the child
/// index and mirrored with `dir ^ 1`.
pub struct RbTreeMap<K: Ord, V> {
    nodes: Vec<Node<K, V>>,
    root: Id,
}

impl<K: Ord, V> RbTreeMap<K, V> {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            root: Id::NIL,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_nil()
    }

    #[inline(always)]
    fn node(&self, x: Id) -> &Node<K, V> {
        debug_assert!(!x.is_nil());
        debug_assert!(x.idx() < self.nodes.len());
        if cfg!(debug_assertions) {
            &self.nodes[x.idx()]
        } else {
            // SAFETY: `Id` values are only created from valid indices and `NIL` is checked.
            unsafe { self.nodes.get_unchecked(x.idx()) }
        }
    }

    #[inline(always)]
    fn node_mut(&mut self, x: Id) -> &mut Node<K, V> {
        debug_assert!(!x.is_nil());
        debug_assert!(x.idx() < self.nodes.len());
        if cfg!(debug_assertions) {
            &mut self.nodes[x.idx()]
        } else {
            // SAFETY: `Id` values are only created from valid indices and `NIL` is checked.
            unsafe { self.nodes.get_unchecked_mut(x.idx()) }
        }
    }

    #[inline(always)]
    fn is_red(&self, x: Id) -> bool {
        !x.is_nil() && self.node(x).red
    }

    /// Which child slot of `p` holds `x`.
    #[inline(always)]
    fn dir_of(&self, p: Id, x: Id) -> usize {
        debug_assert!(self.node(p).ch[0] == x || self.node(p).ch[1] == x);
        usize::from(self.node(p).ch[RIGHT] == x)
    }

    fn alloc(&mut self, key: K, value: V, red: bool) -> Id {
        let x = id(self.nodes.len());
        self.nodes.push(Node {
            key,
            value,
            red,
            ch: [Id::NIL; 2],
            p: Id::NIL,
        });
        x
    }

    /// Removes the slot of a fully detached node, keeping the arena dense by
    /// moving the last slot into the hole and patching its neighbors.
    fn release(&mut self, x: Id) -> (K, V) {
        let last = id(self.nodes.len() - 1);
        if x != last {
            let (lp, lch) = {
                let n = self.node(last);
                (n.p, n.ch)
            };
            for c in lch {
                if !c.is_nil() {
                    self.node_mut(c).p = x;
                }
            }
            if lp.is_nil() {
                self.root = x;
            } else {
                let d = self.dir_of(lp, last);
                self.node_mut(lp).ch[d] = x;
            }
        }
        let slot = self.nodes.swap_remove(x.idx());
        (slot.key, slot.value)
    }

    /// Single rotation promoting `x` above its parent. The only place
    /// structural relinking happens; every fixup is recolorings plus this.
    fn rotate(&mut self, x: Id) {
        let p = self.node(x).p;
        debug_assert!(!p.is_nil());
        let g = self.node(p).p;
        let dir = self.dir_of(p, x);
        let inner = self.node(x).ch[dir ^ 1];

        if g.is_nil() {
            self.root = x;
        } else {
            let gdir = self.dir_of(g, p);
            self.node_mut(g).ch[gdir] = x;
        }
        self.node_mut(x).p = g;

        self.node_mut(x).ch[dir ^ 1] = p;
        self.node_mut(p).p = x;

        self.node_mut(p).ch[dir] = inner;
        if !inner.is_nil() {
            self.node_mut(inner).p = p;
        }
    }

    /// Binary descent to the node holding `key`.
    fn locate(&self, key: &K) -> Result<Id, Error> {
        if self.root.is_nil() {
            return Err(Error::EmptyTree);
        }
        let mut cur = self.root;
        while !cur.is_nil() {
            cur = match key.cmp(&self.node(cur).key) {
                Ordering::Less => self.node(cur).ch[LEFT],
                Ordering::Greater => self.node(cur).ch[RIGHT],
                Ordering::Equal => return Ok(cur),
            };
        }
        Err(Error::KeyNotFound)
    }

    pub fn find(&self, key: &K) -> Result<&V, Error> {
        let x = self.locate(key)?;
        Ok(&self.node(x).value)
    }

    /// Overwrites the payload of an existing key in place. No rebalancing is
    /// needed since keys and structure are unchanged. Returns the replaced
    /// value.
    pub fn update(&mut self, key: &K, value: V) -> Result<V, Error> {
        let x = self.locate(key)?;
        Ok(std::mem::replace(&mut self.node_mut(x).value, value))
    }

    /// Inserts `key`, returning the previous value if the key was already
    /// present (a duplicate insert overwrites in place).
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        if self.root.is_nil() {
            let x = self.alloc(key, value, false);
            self.root = x;
            return None;
        }

        let mut cur = self.root;
        let dir = loop {
            match key.cmp(&self.node(cur).key) {
                Ordering::Equal => {
                    return Some(std::mem::replace(&mut self.node_mut(cur).value, value));
                }
                Ordering::Less => {
                    let next = self.node(cur).ch[LEFT];
                    if next.is_nil() {
                        break LEFT;
                    }
                    cur = next;
                }
                Ordering::Greater => {
                    let next = self.node(cur).ch[RIGHT];
                    if next.is_nil() {
                        break RIGHT;
                    }
                    cur = next;
                }
            }
        };

        // The new node takes the color opposite its parent's. A red child of
        // a black parent breaks nothing and terminates immediately; a black
        // child of a red parent puts one excess black on its path and must
        // be repaired by rotation.
        let parent_red = self.node(cur).red;
        let x = self.alloc(key, value, !parent_red);
        self.node_mut(x).p = cur;
        self.node_mut(cur).ch[dir] = x;
        if parent_red {
            self.repair_black_insert(x, cur, dir);
            let root = self.root;
            self.node_mut(root).red = false;
        }
        None
    }

    /// Restores the black-height after attaching the black node `x` under
    /// the red parent `p` on side `dir`.
    ///
    /// A red node in a valid tree has either zero or two children, so `p`
    /// was a leaf: `x` is its only child, the grandparent exists and is
    /// black, and the uncle is absent or a red leaf. That leaves four
    /// mirrored shapes, each resolved by promoting `p` (outer child) or `x`
    /// (inner child) into the grandparent's slot.
    fn repair_black_insert(&mut self, x: Id, p: Id, dir: usize) {
        let g = self.node(p).p;
        debug_assert!(!g.is_nil() && !self.node(g).red);
        debug_assert!(self.node(p).ch[dir ^ 1].is_nil());
        let pdir = self.dir_of(g, p);
        let uncle = self.node(g).ch[pdir ^ 1];
        debug_assert!(uncle.is_nil() || self.node(uncle).red);

        let promoted = if dir == pdir {
            // Outer child: one rotation; p red over {x black, g black} is
            // already the target coloring.
            self.rotate(p);
            p
        } else {
            // Inner child: double rotation pulls x above both, then x takes
            // the red slot and p the black one.
            self.rotate(x);
            self.rotate(x);
            self.node_mut(x).red = true;
            self.node_mut(p).red = false;
            x
        };

        let above = self.node(promoted).p;
        if above.is_nil() || !self.node(above).red {
            return;
        }
        if uncle.is_nil() {
            // The demoted grandparent kept no red child, so flipping the
            // promoted node black and its children red ends the repair
            // without touching black-heights.
            self.node_mut(promoted).red = false;
            let ch = self.node(promoted).ch;
            self.node_mut(ch[LEFT]).red = true;
            self.node_mut(ch[RIGHT]).red = true;
        } else {
            self.double_red_fixup(promoted);
        }
    }

    /// Cascading repair for a red node `x` (with black children) under a red
    /// parent. Walks parent links iteratively; the worst case recolors all
    /// the way to the root.
    fn double_red_fixup(&mut self, mut x: Id) {
        loop {
            let p = self.node(x).p;
            if p.is_nil() || !self.node(p).red {
                return;
            }
            // A red parent is never the root, so the grandparent exists and
            // is black.
            let g = self.node(p).p;
            debug_assert!(!g.is_nil() && !self.node(g).red);
            let pdir = self.dir_of(g, p);
            let uncle = self.node(g).ch[pdir ^ 1];
            if self.is_red(uncle) {
                self.node_mut(p).red = false;
                self.node_mut(uncle).red = false;
                self.node_mut(g).red = true;
                x = g;
                continue;
            }
            let dir = self.dir_of(p, x);
            let top = if dir == pdir {
                self.rotate(p);
                p
            } else {
                self.rotate(x);
                self.rotate(x);
                x
            };
            self.node_mut(top).red = false;
            self.node_mut(g).red = true;
            return;
        }
    }

    /// Removes `key`, returning its value.
    pub fn delete(&mut self, key: &K) -> Result<V, Error> {
        let target = self.locate(key)?;
        let leaf = self.sift_to_leaf(target);
        debug_assert!(self.node(leaf).ch[LEFT].is_nil() && self.node(leaf).ch[RIGHT].is_nil());

        let p = self.node(leaf).p;
        if p.is_nil() {
            self.root = Id::NIL;
        } else {
            let was_red = self.node(leaf).red;
            let dir = self.dir_of(p, leaf);
            self.node_mut(p).ch[dir] = Id::NIL;
            // Detaching a red leaf changes no black-height. A black leaf
            // leaves its path one black short and needs the fixup.
            if !was_red {
                self.erase_color(p, dir)?;
            }
        }
        let (_, value) = self.release(leaf);
        Ok(value)
    }

    /// Relocates the doomed payload downward by repeated swaps until it sits
    /// in a true leaf. With two children the swap partner is the in-order
    /// predecessor (the left child's rightmost descendant); with one child
    /// it is that child, necessarily a red leaf. Only payloads move, so all
    /// structural removal happens at a leaf.
    fn sift_to_leaf(&mut self, mut x: Id) -> Id {
        loop {
            let [l, r] = self.node(x).ch;
            let next = if !l.is_nil() && !r.is_nil() {
                let mut pred = l;
                while !self.node(pred).ch[RIGHT].is_nil() {
                    pred = self.node(pred).ch[RIGHT];
                }
                pred
            } else if !r.is_nil() {
                r
            } else if !l.is_nil() {
                l
            } else {
                return x;
            };
            self.swap_payload(x, next);
            x = next;
        }
    }

    fn swap_payload(&mut self, a: Id, b: Id) {
        debug_assert!(a != b);
        let (lo, hi) = if a.idx() < b.idx() {
            (a.idx(), b.idx())
        } else {
            (b.idx(), a.idx())
        };
        let (head, tail) = self.nodes.split_at_mut(hi);
        let first = &mut head[lo];
        let second = &mut tail[0];
        std::mem::swap(&mut first.key, &mut second.key);
        std::mem::swap(&mut first.value, &mut second.value);
    }

    /// Resolves the double-black deficiency at the (now absent) child of `p`
    /// on side `dir`, by case analysis on the sibling. Iterative; the
    /// deficiency ascends at most to the root.
    fn erase_color(&mut self, mut p: Id, mut dir: usize) -> Result<(), Error> {
        loop {
            debug_assert!(!self.is_red(self.node(p).ch[dir]));
            // The deficient side is one black short, so the sibling side
            // holds at least one black node.
            let mut sibling = self.node(p).ch[dir ^ 1];
            if sibling.is_nil() {
                return Err(Error::InvariantViolation);
            }
            if self.node(sibling).red {
                // Rotate the red sibling up to expose a black one.
                self.rotate(sibling);
                self.node_mut(sibling).red = false;
                self.node_mut(p).red = true;
                sibling = self.node(p).ch[dir ^ 1];
                if sibling.is_nil() {
                    return Err(Error::InvariantViolation);
                }
            }

            let far = self.node(sibling).ch[dir ^ 1];
            let near = self.node(sibling).ch[dir];
            if self.is_red(far) {
                // Far-side red child: one rotation, the sibling inherits the
                // parent's color.
                let p_was_red = self.node(p).red;
                self.rotate(sibling);
                self.node_mut(sibling).red = p_was_red;
                self.node_mut(p).red = false;
                self.node_mut(far).red = false;
                return Ok(());
            }
            if self.is_red(near) {
                // Near-side child only: double rotation, the near child
                // inherits the parent's color.
                let p_was_red = self.node(p).red;
                self.rotate(near);
                self.rotate(near);
                self.node_mut(near).red = p_was_red;
                self.node_mut(p).red = false;
                return Ok(());
            }

            // Both sibling children black or absent: pull one black out of
            // the sibling side. A red parent absorbs the deficiency;
            // otherwise it moves up one level.
            self.node_mut(sibling).red = true;
            if self.node(p).red {
                self.node_mut(p).red = false;
                return Ok(());
            }
            let gp = self.node(p).p;
            if gp.is_nil() {
                // Every path lost one black; the tree is uniform again.
                return Ok(());
            }
            dir = self.dir_of(gp, p);
            p = gp;
        }
    }

    /// Asserts every structural invariant plus arena bookkeeping. Test-only.
    #[cfg(test)]
    pub(crate) fn audit(&self) {
        if self.root.is_nil() {
            assert_eq!(self.nodes.len(), 0, "arena holds orphaned slots");
            return;
        }
        assert!(!self.node(self.root).red, "root must be black");
        assert!(self.node(self.root).p.is_nil(), "root has a parent link");
        let (_, count) = self.audit_node(self.root, None, None);
        assert_eq!(count, self.nodes.len(), "arena holds unreachable slots");
    }

    #[cfg(test)]
    fn audit_node(&self, x: Id, lo: Option<&K>, hi: Option<&K>) -> (usize, usize) {
        if x.is_nil() {
            return (0, 0);
        }
        let n = self.node(x);
        if let Some(lo) = lo {
            assert!(*lo < n.key, "BST order broken against lower bound");
        }
        if let Some(hi) = hi {
            assert!(n.key < *hi, "BST order broken against upper bound");
        }
        for c in n.ch {
            if !c.is_nil() {
                assert_eq!(self.node(c).p, x, "child/parent links disagree");
                assert!(!(n.red && self.node(c).red), "red node has a red child");
            }
        }
        let (bh_left, count_left) = self.audit_node(n.ch[LEFT], lo, Some(&n.key));
        let (bh_right, count_right) = self.audit_node(n.ch[RIGHT], Some(&n.key), hi);
        assert_eq!(bh_left, bh_right, "black-height differs between subtrees");
        (bh_left + usize::from(!n.red), count_left + count_right + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::RbTreeMap;
    use crate::Error;

    fn build(keys: &[u64]) -> RbTreeMap<u64, u64> {
        let mut map = RbTreeMap::new();
        for &k in keys {
            map.insert(k, k);
            map.audit();
        }
        map
    }

    fn assert_contents(map: &RbTreeMap<u64, u64>, present: &[u64]) {
        assert_eq!(map.len(), present.len());
        for &k in present {
            assert_eq!(map.find(&k), Ok(&k));
        }
    }

    #[test]
    fn empty_map_errors() {
        let mut map = RbTreeMap::<u64, u64>::new();
        assert!(map.is_empty());
        assert_eq!(map.len(), 0);
        assert_eq!(map.find(&1), Err(Error::EmptyTree));
        assert_eq!(map.update(&1, 10), Err(Error::EmptyTree));
        assert_eq!(map.delete(&1), Err(Error::EmptyTree));
    }

    #[test]
    fn missing_key_errors() {
        let mut map = build(&[5, 3, 8]);
        assert_eq!(map.find(&4), Err(Error::KeyNotFound));
        assert_eq!(map.update(&4, 40), Err(Error::KeyNotFound));
        assert_eq!(map.delete(&4), Err(Error::KeyNotFound));
        assert_contents(&map, &[5, 3, 8]);
    }

    #[test]
    fn single_node_lifecycle() {
        let mut map = RbTreeMap::new();
        assert_eq!(map.insert(7, 70), None);
        assert_eq!(map.find(&7), Ok(&70));
        assert_eq!(map.delete(&7), Ok(70));
        assert!(map.is_empty());
        map.audit();
        assert_eq!(map.find(&7), Err(Error::EmptyTree));
    }

    #[test]
    fn duplicate_insert_overwrites() {
        let mut map = RbTreeMap::new();
        assert_eq!(map.insert(1, 10), None);
        assert_eq!(map.insert(1, 20), Some(10));
        assert_eq!(map.len(), 1);
        assert_eq!(map.find(&1), Ok(&20));
        map.audit();
    }

    #[test]
    fn update_replaces_in_place() {
        let mut map = build(&[2, 1, 3]);
        assert_eq!(map.update(&3, 30), Ok(3));
        assert_eq!(map.find(&3), Ok(&30));
        map.audit();
    }

    #[test]
    fn smoke_driver_scenario() {
        let mut map = build(&[30, 25, 36, 48, 49, 50, 26, 22, 23]);
        assert_eq!(map.find(&48), Ok(&48));
        assert_eq!(map.update(&50, 500), Ok(50));
        assert_eq!(map.find(&50), Ok(&500));
        assert_eq!(map.delete(&26), Ok(26));
        map.audit();
        assert_eq!(map.find(&26), Err(Error::KeyNotFound));
        assert_eq!(map.len(), 8);
        for k in [30, 25, 36, 48, 49, 22, 23] {
            assert_eq!(map.find(&k), Ok(&k));
        }
    }

    #[test]
    fn red_insert_under_black_parent_terminates() {
        let map = build(&[2, 1, 3]);
        assert_contents(&map, &[1, 2, 3]);
    }

    // The four black-insert shapes, both mirrors. Sequence comments name the
    // triggering configuration.
    #[test]
    fn black_insert_outer_left() {
        // 1 lands as the left child of red leaf 2; uncle absent.
        let map = build(&[3, 2, 1]);
        assert_contents(&map, &[1, 2, 3]);
    }

    #[test]
    fn black_insert_outer_right() {
        let map = build(&[1, 2, 3]);
        assert_contents(&map, &[1, 2, 3]);
    }

    #[test]
    fn black_insert_inner_left() {
        // 2 lands as the right child of red leaf 1 under 3; uncle absent.
        let map = build(&[3, 1, 2]);
        assert_contents(&map, &[1, 2, 3]);
    }

    #[test]
    fn black_insert_inner_right() {
        let map = build(&[1, 3, 2]);
        assert_contents(&map, &[1, 2, 3]);
    }

    #[test]
    fn black_insert_outer_with_red_uncle() {
        // 0 lands under red leaf 1 while 3, the uncle, is red.
        let map = build(&[2, 1, 3, 0]);
        assert_contents(&map, &[0, 1, 2, 3]);
        let map = build(&[2, 1, 3, 4]);
        assert_contents(&map, &[1, 2, 3, 4]);
    }

    #[test]
    fn black_insert_inner_with_red_uncle() {
        // 1 lands as the inner child of red leaf 0 while 3 is red.
        let map = build(&[2, 0, 3, 1]);
        assert_contents(&map, &[0, 1, 2, 3]);
        let map = build(&[2, 1, 4, 3]);
        assert_contents(&map, &[1, 2, 3, 4]);
    }

    #[test]
    fn deep_cascade_after_black_insert() {
        // Four generations: the repair promotes locally, then the remaining
        // red-above-red conflict has to climb past the grandparent.
        for n in [15_u64, 31, 63] {
            let mut map = build(&(1..=n).collect::<Vec<_>>());
            for k in (1..=n).rev() {
                map.insert(k + 1000, k);
                map.audit();
            }
        }
    }

    #[test]
    fn ascending_and_descending_sweeps() {
        let map = build(&(1..=64).collect::<Vec<_>>());
        assert_contents(&map, &(1..=64).collect::<Vec<_>>());
        let map = build(&(1..=64).rev().collect::<Vec<_>>());
        assert_contents(&map, &(1..=64).collect::<Vec<_>>());
    }

    #[test]
    fn zigzag_inserts() {
        let mut keys = Vec::new();
        for i in 0..32_u64 {
            keys.push(i);
            keys.push(1000 - i);
        }
        let map = build(&keys);
        assert_eq!(map.len(), keys.len());
    }

    #[test]
    fn delete_from_every_position() {
        for n in [4_u64, 8, 16, 33] {
            for victim in 0..n {
                let mut map = build(&(0..n).collect::<Vec<_>>());
                assert_eq!(map.delete(&victim), Ok(victim));
                map.audit();
                assert_eq!(map.find(&victim), Err(Error::KeyNotFound));
                for k in (0..n).filter(|&k| k != victim) {
                    assert_eq!(map.find(&k), Ok(&k));
                }
                // Drain the rest, auditing every step, to cross each
                // sibling shape on both sides.
                for k in (0..n).filter(|&k| k != victim) {
                    assert_eq!(map.delete(&k), Ok(k));
                    map.audit();
                }
                assert!(map.is_empty());
                assert_eq!(map.delete(&victim), Err(Error::EmptyTree));
            }
        }
    }

    #[test]
    fn delete_descending_and_inside_out() {
        let n = 48_u64;
        let mut map = build(&(0..n).collect::<Vec<_>>());
        for k in (0..n).rev() {
            assert_eq!(map.delete(&k), Ok(k));
            map.audit();
        }

        let mut map = build(&(0..n).collect::<Vec<_>>());
        let (mut lo, mut hi) = (n / 2, n / 2 + 1);
        while lo > 0 || hi < n {
            if lo > 0 {
                lo -= 1;
                assert_eq!(map.delete(&lo), Ok(lo));
                map.audit();
            }
            if hi < n {
                assert_eq!(map.delete(&hi), Ok(hi));
                map.audit();
                hi += 1;
            }
        }
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn delete_interleaved_with_insert() {
        let mut map = RbTreeMap::new();
        for round in 0..6_u64 {
            for k in 0..32 {
                map.insert(k * 7 % 32 + round * 100, k);
                map.audit();
            }
            for k in 0..32 {
                assert!(map.delete(&(k + round * 100)).is_ok());
                map.audit();
            }
        }
        assert!(map.is_empty());
    }

    fn permutations(n: usize, visit: &mut impl FnMut(&[u64])) {
        fn heap(arr: &mut [u64], k: usize, visit: &mut impl FnMut(&[u64])) {
            if k <= 1 {
                visit(arr);
                return;
            }
            for i in 0..k {
                heap(arr, k - 1, visit);
                if k % 2 == 0 {
                    arr.swap(i, k - 1);
                } else {
                    arr.swap(0, k - 1);
                }
            }
        }
        let mut arr: Vec<u64> = (0..n as u64).collect();
        heap(&mut arr, n, visit);
    }

    #[test]
    fn all_insertion_orders_small() {
        for n in 1..=6 {
            permutations(n, &mut |order| {
                let mut map = build(order);
                for k in 0..n as u64 {
                    assert_eq!(map.delete(&k), Ok(k));
                    map.audit();
                }
            });
        }
    }

    #[test]
    fn all_deletion_orders_small() {
        for n in 1..=6 {
            permutations(n, &mut |order| {
                let mut map = build(&(0..n as u64).collect::<Vec<_>>());
                for &k in order {
                    assert_eq!(map.delete(&k), Ok(k));
                    map.audit();
                }
                assert!(map.is_empty());
            });
        }
    }

    #[test]
    fn len_tracks_occupancy() {
        let mut map = RbTreeMap::new();
        for k in 0..100_u64 {
            map.insert(k, k);
        }
        assert_eq!(map.len(), 100);
        map.insert(50, 0);
        assert_eq!(map.len(), 100);
        for k in 0..50_u64 {
            map.delete(&k).unwrap();
        }
        assert_eq!(map.len(), 50);
    }
}
