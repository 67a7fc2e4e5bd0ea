/// Intrusive doubly-linked list over slot pools.
///
/// The links live inside the entities (a [`Link`] field per list the entity
/// can be on); the list itself is only a sentinel head plus a length. Links
/// name their neighbours by slot index, and [`Pos::Head`] stands for the
/// sentinel, so an empty list is a head whose `next` and `prev` both point
/// back at itself.
///
/// The list never allocates or frees entities. Every operation takes the
/// pool ([`Store`]) holding them and only rewires links. Which `Link` field
/// of an entity a list uses is picked by its [`Adapter`], so one entity can
/// sit on several lists at once.
use core::marker::PhantomData;

use crate::slab::SlotIdx;

/// A position a link can point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pos {
    /// Not on any list.
    Unlinked,
    /// The list's own sentinel head.
    Head,
    /// An entity in the pool.
    Entry(SlotIdx),
}

/// Forward/backward link embedded in an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Link {
    prev: Pos,
    next: Pos,
}

impl Link {
    pub const fn new() -> Self {
        Self {
            prev: Pos::Unlinked,
            next: Pos::Unlinked,
        }
    }

    pub fn is_linked(&self) -> bool {
        self.next != Pos::Unlinked
    }

    const fn empty_head() -> Self {
        Self {
            prev: Pos::Head,
            next: Pos::Head,
        }
    }
}

impl Default for Link {
    fn default() -> Self {
        Self::new()
    }
}

/// Selects the link field a list threads through.
pub trait Adapter {
    type Item;
    fn link(item: &Self::Item) -> &Link;
    fn link_mut(item: &mut Self::Item) -> &mut Link;
}

/// Pool access by slot index.
pub trait Store<T> {
    fn item(&self, index: SlotIdx) -> &T;
    fn item_mut(&mut self, index: SlotIdx) -> &mut T;
}

/// Sentinel list head.
pub struct List<A> {
    head: Link,
    len: usize,
    _adapter: PhantomData<A>,
}

impl<A> core::fmt::Debug for List<A> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("List")
            .field("first", &self.head.next)
            .field("last", &self.head.prev)
            .field("len", &self.len)
            .finish()
    }
}

impl<A: Adapter> Default for List<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: Adapter> List<A> {
    pub const fn new() -> Self {
        Self {
            head: Link::empty_head(),
            len: 0,
            _adapter: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.head.next == Pos::Head
    }

    pub fn first(&self) -> Option<SlotIdx> {
        match self.head.next {
            Pos::Entry(i) => Some(i),
            _ => None,
        }
    }

    pub fn last(&self) -> Option<SlotIdx> {
        match self.head.prev {
            Pos::Entry(i) => Some(i),
            _ => None,
        }
    }

    /// Entry following `index` on this list.
    pub fn next_of<S>(&self, store: &S, index: SlotIdx) -> Option<SlotIdx>
    where
        S: Store<A::Item> + ?Sized,
    {
        match A::link(store.item(index)).next {
            Pos::Entry(i) => Some(i),
            _ => None,
        }
    }

    pub fn push_front<S>(&mut self, store: &mut S, index: SlotIdx)
    where
        S: Store<A::Item> + ?Sized,
    {
        let first = self.head.next;
        self.attach(store, index, Pos::Head, first);
    }

    pub fn push_back<S>(&mut self, store: &mut S, index: SlotIdx)
    where
        S: Store<A::Item> + ?Sized,
    {
        let last = self.head.prev;
        self.attach(store, index, last, Pos::Head);
    }

    /// Unlink an entry known to be on this list.
    pub fn remove<S>(&mut self, store: &mut S, index: SlotIdx)
    where
        S: Store<A::Item> + ?Sized,
    {
        #[cfg(debug_assertions)]
        self.check_member(&*store, index);

        let link = *A::link(store.item(index));
        assert!(link.is_linked(), "removing unlinked entry {index}");
        self.set_next(store, link.prev, link.next);
        self.set_prev(store, link.next, link.prev);
        *A::link_mut(store.item_mut(index)) = Link::new();
        self.len -= 1;
    }

    /// Move every entry of `other` onto the back of this list, leaving
    /// `other` empty.
    pub fn append<S>(&mut self, store: &mut S, other: &mut List<A>)
    where
        S: Store<A::Item> + ?Sized,
    {
        let (Pos::Entry(first), Pos::Entry(last)) = (other.head.next, other.head.prev) else {
            return;
        };
        let tail = self.head.prev;
        self.set_next(store, tail, Pos::Entry(first));
        A::link_mut(store.item_mut(first)).prev = tail;
        A::link_mut(store.item_mut(last)).next = Pos::Head;
        self.head.prev = Pos::Entry(last);
        self.len += other.len;

        other.head = Link::empty_head();
        other.len = 0;
    }

    /// Move every entry of `other` onto the front of this list, in order,
    /// leaving `other` empty.
    pub fn prepend<S>(&mut self, store: &mut S, other: &mut List<A>)
    where
        S: Store<A::Item> + ?Sized,
    {
        let (Pos::Entry(first), Pos::Entry(last)) = (other.head.next, other.head.prev) else {
            return;
        };
        let head = self.head.next;
        self.set_prev(store, head, Pos::Entry(last));
        A::link_mut(store.item_mut(last)).next = head;
        A::link_mut(store.item_mut(first)).prev = Pos::Head;
        self.head.next = Pos::Entry(first);
        self.len += other.len;

        other.head = Link::empty_head();
        other.len = 0;
    }

    /// Unlink and return the first entry.
    pub fn pop_front<S>(&mut self, store: &mut S) -> Option<SlotIdx>
    where
        S: Store<A::Item> + ?Sized,
    {
        let first = self.first()?;
        self.remove(store, first);
        Some(first)
    }

    /// Linear membership test.
    pub fn contains<S>(&self, store: &S, index: SlotIdx) -> bool
    where
        S: Store<A::Item> + ?Sized,
    {
        self.iter(store).any(|i| i == index)
    }

    pub fn iter<'a, S>(&self, store: &'a S) -> Iter<'a, A, S>
    where
        S: Store<A::Item> + ?Sized,
    {
        Iter {
            store,
            front: self.head.next,
            back: self.head.prev,
            remaining: self.len,
            _adapter: PhantomData,
        }
    }

    /// Walk the list and verify that forward and backward links agree and
    /// that the length matches. Panics on corruption.
    pub fn check<S>(&self, store: &S)
    where
        S: Store<A::Item> + ?Sized,
    {
        let mut prev = Pos::Head;
        let mut pos = self.head.next;
        let mut count = 0usize;
        while let Pos::Entry(i) = pos {
            let link = A::link(store.item(i));
            assert_eq!(link.prev, prev, "list entry {i}: back link disagrees");
            count += 1;
            assert!(count <= self.len, "list longer than recorded length");
            prev = pos;
            pos = link.next;
        }
        assert_eq!(pos, Pos::Head, "list does not close on its head");
        assert_eq!(self.head.prev, prev, "head back link disagrees");
        assert_eq!(count, self.len, "list length mismatch");
    }

    #[cfg(debug_assertions)]
    fn check_member<S>(&self, store: &S, index: SlotIdx)
    where
        S: Store<A::Item> + ?Sized,
    {
        assert!(
            self.contains(store, index),
            "entry {index} is not on the list it is removed from"
        );
    }

    fn attach<S>(&mut self, store: &mut S, index: SlotIdx, prev: Pos, next: Pos)
    where
        S: Store<A::Item> + ?Sized,
    {
        assert!(
            !A::link(store.item(index)).is_linked(),
            "entry {index} is already linked"
        );
        *A::link_mut(store.item_mut(index)) = Link { prev, next };
        self.set_next(store, prev, Pos::Entry(index));
        self.set_prev(store, next, Pos::Entry(index));
        self.len += 1;
    }

    fn set_next<S>(&mut self, store: &mut S, at: Pos, next: Pos)
    where
        S: Store<A::Item> + ?Sized,
    {
        match at {
            Pos::Head => self.head.next = next,
            Pos::Entry(i) => A::link_mut(store.item_mut(i)).next = next,
            Pos::Unlinked => unreachable!("link through an unlinked position"),
        }
    }

    fn set_prev<S>(&mut self, store: &mut S, at: Pos, prev: Pos)
    where
        S: Store<A::Item> + ?Sized,
    {
        match at {
            Pos::Head => self.head.prev = prev,
            Pos::Entry(i) => A::link_mut(store.item_mut(i)).prev = prev,
            Pos::Unlinked => unreachable!("link through an unlinked position"),
        }
    }
}

/// Forward/backward traversal yielding slot indices.
pub struct Iter<'a, A, S: ?Sized> {
    store: &'a S,
    front: Pos,
    back: Pos,
    remaining: usize,
    _adapter: PhantomData<A>,
}

impl<'a, A, S> Iterator for Iter<'a, A, S>
where
    A: Adapter,
    S: Store<A::Item> + ?Sized,
{
    type Item = SlotIdx;

    fn next(&mut self) -> Option<SlotIdx> {
        if self.remaining == 0 {
            return None;
        }
        let Pos::Entry(i) = self.front else {
            return None;
        };
        self.front = A::link(self.store.item(i)).next;
        self.remaining -= 1;
        Some(i)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<'a, A, S> DoubleEndedIterator for Iter<'a, A, S>
where
    A: Adapter,
    S: Store<A::Item> + ?Sized,
{
    fn next_back(&mut self) -> Option<SlotIdx> {
        if self.remaining == 0 {
            return None;
        }
        let Pos::Entry(i) = self.back else {
            return None;
        };
        self.back = A::link(self.store.item(i)).prev;
        self.remaining -= 1;
        Some(i)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slab::Slab;

    #[derive(Debug, Default)]
    struct Item {
        value: u32,
        a: Link,
        b: Link,
    }

    struct OnA;
    impl Adapter for OnA {
        type Item = Item;
        fn link(item: &Item) -> &Link {
            &item.a
        }
        fn link_mut(item: &mut Item) -> &mut Link {
            &mut item.a
        }
    }

    struct OnB;
    impl Adapter for OnB {
        type Item = Item;
        fn link(item: &Item) -> &Link {
            &item.b
        }
        fn link_mut(item: &mut Item) -> &mut Link {
            &mut item.b
        }
    }

    type Pool = Slab<Item, 16>;

    fn pool_with(values: &[u32]) -> (Pool, heapless::Vec<SlotIdx, 16>) {
        let mut pool = Pool::new();
        let mut idx = heapless::Vec::new();
        for &value in values {
            let key = pool
                .insert_with(|_| Item {
                    value,
                    ..Default::default()
                })
                .ok()
                .unwrap();
            idx.push(key.index()).unwrap();
        }
        (pool, idx)
    }

    fn values<A: Adapter<Item = Item>>(list: &List<A>, pool: &Pool) -> heapless::Vec<u32, 16> {
        list.iter(pool).map(|i| pool.item(i).value).collect()
    }

    // ── Empty list ──────────────────────────────────────────────────

    #[test]
    fn empty_head_points_at_itself() {
        let list: List<OnA> = List::new();
        assert!(list.is_empty());
        assert_eq!(list.head.next, Pos::Head);
        assert_eq!(list.head.prev, Pos::Head);
        assert_eq!(list.first(), None);
        assert_eq!(list.last(), None);
    }

    // ── Insertion ───────────────────────────────────────────────────

    #[test]
    fn push_front_and_back_order() {
        let (mut pool, idx) = pool_with(&[1, 2, 3]);
        let mut list: List<OnA> = List::new();
        list.push_back(&mut pool, idx[1]);
        list.push_front(&mut pool, idx[0]);
        list.push_back(&mut pool, idx[2]);
        assert_eq!(values(&list, &pool).as_slice(), &[1, 2, 3]);
        assert_eq!(list.len(), 3);
        list.check(&pool);
    }

    #[test]
    fn reverse_traversal() {
        let (mut pool, idx) = pool_with(&[1, 2, 3]);
        let mut list: List<OnA> = List::new();
        for &i in &idx {
            list.push_back(&mut pool, i);
        }
        let rev: heapless::Vec<u32, 16> = list.iter(&pool).rev().map(|i| pool.item(i).value).collect();
        assert_eq!(rev.as_slice(), &[3, 2, 1]);
    }

    #[test]
    #[should_panic(expected = "already linked")]
    fn double_insert_panics() {
        let (mut pool, idx) = pool_with(&[1]);
        let mut list: List<OnA> = List::new();
        list.push_back(&mut pool, idx[0]);
        list.push_back(&mut pool, idx[0]);
    }

    // ── Removal ─────────────────────────────────────────────────────

    #[test]
    fn remove_middle_first_last() {
        let (mut pool, idx) = pool_with(&[1, 2, 3, 4]);
        let mut list: List<OnA> = List::new();
        for &i in &idx {
            list.push_back(&mut pool, i);
        }
        list.remove(&mut pool, idx[1]);
        assert_eq!(values(&list, &pool).as_slice(), &[1, 3, 4]);
        list.remove(&mut pool, idx[0]);
        list.remove(&mut pool, idx[3]);
        assert_eq!(values(&list, &pool).as_slice(), &[3]);
        list.check(&pool);
        assert!(!pool.item(idx[1]).a.is_linked());

        list.remove(&mut pool, idx[2]);
        assert!(list.is_empty());
        assert_eq!(list.head, Link::empty_head());
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "not on the list")]
    fn remove_from_wrong_list_panics_in_debug() {
        let (mut pool, idx) = pool_with(&[1, 2]);
        let mut one: List<OnA> = List::new();
        let mut two: List<OnA> = List::new();
        one.push_back(&mut pool, idx[0]);
        two.push_back(&mut pool, idx[1]);
        one.remove(&mut pool, idx[1]);
    }

    // ── Multiple lists per entity ───────────────────────────────────

    #[test]
    fn entity_on_two_lists_independently() {
        let (mut pool, idx) = pool_with(&[1, 2, 3]);
        let mut a: List<OnA> = List::new();
        let mut b: List<OnB> = List::new();
        for &i in &idx {
            a.push_back(&mut pool, i);
            b.push_front(&mut pool, i);
        }
        a.remove(&mut pool, idx[1]);
        assert_eq!(values(&a, &pool).as_slice(), &[1, 3]);
        assert_eq!(values(&b, &pool).as_slice(), &[3, 2, 1]);
        a.check(&pool);
        b.check(&pool);
    }

    // ── Append ──────────────────────────────────────────────────────

    #[test]
    fn append_moves_everything() {
        let (mut pool, idx) = pool_with(&[1, 2, 3, 4]);
        let mut dst: List<OnA> = List::new();
        let mut src: List<OnA> = List::new();
        dst.push_back(&mut pool, idx[0]);
        src.push_back(&mut pool, idx[1]);
        src.push_back(&mut pool, idx[2]);
        src.push_back(&mut pool, idx[3]);

        dst.append(&mut pool, &mut src);
        assert_eq!(values(&dst, &pool).as_slice(), &[1, 2, 3, 4]);
        assert_eq!(dst.len(), 4);
        assert!(src.is_empty());
        assert_eq!(src.len(), 0);
        dst.check(&pool);
        src.check(&pool);
    }

    #[test]
    fn append_onto_empty_and_from_empty() {
        let (mut pool, idx) = pool_with(&[1, 2]);
        let mut dst: List<OnA> = List::new();
        let mut src: List<OnA> = List::new();
        dst.append(&mut pool, &mut src);
        assert!(dst.is_empty());

        src.push_back(&mut pool, idx[0]);
        src.push_back(&mut pool, idx[1]);
        dst.append(&mut pool, &mut src);
        assert_eq!(values(&dst, &pool).as_slice(), &[1, 2]);
        assert_eq!(dst.first(), Some(idx[0]));
        assert_eq!(dst.last(), Some(idx[1]));
        dst.check(&pool);
    }

    #[test]
    fn prepend_keeps_source_order_in_front() {
        let (mut pool, idx) = pool_with(&[1, 2, 3, 4]);
        let mut dst: List<OnA> = List::new();
        let mut src: List<OnA> = List::new();
        dst.push_back(&mut pool, idx[2]);
        dst.push_back(&mut pool, idx[3]);
        src.push_back(&mut pool, idx[0]);
        src.push_back(&mut pool, idx[1]);

        dst.prepend(&mut pool, &mut src);
        assert_eq!(values(&dst, &pool).as_slice(), &[1, 2, 3, 4]);
        assert_eq!(dst.len(), 4);
        assert!(src.is_empty());
        assert_eq!(dst.iter(&pool).rev().next(), Some(idx[3]));
        dst.check(&pool);
        src.check(&pool);
    }

    #[test]
    fn prepend_onto_empty_and_from_empty() {
        let (mut pool, idx) = pool_with(&[1, 2]);
        let mut dst: List<OnA> = List::new();
        let mut src: List<OnA> = List::new();
        dst.push_back(&mut pool, idx[0]);
        dst.prepend(&mut pool, &mut src);
        assert_eq!(values(&dst, &pool).as_slice(), &[1]);

        let mut empty: List<OnA> = List::new();
        src.push_back(&mut pool, idx[1]);
        empty.prepend(&mut pool, &mut src);
        assert_eq!(empty.first(), Some(idx[1]));
        assert_eq!(empty.last(), Some(idx[1]));
        empty.check(&pool);
    }

    // ── Pop ─────────────────────────────────────────────────────────

    #[test]
    fn pop_front_drains_in_order() {
        let (mut pool, idx) = pool_with(&[1, 2, 3]);
        let mut list: List<OnA> = List::new();
        for &i in &idx {
            list.push_back(&mut pool, i);
        }
        assert_eq!(list.pop_front(&mut pool), Some(idx[0]));
        assert!(!pool.item(idx[0]).a.is_linked());
        assert_eq!(values(&list, &pool).as_slice(), &[2, 3]);
        list.check(&pool);

        assert_eq!(list.pop_front(&mut pool), Some(idx[1]));
        assert_eq!(list.pop_front(&mut pool), Some(idx[2]));
        assert_eq!(list.pop_front(&mut pool), None);
        assert!(list.is_empty());
        list.check(&pool);
    }

    // ── Membership and cursor walk ──────────────────────────────────

    #[test]
    fn contains_scans_the_list() {
        let (mut pool, idx) = pool_with(&[1, 2, 3]);
        let mut list: List<OnA> = List::new();
        list.push_back(&mut pool, idx[0]);
        list.push_back(&mut pool, idx[2]);
        assert!(list.contains(&pool, idx[0]));
        assert!(!list.contains(&pool, idx[1]));
        assert!(list.contains(&pool, idx[2]));
    }

    #[test]
    fn cursor_walk_survives_removal() {
        let (mut pool, idx) = pool_with(&[1, 2, 3, 4, 5]);
        let mut list: List<OnA> = List::new();
        for &i in &idx {
            list.push_back(&mut pool, i);
        }
        let mut cursor = list.first();
        while let Some(i) = cursor {
            cursor = list.next_of(&pool, i);
            if pool.item(i).value % 2 == 0 {
                list.remove(&mut pool, i);
            }
        }
        assert_eq!(values(&list, &pool).as_slice(), &[1, 3, 5]);
        list.check(&pool);
    }
}
