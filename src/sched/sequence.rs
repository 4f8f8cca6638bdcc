//! 定容侵入式有序链表
//!
//! 一个 `links` 数组同时承载两条互不相交的单链:
//! - 活动链: 已占用槽位, 始终按 [`SlotStore::goes_before`] 排序
//! - 空闲链: 未占用槽位, 无顺序要求
//!
//! 两条链恰好划分 `0..N`。哨兵值为 `N` (越界索引), 表示 "没有下一个"。
//!
//! 容器本身不保存数据, 也不做并发保护; 数据由调用方的 [`SlotStore`]
//! 按槽位索引保存, 比较同样基于槽位索引进行。
//!
//! # 复杂度
//! - `pop_first` / `has_space` / `is_empty`: O(1)
//! - `insert`: O(n), n 为活动链长度
//!
//! # Example
//! ```ignore
//! let mut seq: Sequence<8> = Sequence::new();
//! let slot = seq.insert(&mut table, request).unwrap();
//! if seq.peek_first() == Some(slot) {
//!     // 新的最早项
//! }
//! ```

/// 槽位存储
///
/// 为 [`Sequence`] 提供按槽位索引的数据保存与全序比较。
pub trait SlotStore {
    /// 插入时传入的数据
    type Item<'a>;

    /// 把 `item` 复制到 `slot`
    fn store(&mut self, item: Self::Item<'_>, slot: usize);

    /// `a` 必须排在 `b` 之前时返回 `true`
    ///
    /// 必须是严格序: 相等的两项返回 `false`, 这样新插入的相等项
    /// 会落在已有相等项之后 (相等项保持 FIFO)。
    fn goes_before(&self, a: usize, b: usize) -> bool;
}

/// 定容有序序列
pub struct Sequence<const N: usize> {
    /// 槽位 i 在所属链中的下一个槽位
    links: [usize; N],
    /// 活动链头
    active_head: usize,
    /// 空闲链头
    free_head: usize,
}

impl<const N: usize> Sequence<N> {
    /// 哨兵: 没有下一个槽位 / 空链
    pub const SENTINEL: usize = N;

    /// 创建处于复位状态的序列: 全部槽位在空闲链上
    pub const fn new() -> Self {
        assert!(N > 0, "Sequence capacity must be > 0");

        let mut links = [0usize; N];
        let mut i = 0;
        while i < N {
            links[i] = i + 1;
            i += 1;
        }

        Self {
            links,
            active_head: N,
            free_head: 0,
        }
    }

    /// 复位全部链接
    ///
    /// 之后活动链为空; 之前存储的数据不会被清除, 只是不再可达。
    pub fn init(&mut self) {
        *self = Self::new();
    }

    /// 总容量
    #[inline(always)]
    pub const fn capacity(&self) -> usize {
        N
    }

    /// 还有空闲槽位
    #[inline(always)]
    pub fn has_space(&self) -> bool {
        self.free_head != N
    }

    /// 活动链为空
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.active_head == N
    }

    /// 按序插入
    ///
    /// 从空闲链头取槽位, 调用 `store` 保存数据, 然后沿活动链查找
    /// 第一个 `goes_before(new, candidate)` 成立的位置并插在它前面。
    ///
    /// # Returns
    /// - `Some(slot)`: 新项所在槽位
    /// - `None`: 已满, 状态不变
    pub fn insert<S: SlotStore>(&mut self, store: &mut S, item: S::Item<'_>) -> Option<usize> {
        if !self.has_space() {
            return None;
        }

        let idx = self.free_head;
        self.free_head = self.links[idx];
        store.store(item, idx);

        let mut prev = N;
        let mut cur = self.active_head;
        while cur != N && !store.goes_before(idx, cur) {
            prev = cur;
            cur = self.links[cur];
        }

        self.links[idx] = cur;
        if prev == N {
            self.active_head = idx;
        } else {
            self.links[prev] = idx;
        }

        Some(idx)
    }

    /// 最早项所在槽位, 空时为 `None`
    #[inline(always)]
    pub fn peek_first(&self) -> Option<usize> {
        if self.is_empty() {
            None
        } else {
            Some(self.active_head)
        }
    }

    /// 移除最早项并把槽位还给空闲链头
    ///
    /// 不清除数据: 槽位只是变为可覆盖。空时返回 `false`。
    pub fn pop_first(&mut self) -> bool {
        if self.is_empty() {
            return false;
        }

        let idx = self.active_head;
        self.active_head = self.links[idx];
        self.links[idx] = self.free_head;
        self.free_head = idx;
        true
    }

    /// 活动项数量 (O(n))
    pub fn len(&self) -> usize {
        self.iter_active().count()
    }

    /// 按顺序遍历活动链
    pub fn iter_active(&self) -> ChainIter<'_, N> {
        ChainIter {
            links: &self.links,
            cur: self.active_head,
        }
    }

    /// 遍历空闲链
    pub fn iter_free(&self) -> ChainIter<'_, N> {
        ChainIter {
            links: &self.links,
            cur: self.free_head,
        }
    }
}

impl<const N: usize> Default for Sequence<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// 链遍历器
pub struct ChainIter<'a, const N: usize> {
    links: &'a [usize; N],
    cur: usize,
}

impl<'a, const N: usize> Iterator for ChainIter<'a, N> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.cur >= N {
            return None;
        }
        let idx = self.cur;
        self.cur = self.links[idx];
        Some(idx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 值既是负载也是排序键, 小值在前
    struct Values<const N: usize> {
        values: [u32; N],
    }

    impl<const N: usize> Values<N> {
        fn new() -> Self {
            Self { values: [0; N] }
        }
    }

    impl<const N: usize> SlotStore for Values<N> {
        type Item<'a> = u32;

        fn store(&mut self, item: u32, slot: usize) {
            self.values[slot] = item;
        }

        fn goes_before(&self, a: usize, b: usize) -> bool {
            self.values[a] < self.values[b]
        }
    }

    /// (key, tag): 只按 key 排序, tag 用于区分相等项
    struct Tagged<const N: usize> {
        entries: [(u32, u32); N],
    }

    impl<const N: usize> SlotStore for Tagged<N> {
        type Item<'a> = (u32, u32);

        fn store(&mut self, item: (u32, u32), slot: usize) {
            self.entries[slot] = item;
        }

        fn goes_before(&self, a: usize, b: usize) -> bool {
            self.entries[a].0 < self.entries[b].0
        }
    }

    fn drain<const N: usize>(seq: &mut Sequence<N>, store: &Values<N>) -> [u32; N] {
        let mut out = [0; N];
        let mut i = 0;
        while let Some(slot) = seq.peek_first() {
            out[i] = store.values[slot];
            assert!(seq.pop_first());
            i += 1;
        }
        out
    }

    fn assert_partition<const N: usize>(seq: &Sequence<N>) {
        let mut seen = [0u8; N];
        for idx in seq.iter_active().chain(seq.iter_free()) {
            seen[idx] += 1;
        }
        assert!(seen.iter().all(|&n| n == 1), "slots not partitioned: {:?}", seen);
    }

    #[test]
    fn test_init_state() {
        let seq: Sequence<4> = Sequence::new();
        assert!(seq.is_empty());
        assert!(seq.has_space());
        assert_eq!(seq.peek_first(), None);
        assert_eq!(seq.iter_free().collect::<Vec<_>>(), vec![0, 1, 2, 3]);
        assert_eq!(Sequence::<4>::SENTINEL, 4);
    }

    #[test]
    fn test_sorted_pop_order() {
        let mut seq: Sequence<5> = Sequence::new();
        let mut store = Values::<5>::new();

        for v in [4, 2, 1, 5, 3] {
            assert!(seq.insert(&mut store, v).is_some());
        }

        assert_eq!(drain(&mut seq, &store), [1, 2, 3, 4, 5]);
        assert!(seq.is_empty());
    }

    #[test]
    fn test_capacity_bound() {
        let mut seq: Sequence<3> = Sequence::new();
        let mut store = Values::<3>::new();

        for (n, v) in [30, 10, 20].into_iter().enumerate() {
            assert!(seq.has_space(), "space expected before insert {}", n);
            assert!(seq.insert(&mut store, v).is_some());
        }
        assert!(!seq.has_space());

        let before: Vec<usize> = seq.iter_active().collect();
        assert_eq!(seq.insert(&mut store, 0), None);
        assert_eq!(seq.iter_active().collect::<Vec<_>>(), before);
        assert_eq!(store.values, [30, 10, 20]);
    }

    #[test]
    fn test_pop_empty() {
        let mut seq: Sequence<2> = Sequence::new();
        assert!(!seq.pop_first());
        assert!(seq.has_space());
        assert_partition(&seq);
    }

    #[test]
    fn test_peek_after_insert() {
        let mut seq: Sequence<4> = Sequence::new();
        let mut store = Values::<4>::new();

        let a = seq.insert(&mut store, 10).unwrap();
        assert_eq!(seq.peek_first(), Some(a));

        // 有更早项时, 新项不是链头
        let b = seq.insert(&mut store, 20).unwrap();
        assert_eq!(seq.peek_first(), Some(a));
        assert_ne!(seq.peek_first(), Some(b));

        let c = seq.insert(&mut store, 5).unwrap();
        assert_eq!(seq.peek_first(), Some(c));
    }

    #[test]
    fn test_fifo_within_tie() {
        let mut seq: Sequence<4> = Sequence::new();
        let mut store = Tagged::<4> { entries: [(0, 0); 4] };

        seq.insert(&mut store, (7, 1)).unwrap();
        seq.insert(&mut store, (3, 9)).unwrap();
        seq.insert(&mut store, (7, 2)).unwrap();
        seq.insert(&mut store, (7, 3)).unwrap();

        let order: Vec<(u32, u32)> = seq.iter_active().map(|i| store.entries[i]).collect();
        assert_eq!(order, vec![(3, 9), (7, 1), (7, 2), (7, 3)]);
    }

    #[test]
    fn test_slot_reuse_after_pop() {
        let mut seq: Sequence<2> = Sequence::new();
        let mut store = Values::<2>::new();

        let a = seq.insert(&mut store, 1).unwrap();
        seq.insert(&mut store, 2).unwrap();
        assert!(seq.pop_first());

        // 弹出的槽位回到空闲链头, 下一次插入复用它
        assert_eq!(seq.insert(&mut store, 3), Some(a));
        assert_eq!(drain(&mut seq, &store), [2, 3]);
    }

    #[test]
    fn test_interleaved_invariants() {
        let mut seq: Sequence<8> = Sequence::new();
        let mut store = Values::<8>::new();

        // 简单 LCG 产生插入/弹出交错序列
        let mut state: u32 = 0x1234_5678;
        for _ in 0..500 {
            state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            let value = (state >> 16) % 50;

            if state & 0x3 != 0 && seq.has_space() {
                assert!(seq.insert(&mut store, value).is_some());
            } else {
                seq.pop_first();
            }

            assert_partition(&seq);
            assert_eq!(seq.len() + seq.iter_free().count(), 8);

            let values: Vec<u32> = seq.iter_active().map(|i| store.values[i]).collect();
            assert!(values.windows(2).all(|w| w[0] <= w[1]), "unsorted: {:?}", values);
        }
    }

    #[test]
    fn test_init_resets() {
        let mut seq: Sequence<3> = Sequence::new();
        let mut store = Values::<3>::new();
        seq.insert(&mut store, 1).unwrap();
        seq.insert(&mut store, 2).unwrap();

        seq.init();
        assert!(seq.is_empty());
        assert_eq!(seq.iter_free().count(), 3);
    }
}
