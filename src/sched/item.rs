//! 调度项与槽位表
//!
//! 生产者构造 [`ItemRequest`] (借用自己的负载缓冲区), 调度器把它按值
//! 复制进 [`SlotTable`] 的固定槽位。`add_item` 返回后调用方的缓冲区
//! 即可复用。

use core::ops::Index;

use heapless::Vec;

use super::error::SchedulerError;
use super::sequence::SlotStore;
use crate::config::MAX_PAYLOAD_SIZE;

/// 到期回调, 参数为负载字节 (长度即切片长度)
pub type ItemCallback = fn(&[u8]);

/// 空槽标记时间戳
pub const EMPTY_TIMESTAMP: u32 = 0;

/// 生产者提交的调度请求
#[derive(Clone, Copy)]
pub struct ItemRequest<'a> {
    /// 触发时刻 (epoch 秒), 0 保留
    pub timestamp: u32,
    /// 同一时刻内, 数值越大越先触发
    pub priority: u8,
    /// 到期回调
    pub callback: ItemCallback,
    /// 负载
    pub data: &'a [u8],
}

impl<'a> ItemRequest<'a> {
    pub const fn new(timestamp: u32, priority: u8, callback: ItemCallback, data: &'a [u8]) -> Self {
        Self {
            timestamp,
            priority,
            callback,
            data,
        }
    }

    /// 检查时间戳与负载长度
    ///
    /// 只有通过检查的请求才能写入 [`SlotTable`]。
    pub fn validate(&self) -> Result<ValidatedItem<'_>, SchedulerError> {
        if self.timestamp == EMPTY_TIMESTAMP {
            return Err(SchedulerError::InvalidArgs);
        }
        if self.data.len() > MAX_PAYLOAD_SIZE {
            return Err(SchedulerError::DataTooLong);
        }
        Ok(ValidatedItem { req: self })
    }
}

/// 已通过 [`ItemRequest::validate`] 的请求
///
/// 只能由 `validate` 构造, 负载长度保证不超过 `MAX_PAYLOAD_SIZE`。
#[derive(Clone, Copy)]
pub struct ValidatedItem<'r> {
    req: &'r ItemRequest<'r>,
}

impl<'r> ValidatedItem<'r> {
    #[inline]
    pub fn timestamp(&self) -> u32 {
        self.req.timestamp
    }

    #[inline]
    pub fn priority(&self) -> u8 {
        self.req.priority
    }
}

/// 槽位中保存的调度项
#[derive(Clone)]
pub struct ScheduledItem {
    pub timestamp: u32,
    pub priority: u8,
    pub callback: Option<ItemCallback>,
    pub data: Vec<u8, MAX_PAYLOAD_SIZE>,
}

impl ScheduledItem {
    /// 空槽
    pub const EMPTY: Self = Self {
        timestamp: EMPTY_TIMESTAMP,
        priority: 0,
        callback: None,
        data: Vec::new(),
    };

    /// 负载长度
    #[inline]
    pub fn data_len(&self) -> usize {
        self.data.len()
    }
}

/// 固定槽位表, 为 `Sequence` 提供存储与排序
pub struct SlotTable<const N: usize> {
    slots: [ScheduledItem; N],
}

impl<const N: usize> SlotTable<N> {
    /// 全部清零
    pub const fn new() -> Self {
        Self {
            slots: [ScheduledItem::EMPTY; N],
        }
    }

    /// 清零全部槽位
    pub fn clear(&mut self) {
        for slot in self.slots.iter_mut() {
            *slot = ScheduledItem::EMPTY;
        }
    }

    /// 读取槽位
    #[inline]
    pub fn get(&self, slot: usize) -> Option<&ScheduledItem> {
        self.slots.get(slot)
    }
}

impl<const N: usize> Index<usize> for SlotTable<N> {
    type Output = ScheduledItem;

    #[inline]
    fn index(&self, slot: usize) -> &ScheduledItem {
        &self.slots[slot]
    }
}

impl<const N: usize> Default for SlotTable<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> SlotStore for SlotTable<N> {
    type Item<'a> = ValidatedItem<'a>;

    fn store(&mut self, item: Self::Item<'_>, slot: usize) {
        let req = item.req;
        let dst = &mut self.slots[slot];
        dst.timestamp = req.timestamp;
        dst.priority = req.priority;
        dst.callback = Some(req.callback);
        dst.data.clear();
        // ValidatedItem 保证容量足够
        let copied = dst.data.extend_from_slice(req.data);
        debug_assert!(copied.is_ok(), "validated payload exceeds slot capacity");
    }

    fn goes_before(&self, a: usize, b: usize) -> bool {
        let (a, b) = (&self.slots[a], &self.slots[b]);
        a.timestamp < b.timestamp || (a.timestamp == b.timestamp && a.priority > b.priority)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_: &[u8]) {}

    #[test]
    fn test_validate() {
        let big = [0u8; MAX_PAYLOAD_SIZE + 1];
        let max = [0u8; MAX_PAYLOAD_SIZE];

        assert_eq!(ItemRequest::new(0, 1, noop, &[]).validate().err(), Some(SchedulerError::InvalidArgs));
        assert_eq!(ItemRequest::new(10, 1, noop, &big).validate().err(), Some(SchedulerError::DataTooLong));
        assert!(ItemRequest::new(10, 1, noop, &max).validate().is_ok());
        assert!(ItemRequest::new(10, 1, noop, &[]).validate().is_ok());
    }

    #[test]
    fn test_store_copies_payload() {
        let mut table = SlotTable::<2>::new();
        let mut payload = [1u8, 2, 3];
        let req = ItemRequest::new(100, 5, noop, &payload);

        table.store(req.validate().unwrap(), 1);
        payload[0] = 9;

        let item = table.get(1).unwrap();
        assert_eq!(item.timestamp, 100);
        assert_eq!(item.priority, 5);
        assert_eq!(item.data.as_slice(), &[1, 2, 3]);
        assert!(item.callback.is_some());
    }

    #[test]
    fn test_store_overwrites_previous_payload() {
        let mut table = SlotTable::<1>::new();
        table.store(ItemRequest::new(1, 0, noop, &[7, 7, 7, 7]).validate().unwrap(), 0);
        table.store(ItemRequest::new(2, 0, noop, &[]).validate().unwrap(), 0);
        assert_eq!(table.get(0).unwrap().data_len(), 0);
    }

    #[test]
    fn test_goes_before() {
        let mut table = SlotTable::<4>::new();
        let reqs = [
            ItemRequest::new(100, 5, noop, &[]),
            ItemRequest::new(100, 9, noop, &[]),
            ItemRequest::new(50, 1, noop, &[]),
            ItemRequest::new(100, 5, noop, &[]),
        ];
        for (slot, req) in reqs.iter().enumerate() {
            table.store(req.validate().unwrap(), slot);
        }

        // 时间戳优先
        assert!(table.goes_before(2, 0));
        assert!(!table.goes_before(0, 2));
        // 同一时刻高优先级在前
        assert!(table.goes_before(1, 0));
        assert!(!table.goes_before(0, 1));
        // 完全相等: 严格序, 双向都为 false
        assert!(!table.goes_before(0, 3));
        assert!(!table.goes_before(3, 0));
    }

    #[test]
    fn test_max_payload_stored_whole_through_sequence() {
        use crate::sched::sequence::Sequence;

        let mut seq: Sequence<2> = Sequence::new();
        let mut table = SlotTable::<2>::new();
        let max = [0x5Au8; MAX_PAYLOAD_SIZE];
        let req = ItemRequest::new(10, 0, noop, &max);

        let slot = seq.insert(&mut table, req.validate().unwrap()).unwrap();
        assert_eq!(table[slot].data.as_slice(), &max[..]);

        // 超长负载拿不到 ValidatedItem, 也就无法写入槽位
        let big = [0u8; MAX_PAYLOAD_SIZE + 1];
        assert!(ItemRequest::new(10, 0, noop, &big).validate().is_err());
    }
}
