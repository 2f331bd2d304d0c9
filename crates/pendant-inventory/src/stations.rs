//! 工位：海绵清洗站与枪头盒

use crate::InventoryError;
use pendant_protocol::WellLocation;

/// 标准 96 孔板的孔位顺序（按列：A1, B1, ..., H1, A2, ...）
pub fn standard_96_order() -> Vec<String> {
    (1..=12)
        .flat_map(|col| ('A'..='H').map(move |row| format!("{row}{col}")))
        .collect()
}

/// 海绵清洗站
///
/// 每次使用后按轮转顺序切换到下一个孔，从不储液。
#[derive(Debug, Clone)]
pub struct Sponge {
    labware_id: String,
    wells: Vec<String>,
    index: usize,
    uses: u64,
}

impl Sponge {
    pub fn new(labware_id: impl Into<String>, wells: Vec<String>) -> Result<Self, InventoryError> {
        let labware_id = labware_id.into();
        if wells.is_empty() {
            return Err(InventoryError::EmptyStation(labware_id));
        }
        Ok(Self {
            labware_id,
            wells,
            index: 0,
            uses: 0,
        })
    }

    /// 当前清洗孔位
    pub fn current_well(&self) -> WellLocation {
        WellLocation::new(self.labware_id.clone(), self.wells[self.index].clone())
    }

    /// 切换到下一个孔（轮转）
    pub fn advance(&mut self) {
        self.index = (self.index + 1) % self.wells.len();
        self.uses += 1;
    }

    pub fn uses(&self) -> u64 {
        self.uses
    }
}

/// 枪头盒
///
/// 按 `order` 顺序取枪头，取完即耗尽（不会回绕）。
#[derive(Debug, Clone)]
pub struct TipRack {
    labware_id: String,
    order: Vec<String>,
    next: usize,
}

impl TipRack {
    pub fn new(labware_id: impl Into<String>, order: Vec<String>) -> Result<Self, InventoryError> {
        let labware_id = labware_id.into();
        if order.is_empty() {
            return Err(InventoryError::EmptyStation(labware_id));
        }
        Ok(Self {
            labware_id,
            order,
            next: 0,
        })
    }

    /// 标准 96 孔枪头盒
    pub fn standard_96(labware_id: impl Into<String>) -> Self {
        Self {
            labware_id: labware_id.into(),
            order: standard_96_order(),
            next: 0,
        }
    }

    /// 从第 `index` 个枪头开始（例如盒子已部分使用）
    pub fn starting_at(mut self, index: usize) -> Self {
        self.next = index.min(self.order.len());
        self
    }

    pub fn labware_id(&self) -> &str {
        &self.labware_id
    }

    /// 取出下一个枪头位置；耗尽返回 `None`
    pub fn take_next(&mut self) -> Option<WellLocation> {
        let well = self.order.get(self.next)?.clone();
        self.next += 1;
        Some(WellLocation::new(self.labware_id.clone(), well))
    }

    pub fn remaining(&self) -> usize {
        self.order.len() - self.next
    }

    pub fn next_index(&self) -> usize {
        self.next
    }
}
