//! 甲板布局与库存
//!
//! 布局文件（TOML）描述耗材、初始液体、枪头盒和海绵；
//! [`Inventory::from_layout`] 一次性创建所有容器，此后容器只会被吸液/分液修改。
//!
//! # 示例
//!
//! ```toml
//! [[labware]]
//! id = "plate"
//! name = "corning_96_wellplate_360ul_flat"
//! location = 2
//! geometry = "plate_well"
//! max_volume_ul = 360.0
//! depth_mm = 10.67
//! well_diameter_mm = 6.96
//!
//! [[labware]]
//! id = "stage"
//! name = "drop_stage"
//! location = 9
//! geometry = "drop_stage"
//! depth_mm = 40.0
//!
//! [[containers]]
//! labware = "plate"
//! well = "A1"
//! solution = "SDS"
//! concentration = { quantified = 10.0 }
//! volume_ul = 300.0
//! ```

use crate::InventoryError;
use crate::container::{Container, LiquidContainer};
use crate::geometry::Geometry;
use crate::stations::{Sponge, TipRack, standard_96_order};
use pendant_protocol::{Concentration, Contents, WellId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{Span, info};

/// 耗材描述
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabwareSpec {
    /// 机器人侧的耗材 ID
    pub id: String,
    /// 耗材型号名
    pub name: String,
    /// 甲板位置
    pub location: u8,
    pub geometry: Geometry,
    #[serde(default)]
    pub max_volume_ul: f64,
    #[serde(default)]
    pub depth_mm: f64,
    #[serde(default)]
    pub well_diameter_mm: f64,
    /// 预先创建的空孔；孔板默认 96 孔，工位默认 `A1`，其余默认不创建
    #[serde(default)]
    pub wells: Option<Vec<String>>,
}

impl LabwareSpec {
    fn default_wells(&self) -> Vec<String> {
        match &self.wells {
            Some(wells) => wells.clone(),
            None if self.geometry == Geometry::PlateWell => standard_96_order(),
            None if self.geometry.is_pass_through() => vec!["A1".to_string()],
            None => Vec::new(),
        }
    }
}

/// 初始液体
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerSpec {
    pub labware: String,
    pub well: String,
    #[serde(default)]
    pub solution: Option<String>,
    #[serde(default)]
    pub concentration: Concentration,
    #[serde(default)]
    pub volume_ul: f64,
}

/// 枪头盒（按移液枪挂载位分配）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TipRackSpec {
    /// 使用该枪头盒的移液枪挂载位（`left` / `right`）
    pub mount: String,
    pub labware_id: String,
    #[serde(default)]
    pub wells: Option<Vec<String>>,
    #[serde(default)]
    pub start_index: usize,
}

/// 海绵
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpongeSpec {
    pub labware_id: String,
    pub wells: Vec<String>,
}

/// 布局文件
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Layout {
    #[serde(default)]
    pub labware: Vec<LabwareSpec>,
    #[serde(default)]
    pub containers: Vec<ContainerSpec>,
    #[serde(default)]
    pub tip_racks: Vec<TipRackSpec>,
    #[serde(default)]
    pub sponge: Option<SpongeSpec>,
}

impl Layout {
    pub fn from_toml_str(s: &str) -> Result<Self, InventoryError> {
        Ok(toml::from_str(s)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, InventoryError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}

/// 甲板上的全部库存
#[derive(Debug)]
pub struct Inventory {
    labware: BTreeMap<String, LabwareSpec>,
    containers: BTreeMap<WellId, Container>,
    drop_stage: Option<WellId>,
    light_holder: Option<WellId>,
    trash: Option<WellId>,
    sponge: Option<Sponge>,
    tip_racks: BTreeMap<String, TipRack>,
    span: Span,
}

impl Inventory {
    /// 从布局构建库存
    pub fn from_layout(layout: &Layout) -> Result<Self, InventoryError> {
        Self::from_layout_with_span(layout, tracing::info_span!("inventory"))
    }

    /// 从布局构建库存，所有容器的日志挂在 `span` 之下
    pub fn from_layout_with_span(layout: &Layout, span: Span) -> Result<Self, InventoryError> {
        let mut inventory = Inventory {
            labware: BTreeMap::new(),
            containers: BTreeMap::new(),
            drop_stage: None,
            light_holder: None,
            trash: None,
            sponge: None,
            tip_racks: BTreeMap::new(),
            span,
        };

        let mut locations = BTreeMap::new();
        for spec in &layout.labware {
            if let Some(other) = locations.insert(spec.location, spec.id.clone()) {
                return Err(InventoryError::InvalidLayout(format!(
                    "labware '{}' and '{}' share deck location {}",
                    other, spec.id, spec.location
                )));
            }
            if inventory
                .labware
                .insert(spec.id.clone(), spec.clone())
                .is_some()
            {
                return Err(InventoryError::InvalidLayout(format!(
                    "duplicate labware id '{}'",
                    spec.id
                )));
            }
            for well in spec.default_wells() {
                let container = inventory.new_container(spec, &well);
                let id = container.well_id().clone();
                let station = match spec.geometry {
                    Geometry::DropStage => Some(&mut inventory.drop_stage),
                    Geometry::LightHolder => Some(&mut inventory.light_holder),
                    Geometry::Trash => Some(&mut inventory.trash),
                    _ => None,
                };
                if let Some(slot) = station
                    && slot.is_none()
                {
                    *slot = Some(id.clone());
                }
                inventory.containers.insert(id, container);
            }
        }

        for entry in &layout.containers {
            let spec = inventory
                .labware
                .get(&entry.labware)
                .ok_or_else(|| InventoryError::UnknownLabware(entry.labware.clone()))?
                .clone();
            let contents = match &entry.solution {
                Some(solution) => Contents::new(solution.clone(), entry.concentration),
                None => Contents::empty(),
            };
            let container = inventory
                .new_container(&spec, &entry.well)
                .with_initial(contents, entry.volume_ul)?;
            let id = container.well_id().clone();
            let preexisting = inventory
                .containers
                .get(&id)
                .is_some_and(|c| !c.contents().is_empty());
            if preexisting {
                return Err(InventoryError::DuplicateWell(id.to_string()));
            }
            inventory.containers.insert(id, container);
        }

        for rack in &layout.tip_racks {
            let order = rack.wells.clone().unwrap_or_else(standard_96_order);
            let tip_rack = TipRack::new(rack.labware_id.clone(), order)?.starting_at(rack.start_index);
            inventory.tip_racks.insert(rack.mount.clone(), tip_rack);
        }

        if let Some(sponge) = &layout.sponge {
            inventory.sponge = Some(Sponge::new(sponge.labware_id.clone(), sponge.wells.clone())?);
        }

        inventory.span.in_scope(|| {
            info!(
                "Inventory loaded: {} labware, {} containers, {} tip racks",
                inventory.labware.len(),
                inventory.containers.len(),
                inventory.tip_racks.len()
            );
        });
        Ok(inventory)
    }

    fn new_container(&self, spec: &LabwareSpec, well: &str) -> Container {
        let id = WellId::new(spec.location, well);
        let span = tracing::info_span!(parent: &self.span, "container", well = %id);
        Container::new(
            id,
            spec.id.clone(),
            spec.name.clone(),
            spec.geometry,
            spec.max_volume_ul,
            spec.depth_mm,
            spec.well_diameter_mm,
        )
        .with_span(span)
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn labware(&self, id: &str) -> Option<&LabwareSpec> {
        self.labware.get(id)
    }

    pub fn get(&self, id: &WellId) -> Result<&Container, InventoryError> {
        self.containers
            .get(id)
            .ok_or_else(|| InventoryError::UnknownWell(id.to_string()))
    }

    pub fn get_mut(&mut self, id: &WellId) -> Result<&mut Container, InventoryError> {
        self.containers
            .get_mut(id)
            .ok_or_else(|| InventoryError::UnknownWell(id.to_string()))
    }

    pub fn containers(&self) -> impl Iterator<Item = &Container> {
        self.containers.values()
    }

    /// 含有指定溶液、体积最大的容器（水大小写不敏感）
    pub fn find_solution(&self, solution: &str) -> Option<&WellId> {
        let wanted = Contents::new(solution, Concentration::Unknown);
        self.containers
            .values()
            .filter(|c| !c.geometry().is_pass_through())
            .filter(|c| c.contents().same_solution(&wanted) && c.volume_ul() > 0.0)
            .max_by(|a, b| a.volume_ul().total_cmp(&b.volume_ul()))
            .map(|c| c.well_id())
    }

    /// 某一行连续的 `n` 个孔（`row_id` 形如 `2A`，对应 `2A1..2An`）
    pub fn row_wells(&self, row_id: &str, n: usize) -> Result<Vec<WellId>, InventoryError> {
        (1..=n)
            .map(|col| {
                let id: WellId = format!("{row_id}{col}")
                    .parse()
                    .map_err(|_| InventoryError::UnknownWell(format!("{row_id}{col}")))?;
                self.get(&id)?;
                Ok(id)
            })
            .collect()
    }

    pub fn drop_stage_id(&self) -> Result<&WellId, InventoryError> {
        self.drop_stage
            .as_ref()
            .ok_or(InventoryError::MissingStation("drop stage"))
    }

    pub fn light_holder_id(&self) -> Result<&WellId, InventoryError> {
        self.light_holder
            .as_ref()
            .ok_or(InventoryError::MissingStation("light holder"))
    }

    pub fn trash_id(&self) -> Result<&WellId, InventoryError> {
        self.trash
            .as_ref()
            .ok_or(InventoryError::MissingStation("trash"))
    }

    pub fn sponge_mut(&mut self) -> Result<&mut Sponge, InventoryError> {
        self.sponge
            .as_mut()
            .ok_or(InventoryError::MissingStation("sponge"))
    }

    /// 取出分配给某挂载位的枪头盒（移液枪持有其所有权）
    pub fn take_tip_rack(&mut self, mount: &str) -> Option<TipRack> {
        self.tip_racks.remove(mount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LAYOUT: &str = r#"
[[labware]]
id = "plate"
name = "corning_96_wellplate_360ul_flat"
location = 2
geometry = "plate_well"
max_volume_ul = 360.0
depth_mm = 10.67
well_diameter_mm = 6.96

[[labware]]
id = "tubes"
name = "opentrons_15_tuberack_falcon_15ml"
location = 3
geometry = "falcon_tube15"
max_volume_ul = 15000.0
depth_mm = 117.5
well_diameter_mm = 15.25

[[labware]]
id = "stage"
name = "drop_stage"
location = 9
geometry = "drop_stage"
depth_mm = 40.0

[[labware]]
id = "trash"
name = "fixed_trash"
location = 12
geometry = "trash"

[[containers]]
labware = "tubes"
well = "A1"
solution = "Water"
concentration = "pure"
volume_ul = 12000.0

[[containers]]
labware = "tubes"
well = "A2"
solution = "SDS"
concentration = { quantified = 10.0 }
volume_ul = 5000.0

[[tip_racks]]
mount = "right"
labware_id = "tips_1000"

[sponge]
labware_id = "sponge"
wells = ["A1", "A2", "A3"]
"#;

    #[test]
    fn test_from_layout() {
        let layout = Layout::from_toml_str(LAYOUT).unwrap();
        let mut inventory = Inventory::from_layout(&layout).unwrap();

        // 96 孔板 + 2 个离心管 + 液滴台 + 废液桶
        assert_eq!(inventory.containers().count(), 96 + 2 + 2);
        assert_eq!(inventory.drop_stage_id().unwrap().to_string(), "9A1");
        assert_eq!(inventory.trash_id().unwrap().to_string(), "12A1");
        assert!(inventory.light_holder_id().is_err());

        let stock = inventory.get(&"3A2".parse().unwrap()).unwrap();
        assert_eq!(stock.contents().concentration, Concentration::Quantified(10.0));
        assert_eq!(stock.volume_ul(), 5000.0);

        let well = inventory.get(&"2H12".parse().unwrap()).unwrap();
        assert!(well.contents().is_empty());

        assert!(inventory.take_tip_rack("right").is_some());
        assert!(inventory.take_tip_rack("right").is_none());
        assert_eq!(inventory.sponge_mut().unwrap().current_well().well, "A1");
    }

    #[test]
    fn test_find_solution_and_rows() {
        let layout = Layout::from_toml_str(LAYOUT).unwrap();
        let inventory = Inventory::from_layout(&layout).unwrap();
        assert_eq!(inventory.find_solution("water").unwrap().to_string(), "3A1");
        assert_eq!(inventory.find_solution("SDS").unwrap().to_string(), "3A2");
        assert!(inventory.find_solution("CTAB").is_none());

        let row = inventory.row_wells("2B", 4).unwrap();
        let names: Vec<String> = row.iter().map(|w| w.to_string()).collect();
        assert_eq!(names, ["2B1", "2B2", "2B3", "2B4"]);
        assert!(inventory.row_wells("2B", 13).is_err());
    }

    #[test]
    fn test_layout_errors() {
        let mut layout = Layout::from_toml_str(LAYOUT).unwrap();
        layout.containers[0].labware = "nowhere".into();
        assert!(matches!(
            Inventory::from_layout(&layout),
            Err(InventoryError::UnknownLabware(_))
        ));

        let mut layout = Layout::from_toml_str(LAYOUT).unwrap();
        layout.containers[1].volume_ul = 20_000.0;
        assert!(matches!(
            Inventory::from_layout(&layout),
            Err(InventoryError::Overflow { .. })
        ));

        let mut layout = Layout::from_toml_str(LAYOUT).unwrap();
        layout.labware[1].location = 2;
        assert!(matches!(
            Inventory::from_layout(&layout),
            Err(InventoryError::InvalidLayout(_))
        ));

        assert!(Layout::from_toml_str("labware = 3").is_err());
    }

    #[test]
    fn test_mutation_through_inventory() {
        let layout = Layout::from_toml_str(LAYOUT).unwrap();
        let mut inventory = Inventory::from_layout(&layout).unwrap();
        let id: WellId = "2A1".parse().unwrap();
        let water = Contents::water();
        inventory.get_mut(&id).unwrap().dispense(200.0, &water).unwrap();
        assert_eq!(inventory.get(&id).unwrap().volume_ul(), 200.0);
        assert!(inventory.get_mut(&id).unwrap().dispense(200.0, &water).is_err());
    }
}
