//! 梯度稀释

use crate::error::PipetteError;
use crate::pipette::Pipette;
use crate::types::{MixSpec, Stroke};
use pendant_inventory::{Inventory, LiquidContainer};
use pendant_protocol::WellId;
use tracing::info;

/// 默认混匀次数
const DEFAULT_MIX_REPEATS: u32 = 3;

/// 梯度稀释方案
///
/// 每孔先加入 `diluent_volume_ul` 稀释液，再从原液转移 `well_volume_ul` 到第 1 孔，
/// 依次 i → i+1 转移并混匀，最后从末孔弃去 `well_volume_ul`，使每孔体积相同。
/// 每一步的稀释比为 `well_volume / (well_volume + diluent_volume)`。
#[derive(Debug, Clone, PartialEq)]
pub struct DilutionPlan {
    /// 行 ID，例如 `2A` 表示 `2A1..2An`
    pub row_id: String,
    /// 原液溶液名
    pub solution: String,
    pub n_steps: usize,
    pub well_volume_ul: f64,
    /// 每孔预加的稀释液体积，默认等于 `well_volume_ul`
    pub diluent_volume_ul: Option<f64>,
    pub diluent: String,
    pub mix_repeats: u32,
}

impl DilutionPlan {
    pub fn new(
        row_id: impl Into<String>,
        solution: impl Into<String>,
        n_steps: usize,
        well_volume_ul: f64,
    ) -> Self {
        Self {
            row_id: row_id.into(),
            solution: solution.into(),
            n_steps,
            well_volume_ul,
            diluent_volume_ul: None,
            diluent: "water".to_string(),
            mix_repeats: DEFAULT_MIX_REPEATS,
        }
    }

    pub fn with_diluent_volume(mut self, volume_ul: f64) -> Self {
        self.diluent_volume_ul = Some(volume_ul);
        self
    }

    pub fn with_diluent(mut self, diluent: impl Into<String>) -> Self {
        self.diluent = diluent.into();
        self
    }

    pub fn with_mix_repeats(mut self, repeats: u32) -> Self {
        self.mix_repeats = repeats;
        self
    }

    pub fn diluent_volume(&self) -> f64 {
        self.diluent_volume_ul.unwrap_or(self.well_volume_ul)
    }

    /// 每一步的浓度比
    pub fn dilution_factor(&self) -> f64 {
        self.well_volume_ul / (self.well_volume_ul + self.diluent_volume())
    }

    fn validate(&self) -> Result<(), PipetteError> {
        if self.n_steps == 0 {
            return Err(PipetteError::InvalidPlan("n_steps must be at least 1".into()));
        }
        let positive = |v: f64| v.is_finite() && v > 0.0;
        if !positive(self.well_volume_ul) || !positive(self.diluent_volume()) {
            return Err(PipetteError::InvalidPlan(format!(
                "volumes must be positive (well {:.2} uL, diluent {:.2} uL)",
                self.well_volume_ul,
                self.diluent_volume()
            )));
        }
        Ok(())
    }
}

impl Pipette {
    /// 执行梯度稀释，返回按顺序排列的稀释孔
    ///
    /// 稀释液和原液各用一个枪头，结束时丢弃枪头。
    pub fn serial_dilution(
        &mut self,
        inventory: &mut Inventory,
        plan: &DilutionPlan,
    ) -> Result<Vec<WellId>, PipetteError> {
        plan.validate()?;
        let wells = inventory.row_wells(&plan.row_id, plan.n_steps)?;
        let find = |solution: &str| {
            inventory.find_solution(solution).cloned().ok_or_else(|| {
                PipetteError::InvalidPlan(format!("no container holds '{solution}'"))
            })
        };
        let stock = find(&plan.solution)?;
        let diluent = find(&plan.diluent)?;
        let trash = inventory.trash_id()?.clone();

        let needed_ul = plan.well_volume_ul + plan.diluent_volume();
        for well in &wells {
            let container = inventory.get(well)?;
            if container.volume_ul() + needed_ul > container.max_volume_ul() {
                return Err(PipetteError::InvalidPlan(format!(
                    "{} cannot hold {:.2} uL",
                    well, needed_ul
                )));
            }
        }

        {
            let _guard = inventory.span().enter();
            info!(
                "Serial dilution of {} into {} x {} (factor {:.3})",
                plan.solution,
                plan.row_id,
                plan.n_steps,
                plan.dilution_factor()
            );
        }

        // 稀释液
        if !self.has_tip() {
            self.pick_up_tip()?;
        }
        for well in &wells {
            self.transfer(inventory, plan.diluent_volume(), &diluent, well, None)?;
        }
        self.drop_tip()?;

        // 原液 → 第 1 孔 → ... → 第 n 孔
        self.pick_up_tip()?;
        let mix = Some(MixSpec::new(plan.well_volume_ul, plan.mix_repeats));
        self.transfer(inventory, plan.well_volume_ul, &stock, &wells[0], mix)?;
        for pair in wells.windows(2) {
            self.transfer(inventory, plan.well_volume_ul, &pair[0], &pair[1], mix)?;
        }

        // 末孔多出的体积弃入废液桶
        let last = &wells[wells.len() - 1];
        let mut remaining_ul = plan.well_volume_ul;
        while remaining_ul > 0.0 {
            let step_ul = remaining_ul.min(self.free_volume_ul());
            if step_ul <= 0.0 {
                return Err(PipetteError::Overcapacity {
                    requested: remaining_ul,
                    held: self.volume_ul() + self.air_gap_ul(),
                    max: self.max_volume_ul(),
                });
            }
            self.aspirate(step_ul, inventory.get_mut(last)?, Stroke::default())?;
            self.dispense(step_ul, inventory.get_mut(&trash)?, Stroke::default())?;
            remaining_ul -= step_ul;
        }
        self.drop_tip()?;

        let _guard = inventory.span().enter();
        info!("Serial dilution of {} finished", plan.solution);
        Ok(wells)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipette::tests::setup;
    use crate::types::PipetteModel;
    use approx::assert_relative_eq;
    use pendant_hal::mock::CommandKind;
    use pendant_protocol::Concentration;

    #[test]
    fn test_plan_defaults() {
        let plan = DilutionPlan::new("2A", "SDS", 4, 100.0);
        assert_eq!(plan.diluent_volume(), 100.0);
        assert_relative_eq!(plan.dilution_factor(), 0.5);

        let plan = plan.with_diluent_volume(300.0);
        assert_relative_eq!(plan.dilution_factor(), 0.25);
    }

    #[test]
    fn test_serial_dilution_equal_volumes() {
        let (robot, mut inventory, mut pipette) = setup("right", PipetteModel::P1000SingleGen2);
        let plan = DilutionPlan::new("2A", "SDS", 4, 100.0);
        let wells = pipette.serial_dilution(&mut inventory, &plan).unwrap();

        assert_eq!(wells.len(), 4);
        let expected = [5.0, 2.5, 1.25, 0.625];
        for (well, expected) in wells.iter().zip(expected) {
            let container = inventory.get(well).unwrap();
            assert_relative_eq!(container.volume_ul(), 100.0, epsilon = 1e-9);
            assert_eq!(container.contents().solution.as_deref(), Some("SDS"));
            let Concentration::Quantified(c) = container.contents().concentration else {
                panic!("{well} concentration not quantified");
            };
            assert_relative_eq!(c, expected, epsilon = 1e-9);
        }

        // 原液和稀释液的消耗
        let stock = inventory.get(&"3A2".parse().unwrap()).unwrap();
        assert_relative_eq!(stock.volume_ul(), 4900.0);
        let water = inventory.get(&"3A1".parse().unwrap()).unwrap();
        assert_relative_eq!(water.volume_ul(), 12000.0 - 400.0);

        assert_eq!(robot.count(CommandKind::PickUpTip), 2);
        assert_eq!(robot.count(CommandKind::DropTip), 2);
        assert_eq!(robot.count_at(CommandKind::Dispense, "trash"), 1);
        assert!(!pipette.has_tip());
    }

    #[test]
    fn test_serial_dilution_rejects_bad_plans() {
        let (robot, mut inventory, mut pipette) = setup("right", PipetteModel::P1000SingleGen2);

        let unknown = DilutionPlan::new("2A", "CTAB", 3, 100.0);
        assert!(matches!(
            pipette.serial_dilution(&mut inventory, &unknown),
            Err(PipetteError::InvalidPlan(_))
        ));

        let too_much = DilutionPlan::new("2A", "SDS", 3, 200.0);
        assert!(matches!(
            pipette.serial_dilution(&mut inventory, &too_much),
            Err(PipetteError::InvalidPlan(_))
        ));

        let empty = DilutionPlan::new("2A", "SDS", 0, 100.0);
        assert!(pipette.serial_dilution(&mut inventory, &empty).is_err());

        // 校验失败时不下发任何命令
        assert!(robot.commands().is_empty());
    }
}
