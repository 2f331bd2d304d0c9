//! 布局检查

use anyhow::{Context, Result};
use clap::Args;
use pendant_sdk::prelude::*;
use std::path::PathBuf;

/// 布局检查参数
#[derive(Args, Debug)]
pub struct LayoutCommand {
    /// 布局文件（TOML）
    pub layout: PathBuf,

    /// 同时列出空容器
    #[arg(long)]
    pub all: bool,
}

impl LayoutCommand {
    pub fn execute(&self) -> Result<()> {
        let layout = Layout::load(&self.layout)
            .with_context(|| format!("failed to load {}", self.layout.display()))?;
        let mut inventory = Inventory::from_layout(&layout)?;

        println!("🧪 耗材 ({}):", layout.labware.len());
        for labware in &layout.labware {
            println!(
                "  [{}] {} ({}, {:?})",
                labware.location, labware.id, labware.name, labware.geometry
            );
        }

        println!("💧 容器:");
        for container in inventory.containers() {
            if !self.all && container.volume_ul() <= 0.0 {
                continue;
            }
            println!(
                "  {:<6} {:<12} {:<10} {:>9.1} / {:.1} uL",
                container.well_id().to_string(),
                container.contents().label(),
                concentration_label(container.contents()),
                container.volume_ul(),
                container.max_volume_ul()
            );
        }

        let mut problems = Vec::new();
        if let Err(e) = inventory.drop_stage_id() {
            problems.push(e.to_string());
        }
        if let Err(e) = inventory.trash_id() {
            problems.push(e.to_string());
        }
        if let Err(e) = inventory.sponge_mut() {
            problems.push(e.to_string());
        }
        for spec in &layout.tip_racks {
            match inventory.take_tip_rack(&spec.mount) {
                Some(rack) => println!(
                    "🔧 {} 枪头盒 {}: 剩余 {}",
                    spec.mount,
                    rack.labware_id(),
                    rack.remaining()
                ),
                None => problems.push(format!("tip rack for mount {} missing", spec.mount)),
            }
        }

        if problems.is_empty() {
            println!("✅ 布局完整");
            Ok(())
        } else {
            for problem in &problems {
                println!("❌ {problem}");
            }
            anyhow::bail!("layout {} is incomplete", self.layout.display())
        }
    }
}

fn concentration_label(contents: &Contents) -> String {
    if contents.is_empty() {
        "-".to_string()
    } else {
        contents.concentration.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LAYOUT: &str = r#"
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
solution = "water"
concentration = "pure"
volume_ul = 12000.0

[[tip_racks]]
mount = "left"
labware_id = "tips_20"

[sponge]
labware_id = "sponge"
wells = ["A1"]
"#;

    fn command(text: &str) -> (tempfile::TempDir, LayoutCommand) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("layout.toml");
        std::fs::write(&path, text).unwrap();
        (dir, LayoutCommand { layout: path, all: false })
    }

    #[test]
    fn test_complete_layout_passes() {
        let (_dir, cmd) = command(LAYOUT);
        cmd.execute().unwrap();
    }

    #[test]
    fn test_missing_sponge_fails() {
        let text = LAYOUT.replace("[sponge]\nlabware_id = \"sponge\"\nwells = [\"A1\"]\n", "");
        let (_dir, cmd) = command(&text);
        assert!(cmd.execute().is_err());
    }
}
