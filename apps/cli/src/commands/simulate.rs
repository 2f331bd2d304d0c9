//! 无硬件的完整实验
//!
//! 使用 mock 机器人和合成悬滴相机，按实验配置执行：可选的梯度稀释 → 逐孔测量 → 结果表。

use super::{SyntheticArgs, install_ctrlc, load_experiment};
use anyhow::{Context, Result, anyhow};
use clap::Args;
use pendant_sdk::hal::mock::MockRobot;
use pendant_sdk::prelude::*;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::Ordering;

/// 梯度稀释参数：`<row>:<solution>:<steps>:<well_volume_ul>`
#[derive(Debug, Clone, PartialEq)]
pub struct DilutionArg {
    pub row_id: String,
    pub solution: String,
    pub n_steps: usize,
    pub well_volume_ul: f64,
}

impl FromStr for DilutionArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        let [row_id, solution, n_steps, well_volume_ul] = parts.as_slice() else {
            return Err(format!(
                "expected <row>:<solution>:<steps>:<volume>, got '{s}'"
            ));
        };
        let n_steps = n_steps
            .parse::<usize>()
            .map_err(|e| format!("invalid step count '{n_steps}': {e}"))?;
        let well_volume_ul = well_volume_ul
            .parse::<f64>()
            .map_err(|e| format!("invalid volume '{well_volume_ul}': {e}"))?;
        Ok(Self {
            row_id: row_id.to_string(),
            solution: solution.to_string(),
            n_steps,
            well_volume_ul,
        })
    }
}

impl DilutionArg {
    fn plan(&self) -> DilutionPlan {
        DilutionPlan::new(
            self.row_id.clone(),
            self.solution.clone(),
            self.n_steps,
            self.well_volume_ul,
        )
    }
}

/// 模拟命令参数
#[derive(Args, Debug)]
pub struct SimulateCommand {
    /// 实验配置文件（TOML）
    #[arg(short, long)]
    pub config: PathBuf,

    /// 先做梯度稀释，例如 `2A:SDS:6:100`；稀释出的孔依次测量
    #[arg(long)]
    pub dilute: Option<DilutionArg>,

    /// 额外测量的孔，例如 `3A1,3A2`
    #[arg(short, long, value_delimiter = ',')]
    pub wells: Vec<WellId>,

    /// 固定液滴体积（µL）；不指定时按已有结果建议
    #[arg(long)]
    pub drop_volume: Option<f64>,

    /// 保存标注帧
    #[arg(long)]
    pub save_frames: bool,

    #[command(flatten)]
    pub synthetic: SyntheticArgs,
}

impl SimulateCommand {
    pub fn execute(&self) -> Result<()> {
        let running = install_ctrlc()?;
        let config = load_experiment(&self.config)?;
        let layout = Layout::load(&config.layout)
            .with_context(|| format!("failed to load {}", config.layout.display()))?;
        let mut inventory = Inventory::from_layout(&layout)?;
        let robot = Arc::new(MockRobot::new());

        println!("🧪 实验: {}", config.name);
        let mut wells = Vec::new();
        if let Some(dilution) = &self.dilute {
            let mount = config
                .dilution_pipette
                .clone()
                .unwrap_or_else(PipetteMount::right_p1000);
            let mut pipette = build_pipette(&mut inventory, robot.clone(), &mount)?
                .with_settings(config.pipette.clone());
            println!(
                "💧 梯度稀释 {} → {} x {}",
                dilution.solution, dilution.row_id, dilution.n_steps
            );
            wells = pipette.serial_dilution(&mut inventory, &dilution.plan())?;
        }
        wells.extend(self.wells.iter().cloned());
        if wells.is_empty() {
            anyhow::bail!("nothing to measure: pass --dilute or --wells");
        }

        let pipette = build_pipette(&mut inventory, robot.clone(), &config.drop_pipette)?
            .with_settings(config.pipette.clone());
        let analyzer = Arc::new(DropShapeAnalyzer::new(config.analyzer.clone())?);
        let mut camera = PendantDropCamera::new(self.synthetic.camera(), analyzer)
            .with_config(config.pipeline.clone());
        if self.save_frames {
            camera = camera.with_sink(Arc::new(frame_sink(&config)));
        }
        let mut manager = DropletManager::new(robot.clone(), pipette, camera, config.droplet.clone());
        let mut run = WellMeasurementRun::from_config(&config);

        for well in &wells {
            if !running.load(Ordering::SeqCst) {
                println!("⏹ 已中断，跳过剩余的孔");
                break;
            }
            let mut request = WellRequest::new(well.clone(), config.flow_rate_ul_s);
            if let Some(volume) = self.drop_volume {
                request = request.with_drop_volume(volume);
            }
            match run.measure_well(&mut manager, &mut inventory, &request) {
                Ok(Some(record)) => println!(
                    "✅ {} {} {}: γ = {:.2} mN/m（{:.2} uL，第 {} 滴）",
                    record.well_id,
                    record.solution,
                    record.concentration,
                    record.surface_tension_eq,
                    record.drop_volume_ul,
                    record.drop_count
                ),
                Ok(None) => println!("⚠️ {well}: 没有有效读数"),
                Err(e) => println!("❌ {well}: {e}"),
            }
        }

        if let Some(path) = run.save_results()? {
            println!("💾 结果已保存: {}", path.display());
        }
        println!("🤖 机器人命令 {} 条", robot.commands().len());
        Ok(())
    }
}

/// 快照与时间序列存放在同一个孔目录下：`<output_dir>/data/<well>/`
fn frame_sink(config: &ExperimentConfig) -> DirectorySink {
    DirectorySink::new(config.data_dir())
}

fn build_pipette(
    inventory: &mut Inventory,
    robot: Arc<MockRobot>,
    mount: &PipetteMount,
) -> Result<Pipette> {
    let tips = inventory
        .take_tip_rack(&mount.mount)
        .ok_or_else(|| anyhow!("no tip rack assigned to mount '{}'", mount.mount))?;
    Ok(Pipette::new(
        robot,
        mount.mount.clone(),
        mount.pipette_id.clone(),
        mount.model,
        tips,
    ))
}
