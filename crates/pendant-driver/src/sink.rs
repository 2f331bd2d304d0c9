//! 快照存储

use crate::error::DriverError;
use crate::state::Frame;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// 帧快照存储
///
/// 由处理线程调用（约每秒一次），失败只记录日志，不影响测量。
pub trait FrameSink: Send + Sync {
    fn save(&self, well_id: &str, frame: &Frame, last_st: Option<f64>) -> Result<(), DriverError>;
}

/// 丢弃所有快照
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl FrameSink for NullSink {
    fn save(&self, _well_id: &str, _frame: &Frame, _last_st: Option<f64>) -> Result<(), DriverError> {
        Ok(())
    }
}

/// 按孔位分目录保存 JPEG 快照
///
/// 路径格式：`<root>/<well_id>/<最近表面张力>_<unix 毫秒>.jpg`
#[derive(Debug, Clone)]
pub struct DirectorySink {
    root: PathBuf,
}

impl DirectorySink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn snapshot_path(&self, well_id: &str, last_st: Option<f64>) -> PathBuf {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        self.root
            .join(well_id)
            .join(format!("{:.2}_{}.jpg", last_st.unwrap_or(0.0), millis))
    }
}

impl FrameSink for DirectorySink {
    fn save(&self, well_id: &str, frame: &Frame, last_st: Option<f64>) -> Result<(), DriverError> {
        let path = self.snapshot_path(well_id, last_st);
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        frame.image.save(&path)?;
        tracing::trace!("Saved snapshot {}", path.display());
        Ok(())
    }
}
