//! 甲板坐标类型

use crate::ProtocolError;
use std::fmt;
use std::str::FromStr;

/// 孔位 ID：甲板位置 + 孔名
///
/// 文本形式为 `<location><well>`，例如甲板 2 号位的 `A1` 孔记为 `2A1`。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "String", into = "String"))]
pub struct WellId {
    pub location: u8,
    pub well: String,
}

impl WellId {
    pub fn new(location: u8, well: impl Into<String>) -> Self {
        Self {
            location,
            well: well.into(),
        }
    }

    /// 孔名的行字母（`A1` → `A`）
    pub fn row(&self) -> Option<char> {
        self.well.chars().next()
    }

    /// 孔名的列号（`A12` → 12）
    pub fn column(&self) -> Option<u32> {
        self.well.get(1..).and_then(|c| c.parse().ok())
    }
}

impl fmt::Display for WellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.location, self.well)
    }
}

impl FromStr for WellId {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
        let (location, well) = s.split_at(split);
        let location: u8 = location
            .parse()
            .map_err(|_| ProtocolError::InvalidWellId(s.to_string()))?;
        let mut chars = well.chars();
        let valid = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
            && chars.clone().next().is_some()
            && chars.all(|c| c.is_ascii_digit());
        if !valid {
            return Err(ProtocolError::InvalidWellId(s.to_string()));
        }
        Ok(Self::new(location, well))
    }
}

impl TryFrom<String> for WellId {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<WellId> for String {
    fn from(value: WellId) -> Self {
        value.to_string()
    }
}

/// 机器人坐标系中的一个孔：耗材 ID + 孔名
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WellLocation {
    pub labware_id: String,
    pub well: String,
}

impl WellLocation {
    pub fn new(labware_id: impl Into<String>, well: impl Into<String>) -> Self {
        Self {
            labware_id: labware_id.into(),
            well: well.into(),
        }
    }
}

impl fmt::Display for WellLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.labware_id, self.well)
    }
}

/// 相对孔位中心的偏移量（mm）
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Offset {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Offset {
    pub const ZERO: Offset = Offset {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// 逐分量相加
    pub fn add(self, other: Offset) -> Offset {
        Offset::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_well_id_parse() {
        let id: WellId = "2A1".parse().unwrap();
        assert_eq!(id.location, 2);
        assert_eq!(id.well, "A1");
        assert_eq!(id.row(), Some('A'));
        assert_eq!(id.column(), Some(1));
        assert_eq!(id.to_string(), "2A1");

        let id: WellId = "11H12".parse().unwrap();
        assert_eq!(id.location, 11);
        assert_eq!(id.column(), Some(12));
    }

    #[test]
    fn test_well_id_rejects_garbage() {
        assert!("A1".parse::<WellId>().is_err());
        assert!("2".parse::<WellId>().is_err());
        assert!("2A".parse::<WellId>().is_err());
        assert!("21A".parse::<WellId>().is_err());
        assert!("2AB".parse::<WellId>().is_err());
    }

    #[test]
    fn test_offset_add() {
        let o = Offset::new(-0.4, 1.0, 0.0).add(Offset::new(0.0, 0.0, 2.0));
        assert_eq!(o, Offset::new(-0.4, 1.0, 2.0));
    }
}
