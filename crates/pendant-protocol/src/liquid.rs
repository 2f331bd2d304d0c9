//! 溶液身份与浓度

use std::fmt;

/// 浓度（mM）
///
/// - `Unknown`: 无法追踪（例如两种不同溶液混合后）
/// - `Pure`: 纯液体（水等溶剂）
/// - `Quantified`: 已知浓度
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Concentration {
    #[default]
    Unknown,
    Pure,
    Quantified(f64),
}

impl Concentration {
    /// 数值浓度（仅 `Quantified` 有值）
    pub fn value(&self) -> Option<f64> {
        match self {
            Concentration::Quantified(c) => Some(*c),
            _ => None,
        }
    }

    /// 按比例稀释
    ///
    /// `Pure` 和 `Unknown` 保持不变。
    pub fn scaled(self, factor: f64) -> Self {
        match self {
            Concentration::Quantified(c) => Concentration::Quantified(c * factor),
            other => other,
        }
    }
}

impl fmt::Display for Concentration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Concentration::Unknown => write!(f, "unknown"),
            Concentration::Pure => write!(f, "pure"),
            Concentration::Quantified(c) => write!(f, "{c:.4} mM"),
        }
    }
}

/// 判断溶液名是否为水（大小写不敏感）
pub fn is_water(solution: &str) -> bool {
    solution.trim().eq_ignore_ascii_case("water")
}

/// 液体内容：溶液名 + 浓度
///
/// 从源容器吸取时被复制进枪头，随后随分液流入目标容器。
/// `solution == None` 表示空容器（或空枪头）。
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Contents {
    pub solution: Option<String>,
    pub concentration: Concentration,
}

impl Contents {
    /// 空内容
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(solution: impl Into<String>, concentration: Concentration) -> Self {
        Self {
            solution: Some(solution.into()),
            concentration,
        }
    }

    /// 纯水
    pub fn water() -> Self {
        Self::new("water", Concentration::Pure)
    }

    pub fn is_empty(&self) -> bool {
        self.solution.is_none()
    }

    pub fn is_water(&self) -> bool {
        self.solution.as_deref().is_some_and(is_water)
    }

    /// 溶液名是否相同（水大小写不敏感）
    pub fn same_solution(&self, other: &Contents) -> bool {
        match (self.solution.as_deref(), other.solution.as_deref()) {
            (Some(a), Some(b)) => a == b || (is_water(a) && is_water(b)),
            _ => false,
        }
    }

    /// 显示用溶液名（空容器显示为 `empty`）
    pub fn label(&self) -> &str {
        self.solution.as_deref().unwrap_or("empty")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_water_detection_is_case_insensitive() {
        assert!(is_water("Water"));
        assert!(is_water(" WATER "));
        assert!(!is_water("SDS"));
        assert!(Contents::new("WaTeR", Concentration::Pure).is_water());
    }

    #[test]
    fn test_same_solution() {
        let a = Contents::new("SDS", Concentration::Quantified(10.0));
        let b = Contents::new("SDS", Concentration::Quantified(2.0));
        let w = Contents::new("Water", Concentration::Pure);
        assert!(a.same_solution(&b));
        assert!(!a.same_solution(&w));
        assert!(w.same_solution(&Contents::water()));
        assert!(!Contents::empty().same_solution(&Contents::empty()));
    }

    #[test]
    fn test_scaled_keeps_pure_and_unknown() {
        assert_eq!(Concentration::Pure.scaled(0.5), Concentration::Pure);
        assert_eq!(Concentration::Unknown.scaled(0.5), Concentration::Unknown);
        assert_eq!(
            Concentration::Quantified(10.0).scaled(0.5),
            Concentration::Quantified(5.0)
        );
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_concentration_serde() {
        let pure: Concentration = serde_json::from_str("\"pure\"").unwrap();
        assert_eq!(pure, Concentration::Pure);
        let q: Concentration = serde_json::from_str("{\"quantified\": 3.5}").unwrap();
        assert_eq!(q, Concentration::Quantified(3.5));
    }
}
