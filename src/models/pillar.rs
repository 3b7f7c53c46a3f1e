use phf::phf_map;

/// 支柱枚举（最佳实践的顶层分类）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Pillar {
    /// 卓越运营
    OperationalExcellence,
    /// 安全性
    Security,
    /// 可靠性
    Reliability,
    /// 性能效率
    PerformanceEfficiency,
    /// 成本优化
    CostOptimization,
    /// 可持续性
    Sustainability,
}

/// 支柱 id（及常见别名）到枚举的映射
static PILLARS: phf::Map<&'static str, Pillar> = phf_map! {
    "operational-excellence" => Pillar::OperationalExcellence,
    "operationalexcellence" => Pillar::OperationalExcellence,
    "security" => Pillar::Security,
    "reliability" => Pillar::Reliability,
    "performance-efficiency" => Pillar::PerformanceEfficiency,
    "performance" => Pillar::PerformanceEfficiency,
    "cost-optimization" => Pillar::CostOptimization,
    "costoptimization" => Pillar::CostOptimization,
    "sustainability" => Pillar::Sustainability,
};

impl Pillar {
    pub const ALL: [Pillar; 6] = [
        Pillar::OperationalExcellence,
        Pillar::Security,
        Pillar::Reliability,
        Pillar::PerformanceEfficiency,
        Pillar::CostOptimization,
        Pillar::Sustainability,
    ];

    /// 获取支柱 id
    pub fn id(self) -> &'static str {
        match self {
            Pillar::OperationalExcellence => "operational-excellence",
            Pillar::Security => "security",
            Pillar::Reliability => "reliability",
            Pillar::PerformanceEfficiency => "performance-efficiency",
            Pillar::CostOptimization => "cost-optimization",
            Pillar::Sustainability => "sustainability",
        }
    }

    /// 获取标准名称
    pub fn name(self) -> &'static str {
        match self {
            Pillar::OperationalExcellence => "Operational Excellence",
            Pillar::Security => "Security",
            Pillar::Reliability => "Reliability",
            Pillar::PerformanceEfficiency => "Performance Efficiency",
            Pillar::CostOptimization => "Cost Optimization",
            Pillar::Sustainability => "Sustainability",
        }
    }

    /// 按 id 或别名查找支柱
    pub fn from_id(id: &str) -> Option<Self> {
        PILLARS.get(id.trim().to_lowercase().as_str()).copied()
    }

    /// 按显示名称查找支柱（"Cost Optimization" → CostOptimization）
    pub fn from_name(name: &str) -> Option<Self> {
        Self::from_id(&pillar_id_from_name(name))
    }
}

impl std::fmt::Display for Pillar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// 目录中支柱名称到 id 的规则：小写，空白替换为 `-`
pub fn pillar_id_from_name(name: &str) -> String {
    name.split_whitespace()
        .map(|part| part.to_lowercase())
        .collect::<Vec<_>>()
        .join("-")
}
