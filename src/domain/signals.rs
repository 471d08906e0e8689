// ==========================================
// 工序就绪评估系统 - 外部可用性信号接口
// ==========================================
// 物料、工装、质量冻结信号由生产/库存/质量模块提供，
// 本子系统只把它们当作可插拔的布尔提供者读取。
// ==========================================

use crate::domain::operation::Operation;
use std::collections::HashSet;
use thiserror::Error;

/// 信号读取失败（例如库存服务不可达）
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SignalError {
    #[error("信号源不可达: {source_name}: {message}")]
    Unreachable { source_name: String, message: String },

    #[error("信号数据无效: {0}")]
    InvalidData(String),
}

/// 单次评估时捕获的信号状态
///
/// Unknown 一律按"不满足"处理：对准入控制来说，误判为就绪才是危险方向
#[derive(Debug, Clone, PartialEq)]
pub enum SignalState {
    Satisfied,
    Unsatisfied,
    Unknown(String),
}

impl SignalState {
    pub fn is_satisfied(&self) -> bool {
        matches!(self, SignalState::Satisfied)
    }

    /// 由"可用"类信号结果构造
    pub fn from_availability(result: Result<bool, SignalError>) -> Self {
        match result {
            Ok(true) => SignalState::Satisfied,
            Ok(false) => SignalState::Unsatisfied,
            Err(e) => SignalState::Unknown(e.to_string()),
        }
    }

    /// 由"存在冻结"类信号结果构造（有冻结 = 不满足）
    pub fn from_hold(result: Result<bool, SignalError>) -> Self {
        match result {
            Ok(false) => SignalState::Satisfied,
            Ok(true) => SignalState::Unsatisfied,
            Err(e) => SignalState::Unknown(e.to_string()),
        }
    }
}

// ==========================================
// 信号提供者 Trait
// ==========================================

/// 物料（BOM 组件）齐套信号
pub trait MaterialSignal: Send + Sync {
    fn is_material_available(&self, operation: &Operation) -> Result<bool, SignalError>;
}

/// 工装/刀具可用信号
pub trait ToolingSignal: Send + Sync {
    fn is_tooling_available(&self, operation: &Operation) -> Result<bool, SignalError>;
}

/// 质量冻结信号（工单或工序级）
pub trait QualityHoldSignal: Send + Sync {
    fn has_open_hold(&self, operation: &Operation) -> Result<bool, SignalError>;
}

// ==========================================
// 内置实现
// ==========================================

/// 固定值信号（未接入外部系统时使用，或用于测试）
#[derive(Debug, Clone, Copy)]
pub struct StaticSignal {
    pub value: bool,
}

impl StaticSignal {
    /// 物料/工装始终可用、始终无冻结
    pub fn permissive() -> Self {
        Self { value: true }
    }
}

impl MaterialSignal for StaticSignal {
    fn is_material_available(&self, _operation: &Operation) -> Result<bool, SignalError> {
        Ok(self.value)
    }
}

impl ToolingSignal for StaticSignal {
    fn is_tooling_available(&self, _operation: &Operation) -> Result<bool, SignalError> {
        Ok(self.value)
    }
}

impl QualityHoldSignal for StaticSignal {
    // value=true 表示"一切正常"，即无冻结
    fn has_open_hold(&self, _operation: &Operation) -> Result<bool, SignalError> {
        Ok(!self.value)
    }
}

/// 按工序ID列出的阻塞集合
#[derive(Debug, Clone, Default)]
pub struct BlockListSignal {
    pub blocked_operation_ids: HashSet<String>,
}

impl BlockListSignal {
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            blocked_operation_ids: ids.into_iter().map(Into::into).collect(),
        }
    }

    fn is_blocked(&self, operation: &Operation) -> bool {
        self.blocked_operation_ids.contains(&operation.id)
    }
}

impl MaterialSignal for BlockListSignal {
    fn is_material_available(&self, operation: &Operation) -> Result<bool, SignalError> {
        Ok(!self.is_blocked(operation))
    }
}

impl ToolingSignal for BlockListSignal {
    fn is_tooling_available(&self, operation: &Operation) -> Result<bool, SignalError> {
        Ok(!self.is_blocked(operation))
    }
}

impl QualityHoldSignal for BlockListSignal {
    fn has_open_hold(&self, operation: &Operation) -> Result<bool, SignalError> {
        Ok(self.is_blocked(operation))
    }
}

/// 始终失败的信号源（模拟外部系统不可达）
#[derive(Debug, Clone)]
pub struct UnreachableSignal {
    pub source_name: String,
}

impl UnreachableSignal {
    fn error(&self) -> SignalError {
        SignalError::Unreachable {
            source_name: self.source_name.clone(),
            message: "connection refused".to_string(),
        }
    }
}

impl MaterialSignal for UnreachableSignal {
    fn is_material_available(&self, _operation: &Operation) -> Result<bool, SignalError> {
        Err(self.error())
    }
}

impl ToolingSignal for UnreachableSignal {
    fn is_tooling_available(&self, _operation: &Operation) -> Result<bool, SignalError> {
        Err(self.error())
    }
}

impl QualityHoldSignal for UnreachableSignal {
    fn has_open_hold(&self, _operation: &Operation) -> Result<bool, SignalError> {
        Err(self.error())
    }
}
