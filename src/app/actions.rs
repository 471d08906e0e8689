// ==========================================
// 工序就绪评估系统 - 应用动作（界面调用入口）
// ==========================================
// 职责:
// - 会话校验（未登录 → UNAUTHORIZED）
// - 在阻塞线程池执行同步 API
// - 统一返回 {success, data} / {success: false, error}
// - 内部/存储错误不向界面暴露原始信息
// ==========================================

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::api::{ApiError, ApiResult, ReadinessApi};
use crate::domain::readiness::{AnnotatedOperation, Readiness};
use crate::i18n;

/// 调用方会话
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user_id: String,
}

impl Session {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
        }
    }
}

/// 错误响应（返回给界面）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// 错误代码
    pub code: String,

    /// 错误消息（已本地化或已脱敏）
    pub message: String,

    /// 详细信息（可选）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// 动作返回信封
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorResponse>,
}

impl<T> ActionResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn fail(error: ErrorResponse) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error),
        }
    }

    fn from_result(result: ApiResult<T>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(err) => Self::fail(map_api_error(err)),
        }
    }
}

/// 将ApiError转换为错误响应
pub fn map_api_error(err: ApiError) -> ErrorResponse {
    let code = match &err {
        ApiError::InvalidInput(_) => "INVALID_INPUT",
        ApiError::NotFound(_) => "NOT_FOUND",
        ApiError::InvalidState { .. } => "INVALID_STATE",
        ApiError::Unauthorized(_) => "UNAUTHORIZED",
        ApiError::PropagationError { .. } => "PROPAGATION_ERROR",
        ApiError::DatabaseError(_) => "DATABASE_ERROR",
        ApiError::DatabaseConnectionError(_) => "DATABASE_CONNECTION_ERROR",
        ApiError::DatabaseBusy(_) => "DATABASE_BUSY",
        ApiError::DatabaseTransactionError(_) => "DATABASE_TRANSACTION_ERROR",
        ApiError::InternalError(_) => "INTERNAL_ERROR",
    }
    .to_string();

    if err.is_internal() {
        tracing::error!(code = %code, error = %err, "就绪动作内部错误");
        return ErrorResponse {
            code,
            message: i18n::t("readiness.unable_to_determine"),
            details: None,
        };
    }

    let (message, details) = match &err {
        ApiError::Unauthorized(_) => (i18n::t("common.unauthorized"), None),
        ApiError::PropagationError {
            operation_id,
            failures,
        } => (
            i18n::t("readiness.propagation_failed"),
            Some(serde_json::json!({
                "operationId": operation_id,
                "failedSteps": failures.len(),
            })),
        ),
        ApiError::InvalidState {
            operation_id,
            status,
        } => (
            i18n::t("readiness.invalid_state"),
            Some(serde_json::json!({
                "operationId": operation_id,
                "status": status.as_str(),
            })),
        ),
        _ => (err.to_string(), None),
    };

    ErrorResponse {
        code,
        message,
        details,
    }
}

fn authorize(session: Option<&Session>) -> ApiResult<()> {
    match session {
        Some(s) if !s.user_id.trim().is_empty() => Ok(()),
        _ => Err(ApiError::Unauthorized("缺少有效会话".to_string())),
    }
}

// 在阻塞线程池执行同步 API
async fn run_blocking<T, F>(op: &'static str, f: F) -> ApiResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> ApiResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let _perf = crate::perf::PerfGuard::new(op);
        f()
    })
    .await
    .map_err(|e| ApiError::InternalError(format!("任务执行失败: {}", e)))?
}

// ==========================================
// ReadinessActions
// ==========================================
#[derive(Clone)]
pub struct ReadinessActions {
    api: Arc<ReadinessApi>,
}

impl ReadinessActions {
    pub fn new(api: Arc<ReadinessApi>) -> Self {
        Self { api }
    }

    pub async fn calculate_operation_readiness(
        &self,
        session: Option<&Session>,
        operation_id: String,
    ) -> ActionResponse<Readiness> {
        if let Err(e) = authorize(session) {
            return ActionResponse::fail(map_api_error(e));
        }
        let api = self.api.clone();
        ActionResponse::from_result(
            run_blocking("action.calculate_operation_readiness", move || {
                api.calculate_operation_readiness(&operation_id)
            })
            .await,
        )
    }

    pub async fn calculate_work_order_readiness(
        &self,
        session: Option<&Session>,
        work_order_id: String,
    ) -> ActionResponse<HashMap<String, Readiness>> {
        if let Err(e) = authorize(session) {
            return ActionResponse::fail(map_api_error(e));
        }
        let api = self.api.clone();
        ActionResponse::from_result(
            run_blocking("action.calculate_work_order_readiness", move || {
                api.calculate_work_order_readiness(&work_order_id)
            })
            .await,
        )
    }

    pub async fn get_ready_operations_for_work_center(
        &self,
        session: Option<&Session>,
        work_center_id: String,
    ) -> ActionResponse<Vec<AnnotatedOperation>> {
        if let Err(e) = authorize(session) {
            return ActionResponse::fail(map_api_error(e));
        }
        let api = self.api.clone();
        ActionResponse::from_result(
            run_blocking("action.get_ready_operations_for_work_center", move || {
                api.get_ready_operations_for_work_center(&work_center_id)
            })
            .await,
        )
    }

    pub async fn update_work_center_queue(
        &self,
        session: Option<&Session>,
        work_center_id: String,
    ) -> ActionResponse<()> {
        if let Err(e) = authorize(session) {
            return ActionResponse::fail(map_api_error(e));
        }
        let api = self.api.clone();
        ActionResponse::from_result(
            run_blocking("action.update_work_center_queue", move || {
                api.update_work_center_queue(&work_center_id).map(|_| ())
            })
            .await,
        )
    }

    /// 状态变更通知：传播失败以信封返回，不影响调用方已提交的状态
    pub async fn on_operation_status_change(
        &self,
        session: Option<&Session>,
        operation_id: String,
    ) -> ActionResponse<()> {
        if let Err(e) = authorize(session) {
            return ActionResponse::fail(map_api_error(e));
        }
        let api = self.api.clone();
        ActionResponse::from_result(
            run_blocking("action.on_operation_status_change", move || {
                api.on_operation_status_change(&operation_id).map(|_| ())
            })
            .await,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::OperationStatus;

    #[test]
    fn test_internal_errors_are_masked() {
        let resp = map_api_error(ApiError::DatabaseError("disk I/O error at page 7".to_string()));
        assert_eq!(resp.code, "DATABASE_ERROR");
        assert!(!resp.message.contains("page 7"));
    }

    #[test]
    fn test_invalid_state_carries_details() {
        let resp = map_api_error(ApiError::InvalidState {
            operation_id: "OP1".to_string(),
            status: OperationStatus::Completed,
        });
        assert_eq!(resp.code, "INVALID_STATE");
        let details = resp.details.unwrap();
        assert_eq!(details["status"], "COMPLETED");
    }

    #[test]
    fn test_envelope_shape() {
        let ok = serde_json::to_value(ActionResponse::ok(3)).unwrap();
        assert_eq!(ok, serde_json::json!({"success": true, "data": 3}));

        let fail: ActionResponse<i32> =
            ActionResponse::fail(map_api_error(ApiError::Unauthorized("x".to_string())));
        let value = serde_json::to_value(fail).unwrap();
        assert_eq!(value["success"], false);
        assert_eq!(value["error"]["code"], "UNAUTHORIZED");
        assert!(value.get("data").is_none());
    }

    #[test]
    fn test_authorize_rejects_blank_session() {
        assert!(authorize(None).is_err());
        assert!(authorize(Some(&Session::new("  "))).is_err());
        assert!(authorize(Some(&Session::new("u-1"))).is_ok());
    }
}
