// ==========================================
// 应用动作测试
// ==========================================
// 测试目标: 会话校验、返回信封、错误码与脱敏
// ==========================================

mod test_helpers;

use mes_readiness::app::Session;
use mes_readiness::domain::types::OperationStatus;
use mes_readiness::i18n;
use test_helpers::*;

#[tokio::test]
async fn test_missing_session_is_unauthorized() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let conn = open_test_connection(&db_path).unwrap();
    insert_work_center(&conn, WorkCenterSeed::new("W")).unwrap();
    insert_operation(&conn, OperationSeed::new("OP1", "WO1", "W", 1)).unwrap();

    let state = build_state(&db_path);
    let actions = state.actions();

    let resp = actions
        .calculate_operation_readiness(None, "OP1".to_string())
        .await;
    assert!(!resp.success);
    assert!(resp.data.is_none());
    assert_eq!(resp.error.unwrap().code, "UNAUTHORIZED");

    // 未授权请求不会触发评估
    let cached: i64 = conn
        .query_row("SELECT COUNT(*) FROM operation_readiness", [], |row| row.get(0))
        .unwrap();
    assert_eq!(cached, 0);
}

#[tokio::test]
async fn test_actions_return_data_with_session() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let conn = open_test_connection(&db_path).unwrap();
    insert_work_center(&conn, WorkCenterSeed::new("W").capacity(2)).unwrap();
    insert_operation(&conn, OperationSeed::new("A", "WO1", "W", 1).status(OperationStatus::Running)).unwrap();
    insert_operation(&conn, OperationSeed::new("B", "WO1", "W", 2)).unwrap();

    let state = build_state(&db_path);
    let actions = state.actions();
    let session = Session::new("planner-01");

    let resp = actions
        .calculate_work_order_readiness(Some(&session), "WO1".to_string())
        .await;
    assert!(resp.success);
    let map = resp.data.unwrap();
    assert_eq!(map.len(), 2);
    assert!(!map["B"].is_ready);

    let resp = actions
        .get_ready_operations_for_work_center(Some(&session), "W".to_string())
        .await;
    assert!(resp.success);
    assert_eq!(resp.data.unwrap().len(), 1);

    set_status(&conn, "A", OperationStatus::Completed).unwrap();
    let resp = actions
        .on_operation_status_change(Some(&session), "A".to_string())
        .await;
    assert!(resp.success, "{:?}", resp.error);

    let resp = actions
        .update_work_center_queue(Some(&session), "W".to_string())
        .await;
    assert!(resp.success);
    assert_eq!(read_queue(&conn, "W").unwrap(), vec![("B".to_string(), 0)]);
}

#[tokio::test]
async fn test_business_errors_keep_their_codes() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let conn = open_test_connection(&db_path).unwrap();
    insert_work_center(&conn, WorkCenterSeed::new("W")).unwrap();
    insert_operation(&conn, OperationSeed::new("DONE", "WO1", "W", 1).status(OperationStatus::Completed)).unwrap();

    let state = build_state(&db_path);
    let actions = state.actions();
    let session = Session::new("planner-01");

    let resp = actions
        .calculate_operation_readiness(Some(&session), "MISSING".to_string())
        .await;
    assert_eq!(resp.error.unwrap().code, "NOT_FOUND");

    let resp = actions
        .calculate_operation_readiness(Some(&session), "DONE".to_string())
        .await;
    let error = resp.error.unwrap();
    assert_eq!(error.code, "INVALID_STATE");
    assert_eq!(error.details.unwrap()["operationId"], "DONE");

    let resp = actions
        .update_work_center_queue(Some(&session), "  ".to_string())
        .await;
    assert_eq!(resp.error.unwrap().code, "INVALID_INPUT");
}

#[tokio::test]
async fn test_storage_failure_is_masked() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let conn = open_test_connection(&db_path).unwrap();
    insert_work_center(&conn, WorkCenterSeed::new("W")).unwrap();
    insert_operation(&conn, OperationSeed::new("OP1", "WO1", "W", 1)).unwrap();

    let state = build_state(&db_path);
    conn.execute_batch("DROP TABLE work_center_queue;").unwrap();

    let resp = state
        .actions()
        .update_work_center_queue(Some(&Session::new("planner-01")), "W".to_string())
        .await;
    assert!(!resp.success);
    let error = resp.error.unwrap();
    assert_eq!(error.code, "DATABASE_ERROR");
    assert!(!error.message.contains("work_center_queue"));
    assert_eq!(error.message, i18n::t("readiness.unable_to_determine"));
}
