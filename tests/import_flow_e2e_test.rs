// ==========================================
// 导入流程端到端测试
// ==========================================
// 上传 → 预览 → 提交，覆盖五个典型批次
// ==========================================

mod test_helpers;

use inventory_import::api::{ApiError, InventoryImportApi};
use inventory_import::{Bucket, ExecutionMode, MatchKind};
use test_helpers::{create_test_db, csv_batch, sample_row, seed_catalog, stock_quantity};

#[tokio::test]
async fn test_all_exact_rows_commit() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    let ids = seed_catalog(&db_path).unwrap();
    let api = InventoryImportApi::new(&db_path).unwrap();

    let upload = api
        .upload_batch(csv_batch(&[
            "MAIN,ABC-01,Blue widget,5",
            "MAIN,XYZ-99,Red gadget,2.5",
            "EAST,LMN-500,Green gizmo,10",
        ]))
        .await
        .unwrap();

    let preview = &upload.preview;
    assert_eq!(preview.total_rows, 3);
    assert_eq!(preview.valid_count, 3);
    assert_eq!(preview.suggested_count, 0);
    assert_eq!(preview.error_count, 0);
    assert!(preview.can_execute_complete);
    assert!(preview.can_execute_partial);

    let result = api
        .execute(&upload.session_id, ExecutionMode::OnlyValid)
        .await
        .unwrap();
    assert_eq!(result.processed_count, 3);
    assert_eq!(result.error_count, 0);
    assert_eq!(result.skipped_count, 0);
    assert!(result.is_balanced());

    assert_eq!(stock_quantity(&db_path, ids.main, ids.abc_01).unwrap(), Some(5.0));
    assert_eq!(stock_quantity(&db_path, ids.main, ids.xyz_99).unwrap(), Some(2.5));
    assert_eq!(stock_quantity(&db_path, ids.east, ids.lmn_500).unwrap(), Some(10.0));
}

#[tokio::test]
async fn test_trailing_space_is_normalized_match() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    let ids = seed_catalog(&db_path).unwrap();
    let api = InventoryImportApi::new(&db_path).unwrap();

    let upload = api
        .upload_batch(csv_batch(&["MAIN,ABC-01 ,Blue widget,4"]))
        .await
        .unwrap();

    let row = sample_row(&upload.preview, 2).unwrap();
    assert_eq!(row.bucket, Bucket::Valid);
    assert_eq!(row.match_kind, Some(MatchKind::Normalized));
    assert_eq!(row.product_id, Some(ids.abc_01));
}

#[tokio::test]
async fn test_typo_becomes_suggestion() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    let ids = seed_catalog(&db_path).unwrap();
    let api = InventoryImportApi::new(&db_path).unwrap();

    let upload = api
        .upload_batch(csv_batch(&["MAIN,ABX-01,Blue widget,4"]))
        .await
        .unwrap();

    assert_eq!(upload.preview.suggested_count, 1);
    let row = sample_row(&upload.preview, 2).unwrap();
    assert_eq!(row.bucket, Bucket::Suggested);
    assert_eq!(row.candidate_product_id, Some(ids.abc_01));
    assert_eq!(row.candidate_product_code.as_deref(), Some("ABC-01"));
    assert_eq!(row.similarity_score, Some(83));
    assert!(!upload.preview.can_execute_complete);
}

#[tokio::test]
async fn test_zero_quantity_is_error_despite_exact_code() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    seed_catalog(&db_path).unwrap();
    let api = InventoryImportApi::new(&db_path).unwrap();

    let upload = api
        .upload_batch(csv_batch(&["MAIN,ABC-01,Blue widget,0"]))
        .await
        .unwrap();

    let row = sample_row(&upload.preview, 2).unwrap();
    assert_eq!(row.bucket, Bucket::Error);
    assert_eq!(row.error_reason.as_deref(), Some("invalid quantity"));
    assert!(!upload.preview.can_execute_partial);
}

#[tokio::test]
async fn test_mixed_batch_refused_then_partially_committed() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    let ids = seed_catalog(&db_path).unwrap();
    let api = InventoryImportApi::new(&db_path).unwrap();

    let upload = api
        .upload_batch(csv_batch(&[
            "MAIN,ABC-01,Blue widget,1",
            "MAIN,XYZ-99,Red gadget,2",
            "EAST,LMN-500,Green gizmo,3",
            "MAIN,ABX-01,Blue widget,4",
            "NORTH,QQQ-1,Unknown thing,5",
        ]))
        .await
        .unwrap();
    assert_eq!(upload.preview.valid_count, 3);
    assert_eq!(upload.preview.suggested_count, 1);
    assert_eq!(upload.preview.error_count, 1);

    // 完整模式: 整批拒绝，零写入
    let refused = api
        .execute(&upload.session_id, ExecutionMode::AllPerfect)
        .await
        .unwrap_err();
    match refused {
        ApiError::ExecutionRefused {
            suggested, errors, ..
        } => {
            assert_eq!(suggested, 1);
            assert_eq!(errors, 1);
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(stock_quantity(&db_path, ids.main, ids.abc_01).unwrap(), None);

    // 拒绝后会话仍可继续
    let result = api
        .execute(&upload.session_id, ExecutionMode::OnlyValid)
        .await
        .unwrap();
    assert_eq!(result.total_rows, 5);
    assert_eq!(result.processed_count, 3);
    assert_eq!(result.skipped_count + result.error_count, 2);
    assert_eq!(result.skipped_rows, vec![5]);
    assert_eq!(result.error_count, 1);
    assert_eq!(result.row_failures[0].row_index, 6);
    assert_eq!(
        result.row_failures[0].reason,
        "product not found; warehouse not found"
    );
    assert_eq!(result.products_not_found.len(), 1);
    assert_eq!(result.products_not_found[0].code, "QQQ-1");
    assert_eq!(result.warehouses_not_found, vec!["NORTH".to_string()]);
    assert!(result.is_balanced());

    assert_eq!(stock_quantity(&db_path, ids.main, ids.abc_01).unwrap(), Some(1.0));
}

#[tokio::test]
async fn test_row_conservation_with_blank_and_partial_lines() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    seed_catalog(&db_path).unwrap();
    let api = InventoryImportApi::new(&db_path).unwrap();

    let upload = api
        .upload_batch(csv_batch(&[
            "MAIN,ABC-01,Blue widget,1",
            ",,,",
            "MAIN,,No code,2",
            ",XYZ-99,,3",
            "MAIN,LMN-500,Green gizmo,abc",
        ]))
        .await
        .unwrap();

    // 空白行不计入；其余每一行都出现在预览中
    let preview = &upload.preview;
    assert_eq!(preview.total_rows, 4);
    assert_eq!(
        preview.valid_count + preview.suggested_count + preview.error_count,
        preview.total_rows
    );
    assert!(sample_row(preview, 3).is_none());
    assert_eq!(
        sample_row(preview, 4).unwrap().error_reason.as_deref(),
        Some("missing product code")
    );
    assert_eq!(
        sample_row(preview, 5).unwrap().error_reason.as_deref(),
        Some("missing warehouse")
    );
    assert_eq!(
        sample_row(preview, 6).unwrap().error_reason.as_deref(),
        Some("invalid quantity")
    );

    let result = api
        .execute(&upload.session_id, ExecutionMode::OnlyValid)
        .await
        .unwrap();
    assert_eq!(result.total_rows, 4);
    assert_eq!(result.processed_count, 1);
    assert_eq!(result.error_count, 3);
    assert!(result.is_balanced());
}

#[tokio::test]
async fn test_classification_is_deterministic_across_uploads() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    seed_catalog(&db_path).unwrap();
    let api = InventoryImportApi::new(&db_path).unwrap();

    let lines = [
        "MAIN,abc-01,Blue widget,1",
        "Main Warehouse,ABX-01,Blue widget,2",
        "EAST,NOPE,Missing,3",
    ];
    let first = api.upload_batch(csv_batch(&lines)).await.unwrap();
    let second = api.upload_batch(csv_batch(&lines)).await.unwrap();

    assert_ne!(first.session_id, second.session_id);
    for row_index in 2..=4 {
        let a = sample_row(&first.preview, row_index).unwrap();
        let b = sample_row(&second.preview, row_index).unwrap();
        assert_eq!(a.bucket, b.bucket);
        assert_eq!(a.match_kind, b.match_kind);
        assert_eq!(a.candidate_product_id, b.candidate_product_id);
    }
}
