// ==========================================
// 大批量集成测试
// ==========================================
// 测试目标: 费率批量查询、送货单号 IN 查询、汇总键 VALUES 查询的分块路径
// ==========================================


use delivery_note_sync::engine::RateSchemaCache;
use delivery_note_sync::importer::{DeliveryNoteSync, FetchRequest};
use delivery_note_sync::repository::{DailyCostRepository, DeliveryNoteRepository};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use test_helpers::*;

/// 超过费率查询（500）、送货单号查询（500）与汇总键查询（100）的单块上限
const NOTE_COUNT: usize = 620;

fn good(i: usize) -> String {
    format!("G{i:04}")
}

#[test]
fn test_chunked_queries_cover_every_note_and_key() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let conn = connect(&db_path);
    conn.execute_batch("BEGIN;").unwrap();
    for i in 0..NOTE_COUNT {
        // 费率 = 序号 + 1
        seed_rate(&conn, &good(i), "1", &(i + 1).to_string()).unwrap();
    }
    seed_mapping(&conn, "P1", "C1", "D1").unwrap();
    conn.execute_batch("COMMIT;").unwrap();

    let notes: Vec<Value> = (0..NOTE_COUNT)
        .map(|i| note(&format!("INV-{i:04}"), None, vec![line("1", &good(i), "1", "2")]))
        .collect();

    let cache = RateSchemaCache::new();
    let outcome = DeliveryNoteSync::with_cache(provider(&db_path), &cache)
        .ingest_payload(&FetchRequest::new(SHIP_DATE, 1), &json!({"data": {"items": notes}}))
        .unwrap();

    assert_eq!(outcome.details.written, NOTE_COUNT);
    assert_eq!(outcome.cost.matched, NOTE_COUNT);
    assert_eq!(outcome.cost.missed, 0);
    assert_eq!(outcome.aggregated_keys, NOTE_COUNT);

    // 首尾两块中的明细都按各自费率计算
    for i in [0, 499, 500, NOTE_COUNT - 1] {
        let detail = DeliveryNoteRepository::find_detail(&conn, &format!("INV-{i:04}"), "1")
            .unwrap()
            .unwrap();
        assert_eq!(detail.unloading_cost, Decimal::from(2 * (i + 1)));
    }

    let totals = DailyCostRepository::list_totals(&conn).unwrap();
    assert_eq!(totals.len(), NOTE_COUNT);
    for (i, total) in totals.iter().enumerate() {
        assert_eq!(total.key.self_good_cd, good(i));
        assert_eq!(total.unloading_cost_total, Decimal::from(2 * (i + 1)));
    }
}

#[test]
fn test_reingesting_large_batch_keeps_totals() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let conn = connect(&db_path);
    conn.execute_batch("BEGIN;").unwrap();
    for i in 0..NOTE_COUNT {
        seed_rate(&conn, &good(i), "1", "10").unwrap();
    }
    seed_mapping(&conn, "P1", "C1", "D1").unwrap();
    conn.execute_batch("COMMIT;").unwrap();

    let payload = Value::Array(
        (0..NOTE_COUNT)
            .map(|i| note(&format!("INV-{i:04}"), None, vec![line("1", &good(i), "1", "1")]))
            .collect(),
    );

    let cache = RateSchemaCache::new();
    let sync = DeliveryNoteSync::with_cache(provider(&db_path), &cache);
    sync.ingest_payload(&FetchRequest::new(SHIP_DATE, 1), &payload).unwrap();
    let first = DailyCostRepository::list_totals(&conn).unwrap();

    // 第二次运行时写入前后的键均超过单块上限
    sync.ingest_payload(&FetchRequest::new(SHIP_DATE, 1), &payload).unwrap();

    assert_eq!(DailyCostRepository::list_totals(&conn).unwrap(), first);
    let grand_total: Decimal = first.iter().map(|t| t.unloading_cost_total).sum();
    assert_eq!(grand_total, Decimal::from(10 * NOTE_COUNT));
}
