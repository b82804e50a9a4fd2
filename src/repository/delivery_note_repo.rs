// ==========================================
// 电子送货单同步系统 - 送货单台账 Repository
// ==========================================
// 职责: 主表/明细行的批量条件 upsert
// 红线: “是否已确认”的判断与写入必须是同一条 SQL（ON CONFLICT ... WHERE），
//       禁止先查询再决定是否写入
// ==========================================

use crate::domain::delivery_note::{ShipmentDetailLine, ShipmentMaster};
use crate::domain::types::MergePolicy;
use crate::repository::error::RepositoryResult;
use rusqlite::{params, Connection, OptionalExtension, Row};
use rust_decimal::Decimal;
use std::str::FromStr;

const MASTER_COLUMNS: [&str; 25] = [
    "inven_no",
    "whsal_cd",
    "cmp_cd",
    "ship_type",
    "ship_date",
    "ship_name",
    "ship_contact",
    "ship_dec_no",
    "ship_bank_cd",
    "ship_bank_name",
    "ship_acc_num",
    "ship_acc_dep",
    "trade_type",
    "trade_class",
    "drv_name",
    "drv_call",
    "drv_car_no",
    "drv_rate",
    "drv_bank_name",
    "drv_acc_num",
    "drv_acc_dep",
    "inven_state",
    "regist_date",
    "udt_date",
    "chk_date",
];

const DETAIL_COLUMNS: [&str; 22] = [
    "inven_no",
    "inven_det_no",
    "pro_name",
    "pro_dec_no",
    "good_cd",
    "poj_cd",
    "dan_cd",
    "lv_cd",
    "san_cd",
    "self_good_cd",
    "self_poj_cd",
    "self_dan_cd",
    "self_lv_cd",
    "self_san_cd",
    "eco_cd",
    "unit_quantity",
    "ship_quantity",
    "frt_qy",
    "detail_note",
    "self_good_nm",
    "sug_amt",
    "unloading_cost",
];

/// 主表“未确认”条件（引用冲突行的已有值）
const MASTER_OPEN_PREDICATE: &str = "COALESCE(delivery_note_master.chk_date, '') = ''";

/// 明细“未回写 ERP”条件
const DETAIL_OPEN_PREDICATE: &str = "COALESCE(delivery_note_detail.flag_erp_apply, 0) = 0";

/// 批量 upsert 统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertStats {
    /// 提交的行数
    pub submitted: usize,
    /// 实际插入或覆盖的行数
    pub written: usize,
    /// 因已确认而被丢弃的行数
    pub frozen: usize,
}

fn build_upsert_sql(
    table: &str,
    columns: &[&str],
    conflict_keys: &[&str],
    open_predicate: Option<&str>,
) -> String {
    let placeholders = (1..=columns.len())
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ");
    let assignments = columns
        .iter()
        .filter(|c| !conflict_keys.contains(c))
        .map(|c| format!("{c} = excluded.{c}"))
        .collect::<Vec<_>>()
        .join(",\n    ");

    let mut sql = format!(
        "INSERT INTO {table} ({cols})\nVALUES ({placeholders})\nON CONFLICT({keys}) DO UPDATE SET\n    {assignments}",
        cols = columns.join(", "),
        keys = conflict_keys.join(", "),
    );
    if let Some(predicate) = open_predicate {
        sql.push_str("\nWHERE ");
        sql.push_str(predicate);
    }
    sql
}

/// 主表 upsert SQL
pub fn master_upsert_sql(policy: MergePolicy) -> String {
    build_upsert_sql(
        "delivery_note_master",
        &MASTER_COLUMNS,
        &["inven_no"],
        policy.is_gated().then_some(MASTER_OPEN_PREDICATE),
    )
}

/// 明细 upsert SQL
pub fn detail_upsert_sql(policy: MergePolicy) -> String {
    build_upsert_sql(
        "delivery_note_detail",
        &DETAIL_COLUMNS,
        &["inven_no", "inven_det_no"],
        policy.is_gated().then_some(DETAIL_OPEN_PREDICATE),
    )
}

// ==========================================
// DeliveryNoteRepository
// ==========================================
// 红线: Repository 不含业务规则，确认门控完全下沉到 SQL
pub struct DeliveryNoteRepository;

impl DeliveryNoteRepository {
    /// 在事务中批量 upsert 主表（一个预编译语句完成整批）
    pub fn upsert_masters_tx(
        conn: &Connection,
        masters: &[ShipmentMaster],
        policy: MergePolicy,
    ) -> RepositoryResult<UpsertStats> {
        let mut stats = UpsertStats::default();
        if masters.is_empty() {
            return Ok(stats);
        }

        let sql = master_upsert_sql(policy);
        let mut stmt = conn.prepare(&sql)?;

        for m in masters {
            let changed = stmt.execute(params![
                m.inven_no,
                m.whsal_cd,
                m.cmp_cd,
                m.ship_type,
                m.ship_date,
                m.ship_name,
                m.ship_contact,
                m.ship_dec_no,
                m.ship_bank_cd,
                m.ship_bank_name,
                m.ship_acc_num,
                m.ship_acc_dep,
                m.trade_type,
                m.trade_class,
                m.drv_name,
                m.drv_call,
                m.drv_car_no,
                m.drv_rate,
                m.drv_bank_name,
                m.drv_acc_num,
                m.drv_acc_dep,
                m.inven_state,
                m.regist_date,
                m.udt_date,
                m.chk_date,
            ])?;
            stats.submitted += 1;
            if changed > 0 {
                stats.written += 1;
            } else {
                stats.frozen += 1;
            }
        }

        Ok(stats)
    }

    /// 在事务中批量 upsert 明细行（含卸货费）
    pub fn upsert_details_tx(
        conn: &Connection,
        details: &[ShipmentDetailLine],
        policy: MergePolicy,
    ) -> RepositoryResult<UpsertStats> {
        let mut stats = UpsertStats::default();
        if details.is_empty() {
            return Ok(stats);
        }

        let sql = detail_upsert_sql(policy);
        let mut stmt = conn.prepare(&sql)?;

        for d in details {
            let changed = stmt.execute(params![
                d.inven_no,
                d.inven_det_no,
                d.pro_name,
                d.pro_dec_no,
                d.good_cd,
                d.poj_cd,
                d.dan_cd,
                d.lv_cd,
                d.san_cd,
                d.self_good_cd,
                d.self_poj_cd,
                d.self_dan_cd,
                d.self_lv_cd,
                d.self_san_cd,
                d.eco_cd,
                d.unit_quantity,
                d.ship_quantity,
                d.frt_qy,
                d.detail_note,
                d.self_good_nm,
                d.sug_amt,
                d.unloading_cost.normalize().to_string(),
            ])?;
            stats.submitted += 1;
            if changed > 0 {
                stats.written += 1;
            } else {
                stats.frozen += 1;
            }
        }

        Ok(stats)
    }

    /// 按送货单号读取主表
    pub fn find_master(conn: &Connection, inven_no: &str) -> RepositoryResult<Option<ShipmentMaster>> {
        let sql = format!(
            "SELECT {} FROM delivery_note_master WHERE inven_no = ?1",
            MASTER_COLUMNS.join(", ")
        );
        let master = conn
            .query_row(&sql, params![inven_no], map_master_row)
            .optional()?;
        Ok(master)
    }

    /// 按 (送货单号, 明细号) 读取明细行
    pub fn find_detail(
        conn: &Connection,
        inven_no: &str,
        inven_det_no: &str,
    ) -> RepositoryResult<Option<ShipmentDetailLine>> {
        let sql = format!(
            "SELECT {} FROM delivery_note_detail WHERE inven_no = ?1 AND inven_det_no = ?2",
            DETAIL_COLUMNS.join(", ")
        );
        let detail = conn
            .query_row(&sql, params![inven_no, inven_det_no], map_detail_row)
            .optional()?;
        Ok(detail)
    }
}

fn map_master_row(row: &Row) -> rusqlite::Result<ShipmentMaster> {
    Ok(ShipmentMaster {
        inven_no: row.get(0)?,
        whsal_cd: row.get(1)?,
        cmp_cd: row.get(2)?,
        ship_type: row.get(3)?,
        ship_date: row.get(4)?,
        ship_name: row.get(5)?,
        ship_contact: row.get(6)?,
        ship_dec_no: row.get(7)?,
        ship_bank_cd: row.get(8)?,
        ship_bank_name: row.get(9)?,
        ship_acc_num: row.get(10)?,
        ship_acc_dep: row.get(11)?,
        trade_type: row.get(12)?,
        trade_class: row.get(13)?,
        drv_name: row.get(14)?,
        drv_call: row.get(15)?,
        drv_car_no: row.get(16)?,
        drv_rate: row.get(17)?,
        drv_bank_name: row.get(18)?,
        drv_acc_num: row.get(19)?,
        drv_acc_dep: row.get(20)?,
        inven_state: row.get(21)?,
        regist_date: row.get(22)?,
        udt_date: row.get(23)?,
        chk_date: row.get(24)?,
    })
}

fn map_detail_row(row: &Row) -> rusqlite::Result<ShipmentDetailLine> {
    let cost_raw: Option<String> = row.get(21)?;
    let unloading_cost = cost_raw
        .as_deref()
        .and_then(|v| Decimal::from_str(v.trim()).ok())
        .unwrap_or(Decimal::ZERO);

    Ok(ShipmentDetailLine {
        inven_no: row.get(0)?,
        inven_det_no: row.get(1)?,
        pro_name: row.get(2)?,
        pro_dec_no: row.get(3)?,
        good_cd: row.get(4)?,
        poj_cd: row.get(5)?,
        dan_cd: row.get(6)?,
        lv_cd: row.get(7)?,
        san_cd: row.get(8)?,
        self_good_cd: row.get(9)?,
        self_poj_cd: row.get(10)?,
        self_dan_cd: row.get(11)?,
        self_lv_cd: row.get(12)?,
        self_san_cd: row.get(13)?,
        eco_cd: row.get(14)?,
        unit_quantity: row.get(15)?,
        ship_quantity: row.get(16)?,
        frt_qy: row.get(17)?,
        detail_note: row.get(18)?,
        self_good_nm: row.get(19)?,
        sug_amt: row.get(20)?,
        unloading_cost,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    fn master(inven_no: &str, ship_name: &str, chk_date: Option<&str>) -> ShipmentMaster {
        ShipmentMaster {
            inven_no: inven_no.to_string(),
            ship_date: Some("20251117".to_string()),
            ship_name: Some(ship_name.to_string()),
            chk_date: chk_date.map(|s| s.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_gated_sql_contains_guard() {
        let sql = master_upsert_sql(MergePolicy::FinalizeGated);
        assert!(sql.contains("ON CONFLICT(inven_no) DO UPDATE SET"));
        assert!(sql.contains(MASTER_OPEN_PREDICATE));
        assert!(!sql.contains("inven_no = excluded.inven_no"));

        let legacy = detail_upsert_sql(MergePolicy::AlwaysOverwrite);
        assert!(!legacy.contains("WHERE"));
        assert!(legacy.contains("unloading_cost = excluded.unloading_cost"));
    }

    #[test]
    fn test_open_master_overwritten() {
        let conn = setup();
        DeliveryNoteRepository::upsert_masters_tx(&conn, &[master("M1", "old", None)], MergePolicy::FinalizeGated).unwrap();
        let stats = DeliveryNoteRepository::upsert_masters_tx(&conn, &[master("M1", "new", None)], MergePolicy::FinalizeGated).unwrap();

        assert_eq!(stats, UpsertStats { submitted: 1, written: 1, frozen: 0 });
        let stored = DeliveryNoteRepository::find_master(&conn, "M1").unwrap().unwrap();
        assert_eq!(stored.ship_name.as_deref(), Some("new"));
    }

    #[test]
    fn test_finalized_master_discarded() {
        let conn = setup();
        let original = master("M1", "old", Some("20251117120000"));
        DeliveryNoteRepository::upsert_masters_tx(&conn, &[original.clone()], MergePolicy::FinalizeGated).unwrap();

        let stats = DeliveryNoteRepository::upsert_masters_tx(&conn, &[master("M1", "new", None)], MergePolicy::FinalizeGated).unwrap();

        assert_eq!(stats.frozen, 1);
        let stored = DeliveryNoteRepository::find_master(&conn, "M1").unwrap().unwrap();
        assert_eq!(stored, original);
    }

    #[test]
    fn test_legacy_policy_overwrites_finalized_master() {
        let conn = setup();
        DeliveryNoteRepository::upsert_masters_tx(&conn, &[master("M1", "old", Some("20251117120000"))], MergePolicy::FinalizeGated).unwrap();
        DeliveryNoteRepository::upsert_masters_tx(&conn, &[master("M1", "new", None)], MergePolicy::AlwaysOverwrite).unwrap();

        let stored = DeliveryNoteRepository::find_master(&conn, "M1").unwrap().unwrap();
        assert_eq!(stored.ship_name.as_deref(), Some("new"));
        assert_eq!(stored.chk_date, None);
    }

    #[test]
    fn test_erp_applied_detail_discarded() {
        let conn = setup();
        DeliveryNoteRepository::upsert_masters_tx(&conn, &[master("M1", "s", None)], MergePolicy::FinalizeGated).unwrap();

        let line = ShipmentDetailLine {
            inven_no: "M1".to_string(),
            inven_det_no: "1".to_string(),
            ship_quantity: Some("3".to_string()),
            unloading_cost: Decimal::new(360, 0),
            ..Default::default()
        };
        DeliveryNoteRepository::upsert_details_tx(&conn, &[line.clone()], MergePolicy::FinalizeGated).unwrap();
        conn.execute(
            "UPDATE delivery_note_detail SET flag_erp_apply = 1 WHERE inven_no = 'M1'",
            [],
        )
        .unwrap();

        let changed = ShipmentDetailLine {
            ship_quantity: Some("9".to_string()),
            unloading_cost: Decimal::new(1080, 0),
            ..line.clone()
        };
        let stats = DeliveryNoteRepository::upsert_details_tx(&conn, &[changed], MergePolicy::FinalizeGated).unwrap();

        assert_eq!(stats.frozen, 1);
        let stored = DeliveryNoteRepository::find_detail(&conn, "M1", "1").unwrap().unwrap();
        assert_eq!(stored, line);
    }
}
