// ==========================================
// 电子送货单同步系统 - API 调用日志 Repository
// ==========================================
// 红线: 只追加，不更新、不删除
// ==========================================

use crate::domain::api_log::{ApiRunLog, RunStatus};
use crate::repository::error::RepositoryResult;
use chrono::{NaiveDate, NaiveTime};
use rusqlite::{params, Connection};

pub struct ApiLogRepository;

impl ApiLogRepository {
    /// 追加一条调用日志
    ///
    /// # 返回
    /// - `Ok(log_id)`: 自增主键
    pub fn insert(conn: &Connection, log: &ApiRunLog) -> RepositoryResult<i64> {
        conn.execute(
            r#"
            INSERT INTO api_log (
                run_id, log_date, log_time, flag_success, ship_date, page_no,
                status, tot_cnt, response_content
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                log.run_id,
                log.logged_at.format("%Y-%m-%d").to_string(),
                log.logged_at.format("%H:%M:%S").to_string(),
                log.status.flag_success(),
                log.ship_date,
                log.page_no,
                log.status.as_str(),
                log.tot_cnt as i64,
                log.response_content,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// 查询最近的调用日志（新 → 旧）
    pub fn list_recent(conn: &Connection, limit: usize) -> RepositoryResult<Vec<ApiRunLog>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT run_id, log_date, log_time, status, ship_date, page_no, tot_cnt, response_content
            FROM api_log
            ORDER BY log_id DESC
            LIMIT ?1
            "#,
        )?;

        let rows = stmt.query_map(params![limit as i64], |row| {
            let log_date: String = row.get(1)?;
            let log_time: String = row.get(2)?;
            let status: String = row.get(3)?;
            let date = NaiveDate::parse_from_str(&log_date, "%Y-%m-%d").unwrap_or_default();
            let time = NaiveTime::parse_from_str(&log_time, "%H:%M:%S").unwrap_or_default();
            let tot_cnt: i64 = row.get(6)?;
            Ok(ApiRunLog {
                run_id: row.get(0)?,
                logged_at: date.and_time(time),
                status: if status == "success" {
                    RunStatus::Success
                } else {
                    RunStatus::Fail
                },
                ship_date: row.get(4)?,
                page_no: row.get(5)?,
                tot_cnt: tot_cnt.max(0) as usize,
                response_content: row.get::<_, Option<String>>(7)?.unwrap_or_default(),
            })
        })?;

        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;

    #[test]
    fn test_insert_and_list_recent() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        let first = ApiRunLog::new("r1", RunStatus::Success, "20251117", 1, 3, "[]");
        let second = ApiRunLog::new("r2", RunStatus::Fail, "20251118", 2, 0, "boom");
        ApiLogRepository::insert(&conn, &first).unwrap();
        ApiLogRepository::insert(&conn, &second).unwrap();

        let logs = ApiLogRepository::list_recent(&conn, 10).unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].run_id, "r2");
        assert_eq!(logs[0].status, RunStatus::Fail);
        assert_eq!(logs[0].page_no, 2);
        assert_eq!(logs[1].tot_cnt, 3);
        assert_eq!(logs[1].status, RunStatus::Success);
    }
}
