// ==========================================
// 电子送货单同步系统 - 审计日志记录
// ==========================================
// 红线: 每次同步恰好一条 api_log
// - 成功: 在业务事务内写入，随事务一起提交
// - 失败: 业务事务已回滚，用独立连接单独写入
// 审计写入本身失败只记日志，不改变同步结果
// ==========================================

use crate::db::ConnectionProvider;
use crate::domain::api_log::ApiRunLog;
use crate::repository::api_log_repo::ApiLogRepository;
use crate::repository::error::RepositoryResult;
use rusqlite::Connection;
use tracing::{error, info};

pub struct AuditRecorder;

impl AuditRecorder {
    /// 在调用方事务内写入（成功路径）
    pub fn record_in_tx(conn: &Connection, log: &ApiRunLog) -> RepositoryResult<i64> {
        let log_id = ApiLogRepository::insert(conn, log)?;
        info!(
            run_id = %log.run_id,
            log_id,
            status = log.status.as_str(),
            tot_cnt = log.tot_cnt,
            "同步日志已写入"
        );
        Ok(log_id)
    }

    /// 在独立连接上写入（失败路径）
    ///
    /// 返回是否写入成功；失败只记录 error 日志
    pub fn record_independent<P: ConnectionProvider + ?Sized>(provider: &P, log: &ApiRunLog) -> bool {
        let result = provider
            .connect()
            .map_err(crate::repository::error::RepositoryError::from)
            .and_then(|conn| ApiLogRepository::insert(&conn, log));

        match result {
            Ok(log_id) => {
                info!(
                    run_id = %log.run_id,
                    log_id,
                    status = log.status.as_str(),
                    "失败日志已独立写入"
                );
                true
            }
            Err(e) => {
                error!(run_id = %log.run_id, error = %e, "失败日志写入失败");
                false
            }
        }
    }
}
