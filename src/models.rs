use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// 待翻译的数据行
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoRow {
    pub id: i64,
    /// 各源字段的原文，与 `TableSpec::fields` 一一对应，NULL 读作空字符串
    pub texts: Vec<String>,
}

impl VideoRow {
    pub fn new(id: i64, texts: Vec<String>) -> Self {
        Self { id, texts }
    }

    /// 所有源字段都为空（去掉首尾空白后）
    pub fn is_blank(&self) -> bool {
        self.texts.iter().all(|t| t.trim().is_empty())
    }
}

/// 单张表一次回填的统计结果
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct BackfillReport {
    pub table: String,
    /// 本次读取到的未翻译行数
    pub scanned: u64,
    pub succeeded: u64,
    pub failed: u64,
    /// 标题为空而跳过的行数
    pub skipped: u64,
    /// 因取消或超时提前结束
    pub interrupted: bool,
    pub started_at: String,
    pub elapsed_ms: u64,
}

impl BackfillReport {
    pub fn summary(&self) -> String {
        summary_message(self.succeeded, self.failed)
    }
}

/// 扫描结果提示语
pub fn summary_message(succeeded: u64, failed: u64) -> String {
    format!(
        "扫描完成，成功翻译: {} 条，失败: {} 条",
        succeeded, failed
    )
}

/// 多张表的汇总提示语，有表被中断或中止时附加说明
pub fn reports_message(reports: &[BackfillReport], aborted: &[(String, String)]) -> String {
    let succeeded = reports.iter().map(|r| r.succeeded).sum();
    let failed = reports.iter().map(|r| r.failed).sum();
    let mut msg = summary_message(succeeded, failed);

    let interrupted: Vec<&str> = reports
        .iter()
        .filter(|r| r.interrupted)
        .map(|r| r.table.as_str())
        .collect();
    if !interrupted.is_empty() {
        msg.push_str(&format!(
            "；任务已中断，未处理的记录留待下次: {}",
            interrupted.join(", ")
        ));
    }
    for (table, reason) in aborted {
        msg.push_str(&format!("；数据表 {} 回填中止: {}", table, reason));
    }
    msg
}

/// 接口统一返回结构 `{"code": 1|0, "msg": "..."}`
#[derive(Serialize, Deserialize, Debug)]
pub struct ApiResponse<T> {
    pub code: u8,
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn ok(msg: impl Into<String>, data: T) -> Self {
        Self {
            code: 1,
            msg: msg.into(),
            data: Some(data),
        }
    }

    pub fn message(msg: impl Into<String>) -> Self {
        Self {
            code: 1,
            msg: msg.into(),
            data: None,
        }
    }

    pub fn fail(msg: impl Into<String>) -> Self {
        Self {
            code: 0,
            msg: msg.into(),
            data: None,
        }
    }
}

/// 分类信息
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TypeInfo {
    pub type_id: i64,
    pub type_name: String,
    pub type_pid: i64,
    pub type_mid: i64,
    pub type_sort: i64,
    pub type_status: i64,
}

/// 影片列表项
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct VodSummary {
    pub vod_id: i64,
    pub type_id: i64,
    pub vod_name: String,
    pub vod_time_add: i64,
}

/// 文章列表项
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ArticleSummary {
    pub art_id: i64,
    pub type_id: i64,
    pub art_name: String,
    pub art_time: i64,
}

/// 首页文章区块
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LatestArticles {
    /// 文章总数
    pub count_num: u64,
    /// 启用的文章分类 id
    pub art_type_ids: Vec<i64>,
    pub articles: Vec<ArticleSummary>,
}

/// 首页某个一级分类的最近更新
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LatestUpdate {
    pub type_id: i64,
    pub vod_type_name: String,
    /// 子分类 id -> 名称
    pub vod_son_name_list: BTreeMap<i64, String>,
    /// 最近添加的影片，按添加时间倒序，最多 9 条
    pub vod_detail_array: Vec<VodSummary>,
    /// 统计窗口内新增的影片数
    pub vod_count: u64,
}
