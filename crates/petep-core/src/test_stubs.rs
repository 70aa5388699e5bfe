use parking_lot::Mutex;

use crate::observability::{LogRecord, LogSeverity, Logger};

/// 记录所有日志的桩日志器。
///
/// # 设计背景（Why）
/// - 集成测试需要断言拦截器输出了哪些日志，而 [`LogRecord`] 只借用数据；
///   因此在 `log` 中复制为拥有所有权的 [`RecordedLog`]。
///
/// # 使用方式（How）
/// - 以 `Arc<RecordingLogger>` 构造 [`Helper`](crate::Helper) 或注册表激活参数，测试结束后调用
///   [`RecordingLogger::records`] 获取快照。
#[derive(Debug, Default)]
pub struct RecordingLogger {
    records: Mutex<Vec<RecordedLog>>,
}

/// 复制后的日志记录。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordedLog {
    pub severity: LogSeverity,
    pub message: String,
    pub target: Option<String>,
    pub error: Option<String>,
    pub attributes: Vec<(String, String)>,
}

impl RecordingLogger {
    /// 返回目前为止的全部记录。
    pub fn records(&self) -> Vec<RecordedLog> {
        self.records.lock().clone()
    }

    /// 返回指定级别的消息文本。
    pub fn messages_at(&self, severity: LogSeverity) -> Vec<String> {
        self.records
            .lock()
            .iter()
            .filter(|record| record.severity == severity)
            .map(|record| record.message.clone())
            .collect()
    }

    /// 清空记录。
    pub fn clear(&self) {
        self.records.lock().clear();
    }
}

impl Logger for RecordingLogger {
    fn log(&self, record: &LogRecord<'_>) {
        let recorded = RecordedLog {
            severity: record.severity,
            message: record.message.to_string(),
            target: record.target.as_ref().map(|target| target.to_string()),
            error: record.error.map(|error| error.to_string()),
            attributes: record
                .attributes
                .iter()
                .map(|field| (field.key.to_owned(), field.value.to_string()))
                .collect(),
        };
        self.records.lock().push(recorded);
    }
}
