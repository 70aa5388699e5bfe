//! PDU（协议数据单元）值对象。
//!
//! # 教案式说明
//! - **意图（Why）**：一条 PDU 在一次链路遍历期间被唯一持有（`&mut Pdu`），因此缓冲区交换与标签修改
//!   无需加锁；只读身份信息（代理、连接、方向）在构造后不再提供修改入口。
//! - **逻辑（How）**：`size` 不单独存储，而是始终由缓冲区长度派生；任何缓冲区替换都是一次字段赋值，
//!   外部观察者不可能看到长度与内容不一致的中间状态。
//! - **契约（What）**：
//!   - 可变操作仅限：整体替换缓冲区、等长原地修改（[`Pdu::buffer_mut`]）、标签增删；
//!   - `last_interceptor` 只能由链路更新（`pub(crate)`），仅用于诊断，不参与控制流。

use std::{borrow::Cow, collections::BTreeSet, fmt, sync::Arc};

use crate::{
    bytes,
    error::{PipelineError, Result},
    rewrite::{self, Pattern, RewriteReport, RewriteSet},
};

/// PDU 的逻辑方向：发往客户端还是发往服务端。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Destination {
    Client,
    Server,
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Client => f.write_str("CLIENT"),
            Destination::Server => f.write_str("SERVER"),
        }
    }
}

/// 代理定义的只读引用。
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ProxyRef {
    code: Arc<str>,
    name: Arc<str>,
}

impl ProxyRef {
    pub fn new(code: impl Into<Arc<str>>, name: impl Into<Arc<str>>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// 会话（连接）身份的只读引用。
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ConnectionRef {
    code: Arc<str>,
}

impl ConnectionRef {
    pub fn new(code: impl Into<Arc<str>>) -> Self {
        Self { code: code.into() }
    }

    pub fn code(&self) -> &str {
        &self.code
    }
}

/// 最近一次处理该 PDU 的拦截器身份。
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct InterceptorRef {
    code: Arc<str>,
    name: Arc<str>,
    position: usize,
}

impl InterceptorRef {
    pub(crate) fn new(code: impl Into<Arc<str>>, name: impl Into<Arc<str>>, position: usize) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            position,
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 拦截器在所属链路中的位置（从零计数）。
    pub fn position(&self) -> usize {
        self.position
    }
}

/// 在代理中流转的一条协议数据单元。
///
/// # 契约说明（What）
/// - **构造**：由传输层通过 [`Pdu::new`] 创建，并通过 `with_*` 方法补充种类与初始标签；
/// - **后置条件**：`size() == buffer().len()` 在任何公开操作之后恒成立；
/// - **克隆**：`Clone` 生成完全独立的副本（缓冲区与标签均深拷贝），用于历史记录或重放。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pdu {
    kind: Cow<'static, str>,
    buffer: Vec<u8>,
    destination: Destination,
    proxy: ProxyRef,
    connection: ConnectionRef,
    last_interceptor: Option<InterceptorRef>,
    tags: BTreeSet<String>,
}

impl Pdu {
    /// 默认的 PDU 种类名称。
    pub const DEFAULT_KIND: &'static str = "DefaultPdu";

    pub fn new(
        proxy: ProxyRef,
        connection: ConnectionRef,
        destination: Destination,
        buffer: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            kind: Cow::Borrowed(Self::DEFAULT_KIND),
            buffer: buffer.into(),
            destination,
            proxy,
            connection,
            last_interceptor: None,
            tags: BTreeSet::new(),
        }
    }

    /// 设置由传输层决定的种类名称（如 `TcpPdu`），仅用于诊断输出。
    pub fn with_kind(mut self, kind: impl Into<Cow<'static, str>>) -> Self {
        self.kind = kind.into();
        self
    }

    /// 附带初始标签。
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.add_tags(tags);
        self
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn destination(&self) -> Destination {
        self.destination
    }

    pub fn proxy(&self) -> &ProxyRef {
        &self.proxy
    }

    pub fn connection(&self) -> &ConnectionRef {
        &self.connection
    }

    pub fn last_interceptor(&self) -> Option<&InterceptorRef> {
        self.last_interceptor.as_ref()
    }

    pub(crate) fn set_last_interceptor(&mut self, interceptor: InterceptorRef) {
        self.last_interceptor = Some(interceptor);
    }

    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    /// 等长原地修改入口；切片无法改变长度，因此 `size` 不变。
    pub fn buffer_mut(&mut self) -> &mut [u8] {
        &mut self.buffer
    }

    /// 缓冲区长度。
    pub fn size(&self) -> usize {
        self.buffer.len()
    }

    /// 整体替换缓冲区。
    pub fn replace_buffer(&mut self, buffer: impl Into<Vec<u8>>) {
        self.buffer = buffer.into();
    }

    /// 以显式长度替换缓冲区：只保留前 `size` 个字节。
    ///
    /// `size` 超出给定字节数时返回 [`PipelineError::InvalidSize`]，原缓冲区保持不变。
    pub fn set_buffer(&mut self, mut buffer: Vec<u8>, size: usize) -> Result<()> {
        if size > buffer.len() {
            return Err(PipelineError::InvalidSize {
                requested: size,
                available: buffer.len(),
            });
        }
        buffer.truncate(size);
        self.buffer = buffer;
        Ok(())
    }

    /// 截断或以零字节扩展到 `size`。
    pub fn resize(&mut self, size: usize) {
        self.buffer.resize(size, 0);
    }

    /// 以 UTF-8 解码缓冲区，非法序列替换为 `U+FFFD`。
    pub fn text(&self) -> String {
        bytes::string_of(&self.buffer)
    }

    /// 诊断用十六进制渲染。
    pub fn buffer_hex(&self) -> String {
        bytes::to_hex_string(&self.buffer)
    }

    /// 替换全部不重叠出现；模式不存在时为无操作。
    pub fn replace(&mut self, pattern: &Pattern, replacement: &[u8]) -> RewriteReport {
        self.splice(pattern, replacement, None)
    }

    /// 仅替换第 `n` 次（从零计数）出现。
    pub fn replace_nth(&mut self, pattern: &Pattern, replacement: &[u8], n: usize) -> RewriteReport {
        self.splice(pattern, replacement, Some(n))
    }

    /// 未命中时不触碰缓冲区；命中时以一次赋值换入新缓冲区。
    fn splice(&mut self, pattern: &Pattern, replacement: &[u8], only: Option<usize>) -> RewriteReport {
        let size_before = self.size();
        let matches = match rewrite::splice(&self.buffer, pattern, replacement, only) {
            Some(rewrite) => {
                self.buffer = rewrite.bytes;
                rewrite.matches
            }
            None => 0,
        };
        RewriteReport {
            matches,
            size_before,
            size_after: self.size(),
        }
    }

    /// 按顺序应用规则集合。
    pub fn apply_rewrites(&mut self, rules: &RewriteSet) -> RewriteReport {
        let size_before = self.size();
        let mut matches = 0;
        for rule in rules.rules() {
            matches += self.replace(rule.pattern(), rule.replacement()).matches;
        }
        RewriteReport {
            matches,
            size_before,
            size_after: self.size(),
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    /// 添加标签；已存在时返回 `false`。
    pub fn add_tag(&mut self, tag: impl Into<String>) -> bool {
        self.tags.insert(tag.into())
    }

    pub fn add_tags<I, S>(&mut self, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
    }

    /// 移除标签；不存在时返回 `false`。
    pub fn remove_tag(&mut self, tag: &str) -> bool {
        self.tags.remove(tag)
    }

    /// 按字典序遍历标签。
    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.tags.iter().map(String::as_str)
    }

    /// 以逗号拼接标签。
    pub fn tags_string(&self) -> String {
        tags_to_string(self.tags())
    }
}

/// 以逗号拼接标签。
pub fn tags_to_string<'a>(tags: impl IntoIterator<Item = &'a str>) -> String {
    tags.into_iter().collect::<Vec<_>>().join(",")
}

/// 按逗号拆分标签文本，丢弃空片段并合并重复项。
pub fn string_to_tags(text: &str) -> BTreeSet<String> {
    text.split(',')
        .filter(|segment| !segment.is_empty())
        .map(str::to_owned)
        .collect()
}
