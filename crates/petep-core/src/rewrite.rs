//! 字节模式查找与替换引擎。
//!
//! # 教案式说明
//! - **意图（Why）**：拦截器最常见的改写操作是“把负载中的某段字节换成另一段”，且替换前后长度可能不同；
//!   原地挪动字节容易破坏替换点之后的数据，因此统一采用“增量构建新缓冲区，再整体交换”的方式。
//! - **逻辑（How）**：游标从左到右扫描；命中时写入替换字节并跳过整段模式（不重叠），未命中的字节
//!   原样复制。替换字节写入输出后不再参与本次扫描，因此替换内容即使包含模式也不会被再次替换。
//! - **契约（What）**：
//!   - 空模式在类型层面被 [`Pattern::new`] 拒绝，重写函数本身不会失败；
//!   - 模式不存在时结果与输入逐字节相同，`matches == 0`；
//!   - 多条规则由 [`RewriteSet`] 按给定顺序依次作用，后一条规则可以命中前一条规则引入的字节。

use std::{fmt, sync::Arc};

use crate::{
    bytes,
    error::{PipelineError, Result},
};

/// 经过校验的非空字节模式。
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Pattern(Arc<[u8]>);

impl Pattern {
    /// 构造模式；空字节序列返回 [`PipelineError::InvalidPattern`]。
    pub fn new(bytes: impl AsRef<[u8]>) -> Result<Self> {
        let bytes = bytes.as_ref();
        if bytes.is_empty() {
            return Err(PipelineError::InvalidPattern);
        }
        Ok(Self(Arc::from(bytes)))
    }

    /// 以 UTF-8 编码的文本构造模式。
    pub fn from_text(text: &str) -> Result<Self> {
        Self::new(text.as_bytes())
    }

    /// 返回模式字节。
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Pattern")
            .field(&bytes::to_hex_string(&self.0))
            .finish()
    }
}

/// 一次重写的结果：新缓冲区与命中次数。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rewrite {
    pub bytes: Vec<u8>,
    pub matches: usize,
}

/// 作用于 PDU 的重写报告。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RewriteReport {
    pub matches: usize,
    pub size_before: usize,
    pub size_after: usize,
}

impl RewriteReport {
    /// 是否发生了任何替换。
    pub fn changed(&self) -> bool {
        self.matches > 0
    }
}

/// 替换 `buffer` 中 `pattern` 的全部不重叠出现。
pub fn replace_all(buffer: &[u8], pattern: &Pattern, replacement: &[u8]) -> Rewrite {
    match splice(buffer, pattern, replacement, None) {
        Some(rewrite) => rewrite,
        None => Rewrite {
            bytes: buffer.to_vec(),
            matches: 0,
        },
    }
}

/// 仅替换第 `n` 次（从零计数）不重叠出现。
pub fn replace_nth(buffer: &[u8], pattern: &Pattern, replacement: &[u8], n: usize) -> Rewrite {
    match splice(buffer, pattern, replacement, Some(n)) {
        Some(rewrite) => rewrite,
        None => Rewrite {
            bytes: buffer.to_vec(),
            matches: 0,
        },
    }
}

/// 增量构建输出缓冲区；没有任何命中时返回 `None`，调用方据此跳过缓冲区交换。
///
/// `only` 为 `Some(n)` 时只替换第 `n` 次出现，其余命中原样复制。
pub(crate) fn splice(
    buffer: &[u8],
    pattern: &Pattern,
    replacement: &[u8],
    only: Option<usize>,
) -> Option<Rewrite> {
    let needle = pattern.as_bytes();
    let mut output: Option<Vec<u8>> = None;
    let mut copied = 0;
    let mut cursor = 0;
    let mut seen = 0;
    let mut matches = 0;

    while let Some(position) = bytes::find(buffer, cursor, needle) {
        let end = position + needle.len();
        let selected = only.is_none_or(|n| n == seen);
        seen += 1;
        if selected {
            let out = output.get_or_insert_with(|| Vec::with_capacity(buffer.len()));
            out.extend_from_slice(&buffer[copied..position]);
            out.extend_from_slice(replacement);
            copied = end;
            matches += 1;
            if only.is_some() {
                break;
            }
        }
        cursor = end;
    }

    let mut out = output?;
    out.extend_from_slice(&buffer[copied..]);
    Some(Rewrite {
        bytes: out,
        matches,
    })
}

/// 单条替换规则。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RewriteRule {
    pattern: Pattern,
    replacement: Arc<[u8]>,
}

impl RewriteRule {
    pub fn new(pattern: Pattern, replacement: impl AsRef<[u8]>) -> Self {
        Self {
            pattern,
            replacement: Arc::from(replacement.as_ref()),
        }
    }

    /// 以文本构造规则，空模式返回 [`PipelineError::InvalidPattern`]。
    pub fn from_text(pattern: &str, replacement: &str) -> Result<Self> {
        Ok(Self::new(Pattern::from_text(pattern)?, replacement.as_bytes()))
    }

    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    pub fn replacement(&self) -> &[u8] {
        &self.replacement
    }
}

/// 按顺序作用的规则集合。
///
/// 每条规则都扫描前一条规则的输出，而不是原始输入。
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RewriteSet {
    rules: Vec<RewriteRule>,
}

impl RewriteSet {
    pub fn new(rules: impl IntoIterator<Item = RewriteRule>) -> Self {
        Self {
            rules: rules.into_iter().collect(),
        }
    }

    /// 追加规则，返回自身以便链式构造。
    pub fn with_rule(mut self, rule: RewriteRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn rules(&self) -> &[RewriteRule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// 依次应用全部规则。
    pub fn apply(&self, buffer: &[u8]) -> Rewrite {
        let mut current = Rewrite {
            bytes: buffer.to_vec(),
            matches: 0,
        };
        for rule in &self.rules {
            if let Some(next) = splice(&current.bytes, &rule.pattern, &rule.replacement, None) {
                current = Rewrite {
                    bytes: next.bytes,
                    matches: current.matches + next.matches,
                };
            }
        }
        current
    }
}
