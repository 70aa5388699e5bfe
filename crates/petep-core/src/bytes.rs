//! 所有函数均为纯函数：只读输入切片，不持有跨调用状态。
//!
//! 查找语义统一为“从左到右、逐字节精确比较”；计数类函数（[`find_nth`]）按不重叠的命中计数，
//! 与 [`crate::rewrite`] 的替换语义保持一致。

use crate::error::{PipelineError, Result};

/// 自 `offset` 起查找 `what` 的首次出现位置。
///
/// - `what` 为空时视为在 `offset` 处命中（`offset` 不超过缓冲区长度时）；
/// - 剩余字节不足 `what.len()` 时返回 `None`。
pub fn find(buffer: &[u8], offset: usize, what: &[u8]) -> Option<usize> {
    if what.is_empty() {
        return (offset <= buffer.len()).then_some(offset);
    }
    let haystack = buffer.get(offset..)?;
    if haystack.len() < what.len() {
        return None;
    }
    haystack
        .windows(what.len())
        .position(|window| window == what)
        .map(|position| offset + position)
}

/// 自 `offset` 起查找 `what` 的第 `n` 次（从零计数）不重叠出现位置。
pub fn find_nth(buffer: &[u8], offset: usize, what: &[u8], n: usize) -> Option<usize> {
    if what.is_empty() {
        return None;
    }
    let mut cursor = offset;
    let mut seen = 0;
    while let Some(position) = find(buffer, cursor, what) {
        if seen == n {
            return Some(position);
        }
        seen += 1;
        cursor = position + what.len();
    }
    None
}

/// 判断缓冲区是否包含 `what`；空序列总是被包含。
pub fn contains(buffer: &[u8], what: &[u8]) -> bool {
    find(buffer, 0, what).is_some()
}

/// 判断 `what` 是否恰好出现在 `position` 处。
pub fn contains_at(buffer: &[u8], what: &[u8], position: usize) -> bool {
    position
        .checked_add(what.len())
        .and_then(|end| buffer.get(position..end))
        .is_some_and(|window| window == what)
}

pub fn starts_with(buffer: &[u8], what: &[u8]) -> bool {
    buffer.starts_with(what)
}

pub fn ends_with(buffer: &[u8], what: &[u8]) -> bool {
    buffer.ends_with(what)
}

/// 渲染为诊断用十六进制文本：大写、两位一组、单空格分隔，例如 `48 65 6C`。
pub fn to_hex_string(bytes: &[u8]) -> String {
    let encoded = hex::encode_upper(bytes);
    let mut rendered = String::with_capacity(bytes.len() * 3);
    for (index, pair) in encoded.as_bytes().chunks(2).enumerate() {
        if index > 0 {
            rendered.push(' ');
        }
        rendered.extend(pair.iter().map(|digit| char::from(*digit)));
    }
    rendered
}

/// 解析 [`to_hex_string`] 的输出；容忍任意空白，大小写不敏感。
pub fn from_hex_string(text: &str) -> Result<Vec<u8>> {
    let digits: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    hex::decode(&digits).map_err(|err| PipelineError::InvalidHex {
        detail: err.to_string(),
    })
}

/// 以固定的 UTF-8 编码将文本转为字节。
pub fn bytes_of(text: &str) -> Vec<u8> {
    text.as_bytes().to_vec()
}

/// 以 UTF-8 解码字节，非法序列替换为 `U+FFFD`。
pub fn string_of(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}
