use serde::Serialize;
use std::collections::BTreeMap;

const DELIMITER: &str = "---";

/// 头部字段值：恰好一个值时为标量，否则为列表
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FrontMatterValue {
    Scalar(String),
    List(Vec<String>),
}

impl FrontMatterValue {
    fn collapse(mut values: Vec<String>) -> Self {
        if values.len() == 1 {
            FrontMatterValue::Scalar(values.remove(0))
        } else {
            FrontMatterValue::List(values)
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FrontMatterValue::Scalar(value) => Some(value),
            FrontMatterValue::List(_) => None,
        }
    }

    /// 标量视为单元素列表
    pub fn to_list(&self) -> Vec<String> {
        match self {
            FrontMatterValue::Scalar(value) => vec![value.clone()],
            FrontMatterValue::List(values) => values.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedDocument {
    pub front_matter: BTreeMap<String, FrontMatterValue>,
    pub body: String,
}

impl ParsedDocument {
    pub fn get(&self, key: &str) -> Option<&FrontMatterValue> {
        self.front_matter.get(key)
    }
}

/// 拆分 markdown 的头部和正文
///
/// 头部格式：
///
/// ```text
/// ---
/// title: "Hello"
/// tags:
/// - a
/// - b
/// ---
/// Body
/// ```
///
/// 没有头部时返回空映射和原文，不会报错。
pub fn parse_front_matter(input: &str) -> ParsedDocument {
    match split(input) {
        Some((header, body)) => ParsedDocument {
            front_matter: parse_header(header),
            body: body.to_string(),
        },
        None => ParsedDocument {
            front_matter: BTreeMap::new(),
            body: input.to_string(),
        },
    }
}

/// 返回 (头部, 正文)
///
/// 开头的 `---` 之后必须在空白中换行；头部在第一个满足条件的 `\n---` 处结束，
/// 该 `---` 之后的空白里也必须有换行，正文从其中最后一个换行之后开始。
fn split(input: &str) -> Option<(&str, &str)> {
    let rest = input.strip_prefix(DELIMITER)?;
    let opening = &rest[..whitespace_len(rest)];

    let header_starts = opening
        .char_indices()
        .filter(|(_, c)| *c == '\n')
        .map(|(i, _)| DELIMITER.len() + i + 1)
        .rev();

    for header_start in header_starts {
        let mut from = header_start;
        while let Some(found) = input[from..].find("\n---") {
            let close = from + found;
            let after = close + 1 + DELIMITER.len();
            if let Some(offset) = body_offset(&input[after..]) {
                return Some((&input[header_start..close], &input[after + offset..]));
            }
            from = close + 1;
        }
    }
    None
}

fn body_offset(s: &str) -> Option<usize> {
    s[..whitespace_len(s)].rfind('\n').map(|i| i + 1)
}

fn whitespace_len(s: &str) -> usize {
    s.char_indices()
        .find(|(_, c)| !c.is_whitespace())
        .map_or(s.len(), |(i, _)| i)
}

fn parse_header(header: &str) -> BTreeMap<String, FrontMatterValue> {
    let mut fields = BTreeMap::new();
    let mut current: Option<(String, Vec<String>)> = None;

    for line in header.split('\n').map(str::trim) {
        if line.is_empty() {
            continue;
        }

        if let Some((key, value)) = split_key_value(line) {
            if let Some((key, values)) = current.take() {
                fields.insert(key, FrontMatterValue::collapse(values));
            }
            current = Some((key.to_string(), initial_values(value)));
        } else if let Some(item) = line.strip_prefix('-') {
            // 没有当前 key 的列表项直接丢弃
            if let Some((_, values)) = current.as_mut() {
                values.push(item.trim().to_string());
            }
        }
    }

    if let Some((key, values)) = current {
        fields.insert(key, FrontMatterValue::collapse(values));
    }
    fields
}

/// `word: rest`，key 只能包含 ASCII 字母、数字和下划线
fn split_key_value(line: &str) -> Option<(&str, &str)> {
    let key_len = line
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(line.len());
    if key_len == 0 {
        return None;
    }
    let value = line[key_len..].strip_prefix(':')?;
    Some((&line[..key_len], value.trim()))
}

fn initial_values(value: &str) -> Vec<String> {
    if value.starts_with('"') && value.ends_with('"') {
        let inner = if value.len() >= 2 { &value[1..value.len() - 1] } else { "" };
        vec![inner.to_string()]
    } else if !value.is_empty() {
        vec![value.to_string()]
    } else {
        Vec::new()
    }
}
