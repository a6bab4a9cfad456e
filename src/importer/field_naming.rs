// ==========================================
// 参数化数据导入 - 字段命名
// ==========================================
// 职责: 表头文本 → 字段名 + 单位
// 规则: "P_Voltage [V]" 在 Parameter 组中得到 ("Voltage", Some("V"))
// ==========================================

/// 拆分表头中的单位，如 "Voltage [V]" → ("Voltage", Some("V"))
///
/// 仅识别结尾的方括号；空单位视为无单位
pub fn split_unit(header: &str) -> (String, Option<String>) {
    let text = header.trim();
    if let Some(stripped) = text.strip_suffix(']') {
        if let Some(open) = stripped.rfind('[') {
            let name = stripped[..open].trim();
            let unit = stripped[open + 1..].trim();
            if !name.is_empty() {
                let unit = (!unit.is_empty()).then(|| unit.to_string());
                return (name.to_string(), unit);
            }
        }
    }
    (text.to_string(), None)
}

/// 剥离组前缀；剥离后为空则保留原名
pub fn strip_group_prefix<'a>(name: &'a str, prefix: &str) -> &'a str {
    if prefix.is_empty() {
        return name;
    }
    match name.strip_prefix(prefix) {
        Some(rest) if !rest.trim().is_empty() => rest,
        _ => name,
    }
}

/// 组合规则: 先剥前缀再拆单位
pub fn normalize_header(header: &str, prefix: Option<&str>) -> (String, Option<String>) {
    let trimmed = header.trim();
    let base = match prefix {
        Some(p) => strip_group_prefix(trimmed, p),
        None => trimmed,
    };
    split_unit(base)
}
