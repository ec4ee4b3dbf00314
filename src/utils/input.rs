//! 用户输入解析：节点名称校验与 "name=value" 属性字符串

/// 判断是否为合法的 XML 名称（不含命名空间语义，冒号按普通名称字符处理）
pub fn is_valid_xml_name(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    is_name_start_char(first) && chars.all(is_name_char)
}

fn is_name_start_char(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == ':'
}

fn is_name_char(c: char) -> bool {
    is_name_start_char(c) || c.is_numeric() || c == '-' || c == '.' || c == '\u{B7}'
}

/// 解析 "name=value"：必须恰好一个 '='，名称去空白后须为合法 XML 名称。
/// 不符合时返回 None，由调用方决定忽略还是报错
pub fn parse_attribute_input(input: &str) -> Option<(String, String)> {
    let mut parts = input.split('=');
    let (Some(name), Some(value), None) = (parts.next(), parts.next(), parts.next()) else {
        return None;
    };
    let name = name.trim();
    if !is_valid_xml_name(name) {
        return None;
    }
    Some((name.to_string(), value.trim().to_string()))
}
