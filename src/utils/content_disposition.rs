use reqwest::header::{HeaderMap, CONTENT_DISPOSITION};

/// Filename from a `Content-Disposition` header, e.g.
/// `attachment; filename="staff_report_20240101_120000.pdf"`.
pub fn extract_filename(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(CONTENT_DISPOSITION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(parse_filename)
}

pub fn parse_filename(header_value: &str) -> Option<String> {
    header_value.split(';').find_map(|param| {
        let (key, value) = param.trim().split_once('=')?;
        if !key.trim().eq_ignore_ascii_case("filename") {
            return None;
        }
        let name = value.trim().trim_matches('"').trim();
        // 不接受路径，只保留文件名
        let name = name.rsplit(['/', '\\']).next().unwrap_or(name);
        if name.is_empty() {
            None
        } else {
            Some(name.to_string())
        }
    })
}
