use serde::de::DeserializeOwned;
use tracing::debug;

/// Pulls the body of the first fenced code block out of a model reply.
///
/// A ```sql fence wins over a bare ``` fence. Returns `None` when there is no
/// closed fence or the block is empty.
pub fn extract_code_block(content: &str) -> Option<String> {
    let lower = content.to_ascii_lowercase();
    // "```sqlite" and friends fall through to the plain fence
    let sql_fence = lower
        .match_indices("```sql")
        .map(|(start, _)| start + 6)
        .find(|&after| content[after..].chars().next().is_some_and(char::is_whitespace));
    if let Some(after) = sql_fence {
        let body = &content[after..];
        if let Some(end) = body.find("```") {
            let sql = body[..end].trim();
            if !sql.is_empty() {
                debug!("Extracted SQL from sql code block");
                return Some(sql.to_string());
            }
        }
    }

    if let Some(start) = content.find("```") {
        let after_fence = &content[start + 3..];
        // Skip an info string such as "postgresql" on the opening line
        let body = match after_fence.find('\n') {
            Some(newline) if !after_fence[..newline].contains("```") => &after_fence[newline + 1..],
            _ => after_fence,
        };
        if let Some(end) = body.find("```") {
            let sql = body[..end].trim();
            if !sql.is_empty() {
                debug!("Extracted SQL from plain code block");
                return Some(sql.to_string());
            }
        }
    }

    None
}

/// Parses a JSON object from a model reply, tolerating prose or fences around it.
pub fn parse_json_object<T: DeserializeOwned>(content: &str) -> Option<T> {
    let trimmed = content.trim();
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Some(value);
    }

    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&trimmed[start..=end]).ok()
}
