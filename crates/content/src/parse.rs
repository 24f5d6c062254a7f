/// Splits a leading `Subject:` line off generated email text. Without one,
/// `default_subject` is used and the whole text is the body.
pub fn split_subject(text: &str, default_subject: &str) -> (String, String) {
    let text = text.trim();
    if let Some(rest) = text.strip_prefix("Subject:") {
        let (subject, body) = rest.split_once('\n').unwrap_or((rest, ""));
        let subject = subject.trim();
        let body = body.trim();
        let subject = if subject.is_empty() { default_subject } else { subject };
        return (subject.to_string(), body.to_string());
    }
    (default_subject.to_string(), text.to_string())
}

/// Strips code fences and wrapping quotes models sometimes add around a post.
pub fn clean_social_post(text: &str) -> String {
    let stripped = text.replace("```", "");
    let trimmed = stripped.trim();
    let unquoted = trimmed
        .strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .unwrap_or(trimmed);
    unquoted.trim().to_string()
}
