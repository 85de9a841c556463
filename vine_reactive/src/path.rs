use crate::error::PathError;

/// Parses the simple dot-path form accepted by the watch API: identifier
/// segments (`[A-Za-z_$][A-Za-z0-9_$]*`) joined by `.`.
pub(crate) fn parse_path(path: &str) -> Result<Vec<String>, PathError> {
    if path.is_empty() {
        return Err(PathError::Empty);
    }
    let mut segments = Vec::new();
    for segment in path.split('.') {
        if !is_identifier(segment) {
            return Err(PathError::InvalidSegment {
                segment: segment.to_string(),
            });
        }
        segments.push(segment.to_string());
    }
    Ok(segments)
}

fn is_identifier(segment: &str) -> bool {
    let mut chars = segment.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
        }
        _ => false,
    }
}
