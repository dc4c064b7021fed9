//! Locates the challenge transform function inside a player script.

use std::sync::LazyLock;

use regex::Regex;

use super::InitError;

/// Call sites that feed the `n` query parameter through the transform.
static CALL_SITE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r#"\.get\("n"\)\)&&\(b=([a-zA-Z0-9$]+)(?:\[(\d+)\])?\([a-zA-Z0-9]\)"#,
        r"b=String\.fromCharCode\(110\),c=a\.get\(b\)\)&&\(c=([a-zA-Z0-9$]+)(?:\[(\d+)\])?\([a-zA-Z0-9]\)",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

/// Resolve the name of the transform function.
///
/// Newer players reach the function through a one-element array
/// (`NAME[0](b)`), in which case the array literal is looked up as well.
pub(super) fn function_name(script: &str) -> Result<String, InitError> {
    for pattern in CALL_SITE_PATTERNS.iter() {
        let Some(caps) = pattern.captures(script) else {
            continue;
        };
        let name = &caps[1];
        let Some(index) = caps.get(2) else {
            return Ok(name.to_string());
        };
        let index: usize = index
            .as_str()
            .parse()
            .map_err(|_| InitError::FunctionNotFound)?;
        return array_element(script, name, index);
    }

    Err(InitError::FunctionNotFound)
}

fn array_element(script: &str, array: &str, index: usize) -> Result<String, InitError> {
    let pattern = Regex::new(&format!(r"var {}\s*=\s*\[(.+?)\]\s*[;,]", regex::escape(array)))
        .map_err(|e| InitError::Compile(e.to_string()))?;
    let caps = pattern
        .captures(script)
        .ok_or_else(|| InitError::FunctionBody(array.to_string()))?;

    caps[1]
        .split(',')
        .nth(index)
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .ok_or_else(|| InitError::FunctionBody(array.to_string()))
}

/// Extract `function(a){...}` for `name`, balancing braces.
pub(super) fn function_source(script: &str, name: &str) -> Result<String, InitError> {
    let pattern = Regex::new(&format!(
        r"(?:^|[;,\s]){}\s*=\s*function\(\s*\w+\s*\)\s*\{{",
        regex::escape(name)
    ))
    .map_err(|e| InitError::Compile(e.to_string()))?;

    let found = pattern
        .find(script)
        .ok_or_else(|| InitError::FunctionBody(name.to_string()))?;
    let start = script[found.start()..found.end()]
        .find("function")
        .map(|offset| found.start() + offset)
        .ok_or_else(|| InitError::FunctionBody(name.to_string()))?;
    let open = found.end() - 1;
    let close =
        matching_brace(script, open).ok_or_else(|| InitError::FunctionBody(name.to_string()))?;

    Ok(script[start..=close].to_string())
}

/// Byte offset of the `}` closing the `{` at `open`.
///
/// String literals are skipped so braces inside quotes do not count.
fn matching_brace(script: &str, open: usize) -> Option<usize> {
    let bytes = script.as_bytes();
    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(open) {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == q {
                quote = None;
            }
            continue;
        }
        match b {
            b'"' | b'\'' | b'`' => quote = Some(b),
            b'{' => depth += 1,
            b'}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }

    None
}
