/// Placeholder shown when a program produced nothing on any stream
pub const NO_OUTPUT: &str = "[No Output]";

/// Maximum number of characters kept from a program's stdout
pub const OUTPUT_PREVIEW_CHARS: usize = 4096;

/// Compare program output with expected output
///
/// Trailing whitespace on each line and trailing blank lines are ignored.
pub fn compare_output(actual: &str, expected: &str) -> bool {
    normalize(actual) == normalize(expected)
}

fn normalize(s: &str) -> Vec<&str> {
    let mut lines: Vec<&str> = s.lines().map(str::trim_end).collect();
    while lines.last().is_some_and(|line| line.is_empty()) {
        lines.pop();
    }
    lines
}

/// Keep at most `max_chars` characters of `s`
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

/// Pick the text a user sees for a run: stdout, then stderr, then compile output
pub fn display_output(stdout: &str, stderr: &str, compile_output: &str) -> String {
    [stdout, stderr, compile_output]
        .into_iter()
        .find(|s| !s.trim().is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| NO_OUTPUT.to_string())
}
