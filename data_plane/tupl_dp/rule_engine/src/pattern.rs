//! Pattern pre-compilation.
//!
//! Rules are authored as plain strings (`patterns`, `keywords`) and compiled
//! once at load time. A pattern that fails to compile never aborts a load;
//! it is logged and replaced with a sentinel that never matches, so the
//! rest of the rule stays active (§4.1, §7 "Pattern-compile error").

use regex::Regex;

/// A regex compiled from a rule's `patterns[]` entry.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    /// The source text as authored, kept for `DetectionResult.details.matchedPattern`.
    pub source: String,
    pub regex: Regex,
    /// True if the source failed to compile and `regex` is the unmatchable sentinel.
    pub is_sentinel: bool,
}

/// A regex compiled from a rule's `keywords[]` entry, anchored to word
/// boundaries and case-insensitive.
#[derive(Debug, Clone)]
pub struct CompiledKeyword {
    pub source: String,
    pub regex: Regex,
    pub is_sentinel: bool,
}

/// A regex that can never match anything, used as a compile-failure sentinel.
fn sentinel() -> Regex {
    Regex::new(r"^\b$").expect("sentinel pattern is a compile-time constant")
}

/// Compiles a user-authored pattern. Case-insensitive unless the pattern
/// already carries an explicit `(?i)`/`(?-i)` flag.
pub fn compile_pattern(source: &str) -> CompiledPattern {
    let already_flagged = source.starts_with("(?i)") || source.starts_with("(?-i)");
    let effective = if already_flagged {
        source.to_string()
    } else {
        format!("(?i){source}")
    };

    match Regex::new(&effective) {
        Ok(regex) => CompiledPattern {
            source: source.to_string(),
            regex,
            is_sentinel: false,
        },
        Err(err) => {
            tracing::error!(pattern = source, error = %err, "pattern failed to compile, using unmatchable sentinel");
            CompiledPattern {
                source: source.to_string(),
                regex: sentinel(),
                is_sentinel: true,
            }
        }
    }
}

/// Compiles a keyword into a word-boundary, case-insensitive regex.
pub fn compile_keyword(keyword: &str) -> CompiledKeyword {
    let escaped = regex::escape(keyword);
    let pattern = format!(r"(?i)\b{escaped}\b");
    match Regex::new(&pattern) {
        Ok(regex) => CompiledKeyword {
            source: keyword.to_string(),
            regex,
            is_sentinel: false,
        },
        Err(err) => {
            tracing::error!(keyword, error = %err, "keyword failed to compile, using unmatchable sentinel");
            CompiledKeyword {
                source: keyword.to_string(),
                regex: sentinel(),
                is_sentinel: true,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_case_insensitively_by_default() {
        let p = compile_pattern(r"ignore previous instructions");
        assert!(p.regex.is_match("Please IGNORE PREVIOUS INSTRUCTIONS now"));
        assert!(!p.is_sentinel);
    }

    #[test]
    fn invalid_pattern_becomes_sentinel() {
        let p = compile_pattern(r"(unterminated[");
        assert!(p.is_sentinel);
        assert!(!p.regex.is_match("anything at all"));
    }

    #[test]
    fn keyword_respects_word_boundaries() {
        let k = compile_keyword("DAN");
        assert!(k.regex.is_match("you are now DAN"));
        assert!(!k.regex.is_match("Danish pastries are great"));
    }
}
