//! Static screen over the raw source text.
//!
//! Runs before tokenizing, over comments and string literals too, so a
//! denylisted word anywhere in the snippet rejects it.

use super::StrategyFault;

/// Whole words that reject a strategy outright.
const DENYLIST: &[&str] = &[
    // module loading
    "import", "from",
    // files and processes
    "open", "os", "sys", "subprocess",
    // dynamic evaluation
    "eval", "exec", "compile",
    // reflection
    "globals", "locals", "getattr", "setattr", "delattr", "hasattr", "breakpoint",
    // constructs the evaluator does not support
    "lambda", "class", "global", "nonlocal", "yield", "await", "async", "with", "try",
    "raise", "del",
];

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn is_dunder(word: &str) -> bool {
    word.len() > 4 && word.starts_with("__") && word.ends_with("__")
}

pub(super) fn screen(source: &str) -> Result<(), StrategyFault> {
    for word in source.split(|c: char| !is_word_char(c)) {
        if word.is_empty() {
            continue;
        }
        if DENYLIST.contains(&word) || is_dunder(word) {
            return Err(StrategyFault::Denylisted(word.to_string()));
        }
    }
    Ok(())
}
