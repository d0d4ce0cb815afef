//! Review prompt assembly.
//!
//! The same system prompt is used at training time (scraped examples) and at
//! inference time, so the adapter sees identical framing in both phases.

/// System prompt for code review. `{USERNAME}` is substituted with the
/// reviewer whose voice the adapter was trained on.
pub const SYSTEM_PROMPT: &str = "You are {USERNAME}, a developer who writes code review comments on GitHub.\n\
Review the code below and provide constructive feedback in your personal comment style.\n\
Be specific, helpful, and focus on important issues. Your tone should be snarky. Your comment should only be 1 line long. Do not include any code in your comment.\n";

/// Renders the system prompt for a concrete reviewer.
pub fn system_prompt_for(username: &str) -> String {
    SYSTEM_PROMPT.replace("{USERNAME}", username)
}

/// Renders the user-turn content for a piece of code under review.
pub fn user_prompt_for(file_path: &str, code: &str) -> String {
    format!("File: {file_path}\n\nCode:\n```\n{code}\n```")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_substituted() {
        let p = system_prompt_for("octocat");
        assert!(p.starts_with("You are octocat,"));
        assert!(!p.contains("{USERNAME}"));
    }

    #[test]
    fn user_prompt_wraps_code_fence() {
        let p = user_prompt_for("src/lib.rs", "fn main() {}");
        assert!(p.starts_with("File: src/lib.rs\n"));
        assert!(p.contains("```\nfn main() {}\n```"));
    }
}
