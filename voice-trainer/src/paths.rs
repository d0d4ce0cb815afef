//! Per-user data and adapter path layout.
//!
//! Layout: $VOICE_DATA_DIR/<repo>/<username>/{data.json,model/}
//! Default root: "code_data/voice" (co-located with other project artifacts).
//! The fine-tuning service and the serving side agree on this layout, so the
//! adapter trained from `data.json` is discoverable at serving time.

use std::path::PathBuf;

/// Returns the root directory for training artifacts (env-overridable).
pub fn data_root() -> PathBuf {
    std::env::var("VOICE_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("code_data/voice"))
}

/// Path of the user's chat-format training data.
pub fn user_data_path(username: &str, repo_name: &str) -> PathBuf {
    data_root().join(repo_name).join(username).join("data.json")
}

/// Directory the fine-tuning service writes adapter checkpoints into.
pub fn user_adapter_path(username: &str, repo_name: &str) -> PathBuf {
    data_root().join(repo_name).join(username).join("model")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_scoped_by_repo_then_user() {
        let p = user_data_path("octocat", "widgets");
        assert!(p.ends_with("widgets/octocat/data.json"));
        let m = user_adapter_path("octocat", "widgets");
        assert!(m.ends_with("widgets/octocat/model"));
    }
}
