//! Per-file review pipeline: diff → hunks → generation → inline comments.
//!
//! Per changed file: fetch the PR's file list, split the file's patch into
//! hunks, truncate oversized hunks (generation input only), stream-generate
//! one comment per hunk, anchor it at the first added line, post it.
//!
//! Failure policy is partial-tolerance: one bad hunk or file never aborts
//! review of the rest of the PR. Every unit of work records its outcome in
//! the returned [`ReviewReport`] so callers see more than log lines.
//!
//! Hunks are processed strictly sequentially — the generation backend is a
//! shared, capacity-limited GPU resource and serializing requests bounds the
//! load on it. Collaborators are plain trait seams (native async fn futures,
//! no `async-trait`, no `Box<dyn ...>`), which is also what makes the
//! pipeline testable without a network.

use std::future::Future;

use futures::StreamExt;
use futures::stream::BoxStream;
use tracing::{debug, info, warn};

use voice_llm_service::{GenerationRequest, VllmService};

use crate::errors::{Error, PrResult};
use crate::github::{GitHubClient, PrFile, PrLocator};
use crate::parser::{self, Hunk, MAX_HUNK_LINES};

/// Finite, single-pass stream of generated comment chunks.
pub type CommentStream = BoxStream<'static, Result<String, Error>>;

/// Source of a PR's changed-files list.
pub trait ChangedFiles: Send + Sync {
    fn list_changed_files<'a>(
        &'a self,
        pr: &'a PrLocator,
    ) -> impl Future<Output = PrResult<Vec<PrFile>>> + Send + 'a;
}

/// Streams model output for one hunk of code.
pub trait CommentGenerator: Send + Sync {
    fn generate_stream<'a>(
        &'a self,
        code: &'a str,
        file_path: &'a str,
        reviewer: &'a str,
        pr: &'a PrLocator,
    ) -> impl Future<Output = PrResult<CommentStream>> + Send + 'a;
}

/// Posts one inline comment; `Ok(false)` means the provider rejected it.
pub trait CommentSink: Send + Sync {
    fn post_inline<'a>(
        &'a self,
        pr: &'a PrLocator,
        body: &'a str,
        path: &'a str,
        line: u32,
    ) -> impl Future<Output = PrResult<bool>> + Send + 'a;
}

impl ChangedFiles for GitHubClient {
    fn list_changed_files<'a>(
        &'a self,
        pr: &'a PrLocator,
    ) -> impl Future<Output = PrResult<Vec<PrFile>>> + Send + 'a {
        self.list_pr_files(pr)
    }
}

impl CommentSink for GitHubClient {
    fn post_inline<'a>(
        &'a self,
        pr: &'a PrLocator,
        body: &'a str,
        path: &'a str,
        line: u32,
    ) -> impl Future<Output = PrResult<bool>> + Send + 'a {
        self.post_review_comment(pr, body, path, line)
    }
}

impl CommentGenerator for VllmService {
    fn generate_stream<'a>(
        &'a self,
        code: &'a str,
        file_path: &'a str,
        reviewer: &'a str,
        pr: &'a PrLocator,
    ) -> impl Future<Output = PrResult<CommentStream>> + Send + 'a {
        async move {
            let req = GenerationRequest {
                code,
                file_path,
                reviewer,
                repo_owner: &pr.owner,
                repo_name: &pr.repo,
            };
            let stream = self.stream_review_comment(&req).await?;
            Ok(stream.map(|r| r.map_err(Error::from)).boxed())
        }
    }
}

/// Outcome of one hunk's generate-and-post attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HunkOutcome {
    /// Comment posted, anchored at `line` of the new file.
    Posted { line: u32 },
    /// Generation produced an empty (or failed) comment; nothing posted.
    SkippedEmpty,
    /// The provider rejected the comment (or transport failed mid-post).
    PostFailed { line: u32, reason: String },
}

/// Per-file review result.
#[derive(Debug, Clone)]
pub struct FileReport {
    pub path: String,
    pub outcomes: Vec<HunkOutcome>,
    /// Set when the file-list fetch failed and this file's review aborted.
    pub error: Option<String>,
}

impl FileReport {
    fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
            outcomes: Vec::new(),
            error: None,
        }
    }
}

/// Aggregated per-PR review result.
#[derive(Debug, Clone, Default)]
pub struct ReviewReport {
    pub files: Vec<FileReport>,
}

impl ReviewReport {
    pub fn posted(&self) -> usize {
        self.count(|o| matches!(o, HunkOutcome::Posted { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, HunkOutcome::SkippedEmpty))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, HunkOutcome::PostFailed { .. }))
    }

    fn count(&self, pred: impl Fn(&HunkOutcome) -> bool) -> usize {
        self.files
            .iter()
            .flat_map(|f| f.outcomes.iter())
            .filter(|o| pred(o))
            .count()
    }
}

/// The review pipeline over its three collaborators.
pub struct ReviewPipeline<F, G, S> {
    files: F,
    generator: G,
    sink: S,
    max_hunk_lines: usize,
}

impl<F, G, S> ReviewPipeline<F, G, S>
where
    F: ChangedFiles,
    G: CommentGenerator,
    S: CommentSink,
{
    pub fn new(files: F, generator: G, sink: S) -> Self {
        Self {
            files,
            generator,
            sink,
            max_hunk_lines: MAX_HUNK_LINES,
        }
    }

    /// Overrides the truncation budget (tests, constrained models).
    pub fn with_max_hunk_lines(mut self, max_hunk_lines: usize) -> Self {
        self.max_hunk_lines = max_hunk_lines;
        self
    }

    /// Reviews every changed file of the PR sequentially.
    ///
    /// One file's failure never blocks the rest; only the initial file-list
    /// fetch can fail the call as a whole.
    pub async fn review_all_files(
        &self,
        pr: &PrLocator,
        reviewer: &str,
    ) -> PrResult<ReviewReport> {
        let files = self.files.list_changed_files(pr).await?;
        debug!(
            "review: {} changed file(s) in {}/{}#{}",
            files.len(),
            pr.owner,
            pr.repo,
            pr.number
        );

        let mut report = ReviewReport::default();
        for file in &files {
            report
                .files
                .push(self.review_file(pr, &file.filename, reviewer).await);
        }

        info!(
            "review: done files={} posted={} skipped={} failed={}",
            report.files.len(),
            report.posted(),
            report.skipped(),
            report.failed()
        );
        Ok(report)
    }

    /// Reviews a single file of the PR: zero or more posted comments.
    ///
    /// Never returns an error — fetch failures are recorded on the report and
    /// abort this file only.
    pub async fn review_file(
        &self,
        pr: &PrLocator,
        file_path: &str,
        reviewer: &str,
    ) -> FileReport {
        let mut report = FileReport::new(file_path);

        let files = match self.files.list_changed_files(pr).await {
            Ok(f) => f,
            Err(e) => {
                warn!("review: fetching PR files failed for {file_path}: {e}");
                report.error = Some(e.to_string());
                return report;
            }
        };

        let Some(entry) = files.into_iter().find(|f| f.filename == file_path) else {
            // This file produced no diff; nothing to review.
            debug!("review: {file_path} not part of the PR diff");
            return report;
        };

        let patch = entry.patch.unwrap_or_default();
        let mut hunks = parser::split_into_hunks(&patch);
        debug!("review: split {file_path} into {} hunk(s)", hunks.len());
        if hunks.is_empty() {
            // Fall back to a single synthetic hunk so a comment can still be
            // attempted against line 1.
            hunks.push(Hunk {
                new_start: 1,
                text: patch,
            });
        }

        for hunk in &hunks {
            let truncated = parser::truncate_for_generation(&hunk.text, self.max_hunk_lines);
            let code = truncated.as_deref().unwrap_or(&hunk.text);

            let comment = self.collect_comment(code, file_path, reviewer, pr).await;
            let comment = comment.trim();
            if comment.is_empty() {
                debug!("review: empty comment for hunk at +{}, skipping", hunk.new_start);
                report.outcomes.push(HunkOutcome::SkippedEmpty);
                continue;
            }

            // Positions always come from the original hunk text; truncation
            // applies to the generation copy only.
            let positions = parser::extract_added_line_numbers(&hunk.text, hunk.new_start);
            let line = positions.first().copied().unwrap_or(hunk.new_start);

            match self.sink.post_inline(pr, comment, file_path, line).await {
                Ok(true) => {
                    info!("review: posted comment at {file_path}:{line}");
                    report.outcomes.push(HunkOutcome::Posted { line });
                }
                Ok(false) => {
                    report.outcomes.push(HunkOutcome::PostFailed {
                        line,
                        reason: "provider rejected comment".into(),
                    });
                }
                Err(e) => {
                    warn!("review: posting at {file_path}:{line} failed: {e}");
                    report.outcomes.push(HunkOutcome::PostFailed {
                        line,
                        reason: e.to_string(),
                    });
                }
            }
        }

        report
    }

    /// Consumes the generation stream to completion into one comment string.
    ///
    /// Any generation failure — at setup or mid-stream — is downgraded to an
    /// empty comment, which the caller then skips.
    async fn collect_comment(
        &self,
        code: &str,
        file_path: &str,
        reviewer: &str,
        pr: &PrLocator,
    ) -> String {
        let mut stream = match self
            .generator
            .generate_stream(code, file_path, reviewer, pr)
            .await
        {
            Ok(s) => s,
            Err(e) => {
                warn!("review: generation failed for {file_path}, treating as empty: {e}");
                return String::new();
            }
        };

        let mut comment = String::new();
        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(piece) => comment.push_str(&piece),
                Err(e) => {
                    warn!("review: generation stream broke for {file_path}, dropping comment: {e}");
                    return String::new();
                }
            }
        }
        comment
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ProviderError;
    use futures::stream;
    use std::sync::Mutex;

    fn pr() -> PrLocator {
        PrLocator {
            owner: "acme".into(),
            repo: "widgets".into(),
            number: 7,
        }
    }

    fn file(name: &str, patch: Option<&str>) -> PrFile {
        PrFile {
            filename: name.into(),
            patch: patch.map(String::from),
        }
    }

    #[derive(Default)]
    struct MockFiles {
        files: Vec<PrFile>,
        /// 1-based index of the fetch call that should fail.
        fail_on_call: Option<usize>,
        calls: Mutex<usize>,
    }

    impl ChangedFiles for MockFiles {
        fn list_changed_files<'a>(
            &'a self,
            _pr: &'a PrLocator,
        ) -> impl Future<Output = PrResult<Vec<PrFile>>> + Send + 'a {
            async move {
                let call = {
                    let mut calls = self.calls.lock().unwrap();
                    *calls += 1;
                    *calls
                };
                if Some(call) == self.fail_on_call {
                    return Err(Error::Provider(ProviderError::Server(502)));
                }
                Ok(self.files.clone())
            }
        }
    }

    #[derive(Default)]
    struct MockGen {
        text: String,
        fail: bool,
        seen: Mutex<Vec<String>>,
    }

    impl MockGen {
        fn saying(text: &str) -> Self {
            Self {
                text: text.into(),
                ..Default::default()
            }
        }
    }

    impl CommentGenerator for MockGen {
        fn generate_stream<'a>(
            &'a self,
            code: &'a str,
            _file_path: &'a str,
            _reviewer: &'a str,
            _pr: &'a PrLocator,
        ) -> impl Future<Output = PrResult<CommentStream>> + Send + 'a {
            async move {
                self.seen.lock().unwrap().push(code.to_string());
                if self.fail {
                    return Err(Error::Other("inference backend down".into()));
                }
                let chunks: Vec<Result<String, Error>> = self
                    .text
                    .split_inclusive(' ')
                    .map(|c| Ok(c.to_string()))
                    .collect();
                Ok(stream::iter(chunks).boxed())
            }
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        reject: bool,
        posts: Mutex<Vec<(String, u32, String)>>,
    }

    impl CommentSink for RecordingSink {
        fn post_inline<'a>(
            &'a self,
            _pr: &'a PrLocator,
            body: &'a str,
            path: &'a str,
            line: u32,
        ) -> impl Future<Output = PrResult<bool>> + Send + 'a {
            async move {
                self.posts
                    .lock()
                    .unwrap()
                    .push((path.to_string(), line, body.to_string()));
                Ok(!self.reject)
            }
        }
    }

    const PATCH: &str = "@@ -10,3 +10,4 @@ def f():\n a\n-b\n+b2\n+c\n d\n";

    #[tokio::test]
    async fn posts_one_comment_anchored_at_first_added_line() {
        let files = MockFiles {
            files: vec![file("f.py", Some(PATCH))],
            ..Default::default()
        };
        let sink = RecordingSink::default();
        let pipeline = ReviewPipeline::new(files, MockGen::saying("tighten this up"), sink);

        let report = pipeline.review_file(&pr(), "f.py", "octocat").await;

        assert_eq!(report.outcomes, vec![HunkOutcome::Posted { line: 11 }]);
        let posts = pipeline.sink.posts.lock().unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].0, "f.py");
        assert_eq!(posts[0].1, 11);
        assert_eq!(posts[0].2, "tighten this up");
    }

    #[tokio::test]
    async fn empty_comment_is_silently_skipped() {
        let files = MockFiles {
            files: vec![file("f.py", Some(PATCH))],
            ..Default::default()
        };
        let pipeline =
            ReviewPipeline::new(files, MockGen::saying("  \n"), RecordingSink::default());

        let report = pipeline.review_file(&pr(), "f.py", "octocat").await;

        assert_eq!(report.outcomes, vec![HunkOutcome::SkippedEmpty]);
        assert!(pipeline.sink.posts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn generation_failure_swallowed_as_empty_comment() {
        let files = MockFiles {
            files: vec![file("f.py", Some(PATCH))],
            ..Default::default()
        };
        let generator = MockGen {
            fail: true,
            ..Default::default()
        };
        let pipeline = ReviewPipeline::new(files, generator, RecordingSink::default());

        let report = pipeline.review_file(&pr(), "f.py", "octocat").await;

        assert_eq!(report.outcomes, vec![HunkOutcome::SkippedEmpty]);
        assert!(pipeline.sink.posts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn hunk_without_additions_anchors_at_new_start() {
        let patch = "@@ -4,3 +4,2 @@\n a\n-b\n c\n";
        let files = MockFiles {
            files: vec![file("f.py", Some(patch))],
            ..Default::default()
        };
        let pipeline =
            ReviewPipeline::new(files, MockGen::saying("why remove this?"), RecordingSink::default());

        let report = pipeline.review_file(&pr(), "f.py", "octocat").await;

        assert_eq!(report.outcomes, vec![HunkOutcome::Posted { line: 4 }]);
    }

    #[tokio::test]
    async fn missing_patch_uses_synthetic_hunk_at_line_one() {
        let files = MockFiles {
            files: vec![file("blob.bin", None)],
            ..Default::default()
        };
        let pipeline =
            ReviewPipeline::new(files, MockGen::saying("binary?"), RecordingSink::default());

        let report = pipeline.review_file(&pr(), "blob.bin", "octocat").await;

        assert_eq!(report.outcomes, vec![HunkOutcome::Posted { line: 1 }]);
    }

    #[tokio::test]
    async fn file_absent_from_diff_is_a_noop() {
        let files = MockFiles {
            files: vec![file("other.py", Some(PATCH))],
            ..Default::default()
        };
        let pipeline =
            ReviewPipeline::new(files, MockGen::saying("hm"), RecordingSink::default());

        let report = pipeline.review_file(&pr(), "f.py", "octocat").await;

        assert!(report.outcomes.is_empty());
        assert!(report.error.is_none());
        assert!(pipeline.sink.posts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn rejected_post_recorded_and_loop_continues() {
        let patch = concat!(
            "@@ -1,1 +1,2 @@\n a\n+b\n",
            "@@ -10,1 +11,2 @@\n c\n+d\n",
        );
        let files = MockFiles {
            files: vec![file("f.py", Some(patch))],
            ..Default::default()
        };
        let sink = RecordingSink {
            reject: true,
            ..Default::default()
        };
        let pipeline = ReviewPipeline::new(files, MockGen::saying("nope"), sink);

        let report = pipeline.review_file(&pr(), "f.py", "octocat").await;

        // Both hunks attempted despite the first rejection.
        assert_eq!(report.outcomes.len(), 2);
        assert!(report
            .outcomes
            .iter()
            .all(|o| matches!(o, HunkOutcome::PostFailed { .. })));
        assert_eq!(pipeline.sink.posts.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn one_failing_file_does_not_block_the_others() {
        let files = MockFiles {
            files: vec![
                file("one.py", Some(PATCH)),
                file("two.py", Some(PATCH)),
                file("three.py", Some(PATCH)),
            ],
            // Call 1 lists files for the PR, calls 2-4 are per-file fetches;
            // fail the fetch backing two.py.
            fail_on_call: Some(3),
            calls: Mutex::new(0),
        };
        let pipeline =
            ReviewPipeline::new(files, MockGen::saying("ok"), RecordingSink::default());

        let report = pipeline.review_all_files(&pr(), "octocat").await.unwrap();

        assert_eq!(report.files.len(), 3);
        assert!(report.files[0].error.is_none());
        assert!(report.files[1].error.is_some());
        assert!(report.files[2].error.is_none());

        let posts = pipeline.sink.posts.lock().unwrap();
        let posted_paths: Vec<&str> = posts.iter().map(|p| p.0.as_str()).collect();
        assert_eq!(posted_paths, vec!["one.py", "three.py"]);
    }

    #[tokio::test]
    async fn oversized_hunk_truncated_for_generation_but_mapped_from_original() {
        // 150 context lines, one addition, 150 more context lines: the
        // addition sits in the region truncation cuts out.
        let mut patch = String::from("@@ -1,301 +1,302 @@\n");
        for _ in 0..150 {
            patch.push_str(" ctx\n");
        }
        patch.push_str("+needle\n");
        for _ in 0..150 {
            patch.push_str(" ctx\n");
        }

        let files = MockFiles {
            files: vec![file("big.py", Some(&patch))],
            ..Default::default()
        };
        let pipeline =
            ReviewPipeline::new(files, MockGen::saying("large change"), RecordingSink::default());

        let report = pipeline.review_file(&pr(), "big.py", "octocat").await;

        // Position computed against the untruncated hunk.
        assert_eq!(report.outcomes, vec![HunkOutcome::Posted { line: 151 }]);

        let seen = pipeline.generator.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].contains("... (truncated) ..."));
        assert!(!seen[0].contains("+needle"));
    }

    #[tokio::test]
    async fn streamed_chunks_concatenate_in_order() {
        let files = MockFiles {
            files: vec![file("f.py", Some(PATCH))],
            ..Default::default()
        };
        let pipeline = ReviewPipeline::new(
            files,
            MockGen::saying("one two three"),
            RecordingSink::default(),
        );

        pipeline.review_file(&pr(), "f.py", "octocat").await;

        let posts = pipeline.sink.posts.lock().unwrap();
        assert_eq!(posts[0].2, "one two three");
    }
}
