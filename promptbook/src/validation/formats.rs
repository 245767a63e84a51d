//! Format checks for pipeline URLs and versions.

use regex::Regex;
use std::sync::LazyLock;

#[allow(clippy::expect_used)]
static PIPELINE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https://[A-Za-z0-9.-]+(:[0-9]+)?(/[^\s?#]*)?$").expect("static regex")
});

#[allow(clippy::expect_used)]
static SEMANTIC_VERSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(0|[1-9][0-9]*)\.(0|[1-9][0-9]*)\.(0|[1-9][0-9]*)(-[0-9A-Za-z.-]+)?(\+[0-9A-Za-z.-]+)?$",
    )
    .expect("static regex")
});

/// Returns true if `url` can identify a pipeline.
///
/// Pipeline URLs are absolute `https` URLs without query or fragment.
#[must_use]
pub fn is_valid_pipeline_url(url: &str) -> bool {
    PIPELINE_URL.is_match(url)
}

/// Returns true if `version` is a semantic version.
#[must_use]
pub fn is_valid_promptbook_version(version: &str) -> bool {
    SEMANTIC_VERSION.is_match(version)
}
