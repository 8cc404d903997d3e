use std::collections::HashMap;
use std::path::PathBuf;

use quarry_core::ContentDigest;

/// The last recorded indexing outcome for one absolute path.
///
/// `had_errors` marks the shard as provisional: it came from a TU that did
/// not compile cleanly, so even a same-digest re-run that succeeds is
/// allowed to replace it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShardVersion {
    pub digest: ContentDigest,
    pub had_errors: bool,
}

impl ShardVersion {
    /// The staleness rule: a freshly observed `(digest, had_errors)` pair
    /// warrants a new shard when nothing was recorded yet, the content
    /// changed, or a previously broken file now analyzed cleanly.
    ///
    /// Everything else is a no-op, which is what makes re-analysis of an
    /// unchanged clean file free.
    pub fn needs_update(
        prev: Option<&ShardVersion>,
        digest: &ContentDigest,
        had_errors: bool,
    ) -> bool {
        match prev {
            None => true,
            Some(prev) => prev.digest != *digest || (prev.had_errors && !had_errors),
        }
    }
}

pub(crate) type VersionTable = HashMap<PathBuf, ShardVersion>;
