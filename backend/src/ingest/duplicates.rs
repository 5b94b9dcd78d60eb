//! Re-upload detection against `upload_history`.
//!
//! The answer is advisory. Nothing in the store prevents the same file from being
//! loaded twice; callers decide whether to warn or to block.

use crate::config::DuplicateScope;
use crate::store::{HashLookup, Store, StoreError};
use common::model::datasource::DataSourceTag;
use common::model::outcome::{DuplicateKind, DuplicateMatch};

/// Looks for an earlier upload with the same content, then with the same file name.
///
/// The content lookup honours `scope`; the file name lookup spans every source.
pub async fn find_duplicate(
    store: &dyn Store,
    scope: DuplicateScope,
    content_hash: &str,
    filename: &str,
    data_source: DataSourceTag,
) -> Result<Option<DuplicateMatch>, StoreError> {
    let lookup = match scope {
        DuplicateScope::SameSource => HashLookup::Source(data_source),
        DuplicateScope::AllSources => HashLookup::Any,
    };

    if let Some(record) = store.find_by_hash(content_hash, lookup).await? {
        return Ok(Some(DuplicateMatch {
            kind: DuplicateKind::Content,
            record,
        }));
    }

    Ok(store
        .find_by_filename(filename)
        .await?
        .map(|record| DuplicateMatch {
            kind: DuplicateKind::Filename,
            record,
        }))
}
