//! Pure `raw → CollectionItem` standardisation (SPEC_FULL §4.5).
//!
//! Must be total — it never rejects an input, however malformed, since
//! quality gating happens in a later, separate stage. `content_hash` is
//! computed last, after every other field has its final value, since it is
//! the dedup key and must not shift if an earlier step were reordered.

use chrono::Utc;

use pipeline_core::collection::{CollectionItem, Source};
use pipeline_core::hash::content_hash;

use crate::sources::RawItem;

pub fn standardise(source: Source, raw: RawItem) -> CollectionItem {
    let RawItem {
        id,
        title,
        content,
        source_url,
        subreddit,
        upvotes,
        comments,
        boosts,
        favourites,
        created_utc,
    } = raw;

    let hash = content_hash(&title, &content);

    CollectionItem {
        id,
        title,
        content,
        source,
        source_url,
        collected_at: Utc::now(),
        content_hash: hash,
        subreddit,
        upvotes,
        comments,
        boosts,
        favourites,
        created_utc,
    }
}
