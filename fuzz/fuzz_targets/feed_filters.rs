#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use runstate_store::{ChangeFeed, FilterKind, GlobPattern, MemoryStore, VariableStore};

#[derive(Debug, Arbitrary)]
struct Input {
    prefix: String,
    accept: Option<String>,
    reject: Option<String>,
    dirs: Vec<String>,
}

fuzz_target!(|input: Input| {
    let store = MemoryStore::new();
    let mut feed = store.subscription();
    if feed.subscribe(&input.prefix).is_err() {
        return;
    }
    if let Some(glob) = &input.accept {
        let _ = feed.add_filter(FilterKind::Accept, glob);
    }
    if let Some(glob) = &input.reject {
        let _ = feed.add_filter(FilterKind::Reject, glob);
    }

    for dir in &input.dirs {
        let _ = store.mkdir(&format!("/{}", dir));
    }

    // Everything delivered must satisfy the prefix and filters
    while let Ok(record) = feed.read() {
        assert!(record.path.starts_with(&input.prefix));
        if let Some(glob) = &input.accept {
            assert!(GlobPattern::new(glob).matches(&record.path));
        }
        if let Some(glob) = &input.reject {
            assert!(!GlobPattern::new(glob).matches(&record.path));
        }
    }
});
