//! Overlay chain behaviour through the public API.

use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;

use layerfs::{
    DirHandle, EntryDescriptor, Filesystem, FsError, LanguageAnnotator, LanguageSet, MemoryFs, OverlayChain,
    OverlaySource, ReadLimit, merge_listings,
};
use rstest::rstest;

// =============================================================================
// FIXTURES
// =============================================================================

fn annotator() -> LanguageAnnotator {
    LanguageAnnotator::new(LanguageSet::from_iter(["en", "sv"]))
}

async fn store(files: &[(&str, &str)]) -> Arc<MemoryFs> {
    let fs = MemoryFs::new();
    for (path, data) in files {
        fs.create(Path::new(path), data.as_bytes()).await.unwrap();
    }
    Arc::new(fs)
}

/// Two sources, each holding the same names in `blog/`.
async fn bilingual() -> (OverlayChain, Arc<MemoryFs>, Arc<MemoryFs>) {
    let files = |origin: &'static str| {
        [
            ("blog/a.txt", origin),
            ("blog/greeting.en.txt", origin),
            ("blog/greeting.sv.txt", origin),
        ]
    };
    let a = store(&files("A")).await;
    let b = store(&files("B")).await;
    let chain = OverlayChain::new(
        annotator(),
        [
            OverlaySource::new(a.clone()).with_lang("en"),
            OverlaySource::new(b.clone()).with_lang("sv"),
        ],
    );
    (chain, a, b)
}

fn summary(entries: &[EntryDescriptor]) -> Vec<(String, Option<usize>, u32)> {
    entries
        .iter()
        .map(|e| (e.raw_name.clone(), e.opener.as_ref().and_then(|o| o.source), e.weight))
        .collect()
}

// =============================================================================
// MERGED LISTINGS
// =============================================================================

#[tokio::test]
async fn own_language_variant_wins_per_source() {
    let (chain, _, _) = bilingual().await;
    let entries = chain.list(Path::new("blog")).await.unwrap();

    assert_eq!(
        summary(&entries),
        vec![
            ("a.txt".to_string(), Some(0), 0),
            ("greeting.en.txt".to_string(), Some(0), 2),
            ("a.txt".to_string(), Some(1), 0),
            ("greeting.sv.txt".to_string(), Some(1), 2),
        ]
    );
}

#[tokio::test]
async fn surviving_variants_read_from_their_source() {
    let (chain, _, _) = bilingual().await;
    let entries = chain.list(Path::new("blog")).await.unwrap();

    let mut contents = Vec::new();
    for entry in entries.iter().filter(|e| e.raw_name.starts_with("greeting")) {
        let handle = chain.open_entry(entry).await.unwrap();
        let data = handle.into_file().unwrap().read_to_end().await.unwrap();
        contents.push((entry.raw_name.clone(), String::from_utf8(data).unwrap()));
    }
    assert_eq!(
        contents,
        vec![
            ("greeting.en.txt".to_string(), "A".to_string()),
            ("greeting.sv.txt".to_string(), "B".to_string()),
        ]
    );
}

#[tokio::test]
async fn inherited_languages_show_in_canonical_names() {
    let (chain, _, _) = bilingual().await;
    let entries = chain.list(Path::new("blog")).await.unwrap();
    let plain: Vec<_> = entries.iter().filter(|e| e.raw_name == "a.txt").collect();

    assert_eq!(plain[0].canonical_name, "a.en.txt");
    assert_eq!(plain[1].canonical_name, "a.sv.txt");
    assert!(plain.iter().all(|e| e.translation_base == "a"));
}

#[rstest]
#[case::two_sources(2)]
#[case::three_sources(3)]
#[case::five_sources(5)]
#[tokio::test]
async fn equal_weights_go_to_the_earliest_source(#[case] count: usize) {
    let mut sources = Vec::new();
    for _ in 0..count {
        let fs = store(&[("doc.en.md", "x")]).await;
        // No source declares "en", so every copy weighs 1.
        sources.push(OverlaySource::new(fs).with_lang("sv"));
    }
    let chain = OverlayChain::new(annotator(), sources);

    for _ in 0..3 {
        let entries = chain.list(Path::new("")).await.unwrap();
        assert_eq!(summary(&entries), vec![("doc.en.md".to_string(), Some(0), 1)]);
    }
}

#[tokio::test]
async fn marker_outranks_inherited_language() {
    let unmarked = store(&[("post.md", "plain")]).await;
    let marked = store(&[("post.md", "plain"), ("post.en.md", "marked")]).await;
    let chain = OverlayChain::new(
        annotator(),
        [OverlaySource::new(unmarked).with_lang("en"), OverlaySource::new(marked)],
    );

    let entries = chain.list(Path::new("")).await.unwrap();
    let reconciled = merge_listings([entries]);
    let survivors: Vec<_> = reconciled
        .iter()
        .filter(|e| e.canonical_name == "post.en.md")
        .map(|e| e.raw_name.as_str())
        .collect();
    assert_eq!(survivors, vec!["post.en.md"]);
}

#[tokio::test]
async fn limits_apply_after_resolution() {
    let (chain, _, _) = bilingual().await;
    let names = chain
        .read_dir_names(&DirHandle::new("blog"), ReadLimit::AtMost(2))
        .await
        .unwrap();
    assert_eq!(names, vec!["a.txt", "greeting.en.txt"]);
}

#[tokio::test]
async fn sources_missing_the_directory_are_skipped() {
    let (chain, a, _) = bilingual().await;
    a.create(Path::new("only-a/x.txt"), b"x").await.unwrap();

    let names = chain
        .read_dir_names(&DirHandle::new("only-a"), ReadLimit::All)
        .await
        .unwrap();
    assert_eq!(names, vec!["x.txt"]);

    let entries = chain.list(Path::new("nowhere")).await.unwrap();
    assert!(entries.is_empty());
}

#[tokio::test]
async fn listing_a_file_is_a_backing_error() {
    let (chain, _, _) = bilingual().await;
    let err = chain.list(Path::new("blog/a.txt")).await.unwrap_err();
    assert!(matches!(err, FsError::Backing { source_index: Some(0), .. }), "{err:?}");
}

// =============================================================================
// READ-ONLY ENFORCEMENT
// =============================================================================

#[derive(Debug, Clone, Copy)]
enum Mutation {
    Create,
    Mkdir,
    Remove,
    Rename,
    Chmod,
    Chtimes,
}

async fn mutate(fs: &dyn Filesystem, op: Mutation, path: &Path) -> Result<(), FsError> {
    match op {
        Mutation::Create => fs.create(path, b"new").await,
        Mutation::Mkdir => fs.mkdir(path).await,
        Mutation::Remove => fs.remove(path).await,
        Mutation::Rename => fs.rename(path, Path::new("blog/renamed.txt")).await,
        Mutation::Chmod => fs.chmod(path, 0o600).await,
        Mutation::Chtimes => fs.chtimes(path, SystemTime::UNIX_EPOCH, SystemTime::UNIX_EPOCH).await,
    }
}

#[rstest]
#[tokio::test]
async fn mutations_are_rejected(
    #[values(
        Mutation::Create,
        Mutation::Mkdir,
        Mutation::Remove,
        Mutation::Rename,
        Mutation::Chmod,
        Mutation::Chtimes
    )]
    op: Mutation,
    #[values("blog/a.txt", "blog", "blog/missing.txt", "")] path: &str,
) {
    let (chain, a, b) = bilingual().await;
    let before_a = a.list(Path::new("blog")).await.unwrap();
    let before_b = b.list(Path::new("blog")).await.unwrap();

    let err = mutate(&chain, op, Path::new(path)).await.unwrap_err();
    assert!(err.is_permission_denied(), "{op:?} on {path:?}: {err:?}");
    assert!(chain.read_only());

    assert_eq!(a.list(Path::new("blog")).await.unwrap(), before_a);
    assert_eq!(b.list(Path::new("blog")).await.unwrap(), before_b);
    assert_eq!(a.read(Path::new("blog/a.txt")).await.unwrap(), b"A");
}
