//! Prefix routing, stacking, and on-disk trees built from configuration.

use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use layerfs::{
    DirHandle, Filesystem, LanguageAnnotator, LanguageSet, LayerConfig, MemoryFs, OverlayChain, OverlaySource,
    PrefixRouter, ReadLimit, RootMapping, SourceConfig, lstat_if_possible,
};
use rstest::rstest;

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

fn temp_dir() -> PathBuf {
    let id = TEMP_COUNTER.fetch_add(1, Ordering::SeqCst);
    env::temp_dir().join(format!("layerfs-router-{}-{}", std::process::id(), id))
}

async fn cleanup(dir: &Path) {
    let _ = tokio::fs::remove_dir_all(dir).await;
}

fn annotator() -> LanguageAnnotator {
    LanguageAnnotator::new(LanguageSet::from_iter(["en", "sv"]))
}

async fn store(files: &[&str]) -> Arc<MemoryFs> {
    let fs = MemoryFs::new();
    for path in files {
        fs.create(Path::new(path), path.as_bytes()).await.unwrap();
    }
    Arc::new(fs)
}

// =============================================================================
// RESOLUTION
// =============================================================================

#[rstest]
#[case::longer_prefix_wins("/blog/post.md", "/real/blog/post.md")]
#[case::fallback("/about.md", "/fallback/about.md")]
#[case::nested_prefix("/blog/drafts/x.md", "/drafts/x.md")]
#[case::prefix_itself("/blog", "/real/blog")]
#[case::not_a_component_prefix("/blogger/x.md", "/fallback/blogger/x.md")]
#[case::uncleaned_input("/blog//./post.md", "/real/blog/post.md")]
fn resolves_to_longest_prefix(#[case] virtual_path: &str, #[case] expected: &str) {
    let router = PrefixRouter::from_pairs(
        Arc::new(MemoryFs::new()),
        [("/", "/fallback"), ("/blog", "/real/blog"), ("/blog/drafts", "/drafts")],
    );
    let res = router.resolve(Path::new(virtual_path));
    assert!(res.matched());
    assert_eq!(res.real_path, PathBuf::from(expected));
}

#[test]
fn last_duplicate_registration_wins() {
    let router = PrefixRouter::new(
        Arc::new(MemoryFs::new()),
        [
            RootMapping::new("/docs", "/v1").with_lang("en"),
            RootMapping::new("/blog", "/blog"),
            RootMapping::new("/docs/", "/v2").with_lang("sv"),
        ],
    );
    let res = router.resolve(Path::new("/docs/a.md"));
    assert_eq!(res.real_path, PathBuf::from("/v2/a.md"));
    assert_eq!(res.mapping.and_then(|m| m.lang.as_deref()), Some("sv"));

    let roots: Vec<_> = router.list_roots().iter().map(|m| m.from.clone()).collect();
    assert_eq!(roots, vec![PathBuf::from("/docs"), PathBuf::from("/blog")]);
}

#[tokio::test]
async fn root_listing_is_stable() {
    let base = store(&["x/a.md", "y/b.md", "z/c.md"]).await;
    let router = PrefixRouter::from_pairs(base, [("/zeta", "z"), ("/alpha", "x"), ("/mid", "y")]);

    let expected = vec!["zeta", "alpha", "mid"];
    for _ in 0..3 {
        let _ = router.stat(Path::new("/alpha/a.md")).await.unwrap();
        let _ = router.list(Path::new("/mid")).await.unwrap();
        let names = router
            .read_dir_names(&DirHandle::new("/"), ReadLimit::All)
            .await
            .unwrap();
        assert_eq!(names, expected);
    }
}

// =============================================================================
// STACKING
// =============================================================================

#[tokio::test]
async fn router_over_a_chain() {
    let en = store(&["content/post.md", "content/about.en.md"]).await;
    let sv = store(&["content/post.md", "content/about.sv.md"]).await;
    let chain = OverlayChain::new(
        annotator(),
        [OverlaySource::new(en).with_lang("en"), OverlaySource::new(sv).with_lang("sv")],
    );
    let router = PrefixRouter::new(Arc::new(chain), [RootMapping::new("/site", "content")])
        .with_annotator(annotator());

    let entries = router.list(Path::new("/site")).await.unwrap();
    let names: Vec<_> = entries.iter().map(|e| e.canonical_name.as_str()).collect();
    assert_eq!(names, vec!["about.en.md", "post.en.md", "about.sv.md", "post.sv.md"]);
    assert!(entries.iter().all(|e| e.virtual_root.as_deref() == Some("/site")));

    // Files can't be opened through the chain; the router passes that on.
    let err = router.read(Path::new("/site/post.md")).await.unwrap_err();
    assert!(err.is_unsupported());
}

#[tokio::test]
async fn chain_over_routers() {
    let disk = store(&["en/blog/a.md", "sv/blog/a.md", "sv/blog/b.sv.md"]).await;
    let en = PrefixRouter::from_pairs(disk.clone(), [("/", "en")]);
    let sv = PrefixRouter::from_pairs(disk, [("/", "sv")]);
    let chain = OverlayChain::new(
        annotator(),
        [OverlaySource::new(Arc::new(en)).with_lang("en"), OverlaySource::new(Arc::new(sv)).with_lang("sv")],
    );

    let entries = chain.list(Path::new("/blog")).await.unwrap();
    let names: Vec<_> = entries.iter().map(|e| e.canonical_name.as_str()).collect();
    assert_eq!(names, vec!["a.en.md", "a.sv.md", "b.sv.md"]);

    let found = chain.stat(Path::new("/blog/b.sv.md")).await.unwrap();
    assert_eq!(found.opener.map(|o| o.source), Some(Some(1)));
}

// =============================================================================
// ON DISK
// =============================================================================

#[tokio::test]
async fn config_built_tree_over_local_disk() {
    let dir = temp_dir();
    for (path, data) in [
        ("en/blog/hello.md", "hello"),
        ("en/blog/greeting.en.md", "hi"),
        ("sv/blog/greeting.sv.md", "hej"),
        ("sv/blog/greeting.en.md", "hi from sv"),
    ] {
        let full = dir.join(path);
        tokio::fs::create_dir_all(full.parent().unwrap()).await.unwrap();
        tokio::fs::write(&full, data).await.unwrap();
    }
    let real = dir.canonicalize().unwrap();

    let mut config = LayerConfig::parse(
        r#"
languages = ["en", "sv"]
"#,
    )
    .unwrap();
    for lang in ["en", "sv"] {
        config.sources.push(SourceConfig {
            path: dir.join(lang),
            lang: Some(lang.to_string()),
            read_only: true,
        });
    }

    let chain = config.build_chain();
    let entries = chain.list(Path::new("blog")).await.unwrap();
    let survivors: Vec<_> = entries
        .iter()
        .map(|e| (e.raw_name.as_str(), e.real_path.clone().unwrap()))
        .collect();
    assert_eq!(
        survivors,
        vec![
            ("greeting.en.md", real.join("en/blog/greeting.en.md")),
            ("hello.md", real.join("en/blog/hello.md")),
            ("greeting.sv.md", real.join("sv/blog/greeting.sv.md")),
        ]
    );

    let hello = entries.iter().find(|e| e.raw_name == "hello.md").unwrap();
    let data = chain
        .open_entry(hello)
        .await
        .unwrap()
        .into_file()
        .unwrap()
        .read_to_end()
        .await
        .unwrap();
    assert_eq!(data, b"hello");

    let (_, used_lstat) = lstat_if_possible(&chain, Path::new("blog/hello.md")).await.unwrap();
    assert!(used_lstat, "local sources support lstat");

    assert!(chain.create(Path::new("blog/new.md"), b"x").await.unwrap_err().is_permission_denied());
    assert!(!dir.join("en/blog/new.md").exists());

    cleanup(&dir).await;
}

#[tokio::test]
async fn config_built_router_over_local_disk() {
    let dir = temp_dir();
    tokio::fs::create_dir_all(dir.join("site/blog")).await.unwrap();
    tokio::fs::write(dir.join("site/blog/post.sv.md"), "inlägg").await.unwrap();
    tokio::fs::write(dir.join("site/index.md"), "index").await.unwrap();
    let real = dir.canonicalize().unwrap();

    let config = LayerConfig::parse(&format!(
        r#"
languages = ["en", "sv"]

[[mounts]]
from = "/"
to = "{site}"
lang = "en"

[[mounts]]
from = "/blog"
to = "{blog}"
lang = "sv"
"#,
        site = real.join("site").display(),
        blog = real.join("site/blog").display(),
    ))
    .unwrap();
    let router = config.build_router();

    let post = router.stat(Path::new("/blog/post.sv.md")).await.unwrap();
    assert_eq!(post.language.as_deref(), Some("sv"));
    assert_eq!(post.weight, 2);
    assert_eq!(post.real_path, Some(real.join("site/blog/post.sv.md")));

    let index = router.stat(Path::new("/index.md")).await.unwrap();
    assert_eq!(index.canonical_name, "index.en.md");
    assert_eq!(router.read(Path::new("/index.md")).await.unwrap(), b"index");

    let (_, used_lstat) = lstat_if_possible(&router, Path::new("/index.md")).await.unwrap();
    assert!(used_lstat);

    cleanup(&dir).await;
}
